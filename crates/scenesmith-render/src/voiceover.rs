//! Narration post-processing: synthesize speech and mux it onto a video.
//!
//! Voiceover is strictly additive. Whatever fails, [`VoiceoverProcessor::postprocess`]
//! hands back the original artifact alongside the error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use scenesmith_core::obs;
use scenesmith_core::{Artifact, MediaKind, VoiceSource};

use crate::config::VoiceoverConfig;
use crate::error::VoiceoverError;
use crate::process::{ExitStatus, Invocation, ProcessOutput, ProcessRunner};

/// Text-to-speech service.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Write spoken `text` as audio to `output`.
    async fn synthesize(&self, text: &str, output: &Path) -> Result<(), VoiceoverError>;
}

/// Synthesizes by running an external TTS command.
pub struct CommandSynthesizer {
    runner: Arc<dyn ProcessRunner>,
    config: VoiceoverConfig,
}

impl CommandSynthesizer {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: VoiceoverConfig) -> Self {
        Self { runner, config }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, output: &Path) -> Result<(), VoiceoverError> {
        let timeout = Duration::from_secs(self.config.tts_timeout_secs);
        let invocation = Invocation::new(&self.config.tts_program, timeout)
            .arg(text)
            .args(["--lang", self.config.language.as_str(), "--output"])
            .arg(output.display().to_string());
        let out = self.runner.run(&invocation).await?;
        check_exit(&self.config.tts_program, &out, timeout, VoiceoverError::Synthesis)?;
        if !output.exists() {
            return Err(VoiceoverError::Synthesis(format!(
                "{} produced no audio file",
                self.config.tts_program
            )));
        }
        Ok(())
    }
}

/// Artifact after post-processing, plus the error if narration was dropped.
#[derive(Debug)]
pub struct Postprocessed {
    pub artifact: Artifact,
    pub error: Option<VoiceoverError>,
}

pub struct VoiceoverProcessor {
    runner: Arc<dyn ProcessRunner>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    config: VoiceoverConfig,
    check_tool: bool,
}

impl VoiceoverProcessor {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        config: VoiceoverConfig,
    ) -> Self {
        Self {
            runner,
            synthesizer,
            config,
            check_tool: false,
        }
    }

    /// Verify the media tool is on `PATH` before every mux.
    pub fn with_tool_check(mut self) -> Self {
        self.check_tool = true;
        self
    }

    pub fn config(&self) -> &VoiceoverConfig {
        &self.config
    }

    /// Add narration to `artifact`.
    ///
    /// Already-narrated artifacts pass through untouched. On any failure
    /// the original artifact is returned with the error.
    pub async fn postprocess(&self, artifact: &Artifact, source: &VoiceSource) -> Postprocessed {
        if artifact.narrated {
            return Postprocessed {
                artifact: artifact.clone(),
                error: None,
            };
        }
        match self.mux_narration(artifact, source).await {
            Ok(narrated) => Postprocessed {
                artifact: narrated,
                error: None,
            },
            Err(e) => {
                obs::emit_voiceover_degraded(&e);
                Postprocessed {
                    artifact: artifact.clone(),
                    error: Some(e),
                }
            }
        }
    }

    async fn mux_narration(
        &self,
        artifact: &Artifact,
        source: &VoiceSource,
    ) -> Result<Artifact, VoiceoverError> {
        if artifact.kind != MediaKind::Video {
            return Err(VoiceoverError::Mux(format!(
                "cannot add audio to {:?} output",
                artifact.kind
            )));
        }
        if self.check_tool {
            which::which(&self.config.media_tool)
                .map_err(|_| VoiceoverError::ToolMissing(self.config.media_tool.clone()))?;
        }

        let (speech, output) = narration_outputs(&artifact.path, &self.config);
        let audio = match source {
            VoiceSource::Text(text) => {
                self.synthesizer.synthesize(text, &speech).await?;
                speech
            }
            VoiceSource::Audio(path) => {
                if !path.is_file() {
                    return Err(VoiceoverError::AudioMissing(path.display().to_string()));
                }
                path.clone()
            }
        };

        let timeout = Duration::from_secs(self.config.mux_timeout_secs);
        let invocation = Invocation::new(&self.config.media_tool, timeout)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(artifact.path.display().to_string())
            .arg("-i")
            .arg(audio.display().to_string())
            .args(["-c:v", "copy", "-c:a", "aac", "-shortest"])
            .arg(output.display().to_string());
        let out = self.runner.run(&invocation).await?;
        check_exit(&self.config.media_tool, &out, timeout, VoiceoverError::Mux)?;
        if !output.is_file() {
            return Err(VoiceoverError::Mux(format!(
                "{} reported success but {} is missing",
                self.config.media_tool,
                output.display()
            )));
        }

        Ok(Artifact::new(output, MediaKind::Video).with_narration())
    }

    /// Join `segments` in order into `output` through a concat manifest
    /// written next to it.
    pub async fn concatenate(&self, segments: &[PathBuf], output: &Path) -> Result<(), VoiceoverError> {
        if self.check_tool {
            which::which(&self.config.media_tool)
                .map_err(|_| VoiceoverError::ToolMissing(self.config.media_tool.clone()))?;
        }

        let manifest = output.with_extension("txt");
        let body: String = segments
            .iter()
            .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', r"'\''")))
            .collect();
        tokio::fs::write(&manifest, body).await?;

        let timeout = Duration::from_secs(self.config.concat_timeout_secs);
        let invocation = Invocation::new(&self.config.media_tool, timeout)
            .args(["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
            .arg(manifest.display().to_string())
            .args(["-c", "copy"])
            .arg(output.display().to_string());
        let out = self.runner.run(&invocation).await?;
        check_exit(&self.config.media_tool, &out, timeout, VoiceoverError::Mux)?;
        if !output.is_file() {
            return Err(VoiceoverError::Mux(format!(
                "{} reported success but {} is missing",
                self.config.media_tool,
                output.display()
            )));
        }
        Ok(())
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Map a non-clean exit to `fail`, and a timeout to [`VoiceoverError::Timeout`].
fn check_exit(
    tool: &str,
    out: &ProcessOutput,
    timeout: Duration,
    fail: fn(String) -> VoiceoverError,
) -> Result<(), VoiceoverError> {
    match out.status {
        ExitStatus::Exited(Some(0)) => Ok(()),
        ExitStatus::TimedOut => Err(VoiceoverError::Timeout {
            tool: tool.to_string(),
            after: timeout,
        }),
        ExitStatus::Exited(code) => {
            let detail = match (out.diagnostics(), code) {
                ("", Some(code)) => format!("exit code {code}"),
                ("", None) => "terminated by signal".to_string(),
                (text, _) => text.to_string(),
            };
            Err(fail(format!("{tool}: {detail}")))
        }
    }
}

/// Synthesized speech and muxed output paths, next to `video`.
fn narration_outputs(video: &Path, config: &VoiceoverConfig) -> (PathBuf, PathBuf) {
    let dir = video.parent().unwrap_or_else(|| Path::new("."));
    let stem = file_stem(video);
    (
        dir.join(format!("{stem}_narration.mp3")),
        dir.join(format!("{stem}{}.mp4", config.output_suffix)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ScriptedRunner, StaticSynthesizer, Step};

    fn video(dir: &Path) -> Artifact {
        let path = dir.join("Demo.mp4");
        std::fs::write(&path, b"video").unwrap();
        Artifact::new(path, MediaKind::Video)
    }

    fn processor(runner: Arc<ScriptedRunner>, synth: Arc<StaticSynthesizer>) -> VoiceoverProcessor {
        VoiceoverProcessor::new(runner, synth, VoiceoverConfig::default())
    }

    #[tokio::test]
    async fn test_text_narration_muxed() {
        let dir = tempfile::tempdir().unwrap();
        let base = video(dir.path());
        let runner = Arc::new(ScriptedRunner::new().then(Step::write_output()));
        let synth = Arc::new(StaticSynthesizer::new());

        let out = processor(runner.clone(), synth.clone())
            .postprocess(&base, &VoiceSource::Text("A circle appears".into()))
            .await;
        assert!(out.error.is_none());
        assert!(out.artifact.narrated);
        assert!(out.artifact.path.ends_with("Demo_with_voiceover.mp4"));
        assert_eq!(synth.calls(), vec!["A circle appears"]);

        let mux = &runner.invocations_of("ffmpeg")[0];
        let args = mux.args.join(" ");
        assert!(args.contains("-c:v copy -c:a aac -shortest"));
        assert!(args.contains("Demo_narration.mp3"));
    }

    #[tokio::test]
    async fn test_failing_mux_returns_original() {
        let dir = tempfile::tempdir().unwrap();
        let base = video(dir.path());
        let runner = Arc::new(ScriptedRunner::new().otherwise(Step::exit(1).stderr("Invalid data")));

        let out = processor(runner, Arc::new(StaticSynthesizer::new()))
            .postprocess(&base, &VoiceSource::Text("hello".into()))
            .await;
        assert_eq!(out.artifact, base);
        assert!(matches!(out.error, Some(VoiceoverError::Mux(ref m)) if m.contains("Invalid data")));
    }

    #[tokio::test]
    async fn test_failing_synthesis_returns_original() {
        let dir = tempfile::tempdir().unwrap();
        let base = video(dir.path());
        let runner = Arc::new(ScriptedRunner::new());

        let out = processor(runner.clone(), Arc::new(StaticSynthesizer::failing("no network")))
            .postprocess(&base, &VoiceSource::Text("hello".into()))
            .await;
        assert_eq!(out.artifact, base);
        assert!(matches!(out.error, Some(VoiceoverError::Synthesis(_))));
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_mux_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let base = video(dir.path());
        let runner = Arc::new(ScriptedRunner::new().then(Step::timeout()));

        let out = processor(runner, Arc::new(StaticSynthesizer::new()))
            .postprocess(&base, &VoiceSource::Text("hello".into()))
            .await;
        assert!(matches!(out.error, Some(VoiceoverError::Timeout { .. })));
        assert_eq!(out.artifact, base);
    }

    #[tokio::test]
    async fn test_audio_source_skips_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let base = video(dir.path());
        let audio = dir.path().join("voice.wav");
        std::fs::write(&audio, b"audio").unwrap();
        let runner = Arc::new(ScriptedRunner::new().then(Step::write_output()));
        let synth = Arc::new(StaticSynthesizer::new());

        let out = processor(runner, synth.clone())
            .postprocess(&base, &VoiceSource::Audio(audio))
            .await;
        assert!(out.error.is_none());
        assert!(synth.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_audio_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = video(dir.path());
        let out = processor(Arc::new(ScriptedRunner::new()), Arc::new(StaticSynthesizer::new()))
            .postprocess(&base, &VoiceSource::Audio(dir.path().join("none.wav")))
            .await;
        assert!(matches!(out.error, Some(VoiceoverError::AudioMissing(_))));
    }

    #[tokio::test]
    async fn test_narrated_artifact_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let base = video(dir.path()).with_narration();
        let runner = Arc::new(ScriptedRunner::new());
        let out = processor(runner.clone(), Arc::new(StaticSynthesizer::new()))
            .postprocess(&base, &VoiceSource::Text("hello".into()))
            .await;
        assert_eq!(out.artifact, base);
        assert!(out.error.is_none());
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_gif_cannot_be_muxed() {
        let dir = tempfile::tempdir().unwrap();
        let base = Artifact::new(dir.path().join("Demo.gif"), MediaKind::AnimatedImage);
        let out = processor(Arc::new(ScriptedRunner::new()), Arc::new(StaticSynthesizer::new()))
            .postprocess(&base, &VoiceSource::Text("hello".into()))
            .await;
        assert_eq!(out.artifact, base);
        assert!(matches!(out.error, Some(VoiceoverError::Mux(_))));
    }

    #[tokio::test]
    async fn test_missing_tool_detected() {
        let dir = tempfile::tempdir().unwrap();
        let base = video(dir.path());
        let config = VoiceoverConfig {
            media_tool: "scenesmith-no-such-muxer".into(),
            ..VoiceoverConfig::default()
        };
        let out = VoiceoverProcessor::new(
            Arc::new(ScriptedRunner::new()),
            Arc::new(StaticSynthesizer::new()),
            config,
        )
        .with_tool_check()
        .postprocess(&base, &VoiceSource::Text("hello".into()))
        .await;
        assert!(matches!(out.error, Some(VoiceoverError::ToolMissing(_))));
    }

    #[tokio::test]
    async fn test_command_synthesizer_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("n.mp3");
        let runner = Arc::new(ScriptedRunner::new().then(Step::write_output()));
        CommandSynthesizer::new(runner.clone(), VoiceoverConfig::default())
            .synthesize("Hello there", &output)
            .await
            .unwrap();
        let inv = &runner.invocations()[0];
        assert_eq!(inv.program, "gtts-cli");
        assert_eq!(inv.args[0], "Hello there");
        assert_eq!(&inv.args[1..4], &["--lang", "en", "--output"]);
    }

    #[tokio::test]
    async fn test_concatenate_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let segments = vec![dir.path().join("a.mp4"), dir.path().join("it's.mp4")];
        let output = dir.path().join("final.mp4");
        let runner = Arc::new(ScriptedRunner::new().then(Step::write_output()));

        processor(runner.clone(), Arc::new(StaticSynthesizer::new()))
            .concatenate(&segments, &output)
            .await
            .unwrap();

        let manifest = std::fs::read_to_string(dir.path().join("final.txt")).unwrap();
        let lines: Vec<_> = manifest.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("a.mp4'"));
        assert!(lines[1].contains(r"it'\''s.mp4"));
        let args = runner.invocations()[0].args.join(" ");
        assert!(args.contains("-f concat -safe 0 -i"));
        assert!(args.contains("-c copy"));
    }

    #[tokio::test]
    async fn test_concatenate_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().then(Step::exit(1)));
        let err = processor(runner, Arc::new(StaticSynthesizer::new()))
            .concatenate(&[dir.path().join("a.mp4")], &dir.path().join("final.mp4"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "muxing failed: ffmpeg: exit code 1");
    }

    #[test]
    fn test_narration_outputs() {
        let (audio, video) =
            narration_outputs(Path::new("/ws/v/Demo.mp4"), &VoiceoverConfig::default());
        assert_eq!(audio, PathBuf::from("/ws/v/Demo_narration.mp3"));
        assert_eq!(video, PathBuf::from("/ws/v/Demo_with_voiceover.mp4"));
    }
}
