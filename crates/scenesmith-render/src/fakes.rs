//! In-memory fakes for the process and speech seams (testing only)
//!
//! `ScriptedRunner` replays a queue of scripted outcomes and records every
//! invocation; `StaticSynthesizer` writes a placeholder audio file or fails
//! on demand.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{RunnerError, RunnerResult, VoiceoverError};
use crate::process::{ExitStatus, Invocation, ProcessOutput, ProcessRunner};
use crate::voiceover::SpeechSynthesizer;

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum StepKind {
    Exit(i32),
    Timeout,
    SpawnError,
}

/// Files a scripted step leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Effect {
    /// Relative to the invocation's working directory.
    InCwd(PathBuf),
    /// At the path given as the last argument, like a muxer's output.
    LastArg,
}

/// One scripted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    kind: StepKind,
    stdout: String,
    stderr: String,
    effects: Vec<Effect>,
}

impl Step {
    pub fn exit(code: i32) -> Self {
        Self {
            kind: StepKind::Exit(code),
            stdout: String::new(),
            stderr: String::new(),
            effects: Vec::new(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: StepKind::Timeout,
            ..Self::exit(0)
        }
    }

    pub fn spawn_error() -> Self {
        Self {
            kind: StepKind::SpawnError,
            ..Self::exit(0)
        }
    }

    /// Exit 0 and leave a media file at `rel` under the working directory.
    pub fn render(rel: impl Into<PathBuf>) -> Self {
        Self::exit(0).creates(rel)
    }

    /// Exit 0 and write the file named by the last argument.
    pub fn write_output() -> Self {
        let mut step = Self::exit(0);
        step.effects.push(Effect::LastArg);
        step
    }

    pub fn stdout(mut self, text: impl Into<String>) -> Self {
        self.stdout = text.into();
        self
    }

    pub fn stderr(mut self, text: impl Into<String>) -> Self {
        self.stderr = text.into();
        self
    }

    pub fn creates(mut self, rel: impl Into<PathBuf>) -> Self {
        self.effects.push(Effect::InCwd(rel.into()));
        self
    }
}

/// Process runner that replays scripted steps in order.
///
/// Once the queue is empty every call gets the fallback step, which is a
/// clean exit unless [`ScriptedRunner::otherwise`] replaced it.
#[derive(Debug)]
pub struct ScriptedRunner {
    queue: Mutex<VecDeque<Step>>,
    fallback: Step,
    invocations: Mutex<Vec<Invocation>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Step::exit(0),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, step: Step) -> Self {
        self.queue.lock().unwrap().push_back(step);
        self
    }

    pub fn otherwise(mut self, step: Step) -> Self {
        self.fallback = step;
        self
    }

    /// Every invocation seen so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Invocations of one program.
    pub fn invocations_of(&self, program: &str) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|i| i.program == program)
            .collect()
    }

    fn apply(effect: &Effect, invocation: &Invocation) {
        let path = match effect {
            Effect::InCwd(rel) => match &invocation.cwd {
                Some(cwd) => cwd.join(rel),
                None => rel.clone(),
            },
            Effect::LastArg => match invocation.args.last() {
                Some(last) => PathBuf::from(last),
                None => return,
            },
        };
        write_placeholder(&path);
    }
}

fn write_placeholder(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"fake media").unwrap();
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> RunnerResult<ProcessOutput> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let step = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let status = match step.kind {
            StepKind::Exit(code) => ExitStatus::Exited(Some(code)),
            StepKind::Timeout => ExitStatus::TimedOut,
            StepKind::SpawnError => {
                return Err(RunnerError::Spawn {
                    program: invocation.program.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted"),
                })
            }
        };
        for effect in &step.effects {
            Self::apply(effect, invocation);
        }
        Ok(ProcessOutput {
            status,
            stdout: step.stdout,
            stderr: step.stderr,
            duration_ms: 1,
        })
    }
}

// ---------------------------------------------------------------------------
// StaticSynthesizer
// ---------------------------------------------------------------------------

/// Speech synthesizer that writes a placeholder file, or always fails.
#[derive(Debug, Default)]
pub struct StaticSynthesizer {
    failure: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl StaticSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Texts passed to `synthesize`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for StaticSynthesizer {
    async fn synthesize(&self, text: &str, output: &Path) -> Result<(), VoiceoverError> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(reason) = &self.failure {
            return Err(VoiceoverError::Synthesis(reason.clone()));
        }
        write_placeholder(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_scripted_runner_replays_then_falls_back() {
        let runner = ScriptedRunner::new()
            .then(Step::exit(1).stderr("boom"))
            .otherwise(Step::timeout());
        let inv = Invocation::new("python3", Duration::from_secs(1));

        let first = runner.run(&inv).await.unwrap();
        assert_eq!(first.status, ExitStatus::Exited(Some(1)));
        assert_eq!(first.stderr, "boom");
        let second = runner.run(&inv).await.unwrap();
        assert_eq!(second.status, ExitStatus::TimedOut);
        assert_eq!(runner.invocations().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_runner_effects() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let runner = ScriptedRunner::new()
            .then(Step::render("videos/Demo.mp4"))
            .then(Step::write_output());

        let render = Invocation::new("python3", Duration::from_secs(1)).cwd(dir.path());
        runner.run(&render).await.unwrap();
        assert!(dir.path().join("videos/Demo.mp4").exists());

        let mux = Invocation::new("ffmpeg", Duration::from_secs(1)).arg(out.display().to_string());
        runner.run(&mux).await.unwrap();
        assert!(out.exists());
        assert_eq!(runner.invocations_of("ffmpeg").len(), 1);
    }

    #[tokio::test]
    async fn test_static_synthesizer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        StaticSynthesizer::new().synthesize("hi", &path).await.unwrap();
        assert!(path.exists());

        let failing = StaticSynthesizer::failing("quota");
        assert!(failing.synthesize("hi", &path).await.is_err());
        assert_eq!(failing.calls(), vec!["hi"]);
    }
}
