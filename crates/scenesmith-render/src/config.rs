//! Pipeline configuration.
//!
//! Every section has serde defaults, so a config file only needs the keys
//! it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scenesmith_core::{RepairOptions, Result};

/// Top-level configuration for [`crate::ScenePipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding one subdirectory per execution.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub retention: RetentionPolicy,

    #[serde(default)]
    pub repair: RepairPolicy,

    #[serde(default)]
    pub voiceover: VoiceoverConfig,
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("scenesmith")
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            render: RenderConfig::default(),
            retention: RetentionPolicy::default(),
            repair: RepairPolicy::default(),
            voiceover: VoiceoverConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Repair options for a submission; narration depends on the request.
    pub fn repair_options(&self, narration: bool) -> RepairOptions {
        RepairOptions {
            narration,
            max_passes: self.repair.max_passes,
        }
    }
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

/// How the render engine is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Interpreter that hosts the engine.
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the script path.
    #[serde(default = "default_base_args")]
    pub base_args: Vec<String>,

    /// Hard wall-clock limit for one attempt.
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,

    /// Frame rate of the full-quality profiles.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    /// Pixel size of the full-quality profiles.
    #[serde(default = "default_resolution")]
    pub resolution: (u32, u32),

    /// Short workspace ids, frame-image fallback and legacy stdio env.
    #[serde(default = "default_constrained")]
    pub constrained: bool,

    /// File name the sanitized script is written to inside a workspace.
    #[serde(default = "default_script_name")]
    pub script_name: String,
}

fn default_program() -> String {
    if cfg!(windows) { "python" } else { "python3" }.to_string()
}

fn default_base_args() -> Vec<String> {
    vec!["-m".to_string(), "manim".to_string(), "render".to_string()]
}

fn default_render_timeout() -> u64 {
    120
}

fn default_frame_rate() -> u32 {
    30
}

fn default_resolution() -> (u32, u32) {
    (1280, 720)
}

fn default_constrained() -> bool {
    cfg!(windows)
}

fn default_script_name() -> String {
    "scene.py".to_string()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            base_args: default_base_args(),
            timeout_secs: default_render_timeout(),
            frame_rate: default_frame_rate(),
            resolution: default_resolution(),
            constrained: default_constrained(),
            script_name: default_script_name(),
        }
    }
}

impl RenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

/// Bounds for the opportunistic workspace sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Workspaces older than this are deleted.
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,

    /// Only this many of the most recently modified workspaces are examined.
    #[serde(default = "default_sweep_cap")]
    pub sweep_cap: usize,
}

fn default_max_age() -> u64 {
    3600
}

fn default_sweep_cap() -> usize {
    20
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age(),
            sweep_cap: default_sweep_cap(),
        }
    }
}

impl RetentionPolicy {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

// ---------------------------------------------------------------------------
// Repair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairPolicy {
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

fn default_max_passes() -> usize {
    RepairOptions::default().max_passes
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Voiceover
// ---------------------------------------------------------------------------

/// External tools used by the narration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceoverConfig {
    /// Text-to-speech command; called as `<tts> <text> --lang <lang> --output <file>`.
    #[serde(default = "default_tts_program")]
    pub tts_program: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Media muxing tool.
    #[serde(default = "default_media_tool")]
    pub media_tool: String,

    #[serde(default = "default_tts_timeout")]
    pub tts_timeout_secs: u64,

    #[serde(default = "default_mux_timeout")]
    pub mux_timeout_secs: u64,

    #[serde(default = "default_concat_timeout")]
    pub concat_timeout_secs: u64,

    /// Appended to the base file stem of a muxed artifact.
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,
}

fn default_tts_program() -> String {
    "gtts-cli".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_media_tool() -> String {
    "ffmpeg".to_string()
}

fn default_tts_timeout() -> u64 {
    120
}

fn default_mux_timeout() -> u64 {
    300
}

fn default_concat_timeout() -> u64 {
    600
}

fn default_output_suffix() -> String {
    "_with_voiceover".to_string()
}

impl Default for VoiceoverConfig {
    fn default() -> Self {
        Self {
            tts_program: default_tts_program(),
            language: default_language(),
            media_tool: default_media_tool(),
            tts_timeout_secs: default_tts_timeout(),
            mux_timeout_secs: default_mux_timeout(),
            concat_timeout_secs: default_concat_timeout(),
            output_suffix: default_output_suffix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.render.timeout_secs, 120);
        assert_eq!(config.render.resolution, (1280, 720));
        assert_eq!(config.retention.max_age_secs, 3600);
        assert_eq!(config.retention.sweep_cap, 20);
        assert_eq!(config.repair.max_passes, 2);
        assert_eq!(config.voiceover.mux_timeout_secs, 300);
        assert_eq!(config.voiceover.concat_timeout_secs, 600);
        assert_eq!(config.voiceover.output_suffix, "_with_voiceover");
        assert!(config.workspace_root.ends_with("scenesmith"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"workspace_root": "/srv/scenes", "render": {"timeout_secs": 30}}"#,
        )
        .unwrap();
        assert_eq!(config.workspace_root, PathBuf::from("/srv/scenes"));
        assert_eq!(config.render.timeout_secs, 30);
        assert_eq!(config.render.frame_rate, 30);
        assert_eq!(config.voiceover, VoiceoverConfig::default());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = PipelineConfig::default().with_workspace_root("/tmp/x");
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenesmith.json");
        std::fs::write(&path, r#"{"retention": {"sweep_cap": 5}}"#).unwrap();
        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.retention.sweep_cap, 5);
        assert_eq!(config.retention.max_age_secs, 3600);
    }

    #[test]
    fn test_repair_options_carry_narration() {
        let opts = PipelineConfig::default().repair_options(true);
        assert!(opts.narration);
        assert_eq!(opts.max_passes, 2);
    }
}
