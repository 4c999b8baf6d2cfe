//! Inbound script submissions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One inbound request: raw script text plus optional structured fields.
///
/// Payloads produced upstream use `manimCode` and `voiceover` for the
/// structured fields; both spellings deserialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSubmission {
    /// Raw script text, possibly wrapped in prose or markdown.
    #[serde(default)]
    pub script: Option<String>,

    /// Pre-extracted code; preferred over `script` when present.
    #[serde(default, alias = "manimCode")]
    pub code: Option<String>,

    /// Narration text to synthesize and mux onto the rendered video.
    #[serde(default, alias = "voiceover")]
    pub narration: Option<String>,

    /// Pre-existing narration audio; used instead of synthesis when set.
    #[serde(default)]
    pub audio: Option<PathBuf>,

    /// The script narrates itself and needs a narration-capable scene base.
    #[serde(default)]
    pub narrated_scene: bool,
}

/// Where voiceover audio comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceSource {
    Text(String),
    Audio(PathBuf),
}

impl ScriptSubmission {
    pub fn from_script(script: impl Into<String>) -> Self {
        Self {
            script: Some(script.into()),
            ..Self::default()
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = Some(narration.into());
        self
    }

    pub fn with_audio(mut self, audio: impl Into<PathBuf>) -> Self {
        self.audio = Some(audio.into());
        self
    }

    pub fn narrated(mut self, narrated_scene: bool) -> Self {
        self.narrated_scene = narrated_scene;
        self
    }

    /// Parse a JSON payload.
    pub fn from_json(payload: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }

    /// The source text to repair, or `None` when nothing usable was sent.
    pub fn source(&self) -> Option<&str> {
        [self.code.as_deref(), self.script.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
    }

    /// Audio source for the post-processing pass, if any was requested.
    pub fn voice_source(&self) -> Option<VoiceSource> {
        if let Some(audio) = &self.audio {
            return Some(VoiceSource::Audio(audio.clone()));
        }
        self.narration
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| VoiceSource::Text(n.to_string()))
    }
}
