//! Pipeline error taxonomy.
//!
//! Every variant that reaches a caller carries the last diagnostic text that
//! was captured, so a failed render can be explained without re-running it.

use std::path::PathBuf;

/// Errors surfaced by the repair-and-render pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("submission is empty")]
    InputEmpty,

    #[error("script still unparseable after repair (line {line}): {message}")]
    SanitizationFailed { line: usize, message: String },

    #[error("render timed out after {timeout_secs}s on profile {profile}: {diagnostics}")]
    RenderTimeout {
        profile: String,
        timeout_secs: u64,
        diagnostics: String,
    },

    #[error("all {attempts} render profiles failed; last ({profile}): {diagnostics}")]
    RenderFailed {
        attempts: usize,
        profile: String,
        diagnostics: String,
    },

    #[error("render exited cleanly but no media was found under {workspace}: {diagnostics}")]
    NoArtifactProduced {
        workspace: PathBuf,
        diagnostics: String,
    },

    #[error("voiceover failed: {0}")]
    VoiceoverFailed(String),

    #[error("segment concatenation failed: {0}")]
    ConcatenationFailed(String),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SceneError {
    /// Whether the pipeline may continue past this error with a degraded result.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SceneError::VoiceoverFailed(_))
    }

    /// Last captured diagnostic text, if the variant carries one.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            SceneError::SanitizationFailed { message, .. } => Some(message),
            SceneError::RenderTimeout { diagnostics, .. }
            | SceneError::RenderFailed { diagnostics, .. }
            | SceneError::NoArtifactProduced { diagnostics, .. } => Some(diagnostics),
            SceneError::VoiceoverFailed(msg) | SceneError::ConcatenationFailed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, SceneError>;
