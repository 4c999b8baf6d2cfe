//! Error types for process execution and voiceover post-processing.

use std::time::Duration;

use scenesmith_core::SceneError;

/// Failure to run an external program at all.
///
/// A program that runs and exits non-zero is not an error at this layer;
/// that is reported through [`crate::process::ProcessOutput`].
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error while waiting on {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub type RunnerResult<T> = std::result::Result<T, RunnerError>;

/// Failures of the narration pass.
#[derive(Debug, thiserror::Error)]
pub enum VoiceoverError {
    #[error("required tool not found on PATH: {0}")]
    ToolMissing(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("muxing failed: {0}")]
    Mux(String),

    #[error("{tool} timed out after {}s", .after.as_secs())]
    Timeout { tool: String, after: Duration },

    #[error("audio source not found: {0}")]
    AudioMissing(String),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<VoiceoverError> for SceneError {
    fn from(err: VoiceoverError) -> Self {
        SceneError::VoiceoverFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voiceover_error_maps_to_recoverable() {
        let err: SceneError = VoiceoverError::Mux("exit code 1".into()).into();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("exit code 1"));
    }

    #[test]
    fn test_timeout_display() {
        let err = VoiceoverError::Timeout {
            tool: "ffmpeg".into(),
            after: Duration::from_secs(300),
        };
        assert_eq!(err.to_string(), "ffmpeg timed out after 300s");
    }
}
