use serde::{Deserialize, Serialize};

/// Outcome of parsing a candidate script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,

    /// 1-based line of the first parse failure.
    pub line: Option<usize>,

    pub message: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            line: None,
            message: None,
        }
    }

    pub fn failure(line: usize, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            line: Some(line),
            message: Some(message.into()),
        }
    }
}
