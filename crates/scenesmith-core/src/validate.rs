//! Structural validation with a real Python parser.
//!
//! `valid == true` means the text parses as a module under the reference
//! grammar; nothing regex-based participates in that decision.

use rustpython_parser::{parse, Mode};

use crate::domain::ValidationResult;

const SOURCE_PATH: &str = "<scene>";

/// Parse `text` and report the first failure.
pub fn validate(text: &str) -> ValidationResult {
    match parse(text, Mode::Module, SOURCE_PATH) {
        Ok(_) => ValidationResult::ok(),
        Err(err) => {
            let offset = u32::from(err.offset) as usize;
            ValidationResult::failure(line_of(text, offset), err.error.to_string())
        }
    }
}

/// 1-based line containing byte `offset`.
fn line_of(text: &str, offset: usize) -> usize {
    let offset = offset.min(text.len());
    1 + text.as_bytes()[..offset].iter().filter(|b| **b == b'\n').count()
}
