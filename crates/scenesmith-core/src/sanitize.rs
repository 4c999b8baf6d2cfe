//! Normalize, repair and validate a submission's source text.

use crate::domain::{RepairRecord, Result, SceneError, ValidationResult};
use crate::normalize::normalize;
use crate::obs;
use crate::repair::RepairEngine;
use crate::validate::validate;

/// Source text that is known to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub text: String,
    pub record: RepairRecord,
    pub validation: ValidationResult,
    /// The remediation pass was needed.
    pub remediated: bool,
}

/// Run the normalizer, the repair engine, and the validator.
///
/// A failed validation earns exactly one remediation pass; text that still
/// does not parse is rejected with [`SceneError::SanitizationFailed`].
pub fn sanitize(source: &str, engine: &RepairEngine) -> Result<Sanitized> {
    let normalized = normalize(source);
    if normalized.trim().is_empty() {
        return Err(SceneError::InputEmpty);
    }

    let repaired = engine.repair(&normalized);
    let validation = validate(&repaired.text);
    if validation.valid {
        return Ok(Sanitized {
            text: repaired.text,
            record: repaired.record,
            validation,
            remediated: false,
        });
    }

    obs::emit_validation_failed(validation.line, validation.message.as_deref());
    let mut record = repaired.record;
    let remediated = engine.remediate(&repaired.text, &validation);
    record.extend(remediated.record);

    let validation = validate(&remediated.text);
    if !validation.valid {
        obs::emit_validation_failed(validation.line, validation.message.as_deref());
        return Err(SceneError::SanitizationFailed {
            line: validation.line.unwrap_or(0),
            message: validation.message.unwrap_or_default(),
        });
    }

    Ok(Sanitized {
        text: remediated.text,
        record,
        validation,
        remediated: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repair::RepairOptions;

    #[test]
    fn test_empty_rejected() {
        let engine = RepairEngine::default();
        assert!(matches!(sanitize("", &engine), Err(SceneError::InputEmpty)));
        assert!(matches!(sanitize(" \n\t", &engine), Err(SceneError::InputEmpty)));
    }

    #[test]
    fn test_clean_script_passes_through() {
        let src = "from manim import *\n\n\nclass A(Scene):\n    def construct(self):\n        self.wait()\n";
        let out = sanitize(src, &RepairEngine::default()).unwrap();
        assert_eq!(out.text, src);
        assert!(out.validation.valid);
        assert!(!out.remediated);
    }

    #[test]
    fn test_repairs_then_validates() {
        let src = "```python\ncircle = Circle(buff=1, radius=2)\nself.play(Create(circle)\n```\n";
        let out = sanitize(src, &RepairEngine::default()).unwrap();
        assert!(out.text.contains("circle = Circle(radius=2)"));
        assert!(out.text.contains("self.play(Create(circle))"));
        assert!(out.text.contains("class GeneratedScene(Scene):"));
        assert!(out.record.rules().contains(&"parameter-elision"));
    }

    #[test]
    fn test_remediation_comments_out_trailing_prose() {
        let engine = RepairEngine::new(RepairOptions::default());
        let src = "from manim import *\n\n\nclass A(Scene):\n    def construct(self):\n        self.wait()\n        This shows a pause\n";
        let out = sanitize(src, &engine).unwrap();
        assert!(out.remediated);
        assert!(out.text.contains("# This shows a pause"));
        assert!(out.record.rules().contains(&"remediation"));
    }

    #[test]
    fn test_unsalvageable_fails_with_line() {
        let src = "from manim import *\n\n\nclass A(Scene):\n    def construct(self):\n        x = = 1\n";
        match sanitize(src, &RepairEngine::default()) {
            Err(SceneError::SanitizationFailed { line, message }) => {
                assert_eq!(line, 6);
                assert!(!message.is_empty());
            }
            other => panic!("expected SanitizationFailed, got {other:?}"),
        }
    }
}
