//! Scenesmith core: turning generated scene scripts into parseable ones.
//!
//! The pipeline up to the render engine is pure text processing:
//!
//! 1. [`normalize`] maps typographic punctuation to ASCII and strips
//!    invisible characters.
//! 2. [`RepairEngine`] applies an ordered list of repair rules for a bounded
//!    number of passes.
//! 3. [`validate`] parses the result with a real Python parser.
//!
//! [`sanitize`] ties the three together, including the single remediation
//! pass allowed after a failed validation.

pub mod domain;
pub mod normalize;
pub mod obs;
pub mod repair;
pub mod sanitize;
pub mod scene;
pub mod telemetry;
pub mod validate;

pub use domain::{
    Artifact, AttemptOutcome, ExecutionAttempt, MediaKind, RepairRecord, RepairStep, Result,
    SceneError, ScriptSubmission, ValidationResult, VoiceSource,
};
pub use normalize::normalize;
pub use repair::{RepairEngine, RepairOptions, RepairRule, Repaired};
pub use sanitize::{sanitize, Sanitized};
pub use scene::{detect_scene, SceneInfo};
pub use telemetry::init_tracing;
pub use validate::validate;
