//! Domain types shared by the repair engine and the render pipeline.

pub mod artifact;
pub mod attempt;
pub mod error;
pub mod record;
pub mod submission;
pub mod validation;

pub use artifact::{Artifact, MediaKind};
pub use attempt::{AttemptOutcome, ExecutionAttempt};
pub use error::{Result, SceneError};
pub use record::{RepairRecord, RepairStep};
pub use submission::{ScriptSubmission, VoiceSource};
pub use validation::ValidationResult;
