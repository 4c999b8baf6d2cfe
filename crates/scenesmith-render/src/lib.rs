//! Scenesmith render: from a sanitized script to a media file on disk.
//!
//! - [`WorkspaceManager`] gives every execution its own directory and
//!   sweeps stale ones.
//! - [`RenderOrchestrator`] runs the render engine through an ordered
//!   fallback chain of [`RenderProfile`]s, one attempt at a time.
//! - [`locate_artifact`] finds what the engine produced.
//! - [`VoiceoverProcessor`] optionally adds narration without ever losing
//!   the silent video.
//! - [`ScenePipeline`] wires everything together, including the
//!   sequential-segments mode.

pub mod config;
pub mod error;
pub mod fakes;
pub mod fs_util;
pub mod locate;
pub mod orchestrator;
pub mod pipeline;
pub mod process;
pub mod profile;
pub mod sequence;
pub mod voiceover;
pub mod workspace;

pub use config::{PipelineConfig, RenderConfig, RepairPolicy, RetentionPolicy, VoiceoverConfig};
pub use error::{RunnerError, VoiceoverError};
pub use locate::{find_artifact, locate_artifact, require_artifact};
pub use orchestrator::{AttemptResult, RenderJob, RenderOrchestrator, RenderOutcome};
pub use pipeline::{RenderResult, ScenePipeline};
pub use process::{decode_stream, ExitStatus, Invocation, ProcessOutput, ProcessRunner, SystemRunner};
pub use profile::RenderProfile;
pub use sequence::{Segment, SequenceResult};
pub use voiceover::{CommandSynthesizer, Postprocessed, SpeechSynthesizer, VoiceoverProcessor};
pub use workspace::{SweepReport, Workspace, WorkspaceManager};
