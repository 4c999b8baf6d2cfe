//! Structured lifecycle events for the repair-and-render pipeline.
//!
//! Every event carries an `event` field so log pipelines can filter on it.
//! [`execution_span`] tags everything emitted while one submission is being
//! processed with its workspace id.

use std::path::Path;

use tracing::{debug, info, warn};

/// Span tagging every event of one execution with its workspace id.
///
/// ```ignore
/// async { /* ... */ }.instrument(execution_span("3f2a9c1e")).await
/// ```
pub fn execution_span(workspace_id: &str) -> tracing::Span {
    tracing::info_span!("scenesmith.execution", workspace_id = %workspace_id)
}

pub fn emit_rule_applied(rule: &str, pass: usize) {
    debug!(event = "repair.rule_applied", rule = %rule, pass = pass);
}

pub fn emit_validation_failed(line: Option<usize>, message: Option<&str>) {
    info!(
        event = "validate.failed",
        line = line.unwrap_or(0),
        message = %message.unwrap_or(""),
    );
}

pub fn emit_workspace_created(workspace_id: &str, root: &Path) {
    info!(event = "workspace.created", workspace_id = %workspace_id, root = %root.display());
}

/// Emit event: retention sweep finished.
pub fn emit_sweep_completed(scanned: usize, removed: usize, failed: usize) {
    info!(
        event = "workspace.sweep_completed",
        scanned = scanned,
        removed = removed,
        failed = failed,
    );
}

pub fn emit_sweep_delete_failed(path: &Path, error: &dyn std::fmt::Display) {
    warn!(event = "workspace.delete_failed", path = %path.display(), error = %error);
}

/// Emit event: a render attempt is about to start.
pub fn emit_attempt_started(profile_index: usize, profile: &str) {
    info!(event = "render.attempt_started", profile_index = profile_index, profile = %profile);
}

/// Emit event: a render attempt ended, successfully or not.
pub fn emit_attempt_finished(profile_index: usize, profile: &str, outcome: &str, duration_ms: u64) {
    info!(
        event = "render.attempt_finished",
        profile_index = profile_index,
        profile = %profile,
        outcome = %outcome,
        duration_ms = duration_ms,
    );
}

pub fn emit_render_exhausted(attempts: usize, last_profile: &str) {
    warn!(event = "render.exhausted", attempts = attempts, last_profile = %last_profile);
}

pub fn emit_artifact_located(path: &Path, kind: &str) {
    info!(event = "artifact.located", path = %path.display(), kind = %kind);
}

/// Emit event: voiceover failed and the silent artifact was kept.
pub fn emit_voiceover_degraded(error: &dyn std::fmt::Display) {
    warn!(event = "voiceover.degraded", error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_span_create() {
        let _span = execution_span("test-workspace").entered();
        emit_attempt_started(0, "primary");
    }
}
