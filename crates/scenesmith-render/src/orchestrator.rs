//! Render execution with an ordered fallback chain.
//!
//! ```text
//! Pending -> Rendering(0) -> Succeeded
//!                         -> Rendering(1) -> ... -> Exhausted
//! ```
//!
//! Attempts run strictly one after another against the same workspace. A
//! timeout is recorded separately from a non-zero exit, and when every
//! profile fails the error carries the last attempt's diagnostics.

use std::path::Path;
use std::sync::Arc;

use scenesmith_core::obs;
use scenesmith_core::{AttemptOutcome, ExecutionAttempt, Result, SceneError};

use crate::config::RenderConfig;
use crate::process::{ExitStatus, Invocation, ProcessRunner};
use crate::profile::RenderProfile;

/// What to render and where.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    pub script: &'a Path,
    pub scene: &'a str,
    pub workspace: &'a Path,
}

/// Result of a single attempt, folded over the profile chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Success(ExecutionAttempt),
    Failure(ExecutionAttempt),
}

/// The attempt that succeeded and how many were needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub attempt: ExecutionAttempt,
    pub attempts_made: usize,
}

pub struct RenderOrchestrator {
    runner: Arc<dyn ProcessRunner>,
    config: RenderConfig,
    profiles: Vec<RenderProfile>,
}

impl RenderOrchestrator {
    /// Orchestrator over the platform's effective profile chain.
    pub fn new(runner: Arc<dyn ProcessRunner>, config: RenderConfig) -> Self {
        let profiles = RenderProfile::effective_chain(&config);
        Self {
            runner,
            config,
            profiles,
        }
    }

    pub fn with_profiles(mut self, profiles: Vec<RenderProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn profiles(&self) -> &[RenderProfile] {
        &self.profiles
    }

    /// Try each profile in order until one exits zero.
    pub async fn render(&self, job: &RenderJob<'_>) -> Result<RenderOutcome> {
        let mut last = None;
        for (index, profile) in self.profiles.iter().enumerate() {
            match self.attempt(index, profile, job).await {
                AttemptResult::Success(attempt) => {
                    return Ok(RenderOutcome {
                        attempt,
                        attempts_made: index + 1,
                    })
                }
                AttemptResult::Failure(attempt) => last = Some(attempt),
            }
        }

        let Some(last) = last else {
            return Err(SceneError::RenderFailed {
                attempts: 0,
                profile: "none".to_string(),
                diagnostics: "no render profiles configured".to_string(),
            });
        };
        obs::emit_render_exhausted(self.profiles.len(), &last.profile_name);

        let diagnostics = last.diagnostics();
        match last.outcome {
            AttemptOutcome::TimedOut { after_secs } => Err(SceneError::RenderTimeout {
                profile: last.profile_name,
                timeout_secs: after_secs,
                diagnostics,
            }),
            _ => Err(SceneError::RenderFailed {
                attempts: self.profiles.len(),
                profile: last.profile_name,
                diagnostics,
            }),
        }
    }

    async fn attempt(
        &self,
        index: usize,
        profile: &RenderProfile,
        job: &RenderJob<'_>,
    ) -> AttemptResult {
        obs::emit_attempt_started(index, &profile.name);
        let invocation = self.invocation(profile, job);

        let (outcome, stdout, stderr, duration_ms) = match self.runner.run(&invocation).await {
            Ok(output) => {
                let outcome = match output.status {
                    ExitStatus::Exited(Some(0)) => AttemptOutcome::Succeeded,
                    ExitStatus::Exited(code) => AttemptOutcome::Failed { exit_code: code },
                    ExitStatus::TimedOut => AttemptOutcome::TimedOut {
                        after_secs: self.config.timeout_secs,
                    },
                };
                (outcome, output.stdout, output.stderr, output.duration_ms)
            }
            Err(e) => (
                AttemptOutcome::SpawnFailed {
                    reason: e.to_string(),
                },
                String::new(),
                String::new(),
                0,
            ),
        };

        let attempt = ExecutionAttempt {
            profile_index: index,
            profile_name: profile.name.clone(),
            command: invocation.command_line(),
            outcome,
            stdout,
            stderr,
            duration_ms,
        };
        obs::emit_attempt_finished(index, &profile.name, outcome_label(&attempt.outcome), duration_ms);

        if attempt.succeeded() {
            AttemptResult::Success(attempt)
        } else {
            AttemptResult::Failure(attempt)
        }
    }

    fn invocation(&self, profile: &RenderProfile, job: &RenderJob<'_>) -> Invocation {
        let mut invocation = Invocation::new(&self.config.program, self.config.timeout())
            .args(self.config.base_args.iter().cloned())
            .args(profile.args(job.script, job.scene, job.workspace))
            .cwd(job.workspace)
            .env("PYTHONIOENCODING", "utf-8")
            .env("MANIM_USE_FFMPEG_CACHE", "0");
        if self.config.constrained {
            let tmp = job.workspace.display().to_string();
            invocation = invocation
                .env("PYTHONLEGACYWINDOWSSTDIO", "1")
                .env("TEMP", tmp.clone())
                .env("TMP", tmp);
        }
        invocation
    }
}

fn outcome_label(outcome: &AttemptOutcome) -> &'static str {
    match outcome {
        AttemptOutcome::Succeeded => "succeeded",
        AttemptOutcome::Failed { .. } => "failed",
        AttemptOutcome::TimedOut { .. } => "timed_out",
        AttemptOutcome::SpawnFailed { .. } => "spawn_failed",
    }
}
