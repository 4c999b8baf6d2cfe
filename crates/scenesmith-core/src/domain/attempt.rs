//! Record of one render-engine invocation.

use serde::{Deserialize, Serialize};

const DIAGNOSTIC_TAIL: usize = 4000;

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed { exit_code: Option<i32> },
    TimedOut { after_secs: u64 },
    SpawnFailed { reason: String },
}

/// One invocation of the render engine under a single profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    /// Position of the profile in the fallback chain.
    pub profile_index: usize,
    pub profile_name: String,
    pub command: Vec<String>,
    pub outcome: AttemptOutcome,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ExecutionAttempt {
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Succeeded
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::TimedOut { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.outcome {
            AttemptOutcome::Succeeded => Some(0),
            AttemptOutcome::Failed { exit_code } => exit_code,
            _ => None,
        }
    }

    /// The most useful captured output: stderr, else stdout, else the
    /// failure reason. Long output keeps only its tail.
    pub fn diagnostics(&self) -> String {
        let text = if !self.stderr.trim().is_empty() {
            self.stderr.trim()
        } else if !self.stdout.trim().is_empty() {
            self.stdout.trim()
        } else {
            return match &self.outcome {
                AttemptOutcome::Succeeded => String::new(),
                AttemptOutcome::Failed { exit_code } => match exit_code {
                    Some(code) => format!("exit code {code}"),
                    None => "terminated by signal".to_string(),
                },
                AttemptOutcome::TimedOut { after_secs } => {
                    format!("no output before timeout after {after_secs}s")
                }
                AttemptOutcome::SpawnFailed { reason } => reason.clone(),
            };
        };
        tail(text, DIAGNOSTIC_TAIL).to_string()
    }
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
