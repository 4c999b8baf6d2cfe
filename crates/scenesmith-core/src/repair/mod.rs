//! Syntax repair engine.
//!
//! A repair is an ordered list of independent [`RepairRule`]s, each a pure
//! text-to-text function that is a no-op when its trigger is absent. The
//! engine applies the whole list once per pass and stops after a pass that
//! changes nothing or after `max_passes`, whichever comes first. It does not
//! aim for full correctness; the structural validator decides what is
//! good enough to render.

pub mod rules;
pub mod scan;

mod remediate;

use serde::{Deserialize, Serialize};

use crate::domain::{RepairRecord, ValidationResult};
use crate::obs;

pub use remediate::force_fix;

/// A single repair transformation.
pub trait RepairRule: Send + Sync {
    /// Stable identifier used in repair records.
    fn id(&self) -> &'static str;

    /// Transform `text`; must return it unchanged when the rule does not apply.
    fn apply(&self, text: &str) -> String;
}

/// Knobs for building a [`RepairEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairOptions {
    /// The script narrates itself and needs a narration-capable scene base.
    #[serde(default)]
    pub narration: bool,

    /// Upper bound on full passes over the rule list.
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

fn default_max_passes() -> usize {
    2
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            narration: false,
            max_passes: default_max_passes(),
        }
    }
}

/// Repaired text plus the record of what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repaired {
    pub text: String,
    pub record: RepairRecord,
}

/// Applies the rule pipeline.
pub struct RepairEngine {
    rules: Vec<Box<dyn RepairRule>>,
    max_passes: usize,
}

impl Default for RepairEngine {
    fn default() -> Self {
        Self::new(RepairOptions::default())
    }
}

impl RepairEngine {
    pub fn new(options: RepairOptions) -> Self {
        Self::with_rules(rules::standard_rules(options.narration), options.max_passes)
    }

    /// Build an engine from an explicit rule list.
    pub fn with_rules(rules: Vec<Box<dyn RepairRule>>, max_passes: usize) -> Self {
        Self {
            rules,
            max_passes: max_passes.max(1),
        }
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Run every rule once, in order.
    pub fn repair_once(&self, text: &str, pass: usize, record: &mut RepairRecord) -> String {
        let mut current = text.to_string();
        for rule in &self.rules {
            let next = rule.apply(&current);
            if next != current {
                obs::emit_rule_applied(rule.id(), pass);
                record.push(rule.id(), pass, &current, &next);
                current = next;
            }
        }
        current
    }

    /// Run passes until one changes nothing, bounded by `max_passes`.
    pub fn repair(&self, text: &str) -> Repaired {
        let mut record = RepairRecord::default();
        let mut current = text.to_string();
        for pass in 1..=self.max_passes {
            record.passes = pass;
            let next = self.repair_once(&current, pass, &mut record);
            let settled = next == current;
            current = next;
            if settled {
                break;
            }
        }
        Repaired {
            text: current,
            record,
        }
    }

    /// One extra remediation pass aimed at a reported parse failure.
    ///
    /// Re-runs the pipeline, then forces a fix at the failing line.
    pub fn remediate(&self, text: &str, failure: &ValidationResult) -> Repaired {
        let mut repaired = self.repair(text);
        if let Some(line) = failure.line {
            let fixed = force_fix(&repaired.text, line);
            if fixed != repaired.text {
                let pass = repaired.record.passes + 1;
                obs::emit_rule_applied("remediation", pass);
                repaired.record.push("remediation", pass, &repaired.text, &fixed);
                repaired.text = fixed;
            }
        }
        repaired
    }
}
