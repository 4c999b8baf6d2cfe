//! Diagnostics trail of the repair engine.

use serde::{Deserialize, Serialize};

const SNIPPET_LIMIT: usize = 400;

/// A single rule application that changed the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairStep {
    pub rule: String,
    pub pass: usize,
    pub before: String,
    pub after: String,
}

/// Ordered list of rule applications made while repairing one script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRecord {
    pub steps: Vec<RepairStep>,
    pub passes: usize,
}

impl RepairRecord {
    /// Record that `rule` turned `before` into `after`, keeping only the
    /// lines that differ.
    pub fn push(&mut self, rule: &str, pass: usize, before: &str, after: &str) {
        let (b, a) = changed_region(before, after);
        self.steps.push(RepairStep {
            rule: rule.to_string(),
            pass,
            before: truncate(b),
            after: truncate(a),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Rule ids in application order.
    pub fn rules(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.rule.as_str()).collect()
    }

    pub fn extend(&mut self, other: RepairRecord) {
        self.steps.extend(other.steps);
        self.passes += other.passes;
    }
}

fn changed_region(before: &str, after: &str) -> (String, String) {
    let b: Vec<&str> = before.lines().collect();
    let a: Vec<&str> = after.lines().collect();

    let prefix = b.iter().zip(&a).take_while(|(x, y)| x == y).count();
    let max_suffix = b.len().min(a.len()) - prefix;
    let suffix = b
        .iter()
        .rev()
        .zip(a.iter().rev())
        .take(max_suffix)
        .take_while(|(x, y)| x == y)
        .count();

    (
        b[prefix..b.len() - suffix].join("\n"),
        a[prefix..a.len() - suffix].join("\n"),
    )
}

fn truncate(s: String) -> String {
    if s.len() <= SNIPPET_LIMIT {
        return s;
    }
    let mut end = SNIPPET_LIMIT;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_only_changed_lines() {
        let mut record = RepairRecord::default();
        record.push(
            "font-size-floor",
            1,
            "a = 1\nt = Text('x', font_size=10)\nb = 2",
            "a = 1\nt = Text('x', font_size=24)\nb = 2",
        );
        let step = &record.steps[0];
        assert_eq!(step.before, "t = Text('x', font_size=10)");
        assert_eq!(step.after, "t = Text('x', font_size=24)");
        assert_eq!(record.rules(), vec!["font-size-floor"]);
    }

    #[test]
    fn test_inserted_line_has_empty_before() {
        let mut record = RepairRecord::default();
        record.push("import-injection", 1, "x = random.random()", "import random\nx = random.random()");
        assert_eq!(record.steps[0].before, "");
        assert_eq!(record.steps[0].after, "import random");
    }

    #[test]
    fn test_long_snippets_truncated() {
        let mut record = RepairRecord::default();
        let long = "y".repeat(1000);
        record.push("r", 1, "", &long);
        assert!(record.steps[0].after.len() <= SNIPPET_LIMIT + 3);
        assert!(record.steps[0].after.ends_with("..."));
    }
}
