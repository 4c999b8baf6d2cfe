//! Statement-structure rules: empty blocks, imports, the scene scaffold and
//! the narration-capable base class.

use std::sync::LazyLock;

use regex::Regex;

use crate::repair::scan::{apply_insertions, indent_width, replace_in_code, Class, Scan};
use crate::repair::RepairRule;

/// Class name used when a script has no scene class at all.
pub const SCAFFOLD_CLASS: &str = "GeneratedScene";

const BLOCK_HEADERS: &[&str] = &[
    "if", "elif", "else", "for", "while", "def", "class", "with", "try", "except", "finally",
    "async",
];

static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^class\s+[A-Za-z_]\w*").expect("valid class regex"));

static CONSTRUCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^def\s+construct\s*\(").expect("valid construct regex"));

static MANIM_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:from\s+manim\s+import\b|import\s+manim\b)").expect("valid manim import regex")
});

static PLAIN_SCENE_BASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*class\s+\w+\s*\(\s*)Scene(\s*\)\s*:)").expect("valid scene base regex")
});

static VOICEOVER_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*class\s+\w+\s*\([^)]*\bVoiceoverScene\b").expect("valid voiceover class regex")
});

static VOICEOVER_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*from\s+manim_voiceover\s+import\s+.*\bVoiceoverScene\b")
        .expect("valid voiceover import regex")
});

static GTTS_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*from\s+manim_voiceover\.services\.gtts\s+import\s+.*\bGTTSService\b")
        .expect("valid gtts import regex")
});

static CONSTRUCT_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*)def\s+construct\s*\(\s*self\b[^\n]*$").expect("valid construct header regex")
});

fn is_import_line(line: &str) -> bool {
    line.starts_with("import ") || line.starts_with("from ")
}

/// Byte offset of the line where new top-level imports belong: the first
/// top-level import, after any `__future__` imports.
fn import_insertion_point(text: &str) -> usize {
    let scan = Scan::new(text);
    let mut first_import = None;
    let mut after_future = None;
    for (start, end) in scan.lines() {
        if !scan.is_code(start) {
            continue;
        }
        let line = &text[start..end];
        if !is_import_line(line) {
            continue;
        }
        if line.starts_with("from __future__") {
            after_future = Some((end + 1).min(text.len()));
        } else if first_import.is_none() {
            first_import = Some(start);
        }
    }
    after_future.or(first_import).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Empty blocks
// ---------------------------------------------------------------------------

/// Gives block headers with no indented body a `pass` statement.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockIndentation;

impl RepairRule for BlockIndentation {
    fn id(&self) -> &'static str {
        "block-indentation"
    }

    fn apply(&self, text: &str) -> String {
        let scan = Scan::new(text);
        let b = text.as_bytes();
        let lines = scan.lines();
        let mut inserts = Vec::new();
        let mut depth = 0i32;
        let mut header: Option<(usize, bool)> = None;

        let significant = |(start, end): (usize, usize)| {
            scan.first_significant(start, end)
                .filter(|first| scan.class(*first) != Class::Comment)
        };

        for (idx, &(start, end)) in lines.iter().enumerate() {
            let Some(first) = significant((start, end)) else {
                continue;
            };
            if depth == 0 && !scan.continues_string(first) {
                let word: String = text[first..end]
                    .chars()
                    .take_while(|c| c.is_ascii_alphabetic())
                    .collect();
                header = Some((indent_width(&text[start..end]), BLOCK_HEADERS.contains(&word.as_str())));
            }
            for i in first..end {
                if !scan.is_code(i) {
                    continue;
                }
                match b[i] {
                    b'(' | b'[' | b'{' => depth += 1,
                    b')' | b']' | b'}' => depth -= 1,
                    _ => {}
                }
            }
            if depth != 0 {
                continue;
            }
            let Some((indent, true)) = header else {
                continue;
            };
            let Some(last) = scan.last_code_end(start, end) else {
                continue;
            };
            if b[last - 1] != b':' || !scan.is_code(last - 1) {
                continue;
            }
            let next_indent = lines[idx + 1..]
                .iter()
                .find(|l| significant(**l).is_some())
                .map(|&(s, e)| indent_width(&text[s..e]));
            if next_indent.map_or(true, |n| n <= indent) {
                inserts.push((end, format!("\n{}pass", " ".repeat(indent + 4))));
            }
        }
        apply_insertions(text, inserts)
    }
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

struct ImportSpec {
    /// Capture group 1 marks the use site.
    usage: Regex,
    present: Regex,
    statement: &'static str,
}

static IMPORTS: LazyLock<Vec<ImportSpec>> = LazyLock::new(|| {
    let spec = |usage: &str, present: &str, statement| ImportSpec {
        usage: Regex::new(usage).expect("valid usage regex"),
        present: Regex::new(present).expect("valid import regex"),
        statement,
    };
    vec![
        spec(
            r"(?m)^(class)\s+\w+\s*\([^)]*\b(?:Scene|ThreeDScene|MovingCameraScene|ZoomedScene)\b",
            r"(?m)^\s*(?:from\s+manim\s+import\b|import\s+manim\b)",
            "from manim import *",
        ),
        spec(
            r"(?:^|[^.\w])(random)\.\w",
            r"(?m)^\s*(?:import\s+(?:[\w.]+\s*,\s*)*random\b|from\s+random\s+import\b)",
            "import random",
        ),
        spec(
            r"(?:^|[^.\w])(math)\.\w",
            r"(?m)^\s*import\s+(?:[\w.]+\s*,\s*)*math\b",
            "import math",
        ),
        spec(
            r"(?:^|[^.\w])(np)\.\w",
            r"(?m)^\s*import\s+numpy\s+as\s+np\b",
            "import numpy as np",
        ),
    ]
});

/// Imports standard utilities the script uses without importing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportInjection;

impl RepairRule for ImportInjection {
    fn id(&self) -> &'static str {
        "import-injection"
    }

    fn apply(&self, text: &str) -> String {
        let scan = Scan::new(text);
        let missing: Vec<&str> = IMPORTS
            .iter()
            .filter(|spec| !spec.present.is_match(text))
            .filter(|spec| {
                spec.usage
                    .captures_iter(text)
                    .filter_map(|c| c.get(1))
                    .any(|m| scan.is_code(m.start()))
            })
            .map(|spec| spec.statement)
            .collect();
        if missing.is_empty() {
            return text.to_string();
        }
        let block: String = missing.iter().map(|s| format!("{s}\n")).collect();
        apply_insertions(text, vec![(import_insertion_point(text), block)])
    }
}

// ---------------------------------------------------------------------------
// Scaffold
// ---------------------------------------------------------------------------

/// Wraps a script with no top-level class in a default scene.
#[derive(Debug, Default, Clone, Copy)]
pub struct SceneScaffold;

impl RepairRule for SceneScaffold {
    fn id(&self) -> &'static str {
        "scene-scaffold"
    }

    fn apply(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }
        let scan = Scan::new(text);
        if CLASS_RE.find_iter(text).any(|m| scan.is_code(m.start())) {
            return text.to_string();
        }

        let mut imports: Vec<&str> = Vec::new();
        let mut body: Vec<(bool, &str)> = Vec::new();
        let mut depth = 0i32;
        let mut in_import = false;
        let b = text.as_bytes();

        for (start, end) in scan.lines() {
            let line = &text[start..end];
            let continues = start > 0 && scan.class(start) == Class::Str && scan.class(start - 1) == Class::Str;
            if depth == 0 {
                in_import = scan.is_code(start) && is_import_line(line);
            }
            for i in start..end {
                if scan.is_code(i) {
                    match b[i] {
                        b'(' | b'[' | b'{' => depth += 1,
                        b')' | b']' | b'}' => depth -= 1,
                        _ => {}
                    }
                }
            }
            if in_import {
                imports.push(line);
            } else {
                body.push((continues, line));
            }
        }

        let has_construct = body.iter().any(|(c, l)| !c && CONSTRUCT_RE.is_match(l));
        let indent = if has_construct { "    " } else { "        " };

        while body.first().is_some_and(|(_, l)| l.trim().is_empty()) {
            body.remove(0);
        }
        while body.last().is_some_and(|(_, l)| l.trim().is_empty()) {
            body.pop();
        }

        let mut out = String::new();
        if !imports.iter().any(|l| MANIM_IMPORT_RE.is_match(l)) {
            out.push_str("from manim import *\n");
        }
        for line in &imports {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&format!("\n\nclass {SCAFFOLD_CLASS}(Scene):\n"));
        if !has_construct {
            out.push_str("    def construct(self):\n");
        }
        if body.is_empty() {
            out.push_str(indent);
            out.push_str("pass\n");
        }
        for (continues, line) in body {
            if !continues && !line.trim().is_empty() {
                out.push_str(indent);
            }
            out.push_str(if continues { line } else { line.trim_end() });
            out.push('\n');
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Narration
// ---------------------------------------------------------------------------

/// Swaps a plain scene base for the narration-capable one and wires up the
/// speech service.
#[derive(Debug, Default, Clone, Copy)]
pub struct NarrationUpgrade;

impl NarrationUpgrade {
    fn insert_after_manim_import(text: &str, line: &str) -> String {
        let scan = Scan::new(text);
        let pos = MANIM_IMPORT_RE
            .find_iter(text)
            .find(|m| scan.is_code(m.end().saturating_sub(1)))
            .map(|m| text[m.end()..].find('\n').map_or(text.len(), |p| m.end() + p + 1))
            .unwrap_or_else(|| import_insertion_point(text));
        let mut block = format!("{line}\n");
        if pos == text.len() && !text.ends_with('\n') && !text.is_empty() {
            block = format!("\n{line}");
        }
        apply_insertions(text, vec![(pos, block)])
    }
}

impl RepairRule for NarrationUpgrade {
    fn id(&self) -> &'static str {
        "narration-upgrade"
    }

    fn apply(&self, text: &str) -> String {
        let mut out = replace_in_code(text, &PLAIN_SCENE_BASE_RE, |caps| {
            Some(format!("{}VoiceoverScene{}", &caps[1], &caps[2]))
        });
        if !VOICEOVER_CLASS_RE.is_match(&out) {
            return out;
        }

        if !out.contains("set_speech_service(") {
            if let Some(caps) = CONSTRUCT_HEADER_RE.captures(&out) {
                let (indent, end) = match (caps.get(1), caps.get(0)) {
                    (Some(i), Some(m)) => (i.as_str().to_string(), m.end()),
                    _ => return out,
                };
                let call = format!("\n{indent}    self.set_speech_service(GTTSService())");
                out.insert_str(end, &call);
            }
        }

        if out.contains("GTTSService(") && !GTTS_IMPORT_RE.is_match(&out) {
            out = Self::insert_after_manim_import(
                &out,
                "from manim_voiceover.services.gtts import GTTSService",
            );
        }
        if !VOICEOVER_IMPORT_RE.is_match(&out) {
            out = Self::insert_after_manim_import(&out, "from manim_voiceover import VoiceoverScene");
        }
        out
    }
}
