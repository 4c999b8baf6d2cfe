//! Line- and token-level rules.

use std::sync::LazyLock;

use regex::Regex;

use crate::repair::scan::{replace_in_code, Class, Scan};
use crate::repair::RepairRule;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```").expect("valid fence regex"));

static COLOR_SHADE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(BLUE|RED|GREEN|YELLOW|GOLD|TEAL|MAROON|PURPLE|GREY|GRAY)_([A-E])\b")
        .expect("valid color regex")
});

static COLOR_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*from\s+manim\.utils\.color\s+import").expect("valid color import regex")
});

static FONT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bfont\s*=\s*("[^"\n]*"|'[^'\n]*')"#).expect("valid font regex")
});

static FONT_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfont_size\s*=\s*(\d+(?:\.\d*)?)\b").expect("valid font size regex")
});

/// Phrases that mark a line as conversational text rather than code.
const PROSE_INDICATORS: &[&str] = &[
    "would you like me to",
    "do you want",
    "i'm sorry",
    "i can only provide",
    "i can help you",
    "here is the code",
    "here's the code",
    "this is the code",
];

/// Removes markdown code fences.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownFence;

impl RepairRule for MarkdownFence {
    fn id(&self) -> &'static str {
        "markdown-fence"
    }

    fn apply(&self, text: &str) -> String {
        if !text.contains("```") {
            return text.to_string();
        }
        retain_lines(text, |_, line| !FENCE_RE.is_match(line))
    }
}

/// Removes conversational lines that carry no code punctuation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProseLines;

impl RepairRule for ProseLines {
    fn id(&self) -> &'static str {
        "prose-lines"
    }

    fn apply(&self, text: &str) -> String {
        let scan = Scan::new(text);
        retain_lines(text, |start, line| {
            let lower = line.to_lowercase();
            if !PROSE_INDICATORS.iter().any(|p| lower.contains(p)) {
                return true;
            }
            let offset = line.len() - line.trim_start().len();
            let in_code = scan.class(start + offset) == Class::Code
                && !scan.continues_string(start + offset);
            let looks_like_code = line.contains(['(', ')', '=', '"', '[', '#']);
            !in_code || looks_like_code
        })
    }
}

/// Collapses color shade aliases (`BLUE_C`, `RED_A`) to their base color
/// unless the script imports the color module explicitly.
#[derive(Debug, Default, Clone, Copy)]
pub struct ColorAlias;

impl RepairRule for ColorAlias {
    fn id(&self) -> &'static str {
        "color-alias"
    }

    fn apply(&self, text: &str) -> String {
        let explicit = COLOR_IMPORT_RE.is_match(text);
        replace_in_code(text, &COLOR_SHADE_RE, |caps| {
            let shade = &caps[2];
            (!explicit || shade == "C").then(|| caps[1].to_string())
        })
    }
}

/// Replaces custom font families with one that is always installed.
#[derive(Debug, Clone)]
pub struct FontFamily {
    pub family: String,
}

impl Default for FontFamily {
    fn default() -> Self {
        Self {
            family: "Sans".to_string(),
        }
    }
}

impl RepairRule for FontFamily {
    fn id(&self) -> &'static str {
        "font-family"
    }

    fn apply(&self, text: &str) -> String {
        let wanted = format!("font=\"{}\"", self.family);
        replace_in_code(text, &FONT_RE, |caps| {
            let value = &caps[1];
            let current = &value[1..value.len() - 1];
            (current != self.family).then(|| wanted.clone())
        })
    }
}

/// Raises explicit font sizes below a readability floor.
#[derive(Debug, Clone, Copy)]
pub struct FontSizeFloor {
    pub floor: u32,
}

impl Default for FontSizeFloor {
    fn default() -> Self {
        Self { floor: 24 }
    }
}

impl RepairRule for FontSizeFloor {
    fn id(&self) -> &'static str {
        "font-size-floor"
    }

    fn apply(&self, text: &str) -> String {
        replace_in_code(text, &FONT_SIZE_RE, |caps| {
            let size: f64 = caps[1].parse().ok()?;
            (size < f64::from(self.floor)).then(|| format!("font_size={}", self.floor))
        })
    }
}

/// Keep lines for which `keep(line_start, line)` holds.
fn retain_lines<F>(text: &str, mut keep: F) -> String
where
    F: FnMut(usize, &str) -> bool,
{
    let mut out = String::with_capacity(text.len());
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        if keep(start, content) {
            out.push_str(line);
        }
        start += line.len();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fences_removed() {
        let src = "Here you go:\n```python\nx = 1\n```\n";
        assert_eq!(MarkdownFence.apply(src), "Here you go:\nx = 1\n");
    }

    #[test]
    fn test_prose_lines_removed() {
        let src = "Here is the code for your animation:\nfrom manim import *\nWould you like me to add more?\n";
        assert_eq!(ProseLines.apply(src), "from manim import *\n");
    }

    #[test]
    fn test_prose_rule_keeps_code_and_strings() {
        let src = "t = Text(\"Here is the code\")\n# here is the code\n";
        assert_eq!(ProseLines.apply(src), src);
        let doc = "s = \"\"\"\nhere is the code\n\"\"\"\n";
        assert_eq!(ProseLines.apply(doc), doc);
    }

    #[test]
    fn test_color_alias() {
        let src = "c = Circle(color=BLUE_C)\nd = Dot(color=RED_E)\nt = Text('BLUE_C')";
        assert_eq!(
            ColorAlias.apply(src),
            "c = Circle(color=BLUE)\nd = Dot(color=RED)\nt = Text('BLUE_C')"
        );
    }

    #[test]
    fn test_color_alias_respects_explicit_import() {
        let src = "from manim.utils.color import BLUE_E\nd = Dot(color=BLUE_E, fill_color=RED_C)";
        assert_eq!(
            ColorAlias.apply(src),
            "from manim.utils.color import BLUE_E\nd = Dot(color=BLUE_E, fill_color=RED)"
        );
    }

    #[test]
    fn test_font_family() {
        let src = "Text('hi', font='Comic Sans MS')\nText('x', font=\"Sans\")";
        assert_eq!(
            FontFamily::default().apply(src),
            "Text('hi', font=\"Sans\")\nText('x', font=\"Sans\")"
        );
    }

    #[test]
    fn test_font_size_floor() {
        let rule = FontSizeFloor::default();
        assert_eq!(
            rule.apply("Text('a', font_size=12)\nText('b', font_size=36)\nText('c', font_size = 20.5)"),
            "Text('a', font_size=24)\nText('b', font_size=36)\nText('c', font_size=24)"
        );
        assert_eq!(rule.apply("font_size=24"), "font_size=24");
    }

    #[test]
    fn test_text_rules_noop_when_absent() {
        let src = "class A(Scene):\n    def construct(self):\n        self.wait()\n";
        assert_eq!(MarkdownFence.apply(src), src);
        assert_eq!(ProseLines.apply(src), src);
        assert_eq!(ColorAlias.apply(src), src);
        assert_eq!(FontFamily::default().apply(src), src);
        assert_eq!(FontSizeFloor::default().apply(src), src);
    }
}
