//! Rules that rewrite individual call sites.
//!
//! All of them go through [`rewrite_calls`], so they only ever see calls whose
//! parentheses are matched, and never look inside strings or comments.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::repair::scan::{format_call, rewrite_calls, Arg, ArgKind, Call};
use crate::repair::RepairRule;

/// Default spacing for positioning calls, in scene units.
pub const DEFAULT_BUFF: &str = "0.5";

static STRING_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([rRuU]?)(?:"((?:[^"\\\n]|\\.)*)"|'((?:[^'\\\n]|\\.)*)')$"#)
        .expect("valid literal regex")
});

fn is_plain_call(call: &Call, names: &[&str]) -> bool {
    !call.is_method && !call.is_definition && names.contains(&call.name.as_str())
}

fn texts(args: &[Arg]) -> Vec<String> {
    args.iter().map(|a| a.text.clone()).collect()
}

// ---------------------------------------------------------------------------
// External resources
// ---------------------------------------------------------------------------

/// Replaces calls that load image or vector files with placeholder shapes.
///
/// Referenced asset files are not present in a render workspace.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceSubstitution;

impl ResourceSubstitution {
    fn placeholder(name: &str) -> Option<&'static str> {
        match name {
            "ImageMobject" => Some("Rectangle(width=4, height=3, color=BLUE)"),
            "SVGMobject" => Some("Square(side_length=2, color=WHITE)"),
            _ => None,
        }
    }
}

impl RepairRule for ResourceSubstitution {
    fn id(&self) -> &'static str {
        "resource-substitution"
    }

    fn apply(&self, text: &str) -> String {
        rewrite_calls(text, |call, _| {
            if call.is_method || call.is_definition {
                return None;
            }
            Self::placeholder(&call.name).map(str::to_string)
        })
    }
}

// ---------------------------------------------------------------------------
// Typesetting
// ---------------------------------------------------------------------------

/// Downgrades typeset-math primitives to plain text.
#[derive(Debug, Default, Clone, Copy)]
pub struct TexDowngrade;

const TEX_CALLS: &[&str] = &["Tex", "MathTex", "SingleStringMathTex", "TexText"];
const TEX_ONLY_KWARGS: &[&str] = &[
    "tex_template",
    "tex_environment",
    "arg_separator",
    "substrings_to_isolate",
    "organize_left_to_right",
];

impl TexDowngrade {
    /// Merge positional parts into the single text argument.
    fn merge_parts(parts: &[&Arg]) -> Option<String> {
        match parts {
            [] => None,
            [only] => Some(only.text.clone()),
            _ => {
                let literals: Option<Vec<(String, String)>> = parts
                    .iter()
                    .map(|a| {
                        STRING_LITERAL_RE.captures(&a.text).map(|c| {
                            let body = c.get(2).or_else(|| c.get(3)).map_or("", |m| m.as_str());
                            (c[1].to_ascii_lowercase(), body.to_string())
                        })
                    })
                    .collect();
                match literals {
                    Some(lits)
                        if lits.iter().all(|(p, b)| p == &lits[0].0 && !b.contains('"')) =>
                    {
                        let body: Vec<&str> = lits.iter().map(|(_, b)| b.as_str()).collect();
                        Some(format!("{}\"{}\"", lits[0].0, body.join(" ")))
                    }
                    _ => {
                        let exprs: Vec<&str> = parts.iter().map(|a| a.text.as_str()).collect();
                        Some(format!("\" \".join([{}])", exprs.join(", ")))
                    }
                }
            }
        }
    }
}

impl RepairRule for TexDowngrade {
    fn id(&self) -> &'static str {
        "tex-downgrade"
    }

    fn apply(&self, text: &str) -> String {
        rewrite_calls(text, |call, args| {
            if !is_plain_call(call, TEX_CALLS) {
                return None;
            }
            let positional: Vec<&Arg> =
                args.iter().filter(|a| matches!(a.kind, ArgKind::Positional)).collect();
            let mut out: Vec<String> = Self::merge_parts(&positional).into_iter().collect();
            for arg in args {
                match &arg.kind {
                    ArgKind::Positional => {}
                    ArgKind::Keyword(name) if TEX_ONLY_KWARGS.contains(&name.as_str()) => {}
                    ArgKind::Keyword(name) if name == "tex_to_color_map" => {
                        out.push(format!("t2c={}", arg.value()));
                    }
                    _ => out.push(arg.text.clone()),
                }
            }
            Some(format_call("Text", &out))
        })
    }
}

// ---------------------------------------------------------------------------
// Renamed and migrated parameters
// ---------------------------------------------------------------------------

/// Renames keyword arguments whose name changed in the engine's API.
#[derive(Debug, Clone)]
pub struct KeywordRename {
    /// (call, old keyword, new keyword)
    pub renames: Vec<(&'static str, &'static str, &'static str)>,
}

impl Default for KeywordRename {
    fn default() -> Self {
        Self {
            renames: vec![("Code", "code", "code_string")],
        }
    }
}

impl RepairRule for KeywordRename {
    fn id(&self) -> &'static str {
        "keyword-rename"
    }

    fn apply(&self, text: &str) -> String {
        rewrite_calls(text, |call, args| {
            if call.is_method || call.is_definition {
                return None;
            }
            let renames: Vec<_> = self.renames.iter().filter(|r| r.0 == call.name).collect();
            if renames.is_empty() {
                return None;
            }
            let mut changed = false;
            let out: Vec<String> = args
                .iter()
                .map(|arg| match renames.iter().find(|r| Some(r.1) == arg.keyword()) {
                    Some(r) => {
                        changed = true;
                        format!("{}={}", r.2, arg.value())
                    }
                    None => arg.text.clone(),
                })
                .collect();
            changed.then(|| format_call(&call.name, &out))
        })
    }
}

/// A deprecated min/max keyword pair folded into one range tuple.
#[derive(Debug, Clone)]
pub struct RangeMigration {
    pub call: &'static str,
    pub min: &'static str,
    pub max: &'static str,
    pub range: &'static str,
    pub default_min: &'static str,
    pub default_max: &'static str,
}

/// Rewrites `x_min=a, x_max=b` style pairs into `x_range=(a, b)`, filling a
/// missing bound with its default.
#[derive(Debug, Clone)]
pub struct ParameterMigration {
    pub migrations: Vec<RangeMigration>,
}

impl Default for ParameterMigration {
    fn default() -> Self {
        Self {
            migrations: vec![
                RangeMigration {
                    call: "FunctionGraph",
                    min: "x_min",
                    max: "x_max",
                    range: "x_range",
                    default_min: "-10",
                    default_max: "10",
                },
                RangeMigration {
                    call: "ParametricFunction",
                    min: "t_min",
                    max: "t_max",
                    range: "t_range",
                    default_min: "0",
                    default_max: "1",
                },
            ],
        }
    }
}

impl RepairRule for ParameterMigration {
    fn id(&self) -> &'static str {
        "parameter-migration"
    }

    fn apply(&self, text: &str) -> String {
        rewrite_calls(text, |call, args| {
            if call.is_method || call.is_definition {
                return None;
            }
            let m = self.migrations.iter().find(|m| m.call == call.name)?;
            let min = args.iter().find(|a| a.keyword() == Some(m.min));
            let max = args.iter().find(|a| a.keyword() == Some(m.max));
            if min.is_none() && max.is_none() {
                return None;
            }
            let has_range = args.iter().any(|a| a.keyword() == Some(m.range));
            let range = format!(
                "{}=({}, {})",
                m.range,
                min.map_or(m.default_min, |a| a.value()),
                max.map_or(m.default_max, |a| a.value()),
            );

            let mut out = Vec::with_capacity(args.len());
            let mut placed = has_range;
            for arg in args {
                let k = arg.keyword();
                if k == Some(m.min) || k == Some(m.max) {
                    if !placed {
                        out.push(range.clone());
                        placed = true;
                    }
                    continue;
                }
                out.push(arg.text.clone());
            }
            Some(format_call(&call.name, &out))
        })
    }
}

// ---------------------------------------------------------------------------
// Elision and deduplication
// ---------------------------------------------------------------------------

/// Strips parameters the target calls do not accept.
#[derive(Debug, Clone)]
pub struct ParameterElision {
    /// (call, parameter)
    pub pairs: Vec<(String, String)>,
}

const ARROW_RATIOS: &[&str] = &[
    "buff",
    "max_tip_length_to_total_length_ratio",
    "max_stroke_width_to_length_ratio",
    "tip_length_to_length_ratio",
    "max_tip_length_to_width_ratio",
    "max_stroke_width_to_height_ratio",
];

impl Default for ParameterElision {
    fn default() -> Self {
        let mut pairs = vec![("Circle".to_string(), "buff".to_string())];
        for call in ["Arrow", "CurvedArrow"] {
            pairs.extend(ARROW_RATIOS.iter().map(|p| (call.to_string(), p.to_string())));
        }
        for param in ["insert_line_no", "background_stroke_width", "background_stroke_color"] {
            pairs.push(("Code".to_string(), param.to_string()));
        }
        Self { pairs }
    }
}

impl ParameterElision {
    pub fn with_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    fn elided(&self, call: &str, param: &str) -> bool {
        self.pairs.iter().any(|(c, p)| c == call && p == param)
    }
}

impl RepairRule for ParameterElision {
    fn id(&self) -> &'static str {
        "parameter-elision"
    }

    fn apply(&self, text: &str) -> String {
        rewrite_calls(text, |call, args| {
            if call.is_method || call.is_definition {
                return None;
            }
            let kept: Vec<String> = args
                .iter()
                .filter(|a| !a.keyword().is_some_and(|k| self.elided(&call.name, k)))
                .map(|a| a.text.clone())
                .collect();
            (kept.len() != args.len()).then(|| format_call(&call.name, &kept))
        })
    }
}

/// Keeps only the first occurrence of a repeated keyword argument.
#[derive(Debug, Default, Clone, Copy)]
pub struct DuplicateKeywords;

impl RepairRule for DuplicateKeywords {
    fn id(&self) -> &'static str {
        "duplicate-keywords"
    }

    fn apply(&self, text: &str) -> String {
        rewrite_calls(text, |call, args| {
            if call.is_definition {
                return None;
            }
            let mut seen = HashSet::new();
            let kept: Vec<String> = args
                .iter()
                .filter(|a| a.keyword().map_or(true, |k| seen.insert(k.to_string())))
                .map(|a| a.text.clone())
                .collect();
            (kept.len() != args.len()).then(|| format_call(&call.name, &kept))
        })
    }
}

// ---------------------------------------------------------------------------
// Argument order
// ---------------------------------------------------------------------------

/// Moves positional arguments ahead of keyword arguments.
///
/// The partition is stable within each group. Only `name=value` binds by
/// keyword; a positional argument containing a bare `=` (a lambda default,
/// for instance) stays positional and is logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArgumentOrder;

impl ArgumentOrder {
    fn misordered(args: &[Arg]) -> bool {
        let mut keyword_seen = false;
        let mut unpack_seen = false;
        for arg in args {
            match arg.kind {
                ArgKind::Positional if keyword_seen => return true,
                ArgKind::Star if unpack_seen => return true,
                ArgKind::Keyword(_) => keyword_seen = true,
                ArgKind::DoubleStar => {
                    keyword_seen = true;
                    unpack_seen = true;
                }
                _ => {}
            }
        }
        false
    }
}

impl RepairRule for ArgumentOrder {
    fn id(&self) -> &'static str {
        "argument-order"
    }

    fn apply(&self, text: &str) -> String {
        rewrite_calls(text, |call, args| {
            if call.is_definition {
                return None;
            }
            for arg in args.iter().filter(|a| a.has_ambiguous_equals()) {
                debug!(call = %call.name, arg = %arg.text, "positional argument contains '='; left positional");
            }
            if !Self::misordered(args) {
                return None;
            }
            let (keywords, positional): (Vec<&Arg>, Vec<&Arg>) =
                args.iter().partition(|a| a.is_keyword_like());
            let out: Vec<String> = positional
                .into_iter()
                .chain(keywords)
                .map(|a| a.text.clone())
                .collect();
            Some(format_call(&call.name, &out))
        })
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Adds a default `buff` to positioning calls that lack one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutBuffer;

impl LayoutBuffer {
    /// Number of positional parameters preceding `buff` in each method.
    fn buff_position(name: &str) -> Option<usize> {
        match name {
            "next_to" => Some(2),
            "to_edge" | "to_corner" | "arrange" => Some(1),
            _ => None,
        }
    }
}

impl RepairRule for LayoutBuffer {
    fn id(&self) -> &'static str {
        "layout-buffer"
    }

    fn apply(&self, text: &str) -> String {
        rewrite_calls(text, |call, args| {
            if !call.is_method {
                return None;
            }
            let position = Self::buff_position(&call.name)?;
            if call.name == "next_to" && args.is_empty() {
                return None;
            }
            let positional = args.iter().filter(|a| a.kind == ArgKind::Positional).count();
            let opaque = args
                .iter()
                .any(|a| matches!(a.kind, ArgKind::Star | ArgKind::DoubleStar));
            if opaque || positional > position || args.iter().any(|a| a.keyword() == Some("buff")) {
                return None;
            }
            let mut out = texts(args);
            out.push(format!("buff={DEFAULT_BUFF}"));
            Some(format_call(&call.name, &out))
        })
    }
}
