//! String- and comment-aware scanning of scene scripts.
//!
//! Rules never touch text inside string literals or comments. [`Scan`]
//! classifies every byte of a script once, pairs brackets, and finds call
//! sites with their top-level argument lists so that rules can rewrite calls
//! without a full parse (the input is usually not parseable yet).

use regex::{Captures, Regex};

/// Lexical class of a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Code,
    Str,
    Comment,
}

/// Words that may precede `(` without forming a call.
const NON_CALL_WORDS: &[&str] = &[
    "and", "as", "assert", "await", "del", "elif", "else", "except", "for", "from", "if", "import",
    "in", "is", "lambda", "not", "or", "raise", "return", "while", "with", "yield",
];

/// Classified view of one script.
#[derive(Debug, Clone)]
pub struct Scan {
    src: String,
    classes: Vec<Class>,
    /// Opener byte index -> matching closer byte index.
    pairs: Vec<Option<usize>>,
    /// Single-line strings still open at a line end: (line end index, quote).
    pub unterminated: Vec<(usize, char)>,
    /// Delimiter of a triple-quoted string left open at end of input.
    pub open_triple: Option<&'static str>,
}

/// A call site (or a `def`/`class` header) found in code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub name_start: usize,
    pub open: usize,
    pub close: Option<usize>,
    /// Preceded by `.`, e.g. `mob.next_to(...)`.
    pub is_method: bool,
    /// A `def name(` or `class Name(` header rather than a call.
    pub is_definition: bool,
}

/// How an argument binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgKind {
    Positional,
    /// `*iterable`
    Star,
    /// `name=value`
    Keyword(String),
    /// `**mapping`
    DoubleStar,
}

/// One top-level argument of a call, comments removed and trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub text: String,
    pub kind: ArgKind,
}

impl Arg {
    pub fn parse(text: &str) -> Self {
        let text = text.trim().to_string();
        let kind = classify(&text);
        Self { text, kind }
    }

    pub fn keyword(&self) -> Option<&str> {
        match &self.kind {
            ArgKind::Keyword(name) => Some(name),
            _ => None,
        }
    }

    /// Right-hand side of a keyword argument.
    pub fn value(&self) -> &str {
        match self.kind {
            ArgKind::Keyword(_) => self
                .text
                .split_once('=')
                .map(|(_, v)| v.trim())
                .unwrap_or(""),
            _ => &self.text,
        }
    }

    pub fn is_keyword_like(&self) -> bool {
        matches!(self.kind, ArgKind::Keyword(_) | ArgKind::DoubleStar)
    }

    /// Whether a positional argument has a bare top-level `=`, which makes
    /// its binding ambiguous (`lambda x=1: x`, walrus-free defaults, ...).
    pub fn has_ambiguous_equals(&self) -> bool {
        self.kind == ArgKind::Positional && top_level_assignment(&self.text).is_some()
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Strictly `identifier = value` (not `==`) binds by keyword.
fn classify(text: &str) -> ArgKind {
    if text.starts_with("**") {
        return ArgKind::DoubleStar;
    }
    if text.starts_with('*') {
        return ArgKind::Star;
    }
    let bytes = text.as_bytes();
    let ident_len = bytes.iter().take_while(|b| is_ident_byte(**b)).count();
    if ident_len == 0 || bytes[0].is_ascii_digit() {
        return ArgKind::Positional;
    }
    let rest = text[ident_len..].trim_start();
    if rest.starts_with('=') && !rest.starts_with("==") {
        return ArgKind::Keyword(text[..ident_len].to_string());
    }
    ArgKind::Positional
}

/// Byte index of a top-level `=` that is an assignment, if any.
pub fn top_level_assignment(text: &str) -> Option<usize> {
    let scan = Scan::new(text);
    let b = text.as_bytes();
    let mut depth = 0i32;
    for i in 0..b.len() {
        if !scan.is_code(i) {
            continue;
        }
        match b[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'=' if depth == 0 => {
                let prev = if i > 0 { b[i - 1] } else { b' ' };
                let next = b.get(i + 1).copied().unwrap_or(b' ');
                if next != b'=' && !matches!(prev, b'=' | b'!' | b'<' | b'>') {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn closer_for(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}

pub fn opener_for(close: u8) -> u8 {
    match close {
        b')' => b'(',
        b']' => b'[',
        _ => b'{',
    }
}

/// Closing tokens for an open-bracket stack, innermost first.
pub fn closers(stack: &[u8]) -> String {
    stack.iter().rev().map(|b| closer_for(*b) as char).collect()
}

impl Scan {
    pub fn new(src: &str) -> Self {
        let b = src.as_bytes();
        let len = b.len();
        let mut classes = vec![Class::Code; len];
        let mut unterminated = Vec::new();
        let mut open_triple = None;

        let mut i = 0;
        while i < len {
            match b[i] {
                b'#' => {
                    let end = b[i..].iter().position(|c| *c == b'\n').map_or(len, |p| i + p);
                    classes[i..end].fill(Class::Comment);
                    i = end;
                }
                q @ (b'"' | b'\'') => {
                    let start = i;
                    if i + 2 < len && b[i + 1] == q && b[i + 2] == q {
                        i += 3;
                        let mut closed = false;
                        while i < len {
                            if b[i] == b'\\' {
                                i += 2;
                            } else if b[i] == q && b.get(i + 1) == Some(&q) && b.get(i + 2) == Some(&q) {
                                i += 3;
                                closed = true;
                                break;
                            } else {
                                i += 1;
                            }
                        }
                        i = i.min(len);
                        if !closed {
                            open_triple = Some(if q == b'"' { "\"\"\"" } else { "'''" });
                        }
                    } else {
                        i += 1;
                        loop {
                            if i >= len {
                                unterminated.push((len, q as char));
                                break;
                            }
                            match b[i] {
                                b'\\' => i += 2,
                                b'\n' => {
                                    unterminated.push((i, q as char));
                                    break;
                                }
                                c if c == q => {
                                    i += 1;
                                    break;
                                }
                                _ => i += 1,
                            }
                        }
                        i = i.min(len);
                    }
                    classes[start..i].fill(Class::Str);
                }
                _ => i += 1,
            }
        }

        let mut pairs = vec![None; len];
        let mut stack: Vec<usize> = Vec::new();
        for (i, c) in b.iter().enumerate() {
            if classes[i] != Class::Code {
                continue;
            }
            match c {
                b'(' | b'[' | b'{' => stack.push(i),
                b')' | b']' | b'}' => {
                    if let Some(&top) = stack.last() {
                        if b[top] == opener_for(*c) {
                            stack.pop();
                            pairs[top] = Some(i);
                        }
                    }
                }
                _ => {}
            }
        }

        Self {
            src: src.to_string(),
            classes,
            pairs,
            unterminated,
            open_triple,
        }
    }

    pub fn source(&self) -> &str {
        &self.src
    }

    pub fn class(&self, i: usize) -> Class {
        self.classes[i]
    }

    pub fn is_code(&self, i: usize) -> bool {
        self.classes.get(i) == Some(&Class::Code)
    }

    /// Matching closer for the opener at `open`.
    pub fn matching(&self, open: usize) -> Option<usize> {
        self.pairs.get(open).copied().flatten()
    }

    /// Every call site, ordered by position.
    pub fn calls(&self) -> Vec<Call> {
        let b = self.src.as_bytes();
        let mut calls = Vec::new();
        for open in 0..b.len() {
            if b[open] != b'(' || !self.is_code(open) {
                continue;
            }
            // `Arrow (a, b)` is a call too.
            let mut name_end = open;
            while name_end > 0 && matches!(b[name_end - 1], b' ' | b'\t') && self.is_code(name_end - 1) {
                name_end -= 1;
            }
            let mut start = name_end;
            while start > 0 && is_ident_byte(b[start - 1]) && self.is_code(start - 1) {
                start -= 1;
            }
            if start == name_end || b[start].is_ascii_digit() {
                continue;
            }
            let name = &self.src[start..name_end];
            if NON_CALL_WORDS.contains(&name) {
                continue;
            }
            let is_method = start > 0 && b[start - 1] == b'.';
            calls.push(Call {
                name: name.to_string(),
                name_start: start,
                open,
                close: self.matching(open),
                is_method,
                is_definition: !is_method && self.preceding_word(start).is_some_and(|w| w == "def" || w == "class"),
            });
        }
        calls
    }

    fn preceding_word(&self, pos: usize) -> Option<&str> {
        let b = self.src.as_bytes();
        let mut end = pos;
        while end > 0 && (b[end - 1] == b' ' || b[end - 1] == b'\t') {
            end -= 1;
        }
        if end == pos {
            return None;
        }
        let mut start = end;
        while start > 0 && is_ident_byte(b[start - 1]) {
            start -= 1;
        }
        (start < end).then(|| &self.src[start..end])
    }

    /// Top-level arguments between an opener and its closer.
    pub fn args(&self, open: usize, close: usize) -> Vec<Arg> {
        let b = self.src.as_bytes();
        let mut args = Vec::new();
        let mut depth = 0i32;
        let mut current = String::new();
        let mut run_start = open + 1;

        let flush_run = |current: &mut String, from: usize, to: usize| {
            let mut i = from;
            while i < to {
                if self.classes[i] == Class::Comment {
                    i += 1;
                    continue;
                }
                let end = (i..to)
                    .find(|j| self.classes[*j] == Class::Comment)
                    .unwrap_or(to);
                current.push_str(&self.src[i..end]);
                i = end;
            }
        };

        for i in open + 1..close {
            if !self.is_code(i) {
                continue;
            }
            match b[i] {
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                b',' if depth == 0 => {
                    flush_run(&mut current, run_start, i);
                    if !current.trim().is_empty() {
                        args.push(Arg::parse(&current));
                    }
                    current.clear();
                    run_start = i + 1;
                }
                _ => {}
            }
        }
        flush_run(&mut current, run_start, close);
        if !current.trim().is_empty() {
            args.push(Arg::parse(&current));
        }
        args
    }

    /// Byte ranges of each line, excluding the newline.
    pub fn lines(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut start = 0;
        for (i, c) in self.src.bytes().enumerate() {
            if c == b'\n' {
                out.push((start, i));
                start = i + 1;
            }
        }
        if start < self.src.len() {
            out.push((start, self.src.len()));
        }
        out
    }

    /// First non-blank byte of a line, if any.
    pub fn first_significant(&self, start: usize, end: usize) -> Option<usize> {
        let b = self.src.as_bytes();
        (start..end).find(|i| b[*i] != b' ' && b[*i] != b'\t')
    }

    /// Whether the line at `first` continues a multi-line string.
    pub fn continues_string(&self, first: usize) -> bool {
        first > 0 && self.classes[first] == Class::Str && self.classes[first - 1] == Class::Str
    }

    /// Index after the last non-blank code byte in `start..end`.
    pub fn last_code_end(&self, start: usize, end: usize) -> Option<usize> {
        let b = self.src.as_bytes();
        (start..end)
            .rev()
            .find(|i| self.classes[*i] != Class::Comment && !b[*i].is_ascii_whitespace())
            .map(|i| i + 1)
    }
}

/// Leading indentation width, counting a tab as four columns.
pub fn indent_width(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Render a call from a name and argument texts.
pub fn format_call(name: &str, args: &[String]) -> String {
    format!("{}({})", name, args.join(", "))
}

/// Rewrite call sites, innermost and rightmost first.
///
/// `f` receives each call whose brackets are matched together with its
/// arguments, and returns a replacement for the span from the call name to
/// the closing parenthesis, or `None` to leave it alone.
pub fn rewrite_calls<F>(text: &str, mut f: F) -> String
where
    F: FnMut(&Call, &[Arg]) -> Option<String>,
{
    let mut scan = Scan::new(text);
    let mut calls = scan.calls();
    let mut idx = calls.len();

    while idx > 0 {
        idx -= 1;
        let call = &calls[idx];
        let Some(close) = call.close else {
            continue;
        };
        let args = scan.args(call.open, close);
        let Some(replacement) = f(call, &args) else {
            continue;
        };
        let start = call.name_start;
        if scan.src[start..=close] == replacement {
            continue;
        }
        let mut next = scan.src.clone();
        next.replace_range(start..=close, &replacement);
        scan = Scan::new(&next);
        calls = scan.calls();
        idx = calls.partition_point(|c| c.name_start < start);
    }
    scan.src
}

/// Replace regex matches that start in code.
pub fn replace_in_code<F>(text: &str, re: &Regex, mut f: F) -> String
where
    F: FnMut(&Captures) -> Option<String>,
{
    let scan = Scan::new(text);
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        if !scan.is_code(m.start()) {
            continue;
        }
        if let Some(rep) = f(&caps) {
            out.push_str(&text[last..m.start()]);
            out.push_str(&rep);
            last = m.end();
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Apply byte-position insertions. At equal positions a later insertion
/// lands in front of an earlier one.
pub fn apply_insertions(text: &str, mut inserts: Vec<(usize, String)>) -> String {
    if inserts.is_empty() {
        return text.to_string();
    }
    let mut out = text.to_string();
    let mut indexed: Vec<(usize, usize, String)> = inserts
        .drain(..)
        .enumerate()
        .map(|(seq, (pos, s))| (pos, seq, s))
        .collect();
    indexed.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (pos, _, s) in indexed {
        out.insert_str(pos, &s);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_skip_strings_and_comments() {
        let src = "a = \"(\" # )\nb = '''x\n(y'''\n";
        let scan = Scan::new(src);
        assert!(scan.is_code(0));
        assert_eq!(scan.class(5), Class::Str);
        assert_eq!(scan.class(9), Class::Comment);
        assert!(scan.calls().is_empty());
        assert!(scan.unterminated.is_empty());
        assert!(scan.open_triple.is_none());
    }

    #[test]
    fn test_unterminated_strings_detected() {
        let scan = Scan::new("t = Text(\"hello)\nx = 1\ny = '''open");
        assert_eq!(scan.unterminated, vec![(16, '"')]);
        assert_eq!(scan.open_triple, Some("'''"));
    }

    #[test]
    fn test_calls_found_with_methods_and_definitions() {
        let scan = Scan::new("class A(Scene):\n    def construct(self):\n        self.play(Create(c))\n");
        let calls = scan.calls();
        let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "construct", "play", "Create"]);
        assert!(calls[0].is_definition);
        assert!(calls[1].is_definition);
        assert!(calls[2].is_method);
        assert!(!calls[3].is_method && !calls[3].is_definition);
    }

    #[test]
    fn test_keywords_before_paren_are_not_calls() {
        let scan = Scan::new("if (a and (b)):\n    return (c)\n");
        assert!(scan.calls().is_empty());
    }

    #[test]
    fn test_spaced_calls_found() {
        let src = "a = Arrow (start, end=foo)\nif x in (1, 2):\n    raise (e)\n";
        let calls = Scan::new(src).calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "Arrow");
        assert_eq!(calls[0].name_start, 4);
        assert_eq!(calls[0].open, 10);
    }

    #[test]
    fn test_args_split_top_level_only() {
        let src = "f(a, g(b, c), d=[1, 2], *e, **k)";
        let scan = Scan::new(src);
        let args = scan.args(1, src.len() - 1);
        let kinds: Vec<ArgKind> = args.iter().map(|a| a.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                ArgKind::Positional,
                ArgKind::Positional,
                ArgKind::Keyword("d".into()),
                ArgKind::Star,
                ArgKind::DoubleStar,
            ]
        );
        assert_eq!(args[1].text, "g(b, c)");
        assert_eq!(args[2].value(), "[1, 2]");
    }

    #[test]
    fn test_args_drop_comments_and_empty_segments() {
        let src = "f(a,  # first\n  b,,\n)";
        let scan = Scan::new(src);
        let args = scan.args(1, src.len() - 1);
        let texts: Vec<&str> = args.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_classification_is_strict() {
        assert_eq!(Arg::parse("x == 1").kind, ArgKind::Positional);
        assert_eq!(Arg::parse("lambda t=1: t").kind, ArgKind::Positional);
        assert!(Arg::parse("lambda t=1: t").has_ambiguous_equals());
        assert_eq!(Arg::parse("end = foo").kind, ArgKind::Keyword("end".into()));
        assert_eq!(Arg::parse("\"a=b\"").kind, ArgKind::Positional);
        assert!(!Arg::parse("\"a=b\"").has_ambiguous_equals());
    }

    #[test]
    fn test_rewrite_calls_handles_nesting() {
        let out = rewrite_calls("A(B(1), B(2))", |call, args| {
            (call.name == "B").then(|| {
                let texts: Vec<String> = args.iter().map(|a| format!("{}0", a.text)).collect();
                format_call("C", &texts)
            })
        });
        assert_eq!(out, "A(C(10), C(20))");
    }

    #[test]
    fn test_rewrite_calls_outer_sees_rewritten_inner() {
        let out = rewrite_calls("Outer(Inner(x))", |call, args| match call.name.as_str() {
            "Inner" => Some("Y".to_string()),
            "Outer" => Some(format_call("Wrapped", &[args[0].text.clone()])),
            _ => None,
        });
        assert_eq!(out, "Wrapped(Y)");
    }

    #[test]
    fn test_replace_in_code_ignores_strings() {
        let re = Regex::new(r"\bBLUE_C\b").unwrap();
        let out = replace_in_code("c = BLUE_C  # BLUE_C\nt = 'BLUE_C'", &re, |_| Some("BLUE".into()));
        assert_eq!(out, "c = BLUE  # BLUE_C\nt = 'BLUE_C'");
    }

    #[test]
    fn test_apply_insertions_same_position_order() {
        let out = apply_insertions("ab", vec![(1, "[".into()), (1, "(".into()), (2, "!".into())]);
        assert_eq!(out, "a([b!");
    }

    #[test]
    fn test_indent_width() {
        assert_eq!(indent_width("        x"), 8);
        assert_eq!(indent_width("\tx"), 4);
        assert_eq!(indent_width("x"), 0);
    }
}
