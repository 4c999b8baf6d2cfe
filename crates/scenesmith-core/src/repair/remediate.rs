//! Last-resort fixes aimed at the line a parser rejected.

use super::scan::{closers, indent_width, opener_for, Scan};

const HEADER_WORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "def", "class", "with", "try", "except", "finally",
];

/// Apply the first applicable fix to the 1-based `line`:
///
/// 1. a block header missing its `:` gets one;
/// 2. a statement still open at that line is closed there;
/// 3. a line that is plain prose is commented out.
///
/// Returns the text unchanged when none applies.
pub fn force_fix(text: &str, line: usize) -> String {
    let scan = Scan::new(text);
    let lines = scan.lines();
    if lines.is_empty() {
        return text.to_string();
    }

    // Parsers report end-of-input failures past the last line, and blank
    // lines carry nothing to fix; step back to real content.
    let mut idx = line.saturating_sub(1).min(lines.len() - 1);
    while idx > 0 && scan.first_significant(lines[idx].0, lines[idx].1).is_none() {
        idx -= 1;
    }
    let (start, end) = lines[idx];
    let Some(first) = scan.first_significant(start, end) else {
        return text.to_string();
    };
    let content = &text[first..end];

    let open = open_brackets_through(&scan, text, end);
    let word: String = content.chars().take_while(|c| c.is_ascii_alphabetic()).collect();

    if open.is_empty() && HEADER_WORDS.contains(&word.as_str()) {
        if let Some(last) = scan.last_code_end(start, end) {
            if text.as_bytes()[last - 1] != b':' {
                let mut out = text.to_string();
                out.insert(last, ':');
                return out;
            }
        }
    }

    if !open.is_empty() {
        if let Some(last) = scan.last_code_end(start, end) {
            let mut out = text.to_string();
            out.insert_str(last, &closers(&open));
            return out;
        }
    }

    if scan.is_code(first) && looks_like_prose(content) {
        let indent = " ".repeat(indent_width(&text[start..end]));
        let mut out = String::with_capacity(text.len() + 2);
        out.push_str(&text[..start]);
        out.push_str(&indent);
        out.push_str("# ");
        out.push_str(content);
        out.push_str(&text[end..]);
        return out;
    }

    text.to_string()
}

/// Bracket stack left open by everything before `upto`.
fn open_brackets_through(scan: &Scan, text: &str, upto: usize) -> Vec<u8> {
    let b = text.as_bytes();
    let mut stack = Vec::new();
    for (i, c) in b.iter().enumerate().take(upto) {
        if !scan.is_code(i) {
            continue;
        }
        match c {
            b'(' | b'[' | b'{' => stack.push(*c),
            b')' | b']' | b'}' => {
                if let Some(pos) = stack.iter().rposition(|o| *o == opener_for(*c)) {
                    stack.truncate(pos);
                }
            }
            _ => {}
        }
    }
    stack
}

/// Several words and none of the punctuation code lines carry.
fn looks_like_prose(line: &str) -> bool {
    let words = line.split_whitespace().count();
    words >= 3
        && !line.contains(['(', ')', '=', '[', ']', '{', '}', ':', '"', '\''])
        && !line.trim_end().ends_with('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_colon_added() {
        assert_eq!(force_fix("if x > 1\n    y()\n", 1), "if x > 1:\n    y()\n");
    }

    #[test]
    fn test_open_statement_closed_at_line() {
        assert_eq!(force_fix("x = f(a, [b\ny = 2\n", 1), "x = f(a, [b])\ny = 2\n");
    }

    #[test]
    fn test_prose_commented_out() {
        assert_eq!(
            force_fix("x = 1\n    This draws a circle\n", 2),
            "x = 1\n    # This draws a circle\n"
        );
    }

    #[test]
    fn test_failure_past_end_steps_back() {
        assert_eq!(force_fix("while True\n\n", 9), "while True:\n\n");
    }

    #[test]
    fn test_nothing_applicable() {
        assert_eq!(force_fix("x = = 1\n", 1), "x = = 1\n");
        assert_eq!(force_fix("", 1), "");
    }
}
