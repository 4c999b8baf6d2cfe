//! Quote and bracket balancing.

use crate::repair::scan::{apply_insertions, closers, indent_width, opener_for, Class, Scan};
use crate::repair::RepairRule;

/// Terminates string literals left open at a line end or at end of input.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuoteBalance;

impl RepairRule for QuoteBalance {
    fn id(&self) -> &'static str {
        "quote-balance"
    }

    fn apply(&self, text: &str) -> String {
        let scan = Scan::new(text);
        let mut inserts: Vec<(usize, String)> = scan
            .unterminated
            .iter()
            .map(|(pos, quote)| (*pos, quote.to_string()))
            .collect();
        if let Some(triple) = scan.open_triple {
            let pos = if text.ends_with('\n') { text.len() - 1 } else { text.len() };
            inserts.push((pos, triple.to_string()));
        }
        apply_insertions(text, inserts)
    }
}

/// Statement headers whose trailing `:` must stay outside inserted closers.
const COMPOUND_HEADERS: &[&str] = &[
    "if", "elif", "while", "for", "def", "class", "with", "except", "async",
];

/// Balances brackets per logical statement.
///
/// A statement left open is closed at its last code character once a line
/// at the same or lower indentation starts (or at end of input). A closer
/// with no opener first closes whatever the statement still has open, then
/// gets an opener inserted at the start of its statement, after any
/// assignment target or leading keyword. User brackets are never removed.
#[derive(Debug, Default, Clone, Copy)]
pub struct BracketBalance;

struct Statement {
    indent: usize,
    start: usize,
    compound: bool,
}

impl BracketBalance {
    /// Where a missing opener goes for a statement starting at `start`.
    fn opener_position(text: &str, scan: &Scan, start: usize, upto: usize) -> usize {
        let b = text.as_bytes();
        let mut depth = 0i32;
        let mut pos = None;
        for i in start..upto {
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
                        pos = Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        let mut pos = match pos {
            Some(p) => p,
            None => {
                let head = &text[start..upto];
                let word_len = head.bytes().take_while(|c| c.is_ascii_alphabetic()).count();
                let word = &head[..word_len];
                if matches!(
                    word,
                    "return" | "yield" | "await" | "assert" | "del" | "if" | "elif" | "while" | "not"
                ) && head[word_len..].starts_with(' ')
                {
                    start + word_len
                } else {
                    start
                }
            }
        };
        while pos < upto && b[pos] == b' ' {
            pos += 1;
        }
        pos
    }

    fn close_at(text: &str, stmt: &Statement, stack: &[u8], end: usize) -> (usize, String) {
        let b = text.as_bytes();
        let pos = if stmt.compound && end > 0 && b[end - 1] == b':' { end - 1 } else { end };
        (pos, closers(stack))
    }
}

impl RepairRule for BracketBalance {
    fn id(&self) -> &'static str {
        "bracket-balance"
    }

    fn apply(&self, text: &str) -> String {
        let scan = Scan::new(text);
        let b = text.as_bytes();
        let mut inserts: Vec<(usize, String)> = Vec::new();
        let mut stack: Vec<u8> = Vec::new();
        let mut stmt = Statement { indent: 0, start: 0, compound: false };
        let mut last_code_end = 0usize;
        let mut last_code_byte = b'\n';

        for (start, end) in scan.lines() {
            let Some(first) = scan.first_significant(start, end) else {
                continue;
            };
            if scan.class(first) == Class::Comment {
                continue;
            }

            if !scan.continues_string(first) {
                let indent = indent_width(&text[start..end]);
                if !stack.is_empty() {
                    let closes = matches!(b[first], b')' | b']' | b'}');
                    let opener_left_open = matches!(last_code_byte, b'(' | b'[' | b'{');
                    let header_ended = stmt.compound && last_code_byte == b':';
                    let dedented = indent <= stmt.indent && !opener_left_open;
                    if !closes && (dedented || header_ended) {
                        inserts.push(Self::close_at(text, &stmt, &stack, last_code_end));
                        stack.clear();
                    }
                }
                if stack.is_empty() {
                    let head = &text[first..end];
                    let word: String = head.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
                    stmt = Statement {
                        indent,
                        start: first,
                        compound: COMPOUND_HEADERS.contains(&word.as_str()),
                    };
                }
            }

            for i in first..end {
                if !scan.is_code(i) {
                    if scan.class(i) == Class::Str {
                        last_code_end = i + 1;
                        last_code_byte = b'"';
                    }
                    continue;
                }
                let c = b[i];
                if !c.is_ascii_whitespace() {
                    last_code_end = i + 1;
                    last_code_byte = c;
                }
                match c {
                    b'(' | b'[' | b'{' => stack.push(c),
                    b')' | b']' | b'}' => {
                        let want = opener_for(c);
                        if stack.last() == Some(&want) {
                            stack.pop();
                        } else if let Some(depth) = stack.iter().rposition(|o| *o == want) {
                            inserts.push((i, closers(&stack[depth + 1..])));
                            stack.truncate(depth);
                        } else {
                            if !stack.is_empty() {
                                inserts.push((i, closers(&stack)));
                                stack.clear();
                            }
                            let pos = Self::opener_position(text, &scan, stmt.start, i);
                            inserts.push((pos, (want as char).to_string()));
                        }
                    }
                    _ => {}
                }
            }
        }

        if !stack.is_empty() {
            inserts.push(Self::close_at(text, &stmt, &stack, last_code_end));
        }
        apply_insertions(text, inserts)
    }
}
