//! Unicode normalization of generated scripts.
//!
//! Language models emit typographic punctuation and invisible characters that
//! the target grammar rejects. [`normalize`] maps them to ASCII equivalents or
//! strips them. It is total and idempotent: every replacement is plain ASCII,
//! which no mapping touches again.

/// Map a single character to its ASCII replacement.
///
/// `None` keeps the character, `Some("")` strips it.
fn replacement(c: char) -> Option<&'static str> {
    let r = match c {
        // Double quotes
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{FF02}' | '\u{00AB}'
        | '\u{00BB}' => "\"",
        // Single quotes
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{FF07}' | '\u{2032}' => "'",
        // Dashes and minus signs
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => "-",
        // Fullwidth brackets and punctuation
        '\u{FF08}' => "(",
        '\u{FF09}' => ")",
        '\u{FF3B}' => "[",
        '\u{FF3D}' => "]",
        '\u{FF5B}' => "{",
        '\u{FF5D}' => "}",
        '\u{FF0C}' | '\u{3001}' => ",",
        '\u{FF1A}' => ":",
        '\u{FF1B}' => ";",
        '\u{FF1D}' => "=",
        '\u{3002}' => ".",
        '\u{2026}' => "...",
        // Non-breaking and ideographic spaces
        '\u{00A0}' | '\u{202F}' | '\u{3000}' => " ",
        // Byte-order mark, zero-width characters, word joiner
        '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' => "",
        _ => return None,
    };
    Some(r)
}

/// Normalize typographic punctuation and strip invisible characters.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match replacement(c) {
            Some(r) => out.push_str(r),
            None => out.push(c),
        }
    }
    // CRLF line endings confuse line-oriented rules.
    if out.contains('\r') {
        out = out.replace("\r\n", "\n").replace('\r', "\n");
    }
    out
}
