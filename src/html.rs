//! Streaming `<a href="…">` extraction.
//!
//! This is a tolerant lexer, not an HTML parser: it walks the document once
//! and fires the callback for the first double-quoted `href` value of every
//! anchor tag that actually closes. Entities are left undecoded and
//! single-quoted or bare attribute values are skipped, which is all the
//! crawl pipeline needs.

/// Lexer states. `HrefH`..`HrefF` spell out the attribute name; a stray `h`
/// restarts that scan, so the lexer recovers from broken sequences like
/// `hhref`.
#[derive(Clone, Copy)]
enum State {
    Text,
    TagOpen,
    AnchorName,
    InTag,
    HrefH,
    HrefR,
    HrefE,
    HrefF,
    Equals,
    Value { start: usize },
    TagClose { start: usize, end: usize },
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Invoke `emit` with each extracted `href` value, in document order.
pub fn for_each_href<F: FnMut(&str)>(html: &str, mut emit: F) {
    use State::*;

    let bytes = html.as_bytes();
    let mut state = Text;

    for (i, &b) in bytes.iter().enumerate() {
        state = match state {
            Text => {
                if b == b'<' {
                    TagOpen
                } else {
                    Text
                }
            }
            TagOpen => {
                if b == b'a' {
                    AnchorName
                } else if is_space(b) {
                    TagOpen
                } else {
                    Text
                }
            }
            AnchorName => {
                if is_space(b) {
                    InTag
                } else {
                    Text
                }
            }
            InTag => {
                if b == b'h' {
                    HrefH
                } else if b == b'>' {
                    Text
                } else {
                    InTag
                }
            }
            HrefH => {
                if b == b'r' {
                    HrefR
                } else if b == b'h' {
                    HrefH
                } else if b == b'>' {
                    Text
                } else {
                    InTag
                }
            }
            HrefR => {
                if b == b'e' {
                    HrefE
                } else if b == b'h' {
                    HrefH
                } else if b == b'>' {
                    Text
                } else {
                    InTag
                }
            }
            HrefE => {
                if b == b'f' {
                    HrefF
                } else if b == b'h' {
                    HrefH
                } else if b == b'>' {
                    Text
                } else {
                    InTag
                }
            }
            HrefF => {
                if b == b'=' {
                    Equals
                } else if is_space(b) {
                    HrefF
                } else if b == b'h' {
                    HrefH
                } else if b == b'>' {
                    Text
                } else {
                    InTag
                }
            }
            Equals => {
                if b == b'"' {
                    Value { start: i + 1 }
                } else if is_space(b) {
                    Equals
                } else if b == b'h' {
                    HrefH
                } else if b == b'>' {
                    Text
                } else {
                    InTag
                }
            }
            Value { start } => {
                if b == b'"' {
                    TagClose { start, end: i }
                } else {
                    Value { start }
                }
            }
            TagClose { start, end } => {
                if b == b'>' {
                    // Bounds fall on the quote bytes, so the slice is valid
                    // UTF-8 regardless of the value's contents.
                    emit(&html[start..end]);
                    Text
                } else {
                    TagClose { start, end }
                }
            }
        };
    }
}
