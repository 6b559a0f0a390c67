/// Delimiter that may wrap a placeholder marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Delimiter {
    Backtick,
    SingleQuote,
    DoubleQuote,
}

impl Delimiter {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'`' => Some(Delimiter::Backtick),
            b'\'' => Some(Delimiter::SingleQuote),
            b'"' => Some(Delimiter::DoubleQuote),
            _ => None,
        }
    }

    fn byte(self) -> u8 {
        match self {
            Delimiter::Backtick => b'`',
            Delimiter::SingleQuote => b'\'',
            Delimiter::DoubleQuote => b'"',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Marker {
    /// `?`
    Scalar,
    /// `??`
    Group,
}

/// A placeholder occurrence; `start..end` covers the delimiters when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Token {
    pub(super) start: usize,
    pub(super) end: usize,
    pub(super) marker: Marker,
    pub(super) delimiter: Option<Delimiter>,
}

/// Find the next placeholder token at or after `from`.
///
/// A delimiter only counts when the same delimiter closes the marker; otherwise it is plain
/// SQL text and the marker is scanned on its own.
pub(super) fn next_token(bytes: &[u8], from: usize) -> Option<Token> {
    let mut idx = from;
    while idx < bytes.len() {
        let b = bytes[idx];
        if let Some(delimiter) = Delimiter::from_byte(b) {
            if let Some(token) = wrapped_token(bytes, idx, delimiter) {
                return Some(token);
            }
        } else if b == b'?' {
            let marker = if bytes.get(idx + 1) == Some(&b'?') {
                Marker::Group
            } else {
                Marker::Scalar
            };
            let len = if marker == Marker::Group { 2 } else { 1 };
            return Some(Token {
                start: idx,
                end: idx + len,
                marker,
                delimiter: None,
            });
        }
        idx += 1;
    }
    None
}

fn wrapped_token(bytes: &[u8], start: usize, delimiter: Delimiter) -> Option<Token> {
    let close = Some(&delimiter.byte());
    if bytes.get(start + 1) != Some(&b'?') {
        return None;
    }
    if bytes.get(start + 2) == Some(&b'?') && bytes.get(start + 3) == close {
        return Some(Token {
            start,
            end: start + 4,
            marker: Marker::Group,
            delimiter: Some(delimiter),
        });
    }
    if bytes.get(start + 2) == close {
        return Some(Token {
            start,
            end: start + 3,
            marker: Marker::Scalar,
            delimiter: Some(delimiter),
        });
    }
    None
}
