//! Input validation for text that ends up inside sync frames or mesh replies.
//!
//! Sync frames are pipe-delimited, so any user-entered field that still holds a
//! `|` would shift every following field on the peer side. Everything a user
//! types is run through [`sanitize_field`] before it is stored or replicated.

/// Errors raised while validating user-entered text or node identifiers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("field is empty")]
    Empty,

    #[error("field too long (max {max} bytes)")]
    TooLong { max: usize },

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),
}

/// Character substituted for the frame delimiter in user text.
pub const DELIMITER_REPLACEMENT: char = '/';

/// Clean one user-entered field so it is safe to store and to embed in a frame.
///
/// Control characters are dropped (newlines become spaces), the frame
/// delimiter is replaced, surrounding whitespace trimmed. The result must be
/// non-empty and at most `max_bytes` long.
pub fn sanitize_field(raw: &str, max_bytes: usize) -> Result<String, FieldError> {
    let cleaned: String = raw
        .chars()
        .filter_map(|c| match c {
            '|' => Some(DELIMITER_REPLACEMENT),
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        return Err(FieldError::Empty);
    }
    if cleaned.len() > max_bytes {
        return Err(FieldError::TooLong { max: max_bytes });
    }
    Ok(cleaned)
}

/// Parse a node number written as decimal, `0x`-hex or Meshtastic `!`-hex.
pub fn parse_node_id(raw: &str) -> Result<u32, FieldError> {
    let s = raw.trim();
    let parsed = if let Some(hex) = s.strip_prefix('!') {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<u32>().ok()
    };
    parsed.ok_or_else(|| FieldError::InvalidNodeId(s.to_string()))
}

/// Truncate to at most `max_bytes` without splitting a UTF-8 sequence.
pub fn utf8_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut cut = max_bytes;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    &s[..cut]
}
