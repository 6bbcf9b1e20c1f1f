//! Logging helpers that keep user-supplied text on a single log line.
//!
//! Mesh payloads routinely carry newlines (menus, multi-line bodies) and the
//! occasional control byte from a misbehaving client. Everything that reaches a
//! log macro from the radio goes through [`escape_log`] first.

use std::fmt::Write;

/// Longest preview emitted for a single payload before it is cut with `…`.
pub const MAX_LOG_PREVIEW: usize = 300;

/// Escape a string for single-line logging.
///
/// `\n`, `\r`, `\t` and backslash are written as their escape sequences, other
/// control characters as `\xNN`. Output is capped at [`MAX_LOG_PREVIEW`] chars.
pub fn escape_log(s: &str) -> String {
    preview(s, MAX_LOG_PREVIEW)
}

/// Same as [`escape_log`] with a caller-chosen character cap.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_chars) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= max_chars {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Render a node number the way Meshtastic clients print node ids (`!1a2b3c4d`).
pub fn node_label(node: u32) -> String {
    format!("!{:08x}", node)
}
