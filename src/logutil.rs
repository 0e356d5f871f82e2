//! Logging utilities: single-line escaping for remote-provided text (revert
//! reasons, asset names) and compact account rendering.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///   Other control characters become `\xNN`. Strings over 300 chars are cut with an ellipsis.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 300;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// `0x1234…abcd` form of an address for logs and status lines.
pub fn short_account(addr: &str) -> String {
    if addr.len() <= 12 || !addr.is_ascii() {
        return addr.to_string();
    }
    format!("{}…{}", &addr[..6], &addr[addr.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_revert_reason_newlines() {
        let esc = escape_log("execution reverted:\n\tallowance too low");
        assert_eq!(esc, "execution reverted:\\n\\tallowance too low");
    }

    #[test]
    fn shortens_full_addresses_only() {
        assert_eq!(
            short_account("0x1234567890abcdef1234567890abcdef12345678"),
            "0x1234…5678"
        );
        assert_eq!(short_account("0x12"), "0x12");
    }
}
