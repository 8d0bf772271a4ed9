//! Reverses the archive's string encoding.
//!
//! XML entities are already resolved by the parser; what remains are
//! `\uXXXX` escapes, which the archive writer uses for control characters,
//! backslashes and runs of spaces. A backslash that does not start a valid
//! escape is kept as is.

pub fn decode_text(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            if let Some(unit) = escape_at(&chars, i) {
                // Surrogate pairs arrive as two consecutive escapes.
                if (0xD800..0xDC00).contains(&unit) {
                    if let Some(low) = escape_at(&chars, i + 6).filter(|u| (0xDC00..0xE000).contains(u)) {
                        let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                        if let Some(c) = char::from_u32(code) {
                            out.push(c);
                            i += 12;
                            continue;
                        }
                    }
                } else if let Some(c) = char::from_u32(unit) {
                    out.push(c);
                    i += 6;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Code unit of a `\uXXXX` escape starting at `at`.
fn escape_at(chars: &[char], at: usize) -> Option<u32> {
    if chars.get(at) != Some(&'\\') || chars.get(at + 1) != Some(&'u') {
        return None;
    }
    let digits: String = chars.get(at + 2..at + 6)?.iter().collect();
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(&digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(decode_text("hello <world> & co"), "hello <world> & co");
    }

    #[test]
    fn test_unicode_escapes() {
        assert_eq!(decode_text("a\\u0009b"), "a\tb");
        assert_eq!(decode_text("back\\u005cslash"), "back\\slash");
        assert_eq!(decode_text("\\u0020\\u0020x"), "  x");
        assert_eq!(decode_text("\\ud83d\\ude00"), "\u{1F600}");
    }

    #[test]
    fn test_invalid_escape_kept_literally() {
        assert_eq!(decode_text("C:\\temp"), "C:\\temp");
        assert_eq!(decode_text("\\u12"), "\\u12");
        assert_eq!(decode_text("\\uzzzz"), "\\uzzzz");
        assert_eq!(decode_text("trailing\\"), "trailing\\");
    }
}
