//! Parser for PostgreSQL array literals in text output form.
//!
//! `{{1,2},{3,NULL}}`, `{"a b","c\"d"}` and the bounded form
//! `[0:1]={x,y}` are all accepted. Unquoted `NULL` (any case) is SQL NULL;
//! quoted `"NULL"` is the string.

use super::cursor::ArrayValue;
use crate::error::{CodecError, Result};

pub fn parse_array_literal(text: &str) -> Result<ArrayValue> {
    let body = match text.find('=') {
        Some(eq) if text.starts_with('[') => &text[eq + 1..],
        _ => text,
    };
    let chars: Vec<char> = body.trim().chars().collect();
    let mut pos = 0;
    let value = parse_list(&chars, &mut pos, text)?;
    if pos != chars.len() {
        return Err(invalid(text, "trailing characters"));
    }
    Ok(value)
}

fn invalid(text: &str, reason: &str) -> CodecError {
    CodecError::driver(format!("invalid array literal {:?}: {}", text, reason))
}

fn parse_list(chars: &[char], pos: &mut usize, text: &str) -> Result<ArrayValue> {
    if chars.get(*pos) != Some(&'{') {
        return Err(invalid(text, "expected '{'"));
    }
    *pos += 1;
    let mut items = Vec::new();

    if chars.get(*pos) == Some(&'}') {
        *pos += 1;
        return Ok(ArrayValue::List(items));
    }

    loop {
        let item = match chars.get(*pos) {
            Some('{') => parse_list(chars, pos, text)?,
            Some('"') => ArrayValue::Item(parse_quoted(chars, pos, text)?),
            Some(_) => parse_bare(chars, pos),
            None => return Err(invalid(text, "unterminated array")),
        };
        items.push(item);

        match chars.get(*pos) {
            Some(',') => *pos += 1,
            Some('}') => {
                *pos += 1;
                return Ok(ArrayValue::List(items));
            }
            _ => return Err(invalid(text, "expected ',' or '}'")),
        }
    }
}

fn parse_quoted(chars: &[char], pos: &mut usize, text: &str) -> Result<String> {
    *pos += 1;
    let mut out = String::new();
    loop {
        match chars.get(*pos) {
            Some('\\') => {
                let escaped = chars
                    .get(*pos + 1)
                    .ok_or_else(|| invalid(text, "dangling escape"))?;
                out.push(*escaped);
                *pos += 2;
            }
            Some('"') => {
                *pos += 1;
                return Ok(out);
            }
            Some(c) => {
                out.push(*c);
                *pos += 1;
            }
            None => return Err(invalid(text, "unterminated quoted element")),
        }
    }
}

fn parse_bare(chars: &[char], pos: &mut usize) -> ArrayValue {
    let start = *pos;
    while let Some(c) = chars.get(*pos) {
        if *c == ',' || *c == '}' {
            break;
        }
        *pos += 1;
    }
    let raw: String = chars[start..*pos].iter().collect();
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("NULL") {
        ArrayValue::Null
    } else {
        ArrayValue::Item(raw.to_string())
    }
}
