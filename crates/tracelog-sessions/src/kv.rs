//! Scanning of `key=value` tails found on trace lines.
//!
//! Values may be quoted with `"` or `'` (backslash escapes) and may contain
//! whitespace inside `[]`, `{}` or `()` groups.

use serde_json::{Number, Value};

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n')
}

/// Index just past the closing `quote`, or the end of input.
fn quoted_end(b: &[u8], mut i: usize, quote: u8) -> usize {
    while i < b.len() {
        match b[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    b.len()
}

/// Index of the whitespace ending a value that starts at `i`.
fn value_end(b: &[u8], mut i: usize) -> usize {
    let (mut brackets, mut braces, mut parens) = (0u32, 0u32, 0u32);
    while i < b.len() {
        match b[i] {
            q @ (b'"' | b'\'') => {
                i = quoted_end(b, i + 1, q);
                continue;
            }
            b'[' => brackets += 1,
            b']' => brackets = brackets.saturating_sub(1),
            b'{' => braces += 1,
            b'}' => braces = braces.saturating_sub(1),
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            c if is_space(c) && brackets + braces + parens == 0 => return i,
            _ => {}
        }
        i += 1;
    }
    b.len()
}

/// Call `each(key, value)` for every `key=value` pair in `s`.
///
/// Bare words without `=` are skipped; values are returned verbatim,
/// quotes included.
pub fn scan_kvs<'a>(s: &'a str, mut each: impl FnMut(&'a str, &'a str)) {
    let b = s.as_bytes();
    let mut i = 0;
    'pairs: while i < b.len() {
        while i < b.len() && is_space(b[i]) {
            i += 1;
        }
        let key_start = i;
        loop {
            if i >= b.len() {
                return;
            }
            match b[i] {
                c if is_space(c) => continue 'pairs,
                b'=' => break,
                _ => i += 1,
            }
        }
        let key_end = i;
        let val_start = key_end + 1;
        let val_end = value_end(b, val_start).min(b.len());
        each(&s[key_start..key_end], &s[val_start..val_end]);
        i = val_end + 1;
    }
}

fn unescape(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            i += 1;
        }
        out.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Strip one level of matching quotes, resolving backslash escapes.
pub fn unquote(s: &str) -> String {
    let b = s.as_bytes();
    match b.first() {
        Some(&q @ (b'"' | b'\'')) if b.len() >= 2 && b[b.len() - 1] == q => {
            unescape(&b[1..b.len() - 1])
        }
        _ => s.to_string(),
    }
}

/// Call `each` for every whitespace separated element of a list body.
/// Quoted elements are unquoted.
pub fn scan_values(s: &str, mut each: impl FnMut(String)) {
    let b = s.as_bytes();
    let mut i = 0;
    loop {
        while i < b.len() && is_space(b[i]) {
            i += 1;
        }
        if i >= b.len() {
            return;
        }
        let end = match b[i] {
            q @ (b'"' | b'\'') => {
                let end = quoted_end(b, i + 1, q).min(b.len());
                if end > i + 1 && b[end - 1] == q && (end - i) >= 2 {
                    each(unescape(&b[i + 1..end - 1]));
                } else {
                    each(s[i..end].to_string());
                }
                end
            }
            _ => {
                let end = value_end(b, i).min(b.len());
                each(s[i..end].to_string());
                end
            }
        };
        i = end + 1;
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Interpret a raw value as a list, integer, bool, float or string.
pub fn parse_value(s: &str) -> Value {
    if s.is_empty() {
        return Value::String(String::new());
    }
    if s.len() >= 2 && s.starts_with('[') && s.ends_with(']') {
        let mut items = Vec::new();
        scan_values(&s[1..s.len() - 1], |v| items.push(parse_value(&v)));
        return Value::Array(items);
    }
    if let Ok(n) = s.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(b) = parse_bool(s) {
        return Value::Bool(b);
    }
    if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(s.to_string())
}
