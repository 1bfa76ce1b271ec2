//! SQL literal rendering.
//!
//! Statements carry their values inline. Text and blobs are quoted, numbers
//! and booleans are not, and a quote inside a text literal is doubled so it
//! cannot end the literal early.

use std::fmt::Write;

use relorm_core::Value;

/// Render `value` as a SQL literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => String::from(if *v { "1" } else { "0" }),
        Value::TinyInt(v) => v.to_string(),
        Value::SmallInt(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::BigInt(v) => v.to_string(),
        Value::Float(v) => real(f64::from(*v)),
        Value::Double(v) => real(*v),
        Value::Text(v) => quote_text(v),
        Value::Bytes(v) => blob(v),
    }
}

/// Single-quote `text`, doubling embedded quotes.
pub fn quote_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Comma-separated literals, as used inside `IN (...)`.
pub fn literal_list(values: &[Value]) -> String {
    values
        .iter()
        .map(sql_literal)
        .collect::<Vec<_>>()
        .join(", ")
}

// SQL has no literal for NaN or infinities.
fn real(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        "NULL".to_string()
    }
}

fn blob(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for byte in bytes {
        let _ = write!(out, "{byte:02X}");
    }
    out.push('\'');
    out
}
