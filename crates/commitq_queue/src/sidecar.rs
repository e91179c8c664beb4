//! Text codec for `.meta` sidecar files.
//!
//! One `key=value` line per value; a multi-valued key repeats its line.
//! Backslash escaping covers backslash, newline, carriage return, and
//! (in keys) the `=` separator. Line order is insertion order, so the
//! codec round-trips [`Metadata`] exactly.

use crate::error::{QueueError, QueueResult};
use crate::op::Metadata;
use std::path::Path;

/// Encodes metadata to sidecar bytes.
pub(crate) fn encode(metadata: &Metadata) -> Vec<u8> {
    let mut out = String::new();
    for (key, values) in metadata.iter() {
        for value in values {
            out.push_str(&escape(key, true));
            out.push('=');
            out.push_str(&escape(value, false));
            out.push('\n');
        }
    }
    out.into_bytes()
}

/// Decodes sidecar bytes back into metadata.
///
/// `path` is used only for error reporting.
pub(crate) fn decode(data: &[u8], path: &Path) -> QueueResult<Metadata> {
    let text = std::str::from_utf8(data)
        .map_err(|_| QueueError::corrupt_sidecar(path, "sidecar is not valid UTF-8"))?;

    let mut metadata = Metadata::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = split_line(line, path)?;
        metadata.insert(key, value);
    }
    Ok(metadata)
}

fn escape(s: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '=' if is_key => out.push_str("\\="),
            _ => out.push(c),
        }
    }
    out
}

/// Splits one line at the first unescaped `=`, unescaping both halves.
fn split_line(line: &str, path: &Path) -> QueueResult<(String, String)> {
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        let out = if in_value { &mut value } else { &mut key };
        match c {
            '\\' => match chars.next() {
                Some('\\') => out.push('\\'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('=') => out.push('='),
                _ => {
                    return Err(QueueError::corrupt_sidecar(
                        path,
                        format!("invalid escape in line {line:?}"),
                    ))
                }
            },
            '=' if !in_value => in_value = true,
            _ => out.push(c),
        }
    }

    if !in_value {
        return Err(QueueError::corrupt_sidecar(
            path,
            format!("missing '=' separator in line {line:?}"),
        ));
    }
    Ok((key, value))
}
