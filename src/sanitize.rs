//! Allow-list sanitization for every string that can reach generated source.
//!
//! The allow-list is alphanumerics, underscore, and space. Anything else is
//! stripped before identifier derivation or literal emission, which is the
//! safety boundary that keeps untrusted plan text out of executable
//! positions.

/// Strips characters outside the allow-list and trims the result.
pub fn sanitize_text(input: &str) -> String {
    let kept: String = input
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_' || *ch == ' ')
        .collect();
    kept.trim().to_owned()
}

/// Derives a code-safe identifier: allow-listed characters with spaces
/// folded to single underscores. Returns `None` when nothing survives.
pub fn sanitize_identifier(input: &str) -> Option<String> {
    let cleaned = sanitize_text(input);
    let mut out = String::with_capacity(cleaned.len());
    let mut last_was_sep = false;
    for ch in cleaned.chars() {
        if ch == ' ' || ch == '_' {
            if !out.is_empty() && !last_was_sep {
                out.push('_');
            }
            last_was_sep = true;
        } else {
            out.push(ch);
            last_was_sep = false;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Derives the scene identifier used as the generated class name and the
/// render artifact key. A leading digit gets a `Scene` prefix so the result
/// is always a valid Python class name.
pub fn scene_identifier(title: &str) -> Option<String> {
    let ident = sanitize_identifier(title)?;
    if ident.chars().next().is_some_and(|ch| ch.is_ascii_digit()) {
        Some(format!("Scene{ident}"))
    } else {
        Some(ident)
    }
}

/// Variable name for an object id inside generated source.
pub fn object_variable(id: &str) -> String {
    let body: String = id
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    format!("obj_{body}")
}

/// Renders a sanitized string as a Python string literal. The allow-list
/// already excludes quotes and backslashes; the escape pass keeps the
/// guarantee local instead of relying on the caller having sanitized.
pub fn python_string_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(ch),
        }
    }
    escaped.push('"');
    escaped
}
