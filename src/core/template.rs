//! Placeholder substitution for task descriptions.
//!
//! Grammar: `{name}` is replaced with the value bound to `name`; `{{` and
//! `}}` produce literal braces. Anything else inside braces, an unclosed
//! `{` or a lone `}` is a syntax error.

use std::collections::BTreeMap;

use thiserror::Error;

/// Values available to description templates, keyed by placeholder name.
pub type TemplateValues = BTreeMap<String, String>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("no value for placeholder '{0}'")]
    MissingValue(String),

    #[error("unclosed '{{' at byte {0}")]
    Unclosed(usize),

    #[error("unmatched '}}' at byte {0}")]
    Unmatched(usize),

    #[error("invalid placeholder name '{0}'")]
    InvalidName(String),
}

/// Substitute every placeholder in `template` from `values`.
pub fn render(template: &str, values: &TemplateValues) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, nc) in chars.by_ref() {
                    if nc == '}' {
                        closed = true;
                        break;
                    }
                    name.push(nc);
                }
                if !closed {
                    return Err(TemplateError::Unclosed(pos));
                }
                let key = name.trim();
                if !is_valid_name(key) {
                    return Err(TemplateError::InvalidName(name));
                }
                let value = values
                    .get(key)
                    .ok_or_else(|| TemplateError::MissingValue(key.to_string()))?;
                out.push_str(value);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::Unmatched(pos));
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Placeholder names referenced by `template`, in order of appearance.
///
/// Malformed regions are skipped; use [`render`] to surface them.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        if let Some(stripped) = after.strip_prefix('{') {
            rest = stripped;
            continue;
        }
        match after.find('}') {
            Some(end) => {
                let name = after[..end].trim();
                if is_valid_name(name) && !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
