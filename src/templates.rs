//! `{parameter}` substitution in task content
//!
//! Placeholders are `{` followed by word characters and `}`. Anything else in
//! braces (`{}`, `{"key": 1}`) is plain text. Substitution is a single
//! left-to-right pass, so a value containing braces is never re-expanded.

use crate::core::error::TemplateError;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"));

static NOT_CLOSED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\w+$").expect("not-closed pattern is valid"));

static NOT_OPENED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+\}").expect("not-opened pattern is valid"));

/// Whitespace and up to three marker characters such as `>`, `-` or `$`
static COLUMN_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\W{0,3}\s*$").expect("column prefix pattern is valid"));

/// Stands in for a substituted placeholder when checking the template's own text
const MASK: char = '\u{0}';

/// Replace every `{name}` in the template with its value
pub fn render_template(
    template: &str,
    parameters: &HashMap<String, String>,
) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut skeleton = String::with_capacity(template.len());
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        let value = parameters
            .get(name.as_str())
            .ok_or_else(|| TemplateError::ParameterNotDefined(name.as_str().to_string()))?;

        let before = &template[last..whole.start()];
        rendered.push_str(before);
        skeleton.push_str(before);
        skeleton.push(MASK);

        let (precol, postcol) = surrounding_columns(template, whole.start(), whole.end());
        if value.contains('\n') && COLUMN_PREFIX.is_match(precol) && postcol.trim().is_empty() {
            rendered.push_str(&value.split('\n').collect::<Vec<_>>().join(&format!("\n{precol}")));
        } else {
            rendered.push_str(value);
        }

        last = whole.end();
    }

    rendered.push_str(&template[last..]);
    skeleton.push_str(&template[last..]);

    if NOT_CLOSED.is_match(&skeleton) {
        return Err(TemplateError::ParameterNotClosed);
    }
    if NOT_OPENED.is_match(&skeleton) {
        return Err(TemplateError::ParameterNotOpened);
    }

    Ok(rendered)
}

/// Names of every placeholder used in the template
pub fn extract_parameter_names(template: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
        .collect()
}

/// Text on the placeholder's line before and after it
fn surrounding_columns(template: &str, start: usize, end: usize) -> (&str, &str) {
    let line_start = template[..start].rfind('\n').map_or(0, |index| index + 1);
    let line_end = template[end..]
        .find('\n')
        .map_or(template.len(), |index| end + index);

    (&template[line_start..start], &template[end..line_end])
}
