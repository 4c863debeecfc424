//! JSON format

use super::{FormatDefinition, SubvalueDefinition};
use crate::core::error::PipelineError;
use regex::Regex;
use std::sync::{Arc, LazyLock};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[\w-]*[ \t]*\r?\n(.*?)```").expect("fenced block pattern is valid")
});

/// Value must parse as JSON
pub struct JsonFormat {
    subvalues: Vec<Arc<dyn SubvalueDefinition>>,
}

impl JsonFormat {
    pub fn new() -> Self {
        Self {
            subvalues: Vec::new(),
        }
    }
}

impl Default for JsonFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatDefinition for JsonFormat {
    fn format_name(&self) -> &str {
        "JSON"
    }

    fn is_valid(&self, value: &str) -> bool {
        is_json(value)
    }

    fn can_be_valid(&self, partial_value: &str) -> bool {
        match partial_value.trim_start().chars().next() {
            None => true,
            Some(first) => matches!(first, '{' | '[' | '"' | '-' | '0'..='9' | 't' | 'f' | 'n'),
        }
    }

    fn heal(&self, value: &str) -> Result<String, PipelineError> {
        extract_json_block(value).ok_or_else(|| PipelineError::FormatValidation {
            format_name: self.format_name().to_string(),
            message: "No JSON value could be extracted".to_string(),
            settings: String::new(),
            data: value.to_string(),
        })
    }

    fn subvalue_definitions(&self) -> &[Arc<dyn SubvalueDefinition>] {
        &self.subvalues
    }
}

fn is_json(value: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(value).is_ok()
}

/// Pull a JSON value out of surrounding prose or a markdown code block
pub fn extract_json_block(text: &str) -> Option<String> {
    for captures in FENCED_BLOCK.captures_iter(text) {
        if let Some(body) = captures.get(1) {
            let candidate = body.as_str().trim();
            if is_json(candidate) {
                return Some(candidate.to_string());
            }
        }
    }

    let mut spans: Vec<(usize, usize)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| Some((text.find(open)?, text.rfind(close)?)))
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort();

    for (start, end) in spans {
        let candidate = &text[start..=end];
        if is_json(candidate) {
            return Some(candidate.to_string());
        }
    }

    let trimmed = text.trim();
    if is_json(trimmed) {
        return Some(trimmed.to_string());
    }

    None
}
