//! Named transforms applied to a task result before it is validated

use crate::core::error::PipelineError;
use crate::formats::extract_json_block;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

pub type PostprocessingFunction =
    Arc<dyn Fn(&str) -> Result<String, PipelineError> + Send + Sync>;

static MARKDOWN_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\*\*|__|\*|_|~~|`)(\S(?:.*?\S)?)(\*\*|__|\*|_|~~|`)")
        .expect("emphasis pattern is valid")
});

static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("heading pattern is valid"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static RESULT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*(?:the\s+)?(?:result|answer|output)\s*(?:is)?\s*[:=]\s*")
        .expect("result prefix pattern is valid")
});

/// Functions a task may name in `postprocessing_function_names`
#[derive(Clone, Default)]
pub struct PostprocessingRegistry {
    functions: HashMap<String, PostprocessingFunction>,
}

impl PostprocessingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in text transforms
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_fn("trim", |value| value.trim().to_string());
        registry.register_fn("trimEndOfCodeBlock", trim_end_of_code_block);
        registry.register_fn("unwrapResult", unwrap_result);
        registry.register_fn("removeMarkdownFormatting", remove_markdown_formatting);
        registry.register_fn("removeQuotes", remove_quotes);
        registry.register_fn("uppercase", |value| value.to_uppercase());
        registry.register_fn("lowercase", |value| value.to_lowercase());
        registry.register_fn("normalizeWhitespaces", |value| {
            WHITESPACE.replace_all(value.trim(), " ").into_owned()
        });
        registry.register(
            "extractJsonBlock",
            Arc::new(|value: &str| {
                extract_json_block(value).ok_or_else(|| PipelineError::FormatValidation {
                    format_name: "JSON".to_string(),
                    message: "No JSON block found in the result".to_string(),
                    settings: String::new(),
                    data: value.to_string(),
                })
            }),
        );
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, function: PostprocessingFunction) {
        self.functions.insert(name.into(), function);
    }

    /// Register an infallible transform
    pub fn register_fn<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.register(name, Arc::new(move |value: &str| Ok(function(value))));
    }

    pub fn get(&self, name: &str) -> Option<&PostprocessingFunction> {
        self.functions.get(name)
    }

    /// Run the named functions in order
    pub fn apply(&self, names: &[String], value: String) -> Result<String, PipelineError> {
        names.iter().try_fold(value, |value, name| {
            let function = self.get(name).ok_or_else(|| {
                PipelineError::Configuration(format!(
                    "Postprocessing function \"{}\" is not registered",
                    name
                ))
            })?;
            function(&value)
        })
    }
}

impl std::fmt::Debug for PostprocessingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("PostprocessingRegistry")
            .field("functions", &names)
            .finish()
    }
}

/// Drop a dangling closing fence a model left at the end
fn trim_end_of_code_block(value: &str) -> String {
    let trimmed = value.trim_end();
    let without_fence = trimmed.strip_suffix("```").unwrap_or(trimmed);
    without_fence.trim_end().to_string()
}

/// Strip a leading "Result:" style label and surrounding quotes
fn unwrap_result(value: &str) -> String {
    let unlabeled = RESULT_PREFIX.replace(value, "");
    remove_quotes(unlabeled.trim())
}

fn remove_markdown_formatting(value: &str) -> String {
    let without_headings = MARKDOWN_HEADING.replace_all(value, "");
    MARKDOWN_EMPHASIS
        .replace_all(&without_headings, "$2")
        .into_owned()
}

/// Remove one pair of matching quotes around the whole value
fn remove_quotes(value: &str) -> String {
    let trimmed = value.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('„', '“'), ('“', '”'), ('«', '»')] {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.to_string();
        }
    }
    trimmed.to_string()
}
