//! Quantified bounds on task output size

use crate::core::error::PipelineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Number of characters that fit on one standard line
pub const CHARACTERS_PER_STANDARD_LINE: usize = 63;

/// Number of standard lines that fit on one standard page
pub const LINES_PER_STANDARD_PAGE: usize = 44;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{M}\p{N}]+").expect("word pattern is valid"));

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"));

/// Unit in which an expectation is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExpectationUnit {
    Characters,
    Words,
    Sentences,
    Lines,
    Paragraphs,
    Pages,
}

impl ExpectationUnit {
    /// Count how many of this unit the text contains
    pub fn count(&self, text: &str) -> usize {
        match self {
            ExpectationUnit::Characters => count_characters(text),
            ExpectationUnit::Words => count_words(text),
            ExpectationUnit::Sentences => count_sentences(text),
            ExpectationUnit::Lines => count_lines(text),
            ExpectationUnit::Paragraphs => count_paragraphs(text),
            ExpectationUnit::Pages => count_pages(text),
        }
    }
}

impl fmt::Display for ExpectationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpectationUnit::Characters => "characters",
            ExpectationUnit::Words => "words",
            ExpectationUnit::Sentences => "sentences",
            ExpectationUnit::Lines => "lines",
            ExpectationUnit::Paragraphs => "paragraphs",
            ExpectationUnit::Pages => "pages",
        };
        f.write_str(name)
    }
}

/// Optional inclusive bounds for one unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

/// Expectations declared on a task, keyed by unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expectations(pub BTreeMap<ExpectationUnit, ExpectationBounds>);

impl Expectations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper used mostly by tests and programmatic pipelines
    pub fn with(mut self, unit: ExpectationUnit, min: Option<usize>, max: Option<usize>) -> Self {
        self.0.insert(unit, ExpectationBounds { min, max });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject bounds that no value could ever satisfy
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (unit, bounds) in &self.0 {
            if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
                if min > max {
                    return Err(PipelineError::Configuration(format!(
                        "Expectation for {} has min {} greater than max {}",
                        unit, min, max
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check a value against every declared bound
    pub fn check(&self, value: &str) -> Result<(), PipelineError> {
        for (unit, bounds) in &self.0 {
            let actual = unit.count(value);

            if let Some(min) = bounds.min {
                if actual < min {
                    return Err(PipelineError::ExpectationUnmet {
                        unit: *unit,
                        actual,
                        message: format!("Expected at least {} {} but got {}", min, unit, actual),
                    });
                }
            }

            if let Some(max) = bounds.max {
                if actual > max {
                    return Err(PipelineError::ExpectationUnmet {
                        unit: *unit,
                        actual,
                        message: format!("Expected at most {} {} but got {}", max, unit, actual),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn is_passing(&self, value: &str) -> bool {
        self.check(value).is_ok()
    }
}

pub fn count_characters(text: &str) -> usize {
    text.chars().count()
}

pub fn count_words(text: &str) -> usize {
    WORD.find_iter(text).count()
}

pub fn count_sentences(text: &str) -> usize {
    text.split(['.', '?', '!', ':'])
        .filter(|sentence| !sentence.trim().is_empty())
        .count()
}

/// Count standard lines; a physical line longer than a standard line wraps
pub fn count_lines(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    normalized
        .split('\n')
        .map(|line| line.chars().count().div_ceil(CHARACTERS_PER_STANDARD_LINE))
        .sum()
}

pub fn count_paragraphs(text: &str) -> usize {
    PARAGRAPH_BREAK
        .split(text)
        .filter(|paragraph| !paragraph.trim().is_empty())
        .count()
}

pub fn count_pages(text: &str) -> usize {
    count_lines(text).div_ceil(LINES_PER_STANDARD_PAGE)
}
