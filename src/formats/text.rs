//! Plain text format

use super::{FormatDefinition, SubvalueDefinition, SubvalueMapper, SubvalueParameters};
use crate::core::error::PipelineError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n").expect("line break pattern is valid"));

/// Field name under which each line is handed to the mapper
pub const LINE_CONTENT: &str = "lineContent";

/// Any string is valid text
pub struct TextFormat {
    subvalues: Vec<Arc<dyn SubvalueDefinition>>,
}

impl TextFormat {
    pub fn new() -> Self {
        Self {
            subvalues: vec![Arc::new(TextLineSubvalue)],
        }
    }
}

impl Default for TextFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatDefinition for TextFormat {
    fn format_name(&self) -> &str {
        "TEXT"
    }

    fn is_valid(&self, _value: &str) -> bool {
        true
    }

    fn can_be_valid(&self, _partial_value: &str) -> bool {
        true
    }

    fn heal(&self, value: &str) -> Result<String, PipelineError> {
        Ok(value.to_string())
    }

    fn subvalue_definitions(&self) -> &[Arc<dyn SubvalueDefinition>] {
        &self.subvalues
    }
}

/// Each line of the text
pub struct TextLineSubvalue;

#[async_trait]
impl SubvalueDefinition for TextLineSubvalue {
    fn subvalue_name(&self) -> &str {
        "LINE"
    }

    async fn map_values(
        &self,
        value: &str,
        _output_parameter_name: &str,
        map: &SubvalueMapper,
    ) -> Result<String, PipelineError> {
        let mut mapped = Vec::new();

        for (index, line) in LINE_BREAK.split(value).enumerate() {
            let mut fields = SubvalueParameters::new();
            fields.insert(LINE_CONTENT.to_string(), line.to_string());
            mapped.push(map(fields, index).await?);
        }

        Ok(mapped.join("\n"))
    }
}
