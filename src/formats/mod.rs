//! Format contracts for task output
//!
//! A format knows whether a value conforms to it, how to repair a value that
//! almost does, and how to split a value into sub-values (lines, rows, cells)
//! that a task can be run over one at a time.

pub mod csv;
pub mod json;
pub mod text;

use crate::core::error::PipelineError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub use self::csv::{CsvFormat, CsvSettings, CsvTable};
pub use self::json::{extract_json_block, JsonFormat};
pub use self::text::TextFormat;

/// Fields of one sub-value, keyed by field name
pub type SubvalueParameters = HashMap<String, String>;

/// Future returned by a sub-value mapper
pub type SubvalueFuture = BoxFuture<'static, Result<String, PipelineError>>;

/// Callback computing the new content of one sub-value from its fields and index
pub type SubvalueMapper = dyn Fn(SubvalueParameters, usize) -> SubvalueFuture + Send + Sync;

/// A way of decomposing a formatted value
#[async_trait]
pub trait SubvalueDefinition: Send + Sync {
    /// Name such as `ROW`, `CELL` or `LINE`
    fn subvalue_name(&self) -> &str;

    /// Run the mapper on every sub-value and rebuild the value from the results
    async fn map_values(
        &self,
        value: &str,
        output_parameter_name: &str,
        map: &SubvalueMapper,
    ) -> Result<String, PipelineError>;
}

/// A named output format
pub trait FormatDefinition: Send + Sync {
    fn format_name(&self) -> &str;

    fn is_valid(&self, value: &str) -> bool;

    /// Whether a partial value (e.g. a stream prefix) could still become valid
    fn can_be_valid(&self, partial_value: &str) -> bool;

    /// Try to turn an invalid value into a valid one
    fn heal(&self, value: &str) -> Result<String, PipelineError>;

    fn subvalue_definitions(&self) -> &[Arc<dyn SubvalueDefinition>];

    /// Settings reported alongside validation errors
    fn settings_description(&self) -> String {
        String::new()
    }

    fn subvalue_definition(&self, subvalue_name: &str) -> Option<Arc<dyn SubvalueDefinition>> {
        self.subvalue_definitions()
            .iter()
            .find(|definition| definition.subvalue_name().eq_ignore_ascii_case(subvalue_name))
            .cloned()
    }
}

/// Formats available to a pipeline run, looked up case-insensitively
#[derive(Clone, Default)]
pub struct FormatRegistry {
    formats: HashMap<String, Arc<dyn FormatDefinition>>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with TEXT, JSON and CSV
    pub fn with_defaults(csv_settings: CsvSettings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TextFormat::new()));
        registry.register(Arc::new(JsonFormat::new()));
        registry.register(Arc::new(CsvFormat::new(csv_settings)));
        registry
    }

    /// Register a format, replacing any format with the same name
    pub fn register(&mut self, format: Arc<dyn FormatDefinition>) {
        self.formats
            .insert(format.format_name().to_uppercase(), format);
    }

    pub fn get(&self, format_name: &str) -> Option<Arc<dyn FormatDefinition>> {
        self.formats.get(&format_name.to_uppercase()).cloned()
    }

    pub fn format_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.formats.keys().cloned().collect();
        names.sort();
        names
    }

    /// Return the value if valid, otherwise its healed form
    pub fn validate_or_heal(&self, format_name: &str, value: &str) -> Result<String, PipelineError> {
        let format = self.get(format_name).ok_or_else(|| {
            PipelineError::Configuration(format!("Format \"{}\" is not registered", format_name))
        })?;

        if format.is_valid(value) {
            return Ok(value.to_string());
        }

        debug!("Value is not valid {}, trying to heal it", format.format_name());
        let healed = format.heal(value)?;
        if !format.is_valid(&healed) {
            return Err(PipelineError::FormatValidation {
                format_name: format.format_name().to_string(),
                message: "Healed value is still not valid".to_string(),
                settings: format.settings_description(),
                data: healed,
            });
        }

        Ok(healed)
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.format_names())
            .finish()
    }
}
