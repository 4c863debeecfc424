//! CSV format with `ROW` and `CELL` sub-values

use super::{FormatDefinition, SubvalueDefinition, SubvalueMapper, SubvalueParameters};
use crate::core::error::PipelineError;
use ::csv::{ReaderBuilder, Terminator, WriterBuilder};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::warn;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[\w-]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").expect("fence pattern is valid")
});

const FORMAT_NAME: &str = "CSV";

/// Dialect used to read and write CSV values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CsvSettings {
    pub delimiter: char,
    pub quote_char: char,
    pub newline: String,
    /// Ignore records whose fields are all blank
    pub skip_empty_lines: bool,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote_char: '"',
            newline: "\n".to_string(),
            skip_empty_lines: true,
        }
    }
}

impl CsvSettings {
    fn delimiter_byte(&self) -> Result<u8, PipelineError> {
        ascii_byte(self.delimiter, "delimiter")
    }

    fn quote_byte(&self) -> Result<u8, PipelineError> {
        ascii_byte(self.quote_char, "quote character")
    }

    fn terminator(&self) -> Result<Terminator, PipelineError> {
        match self.newline.as_str() {
            "\r\n" => Ok(Terminator::CRLF),
            newline if newline.len() == 1 && newline.is_ascii() => {
                Ok(Terminator::Any(newline.as_bytes()[0]))
            }
            newline => Err(PipelineError::Configuration(format!(
                "CSV newline {:?} must be \"\\r\\n\" or a single ASCII character",
                newline
            ))),
        }
    }

    /// Line breaks accept any of `\r`, `\n` and `\r\n` when reading
    fn reader_terminator(&self) -> Result<Terminator, PipelineError> {
        match self.newline.as_str() {
            "\n" | "\r\n" | "\r" => Ok(Terminator::CRLF),
            _ => self.terminator(),
        }
    }

    fn uses_line_breaks(&self) -> bool {
        matches!(self.newline.as_str(), "\n" | "\r\n" | "\r")
    }

    fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn ascii_byte(character: char, what: &str) -> Result<u8, PipelineError> {
    if character.is_ascii() {
        Ok(character as u8)
    } else {
        Err(PipelineError::Configuration(format!(
            "CSV {} {:?} must be an ASCII character",
            what, character
        )))
    }
}

/// A parsed CSV value: the header row plus records of equal width
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// The fields of one row keyed by column name
    pub fn row_fields(&self, row_index: usize) -> SubvalueParameters {
        self.headers
            .iter()
            .cloned()
            .zip(self.rows[row_index].iter().cloned())
            .collect()
    }
}

fn validation_error(message: impl ToString, settings: &CsvSettings, data: &str) -> PipelineError {
    PipelineError::FormatValidation {
        format_name: FORMAT_NAME.to_string(),
        message: message.to_string(),
        settings: settings.describe(),
        data: data.to_string(),
    }
}

/// Parse a CSV value with a mandatory header row
pub fn parse_csv(value: &str, settings: &CsvSettings) -> Result<CsvTable, PipelineError> {
    let normalized;
    let value = if settings.uses_line_breaks() && value.contains('\r') && !value.contains('\n') {
        warn!("CSV value uses carriage returns only as line endings, normalizing them");
        normalized = value.replace('\r', &settings.newline);
        normalized.as_str()
    } else {
        value
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(settings.delimiter_byte()?)
        .quote(settings.quote_byte()?)
        .terminator(settings.reader_terminator()?)
        .has_headers(true)
        .flexible(true)
        .from_reader(value.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|error| validation_error(error, settings, value))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|error| validation_error(error, settings, value))?;

        if settings.skip_empty_lines && record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        if record.len() != headers.len() {
            let line = record.position().map_or(0, |position| position.line());
            return Err(validation_error(
                format!(
                    "Record on line {} has {} fields but the header has {}",
                    line,
                    record.len(),
                    headers.len()
                ),
                settings,
                value,
            ));
        }

        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(CsvTable { headers, rows })
}

/// Serialize a table back to CSV, without a trailing newline
pub fn write_csv(table: &CsvTable, settings: &CsvSettings) -> Result<String, PipelineError> {
    let mut writer = WriterBuilder::new()
        .delimiter(settings.delimiter_byte()?)
        .quote(settings.quote_byte()?)
        .terminator(settings.terminator()?)
        .from_writer(Vec::new());

    let to_error = |error: ::csv::Error| validation_error(error, settings, "");

    if !table.headers.is_empty() {
        writer.write_record(&table.headers).map_err(to_error)?;
    }
    for row in &table.rows {
        writer.write_record(row).map_err(to_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| validation_error(error.to_string(), settings, ""))?;
    let mut text = String::from_utf8(bytes)
        .map_err(|error| PipelineError::Unexpected(format!("CSV writer produced invalid UTF-8: {}", error)))?;

    if text.ends_with(&settings.newline) {
        text.truncate(text.len() - settings.newline.len());
    }

    Ok(text)
}

/// Comma separated values with a header row
pub struct CsvFormat {
    settings: CsvSettings,
    subvalues: Vec<Arc<dyn SubvalueDefinition>>,
}

impl CsvFormat {
    pub fn new(settings: CsvSettings) -> Self {
        let subvalues: Vec<Arc<dyn SubvalueDefinition>> = vec![
            Arc::new(CsvRowSubvalue {
                settings: settings.clone(),
            }),
            Arc::new(CsvCellSubvalue {
                settings: settings.clone(),
            }),
        ];
        Self {
            settings,
            subvalues,
        }
    }

    pub fn settings(&self) -> &CsvSettings {
        &self.settings
    }
}

impl FormatDefinition for CsvFormat {
    fn format_name(&self) -> &str {
        FORMAT_NAME
    }

    fn is_valid(&self, value: &str) -> bool {
        parse_csv(value, &self.settings).is_ok()
    }

    fn can_be_valid(&self, _partial_value: &str) -> bool {
        true
    }

    fn settings_description(&self) -> String {
        self.settings.describe()
    }

    fn heal(&self, value: &str) -> Result<String, PipelineError> {
        let unfenced = FENCED_BLOCK
            .captures(value)
            .and_then(|captures| captures.get(1))
            .map_or(value, |body| body.as_str());

        let healed = if self.settings.uses_line_breaks() {
            unfenced.replace("\r\n", "\n").replace('\r', "\n")
        } else {
            unfenced.to_string()
        };
        let healed = healed
            .trim_end()
            .trim_end_matches(self.settings.newline.as_str())
            .to_string();

        parse_csv(&healed, &self.settings)?;
        Ok(healed)
    }

    fn subvalue_definitions(&self) -> &[Arc<dyn SubvalueDefinition>] {
        &self.subvalues
    }
}

/// Each record; the mapper result becomes a new column
pub struct CsvRowSubvalue {
    settings: CsvSettings,
}

#[async_trait]
impl SubvalueDefinition for CsvRowSubvalue {
    fn subvalue_name(&self) -> &str {
        "ROW"
    }

    async fn map_values(
        &self,
        value: &str,
        output_parameter_name: &str,
        map: &SubvalueMapper,
    ) -> Result<String, PipelineError> {
        let mut table = parse_csv(value, &self.settings)?;

        if table.headers.iter().any(|header| header == output_parameter_name) {
            return Err(PipelineError::ColumnCollision {
                format_name: FORMAT_NAME.to_string(),
                column: output_parameter_name.to_string(),
            });
        }

        let mut results = Vec::with_capacity(table.rows.len());
        for index in 0..table.rows.len() {
            results.push(map(table.row_fields(index), index).await?);
        }

        table.headers.push(output_parameter_name.to_string());
        for (row, result) in table.rows.iter_mut().zip(results) {
            row.push(result);
        }

        write_csv(&table, &self.settings)
    }
}

/// Each individual cell; the mapper result replaces the cell
pub struct CsvCellSubvalue {
    settings: CsvSettings,
}

#[async_trait]
impl SubvalueDefinition for CsvCellSubvalue {
    fn subvalue_name(&self) -> &str {
        "CELL"
    }

    async fn map_values(
        &self,
        value: &str,
        _output_parameter_name: &str,
        map: &SubvalueMapper,
    ) -> Result<String, PipelineError> {
        let mut table = parse_csv(value, &self.settings)?;
        let columns = table.headers.len();

        for row_index in 0..table.rows.len() {
            for column_index in 0..columns {
                let mut fields = SubvalueParameters::new();
                fields.insert(
                    table.headers[column_index].clone(),
                    table.rows[row_index][column_index].clone(),
                );

                let mapped = map(fields, row_index * columns + column_index).await?;
                table.rows[row_index][column_index] = mapped;
            }
        }

        write_csv(&table, &self.settings)
    }
}
