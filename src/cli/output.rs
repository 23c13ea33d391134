//! CLI output formatting (JSON, YAML, table).
//!
//! All CLI output supports structured formats for machine consumption.

use crate::core::error::{ExitCode, PbxError};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Table};
use serde::Serialize;
use std::collections::BTreeMap;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// Machine-readable JSON format.
    Json,
    /// YAML output format.
    Yaml,
}

/// Structured CLI response.
#[derive(Debug, Serialize)]
pub struct CliResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOutput>,
}

/// Structured error output.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub kind: String,
    pub code: String,
    pub message: String,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl From<&PbxError> for ErrorOutput {
    fn from(err: &PbxError) -> Self {
        Self {
            kind: err.kind.to_string(),
            code: err.code.clone(),
            message: err.message.clone(),
            origin: err.origin.clone(),
            hint: err.recovery_hint.clone(),
            candidates: err.candidates.clone(),
            context: err.context.clone(),
        }
    }
}

impl<T: Serialize> CliResponse<T> {
    /// Creates a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Creates an error response.
    pub fn error(err: &PbxError) -> CliResponse<()> {
        CliResponse {
            success: false,
            data: None,
            error: Some(ErrorOutput::from(err)),
        }
    }
}

/// Outputs data in the specified format. Table output falls back to
/// pretty JSON for values without a dedicated table.
pub fn output<T: Serialize>(data: T, format: OutputFormat) -> std::io::Result<()> {
    match format {
        OutputFormat::Json => {
            let response = CliResponse::success(data);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Table => {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        OutputFormat::Yaml => {
            let response = CliResponse::success(data);
            if let Ok(yaml) = serde_yaml::to_string(&response) {
                print!("{yaml}");
            }
        }
    }
    Ok(())
}

/// Outputs an error in the specified format.
pub fn output_error(err: &PbxError, format: OutputFormat) -> ExitCode {
    match format {
        OutputFormat::Json => {
            let response = CliResponse::<()>::error(err);
            if let Ok(json) = serde_json::to_string_pretty(&response) {
                eprintln!("{json}");
            }
        }
        OutputFormat::Yaml => {
            let response = CliResponse::<()>::error(err);
            if let Ok(yaml) = serde_yaml::to_string(&response) {
                eprint!("{yaml}");
            }
        }
        OutputFormat::Table => {
            eprintln!("Error: {err}");
            for candidate in &err.candidates {
                eprintln!("  - {candidate}");
            }
            if let Some(hint) = &err.recovery_hint {
                eprintln!("Hint: {hint}");
            }
        }
    }
    ExitCode::from(err)
}

/// Helper to create a table with headers.
#[must_use]
pub fn create_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(headers.iter().map(|h| Cell::new(*h)));
    table
}

/// Types that can be displayed as a table row.
pub trait TableRow {
    fn headers() -> &'static [&'static str];
    fn to_row(&self) -> Vec<String>;
}

/// Renders rows as a table, or `empty` when there are none.
pub fn print_table<R: TableRow>(rows: &[R], empty: &str) {
    if rows.is_empty() {
        println!("{empty}");
        return;
    }
    let mut table = create_table(R::headers());
    for row in rows {
        table.add_row(row.to_row());
    }
    println!("{table}");
}

/// Prints rows as a table or the rows themselves as structured data.
pub fn output_rows<R: TableRow + Serialize>(rows: &[R], format: OutputFormat, empty: &str) {
    match format {
        OutputFormat::Table => print_table(rows, empty),
        _ => {
            if let Err(err) = output(rows, format) {
                eprintln!("Failed to render output: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    impl TableRow for TestData {
        fn headers() -> &'static [&'static str] {
            &["NAME", "VALUE"]
        }

        fn to_row(&self) -> Vec<String> {
            vec![self.name.clone(), self.value.to_string()]
        }
    }

    #[test]
    fn cli_response_success_serialization() {
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };
        let response = CliResponse::success(data);
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"name\":\"test\""));
    }

    #[test]
    fn cli_response_error_serialization() {
        let err = PbxError::ambiguous(
            "Model.swift",
            vec!["A/Model.swift".to_string(), "B/Model.swift".to_string()],
            "resolver:file",
        );
        let response = CliResponse::<()>::error(&err);
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"kind\":\"ambiguous_reference\""));
        assert!(json.contains("\"candidates\":[\"A/Model.swift\",\"B/Model.swift\"]"));
    }

    #[test]
    fn table_has_one_line_per_row() {
        let rows = [
            TestData {
                name: "a".to_string(),
                value: 1,
            },
            TestData {
                name: "b".to_string(),
                value: 2,
            },
        ];
        let mut table = create_table(TestData::headers());
        for row in &rows {
            table.add_row(row.to_row());
        }
        let rendered = table.to_string();
        assert!(rendered.contains("NAME"));
        assert!(rendered.contains('b'));
    }
}
