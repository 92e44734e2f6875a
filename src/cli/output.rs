//! Output formatting utilities

use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::OutputFormat;

/// Print `value` as JSON or YAML when one of those formats was requested
///
/// Returns `false` for the text formats so the caller renders its own view.
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
            Ok(true)
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(value).into_diagnostic()?);
            Ok(true)
        }
        OutputFormat::Auto | OutputFormat::Tsv => Ok(false),
    }
}

/// Join fields into one TSV line, flattening embedded tabs and newlines
pub fn tsv_line<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| f.as_ref().replace(['\t', '\n'], " "))
        .collect::<Vec<_>>()
        .join("\t")
}
