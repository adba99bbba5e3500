//! Output formatting module
//!
//! This module provides formatters for JSON, YAML, ANSI and plain summary
//! output of import results and single-file outlines.

pub mod ansi;
mod json;
mod yaml;

pub use ansi::{format_ansi, format_file_tree_ansi, format_grouped_ansi};
pub use json::{format_json, format_json_compact};
pub use yaml::format_yaml;

use crate::models::{FileImport, GroupedImportMap, ImportMap};
use thiserror::Error;

/// Output format errors
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Available output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// JSON format
    #[default]
    Json,
    /// YAML format
    Yaml,
    /// ANSI colored text
    Ansi,
    /// Plain text summary
    Summary,
}

/// Format import results in the specified format
pub fn format_output(data: &ImportMap, format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Json => format_json(data),
        OutputFormat::Yaml => format_yaml(data),
        OutputFormat::Ansi => Ok(format_ansi(data)),
        OutputFormat::Summary => Ok(format_summary(data)),
    }
}

/// Format import results grouped by language
pub fn format_output_grouped(data: &ImportMap, format: OutputFormat) -> Result<String, FormatError> {
    let grouped = data.to_grouped();
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&grouped).map_err(FormatError::from),
        OutputFormat::Yaml => serde_yaml::to_string(&grouped).map_err(FormatError::from),
        OutputFormat::Ansi => Ok(format_grouped_ansi(&grouped)),
        OutputFormat::Summary => Ok(format_summary_grouped(&grouped)),
    }
}

/// Format the outline of a single file
pub fn format_tree(file: &FileImport, format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(file).map_err(FormatError::from),
        OutputFormat::Yaml => serde_yaml::to_string(file).map_err(FormatError::from),
        OutputFormat::Ansi => Ok(format_file_tree_ansi(file)),
        OutputFormat::Summary => Ok(format_tree_summary(file)),
    }
}

/// Format as plain text summary
fn format_summary(data: &ImportMap) -> String {
    let mut output = String::new();

    output.push_str("Outline Import Results\n");
    output.push_str("======================\n\n");
    output.push_str(&format!("Root: {}\n", data.root.display()));
    output.push_str(&format!("Total Files: {}\n", data.stats.total_files));
    output.push_str(&format!("Total Lines: {}\n", data.stats.total_lines));
    output.push_str(&format!("Total Nodes: {}\n", data.stats.total_nodes));
    output.push_str(&format!("Perfect Imports: {}\n", data.stats.perfect_imports));

    output.push_str("\nLanguage Breakdown:\n");
    for (language, count) in &data.stats.files_per_language {
        output.push_str(&format!("  {}: {} files\n", language, count));
    }

    if data.stats.failed_imports > 0 {
        output.push_str(&format!("\nFailed imports: {}\n", data.stats.failed_imports));
        for file in data.files.iter().filter(|f| !f.perfect) {
            match &file.mismatch {
                Some(m) => output.push_str(&format!("  {} (line {})\n", file.path.display(), m.line + 1)),
                None => output.push_str(&format!("  {}\n", file.path.display())),
            }
        }
    }

    output.push_str(&format!("\nScan Duration: {}ms\n", data.metadata.scan_duration_ms));
    output.push_str(&format!(
        "Processing Speed: {:.2} files/sec\n",
        data.metadata.files_per_second
    ));

    output
}

/// Format grouped data as plain text summary
fn format_summary_grouped(data: &GroupedImportMap) -> String {
    let mut output = String::new();

    output.push_str("Outline Import Results (Grouped)\n");
    output.push_str("================================\n\n");
    output.push_str(&format!("Root: {}\n", data.root.display()));

    for section in &data.languages {
        output.push_str(&format!("\n{}\n", section.language));
        output.push_str(&format!("{}\n", "-".repeat(section.language.len())));
        output.push_str(&format!("  Files: {}\n", section.file_count));
        output.push_str(&format!("  Nodes: {}\n", section.total_nodes));
        output.push_str(&format!("  Lines: {}\n", section.total_lines));
        if section.failed_imports > 0 {
            output.push_str(&format!("  Failed: {} files\n", section.failed_imports));
        }
    }

    output.push_str(&format!("\nScan Duration: {}ms\n", data.metadata.scan_duration_ms));
    output.push_str(&format!(
        "Processing Speed: {:.2} files/sec\n",
        data.metadata.files_per_second
    ));

    output
}

/// Plain indented headline tree of one file
fn format_tree_summary(file: &FileImport) -> String {
    let mut output = format!("{} ({})\n", file.path.display(), file.language);
    for entry in file.tree.index.iter().skip(1) {
        output.push_str(&format!(
            "{}{} [{}] {}-{}\n",
            "  ".repeat(entry.depth),
            entry.headline,
            entry.kind.label(),
            entry.start_line,
            entry.end_line
        ));
    }
    output
}
