//! ANSI colored output formatter
//!
//! This module provides colorful terminal output for outline trees.

use crate::models::{FileImport, GroupedImportMap, ImportMap, LanguageSection, NodeKind, OutputNode};

// ANSI escape codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const WHITE: &str = "\x1b[37m";
const MAGENTA: &str = "\x1b[35m";
const BRIGHT_RED: &str = "\x1b[91m";
const BRIGHT_YELLOW: &str = "\x1b[93m";
const BRIGHT_CYAN: &str = "\x1b[96m";
const BRIGHT_WHITE: &str = "\x1b[97m";

// Background colors
const BG_BLUE: &str = "\x1b[44m";
const BG_GREEN: &str = "\x1b[42m";
const BG_RED: &str = "\x1b[41m";

/// Get color for node kind
fn node_kind_color(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Root => BRIGHT_WHITE,
        NodeKind::Organizer => WHITE,
        NodeKind::Callable => BRIGHT_CYAN,
        NodeKind::Type => BRIGHT_YELLOW,
        NodeKind::Decorator => MAGENTA,
    }
}

/// Get icon for node kind
fn node_kind_icon(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Root => "📦",
        NodeKind::Organizer => "•",
        NodeKind::Callable => "⚡",
        NodeKind::Type => "🔷",
        NodeKind::Decorator => "🎨",
    }
}

/// Format import results as ANSI colored text
pub fn format_ansi(data: &ImportMap) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n{}{}  Outline Import Results  {}\n\n", BOLD, BG_BLUE, RESET));
    output.push_str(&format!("{}Root:{} {}\n\n", BOLD, RESET, data.root.display()));
    output.push_str(&format!(
        "{}Files:{} {}  {}Lines:{} {}  {}Nodes:{} {}  {}Perfect:{} {}/{}\n\n",
        BOLD,
        RESET,
        data.stats.total_files,
        BOLD,
        RESET,
        data.stats.total_lines,
        BOLD,
        RESET,
        data.stats.total_nodes,
        BOLD,
        RESET,
        data.stats.perfect_imports,
        data.stats.total_files
    ));

    for file in &data.files {
        output.push_str(&format_file_tree_ansi(file));
    }

    output.push_str(&footer(data.metadata.scan_duration_ms, data.metadata.files_per_second));
    output
}

/// Format grouped import results as ANSI colored text
pub fn format_grouped_ansi(data: &GroupedImportMap) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n{}{}  Outline Import Results (Grouped)  {}\n\n",
        BOLD, BG_BLUE, RESET
    ));
    output.push_str(&format!("{}Root:{} {}\n\n", BOLD, RESET, data.root.display()));

    for section in data.languages.iter().filter(|s| s.file_count > 0) {
        output.push_str(&format_language_section_ansi(section));
    }

    output.push_str(&footer(data.metadata.scan_duration_ms, data.metadata.files_per_second));
    output
}

fn footer(duration_ms: u64, files_per_second: f64) -> String {
    format!(
        "\n{}Scan completed in {}ms ({:.2} files/sec){}\n",
        DIM, duration_ms, files_per_second, RESET
    )
}

fn format_language_section_ansi(section: &LanguageSection) -> String {
    let mut output = String::new();

    output.push_str(&format!("{}{}  {}  {}\n", BOLD, BG_GREEN, section.language, RESET));
    output.push_str(&format!(
        "{}Files:{} {}  {}Nodes:{} {}  {}Lines:{} {}\n\n",
        BOLD,
        RESET,
        section.file_count,
        BOLD,
        RESET,
        section.total_nodes,
        BOLD,
        RESET,
        section.total_lines
    ));

    for file in &section.files {
        output.push_str(&format_file_tree_ansi(file));
    }

    output.push('\n');
    output
}

/// Format one file's outline with its round-trip badge
pub fn format_file_tree_ansi(file: &FileImport) -> String {
    let mut output = String::new();

    let badge = if file.perfect {
        format!("{}{} perfect {}", BOLD, BG_GREEN, RESET)
    } else {
        format!("{}{} failed {}", BOLD, BG_RED, RESET)
    };
    output.push_str(&format!(
        "{}📄 {}{} {}({}, {} lines){} {}\n",
        BOLD,
        file.path.display(),
        RESET,
        DIM,
        file.language,
        file.total_lines,
        RESET,
        badge
    ));

    if let Some(mismatch) = &file.mismatch {
        output.push_str(&format!(
            "   {}line {}: expected {:?}, got {:?}{}\n",
            BRIGHT_RED,
            mismatch.line + 1,
            mismatch.expected.as_deref().unwrap_or(""),
            mismatch.actual.as_deref().unwrap_or(""),
            RESET
        ));
    }

    for child in &file.tree.root.children {
        format_node_ansi(child, 1, &mut output);
    }

    output.push('\n');
    output
}

fn format_node_ansi(node: &OutputNode, depth: usize, output: &mut String) {
    let color = node_kind_color(node.kind);
    output.push_str(&format!(
        "{}{}{} {}{} {}{}{} {}:{}-{}{}\n",
        "   ".repeat(depth),
        color,
        node_kind_icon(node.kind),
        node.kind.label(),
        RESET,
        BOLD,
        node.headline,
        RESET,
        DIM,
        node.start_line,
        node.end_line,
        RESET
    ));

    for child in &node.children {
        format_node_ansi(child, depth + 1, output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures::{sample_file, sample_map};

    #[test]
    fn test_format_ansi_basic() {
        let output = format_ansi(&sample_map());
        assert!(output.contains("Outline Import Results"));
        assert!(output.contains("greet.py"));
        assert!(output.contains("Greeter(Base)"));
        assert!(output.contains("perfect"));
    }

    #[test]
    fn test_failed_badge_shows_mismatch() {
        let mut file = sample_file();
        file.perfect = false;
        file.mismatch = Some(crate::models::MismatchDetail {
            line: 2,
            expected: Some("x\n".to_string()),
            actual: None,
            node: None,
        });
        let output = format_file_tree_ansi(&file);
        assert!(output.contains("failed"));
        assert!(output.contains("line 3"));
    }

    #[test]
    fn test_grouped_skips_empty_sections() {
        let mut grouped = sample_map().to_grouped();
        grouped.languages.push(LanguageSection::new("starlark", vec![]));
        let output = format_grouped_ansi(&grouped);
        assert!(output.contains("python"));
        assert!(!output.contains("starlark"));
    }

    #[test]
    fn test_node_icons() {
        assert_eq!(node_kind_icon(NodeKind::Callable), "⚡");
        assert_eq!(node_kind_icon(NodeKind::Type), "🔷");
        assert_eq!(node_kind_color(NodeKind::Decorator), MAGENTA);
    }
}
