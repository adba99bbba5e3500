//! mta-outline CLI
//!
//! Imports indentation-structured source files into outline trees and
//! checks that every tree flattens back to its source.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use mta_outline_core::{
    find_block, flatten, format_output, format_output_grouped, format_tree, import_file, ConfigFile,
    FileImport, ImportConfig, ImportScanner, LanguageRegistry, OutputFormat,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lossless outline import for indentation-structured source
#[derive(Parser)]
#[command(name = "mta-outline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lossless outline import - split source files into a tree of named blocks")]
#[command(long_about = r#"
mta-outline: Lossless Outline Import

Splits indentation-structured source files into a tree of nodes, one per
function or class, with organizer nodes for the statements in between.
Every tree is validated by flattening it back and comparing with the source.

Languages are data: Python is built in, more can be defined in a TOML
config file with [[language]] tables.

Output formats:
  - JSON (default) - Structured JSON for programmatic use
  - YAML - Human-readable YAML format
  - ANSI - Colorful terminal tree with round-trip badges
  - Summary - Plain text totals

Examples:
  mta-outline .                          # Import every file under .
  mta-outline --format ansi              # Colorful terminal output
  mta-outline --grouped --format summary # Totals per language
  mta-outline file src/app.py            # Outline of one file
  mta-outline check src/app.py           # Round-trip one file (error exit on mismatch)
  mta-outline flatten src/app.py         # Print the reconstructed text
  mta-outline --config outline.toml .    # Extra languages and settings
"#)]
pub struct Args {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to scan (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormatArg::Json, global = true)]
    pub format: OutputFormatArg,

    /// Only import these language ids (can be specified multiple times)
    #[arg(short, long, action = ArgAction::Append, global = true)]
    pub language: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Prefix headlines with the decorators of their definition
    #[arg(long, global = true)]
    pub decorators: bool,

    /// Tab width used to measure indentation
    #[arg(long, global = true)]
    pub tab_width: Option<usize>,

    /// Group output by language
    #[arg(long, global = true)]
    pub grouped: bool,

    /// Ignore patterns (can be specified multiple times)
    #[arg(long, action = ArgAction::Append, global = true)]
    pub ignore: Vec<String>,

    /// Number of threads for parallel processing (default: auto)
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Import every source file under a directory
    Scan {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show the outline of a single file
    File {
        /// Path to file
        path: PathBuf,
    },

    /// Round-trip a single file and report the first difference
    Check {
        /// Path to file
        path: PathBuf,
    },

    /// Print the text reconstructed from a file's outline
    Flatten {
        /// Path to file
        path: PathBuf,
    },

    /// Locate the first named block in a file
    Locate {
        /// Path to file
        path: PathBuf,
    },

    /// List the registered languages
    Languages,
}

/// Output format argument
#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Ansi,
    Summary,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Yaml => OutputFormat::Yaml,
            OutputFormatArg::Ansi => OutputFormat::Ansi,
            OutputFormatArg::Summary => OutputFormat::Summary,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    if args.output.is_some() || !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }

    match &args.command {
        Some(Commands::Scan { path }) => run_scan(path, &args),
        Some(Commands::File { path }) => run_file(path, &args),
        Some(Commands::Check { path }) => run_check(path, &args),
        Some(Commands::Flatten { path }) => run_flatten(path, &args),
        Some(Commands::Locate { path }) => run_locate(path, &args),
        Some(Commands::Languages) => run_languages(&args),
        None => run_scan(&args.path, &args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Build configuration from the config file (if any) and the arguments
fn build_config(path: &Path, args: &Args) -> Result<ImportConfig> {
    let mut config = ImportConfig::new(path.to_path_buf());

    if let Some(config_path) = &args.config {
        let file = ConfigFile::load(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?;
        debug!("loaded config {} ({} extra languages)", config_path.display(), file.bindings.len());
        config = file.apply(config);
    }

    config.ignore_patterns.extend(args.ignore.iter().cloned());
    if !args.language.is_empty() {
        config = config.with_language_filter(args.language.clone());
    }
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if args.decorators {
        config = config.with_decorators(true);
    }
    if let Some(tab_width) = args.tab_width {
        config = config.with_tab_width(tab_width);
    }

    Ok(config)
}

fn load_file(path: &Path, args: &Args) -> Result<FileImport> {
    let config = build_config(path, args)?;
    let registry = config.registry().context("Invalid language configuration")?;
    import_file(path, &registry, &config.import_options())
        .with_context(|| format!("Failed to import {}", path.display()))
}

fn run_scan(path: &Path, args: &Args) -> Result<()> {
    let config = build_config(path, args)?;

    let spinner = if atty::is(atty::Stream::Stderr) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Importing files...");
        Some(pb)
    } else {
        None
    };

    let scanner = ImportScanner::new(config).context("Failed to create scanner")?;
    let result = scanner.scan().context("Failed to scan directory")?;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let format: OutputFormat = args.format.clone().into();
    let output = if args.grouped {
        format_output_grouped(&result, format)?
    } else {
        format_output(&result, format)?
    };

    write_output(&output, args.output.as_deref())
}

fn run_file(path: &Path, args: &Args) -> Result<()> {
    let file = load_file(path, args)?;
    let output = format_tree(&file, args.format.clone().into())?;
    write_output(&output, args.output.as_deref())
}

fn run_check(path: &Path, args: &Args) -> Result<()> {
    let file = load_file(path, args)?;

    let Some(mismatch) = &file.mismatch else {
        let report = format!(
            "{} {} ({} nodes, {} lines)\n",
            "✓ perfect import:".green().bold(),
            path.display(),
            file.total_nodes(),
            file.total_lines
        );
        return write_output(&report, args.output.as_deref());
    };

    let mut report = format!("{} {}\n", "✗ round-trip mismatch:".red().bold(), path.display());
    report.push_str(&format!("  {} {}\n", "line:".bold(), mismatch.line + 1));
    if let Some(node) = &mismatch.node {
        report.push_str(&format!("  {} {}\n", "node:".bold(), node.cyan()));
    }
    let expected = format!("{:?}", mismatch.expected.as_deref().unwrap_or("<end of text>"));
    let actual = format!("{:?}", mismatch.actual.as_deref().unwrap_or("<end of text>"));
    report.push_str(&format!("  {} {}\n", "expected:".bold(), expected.as_str().green()));
    report.push_str(&format!("  {} {}\n", "actual:  ".bold(), actual.as_str().red()));
    write_output(&report, args.output.as_deref())?;

    anyhow::bail!("{} does not round-trip", path.display())
}

fn run_flatten(path: &Path, args: &Args) -> Result<()> {
    let file = load_file(path, args)?;
    write_output(&flatten(&file.tree), args.output.as_deref())
}

fn run_locate(path: &Path, args: &Args) -> Result<()> {
    let config = build_config(path, args)?;
    let registry = config.registry().context("Invalid language configuration")?;
    let binding = registry
        .for_path(path)
        .with_context(|| format!("No language binding for {}", path.display()))?;
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let Some(span) = find_block(&text, binding) else {
        anyhow::bail!("No block found in {}", path.display());
    };

    let format: OutputFormat = args.format.clone().into();
    let output = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&span)?,
        OutputFormat::Yaml => serde_yaml::to_string(&span)?,
        OutputFormat::Ansi | OutputFormat::Summary => format!(
            "{} {} lines {}-{}\n{}",
            span.kind.label().bold(),
            path.display(),
            span.start_line,
            span.end_line,
            span.slice(&text)
        ),
    };
    write_output(&output, args.output.as_deref())
}

fn run_languages(args: &Args) -> Result<()> {
    let config = build_config(&args.path, args)?;
    let registry: LanguageRegistry = config.registry().context("Invalid language configuration")?;

    for binding in registry.iter() {
        let raw = binding.binding();
        let introducers: Vec<_> = raw
            .block_introducers
            .iter()
            .map(|i| format!("{} ({})", i.keyword, i.kind.label()))
            .collect();
        let extensions = format!("[.{}]", raw.extensions.join(", ."));
        println!("{} {}", binding.id().bold(), extensions.as_str().dimmed());
        println!("  introducers: {}", introducers.join(", "));
        if let Some(prefix) = &raw.decorator_prefix {
            println!("  decorators:  {}", prefix);
        }
    }
    Ok(())
}

fn write_output(output: &str, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        fs::write(path, output).context("Failed to write output file")?;
    } else if output.ends_with('\n') {
        print!("{}", output);
    } else {
        println!("{}", output);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use tempfile::TempDir;

    #[test]
    fn test_check_writes_report_to_output_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("app.py");
        let report = dir.path().join("report.txt");
        fs::write(&source, "def f():\n    return 1\n").unwrap();

        let args = Args::parse_from([
            OsString::from("mta-outline"),
            OsString::from("--output"),
            report.clone().into_os_string(),
            OsString::from("check"),
            source.clone().into_os_string(),
        ]);
        let Some(Commands::Check { path }) = &args.command else {
            panic!("expected the check subcommand");
        };

        run_check(path, &args).unwrap();
        let written = fs::read_to_string(&report).unwrap();
        assert!(written.contains("perfect import"));
        assert!(written.contains("app.py"));
    }

    #[test]
    fn test_check_fails_on_unsupported_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("notes.txt");
        fs::write(&source, "hello\n").unwrap();

        let args = Args::parse_from(["mta-outline", "check", source.to_str().unwrap()]);
        assert!(run_check(&source, &args).is_err());
    }
}
