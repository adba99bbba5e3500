//! mta_outline_core - Core library for lossless outline import
//!
//! This crate turns indentation-structured source text into a tree of
//! outline nodes (one per function or class, with organizer nodes for the
//! loose statements in between) and proves the tree lossless by flattening
//! it back and comparing against the source.
//!
//! # Features
//!
//! - **Data-driven languages**: a language is a [`LanguageBinding`] record
//!   (comment markers, string delimiters, brackets, introducer keywords),
//!   validated once at registration. Python is built in; more can be
//!   defined in a TOML config file.
//! - **Context-aware scanning**: strings, comments, open brackets and
//!   backslash continuations never start or end a block.
//! - **Round-trip validation**: every import is checked by flattening.
//! - **Parallel directory import** with JSON, YAML and ANSI output.
//!
//! # Example
//!
//! ```rust,no_run
//! use mta_outline_core::{format_output, ImportConfig, ImportScanner, OutputFormat};
//! use std::path::PathBuf;
//!
//! let scanner = ImportScanner::new(ImportConfig::new(PathBuf::from("."))).unwrap();
//! let result = scanner.scan().unwrap();
//!
//! println!("{}", format_output(&result, OutputFormat::Summary).unwrap());
//! ```

pub mod bindings;
pub mod builder;
pub mod config;
pub mod engine;
pub mod headline;
pub mod locate;
pub mod models;
pub mod output;
pub mod policy;
pub mod scanner;
pub mod validator;

// Re-exports for convenience
pub use bindings::{BindingError, CompiledBinding, LanguageBinding, LanguageRegistry};
pub use builder::{import_source, ImportOptions, TreeBuilder, CHILD_MARKER};
pub use config::{ConfigError, ConfigFile, ImportConfig};
pub use engine::{import_file, import_text, ImportScanner, ScanError};
pub use locate::{find_block, BlockSpan};
pub use models::*;
pub use output::{format_output, format_output_grouped, format_tree, FormatError, OutputFormat};
pub use scanner::LineScanner;
pub use validator::{flatten, ImportMismatch, RoundTripValidator};
