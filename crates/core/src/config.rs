//! Configuration module for the outline importer
//!
//! This module provides the import configuration, the TOML configuration
//! file (which can also define extra language bindings), and the ignore
//! filtering used when walking a directory.

use crate::bindings::{builtins, BindingError, LanguageBinding, LanguageRegistry};
use crate::builder::ImportOptions;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(#[from] globset::Error),

    #[error("Failed to parse gitignore: {0}")]
    Gitignore(#[from] ignore::Error),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown language: {0}")]
    UnknownLanguage(String),

    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// Configuration for an import run
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Root directory to scan
    pub root: PathBuf,

    /// Language ids to import (None = every registered language)
    pub language_filter: Option<Vec<String>>,

    /// Custom ignore patterns
    pub ignore_patterns: Vec<String>,

    /// Path to custom ignore file
    pub ignore_file: Option<PathBuf>,

    /// Number of threads (0 = rayon default)
    pub threads: usize,

    /// Maximum file size to process (bytes)
    pub max_file_size: usize,

    /// Whether to follow symlinks
    pub follow_symlinks: bool,

    /// Whether to include hidden files
    pub include_hidden: bool,

    /// Prefix named-block headlines with their decorators
    pub include_decorators_in_headline: bool,

    /// Tab width override for every binding
    pub tab_width: Option<usize>,

    /// Override every binding's "opaque inside brackets" switch
    pub opaque_inside_brackets: Option<bool>,

    /// Extra bindings registered on top of the built-in ones
    pub bindings: Vec<LanguageBinding>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            language_filter: None,
            ignore_patterns: Vec::new(),
            ignore_file: None,
            threads: 0,
            max_file_size: 10 * 1024 * 1024, // 10 MB
            follow_symlinks: false,
            include_hidden: false,
            include_decorators_in_headline: false,
            tab_width: None,
            opaque_inside_brackets: None,
            bindings: Vec::new(),
        }
    }
}

impl ImportConfig {
    /// Create new config with root directory
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ..Default::default()
        }
    }

    pub fn with_language_filter(mut self, languages: Vec<String>) -> Self {
        self.language_filter = Some(languages);
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn with_ignore_file(mut self, path: PathBuf) -> Self {
        self.ignore_file = Some(path);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_max_file_size(mut self, size: usize) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    pub fn with_include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    pub fn with_decorators(mut self, include: bool) -> Self {
        self.include_decorators_in_headline = include;
        self
    }

    pub fn with_tab_width(mut self, tab_width: usize) -> Self {
        self.tab_width = Some(tab_width);
        self
    }

    pub fn with_opaque_inside_brackets(mut self, opaque: bool) -> Self {
        self.opaque_inside_brackets = Some(opaque);
        self
    }

    pub fn with_binding(mut self, binding: LanguageBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Per-file import options derived from this config
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            include_decorators_in_headline: self.include_decorators_in_headline,
            tab_width: self.tab_width,
            root_headline: None,
        }
    }

    /// Build the language registry: built-in bindings, then the extra ones
    /// (which replace built-ins with the same id).
    pub fn registry(&self) -> Result<LanguageRegistry, ConfigError> {
        let mut registry = LanguageRegistry::new();
        for mut binding in builtins().into_iter().chain(self.bindings.iter().cloned()) {
            if let Some(opaque) = self.opaque_inside_brackets {
                binding.opaque_inside_brackets = opaque;
            }
            registry.register(binding)?;
        }

        if let Some(filter) = &self.language_filter {
            if let Some(unknown) = filter.iter().find(|id| registry.get(id).is_none()) {
                return Err(ConfigError::UnknownLanguage(unknown.clone()));
            }
        }
        Ok(registry)
    }
}

/// Contents of a TOML configuration file.
///
/// ```toml
/// languages = ["python"]
/// ignore = ["**/migrations/**"]
/// include_decorators_in_headline = true
///
/// [[language]]
/// id = "starlark"
/// extensions = ["star", "bzl"]
/// single_line_comment = "#"
/// string_delimiters = [{ marker = '"""', triple = true }, { marker = '"' }]
/// block_introducers = [{ keyword = "def", kind = "callable" }]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub languages: Option<Vec<String>>,
    pub ignore: Vec<String>,
    pub ignore_file: Option<PathBuf>,
    pub threads: Option<usize>,
    pub max_file_size: Option<usize>,
    pub follow_symlinks: Option<bool>,
    pub include_hidden: Option<bool>,
    pub include_decorators_in_headline: Option<bool>,
    pub tab_width: Option<usize>,
    pub opaque_inside_brackets: Option<bool>,

    /// Additional language bindings, one `[[language]]` table each
    #[serde(rename = "language")]
    pub bindings: Vec<LanguageBinding>,
}

impl ConfigFile {
    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Layer the file's settings over `config`
    pub fn apply(&self, mut config: ImportConfig) -> ImportConfig {
        if let Some(languages) = &self.languages {
            config.language_filter = Some(languages.clone());
        }
        config.ignore_patterns.extend(self.ignore.iter().cloned());
        if let Some(path) = &self.ignore_file {
            config.ignore_file = Some(path.clone());
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(size) = self.max_file_size {
            config.max_file_size = size;
        }
        if let Some(follow) = self.follow_symlinks {
            config.follow_symlinks = follow;
        }
        if let Some(include) = self.include_hidden {
            config.include_hidden = include;
        }
        if let Some(include) = self.include_decorators_in_headline {
            config.include_decorators_in_headline = include;
        }
        if let Some(width) = self.tab_width {
            config.tab_width = Some(width);
        }
        if let Some(opaque) = self.opaque_inside_brackets {
            config.opaque_inside_brackets = Some(opaque);
        }
        config.bindings.extend(self.bindings.iter().cloned());
        config
    }
}

const DEFAULT_IGNORES: &[&str] = &[
    "**/.git/**",
    "**/__pycache__/**",
    "**/.venv/**",
    "**/venv/**",
    "**/.env/**",
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/target/**",
    "**/.tox/**",
    "**/.pytest_cache/**",
    "**/.mypy_cache/**",
    "**/.ruff_cache/**",
    "**/site-packages/**",
    "**/*.egg-info/**",
];

/// Filter for ignoring files and directories
pub struct IgnoreFilter {
    gitignore: Option<Gitignore>,
    custom_globs: GlobSet,
    default_ignores: GlobSet,
    include_hidden: bool,
}

impl IgnoreFilter {
    /// Create a new ignore filter from config
    pub fn new(config: &ImportConfig) -> Result<Self, ConfigError> {
        let gitignore_path = config
            .ignore_file
            .clone()
            .unwrap_or_else(|| config.root.join(".gitignore"));
        let gitignore = if gitignore_path.exists() {
            let mut builder = GitignoreBuilder::new(&config.root);
            if let Some(err) = builder.add(&gitignore_path) {
                return Err(err.into());
            }
            Some(builder.build()?)
        } else {
            None
        };

        Ok(Self {
            gitignore,
            custom_globs: build_globset(config.ignore_patterns.iter().map(String::as_str))?,
            default_ignores: build_globset(DEFAULT_IGNORES.iter().copied())?,
            include_hidden: config.include_hidden,
        })
    }

    /// Check if a path (relative to the scan root) should be ignored
    pub fn should_ignore(&self, path: &Path, is_dir: bool) -> bool {
        if !self.include_hidden {
            let hidden = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with('.'));
            if hidden {
                return true;
            }
        }

        let path_str = path.to_string_lossy();
        if self.default_ignores.is_match(&*path_str) || self.custom_globs.is_match(&*path_str) {
            return true;
        }

        self.gitignore
            .as_ref()
            .is_some_and(|gi| gi.matched(path, is_dir).is_ignore())
    }

    /// Check if a file has a registered binding that passes the language filter
    pub fn matches_language_filter(
        &self,
        path: &Path,
        registry: &LanguageRegistry,
        filter: &Option<Vec<String>>,
    ) -> bool {
        let Some(binding) = registry.for_path(path) else {
            return false;
        };

        match filter {
            Some(ids) => ids.iter().any(|id| id == binding.id()),
            None => true,
        }
    }
}

fn build_globset<'p>(patterns: impl IntoIterator<Item = &'p str>) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
