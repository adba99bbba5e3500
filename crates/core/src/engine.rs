//! Import engine module
//!
//! This module walks a directory, imports every source file with a
//! registered language binding, and validates each outline by round trip.
//! Files are independent, so they are imported in parallel.

use crate::bindings::{CompiledBinding, LanguageRegistry};
use crate::builder::{import_source, ImportOptions};
use crate::config::{IgnoreFilter, ImportConfig};
use crate::models::{FileImport, ImportMap, ImportStats, ScanMetadata};
use crate::validator::RoundTripValidator;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use walkdir::WalkDir;

/// Scanner errors
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("No language binding for {0}")]
    UnsupportedFile(PathBuf),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

/// Directory importer
pub struct ImportScanner {
    config: ImportConfig,
    registry: LanguageRegistry,
    ignore_filter: IgnoreFilter,
}

impl ImportScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ImportConfig) -> Result<Self, ScanError> {
        let registry = config.registry()?;
        let ignore_filter = IgnoreFilter::new(&config)?;
        Ok(Self {
            config,
            registry,
            ignore_filter,
        })
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    /// Import every matching file under the configured root
    pub fn scan(&self) -> Result<ImportMap, ScanError> {
        let start = Instant::now();
        let source_files = self.find_source_files();
        debug!("found {} source files under {}", source_files.len(), self.config.root.display());

        let mut files: Vec<FileImport> = if self.config.threads == 1 {
            source_files
                .iter()
                .filter_map(|path| self.import_entry(path))
                .collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.threads)
                .build()
                .map_err(|e| ScanError::ThreadPoolError(e.to_string()))?;

            pool.install(|| {
                source_files
                    .par_iter()
                    .filter_map(|path| self.import_entry(path))
                    .collect()
            })
        };
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut stats = ImportStats::default();
        for file in &files {
            stats.add_file(file);
        }

        let duration = start.elapsed();
        let metadata = ScanMetadata {
            scan_duration_ms: duration.as_millis() as u64,
            files_per_second: if duration.as_secs_f64() > 0.0 {
                files.len() as f64 / duration.as_secs_f64()
            } else {
                files.len() as f64
            },
            ..ScanMetadata::default()
        };
        info!(
            "imported {} files ({} perfect, {} failed) in {} ms",
            stats.total_files, stats.perfect_imports, stats.failed_imports, metadata.scan_duration_ms
        );

        Ok(ImportMap {
            root: self.config.root.clone(),
            files,
            stats,
            metadata,
        })
    }

    /// Find all source files matching the configuration
    fn find_source_files(&self) -> Vec<PathBuf> {
        let root = &self.config.root;
        let walker = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .into_iter()
            .filter_entry(|e| {
                // The root itself is never filtered
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                !self.ignore_filter.should_ignore(relative(e.path(), root), true)
            });

        let mut files = Vec::new();
        for entry in walker.filter_map(|e| e.ok()) {
            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            if entry.depth() > 0 && self.ignore_filter.should_ignore(relative(path, root), false) {
                continue;
            }
            if !self.ignore_filter.matches_language_filter(
                path,
                &self.registry,
                &self.config.language_filter,
            ) {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                if metadata.len() as usize > self.config.max_file_size {
                    debug!("skipping {} ({} bytes)", path.display(), metadata.len());
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }
        files
    }

    fn import_entry(&self, path: &Path) -> Option<FileImport> {
        let binding = self.registry.for_path(path)?;
        match read_source(path) {
            Ok(source) => {
                let mut file = import_text(&source, path, binding, &self.config.import_options());
                file.path = relative(path, &self.config.root).to_path_buf();
                Some(file)
            }
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }
}

/// Import a single file, picking the binding from its extension
pub fn import_file(
    path: &Path,
    registry: &LanguageRegistry,
    options: &ImportOptions,
) -> Result<FileImport, ScanError> {
    let binding = registry
        .for_path(path)
        .ok_or_else(|| ScanError::UnsupportedFile(path.to_path_buf()))?;
    let source = read_source(path)?;
    Ok(import_text(&source, path, binding, options))
}

/// Import and validate already-loaded source text
pub fn import_text(
    source: &str,
    path: &Path,
    binding: &CompiledBinding,
    options: &ImportOptions,
) -> FileImport {
    let mut options = options.clone();
    if options.root_headline.is_none() {
        options.root_headline = path.file_name().map(|name| name.to_string_lossy().into_owned());
    }

    let tree = import_source(source, binding, &options);
    let mismatch = RoundTripValidator::new(binding)
        .verify(source, &tree)
        .err()
        .map(|e| e.0);
    debug!(
        "{}: {} nodes, {}",
        path.display(),
        tree.total_nodes(),
        if mismatch.is_none() { "perfect" } else { "mismatch" }
    );

    FileImport {
        path: path.to_path_buf(),
        absolute_path: path.canonicalize().unwrap_or_else(|_| path.to_path_buf()),
        language: binding.id().to_string(),
        total_lines: tree.line_count,
        perfect: mismatch.is_none(),
        mismatch,
        tree,
    }
}

fn read_source(path: &Path) -> Result<String, ScanError> {
    fs::read_to_string(path).map_err(|source| ScanError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn relative<'p>(path: &'p Path, root: &Path) -> &'p Path {
    path.strip_prefix(root).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{Introducer, LanguageBinding, StringDelimiter};
    use crate::models::BlockKind;
    use tempfile::TempDir;

    fn create_test_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        fs::write(
            root.join("app.py"),
            "import os\n\nclass Service:\n    def run(self):\n        pass\n\ndef main():\n    Service().run()\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("pkg/util.py"), "def helper(x):\n    return x * 2\n").unwrap();
        fs::create_dir_all(root.join("pkg/__pycache__")).unwrap();
        fs::write(root.join("pkg/__pycache__/util.py"), "def cached():\n    pass\n").unwrap();
        fs::write(root.join(".hidden.py"), "x = 1\n").unwrap();
        fs::write(root.join("notes.txt"), "def not_python():\n").unwrap();
        fs::write(root.join("BUILD.star"), "def rule(name):\n    \"\"\"doc\"\"\"\n    pass\n").unwrap();

        dir
    }

    fn starlark() -> LanguageBinding {
        LanguageBinding {
            id: "starlark".to_string(),
            extensions: vec!["star".to_string()],
            single_line_comment: Some("#".to_string()),
            block_comment: None,
            string_delimiters: vec![StringDelimiter::triple("\"\"\""), StringDelimiter::single("\"")],
            block_introducers: vec![Introducer::new("def", BlockKind::Callable)],
            brackets: vec![],
            indent_width: 4,
            escape: Some('\\'),
            line_continuation: None,
            decorator_prefix: None,
            opaque_inside_brackets: false,
        }
    }

    #[test]
    fn test_scan_directory() {
        let dir = create_test_project();
        let scanner = ImportScanner::new(ImportConfig::new(dir.path().to_path_buf())).unwrap();
        let result = scanner.scan().unwrap();

        let paths: Vec<_> = result.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("app.py"), PathBuf::from("pkg/util.py")]);
        assert_eq!(result.stats.total_files, 2);
        assert_eq!(result.stats.perfect_imports, 2);
        assert_eq!(result.stats.files_per_language.get("python"), Some(&2));

        let app = &result.files[0];
        assert_eq!(app.tree.root.headline, "app.py");
        assert!(app.tree.find("Service").is_some());
        assert!(app.tree.find("run").is_some());
        assert!(app.tree.find("main").is_some());
    }

    #[test]
    fn test_single_thread_matches_parallel() {
        let dir = create_test_project();
        let root = dir.path().to_path_buf();
        let parallel = ImportScanner::new(ImportConfig::new(root.clone())).unwrap().scan().unwrap();
        let serial = ImportScanner::new(ImportConfig::new(root).with_threads(1))
            .unwrap()
            .scan()
            .unwrap();

        let trees = |map: &ImportMap| map.files.iter().map(|f| f.tree.clone()).collect::<Vec<_>>();
        assert_eq!(trees(&parallel), trees(&serial));
    }

    #[test]
    fn test_extra_binding_and_language_filter() {
        let dir = create_test_project();
        let config = ImportConfig::new(dir.path().to_path_buf())
            .with_binding(starlark())
            .with_language_filter(vec!["starlark".to_string()]);
        let result = ImportScanner::new(config).unwrap().scan().unwrap();

        assert_eq!(result.stats.total_files, 1);
        assert_eq!(result.files[0].language, "starlark");
        assert!(result.files[0].perfect);
        assert!(result.files[0].tree.find("rule").is_some());
    }

    #[test]
    fn test_include_hidden() {
        let dir = create_test_project();
        let config = ImportConfig::new(dir.path().to_path_buf()).with_include_hidden(true);
        let result = ImportScanner::new(config).unwrap().scan().unwrap();
        assert!(result.files.iter().any(|f| f.path == Path::new(".hidden.py")));
    }

    #[test]
    fn test_import_file() {
        let dir = create_test_project();
        let registry = LanguageRegistry::with_builtins();

        let file = import_file(&dir.path().join("pkg/util.py"), &registry, &ImportOptions::default()).unwrap();
        assert_eq!(file.language, "python");
        assert_eq!(file.total_lines, 2);
        assert_eq!(file.total_nodes(), 1);
        assert!(file.perfect);

        assert!(matches!(
            import_file(&dir.path().join("notes.txt"), &registry, &ImportOptions::default()),
            Err(ScanError::UnsupportedFile(_))
        ));
        assert!(matches!(
            import_file(&dir.path().join("missing.py"), &registry, &ImportOptions::default()),
            Err(ScanError::Read { .. })
        ));
    }
}
