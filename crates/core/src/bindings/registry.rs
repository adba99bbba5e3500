use super::{builtins, BindingError, CompiledBinding, LanguageBinding};
use log::debug;
use std::collections::HashMap;
use std::path::Path;

/// Maps language ids and file extensions to compiled bindings
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    bindings: Vec<CompiledBinding>,
    by_id: HashMap<String, usize>,
    by_extension: HashMap<String, usize>,
}

impl LanguageRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in bindings
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for binding in builtins() {
            // Built-in bindings are covered by tests; a failure here is a bug.
            if let Err(e) = registry.register(binding) {
                log::error!("built-in binding rejected: {}", e);
            }
        }
        registry
    }

    /// Validate, compile and register a binding.
    ///
    /// A binding with an id that is already registered replaces the old one,
    /// and takes over its extensions.
    pub fn register(&mut self, binding: LanguageBinding) -> Result<&CompiledBinding, BindingError> {
        let compiled = CompiledBinding::compile(binding)?;
        let id = compiled.id().to_string();

        let slot = match self.by_id.get(&id) {
            Some(&slot) => {
                self.by_extension.retain(|_, s| *s != slot);
                self.bindings[slot] = compiled;
                slot
            }
            None => {
                self.bindings.push(compiled);
                self.bindings.len() - 1
            }
        };

        self.by_id.insert(id.clone(), slot);
        for ext in &self.bindings[slot].binding().extensions {
            self.by_extension
                .insert(ext.trim_start_matches('.').to_lowercase(), slot);
        }
        debug!("registered language binding '{}'", id);

        Ok(&self.bindings[slot])
    }

    /// Look up a binding by language id
    pub fn get(&self, id: &str) -> Option<&CompiledBinding> {
        self.by_id.get(id).map(|&slot| &self.bindings[slot])
    }

    /// Look up a binding by file extension (without the dot)
    pub fn for_extension(&self, ext: &str) -> Option<&CompiledBinding> {
        self.by_extension
            .get(&ext.to_lowercase())
            .map(|&slot| &self.bindings[slot])
    }

    /// Look up a binding from a path's extension
    pub fn for_path(&self, path: &Path) -> Option<&CompiledBinding> {
        let ext = path.extension()?.to_string_lossy();
        self.for_extension(&ext)
    }

    /// Registered language ids, in registration order
    pub fn ids(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledBinding> {
        self.bindings.iter()
    }
}
