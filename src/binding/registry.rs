use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ConfigError;

use super::pattern::{LiveBinding, UrlBindingPattern};

/// Indexes every known binding pattern by its literal path prefix.
///
/// Built once at startup and thereafter read-only, so it is safe to share
/// across request threads without locking. Lookup is
/// longest-matching-prefix: the registered path that is the longest prefix
/// of the request path wins; equal lengths break by lexical order of the
/// path (deterministic, not semantically meaningful).
#[derive(Debug, Default)]
pub struct UrlBindingRegistry {
    /// Exact-path lookup.
    by_path: HashMap<String, Arc<UrlBindingPattern>>,
    /// Paths ordered longest-first, then lexically, for prefix scans.
    ordered: Vec<String>,
}

impl UrlBindingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parsed pattern under its path prefix.
    ///
    /// Two patterns with the same literal path cannot coexist; that is a
    /// startup-time configuration error.
    pub fn add(&mut self, pattern: Arc<UrlBindingPattern>) -> Result<(), ConfigError> {
        let path = pattern.path().to_string();
        if let Some(existing) = self.by_path.get(&path) {
            return Err(ConfigError::ConflictingBinding {
                path,
                first: existing.to_string(),
                second: pattern.to_string(),
            });
        }

        debug!(path = %path, pattern = %pattern, "Registered URL binding");
        self.by_path.insert(path.clone(), pattern);

        let slot = self
            .ordered
            .binary_search_by(|p| {
                p.len()
                    .cmp(&path.len())
                    .reverse()
                    .then_with(|| p.as_str().cmp(path.as_str()))
            })
            .unwrap_or_else(|i| i);
        self.ordered.insert(slot, path);
        Ok(())
    }

    /// Number of registered bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Find the pattern matching a request path, without extracting any
    /// parameter values. Exact path hit first, then the longest registered
    /// prefix.
    #[must_use]
    pub fn match_path(&self, request_path: &str) -> Option<&Arc<UrlBindingPattern>> {
        if let Some(pattern) = self.by_path.get(request_path) {
            return Some(pattern);
        }

        for path in &self.ordered {
            if request_path.starts_with(path.as_str()) {
                return self.by_path.get(path);
            }
        }

        warn!(path = %request_path, "No URL binding matched");
        None
    }

    /// Match a request path and evaluate the winning pattern against it,
    /// producing the per-request [`LiveBinding`].
    #[must_use]
    pub fn evaluate(&self, request_path: &str) -> Option<LiveBinding> {
        self.match_path(request_path)
            .map(|pattern| pattern.evaluate(request_path))
    }

    /// All registered paths with their canonical pattern strings, for
    /// diagnostics and error messages.
    #[must_use]
    pub fn path_map(&self) -> Vec<(String, String)> {
        self.by_path
            .iter()
            .map(|(path, pattern)| (path.clone(), pattern.to_string()))
            .collect()
    }
}
