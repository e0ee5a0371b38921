//! Client model name -> upstream model name routing.
//!
//! The map is loaded at most once per process (first use), from an optional
//! on-disk JSON object of `{"client-name": "vendor/upstream-name"}`. A parse
//! failure is permanent: every subsequent resolve call re-surfaces it rather
//! than silently falling back to pass-through.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::error::CoreError;

/// Vendor prefix applied to an unmapped model name that has no vendor delimiter.
pub const DEFAULT_VENDOR_PREFIX: &str = "openai/";

fn load_map_from_disk(path: Option<&Path>) -> Result<HashMap<String, String>, CoreError> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(path).map_err(|source| CoreError::ModelMapRead {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CoreError::ModelMapParse {
        path: path.display().to_string(),
        source,
    })
}

/// Caches the parsed model map for one configured path, loading it lazily on
/// first `resolve` call and reusing the result (or the permanent error) for
/// every call after.
pub struct ModelMapResolver {
    path: Option<PathBuf>,
    cache: OnceCell<HashMap<String, String>>,
}

impl ModelMapResolver {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            cache: OnceCell::new(),
        }
    }

    fn map(&self) -> Result<&HashMap<String, String>, CoreError> {
        match self.cache.get() {
            Some(m) => Ok(m),
            None => {
                let loaded = load_map_from_disk(self.path.as_deref())?;
                Ok(self.cache.get_or_init(|| loaded))
            }
        }
    }

    /// Resolves a client-supplied model name to the upstream model name.
    pub fn resolve(&self, client_model: &str) -> Result<String, CoreError> {
        let map = self.map()?;
        if let Some(mapped) = map.get(client_model) {
            return Ok(mapped.clone());
        }
        if client_model.contains('/') {
            return Ok(client_model.to_string());
        }
        Ok(format!("{DEFAULT_VENDOR_PREFIX}{client_model}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn passthrough_when_vendor_delimiter_present() {
        let resolver = ModelMapResolver::new(None);
        assert_eq!(resolver.resolve("anthropic/claude").unwrap(), "anthropic/claude");
    }

    #[test]
    fn default_prefix_when_unmapped() {
        let resolver = ModelMapResolver::new(None);
        assert_eq!(resolver.resolve("gpt-4o").unwrap(), "openai/gpt-4o");
    }

    #[test]
    fn uses_mapped_name_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"alias": "vendor/real-model"}}"#).unwrap();
        let resolver = ModelMapResolver::new(Some(file.path().to_path_buf()));
        assert_eq!(resolver.resolve("alias").unwrap(), "vendor/real-model");
        // second call reuses the cached map
        assert_eq!(resolver.resolve("alias").unwrap(), "vendor/real-model");
    }

    #[test]
    fn missing_file_behaves_as_empty_map() {
        let resolver = ModelMapResolver::new(Some(PathBuf::from("/nonexistent/path.json")));
        assert_eq!(resolver.resolve("gpt-4o").unwrap(), "openai/gpt-4o");
    }

    #[test]
    fn malformed_file_is_a_permanent_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let resolver = ModelMapResolver::new(Some(file.path().to_path_buf()));
        assert!(resolver.resolve("gpt-4o").is_err());
        assert!(resolver.resolve("gpt-4o").is_err());
    }
}
