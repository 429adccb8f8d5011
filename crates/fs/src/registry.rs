//! Static scheme registry
//!
//! Maps a URL scheme to a factory that builds the matching backend. The
//! default registry knows the `file` scheme; callers with remote backends
//! build their own [`FsRegistry`] and register additional factories at
//! startup.

use crate::backend::FileSystem;
use crate::local::Local;
use blobio_core::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use url::Url;

/// Builds a backend for a parsed URL
pub type BackendFactory = fn(&Url) -> Result<Box<dyn FileSystem>>;

/// Scheme to factory map
#[derive(Clone, Default)]
pub struct FsRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl std::fmt::Debug for FsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsRegistry")
            .field("schemes", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FsRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in backends
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("file", local_factory);
        registry
    }

    /// Register (or replace) the factory for `scheme`
    pub fn register(&mut self, scheme: impl Into<String>, factory: BackendFactory) {
        let scheme = scheme.into().to_ascii_lowercase();
        if self.factories.insert(scheme.clone(), factory).is_some() {
            tracing::debug!(%scheme, "replaced filesystem factory");
        }
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build the backend for `url` and return it with the path inside it.
    ///
    /// Strings without a scheme are local paths.
    pub fn open_url(&self, url: &str) -> Result<(Box<dyn FileSystem>, String)> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Ok((Box::new(Local::default()), url.to_string()));
            }
            Err(e) => {
                return Err(Error::configuration(format!("invalid URL '{url}': {e}")));
            }
        };

        let factory = self.factories.get(parsed.scheme()).ok_or_else(|| {
            Error::unsupported(parsed.scheme(), "open_url", "no backend registered")
        })?;
        let backend = factory(&parsed)?;
        let path = match parsed.scheme() {
            "file" => parsed
                .to_file_path()
                .map_err(|_| Error::configuration(format!("invalid file URL '{url}'")))?
                .to_string_lossy()
                .into_owned(),
            _ => parsed.path().trim_start_matches('/').to_string(),
        };
        Ok((backend, path))
    }
}

fn local_factory(_url: &Url) -> Result<Box<dyn FileSystem>> {
    Ok(Box::new(Local::new("/")))
}

static DEFAULT_REGISTRY: Lazy<FsRegistry> = Lazy::new(FsRegistry::with_builtins);

/// The process-wide registry with the built-in backends
pub fn default_registry() -> &'static FsRegistry {
    &DEFAULT_REGISTRY
}

/// Resolve `url` through the default registry
pub fn from_url(url: &str) -> Result<(Box<dyn FileSystem>, String)> {
    default_registry().open_url(url)
}
