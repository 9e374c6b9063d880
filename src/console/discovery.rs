//! Command type discovery
//!
//! This module handles:
//! - Reading a command source file without compiling or running it
//! - Extracting the one type the file declares
//! - Checking the type against the command catalog
//! - Caching path to type for the lifetime of the discovery object

use crate::console::catalog::TypeCatalog;
use crate::console::scanner::declared_types;
use crate::error::{AutoloadError, Result};
use crate::filesystem::SourcePath;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A type found in a command source file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredType {
    pub qualified_name: String,
    pub source_path: SourcePath,
}

/// Maps source files to the type they declare
#[derive(Debug)]
pub struct TypeDiscovery {
    catalog: Arc<TypeCatalog>,
    cache: Mutex<HashMap<SourcePath, DiscoveredType>>,
    scans: AtomicUsize,
}

impl TypeDiscovery {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            cache: Mutex::new(HashMap::new()),
            scans: AtomicUsize::new(0),
        }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Find the type declared by `path`.
    ///
    /// A file must declare exactly one type and that type must be present in
    /// the catalog. Successful results are cached; a cached path is never
    /// read again.
    pub fn discover(&self, path: &SourcePath) -> Result<DiscoveredType> {
        if let Some(found) = self.cache.lock().get(path) {
            return Ok(found.clone());
        }

        let source = fs::read_to_string(path.as_path())?;
        self.scans.fetch_add(1, Ordering::Relaxed);

        let mut types = declared_types(&source).into_iter();
        let qualified_name = match (types.next(), types.next()) {
            (None, _) => {
                return Err(AutoloadError::NoTypeFound {
                    path: path.as_path().to_path_buf(),
                })
            }
            (Some(first), Some(second)) => {
                return Err(AutoloadError::MultipleTypes {
                    path: path.as_path().to_path_buf(),
                    first,
                    second,
                })
            }
            (Some(name), None) => name,
        };

        if !self.catalog.contains(&qualified_name) {
            return Err(AutoloadError::TypeNotResolvable {
                name: qualified_name,
            });
        }

        tracing::debug!(
            path = %path,
            type_name = %qualified_name,
            "Discovered command type"
        );

        let found = DiscoveredType {
            qualified_name,
            source_path: path.clone(),
        };
        self.cache.lock().insert(path.clone(), found.clone());
        Ok(found)
    }

    /// Number of files actually read and tokenized
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// Number of cached path entries
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }
}
