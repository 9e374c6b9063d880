use crate::error::{AutoloadError, Result};
use crate::filesystem::{Handle, OpenMode, PathResolver};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Namespace loaded when none is given
pub const DEFAULT_NAMESPACE: &str = "global";

/// Directory below the project root holding configuration documents
pub const CONFIG_DIR: &str = "config";

/// Extension appended to a namespace that has none
const DEFAULT_EXTENSION: &str = "yaml";

/// Source of dotted-key configuration values
pub trait ConfigProvider: Send + Sync {
    /// Look up `key` (e.g. `autoloader.paths.commands`); `Ok(None)` when absent
    fn option(&self, key: &str) -> Result<Option<Value>>;

    /// Look up `key` as a string
    fn string_option(&self, key: &str) -> Result<Option<String>> {
        match self.option(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(AutoloadError::configuration(format!(
                "Expected '{}' to be a string, found {}",
                key, other
            ))),
        }
    }
}

/// A parsed configuration document addressable by dotted keys
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    namespace: String,
    root: Value,
}

impl ConfigDocument {
    pub fn new<S: Into<String>>(namespace: S, root: Value) -> Self {
        Self {
            namespace: namespace.into(),
            root,
        }
    }

    /// Parse `content` according to the extension of `path`
    pub fn parse<S: Into<String>>(namespace: S, path: &Path, content: &str) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or(DEFAULT_EXTENSION)
            .to_ascii_lowercase();

        if content.trim().is_empty() {
            return Ok(Self::new(namespace, Value::Object(Default::default())));
        }

        let root: Value = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(content)?,
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            other => {
                return Err(AutoloadError::configuration(format!(
                    "Unsupported configuration format '.{}' for {}",
                    other,
                    path.display()
                )))
            }
        };

        // A YAML document holding only `~` parses to null
        let root = if root.is_null() {
            Value::Object(Default::default())
        } else {
            root
        };

        Ok(Self::new(namespace, root))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Walk the document along a dotted key
    pub fn get(&self, key: &str) -> Option<&Value> {
        key.split('.')
            .try_fold(&self.root, |node, segment| match node {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Deserialize the subtree at `key` into a typed section
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}

impl ConfigProvider for ConfigDocument {
    fn option(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get(key).cloned())
    }
}

/// Loads configuration documents from `<root>/config` and caches them per namespace
#[derive(Debug)]
pub struct ConfigRepository {
    config_dir: PathBuf,
    namespace: String,
    resolver: Mutex<Option<PathResolver>>,
    documents: Mutex<HashMap<String, Arc<ConfigDocument>>>,
}

impl ConfigRepository {
    /// Create a repository reading `config/<namespace>.yaml` below `project_root`
    pub fn new<P: AsRef<Path>>(project_root: P) -> Self {
        Self {
            config_dir: project_root.as_ref().join(CONFIG_DIR),
            namespace: DEFAULT_NAMESPACE.to_string(),
            resolver: Mutex::new(None),
            documents: Mutex::new(HashMap::new()),
        }
    }

    /// Use `namespace` for [`ConfigProvider::option`] lookups
    pub fn with_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Load (once) and return the document for `namespace`
    pub fn document(&self, namespace: &str) -> Result<Arc<ConfigDocument>> {
        let mut documents = self.documents.lock();
        if let Some(document) = documents.get(namespace) {
            return Ok(Arc::clone(document));
        }

        let mut file_name = PathBuf::from(namespace);
        if file_name.extension().is_none() {
            file_name.set_extension(DEFAULT_EXTENSION);
        }

        let resolver = self.resolver()?;
        let mut file = match resolver.open(&file_name, OpenMode::Read)? {
            Handle::File(file) => file,
            Handle::Directory(_) => {
                return Err(AutoloadError::path_not_found(namespace, resolver.root()))
            }
        };

        let content = file.read_to_string()?;
        let document = Arc::new(ConfigDocument::parse(
            namespace,
            file.path().as_path(),
            &content,
        )?);

        tracing::debug!(
            namespace = namespace,
            path = %file.path(),
            "Loaded configuration document"
        );

        documents.insert(namespace.to_string(), Arc::clone(&document));
        Ok(document)
    }

    /// Number of namespaces loaded so far
    pub fn loaded(&self) -> usize {
        self.documents.lock().len()
    }

    fn resolver(&self) -> Result<PathResolver> {
        let mut resolver = self.resolver.lock();
        if let Some(resolver) = resolver.as_ref() {
            return Ok(resolver.clone());
        }

        let created = PathResolver::new(&self.config_dir)?;
        *resolver = Some(created.clone());
        Ok(created)
    }
}

impl ConfigProvider for ConfigRepository {
    fn option(&self, key: &str) -> Result<Option<Value>> {
        let document = self.document(&self.namespace)?;
        Ok(document.get(key).cloned())
    }
}
