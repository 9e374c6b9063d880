//! Lazy command registry backed by a commands directory.
//!
//! Nothing touches the filesystem at construction. The first call to
//! [`CommandRegistry::has`], [`CommandRegistry::get`] or
//! [`CommandRegistry::names`] walks the commands directory once, discovers
//! the type declared by every source file, validates it against the catalog
//! and records the command under the name its marker declares. A failing
//! file aborts the whole scan; no partial registry is published.

use crate::config::ConfigProvider;
use crate::console::catalog::{TypeCatalog, TypeEntry};
use crate::console::command::{CommandInstance, CommandLoader};
use crate::console::discovery::{DiscoveredType, TypeDiscovery};
use crate::error::{AutoloadError, Result};
use crate::filesystem::PathResolver;
use glob::Pattern;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Configuration key naming the commands directory
pub const COMMANDS_KEY: &str = "autoloader.paths.commands";

/// Configuration key naming the command source extension
pub const EXTENSION_KEY: &str = "autoloader.extension";

/// Source extension used when none is configured
pub const DEFAULT_EXTENSION: &str = "rs";

/// Where and what the registry scans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoloaderSettings {
    /// Commands directory, relative to the project root or absolute
    pub commands_dir: PathBuf,
    /// Extension of command source files, without the dot
    pub extension: String,
}

impl AutoloaderSettings {
    pub fn new<P: Into<PathBuf>>(commands_dir: P) -> Self {
        Self {
            commands_dir: commands_dir.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Read settings from `autoloader.*` keys
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self> {
        let commands_dir = provider.string_option(COMMANDS_KEY)?.ok_or_else(|| {
            AutoloadError::configuration(format!("'{}' is not set", COMMANDS_KEY))
        })?;

        let settings = Self::new(commands_dir);
        Ok(match provider.string_option(EXTENSION_KEY)? {
            Some(extension) => settings.with_extension(extension),
            None => settings,
        })
    }

    /// Glob pattern matching command source files
    pub fn pattern(&self) -> String {
        format!("*.{}", self.extension)
    }

    /// Strip a trailing `.<extension>` so both spellings share one key
    pub fn normalize<'a>(&self, name: &'a str) -> &'a str {
        name.strip_suffix(self.extension.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(name)
    }

    pub fn file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.extension)
    }
}

/// A validated command: its registered name and where its type was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: String,
    pub discovered: DiscoveredType,
}

/// Receives each descriptor once the scan has succeeded.
///
/// Listeners run while the registry is initializing and must not call back
/// into it.
pub trait RegistrationListener: Send + Sync {
    fn command_registered(&self, descriptor: &CommandDescriptor);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    Scanning,
    Ready,
}

#[derive(Debug)]
struct ScanIndex {
    resolver: PathResolver,
    order: Vec<String>,
    descriptors: HashMap<String, CommandDescriptor>,
}

/// Command loader that scans its commands directory on first use
pub struct CommandRegistry {
    project_root: PathBuf,
    settings: AutoloaderSettings,
    discovery: TypeDiscovery,
    index: OnceCell<ScanIndex>,
    state: Mutex<RegistryState>,
    scan_count: AtomicUsize,
    command_names: Mutex<HashMap<String, String>>,
    instances: Mutex<HashMap<String, CommandInstance>>,
    listeners: Vec<Arc<dyn RegistrationListener>>,
}

impl CommandRegistry {
    /// Create a registry; the commands directory is not read until first use
    pub fn new<P: Into<PathBuf>>(
        project_root: P,
        settings: AutoloaderSettings,
        catalog: Arc<TypeCatalog>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            settings,
            discovery: TypeDiscovery::new(catalog),
            index: OnceCell::new(),
            state: Mutex::new(RegistryState::Uninitialized),
            scan_count: AtomicUsize::new(0),
            command_names: Mutex::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
            listeners: Vec::new(),
        }
    }

    /// Create a registry whose settings come from `provider`
    pub fn from_config<P: Into<PathBuf>>(
        project_root: P,
        provider: &dyn ConfigProvider,
        catalog: Arc<TypeCatalog>,
    ) -> Result<Self> {
        let settings = AutoloaderSettings::from_provider(provider)?;
        Ok(Self::new(project_root, settings, catalog))
    }

    pub fn with_listener(mut self, listener: Arc<dyn RegistrationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn settings(&self) -> &AutoloaderSettings {
        &self.settings
    }

    pub fn discovery(&self) -> &TypeDiscovery {
        &self.discovery
    }

    pub fn state(&self) -> RegistryState {
        *self.state.lock()
    }

    /// How many times the directory scan has started
    pub fn scan_count(&self) -> usize {
        self.scan_count.load(Ordering::Relaxed)
    }

    /// Absolute commands directory as configured (not canonicalized)
    pub fn commands_dir(&self) -> PathBuf {
        self.project_root.join(&self.settings.commands_dir)
    }

    /// Run the directory scan unless it already succeeded.
    ///
    /// Concurrent callers wait for a single scan. A failed scan leaves the
    /// registry uninitialized and is attempted again by the next call.
    pub fn ensure_initialized(&self) -> Result<()> {
        self.index().map(|_| ())
    }

    fn index(&self) -> Result<&ScanIndex> {
        self.index.get_or_try_init(|| {
            *self.state.lock() = RegistryState::Scanning;
            let result = self.scan();
            *self.state.lock() = if result.is_ok() {
                RegistryState::Ready
            } else {
                RegistryState::Uninitialized
            };
            result
        })
    }

    fn scan(&self) -> Result<ScanIndex> {
        self.scan_count.fetch_add(1, Ordering::Relaxed);
        let commands_dir = self.commands_dir();
        tracing::debug!(path = %commands_dir.display(), "Scanning commands directory");

        let resolver = PathResolver::new(&commands_dir)?;
        let mut order = Vec::new();
        let mut descriptors: HashMap<String, CommandDescriptor> = HashMap::new();

        for path in resolver.glob_recursive(&self.settings.pattern())? {
            let path = path?;
            let discovered = self.discovery.discover(&path)?;
            let descriptor = self.derive_command_name(&discovered)?;
            self.command_entry(&discovered)?;

            if let Some(existing) = descriptors.get(&descriptor.name) {
                return Err(AutoloadError::DuplicateCommand {
                    name: descriptor.name,
                    first: existing.discovered.source_path.as_path().to_path_buf(),
                    second: path.into_path_buf(),
                });
            }

            order.push(descriptor.name.clone());
            descriptors.insert(descriptor.name.clone(), descriptor);
        }

        for name in &order {
            for listener in &self.listeners {
                listener.command_registered(&descriptors[name]);
            }
        }

        tracing::info!(
            path = %resolver.root().display(),
            commands = order.len(),
            "Registered commands"
        );

        Ok(ScanIndex {
            resolver,
            order,
            descriptors,
        })
    }

    /// Name the type's marker registers it under, memoized per type
    pub fn derive_command_name(&self, discovered: &DiscoveredType) -> Result<CommandDescriptor> {
        let mut names = self.command_names.lock();
        if let Some(name) = names.get(&discovered.qualified_name) {
            return Ok(CommandDescriptor {
                name: name.clone(),
                discovered: discovered.clone(),
            });
        }

        let entry = self.catalog_entry(&discovered.qualified_name)?;
        let name = entry
            .marker()
            .ok_or_else(|| AutoloadError::NotACommand {
                type_name: discovered.qualified_name.clone(),
            })?
            .to_string();

        names.insert(discovered.qualified_name.clone(), name.clone());
        Ok(CommandDescriptor {
            name,
            discovered: discovered.clone(),
        })
    }

    fn catalog_entry(&self, type_name: &str) -> Result<&TypeEntry> {
        self.discovery
            .catalog()
            .get(type_name)
            .ok_or_else(|| AutoloadError::TypeNotResolvable {
                name: type_name.to_string(),
            })
    }

    /// Catalog entry of a type that implements the command capability
    fn command_entry(&self, discovered: &DiscoveredType) -> Result<&TypeEntry> {
        let entry = self.catalog_entry(&discovered.qualified_name)?;
        if !entry.is_command() {
            return Err(AutoloadError::InvalidCommand {
                type_name: discovered.qualified_name.clone(),
            });
        }
        Ok(entry)
    }

    /// Whether `name` resolves to a usable command. Every failure reads as `false`.
    pub fn has(&self, name: &str) -> bool {
        match self.get(name) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(command = name, error = %e, "Command lookup failed");
                false
            }
        }
    }

    /// The single instance of command `name` (with or without extension).
    ///
    /// Names registered by the scan are served from the index; any other
    /// name is looked up as `<name>.<extension>` below the commands directory,
    /// provided the scan would have visited that file. A file whose command
    /// name is already registered from another file is a duplicate.
    pub fn get(&self, name: &str) -> Result<CommandInstance> {
        let index = self.index()?;
        let key = self.settings.normalize(name);

        let mut instances = self.instances.lock();
        if let Some(instance) = instances.get(key) {
            return Ok(Arc::clone(instance));
        }

        let discovered = match index.descriptors.get(key) {
            Some(descriptor) => descriptor.discovered.clone(),
            None => {
                let file_name = self.settings.file_name(key);
                self.ensure_scannable(Path::new(&file_name), index)?;
                let path = index.resolver.resolve([file_name.as_str()])?;
                self.discovery.discover(&path)?
            }
        };

        let entry = self.command_entry(&discovered)?;
        let descriptor = self.derive_command_name(&discovered)?;

        if let Some(registered) = index.descriptors.get(&descriptor.name) {
            if registered.discovered.source_path != discovered.source_path {
                return Err(AutoloadError::DuplicateCommand {
                    name: descriptor.name,
                    first: registered.discovered.source_path.as_path().to_path_buf(),
                    second: discovered.source_path.into_path_buf(),
                });
            }
        }

        let instance = match instances.get(&descriptor.name) {
            Some(existing) => Arc::clone(existing),
            None => {
                let shell = entry.shell().ok_or_else(|| AutoloadError::InvalidCommand {
                    type_name: discovered.qualified_name.clone(),
                })?;
                tracing::debug!(
                    command = %descriptor.name,
                    type_name = %discovered.qualified_name,
                    "Created command instance"
                );
                Arc::new(Mutex::new(shell))
            }
        };

        instances.insert(descriptor.name.clone(), Arc::clone(&instance));
        if key != descriptor.name {
            instances.insert(key.to_string(), Arc::clone(&instance));
        }

        Ok(instance)
    }

    /// Reject lookups the directory scan would never have visited
    fn ensure_scannable(&self, relative: &Path, index: &ScanIndex) -> Result<()> {
        let hidden = relative.components().any(|component| match component {
            Component::Normal(part) => part.to_str().map_or(false, |part| part.starts_with('.')),
            _ => false,
        });
        let pattern = Pattern::new(&self.settings.pattern())?;
        let matches = relative
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| pattern.matches(name));

        if hidden || !matches {
            return Err(AutoloadError::path_not_found(relative, index.resolver.root()));
        }
        Ok(())
    }

    /// Registered command names in discovery order
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.index()?.order.clone())
    }

    /// Registered descriptors in discovery order
    pub fn descriptors(&self) -> Result<Vec<CommandDescriptor>> {
        let index = self.index()?;
        Ok(index
            .order
            .iter()
            .map(|name| index.descriptors[name].clone())
            .collect())
    }

    /// Canonical commands directory, once initialized
    pub fn resolved_dir(&self) -> Option<&Path> {
        self.index.get().map(|index| index.resolver.root())
    }
}

impl CommandLoader for CommandRegistry {
    fn has(&self, name: &str) -> bool {
        CommandRegistry::has(self, name)
    }

    fn get(&self, name: &str) -> Result<CommandInstance> {
        CommandRegistry::get(self, name)
    }

    fn names(&self) -> Result<Vec<String>> {
        CommandRegistry::names(self)
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("project_root", &self.project_root)
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
