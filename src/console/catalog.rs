//! Build-time registration table of command types.
//!
//! Types are registered by their qualified name as it appears in source
//! (`tools::DeployCommand`). The table answers whether a discovered name is
//! loadable, which marker it carries, and how to build a bare shell of it.

use crate::console::command::{Command, CommandMarker};
use std::collections::HashMap;
use std::fmt;

/// Parameterless constructor returning an unconfigured command shell
pub type ShellFactory = fn() -> Box<dyn Command>;

fn shell<T: Command + Default>() -> Box<dyn Command> {
    Box::new(T::default())
}

/// One registered type
#[derive(Clone)]
pub struct TypeEntry {
    name: String,
    marker: Option<String>,
    factory: Option<ShellFactory>,
}

impl TypeEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command name declared by the type's marker
    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// Whether the type implements [`Command`]
    pub fn is_command(&self) -> bool {
        self.factory.is_some()
    }

    /// Build a bare shell, if the type is a command
    pub fn shell(&self) -> Option<Box<dyn Command>> {
        self.factory.map(|factory| factory())
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("name", &self.name)
            .field("marker", &self.marker)
            .field("is_command", &self.is_command())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    entries: HashMap<String, TypeEntry>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a marked command type
    pub fn command<T>(mut self, name: &str) -> Self
    where
        T: Command + CommandMarker + Default,
    {
        self.insert(TypeEntry {
            name: name.to_string(),
            marker: Some(T::NAME.to_string()),
            factory: Some(shell::<T> as ShellFactory),
        });
        self
    }

    /// Register a command type that carries no marker
    pub fn unmarked_command<T>(mut self, name: &str) -> Self
    where
        T: Command + Default,
    {
        self.insert(TypeEntry {
            name: name.to_string(),
            marker: None,
            factory: Some(shell::<T> as ShellFactory),
        });
        self
    }

    /// Register a type that does not implement [`Command`]
    pub fn plain_type(mut self, name: &str, marker: Option<&str>) -> Self {
        self.insert(TypeEntry {
            name: name.to_string(),
            marker: marker.map(str::to_string),
            factory: None,
        });
        self
    }

    /// Add `entry`, replacing any previous entry with the same name
    pub fn insert(&mut self, entry: TypeEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&TypeEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build a [`TypeCatalog`] from `"qualified::Name" => Type` pairs of marked commands
#[macro_export]
macro_rules! command_catalog {
    ($($name:literal => $ty:ty),* $(,)?) => {
        $crate::console::TypeCatalog::new()$(.command::<$ty>($name))*
    };
}
