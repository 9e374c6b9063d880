//! Commands shipped with the binary.
//!
//! Each file below `commands/` declares exactly one command type, so the
//! directory doubles as the default commands directory scanned at runtime.

mod config;
mod list;

pub use config::ConfigCommand;
pub use list::ListCommand;

use crate::console::catalog::TypeCatalog;

/// Catalog of the built-in command types
pub fn builtin_catalog() -> TypeCatalog {
    crate::command_catalog! {
        "ConfigCommand" => ConfigCommand,
        "ListCommand" => ListCommand,
    }
}
