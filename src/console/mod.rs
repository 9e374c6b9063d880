//! Console host and lazily loaded commands.
//!
//! ## Usage
//!
//! ```no_run
//! use command_autoload::config::ConfigRepository;
//! use command_autoload::console::{commands, Application, CommandRegistry};
//! use std::sync::Arc;
//!
//! # fn main() -> command_autoload::Result<()> {
//! let root = command_autoload::project_root();
//! let config = Arc::new(ConfigRepository::new(&root));
//! let app = Application::new("tool", "0.1.0");
//! let registry = CommandRegistry::from_config(&root, &*config, Arc::new(commands::builtin_catalog()))?
//!     .with_listener(app.listener());
//! let app = app.with_loader(Arc::new(registry)).with_config(config);
//! let code = app.run(["tool", "list"], &mut std::io::stdout())?;
//! # let _ = code;
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod autoloader;
pub mod catalog;
pub mod command;
pub mod commands;
pub mod discovery;
pub mod scanner;

#[cfg(test)]
mod autoloader_test;

pub use application::{Application, HostRegistrations};
pub use autoloader::{
    AutoloaderSettings, CommandDescriptor, CommandRegistry, RegistrationListener, RegistryState,
};
pub use catalog::{ShellFactory, TypeCatalog, TypeEntry};
pub use command::{Command, CommandContext, CommandInstance, CommandLoader, CommandMarker};
pub use discovery::{DiscoveredType, TypeDiscovery};
