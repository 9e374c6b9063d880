//! Static command discovery and lazy command registration for clap-based CLIs.
//!
//! Command types live one per file under a configured commands directory.
//! A [`console::CommandRegistry`] walks that directory on first use, reads
//! the type each file declares, checks it against a build-time
//! [`console::TypeCatalog`] and hands single shared instances to the
//! [`console::Application`] host.

pub mod config;
pub mod console;
pub mod error;
pub mod filesystem;

pub use error::{AutoloadError, Result, UserFriendlyError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable overriding the project root
pub const ROOT_ENV: &str = "COMMAND_AUTOLOAD_ROOT";

/// Project root holding `config/` and the commands directory
pub fn project_root() -> std::path::PathBuf {
    std::env::var_os(ROOT_ENV)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")))
}
