use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for command discovery and registration
#[derive(Error, Debug)]
pub enum AutoloadError {
    #[error("{}", path_not_found_message(.path, .root.as_deref()))]
    PathNotFound {
        path: PathBuf,
        root: Option<PathBuf>,
    },

    #[error("No type declaration found in file: {}", .path.display())]
    NoTypeFound { path: PathBuf },

    #[error("File {} declares more than one type: {first} and {second}", .path.display())]
    MultipleTypes {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Type not resolvable: {name}")]
    TypeNotResolvable { name: String },

    #[error("{type_name} is not a command")]
    NotACommand { type_name: String },

    #[error("Type \"{type_name}\" does not implement the command capability")]
    InvalidCommand { type_name: String },

    #[error("Command \"{name}\" is registered by both {} and {}", .first.display(), .second.display())]
    DuplicateCommand {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Invalid directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Cli(#[from] clap::Error),
}

fn path_not_found_message(path: &Path, root: Option<&Path>) -> String {
    match root {
        Some(root) => format!(
            "Path non existent \"{}\" from \"{}\"",
            path.display(),
            root.display()
        ),
        None => format!("Path non existent \"{}\"", path.display()),
    }
}

impl AutoloadError {
    /// Create a path-not-found error relative to a root directory
    pub fn path_not_found<P: Into<PathBuf>, R: Into<PathBuf>>(path: P, root: R) -> Self {
        Self::PathNotFound {
            path: path.into(),
            root: Some(root.into()),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an execution error
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::Execution(msg.into())
    }

    /// Whether this error carries the not-found semantic
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound { .. })
    }

    /// HTTP-like status code for the error category
    pub fn status_code(&self) -> u16 {
        match self {
            Self::PathNotFound { .. } => 404,
            Self::NoTypeFound { .. }
            | Self::MultipleTypes { .. }
            | Self::TypeNotResolvable { .. }
            | Self::NotACommand { .. }
            | Self::InvalidCommand { .. }
            | Self::DuplicateCommand { .. }
            | Self::NotADirectory(_)
            | Self::InvalidPattern(_)
            | Self::Configuration(_)
            | Self::Yaml(_)
            | Self::Toml(_)
            | Self::Json(_)
            | Self::Cli(_) => 400,
            Self::Execution(_) | Self::Io(_) => 500,
        }
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::PathNotFound { path, .. } => {
                format!(
                    "{}. Run 'command-autoload list' to see available commands.",
                    path_not_found_message(path, None)
                )
            }
            Self::NoTypeFound { path } => {
                format!(
                    "{} does not declare a type. Every file in the commands directory must declare exactly one command type.",
                    path.display()
                )
            }
            Self::TypeNotResolvable { name } => {
                format!(
                    "Type '{}' was found on disk but is not registered in the command catalog.",
                    name
                )
            }
            Self::Configuration(msg) => {
                format!(
                    "Configuration error: {}. Check config/global.yaml under the project root.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Convenient result type for command autoloading
pub type Result<T> = std::result::Result<T, AutoloadError>;

/// Trait for converting errors to user-friendly messages
pub trait UserFriendlyError {
    fn user_message(&self) -> String;
}

impl UserFriendlyError for AutoloadError {
    fn user_message(&self) -> String {
        self.user_message()
    }
}
