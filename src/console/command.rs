use crate::config::ConfigProvider;
use crate::error::Result;
use clap::ArgMatches;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Capability every command type must provide to the host.
///
/// Instances start as bare shells built by `Default`; the host calls
/// [`Command::configure`] before the first [`Command::execute`].
pub trait Command: Send + 'static {
    /// Describe arguments and help on top of the host-provided definition
    fn configure(&mut self, definition: clap::Command) -> clap::Command;

    /// Run the command, returning the process exit code
    fn execute(&mut self, matches: &ArgMatches, context: &mut CommandContext<'_>) -> Result<i32>;
}

/// Declarative marker naming the command a type registers under
pub trait CommandMarker {
    const NAME: &'static str;
}

/// Shared handle to the single live instance of a command
pub type CommandInstance = Arc<Mutex<Box<dyn Command>>>;

/// Lookup interface the host uses to reach commands
pub trait CommandLoader: Send + Sync {
    /// Whether `name` resolves to a usable command. Never fails.
    fn has(&self, name: &str) -> bool;

    /// The instance registered under `name`
    fn get(&self, name: &str) -> Result<CommandInstance>;

    /// Registered command names in discovery order
    fn names(&self) -> Result<Vec<String>>;
}

/// What a command sees while executing
pub struct CommandContext<'a> {
    pub loader: &'a dyn CommandLoader,
    pub config: Option<&'a dyn ConfigProvider>,
    pub out: &'a mut dyn Write,
}

impl<'a> CommandContext<'a> {
    pub fn new(loader: &'a dyn CommandLoader, out: &'a mut dyn Write) -> Self {
        Self {
            loader,
            config: None,
            out,
        }
    }

    pub fn with_config(mut self, config: &'a dyn ConfigProvider) -> Self {
        self.config = Some(config);
        self
    }
}
