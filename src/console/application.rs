use crate::config::ConfigProvider;
use crate::console::autoloader::{CommandDescriptor, RegistrationListener};
use crate::console::command::{CommandContext, CommandLoader};
use crate::error::{AutoloadError, Result};
use parking_lot::Mutex;
use std::ffi::OsString;
use std::io::Write;
use std::sync::Arc;

/// Commands announced to the host by a loader's scan
#[derive(Debug, Default)]
pub struct HostRegistrations {
    names: Mutex<Vec<String>>,
}

impl HostRegistrations {
    pub fn names(&self) -> Vec<String> {
        self.names.lock().clone()
    }
}

impl RegistrationListener for HostRegistrations {
    fn command_registered(&self, descriptor: &CommandDescriptor) {
        tracing::debug!(command = %descriptor.name, "Command registered with host");
        self.names.lock().push(descriptor.name.clone());
    }
}

/// Host CLI dispatching to commands served by a [`CommandLoader`]
pub struct Application {
    name: String,
    version: String,
    loader: Option<Arc<dyn CommandLoader>>,
    config: Option<Arc<dyn ConfigProvider>>,
    registrations: Arc<HostRegistrations>,
}

impl Application {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, version: V) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            loader: None,
            config: None,
            registrations: Arc::new(HostRegistrations::default()),
        }
    }

    /// Listener to hand to the loader so its scan registers with this host
    pub fn listener(&self) -> Arc<dyn RegistrationListener> {
        self.registrations.clone()
    }

    pub fn with_loader(mut self, loader: Arc<dyn CommandLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_config(mut self, config: Arc<dyn ConfigProvider>) -> Self {
        self.config = Some(config);
        self
    }

    /// Names registered with the host so far
    pub fn registered(&self) -> Vec<String> {
        self.registrations.names()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn loader(&self) -> Result<&Arc<dyn CommandLoader>> {
        self.loader
            .as_ref()
            .ok_or_else(|| AutoloadError::configuration("no command loader configured"))
    }

    fn base_command(&self) -> clap::Command {
        clap::Command::new(self.name.clone())
            .version(self.version.clone())
            .propagate_version(true)
    }

    /// Fetch the bare instance and let it describe itself
    fn definition(&self, loader: &dyn CommandLoader, name: &str) -> Result<clap::Command> {
        let instance = loader.get(name)?;
        let mut command = instance.lock();
        Ok(command.configure(clap::Command::new(name.to_string())))
    }

    /// Root command with every registered command attached
    pub fn command_tree(&self) -> Result<clap::Command> {
        let loader = self.loader()?;
        let mut root = self.base_command();
        for name in loader.names()? {
            root = root.subcommand(self.definition(loader.as_ref(), &name)?);
        }
        Ok(root)
    }

    /// Parse `args` (including the program name) and run the selected command.
    ///
    /// Only the requested command is fetched from the loader; the full tree
    /// is built when no known command is named, for help and error output.
    pub fn run<I, T>(&self, args: I, out: &mut dyn Write) -> Result<i32>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let loader = self.loader()?;

        let requested = args
            .get(1)
            .and_then(|arg| arg.to_str())
            .filter(|arg| !arg.starts_with('-'));

        let mut root = match requested {
            Some(name) if loader.has(name) => self
                .base_command()
                .subcommand(self.definition(loader.as_ref(), name)?),
            _ => self.command_tree()?,
        };

        let matches = match root.try_get_matches_from_mut(&args) {
            Ok(matches) => matches,
            Err(e) if !e.use_stderr() => {
                write!(out, "{}", e.render())?;
                return Ok(e.exit_code());
            }
            Err(e) => return Err(e.into()),
        };

        let Some((name, sub_matches)) = matches.subcommand() else {
            write!(out, "{}", root.render_help())?;
            return Ok(0);
        };

        tracing::debug!(command = name, "Dispatching command");
        let instance = loader.get(name)?;
        let mut command = instance.lock();
        let mut context = CommandContext::new(loader.as_ref(), out);
        if let Some(config) = self.config.as_deref() {
            context = context.with_config(config);
        }
        command.execute(sub_matches, &mut context)
    }
}
