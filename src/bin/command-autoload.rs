use anyhow::Result;
use command_autoload::config::ConfigRepository;
use command_autoload::console::{commands, Application, CommandRegistry};
use std::sync::Arc;
use tracing::{error, info};

fn main() -> Result<()> {
    // Initialize tracing with environment-based filtering
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = command_autoload::project_root();
    info!(root = %root.display(), "Starting command-autoload");

    let config = Arc::new(ConfigRepository::new(&root));
    let app = Application::new("command-autoload", command_autoload::VERSION);

    let registry =
        match CommandRegistry::from_config(&root, &*config, Arc::new(commands::builtin_catalog())) {
            Ok(registry) => registry.with_listener(app.listener()),
            Err(e) => {
                error!("Failed to configure command registry: {:?}", e);
                eprintln!("Error: {}", e.user_message());
                std::process::exit(1);
            }
        };

    let app = app.with_loader(Arc::new(registry)).with_config(config);

    match app.run(std::env::args_os(), &mut std::io::stdout()) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Log the full error for debugging
            error!("Command execution failed: {:?}", e);
            eprintln!("Error: {}", e.user_message());
            std::process::exit(1);
        }
    }
}
