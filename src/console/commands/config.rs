use crate::console::command::{Command, CommandContext, CommandMarker};
use crate::error::{AutoloadError, Result};
use clap::{Arg, ArgMatches};
use serde_json::Value;
use std::io::Write;

/// Prints one configuration value addressed by a dotted key
#[derive(Debug, Default)]
pub struct ConfigCommand;

impl CommandMarker for ConfigCommand {
    const NAME: &'static str = "config";
}

impl Command for ConfigCommand {
    fn configure(&mut self, definition: clap::Command) -> clap::Command {
        definition.about("Show a configuration value").arg(
            Arg::new("key")
                .required(true)
                .help("Dotted key, e.g. autoloader.paths.commands"),
        )
    }

    fn execute(&mut self, matches: &ArgMatches, context: &mut CommandContext<'_>) -> Result<i32> {
        let key = matches
            .get_one::<String>("key")
            .ok_or_else(|| AutoloadError::execution("missing configuration key"))?;
        let config = context
            .config
            .ok_or_else(|| AutoloadError::configuration("no configuration available"))?;

        match config.option(key)? {
            Some(Value::String(value)) => writeln!(context.out, "{}", value)?,
            Some(value) => writeln!(context.out, "{}", serde_json::to_string_pretty(&value)?)?,
            None => {
                writeln!(context.out, "{} is not set", key)?;
                return Ok(1);
            }
        }
        Ok(0)
    }
}
