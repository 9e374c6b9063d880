use crate::console::command::{Command, CommandContext, CommandMarker};
use crate::error::Result;
use clap::{Arg, ArgAction, ArgMatches};
use std::io::Write;

/// Prints every registered command name
#[derive(Debug, Default)]
pub struct ListCommand;

impl CommandMarker for ListCommand {
    const NAME: &'static str = "list";
}

impl Command for ListCommand {
    fn configure(&mut self, definition: clap::Command) -> clap::Command {
        definition.about("List available commands").arg(
            Arg::new("raw")
                .long("raw")
                .action(ArgAction::SetTrue)
                .help("Print names only, one per line"),
        )
    }

    fn execute(&mut self, matches: &ArgMatches, context: &mut CommandContext<'_>) -> Result<i32> {
        let names = context.loader.names()?;

        if matches.get_flag("raw") {
            for name in &names {
                writeln!(context.out, "{}", name)?;
            }
            return Ok(0);
        }

        writeln!(context.out, "Available commands:")?;
        for name in &names {
            writeln!(context.out, "  {}", name)?;
        }
        Ok(0)
    }
}
