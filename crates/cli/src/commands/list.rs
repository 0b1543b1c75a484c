use anyhow::Result;
use clap::Args;
use colored::*;
use romaudit::CheckerRegistry;
use std::io::IsTerminal;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print only the checker ids, one per line
    #[arg(short, long)]
    quiet: bool,
}

impl ListArgs {
    pub fn execute(&self) -> Result<()> {
        let registry = CheckerRegistry::default();
        let default_id = registry.default_id().map(str::to_string);
        let color = std::io::stdout().is_terminal();

        if self.quiet {
            for id in registry.list_ids() {
                println!("{id}");
            }
            return Ok(());
        }

        let width = registry
            .list_ids()
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0);

        for (id, description) in registry.describe() {
            let marker = if default_id.as_deref() == Some(id.as_str()) {
                " (default)"
            } else {
                ""
            };
            let padded = format!("{id:<width$}");
            if color {
                println!("{}  {}{}", padded.bright_cyan().bold(), description, marker.dimmed());
            } else {
                println!("{padded}  {description}{marker}");
            }
        }
        Ok(())
    }
}
