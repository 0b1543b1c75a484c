use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::*;
use romaudit::core::DEFAULT_FRAME_CEILING;
use romaudit::runner::DEFAULT_CHECKER;
use romaudit::{
    AuditConfig, AuditEngine, CheckerRegistry, Classification, ReportFormat, Reporter, RunSummary,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Files, directories or zip archives to audit
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Descend below the first level of containers
    #[arg(short, long)]
    recurse: bool,

    /// Run one session per available CPU instead of one at a time
    #[arg(short, long)]
    concurrent: bool,

    /// Checker to run against every image (see `romaudit list`)
    #[arg(short = 'a', long, default_value = DEFAULT_CHECKER)]
    checker: String,

    /// Frames a session may run before it is stopped
    #[arg(long, default_value_t = DEFAULT_FRAME_CEILING, value_parser = clap::value_parser!(u64).range(1..))]
    frames: u64,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// After the run, list images that were found under more than one name
    #[arg(long)]
    duplicates: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum OutputFormat {
    Table,
    Jsonl,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => ReportFormat::Table,
            OutputFormat::Jsonl => ReportFormat::JsonLines,
        }
    }
}

impl RunArgs {
    pub fn execute(&self) -> Result<()> {
        let config = AuditConfig::default()
            .with_recurse(self.recurse)
            .with_concurrent(self.concurrent)
            .with_checker(self.checker.as_str())
            .with_frame_ceiling(self.frames);

        let engine = AuditEngine::new(config, Arc::new(CheckerRegistry::default()))?;

        let reporter = Reporter::stdout(self.format.into())
            .with_color(self.format == OutputFormat::Table && std::io::stdout().is_terminal());
        reporter
            .header()
            .context("Failed to write report header")?;

        let summary = engine
            .run(&self.paths, &reporter)
            .context("Audit aborted")?;

        print_summary(engine.checker_id(), &summary);
        if self.duplicates {
            print_duplicates(&summary);
        }
        Ok(())
    }
}

fn print_summary(checker: &str, summary: &RunSummary) {
    let color = std::io::stderr().is_terminal();
    let counts: Vec<String> = Classification::ALL
        .iter()
        .map(|c| {
            let text = format!("{} {}", summary.tally.get(*c), c);
            if color {
                text.color(c.color()).to_string()
            } else {
                text
            }
        })
        .collect();

    eprintln!(
        "\n{}: {} images audited with {} ({}), {} duplicates skipped",
        if color { "Summary".bold().to_string() } else { "Summary".to_string() },
        summary.tally.total(),
        checker,
        counts.join(", "),
        summary.duplicates_skipped
    );
}

fn print_duplicates(summary: &RunSummary) {
    if summary.duplicate_groups.is_empty() {
        eprintln!("No duplicate images found");
        return;
    }

    eprintln!("\nDuplicate images:");
    for group in &summary.duplicate_groups {
        eprintln!("  {}", group.fingerprint);
        for name in &group.names {
            eprintln!("    {name}");
        }
    }
}
