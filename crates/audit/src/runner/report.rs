use crate::core::{Classification, OutcomeRecord};
use colored::Colorize;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

/// Width of the name column in table output.
pub const NAME_COLUMN_WIDTH: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Table,
    JsonLines,
}

/// Name of `path` relative to `root`, without a leading separator. Falls
/// back to the file name when `path` is the root itself.
pub fn relative_name(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let name = relative.to_string_lossy();
    let name = name.trim_start_matches(['/', '\\']);
    if name.is_empty() {
        return path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    name.to_string()
}

/// Keeps the last `width` characters of `name`.
pub fn crop_name(name: &str, width: usize) -> String {
    let len = name.chars().count();
    if len <= width {
        return name.to_string();
    }
    name.chars().skip(len - width).collect()
}

/// Writes outcome rows to a shared sink, one whole row per write.
pub struct Reporter {
    sink: Mutex<Box<dyn Write + Send>>,
    format: ReportFormat,
    color: bool,
}

impl Reporter {
    pub fn new(sink: Box<dyn Write + Send>, format: ReportFormat) -> Self {
        Self {
            sink: Mutex::new(sink),
            format,
            color: false,
        }
    }

    pub fn stdout(format: ReportFormat) -> Self {
        Self::new(Box::new(io::stdout()), format)
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Column header and rule. Nothing for JSON lines.
    pub fn header(&self) -> io::Result<()> {
        if self.format == ReportFormat::JsonLines {
            return Ok(());
        }
        let header = format!(
            "{:<width$}\t{}\t{}\n{}\n",
            "Name",
            "Result",
            "Detail",
            "-".repeat(NAME_COLUMN_WIDTH + 24),
            width = NAME_COLUMN_WIDTH
        );
        self.write_line(&header)
    }

    pub fn emit(&self, record: &OutcomeRecord) -> io::Result<()> {
        let line = self.render(record)?;
        self.write_line(&line)
    }

    /// The row for `record`, newline included.
    pub fn render(&self, record: &OutcomeRecord) -> io::Result<String> {
        match self.format {
            ReportFormat::Table => {
                let name = crop_name(&record.report_name, NAME_COLUMN_WIDTH);
                let tag = if self.color {
                    record
                        .classification
                        .tag()
                        .color(record.classification.color())
                        .to_string()
                } else {
                    record.classification.tag().to_string()
                };
                Ok(format!(
                    "{name:<width$}\t{tag}\t{}\n",
                    record.message,
                    width = NAME_COLUMN_WIDTH
                ))
            }
            ReportFormat::JsonLines => {
                let mut line = serde_json::to_string(record)?;
                line.push('\n');
                Ok(line)
            }
        }
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut sink = self.sink.lock();
        sink.write_all(line.as_bytes())?;
        sink.flush()
    }
}

/// Per-classification totals for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    counts: BTreeMap<Classification, usize>,
}

impl Tally {
    pub fn add(&mut self, classification: Classification) {
        *self.counts.entry(classification).or_default() += 1;
    }

    pub fn get(&self, classification: Classification) -> usize {
        self.counts.get(&classification).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}
