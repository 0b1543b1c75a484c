//! Audit orchestration
//!
//! The engine walks source roots, claims each image's fingerprint in the
//! dedup registry and dispatches one session per unique image onto a bounded
//! worker pool. Sessions hand their outcomes to the reporter as they finish.
//! The checker registry maps ids to factories so every job gets a fresh
//! checker.

pub mod dedup;
pub mod engine;
pub mod registry;
pub mod report;
pub mod session;

pub use dedup::{DedupRegistry, DuplicateGroup};
pub use engine::{AuditEngine, ConsoleFactory, RunSummary};
pub use registry::{CheckerFactory, CheckerRegistry, DEFAULT_CHECKER};
pub use report::{crop_name, relative_name, ReportFormat, Reporter, Tally, NAME_COLUMN_WIDTH};
pub use session::{Session, SessionReport, StopReason};
