//! romaudit - batch auditing of emulated program images
//!
//! This crate walks file trees (including nested zip archives), runs every
//! unique program image it finds through a short emulation session and lets a
//! pluggable checker decide whether the image passes.

pub mod archive;
pub mod checkers;
pub mod console;
pub mod core;
pub mod runner;

pub use archive::SourceNode;
pub use checkers::{ColourCountChecker, HighHueChecker, VsyncWithoutVblankChecker};
pub use console::{CartridgeBuilder, Console, Hook, Observer, TraceConsole};
pub use core::{
    AuditConfig, AuditError, CheckStatus, Checker, Classification, Fingerprint, HookRegistrar,
    Image, Outcome, OutcomeRecord, Verdict,
};
pub use runner::{AuditEngine, CheckerRegistry, ReportFormat, Reporter, RunSummary};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
