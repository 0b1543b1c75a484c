//! Core types shared by the engine, the checkers and the consoles.
//!
//! Images and their fingerprints, the checker protocol, outcome records,
//! run configuration and the error taxonomy all live here so the runner and
//! the checker implementations depend on one small vocabulary.

pub mod checker;
pub mod config;
pub mod error;
pub mod image;
pub mod outcome;

pub use checker::{CheckStatus, Checker, HookRegistrar, HookSet, Verdict};
pub use config::{AuditConfig, DEFAULT_FRAME_CEILING};
pub use error::{AttachError, AuditError, CheckerError, ConsoleError, Result};
pub use image::{Fingerprint, Image, MAX_IMAGE_SIZE};
pub use outcome::{Classification, Outcome, OutcomeRecord};
