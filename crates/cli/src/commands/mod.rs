//! Command implementations for the romaudit CLI
//!
//! `run` walks the given paths and audits every unique image with one
//! checker, writing a row per image to stdout. `list` shows the checkers that
//! `run --checker` accepts.

pub mod list;
pub mod run;
