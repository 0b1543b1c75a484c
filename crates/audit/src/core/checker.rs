//! The checker protocol.
//!
//! A checker is a small state machine driven by a session:
//!
//! 1. `initialise` subscribes to the console hooks it needs,
//! 2. `check` runs after every simulated step and may end the run,
//! 3. `finalise` runs exactly once after the loop stops and yields the verdict.
//!
//! Hook events arrive through the [`Observer`] supertrait, and only for the
//! hooks the checker subscribed to. Checkers never hold a reference to the
//! console; `check` receives a read-only view each step instead.

use crate::console::{Console, Hook, Observer};
use crate::core::error::CheckerError;

/// Returned by [`Checker::check`] after each step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Continue,
    /// Enough evidence gathered. Not a verdict; `finalise` decides.
    Completed,
    /// Unrecoverable condition. The run stops and the text is reported.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Ok(Option<String>),
    Failed(String),
}

pub trait Checker: Observer + Send {
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str {
        "No description provided"
    }

    fn initialise(&mut self, hooks: &mut HookRegistrar<'_>) -> Result<(), CheckerError>;

    fn check(&mut self, console: &dyn Console) -> CheckStatus;

    fn finalise(&mut self) -> Verdict;
}

/// The set of hooks a checker subscribed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookSet {
    frame_boundary: bool,
    register_write: bool,
    pixel_stream: bool,
}

impl HookSet {
    pub fn insert(&mut self, hook: Hook) {
        match hook {
            Hook::FrameBoundary => self.frame_boundary = true,
            Hook::RegisterWrite => self.register_write = true,
            Hook::PixelStream => self.pixel_stream = true,
        }
    }

    pub fn contains(&self, hook: Hook) -> bool {
        match hook {
            Hook::FrameBoundary => self.frame_boundary,
            Hook::RegisterWrite => self.register_write,
            Hook::PixelStream => self.pixel_stream,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.frame_boundary || self.register_write || self.pixel_stream)
    }
}

/// Handed to [`Checker::initialise`] to subscribe to console hooks.
pub struct HookRegistrar<'a> {
    console: &'a dyn Console,
    hooks: HookSet,
}

impl<'a> HookRegistrar<'a> {
    pub fn new(console: &'a dyn Console) -> Self {
        Self {
            console,
            hooks: HookSet::default(),
        }
    }

    pub fn subscribe(&mut self, hook: Hook) -> Result<(), CheckerError> {
        if !self.console.supports(hook) {
            return Err(CheckerError::UnsupportedHook(hook));
        }
        self.hooks.insert(hook);
        Ok(())
    }

    pub fn into_hooks(self) -> HookSet {
        self.hooks
    }
}
