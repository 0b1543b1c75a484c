//! One image, one console, one checker.
//!
//! A [`Session`] is built for exactly one job and consumed by [`Session::run`].
//! The console is dropped when `run` returns, whichever way the loop ended.

use crate::console::{Console, FrameInfo, Hook, Observer, RegisterWrite, Signal};
use crate::core::{
    CheckStatus, Checker, Classification, HookRegistrar, HookSet, Image, Outcome, Verdict,
};
use tracing::trace;

/// Why the step loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    FrameCeiling,
    CheckerError(String),
    ConsoleFault(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: Outcome,
    /// `None` when the loop never started.
    pub stop: Option<StopReason>,
    pub frames: u64,
    pub steps: u64,
}

pub struct Session {
    console: Box<dyn Console>,
    checker: Box<dyn Checker>,
    frame_ceiling: u64,
}

/// Forwards console events to the checker for the hooks it subscribed to.
struct Dispatch<'a> {
    hooks: HookSet,
    checker: &'a mut dyn Checker,
}

impl Observer for Dispatch<'_> {
    fn new_frame(&mut self, frame: &FrameInfo) {
        if self.hooks.contains(Hook::FrameBoundary) {
            self.checker.new_frame(frame);
        }
    }

    fn register_write(&mut self, write: RegisterWrite) {
        if self.hooks.contains(Hook::RegisterWrite) {
            self.checker.register_write(write);
        }
    }

    fn pixels(&mut self, frame: &FrameInfo, signals: &[Signal]) {
        if self.hooks.contains(Hook::PixelStream) {
            self.checker.pixels(frame, signals);
        }
    }
}

impl Session {
    pub fn new(console: Box<dyn Console>, checker: Box<dyn Checker>, frame_ceiling: u64) -> Self {
        Self {
            console,
            checker,
            frame_ceiling,
        }
    }

    pub fn run(mut self, image: &Image) -> SessionReport {
        if let Err(err) = self.console.attach(image) {
            return SessionReport {
                outcome: Outcome::new(Classification::AttachFailed, err.to_string()),
                stop: None,
                frames: 0,
                steps: 0,
            };
        }
        self.console.reset();

        let mut registrar = HookRegistrar::new(self.console.as_ref());
        if let Err(err) = self.checker.initialise(&mut registrar) {
            return SessionReport {
                outcome: Outcome::new(Classification::Error, err.to_string()),
                stop: None,
                frames: 0,
                steps: 0,
            };
        }
        let hooks = registrar.into_hooks();

        let (stop, steps) = self.drive(hooks);
        let frames = self.console.frame_info().frame_num;
        trace!(checker = self.checker.id(), ?stop, frames, steps, "session loop ended");

        let verdict = self.checker.finalise();
        let outcome = match &stop {
            StopReason::Completed | StopReason::FrameCeiling => match verdict {
                Verdict::Ok(summary) => Outcome::new(
                    Classification::Ok,
                    summary.unwrap_or_else(|| "okay".to_string()),
                ),
                Verdict::Failed(description) => Outcome::new(Classification::Failed, description),
            },
            StopReason::CheckerError(msg) | StopReason::ConsoleFault(msg) => {
                Outcome::new(Classification::Error, msg.clone())
            }
        };

        SessionReport {
            outcome,
            stop: Some(stop),
            frames,
            steps,
        }
    }

    fn drive(&mut self, hooks: HookSet) -> (StopReason, u64) {
        let mut steps = 0u64;
        loop {
            let mut dispatch = Dispatch {
                hooks,
                checker: self.checker.as_mut(),
            };
            if let Err(err) = self.console.step(&mut dispatch) {
                return (StopReason::ConsoleFault(err.to_string()), steps);
            }
            steps += 1;

            match self.checker.check(self.console.as_ref()) {
                CheckStatus::Continue => {}
                CheckStatus::Completed => return (StopReason::Completed, steps),
                CheckStatus::Error(msg) => return (StopReason::CheckerError(msg), steps),
            }

            if self.console.frame_info().frame_num >= self.frame_ceiling {
                return (StopReason::FrameCeiling, steps);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::ColourCountChecker;
    use crate::console::{CartridgeBuilder, TraceConsole};

    fn image(data: Vec<u8>) -> Image {
        Image::from_bytes("session.trc", data).unwrap()
    }

    #[test]
    fn test_attach_failure_skips_checker() {
        let session = Session::new(
            Box::new(TraceConsole::new()),
            Box::new(ColourCountChecker::new()),
            10,
        );
        let report = session.run(&image(b"garbage".to_vec()));

        assert_eq!(report.outcome.classification, Classification::AttachFailed);
        assert!(report.outcome.message.contains("TRC1"));
        assert_eq!(report.stop, None);
    }

    #[test]
    fn test_checker_completion_ends_loop() {
        let session = Session::new(
            Box::new(TraceConsole::new()),
            Box::new(ColourCountChecker::new()),
            1_000,
        );
        let cart = CartridgeBuilder::new().frame(0x20).jump(0).build();
        let report = session.run(&image(cart));

        assert_eq!(report.stop, Some(StopReason::Completed));
        assert_eq!(report.frames, 61);
        assert_eq!(report.outcome.classification, Classification::Ok);
        assert_eq!(report.outcome.message, "|    0 |    1");
    }

    #[test]
    fn test_ceiling_still_finalises() {
        let session = Session::new(
            Box::new(TraceConsole::new()),
            Box::new(ColourCountChecker::new()),
            5,
        );
        let cart = CartridgeBuilder::new().frame(0x20).jump(0).build();
        let report = session.run(&image(cart));

        assert_eq!(report.stop, Some(StopReason::FrameCeiling));
        assert_eq!(report.frames, 5);
        assert_eq!(report.outcome.classification, Classification::Ok);
    }
}
