use crate::checkers::FRAME_BUDGET;
use crate::console::{Console, FrameInfo, Hook, Observer};
use crate::core::{CheckStatus, Checker, CheckerError, HookRegistrar, Verdict};

/// Flags images that raise VSYNC without also holding VBLANK, judged on the
/// most recent signal after every step of stable output.
#[derive(Default)]
pub struct VsyncWithoutVblankChecker {
    frames: u64,
    unblanked_sync: bool,
}

impl VsyncWithoutVblankChecker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Observer for VsyncWithoutVblankChecker {
    fn new_frame(&mut self, _frame: &FrameInfo) {
        self.frames += 1;
    }
}

impl Checker for VsyncWithoutVblankChecker {
    fn id(&self) -> &'static str {
        "VSYNCwithoutVBLANK"
    }

    fn description(&self) -> &'static str {
        "Fails images that assert VSYNC while VBLANK is off"
    }

    fn initialise(&mut self, hooks: &mut HookRegistrar<'_>) -> Result<(), CheckerError> {
        hooks.subscribe(Hook::FrameBoundary)
    }

    fn check(&mut self, console: &dyn Console) -> CheckStatus {
        if self.frames > FRAME_BUDGET {
            return CheckStatus::Completed;
        }
        if !console.frame_info().stable {
            return CheckStatus::Continue;
        }

        let signal = console.last_signal();
        if signal.vsync && !signal.vblank {
            self.unblanked_sync = true;
        }
        CheckStatus::Continue
    }

    fn finalise(&mut self) -> Verdict {
        if self.unblanked_sync {
            return Verdict::Failed("ROM uses VSYNC without VBLANK".to_string());
        }
        Verdict::Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::{CartridgeBuilder, TraceConsole};
    use crate::core::{Classification, Image};
    use crate::runner::session::Session;

    fn run(cart: Vec<u8>) -> crate::core::Outcome {
        let image = Image::from_bytes("sync.trc", cart).unwrap();
        Session::new(
            Box::new(TraceConsole::new()),
            Box::new(VsyncWithoutVblankChecker::new()),
            120,
        )
        .run(&image)
        .outcome
    }

    #[test]
    fn test_blanked_sync_passes() {
        let outcome = run(CartridgeBuilder::new().frame(0x40).jump(0).build());
        assert_eq!(outcome.classification, Classification::Ok);
        assert_eq!(outcome.message, "okay");
    }

    #[test]
    fn test_unblanked_sync_fails() {
        let outcome = run(CartridgeBuilder::new()
            .frame_with_sync(0x40, false)
            .jump(0)
            .build());
        assert_eq!(outcome.classification, Classification::Failed);
        assert!(outcome.message.contains("VBLANK"));
    }

    #[test]
    fn test_unstable_output_is_not_judged() {
        let mut checker = VsyncWithoutVblankChecker::new();
        let console = TraceConsole::new();
        assert_eq!(checker.check(&console), CheckStatus::Continue);
        assert_eq!(checker.finalise(), Verdict::Ok(None));
    }
}
