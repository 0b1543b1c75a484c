use crate::checkers::FRAME_BUDGET;
use crate::console::{Console, FrameInfo, Hook, Observer, Signal};
use crate::core::{CheckStatus, Checker, CheckerError, HookRegistrar, Verdict};

/// Hues `$E` and `$F` render differently between TV standards.
const RESERVED_HUES: [u8; 2] = [0x0e, 0x0f];

/// Flags images that draw a visible pixel in one of the reserved hues once
/// the picture is stable.
#[derive(Default)]
pub struct HighHueChecker {
    frames: u64,
    uses_high_hue: bool,
}

impl HighHueChecker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Observer for HighHueChecker {
    fn new_frame(&mut self, _frame: &FrameInfo) {
        self.frames += 1;
    }

    fn pixels(&mut self, frame: &FrameInfo, signals: &[Signal]) {
        if self.uses_high_hue || !frame.stable {
            return;
        }
        self.uses_high_hue = signals
            .iter()
            .any(|s| s.is_visible() && RESERVED_HUES.contains(&s.hue()));
    }
}

impl Checker for HighHueChecker {
    fn id(&self) -> &'static str {
        "HighHue"
    }

    fn description(&self) -> &'static str {
        "Fails images that draw colours with hue $E or $F"
    }

    fn initialise(&mut self, hooks: &mut HookRegistrar<'_>) -> Result<(), CheckerError> {
        hooks.subscribe(Hook::FrameBoundary)?;
        hooks.subscribe(Hook::PixelStream)
    }

    fn check(&mut self, _console: &dyn Console) -> CheckStatus {
        if self.frames > FRAME_BUDGET {
            return CheckStatus::Completed;
        }
        CheckStatus::Continue
    }

    fn finalise(&mut self) -> Verdict {
        if self.uses_high_hue {
            return Verdict::Failed("ROM uses colour-lum value of $Ex or $Fx".to_string());
        }
        Verdict::Ok(None)
    }
}
