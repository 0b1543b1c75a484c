use crate::checkers::FRAME_BUDGET;
use crate::console::{registers, Console, FrameInfo, Hook, Observer, RegisterWrite};
use crate::core::{CheckStatus, Checker, CheckerError, HookRegistrar, Verdict};

/// Histogram of the values written to the colour registers.
///
/// Writes are split into two buckets by the low bit of the register address
/// (COLUP0/COLUPF against COLUP1/COLUBK). The summary is the number of
/// distinct colour values seen in each bucket. Never fails.
pub struct ColourCountChecker {
    frames: u64,
    counts: [[u32; 128]; 2],
}

impl Default for ColourCountChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl ColourCountChecker {
    pub fn new() -> Self {
        Self {
            frames: 0,
            counts: [[0; 128]; 2],
        }
    }

    pub fn bucket_populations(&self) -> [usize; 2] {
        self.counts
            .map(|bucket| bucket.iter().filter(|&&count| count > 0).count())
    }
}

impl Observer for ColourCountChecker {
    fn new_frame(&mut self, _frame: &FrameInfo) {
        self.frames += 1;
    }

    fn register_write(&mut self, write: RegisterWrite) {
        if registers::is_colour_register(write.address) {
            let bucket = usize::from(write.address & 0x01);
            self.counts[bucket][usize::from(write.data >> 1)] += 1;
        }
    }
}

impl Checker for ColourCountChecker {
    fn id(&self) -> &'static str {
        "COLUxxCount"
    }

    fn description(&self) -> &'static str {
        "Counts distinct values written to the colour registers"
    }

    fn initialise(&mut self, hooks: &mut HookRegistrar<'_>) -> Result<(), CheckerError> {
        hooks.subscribe(Hook::FrameBoundary)?;
        hooks.subscribe(Hook::RegisterWrite)
    }

    fn check(&mut self, _console: &dyn Console) -> CheckStatus {
        if self.frames > FRAME_BUDGET {
            return CheckStatus::Completed;
        }
        CheckStatus::Continue
    }

    fn finalise(&mut self) -> Verdict {
        let [even, odd] = self.bucket_populations();
        Verdict::Ok(Some(format!("| {even:>4} | {odd:>4}")))
    }
}
