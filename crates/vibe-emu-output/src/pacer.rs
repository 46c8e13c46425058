use crate::timing::SAMPLES_PER_FRAME;

/// Running totals for one loaded session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaceCounters {
    /// Native samples the core has produced.
    pub samples_count: u64,
    /// Frames accounted for, fresh or duplicated.
    pub frames_count: u64,
}

/// Keeps video delivery aligned to the audio sample clock.
///
/// The core does not produce exactly `samples_per_frame` samples between frame
/// boundaries (LCD toggles lengthen or shorten frames). When the sample clock
/// gets ahead of the frame count, the pipeline sends a dupe frame instead of
/// running the core, letting the counts line back up without a stall.
#[derive(Debug, Clone)]
pub struct FramePacer {
    counters: PaceCounters,
    samples_per_frame: u64,
}

impl FramePacer {
    pub fn new(samples_per_frame: u32) -> Self {
        Self {
            counters: PaceCounters::default(),
            samples_per_frame: u64::from(samples_per_frame.max(1)),
        }
    }

    pub fn counters(&self) -> PaceCounters {
        self.counters
    }

    pub fn samples_per_frame(&self) -> u64 {
        self.samples_per_frame
    }

    pub fn expected_frames(&self) -> u64 {
        self.counters.samples_count / self.samples_per_frame
    }

    /// The sample clock has run ahead by at least one whole frame.
    pub fn needs_dupe(&self) -> bool {
        self.counters.frames_count < self.expected_frames()
    }

    pub fn record_samples(&mut self, samples: u64) {
        self.counters.samples_count += samples;
    }

    pub fn record_frames(&mut self, frames: u64) {
        self.counters.frames_count += frames;
    }

    /// Account for a pacing dupe. Advances by the active speed multiplier but
    /// never past the expected frame index.
    pub fn record_dupe(&mut self, multiplier: u64) {
        let deficit = self
            .expected_frames()
            .saturating_sub(self.counters.frames_count);
        self.counters.frames_count += multiplier.min(deficit).max(1);
    }

    pub fn reset(&mut self) {
        self.counters = PaceCounters::default();
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(SAMPLES_PER_FRAME)
    }
}
