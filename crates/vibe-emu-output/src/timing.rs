/// Stereo samples the APU emits per video frame (one per 2 MHz tick).
pub const SAMPLES_PER_FRAME: u32 = 35_112;

/// Samples requested from the core per `run_for` call.
pub const SAMPLES_PER_RUN: usize = 2064;

/// Nominal upper bound for a single `run_for` call. The core can exceed this.
pub const SAMPLE_SCRATCH_SIZE: usize = SAMPLES_PER_RUN + 2064;

/// Native sample rate: `VIDEO_REFRESH_RATE * SAMPLES_PER_FRAME`.
pub const NATIVE_SAMPLE_RATE: u32 = 2_097_152;

/// DMG/CGB refresh rate, 4 MiHz over 70224 cycles per frame.
pub const VIDEO_REFRESH_RATE: f64 = 4_194_304.0 / 70_224.0;

pub const VIDEO_WIDTH: usize = 160;
pub const VIDEO_HEIGHT: usize = 144;
pub const VIDEO_PITCH: usize = VIDEO_WIDTH;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub base_width: usize,
    pub base_height: usize,
    pub max_width: usize,
    pub max_height: usize,
    pub aspect_ratio: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            base_width: VIDEO_WIDTH,
            base_height: VIDEO_HEIGHT,
            max_width: VIDEO_WIDTH,
            max_height: VIDEO_HEIGHT,
            aspect_ratio: VIDEO_WIDTH as f32 / VIDEO_HEIGHT as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Nominal frame rate. Scaled by the fast-forward multiplier while active.
    pub fps: f64,
    /// Host-rate output of the active resampler.
    pub sample_rate: f64,
}

/// Session metadata the host re-queries after speed or backend changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvInfo {
    pub geometry: Geometry,
    pub timing: Timing,
}

impl AvInfo {
    pub fn new(fps: f64, sample_rate: f64) -> Self {
        Self {
            geometry: Geometry::default(),
            timing: Timing { fps, sample_rate },
        }
    }
}
