use log::{debug, warn};

use crate::frame::FrameBuffer;

/// One native-rate stereo sample pair, left then right.
pub type StereoSample = [i16; 2];

/// Result of one [`SampleProducer::run_for`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOutcome {
    /// Samples the core reports having written. This can exceed the slice it
    /// was given; see [`SampleScratch::accept`].
    pub samples: usize,
    /// A frame boundary was reached inside this call.
    pub frame_complete: bool,
}

/// The emulation core, seen from the output side.
///
/// `run_for` executes until `requested` samples have been produced or a frame
/// boundary is reached, whichever happens first. Pixels are written only when
/// `video` is `Some`; the pipeline passes `None` for frames it intends to skip.
pub trait SampleProducer {
    fn run_for(
        &mut self,
        video: Option<&mut FrameBuffer>,
        audio: &mut [StereoSample],
        requested: usize,
    ) -> RunOutcome;
}

/// Fixed-size landing area for one `run_for` block.
///
/// The core is known to occasionally report more samples than the nominal
/// per-call maximum. Anything past the end of the scratch slice never existed
/// as far as the pipeline is concerned: it is counted, logged, and dropped.
pub struct SampleScratch {
    buf: Box<[StereoSample]>,
    overflow_events: u64,
    dropped_samples: u64,
}

impl SampleScratch {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: vec![[0, 0]; cap.max(1)].into_boxed_slice(),
            overflow_events: 0,
            dropped_samples: 0,
        }
    }

    pub fn cap(&self) -> usize {
        self.buf.len()
    }

    pub fn buffer_mut(&mut self) -> &mut [StereoSample] {
        &mut self.buf
    }

    /// Clamp a reported sample count to the scratch length and return the
    /// samples that are actually usable.
    pub fn accept(&mut self, reported: usize) -> &[StereoSample] {
        let cap = self.buf.len();
        if reported > cap {
            let excess = reported - cap;
            if self.overflow_events == 0 {
                warn!(
                    "Sample producer reported {reported} samples for a {cap}-sample block; dropping {excess}"
                );
            } else {
                debug!("Sample overflow: dropping {excess} of {reported} samples");
            }
            self.overflow_events += 1;
            self.dropped_samples += excess as u64;
        }
        &self.buf[..reported.min(cap)]
    }

    pub fn overflow_events(&self) -> u64 {
        self.overflow_events
    }

    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }
}
