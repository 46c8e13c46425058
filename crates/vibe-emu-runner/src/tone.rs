use vibe_emu_output::frame::{FrameBuffer, PixelFormat};
use vibe_emu_output::producer::{RunOutcome, SampleProducer, StereoSample};

/// Synthetic core: a stereo square wave and a scrolling vertical bar.
///
/// Frames normally end every `samples_per_frame` samples. With long frames
/// enabled, every Nth frame runs 1.5x as long, the way an LCD toggle
/// stretches a frame on hardware.
pub struct ToneCore {
    samples_per_frame: u64,
    long_frame_every: Option<u32>,
    until_frame: u64,
    frames: u64,
    half_period: u64,
    phase: u64,
    amplitude: i16,
    bar: usize,
}

impl ToneCore {
    pub fn new(native_rate: u32, samples_per_frame: u32, tone_hz: u32) -> Self {
        let half_period = (u64::from(native_rate) / (2 * u64::from(tone_hz.max(1)))).max(1);
        let samples_per_frame = u64::from(samples_per_frame.max(1));
        Self {
            samples_per_frame,
            long_frame_every: None,
            until_frame: samples_per_frame,
            frames: 0,
            half_period,
            phase: 0,
            amplitude: 6000,
            bar: 0,
        }
    }

    pub fn with_long_frames(mut self, every: Option<u32>) -> Self {
        self.long_frame_every = every.filter(|&n| n > 0);
        self.until_frame = self.frame_len(0);
        self
    }

    pub fn with_amplitude(mut self, amplitude: i16) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Frames completed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn frame_len(&self, index: u64) -> u64 {
        match self.long_frame_every {
            Some(n) if (index + 1) % u64::from(n) == 0 => self.samples_per_frame * 3 / 2,
            _ => self.samples_per_frame,
        }
    }

    fn render(&self, frame: &mut FrameBuffer) {
        let format = frame.format();
        let background = shade(format, 0.1);
        let bar = shade(format, 1.0);
        let width = frame.width();
        for y in 0..frame.height() {
            let row = frame.row_mut(y);
            row.fill(background);
            row[self.bar % width] = bar;
        }
    }
}

fn shade(format: PixelFormat, level: f32) -> u32 {
    let max = format.channel_max();
    format.pack(max.map(|m| (m as f32 * level) as i32))
}

impl SampleProducer for ToneCore {
    fn run_for(
        &mut self,
        video: Option<&mut FrameBuffer>,
        audio: &mut [StereoSample],
        requested: usize,
    ) -> RunOutcome {
        let n = requested
            .min(audio.len())
            .min(usize::try_from(self.until_frame).unwrap_or(usize::MAX));

        for slot in &mut audio[..n] {
            let high = (self.phase / self.half_period) % 2 == 0;
            let v = if high { self.amplitude } else { -self.amplitude };
            *slot = [v, v / 2];
            self.phase += 1;
        }

        self.until_frame -= n as u64;
        let frame_complete = self.until_frame == 0;
        if frame_complete {
            if let Some(frame) = video {
                self.render(frame);
            }
            self.frames += 1;
            self.bar = self.bar.wrapping_add(1);
            self.until_frame = self.frame_len(self.frames);
        }

        RunOutcome {
            samples: n,
            frame_complete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_third_frame_is_long() {
        let core = ToneCore::new(2_097_152, 100, 440).with_long_frames(Some(3));
        let lens: Vec<_> = (0..6).map(|i| core.frame_len(i)).collect();
        assert_eq!(lens, vec![100, 100, 150, 100, 100, 150]);
    }
}
