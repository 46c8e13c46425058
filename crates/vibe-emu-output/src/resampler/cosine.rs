use std::collections::VecDeque;
use std::f64::consts::PI;

use super::{invalid, Resampler, ResamplerError, ResamplerKind};
use crate::producer::StereoSample;

pub const DEFAULT_COSINE_DECIMATION: u32 = 32;

const UNITY: i32 = 1 << 15;

/// Raised-cosine windowed decimator.
///
/// Each output is the Hann-weighted sum of `2 * decimation` inputs, and
/// consecutive windows overlap by half. The second half of the window is the
/// complement of the first, so the weights seen by any one input add up to
/// exactly one.
pub struct CosineResampler {
    decimation: usize,
    window: Box<[i32]>,
    phase: usize,
    /// Window that ends at the next output.
    finishing: [i64; 2],
    /// Window that starts at the next output.
    starting: [i64; 2],
    pending: VecDeque<StereoSample>,
    output_rate: f64,
}

impl CosineResampler {
    pub fn new(decimation: u32, native_rate: u32) -> Result<Self, ResamplerError> {
        if decimation < 2 {
            return Err(invalid(
                "cosine-decimation",
                format!("{decimation} is fewer than 2"),
            ));
        }
        let d = decimation as usize;
        let len = d
            .checked_mul(2)
            .ok_or(ResamplerError::Allocation { requested: usize::MAX })?;

        let mut window = Vec::new();
        window
            .try_reserve_exact(len)
            .map_err(|_| ResamplerError::Allocation { requested: len })?;
        window.resize(len, 0);
        for i in 0..d {
            let w = 0.5 - 0.5 * (PI * (i as f64 + 0.5) / d as f64).cos();
            let q = (w * f64::from(UNITY)).round() as i32;
            window[i] = q;
            window[i + d] = UNITY - q;
        }

        Ok(Self {
            decimation: d,
            window: window.into_boxed_slice(),
            phase: 0,
            finishing: [0, 0],
            starting: [0, 0],
            pending: VecDeque::new(),
            output_rate: f64::from(native_rate) / f64::from(decimation),
        })
    }

    pub fn decimation(&self) -> usize {
        self.decimation
    }

    fn emit(&mut self) {
        let denom = self.decimation as i64 * i64::from(UNITY);
        let mut out = [0i16; 2];
        for (channel, value) in out.iter_mut().enumerate() {
            let v = (self.finishing[channel] + denom / 2).div_euclid(denom);
            *value = v.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16;
        }
        self.pending.push_back(out);
        self.finishing = self.starting;
        self.starting = [0, 0];
    }
}

impl Resampler for CosineResampler {
    fn kind(&self) -> ResamplerKind {
        ResamplerKind::Cosine
    }

    fn output_rate(&self) -> f64 {
        self.output_rate
    }

    fn push_samples(&mut self, samples: &[StereoSample]) {
        let d = self.decimation;
        for sample in samples {
            let rising = i64::from(self.window[self.phase]);
            let falling = i64::from(self.window[self.phase + d]);
            for channel in 0..2 {
                let x = i64::from(sample[channel]);
                self.finishing[channel] += x * falling;
                self.starting[channel] += x * rising;
            }
            self.phase += 1;
            if self.phase == d {
                self.phase = 0;
                self.emit();
            }
        }
    }

    fn available(&self) -> usize {
        self.pending.len()
    }

    fn read(&mut self, out: &mut [StereoSample]) -> usize {
        let count = out.len().min(self.pending.len());
        for (dst, src) in out.iter_mut().zip(self.pending.drain(..count)) {
            *dst = src;
        }
        count
    }

    fn high_water_mark(&self) -> usize {
        0
    }

    fn reset(&mut self) {
        self.phase = 0;
        self.finishing = [0, 0];
        self.starting = [0, 0];
        self.pending.clear();
    }
}
