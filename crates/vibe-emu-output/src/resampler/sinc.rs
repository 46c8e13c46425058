use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{invalid, Resampler, ResamplerError, ResamplerKind};
use crate::producer::StereoSample;

const UNITY: i64 = 1 << 15;

/// Filter design for the band-limited backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SincParams {
    pub taps: usize,
    /// Passband edge as a fraction of the output Nyquist frequency.
    pub cutoff: f64,
    /// Kaiser window shape.
    pub beta: f64,
    /// Input samples per output sample. Must be a power of two.
    pub decimation: u32,
    /// Output pairs the accumulator holds between reads.
    pub buffer_samples: usize,
}

impl Default for SincParams {
    fn default() -> Self {
        Self {
            taps: 32,
            cutoff: 0.85,
            beta: 6.5,
            decimation: 64,
            buffer_samples: 1536,
        }
    }
}

impl SincParams {
    pub fn validate(&self) -> Result<(), ResamplerError> {
        if self.decimation < 2 || !self.decimation.is_power_of_two() {
            return Err(invalid(
                "decimation",
                format!("{} is not a power of two >= 2", self.decimation),
            ));
        }
        if self.taps < 2 {
            return Err(invalid("taps", format!("{} is fewer than 2", self.taps)));
        }
        if !(self.cutoff > 0.0 && self.cutoff <= 1.0) {
            return Err(invalid(
                "cutoff",
                format!("{} is outside (0, 1]", self.cutoff),
            ));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(invalid("beta", format!("{} is not a finite value >= 0", self.beta)));
        }
        if self.buffer_samples < self.taps * 2 {
            return Err(invalid(
                "buffer-samples",
                format!(
                    "{} is smaller than twice the tap count ({})",
                    self.buffer_samples,
                    self.taps * 2
                ),
            ));
        }
        Ok(())
    }
}

/// Zeroth-order modified Bessel function of the first kind.
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let half = x / 2.0;
    for k in 1..64 {
        let f = half / k as f64;
        term *= f * f;
        sum += term;
        if term < sum * 1e-12 {
            break;
        }
    }
    sum
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-9 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Build the `decimation x taps` Q15 filter bank. Row `p` is the kernel for an
/// impulse that lands `p` input samples before its first output slot; every
/// row sums to exactly `1 << 15`.
fn design_bank(params: &SincParams) -> Result<Vec<i32>, ResamplerError> {
    let phases = params.decimation as usize;
    let taps = params.taps;
    let len = phases
        .checked_mul(taps)
        .ok_or(ResamplerError::Allocation { requested: usize::MAX })?;

    let mut bank = Vec::new();
    bank.try_reserve_exact(len)
        .map_err(|_| ResamplerError::Allocation { requested: len })?;

    let center = (len as f64) / 2.0;
    let i0_beta = bessel_i0(params.beta);
    let mut row = vec![0.0f64; taps];

    for phase in 0..phases {
        let mut sum = 0.0;
        for (t, h) in row.iter_mut().enumerate() {
            let d = (t * phases + phase) as f64 - center;
            let x = d / center;
            let window = bessel_i0(params.beta * (1.0 - x * x).max(0.0).sqrt()) / i0_beta;
            *h = sinc(params.cutoff * d / phases as f64) * window;
            sum += *h;
        }
        if !sum.is_finite() || sum.abs() < 1e-9 {
            return Err(invalid("cutoff", "filter kernel has no DC gain"));
        }

        let start = bank.len();
        let mut total = 0i64;
        for h in &row {
            let q = (h / sum * UNITY as f64).round() as i32;
            total += i64::from(q);
            bank.push(q);
        }

        // Put the rounding residual on the largest tap so DC passes exactly.
        if let Some((peak, _)) = bank[start..]
            .iter()
            .enumerate()
            .max_by_key(|(_, q)| q.unsigned_abs())
        {
            bank[start + peak] += (UNITY - total) as i32;
        }
    }

    Ok(bank)
}

/// Band-limited step synthesis.
///
/// Every change in an input channel is spread over `taps` output slots through
/// a windowed-sinc kernel chosen by the sub-sample phase of the change. Reading
/// integrates the accumulated deltas, so a constant input settles on exactly
/// its own value.
pub struct SincResampler {
    params: SincParams,
    bank: Vec<i32>,
    accum: Vec<[i64; 2]>,
    integrator: [i64; 2],
    last: [i16; 2],
    /// Input samples pushed since output slot 0.
    phase: usize,
    output_rate: f64,
}

impl SincResampler {
    pub fn new(params: &SincParams, native_rate: u32) -> Result<Self, ResamplerError> {
        params.validate()?;
        let bank = design_bank(params)?;

        let accum_len = params.buffer_samples + params.taps;
        let mut accum = Vec::new();
        accum
            .try_reserve_exact(accum_len)
            .map_err(|_| ResamplerError::Allocation {
                requested: accum_len,
            })?;
        accum.resize(accum_len, [0, 0]);

        Ok(Self {
            params: *params,
            bank,
            accum,
            integrator: [0, 0],
            last: [0, 0],
            phase: 0,
            output_rate: f64::from(native_rate) / f64::from(params.decimation),
        })
    }

    pub fn params(&self) -> &SincParams {
        &self.params
    }

    /// Output slots by which content trails the input.
    pub fn latency(&self) -> usize {
        self.params.taps / 2
    }

    #[inline]
    fn place(&mut self, channel: usize, time: usize, delta: i64) {
        let decimation = self.params.decimation as usize;
        let taps = self.params.taps;
        let target = time.div_ceil(decimation);
        let filter_phase = target * decimation - time;

        if self.accum.len() < target + taps {
            self.accum.resize(target + taps, [0, 0]);
        }

        let row = &self.bank[filter_phase * taps..(filter_phase + 1) * taps];
        for (slot, &h) in self.accum[target..target + taps].iter_mut().zip(row) {
            slot[channel] += delta * i64::from(h);
        }
    }
}

impl Resampler for SincResampler {
    fn kind(&self) -> ResamplerKind {
        ResamplerKind::Sinc
    }

    fn output_rate(&self) -> f64 {
        self.output_rate
    }

    fn push_samples(&mut self, samples: &[StereoSample]) {
        for sample in samples {
            for channel in 0..2 {
                let delta = i64::from(sample[channel]) - i64::from(self.last[channel]);
                if delta != 0 {
                    self.last[channel] = sample[channel];
                    self.place(channel, self.phase, delta);
                }
            }
            self.phase += 1;
        }

        // Constant runs place nothing, but every slot up to `available()`
        // must still exist for `read` to integrate.
        let needed = self.available() + self.params.taps;
        if self.accum.len() < needed {
            self.accum.resize(needed, [0, 0]);
        }
    }

    fn available(&self) -> usize {
        self.phase / self.params.decimation as usize
    }

    fn read(&mut self, out: &mut [StereoSample]) -> usize {
        let count = out.len().min(self.available());

        for (dst, slot) in out.iter_mut().zip(&self.accum[..count]) {
            for channel in 0..2 {
                self.integrator[channel] += slot[channel];
                let value = (self.integrator[channel] + (UNITY >> 1)) >> 15;
                dst[channel] = value.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16;
            }
        }

        self.accum.copy_within(count.., 0);
        let len = self.accum.len();
        self.accum[len - count..].fill([0, 0]);
        self.phase -= count * self.params.decimation as usize;
        count
    }

    fn high_water_mark(&self) -> usize {
        self.params.buffer_samples / 2
    }

    fn reset(&mut self) {
        self.accum.fill([0, 0]);
        self.integrator = [0, 0];
        self.last = [0, 0];
        self.phase = 0;
    }
}
