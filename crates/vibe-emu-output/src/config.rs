use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blend::{BlendMode, DEFAULT_LCD_RESPONSE_TIME};
use crate::frame::PixelFormat;
use crate::resampler::{DEFAULT_COSINE_DECIMATION, ResamplerKind, SincParams};
use crate::speed::MAX_FAST_FORWARD_LEVEL;
use crate::timing::{NATIVE_SAMPLE_RATE, SAMPLE_SCRATCH_SIZE, SAMPLES_PER_FRAME, SAMPLES_PER_RUN};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("lcd-response-time {0} is outside [0, 1)")]
    ResponseTime(f64),
    #[error("fast-forward-levels {0} is outside 1..={MAX_FAST_FORWARD_LEVEL}")]
    FastForwardLevels(u8),
    #[error("samples-per-frame must be non-zero")]
    SamplesPerFrame,
    #[error("samples-per-run {run} must be between 1 and sample-cap ({cap})")]
    SamplesPerRun { run: usize, cap: usize },
    #[error("sample-cap must be non-zero")]
    SampleCap,
    #[error("native-sample-rate must be non-zero")]
    NativeSampleRate,
    #[error("cosine-decimation {0} is fewer than 2")]
    CosineDecimation(u32),
}

/// Every knob the output pipeline reads. All keys are optional in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PipelineConfig {
    pub resampler: ResamplerKind,
    pub cosine_decimation: u32,
    pub blend: BlendMode,
    pub lcd_response_time: f64,
    pub pixel_format: PixelFormat,
    pub fast_forward_enabled: bool,
    pub fast_forward_levels: u8,
    pub audio_during_speed_change: bool,
    pub slow_motion_enabled: bool,
    pub samples_per_frame: u32,
    pub samples_per_run: usize,
    pub sample_cap: usize,
    pub native_sample_rate: u32,
    /// Kept last so it serializes as a trailing `[sinc]` table.
    pub sinc: SincParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resampler: ResamplerKind::default(),
            cosine_decimation: DEFAULT_COSINE_DECIMATION,
            blend: BlendMode::None,
            lcd_response_time: DEFAULT_LCD_RESPONSE_TIME,
            pixel_format: PixelFormat::default(),
            fast_forward_enabled: true,
            fast_forward_levels: 2,
            audio_during_speed_change: false,
            slow_motion_enabled: true,
            samples_per_frame: SAMPLES_PER_FRAME,
            samples_per_run: SAMPLES_PER_RUN,
            sample_cap: SAMPLE_SCRATCH_SIZE,
            native_sample_rate: NATIVE_SAMPLE_RATE,
            sinc: SincParams::default(),
        }
    }
}

fn response_time_valid(value: f64) -> bool {
    (0.0..1.0).contains(&value)
}

impl PipelineConfig {
    /// Check every value. Resampler filter parameters are not checked here;
    /// a bad sinc design falls back to the cosine backend at build time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !response_time_valid(self.lcd_response_time) {
            return Err(ConfigError::ResponseTime(self.lcd_response_time));
        }
        if !(1..=MAX_FAST_FORWARD_LEVEL).contains(&self.fast_forward_levels) {
            return Err(ConfigError::FastForwardLevels(self.fast_forward_levels));
        }
        if self.samples_per_frame == 0 {
            return Err(ConfigError::SamplesPerFrame);
        }
        if self.sample_cap == 0 {
            return Err(ConfigError::SampleCap);
        }
        if self.samples_per_run == 0 || self.samples_per_run > self.sample_cap {
            return Err(ConfigError::SamplesPerRun {
                run: self.samples_per_run,
                cap: self.sample_cap,
            });
        }
        if self.native_sample_rate == 0 {
            return Err(ConfigError::NativeSampleRate);
        }
        if self.cosine_decimation < 2 {
            return Err(ConfigError::CosineDecimation(self.cosine_decimation));
        }
        Ok(())
    }

    /// Replace out-of-range values with usable ones, warning for each.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        if !response_time_valid(self.lcd_response_time) {
            warn!(
                "lcd-response-time {} is outside [0, 1); using {}",
                self.lcd_response_time, defaults.lcd_response_time
            );
            self.lcd_response_time = defaults.lcd_response_time;
        }
        let levels = self.fast_forward_levels.clamp(1, MAX_FAST_FORWARD_LEVEL);
        if levels != self.fast_forward_levels {
            warn!(
                "fast-forward-levels {} is outside 1..={MAX_FAST_FORWARD_LEVEL}; using {levels}",
                self.fast_forward_levels
            );
            self.fast_forward_levels = levels;
        }
        if self.samples_per_frame == 0 {
            warn!("samples-per-frame is zero; using {}", defaults.samples_per_frame);
            self.samples_per_frame = defaults.samples_per_frame;
        }
        if self.sample_cap == 0 {
            warn!("sample-cap is zero; using {}", defaults.sample_cap);
            self.sample_cap = defaults.sample_cap;
        }
        if self.samples_per_run == 0 {
            warn!("samples-per-run is zero; using {}", defaults.samples_per_run);
            self.samples_per_run = defaults.samples_per_run;
        }
        if self.samples_per_run > self.sample_cap {
            warn!(
                "samples-per-run {} exceeds sample-cap {}; clamping",
                self.samples_per_run, self.sample_cap
            );
            self.samples_per_run = self.sample_cap;
        }
        if self.native_sample_rate == 0 {
            warn!("native-sample-rate is zero; using {}", defaults.native_sample_rate);
            self.native_sample_rate = defaults.native_sample_rate;
        }
        if self.cosine_decimation < 2 {
            warn!(
                "cosine-decimation {} is fewer than 2; using {}",
                self.cosine_decimation, defaults.cosine_decimation
            );
            self.cosine_decimation = defaults.cosine_decimation;
        }
        self
    }

    /// Filter design or rate fields differ. The backend kind is compared by
    /// the caller, which knows whether a fallback is in effect.
    pub(crate) fn backend_params_changed(&self, other: &Self) -> bool {
        self.sinc != other.sinc
            || self.cosine_decimation != other.cosine_decimation
            || self.native_sample_rate != other.native_sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(PipelineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn sanitize_fixes_every_invalid_field() {
        let cfg = PipelineConfig {
            lcd_response_time: 1.5,
            fast_forward_levels: 9,
            samples_per_frame: 0,
            samples_per_run: 10_000,
            sample_cap: 4128,
            native_sample_rate: 0,
            cosine_decimation: 1,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());

        let fixed = cfg.sanitized();
        assert_eq!(fixed.validate(), Ok(()));
        assert_eq!(fixed.fast_forward_levels, MAX_FAST_FORWARD_LEVEL);
        assert_eq!(fixed.samples_per_run, 4128);
    }
}
