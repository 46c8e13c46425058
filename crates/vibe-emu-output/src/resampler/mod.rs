use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::producer::StereoSample;

mod cosine;
mod sinc;

pub use cosine::{CosineResampler, DEFAULT_COSINE_DECIMATION};
pub use sinc::{SincParams, SincResampler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResamplerKind {
    Sinc,
    #[serde(alias = "cc")]
    Cosine,
}

impl Default for ResamplerKind {
    fn default() -> Self {
        // The sinc filter bank is too slow on the MIPS handhelds.
        if cfg!(target_arch = "mips") {
            Self::Cosine
        } else {
            Self::Sinc
        }
    }
}

impl ResamplerKind {
    /// Option value understood by frontends.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sinc => "sinc",
            Self::Cosine => "cosine",
        }
    }
}

impl fmt::Display for ResamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResamplerError {
    #[error("invalid resampler parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("failed to allocate {requested} resampler coefficients")]
    Allocation { requested: usize },
}

/// Converts native-rate stereo samples to a fixed host rate.
///
/// Both backends decimate by an integer factor with an integer phase counter,
/// so the number of outputs only ever depends on the number of inputs.
pub trait Resampler: Send {
    fn kind(&self) -> ResamplerKind;

    /// Host-rate output in Hz.
    fn output_rate(&self) -> f64;

    fn push_samples(&mut self, samples: &[StereoSample]);

    /// Finished output pairs ready to be read.
    fn available(&self) -> usize;

    /// Move up to `out.len()` finished pairs into `out`.
    fn read(&mut self, out: &mut [StereoSample]) -> usize;

    /// Callers read during a tick once `available()` reaches this.
    fn high_water_mark(&self) -> usize;

    fn reset(&mut self);
}

/// Build a backend of the requested kind.
pub fn build(
    kind: ResamplerKind,
    sinc: &SincParams,
    cosine_decimation: u32,
    native_rate: u32,
) -> Result<Box<dyn Resampler>, ResamplerError> {
    Ok(match kind {
        ResamplerKind::Sinc => Box::new(SincResampler::new(sinc, native_rate)?),
        ResamplerKind::Cosine => Box::new(CosineResampler::new(cosine_decimation, native_rate)?),
    })
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ResamplerError {
    ResamplerError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cc_is_an_alias_for_cosine() {
        #[derive(Deserialize)]
        struct Wrap {
            kind: ResamplerKind,
        }
        let w: Wrap = toml::from_str("kind = \"cc\"").unwrap();
        assert_eq!(w.kind, ResamplerKind::Cosine);
        let w: Wrap = toml::from_str("kind = \"sinc\"").unwrap();
        assert_eq!(w.kind, ResamplerKind::Sinc);
    }
}
