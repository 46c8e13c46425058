//! Real-time audio/video output pipeline for the Game Boy / Game Boy Color core.
//!
//! The emulation core produces native-rate stereo samples and raw frames; this
//! crate resamples the audio to a host rate, paces frame delivery against the
//! sample clock, runs the variable-speed modes, and blends frames before they
//! reach the host. Frontends drive everything through [`pipeline::Pipeline`].

/// Interframe blending (mix and LCD ghosting).
pub mod blend;

/// Serde-backed pipeline configuration.
pub mod config;

/// Frame buffer and packed pixel formats.
pub mod frame;

/// Host-side sinks and environment callbacks.
pub mod host;

/// Growable host-rate PCM queue with adaptive batch delivery.
pub mod output_buffer;

/// Sample/frame ratio tracking and dupe-frame decisions.
pub mod pacer;

/// Pipeline context tying every stage together.
pub mod pipeline;

/// Emulation core interface and the fixed-size sample scratch buffer.
pub mod producer;

/// Native-rate to host-rate resamplers.
pub mod resampler;

/// Fast-forward / slow-motion state machine.
pub mod speed;

/// Machine timing constants and session metadata.
pub mod timing;
