//! Headless host for the output pipeline: a synthetic core, a simulated
//! device clock, and optional playback through the default audio device.

#[cfg(feature = "cpal-output")]
pub mod audio;
pub mod audio_queue;
pub mod config;
pub mod host;
pub mod tone;
