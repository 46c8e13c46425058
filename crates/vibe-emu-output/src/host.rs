use crate::producer::StereoSample;
use crate::timing::AvInfo;

/// Push-based audio sink on the host side.
pub trait AudioSink {
    /// Offer a batch of interleaved stereo pairs. Returns how many pairs were
    /// accepted; accepting fewer than offered is allowed and must not block.
    fn upload(&mut self, samples: &[StereoSample]) -> usize;
}

/// Push-based video sink on the host side.
pub trait VideoSink {
    /// Present a frame. `None` asks the host to repeat the previous frame.
    /// `pitch` is the row stride in pixels.
    fn refresh(&mut self, frame: Option<&[u32]>, width: usize, height: usize, pitch: usize);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

/// A short user-visible message (on-screen display in most frontends).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub duration_ms: u32,
    pub level: NoticeLevel,
}

/// Optional host capabilities. Every method has a safe "unsupported" default.
pub trait HostEnvironment {
    fn notify(&mut self, _notice: &Notice) {}

    /// Push new session metadata. Returns `false` if the host cannot accept it.
    fn set_av_info(&mut self, _info: &AvInfo) -> bool {
        false
    }

    /// Ask the host to reflect an option value change in its own settings UI.
    fn set_option(&mut self, _key: &str, _value: &str) -> bool {
        false
    }

    /// Whether the host understands the "repeat previous frame" sentinel.
    fn can_dupe(&self) -> bool {
        true
    }
}

/// Environment for hosts that support nothing beyond the defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEnvironment;

impl HostEnvironment for NullEnvironment {}

/// The three host endpoints passed into every tick.
pub struct HostIo<'a> {
    pub audio: &'a mut dyn AudioSink,
    pub video: &'a mut dyn VideoSink,
    pub env: &'a mut dyn HostEnvironment,
}
