#![allow(dead_code)]

use vibe_emu_output::frame::FrameBuffer;
use vibe_emu_output::host::{AudioSink, HostEnvironment, HostIo, Notice, VideoSink};
use vibe_emu_output::pipeline::{Pipeline, TickReport};
use vibe_emu_output::producer::{RunOutcome, SampleProducer, StereoSample};
use vibe_emu_output::speed::SpeedInput;
use vibe_emu_output::timing::AvInfo;

/// Scripted stand-in for the emulation core.
pub struct ScriptedCore {
    /// Samples between frame boundaries; `None` never finishes a frame.
    pub frame_len: Option<u64>,
    until_frame: u64,
    /// Caps each call below what was requested.
    pub max_per_call: Option<usize>,
    /// Extra samples reported on top of what was written.
    pub over_report: usize,
    pub level: i16,
    pub calls: usize,
    /// Frames completed with a video buffer attached.
    pub renders: usize,
    pub frames: u64,
    pub written: u64,
    /// Pixel written on even frames; odd frames get `odd_pixel`.
    pub even_pixel: u32,
    pub odd_pixel: u32,
}

impl ScriptedCore {
    pub fn new(frame_len: Option<u64>) -> Self {
        Self {
            frame_len,
            until_frame: frame_len.unwrap_or(u64::MAX),
            max_per_call: None,
            over_report: 0,
            level: 1000,
            calls: 0,
            renders: 0,
            frames: 0,
            written: 0,
            even_pixel: 0x00_20_40_60,
            odd_pixel: 0x00_20_40_60,
        }
    }

    pub fn frames_every(samples: u64) -> Self {
        Self::new(Some(samples))
    }
}

impl SampleProducer for ScriptedCore {
    fn run_for(
        &mut self,
        video: Option<&mut FrameBuffer>,
        audio: &mut [StereoSample],
        requested: usize,
    ) -> RunOutcome {
        self.calls += 1;
        let mut n = requested.min(audio.len());
        if let Some(max) = self.max_per_call {
            n = n.min(max);
        }
        n = n.min(usize::try_from(self.until_frame).unwrap_or(usize::MAX));

        for (i, slot) in audio[..n].iter_mut().enumerate() {
            let sign = if (self.written + i as u64) / 64 % 2 == 0 { 1 } else { -1 };
            *slot = [self.level * sign, -self.level * sign];
        }
        self.written += n as u64;

        let rendering = video.is_some();
        if let Some(frame) = video {
            let pixel = if self.frames % 2 == 0 {
                self.even_pixel
            } else {
                self.odd_pixel
            };
            frame.fill(pixel);
        }

        let mut frame_complete = false;
        if self.frame_len.is_some() {
            self.until_frame -= n as u64;
            if self.until_frame == 0 {
                frame_complete = true;
                self.frames += 1;
                if rendering {
                    self.renders += 1;
                }
                self.until_frame = self.frame_len.unwrap_or(u64::MAX);
            }
        }

        RunOutcome {
            samples: n + self.over_report,
            frame_complete,
        }
    }
}

/// Audio sink that records everything it accepts.
#[derive(Default)]
pub struct RecordingAudio {
    pub received: Vec<StereoSample>,
    pub offered: Vec<usize>,
    /// Accept at most this many pairs per call.
    pub limit: Option<usize>,
}

impl RecordingAudio {
    pub fn limited(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl AudioSink for RecordingAudio {
    fn upload(&mut self, samples: &[StereoSample]) -> usize {
        self.offered.push(samples.len());
        let n = self.limit.map_or(samples.len(), |l| l.min(samples.len()));
        self.received.extend_from_slice(&samples[..n]);
        n
    }
}

/// Video sink that keeps every delivered frame (`None` for dupes).
#[derive(Default)]
pub struct RecordingVideo {
    pub frames: Vec<Option<Vec<u32>>>,
    pub dims: Vec<(usize, usize, usize)>,
}

impl RecordingVideo {
    pub fn fresh(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }

    pub fn dupes(&self) -> usize {
        self.frames.iter().filter(|f| f.is_none()).count()
    }
}

impl VideoSink for RecordingVideo {
    fn refresh(&mut self, frame: Option<&[u32]>, width: usize, height: usize, pitch: usize) {
        self.frames.push(frame.map(<[u32]>::to_vec));
        self.dims.push((width, height, pitch));
    }
}

pub struct RecordingEnv {
    pub notices: Vec<Notice>,
    pub av_infos: Vec<AvInfo>,
    pub options: Vec<(String, String)>,
    pub dupe_supported: bool,
}

impl Default for RecordingEnv {
    fn default() -> Self {
        Self {
            notices: Vec::new(),
            av_infos: Vec::new(),
            options: Vec::new(),
            dupe_supported: true,
        }
    }
}

impl HostEnvironment for RecordingEnv {
    fn notify(&mut self, notice: &Notice) {
        self.notices.push(notice.clone());
    }

    fn set_av_info(&mut self, info: &AvInfo) -> bool {
        self.av_infos.push(*info);
        true
    }

    fn set_option(&mut self, key: &str, value: &str) -> bool {
        self.options.push((key.to_string(), value.to_string()));
        true
    }

    fn can_dupe(&self) -> bool {
        self.dupe_supported
    }
}

/// Everything one scenario needs.
pub struct Harness {
    pub audio: RecordingAudio,
    pub video: RecordingVideo,
    pub env: RecordingEnv,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            audio: RecordingAudio::default(),
            video: RecordingVideo::default(),
            env: RecordingEnv::default(),
        }
    }

    pub fn tick(
        &mut self,
        pipeline: &mut Pipeline,
        core: &mut ScriptedCore,
        input: SpeedInput,
    ) -> TickReport {
        pipeline.run_tick(
            core,
            HostIo {
                audio: &mut self.audio,
                video: &mut self.video,
                env: &mut self.env,
            },
            input,
        )
    }

    pub fn idle(&mut self, pipeline: &mut Pipeline, core: &mut ScriptedCore) -> TickReport {
        self.tick(pipeline, core, SpeedInput::default())
    }
}

pub fn fast_forward_press() -> SpeedInput {
    SpeedInput {
        fast_forward_chord: true,
        ..SpeedInput::default()
    }
}

pub fn slow_motion_press() -> SpeedInput {
    SpeedInput {
        slow_motion_chord: true,
        ..SpeedInput::default()
    }
}
