use log::{debug, error, info, warn};

use vibe_emu_output::host::{HostEnvironment, Notice, NoticeLevel, VideoSink};
use vibe_emu_output::producer::StereoSample;
use vibe_emu_output::timing::AvInfo;

use crate::audio_queue::AudioConsumer;

/// Video sink that only keeps statistics and a hash of the last image.
#[derive(Debug, Default)]
pub struct HeadlessVideo {
    pub fresh: u64,
    pub dupes: u64,
    pub last_hash: Option<u64>,
}

impl VideoSink for HeadlessVideo {
    fn refresh(&mut self, frame: Option<&[u32]>, width: usize, height: usize, pitch: usize) {
        match frame {
            Some(pixels) => {
                self.fresh += 1;
                self.last_hash = Some(hash_rows(pixels, width, height, pitch));
            }
            None => self.dupes += 1,
        }
    }
}

/// FNV-1a over the visible pixels of each row.
pub fn hash_rows(pixels: &[u32], width: usize, height: usize, pitch: usize) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for row in pixels.chunks(pitch.max(1)).take(height) {
        for &px in row.iter().take(width) {
            for byte in px.to_le_bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
        }
    }
    hash
}

/// Environment that logs notices and remembers what the pipeline pushed.
#[derive(Debug)]
pub struct HeadlessEnv {
    can_dupe: bool,
    pub av_info: Option<AvInfo>,
    pub av_updates: u32,
    pub options: Vec<(String, String)>,
    pub notices: Vec<Notice>,
}

impl HeadlessEnv {
    pub fn new(can_dupe: bool) -> Self {
        Self {
            can_dupe,
            av_info: None,
            av_updates: 0,
            options: Vec::new(),
            notices: Vec::new(),
        }
    }
}

impl HostEnvironment for HeadlessEnv {
    fn notify(&mut self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => info!("[notice] {}", notice.text),
            NoticeLevel::Warn => warn!("[notice] {}", notice.text),
            NoticeLevel::Error => error!("[notice] {}", notice.text),
        }
        self.notices.push(notice.clone());
    }

    fn set_av_info(&mut self, info: &AvInfo) -> bool {
        debug!(
            "AV info: {:.3} fps, {} Hz",
            info.timing.fps, info.timing.sample_rate
        );
        self.av_info = Some(*info);
        self.av_updates += 1;
        true
    }

    fn set_option(&mut self, key: &str, value: &str) -> bool {
        info!("Option {key} set to {value}");
        self.options.push((key.to_string(), value.to_string()));
        true
    }

    fn can_dupe(&self) -> bool {
        self.can_dupe
    }
}

/// Stand-in for a real output device: pops a fixed number of pairs per tick.
pub struct DeviceDrain {
    consumer: AudioConsumer,
    scratch: Vec<StereoSample>,
    pub consumed: u64,
    pub underruns: u64,
    pub missing: u64,
}

impl DeviceDrain {
    pub fn new(consumer: AudioConsumer) -> Self {
        Self {
            consumer,
            scratch: Vec::new(),
            consumed: 0,
            underruns: 0,
            missing: 0,
        }
    }

    /// Pairs a device running at `sample_rate` pulls during one frame at
    /// `fps`.
    pub fn frames_per_tick(sample_rate: f64, fps: f64) -> usize {
        if fps <= 0.0 {
            return 0;
        }
        (sample_rate / fps).round() as usize
    }

    pub fn pull(&mut self, frames: usize) -> usize {
        self.scratch.resize(frames, [0, 0]);
        let got = self.consumer.pop_into(&mut self.scratch);
        self.consumed += got as u64;
        // Warm-up ticks before anything was queued are not underruns.
        if got < frames && self.consumed > 0 {
            self.underruns += 1;
            self.missing += (frames - got) as u64;
        }
        got
    }

    pub fn queued(&self) -> usize {
        self.consumer.len()
    }
}
