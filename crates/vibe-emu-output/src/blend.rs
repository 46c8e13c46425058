use std::fmt;

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::frame::{FrameBuffer, FrameLayout, PixelFormat};

/// Default LCD response time, as a fraction of one frame.
pub const DEFAULT_LCD_RESPONSE_TIME: f64 = 0.333;

/// Single-tap ghosting stands in for four taps, so it uses a much slower
/// nominal response (0.5 in 8.8 fixed point).
const FAST_GHOSTING_WEIGHT: i32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    None,
    Mix,
    GhostingAccurate,
    GhostingFast,
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Mix => "mix",
            Self::GhostingAccurate => "ghosting-accurate",
            Self::GhostingFast => "ghosting-fast",
        })
    }
}

/// How the mix filter walks the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendStrategy {
    /// One pixel per step.
    Portable,
    /// Two 16-bit pixels per 32-bit word with a 64-bit sum.
    Packed,
}

impl BlendStrategy {
    pub fn for_format(format: PixelFormat) -> Self {
        if format.is_16bit() {
            Self::Packed
        } else {
            Self::Portable
        }
    }
}

/// 8.8 fixed-point weights `floor(response^i * 256)` for the four previous
/// frames, most recent first.
pub fn response_weights(response_time: f64) -> [i32; 4] {
    let mut weights = [0; 4];
    for (i, w) in weights.iter_mut().enumerate() {
        *w = (response_time.powi(i as i32 + 1) * 256.0).floor() as i32;
    }
    weights
}

fn zeroed(len: usize) -> Option<Box<[u32]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, 0);
    Some(buf.into_boxed_slice())
}

enum Filter {
    None,
    Mix {
        prev: Box<[u32]>,
    },
    GhostingAccurate {
        /// Index 1 holds the most recent frame once rotated for a new frame.
        prev: [Box<[u32]>; 4],
        weights: [i32; 4],
    },
    GhostingFast {
        prev: Box<[u32]>,
    },
}

impl Filter {
    fn allocate(mode: BlendMode, len: usize, weights: [i32; 4]) -> Option<Self> {
        Some(match mode {
            BlendMode::None => Self::None,
            BlendMode::Mix => Self::Mix { prev: zeroed(len)? },
            BlendMode::GhostingAccurate => Self::GhostingAccurate {
                prev: [zeroed(len)?, zeroed(len)?, zeroed(len)?, zeroed(len)?],
                weights,
            },
            BlendMode::GhostingFast => Self::GhostingFast { prev: zeroed(len)? },
        })
    }

    fn buffers_mut(&mut self) -> &mut [Box<[u32]>] {
        match self {
            Self::None => &mut [],
            Self::Mix { prev } | Self::GhostingFast { prev } => std::slice::from_mut(prev),
            Self::GhostingAccurate { prev, .. } => prev,
        }
    }

    fn zero(&mut self) {
        for buf in self.buffers_mut() {
            buf.fill(0);
        }
    }

    /// Fill the history with `pixels` so the first blended frame is unchanged.
    fn seed(&mut self, pixels: &[u32], color: u32) {
        for buf in self.buffers_mut() {
            for (dst, &src) in buf.iter_mut().zip(pixels) {
                *dst = src & color;
            }
        }
    }

    fn apply(&mut self, frame: &mut FrameBuffer, strategy: BlendStrategy) {
        let layout = frame.layout();
        let pixels = frame.pixels_mut();

        match self {
            Self::None => {}
            Self::Mix { prev } => {
                for (start, end) in rows(&layout) {
                    let cur = &mut pixels[start..end];
                    let prev = &mut prev[start..end];
                    match strategy {
                        BlendStrategy::Packed if layout.format.is_16bit() => {
                            mix_packed16(cur, prev, layout.format)
                        }
                        _ => mix_portable(cur, prev, layout.format),
                    }
                }
            }
            Self::GhostingAccurate { prev, weights } => {
                prev.rotate_right(1);
                let [slot, p1, p2, p3] = prev;
                for (start, end) in rows(&layout) {
                    ghost_accurate(
                        &mut pixels[start..end],
                        [&p1[start..end], &p2[start..end], &p3[start..end]],
                        &mut slot[start..end],
                        weights,
                        layout.format,
                    );
                }
            }
            Self::GhostingFast { prev } => {
                for (start, end) in rows(&layout) {
                    ghost_fast(&mut pixels[start..end], &mut prev[start..end], layout.format);
                }
            }
        }
    }
}

fn rows(layout: &FrameLayout) -> impl Iterator<Item = (usize, usize)> {
    let FrameLayout {
        width,
        height,
        pitch,
        ..
    } = *layout;
    (0..height).map(move |y| (y * pitch, y * pitch + width))
}

/// `(c + p + ((c ^ p) & low_bits)) >> 1`: a per-field average that rounds
/// half up and never carries across fields.
fn mix_portable(cur: &mut [u32], prev: &mut [u32], format: PixelFormat) {
    let color = format.color_mask();
    let low = format.low_bits();
    for (c, p) in cur.iter_mut().zip(prev.iter_mut()) {
        let cv = *c & color;
        let pv = *p & color;
        *p = cv;
        *c = ((u64::from(cv) + u64::from(pv) + u64::from((cv ^ pv) & low)) >> 1) as u32;
    }
}

fn mix_packed16(cur: &mut [u32], prev: &mut [u32], format: PixelFormat) {
    let color = format.color_mask();
    let low = format.low_bits() | (format.low_bits() << 16);

    let mut cur_pairs = cur.chunks_exact_mut(2);
    let mut prev_pairs = prev.chunks_exact_mut(2);
    for (c, p) in (&mut cur_pairs).zip(&mut prev_pairs) {
        let cw = (c[0] & color) | ((c[1] & color) << 16);
        let pw = (p[0] & color) | ((p[1] & color) << 16);
        p[0] = cw & 0xFFFF;
        p[1] = cw >> 16;

        let mixed = ((u64::from(cw) + u64::from(pw) + u64::from((cw ^ pw) & low)) >> 1) as u32;
        c[0] = mixed & 0xFFFF;
        c[1] = mixed >> 16;
    }

    mix_portable(
        cur_pairs.into_remainder(),
        prev_pairs.into_remainder(),
        format,
    );
}

/// `slot` holds the oldest frame on entry and receives the current frame.
fn ghost_accurate(
    cur: &mut [u32],
    recent: [&[u32]; 3],
    slot: &mut [u32],
    weights: &[i32; 4],
    format: PixelFormat,
) {
    let color = format.color_mask();
    for i in 0..cur.len() {
        let c = cur[i] & color;
        let cc = format.unpack(c);
        let history = [recent[0][i], recent[1][i], recent[2][i], slot[i]];

        let mut acc = [cc[0] << 8, cc[1] << 8, cc[2] << 8];
        for (&h, &w) in history.iter().zip(weights) {
            let ph = format.unpack(h);
            for ch in 0..3 {
                acc[ch] += (ph[ch] - cc[ch]) * w;
            }
        }

        slot[i] = c;
        cur[i] = format.pack([
            (acc[0] + 128) >> 8,
            (acc[1] + 128) >> 8,
            (acc[2] + 128) >> 8,
        ]);
    }
}

fn ghost_fast(cur: &mut [u32], prev: &mut [u32], format: PixelFormat) {
    let color = format.color_mask();
    for (c, p) in cur.iter_mut().zip(prev.iter_mut()) {
        let cv = *c & color;
        let cc = format.unpack(cv);
        let pc = format.unpack(*p);
        *p = cv;

        let mut out = [0; 3];
        for ch in 0..3 {
            out[ch] = (cc[ch] * (256 - FAST_GHOSTING_WEIGHT) + pc[ch] * FAST_GHOSTING_WEIGHT + 128)
                >> 8;
        }
        *c = format.pack(out);
    }
}

/// Interframe blend post-processor.
///
/// Retained frames are allocated on the first frame after a mode or layout
/// change, zeroed, then seeded from that frame.
pub struct BlendState {
    mode: BlendMode,
    response_time: f64,
    filter: Filter,
    layout: Option<FrameLayout>,
    primed: bool,
    disabled: bool,
    forced_strategy: Option<BlendStrategy>,
    strategy: BlendStrategy,
}

impl BlendState {
    pub fn new(mode: BlendMode, response_time: f64) -> Self {
        Self {
            mode,
            response_time,
            filter: Filter::None,
            layout: None,
            primed: false,
            disabled: false,
            forced_strategy: None,
            strategy: BlendStrategy::Portable,
        }
    }

    /// Pin the mix strategy instead of choosing one per pixel format.
    pub fn with_strategy(mut self, strategy: BlendStrategy) -> Self {
        self.forced_strategy = Some(strategy);
        self.strategy = strategy;
        self
    }

    pub fn mode(&self) -> BlendMode {
        self.mode
    }

    pub fn response_time(&self) -> f64 {
        self.response_time
    }

    pub fn weights(&self) -> [i32; 4] {
        response_weights(self.response_time)
    }

    pub fn strategy(&self) -> BlendStrategy {
        self.strategy
    }

    /// Retained frame buffers currently exist.
    pub fn is_allocated(&self) -> bool {
        self.layout.is_some()
    }

    /// Blending was turned off by an allocation failure.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Change mode or response time. Returns `true` if anything changed; the
    /// retained frames are dropped and rebuilt on the next frame.
    pub fn configure(&mut self, mode: BlendMode, response_time: f64) -> bool {
        if mode == self.mode && response_time == self.response_time {
            return false;
        }
        self.mode = mode;
        self.response_time = response_time;
        self.disabled = false;
        self.release();
        true
    }

    pub fn apply(&mut self, frame: &mut FrameBuffer) {
        if self.mode == BlendMode::None || self.disabled {
            return;
        }

        let layout = frame.layout();
        if self.layout != Some(layout) {
            match Filter::allocate(self.mode, layout.len(), self.weights()) {
                Some(filter) => {
                    debug!(
                        "Allocated {} blend buffers for {}x{} (pitch {}, {:?})",
                        self.mode, layout.width, layout.height, layout.pitch, layout.format
                    );
                    self.filter = filter;
                    self.layout = Some(layout);
                    self.primed = false;
                    self.strategy = self
                        .forced_strategy
                        .unwrap_or_else(|| BlendStrategy::for_format(layout.format));
                }
                None => {
                    error!(
                        "Failed to allocate {} blend buffers for {}x{}; interframe blending disabled",
                        self.mode, layout.width, layout.height
                    );
                    self.release();
                    self.disabled = true;
                    return;
                }
            }
        }

        if !self.primed {
            self.filter.seed(frame.pixels(), layout.format.color_mask());
            self.primed = true;
        }
        self.filter.apply(frame, self.strategy);
    }

    /// Zero the retained frames without releasing them.
    pub fn reset(&mut self) {
        self.filter.zero();
        self.primed = false;
    }

    pub fn release(&mut self) {
        self.filter = Filter::None;
        self.layout = None;
        self.primed = false;
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::new(BlendMode::None, DEFAULT_LCD_RESPONSE_TIME)
    }
}
