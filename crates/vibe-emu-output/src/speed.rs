use std::fmt;

/// Highest fast-forward level the controller supports.
pub const MAX_FAST_FORWARD_LEVEL: u8 = 4;
/// Number of slow-motion levels.
pub const SLOW_MOTION_LEVELS: u8 = 2;

/// Playback speed.
///
/// Levels outside the supported range fold into the nearest one: every
/// accessor reads through [`SpeedState::normalized`], so `FastForward(0)`
/// behaves as level 1 and `SlowMotion(9)` as level 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedState {
    #[default]
    Normal,
    /// Level 1..=4; runs `level + 1` emulation steps per host tick.
    FastForward(u8),
    /// Level 1 runs every 2nd tick, level 2 every 5th tick.
    SlowMotion(u8),
}

impl SpeedState {
    /// The same state with its level clamped to the supported range.
    pub fn normalized(self) -> Self {
        match self {
            Self::Normal => Self::Normal,
            Self::FastForward(level) => Self::FastForward(level.clamp(1, MAX_FAST_FORWARD_LEVEL)),
            Self::SlowMotion(level) => Self::SlowMotion(level.clamp(1, SLOW_MOTION_LEVELS)),
        }
    }

    /// Emulation steps per host tick.
    pub fn iterations(self) -> u32 {
        match self.normalized() {
            Self::FastForward(level) => u32::from(level) + 1,
            Self::Normal | Self::SlowMotion(_) => 1,
        }
    }

    /// Factor applied to the nominal frame rate reported to the host.
    pub fn fps_multiplier(self) -> f64 {
        f64::from(self.iterations())
    }

    /// Run the core on one tick out of this many.
    pub fn slow_motion_divisor(self) -> Option<u32> {
        match self.normalized() {
            Self::SlowMotion(1) => Some(2),
            Self::SlowMotion(_) => Some(5),
            Self::Normal | Self::FastForward(_) => None,
        }
    }

    pub fn is_normal(self) -> bool {
        self == Self::Normal
    }
}

impl fmt::Display for SpeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.normalized() {
            Self::Normal => write!(f, "1x"),
            Self::FastForward(level) => write!(f, "{}x", u32::from(level) + 1),
            Self::SlowMotion(1) => write!(f, "0.5x"),
            Self::SlowMotion(_) => write!(f, "0.2x"),
        }
    }
}

/// Per-tick input levels relevant to speed control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpeedInput {
    /// Fast-forward chord is held (select+A on the reference frontend).
    pub fast_forward_chord: bool,
    /// Slow-motion chord is held (select+B).
    pub slow_motion_chord: bool,
    /// Host-level fast-forward signal.
    pub fast_forward_override: bool,
}

/// Reports `true` only on a low-to-high transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    prev: bool,
}

impl EdgeDetector {
    pub fn rising(&mut self, level: bool) -> bool {
        let edge = level && !self.prev;
        self.prev = level;
        edge
    }
}

/// What the pipeline should do with the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    Run {
        iterations: u32,
        /// Pass no video buffer to the core for all but the final step.
        skip_intermediate: bool,
    },
    /// Slow motion off-tick: no emulation, no resampler input.
    Skip,
}

#[derive(Debug, Clone)]
pub struct SpeedController {
    state: SpeedState,
    fast_forward_edge: EdgeDetector,
    slow_motion_edge: EdgeDetector,
    skip_phase: u32,
    fast_forward_levels: u8,
    fast_forward_enabled: bool,
    slow_motion_enabled: bool,
    override_active: bool,
}

impl SpeedController {
    pub fn new(fast_forward_levels: u8) -> Self {
        Self {
            state: SpeedState::Normal,
            fast_forward_edge: EdgeDetector::default(),
            slow_motion_edge: EdgeDetector::default(),
            skip_phase: 0,
            fast_forward_levels: fast_forward_levels.clamp(1, MAX_FAST_FORWARD_LEVEL),
            fast_forward_enabled: true,
            slow_motion_enabled: true,
            override_active: false,
        }
    }

    pub fn state(&self) -> SpeedState {
        self.state
    }

    pub fn fast_forward_levels(&self) -> u8 {
        self.fast_forward_levels
    }

    pub fn override_active(&self) -> bool {
        self.override_active
    }

    /// Returns the new state if this changed anything.
    pub fn set_fast_forward_enabled(&mut self, enabled: bool) -> Option<SpeedState> {
        self.fast_forward_enabled = enabled;
        match self.state {
            SpeedState::FastForward(_) if !enabled => self.transition(SpeedState::Normal),
            _ => None,
        }
    }

    pub fn set_slow_motion_enabled(&mut self, enabled: bool) -> Option<SpeedState> {
        self.slow_motion_enabled = enabled;
        match self.state {
            SpeedState::SlowMotion(_) if !enabled => self.transition(SpeedState::Normal),
            _ => None,
        }
    }

    pub fn set_fast_forward_levels(&mut self, levels: u8) -> Option<SpeedState> {
        self.fast_forward_levels = levels.clamp(1, MAX_FAST_FORWARD_LEVEL);
        match self.state {
            SpeedState::FastForward(level) if level > self.fast_forward_levels => {
                self.transition(SpeedState::FastForward(self.fast_forward_levels))
            }
            _ => None,
        }
    }

    /// Feed one tick of input. Returns the new state on a transition.
    pub fn update(&mut self, input: SpeedInput) -> Option<SpeedState> {
        self.override_active = input.fast_forward_override;

        let ff_edge = self.fast_forward_edge.rising(input.fast_forward_chord);
        let sm_edge = self.slow_motion_edge.rising(input.slow_motion_chord);

        let mut changed = None;
        if ff_edge && self.fast_forward_enabled {
            let next = match self.state {
                SpeedState::FastForward(level) if level >= self.fast_forward_levels => {
                    SpeedState::Normal
                }
                SpeedState::FastForward(level) => SpeedState::FastForward(level + 1),
                SpeedState::Normal | SpeedState::SlowMotion(_) => SpeedState::FastForward(1),
            };
            changed = self.transition(next).or(changed);
        }
        if sm_edge && self.slow_motion_enabled {
            let next = match self.state {
                SpeedState::SlowMotion(level) if level >= SLOW_MOTION_LEVELS => {
                    SpeedState::Normal
                }
                SpeedState::SlowMotion(level) => SpeedState::SlowMotion(level + 1),
                SpeedState::Normal | SpeedState::FastForward(_) => SpeedState::SlowMotion(1),
            };
            changed = self.transition(next).or(changed);
        }
        changed
    }

    fn transition(&mut self, next: SpeedState) -> Option<SpeedState> {
        if next == self.state {
            return None;
        }
        self.state = next;
        self.skip_phase = 0;
        Some(next)
    }

    /// Decide the current tick. Advances the slow-motion phase.
    pub fn plan_tick(&mut self) -> TickPlan {
        match self.state {
            SpeedState::Normal => TickPlan::Run {
                iterations: 1,
                skip_intermediate: false,
            },
            SpeedState::FastForward(level) => TickPlan::Run {
                iterations: self.state.iterations(),
                skip_intermediate: level >= self.fast_forward_levels,
            },
            SpeedState::SlowMotion(_) => {
                let divisor = self.state.slow_motion_divisor().unwrap_or(1);
                let run = self.skip_phase % divisor == 0;
                self.skip_phase = (self.skip_phase + 1) % divisor;
                if run {
                    TickPlan::Run {
                        iterations: 1,
                        skip_intermediate: false,
                    }
                } else {
                    TickPlan::Skip
                }
            }
        }
    }

    /// Audio forwarding is suppressed while playback speed is altered, unless
    /// the user asked for audio during speed changes.
    pub fn audio_muted(&self, audio_during_speed_change: bool) -> bool {
        !audio_during_speed_change && (!self.state.is_normal() || self.override_active)
    }

    /// Return to normal speed and forget held chords.
    pub fn reset(&mut self) {
        self.state = SpeedState::Normal;
        self.fast_forward_edge = EdgeDetector::default();
        self.slow_motion_edge = EdgeDetector::default();
        self.skip_phase = 0;
        self.override_active = false;
    }
}

impl Default for SpeedController {
    fn default() -> Self {
        Self::new(2)
    }
}
