//! Playback cursor and frame-advance policy
//!
//! The cursor is evaluated once per successful decode: the frame that was just
//! decoded is `cursor.frame`, and `advance()` decides what the next decode
//! targets and whether the decoded frame is the terminal one.
//!
//! # Modes
//!
//! - **Loop**: wrap to frame 0 and keep going
//! - **Once**: wrap to frame 0, mark terminal, bump auto-repeat counter
//! - **Freeze**: hold the current frame and mark terminal (see below)
//!
//! Freeze never advances: the first decode under freeze is terminal. The
//! terminal flag is not cleared by later `start()` calls, so a frozen
//! animation ignores repeated starts until `restart()`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Playback mode. Ordering matters: `Once` and `Freeze` are the
/// "stops at end" modes (`mode >= Once`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    #[default]
    Loop,
    Once,
    Freeze,
}

impl PlaybackMode {
    /// Once/Freeze: reaching the end stops playback
    pub fn stops_at_end(self) -> bool {
        self >= PlaybackMode::Once
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackMode::Loop => "loop",
            PlaybackMode::Once => "once",
            PlaybackMode::Freeze => "freeze",
        }
    }
}

impl FromStr for PlaybackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "loop" => Ok(PlaybackMode::Loop),
            "once" => Ok(PlaybackMode::Once),
            "freeze" => Ok(PlaybackMode::Freeze),
            other => Err(format!("unknown playback mode '{}' (loop|once|freeze)", other)),
        }
    }
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one advance step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Cursor moved forward by `step`
    Stepped,
    /// Loop mode wrapped to frame 0
    Looped,
    /// Decoded frame is the last one to present
    Terminal,
}

/// Mutable playback position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Next frame to decode (equals the last decoded frame while frozen)
    pub frame: usize,
    /// The frame currently awaiting presentation is the terminal one
    pub next_is_last: bool,
    /// Incremented each time a terminal frame is reached in once/freeze
    pub auto_repeat: u32,
    pub mode: PlaybackMode,
}

impl Cursor {
    pub fn new(mode: PlaybackMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Run the advance policy after decoding `self.frame`.
    ///
    /// `step` is 2 when fps limiting is active, else 1.
    pub fn advance(&mut self, frame_count: usize, step: usize) -> Advance {
        if self.frame + step < frame_count {
            if self.mode == PlaybackMode::Freeze {
                self.next_is_last = true;
                self.auto_repeat += 1;
                Advance::Terminal
            } else {
                self.frame += step;
                self.next_is_last = false;
                Advance::Stepped
            }
        } else {
            match self.mode {
                PlaybackMode::Loop => {
                    self.frame = 0;
                    self.next_is_last = false;
                    Advance::Looped
                }
                PlaybackMode::Once => {
                    self.frame = 0;
                    self.next_is_last = true;
                    self.auto_repeat += 1;
                    Advance::Terminal
                }
                PlaybackMode::Freeze => {
                    self.next_is_last = true;
                    self.auto_repeat += 1;
                    Advance::Terminal
                }
            }
        }
    }

    /// Seek to `progress` in [0, 1] (clamped). Lands on the last frame at 1.0.
    pub fn seek(&mut self, progress: f32, frame_count: usize) {
        let progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        let target = (frame_count as f32 * progress) as usize;
        self.frame = target.min(frame_count.saturating_sub(1));
        self.next_is_last = false;
    }

    /// Animation completed in once/freeze and has not been restarted
    pub fn is_finished(&self) -> bool {
        self.mode.stops_at_end() && self.auto_repeat != 0
    }
}
