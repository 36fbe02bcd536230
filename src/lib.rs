//! RLPLAY - Frame-paced animation playback library
//!
//! Re-exports all modules for use by binary targets.

// Core playback (buffers, cursor, pacing, workers, playback)
pub mod core;

// Decode engine boundary
pub mod engine;

// App modules
pub mod cli;
pub mod config;
pub mod error;
pub mod view;

// Re-export commonly used types from core
pub use core::cursor::PlaybackMode;
pub use core::playback::{LoadOptions, Playback, PlaybackState};
pub use core::surfaces::Surface;
pub use core::workers::Executors;

pub use engine::{AnimationSource, Color, DecodeEngine, PreviewEngine};
pub use error::{EngineError, PlaybackError};
pub use view::AnimationView;
