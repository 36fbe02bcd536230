//! Core playback engine - buffers, cursor, pacing, colors, surfaces, workers
//!
//! Independent of any UI: hosts drive it through `Playback::draw()` with a
//! `Surface` of their own.

pub mod buffers;
pub mod coalescer;
pub mod cursor;
pub mod pacing;
pub mod playback;
pub mod surfaces;
pub mod workers;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use buffers::{BufferPool, FrameBuffer};
pub use coalescer::{ColorBatch, ColorCoalescer};
pub use cursor::{Advance, Cursor, PlaybackMode};
pub use pacing::FramePacer;
pub use playback::{LoadOptions, Playback, PlaybackState, Waker};
pub use surfaces::{HapticFeedback, Surface, SurfaceRegistry};
pub use workers::{Executors, ManualExecutor, SerialQueue, TaskId, TaskPool, TaskQueue, Workers};
