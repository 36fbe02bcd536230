//! Decode engine contract
//!
//! The engine is an external collaborator: given a source animation and target
//! dimensions it decodes a numbered frame into a supplied buffer, optionally
//! builds a frame cache, and reports frame metadata. Calls are synchronous and
//! CPU-bound and always happen on worker threads.
//!
//! Playback never calls the engine concurrently for the same handle except for
//! `generate_cache`, which may overlap a decode; engines keep any shared
//! state behind their own synchronization (handles are `Sync`).

pub mod preview;

use log::trace;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::core::buffers::FrameBuffer;
use crate::error::{EngineError, PlaybackError};

pub use preview::PreviewEngine;

/// ARGB color, `0xAARRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub u32);

impl Color {
    pub fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color(u32::from_be_bytes([a, r, g, b]))
    }

    pub fn argb(self) -> u32 {
        self.0
    }

    pub fn alpha(self) -> u8 {
        self.0.to_be_bytes()[0]
    }

    /// Bitwise RGB inversion, alpha kept
    pub fn inverted(self) -> Self {
        Color(self.0 ^ 0x00FF_FFFF)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl FromStr for Color {
    type Err = String;

    /// Accepts `#RRGGBB` (opaque) or `#AARRGGBB`, leading `#` optional
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let value = u32::from_str_radix(hex, 16).map_err(|e| format!("invalid color '{}': {}", s, e))?;
        match hex.len() {
            6 => Ok(Color(0xFF00_0000 | value)),
            8 => Ok(Color(value)),
            _ => Err(format!("invalid color '{}': expected #RRGGBB or #AARRGGBB", s)),
        }
    }
}

/// Immutable metadata reported at load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMetadata {
    pub frame_count: usize,
    /// Native frames per second
    pub frame_rate: u32,
    /// Engine wants its frame cache generated after the first decode
    pub cache_enabled: bool,
}

/// Where an animation comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationSource {
    /// Engine reads the file itself
    File(PathBuf),
    /// Already in memory (bundled asset); `name` keys the engine's cache
    Json { name: String, json: String },
}

impl AnimationSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        AnimationSource::File(path.into())
    }

    pub fn json(name: impl Into<String>, json: impl Into<String>) -> Self {
        AnimationSource::Json {
            name: name.into(),
            json: json.into(),
        }
    }

    /// Read a bundled asset from any reader
    pub fn from_reader(name: impl Into<String>, mut reader: impl Read) -> Result<Self, PlaybackError> {
        let mut json = String::new();
        reader
            .read_to_string(&mut json)
            .map_err(|source| PlaybackError::Io { path: None, source })?;
        Ok(AnimationSource::json(name, json))
    }

    /// Read a file into memory, keyed by its file name
    pub fn read_file(path: &Path) -> Result<Self, PlaybackError> {
        let json = std::fs::read_to_string(path).map_err(|source| PlaybackError::Io {
            path: Some(path.to_path_buf()),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("animation")
            .to_string();
        Ok(AnimationSource::json(name, json))
    }

    /// Short label for logs
    pub fn name(&self) -> String {
        match self {
            AnimationSource::File(path) => path.display().to_string(),
            AnimationSource::Json { name, .. } => name.clone(),
        }
    }
}

/// Parameters for `DecodeEngine::open`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpenRequest {
    pub width: u32,
    pub height: u32,
    /// Ask the engine to keep a frame cache
    pub precache: bool,
    pub limit_fps: bool,
    /// Palette override applied at load
    pub palette: Option<Vec<Color>>,
}

/// Result of decoding one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    Decoded,
    /// No such frame, or decoding failed
    Failed,
}

/// The external decode engine
pub trait DecodeEngine: Send + Sync + 'static {
    /// Loaded animation; owned exclusively by one playback instance
    type Handle: Send + Sync + 'static;

    /// Load an animation. `None` means the load failed.
    fn open(&self, source: &AnimationSource, request: &OpenRequest) -> Option<(Self::Handle, FrameMetadata)>;

    /// Decode `frame` into `target` (dimensions and stride come from the buffer)
    fn decode_frame(&self, handle: &Self::Handle, frame: usize, target: &mut FrameBuffer, clear: bool) -> DecodeStatus;

    fn set_layer_color(&self, handle: &Self::Handle, layer: &str, color: Color) -> Result<(), EngineError>;

    fn replace_palette(&self, handle: &Self::Handle, colors: &[Color]) -> Result<(), EngineError>;

    /// One-shot, heavyweight
    fn generate_cache(&self, handle: &Self::Handle, width: u32, height: u32);

    /// Invalidate the handle
    fn close(&self, handle: Self::Handle);
}

/// Owned engine handle that closes itself exactly once.
///
/// Playback keeps it behind an `Arc`; in-flight tasks hold clones. Closing
/// goes through `close()` when the last owner is known, otherwise `Drop` of
/// the last clone closes it, after any task using it has returned.
pub struct NativeHandle<E: DecodeEngine> {
    engine: Arc<E>,
    handle: Option<E::Handle>,
}

impl<E: DecodeEngine> NativeHandle<E> {
    pub fn new(engine: Arc<E>, handle: E::Handle) -> Self {
        Self {
            engine,
            handle: Some(handle),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// `None` once closed
    pub fn get(&self) -> Option<&E::Handle> {
        self.handle.as_ref()
    }

    pub fn close(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            trace!("Closing native handle");
            self.engine.close(handle);
        }
    }
}

impl<E: DecodeEngine> Drop for NativeHandle<E> {
    fn drop(&mut self) {
        self.close_inner();
    }
}
