//! Error types for loading, configuration and best-effort engine calls
//!
//! Nothing here is fatal to the process: playback failures degrade to
//! "animation freezes on last good frame". These types only surface where a
//! caller can act on them (resource loading, settings, the demo binary).

use std::path::PathBuf;

/// Errors surfaced to callers of the playback API
#[derive(Debug)]
pub enum PlaybackError {
    /// Reading an animation resource failed
    Io { path: Option<PathBuf>, source: std::io::Error },
    /// Settings file could not be parsed
    Config { path: PathBuf, source: serde_json::Error },
    /// Decode engine returned no handle for the source
    Load(String),
    /// Pixel buffer could not be allocated
    Allocation { width: u32, height: u32 },
    /// Rejected load parameters
    InvalidArgument(String),
}

impl std::fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackError::Io { path: Some(path), source } => {
                write!(f, "I/O error reading {}: {}", path.display(), source)
            }
            PlaybackError::Io { path: None, source } => write!(f, "I/O error: {}", source),
            PlaybackError::Config { path, source } => {
                write!(f, "Invalid config {}: {}", path.display(), source)
            }
            PlaybackError::Load(name) => write!(f, "Failed to load animation: {}", name),
            PlaybackError::Allocation { width, height } => {
                write!(f, "Failed to allocate {}x{} frame buffer", width, height)
            }
            PlaybackError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for PlaybackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlaybackError::Io { source, .. } => Some(source),
            PlaybackError::Config { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from best-effort engine calls (layer colors, palette replacement).
///
/// The scheduler swallows these; they are cosmetic and retried implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    UnknownLayer(String),
    EmptyPalette,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownLayer(name) => write!(f, "Unknown layer: {}", name),
            EngineError::EmptyPalette => write!(f, "Palette replacement is empty"),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PlaybackError::Load("gears".into());
        assert_eq!(err.to_string(), "Failed to load animation: gears");

        let err = PlaybackError::Allocation { width: 8, height: 4 };
        assert_eq!(err.to_string(), "Failed to allocate 8x4 frame buffer");

        assert_eq!(
            EngineError::UnknownLayer("eyes".into()).to_string(),
            "Unknown layer: eyes"
        );
    }

    #[test]
    fn test_io_source_chain() {
        use std::error::Error;
        let err = PlaybackError::Io {
            path: None,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.source().is_some());
    }
}
