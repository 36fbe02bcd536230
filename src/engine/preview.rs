//! Preview engine: Lottie header + flat fill
//!
//! Reads only the animation header (`fr`, `ip`, `op`, `w`, `h`, `nm`, layer
//! names) and paints every frame as a flat fill with a progress band along
//! the top edge. No vector rasterization. Used by the `rlplay` binary and by
//! tests that need a real engine behind the playback pipeline.
//!
//! Fill color priority: palette entry 0, else the color of the first layer
//! (in header order) that has an override, else the engine default.

use indexmap::IndexMap;
use log::{debug, trace, warn};
use serde::Deserialize;
use std::sync::Mutex;

use super::{AnimationSource, Color, DecodeEngine, DecodeStatus, FrameMetadata, OpenRequest};
use crate::core::buffers::FrameBuffer;
use crate::error::EngineError;

#[derive(Debug, Deserialize)]
struct LottieHeader {
    #[serde(default)]
    nm: Option<String>,
    fr: f32,
    ip: f32,
    op: f32,
    #[serde(default)]
    w: u32,
    #[serde(default)]
    h: u32,
    #[serde(default)]
    layers: Vec<LayerHeader>,
}

#[derive(Debug, Deserialize)]
struct LayerHeader {
    #[serde(default)]
    nm: Option<String>,
}

#[derive(Debug, Default)]
struct PreviewState {
    layer_colors: IndexMap<String, Color>,
    palette: Vec<Color>,
    cache_generated: bool,
}

/// Loaded preview animation
#[derive(Debug)]
pub struct PreviewHandle {
    name: String,
    frame_count: usize,
    /// Composition size from the header
    size: (u32, u32),
    layers: Vec<String>,
    state: Mutex<PreviewState>,
}

impl PreviewHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn composition_size(&self) -> (u32, u32) {
        self.size
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn cache_generated(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).cache_generated
    }

    fn fill_color(&self, fallback: Color) -> Color {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&first) = state.palette.first() {
            return first;
        }
        self.layers
            .iter()
            .find_map(|name| state.layer_colors.get(name).copied())
            .unwrap_or(fallback)
    }
}

/// Header-only engine
#[derive(Debug, Clone)]
pub struct PreviewEngine {
    default_fill: Color,
}

impl Default for PreviewEngine {
    fn default() -> Self {
        Self {
            default_fill: Color(0xFF20_2020),
        }
    }
}

impl PreviewEngine {
    pub fn new(default_fill: Color) -> Self {
        Self { default_fill }
    }

    fn parse(source: &AnimationSource) -> Option<(String, LottieHeader)> {
        let (name, json) = match source {
            AnimationSource::File(path) => match std::fs::read_to_string(path) {
                Ok(json) => (path.display().to_string(), json),
                Err(e) => {
                    warn!("PreviewEngine: cannot read {}: {}", path.display(), e);
                    return None;
                }
            },
            AnimationSource::Json { name, json } => (name.clone(), json.clone()),
        };
        match serde_json::from_str::<LottieHeader>(&json) {
            Ok(header) => Some((name, header)),
            Err(e) => {
                warn!("PreviewEngine: invalid animation {}: {}", name, e);
                None
            }
        }
    }
}

impl DecodeEngine for PreviewEngine {
    type Handle = PreviewHandle;

    fn open(&self, source: &AnimationSource, request: &OpenRequest) -> Option<(PreviewHandle, FrameMetadata)> {
        let (name, header) = Self::parse(source)?;

        let frame_count = (header.op - header.ip).round().max(0.0) as usize;
        if frame_count == 0 || !header.fr.is_finite() || header.fr <= 0.0 {
            warn!("PreviewEngine: {} has no playable frames", name);
            return None;
        }

        let layers = header.layers.into_iter().filter_map(|l| l.nm).collect();
        let state = PreviewState {
            palette: request.palette.clone().unwrap_or_default(),
            ..PreviewState::default()
        };
        let meta = FrameMetadata {
            frame_count,
            frame_rate: header.fr.round() as u32,
            cache_enabled: request.precache,
        };

        debug!(
            "PreviewEngine: opened {} ({}) {} frames @ {}fps",
            name,
            header.nm.as_deref().unwrap_or("unnamed"),
            meta.frame_count,
            meta.frame_rate
        );

        let handle = PreviewHandle {
            name,
            frame_count,
            size: (header.w, header.h),
            layers,
            state: Mutex::new(state),
        };
        Some((handle, meta))
    }

    fn decode_frame(&self, handle: &PreviewHandle, frame: usize, target: &mut FrameBuffer, clear: bool) -> DecodeStatus {
        if frame >= handle.frame_count || target.is_empty() {
            return DecodeStatus::Failed;
        }
        if clear {
            target.clear();
        }

        let fill = handle.fill_color(self.default_fill);
        let band = fill.inverted();
        let width = target.width() as usize;
        let band_rows = (target.height() as usize / 8).max(1);
        let band_cols = width * (frame + 1) / handle.frame_count;

        for (y, row) in target.pixels_mut().chunks_exact_mut(width).enumerate() {
            for (x, px) in row.iter_mut().enumerate() {
                *px = if y < band_rows && x < band_cols { band.argb() } else { fill.argb() };
            }
        }
        DecodeStatus::Decoded
    }

    fn set_layer_color(&self, handle: &PreviewHandle, layer: &str, color: Color) -> Result<(), EngineError> {
        if !handle.layers.iter().any(|l| l == layer) {
            return Err(EngineError::UnknownLayer(layer.to_string()));
        }
        handle
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .layer_colors
            .insert(layer.to_string(), color);
        Ok(())
    }

    fn replace_palette(&self, handle: &PreviewHandle, colors: &[Color]) -> Result<(), EngineError> {
        if colors.is_empty() {
            return Err(EngineError::EmptyPalette);
        }
        handle.state.lock().unwrap_or_else(|e| e.into_inner()).palette = colors.to_vec();
        Ok(())
    }

    fn generate_cache(&self, handle: &PreviewHandle, width: u32, height: u32) {
        trace!("PreviewEngine: cache for {} at {}x{}", handle.name, width, height);
        handle.state.lock().unwrap_or_else(|e| e.into_inner()).cache_generated = true;
    }

    fn close(&self, handle: PreviewHandle) {
        trace!("PreviewEngine: closed {}", handle.name);
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_JSON: &str = r#"{
    "v": "5.7.4", "nm": "gears", "fr": 30, "ip": 0, "op": 10, "w": 200, "h": 200,
    "layers": [ { "nm": "wheel" }, { "nm": "shadow" }, { "ty": 4 } ]
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn open(request: OpenRequest) -> (PreviewEngine, PreviewHandle, FrameMetadata) {
        let engine = PreviewEngine::default();
        let (handle, meta) = engine
            .open(&AnimationSource::json("gears", SAMPLE_JSON), &request)
            .expect("sample should load");
        (engine, handle, meta)
    }

    #[test]
    fn test_open_reads_header() {
        let (_engine, handle, meta) = open(OpenRequest {
            precache: true,
            ..OpenRequest::default()
        });
        assert_eq!(meta.frame_count, 10);
        assert_eq!(meta.frame_rate, 30);
        assert!(meta.cache_enabled);
        assert_eq!(handle.layers(), &["wheel".to_string(), "shadow".to_string()]);
        assert_eq!(handle.composition_size(), (200, 200));
    }

    #[test]
    fn test_open_rejects_garbage() {
        let engine = PreviewEngine::default();
        let request = OpenRequest::default();
        assert!(engine.open(&AnimationSource::json("x", "not json"), &request).is_none());
        let empty = r#"{"fr": 30, "ip": 0, "op": 0}"#;
        assert!(engine.open(&AnimationSource::json("x", empty), &request).is_none());
    }

    #[test]
    fn test_decode_paints_band_and_fill() {
        let (engine, handle, _) = open(OpenRequest::default());
        let mut buf = FrameBuffer::try_new(10, 8).unwrap();

        assert_eq!(engine.decode_frame(&handle, 4, &mut buf, true), DecodeStatus::Decoded);
        let fill = Color(0xFF20_2020);
        // 5 of 10 columns of the first row carry the band
        assert_eq!(buf.pixel(4, 0), Some(fill.inverted().argb()));
        assert_eq!(buf.pixel(5, 0), Some(fill.argb()));
        assert_eq!(buf.pixel(0, 7), Some(fill.argb()));

        assert_eq!(engine.decode_frame(&handle, 10, &mut buf, true), DecodeStatus::Failed);
    }

    #[test]
    fn test_fill_priority() {
        let (engine, handle, _) = open(OpenRequest::default());
        let mut buf = FrameBuffer::try_new(4, 4).unwrap();

        engine.set_layer_color(&handle, "shadow", Color(0xFF00FF00)).unwrap();
        engine.decode_frame(&handle, 0, &mut buf, true);
        assert_eq!(buf.pixel(0, 3), Some(0xFF00FF00));

        engine.set_layer_color(&handle, "wheel", Color(0xFFFF0000)).unwrap();
        engine.decode_frame(&handle, 0, &mut buf, true);
        assert_eq!(buf.pixel(0, 3), Some(0xFFFF0000));

        engine.replace_palette(&handle, &[Color(0xFF0000FF)]).unwrap();
        engine.decode_frame(&handle, 0, &mut buf, true);
        assert_eq!(buf.pixel(0, 3), Some(0xFF0000FF));
    }

    #[test]
    fn test_best_effort_errors() {
        let (engine, handle, _) = open(OpenRequest::default());
        assert_eq!(
            engine.set_layer_color(&handle, "nope", Color(0)),
            Err(EngineError::UnknownLayer("nope".into()))
        );
        assert_eq!(engine.replace_palette(&handle, &[]), Err(EngineError::EmptyPalette));
    }

    #[test]
    fn test_generate_cache() {
        let (engine, handle, _) = open(OpenRequest::default());
        assert!(!handle.cache_generated());
        engine.generate_cache(&handle, 10, 10);
        assert!(handle.cache_generated());
    }
}
