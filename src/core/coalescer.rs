//! Pending color updates (layer colors + palette replacement)
//!
//! Two-stage double buffer:
//! - **write stage**: any thread appends layer colors or replaces the pending
//!   palette (`ColorCoalescer`, shared behind `Arc`)
//! - **apply stage**: each successfully scheduled decode takes the whole write
//!   stage in one exchange (`capture()`), and the decode task applies the
//!   resulting `ColorBatch` right before decoding
//!
//! A write that lands after a capture simply waits for the next capture. A
//! batch that never reached the engine (task bailed out before applying) is
//! merged back with `restore()`, newer writes winning.
//!
//! **Used by**: Playback (capture on schedule), decode tasks (apply)

use indexmap::IndexMap;
use log::trace;
use std::sync::Mutex;

use crate::engine::{Color, DecodeEngine};

#[derive(Debug, Default)]
struct WriteStage {
    layers: IndexMap<String, Color>,
    palette: Option<Vec<Color>>,
}

/// Thread-safe write side of the color pipeline
#[derive(Debug, Default)]
pub struct ColorCoalescer {
    stage: Mutex<WriteStage>,
}

/// Snapshot captured for exactly one decode
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ColorBatch {
    layers: IndexMap<String, Color>,
    palette: Option<Vec<Color>>,
}

impl ColorCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a layer color; a later write to the same layer replaces it.
    pub fn set_layer_color(&self, layer: impl Into<String>, color: Color) {
        let layer = layer.into();
        trace!("Pending layer color: {} = {}", layer, color);
        self.stage.lock().unwrap_or_else(|e| e.into_inner()).layers.insert(layer, color);
    }

    /// Queue a full palette replacement. Only the latest request before a
    /// decode is honored; `None` withdraws the pending request.
    pub fn replace_palette(&self, colors: Option<Vec<Color>>) {
        self.stage.lock().unwrap_or_else(|e| e.into_inner()).palette = colors;
    }

    pub fn has_pending(&self) -> bool {
        let stage = self.stage.lock().unwrap_or_else(|e| e.into_inner());
        !stage.layers.is_empty() || stage.palette.is_some()
    }

    /// Move the write stage into a batch and leave it empty.
    pub fn capture(&self) -> ColorBatch {
        let mut stage = self.stage.lock().unwrap_or_else(|e| e.into_inner());
        ColorBatch {
            layers: std::mem::take(&mut stage.layers),
            palette: stage.palette.take(),
        }
    }

    /// Put back a batch that was never applied. Values written since the
    /// capture take precedence.
    pub fn restore(&self, batch: ColorBatch) {
        if batch.is_empty() {
            return;
        }
        let mut stage = self.stage.lock().unwrap_or_else(|e| e.into_inner());
        let newer = std::mem::take(&mut stage.layers);
        let mut merged = batch.layers;
        for (layer, color) in newer {
            merged.insert(layer, color);
        }
        stage.layers = merged;
        if stage.palette.is_none() {
            stage.palette = batch.palette;
        }
    }
}

impl ColorBatch {
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.palette.is_none()
    }

    pub fn layers(&self) -> impl Iterator<Item = (&str, Color)> {
        self.layers.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn palette(&self) -> Option<&[Color]> {
        self.palette.as_deref()
    }

    /// Push the batch into the engine: layer colors first, then the palette.
    /// Failures are logged and dropped.
    pub fn apply<E: DecodeEngine>(&self, engine: &E, handle: &E::Handle) {
        for (layer, color) in &self.layers {
            if let Err(e) = engine.set_layer_color(handle, layer, *color) {
                trace!("Layer color {} skipped: {}", layer, e);
            }
        }
        if let Some(palette) = &self.palette
            && let Err(e) = engine.replace_palette(handle, palette)
        {
            trace!("Palette replacement skipped: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const RED: Color = Color(0xFFFF0000);
    const GREEN: Color = Color(0xFF00FF00);
    const BLUE: Color = Color(0xFF0000FF);

    #[test]
    fn test_capture_empties_write_stage() {
        let colors = ColorCoalescer::new();
        colors.set_layer_color("eyes", RED);
        colors.replace_palette(Some(vec![GREEN]));
        assert!(colors.has_pending());

        let batch = colors.capture();
        assert_eq!(batch.layers().collect::<Vec<_>>(), vec![("eyes", RED)]);
        assert_eq!(batch.palette(), Some(&[GREEN][..]));
        assert!(!colors.has_pending());
        assert!(colors.capture().is_empty());
    }

    #[test]
    fn test_latest_palette_wins() {
        let colors = ColorCoalescer::new();
        colors.replace_palette(Some(vec![RED]));
        colors.replace_palette(Some(vec![GREEN, BLUE]));
        assert_eq!(colors.capture().palette(), Some(&[GREEN, BLUE][..]));

        colors.replace_palette(Some(vec![RED]));
        colors.replace_palette(None);
        assert!(colors.capture().is_empty());
    }

    #[test]
    fn test_write_after_capture_goes_to_next_batch() {
        let colors = ColorCoalescer::new();
        colors.set_layer_color("a", RED);
        let first = colors.capture();
        colors.set_layer_color("b", GREEN);
        let second = colors.capture();

        assert_eq!(first.layers().collect::<Vec<_>>(), vec![("a", RED)]);
        assert_eq!(second.layers().collect::<Vec<_>>(), vec![("b", GREEN)]);
    }

    #[test]
    fn test_restore_keeps_newer_writes() {
        let colors = ColorCoalescer::new();
        colors.set_layer_color("a", RED);
        colors.set_layer_color("b", RED);
        colors.replace_palette(Some(vec![RED]));
        let batch = colors.capture();

        colors.set_layer_color("b", BLUE);
        colors.replace_palette(Some(vec![BLUE]));
        colors.restore(batch);

        let merged = colors.capture();
        assert_eq!(merged.layers().collect::<Vec<_>>(), vec![("a", RED), ("b", BLUE)]);
        assert_eq!(merged.palette(), Some(&[BLUE][..]));
    }

    #[test]
    fn test_writers_from_other_threads() {
        let colors = Arc::new(ColorCoalescer::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let colors = Arc::clone(&colors);
                std::thread::spawn(move || colors.set_layer_color(format!("layer{i}"), RED))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(colors.capture().layers().count(), 4);
    }
}
