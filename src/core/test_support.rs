//! Test doubles: an engine that records every call and a surface with a
//! manual clock.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::buffers::FrameBuffer;
use crate::core::surfaces::{HapticFeedback, Surface};
use crate::engine::{AnimationSource, Color, DecodeEngine, DecodeStatus, FrameMetadata, OpenRequest};
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Open,
    Decode(usize),
    LayerColor(String, Color),
    Palette(Vec<Color>),
    Cache,
    Close,
}

/// Engine double: decoded frame `n` fills the buffer with `n + 1`.
pub struct RecordingEngine {
    meta: FrameMetadata,
    fail_open: bool,
    calls: Mutex<Vec<EngineCall>>,
    failing: Mutex<HashSet<usize>>,
    closed: AtomicBool,
    /// Decode or cache calls made after `close`
    violations: AtomicUsize,
}

impl RecordingEngine {
    pub fn new(frame_count: usize, frame_rate: u32) -> Arc<Self> {
        Self::build(frame_count, frame_rate, false, false)
    }

    pub fn with_cache(frame_count: usize, frame_rate: u32) -> Arc<Self> {
        Self::build(frame_count, frame_rate, true, false)
    }

    pub fn broken() -> Arc<Self> {
        Self::build(0, 0, false, true)
    }

    fn build(frame_count: usize, frame_rate: u32, cache_enabled: bool, fail_open: bool) -> Arc<Self> {
        Arc::new(Self {
            meta: FrameMetadata {
                frame_count,
                frame_rate,
                cache_enabled,
            },
            fail_open,
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
            violations: AtomicUsize::new(0),
        })
    }

    pub fn fail_frame(&self, frame: usize) {
        self.failing.lock().unwrap().insert(frame);
    }

    pub fn heal_frame(&self, frame: usize) {
        self.failing.lock().unwrap().remove(&frame);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn decodes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Decode(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }

    fn record(&self, call: EngineCall) {
        if self.is_closed() && !matches!(call, EngineCall::Close) {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        self.calls.lock().unwrap().push(call);
    }
}

impl DecodeEngine for RecordingEngine {
    type Handle = ();

    fn open(&self, _source: &AnimationSource, request: &OpenRequest) -> Option<((), FrameMetadata)> {
        self.record(EngineCall::Open);
        if self.fail_open {
            return None;
        }
        let meta = FrameMetadata {
            cache_enabled: self.meta.cache_enabled || request.precache,
            ..self.meta
        };
        Some(((), meta))
    }

    fn decode_frame(&self, _handle: &(), frame: usize, target: &mut FrameBuffer, _clear: bool) -> DecodeStatus {
        self.record(EngineCall::Decode(frame));
        if frame >= self.meta.frame_count || self.failing.lock().unwrap().contains(&frame) {
            return DecodeStatus::Failed;
        }
        target.pixels_mut().fill(frame as u32 + 1);
        DecodeStatus::Decoded
    }

    fn set_layer_color(&self, _handle: &(), layer: &str, color: Color) -> Result<(), EngineError> {
        self.record(EngineCall::LayerColor(layer.to_string(), color));
        if layer == "missing" {
            return Err(EngineError::UnknownLayer(layer.to_string()));
        }
        Ok(())
    }

    fn replace_palette(&self, _handle: &(), colors: &[Color]) -> Result<(), EngineError> {
        self.record(EngineCall::Palette(colors.to_vec()));
        Ok(())
    }

    fn generate_cache(&self, _handle: &(), _width: u32, _height: u32) {
        self.record(EngineCall::Cache);
    }

    fn close(&self, _handle: ()) {
        self.record(EngineCall::Close);
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Surface with a manually advanced clock
pub struct TestSurface {
    now: Mutex<Duration>,
    refresh_rate: f32,
    redraws: AtomicUsize,
    haptics: Mutex<Vec<HapticFeedback>>,
}

impl TestSurface {
    pub fn new(refresh_rate: f32) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Duration::ZERO),
            refresh_rate,
            redraws: AtomicUsize::new(0),
            haptics: Mutex::new(Vec::new()),
        })
    }

    pub fn advance(&self, ms: u64) {
        *self.now.lock().unwrap() += Duration::from_millis(ms);
    }

    pub fn redraws(&self) -> usize {
        self.redraws.load(Ordering::SeqCst)
    }

    pub fn haptics(&self) -> Vec<HapticFeedback> {
        self.haptics.lock().unwrap().clone()
    }
}

impl Surface for TestSurface {
    fn request_redraw(&self) {
        self.redraws.fetch_add(1, Ordering::SeqCst);
    }

    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    fn refresh_rate_hint(&self) -> f32 {
        self.refresh_rate
    }

    fn perform_haptic(&self, feedback: HapticFeedback) {
        self.haptics.lock().unwrap().push(feedback);
    }
}

pub fn as_surface(surface: &Arc<TestSurface>) -> Arc<dyn Surface> {
    surface.clone()
}
