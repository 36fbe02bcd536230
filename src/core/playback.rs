//! Playback instance: state machine, frame scheduler and teardown
//!
//! **Threads**: every method takes `&mut self` and runs on the presentation
//! thread. Decode and cache jobs run on the executors and talk back only by
//! posting a `Completion` into a per-instance channel, which `pump()` (also
//! called at the top of every `draw()`) drains in posting order. The
//! completion is the synchronization point: buffers travel with the jobs by
//! ownership, and cursor/flag updates happen when the completion is handled.
//!
//! # Pipeline
//!
//! ```text
//! draw -> pacing allows swap -> schedule_next -> decode job fills background
//!      -> FrameReady posted -> pump: promote to next-rendering, advance cursor
//!      -> next draw swaps it into rendering
//! ```
//!
//! At most one decode job per instance is in flight (`decode_task`); many
//! instances share the decode pool. The cache job runs once per animation on
//! the serial cache queue.
//!
//! # Teardown
//!
//! `recycle()` stops playback, removes a not-yet-started cache job and either
//! closes the native handle right away or, with work in flight, moves to
//! `Draining`; the completion that leaves nothing in flight finalizes. Jobs hold
//! an `Arc` to the handle, so the engine's `close` can never run while a job is
//! still using it.
//!
//! # Seek epoch
//!
//! The decode job targets the cursor frame captured at scheduling time. A seek
//! bumps `seek_epoch`; a frame completing under an older epoch is still shown
//! but its cursor advance is dropped, so the next decode starts at the seek
//! target.

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info, trace, warn};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::buffers::{BufferPool, FrameBuffer};
use crate::core::coalescer::{ColorBatch, ColorCoalescer};
use crate::core::cursor::{Advance, Cursor, PlaybackMode};
use crate::core::pacing::{self, FramePacer};
use crate::core::surfaces::{HapticFeedback, Surface, SurfaceRegistry};
use crate::core::workers::{Executors, TaskId};
use crate::engine::{AnimationSource, Color, DecodeEngine, DecodeStatus, FrameMetadata, NativeHandle, OpenRequest};
use crate::error::PlaybackError;

/// Host callback run after every posted completion (any thread)
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Externally visible state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Running,
    /// Destruction requested, waiting for in-flight work
    Draining,
    /// Handle closed (or never loaded)
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Alive,
    Draining,
    Destroyed,
}

/// Load parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub width: u32,
    pub height: u32,
    /// Ask the engine to build its frame cache
    pub precache: bool,
    /// Present every second frame (only honored for native rates >= 60)
    pub limit_fps: bool,
    /// Initial display refresh rate; surfaces update it on every draw
    pub refresh_rate: f32,
    pub palette: Option<Vec<Color>>,
    /// Decode the first frame immediately, without `start()`
    pub start_decode: bool,
}

impl LoadOptions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            precache: false,
            limit_fps: false,
            refresh_rate: 60.0,
            palette: None,
            start_decode: false,
        }
    }
}

/// Messages from jobs back to the presentation thread
enum Completion {
    /// Nothing to show; scratch buffer and unapplied colors come back
    NoFrame {
        buffer: Option<FrameBuffer>,
        unapplied: Option<ColorBatch>,
    },
    FrameReady {
        buffer: FrameBuffer,
    },
    CacheFinished,
}

#[derive(Clone)]
struct CompletionPort {
    tx: Sender<Completion>,
    waker: Arc<Mutex<Option<Waker>>>,
}

impl CompletionPort {
    fn post(&self, completion: Completion) {
        // receiver gone: instance dropped while the job ran
        if self.tx.send(completion).is_err() {
            return;
        }
        let waker = self.waker.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(wake) = waker {
            wake();
        }
    }
}

/// One decode, self-contained so it can move to a worker thread
struct DecodeJob<E: DecodeEngine> {
    handle: Arc<NativeHandle<E>>,
    buffer: Option<FrameBuffer>,
    width: u32,
    height: u32,
    frame: usize,
    colors: ColorBatch,
    shutdown: Arc<AtomicBool>,
}

impl<E: DecodeEngine> DecodeJob<E> {
    /// Consumes the job; the handle reference is gone once this returns.
    fn run(self) -> Completion {
        let DecodeJob {
            handle,
            buffer,
            width,
            height,
            frame,
            colors,
            shutdown,
        } = self;

        if shutdown.load(Ordering::Acquire) {
            trace!("Decode of frame {} skipped: instance recycled", frame);
            return Completion::NoFrame {
                buffer,
                unapplied: Some(colors),
            };
        }
        let Some(native) = handle.get() else {
            return Completion::NoFrame {
                buffer,
                unapplied: Some(colors),
            };
        };

        let mut buffer = match buffer {
            Some(buffer) => buffer,
            None => match FrameBuffer::try_new(width, height) {
                Ok(buffer) => buffer,
                Err(e) => {
                    error!("Error loading frame {}: {}", frame, e);
                    return Completion::NoFrame {
                        buffer: None,
                        unapplied: Some(colors),
                    };
                }
            },
        };

        let engine = handle.engine();
        colors.apply(engine, native);

        let status = panic::catch_unwind(AssertUnwindSafe(|| engine.decode_frame(native, frame, &mut buffer, true)));
        match status {
            Ok(DecodeStatus::Decoded) => Completion::FrameReady { buffer },
            Ok(DecodeStatus::Failed) => {
                debug!("Frame {} failed to decode, skipping cycle", frame);
                Completion::NoFrame {
                    buffer: Some(buffer),
                    unapplied: None,
                }
            }
            Err(_) => {
                error!("Decode engine panicked on frame {}", frame);
                Completion::NoFrame {
                    buffer: Some(buffer),
                    unapplied: None,
                }
            }
        }
    }
}

/// A loaded animation plus everything needed to play it.
///
/// Load failure yields an inert instance (`is_loaded() == false`): every
/// operation is a no-op and `state()` reports `Destroyed`.
pub struct Playback<E: DecodeEngine> {
    handle: Option<Arc<NativeHandle<E>>>,
    meta: FrameMetadata,
    width: u32,
    height: u32,
    limit_fps: bool,
    pacer: FramePacer,

    cursor: Cursor,
    seek_epoch: u64,
    buffers: BufferPool,
    colors: Arc<ColorCoalescer>,
    surfaces: SurfaceRegistry,
    haptics: Option<HashMap<usize, i32>>,

    running: bool,
    lifecycle: Lifecycle,
    decode_single_frame: bool,
    single_frame_decoded: bool,
    force_redraw: bool,
    applying_layer_colors: bool,
    /// Engine asked for its cache; cleared once the cache job is enqueued
    cache_pending: bool,

    /// Seek epoch of the in-flight decode
    decode_task: Option<u64>,
    cache_task: Option<TaskId>,
    shutdown: Arc<AtomicBool>,

    executors: Executors,
    port: CompletionPort,
    rx: Receiver<Completion>,
    presented: u64,
}

impl<E: DecodeEngine> Playback<E> {
    /// Load `source` through `engine`. Failure is logged and produces an inert
    /// instance; use `try_open` to get the error instead.
    pub fn open(engine: Arc<E>, source: &AnimationSource, options: LoadOptions, executors: Executors) -> Self {
        let request = OpenRequest {
            width: options.width,
            height: options.height,
            precache: options.precache,
            limit_fps: options.limit_fps,
            palette: options.palette.clone(),
        };

        let (handle, meta) = match engine.open(source, &request) {
            Some((native, meta)) => {
                info!(
                    "Loaded {}: {} frames @ {}fps, {}x{}",
                    source.name(),
                    meta.frame_count,
                    meta.frame_rate,
                    options.width,
                    options.height
                );
                (Some(Arc::new(NativeHandle::new(Arc::clone(&engine), native))), meta)
            }
            None => {
                error!("Failed to load animation {}", source.name());
                (None, FrameMetadata::default())
            }
        };

        let limit_fps = options.limit_fps && meta.frame_rate >= pacing::LIMIT_FPS_MIN_RATE;
        if options.limit_fps && !limit_fps {
            debug!("FPS limit ignored: native rate {}fps", meta.frame_rate);
        }
        let interval = pacing::frame_interval(meta.frame_rate, limit_fps);
        let (tx, rx) = unbounded();

        let mut playback = Self {
            handle,
            meta,
            width: options.width,
            height: options.height,
            limit_fps,
            pacer: FramePacer::new(interval, options.refresh_rate),
            cursor: Cursor::new(PlaybackMode::Loop),
            seek_epoch: 0,
            buffers: BufferPool::new(),
            colors: Arc::new(ColorCoalescer::new()),
            surfaces: SurfaceRegistry::new(),
            haptics: None,
            running: false,
            lifecycle: Lifecycle::Alive,
            decode_single_frame: false,
            single_frame_decoded: false,
            force_redraw: false,
            applying_layer_colors: false,
            cache_pending: meta.cache_enabled,
            decode_task: None,
            cache_task: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            executors,
            port: CompletionPort {
                tx,
                waker: Arc::new(Mutex::new(None)),
            },
            rx,
            presented: 0,
        };

        if options.start_decode {
            playback.set_allow_decode_single_frame(true);
        }
        playback
    }

    /// Like `open`, but load failure (or an empty output size) is an error
    pub fn try_open(
        engine: Arc<E>,
        source: &AnimationSource,
        options: LoadOptions,
        executors: Executors,
    ) -> Result<Self, PlaybackError> {
        if options.width == 0 || options.height == 0 {
            return Err(PlaybackError::InvalidArgument(format!(
                "output size {}x{}",
                options.width, options.height
            )));
        }
        let playback = Self::open(engine, source, options, executors);
        if playback.is_loaded() {
            Ok(playback)
        } else {
            Err(PlaybackError::Load(source.name()))
        }
    }

    /// File path load: the engine reads the file itself
    pub fn from_file(engine: Arc<E>, path: &Path, options: LoadOptions, executors: Executors) -> Self {
        Self::open(engine, &AnimationSource::file(path), options, executors)
    }

    /// In-memory load (bundled asset). `name` keys the engine's cache; fps
    /// limiting and precaching do not apply to this path.
    pub fn from_json(
        engine: Arc<E>,
        name: &str,
        json: &str,
        options: LoadOptions,
        executors: Executors,
    ) -> Self {
        let options = LoadOptions {
            precache: false,
            limit_fps: false,
            ..options
        };
        Self::open(engine, &AnimationSource::json(name, json), options, executors)
    }

    // ------------------------------------------------------------------
    // Playback control
    // ------------------------------------------------------------------

    /// No-op while running, or once a once/freeze run has completed.
    pub fn start(&mut self) {
        if !self.is_alive() || self.running || self.cursor.is_finished() {
            return;
        }
        debug!("Playback started at frame {}", self.cursor.frame);
        self.running = true;
        self.schedule_next();
        self.surfaces.invalidate();
    }

    /// Does not cancel an in-flight decode
    pub fn stop(&mut self) {
        if self.running {
            debug!("Playback stopped at frame {}", self.cursor.frame);
        }
        self.running = false;
    }

    /// Replay a completed once/freeze animation (as once). Returns whether the
    /// restart took effect.
    pub fn restart(&mut self) -> bool {
        if !self.cursor.mode.stops_at_end() || self.cursor.auto_repeat == 0 {
            return false;
        }
        self.cursor.auto_repeat = 0;
        self.cursor.mode = PlaybackMode::Once;
        self.start();
        true
    }

    /// Switching once -> freeze is ignored unless the cursor is at frame 0.
    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        if self.cursor.mode == PlaybackMode::Once && mode == PlaybackMode::Freeze && self.cursor.frame != 0 {
            trace!("Ignoring once -> freeze at frame {}", self.cursor.frame);
            return;
        }
        self.cursor.mode = mode;
    }

    /// Seek to `progress` in [0, 1]
    pub fn set_progress(&mut self, progress: f32) {
        if !self.is_alive() {
            return;
        }
        self.seek_epoch += 1;
        self.cursor.seek(progress, self.meta.frame_count);
        self.single_frame_decoded = false;
        trace!("Seek to frame {}", self.cursor.frame);
        if !self.schedule_next() {
            self.force_redraw = true;
        }
        self.surfaces.invalidate();
    }

    /// Let a stopped instance decode one frame so a still image is shown
    pub fn set_allow_decode_single_frame(&mut self, allow: bool) {
        self.decode_single_frame = allow;
        if allow {
            self.schedule_next();
        }
    }

    /// Frame index -> strength (1 = long press, else keyboard tap)
    pub fn set_haptic_pattern(&mut self, pattern: Option<HashMap<usize, i32>>) {
        self.haptics = pattern;
    }

    // ------------------------------------------------------------------
    // Colors
    // ------------------------------------------------------------------

    pub fn set_layer_color(&mut self, layer: impl Into<String>, color: Color) {
        self.colors.set_layer_color(layer, color);
        self.request_redraw_colors();
    }

    /// Replace the whole palette on the next decode (`None` withdraws a
    /// pending replacement)
    pub fn replace_colors(&mut self, colors: Option<Vec<Color>>) {
        self.colors.replace_palette(colors);
        self.request_redraw_colors();
    }

    /// Start a batch: color changes are queued but trigger nothing until
    /// `commit_apply_layer_colors`
    pub fn begin_apply_layer_colors(&mut self) {
        self.applying_layer_colors = true;
    }

    pub fn commit_apply_layer_colors(&mut self) {
        if !self.applying_layer_colors {
            return;
        }
        self.applying_layer_colors = false;
        if !self.running && self.decode_single_frame {
            self.redecode_for_colors();
        }
        self.surfaces.invalidate();
    }

    /// Write side of the color queues for other threads. Writes made through
    /// it are picked up by the next scheduled decode.
    pub fn color_writer(&self) -> Arc<ColorCoalescer> {
        Arc::clone(&self.colors)
    }

    fn request_redraw_colors(&mut self) {
        if !self.applying_layer_colors && !self.running && self.decode_single_frame {
            self.redecode_for_colors();
        }
        self.surfaces.invalidate();
    }

    /// A stopped still image re-decodes so the new colors show up
    fn redecode_for_colors(&mut self) {
        if self.cursor.frame <= 2 {
            self.cursor.frame = 0;
            self.seek_epoch += 1;
        }
        self.cursor.next_is_last = false;
        self.single_frame_decoded = false;
        if !self.schedule_next() {
            self.force_redraw = true;
        }
    }

    // ------------------------------------------------------------------
    // Surfaces
    // ------------------------------------------------------------------

    pub fn attach_surface(&mut self, surface: &Arc<dyn Surface>) {
        if self.surfaces.attach(surface) {
            trace!("Surface attached ({} live)", self.surfaces.len());
        }
    }

    /// Playback stops on the next completion once nothing is attached
    pub fn detach_surface(&mut self, surface: &Arc<dyn Surface>) {
        self.surfaces.detach(surface);
    }

    /// Direct callback target: always master, counts as attached
    pub fn set_callback(&mut self, target: Option<&Arc<dyn Surface>>) {
        self.surfaces.set_direct(target);
    }

    pub fn set_waker(&mut self, waker: Option<Waker>) {
        *self.port.waker.lock().unwrap_or_else(|e| e.into_inner()) = waker;
    }

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------

    /// Submit a decode of the cursor frame. Refused (false) while a decode is
    /// in flight, a decoded frame awaits its swap, the instance is going away,
    /// or playback is stopped and no single frame is wanted.
    pub fn schedule_next(&mut self) -> bool {
        if self.decode_task.is_some() || self.buffers.has_next() || self.lifecycle != Lifecycle::Alive {
            return false;
        }
        let Some(handle) = &self.handle else {
            return false;
        };
        if !self.running && (!self.decode_single_frame || self.single_frame_decoded) {
            return false;
        }

        let job = DecodeJob {
            handle: Arc::clone(handle),
            buffer: self.buffers.take_background(),
            width: self.width,
            height: self.height,
            frame: self.cursor.frame,
            colors: self.colors.capture(),
            shutdown: Arc::clone(&self.shutdown),
        };
        trace!("Scheduling decode of frame {}", job.frame);

        self.decode_task = Some(self.seek_epoch);
        let port = self.port.clone();
        self.executors.decode.execute(Box::new(move || {
            let completion = job.run();
            port.post(completion);
        }));
        true
    }

    fn enqueue_cache(&mut self) {
        let Some(handle) = &self.handle else {
            return;
        };
        let handle = Arc::clone(handle);
        let shutdown = Arc::clone(&self.shutdown);
        let port = self.port.clone();
        let (width, height) = (self.width, self.height);

        let id = self.executors.cache.submit(Box::new(move || {
            match handle.get() {
                Some(native) if !shutdown.load(Ordering::Acquire) => {
                    trace!("Generating frame cache {}x{}", width, height);
                    handle.engine().generate_cache(native, width, height);
                }
                _ => trace!("Cache generation skipped: instance recycled"),
            }
            drop(handle);
            port.post(Completion::CacheFinished);
        }));
        debug!("Cache generation queued ({:?})", id);
        self.cache_task = Some(id);
    }

    /// Handle completions posted so far (not ones posted while handling).
    /// Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let queued = self.rx.len();
        let mut handled = 0;
        while handled < queued {
            match self.rx.try_recv() {
                Ok(completion) => self.on_completion(completion),
                Err(_) => break,
            }
            handled += 1;
        }
        handled
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::NoFrame { buffer, unapplied } => {
                self.decode_task = None;
                if let (Some(buffer), Lifecycle::Alive) = (buffer, self.lifecycle) {
                    self.buffers.restore_background(buffer);
                }
                if let Some(batch) = unapplied {
                    self.colors.restore(batch);
                }
            }
            Completion::FrameReady { buffer } => {
                let epoch = self.decode_task.take();
                if self.lifecycle == Lifecycle::Alive {
                    self.buffers.promote(buffer);
                    self.advance_cursor(epoch);
                    self.single_frame_decoded = true;
                    if self.cache_pending {
                        self.cache_pending = false;
                        self.enqueue_cache();
                    }
                    self.surfaces.invalidate();
                }
            }
            Completion::CacheFinished => {
                trace!("Cache generation finished");
                self.cache_task = None;
            }
        }
        self.finish_cycle();
    }

    fn advance_cursor(&mut self, epoch: Option<u64>) {
        if epoch != Some(self.seek_epoch) {
            trace!("Stale frame after seek, cursor kept at {}", self.cursor.frame);
            return;
        }
        let step = if self.limit_fps { 2 } else { 1 };
        match self.cursor.advance(self.meta.frame_count, step) {
            Advance::Stepped => {}
            Advance::Looped => trace!("Animation looped"),
            Advance::Terminal => debug!(
                "Terminal frame reached ({}, repeat {})",
                self.cursor.mode, self.cursor.auto_repeat
            ),
        }
    }

    fn finish_cycle(&mut self) {
        if self.lifecycle == Lifecycle::Draining {
            self.cancel_pending_cache();
            if !self.has_work_in_flight() {
                self.finalize();
            }
        }
        if self.lifecycle == Lifecycle::Destroyed || self.handle.is_none() {
            self.buffers.release();
            return;
        }
        if !self.surfaces.has_any() {
            self.stop();
        }
        self.schedule_next();
    }

    fn cancel_pending_cache(&mut self) {
        if let Some(id) = self.cache_task
            && self.executors.cache.remove(id)
        {
            debug!("Pending cache generation cancelled");
            self.cache_task = None;
        }
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Request destruction. Immediate when idle, otherwise deferred until the
    /// in-flight decode/cache job completes. Calling it again is a no-op.
    pub fn recycle(&mut self) {
        if self.lifecycle != Lifecycle::Alive {
            return;
        }
        self.running = false;
        self.shutdown.store(true, Ordering::Release);
        self.cancel_pending_cache();
        if self.has_work_in_flight() {
            debug!("Recycle deferred: work in flight");
            self.lifecycle = Lifecycle::Draining;
        } else {
            self.finalize();
        }
    }

    fn finalize(&mut self) {
        self.lifecycle = Lifecycle::Destroyed;
        if let Some(handle) = self.handle.take() {
            match Arc::try_unwrap(handle) {
                Ok(native) => native.close(),
                Err(_) => warn!("Native handle still referenced, closing on last release"),
            }
        }
        self.buffers.release();
        debug!("Playback destroyed");
    }

    /// Decode or cache job queued or running
    pub fn has_work_in_flight(&self) -> bool {
        self.decode_task.is_some() || self.cache_task.is_some()
    }

    // ------------------------------------------------------------------
    // Draw
    // ------------------------------------------------------------------

    /// One presentation pass for `surface`: drain completions, decide whether
    /// to swap, and return the buffer to blit.
    pub fn draw(&mut self, surface: &Arc<dyn Surface>) -> Option<&FrameBuffer> {
        self.pump();
        if !self.is_alive() {
            return None;
        }

        self.surfaces.set_current(Some(surface));
        self.pacer.set_refresh_rate(surface.refresh_rate_hint());
        let now = surface.now();
        let elapsed = self.pacer.elapsed(now);
        let threshold = self.pacer.threshold();

        if self.running {
            if !self.buffers.has_rendering() && !self.buffers.has_next() {
                self.schedule_next();
            } else if self.buffers.has_next()
                && (!self.buffers.has_rendering() || elapsed >= threshold)
                && self.surfaces.is_current_master()
            {
                self.perform_haptic();
                self.present(now, elapsed);
                if self.cursor.next_is_last {
                    self.stop();
                }
                self.schedule_next();
            }
        } else if (self.force_redraw || self.decode_single_frame && elapsed >= threshold) && self.buffers.has_next() {
            self.present(now, elapsed);
            if self.force_redraw {
                self.single_frame_decoded = false;
                self.force_redraw = false;
            }
            self.schedule_next();
        }

        if self.buffers.has_rendering() && self.running {
            self.surfaces.invalidate();
        }
        self.buffers.rendering()
    }

    fn present(&mut self, now: Duration, elapsed: Duration) {
        self.buffers.swap();
        self.single_frame_decoded = true;
        self.pacer.mark_presented(now, elapsed);
        self.presented += 1;
    }

    fn perform_haptic(&self) {
        let Some(pattern) = &self.haptics else {
            return;
        };
        let Some(surface) = self.surfaces.current() else {
            return;
        };
        let strength = self.cursor.frame.checked_sub(1).and_then(|shown| pattern.get(&shown));
        if let Some(&strength) = strength {
            surface.perform_haptic(HapticFeedback::from_strength(strength));
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Load succeeded and the handle has not been closed
    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    fn is_alive(&self) -> bool {
        self.handle.is_some() && self.lifecycle == Lifecycle::Alive
    }

    pub fn state(&self) -> PlaybackState {
        match self.lifecycle {
            Lifecycle::Destroyed => PlaybackState::Destroyed,
            Lifecycle::Draining => PlaybackState::Draining,
            Lifecycle::Alive if self.handle.is_none() => PlaybackState::Destroyed,
            Lifecycle::Alive if self.running => PlaybackState::Running,
            Lifecycle::Alive => PlaybackState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// A decoded frame exists (shown or awaiting its swap)
    pub fn has_frame(&self) -> bool {
        self.handle.is_some() && (self.buffers.has_rendering() || self.buffers.has_next())
    }

    /// Rendering buffer, else the decoded one awaiting its swap
    pub fn current_frame_buffer(&self) -> Option<&FrameBuffer> {
        self.buffers.current()
    }

    pub fn intrinsic_width(&self) -> u32 {
        self.width
    }

    pub fn intrinsic_height(&self) -> u32 {
        self.height
    }

    pub fn metadata(&self) -> FrameMetadata {
        self.meta
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn playback_mode(&self) -> PlaybackMode {
        self.cursor.mode
    }

    pub fn frame_interval(&self) -> Duration {
        self.pacer.interval()
    }

    /// Effective fps limiting (after the native-rate check)
    pub fn limits_fps(&self) -> bool {
        self.limit_fps
    }

    /// Swaps performed so far
    pub fn presented_frames(&self) -> u64 {
        self.presented
    }
}

impl<E: DecodeEngine> Drop for Playback<E> {
    fn drop(&mut self) {
        self.recycle();
    }
}
