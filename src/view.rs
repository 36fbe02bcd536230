//! Host view glue
//!
//! `AnimationView` is what a host widget embeds: it owns at most one
//! `Playback`, remembers layer colors across animation changes, and maps the
//! host's attach/detach and play/pause events onto start/stop.
//!
//! The view registers its surface as the playback's direct callback target, so
//! it is always the master surface for its own animation.

use indexmap::IndexMap;
use log::debug;
use std::path::Path;
use std::sync::Arc;

use crate::core::buffers::FrameBuffer;
use crate::core::cursor::PlaybackMode;
use crate::core::playback::{LoadOptions, Playback};
use crate::core::surfaces::Surface;
use crate::core::workers::Executors;
use crate::engine::{Color, DecodeEngine};

pub struct AnimationView<E: DecodeEngine> {
    engine: Arc<E>,
    executors: Executors,
    surface: Arc<dyn Surface>,
    playback: Option<Playback<E>>,
    layer_colors: IndexMap<String, Color>,
    playback_mode: PlaybackMode,
    attached: bool,
    playing: bool,
    start_on_attach: bool,
}

impl<E: DecodeEngine> AnimationView<E> {
    pub fn new(engine: Arc<E>, executors: Executors, surface: Arc<dyn Surface>) -> Self {
        Self {
            engine,
            executors,
            surface,
            playback: None,
            layer_colors: IndexMap::new(),
            playback_mode: PlaybackMode::Freeze,
            attached: false,
            playing: false,
            start_on_attach: false,
        }
    }

    /// Remembered for later animations too
    pub fn set_layer_color(&mut self, layer: &str, color: Color) {
        self.layer_colors.insert(layer.to_string(), color);
        if let Some(playback) = &mut self.playback {
            playback.set_layer_color(layer, color);
        }
    }

    pub fn replace_colors(&mut self, colors: Option<Vec<Color>>) {
        if let Some(playback) = &mut self.playback {
            playback.replace_colors(colors);
        }
    }

    /// Bundled asset: loaded from memory, keyed by `name`
    pub fn set_animation_json(
        &mut self,
        name: &str,
        json: &str,
        width: u32,
        height: u32,
        palette: Option<Vec<Color>>,
        mode: PlaybackMode,
    ) {
        let options = LoadOptions {
            palette,
            refresh_rate: self.surface.refresh_rate_hint(),
            ..LoadOptions::new(width, height)
        };
        let playback = Playback::from_json(Arc::clone(&self.engine), name, json, options, self.executors.clone());
        self.install(playback, mode, true);
    }

    /// Animation file: fps limited, no precache
    pub fn set_animation_file(&mut self, path: &Path, width: u32, height: u32, mode: PlaybackMode) {
        let options = LoadOptions {
            limit_fps: true,
            refresh_rate: self.surface.refresh_rate_hint(),
            ..LoadOptions::new(width, height)
        };
        let playback = Playback::from_file(Arc::clone(&self.engine), path, options, self.executors.clone());
        self.install(playback, mode, false);
    }

    fn install(&mut self, mut playback: Playback<E>, mode: PlaybackMode, reapply_colors: bool) {
        self.playback_mode = mode;
        playback.set_playback_mode(mode);
        if reapply_colors && !self.layer_colors.is_empty() {
            playback.begin_apply_layer_colors();
            for (layer, color) in &self.layer_colors {
                playback.set_layer_color(layer.as_str(), *color);
            }
            playback.commit_apply_layer_colors();
        }
        playback.set_allow_decode_single_frame(true);
        playback.set_callback(Some(&self.surface));

        // previous animation (if any) recycles on drop
        if self.playback.replace(playback).is_some() {
            debug!("AnimationView: animation replaced");
        }
    }

    pub fn on_attached(&mut self) {
        self.attached = true;
        if self.playing
            && let Some(playback) = &mut self.playback
        {
            playback.start();
        }
    }

    pub fn on_detached(&mut self) {
        self.attached = false;
        if let Some(playback) = &mut self.playback {
            playback.stop();
        }
    }

    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        self.playback_mode = mode;
        if let Some(playback) = &mut self.playback {
            playback.set_playback_mode(mode);
        }
    }

    pub fn set_progress(&mut self, progress: f32) {
        if let Some(playback) = &mut self.playback {
            playback.set_progress(progress);
        }
    }

    pub fn play(&mut self) {
        let Some(playback) = &mut self.playback else {
            return;
        };
        self.playing = true;
        if self.attached {
            playback.start();
        } else {
            self.start_on_attach = true;
        }
    }

    pub fn pause(&mut self) {
        let Some(playback) = &mut self.playback else {
            return;
        };
        self.playing = false;
        if self.attached {
            playback.stop();
        } else {
            self.start_on_attach = false;
        }
    }

    /// Host draw callback
    pub fn draw(&mut self) -> Option<&FrameBuffer> {
        self.playback.as_mut()?.draw(&self.surface)
    }

    pub fn playback(&self) -> Option<&Playback<E>> {
        self.playback.as_ref()
    }

    pub fn playback_mode(&self) -> PlaybackMode {
        self.playback_mode
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Play was requested while detached
    pub fn starts_on_attach(&self) -> bool {
        self.start_on_attach
    }
}
