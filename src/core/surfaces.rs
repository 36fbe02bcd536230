//! Presentation surfaces attached to a playback instance
//!
//! Surfaces are held as `Weak` handles: a surface that goes away is never kept
//! alive by the registry and never crashes it. Every traversal prunes dead
//! entries in place.
//!
//! # Master election
//!
//! Several surfaces may share one playback instance. Only the master may swap
//! buffers (and fire haptics), so the animation advances once per frame
//! instead of once per surface:
//! - a direct callback target, when set, always wins
//! - otherwise the most recently attached live surface is master, and the
//!   current (drawing) surface must be that one
//! - with nothing attached, any surface is master

use log::trace;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Haptic feedback kinds a surface may perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticFeedback {
    LongPress,
    KeyboardTap,
}

impl HapticFeedback {
    /// Pattern strength 1 is a long press, anything else a keyboard tap
    pub fn from_strength(strength: i32) -> Self {
        if strength == 1 {
            HapticFeedback::LongPress
        } else {
            HapticFeedback::KeyboardTap
        }
    }
}

/// Presentation surface contract.
///
/// Implemented by the host's view/window. All calls happen on the
/// presentation thread.
pub trait Surface {
    /// Ask the host to schedule a draw
    fn request_redraw(&self);

    /// Monotonic elapsed time
    fn now(&self) -> Duration;

    /// Display refresh rate in Hz
    fn refresh_rate_hint(&self) -> f32 {
        60.0
    }

    fn perform_haptic(&self, _feedback: HapticFeedback) {}
}

fn same_surface(weak: &Weak<dyn Surface>, surface: &Arc<dyn Surface>) -> bool {
    std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(surface))
}

/// Ordered, self-pruning set of surfaces plus direct/current targets
#[derive(Default)]
pub struct SurfaceRegistry {
    /// Newest first
    entries: Vec<Weak<dyn Surface>>,
    direct: Option<Weak<dyn Surface>>,
    current: Option<Weak<dyn Surface>>,
}

impl std::fmt::Debug for SurfaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceRegistry")
            .field("entries", &self.entries.len())
            .field("direct", &self.direct.is_some())
            .field("current", &self.current.is_some())
            .finish()
    }
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|w| w.strong_count() > 0);
        if self.entries.len() != before {
            trace!("SurfaceRegistry pruned {} dead surface(s)", before - self.entries.len());
        }
    }

    /// Register a surface. Returns false if it was already registered.
    pub fn attach(&mut self, surface: &Arc<dyn Surface>) -> bool {
        self.prune();
        if self.entries.iter().any(|w| same_surface(w, surface)) {
            return false;
        }
        self.entries.insert(0, Arc::downgrade(surface));
        true
    }

    /// Unregister a surface (dead entries are dropped too)
    pub fn detach(&mut self, surface: &Arc<dyn Surface>) {
        self.entries
            .retain(|w| w.strong_count() > 0 && !same_surface(w, surface));
    }

    /// Set or clear the direct callback target
    pub fn set_direct(&mut self, surface: Option<&Arc<dyn Surface>>) {
        self.direct = surface.map(Arc::downgrade);
    }

    /// Set or clear the surface that is currently drawing
    pub fn set_current(&mut self, surface: Option<&Arc<dyn Surface>>) {
        self.current = surface.map(Arc::downgrade);
    }

    pub fn current(&self) -> Option<Arc<dyn Surface>> {
        self.current.as_ref().and_then(Weak::upgrade)
    }

    fn direct_alive(&self) -> bool {
        self.direct.as_ref().is_some_and(|w| w.strong_count() > 0)
    }

    /// Live registered surfaces (after pruning)
    pub fn len(&mut self) -> usize {
        self.prune();
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// At least one live surface or a direct target
    pub fn has_any(&mut self) -> bool {
        if self.direct_alive() {
            return true;
        }
        self.prune();
        !self.entries.is_empty()
    }

    /// Whether the current surface may drive frame advancement
    pub fn is_current_master(&mut self) -> bool {
        if self.direct_alive() {
            return true;
        }
        self.prune();
        match (self.entries.first(), &self.current) {
            (None, _) => true,
            (Some(first), Some(current)) => Weak::ptr_eq(first, current),
            (Some(_), None) => false,
        }
    }

    /// Request a redraw on every live surface and the direct target
    pub fn invalidate(&mut self) {
        self.prune();
        for surface in self.entries.iter().filter_map(Weak::upgrade) {
            surface.request_redraw();
        }
        if let Some(direct) = self.direct.as_ref().and_then(Weak::upgrade) {
            direct.request_redraw();
        }
    }
}
