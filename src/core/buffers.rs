//! Pixel buffers and the rendering / next-rendering / background triple
//!
//! **Used by**: decode tasks (fill `background`), Playback::draw (swap + blit)
//!
//! # Ownership
//!
//! Buffers move between stages instead of being shared:
//! - `background` is taken out of the pool by a scheduled decode task and
//!   travels with it to the worker thread
//! - on success it comes back as `next-rendering`
//! - a swap rotates `next-rendering -> rendering` and the old `rendering`
//!   becomes the new `background`
//!
//! The presentation thread therefore only ever sees buffers that finished a
//! full decode pass.

use log::trace;

use crate::error::PlaybackError;

/// ARGB8888 pixel buffer, one `u32` per pixel, row-major, no padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl FrameBuffer {
    /// Allocate a zeroed buffer.
    ///
    /// Allocation failure is reported instead of aborting so the scheduler
    /// can skip a cycle and retry.
    pub fn try_new(width: u32, height: u32) -> Result<Self, PlaybackError> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or(PlaybackError::Allocation { width, height })?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| PlaybackError::Allocation { width, height })?;
        pixels.resize(len, 0);

        trace!("FrameBuffer allocated: {}x{}", width, height);
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    /// Pixel at (x, y), `None` when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Raw native-endian bytes (what a surface blits)
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Convert ARGB words to straight RGBA8 bytes (for image export)
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for &argb in &self.pixels {
            let [a, r, g, b] = argb.to_be_bytes();
            out.extend_from_slice(&[r, g, b, a]);
        }
        out
    }
}

/// The three buffer slots of one playback instance.
///
/// Invariant: `next_rendering` is `Some` only between a decode completion and
/// the next successful swap.
#[derive(Debug, Default)]
pub struct BufferPool {
    rendering: Option<FrameBuffer>,
    next_rendering: Option<FrameBuffer>,
    background: Option<FrameBuffer>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently displayed buffer
    pub fn rendering(&self) -> Option<&FrameBuffer> {
        self.rendering.as_ref()
    }

    /// Decoded buffer awaiting promotion
    pub fn next_rendering(&self) -> Option<&FrameBuffer> {
        self.next_rendering.as_ref()
    }

    /// Rendering buffer, falling back to the decoded-but-not-shown one
    pub fn current(&self) -> Option<&FrameBuffer> {
        self.rendering.as_ref().or(self.next_rendering.as_ref())
    }

    pub fn has_rendering(&self) -> bool {
        self.rendering.is_some()
    }

    pub fn has_next(&self) -> bool {
        self.next_rendering.is_some()
    }

    pub fn has_background(&self) -> bool {
        self.background.is_some()
    }

    /// Hand the scratch buffer to a decode task (may be `None`; the task
    /// allocates one then).
    pub fn take_background(&mut self) -> Option<FrameBuffer> {
        self.background.take()
    }

    /// Return an unused scratch buffer (task produced no frame)
    pub fn restore_background(&mut self, buffer: FrameBuffer) {
        if self.background.is_none() {
            self.background = Some(buffer);
        }
    }

    /// Decode finished: buffer becomes `next-rendering`
    pub fn promote(&mut self, buffer: FrameBuffer) {
        debug_assert!(self.next_rendering.is_none(), "promote over unswapped frame");
        self.next_rendering = Some(buffer);
    }

    /// Rotate `next -> rendering`, old `rendering -> background`.
    ///
    /// Returns false (and changes nothing) when there is no decoded frame.
    pub fn swap(&mut self) -> bool {
        let Some(next) = self.next_rendering.take() else {
            return false;
        };
        if let Some(old) = self.rendering.replace(next) {
            self.background = Some(old);
        }
        true
    }

    /// Drop every buffer (instance destroyed)
    pub fn release(&mut self) {
        if self.rendering.is_some() || self.next_rendering.is_some() || self.background.is_some() {
            trace!("BufferPool released");
        }
        self.rendering = None;
        self.next_rendering = None;
        self.background = None;
    }

    pub fn is_released(&self) -> bool {
        self.rendering.is_none() && self.next_rendering.is_none() && self.background.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(w: u32, h: u32, value: u32) -> FrameBuffer {
        let mut buf = FrameBuffer::try_new(w, h).unwrap();
        buf.pixels_mut().fill(value);
        buf
    }

    #[test]
    fn test_alloc_and_stride() {
        let buf = FrameBuffer::try_new(4, 3).unwrap();
        assert_eq!(buf.pixels().len(), 12);
        assert_eq!(buf.stride(), 16);
        assert_eq!(buf.as_bytes().len(), 48);
        assert!(buf.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_alloc_overflow_reported() {
        let err = FrameBuffer::try_new(u32::MAX, u32::MAX);
        assert!(matches!(err, Err(PlaybackError::Allocation { .. })));
    }

    #[test]
    fn test_pixel_bounds() {
        let buf = filled(2, 2, 7);
        assert_eq!(buf.pixel(1, 1), Some(7));
        assert_eq!(buf.pixel(2, 0), None);
    }

    #[test]
    fn test_rgba_conversion() {
        let buf = filled(1, 1, 0x80_11_22_33);
        assert_eq!(buf.to_rgba8(), vec![0x11, 0x22, 0x33, 0x80]);
    }

    #[test]
    fn test_swap_rotates_triple() {
        let mut pool = BufferPool::new();
        assert!(!pool.swap());

        pool.promote(filled(1, 1, 1));
        assert!(pool.swap());
        assert_eq!(pool.rendering().unwrap().pixels()[0], 1);
        assert!(!pool.has_background());

        pool.promote(filled(1, 1, 2));
        assert!(pool.swap());
        assert_eq!(pool.rendering().unwrap().pixels()[0], 2);
        // old rendering recycled as scratch
        assert_eq!(pool.take_background().unwrap().pixels()[0], 1);
        assert!(!pool.has_next());
    }

    #[test]
    fn test_current_prefers_rendering() {
        let mut pool = BufferPool::new();
        pool.promote(filled(1, 1, 5));
        assert_eq!(pool.current().unwrap().pixels()[0], 5);
        pool.swap();
        pool.promote(filled(1, 1, 6));
        assert_eq!(pool.current().unwrap().pixels()[0], 5);
    }

    #[test]
    fn test_release() {
        let mut pool = BufferPool::new();
        pool.promote(filled(1, 1, 5));
        pool.swap();
        pool.restore_background(filled(1, 1, 9));
        pool.release();
        assert!(pool.is_released());
    }
}
