//! Monochrome display buffer, and the handle renderers read it through.
use std::{
    fmt::{self, Display, Formatter},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::constants::*;

/// Borrowed view of the raw pixels, row-major.
pub type Chip8DisplayBuffer<'a> = &'a [bool; DISPLAY_BUFFER_SIZE];

/// Screen buffer that sprites are drawn to.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: Box<[bool; DISPLAY_BUFFER_SIZE]>,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self {
            pixels: Box::new([false; DISPLAY_BUFFER_SIZE]),
        }
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Turn all pixels off.
    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    #[inline(always)]
    fn offset(x: usize, y: usize) -> usize {
        assert!(
            x < DISPLAY_WIDTH && y < DISPLAY_HEIGHT,
            "pixel ({x}, {y}) outside of {DISPLAY_WIDTH}x{DISPLAY_HEIGHT} display"
        );
        x + y * DISPLAY_WIDTH
    }

    /// # Panics
    ///
    /// When the coordinate is outside the display. Callers clip first.
    #[inline]
    pub fn read_pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[Self::offset(x, y)]
    }

    /// # Panics
    ///
    /// When the coordinate is outside the display. Callers clip first.
    #[inline]
    pub fn write_pixel(&mut self, x: usize, y: usize, value: bool) {
        self.pixels[Self::offset(x, y)] = value;
    }

    pub fn pixels(&self) -> Chip8DisplayBuffer {
        &self.pixels
    }

    /// Visit every pixel in row-major order.
    pub fn for_each_pixel(&self, mut f: impl FnMut(usize, usize, bool)) {
        for (i, px) in self.pixels.iter().enumerate() {
            f(i % DISPLAY_WIDTH, i / DISPLAY_WIDTH, *px);
        }
    }

    /// Number of pixels switched on.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|px| **px).count()
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framebuffer")
            .field("lit", &self.lit_count())
            .finish()
    }
}

impl Display for Framebuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for row in self.pixels.chunks(DISPLAY_WIDTH) {
            for px in row {
                f.write_str(if *px { "#" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Read surface for a renderer, possibly on another thread.
///
/// The VM publishes a complete copy of its framebuffer after every
/// instruction that changes it, so a reader always sees whole sprites.
#[derive(Debug, Clone, Default)]
pub struct DisplayHandle {
    inner: Arc<Mutex<Published>>,
}

#[derive(Debug, Default)]
struct Published {
    frame: Framebuffer,
    generation: u64,
}

impl DisplayHandle {
    pub fn new() -> Self {
        Default::default()
    }

    fn lock(&self) -> MutexGuard<'_, Published> {
        // Poisoning is ignored, the guarded data is plain pixels.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the visible frame.
    pub(crate) fn publish(&self, frame: &Framebuffer) {
        let mut published = self.lock();
        published.frame.pixels.copy_from_slice(&frame.pixels[..]);
        published.generation = published.generation.wrapping_add(1);
    }

    /// Copy of the last published frame.
    pub fn snapshot(&self) -> Framebuffer {
        self.lock().frame.clone()
    }

    /// Visit every pixel of the last published frame.
    ///
    /// The lock is held for the whole iteration, so keep the callback short.
    pub fn for_each_pixel(&self, f: impl FnMut(usize, usize, bool)) {
        self.lock().frame.for_each_pixel(f)
    }

    /// Counter that changes every time a frame is published.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_read_write_pixel() {
        let mut fb = Framebuffer::new();
        fb.write_pixel(63, 31, true);
        fb.write_pixel(1, 0, true);
        assert!(fb.read_pixel(63, 31));
        assert!(fb.read_pixel(1, 0));
        assert!(!fb.read_pixel(0, 0));
        assert_eq!(fb.pixels()[DISPLAY_BUFFER_SIZE - 1], true);
        assert_eq!(fb.lit_count(), 2);
    }

    #[test]
    #[should_panic]
    fn test_write_outside_display() {
        let mut fb = Framebuffer::new();
        fb.write_pixel(DISPLAY_WIDTH, 0, true);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut fb = Framebuffer::new();
        fb.write_pixel(10, 10, true);

        fb.clear();
        let once = fb.clone();
        fb.clear();

        assert_eq!(fb, once);
        assert_eq!(fb.lit_count(), 0);
    }

    #[test]
    fn test_dump() {
        let mut fb = Framebuffer::new();
        fb.write_pixel(0, 0, true);
        let text = fb.to_string();
        let first = text.lines().next().unwrap();
        assert_eq!(first.len(), DISPLAY_WIDTH);
        assert!(first.starts_with("#."));
        assert_eq!(text.lines().count(), DISPLAY_HEIGHT);
    }

    #[test]
    fn test_handle_publish() {
        let handle = DisplayHandle::new();
        assert_eq!(handle.generation(), 0);

        let mut fb = Framebuffer::new();
        fb.write_pixel(3, 4, true);
        handle.publish(&fb);

        assert_eq!(handle.generation(), 1);
        assert_eq!(handle.snapshot(), fb);

        let mut lit = vec![];
        handle.for_each_pixel(|x, y, on| {
            if on {
                lit.push((x, y));
            }
        });
        assert_eq!(lit, vec![(3, 4)]);
    }
}
