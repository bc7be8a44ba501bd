//! Double-buffered PPU framebuffer.
//!
//! The PPU writes 6-bit palette indices into the back plane while the
//! front plane holds the last completed picture. The planes swap when
//! vblank starts. Conversion to packed pixels happens on demand through
//! [`ColorFormat`].

use serde::{Deserialize, Serialize};

use crate::ppu::{
    SCREEN_HEIGHT, SCREEN_WIDTH,
    palette::{Color, NTSC_PALETTE},
};

/// Describes how an RGB color is packed into the destination bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorFormat {
    /// 16-bit packed RGB using 5 bits per channel (0RRRRRGGGGGBBBBB), little endian.
    Rgb555,
    /// 16-bit packed RGB using 5/6/5 bits (RRRRRGGGGGGBBBBB), little endian.
    Rgb565,
    /// Packed 24-bit RGB, 3 bytes per pixel in R, G, B order.
    Rgb888,
    /// Packed 32-bit RGBA, 4 bytes per pixel in R, G, B, A order.
    Rgba8888,
    /// Packed 32-bit BGRA, 4 bytes per pixel in B, G, R, A order.
    Bgra8888,
    /// Packed 32-bit ARGB, 4 bytes per pixel in A, R, G, B order.
    Argb8888,
}

impl ColorFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            ColorFormat::Rgb555 | ColorFormat::Rgb565 => 2,
            ColorFormat::Rgb888 => 3,
            ColorFormat::Rgba8888 | ColorFormat::Bgra8888 | ColorFormat::Argb8888 => 4,
        }
    }

    /// Bytes needed for a whole frame.
    pub const fn frame_len(self) -> usize {
        SCREEN_WIDTH * SCREEN_HEIGHT * self.bytes_per_pixel()
    }

    /// Writes one pixel into `out`, which holds exactly `bytes_per_pixel`
    /// bytes.
    #[inline]
    fn pack(self, Color { r, g, b }: Color, out: &mut [u8]) {
        match self {
            ColorFormat::Rgb555 => {
                let value =
                    ((r as u16 >> 3) << 10) | ((g as u16 >> 3) << 5) | (b as u16 >> 3);
                out.copy_from_slice(&value.to_le_bytes());
            }
            ColorFormat::Rgb565 => {
                let value =
                    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
                out.copy_from_slice(&value.to_le_bytes());
            }
            ColorFormat::Rgb888 => out.copy_from_slice(&[r, g, b]),
            ColorFormat::Rgba8888 => out.copy_from_slice(&[r, g, b, 0xFF]),
            ColorFormat::Bgra8888 => out.copy_from_slice(&[b, g, r, 0xFF]),
            ColorFormat::Argb8888 => out.copy_from_slice(&[0xFF, r, g, b]),
        }
    }

    /// Converts palette indices into packed pixels. `out` must hold at least
    /// `indices.len() * bytes_per_pixel()` bytes.
    pub fn convert(self, indices: &[u8], out: &mut [u8]) {
        let bpp = self.bytes_per_pixel();
        for (&index, pixel) in indices.iter().zip(out.chunks_exact_mut(bpp)) {
            self.pack(NTSC_PALETTE[(index & 0x3F) as usize], pixel);
        }
    }
}

/// Front/back pair of index planes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameBuffer {
    planes: [Vec<u8>; 2],
    /// Index of the back (write) plane.
    back: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub const LEN: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

    pub fn new() -> Self {
        Self {
            planes: [vec![0; Self::LEN], vec![0; Self::LEN]],
            back: 0,
        }
    }

    pub fn clear(&mut self) {
        for plane in &mut self.planes {
            plane.fill(0);
        }
        self.back = 0;
    }

    #[inline]
    pub(crate) fn write(&mut self, x: usize, y: usize, index: u8) {
        self.planes[self.back][y * SCREEN_WIDTH + x] = index;
    }

    /// Publishes the back plane.
    pub(crate) fn swap(&mut self) {
        self.back ^= 1;
    }

    /// The last completed frame, one palette index per pixel, row-major.
    pub fn front(&self) -> &[u8] {
        &self.planes[self.back ^ 1]
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.back < self.planes.len() && self.planes.iter().all(|plane| plane.len() == Self::LEN)
    }
}
