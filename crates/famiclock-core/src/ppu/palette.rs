//! Palette RAM addressing and the built-in NTSC color table.

use crate::memory::ppu as ppu_mem;

/// An RGB triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Folds `$3F00-$3FFF` onto the 32 bytes of palette RAM. The backdrop
/// entries of the sprite palettes (`$3F10/14/18/1C`) alias the background
/// ones.
#[inline]
pub(crate) fn palette_index(addr: u16) -> usize {
    let index = (addr - ppu_mem::PALETTE_BASE) as usize & (ppu_mem::PALETTE_RAM_SIZE - 1);
    if index & 0x13 == 0x10 {
        index & 0x0F
    } else {
        index
    }
}

const fn c(r: u8, g: u8, b: u8) -> Color {
    Color::new(r, g, b)
}

/// The 2C02 output levels as RGB, indexed by 6-bit color number.
#[rustfmt::skip]
pub static NTSC_PALETTE: [Color; 64] = [
    c(0x54, 0x54, 0x54), c(0x00, 0x1E, 0x74), c(0x08, 0x10, 0x90), c(0x30, 0x00, 0x88),
    c(0x44, 0x00, 0x64), c(0x5C, 0x00, 0x30), c(0x54, 0x04, 0x00), c(0x3C, 0x18, 0x00),
    c(0x20, 0x2A, 0x00), c(0x08, 0x3A, 0x00), c(0x00, 0x40, 0x00), c(0x00, 0x3C, 0x00),
    c(0x00, 0x32, 0x3C), c(0x00, 0x00, 0x00), c(0x00, 0x00, 0x00), c(0x00, 0x00, 0x00),

    c(0x98, 0x96, 0x98), c(0x08, 0x4C, 0xC4), c(0x30, 0x32, 0xEC), c(0x5C, 0x1E, 0xE4),
    c(0x88, 0x14, 0xB0), c(0xA0, 0x14, 0x64), c(0x98, 0x22, 0x20), c(0x78, 0x3C, 0x00),
    c(0x54, 0x5A, 0x00), c(0x28, 0x72, 0x00), c(0x08, 0x7C, 0x00), c(0x00, 0x76, 0x28),
    c(0x00, 0x66, 0x78), c(0x00, 0x00, 0x00), c(0x00, 0x00, 0x00), c(0x00, 0x00, 0x00),

    c(0xEC, 0xEE, 0xEC), c(0x4C, 0x9A, 0xEC), c(0x78, 0x7C, 0xEC), c(0xB0, 0x62, 0xEC),
    c(0xE4, 0x54, 0xEC), c(0xEC, 0x58, 0xB4), c(0xEC, 0x6A, 0x64), c(0xD4, 0x88, 0x20),
    c(0xA0, 0xAA, 0x00), c(0x74, 0xC4, 0x00), c(0x4C, 0xD0, 0x20), c(0x38, 0xCC, 0x6C),
    c(0x38, 0xB4, 0xCC), c(0x3C, 0x3C, 0x3C), c(0x00, 0x00, 0x00), c(0x00, 0x00, 0x00),

    c(0xEC, 0xEE, 0xEC), c(0xA8, 0xCC, 0xEC), c(0xBC, 0xBC, 0xEC), c(0xD4, 0xB2, 0xEC),
    c(0xEC, 0xAE, 0xEC), c(0xEC, 0xAE, 0xD4), c(0xEC, 0xB4, 0xB0), c(0xE4, 0xC4, 0x90),
    c(0xCC, 0xD2, 0x78), c(0xB4, 0xDE, 0x78), c(0xA8, 0xE2, 0x90), c(0x98, 0xE2, 0xB4),
    c(0xA0, 0xD6, 0xE4), c(0xA0, 0xA2, 0xA0), c(0x00, 0x00, 0x00), c(0x00, 0x00, 0x00),
];
