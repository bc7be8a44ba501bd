use serde::{Deserialize, Serialize};

/// 16-bit left-shifting register used by the background pipeline.
///
/// Layout:
///   [ high 8 bits | low 8 bits ]
///
/// The high byte holds pixels on their way to the screen, the low byte the
/// next tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
struct Shift16(u16);

impl Shift16 {
    /// Replaces the low byte, keeping the pixels still in flight.
    #[inline]
    fn reload(&mut self, byte: u8) {
        self.0 = (self.0 & 0xFF00) | byte as u16;
    }

    /// Returns the bit at position `15 - fine_x`.
    ///
    /// Fine X selects which bit is visible rather than delaying the shifts.
    #[inline]
    fn bit_with_fine_x(&self, fine_x: u8) -> u8 {
        let shift = 15 - (fine_x & 0b111);
        ((self.0 >> shift) & 1) as u8
    }

    #[inline]
    fn shift(&mut self) {
        self.0 <<= 1;
    }
}

/// Background pixel pipeline: two pattern shifters and two palette shifters.
///
/// Every visible dot samples one bit of each shifter and advances all four.
/// Every 8 dots the low bytes are reloaded with the next tile's pattern row
/// and its attribute bits (replicated across the byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub(crate) struct BgPipeline {
    /// Background pattern bitplanes: [bitplane0, bitplane1].
    pattern: [Shift16; 2],
    /// Background palette bits: [palette_bit0, palette_bit1].
    palette: [Shift16; 2],
}

impl BgPipeline {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reloads the low bytes at a tile boundary.
    ///
    /// `tile_pattern` holds bitplane 0 and bitplane 1 of the tile row;
    /// `palette_index` is the 2-bit attribute palette.
    pub(crate) fn reload(&mut self, tile_pattern: [u8; 2], palette_index: u8) {
        for (shifter, pattern) in self.pattern.iter_mut().zip(tile_pattern) {
            shifter.reload(pattern);
        }
        for (i, shifter) in self.palette.iter_mut().enumerate() {
            let bit = (palette_index >> i) & 1;
            shifter.reload(if bit != 0 { 0xFF } else { 0x00 });
        }
    }

    /// Returns `(palette_bits, pattern_bits)` of the current pixel.
    pub(crate) fn sample(&self, fine_x: u8) -> (u8, u8) {
        let pattern_bit0 = self.pattern[0].bit_with_fine_x(fine_x);
        let pattern_bit1 = self.pattern[1].bit_with_fine_x(fine_x);
        let palette_bit0 = self.palette[0].bit_with_fine_x(fine_x);
        let palette_bit1 = self.palette[1].bit_with_fine_x(fine_x);

        (
            (palette_bit1 << 1) | palette_bit0,
            (pattern_bit1 << 1) | pattern_bit0,
        )
    }

    /// Advances all background shifters by one dot.
    pub(crate) fn shift(&mut self) {
        for i in 0..=1 {
            self.pattern[i].shift();
            self.palette[i].shift();
        }
    }
}
