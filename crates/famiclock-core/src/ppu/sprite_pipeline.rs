use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::mem_block::MemBlock;

bitflags! {
    /// Attribute bits stored in sprite byte 2.
    ///
    /// Bit layout:
    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// V H P . . . p p
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub(crate) struct SpriteAttributes: u8 {
        const PALETTE = 0b0000_0011;
        /// Drawn behind opaque background pixels.
        const PRIORITY_BEHIND_BACKGROUND = 0b0010_0000;
        const FLIP_HORIZONTAL = 0b0100_0000;
        const FLIP_VERTICAL = 0b1000_0000;
    }
}

impl Default for SpriteAttributes {
    fn default() -> Self {
        Self::empty()
    }
}

impl SpriteAttributes {
    /// Bits 2-4 do not exist in OAM and read back as zero.
    pub(crate) const UNIMPLEMENTED_BITS: u8 = 0b0001_1100;
}

/// Pattern data fetched for one sprite during dots 257-320.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct FetchedSprite {
    pub(crate) attributes: u8,
    pub(crate) x: u8,
    pub(crate) pattern_low: u8,
    pub(crate) pattern_high: u8,
}

/// A single sprite slot for the current scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
struct SpriteSlot {
    /// Bitplane 0, shifted left once per dot after X expires.
    pattern_low: u8,
    pattern_high: u8,
    attributes: SpriteAttributes,
    /// Dots left before the sprite starts shifting out.
    x_counter: u8,
    /// Slot holds OAM sprite 0.
    sprite0: bool,
}

/// Sprite pixel produced for a single dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub(crate) struct SpritePixel {
    /// Sprite palette select (0..=3).
    pub(crate) palette: u8,
    /// Color within the palette (0 = transparent).
    pub(crate) color: u8,
    pub(crate) priority_behind_bg: bool,
    pub(crate) is_sprite0: bool,
}

type SpriteSlots = MemBlock<SpriteSlot, 8>;

/// Sprite output units for the current scanline: eight pattern shifter
/// pairs, each gated by an X down-counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct SpritePipeline {
    slots: SpriteSlots,
    active_count: u8,
}

impl Default for SpritePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SpritePipeline {
    pub(crate) fn new() -> Self {
        Self {
            slots: SpriteSlots::new(),
            active_count: 0,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.fill(SpriteSlot::default());
        self.active_count = 0;
    }

    /// Loads the sprites fetched for the next scanline. Horizontally flipped
    /// patterns are bit-reversed so shifting left always walks pixels left
    /// to right.
    pub(crate) fn load_scanline(&mut self, sprites: &[FetchedSprite], sprite0_in_range: bool) {
        self.clear();
        self.active_count = sprites.len().min(8) as u8;

        for (i, (slot, sprite)) in self.slots.iter_mut().zip(sprites).enumerate() {
            let attributes = SpriteAttributes::from_bits_retain(sprite.attributes);
            let (low, high) = if attributes.contains(SpriteAttributes::FLIP_HORIZONTAL) {
                (sprite.pattern_low.reverse_bits(), sprite.pattern_high.reverse_bits())
            } else {
                (sprite.pattern_low, sprite.pattern_high)
            };
            *slot = SpriteSlot {
                pattern_low: low,
                pattern_high: high,
                attributes,
                x_counter: sprite.x,
                sprite0: sprite0_in_range && i == 0,
            };
        }
    }

    /// Samples the current sprite pixel and advances active shifters by one
    /// dot. The first opaque slot wins.
    pub(crate) fn sample_and_shift(&mut self) -> SpritePixel {
        let mut chosen: Option<SpritePixel> = None;

        for slot in self.slots.iter_mut().take(self.active_count as usize) {
            if slot.x_counter > 0 {
                slot.x_counter -= 1;
                continue;
            }

            let bit0 = (slot.pattern_low >> 7) & 1;
            let bit1 = (slot.pattern_high >> 7) & 1;
            let color = (bit1 << 1) | bit0;

            if chosen.is_none() && color != 0 {
                chosen = Some(SpritePixel {
                    palette: slot.attributes.bits() & SpriteAttributes::PALETTE.bits(),
                    color,
                    priority_behind_bg: slot
                        .attributes
                        .contains(SpriteAttributes::PRIORITY_BEHIND_BACKGROUND),
                    is_sprite0: slot.sprite0,
                });
            }

            slot.pattern_low <<= 1;
            slot.pattern_high <<= 1;
        }

        chosen.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite(x: u8, attributes: u8, low: u8) -> FetchedSprite {
        FetchedSprite {
            attributes,
            x,
            pattern_low: low,
            pattern_high: 0,
        }
    }

    #[test]
    fn x_counter_delays_output() {
        let mut pipeline = SpritePipeline::new();
        pipeline.load_scanline(&[sprite(2, 0, 0x80)], true);
        let pixels: Vec<u8> = (0..4).map(|_| pipeline.sample_and_shift().color).collect();
        assert_eq!(pixels, [0, 0, 1, 0]);
    }

    #[test]
    fn horizontal_flip_reverses_the_row() {
        let mut pipeline = SpritePipeline::new();
        pipeline.load_scanline(&[sprite(0, 0x40, 0x01)], false);
        assert_eq!(pipeline.sample_and_shift().color, 1);
    }

    #[test]
    fn lower_slot_wins_and_flags_sprite_zero() {
        let mut pipeline = SpritePipeline::new();
        pipeline.load_scanline(&[sprite(0, 0x21, 0x80), sprite(0, 0x02, 0x80)], true);
        let pixel = pipeline.sample_and_shift();
        assert_eq!(pixel.palette, 1);
        assert!(pixel.priority_behind_bg);
        assert!(pixel.is_sprite0);
    }
}
