//! 2C02 picture processing unit.
//!
//! The PPU is stepped one dot at a time by the scheduler, three dots per CPU
//! cycle. A frame is 262 scanlines of 341 dots:
//!
//! - `0..=239` visible lines, one pixel per dot on dots `1..=256`;
//! - `240` post-render (idle);
//! - `241..=260` vertical blank, the flag rises on `(241, 1)`;
//! - `261` pre-render, which clears the flags on dot 1 and reloads the
//!   vertical scroll on dots `280..=304`.
//!
//! With rendering enabled the pre-render line of every odd frame is one dot
//! shorter. The background and sprite units follow the hardware fetch
//! schedule closely enough for mid-frame register writes and scanline-counting
//! mappers to see the accesses at the dots they expect.

pub mod buffer;
pub mod palette;
pub mod pattern_bus;

mod background_pipeline;
mod registers;
mod sprite_pipeline;

use core::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    mem_block::ppu::{Ciram, PaletteRam, SecondaryOamRam},
    memory::ppu::{self as ppu_mem, Register as PpuRegister},
};
use background_pipeline::BgPipeline;
use buffer::FrameBuffer;
use palette::palette_index;
use pattern_bus::PatternBus;
use registers::{Mask, Registers, Status};
use sprite_pipeline::{FetchedSprite, SpriteAttributes, SpritePixel, SpritePipeline};

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;

pub const DOTS_PER_SCANLINE: u16 = 341;
pub const SCANLINES_PER_FRAME: u16 = 262;

const VISIBLE_SCANLINES: u16 = SCREEN_HEIGHT as u16;
const VBLANK_SCANLINE: u16 = 241;
const PRE_RENDER_SCANLINE: u16 = 261;
/// Dot on which scanline-counting boards are notified (the first sprite
/// pattern fetch from `$1000` on a typical setup).
const SCANLINE_NOTIFY_DOT: u16 = 260;

/// Latches filled by the background fetches of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
struct TileFetch {
    nametable: u8,
    /// Two-bit palette select, already shifted out of the attribute byte.
    attribute: u8,
    pattern_low: u8,
    pattern_high: u8,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ppu {
    registers: Registers,
    /// Nametable RAM. Mirroring is resolved through the cartridge on every
    /// access.
    ciram: Ciram,
    palette_ram: PaletteRam,
    /// Sprites picked for the next scanline.
    secondary_oam: SecondaryOamRam,
    sprite_count: u8,
    /// OAM sprite 0 made it into secondary OAM.
    sprite0_next: bool,
    bg: BgPipeline,
    sprites: SpritePipeline,
    fetch: TileFetch,
    /// Next scanline to process.
    scanline: u16,
    /// Next dot to process.
    dot: u16,
    /// Completed frames (counted at the start of vblank).
    frame: u64,
    odd_frame: bool,
    /// A `$2002` read landed one dot before vblank starts.
    suppress_vblank: bool,
    frame_buffer: FrameBuffer,
}

impl fmt::Debug for Ppu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ppu")
            .field("registers", &self.registers.vram)
            .field("control", &self.registers.control)
            .field("mask", &self.registers.mask)
            .field("status", &self.registers.status)
            .field("scanline", &self.scanline)
            .field("dot", &self.dot)
            .field("frame", &self.frame)
            .field("odd_frame", &self.odd_frame)
            .finish()
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            registers: Registers::new(),
            ciram: Ciram::new(),
            palette_ram: PaletteRam::new(),
            secondary_oam: SecondaryOamRam::filled(0xFF),
            sprite_count: 0,
            sprite0_next: false,
            bg: BgPipeline::new(),
            sprites: SpritePipeline::new(),
            fetch: TileFetch::default(),
            scanline: 0,
            dot: 0,
            frame: 0,
            odd_frame: false,
            suppress_vblank: false,
            frame_buffer: FrameBuffer::new(),
        }
    }

    /// Cold boot: memories cleared, counters back at `(0, 0)`.
    pub fn power_on(&mut self) {
        *self = Self::new();
    }

    /// Reset button. The CPU-facing registers are cleared while OAM, CIRAM,
    /// palette RAM and the status flags keep their contents.
    pub fn reset(&mut self) {
        self.registers.reset();
        self.bg = BgPipeline::new();
        self.sprites.clear();
        self.sprite_count = 0;
        self.sprite0_next = false;
        self.fetch = TileFetch::default();
        self.scanline = 0;
        self.dot = 0;
        self.odd_frame = false;
        self.suppress_vblank = false;
    }

    /// Range-checks state restored from a snapshot.
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.scanline >= SCANLINES_PER_FRAME || self.dot >= DOTS_PER_SCANLINE {
            return Err("PPU position outside the frame");
        }
        if usize::from(self.sprite_count) * 4 > self.secondary_oam.len() {
            return Err("PPU sprite count out of range");
        }
        if !self.frame_buffer.is_well_formed() {
            return Err("PPU frame buffer has the wrong shape");
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_position(&mut self, scanline: u16, dot: u16) {
        self.scanline = scanline;
        self.dot = dot;
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// The last completed picture as 6-bit palette indices.
    pub fn frame_buffer(&self) -> &[u8] {
        self.frame_buffer.front()
    }

    pub fn oam(&self) -> &[u8] {
        &self.registers.oam
    }

    /// Level of the `/NMI` output.
    pub fn nmi_line(&self) -> bool {
        self.registers.status.contains(Status::VERTICAL_BLANK) && self.registers.control.nmi_enabled()
    }

    fn rendering_enabled(&self) -> bool {
        self.registers.mask.rendering_enabled()
    }

    /// Rendering is on and the PPU is walking a line that fetches.
    fn rendering_active(&self) -> bool {
        self.rendering_enabled()
            && (self.scanline < VISIBLE_SCANLINES || self.scanline == PRE_RENDER_SCANLINE)
    }

    /// Processes one dot.
    pub fn step(&mut self, bus: &mut PatternBus<'_>) {
        let scanline = self.scanline;
        let dot = self.dot;
        let visible = scanline < VISIBLE_SCANLINES;
        let pre_render = scanline == PRE_RENDER_SCANLINE;
        let rendering = self.rendering_enabled();

        if rendering && (visible || pre_render) {
            self.background_dot(bus, dot, pre_render);
            self.sprite_dot(bus, dot, pre_render);
            if dot == SCANLINE_NOTIFY_DOT {
                bus.notify_scanline();
            }
        }

        if visible && (1..=SCREEN_WIDTH as u16).contains(&dot) {
            self.render_pixel(dot as usize - 1, scanline as usize);
        }

        match (scanline, dot) {
            (VBLANK_SCANLINE, 1) => {
                if !self.suppress_vblank {
                    self.registers.status.insert(Status::VERTICAL_BLANK);
                }
                self.suppress_vblank = false;
                self.frame_buffer.swap();
                self.frame += 1;
                trace!(frame = self.frame, "vblank");
            }
            (PRE_RENDER_SCANLINE, 1) => {
                self.registers.status.remove(
                    Status::VERTICAL_BLANK | Status::SPRITE_ZERO_HIT | Status::SPRITE_OVERFLOW,
                );
            }
            _ => {}
        }

        self.advance(rendering);
    }

    fn advance(&mut self, rendering: bool) {
        if rendering && self.odd_frame && self.scanline == PRE_RENDER_SCANLINE && self.dot == 339 {
            // Dot 340 of the pre-render line is skipped on odd frames.
            self.start_frame();
            return;
        }
        self.dot += 1;
        if self.dot == DOTS_PER_SCANLINE {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline == SCANLINES_PER_FRAME {
                self.start_frame();
            }
        }
    }

    fn start_frame(&mut self) {
        self.scanline = 0;
        self.dot = 0;
        self.odd_frame = !self.odd_frame;
    }

    fn background_dot(&mut self, bus: &PatternBus<'_>, dot: u16, pre_render: bool) {
        if (2..=257).contains(&dot) || (322..=337).contains(&dot) {
            self.bg.shift();
            if (dot - 1) % 8 == 0 {
                self.bg.reload(
                    [self.fetch.pattern_low, self.fetch.pattern_high],
                    self.fetch.attribute,
                );
            }
        }

        if (1..=256).contains(&dot) || (321..=336).contains(&dot) {
            let v = self.registers.vram.v;
            match (dot - 1) % 8 {
                0 => self.fetch.nametable = self.read_memory(bus, v.tile_addr()),
                2 => {
                    let byte = self.read_memory(bus, v.attribute_addr());
                    self.fetch.attribute = (byte >> v.attribute_shift()) & 0b11;
                }
                4 => self.fetch.pattern_low = bus.read(self.background_pattern_addr()),
                6 => self.fetch.pattern_high = bus.read(self.background_pattern_addr() + 8),
                7 => self.registers.vram.v.increment_x(),
                _ => {}
            }
        }

        match dot {
            256 => self.registers.vram.v.increment_y(),
            257 => {
                let t = self.registers.vram.t;
                self.registers.vram.v.copy_horizontal(t);
            }
            280..=304 if pre_render => {
                let t = self.registers.vram.t;
                self.registers.vram.v.copy_vertical(t);
            }
            // Unused nametable fetches that close the line.
            338 | 340 => {
                let _ = self.read_memory(bus, self.registers.vram.v.tile_addr());
            }
            _ => {}
        }
    }

    fn background_pattern_addr(&self) -> u16 {
        self.registers.control.background_pattern_table()
            + u16::from(self.fetch.nametable) * 16
            + u16::from(self.registers.vram.v.fine_y())
    }

    fn sprite_dot(&mut self, bus: &PatternBus<'_>, dot: u16, pre_render: bool) {
        if (257..=320).contains(&dot) {
            self.registers.oam_addr = 0;
        }
        match dot {
            257 if !pre_render => self.evaluate_sprites(),
            320 if pre_render => {
                // Nothing is evaluated for line 0.
                self.sprites.clear();
                self.sprite_count = 0;
                self.sprite0_next = false;
            }
            320 => self.fetch_sprites(bus),
            _ => {}
        }
    }

    /// Copies up to eight sprites in range of the next line into secondary
    /// OAM. After the eighth hit the scan keeps going with the buggy diagonal
    /// walk that sets the overflow flag on false positives and misses.
    fn evaluate_sprites(&mut self) {
        let line = self.scanline;
        let height = self.registers.control.sprite_height();
        let in_range = |y: u8| line.wrapping_sub(u16::from(y)) < height;

        self.secondary_oam.fill(0xFF);
        let oam = &self.registers.oam;
        let mut count = 0usize;
        let mut sprite0 = false;
        let mut n = 0usize;
        let mut m = 0usize;

        while n < 64 {
            if count < 8 {
                let base = n * 4;
                if in_range(oam[base]) {
                    self.secondary_oam[count * 4..count * 4 + 4].copy_from_slice(&oam[base..base + 4]);
                    sprite0 |= n == 0;
                    count += 1;
                }
                n += 1;
            } else {
                if in_range(oam[n * 4 + m]) {
                    self.registers.status.insert(Status::SPRITE_OVERFLOW);
                    break;
                }
                n += 1;
                m = (m + 1) & 3;
            }
        }

        self.sprite_count = count as u8;
        self.sprite0_next = sprite0;
    }

    fn fetch_sprites(&mut self, bus: &PatternBus<'_>) {
        let height = self.registers.control.sprite_height();
        let mut fetched = [FetchedSprite::default(); 8];
        let count = self.sprite_count as usize;

        for (i, slot) in fetched.iter_mut().enumerate().take(count) {
            let entry = &self.secondary_oam[i * 4..i * 4 + 4];
            let (y, tile, attributes, x) = (entry[0], entry[1], entry[2], entry[3]);

            let mut row = self.scanline.wrapping_sub(u16::from(y)) & (height - 1);
            if SpriteAttributes::from_bits_retain(attributes).contains(SpriteAttributes::FLIP_VERTICAL) {
                row = height - 1 - row;
            }
            let addr = if height == 16 {
                let table = if tile & 1 != 0 {
                    ppu_mem::PATTERN_TABLE_1
                } else {
                    ppu_mem::PATTERN_TABLE_0
                };
                let tile = u16::from(tile & 0xFE) + (row >> 3);
                table + tile * 16 + (row & 7)
            } else {
                self.registers.control.sprite_pattern_table() + u16::from(tile) * 16 + row
            };

            *slot = FetchedSprite {
                attributes,
                x,
                pattern_low: bus.read(addr),
                pattern_high: bus.read(addr + 8),
            };
        }

        self.sprites.load_scanline(&fetched[..count], self.sprite0_next);
    }

    fn render_pixel(&mut self, x: usize, y: usize) {
        let mask = self.registers.mask;

        let color = if mask.rendering_enabled() {
            let (bg_palette, bg_color) = if mask.background_visible_at(x) {
                self.bg.sample(self.registers.vram.x)
            } else {
                (0, 0)
            };
            let sprite = self.sprites.sample_and_shift();
            let sprite = if mask.sprites_visible_at(x) {
                sprite
            } else {
                SpritePixel::default()
            };

            if sprite.is_sprite0 && sprite.color != 0 && bg_color != 0 && x != 255 {
                self.registers.status.insert(Status::SPRITE_ZERO_HIT);
            }

            let index = match (bg_color, sprite.color) {
                (0, 0) => 0,
                (0, _) => 0x10 | (sprite.palette << 2) | sprite.color,
                (_, 0) => (bg_palette << 2) | bg_color,
                _ if sprite.priority_behind_bg => (bg_palette << 2) | bg_color,
                _ => 0x10 | (sprite.palette << 2) | sprite.color,
            };
            self.palette_ram[palette_index(ppu_mem::PALETTE_BASE | u16::from(index))]
        } else {
            // Forced blank shows the backdrop, or the entry `v` points at
            // when it sits in palette space.
            let v = self.registers.vram.v.raw() & ppu_mem::VRAM_MIRROR_MASK;
            if v >= ppu_mem::PALETTE_BASE {
                self.palette_ram[palette_index(v)]
            } else {
                self.palette_ram[0]
            }
        };

        let mut color = color & 0x3F;
        if mask.contains(Mask::GRAYSCALE) {
            color &= 0x30;
        }
        self.frame_buffer.write(x, y, color);
    }

    /// CPU read of a register (`$2000-$3FFF`, already folded).
    pub fn cpu_read(&mut self, register: PpuRegister, bus: &mut PatternBus<'_>) -> u8 {
        let value = match register {
            PpuRegister::Status => self.read_status(),
            PpuRegister::OamData => self.oam_data(),
            PpuRegister::Data => self.read_vram_data(bus),
            // Write-only registers float the latch.
            _ => self.registers.io_latch,
        };
        self.registers.io_latch = value;
        value
    }

    /// CPU write of a register.
    pub fn cpu_write(&mut self, register: PpuRegister, value: u8, bus: &mut PatternBus<'_>) {
        self.registers.io_latch = value;
        match register {
            PpuRegister::Control => self.registers.write_control(value),
            PpuRegister::Mask => self.registers.mask = Mask::from_bits_retain(value),
            PpuRegister::Status => {}
            PpuRegister::OamAddr => self.registers.oam_addr = value,
            PpuRegister::OamData => self.write_oam_data(value),
            PpuRegister::Scroll => self.registers.vram.write_scroll(value),
            PpuRegister::Addr => self.registers.vram.write_addr(value),
            PpuRegister::Data => {
                let addr = self.registers.vram.v.raw() & ppu_mem::VRAM_MIRROR_MASK;
                self.write_memory(bus, addr, value);
                self.increment_vram_addr();
            }
        }
    }

    /// Register value a read would return, without touching any state.
    pub fn peek(&self, register: PpuRegister) -> u8 {
        match register {
            PpuRegister::Status => self.status_bits(),
            PpuRegister::OamData => self.oam_data(),
            PpuRegister::Data => {
                let addr = self.registers.vram.v.raw() & ppu_mem::VRAM_MIRROR_MASK;
                if addr >= ppu_mem::PALETTE_BASE {
                    self.palette_data(addr)
                } else {
                    self.registers.vram_buffer
                }
            }
            _ => self.registers.io_latch,
        }
    }

    fn status_bits(&self) -> u8 {
        (self.registers.status.bits() & 0xE0) | (self.registers.io_latch & 0x1F)
    }

    fn read_status(&mut self) -> u8 {
        let value = self.status_bits();
        self.registers.status.remove(Status::VERTICAL_BLANK);
        self.registers.vram.reset_latch();
        if self.scanline == VBLANK_SCANLINE && self.dot == 1 {
            self.suppress_vblank = true;
        }
        value
    }

    fn oam_data(&self) -> u8 {
        let addr = self.registers.oam_addr;
        let value = self.registers.oam[addr as usize];
        if addr & 0b11 == 2 {
            value & !SpriteAttributes::UNIMPLEMENTED_BITS
        } else {
            value
        }
    }

    fn write_oam_data(&mut self, value: u8) {
        if self.rendering_active() {
            // Only the glitchy address bump reaches OAM mid-render.
            self.registers.oam_addr = self.registers.oam_addr.wrapping_add(4);
            return;
        }
        self.registers.oam[self.registers.oam_addr as usize] = value;
        self.registers.oam_addr = self.registers.oam_addr.wrapping_add(1);
    }

    fn palette_data(&self, addr: u16) -> u8 {
        (self.palette_ram[palette_index(addr)] & 0x3F) | (self.registers.io_latch & 0xC0)
    }

    fn read_vram_data(&mut self, bus: &PatternBus<'_>) -> u8 {
        let addr = self.registers.vram.v.raw() & ppu_mem::VRAM_MIRROR_MASK;
        let value = if addr >= ppu_mem::PALETTE_BASE {
            // The buffer picks up the nametable byte underneath the palette.
            self.registers.vram_buffer = self.read_memory(bus, addr - 0x1000);
            self.palette_data(addr)
        } else {
            let buffered = self.registers.vram_buffer;
            self.registers.vram_buffer = self.read_memory(bus, addr);
            buffered
        };
        self.increment_vram_addr();
        value
    }

    fn increment_vram_addr(&mut self) {
        if self.rendering_active() {
            // The copy of the scroll counters used during rendering gets both
            // coarse increments instead.
            self.registers.vram.v.increment_x();
            self.registers.vram.v.increment_y();
        } else {
            let step = self.registers.control.vram_increment();
            self.registers.vram.v.increment(step);
        }
    }

    fn read_memory(&self, bus: &PatternBus<'_>, addr: u16) -> u8 {
        let addr = addr & ppu_mem::VRAM_MIRROR_MASK;
        match addr {
            0..=ppu_mem::PATTERN_TABLE_END => bus.read(addr),
            ppu_mem::NAMETABLE_BASE..=ppu_mem::NAMETABLE_END => {
                self.ciram[bus.mirroring().ciram_offset(addr)]
            }
            _ => self.palette_ram[palette_index(addr)],
        }
    }

    fn write_memory(&mut self, bus: &mut PatternBus<'_>, addr: u16, value: u8) {
        match addr {
            0..=ppu_mem::PATTERN_TABLE_END => bus.write(addr, value),
            ppu_mem::NAMETABLE_BASE..=ppu_mem::NAMETABLE_END => {
                self.ciram[bus.mirroring().ciram_offset(addr)] = value;
            }
            _ => self.palette_ram[palette_index(addr)] = value,
        }
    }
}
