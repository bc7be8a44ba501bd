//! CPU-visible PPU register state and the internal `v/t/x/w` latches.

mod control;
mod mask;
mod status;
mod vram_addr;

use serde::{Deserialize, Serialize};

pub(crate) use control::Control;
pub(crate) use mask::Mask;
pub(crate) use status::Status;
pub(crate) use vram_addr::VramAddr;

use crate::mem_block::ppu::OamRam;

/// Internal VRAM register block matching the NESDev `v/t/x/w` terminology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub(crate) struct VramRegisters {
    /// Current VRAM address (`v`).
    pub(crate) v: VramAddr,
    /// Temporary VRAM address (`t`).
    pub(crate) t: VramAddr,
    /// Fine X scroll (`x`, 0..7).
    pub(crate) x: u8,
    /// Write toggle (`w`): false => first write, true => second write.
    pub(crate) w: bool,
}

impl VramRegisters {
    /// `$2005` (PPUSCROLL).
    pub(crate) fn write_scroll(&mut self, value: u8) {
        if !self.w {
            self.t.set_coarse_x(value >> 3);
            self.x = value & 0b111;
        } else {
            self.t.set_coarse_y(value >> 3);
            self.t.set_fine_y(value & 0b111);
        }
        self.w = !self.w;
    }

    /// `$2006` (PPUADDR). The second write copies `t` into `v`.
    pub(crate) fn write_addr(&mut self, value: u8) {
        if !self.w {
            let hi = u16::from(value & 0b0011_1111) << 8;
            let lo = self.t.raw() & 0x00FF;
            self.t.set_raw(hi | lo);
        } else {
            let hi = self.t.raw() & 0x7F00;
            self.t.set_raw(hi | u16::from(value));
            self.v = self.t;
        }
        self.w = !self.w;
    }

    pub(crate) fn reset_latch(&mut self) {
        self.w = false;
    }
}

/// Aggregates the state of all CPU visible PPU registers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct Registers {
    pub(crate) control: Control,
    pub(crate) mask: Mask,
    pub(crate) status: Status,
    /// Current OAM pointer driven by `$2003`/`$2004`.
    pub(crate) oam_addr: u8,
    /// Primary sprite memory accessible through `$2004`.
    pub(crate) oam: OamRam,
    pub(crate) vram: VramRegisters,
    /// Delayed `$2007` read buffer.
    pub(crate) vram_buffer: u8,
    /// Last value driven on the PPU data bus by the CPU. Write-only registers
    /// and the undriven status bits read back from here.
    pub(crate) io_latch: u8,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    pub(crate) fn new() -> Self {
        Self {
            control: Control::default(),
            mask: Mask::default(),
            status: Status::default(),
            oam_addr: 0,
            oam: OamRam::new(),
            vram: VramRegisters::default(),
            vram_buffer: 0,
            io_latch: 0,
        }
    }

    /// Warm reset: clears control, mask, scroll latches and the read buffer.
    /// OAM and status survive.
    pub(crate) fn reset(&mut self) {
        self.control = Control::default();
        self.mask = Mask::default();
        self.vram = VramRegisters::default();
        self.vram_buffer = 0;
        self.io_latch = 0;
    }

    /// Updates control, also syncing the nametable bits into `t`.
    pub(crate) fn write_control(&mut self, value: u8) {
        self.control = Control::from_bits_retain(value);
        self.vram.t.set_nametable(self.control.nametable_index());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_and_addr_share_the_write_toggle() {
        let mut regs = VramRegisters::default();
        regs.write_scroll(0b1010_1101);
        assert_eq!(regs.x, 0b101);
        assert_eq!(regs.t.coarse_x(), 0b10101);
        assert!(regs.w);
        regs.write_addr(0x23);
        assert!(!regs.w);
        assert_eq!(regs.t.raw() & 0x00FF, 0x23);
        assert_eq!(regs.v.raw(), regs.t.raw());
    }

    #[test]
    fn addr_high_byte_is_clipped_to_six_bits() {
        let mut regs = VramRegisters::default();
        regs.write_addr(0xFF);
        regs.write_addr(0x00);
        assert_eq!(regs.v.raw(), 0x3F00);
    }
}
