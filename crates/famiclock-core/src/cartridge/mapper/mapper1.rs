//! Mapper 1 (MMC1 / SxROM).
//!
//! Registers are loaded one bit at a time through a 5-bit shift register at
//! `$8000-$FFFF`; the fifth write commits the value to the register selected
//! by address bits 13-14. Writing a value with bit 7 set resets the shift
//! register and forces PRG mode 3.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cartridge::{
        chr_storage::ChrStorage,
        header::{Header, Mirroring},
        mapper::{Board, bank_count, read_prg_bank, read_prg_ram, write_prg_ram},
    },
    memory::cpu as cpu_mem,
};

const PRG_BANK_SIZE_16K: usize = 16 * 1024;
const CHR_BANK_SIZE_4K: usize = 4 * 1024;

/// Shift register value that marks "empty": the marker bit reaches bit 0 on
/// the fifth write.
const SHIFT_RESET: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapper1State {
    pub shift: u8,
    pub control: u8,
    pub chr_bank0: u8,
    pub chr_bank1: u8,
    pub prg_bank: u8,
    pub last_write_cycle: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Mapper1 {
    prg_rom: Box<[u8]>,
    prg_ram: Box<[u8]>,
    chr: ChrStorage,
    prg_banks: usize,

    shift: u8,
    control: u8,
    chr_bank0: u8,
    chr_bank1: u8,
    prg_bank: u8,
    /// Cycle of the previous serial write. MMC1 ignores a write landing on
    /// the cycle right after another (the second write of an RMW).
    last_write_cycle: Option<u64>,
}

impl Mapper1 {
    pub fn new(header: &Header, prg_rom: Box<[u8]>, chr_rom: Box<[u8]>, prg_ram: Box<[u8]>) -> Self {
        let prg_banks = bank_count(prg_rom.len(), PRG_BANK_SIZE_16K);
        let mut mapper = Self {
            prg_rom,
            prg_ram,
            chr: ChrStorage::select(header, chr_rom),
            prg_banks,
            shift: SHIFT_RESET,
            control: 0x0C,
            chr_bank0: 0,
            chr_bank1: 0,
            prg_bank: 0,
            last_write_cycle: None,
        };
        mapper.power_on();
        mapper
    }

    pub fn save_state(&self) -> Mapper1State {
        Mapper1State {
            shift: self.shift,
            control: self.control,
            chr_bank0: self.chr_bank0,
            chr_bank1: self.chr_bank1,
            prg_bank: self.prg_bank,
            last_write_cycle: self.last_write_cycle,
        }
    }

    pub fn load_state(&mut self, state: &Mapper1State) {
        self.shift = state.shift;
        self.control = state.control;
        self.chr_bank0 = state.chr_bank0;
        self.chr_bank1 = state.chr_bank1;
        self.prg_bank = state.prg_bank;
        self.last_write_cycle = state.last_write_cycle;
    }

    fn prg_ram_enabled(&self) -> bool {
        self.prg_bank & 0x10 == 0
    }

    fn prg_bank_for(&self, addr: u16) -> usize {
        let bank = (self.prg_bank & 0x0F) as usize;
        let upper = addr >= 0xC000;
        match (self.control >> 2) & 0b11 {
            // 32 KiB: low bit of the bank number is ignored.
            0 | 1 => (bank & !1) + upper as usize,
            // First bank fixed at $8000.
            2 => {
                if upper {
                    bank
                } else {
                    0
                }
            }
            // Last bank fixed at $C000.
            _ => {
                if upper {
                    self.prg_banks - 1
                } else {
                    bank
                }
            }
        }
    }

    fn chr_bank_for(&self, addr: u16) -> usize {
        if self.control & 0x10 == 0 {
            // 8 KiB mode: bank 0 selects an even/odd pair.
            (self.chr_bank0 & !1) as usize + (addr >= 0x1000) as usize
        } else if addr < 0x1000 {
            self.chr_bank0 as usize
        } else {
            self.chr_bank1 as usize
        }
    }

    fn write_serial(&mut self, addr: u16, data: u8, cpu_cycle: u64) {
        let back_to_back = self
            .last_write_cycle
            .is_some_and(|last| cpu_cycle == last.wrapping_add(1));
        self.last_write_cycle = Some(cpu_cycle);
        if back_to_back {
            return;
        }

        if data & 0x80 != 0 {
            self.shift = SHIFT_RESET;
            self.control |= 0x0C;
            return;
        }

        let complete = self.shift & 1 != 0;
        self.shift = (self.shift >> 1) | ((data & 1) << 4);
        if !complete {
            return;
        }

        let value = self.shift & 0x1F;
        match (addr >> 13) & 0b11 {
            0 => self.control = value,
            1 => self.chr_bank0 = value,
            2 => self.chr_bank1 = value,
            _ => self.prg_bank = value,
        }
        debug!(addr = format_args!("{addr:#06X}"), value, "MMC1 register write");
        self.shift = SHIFT_RESET;
    }
}

impl Board for Mapper1 {
    fn cpu_read(&self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(read_prg_bank(
                &self.prg_rom,
                PRG_BANK_SIZE_16K,
                self.prg_bank_for(addr),
                addr,
            )),
            _ if self.prg_ram_enabled() => read_prg_ram(&self.prg_ram, addr),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8, cpu_cycle: u64) {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => {
                self.write_serial(addr, data, cpu_cycle)
            }
            _ if self.prg_ram_enabled() => write_prg_ram(&mut self.prg_ram, addr, data),
            _ => {}
        }
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        self.chr
            .read_banked(CHR_BANK_SIZE_4K, self.chr_bank_for(addr), addr)
    }

    fn ppu_write(&mut self, addr: u16, data: u8) {
        let bank = self.chr_bank_for(addr);
        self.chr.write_banked(CHR_BANK_SIZE_4K, bank, addr, data);
    }

    fn mirroring(&self) -> Mirroring {
        match self.control & 0b11 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn power_on(&mut self) {
        self.shift = SHIFT_RESET;
        self.control = 0x0C;
        self.chr_bank0 = 0;
        self.chr_bank1 = 0;
        self.prg_bank = 0;
        self.last_write_cycle = None;
    }

    fn reset(&mut self) {
        // The reset line only clears the serial port.
        self.shift = SHIFT_RESET;
        self.control |= 0x0C;
    }

    fn prg_ram(&self) -> &[u8] {
        &self.prg_ram
    }

    fn prg_ram_mut(&mut self) -> &mut [u8] {
        &mut self.prg_ram
    }

    fn chr_ram(&self) -> Option<&[u8]> {
        self.chr.ram()
    }

    fn chr_ram_mut(&mut self) -> Option<&mut [u8]> {
        self.chr.ram_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::mapper::test_support::{banked_rom, header};

    fn mmc1(prg_size: usize) -> Mapper1 {
        Mapper1::new(
            &header(1, prg_size, 0x8000),
            banked_rom(prg_size, PRG_BANK_SIZE_16K),
            banked_rom(0x8000, CHR_BANK_SIZE_4K),
            vec![0; 0x2000].into_boxed_slice(),
        )
    }

    /// Five spaced-out serial writes.
    fn write_reg(mapper: &mut Mapper1, addr: u16, value: u8, cycle: &mut u64) {
        for i in 0..5 {
            mapper.cpu_write(addr, (value >> i) & 1, *cycle);
            *cycle += 4;
        }
    }

    #[test]
    fn powers_on_with_last_bank_fixed() {
        let mapper = mmc1(0x20000);
        assert_eq!(mapper.cpu_read(0x8000), Some(0));
        assert_eq!(mapper.cpu_read(0xFFFF), Some(7));
    }

    #[test]
    fn prg_modes_select_banks() {
        let mut mapper = mmc1(0x20000);
        let mut cycle = 0;

        write_reg(&mut mapper, 0xE000, 0x05, &mut cycle);
        assert_eq!(mapper.cpu_read(0x8000), Some(5));
        assert_eq!(mapper.cpu_read(0xC000), Some(7));

        // Mode 2: $8000 fixed to bank 0, $C000 switchable.
        write_reg(&mut mapper, 0x8000, 0b01000, &mut cycle);
        assert_eq!(mapper.cpu_read(0x8000), Some(0));
        assert_eq!(mapper.cpu_read(0xC000), Some(5));

        // Mode 0: 32 KiB, low bit dropped.
        write_reg(&mut mapper, 0x8000, 0b00000, &mut cycle);
        assert_eq!(mapper.cpu_read(0x8000), Some(4));
        assert_eq!(mapper.cpu_read(0xC000), Some(5));
        assert_eq!(mapper.mirroring(), Mirroring::SingleScreenLower);
    }

    #[test]
    fn consecutive_cycle_writes_are_ignored() {
        let mut mapper = mmc1(0x20000);
        // An RMW instruction writes twice on back-to-back cycles; only the
        // first write reaches the shift register.
        mapper.cpu_write(0xE000, 1, 10);
        mapper.cpu_write(0xE000, 0, 11);
        for (i, cycle) in (20..).step_by(3).take(4).enumerate() {
            mapper.cpu_write(0xE000, if i == 0 { 1 } else { 0 }, cycle);
        }
        assert_eq!(mapper.cpu_read(0x8000), Some(3));
    }

    #[test]
    fn reset_bit_clears_shift_register() {
        let mut mapper = mmc1(0x20000);
        let mut cycle = 0;
        mapper.cpu_write(0xE000, 1, cycle);
        cycle += 4;
        mapper.cpu_write(0xE000, 0x80, cycle);
        cycle += 4;
        write_reg(&mut mapper, 0xE000, 0x02, &mut cycle);
        assert_eq!(mapper.cpu_read(0x8000), Some(2));
    }

    #[test]
    fn chr_4k_mode_switches_halves_independently() {
        let mut mapper = mmc1(0x20000);
        let mut cycle = 0;
        write_reg(&mut mapper, 0x8000, 0b11100, &mut cycle);
        write_reg(&mut mapper, 0xA000, 3, &mut cycle);
        write_reg(&mut mapper, 0xC000, 6, &mut cycle);
        assert_eq!(mapper.ppu_read(0x0000), 3);
        assert_eq!(mapper.ppu_read(0x1000), 6);
    }

    #[test]
    fn prg_ram_disable_bit_floats_the_bus() {
        let mut mapper = mmc1(0x20000);
        let mut cycle = 0;
        mapper.cpu_write(0x6000, 0x11, cycle);
        write_reg(&mut mapper, 0xE000, 0x10, &mut cycle);
        assert_eq!(mapper.cpu_read(0x6000), None);
        write_reg(&mut mapper, 0xE000, 0x00, &mut cycle);
        assert_eq!(mapper.cpu_read(0x6000), Some(0x11));
    }
}
