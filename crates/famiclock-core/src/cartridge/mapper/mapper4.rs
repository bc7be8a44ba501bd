//! Mapper 4 (MMC3 / TxROM).
//!
//! | Area | Address range | Behaviour                                          |
//! |------|---------------|----------------------------------------------------|
//! | CPU  | `$6000-$7FFF` | PRG RAM with enable and write-protect bits         |
//! | CPU  | `$8000-$9FFF` | 8 KiB PRG window, bank select / bank data          |
//! | CPU  | `$A000-$BFFF` | 8 KiB PRG window, mirroring / PRG RAM protect      |
//! | CPU  | `$C000-$DFFF` | 8 KiB PRG window, IRQ latch / IRQ reload           |
//! | CPU  | `$E000-$FFFF` | Last 8 KiB PRG bank, IRQ disable / IRQ enable      |
//! | PPU  | `$0000-$1FFF` | 2x2 KiB + 4x1 KiB CHR banks, optionally swapped    |
//!
//! The scanline counter is clocked by the PPU once per rendered line (the
//! point where sprite pattern fetches raise A12 with the usual `$1000`
//! sprite table).

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    cartridge::{
        chr_storage::ChrStorage,
        header::{Header, Mirroring},
        mapper::{Board, bank_count, read_prg_bank},
    },
    memory::cpu as cpu_mem,
};

const PRG_BANK_SIZE_8K: usize = 8 * 1024;
const CHR_BANK_SIZE_1K: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mmc3Register {
    BankSelect,
    BankData,
    Mirroring,
    PrgRamProtect,
    IrqLatch,
    IrqReload,
    IrqDisable,
    IrqEnable,
}

impl Mmc3Register {
    fn from_addr(addr: u16) -> Option<Self> {
        use Mmc3Register::*;

        let even = addr & 1 == 0;
        let reg = match addr {
            0x8000..=0x9FFF => if even { BankSelect } else { BankData },
            0xA000..=0xBFFF => if even { Mirroring } else { PrgRamProtect },
            0xC000..=0xDFFF => if even { IrqLatch } else { IrqReload },
            0xE000..=0xFFFF => if even { IrqDisable } else { IrqEnable },
            _ => return None,
        };
        Some(reg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapper4State {
    pub bank_select: u8,
    pub bank_regs: [u8; 8],
    pub mirroring: Mirroring,
    pub prg_ram_enable: bool,
    pub prg_ram_write_protect: bool,
    pub irq_latch: u8,
    pub irq_counter: u8,
    pub irq_reload: bool,
    pub irq_enabled: bool,
    pub irq_pending: bool,
}

#[derive(Debug, Clone)]
pub struct Mapper4 {
    prg_rom: Box<[u8]>,
    prg_ram: Box<[u8]>,
    chr: ChrStorage,
    prg_banks: usize,
    /// Four-screen boards ignore `$A000`.
    four_screen: bool,
    mirroring: Mirroring,

    /// `$8000`: bits 0-2 pick the target of the next `$8001` write, bit 6
    /// swaps the PRG windows, bit 7 swaps the CHR halves.
    bank_select: u8,
    /// R0-R5 select CHR banks, R6-R7 select PRG banks.
    bank_regs: [u8; 8],

    prg_ram_enable: bool,
    prg_ram_write_protect: bool,

    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,
}

impl Mapper4 {
    pub fn new(header: &Header, prg_rom: Box<[u8]>, chr_rom: Box<[u8]>, prg_ram: Box<[u8]>) -> Self {
        let mut mapper = Self {
            prg_banks: bank_count(prg_rom.len(), PRG_BANK_SIZE_8K),
            prg_rom,
            prg_ram,
            chr: ChrStorage::select(header, chr_rom),
            four_screen: header.mirroring == Mirroring::FourScreen,
            mirroring: header.mirroring,
            bank_select: 0,
            bank_regs: [0; 8],
            prg_ram_enable: false,
            prg_ram_write_protect: false,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
        };
        mapper.power_on();
        mapper
    }

    pub fn save_state(&self) -> Mapper4State {
        Mapper4State {
            bank_select: self.bank_select,
            bank_regs: self.bank_regs,
            mirroring: self.mirroring,
            prg_ram_enable: self.prg_ram_enable,
            prg_ram_write_protect: self.prg_ram_write_protect,
            irq_latch: self.irq_latch,
            irq_counter: self.irq_counter,
            irq_reload: self.irq_reload,
            irq_enabled: self.irq_enabled,
            irq_pending: self.irq_pending,
        }
    }

    pub fn load_state(&mut self, state: &Mapper4State) {
        self.bank_select = state.bank_select;
        self.bank_regs = state.bank_regs;
        self.mirroring = state.mirroring;
        self.prg_ram_enable = state.prg_ram_enable;
        self.prg_ram_write_protect = state.prg_ram_write_protect;
        self.irq_latch = state.irq_latch;
        self.irq_counter = state.irq_counter;
        self.irq_reload = state.irq_reload;
        self.irq_enabled = state.irq_enabled;
        self.irq_pending = state.irq_pending;
    }

    fn prg_swap_at_c000(&self) -> bool {
        self.bank_select & 0x40 != 0
    }

    fn chr_invert(&self) -> bool {
        self.bank_select & 0x80 != 0
    }

    fn prg_bank_for(&self, addr: u16) -> usize {
        let second_last = self.prg_banks.saturating_sub(2);
        let r6 = self.bank_regs[6] as usize & 0x3F;
        let r7 = self.bank_regs[7] as usize & 0x3F;
        match ((addr - cpu_mem::PRG_ROM_START) / 0x2000, self.prg_swap_at_c000()) {
            (0, false) | (2, true) => r6,
            (0, true) | (2, false) => second_last,
            (1, _) => r7,
            _ => self.prg_banks - 1,
        }
    }

    /// 1 KiB CHR bank that backs `addr`.
    fn chr_bank_for(&self, addr: u16) -> usize {
        let mut addr = addr & 0x1FFF;
        if self.chr_invert() {
            addr ^= 0x1000;
        }
        let slot = (addr / 0x0400) as usize;
        match slot {
            // R0/R1 are 2 KiB banks; the low bit is ignored.
            0 | 1 => (self.bank_regs[0] & !1) as usize + slot,
            2 | 3 => (self.bank_regs[1] & !1) as usize + (slot - 2),
            _ => self.bank_regs[slot - 2] as usize,
        }
    }

    fn prg_ram_index(&self, addr: u16) -> Option<usize> {
        if !self.prg_ram_enable
            || self.prg_ram.is_empty()
            || !(cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END).contains(&addr)
        {
            return None;
        }
        Some((addr - cpu_mem::PRG_RAM_START) as usize % self.prg_ram.len())
    }

    fn write_register(&mut self, reg: Mmc3Register, data: u8) {
        match reg {
            Mmc3Register::BankSelect => self.bank_select = data,
            Mmc3Register::BankData => {
                let index = (self.bank_select & 0x07) as usize;
                self.bank_regs[index] = data;
                debug!(index, bank = data, "MMC3 bank data");
            }
            Mmc3Register::Mirroring => {
                if !self.four_screen {
                    self.mirroring = if data & 1 == 0 {
                        Mirroring::Vertical
                    } else {
                        Mirroring::Horizontal
                    };
                }
            }
            Mmc3Register::PrgRamProtect => {
                self.prg_ram_enable = data & 0x80 != 0;
                self.prg_ram_write_protect = data & 0x40 != 0;
            }
            Mmc3Register::IrqLatch => self.irq_latch = data,
            Mmc3Register::IrqReload => {
                self.irq_counter = 0;
                self.irq_reload = true;
            }
            Mmc3Register::IrqDisable => {
                self.irq_enabled = false;
                self.irq_pending = false;
            }
            Mmc3Register::IrqEnable => self.irq_enabled = true,
        }
    }
}

impl Board for Mapper4 {
    fn cpu_read(&self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(read_prg_bank(
                &self.prg_rom,
                PRG_BANK_SIZE_8K,
                self.prg_bank_for(addr),
                addr,
            )),
            _ => self.prg_ram_index(addr).map(|idx| self.prg_ram[idx]),
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8, _cpu_cycle: u64) {
        if let Some(reg) = Mmc3Register::from_addr(addr) {
            self.write_register(reg, data);
        } else if !self.prg_ram_write_protect
            && let Some(idx) = self.prg_ram_index(addr)
        {
            self.prg_ram[idx] = data;
        }
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        self.chr
            .read_banked(CHR_BANK_SIZE_1K, self.chr_bank_for(addr), addr)
    }

    fn ppu_write(&mut self, addr: u16, data: u8) {
        let bank = self.chr_bank_for(addr);
        self.chr.write_banked(CHR_BANK_SIZE_1K, bank, addr, data);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn notify_scanline(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            trace!("MMC3 IRQ asserted");
            self.irq_pending = true;
        }
    }

    fn power_on(&mut self) {
        self.bank_select = 0;
        // Hardware powers up with unknown banks; this layout boots the usual
        // reset vector from the fixed last bank.
        self.bank_regs = [0, 2, 4, 5, 6, 7, 0, 1];
        if !self.four_screen {
            self.mirroring = Mirroring::Vertical;
        }
        self.prg_ram_enable = true;
        self.prg_ram_write_protect = false;
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_reload = false;
        self.irq_enabled = false;
        self.irq_pending = false;
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

    fn mmc3() -> Mapper4 {
        Mapper4::new(
            &header(4, 0x20000, 0x20000),
            banked_rom(0x20000, PRG_BANK_SIZE_8K),
            banked_rom(0x20000, CHR_BANK_SIZE_1K),
            vec![0; 0x2000].into_boxed_slice(),
        )
    }

    #[test]
    fn prg_mode_swaps_fixed_window() {
        let mut mapper = mmc3();
        mapper.cpu_write(0x8000, 6, 0);
        mapper.cpu_write(0x8001, 3, 0);
        assert_eq!(mapper.cpu_read(0x8000), Some(3));
        assert_eq!(mapper.cpu_read(0xC000), Some(14));
        assert_eq!(mapper.cpu_read(0xE000), Some(15));

        mapper.cpu_write(0x8000, 0x46, 0);
        assert_eq!(mapper.cpu_read(0x8000), Some(14));
        assert_eq!(mapper.cpu_read(0xC000), Some(3));
    }

    #[test]
    fn chr_inversion_swaps_pattern_halves() {
        let mut mapper = mmc3();
        mapper.cpu_write(0x8000, 0, 0);
        mapper.cpu_write(0x8001, 9, 0);
        mapper.cpu_write(0x8000, 2, 0);
        mapper.cpu_write(0x8001, 20, 0);
        // R0 ignores its low bit.
        assert_eq!(mapper.ppu_read(0x0000), 8);
        assert_eq!(mapper.ppu_read(0x0400), 9);
        assert_eq!(mapper.ppu_read(0x1000), 20);

        mapper.cpu_write(0x8000, 0x80, 0);
        assert_eq!(mapper.ppu_read(0x1000), 8);
        assert_eq!(mapper.ppu_read(0x0000), 20);
    }

    #[test]
    fn scanline_counter_raises_irq() {
        let mut mapper = mmc3();
        mapper.cpu_write(0xC000, 2, 0);
        mapper.cpu_write(0xC001, 0, 0);
        mapper.cpu_write(0xE001, 0, 0);

        mapper.notify_scanline(); // reload -> 2
        assert!(!mapper.irq_pending());
        mapper.notify_scanline(); // 1
        assert!(!mapper.irq_pending());
        mapper.notify_scanline(); // 0
        assert!(mapper.irq_pending());

        mapper.cpu_write(0xE000, 0, 0);
        assert!(!mapper.irq_pending());
        mapper.notify_scanline(); // reload from 0 -> 2
        assert!(!mapper.irq_pending());
    }

    #[test]
    fn prg_ram_protect_blocks_writes() {
        let mut mapper = mmc3();
        mapper.cpu_write(0x6000, 0x55, 0);
        assert_eq!(mapper.cpu_read(0x6000), Some(0x55));
        mapper.cpu_write(0xA001, 0xC0, 0);
        mapper.cpu_write(0x6000, 0x66, 0);
        assert_eq!(mapper.cpu_read(0x6000), Some(0x55));
        mapper.cpu_write(0xA001, 0x00, 0);
        assert_eq!(mapper.cpu_read(0x6000), None);
    }

    #[test]
    fn mirroring_register() {
        let mut mapper = mmc3();
        mapper.cpu_write(0xA000, 1, 0);
        assert_eq!(mapper.mirroring(), Mirroring::Horizontal);
        mapper.cpu_write(0xA000, 0, 0);
        assert_eq!(mapper.mirroring(), Mirroring::Vertical);
    }
}
