//! Mapper 2 (UxROM): switchable 16 KiB bank at `$8000`, last bank fixed at
//! `$C000`, 8 KiB CHR RAM.

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapper2State {
    pub bank_select: u8,
}

#[derive(Debug, Clone)]
pub struct Mapper2 {
    prg_rom: Box<[u8]>,
    prg_ram: Box<[u8]>,
    chr: ChrStorage,
    mirroring: Mirroring,
    prg_banks: usize,
    /// Submapper 2 boards AND the written value with the ROM byte.
    bus_conflicts: bool,
    bank_select: u8,
}

impl Mapper2 {
    pub fn new(header: &Header, prg_rom: Box<[u8]>, chr_rom: Box<[u8]>, prg_ram: Box<[u8]>) -> Self {
        Self {
            prg_banks: bank_count(prg_rom.len(), PRG_BANK_SIZE_16K),
            prg_rom,
            prg_ram,
            chr: ChrStorage::select(header, chr_rom),
            mirroring: header.mirroring,
            bus_conflicts: header.submapper == 2,
            bank_select: 0,
        }
    }

    pub fn save_state(&self) -> Mapper2State {
        Mapper2State {
            bank_select: self.bank_select,
        }
    }

    pub fn load_state(&mut self, state: &Mapper2State) {
        self.bank_select = state.bank_select;
    }
}

impl Board for Mapper2 {
    fn cpu_read(&self, addr: u16) -> Option<u8> {
        match addr {
            0x8000..=0xBFFF => Some(read_prg_bank(
                &self.prg_rom,
                PRG_BANK_SIZE_16K,
                self.bank_select as usize,
                addr,
            )),
            0xC000..=cpu_mem::CPU_ADDR_END => Some(read_prg_bank(
                &self.prg_rom,
                PRG_BANK_SIZE_16K,
                self.prg_banks - 1,
                addr,
            )),
            _ => read_prg_ram(&self.prg_ram, addr),
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8, _cpu_cycle: u64) {
        if addr < cpu_mem::PRG_ROM_START {
            write_prg_ram(&mut self.prg_ram, addr, data);
            return;
        }
        let value = if self.bus_conflicts {
            data & self.cpu_read(addr).unwrap_or(0xFF)
        } else {
            data
        };
        self.bank_select = value;
        debug!(bank = value, "UxROM bank select");
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        self.chr.read(addr)
    }

    fn ppu_write(&mut self, addr: u16, data: u8) {
        self.chr.write(addr, data);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn power_on(&mut self) {
        self.bank_select = 0;
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
