//! Mapper 7 (AxROM): one 32 KiB PRG window and single-screen mirroring
//! chosen by bit 4 of the bank register.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cartridge::{
        chr_storage::ChrStorage,
        header::{Header, Mirroring},
        mapper::{Board, read_prg_bank, read_prg_ram, write_prg_ram},
    },
    memory::cpu as cpu_mem,
};

const PRG_BANK_SIZE_32K: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapper7State {
    pub prg_bank: u8,
    pub upper_screen: bool,
}

#[derive(Debug, Clone)]
pub struct Mapper7 {
    prg_rom: Box<[u8]>,
    prg_ram: Box<[u8]>,
    chr: ChrStorage,
    bus_conflicts: bool,
    prg_bank: u8,
    upper_screen: bool,
}

impl Mapper7 {
    pub fn new(header: &Header, prg_rom: Box<[u8]>, chr_rom: Box<[u8]>, prg_ram: Box<[u8]>) -> Self {
        Self {
            prg_rom,
            prg_ram,
            chr: ChrStorage::select(header, chr_rom),
            bus_conflicts: header.submapper == 2,
            prg_bank: 0,
            upper_screen: false,
        }
    }

    pub fn save_state(&self) -> Mapper7State {
        Mapper7State {
            prg_bank: self.prg_bank,
            upper_screen: self.upper_screen,
        }
    }

    pub fn load_state(&mut self, state: &Mapper7State) {
        self.prg_bank = state.prg_bank;
        self.upper_screen = state.upper_screen;
    }
}

impl Board for Mapper7 {
    fn cpu_read(&self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(read_prg_bank(
                &self.prg_rom,
                PRG_BANK_SIZE_32K,
                self.prg_bank as usize,
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
        self.prg_bank = value & 0x07;
        self.upper_screen = value & 0x10 != 0;
        debug!(
            bank = self.prg_bank,
            upper_screen = self.upper_screen,
            "AxROM bank select"
        );
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        self.chr.read(addr)
    }

    fn ppu_write(&mut self, addr: u16, data: u8) {
        self.chr.write(addr, data);
    }

    fn mirroring(&self) -> Mirroring {
        if self.upper_screen {
            Mirroring::SingleScreenUpper
        } else {
            Mirroring::SingleScreenLower
        }
    }

    fn power_on(&mut self) {
        self.prg_bank = 0;
        self.upper_screen = false;
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
