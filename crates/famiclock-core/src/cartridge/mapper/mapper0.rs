//! Mapper 0 (NROM): no banking at all.
//!
//! - `$6000-$7FFF`: work RAM (the header decides the size, 8 KiB for iNES).
//! - `$8000-$FFFF`: 16 KiB (mirrored twice) or 32 KiB of PRG ROM.
//! - PPU `$0000-$1FFF`: 8 KiB CHR ROM or RAM.

use crate::{
    cartridge::{
        chr_storage::ChrStorage,
        header::{Header, Mirroring},
        mapper::{Board, read_prg_ram, write_prg_ram},
    },
    memory::cpu as cpu_mem,
};

#[derive(Debug, Clone)]
pub struct Mapper0 {
    prg_rom: Box<[u8]>,
    prg_ram: Box<[u8]>,
    chr: ChrStorage,
    mirroring: Mirroring,
}

impl Mapper0 {
    pub fn new(header: &Header, prg_rom: Box<[u8]>, chr_rom: Box<[u8]>, prg_ram: Box<[u8]>) -> Self {
        Self {
            prg_rom,
            prg_ram,
            chr: ChrStorage::select(header, chr_rom),
            mirroring: header.mirroring,
        }
    }
}

impl Board for Mapper0 {
    fn cpu_read(&self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END if !self.prg_rom.is_empty() => {
                // The modulo folds NROM-128 onto both halves.
                let idx = (addr - cpu_mem::PRG_ROM_START) as usize % self.prg_rom.len();
                Some(self.prg_rom[idx])
            }
            _ => read_prg_ram(&self.prg_ram, addr),
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8, _cpu_cycle: u64) {
        write_prg_ram(&mut self.prg_ram, addr, data);
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

    fn power_on(&mut self) {}

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
