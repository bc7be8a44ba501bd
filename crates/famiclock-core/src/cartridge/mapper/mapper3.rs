//! Mapper 3 (CNROM): fixed PRG, 8 KiB CHR bank selected by any write to
//! `$8000-$FFFF`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cartridge::{
        chr_storage::ChrStorage,
        header::{Header, Mirroring},
        mapper::{Board, read_prg_ram, write_prg_ram},
    },
    memory::cpu as cpu_mem,
};

const CHR_BANK_SIZE_8K: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapper3State {
    pub chr_bank: u8,
}

#[derive(Debug, Clone)]
pub struct Mapper3 {
    prg_rom: Box<[u8]>,
    prg_ram: Box<[u8]>,
    chr: ChrStorage,
    mirroring: Mirroring,
    bus_conflicts: bool,
    chr_bank: u8,
}

impl Mapper3 {
    pub fn new(header: &Header, prg_rom: Box<[u8]>, chr_rom: Box<[u8]>, prg_ram: Box<[u8]>) -> Self {
        Self {
            prg_rom,
            prg_ram,
            chr: ChrStorage::select(header, chr_rom),
            mirroring: header.mirroring,
            bus_conflicts: header.submapper == 2,
            chr_bank: 0,
        }
    }

    pub fn save_state(&self) -> Mapper3State {
        Mapper3State {
            chr_bank: self.chr_bank,
        }
    }

    pub fn load_state(&mut self, state: &Mapper3State) {
        self.chr_bank = state.chr_bank;
    }
}

impl Board for Mapper3 {
    fn cpu_read(&self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END if !self.prg_rom.is_empty() => {
                let idx = (addr - cpu_mem::PRG_ROM_START) as usize % self.prg_rom.len();
                Some(self.prg_rom[idx])
            }
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
        self.chr_bank = value;
        debug!(bank = value, "CNROM CHR bank select");
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        self.chr
            .read_banked(CHR_BANK_SIZE_8K, self.chr_bank as usize, addr)
    }

    fn ppu_write(&mut self, addr: u16, data: u8) {
        self.chr
            .write_banked(CHR_BANK_SIZE_8K, self.chr_bank as usize, addr, data);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn power_on(&mut self) {
        self.chr_bank = 0;
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

    #[test]
    fn selects_8k_chr_bank() {
        let mut mapper = Mapper3::new(
            &header(3, 0x8000, 0x8000),
            banked_rom(0x8000, 0x4000),
            banked_rom(0x8000, CHR_BANK_SIZE_8K),
            Box::new([]),
        );
        assert_eq!(mapper.ppu_read(0x1FFF), 0);
        mapper.cpu_write(0x8000, 2, 0);
        assert_eq!(mapper.ppu_read(0x0000), 2);
        // Bank numbers wrap over the four banks present.
        mapper.cpu_write(0xFFFF, 5, 0);
        assert_eq!(mapper.ppu_read(0x0000), 1);
    }
}
