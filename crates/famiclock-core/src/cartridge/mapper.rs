//! Cartridge boards.
//!
//! The set of supported circuits is fixed, so the board is a closed enum and
//! every call is a `match`. Each variant implements [`Board`]; the optional
//! capabilities (IRQ line, CPU clock hook, scanline notification) default to
//! no-ops.

use serde::{Deserialize, Serialize};

use super::{
    TRAINER_SIZE,
    header::{Header, Mirroring},
};
use crate::memory::cpu as cpu_mem;

pub mod mapper0;
pub mod mapper1;
pub mod mapper2;
pub mod mapper3;
pub mod mapper4;
pub mod mapper7;

pub use mapper0::Mapper0;
pub use mapper1::{Mapper1, Mapper1State};
pub use mapper2::{Mapper2, Mapper2State};
pub use mapper3::{Mapper3, Mapper3State};
pub use mapper4::{Mapper4, Mapper4State};
pub use mapper7::{Mapper7, Mapper7State};

/// Capability set every board provides to the bus and the PPU.
pub trait Board {
    /// CPU read in `$4020-$FFFF`. `None` leaves the data bus floating.
    fn cpu_read(&self, addr: u16) -> Option<u8>;

    /// CPU write in `$4020-$FFFF`. `cpu_cycle` lets boards that watch write
    /// spacing (MMC1) see back-to-back writes.
    fn cpu_write(&mut self, addr: u16, data: u8, cpu_cycle: u64);

    /// PPU pattern-table read (`$0000-$1FFF`).
    fn ppu_read(&self, addr: u16) -> u8;

    fn ppu_write(&mut self, addr: u16, data: u8);

    fn mirroring(&self) -> Mirroring;

    fn irq_pending(&self) -> bool {
        false
    }

    /// Called once per CPU cycle.
    fn cpu_clock(&mut self) {}

    /// Called by the PPU at dot 260 of each rendering scanline.
    fn notify_scanline(&mut self) {}

    /// Restores the power-on register values.
    fn power_on(&mut self);

    /// Console reset. Boards keep their bank state unless they say otherwise.
    fn reset(&mut self) {}

    fn prg_ram(&self) -> &[u8];

    fn prg_ram_mut(&mut self) -> &mut [u8];

    fn chr_ram(&self) -> Option<&[u8]>;

    fn chr_ram_mut(&mut self) -> Option<&mut [u8]>;
}

/// Every board the core can run.
#[derive(Debug, Clone)]
pub enum Mapper {
    Nrom(Mapper0),
    Mmc1(Mapper1),
    Uxrom(Mapper2),
    Cnrom(Mapper3),
    Mmc3(Mapper4),
    Axrom(Mapper7),
}

/// Register state of a board, ROM excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapperState {
    Nrom,
    Mmc1(Mapper1State),
    Uxrom(Mapper2State),
    Cnrom(Mapper3State),
    Mmc3(Mapper4State),
    Axrom(Mapper7State),
}

macro_rules! dispatch {
    ($self:expr, $board:ident => $body:expr) => {
        match $self {
            Mapper::Nrom($board) => $body,
            Mapper::Mmc1($board) => $body,
            Mapper::Uxrom($board) => $body,
            Mapper::Cnrom($board) => $body,
            Mapper::Mmc3($board) => $body,
            Mapper::Axrom($board) => $body,
        }
    };
}

impl Mapper {
    /// Builds the board named by the header, or `None` for an unknown id.
    pub fn new(
        header: &Header,
        prg_rom: Box<[u8]>,
        chr_rom: Box<[u8]>,
        trainer: Option<&[u8; TRAINER_SIZE]>,
    ) -> Option<Self> {
        let mut prg_ram = vec![0u8; header.prg_ram_size].into_boxed_slice();
        if let Some(trainer) = trainer
            && prg_ram.len() >= 0x1200
        {
            // Trainers load at $7000.
            prg_ram[0x1000..0x1200].copy_from_slice(trainer);
        }

        let mapper = match header.mapper {
            0 => Mapper::Nrom(Mapper0::new(header, prg_rom, chr_rom, prg_ram)),
            1 => Mapper::Mmc1(Mapper1::new(header, prg_rom, chr_rom, prg_ram)),
            2 => Mapper::Uxrom(Mapper2::new(header, prg_rom, chr_rom, prg_ram)),
            3 => Mapper::Cnrom(Mapper3::new(header, prg_rom, chr_rom, prg_ram)),
            4 => Mapper::Mmc3(Mapper4::new(header, prg_rom, chr_rom, prg_ram)),
            7 => Mapper::Axrom(Mapper7::new(header, prg_rom, chr_rom, prg_ram)),
            _ => return None,
        };
        Some(mapper)
    }

    /// iNES board number of the variant.
    pub fn id(&self) -> u16 {
        match self {
            Mapper::Nrom(_) => 0,
            Mapper::Mmc1(_) => 1,
            Mapper::Uxrom(_) => 2,
            Mapper::Cnrom(_) => 3,
            Mapper::Mmc3(_) => 4,
            Mapper::Axrom(_) => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mapper::Nrom(_) => "NROM",
            Mapper::Mmc1(_) => "MMC1",
            Mapper::Uxrom(_) => "UxROM",
            Mapper::Cnrom(_) => "CNROM",
            Mapper::Mmc3(_) => "MMC3",
            Mapper::Axrom(_) => "AxROM",
        }
    }

    pub fn save_state(&self) -> MapperState {
        match self {
            Mapper::Nrom(_) => MapperState::Nrom,
            Mapper::Mmc1(m) => MapperState::Mmc1(m.save_state()),
            Mapper::Uxrom(m) => MapperState::Uxrom(m.save_state()),
            Mapper::Cnrom(m) => MapperState::Cnrom(m.save_state()),
            Mapper::Mmc3(m) => MapperState::Mmc3(m.save_state()),
            Mapper::Axrom(m) => MapperState::Axrom(m.save_state()),
        }
    }

    /// Applies a register snapshot. Returns `false` when the snapshot belongs
    /// to another board, leaving the mapper untouched.
    pub fn load_state(&mut self, state: &MapperState) -> bool {
        match (self, state) {
            (Mapper::Nrom(_), MapperState::Nrom) => {}
            (Mapper::Mmc1(m), MapperState::Mmc1(s)) => m.load_state(s),
            (Mapper::Uxrom(m), MapperState::Uxrom(s)) => m.load_state(s),
            (Mapper::Cnrom(m), MapperState::Cnrom(s)) => m.load_state(s),
            (Mapper::Mmc3(m), MapperState::Mmc3(s)) => m.load_state(s),
            (Mapper::Axrom(m), MapperState::Axrom(s)) => m.load_state(s),
            _ => return false,
        }
        true
    }
}

impl Board for Mapper {
    fn cpu_read(&self, addr: u16) -> Option<u8> {
        dispatch!(self, board => board.cpu_read(addr))
    }

    fn cpu_write(&mut self, addr: u16, data: u8, cpu_cycle: u64) {
        dispatch!(self, board => board.cpu_write(addr, data, cpu_cycle))
    }

    fn ppu_read(&self, addr: u16) -> u8 {
        dispatch!(self, board => board.ppu_read(addr))
    }

    fn ppu_write(&mut self, addr: u16, data: u8) {
        dispatch!(self, board => board.ppu_write(addr, data))
    }

    fn mirroring(&self) -> Mirroring {
        dispatch!(self, board => board.mirroring())
    }

    fn irq_pending(&self) -> bool {
        dispatch!(self, board => board.irq_pending())
    }

    fn cpu_clock(&mut self) {
        dispatch!(self, board => board.cpu_clock())
    }

    fn notify_scanline(&mut self) {
        dispatch!(self, board => board.notify_scanline())
    }

    fn power_on(&mut self) {
        dispatch!(self, board => board.power_on())
    }

    fn reset(&mut self) {
        dispatch!(self, board => board.reset())
    }

    fn prg_ram(&self) -> &[u8] {
        dispatch!(self, board => board.prg_ram())
    }

    fn prg_ram_mut(&mut self) -> &mut [u8] {
        dispatch!(self, board => board.prg_ram_mut())
    }

    fn chr_ram(&self) -> Option<&[u8]> {
        dispatch!(self, board => board.chr_ram())
    }

    fn chr_ram_mut(&mut self) -> Option<&mut [u8]> {
        dispatch!(self, board => board.chr_ram_mut())
    }
}

/// Reads `addr` from a PRG ROM bank of `bank_size` bytes. Bank numbers wrap
/// modulo the banks present.
pub(crate) fn read_prg_bank(prg_rom: &[u8], bank_size: usize, bank: usize, addr: u16) -> u8 {
    if prg_rom.is_empty() {
        return 0;
    }
    let bank_count = (prg_rom.len() / bank_size).max(1);
    let idx = (bank % bank_count) * bank_size + (addr as usize % bank_size);
    prg_rom[idx % prg_rom.len()]
}

/// Number of `bank_size` banks in `len` bytes, never zero.
pub(crate) fn bank_count(len: usize, bank_size: usize) -> usize {
    (len / bank_size).max(1)
}

pub(crate) fn read_prg_ram(prg_ram: &[u8], addr: u16) -> Option<u8> {
    if prg_ram.is_empty() || !(cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END).contains(&addr) {
        return None;
    }
    let idx = (addr - cpu_mem::PRG_RAM_START) as usize % prg_ram.len();
    Some(prg_ram[idx])
}

pub(crate) fn write_prg_ram(prg_ram: &mut [u8], addr: u16, data: u8) {
    if prg_ram.is_empty() || !(cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END).contains(&addr) {
        return;
    }
    let idx = (addr - cpu_mem::PRG_RAM_START) as usize % prg_ram.len();
    prg_ram[idx] = data;
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::cartridge::header::{Header, Mirroring, RomFormat};

    pub(crate) fn header(mapper: u16, prg_rom_size: usize, chr_rom_size: usize) -> Header {
        Header {
            format: RomFormat::INes,
            mapper,
            submapper: 0,
            mirroring: Mirroring::Horizontal,
            battery: false,
            trainer: false,
            prg_rom_size,
            chr_rom_size,
            prg_ram_size: 8 * 1024,
            chr_ram_size: if chr_rom_size == 0 { 8 * 1024 } else { 0 },
        }
    }

    /// PRG ROM whose every byte holds the number of its `bank_size` bank.
    pub(crate) fn banked_rom(size: usize, bank_size: usize) -> Box<[u8]> {
        (0..size)
            .map(|i| (i / bank_size) as u8)
            .collect::<Vec<_>>()
            .into_boxed_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_support::{banked_rom, header};

    #[test]
    fn unknown_board_is_rejected() {
        let header = header(5, 0x8000, 0x2000);
        let mapper = Mapper::new(&header, banked_rom(0x8000, 0x4000), banked_rom(0x2000, 0x400), None);
        assert!(mapper.is_none());
    }

    #[test]
    fn state_of_another_board_is_refused() {
        let header = header(2, 0x20000, 0);
        let mut mapper = Mapper::new(&header, banked_rom(0x20000, 0x4000), Box::new([]), None)
            .expect("uxrom");
        assert!(!mapper.load_state(&MapperState::Nrom));
        assert_eq!(mapper.id(), 2);
    }

    proptest! {
        #[test]
        fn any_register_write_keeps_reads_inside_rom(
            id in prop::sample::select(vec![0u16, 1, 2, 3, 4, 7]),
            writes in prop::collection::vec((0x8000u16..=0xFFFF, any::<u8>()), 0..64),
            read_addr in 0x8000u16..=0xFFFF,
        ) {
            // 48 KiB of PRG is not a power of two, so naive masking would overrun.
            let header = header(id, 0xC000, 0x6000);
            let mut mapper = Mapper::new(
                &header,
                banked_rom(0xC000, 0x2000),
                banked_rom(0x6000, 0x400),
                None,
            ).expect("supported board");
            for (cycle, (addr, data)) in writes.into_iter().enumerate() {
                mapper.cpu_write(addr, data, cycle as u64 * 2);
            }
            let value = mapper.cpu_read(read_addr).expect("PRG ROM always drives the bus");
            prop_assert!(value < 6);
            prop_assert!(mapper.ppu_read(read_addr & 0x1FFF) < 24);
        }
    }
}
