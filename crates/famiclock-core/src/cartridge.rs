use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::cartridge::{
    header::{Header, Mirroring, NES_HEADER_LEN},
    mapper::{Board, Mapper, MapperState},
};

pub const TRAINER_SIZE: usize = 512;

mod chr_storage;
pub mod header;
pub mod mapper;

/// Errors raised while turning an image into a [`Cartridge`].
#[derive(Debug, Error)]
pub enum Error {
    /// Provided buffer is shorter than the 16-byte header.
    #[error("header expected {NES_HEADER_LEN} bytes, got {actual}")]
    TooShort { actual: usize },
    /// Magic number ("NES<EOF>") is missing.
    #[error("missing NES magic bytes")]
    InvalidMagic,
    /// A ROM section (trainer/PRG/CHR) is shorter than advertised.
    #[error("{section} section expected {expected} bytes, got {actual}")]
    SectionTooShort {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported mapper {mapper}")]
    UnsupportedMapper { mapper: u16 },
}

/// Writable part of a cartridge: board registers plus PRG/CHR RAM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartridgeState {
    pub mapper: MapperState,
    pub prg_ram: Vec<u8>,
    pub chr_ram: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct Cartridge {
    header: Header,
    mapper: Mapper,
    checksum: u32,
}

impl Cartridge {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn mapper_mut(&mut self) -> &mut Mapper {
        &mut self.mapper
    }

    /// CRC-32 of the complete image, header included.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn cpu_read(&self, addr: u16) -> Option<u8> {
        self.mapper.cpu_read(addr)
    }

    pub fn cpu_write(&mut self, addr: u16, data: u8, cpu_cycle: u64) {
        self.mapper.cpu_write(addr, data, cpu_cycle);
    }

    pub fn ppu_read(&self, addr: u16) -> u8 {
        self.mapper.ppu_read(addr)
    }

    pub fn ppu_write(&mut self, addr: u16, data: u8) {
        self.mapper.ppu_write(addr, data);
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending()
    }

    pub fn cpu_clock(&mut self) {
        self.mapper.cpu_clock();
    }

    pub fn notify_scanline(&mut self) {
        self.mapper.notify_scanline();
    }

    pub fn power_on(&mut self) {
        self.mapper.power_on();
    }

    pub fn reset(&mut self) {
        self.mapper.reset();
    }

    /// Battery-backed work RAM, if the header declares a battery.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.header.battery.then(|| self.mapper.prg_ram())
    }

    /// Overwrites battery RAM with `data`. Extra bytes are ignored, missing
    /// bytes leave the tail untouched. Returns `false` without a battery.
    pub fn load_battery_ram(&mut self, data: &[u8]) -> bool {
        if !self.header.battery {
            return false;
        }
        let ram = self.mapper.prg_ram_mut();
        let len = ram.len().min(data.len());
        ram[..len].copy_from_slice(&data[..len]);
        true
    }

    pub fn save_state(&self) -> CartridgeState {
        CartridgeState {
            mapper: self.mapper.save_state(),
            prg_ram: self.mapper.prg_ram().to_vec(),
            chr_ram: self.mapper.chr_ram().map(<[u8]>::to_vec),
        }
    }

    /// Whether `state` can be applied to this board without loss.
    pub fn accepts_state(&self, state: &CartridgeState) -> bool {
        let mapper_matches = matches!(
            (&self.mapper, &state.mapper),
            (Mapper::Nrom(_), MapperState::Nrom)
                | (Mapper::Mmc1(_), MapperState::Mmc1(_))
                | (Mapper::Uxrom(_), MapperState::Uxrom(_))
                | (Mapper::Cnrom(_), MapperState::Cnrom(_))
                | (Mapper::Mmc3(_), MapperState::Mmc3(_))
                | (Mapper::Axrom(_), MapperState::Axrom(_))
        );
        mapper_matches
            && state.prg_ram.len() == self.mapper.prg_ram().len()
            && state.chr_ram.as_ref().map(Vec::len) == self.mapper.chr_ram().map(<[u8]>::len)
    }

    /// Applies a snapshot previously checked with [`Self::accepts_state`].
    pub(crate) fn load_state(&mut self, state: &CartridgeState) {
        if !self.accepts_state(state) {
            return;
        }
        self.mapper.load_state(&state.mapper);
        self.mapper.prg_ram_mut().copy_from_slice(&state.prg_ram);
        if let (Some(dst), Some(src)) = (self.mapper.chr_ram_mut(), state.chr_ram.as_ref()) {
            dst.copy_from_slice(src);
        }
    }
}

/// Loads a cartridge from an in-memory image.
pub fn load_cartridge(bytes: &[u8]) -> Result<Cartridge, Error> {
    let header_bytes = bytes.get(..NES_HEADER_LEN).ok_or(Error::TooShort {
        actual: bytes.len(),
    })?;
    let header = Header::parse(header_bytes)?;
    let (trainer, prg_rom, chr_rom) = slice_sections(bytes, &header)?;

    let mapper = Mapper::new(&header, prg_rom, chr_rom, trainer.as_ref())
        .ok_or(Error::UnsupportedMapper {
            mapper: header.mapper,
        })?;
    let checksum = crc32fast::hash(bytes);

    info!(
        mapper = mapper.name(),
        prg_rom = header.prg_rom_size,
        chr_rom = header.chr_rom_size,
        battery = header.battery,
        crc32 = format_args!("{checksum:08X}"),
        "cartridge loaded"
    );

    Ok(Cartridge {
        header,
        mapper,
        checksum,
    })
}

type Sections = (Option<[u8; TRAINER_SIZE]>, Box<[u8]>, Box<[u8]>);

fn slice_sections(bytes: &[u8], header: &Header) -> Result<Sections, Error> {
    let mut cursor = NES_HEADER_LEN;
    let trainer = if header.trainer {
        let slice = section(bytes, &mut cursor, TRAINER_SIZE, "trainer")?;
        let mut trainer = [0u8; TRAINER_SIZE];
        trainer.copy_from_slice(slice);
        Some(trainer)
    } else {
        None
    };

    let prg_rom = section(bytes, &mut cursor, header.prg_rom_size, "PRG ROM")?;
    let chr_rom = section(bytes, &mut cursor, header.chr_rom_size, "CHR ROM")?;

    Ok((trainer, prg_rom.into(), chr_rom.into()))
}

fn section<'a>(
    bytes: &'a [u8],
    cursor: &mut usize,
    len: usize,
    name: &'static str,
) -> Result<&'a [u8], Error> {
    let too_short = || Error::SectionTooShort {
        section: name,
        expected: len,
        actual: bytes.len().saturating_sub(*cursor),
    };
    let end = cursor.checked_add(len).ok_or_else(too_short)?;
    let slice = bytes.get(*cursor..end).ok_or_else(too_short)?;
    *cursor = end;
    Ok(slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::cpu as cpu_mem;

    fn base_header(prg_banks: u8, chr_banks: u8, flags6: u8) -> [u8; NES_HEADER_LEN] {
        [
            b'N', b'E', b'S', 0x1A, prg_banks, chr_banks, flags6, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ]
    }

    #[test]
    fn loads_basic_nrom_cartridge() {
        let mut rom = base_header(1, 1, 0).to_vec();
        rom.extend(vec![0xAA; 16 * 1024]);
        rom.extend(vec![0x55; 8 * 1024]);

        let cartridge = load_cartridge(&rom).expect("parse cartridge");

        assert_eq!(cartridge.header().prg_rom_size, 16 * 1024);
        assert_eq!(cartridge.cpu_read(cpu_mem::PRG_ROM_START), Some(0xAA));
        assert_eq!(cartridge.ppu_read(0x0000), 0x55);
        assert_eq!(cartridge.checksum(), crc32fast::hash(&rom));
        assert!(cartridge.battery_ram().is_none());
    }

    #[test]
    fn loads_cartridge_with_trainer() {
        let mut rom = base_header(1, 0, 0b0000_0100).to_vec();
        rom.extend(vec![0xFE; TRAINER_SIZE]);
        rom.extend(vec![0xAA; 16 * 1024]);

        let cartridge = load_cartridge(&rom).expect("parse cartridge");

        assert!(cartridge.header().trainer);
        assert_eq!(cartridge.cpu_read(cpu_mem::PRG_ROM_START), Some(0xAA));
        assert_eq!(cartridge.cpu_read(0x7000), Some(0xFE));
    }

    #[test]
    fn errors_when_prg_section_missing() {
        let mut rom = base_header(1, 0, 0).to_vec();
        rom.extend(vec![0xAA; 1024]);

        let err = load_cartridge(&rom).expect_err("should fail");
        assert!(matches!(
            err,
            Error::SectionTooShort {
                section: "PRG ROM",
                expected: 16384,
                actual: 1024
            }
        ));
    }

    #[test]
    fn rejects_unknown_mapper() {
        let mut rom = base_header(1, 1, 0x50).to_vec();
        rom.extend(vec![0; 24 * 1024]);
        let err = load_cartridge(&rom).expect_err("mapper 5 is not built in");
        assert!(matches!(err, Error::UnsupportedMapper { mapper: 5 }));
        assert_eq!(err.to_string(), "unsupported mapper 5");
    }

    #[test]
    fn battery_ram_round_trips() {
        let mut rom = base_header(2, 0, 0b0000_0010).to_vec();
        rom.extend(vec![0; 32 * 1024]);
        let mut cartridge = load_cartridge(&rom).expect("parse cartridge");

        assert!(cartridge.load_battery_ram(&[1, 2, 3]));
        assert_eq!(cartridge.cpu_read(0x6002), Some(3));
        assert_eq!(cartridge.battery_ram().map(|ram| ram.len()), Some(8 * 1024));
    }

    #[test]
    fn state_restores_ram_and_registers() {
        let mut rom = base_header(8, 0, 0x20).to_vec();
        rom.extend(vec![0; 128 * 1024]);
        let mut cartridge = load_cartridge(&rom).expect("uxrom");

        cartridge.cpu_write(0x8000, 3, 0);
        cartridge.ppu_write(0x0123, 0x77);
        let saved = cartridge.save_state();

        cartridge.power_on();
        cartridge.ppu_write(0x0123, 0);
        assert!(cartridge.accepts_state(&saved));
        cartridge.load_state(&saved);
        assert_eq!(cartridge.ppu_read(0x0123), 0x77);
        assert_eq!(cartridge.save_state(), saved);
    }
}
