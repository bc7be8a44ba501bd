//! The 16-byte header that precedes every cartridge image.
//!
//! Both the original iNES layout and the NES 2.0 extension are understood.
//! The parser only extracts what the core needs to build a board: section
//! sizes, the mapper number and the wiring of the nametables.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::Error;

const NES_MAGIC: &[u8; 4] = b"NES\x1A";

pub const NES_HEADER_LEN: usize = 16;
pub const PRG_ROM_UNIT: usize = 16 * 1024;
pub const CHR_ROM_UNIT: usize = 8 * 1024;
pub const PRG_RAM_UNIT: usize = 8 * 1024;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Flags6: u8 {
        const MIRRORING   = 0b0000_0001;
        const BATTERY     = 0b0000_0010;
        const TRAINER     = 0b0000_0100;
        const FOUR_SCREEN = 0b0000_1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct Flags7: u8 {
        const NES2_DETECTION = 0b0000_1100;
    }
}

/// How the four logical nametables map onto nametable RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mirroring {
    /// `$2000`/`$2400` share a page, `$2800`/`$2C00` share the other.
    Horizontal,
    /// `$2000`/`$2800` share a page, `$2400`/`$2C00` share the other.
    Vertical,
    /// Four independent pages.
    FourScreen,
    /// Every nametable shows the first page.
    SingleScreenLower,
    /// Every nametable shows the second page.
    SingleScreenUpper,
}

impl Mirroring {
    /// Resolves a PPU nametable address (`$2000-$3EFF`) to an offset in
    /// nametable RAM.
    pub fn ciram_offset(self, addr: u16) -> usize {
        let addr = (addr - 0x2000) & 0x0FFF;
        let table = (addr / 0x0400) as usize;
        let offset = (addr & 0x03FF) as usize;
        let page = match self {
            Mirroring::Horizontal => table >> 1,
            Mirroring::Vertical => table & 1,
            Mirroring::FourScreen => table,
            Mirroring::SingleScreenLower => 0,
            Mirroring::SingleScreenUpper => 1,
        };
        page * 0x0400 + offset
    }
}

/// Header flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RomFormat {
    INes,
    Nes20,
}

/// Parsed cartridge header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    pub format: RomFormat,
    /// Board number (0 = NROM, 1 = MMC1, ...).
    pub mapper: u16,
    /// NES 2.0 submapper; 0 for iNES images.
    pub submapper: u8,
    pub mirroring: Mirroring,
    /// Cartridge keeps PRG RAM alive with a battery.
    pub battery: bool,
    /// A 512-byte trainer sits between the header and PRG ROM.
    pub trainer: bool,
    pub prg_rom_size: usize,
    pub chr_rom_size: usize,
    /// Work RAM mapped at `$6000-$7FFF` (volatile plus battery-backed).
    pub prg_ram_size: usize,
    /// CHR RAM supplied when the board carries no CHR ROM.
    pub chr_ram_size: usize,
}

impl Header {
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < NES_HEADER_LEN {
            return Err(Error::TooShort {
                actual: bytes.len(),
            });
        }
        if &bytes[0..4] != NES_MAGIC {
            return Err(Error::InvalidMagic);
        }

        let flags6 = Flags6::from_bits_truncate(bytes[6]);
        let flags7 = Flags7::from_bits_truncate(bytes[7]);

        if flags7.bits() & Flags7::NES2_DETECTION.bits() == 0b1000 {
            Ok(Self::parse_nes20(bytes, flags6))
        } else {
            Ok(Self::parse_ines(bytes, flags6))
        }
    }

    fn parse_ines(bytes: &[u8], flags6: Flags6) -> Self {
        let prg_rom_units = bytes[4] as usize;
        let chr_rom_units = bytes[5] as usize;
        // Byte 8 is unreliable in old dumps; zero means the usual 8 KiB.
        let prg_ram_units = (bytes[8] as usize).max(1);

        // DiskDude! and similar rippers scribble ASCII into bytes 12-15,
        // which corrupts the upper mapper nibble.
        let dirty_tail = bytes[12..16].iter().any(|b| *b != 0);
        let upper = if dirty_tail { 0 } else { bytes[7] & 0xF0 };

        Self {
            format: RomFormat::INes,
            mapper: (upper | (bytes[6] >> 4)) as u16,
            submapper: 0,
            mirroring: resolve_mirroring(flags6),
            battery: flags6.contains(Flags6::BATTERY),
            trainer: flags6.contains(Flags6::TRAINER),
            prg_rom_size: prg_rom_units * PRG_ROM_UNIT,
            chr_rom_size: chr_rom_units * CHR_ROM_UNIT,
            prg_ram_size: prg_ram_units * PRG_RAM_UNIT,
            chr_ram_size: if chr_rom_units == 0 { CHR_ROM_UNIT } else { 0 },
        }
    }

    fn parse_nes20(bytes: &[u8], flags6: Flags6) -> Self {
        let prg_msb = (bytes[9] & 0x0F) as usize;
        let chr_msb = (bytes[9] >> 4) as usize;
        let prg_rom_size = ((prg_msb << 8) | bytes[4] as usize) * PRG_ROM_UNIT;
        let chr_rom_size = ((chr_msb << 8) | bytes[5] as usize) * CHR_ROM_UNIT;

        let mapper = ((bytes[8] & 0x0F) as u16) << 8
            | (bytes[7] & 0xF0) as u16
            | (bytes[6] >> 4) as u16;

        let prg_ram_size = shift_size(bytes[10] & 0x0F) + shift_size(bytes[10] >> 4);
        let chr_ram_size = shift_size(bytes[11] & 0x0F) + shift_size(bytes[11] >> 4);

        Self {
            format: RomFormat::Nes20,
            mapper,
            submapper: bytes[8] >> 4,
            mirroring: resolve_mirroring(flags6),
            battery: flags6.contains(Flags6::BATTERY) || bytes[10] >> 4 != 0,
            trainer: flags6.contains(Flags6::TRAINER),
            prg_rom_size,
            chr_rom_size,
            prg_ram_size,
            chr_ram_size: if chr_rom_size == 0 && chr_ram_size == 0 {
                CHR_ROM_UNIT
            } else {
                chr_ram_size
            },
        }
    }
}

fn resolve_mirroring(flags6: Flags6) -> Mirroring {
    if flags6.contains(Flags6::FOUR_SCREEN) {
        Mirroring::FourScreen
    } else if flags6.contains(Flags6::MIRRORING) {
        Mirroring::Vertical
    } else {
        Mirroring::Horizontal
    }
}

/// NES 2.0 RAM sizes are stored as `64 << n`, with 0 meaning none.
fn shift_size(nibble: u8) -> usize {
    if nibble == 0 { 0 } else { 64usize << nibble }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(bytes6_to_11: [u8; 6], prg: u8, chr: u8) -> [u8; NES_HEADER_LEN] {
        let mut out = [0u8; NES_HEADER_LEN];
        out[..4].copy_from_slice(NES_MAGIC);
        out[4] = prg;
        out[5] = chr;
        out[6..12].copy_from_slice(&bytes6_to_11);
        out
    }

    #[test]
    fn parses_ines_nrom() {
        let bytes = header([0b0000_0001, 0, 0, 0, 0, 0], 2, 1);
        let header = Header::parse(&bytes).expect("header parses");

        assert_eq!(header.format, RomFormat::INes);
        assert_eq!(header.mapper, 0);
        assert_eq!(header.prg_rom_size, 32 * 1024);
        assert_eq!(header.chr_rom_size, 8 * 1024);
        assert_eq!(header.chr_ram_size, 0);
        assert_eq!(header.prg_ram_size, 8 * 1024);
        assert_eq!(header.mirroring, Mirroring::Vertical);
        assert!(!header.trainer);
    }

    #[test]
    fn combines_mapper_nibbles() {
        let bytes = header([0x42, 0x10, 0, 0, 0, 0], 8, 0);
        let header = Header::parse(&bytes).expect("header parses");
        assert_eq!(header.mapper, 0x14);
        assert!(header.battery);
        assert_eq!(header.chr_ram_size, 8 * 1024);
    }

    #[test]
    fn ignores_upper_nibble_of_dirty_dumps() {
        let mut bytes = header([0x10, 0x40, 0, 0, 0, 0], 1, 1);
        bytes[12..16].copy_from_slice(b"Dude");
        let header = Header::parse(&bytes).expect("header parses");
        assert_eq!(header.mapper, 1);
    }

    #[test]
    fn parses_nes2_sizes() {
        // PRG RAM 0x7 -> 8 KiB volatile, CHR RAM 0x7 -> 8 KiB, submapper 3.
        let bytes = header([0x40, 0x08, 0x30, 0x00, 0x07, 0x07], 4, 0);
        let header = Header::parse(&bytes).expect("header parses");

        assert_eq!(header.format, RomFormat::Nes20);
        assert_eq!(header.mapper, 4);
        assert_eq!(header.submapper, 3);
        assert_eq!(header.prg_rom_size, 64 * 1024);
        assert_eq!(header.prg_ram_size, 8 * 1024);
        assert_eq!(header.chr_ram_size, 8 * 1024);
        assert_eq!(header.mirroring, Mirroring::Horizontal);
    }

    #[test]
    fn rejects_bad_magic_and_short_input() {
        let mut bytes = [0u8; NES_HEADER_LEN];
        bytes[..4].copy_from_slice(b"NOPE");
        assert!(matches!(Header::parse(&bytes), Err(Error::InvalidMagic)));
        assert!(matches!(
            Header::parse(&bytes[..7]),
            Err(Error::TooShort { actual: 7 })
        ));
    }

    #[test]
    fn mirroring_folds_nametables() {
        assert_eq!(Mirroring::Horizontal.ciram_offset(0x2400), 0x0000);
        assert_eq!(Mirroring::Horizontal.ciram_offset(0x2800), 0x0400);
        assert_eq!(Mirroring::Vertical.ciram_offset(0x2800), 0x0000);
        assert_eq!(Mirroring::Vertical.ciram_offset(0x2C05), 0x0405);
        assert_eq!(Mirroring::FourScreen.ciram_offset(0x2C00), 0x0C00);
        assert_eq!(Mirroring::SingleScreenUpper.ciram_offset(0x2000), 0x0400);
        // $3000-$3EFF mirrors $2000-$2EFF.
        assert_eq!(Mirroring::Vertical.ciram_offset(0x3401), 0x0401);
    }
}
