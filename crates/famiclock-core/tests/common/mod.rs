#![allow(dead_code)]

use anyhow::{Context, Result};
use ctor::ctor;
use famiclock_core::{Nes, NesConfig};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const PRG_BANK: usize = 0x4000;
pub const CHR_BANK: usize = 0x2000;
/// Where the default NMI/IRQ vectors point: a lone `RTI`.
pub const RTI_STUB: u16 = 0xFFF0;

#[ctor]
fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_file(true)
        .with_line_number(true)
        .with_max_level(Level::DEBUG)
        .pretty()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

/// Synthetic iNES image. PRG starts out as `NOP` sled, the reset vector
/// points at `$8000` and both interrupt vectors at an `RTI`.
#[derive(Debug, Clone)]
pub struct RomBuilder {
    mapper: u8,
    battery: bool,
    vertical: bool,
    prg: Vec<u8>,
    chr: Vec<u8>,
}

impl RomBuilder {
    /// One 16 KiB PRG bank (mirrored into `$C000`) and 8 KiB of CHR ROM.
    pub fn nrom() -> Self {
        Self::with_banks(0, 1, 1)
    }

    pub fn with_banks(mapper: u8, prg_banks: usize, chr_banks: usize) -> Self {
        Self {
            mapper,
            battery: false,
            vertical: false,
            prg: vec![0xEA; prg_banks * PRG_BANK],
            chr: vec![0; chr_banks * CHR_BANK],
        }
        .code(RTI_STUB, &[0x40])
        .vector(0xFFFA, RTI_STUB)
        .vector(0xFFFC, 0x8000)
        .vector(0xFFFE, RTI_STUB)
    }

    /// `$C000-$FFFF` is the last 16 KiB, the usual fixed bank.
    fn prg_offset(&self, addr: u16) -> usize {
        match addr {
            0xC000.. => self.prg.len() - PRG_BANK + (addr as usize - 0xC000),
            _ => (addr as usize - 0x8000) % self.prg.len(),
        }
    }

    /// Places `bytes` at CPU address `addr` as seen at power-on.
    pub fn code(mut self, addr: u16, bytes: &[u8]) -> Self {
        let start = self.prg_offset(addr);
        self.prg[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn vector(self, addr: u16, target: u16) -> Self {
        self.code(addr, &target.to_le_bytes())
    }

    /// Raw PRG placement, for banks that are not mapped at power-on.
    pub fn prg(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.prg[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn chr(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.chr[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn battery(mut self) -> Self {
        self.battery = true;
        self
    }

    pub fn vertical(mut self) -> Self {
        self.vertical = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let flags6 = (self.mapper << 4) | ((self.battery as u8) << 1) | self.vertical as u8;
        let mut image = vec![
            b'N',
            b'E',
            b'S',
            0x1A,
            (self.prg.len() / PRG_BANK) as u8,
            (self.chr.len() / CHR_BANK) as u8,
            flags6,
            self.mapper & 0xF0,
        ];
        image.resize(16, 0);
        image.extend_from_slice(&self.prg);
        image.extend_from_slice(&self.chr);
        image
    }
}

/// Powered-on console running `rom`.
pub fn boot(rom: &RomBuilder) -> Result<Nes> {
    boot_with(rom, NesConfig::default())
}

pub fn boot_with(rom: &RomBuilder, config: NesConfig) -> Result<Nes> {
    let mut nes = Nes::new(config);
    nes.load_cartridge(&rom.build())
        .context("loading synthetic image")?;
    Ok(nes)
}

/// Cycle cost of each of the next `count` instructions.
pub fn step_costs(nes: &mut Nes, count: usize) -> Vec<u64> {
    (0..count).map(|_| nes.step_instruction()).collect()
}

/// `LDA #value` / `STA addr` for every pair.
pub fn stores(writes: &[(u16, u8)]) -> Vec<u8> {
    let mut code = Vec::with_capacity(writes.len() * 5);
    for &(addr, value) in writes {
        let [lo, hi] = addr.to_le_bytes();
        code.extend([0xA9, value, 0x8D, lo, hi]);
    }
    code
}

/// [`stores`] followed by `JMP` to itself. `origin`
/// is where the code will sit.
pub fn store_sequence(origin: u16, writes: &[(u16, u8)]) -> Vec<u8> {
    let mut code = stores(writes);
    let [lo, hi] = (origin + code.len() as u16).to_le_bytes();
    code.extend([0x4C, lo, hi]);
    code
}
