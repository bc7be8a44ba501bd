//! Pattern-table memory on the cartridge.
//!
//! A board carries either CHR ROM from the image or CHR RAM the program fills
//! in. Mappers address it through fixed-size banks; bank numbers wrap modulo
//! the number of banks present so any register value resolves to real memory.

use super::header::Header;

#[derive(Debug, Clone)]
pub enum ChrStorage {
    Rom(Box<[u8]>),
    Ram(Box<[u8]>),
}

impl ChrStorage {
    /// CHR ROM when the image carries any, CHR RAM of the header's size
    /// otherwise.
    pub fn select(header: &Header, chr_rom: Box<[u8]>) -> Self {
        if chr_rom.is_empty() {
            let size = header.chr_ram_size.max(0x2000);
            ChrStorage::Ram(vec![0; size].into_boxed_slice())
        } else {
            ChrStorage::Rom(chr_rom)
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            ChrStorage::Rom(rom) => rom,
            ChrStorage::Ram(ram) => ram,
        }
    }

    fn bank_offset(&self, bank_size: usize, bank: usize, addr: u16) -> usize {
        let bank_count = (self.bytes().len() / bank_size).max(1);
        (bank % bank_count) * bank_size + (addr as usize % bank_size)
    }

    /// Plain 8 KiB window.
    pub fn read(&self, addr: u16) -> u8 {
        self.read_banked(0x2000, 0, addr)
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        self.write_banked(0x2000, 0, addr, data);
    }

    /// Reads `addr` through a bank of `bank_size` bytes numbered `bank`.
    pub fn read_banked(&self, bank_size: usize, bank: usize, addr: u16) -> u8 {
        let bytes = self.bytes();
        if bytes.is_empty() {
            return 0;
        }
        let idx = self.bank_offset(bank_size, bank, addr);
        bytes[idx % bytes.len()]
    }

    /// Writes only land when the board has CHR RAM.
    pub fn write_banked(&mut self, bank_size: usize, bank: usize, addr: u16, data: u8) {
        let idx = self.bank_offset(bank_size, bank, addr);
        if let ChrStorage::Ram(ram) = self
            && !ram.is_empty()
        {
            let len = ram.len();
            ram[idx % len] = data;
        }
    }

    pub fn ram(&self) -> Option<&[u8]> {
        match self {
            ChrStorage::Ram(ram) => Some(ram),
            ChrStorage::Rom(_) => None,
        }
    }

    pub fn ram_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            ChrStorage::Ram(ram) => Some(ram),
            ChrStorage::Rom(_) => None,
        }
    }
}
