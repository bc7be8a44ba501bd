use crate::cartridge::{Cartridge, header::Mirroring};

/// Temporary view that lets the PPU reach the cartridge without owning it.
///
/// The scheduler creates one per CPU cycle, so the borrow stays explicit and
/// the PPU can be stepped with no cartridge inserted (open CHR bus reads 0).
#[derive(Debug, Default)]
pub struct PatternBus<'a> {
    cartridge: Option<&'a mut Cartridge>,
}

impl<'a> PatternBus<'a> {
    pub fn new(cartridge: Option<&'a mut Cartridge>) -> Self {
        Self { cartridge }
    }

    /// CHR read (`$0000-$1FFF`).
    pub fn read(&self, addr: u16) -> u8 {
        self.cartridge
            .as_deref()
            .map_or(0, |cart| cart.ppu_read(addr))
    }

    /// CHR write; only CHR RAM boards keep the value.
    pub fn write(&mut self, addr: u16, value: u8) {
        if let Some(cart) = self.cartridge.as_deref_mut() {
            cart.ppu_write(addr, value);
        }
    }

    /// Current nametable wiring. Without a cartridge the pages are mirrored
    /// horizontally.
    pub fn mirroring(&self) -> Mirroring {
        self.cartridge
            .as_deref()
            .map_or(Mirroring::Horizontal, Cartridge::mirroring)
    }

    /// Once-per-scanline hook for boards with a scanline counter.
    pub fn notify_scanline(&mut self) {
        if let Some(cart) = self.cartridge.as_deref_mut() {
            cart.notify_scanline();
        }
    }
}
