//! The CPU-side system bus.
//!
//! [`CpuBus`] is the scheduler: every CPU access it performs is one CPU cycle,
//! during which the master clock ticks, the PPU advances three dots, the APU
//! one cycle, and pending DMA gets a chance to halt the CPU.

use crate::memory;

pub mod cpu;
pub mod dma;
#[cfg(test)]
pub(crate) mod mock;
pub mod open_bus;

pub use cpu::CpuBus;
pub use dma::DmaController;
pub use open_bus::OpenBus;

/// CPU stack page start address for stack helpers.
pub(crate) const STACK_ADDR: u16 = memory::cpu::STACK_PAGE_START;

/// What the CPU core needs from the world around it.
///
/// Every `read`, `write` and `idle` call is exactly one CPU cycle; the CPU
/// derives its instruction timing from the sequence of calls it makes.
pub trait Bus {
    /// Timed read with side effects (register reads acknowledge flags, shift
    /// controllers, ...).
    fn read(&mut self, addr: u16) -> u8;

    /// Timed write.
    fn write(&mut self, addr: u16, data: u8);

    /// Side-effect-free read. Does not advance time.
    fn peek(&self, addr: u16) -> u8;

    /// A CPU cycle without a bus access (the halted CPU after JAM).
    fn idle(&mut self);

    /// Current NMI line level. The CPU does its own edge detection.
    fn nmi_line(&self) -> bool;

    /// `true` while any device pulls IRQ low.
    fn irq_line(&self) -> bool;

    /// CPU cycles elapsed since power-on.
    fn cycles(&self) -> u64;
}

impl<T: Bus + ?Sized> Bus for &mut T {
    fn read(&mut self, addr: u16) -> u8 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u16, data: u8) {
        (**self).write(addr, data)
    }

    fn peek(&self, addr: u16) -> u8 {
        (**self).peek(addr)
    }

    fn idle(&mut self) {
        (**self).idle()
    }

    fn nmi_line(&self) -> bool {
        (**self).nmi_line()
    }

    fn irq_line(&self) -> bool {
        (**self).irq_line()
    }

    fn cycles(&self) -> u64 {
        (**self).cycles()
    }
}
