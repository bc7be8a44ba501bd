use serde::{Deserialize, Serialize};

/// NTSC CPU clock rate in Hz.
pub const CPU_CLOCK_NTSC: u32 = 1_789_773;
/// PPU dots per CPU cycle.
pub const PPU_DOTS_PER_CPU_CYCLE: usize = 3;

/// Monotonic CPU-cycle counter shared by every chip.
///
/// Parity is derived from the count, so it toggles on every tick and can never
/// drift from it. Only a power cycle rewinds the counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MasterClock {
    cycles: u64,
}

impl MasterClock {
    pub const fn new() -> Self {
        Self { cycles: 0 }
    }

    /// Advances by one CPU cycle and returns the new count.
    #[inline]
    pub fn tick(&mut self) -> u64 {
        self.cycles = self.cycles.wrapping_add(1);
        self.cycles
    }

    #[inline]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// `true` on odd cycles. Sprite DMA alignment and the `$4017` write delay
    /// depend on this.
    #[inline]
    pub const fn is_odd(&self) -> bool {
        self.cycles & 1 == 1
    }

    pub(crate) fn power_on(&mut self) {
        self.cycles = 0;
    }
}
