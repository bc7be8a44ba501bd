//! CPU data bus open-bus model.
//!
//! The 2A03 data bus floats when no device drives it. Reads of write-only or
//! unmapped addresses return whatever was last on the bus, and charged bits
//! leak back to 0 after a few frames. Each bit carries its own decay deadline
//! so partially driven reads (controller ports) only refresh the bits they
//! actually drive.

use serde::{Deserialize, Serialize};

/// Bus steps before a driven `1` bit decays to `0` (about three NTSC frames).
const DECAY_TICKS: u64 = 90_000;

/// Last value driven on the data bus plus per-bit decay deadlines.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpenBus {
    value: u8,
    decay_deadline: [u64; 8],
    tick: u64,
}

impl OpenBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power_on(&mut self) {
        *self = Self::default();
    }

    /// Advances one CPU cycle and applies any pending bit decays.
    pub fn step(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        self.apply_decay();
    }

    /// Current bus value, without refreshing the decay timers.
    pub fn sample(&self) -> u8 {
        self.value
    }

    /// Latches a fully driven byte.
    pub fn latch(&mut self, value: u8) {
        self.set_masked(0xFF, value);
    }

    /// Drives only the bits selected by `mask`; the rest keep floating.
    pub fn set_masked(&mut self, mask: u8, value: u8) {
        let deadline = self.tick.wrapping_add(DECAY_TICKS);
        for (bit, slot) in self.decay_deadline.iter_mut().enumerate() {
            let select = 1u8 << bit;
            if mask & select == 0 {
                continue;
            }
            if value & select != 0 {
                self.value |= select;
            } else {
                self.value &= !select;
            }
            *slot = deadline;
        }
    }

    /// Combines a partially driven read with the floating bits.
    ///
    /// Bits set in `float_mask` come from the bus, the others from `value`
    /// (which also refreshes them).
    pub fn apply_masked(&mut self, float_mask: u8, value: u8) -> u8 {
        self.set_masked(!float_mask, value);
        (value & !float_mask) | (self.value & float_mask)
    }

    fn apply_decay(&mut self) {
        for (bit, deadline) in self.decay_deadline.iter_mut().enumerate() {
            if *deadline != 0 && self.tick >= *deadline {
                self.value &= !(1 << bit);
                *deadline = 0;
            }
        }
    }
}
