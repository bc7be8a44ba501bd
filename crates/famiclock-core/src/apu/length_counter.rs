//! Shared length counter used by pulse, triangle, and noise channels.

use serde::{Deserialize, Serialize};

use super::tables::LENGTH_TABLE;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(super) struct LengthCounter {
    value: u8,
    enabled: bool,
}

impl LengthCounter {
    /// `$4015` enable bit. Disabling forces the counter to zero.
    pub(super) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.value = 0;
        }
    }

    pub(super) fn active(&self) -> bool {
        self.value > 0
    }

    /// Loads from the length table; ignored while the channel is disabled.
    pub(super) fn load(&mut self, index: u8) {
        if self.enabled {
            self.value = LENGTH_TABLE[(index & 0x1F) as usize];
        }
    }

    /// Half-frame clock.
    pub(super) fn clock(&mut self, halt: bool) {
        if self.value > 0 && !halt {
            self.value -= 1;
        }
    }
}
