//! Triangle channel state and linear counter.

use serde::{Deserialize, Serialize};

use super::{length_counter::LengthCounter, tables::TRIANGLE_SEQUENCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub(super) struct Triangle {
    /// Doubles as the length counter halt.
    control_flag: bool,
    linear_reload_value: u8,
    linear_counter: u8,
    linear_reload: bool,
    length: LengthCounter,
    timer: u16,
    timer_period: u16,
    sequence_pos: u8,
}

impl Triangle {
    pub(super) fn write_control(&mut self, value: u8) {
        self.control_flag = value & 0b1000_0000 != 0;
        self.linear_reload_value = value & 0b0111_1111;
    }

    pub(super) fn write_timer_low(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0xFF00) | u16::from(value);
    }

    pub(super) fn write_timer_high(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | (u16::from(value & 0b0000_0111) << 8);
        self.length.load(value >> 3);
        // Timer and sequence position are left alone.
        self.linear_reload = true;
    }

    pub(super) fn set_enabled(&mut self, enabled: bool) {
        self.length.set_enabled(enabled);
    }

    pub(super) fn clock_linear_counter(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_reload_value;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control_flag {
            self.linear_reload = false;
        }
    }

    pub(super) fn clock_length(&mut self) {
        self.length.clock(self.control_flag);
    }

    /// Clocked every CPU cycle. Periods below 2 would produce ultrasonic
    /// output, so the sequencer holds instead.
    pub(super) fn clock_timer(&mut self) {
        if self.timer == 0 {
            self.timer = self.timer_period;
            if self.length.active() && self.linear_counter > 0 && self.timer_period >= 2 {
                self.sequence_pos = (self.sequence_pos + 1) & 0b1_1111;
            }
        } else {
            self.timer -= 1;
        }
    }

    /// The DAC keeps the last step while the sequencer is gated.
    pub(super) fn output(&self) -> u8 {
        TRIANGLE_SEQUENCE[self.sequence_pos as usize]
    }

    pub(super) fn length_active(&self) -> bool {
        self.length.active()
    }

    pub(super) fn validate(&self) -> Result<(), &'static str> {
        if usize::from(self.sequence_pos) >= TRIANGLE_SEQUENCE.len() {
            return Err("triangle sequencer step out of range");
        }
        Ok(())
    }
}
