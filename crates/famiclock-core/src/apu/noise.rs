//! Noise channel state and linear feedback shift register (LFSR).

use serde::{Deserialize, Serialize};

use super::{envelope::Envelope, length_counter::LengthCounter, tables::NOISE_PERIOD_TABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(super) struct Noise {
    envelope: Envelope,
    length: LengthCounter,
    /// Short mode: feedback from bit 6 instead of bit 1.
    mode: bool,
    timer_period: u16,
    timer: u16,
    shift_register: u16,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            length: LengthCounter::default(),
            mode: false,
            timer_period: NOISE_PERIOD_TABLE[0] - 1,
            timer: 0,
            shift_register: 1,
        }
    }
}

impl Noise {
    pub(super) fn write_control(&mut self, value: u8) {
        self.envelope.configure(value);
    }

    pub(super) fn write_mode_and_period(&mut self, value: u8) {
        self.mode = value & 0b1000_0000 != 0;
        self.timer_period = NOISE_PERIOD_TABLE[(value & 0b0000_1111) as usize] - 1;
    }

    pub(super) fn write_length(&mut self, value: u8) {
        self.length.load(value >> 3);
        self.envelope.restart();
    }

    pub(super) fn set_enabled(&mut self, enabled: bool) {
        self.length.set_enabled(enabled);
    }

    /// Clocked every CPU cycle; the table holds CPU-cycle periods.
    pub(super) fn clock_timer(&mut self) {
        if self.timer == 0 {
            self.timer = self.timer_period;
            self.step_lfsr();
        } else {
            self.timer -= 1;
        }
    }

    fn step_lfsr(&mut self) {
        let tap = if self.mode { 6 } else { 1 };
        let bit = (self.shift_register ^ (self.shift_register >> tap)) & 1;
        self.shift_register >>= 1;
        self.shift_register |= bit << 14;
    }

    pub(super) fn clock_envelope(&mut self) {
        self.envelope.clock();
    }

    pub(super) fn clock_length(&mut self) {
        self.length.clock(self.envelope.halt_length());
    }

    pub(super) fn output(&self) -> u8 {
        if !self.length.active() || self.shift_register & 1 != 0 {
            0
        } else {
            self.envelope.output()
        }
    }

    pub(super) fn length_active(&self) -> bool {
        self.length.active()
    }

    pub(super) fn validate(&self) -> Result<(), &'static str> {
        self.envelope.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Steps until the register returns to its seed.
    fn lfsr_period(mode: bool) -> usize {
        let mut noise = Noise {
            mode,
            ..Noise::default()
        };
        let mut steps = 0;
        loop {
            noise.step_lfsr();
            steps += 1;
            if noise.shift_register == 1 {
                return steps;
            }
        }
    }

    #[test]
    fn long_mode_cycles_through_32767_states() {
        assert_eq!(lfsr_period(false), 32767);
    }

    #[test]
    fn short_mode_cycles_through_93_states() {
        assert_eq!(lfsr_period(true), 93);
    }

    #[test]
    fn silent_until_length_loaded() {
        let mut noise = Noise::default();
        noise.write_control(0b0001_1111);
        noise.write_length(0);
        assert!(!noise.length_active());
        noise.set_enabled(true);
        noise.write_length(0);
        assert!(noise.length_active());
    }
}
