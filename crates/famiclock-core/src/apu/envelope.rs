//! Envelope unit shared by pulse and noise channels.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(super) struct Envelope {
    loop_flag: bool,
    constant_volume: bool,
    volume: u8,
    start: bool,
    divider: u8,
    decay_level: u8,
}

impl Envelope {
    pub(super) fn configure(&mut self, value: u8) {
        self.loop_flag = value & 0b0010_0000 != 0;
        self.constant_volume = value & 0b0001_0000 != 0;
        self.volume = value & 0b0000_1111;
    }

    pub(super) fn restart(&mut self) {
        self.start = true;
    }

    /// Quarter-frame clock.
    pub(super) fn clock(&mut self) {
        if self.start {
            self.start = false;
            self.decay_level = 15;
            self.divider = self.volume;
            return;
        }

        if self.divider == 0 {
            self.divider = self.volume;
            if self.decay_level > 0 {
                self.decay_level -= 1;
            } else if self.loop_flag {
                self.decay_level = 15;
            }
        } else {
            self.divider -= 1;
        }
    }

    pub(super) fn output(&self) -> u8 {
        if self.constant_volume {
            self.volume
        } else {
            self.decay_level
        }
    }

    /// The loop flag doubles as the length counter halt.
    pub(super) fn halt_length(&self) -> bool {
        self.loop_flag
    }

    pub(super) fn validate(&self) -> Result<(), &'static str> {
        if self.volume > 15 || self.decay_level > 15 || self.divider > 15 {
            return Err("envelope level out of range");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decays_once_per_divider_period() {
        let mut env = Envelope::default();
        env.configure(0b0000_0001); // period 2, decaying
        env.restart();
        env.clock();
        assert_eq!(env.output(), 15);
        env.clock();
        assert_eq!(env.output(), 15);
        env.clock();
        assert_eq!(env.output(), 14);
    }

    #[test]
    fn loop_flag_wraps_to_fifteen() {
        let mut env = Envelope::default();
        env.configure(0b0010_0000);
        env.restart();
        for _ in 0..17 {
            env.clock();
        }
        assert_eq!(env.output(), 15);
        assert!(env.halt_length());
    }

    #[test]
    fn constant_volume_ignores_decay() {
        let mut env = Envelope::default();
        env.configure(0b0001_0111);
        env.restart();
        env.clock();
        env.clock();
        assert_eq!(env.output(), 7);
    }
}
