//! Pulse channel state, including sweep and envelope units.

use serde::{Deserialize, Serialize};

use super::{envelope::Envelope, length_counter::LengthCounter, tables::PULSE_DUTY_TABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(super) enum PulseChannel {
    Pulse1,
    Pulse2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(super) struct Sweep {
    enabled: bool,
    negate: bool,
    shift: u8,
    period: u8,
    divider: u8,
    reload: bool,
    channel: PulseChannel,
}

impl Sweep {
    fn new(channel: PulseChannel) -> Self {
        Self {
            enabled: false,
            negate: false,
            shift: 0,
            period: 0,
            divider: 0,
            reload: false,
            channel,
        }
    }

    fn write(&mut self, value: u8) {
        self.enabled = value & 0b1000_0000 != 0;
        self.period = (value >> 4) & 0b0000_0111;
        self.negate = value & 0b0000_1000 != 0;
        self.shift = value & 0b0000_0111;
        self.reload = true;
    }

    /// Pulse 1 negates with one's complement, pulse 2 with two's complement.
    fn target_period(&self, timer_period: u16) -> u16 {
        let delta = timer_period >> self.shift;
        if self.negate {
            match self.channel {
                PulseChannel::Pulse1 => timer_period.wrapping_sub(delta).wrapping_sub(1),
                PulseChannel::Pulse2 => timer_period.wrapping_sub(delta),
            }
        } else {
            timer_period.wrapping_add(delta)
        }
    }

    /// The mute check runs continuously, even with the sweep disabled.
    fn muted(&self, timer_period: u16) -> bool {
        timer_period < 8 || (!self.negate && self.target_period(timer_period) > 0x07FF)
    }

    /// Half-frame clock.
    fn clock(&mut self, timer_period: &mut u16) {
        if self.divider == 0 && self.enabled && self.shift != 0 && !self.muted(*timer_period) {
            *timer_period = self.target_period(*timer_period);
        }
        if self.divider == 0 || self.reload {
            self.divider = self.period;
            self.reload = false;
        } else {
            self.divider -= 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(super) struct Pulse {
    duty: u8,
    /// Position in the 8-step duty sequence.
    sequence_pos: u8,
    timer: u16,
    timer_period: u16,
    envelope: Envelope,
    length: LengthCounter,
    sweep: Sweep,
}

impl Pulse {
    pub(super) fn new(channel: PulseChannel) -> Self {
        Self {
            duty: 0,
            sequence_pos: 0,
            timer: 0,
            timer_period: 0,
            envelope: Envelope::default(),
            length: LengthCounter::default(),
            sweep: Sweep::new(channel),
        }
    }

    pub(super) fn write_control(&mut self, value: u8) {
        self.duty = (value >> 6) & 0b0000_0011;
        self.envelope.configure(value);
    }

    pub(super) fn write_sweep(&mut self, value: u8) {
        self.sweep.write(value);
    }

    pub(super) fn write_timer_low(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0xFF00) | u16::from(value);
    }

    pub(super) fn write_timer_high(&mut self, value: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | (u16::from(value & 0b0000_0111) << 8);
        self.length.load(value >> 3);
        self.sequence_pos = 0;
        self.envelope.restart();
    }

    pub(super) fn set_enabled(&mut self, enabled: bool) {
        self.length.set_enabled(enabled);
    }

    /// Clocked once per APU cycle (every other CPU cycle).
    pub(super) fn clock_timer(&mut self) {
        if self.timer == 0 {
            self.timer = self.timer_period;
            self.sequence_pos = (self.sequence_pos + 1) & 0b111;
        } else {
            self.timer -= 1;
        }
    }

    pub(super) fn clock_envelope(&mut self) {
        self.envelope.clock();
    }

    pub(super) fn clock_length_and_sweep(&mut self) {
        self.length.clock(self.envelope.halt_length());
        self.sweep.clock(&mut self.timer_period);
    }

    pub(super) fn output(&self) -> u8 {
        if !self.length.active() || self.sweep.muted(self.timer_period) {
            return 0;
        }
        if PULSE_DUTY_TABLE[self.duty as usize][self.sequence_pos as usize] == 0 {
            0
        } else {
            self.envelope.output()
        }
    }

    pub(super) fn length_active(&self) -> bool {
        self.length.active()
    }

    pub(super) fn validate(&self) -> Result<(), &'static str> {
        if usize::from(self.duty) >= PULSE_DUTY_TABLE.len() {
            return Err("pulse duty out of range");
        }
        if usize::from(self.sequence_pos) >= PULSE_DUTY_TABLE[0].len() {
            return Err("pulse sequencer step out of range");
        }
        self.envelope.validate()
    }

    #[cfg(test)]
    pub(super) fn set_duty(&mut self, duty: u8) {
        self.duty = duty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(channel: PulseChannel, period: u16) -> Pulse {
        let mut pulse = Pulse::new(channel);
        pulse.set_enabled(true);
        pulse.write_control(0b1011_1111); // 50% duty, constant volume 15
        pulse.write_timer_low(period as u8);
        pulse.write_timer_high(0b0000_1000 | (period >> 8) as u8);
        pulse
    }

    #[test]
    fn short_periods_are_muted() {
        let pulse = playing(PulseChannel::Pulse1, 7);
        assert!(pulse.sweep.muted(7));
        assert_eq!(pulse.output(), 0);
    }

    #[test]
    fn sweep_target_overflow_mutes_without_sweep_enabled() {
        let mut pulse = playing(PulseChannel::Pulse2, 0x0500);
        pulse.write_sweep(0b0000_0001); // disabled, shift 1
        assert!(pulse.sweep.muted(pulse.timer_period));
    }

    #[test]
    fn negate_differs_between_channels() {
        let mut sweep1 = Sweep::new(PulseChannel::Pulse1);
        let mut sweep2 = Sweep::new(PulseChannel::Pulse2);
        sweep1.write(0b1000_1001);
        sweep2.write(0b1000_1001);
        assert_eq!(sweep1.target_period(0x100), 0x100 - 0x80 - 1);
        assert_eq!(sweep2.target_period(0x100), 0x100 - 0x80);
    }

    #[test]
    fn sweep_updates_period_on_divider_expiry() {
        let mut pulse = playing(PulseChannel::Pulse1, 0x100);
        pulse.write_sweep(0b1001_0001); // enabled, divider period 1, shift 1
        pulse.clock_length_and_sweep();
        assert_eq!(pulse.timer_period, 0x180);
        pulse.clock_length_and_sweep();
        assert_eq!(pulse.timer_period, 0x180);
        pulse.clock_length_and_sweep();
        assert_eq!(pulse.timer_period, 0x240);
    }

    #[test]
    fn duty_sequence_walks_every_period() {
        let mut pulse = playing(PulseChannel::Pulse1, 8);
        let mut levels = Vec::new();
        for _ in 0..8 {
            for _ in 0..=8 {
                pulse.clock_timer();
            }
            levels.push(pulse.output());
        }
        assert_eq!(levels.iter().filter(|&&level| level == 15).count(), 4);
    }

    #[test]
    fn validate_rejects_out_of_range_duty_and_step() {
        let mut pulse = playing(PulseChannel::Pulse1, 0x100);
        assert!(pulse.validate().is_ok());

        pulse.duty = 4;
        assert!(pulse.validate().is_err());

        pulse.duty = 3;
        pulse.sequence_pos = 8;
        assert!(pulse.validate().is_err());
    }
}
