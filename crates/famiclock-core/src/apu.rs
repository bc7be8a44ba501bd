//! Audio Processing Unit (APU).
//!
//! The 2A03 exposes five sound generators (2x pulse, triangle, noise, DMC)
//! behind the `$4000-$4017` registers. Channel logic, the frame sequencer and
//! the mixer live in their own submodules; this file wires them to the CPU
//! bus and to the output stream.

mod dmc;
mod envelope;
mod frame_counter;
mod length_counter;
mod mixer;
mod noise;
mod pulse;
mod tables;
mod triangle;

use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::memory::apu::Register as ApuRegister;

pub use frame_counter::FrameCounterMode;

use dmc::Dmc;
use frame_counter::FrameCounter;
use mixer::Resampler;
use noise::Noise;
use pulse::{Pulse, PulseChannel};
use triangle::Triangle;

bitflags! {
    /// `$4015` as read by the CPU.
    ///
    /// Bit layout:
    /// ```text
    /// 7 6 5 4 3 2 1 0
    /// I F . D N T 2 1
    /// ```
    /// Bit 5 is not driven and reads as open bus.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ApuStatus: u8 {
        const PULSE1 = 0b0000_0001;
        const PULSE2 = 0b0000_0010;
        const TRIANGLE = 0b0000_0100;
        const NOISE = 0b0000_1000;
        /// DMC has bytes left to play.
        const DMC = 0b0001_0000;
        const FRAME_INTERRUPT = 0b0100_0000;
        const DMC_INTERRUPT = 0b1000_0000;
    }
}

impl Default for ApuStatus {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Apu {
    pulse: [Pulse; 2],
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    frame_counter: FrameCounter,
    frame_interrupt: bool,
    /// Pulse timers run at half the CPU rate.
    odd_cycle: bool,
    resampler: Resampler,
}

impl fmt::Debug for Apu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Apu")
            .field("frame_counter", &self.frame_counter)
            .field("status", &self.peek_status())
            .finish()
    }
}

impl Apu {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            pulse: [Pulse::new(PulseChannel::Pulse1), Pulse::new(PulseChannel::Pulse2)],
            triangle: Triangle::default(),
            noise: Noise::default(),
            dmc: Dmc::default(),
            frame_counter: FrameCounter::default(),
            frame_interrupt: false,
            odd_cycle: false,
            resampler: Resampler::new(sample_rate),
        }
    }

    /// Power cycle: every channel cleared, frame sequencer in 4-step mode
    /// with IRQs enabled.
    pub fn power_on(&mut self) {
        self.pulse = [Pulse::new(PulseChannel::Pulse1), Pulse::new(PulseChannel::Pulse2)];
        self.triangle = Triangle::default();
        self.noise = Noise::default();
        self.dmc = Dmc::default();
        self.frame_counter = FrameCounter::default();
        self.frame_interrupt = false;
        self.odd_cycle = false;
        self.resampler.reset();
    }

    /// Reset button: behaves like a `$4015` write of zero, and the frame
    /// sequencer restarts in the last written mode.
    pub fn reset(&mut self) {
        self.write_status(0);
        self.frame_interrupt = false;
        self.frame_counter.reset();
    }

    pub fn write_register(&mut self, register: ApuRegister, value: u8, cpu_cycle: u64) {
        match register {
            ApuRegister::Pulse1Control => self.pulse[0].write_control(value),
            ApuRegister::Pulse1Sweep => self.pulse[0].write_sweep(value),
            ApuRegister::Pulse1TimerLow => self.pulse[0].write_timer_low(value),
            ApuRegister::Pulse1TimerHigh => self.pulse[0].write_timer_high(value),
            ApuRegister::Pulse2Control => self.pulse[1].write_control(value),
            ApuRegister::Pulse2Sweep => self.pulse[1].write_sweep(value),
            ApuRegister::Pulse2TimerLow => self.pulse[1].write_timer_low(value),
            ApuRegister::Pulse2TimerHigh => self.pulse[1].write_timer_high(value),
            ApuRegister::TriangleControl => self.triangle.write_control(value),
            ApuRegister::TriangleTimerLow => self.triangle.write_timer_low(value),
            ApuRegister::TriangleTimerHigh => self.triangle.write_timer_high(value),
            ApuRegister::NoiseControl => self.noise.write_control(value),
            ApuRegister::NoiseModeAndPeriod => self.noise.write_mode_and_period(value),
            ApuRegister::NoiseLength => self.noise.write_length(value),
            ApuRegister::DmcControl => self.dmc.write_control(value),
            ApuRegister::DmcDirectLoad => self.dmc.write_direct_load(value),
            ApuRegister::DmcSampleAddress => self.dmc.write_sample_address(value),
            ApuRegister::DmcSampleLength => self.dmc.write_sample_length(value),
            ApuRegister::Status => self.write_status(value),
            ApuRegister::FrameCounter => {
                trace!(value = format_args!("{value:#04X}"), cpu_cycle, "frame counter write");
                self.frame_counter.write(value, cpu_cycle);
                if value & 0b0100_0000 != 0 {
                    self.frame_interrupt = false;
                }
            }
        }
    }

    fn write_status(&mut self, value: u8) {
        let enable = ApuStatus::from_bits_truncate(value);
        self.pulse[0].set_enabled(enable.contains(ApuStatus::PULSE1));
        self.pulse[1].set_enabled(enable.contains(ApuStatus::PULSE2));
        self.triangle.set_enabled(enable.contains(ApuStatus::TRIANGLE));
        self.noise.set_enabled(enable.contains(ApuStatus::NOISE));
        self.dmc.set_enabled(enable.contains(ApuStatus::DMC));
        self.dmc.clear_irq();
    }

    /// `$4015` value without the read side effect.
    pub fn peek_status(&self) -> u8 {
        let mut status = ApuStatus::empty();
        status.set(ApuStatus::PULSE1, self.pulse[0].length_active());
        status.set(ApuStatus::PULSE2, self.pulse[1].length_active());
        status.set(ApuStatus::TRIANGLE, self.triangle.length_active());
        status.set(ApuStatus::NOISE, self.noise.length_active());
        status.set(ApuStatus::DMC, self.dmc.active());
        status.set(ApuStatus::FRAME_INTERRUPT, self.frame_interrupt);
        status.set(ApuStatus::DMC_INTERRUPT, self.dmc.irq());
        status.bits()
    }

    /// `$4015` read. Clears the frame interrupt; the DMC interrupt stays.
    pub fn read_status(&mut self) -> u8 {
        let value = self.peek_status();
        self.frame_interrupt = false;
        value
    }

    /// Level of the APU's `/IRQ` contribution.
    pub fn irq_pending(&self) -> bool {
        self.frame_interrupt || self.dmc.irq()
    }

    pub fn frame_counter_mode(&self) -> FrameCounterMode {
        self.frame_counter.mode()
    }

    /// One CPU cycle.
    pub fn step(&mut self) {
        let tick = self.frame_counter.step();
        if tick.quarter {
            self.clock_quarter_frame();
        }
        if tick.half {
            self.clock_half_frame();
        }
        if tick.frame_irq {
            self.frame_interrupt = true;
        }

        if self.odd_cycle {
            for pulse in &mut self.pulse {
                pulse.clock_timer();
            }
        }
        self.odd_cycle = !self.odd_cycle;
        self.triangle.clock_timer();
        self.noise.clock_timer();
        self.dmc.step();

        self.resampler.push(self.sample());
    }

    fn clock_quarter_frame(&mut self) {
        for pulse in &mut self.pulse {
            pulse.clock_envelope();
        }
        self.noise.clock_envelope();
        self.triangle.clock_linear_counter();
    }

    fn clock_half_frame(&mut self) {
        for pulse in &mut self.pulse {
            pulse.clock_length_and_sweep();
        }
        self.triangle.clock_length();
        self.noise.clock_length();
    }

    /// Current mixed output level.
    pub fn sample(&self) -> f32 {
        mixer::mix(
            self.pulse[0].output(),
            self.pulse[1].output(),
            self.triangle.output(),
            self.noise.output(),
            self.dmc.output(),
        )
    }

    /// Sample address the DMC wants fetched, reported once per request.
    pub fn take_dmc_request(&mut self) -> Option<u16> {
        self.dmc.take_request()
    }

    /// Completes a DMC fetch with the byte DMA read.
    pub fn finish_dmc_fetch(&mut self, value: u8) {
        self.dmc.finish_fetch(value);
    }

    /// Drains the samples produced since the last call.
    pub fn take_samples(&mut self) -> Vec<f32> {
        self.resampler.take()
    }

    /// Range-checks state restored from a snapshot.
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        for pulse in &self.pulse {
            pulse.validate()?;
        }
        self.triangle.validate()?;
        self.noise.validate()?;
        self.dmc.validate()?;
        self.frame_counter.validate()?;
        self.resampler.validate()
    }

    #[cfg(test)]
    pub(crate) fn set_pulse_duty(&mut self, channel: usize, duty: u8) {
        self.pulse[channel].set_duty(duty);
    }

    #[cfg(test)]
    pub(crate) fn dmc_sample_buffer(&self) -> Option<u8> {
        self.dmc.sample_buffer()
    }
}
