//! Delta modulation channel (DMC).
//!
//! The memory reader does not touch the bus itself: when the sample buffer
//! runs dry it raises a request that the scheduler turns into a DMA, and the
//! fetched byte comes back through [`Dmc::finish_fetch`].

use serde::{Deserialize, Serialize};

use super::tables::{DMC_RATE_TABLE, DMC_SAMPLE_ADDR_STRIDE, DMC_SAMPLE_BASE, DMC_SAMPLE_LEN_STRIDE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(super) struct Dmc {
    irq_enable: bool,
    loop_flag: bool,
    irq: bool,
    timer: u16,
    timer_period: u16,
    output_level: u8,
    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    bytes_remaining: u16,
    sample_buffer: Option<u8>,
    shift_register: u8,
    bits_remaining: u8,
    silence: bool,
    /// A fetch was requested and has not completed yet.
    fetch_pending: bool,
    /// Request not yet collected by the scheduler.
    request: Option<u16>,
}

impl Default for Dmc {
    fn default() -> Self {
        Self {
            irq_enable: false,
            loop_flag: false,
            irq: false,
            timer: DMC_RATE_TABLE[0] - 1,
            timer_period: DMC_RATE_TABLE[0] - 1,
            output_level: 0,
            sample_address: DMC_SAMPLE_BASE,
            sample_length: 1,
            current_address: DMC_SAMPLE_BASE,
            bytes_remaining: 0,
            sample_buffer: None,
            shift_register: 0,
            bits_remaining: 8,
            silence: true,
            fetch_pending: false,
            request: None,
        }
    }
}

impl Dmc {
    pub(super) fn write_control(&mut self, value: u8) {
        self.irq_enable = value & 0b1000_0000 != 0;
        if !self.irq_enable {
            self.irq = false;
        }
        self.loop_flag = value & 0b0100_0000 != 0;
        self.timer_period = DMC_RATE_TABLE[(value & 0b0000_1111) as usize] - 1;
    }

    pub(super) fn write_direct_load(&mut self, value: u8) {
        self.output_level = value & 0b0111_1111;
    }

    pub(super) fn write_sample_address(&mut self, value: u8) {
        self.sample_address = DMC_SAMPLE_BASE + u16::from(value) * DMC_SAMPLE_ADDR_STRIDE;
    }

    pub(super) fn write_sample_length(&mut self, value: u8) {
        self.sample_length = u16::from(value) * DMC_SAMPLE_LEN_STRIDE + 1;
    }

    /// `$4015` bit 4. Enabling an idle channel restarts the sample; disabling
    /// drops the remaining bytes and any fetch still in flight.
    pub(super) fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            if self.bytes_remaining == 0 {
                self.restart_sample();
            }
        } else {
            self.bytes_remaining = 0;
            self.fetch_pending = false;
            self.request = None;
        }
    }

    pub(super) fn clear_irq(&mut self) {
        self.irq = false;
    }

    pub(super) fn irq(&self) -> bool {
        self.irq
    }

    /// Bytes left in the current sample.
    pub(super) fn active(&self) -> bool {
        self.bytes_remaining > 0
    }

    pub(super) fn output(&self) -> u8 {
        self.output_level
    }

    /// Clocked every CPU cycle.
    pub(super) fn step(&mut self) {
        if self.timer == 0 {
            self.timer = self.timer_period;
            self.clock_output();
        } else {
            self.timer -= 1;
        }

        if self.sample_buffer.is_none() && self.bytes_remaining > 0 && !self.fetch_pending {
            self.fetch_pending = true;
            self.request = Some(self.current_address);
        }
    }

    pub(super) fn take_request(&mut self) -> Option<u16> {
        self.request.take()
    }

    /// Delivers the byte fetched by DMA. Stale deliveries (channel disabled
    /// meanwhile) are dropped.
    pub(super) fn finish_fetch(&mut self, byte: u8) {
        if !self.fetch_pending {
            return;
        }
        self.fetch_pending = false;
        self.sample_buffer = Some(byte);
        self.current_address = match self.current_address {
            0xFFFF => 0x8000,
            addr => addr + 1,
        };
        self.bytes_remaining -= 1;

        if self.bytes_remaining == 0 {
            if self.loop_flag {
                self.restart_sample();
            } else if self.irq_enable {
                self.irq = true;
            }
        }
    }

    pub(super) fn validate(&self) -> Result<(), &'static str> {
        if !(1..=8).contains(&self.bits_remaining) {
            return Err("DMC bit counter out of range");
        }
        if self.output_level > 127 {
            return Err("DMC output level out of range");
        }
        Ok(())
    }

    #[cfg(test)]
    pub(super) fn sample_buffer(&self) -> Option<u8> {
        self.sample_buffer
    }

    fn restart_sample(&mut self) {
        self.current_address = self.sample_address;
        self.bytes_remaining = self.sample_length;
    }

    fn clock_output(&mut self) {
        if !self.silence {
            if self.shift_register & 1 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
            self.shift_register >>= 1;
        }

        self.bits_remaining -= 1;
        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            match self.sample_buffer.take() {
                Some(sample) => {
                    self.shift_register = sample;
                    self.silence = false;
                }
                None => self.silence = true,
            }
        }
    }
}
