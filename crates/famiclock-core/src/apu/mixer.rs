//! Non-linear channel mixer and output decimation.
//!
//! The two DAC networks of the 2A03 are evaluated through tables built at
//! compile time:
//!
//! ```text
//! pulse_out = 95.88 / (8128 / (p1 + p2) + 100)
//! tnd_out   = 159.79 / (1 / (t / 8227 + n / 12241 + d / 22638) + 100)
//! ```

use serde::{Deserialize, Serialize};

use crate::clock::CPU_CLOCK_NTSC;

const PULSE_LEVELS: usize = 31;
const TRIANGLE_LEVELS: usize = 16;
const NOISE_LEVELS: usize = 16;
const DMC_LEVELS: usize = 128;

static PULSE_TABLE: [f32; PULSE_LEVELS] = build_pulse_table();
static TND_TABLE: [f32; TRIANGLE_LEVELS * NOISE_LEVELS * DMC_LEVELS] = build_tnd_table();

const fn build_pulse_table() -> [f32; PULSE_LEVELS] {
    let mut table = [0.0; PULSE_LEVELS];
    let mut i = 1;
    while i < PULSE_LEVELS {
        table[i] = 95.88 / (8128.0 / i as f32 + 100.0);
        i += 1;
    }
    table
}

const fn build_tnd_table() -> [f32; TRIANGLE_LEVELS * NOISE_LEVELS * DMC_LEVELS] {
    let mut table = [0.0; TRIANGLE_LEVELS * NOISE_LEVELS * DMC_LEVELS];
    let mut t = 0;
    while t < TRIANGLE_LEVELS {
        let mut n = 0;
        while n < NOISE_LEVELS {
            let mut d = 0;
            while d < DMC_LEVELS {
                let sum = t as f32 / 8227.0 + n as f32 / 12241.0 + d as f32 / 22638.0;
                if sum > 0.0 {
                    table[tnd_index(t, n, d)] = 159.79 / (1.0 / sum + 100.0);
                }
                d += 1;
            }
            n += 1;
        }
        t += 1;
    }
    table
}

const fn tnd_index(t: usize, n: usize, d: usize) -> usize {
    (t * NOISE_LEVELS + n) * DMC_LEVELS + d
}

/// Channel levels to mixed amplitude in `0.0..~1.0`.
pub(super) fn mix(pulse1: u8, pulse2: u8, triangle: u8, noise: u8, dmc: u8) -> f32 {
    let pulse = PULSE_TABLE[(pulse1 as usize + pulse2 as usize).min(PULSE_LEVELS - 1)];
    let tnd = TND_TABLE[tnd_index(
        (triangle as usize).min(TRIANGLE_LEVELS - 1),
        (noise as usize).min(NOISE_LEVELS - 1),
        (dmc as usize).min(DMC_LEVELS - 1),
    )];
    pulse + tnd
}

/// Box-filter decimator from the CPU rate down to the host sample rate.
///
/// Every CPU cycle contributes one mixer sample; each output sample is the
/// mean of the inputs that fell into its window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(super) struct Resampler {
    sample_rate: u32,
    /// Fractional position inside the current output window, in units of
    /// `1 / CPU_CLOCK_NTSC` samples.
    phase: u64,
    sum: f32,
    count: u32,
    /// Output not yet drained. Not part of a snapshot.
    #[serde(skip)]
    samples: Vec<f32>,
}

impl Resampler {
    pub(super) fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            phase: 0,
            sum: 0.0,
            count: 0,
            samples: Vec::new(),
        }
    }

    pub(super) fn reset(&mut self) {
        self.phase = 0;
        self.sum = 0.0;
        self.count = 0;
        self.samples.clear();
    }

    pub(super) fn push(&mut self, value: f32) {
        self.sum += value;
        self.count += 1;
        self.phase += u64::from(self.sample_rate);
        if self.phase >= u64::from(CPU_CLOCK_NTSC) {
            self.phase -= u64::from(CPU_CLOCK_NTSC);
            self.samples.push(self.sum / self.count as f32);
            self.sum = 0.0;
            self.count = 0;
        }
    }

    pub(super) fn take(&mut self) -> Vec<f32> {
        core::mem::take(&mut self.samples)
    }

    pub(super) fn validate(&self) -> Result<(), &'static str> {
        if self.sample_rate == 0 {
            return Err("sample rate is zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_mixes_to_zero() {
        assert_eq!(mix(0, 0, 0, 0, 0), 0.0);
    }

    #[test]
    fn tables_match_the_closed_form() {
        let pulse = 95.88 / (8128.0 / 20.0 + 100.0);
        assert!((mix(10, 10, 0, 0, 0) - pulse).abs() < 1e-6);

        let tnd = 159.79 / (1.0 / (15.0 / 8227.0 + 7.0 / 12241.0 + 64.0 / 22638.0) + 100.0);
        assert!((mix(0, 0, 15, 7, 64) - tnd).abs() < 1e-6);
    }

    #[test]
    fn full_scale_stays_near_one() {
        let peak = mix(15, 15, 15, 15, 127);
        assert!(peak > 0.9 && peak < 1.1, "peak {peak}");
    }

    #[test]
    fn one_second_of_cycles_yields_sample_rate_outputs() {
        let mut resampler = Resampler::new(44_100);
        for _ in 0..CPU_CLOCK_NTSC {
            resampler.push(0.5);
        }
        let samples = resampler.take();
        assert_eq!(samples.len(), 44_100);
        assert!(samples.iter().all(|&s| (s - 0.5).abs() < 1e-6));
        assert!(resampler.take().is_empty());
    }

    #[test]
    fn zero_sample_rate_fails_validation() {
        let mut resampler = Resampler::new(44_100);
        assert!(resampler.validate().is_ok());
        resampler.sample_rate = 0;
        assert!(resampler.validate().is_err());
    }
}
