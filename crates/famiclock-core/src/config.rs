use serde::{Deserialize, Serialize};

use crate::ppu::buffer::ColorFormat;

/// Host-facing knobs of a console instance.
///
/// None of these influence emulation timing; they only shape what the core
/// hands to its collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NesConfig {
    /// Rate of the mixed audio stream, in Hz.
    pub sample_rate: u32,
    /// Pixel packing the frontend asks [`crate::Nes::write_frame`] for.
    pub color_format: ColorFormat,
    /// Linear gain applied to mixed samples, `0.0..=1.0`.
    pub master_volume: f32,
}

impl NesConfig {
    pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.max(1);
        self
    }
}

impl Default for NesConfig {
    fn default() -> Self {
        Self {
            sample_rate: Self::DEFAULT_SAMPLE_RATE,
            color_format: ColorFormat::Rgba8888,
            master_volume: 1.0,
        }
    }
}
