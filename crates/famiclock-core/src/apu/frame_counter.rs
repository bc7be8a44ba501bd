//! Frame sequencer responsible for clocking envelopes, length counters, and
//! sweep units at quarter- and half-frame intervals.
//!
//! Timings are in CPU cycles counted from the moment a `$4017` write takes
//! effect.

use serde::{Deserialize, Serialize};

/// Frame sequencer timing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrameCounterMode {
    #[default]
    FourStep,
    FiveStep,
}

impl FrameCounterMode {
    fn from_register(value: u8) -> Self {
        if value & 0b1000_0000 == 0 {
            FrameCounterMode::FourStep
        } else {
            FrameCounterMode::FiveStep
        }
    }
}

/// Units to clock after a frame counter step.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) struct FrameTick {
    pub(super) quarter: bool,
    pub(super) half: bool,
    pub(super) frame_irq: bool,
}

/// A `$4017` write waiting for its mode change to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct PendingWrite {
    mode: FrameCounterMode,
    delay: u8,
}

pub(super) const QUARTER_1: u32 = 7457;
pub(super) const HALF_1: u32 = 14913;
pub(super) const QUARTER_3: u32 = 22371;
pub(super) const FOUR_STEP_IRQ: u32 = 29828;
pub(super) const FOUR_STEP_LAST: u32 = 29829;
pub(super) const FOUR_STEP_PERIOD: u32 = 29830;
pub(super) const FIVE_STEP_LAST: u32 = 37281;
pub(super) const FIVE_STEP_PERIOD: u32 = 37282;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(super) struct FrameCounter {
    mode: FrameCounterMode,
    irq_inhibit: bool,
    cycle: u32,
    pending: Option<PendingWrite>,
}

impl FrameCounter {
    pub(super) fn mode(&self) -> FrameCounterMode {
        self.mode
    }

    /// `$4017` write. The inhibit flag applies at once; the sequencer reset
    /// follows 3 CPU cycles later when written on an odd cycle, 4 otherwise.
    pub(super) fn write(&mut self, value: u8, cpu_cycle: u64) {
        self.irq_inhibit = value & 0b0100_0000 != 0;
        self.pending = Some(PendingWrite {
            mode: FrameCounterMode::from_register(value),
            delay: if cpu_cycle & 1 == 1 { 3 } else { 4 },
        });
    }

    /// Console reset: the sequencer restarts in the last written mode.
    pub(super) fn reset(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.mode = pending.mode;
        }
        self.cycle = 0;
    }

    /// Advances one CPU cycle.
    pub(super) fn step(&mut self) -> FrameTick {
        let mut tick = FrameTick::default();
        self.cycle += 1;

        match (self.mode, self.cycle) {
            (_, QUARTER_1 | QUARTER_3) => tick.quarter = true,
            (_, HALF_1) => {
                tick.quarter = true;
                tick.half = true;
            }
            (FrameCounterMode::FourStep, FOUR_STEP_IRQ) => tick.frame_irq = true,
            (FrameCounterMode::FourStep, FOUR_STEP_LAST) => {
                tick.quarter = true;
                tick.half = true;
                tick.frame_irq = true;
            }
            (FrameCounterMode::FourStep, FOUR_STEP_PERIOD) => {
                tick.frame_irq = true;
                self.cycle = 0;
            }
            (FrameCounterMode::FiveStep, FIVE_STEP_LAST) => {
                tick.quarter = true;
                tick.half = true;
            }
            (FrameCounterMode::FiveStep, FIVE_STEP_PERIOD) => self.cycle = 0,
            _ => {}
        }

        if let Some(pending) = self.pending.as_mut() {
            pending.delay -= 1;
            if pending.delay == 0 {
                self.mode = pending.mode;
                self.pending = None;
                self.cycle = 0;
                if self.mode == FrameCounterMode::FiveStep {
                    tick.quarter = true;
                    tick.half = true;
                }
            }
        }

        tick.frame_irq &= !self.irq_inhibit;
        tick
    }

    pub(super) fn validate(&self) -> Result<(), &'static str> {
        let period = match self.mode {
            FrameCounterMode::FourStep => FOUR_STEP_PERIOD,
            FrameCounterMode::FiveStep => FIVE_STEP_PERIOD,
        };
        if self.cycle >= period {
            return Err("frame sequencer cycle out of range");
        }
        if self.pending.is_some_and(|pending| !(1..=4).contains(&pending.delay)) {
            return Err("frame counter write delay out of range");
        }
        Ok(())
    }
}
