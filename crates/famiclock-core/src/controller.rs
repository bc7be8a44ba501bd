//! Standard NES controller (joypad).
//!
//! The pad is an 8-bit parallel-in/serial-out shift register read through
//! `$4016/$4017`. Bit 0 of a `$4016` write drives the strobe line of both
//! ports.

use serde::{Deserialize, Serialize};

/// Button ordering follows the shift register layout (A first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    A = 0,
    B = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
    ];
}

/// Serially readable controller state with latch/strobe behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    strobe: bool,
    shift: u8,
    buttons: u8,
}

impl Controller {
    pub const fn new() -> Self {
        Self {
            strobe: false,
            shift: 0,
            buttons: 0,
        }
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        let bit = 1u8 << (button as u8);
        if pressed {
            self.buttons |= bit;
        } else {
            self.buttons &= !bit;
        }
        if self.strobe {
            self.shift = self.buttons;
        }
    }

    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    /// `$4016` write. While strobe is high the register keeps reloading.
    pub fn write_strobe(&mut self, data: u8) {
        self.strobe = data & 0x01 != 0;
        if self.strobe {
            self.shift = self.buttons;
        }
    }

    /// Clocks out the next button in bit 0. Once all eight are gone the
    /// serial line reads 1.
    pub fn read(&mut self) -> u8 {
        if self.strobe {
            return self.buttons & 0x01;
        }
        let bit = self.shift & 0x01;
        self.shift = (self.shift >> 1) | 0x80;
        bit
    }

    /// The bit the next [`Self::read`] would return.
    pub fn peek(&self) -> u8 {
        if self.strobe {
            self.buttons & 0x01
        } else {
            self.shift & 0x01
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_buttons_in_order_then_ones() {
        let mut pad = Controller::new();
        pad.set_button(Button::A, true);
        pad.set_button(Button::Start, true);
        pad.set_button(Button::Right, true);
        pad.write_strobe(1);
        pad.write_strobe(0);

        let bits: Vec<u8> = (0..10).map(|_| pad.read()).collect();
        assert_eq!(bits, [1, 0, 0, 1, 0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn strobe_high_keeps_returning_a() {
        let mut pad = Controller::new();
        pad.write_strobe(1);
        assert_eq!(pad.read(), 0);
        pad.set_button(Button::A, true);
        assert_eq!(pad.read(), 1);
        assert_eq!(pad.read(), 1);
    }

    #[test]
    fn releasing_strobe_freezes_the_snapshot() {
        let mut pad = Controller::new();
        pad.set_button(Button::B, true);
        pad.write_strobe(1);
        pad.write_strobe(0);
        pad.set_button(Button::B, false);
        assert_eq!(pad.read(), 0);
        assert_eq!(pad.read(), 1);
    }
}
