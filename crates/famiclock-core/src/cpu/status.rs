use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// The 8-bit processor status register (P).
    ///
    /// Bit layout:
    /// 7 6 5 4 3 2 1 0
    /// N V _ B D I Z C
    ///
    /// `B` and the unused bit only exist on the copy pushed to the stack.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Status: u8 {
        /// Carry out of bit 7, or no borrow on subtraction.
        const CARRY     = 0b0000_0001;
        const ZERO      = 0b0000_0010;
        /// Masks IRQ. NMI ignores it.
        const INTERRUPT = 0b0000_0100;
        /// Stored but ignored by the 2A03 ALU.
        const DECIMAL   = 0b0000_1000;
        const BREAK     = 0b0001_0000;
        const UNUSED    = 0b0010_0000;
        const OVERFLOW  = 0b0100_0000;
        const NEGATIVE  = 0b1000_0000;
    }
}

impl Status {
    /// Power-on value.
    pub const POWER_ON: Status = Status::from_bits_truncate(0x34);

    /// Sets Z and N from `value`.
    #[inline]
    pub fn set_zn(&mut self, value: u8) {
        self.set(Status::ZERO, value == 0);
        self.set(Status::NEGATIVE, value & 0x80 != 0);
    }

    /// Byte pushed by PHP/BRK (`brk == true`) or by IRQ/NMI entry.
    #[inline]
    pub fn to_stack(self, brk: bool) -> u8 {
        let mut value = self | Status::UNUSED;
        value.set(Status::BREAK, brk);
        value.bits()
    }

    /// Value restored by PLP/RTI. `B` does not exist in the register.
    #[inline]
    pub fn from_stack(value: u8) -> Self {
        (Status::from_bits_truncate(value) - Status::BREAK) | Status::UNUSED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_copies_toggle_break_only() {
        let p = Status::CARRY | Status::NEGATIVE;
        assert_eq!(p.to_stack(true), 0b1011_0001);
        assert_eq!(p.to_stack(false), 0b1010_0001);
        assert_eq!(Status::from_stack(0xFF).bits(), 0xEF);
    }

    #[test]
    fn zn_tracks_value() {
        let mut p = Status::empty();
        p.set_zn(0);
        assert!(p.contains(Status::ZERO));
        p.set_zn(0x80);
        assert_eq!(p, Status::NEGATIVE);
    }
}
