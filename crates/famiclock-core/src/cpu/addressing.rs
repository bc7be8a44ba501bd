/// Addressing modes of the 6502.
///
/// The mode decides how many operand bytes follow the opcode and which
/// (dummy) bus accesses happen before the operation itself runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Addressing {
    /// No operand. The CPU still reads the byte after the opcode and throws
    /// it away.
    ///
    /// # Examples
    /// - `CLC`
    /// - `NOP`
    Implied,

    /// Operates on the accumulator (`ASL A`). Same bus pattern as
    /// [`Addressing::Implied`].
    Accumulator,

    /// The byte after the opcode is the operand (`LDA #$42`).
    Immediate,

    /// Full 16-bit address (`LDA $1234`).
    Absolute,

    /// `address + X`. Reads take an extra cycle when the page changes;
    /// stores and read-modify-write always spend it.
    AbsoluteX,

    /// `address + Y`, same timing rules as [`Addressing::AbsoluteX`].
    AbsoluteY,

    /// `JMP ($1234)`. The pointer's high byte is fetched without carrying
    /// into the page (`JMP ($10FF)` reads `$10FF` and `$1000`).
    Indirect,

    /// Single-byte address in page zero (`LDA $42`).
    ZeroPage,

    /// `(address + X) & $FF`, never leaves page zero.
    ZeroPageX,

    /// `(address + Y) & $FF`, used by `LDX`/`STX` and a few unofficial ops.
    ZeroPageY,

    /// `($nn,X)`: pointer in page zero, indexed before dereferencing.
    IndirectX,

    /// `($nn),Y`: pointer in page zero, indexed after dereferencing.
    IndirectY,

    /// Signed 8-bit branch offset.
    Relative,
}

impl Addressing {
    /// Modes whose effective address can land on another page than the base.
    #[cfg(test)]
    pub const fn maybe_cross_page(self) -> bool {
        matches!(
            self,
            Addressing::AbsoluteX | Addressing::AbsoluteY | Addressing::IndirectY
        )
    }
}
