use std::fmt::Display;

/// Instruction mnemonics, unofficial opcodes included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Mnemonic {
    //Load/Store
    LAS,
    LAX,
    LDA,
    LDX,
    LDY,
    SAX,
    SHA,
    SHX,
    SHY,
    STA,
    STX,
    STY,
    //Transfer
    SHS,
    TAX,
    TAY,
    TSX,
    TXA,
    TXS,
    TYA,
    //Stack
    PHA,
    PHP,
    PLA,
    PLP,
    //Shift
    ASL,
    LSR,
    ROL,
    ROR,
    //Logic
    AND,
    BIT,
    EOR,
    ORA,
    //Arithmetic
    ADC,
    ANC,
    ARR,
    ASR,
    CMP,
    CPX,
    CPY,
    DCP,
    ISC,
    RLA,
    RRA,
    SBC,
    SBX,
    SLO,
    SRE,
    XAA,
    //Arithmetic: Inc/Dec
    DEC,
    DEX,
    DEY,
    INC,
    INX,
    INY,
    //Control Flow
    BRK,
    JMP,
    JSR,
    RTI,
    RTS,
    //Control Flow: Branch
    BCC,
    BCS,
    BEQ,
    BMI,
    BNE,
    BPL,
    BVC,
    BVS,
    //Flags
    CLC,
    CLD,
    CLI,
    CLV,
    SEC,
    SED,
    SEI,
    //KIL
    JAM,
    //NOP
    NOP,
}

/// How an instruction touches its operand, which decides the bus pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Kind {
    /// Reads one operand byte. Indexed modes pay for a page cross only when
    /// it happens.
    Read,
    /// Writes to the effective address. Indexed modes always spend the
    /// fix-up cycle.
    Store,
    /// Read, write back the old value, write the new one.
    ReadModifyWrite,
    /// Everything with a bespoke sequence (stack, jumps, branches, implied).
    Other,
}

impl Mnemonic {
    pub(crate) const fn kind(self) -> Kind {
        use Mnemonic::*;
        match self {
            LAS | LAX | LDA | LDX | LDY | AND | BIT | EOR | ORA | ADC | ANC | ARR | ASR | CMP
            | CPX | CPY | SBC | SBX | XAA | NOP => Kind::Read,
            SAX | STA | STX | STY | SHA | SHX | SHY | SHS => Kind::Store,
            ASL | LSR | ROL | ROR | DEC | INC | DCP | ISC | RLA | RRA | SLO | SRE => {
                Kind::ReadModifyWrite
            }
            _ => Kind::Other,
        }
    }
}

impl Display for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
