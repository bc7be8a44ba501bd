//! Reference cycle counts per opcode.
//!
//! The CPU does not consult this table: its timing falls out of the bus
//! accesses each addressing mode performs. The table pins those sequences
//! down in tests.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Timing {
    Fixed(u8),
    PageCross(u8),
    Branch(u8),
}

const fn f(cycle: u8) -> Timing {
    Timing::Fixed(cycle)
}

const fn p(cycle: u8) -> Timing {
    Timing::PageCross(cycle)
}

const fn b(cycle: u8) -> Timing {
    Timing::Branch(cycle)
}

impl Timing {
    pub(crate) const fn basic_cycles(&self) -> u64 {
        match self {
            Timing::Fixed(c) | Timing::PageCross(c) | Timing::Branch(c) => *c as u64,
        }
    }

    pub(crate) const fn total_cycles(&self, page_crossed: bool, branch_taken: bool) -> u64 {
        let mut total = self.basic_cycles();
        if page_crossed && matches!(self, Timing::PageCross(_)) {
            total += 1;
        }

        if branch_taken && matches!(self, Timing::Branch(_)) {
            total += 1;
            if page_crossed {
                total += 1;
            }
        }
        total
    }
}

/// `f(0)` marks the JAM opcodes, which never finish.
#[rustfmt::skip]
pub(crate) static CYCLE_TABLE: [Timing; 256] = [
    f(7), f(6), f(0), f(8), f(3), f(3), f(5), f(5), f(3), f(2), f(2), f(2), f(4), f(4), f(6), f(6),
    b(2), p(5), f(0), f(8), f(4), f(4), f(6), f(6), f(2), p(4), f(2), f(7), p(4), p(4), f(7), f(7),
    f(6), f(6), f(0), f(8), f(3), f(3), f(5), f(5), f(4), f(2), f(2), f(2), f(4), f(4), f(6), f(6),
    b(2), p(5), f(0), f(8), f(4), f(4), f(6), f(6), f(2), p(4), f(2), f(7), p(4), p(4), f(7), f(7),
    f(6), f(6), f(0), f(8), f(3), f(3), f(5), f(5), f(3), f(2), f(2), f(2), f(3), f(4), f(6), f(6),
    b(2), p(5), f(0), f(8), f(4), f(4), f(6), f(6), f(2), p(4), f(2), f(7), p(4), p(4), f(7), f(7),
    f(6), f(6), f(0), f(8), f(3), f(3), f(5), f(5), f(4), f(2), f(2), f(2), f(5), f(4), f(6), f(6),
    b(2), p(5), f(0), f(8), f(4), f(4), f(6), f(6), f(2), p(4), f(2), f(7), p(4), p(4), f(7), f(7),
    f(2), f(6), f(2), f(6), f(3), f(3), f(3), f(3), f(2), f(2), f(2), f(2), f(4), f(4), f(4), f(4),
    b(2), f(6), f(0), f(6), f(4), f(4), f(4), f(4), f(2), f(5), f(2), f(5), f(5), f(5), f(5), f(5),
    f(2), f(6), f(2), f(6), f(3), f(3), f(3), f(3), f(2), f(2), f(2), f(2), f(4), f(4), f(4), f(4),
    b(2), p(5), f(0), p(5), f(4), f(4), f(4), f(4), f(2), p(4), f(2), p(4), p(4), p(4), p(4), p(4),
    f(2), f(6), f(2), f(8), f(3), f(3), f(5), f(5), f(2), f(2), f(2), f(2), f(4), f(4), f(6), f(6),
    b(2), p(5), f(0), f(8), f(4), f(4), f(6), f(6), f(2), p(4), f(2), f(7), p(4), p(4), f(7), f(7),
    f(2), f(6), f(2), f(8), f(3), f(3), f(5), f(5), f(2), f(2), f(2), f(2), f(4), f(4), f(6), f(6),
    b(2), p(5), f(0), f(8), f(4), f(4), f(6), f(6), f(2), p(4), f(2), f(7), p(4), p(4), f(7), f(7),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockBus;
    use crate::cpu::lookup::LOOKUP_TABLE;
    use crate::cpu::mnemonic::Mnemonic;
    use crate::cpu::{Cpu, CpuRegisters};

    const ORIGIN: u16 = 0x0200;

    /// Runs `program` as a single instruction and returns its cycle count.
    fn cycles_of(program: &[u8], index: u8, p: u8) -> u64 {
        let mut bus = MockBus::with_program(ORIGIN, program);
        // ($10) -> $0210
        bus.mem[0x10] = 0x10;
        bus.mem[0x11] = 0x02;
        let mut cpu = Cpu::new();
        cpu.set_registers(CpuRegisters {
            a: 0,
            x: index,
            y: index,
            s: 0xFD,
            p,
            pc: ORIGIN,
        });
        cpu.step(&mut bus);
        bus.cycles
    }

    fn is_branch(opcode: u8) -> bool {
        matches!(CYCLE_TABLE[opcode as usize], Timing::Branch(_))
    }

    /// With P = 0 the branches on a clear flag are taken.
    fn taken_with_clear_flags(opcode: u8) -> bool {
        matches!(
            LOOKUP_TABLE[opcode as usize].mnemonic,
            Mnemonic::BPL | Mnemonic::BVC | Mnemonic::BCC | Mnemonic::BNE
        )
    }

    #[test]
    fn every_opcode_matches_the_cycle_table_without_page_cross() {
        for opcode in 0..=0xFFu8 {
            let timing = CYCLE_TABLE[opcode as usize];
            if timing == Timing::Fixed(0) || is_branch(opcode) {
                continue;
            }
            let cycles = cycles_of(&[opcode, 0x10, 0x02], 0, 0);
            assert_eq!(
                cycles,
                timing.total_cycles(false, false),
                "opcode {opcode:#04X} ({})",
                LOOKUP_TABLE[opcode as usize]
            );
        }
    }

    #[test]
    fn every_opcode_matches_the_cycle_table_with_page_cross() {
        for opcode in 0..=0xFFu8 {
            let timing = CYCLE_TABLE[opcode as usize];
            if timing == Timing::Fixed(0) || is_branch(opcode) {
                continue;
            }
            let addressing = LOOKUP_TABLE[opcode as usize].addressing;
            let cycles = cycles_of(&[opcode, 0x10, 0x02], 0xFF, 0);
            assert_eq!(
                cycles,
                timing.total_cycles(addressing.maybe_cross_page(), false),
                "opcode {opcode:#04X} ({})",
                LOOKUP_TABLE[opcode as usize]
            );
        }
    }

    #[test]
    fn branches_cost_two_three_or_four_cycles() {
        for opcode in (0..=0xFFu8).filter(|op| is_branch(*op)) {
            let timing = CYCLE_TABLE[opcode as usize];
            let taken = taken_with_clear_flags(opcode);
            // Forward within the page.
            assert_eq!(
                cycles_of(&[opcode, 0x10], 0, 0),
                timing.total_cycles(false, taken),
                "opcode {opcode:#04X}"
            );
            // Back into page $01.
            assert_eq!(
                cycles_of(&[opcode, 0xF0], 0, 0),
                timing.total_cycles(true, taken),
                "opcode {opcode:#04X}"
            );
        }
    }
}
