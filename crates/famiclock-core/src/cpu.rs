//! Ricoh 2A03 CPU core: a 6502 without decimal mode.
//!
//! [`Cpu::step`] runs one instruction and, when one is due, the interrupt
//! sequence after it. Every bus access is one CPU cycle, dummy reads and
//! writes included, so register side effects land on the cycle real
//! hardware performs them.
//!
//! Interrupt lines are sampled at the end of every cycle. An instruction is
//! followed by an interrupt only if the line was already asserted at the end
//! of its second-to-last cycle.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::bus::{Bus, STACK_ADDR};
use crate::cpu::addressing::Addressing;
use crate::cpu::lookup::{Instruction, LOOKUP_TABLE};
use crate::cpu::mnemonic::{Kind, Mnemonic};
use crate::memory::cpu as cpu_mem;

mod addressing;
mod lookup;
mod mnemonic;
mod status;
#[cfg(test)]
mod timing;

pub use status::Status;

/// Programmer-visible registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CpuRegisters {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub p: u8,
    pub pc: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    // Registers
    a: u8,     //Accumulator
    x: u8,     //X Index Register
    y: u8,     //Y Index Register
    s: u8,     //Stack Pointer
    p: Status, //Processor Status
    pc: u16,   //Program Counter

    /// A JAM opcode stopped the core. Only reset recovers.
    jammed: bool,

    /// NMI edge seen and not yet serviced.
    need_nmi: bool,
    prev_need_nmi: bool,
    prev_nmi_line: bool,
    /// IRQ asserted and not masked, as of the end of the last cycle.
    run_irq: bool,
    prev_run_irq: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            a: 0x00,
            x: 0x00,
            y: 0x00,
            s: 0xFD,
            p: Status::POWER_ON,
            pc: 0x0000,
            jammed: false,
            need_nmi: false,
            prev_need_nmi: false,
            prev_nmi_line: false,
            run_irq: false,
            prev_run_irq: false,
        }
    }

    /// Cold boot: clears the registers and runs the 7-cycle reset sequence,
    /// which leaves S at `$FD` and PC at the reset vector.
    pub fn power_on(&mut self, bus: &mut impl Bus) {
        *self = Self::new();
        self.s = 0x00;
        self.reset(bus);
        self.p = Status::POWER_ON;
    }

    /// Warm reset. A, X and Y survive; S drops by three as if three bytes had
    /// been pushed (the writes are suppressed) and I is set.
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.jammed = false;
        self.need_nmi = false;
        self.prev_need_nmi = false;
        self.run_irq = false;
        self.prev_run_irq = false;

        self.dummy_read(bus, self.pc);
        self.dummy_read(bus, self.pc);
        for _ in 0..3 {
            self.dummy_read(bus, STACK_ADDR | self.s as u16);
            self.s = self.s.wrapping_sub(1);
        }
        self.p.insert(Status::INTERRUPT);
        self.pc = self.read_vector(bus, cpu_mem::RESET_VECTOR_LO);
        trace!(pc = format_args!("{:#06X}", self.pc), "CPU reset");
    }

    pub fn registers(&self) -> CpuRegisters {
        CpuRegisters {
            a: self.a,
            x: self.x,
            y: self.y,
            s: self.s,
            p: self.p.bits(),
            pc: self.pc,
        }
    }

    pub fn set_registers(&mut self, regs: CpuRegisters) {
        self.a = regs.a;
        self.x = regs.x;
        self.y = regs.y;
        self.s = regs.s;
        self.p = Status::from_bits_truncate(regs.p);
        self.pc = regs.pc;
    }

    pub fn is_jammed(&self) -> bool {
        self.jammed
    }

    /// Executes one instruction plus a pending interrupt sequence.
    ///
    /// A jammed CPU burns a single idle cycle per call so the rest of the
    /// console keeps running.
    pub fn step(&mut self, bus: &mut impl Bus) {
        if self.jammed {
            bus.idle();
            self.end_cycle(&*bus);
            return;
        }

        let opcode = self.fetch(bus);
        let instr = LOOKUP_TABLE[opcode as usize];
        self.execute(instr, bus);

        if self.prev_run_irq || self.prev_need_nmi {
            self.interrupt(bus);
        }
    }

    // ---------------------------------------------------------------------
    // Cycle primitives
    // ---------------------------------------------------------------------

    /// Samples the interrupt lines after a bus cycle.
    fn end_cycle(&mut self, bus: &impl Bus) {
        self.prev_need_nmi = self.need_nmi;
        let nmi = bus.nmi_line();
        if nmi && !self.prev_nmi_line {
            self.need_nmi = true;
        }
        self.prev_nmi_line = nmi;

        self.prev_run_irq = self.run_irq;
        self.run_irq = bus.irq_line() && !self.p.contains(Status::INTERRUPT);
    }

    fn read(&mut self, bus: &mut impl Bus, addr: u16) -> u8 {
        let value = bus.read(addr);
        self.end_cycle(&*bus);
        value
    }

    fn dummy_read(&mut self, bus: &mut impl Bus, addr: u16) {
        let _ = self.read(bus, addr);
    }

    fn write(&mut self, bus: &mut impl Bus, addr: u16, data: u8) {
        bus.write(addr, data);
        self.end_cycle(&*bus);
    }

    fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = self.read(bus, self.pc);
        self.incr_pc();
        value
    }

    fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn read_vector(&mut self, bus: &mut impl Bus, addr: u16) -> u16 {
        let lo = self.read(bus, addr);
        let hi = self.read(bus, addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn push(&mut self, bus: &mut impl Bus, data: u8) {
        self.write(bus, STACK_ADDR | self.s as u16, data);
        self.s = self.s.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.s = self.s.wrapping_add(1);
        self.read(bus, STACK_ADDR | self.s as u16)
    }

    fn push_word(&mut self, bus: &mut impl Bus, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push(bus, hi);
        self.push(bus, lo);
    }

    #[inline]
    fn incr_pc(&mut self) {
        self.pc = self.pc.wrapping_add(1);
    }

    // ---------------------------------------------------------------------
    // Interrupts
    // ---------------------------------------------------------------------

    /// IRQ/NMI entry. An NMI that arrives before the vector fetch takes over
    /// the sequence, even when it began as an IRQ.
    fn interrupt(&mut self, bus: &mut impl Bus) {
        self.dummy_read(bus, self.pc);
        self.dummy_read(bus, self.pc);
        self.push_word(bus, self.pc);
        let vector = self.hijackable_vector(cpu_mem::IRQ_VECTOR_LO);
        self.push(bus, self.p.to_stack(false));
        self.p.insert(Status::INTERRUPT);
        self.pc = self.read_vector(bus, vector);
        trace!(
            vector = format_args!("{vector:#06X}"),
            pc = format_args!("{:#06X}", self.pc),
            "interrupt"
        );
    }

    /// Vector for a BRK/IRQ sequence, swapped for the NMI vector when an NMI
    /// edge is pending.
    fn hijackable_vector(&mut self, vector: u16) -> u16 {
        if self.need_nmi {
            self.need_nmi = false;
            cpu_mem::NMI_VECTOR_LO
        } else {
            vector
        }
    }

    // ---------------------------------------------------------------------
    // Addressing
    // ---------------------------------------------------------------------

    /// `base + index` with the fix-up read on the unfixed address. Reads only
    /// pay for it when the page changes.
    fn indexed(&mut self, bus: &mut impl Bus, base: u16, index: u8, always: bool) -> u16 {
        let addr = base.wrapping_add(index as u16);
        if always || page_crossed(base, addr) {
            self.dummy_read(bus, (base & 0xFF00) | (addr & 0x00FF));
        }
        addr
    }

    fn zero_page_indexed(&mut self, bus: &mut impl Bus, index: u8) -> u16 {
        let base = self.fetch(bus);
        self.dummy_read(bus, base as u16);
        base.wrapping_add(index) as u16
    }

    fn zero_page_pointer(&mut self, bus: &mut impl Bus, ptr: u8) -> u16 {
        let lo = self.read(bus, ptr as u16);
        let hi = self.read(bus, ptr.wrapping_add(1) as u16);
        u16::from_le_bytes([lo, hi])
    }

    /// Base address and index for the modes that can cross a page.
    fn indexed_base(&mut self, bus: &mut impl Bus, mode: Addressing) -> (u16, u8) {
        match mode {
            Addressing::AbsoluteX => (self.fetch_word(bus), self.x),
            Addressing::AbsoluteY => (self.fetch_word(bus), self.y),
            Addressing::IndirectY => {
                let ptr = self.fetch(bus);
                (self.zero_page_pointer(bus, ptr), self.y)
            }
            _ => unreachable!("{mode:?} is not indexed"),
        }
    }

    /// Effective address for memory operands. `always_fix` selects store and
    /// read-modify-write timing for the indexed modes.
    fn effective_addr(&mut self, bus: &mut impl Bus, mode: Addressing, always_fix: bool) -> u16 {
        match mode {
            Addressing::ZeroPage => self.fetch(bus) as u16,
            Addressing::ZeroPageX => self.zero_page_indexed(bus, self.x),
            Addressing::ZeroPageY => self.zero_page_indexed(bus, self.y),
            Addressing::Absolute => self.fetch_word(bus),
            Addressing::AbsoluteX | Addressing::AbsoluteY | Addressing::IndirectY => {
                let (base, index) = self.indexed_base(bus, mode);
                self.indexed(bus, base, index, always_fix)
            }
            Addressing::IndirectX => {
                let ptr = self.fetch(bus);
                self.dummy_read(bus, ptr as u16);
                self.zero_page_pointer(bus, ptr.wrapping_add(self.x))
            }
            _ => unreachable!("{mode:?} has no memory operand"),
        }
    }

    /// Operand value for read instructions.
    fn read_operand(&mut self, bus: &mut impl Bus, mode: Addressing) -> u8 {
        match mode {
            Addressing::Immediate => self.fetch(bus),
            Addressing::Implied | Addressing::Accumulator => {
                self.dummy_read(bus, self.pc);
                self.a
            }
            _ => {
                let addr = self.effective_addr(bus, mode, false);
                self.read(bus, addr)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    fn execute(&mut self, instr: Instruction, bus: &mut impl Bus) {
        use Mnemonic::*;

        let Instruction {
            mnemonic,
            addressing,
        } = instr;
        match mnemonic.kind() {
            Kind::Read => {
                let value = self.read_operand(bus, addressing);
                self.apply_read(mnemonic, value);
            }
            Kind::Store => match mnemonic {
                SHA => self.unstable_store(bus, addressing, self.a & self.x),
                SHX => self.unstable_store(bus, addressing, self.x),
                SHY => self.unstable_store(bus, addressing, self.y),
                SHS => {
                    self.s = self.a & self.x;
                    self.unstable_store(bus, addressing, self.s);
                }
                _ => {
                    let addr = self.effective_addr(bus, addressing, true);
                    let value = match mnemonic {
                        STA => self.a,
                        STX => self.x,
                        STY => self.y,
                        _ => self.a & self.x,
                    };
                    self.write(bus, addr, value);
                }
            },
            Kind::ReadModifyWrite if addressing == Addressing::Accumulator => {
                self.dummy_read(bus, self.pc);
                self.a = self.modify(mnemonic, self.a);
            }
            Kind::ReadModifyWrite => {
                let addr = self.effective_addr(bus, addressing, true);
                let value = self.read(bus, addr);
                self.write(bus, addr, value);
                let result = self.modify(mnemonic, value);
                self.write(bus, addr, result);
                self.combine(mnemonic, result);
            }
            Kind::Other => self.execute_other(mnemonic, addressing, bus),
        }
    }

    fn apply_read(&mut self, mnemonic: Mnemonic, value: u8) {
        use Mnemonic::*;

        match mnemonic {
            LDA => self.set_a(value),
            LDX => self.set_x(value),
            LDY => self.set_y(value),
            LAX => {
                self.x = value;
                self.set_a(value);
            }
            LAS => {
                let result = value & self.s;
                self.s = result;
                self.x = result;
                self.set_a(result);
            }
            AND => self.set_a(self.a & value),
            ORA => self.set_a(self.a | value),
            EOR => self.set_a(self.a ^ value),
            ADC => self.adc(value),
            SBC => self.adc(!value),
            CMP => self.compare(self.a, value),
            CPX => self.compare(self.x, value),
            CPY => self.compare(self.y, value),
            BIT => {
                self.p.set(Status::ZERO, self.a & value == 0);
                self.p.set(Status::OVERFLOW, value & 0x40 != 0);
                self.p.set(Status::NEGATIVE, value & 0x80 != 0);
            }
            ANC => {
                self.set_a(self.a & value);
                self.p.set(Status::CARRY, self.a & 0x80 != 0);
            }
            ASR => {
                let masked = self.a & value;
                self.p.set(Status::CARRY, masked & 0x01 != 0);
                self.set_a(masked >> 1);
            }
            ARR => {
                let carry = self.p.contains(Status::CARRY) as u8;
                let result = ((self.a & value) >> 1) | (carry << 7);
                self.set_a(result);
                self.p.set(Status::CARRY, result & 0x40 != 0);
                self.p
                    .set(Status::OVERFLOW, ((result >> 6) ^ (result >> 5)) & 0x01 != 0);
            }
            SBX => {
                let masked = self.a & self.x;
                self.p.set(Status::CARRY, masked >= value);
                self.set_x(masked.wrapping_sub(value));
            }
            XAA => self.set_a((self.a | 0xEE) & self.x & value),
            NOP => {}
            _ => unreachable!("{mnemonic} is not a read instruction"),
        }
    }

    /// The modify step of read-modify-write instructions.
    fn modify(&mut self, mnemonic: Mnemonic, value: u8) -> u8 {
        use Mnemonic::*;

        let carry_in = self.p.contains(Status::CARRY) as u8;
        let (result, carry) = match mnemonic {
            ASL | SLO => (value << 1, Some(value & 0x80 != 0)),
            LSR | SRE => (value >> 1, Some(value & 0x01 != 0)),
            ROL | RLA => ((value << 1) | carry_in, Some(value & 0x80 != 0)),
            ROR | RRA => ((value >> 1) | (carry_in << 7), Some(value & 0x01 != 0)),
            INC | ISC => (value.wrapping_add(1), None),
            DEC | DCP => (value.wrapping_sub(1), None),
            _ => unreachable!("{mnemonic} is not read-modify-write"),
        };
        if let Some(carry) = carry {
            self.p.set(Status::CARRY, carry);
        }
        self.p.set_zn(result);
        result
    }

    /// Second half of the unofficial combined read-modify-write opcodes.
    fn combine(&mut self, mnemonic: Mnemonic, result: u8) {
        use Mnemonic::*;

        match mnemonic {
            SLO => self.set_a(self.a | result),
            RLA => self.set_a(self.a & result),
            SRE => self.set_a(self.a ^ result),
            RRA => self.adc(result),
            DCP => self.compare(self.a, result),
            ISC => self.adc(!result),
            _ => {}
        }
    }

    /// SHA/SHX/SHY/SHS: store `value & (high byte of base + 1)`. On a page
    /// cross the high byte of the target address is corrupted the same way.
    fn unstable_store(&mut self, bus: &mut impl Bus, mode: Addressing, value: u8) {
        let (base, index) = self.indexed_base(bus, mode);
        let addr = self.indexed(bus, base, index, true);
        let high = ((base >> 8) as u8).wrapping_add(1);
        let data = value & high;
        let addr = if page_crossed(base, addr) {
            ((data as u16) << 8) | (addr & 0x00FF)
        } else {
            addr
        };
        self.write(bus, addr, data);
    }

    fn execute_other(&mut self, mnemonic: Mnemonic, mode: Addressing, bus: &mut impl Bus) {
        use Mnemonic::*;

        match mnemonic {
            BPL => self.branch(bus, !self.p.contains(Status::NEGATIVE)),
            BMI => self.branch(bus, self.p.contains(Status::NEGATIVE)),
            BVC => self.branch(bus, !self.p.contains(Status::OVERFLOW)),
            BVS => self.branch(bus, self.p.contains(Status::OVERFLOW)),
            BCC => self.branch(bus, !self.p.contains(Status::CARRY)),
            BCS => self.branch(bus, self.p.contains(Status::CARRY)),
            BNE => self.branch(bus, !self.p.contains(Status::ZERO)),
            BEQ => self.branch(bus, self.p.contains(Status::ZERO)),

            JMP if mode == Addressing::Absolute => self.pc = self.fetch_word(bus),
            JMP => {
                let ptr = self.fetch_word(bus);
                let lo = self.read(bus, ptr);
                let hi = self.read(bus, (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF));
                self.pc = u16::from_le_bytes([lo, hi]);
            }
            JSR => {
                let lo = self.fetch(bus);
                self.dummy_read(bus, STACK_ADDR | self.s as u16);
                self.push_word(bus, self.pc);
                let hi = self.read(bus, self.pc);
                self.pc = u16::from_le_bytes([lo, hi]);
            }
            RTS => {
                self.dummy_read(bus, self.pc);
                self.dummy_read(bus, STACK_ADDR | self.s as u16);
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                self.pc = u16::from_le_bytes([lo, hi]);
                self.dummy_read(bus, self.pc);
                self.incr_pc();
            }
            RTI => {
                self.dummy_read(bus, self.pc);
                self.dummy_read(bus, STACK_ADDR | self.s as u16);
                let p = self.pull(bus);
                self.p = Status::from_stack(p);
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                self.pc = u16::from_le_bytes([lo, hi]);
            }
            BRK => {
                // Padding byte.
                let _ = self.fetch(bus);
                self.push_word(bus, self.pc);
                let vector = self.hijackable_vector(cpu_mem::IRQ_VECTOR_LO);
                self.push(bus, self.p.to_stack(true));
                self.p.insert(Status::INTERRUPT);
                self.pc = self.read_vector(bus, vector);
                // The next instruction always runs before a pending NMI.
                self.prev_need_nmi = false;
            }

            PHA => {
                self.dummy_read(bus, self.pc);
                self.push(bus, self.a);
            }
            PHP => {
                self.dummy_read(bus, self.pc);
                self.push(bus, self.p.to_stack(true));
            }
            PLA => {
                self.dummy_read(bus, self.pc);
                self.dummy_read(bus, STACK_ADDR | self.s as u16);
                let value = self.pull(bus);
                self.set_a(value);
            }
            PLP => {
                self.dummy_read(bus, self.pc);
                self.dummy_read(bus, STACK_ADDR | self.s as u16);
                let value = self.pull(bus);
                self.p = Status::from_stack(value);
            }

            JAM => {
                self.dummy_read(bus, self.pc);
                self.jammed = true;
                warn!(
                    pc = format_args!("{:#06X}", self.pc.wrapping_sub(1)),
                    "CPU jammed"
                );
            }

            _ => {
                self.dummy_read(bus, self.pc);
                self.implied(mnemonic);
            }
        }
    }

    /// Register-only instructions. Their single bus cycle is already spent.
    fn implied(&mut self, mnemonic: Mnemonic) {
        use Mnemonic::*;

        match mnemonic {
            TAX => self.set_x(self.a),
            TAY => self.set_y(self.a),
            TXA => self.set_a(self.x),
            TYA => self.set_a(self.y),
            TSX => self.set_x(self.s),
            TXS => self.s = self.x,
            INX => self.set_x(self.x.wrapping_add(1)),
            INY => self.set_y(self.y.wrapping_add(1)),
            DEX => self.set_x(self.x.wrapping_sub(1)),
            DEY => self.set_y(self.y.wrapping_sub(1)),
            CLC => self.p.remove(Status::CARRY),
            SEC => self.p.insert(Status::CARRY),
            CLI => self.p.remove(Status::INTERRUPT),
            SEI => self.p.insert(Status::INTERRUPT),
            CLD => self.p.remove(Status::DECIMAL),
            SED => self.p.insert(Status::DECIMAL),
            CLV => self.p.remove(Status::OVERFLOW),
            _ => unreachable!("{mnemonic} is not implied"),
        }
    }

    /// Relative branch. A taken branch that stays on its page hides an
    /// interrupt that showed up during its operand fetch for one more
    /// instruction.
    fn branch(&mut self, bus: &mut impl Bus, taken: bool) {
        let offset = self.fetch(bus) as i8;
        if !taken {
            return;
        }

        let fresh_irq = self.run_irq && !self.prev_run_irq;
        let fresh_nmi = self.need_nmi && !self.prev_need_nmi;
        if fresh_irq {
            self.run_irq = false;
        }

        self.dummy_read(bus, self.pc);
        let target = self.pc.wrapping_add(offset as u16);
        if page_crossed(self.pc, target) {
            self.dummy_read(bus, (self.pc & 0xFF00) | (target & 0x00FF));
        } else if fresh_nmi {
            self.prev_need_nmi = false;
        }
        self.pc = target;
    }

    // ---------------------------------------------------------------------
    // ALU helpers
    // ---------------------------------------------------------------------

    fn set_a(&mut self, value: u8) {
        self.a = value;
        self.p.set_zn(value);
    }

    fn set_x(&mut self, value: u8) {
        self.x = value;
        self.p.set_zn(value);
    }

    fn set_y(&mut self, value: u8) {
        self.y = value;
        self.p.set_zn(value);
    }

    /// Binary add with carry. SBC feeds the complement of its operand.
    fn adc(&mut self, value: u8) {
        let carry = self.p.contains(Status::CARRY) as u16;
        let sum = self.a as u16 + value as u16 + carry;
        let result = sum as u8;
        self.p.set(Status::CARRY, sum > 0xFF);
        self.p.set(
            Status::OVERFLOW,
            (!(self.a ^ value) & (self.a ^ result) & 0x80) != 0,
        );
        self.set_a(result);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.p.set(Status::CARRY, register >= value);
        self.p.set_zn(register.wrapping_sub(value));
    }
}

#[inline]
fn page_crossed(a: u16, b: u16) -> bool {
    (a ^ b) & 0xFF00 != 0
}

impl Display for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[a:0x{:02x},x:0x{:02x},y:0x{:02x},s:0x{:02x},p:0x{:02x},pc:0x{:04x}]",
            self.a,
            self.x,
            self.y,
            self.s,
            self.p.bits(),
            self.pc
        )
    }
}
