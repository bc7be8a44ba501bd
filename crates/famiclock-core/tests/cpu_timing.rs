mod common;

use anyhow::Result;
use common::{RomBuilder, boot, step_costs};

#[test]
fn instruction_cycle_counts() -> Result<()> {
    let rom = RomBuilder::nrom()
        .code(
            0x8000,
            &[
                0xA9, 0x10, // LDA #$10
                0x85, 0x10, // STA $10
                0xE6, 0x10, // INC $10
                0xA2, 0xFF, // LDX #$FF
                0xBD, 0x01, 0x02, // LDA $0201,X (page cross)
                0x9D, 0x00, 0x02, // STA $0200,X
                0x20, 0x20, 0x80, // JSR $8020
                0x08, // PHP
                0x68, // PLA
                0xEA, // NOP
                0x4C, 0x14, 0x80, // JMP $8014
            ],
        )
        .code(0x8020, &[0x60]); // RTS
    let mut nes = boot(&rom)?;
    assert_eq!(nes.cycles(), 7);

    let costs = step_costs(&mut nes, 12);
    assert_eq!(costs, [2, 3, 5, 2, 5, 5, 6, 6, 3, 4, 2, 3]);
    assert_eq!(nes.peek(0x0010), 0x11);
    assert_eq!(nes.cpu_registers().pc, 0x8014);
    assert_eq!(nes.cpu_registers().s, 0xFD);
    Ok(())
}

#[test]
fn branch_costs_depend_on_page_crossing() -> Result<()> {
    let rom = RomBuilder::nrom()
        .code(
            0x8000,
            &[
                0xA2, 0x00, // LDX #0
                0xD0, 0x02, // BNE (not taken)
                0xF0, 0x00, // BEQ +0 (taken, same page)
                0x4C, 0xFB, 0x80, // JMP $80FB
            ],
        )
        .code(0x80FB, &[0xF0, 0x10]) // BEQ $810D (taken, next page)
        .code(0x810D, &[0x4C, 0x0D, 0x81]);
    let mut nes = boot(&rom)?;

    assert_eq!(step_costs(&mut nes, 5), [2, 2, 3, 3, 4]);
    assert_eq!(nes.cpu_registers().pc, 0x810D);
    Ok(())
}

#[test]
fn brk_pushes_state_and_rti_returns() -> Result<()> {
    let rom = RomBuilder::nrom()
        .code(0x8000, &[0x58, 0x00, 0xFF, 0xEA]) // CLI, BRK #$FF, NOP
        .vector(0xFFFE, 0x9000)
        .code(0x9000, &[0x40]);
    let mut nes = boot(&rom)?;

    assert_eq!(step_costs(&mut nes, 2), [2, 7]);
    let regs = nes.cpu_registers();
    assert_eq!(regs.pc, 0x9000);
    assert_eq!(regs.s, 0xFA);
    // Return address skips the padding byte; pushed P carries B.
    assert_eq!(nes.peek(0x01FD), 0x80);
    assert_eq!(nes.peek(0x01FC), 0x03);
    assert_ne!(nes.peek(0x01FB) & 0x10, 0);

    assert_eq!(nes.step_instruction(), 6);
    assert_eq!(nes.cpu_registers().pc, 0x8003);
    Ok(())
}

#[test]
fn jam_halts_until_reset() -> Result<()> {
    let rom = RomBuilder::nrom().code(0x8000, &[0x02]);
    let mut nes = boot(&rom)?;

    nes.step_instruction();
    let pc = nes.cpu_registers().pc;
    for _ in 0..10 {
        assert_eq!(nes.step_instruction(), 1);
    }
    assert_eq!(nes.cpu_registers().pc, pc);

    nes.reset();
    assert_eq!(nes.cpu_registers().pc, 0x8000);
    Ok(())
}
