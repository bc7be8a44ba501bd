mod common;

use anyhow::{Result, ensure};
use common::{RomBuilder, boot, step_costs};

/// `LDA #$02` / `STA $4014`, optionally preceded by a 3-cycle `LDA $00`
/// that flips the parity of the trigger cycle.
fn sprite_dma_rom(shift_parity: bool) -> RomBuilder {
    let mut code = Vec::new();
    if shift_parity {
        code.extend([0xA5, 0x00]);
    }
    code.extend([0xA9, 0x02, 0x8D, 0x14, 0x40, 0xEA]);
    RomBuilder::nrom().code(0x8000, &code)
}

#[test]
fn sprite_dma_stalls_513_or_514_cycles() -> Result<()> {
    // Boot leaves the clock at 7: the write lands on odd cycle 13.
    let mut nes = boot(&sprite_dma_rom(false))?;
    assert_eq!(step_costs(&mut nes, 3), [2, 4, 2 + 514]);

    // One extra cycle moves it to even cycle 16.
    let mut nes = boot(&sprite_dma_rom(true))?;
    assert_eq!(step_costs(&mut nes, 4), [3, 2, 4, 2 + 513]);
    Ok(())
}

#[test]
fn sprite_dma_copies_a_whole_page() -> Result<()> {
    let rom = RomBuilder::nrom().code(
        0x8000,
        &[
            0xA2, 0x00, // LDX #0
            0x8A, // TXA
            0x9D, 0x00, 0x02, // STA $0200,X
            0xE8, // INX
            0xD0, 0xF9, // BNE $8002
            0xA9, 0x02, // LDA #$02
            0x8D, 0x14, 0x40, // STA $4014
            0x4C, 0x0E, 0x80, // JMP $800E
        ],
    );
    let mut nes = boot(&rom)?;

    let mut steps = 0;
    while nes.cpu_registers().pc != 0x800E {
        nes.step_instruction();
        steps += 1;
        ensure!(steps < 4096, "fill loop never finished");
    }
    // The halt lands on the next opcode fetch.
    let cost = nes.step_instruction();
    ensure!(cost == 3 + 513 || cost == 3 + 514, "unexpected cost {cost}");

    let expected: Vec<u8> = (0..=255).collect();
    assert_eq!(nes.ppu().oam(), expected.as_slice());
    Ok(())
}

#[test]
fn sample_fetch_steals_four_cycles() -> Result<()> {
    let rom = RomBuilder::nrom().code(
        0x8000,
        &[
            0xA9, 0x0F, 0x8D, 0x10, 0x40, // rate 15, no loop, no IRQ
            0xA9, 0x00, 0x8D, 0x12, 0x40, // sample at $C000
            0xA9, 0x00, 0x8D, 0x13, 0x40, // one byte
            0xA9, 0x10, 0x8D, 0x15, 0x40, // start
        ],
    );
    let mut nes = boot(&rom)?;
    step_costs(&mut nes, 8);
    assert_ne!(nes.peek(0x4015) & 0x10, 0);

    let nops = step_costs(&mut nes, 16);
    assert_eq!(nops.iter().filter(|&&c| c == 2 + 4).count(), 1, "{nops:?}");
    assert!(nops.iter().all(|&c| c == 2 || c == 6), "{nops:?}");
    assert_eq!(nes.peek(0x4015) & 0x10, 0);
    Ok(())
}
