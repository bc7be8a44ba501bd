mod common;

use anyhow::{Context, Result};
use common::{RomBuilder, boot, stores};
use famiclock_core::{Nes, cpu::CpuRegisters, state::StateError};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Plays three channels, keeps rewriting the pulse period, renders and
/// pokes CHR RAM from its NMI handler.
fn busy_rom() -> RomBuilder {
    let mut code = stores(&[
        (0x4015, 0x0F),
        (0x4000, 0xBF),
        (0x4002, 0x80),
        (0x4003, 0x00),
        (0x4008, 0xFF),
        (0x400A, 0x40),
        (0x400B, 0x00),
        (0x400C, 0x3F),
        (0x400E, 0x04),
        (0x400F, 0x00),
        (0x2000, 0x80),
        (0x2001, 0x1E),
    ]);
    let [lo, hi] = (0x8000 + code.len() as u16).to_le_bytes();
    code.extend([
        0xE6, 0x10, // INC $10
        0xA5, 0x10, // LDA $10
        0x8D, 0x02, 0x40, // STA $4002
        0x4C, lo, hi,
    ]);

    RomBuilder::with_banks(0, 1, 0)
        .code(0x8000, &code)
        .vector(0xFFFA, 0x9000)
        .code(
            0x9000,
            &[
                0xE6, 0x20, // INC $20
                0xA9, 0x00, 0x8D, 0x06, 0x20, // $2006 = $00
                0x8D, 0x06, 0x20, // $2006 = $00
                0xA5, 0x20, 0x8D, 0x07, 0x20, // $2007 = counter
                0x40, // RTI
            ],
        )
}

#[derive(Debug, PartialEq)]
struct Observation {
    frame: Vec<u8>,
    samples: Vec<f32>,
    ram: Vec<u8>,
    regs: CpuRegisters,
    cycles: u64,
}

fn observe(nes: &mut Nes, frames: usize) -> Observation {
    let mut samples = Vec::new();
    for _ in 0..frames {
        nes.run_frame();
        samples.extend(nes.take_audio_samples());
    }
    Observation {
        frame: nes.frame_buffer().to_vec(),
        samples,
        ram: (0..0x0800).map(|addr| nes.peek(addr)).collect(),
        regs: nes.cpu_registers(),
        cycles: nes.cycles(),
    }
}

#[test]
fn restored_session_replays_identically() -> Result<()> {
    let rom = busy_rom();
    let mut rng = StdRng::seed_from_u64(0x4643_5354);

    for _ in 0..4 {
        let mut nes = boot(&rom)?;
        for _ in 0..rng.random_range(1..4) {
            nes.run_frame();
        }
        for _ in 0..rng.random_range(0..3000) {
            nes.step_instruction();
        }
        let _ = nes.take_audio_samples();

        let snapshot = nes.save_state().context("save")?;
        let expected = observe(&mut nes, 3);
        assert!(!expected.samples.is_empty());

        // Same session, rewound.
        nes.load_state(&snapshot).context("load into same session")?;
        assert_eq!(observe(&mut nes, 3), expected);

        // Fresh session with the same cartridge.
        let mut other = boot(&rom)?;
        other.load_state(&snapshot).context("load into fresh session")?;
        assert_eq!(observe(&mut other, 3), expected);
    }
    Ok(())
}

#[test]
fn rejected_states_leave_the_session_untouched() -> Result<()> {
    let mut nes = boot(&busy_rom())?;
    nes.run_frame();
    let snapshot = nes.save_state()?;
    nes.run_frame();

    let before = (nes.cycles(), nes.cpu_registers(), nes.frame_count());

    let mut bad_magic = snapshot.clone();
    bad_magic[0] ^= 0xFF;
    assert!(matches!(nes.load_state(&bad_magic), Err(StateError::BadMagic)));

    assert!(matches!(
        nes.load_state(&snapshot[..snapshot.len() - 1]),
        Err(StateError::LengthMismatch { .. })
    ));
    assert!(matches!(
        nes.load_state(&snapshot[..8]),
        Err(StateError::TooShort { actual: 8 })
    ));

    let mut flipped = snapshot.clone();
    let last = flipped.len() - 1;
    flipped[last] ^= 0x40;
    assert!(matches!(
        nes.load_state(&flipped),
        Err(StateError::PayloadChecksum { .. })
    ));

    let other = boot(&busy_rom().battery())?;
    let foreign = other.save_state()?;
    assert!(matches!(
        nes.load_state(&foreign),
        Err(StateError::CartridgeMismatch { .. })
    ));

    assert_eq!(
        (nes.cycles(), nes.cpu_registers(), nes.frame_count()),
        before
    );
    Ok(())
}
