//! Save-state snapshots and their wire envelope.
//!
//! A snapshot is every chip's serde state encoded with `postcard`, prefixed
//! by a fixed header:
//!
//! | offset | size | field                          |
//! |--------|------|--------------------------------|
//! | 0      | 4    | magic `FCST`                   |
//! | 4      | 2    | format version (LE)            |
//! | 6      | 4    | CRC-32 of the cartridge image  |
//! | 10     | 4    | CRC-32 of the payload          |
//! | 14     | 4    | payload length (LE)            |
//! | 18     | ..   | payload                        |
//!
//! Cartridge ROM never goes into a snapshot; only board registers and RAM.
//! A payload that decodes is still range-checked chip by chip before it is
//! handed back, so a forged snapshot fails here instead of inside the core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    apu::Apu,
    bus::{DmaController, OpenBus},
    cartridge::CartridgeState,
    clock::MasterClock,
    controller::Controller,
    cpu::Cpu,
    mem_block::cpu as cpu_ram,
    ppu::Ppu,
};

pub const STATE_MAGIC: [u8; 4] = *b"FCST";
pub const STATE_VERSION: u16 = 2;
pub const STATE_HEADER_LEN: usize = 18;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("no cartridge inserted")]
    NoCartridge,
    #[error("state expected at least {STATE_HEADER_LEN} bytes, got {actual}")]
    TooShort { actual: usize },
    #[error("missing save-state magic bytes")]
    BadMagic,
    #[error("unsupported save-state version {0}")]
    UnsupportedVersion(u16),
    #[error("payload length is {actual} bytes, header says {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("state belongs to cartridge {expected:08X}, inserted is {actual:08X}")]
    CartridgeMismatch { expected: u32, actual: u32 },
    #[error("payload checksum is {actual:08X}, header says {expected:08X}")]
    PayloadChecksum { expected: u32, actual: u32 },
    #[error("state does not fit the inserted board")]
    MapperMismatch,
    /// The payload decoded but holds values no running machine can reach.
    #[error("inconsistent state: {0}")]
    Inconsistent(&'static str),
    #[error("malformed state payload: {0}")]
    Decode(#[from] postcard::Error),
}

/// Full machine snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NesState {
    pub(crate) cpu: Cpu,
    pub(crate) ram: cpu_ram::Ram,
    pub(crate) ppu: Ppu,
    pub(crate) apu: Apu,
    pub(crate) controllers: [Controller; 2],
    pub(crate) open_bus: OpenBus,
    pub(crate) clock: MasterClock,
    pub(crate) dma: DmaController,
    pub(crate) cartridge: CartridgeState,
}

impl NesState {
    /// Serializes the snapshot behind the envelope header.
    pub fn encode(&self, checksum: u32) -> Result<Vec<u8>, StateError> {
        let payload = postcard::to_stdvec(self)?;
        let mut out = Vec::with_capacity(STATE_HEADER_LEN + payload.len());
        out.extend_from_slice(&STATE_MAGIC);
        out.extend_from_slice(&STATE_VERSION.to_le_bytes());
        out.extend_from_slice(&checksum.to_le_bytes());
        out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Validates the envelope against `checksum`, decodes the payload and
    /// range-checks the result.
    pub fn decode(bytes: &[u8], checksum: u32) -> Result<Self, StateError> {
        let (header, payload) = bytes
            .split_first_chunk::<STATE_HEADER_LEN>()
            .ok_or(StateError::TooShort {
                actual: bytes.len(),
            })?;

        if header[0..4] != STATE_MAGIC {
            return Err(StateError::BadMagic);
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != STATE_VERSION {
            return Err(StateError::UnsupportedVersion(version));
        }
        let crc = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);
        if crc != checksum {
            return Err(StateError::CartridgeMismatch {
                expected: crc,
                actual: checksum,
            });
        }
        let len = u32::from_le_bytes([header[14], header[15], header[16], header[17]]) as usize;
        if len != payload.len() {
            return Err(StateError::LengthMismatch {
                expected: len,
                actual: payload.len(),
            });
        }
        let payload_crc = u32::from_le_bytes([header[10], header[11], header[12], header[13]]);
        let actual = crc32fast::hash(payload);
        if payload_crc != actual {
            return Err(StateError::PayloadChecksum {
                expected: payload_crc,
                actual,
            });
        }

        let state: Self = postcard::from_bytes(payload)?;
        state.validate()?;
        Ok(state)
    }

    fn validate(&self) -> Result<(), StateError> {
        self.ppu
            .validate()
            .and_then(|()| self.apu.validate())
            .map_err(StateError::Inconsistent)
    }
}
