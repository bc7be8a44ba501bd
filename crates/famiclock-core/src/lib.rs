//! Cycle-stepped NTSC NES core.
//!
//! [`Nes`] owns every chip and advances them in lockstep: each CPU bus access
//! is one CPU cycle, three PPU dots and one APU cycle. Frontends feed
//! controller state in and take frames and audio samples out.

use tracing::{info, warn};

use crate::{
    apu::Apu,
    bus::{
        DmaController, OpenBus,
        cpu::{ChipView, CpuBus},
    },
    cartridge::Cartridge,
    clock::MasterClock,
    controller::{Button, Controller},
    cpu::{Cpu, CpuRegisters},
    mem_block::cpu as cpu_ram,
    ppu::{Ppu, buffer::ColorFormat},
    state::{NesState, StateError},
};

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod clock;
pub mod config;
pub mod controller;
pub mod cpu;
pub mod error;
pub mod mem_block;
pub mod memory;
pub mod ppu;
pub mod state;

pub use config::NesConfig;
pub use error::Error;

/// A console: CPU, PPU, APU, 2 KiB of work RAM, two pads and an optional
/// cartridge.
#[derive(Debug)]
pub struct Nes {
    config: NesConfig,
    cpu: Cpu,
    ram: cpu_ram::Ram,
    ppu: Ppu,
    apu: Apu,
    cartridge: Option<Cartridge>,
    controllers: [Controller; 2],
    open_bus: OpenBus,
    clock: MasterClock,
    dma: DmaController,
}

impl Default for Nes {
    fn default() -> Self {
        Self::new(NesConfig::default())
    }
}

impl Nes {
    /// Builds a powered-on console with no cartridge inserted.
    pub fn new(config: NesConfig) -> Self {
        let mut nes = Self {
            config,
            cpu: Cpu::new(),
            ram: cpu_ram::Ram::new(),
            ppu: Ppu::new(),
            apu: Apu::new(config.sample_rate.max(1)),
            cartridge: None,
            controllers: [Controller::new(); 2],
            open_bus: OpenBus::new(),
            clock: MasterClock::new(),
            dma: DmaController::new(),
        };
        nes.power_on();
        nes
    }

    pub fn config(&self) -> &NesConfig {
        &self.config
    }

    /// Splits the session into the CPU and a bus over everything else.
    fn cpu_and_bus(&mut self) -> (&mut Cpu, CpuBus<'_>) {
        let bus = CpuBus::new(
            &mut self.ram,
            &mut self.ppu,
            &mut self.apu,
            self.cartridge.as_mut(),
            &mut self.controllers,
            &mut self.open_bus,
            &mut self.clock,
            &mut self.dma,
        );
        (&mut self.cpu, bus)
    }

    /// Cold boot. Work RAM is cleared, every chip returns to its power-on
    /// state and the CPU runs its reset sequence. Battery RAM survives.
    pub fn power_on(&mut self) {
        self.ram.fill(0);
        self.ppu.power_on();
        self.apu.power_on();
        if let Some(cart) = self.cartridge.as_mut() {
            cart.power_on();
        }
        self.controllers = [Controller::new(); 2];
        self.open_bus.power_on();
        self.clock.power_on();
        self.dma.power_on();

        let (cpu, mut bus) = self.cpu_and_bus();
        cpu.power_on(&mut bus);
        info!(pc = format_args!("{:#06X}", self.cpu.registers().pc), "power on");
    }

    /// Reset button. Work RAM and the mapper's persistent state survive.
    pub fn reset(&mut self) {
        self.ppu.reset();
        self.apu.reset();
        if let Some(cart) = self.cartridge.as_mut() {
            cart.reset();
        }
        self.dma.power_on();

        let (cpu, mut bus) = self.cpu_and_bus();
        cpu.reset(&mut bus);
        info!(pc = format_args!("{:#06X}", self.cpu.registers().pc), "reset");
    }

    /// Parses `bytes` and inserts the cartridge. A malformed image leaves the
    /// running session untouched.
    pub fn load_cartridge(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let cartridge = cartridge::load_cartridge(bytes)?;
        self.insert_cartridge(cartridge);
        Ok(())
    }

    /// Inserts a cartridge and power-cycles the console.
    pub fn insert_cartridge(&mut self, cartridge: Cartridge) {
        self.cartridge = Some(cartridge);
        self.power_on();
    }

    /// Removes the cartridge and power-cycles the console.
    pub fn eject_cartridge(&mut self) -> Option<Cartridge> {
        let cartridge = self.cartridge.take();
        self.power_on();
        cartridge
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    /// CRC-32 of the inserted image.
    pub fn cartridge_checksum(&self) -> Option<u32> {
        self.cartridge.as_ref().map(Cartridge::checksum)
    }

    /// Runs one instruction (plus any interrupt sequence it triggers) and
    /// returns the CPU cycles it took, DMA stalls included.
    pub fn step_instruction(&mut self) -> u64 {
        let start = self.clock.cycles();
        let (cpu, mut bus) = self.cpu_and_bus();
        cpu.step(&mut bus);
        self.clock.cycles() - start
    }

    /// Runs until the PPU publishes the next frame. Returns the CPU cycles
    /// spent.
    pub fn run_frame(&mut self) -> u64 {
        let frame = self.ppu.frame_count();
        let mut cycles = 0;
        while self.ppu.frame_count() == frame {
            cycles += self.step_instruction();
        }
        cycles
    }

    /// CPU cycles since power-on.
    pub fn cycles(&self) -> u64 {
        self.clock.cycles()
    }

    pub fn cpu_registers(&self) -> CpuRegisters {
        self.cpu.registers()
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn apu(&self) -> &Apu {
        &self.apu
    }

    /// Reads what the CPU would see at `addr` without side effects or time
    /// passing.
    pub fn peek(&self, addr: u16) -> u8 {
        bus::cpu::peek(
            &ChipView {
                ram: &self.ram,
                ppu: &self.ppu,
                apu: &self.apu,
                cartridge: self.cartridge.as_ref(),
                controllers: &self.controllers,
                open_bus: &self.open_bus,
            },
            addr,
        )
    }

    /// Frames completed since power-on.
    pub fn frame_count(&self) -> u64 {
        self.ppu.frame_count()
    }

    /// The last completed frame as 6-bit palette indices, row-major,
    /// 256x240.
    pub fn frame_buffer(&self) -> &[u8] {
        self.ppu.frame_buffer()
    }

    /// Converts the last completed frame into `out` using `format`.
    pub fn write_frame(&self, format: ColorFormat, out: &mut [u8]) -> Result<(), Error> {
        let expected = format.frame_len();
        if out.len() < expected {
            return Err(Error::FrameBufferTooSmall {
                expected,
                actual: out.len(),
            });
        }
        format.convert(self.ppu.frame_buffer(), &mut out[..expected]);
        Ok(())
    }

    /// Drains the audio produced since the last call, scaled by the
    /// configured master volume.
    pub fn take_audio_samples(&mut self) -> Vec<f32> {
        let volume = self.config.master_volume.clamp(0.0, 1.0);
        let mut samples = self.apu.take_samples();
        if volume != 1.0 {
            for sample in &mut samples {
                *sample *= volume;
            }
        }
        samples
    }

    /// Presses or releases `button` on pad `port` (0 or 1). Other ports are
    /// ignored.
    pub fn set_button(&mut self, port: usize, button: Button, pressed: bool) {
        if let Some(pad) = self.controllers.get_mut(port) {
            pad.set_button(button, pressed);
        }
    }

    /// Battery-backed RAM of the inserted cartridge.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.cartridge.as_ref().and_then(Cartridge::battery_ram)
    }

    /// Restores battery RAM. Returns `false` when there is nothing to load
    /// into.
    pub fn load_battery_ram(&mut self, data: &[u8]) -> bool {
        self.cartridge
            .as_mut()
            .is_some_and(|cart| cart.load_battery_ram(data))
    }

    /// Snapshots the whole machine.
    pub fn save_state(&self) -> Result<Vec<u8>, StateError> {
        let cart = self.cartridge.as_ref().ok_or(StateError::NoCartridge)?;
        let state = NesState {
            cpu: self.cpu.clone(),
            ram: self.ram.clone(),
            ppu: self.ppu.clone(),
            apu: self.apu.clone(),
            controllers: self.controllers,
            open_bus: self.open_bus.clone(),
            clock: self.clock,
            dma: self.dma.clone(),
            cartridge: cart.save_state(),
        };
        state.encode(cart.checksum())
    }

    /// Restores a snapshot taken with [`Self::save_state`] on the same
    /// cartridge. On error nothing changes.
    pub fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let cart = self.cartridge.as_mut().ok_or(StateError::NoCartridge)?;
        let state = NesState::decode(bytes, cart.checksum()).inspect_err(|err| {
            warn!(%err, "save state rejected");
        })?;
        if !cart.accepts_state(&state.cartridge) {
            warn!(mapper = cart.mapper().name(), "save state does not fit the board");
            return Err(StateError::MapperMismatch);
        }

        cart.load_state(&state.cartridge);
        self.cpu = state.cpu;
        self.ram = state.ram;
        self.ppu = state.ppu;
        self.apu = state.apu;
        self.controllers = state.controllers;
        self.open_bus = state.open_bus;
        self.clock = state.clock;
        self.dma = state.dma;
        Ok(())
    }
}
