use crate::{
    apu::{Apu, ApuStatus},
    bus::{Bus, DmaController, OpenBus},
    cartridge::Cartridge,
    clock::{MasterClock, PPU_DOTS_PER_CPU_CYCLE},
    controller::Controller,
    mem_block::cpu as cpu_ram,
    memory::{apu as apu_mem, cpu as cpu_mem, ppu as ppu_mem},
    ppu::{Ppu, pattern_bus::PatternBus},
};

/// CPU-visible bus that bridges the core to RAM, the PPU, the APU, the
/// controller ports and the cartridge. It borrows the hardware from the owning
/// session for the span of one CPU step.
#[derive(Debug)]
pub struct CpuBus<'a> {
    pub(crate) ram: &'a mut cpu_ram::Ram,
    pub(crate) ppu: &'a mut Ppu,
    pub(crate) apu: &'a mut Apu,
    pub(crate) cartridge: Option<&'a mut Cartridge>,
    pub(crate) controllers: &'a mut [Controller; 2],
    pub(crate) open_bus: &'a mut OpenBus,
    pub(crate) clock: &'a mut MasterClock,
    pub(crate) dma: &'a mut DmaController,
}

impl<'a> CpuBus<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ram: &'a mut cpu_ram::Ram,
        ppu: &'a mut Ppu,
        apu: &'a mut Apu,
        cartridge: Option<&'a mut Cartridge>,
        controllers: &'a mut [Controller; 2],
        open_bus: &'a mut OpenBus,
        clock: &'a mut MasterClock,
        dma: &'a mut DmaController,
    ) -> Self {
        Self {
            ram,
            ppu,
            apu,
            cartridge,
            controllers,
            open_bus,
            clock,
            dma,
        }
    }

    /// One CPU cycle of the rest of the machine: master clock, three PPU
    /// dots, one APU cycle, mapper clock and open-bus decay. A sample fetch
    /// the APU asks for is queued, remembering whether the CPU is writing
    /// during this cycle.
    pub(crate) fn step_cycle(&mut self, cpu_writing: bool) {
        self.clock.tick();

        let mut pattern = PatternBus::new(self.cartridge.as_deref_mut());
        for _ in 0..PPU_DOTS_PER_CPU_CYCLE {
            self.ppu.step(&mut pattern);
        }

        self.apu.step();
        if let Some(cart) = self.cartridge.as_deref_mut() {
            cart.cpu_clock();
        }
        self.open_bus.step();

        if let Some(addr) = self.apu.take_dmc_request() {
            self.dma.request_dmc(addr, cpu_writing);
        }
    }

    /// Address decode for a read, without advancing time.
    pub(crate) fn read_access(&mut self, addr: u16) -> u8 {
        match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                let value = self.ram[(addr & cpu_mem::INTERNAL_RAM_MASK) as usize];
                self.open_bus.latch(value);
                value
            }
            cpu_mem::PPU_REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
                let reg = ppu_mem::Register::from_cpu_addr(addr);
                let mut pattern = PatternBus::new(self.cartridge.as_deref_mut());
                let value = self.ppu.cpu_read(reg, &mut pattern);
                self.open_bus.latch(value);
                value
            }
            cpu_mem::APU_STATUS => {
                // Bit 5 is not driven by the status register.
                let status = self.apu.read_status();
                self.open_bus.apply_masked(0x20, status)
            }
            cpu_mem::CONTROLLER_PORT_1 | cpu_mem::CONTROLLER_PORT_2 => {
                let port = (addr - cpu_mem::CONTROLLER_PORT_1) as usize;
                let bit = self.controllers[port].read();
                self.open_bus.apply_masked(0xE0, bit)
            }
            cpu_mem::CARTRIDGE_SPACE_BASE..=cpu_mem::CPU_ADDR_END => {
                match self.cartridge.as_deref().and_then(|cart| cart.cpu_read(addr)) {
                    Some(value) => {
                        self.open_bus.latch(value);
                        value
                    }
                    None => self.open_bus.sample(),
                }
            }
            // Write-only APU registers, `$4014` and the test-mode range.
            _ => self.open_bus.sample(),
        }
    }

    /// Address decode for a write, without advancing time.
    pub(crate) fn write_access(&mut self, addr: u16, data: u8) {
        self.open_bus.latch(data);
        match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[(addr & cpu_mem::INTERNAL_RAM_MASK) as usize] = data;
            }
            cpu_mem::PPU_REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
                let reg = ppu_mem::Register::from_cpu_addr(addr);
                let mut pattern = PatternBus::new(self.cartridge.as_deref_mut());
                self.ppu.cpu_write(reg, data, &mut pattern);
            }
            cpu_mem::OAM_DMA => self.dma.request_sprite(data),
            cpu_mem::CONTROLLER_PORT_1 => {
                for controller in self.controllers.iter_mut() {
                    controller.write_strobe(data);
                }
            }
            cpu_mem::APU_REGISTER_BASE..=cpu_mem::APU_REGISTER_END
            | cpu_mem::APU_STATUS
            | cpu_mem::CONTROLLER_PORT_2 => {
                if let Some(reg) = apu_mem::Register::from_cpu_addr(addr) {
                    self.apu.write_register(reg, data, self.clock.cycles());
                }
                if addr == cpu_mem::APU_STATUS
                    && !ApuStatus::from_bits_retain(data).contains(ApuStatus::DMC)
                {
                    self.dma.cancel_dmc();
                }
            }
            cpu_mem::TEST_MODE_BASE..=cpu_mem::TEST_MODE_END => {}
            cpu_mem::CARTRIDGE_SPACE_BASE..=cpu_mem::CPU_ADDR_END => {
                let cycle = self.clock.cycles();
                if let Some(cart) = self.cartridge.as_deref_mut() {
                    cart.cpu_write(addr, data, cycle);
                }
            }
        }
    }
}

impl Bus for CpuBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        // DMA can only halt the CPU on a read cycle.
        if self.dma.needs_halt() {
            self.service_dma(addr);
        }
        self.step_cycle(false);
        self.read_access(addr)
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.step_cycle(true);
        self.write_access(addr, data);
    }

    fn peek(&self, addr: u16) -> u8 {
        peek(
            &ChipView {
                ram: &*self.ram,
                ppu: &*self.ppu,
                apu: &*self.apu,
                cartridge: self.cartridge.as_deref(),
                controllers: &*self.controllers,
                open_bus: &*self.open_bus,
            },
            addr,
        )
    }

    fn idle(&mut self) {
        self.step_cycle(false);
    }

    fn nmi_line(&self) -> bool {
        self.ppu.nmi_line()
    }

    fn irq_line(&self) -> bool {
        self.apu.irq_pending()
            || self
                .cartridge
                .as_deref()
                .is_some_and(|cart| cart.irq_pending())
    }

    fn cycles(&self) -> u64 {
        self.clock.cycles()
    }
}

/// Shared borrows of every chip visible at a CPU address.
pub(crate) struct ChipView<'a> {
    pub(crate) ram: &'a cpu_ram::Ram,
    pub(crate) ppu: &'a Ppu,
    pub(crate) apu: &'a Apu,
    pub(crate) cartridge: Option<&'a Cartridge>,
    pub(crate) controllers: &'a [Controller; 2],
    pub(crate) open_bus: &'a OpenBus,
}

/// Side-effect-free decode of `addr`.
pub(crate) fn peek(chips: &ChipView<'_>, addr: u16) -> u8 {
    match addr {
        cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
            chips.ram[(addr & cpu_mem::INTERNAL_RAM_MASK) as usize]
        }
        cpu_mem::PPU_REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
            chips.ppu.peek(ppu_mem::Register::from_cpu_addr(addr))
        }
        cpu_mem::APU_STATUS => {
            (chips.apu.peek_status() & !0x20) | (chips.open_bus.sample() & 0x20)
        }
        cpu_mem::CONTROLLER_PORT_1 | cpu_mem::CONTROLLER_PORT_2 => {
            let port = (addr - cpu_mem::CONTROLLER_PORT_1) as usize;
            chips.controllers[port].peek() | (chips.open_bus.sample() & 0xE0)
        }
        cpu_mem::CARTRIDGE_SPACE_BASE..=cpu_mem::CPU_ADDR_END => chips
            .cartridge
            .and_then(|cart| cart.cpu_read(addr))
            .unwrap_or_else(|| chips.open_bus.sample()),
        _ => chips.open_bus.sample(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Every chip a [`CpuBus`] borrows, owned in one place for tests.
    #[derive(Debug)]
    pub(crate) struct Machine {
        pub(crate) ram: cpu_ram::Ram,
        pub(crate) ppu: Ppu,
        pub(crate) apu: Apu,
        pub(crate) cartridge: Option<Cartridge>,
        pub(crate) controllers: [Controller; 2],
        pub(crate) open_bus: OpenBus,
        pub(crate) clock: MasterClock,
        pub(crate) dma: DmaController,
    }

    impl Machine {
        pub(crate) fn new(cartridge: Option<Cartridge>) -> Self {
            Self {
                ram: cpu_ram::Ram::new(),
                ppu: Ppu::new(),
                apu: Apu::new(crate::config::NesConfig::DEFAULT_SAMPLE_RATE),
                cartridge,
                controllers: [Controller::new(); 2],
                open_bus: OpenBus::new(),
                clock: MasterClock::new(),
                dma: DmaController::new(),
            }
        }

        pub(crate) fn bus(&mut self) -> CpuBus<'_> {
            CpuBus::new(
                &mut self.ram,
                &mut self.ppu,
                &mut self.apu,
                self.cartridge.as_mut(),
                &mut self.controllers,
                &mut self.open_bus,
                &mut self.clock,
                &mut self.dma,
            )
        }
    }

    /// NROM image whose PRG bytes equal the low byte of their CPU address.
    pub(crate) fn nrom() -> Cartridge {
        let mut rom = vec![b'N', b'E', b'S', 0x1A, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        rom.extend((0..0x8000u32).map(|i| i as u8));
        rom.extend(vec![0u8; 0x2000]);
        crate::cartridge::load_cartridge(&rom).expect("nrom image")
    }
}
