//! Sprite (OAM) and sample (DMC) DMA.
//!
//! Both engines steal cycles from the CPU by halting it on its next read.
//! Sprite DMA alternates get (even cycle) and put (odd cycle) steps, so it
//! costs a halt cycle, an optional alignment cycle and 256 get/put pairs: 513
//! or 514 cycles. A standalone sample fetch costs halt, dummy, alignment and
//! the fetch itself (4 cycles); when the request arrived during a CPU write
//! the halt overlaps that write and only 3 cycles remain.
//!
//! When the APU asks for a sample byte while sprite DMA is running, the
//! request is served in one of two ways:
//! - raised on the cycle right before a sprite get: the sample unit latches
//!   whatever that get reads (the sprite byte, not its own) and sprite DMA
//!   carries on;
//! - otherwise it waits and is fetched on the cycle after the last put.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{bus::CpuBus, memory::ppu as ppu_mem};

/// A pending sample fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmcRequest {
    /// CPU address of the sample byte.
    pub addr: u16,
    /// The request arrived on a CPU write cycle, which doubles as the halt.
    pub halt_absorbed: bool,
}

/// DMA requests waiting for the CPU's next read cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmaController {
    sprite_page: Option<u8>,
    dmc: Option<DmcRequest>,
}

impl DmaController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power_on(&mut self) {
        *self = Self::default();
    }

    /// `$4014` write: copy page `page` into OAM.
    pub fn request_sprite(&mut self, page: u8) {
        trace!(page = format_args!("{page:#04X}"), "sprite DMA requested");
        self.sprite_page = Some(page);
    }

    pub fn request_dmc(&mut self, addr: u16, cpu_writing: bool) {
        trace!(
            addr = format_args!("{addr:#06X}"),
            cpu_writing, "sample DMA requested"
        );
        self.dmc = Some(DmcRequest {
            addr,
            halt_absorbed: cpu_writing,
        });
    }

    /// `$4015` cleared the DMC enable: a fetch already queued is dropped.
    pub fn cancel_dmc(&mut self) {
        if self.dmc.take().is_some() {
            trace!("sample DMA cancelled");
        }
    }

    pub fn needs_halt(&self) -> bool {
        self.sprite_page.is_some() || self.dmc.is_some()
    }

    pub fn sprite_pending(&self) -> bool {
        self.sprite_page.is_some()
    }

    pub fn dmc_pending(&self) -> Option<DmcRequest> {
        self.dmc
    }
}

impl CpuBus<'_> {
    /// Runs every pending transfer. `pending_addr` is the address the CPU was
    /// about to read; halt and dummy cycles re-read it.
    pub(crate) fn service_dma(&mut self, pending_addr: u16) {
        match self.dma.sprite_page.take() {
            Some(page) => self.run_sprite_dma(page, pending_addr),
            None => {
                if let Some(request) = self.dma.dmc.take() {
                    self.run_dmc_dma(request, pending_addr);
                }
            }
        }
    }

    /// One stolen cycle that re-reads `addr`. Returns a sample request raised
    /// during that cycle.
    fn dma_dummy_cycle(&mut self, addr: u16) -> Option<DmcRequest> {
        self.step_cycle(false);
        let _ = self.read_access(addr);
        self.dma.dmc.take()
    }

    fn dmc_fetch_cycle(&mut self, addr: u16) {
        self.step_cycle(false);
        let value = self.read_access(addr);
        self.apu.finish_dmc_fetch(value);
    }

    fn run_dmc_dma(&mut self, request: DmcRequest, pending_addr: u16) {
        let start = self.clock.cycles();
        if !request.halt_absorbed {
            self.step_cycle(false);
            let _ = self.read_access(pending_addr);
        }
        // Dummy and alignment cycles.
        for _ in 0..2 {
            self.step_cycle(false);
            let _ = self.read_access(pending_addr);
        }
        self.dmc_fetch_cycle(request.addr);
        trace!(
            addr = format_args!("{:#06X}", request.addr),
            cycles = self.clock.cycles() - start,
            "sample DMA"
        );
    }

    fn run_sprite_dma(&mut self, page: u8, pending_addr: u16) {
        let start = self.clock.cycles();
        // A sample request already waiting is not tied to any get cycle.
        let mut deferred = self.dma.dmc.take();

        // Halt.
        let mut fresh = self.dma_dummy_cycle(pending_addr);
        // The first get must land on an even cycle.
        if !self.clock.is_odd() {
            deferred = deferred.or(fresh.take());
            fresh = self.dma_dummy_cycle(pending_addr);
        }

        let base = (page as u16) << 8;
        for offset in 0..=0xFFu16 {
            // Get.
            let riding = fresh.take();
            self.step_cycle(false);
            let value = self.read_access(base | offset);
            if riding.is_some() {
                debug!(
                    value = format_args!("{value:#04X}"),
                    "sample DMA collided with sprite DMA get cycle"
                );
                self.apu.finish_dmc_fetch(value);
            }
            deferred = deferred.or(self.dma.dmc.take());

            // Put.
            self.step_cycle(false);
            self.write_access(ppu_mem::Register::OamData.addr(), value);
            fresh = self.dma.dmc.take();
        }

        if let Some(request) = deferred.or(fresh) {
            self.dmc_fetch_cycle(request.addr);
        }
        trace!(
            page = format_args!("{page:#04X}"),
            cycles = self.clock.cycles() - start,
            "sprite DMA"
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bus::{Bus, cpu::test_support::{Machine, nrom}},
        memory::apu::Register as ApuRegister,
    };

    /// Cycles a single read costs, DMA included.
    fn read_cost(machine: &mut Machine, addr: u16) -> u64 {
        let mut bus = machine.bus();
        let start = bus.cycles();
        let _ = bus.read(addr);
        bus.cycles() - start
    }

    #[test]
    fn sprite_dma_costs_513_or_514_cycles() {
        for (lead_in, expected) in [(0u64, 514u64), (1, 513)] {
            let mut machine = Machine::new(None);
            {
                let mut bus = machine.bus();
                for _ in 0..lead_in {
                    bus.idle();
                }
                // Trigger lands on cycle `lead_in + 1`.
                bus.write(0x4014, 0x02);
            }
            let trigger_odd = (lead_in + 1) % 2 == 1;
            let cost = read_cost(&mut machine, 0x0000) - 1;
            assert_eq!(cost, expected, "trigger on odd cycle: {trigger_odd}");
        }
    }

    /// Starts a one-byte sample at `$C000`, bypassing the bus.
    fn start_sample(machine: &mut Machine) {
        let cycle = machine.clock.cycles();
        machine.apu.write_register(ApuRegister::DmcControl, 0x0F, cycle);
        machine.apu.write_register(ApuRegister::DmcSampleAddress, 0x00, cycle);
        machine.apu.write_register(ApuRegister::DmcSampleLength, 0x00, cycle);
        machine.apu.write_register(ApuRegister::Status, 0x10, cycle);
    }

    /// Sprite DMA from page `$02` (filled with `$A5`) with a sample starting
    /// right after the trigger. Returns the read cost and the sample buffer.
    fn sprite_dma_with_sample(lead_in: u64) -> (u64, Option<u8>) {
        let mut machine = Machine::new(Some(nrom()));
        machine.ram[0x0200..0x0300].fill(0xA5);
        {
            let mut bus = machine.bus();
            for _ in 0..lead_in {
                bus.idle();
            }
            bus.write(0x4014, 0x02);
        }
        start_sample(&mut machine);
        let cost = read_cost(&mut machine, 0x0000);
        (cost, machine.apu.dmc_sample_buffer())
    }

    #[test]
    fn sample_request_riding_a_get_receives_the_sprite_byte() {
        // Request raised on the halt cycle, next to the first get.
        let (cost, buffer) = sprite_dma_with_sample(1);
        assert_eq!(cost, 1 + 513);
        assert_eq!(buffer, Some(0xA5));
    }

    #[test]
    fn sample_request_before_alignment_runs_after_the_last_put() {
        let (cost, buffer) = sprite_dma_with_sample(0);
        assert_eq!(cost, 1 + 514 + 1);
        // nrom() PRG holds the low address byte: $C000 reads $00.
        assert_eq!(buffer, Some(0x00));
    }

    #[test]
    fn disabling_the_channel_drops_a_queued_sample_fetch() {
        let mut machine = Machine::new(Some(nrom()));
        start_sample(&mut machine);
        machine.bus().idle();
        assert!(machine.dma.dmc_pending().is_some());

        machine.bus().write(0x4015, 0x1F);
        assert!(machine.dma.dmc_pending().is_some());

        machine.bus().write(0x4015, 0x0F);
        assert!(machine.dma.dmc_pending().is_none());
        assert_eq!(read_cost(&mut machine, 0x0000), 1);
        assert_eq!(machine.apu.dmc_sample_buffer(), None);
    }

    #[test]
    fn sprite_dma_copies_page_into_oam() {
        let mut machine = Machine::new(None);
        for i in 0..256usize {
            machine.ram[0x0200 + i] = i as u8 ^ 0x5A;
        }
        {
            let mut bus = machine.bus();
            bus.write(0x2003, 0x00);
            bus.write(0x4014, 0x02);
            let _ = bus.read(0x0000);
        }
        assert_eq!(machine.ppu.oam()[0], 0x5A);
        assert_eq!(machine.ppu.oam()[0xFF], 0xFF ^ 0x5A);
    }

    #[test]
    fn sample_dma_costs_four_cycles() {
        let mut machine = Machine::new(Some(nrom()));
        machine.dma.request_dmc(0xC123, false);
        assert_eq!(read_cost(&mut machine, 0x0000) - 1, 4);
    }

    #[test]
    fn sample_dma_after_write_cycle_costs_three() {
        let mut machine = Machine::new(Some(nrom()));
        machine.dma.request_dmc(0xC123, true);
        assert_eq!(read_cost(&mut machine, 0x0000) - 1, 3);
    }

    #[test]
    fn sample_dma_waits_for_a_read_cycle() {
        let mut machine = Machine::new(Some(nrom()));
        machine.dma.request_dmc(0xC123, false);
        let mut bus = machine.bus();
        let start = bus.cycles();
        bus.write(0x0000, 1);
        bus.write(0x0001, 2);
        assert_eq!(bus.cycles() - start, 2);
        assert!(bus.dma.needs_halt());
    }

    #[test]
    fn halt_cycles_repeat_the_pending_read() {
        let mut machine = Machine::new(None);
        machine.controllers[0].set_button(crate::controller::Button::A, true);
        machine.controllers[0].set_button(crate::controller::Button::B, true);
        machine.controllers[0].set_button(crate::controller::Button::Select, true);
        machine.controllers[0].set_button(crate::controller::Button::Up, true);
        {
            let mut bus = machine.bus();
            bus.write(0x4016, 1);
            bus.write(0x4016, 0);
        }
        machine.dma.request_dmc(0x8000, false);
        // Halt, dummy and alignment each clock the shift register, so the CPU
        // read sees the fourth bit (Start, released).
        {
            let mut bus = machine.bus();
            assert_eq!(bus.read(0x4016) & 1, 0);
        }
        assert_eq!(machine.controllers[0].peek() & 1, 1);
    }
}
