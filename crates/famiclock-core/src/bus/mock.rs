use crate::bus::Bus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read(u16),
    Write(u16, u8),
    Idle,
}

/// Flat 64 KiB RAM bus used to exercise the CPU in isolation.
#[derive(Debug, Clone)]
pub(crate) struct MockBus {
    pub(crate) mem: Vec<u8>,
    pub(crate) cycles: u64,
    pub(crate) nmi: bool,
    pub(crate) irq: bool,
    pub(crate) log: Vec<Access>,
    /// Raise NMI when the cycle counter reaches this value.
    pub(crate) nmi_at: Option<u64>,
    /// Raise IRQ when the cycle counter reaches this value.
    pub(crate) irq_at: Option<u64>,
}

impl Default for MockBus {
    fn default() -> Self {
        Self {
            mem: vec![0; 0x10000],
            cycles: 0,
            nmi: false,
            irq: false,
            log: Vec::new(),
            nmi_at: None,
            irq_at: None,
        }
    }
}

impl MockBus {
    /// Bus with `program` at `origin` and the reset vector pointing at it.
    pub(crate) fn with_program(origin: u16, program: &[u8]) -> Self {
        let mut bus = Self::default();
        bus.load(origin, program);
        bus.mem[0xFFFC] = origin as u8;
        bus.mem[0xFFFD] = (origin >> 8) as u8;
        bus
    }

    pub(crate) fn load(&mut self, origin: u16, bytes: &[u8]) {
        let start = origin as usize;
        self.mem[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn tick(&mut self, access: Access) {
        self.cycles += 1;
        self.log.push(access);
        if self.nmi_at == Some(self.cycles) {
            self.nmi = true;
        }
        if self.irq_at == Some(self.cycles) {
            self.irq = true;
        }
    }
}

impl Bus for MockBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.tick(Access::Read(addr));
        self.mem[addr as usize]
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.tick(Access::Write(addr, data));
        self.mem[addr as usize] = data;
    }

    fn peek(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    fn idle(&mut self) {
        self.tick(Access::Idle);
    }

    fn nmi_line(&self) -> bool {
        self.nmi
    }

    fn irq_line(&self) -> bool {
        self.irq
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }
}
