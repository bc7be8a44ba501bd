//! Address map of the console.
//!
//! Every range the scheduler decodes lives here so the bus, the chips and the
//! tests agree on one layout.

/// CPU address space.
pub mod cpu {
    /// Hardware stack page (`$0100-$01FF`).
    pub const STACK_PAGE_START: u16 = 0x0100;

    pub const NMI_VECTOR_LO: u16 = 0xFFFA;
    pub const NMI_VECTOR_HI: u16 = 0xFFFB;
    pub const RESET_VECTOR_LO: u16 = 0xFFFC;
    pub const RESET_VECTOR_HI: u16 = 0xFFFD;
    pub const IRQ_VECTOR_LO: u16 = 0xFFFE;
    pub const IRQ_VECTOR_HI: u16 = 0xFFFF;

    /// Internal work RAM, 2 KiB mirrored four times up to `$1FFF`.
    pub const INTERNAL_RAM_START: u16 = 0x0000;
    pub const INTERNAL_RAM_MIRROR_END: u16 = 0x1FFF;
    pub const INTERNAL_RAM_SIZE: usize = 0x0800;
    pub const INTERNAL_RAM_MASK: u16 = (INTERNAL_RAM_SIZE as u16) - 1;

    /// PPU registers, eight bytes mirrored through `$3FFF`.
    pub const PPU_REGISTER_BASE: u16 = 0x2000;
    pub const PPU_REGISTER_END: u16 = 0x3FFF;

    /// Channel registers of the APU (`$4000-$4013`).
    pub const APU_REGISTER_BASE: u16 = 0x4000;
    pub const APU_REGISTER_END: u16 = 0x4013;
    /// Sprite DMA trigger.
    pub const OAM_DMA: u16 = 0x4014;
    pub const APU_STATUS: u16 = 0x4015;
    /// Controller strobe on write, port 1 serial data on read.
    pub const CONTROLLER_PORT_1: u16 = 0x4016;
    /// Frame counter on write, port 2 serial data on read.
    pub const CONTROLLER_PORT_2: u16 = 0x4017;

    /// CPU test-mode registers. Disabled on retail consoles.
    pub const TEST_MODE_BASE: u16 = 0x4018;
    pub const TEST_MODE_END: u16 = 0x401F;

    /// Everything from here up is decoded by the cartridge.
    pub const CARTRIDGE_SPACE_BASE: u16 = 0x4020;
    pub const PRG_RAM_START: u16 = 0x6000;
    pub const PRG_RAM_END: u16 = 0x7FFF;
    pub const PRG_ROM_START: u16 = 0x8000;
    pub const CPU_ADDR_END: u16 = 0xFFFF;
}

/// PPU address space and register file.
pub mod ppu {
    pub const REGISTER_SELECT_MASK: u16 = 0x0007;

    /// On-board nametable RAM. Four-screen boards add another 2 KiB, which we
    /// keep in the same block.
    pub const CIRAM_SIZE: usize = 0x1000;
    pub const VRAM_MIRROR_MASK: u16 = 0x3FFF;

    pub const PATTERN_TABLE_0: u16 = 0x0000;
    pub const PATTERN_TABLE_1: u16 = 0x1000;
    pub const PATTERN_TABLE_END: u16 = 0x1FFF;
    pub const NAMETABLE_BASE: u16 = 0x2000;
    pub const NAMETABLE_SIZE: u16 = 0x0400;
    pub const NAMETABLE_END: u16 = 0x3EFF;
    pub const ATTRIBUTE_OFFSET: u16 = 0x03C0;

    pub const PALETTE_BASE: u16 = 0x3F00;
    pub const PALETTE_RAM_SIZE: usize = 0x20;

    pub const OAM_RAM_SIZE: usize = 0x100;
    pub const SECONDARY_OAM_RAM_SIZE: usize = 0x20;

    /// CPU-visible PPU registers.
    #[repr(u16)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Register {
        /// `$2000` PPUCTRL
        Control = 0x2000,
        /// `$2001` PPUMASK
        Mask = 0x2001,
        /// `$2002` PPUSTATUS
        Status = 0x2002,
        /// `$2003` OAMADDR
        OamAddr = 0x2003,
        /// `$2004` OAMDATA
        OamData = 0x2004,
        /// `$2005` PPUSCROLL
        Scroll = 0x2005,
        /// `$2006` PPUADDR
        Addr = 0x2006,
        /// `$2007` PPUDATA
        Data = 0x2007,
    }

    impl Register {
        pub const fn addr(self) -> u16 {
            self as u16
        }

        /// Folds any address in `$2000-$3FFF` onto its register.
        pub const fn from_cpu_addr(addr: u16) -> Self {
            match addr & REGISTER_SELECT_MASK {
                0 => Self::Control,
                1 => Self::Mask,
                2 => Self::Status,
                3 => Self::OamAddr,
                4 => Self::OamData,
                5 => Self::Scroll,
                6 => Self::Addr,
                _ => Self::Data,
            }
        }
    }
}

/// APU register layout.
pub mod apu {
    /// CPU-visible APU registers. Holes (`$4009`, `$400D`) and the addresses
    /// shared with DMA/controllers resolve to `None`.
    #[repr(u16)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Register {
        Pulse1Control = 0x4000,
        Pulse1Sweep = 0x4001,
        Pulse1TimerLow = 0x4002,
        Pulse1TimerHigh = 0x4003,
        Pulse2Control = 0x4004,
        Pulse2Sweep = 0x4005,
        Pulse2TimerLow = 0x4006,
        Pulse2TimerHigh = 0x4007,
        TriangleControl = 0x4008,
        TriangleTimerLow = 0x400A,
        TriangleTimerHigh = 0x400B,
        NoiseControl = 0x400C,
        NoiseModeAndPeriod = 0x400E,
        NoiseLength = 0x400F,
        DmcControl = 0x4010,
        DmcDirectLoad = 0x4011,
        DmcSampleAddress = 0x4012,
        DmcSampleLength = 0x4013,
        Status = 0x4015,
        FrameCounter = 0x4017,
    }

    impl Register {
        pub const fn addr(self) -> u16 {
            self as u16
        }

        pub const fn from_cpu_addr(addr: u16) -> Option<Self> {
            match addr {
                0x4000 => Some(Self::Pulse1Control),
                0x4001 => Some(Self::Pulse1Sweep),
                0x4002 => Some(Self::Pulse1TimerLow),
                0x4003 => Some(Self::Pulse1TimerHigh),
                0x4004 => Some(Self::Pulse2Control),
                0x4005 => Some(Self::Pulse2Sweep),
                0x4006 => Some(Self::Pulse2TimerLow),
                0x4007 => Some(Self::Pulse2TimerHigh),
                0x4008 => Some(Self::TriangleControl),
                0x400A => Some(Self::TriangleTimerLow),
                0x400B => Some(Self::TriangleTimerHigh),
                0x400C => Some(Self::NoiseControl),
                0x400E => Some(Self::NoiseModeAndPeriod),
                0x400F => Some(Self::NoiseLength),
                0x4010 => Some(Self::DmcControl),
                0x4011 => Some(Self::DmcDirectLoad),
                0x4012 => Some(Self::DmcSampleAddress),
                0x4013 => Some(Self::DmcSampleLength),
                0x4015 => Some(Self::Status),
                0x4017 => Some(Self::FrameCounter),
                _ => None,
            }
        }
    }
}
