use bitflags::bitflags;
use ember_x86::{Register, Width};

bitflags! {
    /// The EFLAGS register.
    ///
    /// Only the bits the core actually computes are named; bit 1 is the
    /// architecturally reserved always-set bit. CF and OF are only ever set
    /// by the explicit carry/overflow predicates in [`crate::rtl`], never
    /// derived from ZF/SF.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Eflags: u32 {
        const CF = 1 << 0;
        const RESERVED1 = 1 << 1;
        const ZF = 1 << 6;
        const SF = 1 << 7;
        const IF = 1 << 9;
        const OF = 1 << 11;
    }
}

impl Default for Eflags {
    fn default() -> Self {
        Eflags::RESERVED1
    }
}

/// A descriptor-table register (base + limit pair), e.g. the IDTR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescriptorTableReg {
    pub base: u32,
    pub limit: u16,
}

/// The architectural CPU state.
///
/// One owned aggregate for the whole emulated run: the eight GPRs, EFLAGS,
/// and the privileged descriptor-table register. It is borrowed mutably per
/// instruction by the executor; handlers cannot retain it. `eip` belongs to
/// the fetch/decode driver; no instruction handler advances it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuState {
    gpr: [u32; 8],
    eflags: Eflags,
    pub eip: u32,
    pub idtr: DescriptorTableReg,
}

impl Default for CpuState {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            gpr: [0; 8],
            eflags: Eflags::default(),
            eip: 0,
            idtr: DescriptorTableReg::default(),
        }
    }

    /// Read a register through any of its aliases, zero-extended to 32 bits.
    #[must_use]
    pub fn read_reg(&self, reg: Register) -> u32 {
        let full = self.gpr[reg.gpr_index()];
        match reg.width() {
            Width::W1 if reg.is_high8() => (full >> 8) & 0xFF,
            Width::W1 => full & 0xFF,
            Width::W2 => full & 0xFFFF,
            Width::W4 => full,
        }
    }

    /// Write a register through any of its aliases.
    ///
    /// Sub-width writes leave the sibling bytes of the backing GPR
    /// untouched; a full-width write overwrites all sub-parts.
    pub fn write_reg(&mut self, reg: Register, val: u32) {
        let cur = self.gpr[reg.gpr_index()];
        self.gpr[reg.gpr_index()] = match reg.width() {
            Width::W1 if reg.is_high8() => (cur & !0xFF00) | ((val & 0xFF) << 8),
            Width::W1 => (cur & !0xFF) | (val & 0xFF),
            Width::W2 => (cur & !0xFFFF) | (val & 0xFFFF),
            Width::W4 => val,
        };
    }

    #[must_use]
    pub fn eflags(&self) -> Eflags {
        self.eflags | Eflags::RESERVED1
    }

    pub fn set_eflags(&mut self, flags: Eflags) {
        self.eflags = flags | Eflags::RESERVED1;
    }

    #[must_use]
    pub fn get_flag(&self, flag: Eflags) -> bool {
        self.eflags.contains(flag)
    }

    pub fn set_flag(&mut self, flag: Eflags, val: bool) {
        self.eflags.set(flag, val);
    }
}
