use dtoi_core::RegSet;

/// x86-64 general-purpose register indices.
///
/// Encoding matches the x86-64 ModR/M and REX register numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Reg {
    /// Low 3 bits of the register encoding (for ModR/M).
    #[inline]
    pub const fn low3(self) -> u8 {
        (self as u8) & 0x7
    }

    /// Whether this register requires a REX prefix (R8-R15).
    #[inline]
    pub const fn needs_rex(self) -> bool {
        (self as u8) >= 8
    }

    /// Build a register from its encoding.
    pub fn from_u8(v: u8) -> Reg {
        assert!(v < 16, "invalid register code {v}");
        // SAFETY: Reg is repr(u8) with variants 0..16.
        unsafe { core::mem::transmute::<u8, Reg>(v) }
    }

    /// Assembler name, for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Reg::Rax => "rax",
            Reg::Rcx => "rcx",
            Reg::Rdx => "rdx",
            Reg::Rbx => "rbx",
            Reg::Rsp => "rsp",
            Reg::Rbp => "rbp",
            Reg::Rsi => "rsi",
            Reg::Rdi => "rdi",
            Reg::R8 => "r8",
            Reg::R9 => "r9",
            Reg::R10 => "r10",
            Reg::R11 => "r11",
            Reg::R12 => "r12",
            Reg::R13 => "r13",
            Reg::R14 => "r14",
            Reg::R15 => "r15",
        }
    }
}

/// SSE register indices, numbered like their GP counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Xmm {
    Xmm0 = 0,
    Xmm1 = 1,
    Xmm2 = 2,
    Xmm3 = 3,
    Xmm4 = 4,
    Xmm5 = 5,
    Xmm6 = 6,
    Xmm7 = 7,
}

impl Xmm {
    #[inline]
    pub const fn low3(self) -> u8 {
        (self as u8) & 0x7
    }
}

/// Registers never touched by the save/verify machinery and never valid
/// as a stub destination: the stack pointer and the frame pointer.
pub const RESERVED_REGS: RegSet =
    RegSet::from_raw((1 << Reg::Rsp as u64) | (1 << Reg::Rbp as u64));

/// Every general-purpose register available to the stub under test.
/// These are the save/verify candidates and the valid destinations.
pub const ALLOCATABLE_REGS: RegSet =
    RegSet::from_raw(0xFFFF).subtract(RESERVED_REGS);

/// Valid input locations for the stub. RSP here means "the input is
/// read from the stack" rather than from a heap-number pointer.
pub const SOURCE_REGS: RegSet = ALLOCATABLE_REGS.set(Reg::Rsp as u8);

/// Callee-saved registers the trampoline prologue must save/restore.
/// Order matches the System V ABI push sequence used by the backend.
pub const CALLEE_SAVED: &[Reg] =
    &[Reg::Rbp, Reg::Rbx, Reg::R12, Reg::R13, Reg::R14, Reg::R15];

/// Displacement from a tagged heap-number pointer to its f64 payload:
/// the payload sits one word into the object and the pointer carries a
/// one-byte tag.
pub const HEAP_NUMBER_VALUE_OFFSET: i32 = 7;
