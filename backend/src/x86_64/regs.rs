/// x86-64 general-purpose register indices.
///
/// Encoding matches the x86-64 ModR/M and REX register numbering.
/// The low eight double as the 32-bit registers of i386 code.
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
}

/// Integer argument registers, System V AMD64 ABI.
pub const SYSV_ARG_REGS: &[Reg] = &[Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];

/// Integer argument registers, Microsoft x64 ABI.
pub const WIN64_ARG_REGS: &[Reg] = &[Reg::Rcx, Reg::Rdx, Reg::R8, Reg::R9];

/// Home area the Microsoft x64 caller reserves above the return address.
pub const WIN64_SHADOW_SPACE: i32 = 32;

/// Holds the target address for the final branch. Volatile and never
/// an argument register in either ABI.
pub const TARGET_REG: Reg = Reg::R11;

/// Temporary for copying stack arguments. RAX is avoided because
/// System V variadic calls pass the vector register count in AL.
pub const COPY_REG: Reg = Reg::R10;

pub const STACK_ALIGN: i32 = 16;
