//! MIPS32 instruction encoders.

pub const ZERO: u8 = 0;
pub const T0: u8 = 8;
pub const T9: u8 = 25;
pub const SP: u8 = 29;
pub const RA: u8 = 31;

/// NOP (SLL zero, zero, 0); fills branch delay slots.
pub const NOP: u32 = 0;

/// MOVE rd, rs (ADDU rd, rs, zero).
pub const fn mov(rd: u8, rs: u8) -> u32 {
    ((rs as u32) << 21) | ((ZERO as u32) << 16) | ((rd as u32) << 11) | 0x21
}

/// ADDIU rt, rs, imm16.
pub const fn addiu(rt: u8, rs: u8, imm: i32) -> u32 {
    0x2400_0000 | ((rs as u32) << 21) | ((rt as u32) << 16) | ((imm as u32) & 0xFFFF)
}

/// LUI rt, imm16.
pub const fn lui(rt: u8, imm: u32) -> u32 {
    0x3C00_0000 | ((rt as u32) << 16) | (imm & 0xFFFF)
}

/// ORI rt, rs, imm16.
pub const fn ori(rt: u8, rs: u8, imm: u32) -> u32 {
    0x3400_0000 | ((rs as u32) << 21) | ((rt as u32) << 16) | (imm & 0xFFFF)
}

/// LW rt, offset(base).
pub const fn lw(rt: u8, base: u8, offset: i32) -> u32 {
    0x8C00_0000 | ((base as u32) << 21) | ((rt as u32) << 16) | ((offset as u32) & 0xFFFF)
}

/// SW rt, offset(base).
pub const fn sw(rt: u8, base: u8, offset: i32) -> u32 {
    0xAC00_0000 | ((base as u32) << 21) | ((rt as u32) << 16) | ((offset as u32) & 0xFFFF)
}

/// JR rs.
pub const fn jr(rs: u8) -> u32 {
    ((rs as u32) << 21) | 0x08
}

/// JALR ra, rs.
pub const fn jalr(rs: u8) -> u32 {
    ((rs as u32) << 21) | ((RA as u32) << 11) | 0x09
}
