//! A64 instruction encoders. Every helper returns one 32-bit word.

pub const XZR: u8 = 31;
pub const SP: u8 = 31;
pub const FP: u8 = 29;
pub const LR: u8 = 30;

/// MOV Xd, Xm (ORR Xd, XZR, Xm).
pub const fn mov(rd: u8, rm: u8) -> u32 {
    0xAA00_03E0 | ((rm as u32) << 16) | rd as u32
}

/// MOV Xd|SP, Xn|SP (ADD Xd, Xn, #0); plain ORR cannot name SP.
pub const fn mov_sp(rd: u8, rn: u8) -> u32 {
    add_imm(rd, rn, 0)
}

/// ADD Xd|SP, Xn|SP, #imm12.
pub const fn add_imm(rd: u8, rn: u8, imm12: u32) -> u32 {
    0x9100_0000 | ((imm12 & 0xFFF) << 10) | ((rn as u32) << 5) | rd as u32
}

/// SUB Xd|SP, Xn|SP, #imm12.
pub const fn sub_imm(rd: u8, rn: u8, imm12: u32) -> u32 {
    0xD100_0000 | ((imm12 & 0xFFF) << 10) | ((rn as u32) << 5) | rd as u32
}

/// LDR Xt, label. `words` is the PC-relative distance in instructions.
pub const fn ldr_literal(rt: u8, words: i32) -> u32 {
    0x5800_0000 | (((words as u32) & 0x7FFFF) << 5) | rt as u32
}

/// LDR Xt, [Xn|SP, #offset] with an unsigned, 8-byte scaled offset.
pub const fn ldr_imm(rt: u8, rn: u8, offset: u32) -> u32 {
    0xF940_0000 | (((offset / 8) & 0xFFF) << 10) | ((rn as u32) << 5) | rt as u32
}

/// STR Xt, [Xn|SP, #offset] with an unsigned, 8-byte scaled offset.
pub const fn str_imm(rt: u8, rn: u8, offset: u32) -> u32 {
    0xF900_0000 | (((offset / 8) & 0xFFF) << 10) | ((rn as u32) << 5) | rt as u32
}

/// STP X29, X30, [SP, #-16]!
pub const STP_FP_LR_PRE: u32 = 0xA9BF_7BFD;

/// LDP X29, X30, [SP], #16
pub const LDP_FP_LR_POST: u32 = 0xA8C1_7BFD;

/// BR Xn.
pub const fn br(rn: u8) -> u32 {
    0xD61F_0000 | ((rn as u32) << 5)
}

/// BLR Xn.
pub const fn blr(rn: u8) -> u32 {
    0xD63F_0000 | ((rn as u32) << 5)
}

/// RET (X30).
pub const RET: u32 = 0xD65F_03C0;

/// Patch the imm19 field of an `LDR literal` word.
pub const fn with_literal_offset(insn: u32, words: i32) -> u32 {
    (insn & !(0x7FFFF << 5)) | (((words as u32) & 0x7FFFF) << 5)
}
