//! A32 instruction encoders, condition AL.

pub const SP: u8 = 13;
pub const LR: u8 = 14;
pub const PC: u8 = 15;
pub const FP: u8 = 11;
pub const IP: u8 = 12;

/// Distance the PC reads ahead of the executing instruction.
pub const PC_BIAS: usize = 8;

/// MOV Rd, Rm.
pub const fn mov(rd: u8, rm: u8) -> u32 {
    0xE1A0_0000 | ((rd as u32) << 12) | rm as u32
}

/// LDR Rt, [Rn, #+imm12].
pub const fn ldr_imm(rt: u8, rn: u8, imm12: u32) -> u32 {
    0xE590_0000 | ((rn as u32) << 16) | ((rt as u32) << 12) | (imm12 & 0xFFF)
}

/// STR Rt, [Rn, #+imm12].
pub const fn str_imm(rt: u8, rn: u8, imm12: u32) -> u32 {
    0xE580_0000 | ((rn as u32) << 16) | ((rt as u32) << 12) | (imm12 & 0xFFF)
}

/// SUB Rd, Rn, #imm8 (no rotation).
pub const fn sub_imm(rd: u8, rn: u8, imm8: u32) -> u32 {
    0xE240_0000 | ((rn as u32) << 16) | ((rd as u32) << 12) | (imm8 & 0xFF)
}

/// PUSH {r11, lr}
pub const PUSH_FP_LR: u32 = 0xE92D_4800;

/// POP {r11, pc}
pub const POP_FP_PC: u32 = 0xE8BD_8800;

/// BX Rm.
pub const fn bx(rm: u8) -> u32 {
    0xE12F_FF10 | rm as u32
}

/// BLX Rm.
pub const fn blx(rm: u8) -> u32 {
    0xE12F_FF30 | rm as u32
}
