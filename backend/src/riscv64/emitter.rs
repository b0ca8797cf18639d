//! RV64I instruction encoders.

pub const ZERO: u8 = 0;
pub const RA: u8 = 1;
pub const SP: u8 = 2;
pub const T0: u8 = 5;
pub const T1: u8 = 6;
pub const T2: u8 = 7;
pub const S0: u8 = 8;
pub const A0: u8 = 10;

const OP_IMM: u32 = 0x13;
const LOAD: u32 = 0x03;
const STORE: u32 = 0x23;
const AUIPC: u32 = 0x17;
const JALR: u32 = 0x67;

const fn i_type(opcode: u32, funct3: u32, rd: u8, rs1: u8, imm: i32) -> u32 {
    (((imm as u32) & 0xFFF) << 20)
        | ((rs1 as u32) << 15)
        | (funct3 << 12)
        | ((rd as u32) << 7)
        | opcode
}

/// ADDI rd, rs1, imm.
pub const fn addi(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(OP_IMM, 0, rd, rs1, imm)
}

/// MV rd, rs (ADDI rd, rs, 0).
pub const fn mv(rd: u8, rs: u8) -> u32 {
    addi(rd, rs, 0)
}

/// LD rd, imm(rs1).
pub const fn ld(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(LOAD, 3, rd, rs1, imm)
}

/// SD rs2, imm(rs1).
pub const fn sd(rs2: u8, rs1: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    (((imm >> 5) & 0x7F) << 25)
        | ((rs2 as u32) << 20)
        | ((rs1 as u32) << 15)
        | (3 << 12)
        | ((imm & 0x1F) << 7)
        | STORE
}

/// AUIPC rd, imm20.
pub const fn auipc(rd: u8, imm20: u32) -> u32 {
    ((imm20 & 0xFFFFF) << 12) | ((rd as u32) << 7) | AUIPC
}

/// JALR rd, imm(rs1).
pub const fn jalr(rd: u8, rs1: u8, imm: i32) -> u32 {
    i_type(JALR, 0, rd, rs1, imm)
}

/// JR rs (JALR zero, 0(rs)).
pub const fn jr(rs: u8) -> u32 {
    jalr(ZERO, rs, 0)
}

/// RET (JALR zero, 0(ra)).
pub const RET: u32 = jalr(ZERO, RA, 0);

/// Replace the 12-bit immediate of an I-type word.
pub const fn with_i_imm(insn: u32, imm: i32) -> u32 {
    (insn & 0x000F_FFFF) | (((imm as u32) & 0xFFF) << 20)
}
