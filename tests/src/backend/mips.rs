use thunk_backend::mips::emitter::*;
use thunk_backend::MipsO32CodeGen;

use super::{emit, words};

#[test]
fn test_encoders() {
    assert_eq!(mov(5, 4), 0x0080_2821);
    assert_eq!(addiu(SP, SP, -24), 0x27BD_FFE8);
    assert_eq!(sw(RA, SP, 20), 0xAFBF_0014);
    assert_eq!(lw(T0, SP, 52), 0x8FA8_0034);
    assert_eq!(lui(T9, 0x1234), 0x3C19_1234);
    assert_eq!(ori(4, 4, 0x1000), 0x3484_1000);
    assert_eq!(jr(T9), 0x0320_0008);
    assert_eq!(jalr(T9), 0x0320_F809);
}

#[test]
fn test_register_path() {
    let w = words(&emit(&MipsO32CodeGen, 1));
    assert_eq!(
        w,
        [
            0x0080_2821, // move a1, a0
            0x3C04_0000, // lui a0, 0
            0x3484_1000, // ori a0, a0, 0x1000
            0x3C19_0000, // lui t9, 0
            0x3739_2000, // ori t9, t9, 0x2000
            0x0320_0008, // jr t9
            NOP,
        ]
    );
}

#[test]
fn test_spilled_register_path() {
    let w = words(&emit(&MipsO32CodeGen, 4));
    assert_eq!(
        w,
        [
            0x27BD_FFE8, // addiu sp, sp, -24
            0xAFBF_0014, // sw ra, 20(sp)
            0xAFA7_0010, // sw a3, 16(sp)
            0x00C0_3821,
            0x00A0_3021,
            0x0080_2821,
            0x3C04_0000,
            0x3484_1000,
            0x3C19_0000,
            0x3739_2000,
            0x0320_F809, // jalr t9
            NOP,
            0x8FBF_0014, // lw ra, 20(sp)
            0x03E0_0008, // jr ra
            0x27BD_0018, // addiu sp, sp, 24
        ]
    );
}

#[test]
fn test_copies_past_home_area() {
    let w = words(&emit(&MipsO32CodeGen, 6));
    assert_eq!(w[0], addiu(SP, SP, -32));
    assert_eq!(
        &w[2..6],
        &[lw(T0, SP, 52), sw(T0, SP, 24), lw(T0, SP, 48), sw(T0, SP, 20)]
    );
    assert_eq!(w[6], sw(7, SP, 16));
}
