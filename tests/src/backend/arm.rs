use thunk_backend::arm::emitter::*;
use thunk_backend::ArmCodeGen;

use super::{emit, words};

#[test]
fn test_encoders() {
    assert_eq!(mov(FP, SP), 0xE1A0_B00D);
    assert_eq!(ldr_imm(IP, PC, 4), 0xE59F_C004);
    assert_eq!(str_imm(3, SP, 0), 0xE58D_3000);
    assert_eq!(sub_imm(SP, SP, 8), 0xE24D_D008);
    assert_eq!(bx(IP), 0xE12F_FF1C);
    assert_eq!(blx(IP), 0xE12F_FF3C);
}

#[test]
fn test_arity_zero() {
    let w = words(&emit(&ArmCodeGen, 0));
    assert_eq!(
        w,
        [0xE59F_0004, 0xE59F_C004, 0xE12F_FF1C, 0x1000, 0x2000]
    );
}

#[test]
fn test_register_shift() {
    let w = words(&emit(&ArmCodeGen, 2));
    assert_eq!(
        w,
        [
            0xE1A0_2001, // mov r2, r1
            0xE1A0_1000, // mov r1, r0
            0xE59F_0004,
            0xE59F_C004,
            0xE12F_FF1C,
            0x1000,
            0x2000,
        ]
    );
}

#[test]
fn test_stack_path() {
    let w = words(&emit(&ArmCodeGen, 5));
    assert_eq!(
        w,
        [
            PUSH_FP_LR,
            0xE1A0_B00D, // mov r11, sp
            0xE24D_D008, // sub sp, sp, #8
            0xE59B_C008, // ldr ip, [r11, #8]
            0xE58D_C004, // str ip, [sp, #4]
            0xE58D_3000, // str r3, [sp]
            0xE1A0_3002,
            0xE1A0_2001,
            0xE1A0_1000,
            0xE59F_000C, // ldr r0, [pc, #12]
            0xE59F_C00C, // ldr ip, [pc, #12]
            0xE12F_FF3C, // blx ip
            0xE1A0_D00B, // mov sp, r11
            POP_FP_PC,
            0x1000,
            0x2000,
        ]
    );
}
