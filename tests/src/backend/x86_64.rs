use thunk_backend::x86_64::emitter::*;
use thunk_backend::x86_64::Reg;
use thunk_backend::{ExecAllocator, SysVCodeGen, Win64CodeGen};
use thunk_core::{ContextPtr, TargetPtr};

use super::{contains_seq, emit, emit_with, TARGET};

const MOV_EDI_CTX: [u8; 5] = [0xBF, 0x00, 0x10, 0x00, 0x00];
const MOV_ECX_CTX: [u8; 5] = [0xB9, 0x00, 0x10, 0x00, 0x00];
const MOV_R11D_TARGET: [u8; 6] = [0x41, 0xBB, 0x00, 0x20, 0x00, 0x00];
const JMP_R11: [u8; 3] = [0x41, 0xFF, 0xE3];
const CALL_R11: [u8; 3] = [0x41, 0xFF, 0xD3];

fn encode(f: impl FnOnce(&mut thunk_backend::CodeBuffer)) -> Vec<u8> {
    let alloc = ExecAllocator::new();
    let mut buf = alloc.allocate(64).unwrap();
    f(&mut buf);
    buf.as_slice().to_vec()
}

// -- Emitter --

#[test]
fn test_mov_rr_encodings() {
    assert_eq!(
        encode(|b| emit_mov_rr(b, true, Reg::Rsi, Reg::Rdi)),
        [0x48, 0x89, 0xFE]
    );
    assert_eq!(
        encode(|b| emit_mov_rr(b, true, Reg::R9, Reg::R8)),
        [0x4D, 0x89, 0xC1]
    );
    assert_eq!(
        encode(|b| emit_mov_rr(b, false, Reg::Rbp, Reg::Rsp)),
        [0x89, 0xE5]
    );
}

#[test]
fn test_mov_ri_picks_shortest_form() {
    assert_eq!(encode(|b| emit_mov_ri(b, true, Reg::Rdi, 0)), [0x31, 0xFF]);
    assert_eq!(
        encode(|b| emit_mov_ri(b, true, Reg::Rdi, 0x1000)),
        MOV_EDI_CTX
    );
    assert_eq!(
        encode(|b| emit_mov_ri(b, true, Reg::Rax, 0xFFFF_FFFF_FFFF_FFF0)),
        [0x48, 0xC7, 0xC0, 0xF0, 0xFF, 0xFF, 0xFF]
    );
    assert_eq!(
        encode(|b| emit_mov_ri(b, true, Reg::R11, 0x1122_3344_5566_7788)),
        [0x49, 0xBB, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]
    );
}

#[test]
fn test_memory_operands() {
    // rbp base always carries a displacement.
    assert_eq!(
        encode(|b| emit_load(b, true, Reg::R10, Reg::Rbp, 0)),
        [0x4C, 0x8B, 0x55, 0x00]
    );
    // rsp base needs a SIB byte.
    assert_eq!(
        encode(|b| emit_store(b, true, Reg::R9, Reg::Rsp, 0)),
        [0x4C, 0x89, 0x0C, 0x24]
    );
    assert_eq!(
        encode(|b| emit_store(b, true, Reg::R10, Reg::Rsp, 0x200)),
        [0x4C, 0x89, 0x94, 0x24, 0x00, 0x02, 0x00, 0x00]
    );
    assert_eq!(
        encode(|b| emit_push_mem(b, Reg::Rsp, 8)),
        [0xFF, 0x74, 0x24, 0x08]
    );
}

#[test]
fn test_stack_and_control_flow() {
    assert_eq!(encode(|b| emit_push(b, Reg::Rbp)), [0x55]);
    assert_eq!(encode(|b| emit_pop(b, Reg::Rcx)), [0x59]);
    assert_eq!(encode(|b| emit_push(b, Reg::R12)), [0x41, 0x54]);
    assert_eq!(encode(|b| emit_push_imm(b, 0x10)), [0x6A, 0x10]);
    assert_eq!(
        encode(|b| emit_push_imm(b, 0x1000)),
        [0x68, 0x00, 0x10, 0x00, 0x00]
    );
    assert_eq!(encode(|b| emit_jmp_reg(b, Reg::R11)), JMP_R11);
    assert_eq!(encode(|b| emit_call_reg(b, Reg::Rax)), [0xFF, 0xD0]);
    assert_eq!(
        encode(|b| emit_arith_ri(b, ArithOp::Sub, true, Reg::Rsp, 16)),
        [0x48, 0x83, 0xEC, 0x10]
    );
    assert_eq!(
        encode(|b| emit_arith_ri(b, ArithOp::Add, false, Reg::Rsp, 0x100)),
        [0x81, 0xC4, 0x00, 0x01, 0x00, 0x00]
    );
}

// -- System V --

#[test]
fn test_sysv_arity_zero() {
    let code = emit(&SysVCodeGen, 0);
    let expected: Vec<u8> = [&MOV_EDI_CTX[..], &MOV_R11D_TARGET, &JMP_R11].concat();
    assert_eq!(code, expected);
}

#[test]
fn test_sysv_shifts_highest_first() {
    let code = emit(&SysVCodeGen, 2);
    let expected: Vec<u8> = [
        &[0x48, 0x89, 0xF2][..], // mov rdx, rsi
        &[0x48, 0x89, 0xFE],     // mov rsi, rdi
        &MOV_EDI_CTX,
        &MOV_R11D_TARGET,
        &JMP_R11,
    ]
    .concat();
    assert_eq!(code, expected);
}

#[test]
fn test_sysv_last_register_arity_stays_tail_jump() {
    let code = emit(&SysVCodeGen, 5);
    assert!(code.ends_with(&JMP_R11));
    // mov r9, r8 first.
    assert_eq!(&code[..3], &[0x4D, 0x89, 0xC1]);
}

#[test]
fn test_sysv_spilled_register_builds_frame() {
    let code = emit(&SysVCodeGen, 6);
    let expected: Vec<u8> = [
        &[0x55][..],                   // push rbp
        &[0x48, 0x89, 0xE5],           // mov rbp, rsp
        &[0x48, 0x83, 0xEC, 0x10],     // sub rsp, 16
        &[0x4C, 0x89, 0x0C, 0x24],     // mov [rsp], r9
        &[0x4D, 0x89, 0xC1],           // mov r9, r8
        &[0x49, 0x89, 0xC8],           // mov r8, rcx
        &[0x48, 0x89, 0xD1],           // mov rcx, rdx
        &[0x48, 0x89, 0xF2],           // mov rdx, rsi
        &[0x48, 0x89, 0xFE],           // mov rsi, rdi
        &MOV_EDI_CTX,
        &MOV_R11D_TARGET,
        &CALL_R11,
        &[0xC9, 0xC3],                 // leave; ret
    ]
    .concat();
    assert_eq!(code, expected);
}

#[test]
fn test_sysv_copies_caller_stack_args_last_first() {
    let code = emit(&SysVCodeGen, 8);
    // Two incoming stack args plus the spilled r9: 24 bytes, rounded to 32.
    assert!(contains_seq(&code, &[0x48, 0x83, 0xEC, 0x20]));

    let copy_second: Vec<u8> = [
        &[0x4C, 0x8B, 0x55, 0x18][..],   // mov r10, [rbp+24]
        &[0x4C, 0x89, 0x54, 0x24, 0x10], // mov [rsp+16], r10
    ]
    .concat();
    let copy_first: Vec<u8> = [
        &[0x4C, 0x8B, 0x55, 0x10][..],   // mov r10, [rbp+16]
        &[0x4C, 0x89, 0x54, 0x24, 0x08], // mov [rsp+8], r10
    ]
    .concat();
    let both: Vec<u8> = [copy_second, copy_first].concat();
    assert!(contains_seq(&code, &both));
    assert!(code.ends_with(&[0xC9, 0xC3]));
}

#[test]
fn test_sysv_wide_pointers() {
    let code = emit_with(
        &SysVCodeGen,
        TargetPtr(0x7F00_1122_3344),
        ContextPtr(0x7F00_5566_7788),
        0,
    );
    assert_eq!(
        code,
        [
            0x48, 0xBF, 0x88, 0x77, 0x66, 0x55, 0x00, 0x7F, 0x00, 0x00, // movabs rdi
            0x49, 0xBB, 0x44, 0x33, 0x22, 0x11, 0x00, 0x7F, 0x00, 0x00, // movabs r11
            0x41, 0xFF, 0xE3,
        ]
    );
}

#[test]
fn test_sysv_null_context() {
    let code = emit_with(&SysVCodeGen, TARGET, ContextPtr::NULL, 0);
    assert_eq!(&code[..2], &[0x31, 0xFF]); // xor edi, edi
}

// -- Microsoft x64 --

#[test]
fn test_win64_register_path() {
    let code = emit(&Win64CodeGen, 3);
    let expected: Vec<u8> = [
        &[0x4D, 0x89, 0xC1][..], // mov r9, r8
        &[0x49, 0x89, 0xD0],     // mov r8, rdx
        &[0x48, 0x89, 0xCA],     // mov rdx, rcx
        &MOV_ECX_CTX,
        &MOV_R11D_TARGET,
        &JMP_R11,
    ]
    .concat();
    assert_eq!(code, expected);
}

#[test]
fn test_win64_frame_keeps_home_area() {
    let code = emit(&Win64CodeGen, 4);
    let expected: Vec<u8> = [
        &[0x55][..],
        &[0x48, 0x89, 0xE5],
        &[0x48, 0x83, 0xEC, 0x30],       // sub rsp, 48: home area + one slot
        &[0x4C, 0x89, 0x4C, 0x24, 0x20], // mov [rsp+32], r9
        &[0x4D, 0x89, 0xC1],
        &[0x49, 0x89, 0xD0],
        &[0x48, 0x89, 0xCA],
        &MOV_ECX_CTX,
        &MOV_R11D_TARGET,
        &CALL_R11,
        &[0xC9, 0xC3],
    ]
    .concat();
    assert_eq!(code, expected);
}

#[test]
fn test_win64_reads_stack_args_past_home_area() {
    let code = emit(&Win64CodeGen, 5);
    // First caller stack arg sits at [rbp + 16 + 32].
    assert!(contains_seq(&code, &[0x4C, 0x8B, 0x55, 0x30]));
    assert!(contains_seq(&code, &[0x4C, 0x89, 0x54, 0x24, 0x28]));
}
