//! 32-bit x86 stack conventions.
//!
//! Encodings come from the x86-64 emitter: without REX.W and with
//! only the first eight registers it produces plain i386 code.

use thunk_core::{Abi, ContextPtr, StubError, TargetPtr};

use crate::code_buffer::CodeBuffer;
use crate::x86_64::emitter::*;
use crate::x86_64::Reg;
use crate::{check_arity, StubCodeGen};

pub const STUB_SIZE: usize = 384;

const SLOT: i32 = 4;

/// `esp` at stub entry sits one return address below a 16-byte
/// boundary when the caller honours the i386 System V alignment.
const ENTRY_MISALIGN: i32 = 12;

/// cdecl: caller cleans up, all arguments on the stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdeclCodeGen;

/// stdcall: callee pops its own arguments.
///
/// The stub relies on the target popping the injected context along
/// with the caller's arguments. Binding a cdecl target through it
/// leaks one stack slot per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdcallCodeGen;

impl StubCodeGen for CdeclCodeGen {
    fn abi(&self) -> Abi {
        Abi::I386Cdecl
    }

    fn stub_size(&self) -> usize {
        STUB_SIZE
    }

    fn emit_stub(
        &self,
        buf: &mut CodeBuffer,
        target: TargetPtr,
        ctx: ContextPtr,
        arity: usize,
    ) -> Result<(), StubError> {
        check_arity(arity)?;
        if arity == 0 {
            emit_call_pop(buf, target, ctx);
        } else {
            emit_duplicate_slots(buf, target, ctx, arity);
        }
        Ok(())
    }
}

impl StubCodeGen for StdcallCodeGen {
    fn abi(&self) -> Abi {
        Abi::I386Stdcall
    }

    fn stub_size(&self) -> usize {
        STUB_SIZE
    }

    fn emit_stub(
        &self,
        buf: &mut CodeBuffer,
        target: TargetPtr,
        ctx: ContextPtr,
        arity: usize,
    ) -> Result<(), StubError> {
        check_arity(arity)?;
        emit_stack_prepend(buf, target, ctx);
        Ok(())
    }
}

/// Padding that leaves `esp` 16-byte aligned after `pushed` slots.
fn call_padding(pushed: i32) -> i32 {
    (ENTRY_MISALIGN - SLOT * pushed).rem_euclid(16)
}

/// No caller stack arguments: push the context, call, drop it again.
///
/// The target reads the context as its first argument and whatever
/// sits above it is never looked at, so no arity is needed.
fn emit_call_pop(buf: &mut CodeBuffer, target: TargetPtr, ctx: ContextPtr) {
    let pad = call_padding(1);
    if pad != 0 {
        emit_arith_ri(buf, ArithOp::Sub, false, Reg::Rsp, pad);
    }
    emit_push_imm(buf, ctx.addr() as u32 as i32);
    emit_mov_ri(buf, false, Reg::Rax, target.addr() as u32 as u64);
    emit_call_reg(buf, Reg::Rax);
    emit_arith_ri(buf, ArithOp::Add, false, Reg::Rsp, SLOT + pad);
    emit_ret(buf);
}

/// Copy the caller's `arity` stack arguments below the return
/// address (last argument first), push the context on top, call and
/// release the copies with one `esp` adjustment.
fn emit_duplicate_slots(buf: &mut CodeBuffer, target: TargetPtr, ctx: ContextPtr, arity: usize) {
    let n = arity as i32;
    let pad = call_padding(n + 1);
    if pad != 0 {
        emit_arith_ri(buf, ArithOp::Sub, false, Reg::Rsp, pad);
    }
    // Every push moves esp down one slot, so the next argument to copy
    // is always at the same distance: return address + n slots + pad.
    for _ in 0..n {
        emit_push_mem(buf, Reg::Rsp, SLOT * n + pad);
    }
    emit_push_imm(buf, ctx.addr() as u32 as i32);
    emit_mov_ri(buf, false, Reg::Rax, target.addr() as u32 as u64);
    emit_call_reg(buf, Reg::Rax);
    emit_arith_ri(buf, ArithOp::Add, false, Reg::Rsp, SLOT * (n + 1) + pad);
    emit_ret(buf);
}

/// stdcall targets pop `arity + 1` slots on return, which is exactly
/// the caller's `arity` slots plus the injected one. Parking the
/// return address in ecx, pushing the context beneath the arguments
/// and restoring the return address makes the target return straight
/// to the original caller with a balanced stack.
fn emit_stack_prepend(buf: &mut CodeBuffer, target: TargetPtr, ctx: ContextPtr) {
    emit_pop(buf, Reg::Rcx);
    emit_push_imm(buf, ctx.addr() as u32 as i32);
    emit_push(buf, Reg::Rcx);
    emit_mov_ri(buf, false, Reg::Rax, target.addr() as u32 as u64);
    emit_jmp_reg(buf, Reg::Rax);
}
