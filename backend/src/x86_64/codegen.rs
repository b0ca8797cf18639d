use thunk_core::{Abi, ContextPtr, StubError, TargetPtr};

use crate::code_buffer::CodeBuffer;
use crate::x86_64::emitter::*;
use crate::x86_64::regs::{
    Reg, COPY_REG, STACK_ALIGN, SYSV_ARG_REGS, TARGET_REG, WIN64_ARG_REGS, WIN64_SHADOW_SPACE,
};
use crate::{align_up, check_arity, StubCodeGen};

/// Upper bound on emitted bytes for either x86-64 convention.
pub const STUB_SIZE: usize = 512;

/// x86-64 System V: rdi, rsi, rdx, rcx, r8, r9.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysVCodeGen;

/// Microsoft x64: rcx, rdx, r8, r9 plus a 32-byte home area.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win64CodeGen;

impl StubCodeGen for SysVCodeGen {
    fn abi(&self) -> Abi {
        Abi::X86_64SysV
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
        emit_injection(buf, SYSV_ARG_REGS, 0, target, ctx, arity);
        Ok(())
    }
}

impl StubCodeGen for Win64CodeGen {
    fn abi(&self) -> Abi {
        Abi::X86_64Win64
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
        emit_injection(buf, WIN64_ARG_REGS, WIN64_SHADOW_SPACE, target, ctx, arity);
        Ok(())
    }
}

/// Move argument `i` into argument `i + 1` for `i` in `0..count`,
/// highest first so nothing is overwritten before it is read.
fn shift_arg_regs(buf: &mut CodeBuffer, args: &[Reg], count: usize) {
    for i in (0..count).rev() {
        emit_mov_rr(buf, true, args[i + 1], args[i]);
    }
}

/// Shared register-passing injection for both x86-64 conventions.
///
/// With the whole public argument list in registers the stub shifts
/// them up one, loads the context into the first slot and jumps.
/// Once the last register spills, the caller's outgoing area has no
/// room for one more slot, so the stub builds its own frame: copy the
/// caller's stack arguments one slot further out, store the displaced
/// register in the first slot, call, tear the frame down and return.
fn emit_injection(
    buf: &mut CodeBuffer,
    args: &[Reg],
    shadow: i32,
    target: TargetPtr,
    ctx: ContextPtr,
    arity: usize,
) {
    let k = args.len();

    if arity < k {
        shift_arg_regs(buf, args, arity);
        emit_mov_ri(buf, true, args[0], ctx.addr() as u64);
        emit_mov_ri(buf, true, TARGET_REG, target.addr() as u64);
        emit_jmp_reg(buf, TARGET_REG);
        return;
    }

    let stack_in = (arity - k) as i32;
    let area = align_up((shadow + 8 * (stack_in + 1)) as usize, STACK_ALIGN as usize) as i32;

    // push rbp; mov rbp, rsp -- rsp is now 16-byte aligned.
    emit_push(buf, Reg::Rbp);
    emit_mov_rr(buf, true, Reg::Rbp, Reg::Rsp);
    emit_arith_ri(buf, ArithOp::Sub, true, Reg::Rsp, area);

    // Caller's stack argument i lives at [rbp + 16 + shadow + 8*i].
    for i in (0..stack_in).rev() {
        emit_load(buf, true, COPY_REG, Reg::Rbp, 16 + shadow + 8 * i);
        emit_store(buf, true, COPY_REG, Reg::Rsp, shadow + 8 * (i + 1));
    }
    emit_store(buf, true, args[k - 1], Reg::Rsp, shadow);
    shift_arg_regs(buf, args, k - 1);

    emit_mov_ri(buf, true, args[0], ctx.addr() as u64);
    emit_mov_ri(buf, true, TARGET_REG, target.addr() as u64);
    emit_call_reg(buf, TARGET_REG);
    emit_leave(buf);
    emit_ret(buf);
}
