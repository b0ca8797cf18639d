//! MIPS o32. There is no PC-relative load, so both constants are
//! built from `lui`/`ori` halves. The target is always reached
//! through t9, which position-independent callees expect to hold
//! their own address.

pub mod emitter;

use thunk_core::{Abi, ContextPtr, StubError, TargetPtr};

use crate::code_buffer::CodeBuffer;
use crate::{align_up, check_arity, StubCodeGen};
use emitter::*;

pub const STUB_SIZE: usize = 384;

/// a0-a3 ($4-$7).
pub const ARG_REGS: [u8; 4] = [4, 5, 6, 7];

/// Argument home area every o32 caller reserves below its outgoing
/// stack arguments.
pub const HOME_AREA: i32 = 16;

pub const STACK_ALIGN: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct MipsO32CodeGen;

impl StubCodeGen for MipsO32CodeGen {
    fn abi(&self) -> Abi {
        Abi::MipsO32
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
        let k = ARG_REGS.len();
        let ctx = ctx.addr() as u32;
        let target = target.addr() as u32;

        if arity < k {
            shift_arg_regs(buf, arity);
            emit_load_const(buf, ARG_REGS[0], ctx);
            emit_load_const(buf, T9, target);
            buf.emit_u32(jr(T9));
            buf.emit_u32(NOP);
            return Ok(());
        }

        let stack_in = (arity - k) as i32;
        // Home area, outgoing stack arguments, saved ra.
        let frame = align_up((HOME_AREA + 4 * (stack_in + 1) + 4) as usize, STACK_ALIGN) as i32;

        buf.emit_u32(addiu(SP, SP, -frame));
        buf.emit_u32(sw(RA, SP, frame - 4));
        // Caller's stack argument i is at frame + 16 + 4*i (sp).
        for i in (0..stack_in).rev() {
            buf.emit_u32(lw(T0, SP, frame + HOME_AREA + 4 * i));
            buf.emit_u32(sw(T0, SP, HOME_AREA + 4 * (i + 1)));
        }
        buf.emit_u32(sw(ARG_REGS[k - 1], SP, HOME_AREA));
        shift_arg_regs(buf, k - 1);
        emit_load_const(buf, ARG_REGS[0], ctx);
        emit_load_const(buf, T9, target);
        buf.emit_u32(jalr(T9));
        buf.emit_u32(NOP);
        buf.emit_u32(lw(RA, SP, frame - 4));
        buf.emit_u32(jr(RA));
        // Frame is released in the delay slot of the return.
        buf.emit_u32(addiu(SP, SP, frame));
        Ok(())
    }
}

fn shift_arg_regs(buf: &mut CodeBuffer, count: usize) {
    for i in (0..count).rev() {
        buf.emit_u32(mov(ARG_REGS[i + 1], ARG_REGS[i]));
    }
}

fn emit_load_const(buf: &mut CodeBuffer, rt: u8, value: u32) {
    buf.emit_u32(lui(rt, value >> 16));
    buf.emit_u32(ori(rt, rt, value & 0xFFFF));
}
