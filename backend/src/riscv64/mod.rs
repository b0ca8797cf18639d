pub mod emitter;

use thunk_core::{Abi, ContextPtr, StubError, TargetPtr};

use crate::code_buffer::CodeBuffer;
use crate::{align_up, check_arity, StubCodeGen};
use emitter::*;

pub const STUB_SIZE: usize = 512;

/// a0-a7 (x10-x17).
pub const ARG_REGS: [u8; 8] = [10, 11, 12, 13, 14, 15, 16, 17];

/// RV64 LP64 integer convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct Riscv64CodeGen;

impl StubCodeGen for Riscv64CodeGen {
    fn abi(&self) -> Abi {
        Abi::Riscv64
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
        let pool_base;

        if arity < k {
            shift_arg_regs(buf, arity);
            pool_base = emit_constant_loads(buf);
            buf.emit_u32(jr(T1));
        } else {
            let stack_in = (arity - k) as i32;
            let area = align_up(8 * (stack_in as usize + 1), 16) as i32;

            buf.emit_u32(addi(SP, SP, -16));
            buf.emit_u32(sd(RA, SP, 8));
            buf.emit_u32(sd(S0, SP, 0));
            buf.emit_u32(addi(S0, SP, 16));
            buf.emit_u32(addi(SP, SP, -area));
            // Caller's stack argument i is at 8*i(s0).
            for i in (0..stack_in).rev() {
                buf.emit_u32(ld(T0, S0, 8 * i));
                buf.emit_u32(sd(T0, SP, 8 * (i + 1)));
            }
            buf.emit_u32(sd(ARG_REGS[k - 1], SP, 0));
            shift_arg_regs(buf, k - 1);
            pool_base = emit_constant_loads(buf);
            buf.emit_u32(jalr(RA, T1, 0));
            buf.emit_u32(addi(SP, S0, -16));
            buf.emit_u32(ld(RA, SP, 8));
            buf.emit_u32(ld(S0, SP, 0));
            buf.emit_u32(addi(SP, SP, 16));
            buf.emit_u32(RET);
        }

        buf.align_to(8);
        let ctx_slot = buf.offset();
        buf.emit_u64(ctx.addr() as u64);
        let target_slot = buf.offset();
        buf.emit_u64(target.addr() as u64);

        // auipc t2 sits at pool_base; the two loads follow it.
        for (insn_offset, slot) in [(pool_base + 4, ctx_slot), (pool_base + 8, target_slot)] {
            let insn = buf.read_u32(insn_offset);
            buf.patch_u32(insn_offset, with_i_imm(insn, (slot - pool_base) as i32));
        }
        Ok(())
    }
}

fn shift_arg_regs(buf: &mut CodeBuffer, count: usize) {
    for i in (0..count).rev() {
        buf.emit_u32(mv(ARG_REGS[i + 1], ARG_REGS[i]));
    }
}

/// `auipc t2, 0; ld a0, ?(t2); ld t1, ?(t2)`; offsets patched once
/// the pool position is known. Returns the offset of the auipc.
fn emit_constant_loads(buf: &mut CodeBuffer) -> usize {
    let base = buf.offset();
    buf.emit_u32(auipc(T2, 0));
    buf.emit_u32(ld(A0, T2, 0));
    buf.emit_u32(ld(T1, T2, 0));
    base
}
