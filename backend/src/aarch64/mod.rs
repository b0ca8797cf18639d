pub mod emitter;

use thunk_core::{Abi, ContextPtr, StubError, TargetPtr};

use crate::code_buffer::CodeBuffer;
use crate::{align_up, check_arity, StubCodeGen};
use emitter::*;

pub const STUB_SIZE: usize = 512;

/// x0-x7.
pub const ARG_REGS: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

/// IP0, reserved for veneers and free at any call boundary.
pub const TARGET_REG: u8 = 16;

/// Caller-saved temporary used to copy stack arguments.
pub const COPY_REG: u8 = 9;

/// AAPCS64 stack arguments, one 8-byte slot each.
///
/// Apple's arm64 variant packs sub-word stack arguments; stubs assume
/// every public argument is pointer-sized.
#[derive(Debug, Clone, Copy, Default)]
pub struct AArch64CodeGen;

/// Pending `LDR literal` that must point into the pool.
struct LiteralUse {
    insn_offset: usize,
    value: u64,
}

impl StubCodeGen for AArch64CodeGen {
    fn abi(&self) -> Abi {
        Abi::AArch64
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
        let mut literals = Vec::with_capacity(2);

        if arity < k {
            shift_arg_regs(buf, arity);
            load_literal(buf, &mut literals, ARG_REGS[0], ctx.addr() as u64);
            load_literal(buf, &mut literals, TARGET_REG, target.addr() as u64);
            buf.emit_u32(br(TARGET_REG));
        } else {
            let stack_in = (arity - k) as u32;
            let area = align_up(8 * (stack_in as usize + 1), 16) as u32;

            buf.emit_u32(STP_FP_LR_PRE);
            buf.emit_u32(mov_sp(FP, SP));
            buf.emit_u32(sub_imm(SP, SP, area));
            // Caller's stack argument i is at [x29 + 16 + 8*i].
            for i in (0..stack_in).rev() {
                buf.emit_u32(ldr_imm(COPY_REG, FP, 16 + 8 * i));
                buf.emit_u32(str_imm(COPY_REG, SP, 8 * (i + 1)));
            }
            buf.emit_u32(str_imm(ARG_REGS[k - 1], SP, 0));
            shift_arg_regs(buf, k - 1);
            load_literal(buf, &mut literals, ARG_REGS[0], ctx.addr() as u64);
            load_literal(buf, &mut literals, TARGET_REG, target.addr() as u64);
            buf.emit_u32(blr(TARGET_REG));
            buf.emit_u32(mov_sp(SP, FP));
            buf.emit_u32(LDP_FP_LR_POST);
            buf.emit_u32(RET);
        }

        emit_literal_pool(buf, &literals);
        Ok(())
    }
}

fn shift_arg_regs(buf: &mut CodeBuffer, count: usize) {
    for i in (0..count).rev() {
        buf.emit_u32(mov(ARG_REGS[i + 1], ARG_REGS[i]));
    }
}

fn load_literal(buf: &mut CodeBuffer, literals: &mut Vec<LiteralUse>, rt: u8, value: u64) {
    literals.push(LiteralUse {
        insn_offset: buf.offset(),
        value,
    });
    buf.emit_u32(ldr_literal(rt, 0));
}

/// Place the literals after the code and point each load at its slot.
fn emit_literal_pool(buf: &mut CodeBuffer, literals: &[LiteralUse]) {
    buf.align_to(8);
    for lit in literals {
        let slot = buf.offset();
        buf.emit_u64(lit.value);
        let words = ((slot - lit.insn_offset) / 4) as i32;
        let insn = buf.read_u32(lit.insn_offset);
        buf.patch_u32(lit.insn_offset, with_literal_offset(insn, words));
    }
}
