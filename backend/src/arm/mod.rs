pub mod emitter;

use thunk_core::{Abi, ContextPtr, StubError, TargetPtr};

use crate::code_buffer::CodeBuffer;
use crate::{align_up, check_arity, StubCodeGen};
use emitter::*;

pub const STUB_SIZE: usize = 384;

/// r0-r3.
pub const ARG_REGS: [u8; 4] = [0, 1, 2, 3];

/// AAPCS requires 8-byte stack alignment at public interfaces.
pub const STACK_ALIGN: usize = 8;

/// AAPCS, A32 code. Targets may be Thumb; `bx`/`blx` interwork.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArmCodeGen;

impl StubCodeGen for ArmCodeGen {
    fn abi(&self) -> Abi {
        Abi::Arm
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
        let ctx_load;
        let target_load;

        if arity < k {
            shift_arg_regs(buf, arity);
            ctx_load = emit_literal_load(buf, ARG_REGS[0]);
            target_load = emit_literal_load(buf, IP);
            buf.emit_u32(bx(IP));
        } else {
            let stack_in = (arity - k) as u32;
            let area = align_up(4 * (stack_in as usize + 1), STACK_ALIGN) as u32;

            buf.emit_u32(PUSH_FP_LR);
            buf.emit_u32(mov(FP, SP));
            buf.emit_u32(sub_imm(SP, SP, area));
            // Caller's stack argument i is at [r11 + 8 + 4*i].
            for i in (0..stack_in).rev() {
                buf.emit_u32(ldr_imm(IP, FP, 8 + 4 * i));
                buf.emit_u32(str_imm(IP, SP, 4 * (i + 1)));
            }
            buf.emit_u32(str_imm(ARG_REGS[k - 1], SP, 0));
            shift_arg_regs(buf, k - 1);
            ctx_load = emit_literal_load(buf, ARG_REGS[0]);
            target_load = emit_literal_load(buf, IP);
            buf.emit_u32(blx(IP));
            buf.emit_u32(mov(SP, FP));
            buf.emit_u32(POP_FP_PC);
        }

        // Literal pool right behind the code.
        let ctx_slot = buf.offset();
        buf.emit_u32(ctx.addr() as u32);
        let target_slot = buf.offset();
        buf.emit_u32(target.addr() as u32);
        patch_literal_load(buf, ctx_load, ctx_slot);
        patch_literal_load(buf, target_load, target_slot);
        Ok(())
    }
}

fn shift_arg_regs(buf: &mut CodeBuffer, count: usize) {
    for i in (0..count).rev() {
        buf.emit_u32(mov(ARG_REGS[i + 1], ARG_REGS[i]));
    }
}

/// Emit `ldr rt, [pc, #0]` and return its offset for patching.
fn emit_literal_load(buf: &mut CodeBuffer, rt: u8) -> usize {
    let offset = buf.offset();
    buf.emit_u32(ldr_imm(rt, PC, 0));
    offset
}

fn patch_literal_load(buf: &mut CodeBuffer, insn_offset: usize, slot: usize) {
    let disp = (slot - (insn_offset + PC_BIAS)) as u32;
    let insn = buf.read_u32(insn_offset);
    buf.patch_u32(insn_offset, (insn & !0xFFF) | disp);
}
