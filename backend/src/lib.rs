pub mod aarch64;
pub mod arm;
pub mod code_buffer;
pub mod i386;
pub mod mips;
pub mod riscv64;
pub mod stub;
pub mod x86_64;

pub use aarch64::AArch64CodeGen;
pub use arm::ArmCodeGen;
pub use code_buffer::{CodeBuffer, ExecAllocator, ExecBlock};
pub use i386::{CdeclCodeGen, StdcallCodeGen};
pub use mips::MipsO32CodeGen;
pub use riscv64::Riscv64CodeGen;
pub use stub::{generate, Stub};
pub use x86_64::{SysVCodeGen, Win64CodeGen};

use thunk_core::{Abi, ContextPtr, StubError, TargetPtr, MAX_PUBLIC_ARITY};

/// Trait for per-ABI stub generators.
///
/// Each calling convention implements this trait to emit the
/// machine code that prepends a bound context to the caller's
/// arguments and forwards to a target function.
pub trait StubCodeGen {
    /// Calling convention this generator targets.
    fn abi(&self) -> Abi;

    /// Upper bound on the bytes `emit_stub` writes, literal pool
    /// included.
    fn stub_size(&self) -> usize;

    /// Emit a complete stub at the buffer's current offset, which
    /// becomes the stub's entry point.
    ///
    /// `arity` counts the arguments the stub's caller passes, not the
    /// injected context.
    fn emit_stub(
        &self,
        buf: &mut CodeBuffer,
        target: TargetPtr,
        ctx: ContextPtr,
        arity: usize,
    ) -> Result<(), StubError>;
}

/// Generator for the running process, fixed at build time.
#[cfg(all(target_arch = "x86_64", not(windows)))]
pub type HostCodeGen = SysVCodeGen;
#[cfg(all(target_arch = "x86_64", windows))]
pub type HostCodeGen = Win64CodeGen;
#[cfg(target_arch = "x86")]
pub type HostCodeGen = CdeclCodeGen;
#[cfg(target_arch = "aarch64")]
pub type HostCodeGen = AArch64CodeGen;
#[cfg(target_arch = "arm")]
pub type HostCodeGen = ArmCodeGen;
#[cfg(target_arch = "riscv64")]
pub type HostCodeGen = Riscv64CodeGen;
#[cfg(target_arch = "mips")]
pub type HostCodeGen = MipsO32CodeGen;
#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "x86",
    target_arch = "aarch64",
    target_arch = "arm",
    target_arch = "riscv64",
    target_arch = "mips"
)))]
pub type HostCodeGen = UnsupportedCodeGen;

/// Stand-in host generator for architectures without a backend.
/// Every emission fails with `StubError::UnsupportedHost`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedCodeGen;

impl StubCodeGen for UnsupportedCodeGen {
    fn abi(&self) -> Abi {
        // Never consulted: emission fails before a stub exists.
        Abi::X86_64SysV
    }

    fn stub_size(&self) -> usize {
        0
    }

    fn emit_stub(
        &self,
        _buf: &mut CodeBuffer,
        _target: TargetPtr,
        _ctx: ContextPtr,
        _arity: usize,
    ) -> Result<(), StubError> {
        Err(StubError::UnsupportedHost)
    }
}

/// Generator for any ABI, for inspecting code a foreign host would run.
pub fn codegen_for(abi: Abi) -> Box<dyn StubCodeGen + Send + Sync> {
    match abi {
        Abi::X86_64SysV => Box::new(SysVCodeGen),
        Abi::X86_64Win64 => Box::new(Win64CodeGen),
        Abi::I386Cdecl => Box::new(CdeclCodeGen),
        Abi::I386Stdcall => Box::new(StdcallCodeGen),
        Abi::AArch64 => Box::new(AArch64CodeGen),
        Abi::Arm => Box::new(ArmCodeGen),
        Abi::Riscv64 => Box::new(Riscv64CodeGen),
        Abi::MipsO32 => Box::new(MipsO32CodeGen),
    }
}

pub(crate) fn check_arity(arity: usize) -> Result<(), StubError> {
    if arity > MAX_PUBLIC_ARITY {
        return Err(StubError::ArityOutOfRange {
            arity,
            max: MAX_PUBLIC_ARITY,
        });
    }
    Ok(())
}

#[inline]
pub(crate) const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}
