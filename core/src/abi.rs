/// Calling conventions a stub can be generated for.
///
/// Every variant has an emitter in `thunk-backend`; only the one
/// returned by [`Abi::host`] can actually be executed in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Abi {
    /// x86-64 System V (Linux, BSD, macOS).
    X86_64SysV,
    /// x86-64 Microsoft x64.
    X86_64Win64,
    /// 32-bit x86 cdecl, caller cleans the stack.
    I386Cdecl,
    /// 32-bit x86 stdcall, callee cleans the stack.
    I386Stdcall,
    /// AArch64 AAPCS64.
    AArch64,
    /// 32-bit ARM AAPCS (A32 instruction set).
    Arm,
    /// RISC-V RV64 LP64.
    Riscv64,
    /// MIPS32 o32.
    MipsO32,
}

/// How control reaches the target function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    /// Branch without a new return address; the target returns
    /// directly to the stub's caller.
    TailJump,
    /// Push the context, call, drop the injected word, return.
    CallPop,
    /// Copy every caller stack argument one slot down, push the
    /// context, call, release the copied region, return.
    DuplicateSlots,
    /// Round-trip the return address through a scratch register and
    /// push the context directly above it.
    StackPrepend,
}

/// Static description of one calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiInfo {
    pub name: &'static str,
    /// Integer argument registers (0 for stack-only conventions).
    pub reg_args: usize,
    /// Whether the emitter needs the public arity.
    pub needs_arity: bool,
    /// Call style for arities inside the register window.
    pub call_style: CallStyle,
    /// Required stack alignment at call sites, in bytes.
    pub stack_align: usize,
    /// Size of one argument slot, in bytes.
    pub slot_size: usize,
}

impl Abi {
    pub const ALL: [Abi; 8] = [
        Abi::X86_64SysV,
        Abi::X86_64Win64,
        Abi::I386Cdecl,
        Abi::I386Stdcall,
        Abi::AArch64,
        Abi::Arm,
        Abi::Riscv64,
        Abi::MipsO32,
    ];

    pub const fn info(self) -> AbiInfo {
        match self {
            Abi::X86_64SysV => AbiInfo {
                name: "x86_64-sysv",
                reg_args: 6,
                needs_arity: true,
                call_style: CallStyle::TailJump,
                stack_align: 16,
                slot_size: 8,
            },
            Abi::X86_64Win64 => AbiInfo {
                name: "x86_64-win64",
                reg_args: 4,
                needs_arity: true,
                call_style: CallStyle::TailJump,
                stack_align: 16,
                slot_size: 8,
            },
            Abi::I386Cdecl => AbiInfo {
                name: "i386-cdecl",
                reg_args: 0,
                needs_arity: true,
                call_style: CallStyle::DuplicateSlots,
                stack_align: 16,
                slot_size: 4,
            },
            Abi::I386Stdcall => AbiInfo {
                name: "i386-stdcall",
                reg_args: 0,
                needs_arity: false,
                call_style: CallStyle::StackPrepend,
                stack_align: 4,
                slot_size: 4,
            },
            Abi::AArch64 => AbiInfo {
                name: "aarch64",
                reg_args: 8,
                needs_arity: true,
                call_style: CallStyle::TailJump,
                stack_align: 16,
                slot_size: 8,
            },
            Abi::Arm => AbiInfo {
                name: "arm",
                reg_args: 4,
                needs_arity: true,
                call_style: CallStyle::TailJump,
                stack_align: 8,
                slot_size: 4,
            },
            Abi::Riscv64 => AbiInfo {
                name: "riscv64",
                reg_args: 8,
                needs_arity: true,
                call_style: CallStyle::TailJump,
                stack_align: 16,
                slot_size: 8,
            },
            Abi::MipsO32 => AbiInfo {
                name: "mips-o32",
                reg_args: 4,
                needs_arity: true,
                call_style: CallStyle::TailJump,
                stack_align: 8,
                slot_size: 4,
            },
        }
    }

    /// Call style actually emitted for a given public arity.
    ///
    /// Register conventions leave the tail-jump path once the
    /// displaced register spills onto the stack; cdecl only needs
    /// slot duplication when the caller passed stack arguments.
    pub fn call_style(self, arity: usize) -> CallStyle {
        let info = self.info();
        match info.call_style {
            CallStyle::TailJump if arity >= info.reg_args => CallStyle::DuplicateSlots,
            CallStyle::DuplicateSlots if arity == 0 => CallStyle::CallPop,
            style => style,
        }
    }

    /// Convention of the running process, if it has a backend.
    pub const fn host() -> Option<Abi> {
        if cfg!(all(target_arch = "x86_64", windows)) {
            Some(Abi::X86_64Win64)
        } else if cfg!(target_arch = "x86_64") {
            Some(Abi::X86_64SysV)
        } else if cfg!(target_arch = "x86") {
            Some(Abi::I386Cdecl)
        } else if cfg!(target_arch = "aarch64") {
            Some(Abi::AArch64)
        } else if cfg!(target_arch = "arm") {
            Some(Abi::Arm)
        } else if cfg!(target_arch = "riscv64") {
            Some(Abi::Riscv64)
        } else if cfg!(target_arch = "mips") {
            Some(Abi::MipsO32)
        } else {
            None
        }
    }

    pub fn from_name(name: &str) -> Option<Abi> {
        Abi::ALL.into_iter().find(|abi| abi.info().name == name)
    }
}
