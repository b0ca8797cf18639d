pub mod codegen;
pub mod emitter;
pub mod regs;

pub use codegen::{SysVCodeGen, Win64CodeGen};
pub use regs::Reg;
