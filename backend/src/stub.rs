use std::fmt;

use thunk_core::{Abi, ContextPtr, StubError, StubPtr, TargetPtr};
use tracing::debug;

use crate::code_buffer::{ExecAllocator, ExecBlock};
use crate::StubCodeGen;

/// A generated stub and the executable block that holds it.
///
/// Owning a `Stub` is the only way to keep its code mapped; dropping
/// it (or passing it to [`release`]) unmaps the block, so every stub
/// is freed exactly once.
pub struct Stub {
    block: ExecBlock,
    abi: Abi,
    ctx: ContextPtr,
    target: TargetPtr,
    arity: usize,
}

impl Stub {
    /// Entry point, callable with the public arity's arguments.
    #[inline]
    pub fn ptr(&self) -> StubPtr {
        StubPtr(self.block.base_addr())
    }

    #[inline]
    pub fn context(&self) -> ContextPtr {
        self.ctx
    }

    #[inline]
    pub fn target(&self) -> TargetPtr {
        self.target
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    #[inline]
    pub fn abi(&self) -> Abi {
        self.abi
    }

    /// Emitted code and literal pool.
    pub fn code(&self) -> &[u8] {
        self.block.as_slice()
    }

    /// Whether `addr` falls inside this stub's mapping.
    pub fn contains(&self, addr: usize) -> bool {
        self.block.contains(addr)
    }
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("entry", &self.ptr())
            .field("abi", &self.abi)
            .field("ctx", &self.ctx)
            .field("target", &self.target)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Emit a stub for `backend` into a fresh block from `alloc`.
///
/// The block is read-execute and cache-coherent on success. Any
/// failure leaves nothing mapped; an out-of-range arity fails before
/// the allocator is touched.
pub fn generate<B: StubCodeGen + ?Sized>(
    backend: &B,
    alloc: &ExecAllocator,
    target: TargetPtr,
    ctx: ContextPtr,
    arity: usize,
) -> Result<Stub, StubError> {
    crate::check_arity(arity)?;
    let mut buf = alloc.allocate(backend.stub_size())?;
    backend.emit_stub(&mut buf, target, ctx, arity)?;
    let len = buf.offset();
    let block = buf.into_executable()?;

    let stub = Stub {
        block,
        abi: backend.abi(),
        ctx,
        target,
        arity,
    };
    debug!(entry = ?stub.ptr(), ?ctx, ?target, arity, len, "generated stub");
    Ok(stub)
}

/// Unmap a stub's code.
pub fn release(stub: Stub) {
    debug!(entry = ?stub.ptr(), ctx = ?stub.ctx, "released stub");
    drop(stub);
}
