//! Context-injecting stubs with grouped lifetimes.
//!
//! A stub is a tiny piece of generated machine code with the public
//! signature `fn(a1, ..., an)` that calls `target(ctx, a1, ..., an)`.
//! Stubs built for one object are tracked in a group so a failed
//! batch can be rolled back and a finished object can drop all of
//! its stubs at once.
//!
//! The free functions here operate on [`Registry::global`] and the
//! host backend.

pub mod registry;

pub use registry::{GroupHandle, GroupId, GroupState, Registry, GLOBAL_GROUP};
pub use thunk_backend::{ExecAllocator, Stub};
pub use thunk_core::{Abi, ContextPtr, FaultKind, StubError, StubPtr, TargetPtr, MAX_PUBLIC_ARITY};

/// Build an untracked stub forwarding to `target` with `ctx` prepended.
pub fn create(target: TargetPtr, ctx: ContextPtr, arity: usize) -> Result<Stub, StubError> {
    Registry::global().create(target, ctx, arity)
}

/// Build a stub and register it, or its failure, in `group`.
///
/// Pass the same `group` for every stub of one object, then close the
/// batch with [`validate`].
pub fn create_and_track(
    target: TargetPtr,
    ctx: ContextPtr,
    arity: usize,
    group: &mut Option<GroupId>,
) -> Result<StubPtr, StubError> {
    Registry::global().create_and_track(target, ctx, arity, group)
}

/// Release an untracked stub.
pub fn free(stub: Stub) {
    thunk_backend::stub::release(stub);
}

/// Hand `stub` to the global registry. `None` records a failure.
pub fn track(stub: Option<Stub>, ctx: ContextPtr, group: Option<GroupId>) -> GroupId {
    Registry::global().track(stub, ctx, group)
}

/// Close a construction batch: `true` if it had no failures, else the
/// whole group is freed.
pub fn validate(group: Option<GroupId>) -> bool {
    Registry::global().validate(group)
}

/// Free a group named by id, context or any of its stubs.
pub fn free_group(handle: impl Into<GroupHandle>) -> usize {
    Registry::global().free_group(handle)
}
