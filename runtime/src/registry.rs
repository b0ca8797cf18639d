use std::sync::OnceLock;

use parking_lot::Mutex;
use thunk_backend::stub::{self, Stub};
use thunk_backend::{ExecAllocator, HostCodeGen};
use thunk_core::{ContextPtr, StubError, StubPtr, TargetPtr};
use tracing::{debug, warn};

/// Identifier of a stub group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(u64);

/// Always-alive group for stubs owned by process-wide globals.
///
/// It is never looked up by context and never torn down.
pub const GLOBAL_GROUP: GroupId = GroupId(0);

impl GroupId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Any of the three ways to name a group for teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupHandle {
    Group(GroupId),
    Context(ContextPtr),
    Stub(StubPtr),
}

impl From<GroupId> for GroupHandle {
    fn from(id: GroupId) -> Self {
        GroupHandle::Group(id)
    }
}

impl From<ContextPtr> for GroupHandle {
    fn from(ctx: ContextPtr) -> Self {
        GroupHandle::Context(ctx)
    }
}

impl From<StubPtr> for GroupHandle {
    fn from(ptr: StubPtr) -> Self {
        GroupHandle::Stub(ptr)
    }
}

/// Lifecycle of a group. Destroyed groups are simply gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Created by the current construction batch, may still record
    /// failures.
    Accumulating,
    /// Passed `validate`. Further registrations are still accepted.
    Validated,
}

struct Group {
    id: GroupId,
    ctx: ContextPtr,
    stubs: Vec<Stub>,
    failures: u32,
    state: GroupState,
}

impl Group {
    fn new(id: GroupId, ctx: ContextPtr) -> Self {
        Self {
            id,
            ctx,
            stubs: Vec::new(),
            failures: 0,
            state: GroupState::Accumulating,
        }
    }
}

/// Live groups. Index 0 always holds the global sentinel.
struct Groups {
    list: Vec<Group>,
    next_id: u64,
}

impl Groups {
    fn new() -> Self {
        Self {
            list: vec![Group::new(GLOBAL_GROUP, ContextPtr::NULL)],
            next_id: 1,
        }
    }

    fn position(&self, id: GroupId) -> Option<usize> {
        self.list.iter().position(|g| g.id == id)
    }

    fn position_by_ctx(&self, ctx: ContextPtr) -> Option<usize> {
        self.list
            .iter()
            .skip(1)
            .position(|g| g.ctx == ctx)
            .map(|i| i + 1)
    }

    fn position_by_stub(&self, ptr: StubPtr) -> Option<usize> {
        self.list
            .iter()
            .position(|g| g.stubs.iter().any(|s| s.ptr() == ptr))
    }

    fn resolve(&self, handle: GroupHandle) -> Option<usize> {
        match handle {
            GroupHandle::Group(id) => self.position(id),
            GroupHandle::Context(ctx) => self.position_by_ctx(ctx),
            GroupHandle::Stub(ptr) => self.position_by_stub(ptr),
        }
    }

    fn insert(&mut self, ctx: ContextPtr) -> usize {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        self.list.push(Group::new(id, ctx));
        debug!(group = id.0, ?ctx, "created stub group");
        self.list.len() - 1
    }
}

/// Tracker for stub groups, with the allocator its stubs come from.
///
/// All mutation and lookup happens under one lock; stub memory is
/// unmapped after the lock is released.
pub struct Registry {
    backend: HostCodeGen,
    alloc: ExecAllocator,
    groups: Mutex<Groups>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_allocator(ExecAllocator::new())
    }

    pub fn with_allocator(alloc: ExecAllocator) -> Self {
        Self {
            backend: HostCodeGen::default(),
            alloc,
            groups: Mutex::new(Groups::new()),
        }
    }

    /// Process-wide registry behind the crate-level functions.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(|| Registry::with_allocator(ExecAllocator::global().clone()))
    }

    pub fn allocator(&self) -> &ExecAllocator {
        &self.alloc
    }

    /// Generate an untracked stub with the host backend.
    pub fn create(
        &self,
        target: TargetPtr,
        ctx: ContextPtr,
        arity: usize,
    ) -> Result<Stub, StubError> {
        stub::generate(&self.backend, &self.alloc, target, ctx, arity)
    }

    /// Generate a stub and register it (or its failure) in `group`.
    ///
    /// `group` is resolved on first use and written back, so a batch
    /// of calls sharing one `Option<GroupId>` lands in one group.
    pub fn create_and_track(
        &self,
        target: TargetPtr,
        ctx: ContextPtr,
        arity: usize,
        group: &mut Option<GroupId>,
    ) -> Result<StubPtr, StubError> {
        match self.create(target, ctx, arity) {
            Ok(stub) => {
                let ptr = stub.ptr();
                *group = Some(self.track(Some(stub), ctx, *group));
                Ok(ptr)
            }
            Err(err) => {
                *group = Some(self.track(None, ctx, *group));
                Err(err)
            }
        }
    }

    /// Register `stub` under `group`, or under the live group for
    /// `ctx` (created on demand) when no group is given.
    ///
    /// `None` records a failed generation: the group's failure counter
    /// goes up and nothing is added.
    pub fn track(&self, stub: Option<Stub>, ctx: ContextPtr, group: Option<GroupId>) -> GroupId {
        let mut groups = self.groups.lock();
        let explicit = group.and_then(|id| groups.position(id));
        if let (Some(id), None) = (group, explicit) {
            warn!(group = id.0, ?ctx, "tracking into unknown group, resolving by context");
        }
        let idx = match explicit.or_else(|| groups.position_by_ctx(ctx)) {
            Some(idx) => idx,
            None => groups.insert(ctx),
        };

        let g = &mut groups.list[idx];
        match stub {
            Some(stub) => g.stubs.push(stub),
            None => {
                g.failures += 1;
                debug!(group = g.id.0, failures = g.failures, "recorded stub failure");
            }
        }
        g.id
    }

    /// All-or-nothing check of a construction batch.
    ///
    /// `None` has nothing to validate. A group without failures is
    /// kept and marked validated. A group with failures is freed in
    /// full and `false` is returned; so is an unknown group. The
    /// global group is never freed.
    pub fn validate(&self, group: Option<GroupId>) -> bool {
        let Some(id) = group else {
            return true;
        };

        let mut groups = self.groups.lock();
        let Some(idx) = groups.position(id) else {
            debug!(group = id.0, "validate on unknown group");
            return false;
        };
        let g = &mut groups.list[idx];
        if g.failures == 0 {
            g.state = GroupState::Validated;
            return true;
        }
        if id == GLOBAL_GROUP {
            warn!(failures = g.failures, "global stub group has failures");
            return false;
        }

        let failed = groups.list.remove(idx);
        drop(groups);
        warn!(
            group = id.0,
            failures = failed.failures,
            freed = failed.stubs.len(),
            "stub group failed validation, rolled back"
        );
        drop(failed);
        false
    }

    /// Free every stub of the group named by `handle` and forget the
    /// group. Returns the number of stubs freed; 0 for unknown handles
    /// and for the global group.
    pub fn free_group(&self, handle: impl Into<GroupHandle>) -> usize {
        let handle = handle.into();
        let mut groups = self.groups.lock();
        let Some(idx) = groups.resolve(handle) else {
            return 0;
        };
        if idx == 0 {
            warn!(?handle, "refusing to free the global stub group");
            return 0;
        }

        let group = groups.list.remove(idx);
        drop(groups);
        let count = group.stubs.len();
        debug!(group = group.id.0, ctx = ?group.ctx, count, "freed stub group");
        count
    }

    /// Group a handle currently resolves to.
    pub fn group_of(&self, handle: impl Into<GroupHandle>) -> Option<GroupId> {
        let groups = self.groups.lock();
        groups.resolve(handle.into()).map(|idx| groups.list[idx].id)
    }

    /// Number of stubs held by a live group.
    pub fn group_len(&self, id: GroupId) -> Option<usize> {
        self.with_group(id, |g| g.stubs.len())
    }

    /// Failures recorded against a live group.
    pub fn group_failures(&self, id: GroupId) -> Option<u32> {
        self.with_group(id, |g| g.failures)
    }

    pub fn group_state(&self, id: GroupId) -> Option<GroupState> {
        self.with_group(id, |g| g.state)
    }

    /// Context a live group was created for.
    pub fn group_context(&self, id: GroupId) -> Option<ContextPtr> {
        self.with_group(id, |g| g.ctx)
    }

    /// Live groups, not counting the global one.
    pub fn group_count(&self) -> usize {
        self.groups.lock().list.len() - 1
    }

    fn with_group<T>(&self, id: GroupId, f: impl FnOnce(&Group) -> T) -> Option<T> {
        let groups = self.groups.lock();
        groups.position(id).map(|idx| f(&groups.list[idx]))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
