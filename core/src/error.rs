use std::io;

use thiserror::Error;

/// Which allocator step an injected fault hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Fail the page mapping itself.
    Allocate,
    /// Map the block, then fail the read-execute transition.
    Protect,
}

/// Failure to produce a stub.
///
/// Group failures are not represented here: they are counted by the
/// registry and surfaced as `false` from `validate`.
#[derive(Debug, Error)]
pub enum StubError {
    #[error("failed to map {size} bytes of stub memory: {source}")]
    Alloc { size: usize, source: io::Error },

    #[error("failed to make stub memory executable: {source}")]
    Protect { source: io::Error },

    #[error("public arity {arity} exceeds the supported maximum of {max}")]
    ArityOutOfRange { arity: usize, max: usize },

    #[error("no stub backend for this host architecture")]
    UnsupportedHost,

    #[error("injected {0:?} fault")]
    Injected(FaultKind),
}

impl StubError {
    /// Whether the failure happened while mapping memory (as opposed
    /// to after a block was obtained).
    pub fn is_alloc(&self) -> bool {
        matches!(
            self,
            StubError::Alloc { .. } | StubError::Injected(FaultKind::Allocate)
        )
    }

    pub fn is_protect(&self) -> bool {
        matches!(
            self,
            StubError::Protect { .. } | StubError::Injected(FaultKind::Protect)
        )
    }
}
