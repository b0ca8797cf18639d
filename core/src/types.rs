use std::fmt;

/// Largest public arity any backend will generate a stub for.
///
/// Arguments past the register window are copied one by one on the
/// stack-args path, so the bound keeps every stub inside its
/// backend's fixed `STUB_SIZE`.
pub const MAX_PUBLIC_ARITY: usize = 32;

/// Opaque context bound into a stub.
///
/// Only the address is ever used; the pointee is never read, written
/// or owned. Equality is address identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextPtr(pub usize);

impl ContextPtr {
    pub const NULL: ContextPtr = ContextPtr(0);

    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    #[inline]
    pub fn from_mut<T>(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }

    #[inline]
    pub fn addr(self) -> usize {
        self.0
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ContextPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx@{:#x}", self.0)
    }
}

/// Address of the function a stub forwards to.
///
/// The function must take the context as its first argument,
/// followed by the public arguments.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetPtr(pub usize);

impl TargetPtr {
    /// Wrap a code address, typically `some_fn as *const ()`.
    #[inline]
    pub fn from_ptr(ptr: *const ()) -> Self {
        Self(ptr as usize)
    }

    #[inline]
    pub fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Debug for TargetPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn@{:#x}", self.0)
    }
}

/// Entry address of a generated stub.
///
/// Copyable view of a stub owned elsewhere (a `Stub` value or a
/// registry group). Using it after the owner released the stub is
/// undefined behaviour at the call site.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StubPtr(pub usize);

impl StubPtr {
    #[inline]
    pub fn addr(self) -> usize {
        self.0
    }

    #[inline]
    pub fn as_ptr(self) -> *const u8 {
        self.0 as *const u8
    }

    /// Reinterpret the entry address as a function pointer type.
    ///
    /// # Safety
    /// `F` must be a function pointer type whose arguments match the
    /// public arity the stub was generated for, and the stub must
    /// still be alive whenever the returned pointer is called.
    #[inline]
    pub unsafe fn cast<F: Copy>(self) -> F {
        assert_eq!(
            std::mem::size_of::<F>(),
            std::mem::size_of::<usize>(),
            "stub entry can only be cast to a plain function pointer"
        );
        std::mem::transmute_copy::<usize, F>(&self.0)
    }
}

impl fmt::Debug for StubPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stub@{:#x}", self.0)
    }
}
