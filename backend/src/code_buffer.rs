use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use thunk_core::{FaultKind, StubError};
use tracing::{trace, warn};

/// Source of page-granular stub memory.
///
/// Every block starts read-write as a [`CodeBuffer`] and becomes a
/// read-execute [`ExecBlock`] once the code is in place. A block is
/// never writable and executable at the same time.
///
/// Cloning shares the same counters and fault plan.
#[derive(Clone, Default)]
pub struct ExecAllocator {
    state: Arc<AllocState>,
}

#[derive(Default)]
struct AllocState {
    live: AtomicUsize,
    total: AtomicUsize,
    fault: Mutex<Option<FaultPlan>>,
}

#[derive(Debug, Clone, Copy)]
struct FaultPlan {
    kind: FaultKind,
    remaining: usize,
}

impl ExecAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator shared by the process-wide registry.
    pub fn global() -> &'static ExecAllocator {
        static GLOBAL: OnceLock<ExecAllocator> = OnceLock::new();
        GLOBAL.get_or_init(ExecAllocator::new)
    }

    /// Host page size, the allocation granule.
    pub fn page_size() -> usize {
        static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
        *PAGE_SIZE.get_or_init(sys::page_size)
    }

    /// Blocks currently mapped (writable or executable).
    pub fn live_blocks(&self) -> usize {
        self.state.live.load(Ordering::Acquire)
    }

    /// Blocks ever mapped by this allocator.
    pub fn total_allocated(&self) -> usize {
        self.state.total.load(Ordering::Acquire)
    }

    /// Fail the allocation `after + 1` calls from now.
    ///
    /// `FaultKind::Protect` lets the block be mapped and fails its
    /// transition to executable instead. One-shot; a new plan
    /// replaces any pending one.
    pub fn inject_fault(&self, kind: FaultKind, after: usize) {
        *self.state.fault.lock() = Some(FaultPlan {
            kind,
            remaining: after,
        });
    }

    pub fn clear_fault(&self) {
        *self.state.fault.lock() = None;
    }

    fn take_fault(&self) -> Option<FaultKind> {
        let mut plan = self.state.fault.lock();
        match plan.as_mut() {
            Some(p) if p.remaining == 0 => plan.take().map(|p| p.kind),
            Some(p) => {
                p.remaining -= 1;
                None
            }
            None => None,
        }
    }

    /// Map a writable block of at least `size` bytes, rounded up to
    /// whole pages.
    pub fn allocate(&self, size: usize) -> Result<CodeBuffer, StubError> {
        let page_size = Self::page_size();
        let size = (size.max(1) + page_size - 1) & !(page_size - 1);

        let fault = self.take_fault();
        if fault == Some(FaultKind::Allocate) {
            warn!(size, "injected allocation fault");
            return Err(StubError::Injected(FaultKind::Allocate));
        }

        let ptr = sys::map_rw(size).map_err(|source| StubError::Alloc { size, source })?;
        self.state.live.fetch_add(1, Ordering::AcqRel);
        self.state.total.fetch_add(1, Ordering::AcqRel);
        trace!(addr = ptr as usize, size, "mapped stub block");

        Ok(CodeBuffer {
            ptr,
            size,
            offset: 0,
            alloc: self.clone(),
            fail_protect: fault == Some(FaultKind::Protect),
        })
    }

    fn release(&self, ptr: *mut u8, size: usize) {
        if let Err(err) = sys::unmap(ptr, size) {
            warn!(addr = ptr as usize, size, %err, "failed to unmap stub block");
        }
        self.state.live.fetch_sub(1, Ordering::AcqRel);
        trace!(addr = ptr as usize, size, "unmapped stub block");
    }
}

/// Writable block stub code is emitted into.
///
/// Dropping it unmaps the block; [`CodeBuffer::into_executable`]
/// hands the mapping over to an [`ExecBlock`].
pub struct CodeBuffer {
    ptr: *mut u8,
    size: usize,
    offset: usize,
    alloc: ExecAllocator,
    fail_protect: bool,
}

// SAFETY: CodeBuffer owns its mapping exclusively.
unsafe impl Send for CodeBuffer {}

impl CodeBuffer {
    /// Current write offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Remaining writable bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.size - self.offset
    }

    /// Raw pointer to the start of the buffer.
    #[inline]
    pub fn base_ptr(&self) -> *const u8 {
        self.ptr as *const u8
    }

    /// Address the byte at `offset` will have once executable.
    #[inline]
    pub fn addr_at(&self, offset: usize) -> usize {
        assert!(offset <= self.size);
        self.ptr as usize + offset
    }

    // -- Emit methods --

    #[inline]
    pub fn emit_u8(&mut self, val: u8) {
        assert!(self.offset < self.size, "code buffer overflow");
        unsafe { self.ptr.add(self.offset).write(val) };
        self.offset += 1;
    }

    #[inline]
    pub fn emit_u16(&mut self, val: u16) {
        assert!(self.offset + 2 <= self.size, "code buffer overflow");
        unsafe { (self.ptr.add(self.offset) as *mut u16).write_unaligned(val) };
        self.offset += 2;
    }

    #[inline]
    pub fn emit_u32(&mut self, val: u32) {
        assert!(self.offset + 4 <= self.size, "code buffer overflow");
        unsafe { (self.ptr.add(self.offset) as *mut u32).write_unaligned(val) };
        self.offset += 4;
    }

    #[inline]
    pub fn emit_u64(&mut self, val: u64) {
        assert!(self.offset + 8 <= self.size, "code buffer overflow");
        unsafe { (self.ptr.add(self.offset) as *mut u64).write_unaligned(val) };
        self.offset += 8;
    }

    #[inline]
    pub fn emit_bytes(&mut self, data: &[u8]) {
        assert!(
            self.offset + data.len() <= self.size,
            "code buffer overflow"
        );
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(self.offset), data.len());
        }
        self.offset += data.len();
    }

    /// Pad with zero bytes up to a multiple of `align`.
    pub fn align_to(&mut self, align: usize) {
        debug_assert!(align.is_power_of_two());
        while self.offset & (align - 1) != 0 {
            self.emit_u8(0);
        }
    }

    /// Patch a u32 at the given offset (literal-pool fixups).
    #[inline]
    pub fn patch_u32(&mut self, offset: usize, val: u32) {
        assert!(offset + 4 <= self.size);
        unsafe { (self.ptr.add(offset) as *mut u32).write_unaligned(val) };
    }

    /// Read a u32 at the given offset.
    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.size);
        unsafe { (self.ptr.add(offset) as *const u32).read_unaligned() }
    }

    /// Read a u64 at the given offset.
    #[inline]
    pub fn read_u64(&self, offset: usize) -> u64 {
        assert!(offset + 8 <= self.size);
        unsafe { (self.ptr.add(offset) as *const u64).read_unaligned() }
    }

    /// Get the generated code as a byte slice (up to current offset).
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr..ptr+offset has been written.
        unsafe { std::slice::from_raw_parts(self.ptr, self.offset) }
    }

    /// Drop write access, map the block read-execute and invalidate
    /// the instruction cache over the emitted range.
    ///
    /// On failure the block is unmapped before the error is returned.
    pub fn into_executable(self) -> Result<ExecBlock, StubError> {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the allocator handle is
        // moved out exactly once.
        let alloc = unsafe { ptr::read(&this.alloc) };
        let (ptr, size, len) = (this.ptr, this.size, this.offset);

        let protected = if this.fail_protect {
            Err(StubError::Injected(FaultKind::Protect))
        } else {
            sys::protect_rx(ptr, size).map_err(|source| StubError::Protect { source })
        };
        if let Err(err) = protected {
            warn!(addr = ptr as usize, size, %err, "stub block protection failed");
            alloc.release(ptr, size);
            return Err(err);
        }
        sys::flush_icache(ptr, len);

        Ok(ExecBlock {
            ptr,
            size,
            len,
            alloc,
        })
    }
}

impl Drop for CodeBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            self.alloc.release(self.ptr, self.size);
        }
    }
}

/// Read-execute block holding finished stub code.
pub struct ExecBlock {
    ptr: *mut u8,
    size: usize,
    len: usize,
    alloc: ExecAllocator,
}

// SAFETY: the mapping is immutable once executable and owned by this
// value alone; shared references only expose its address and bytes.
unsafe impl Send for ExecBlock {}
unsafe impl Sync for ExecBlock {}

impl ExecBlock {
    #[inline]
    pub fn base_addr(&self) -> usize {
        self.ptr as usize
    }

    /// Mapped size (whole pages).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Emitted bytes, code and literal pool.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, addr: usize) -> bool {
        (self.base_addr()..self.base_addr() + self.size).contains(&addr)
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the block stays readable until drop.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl Drop for ExecBlock {
    fn drop(&mut self) {
        self.alloc.release(self.ptr, self.size);
    }
}

#[cfg(unix)]
mod sys {
    use std::io;
    use std::ptr;

    pub fn page_size() -> usize {
        // SAFETY: sysconf is always safe to call.
        unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
    }

    pub fn map_rw(size: usize) -> io::Result<*mut u8> {
        // SAFETY: anonymous private mapping, no file backing.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(ptr as *mut u8)
    }

    pub fn protect_rx(ptr: *mut u8, size: usize) -> io::Result<()> {
        let ret = unsafe {
            libc::mprotect(ptr as *mut libc::c_void, size, libc::PROT_READ | libc::PROT_EXEC)
        };
        if ret != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    pub fn unmap(ptr: *mut u8, size: usize) -> io::Result<()> {
        let ret = unsafe { libc::munmap(ptr as *mut libc::c_void, size) };
        if ret != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    pub fn flush_icache(_ptr: *mut u8, _len: usize) {
        // Instruction fetch is coherent with data writes on x86.
    }

    #[cfg(all(
        target_os = "macos",
        not(any(target_arch = "x86", target_arch = "x86_64"))
    ))]
    pub fn flush_icache(ptr: *mut u8, len: usize) {
        extern "C" {
            fn sys_icache_invalidate(start: *mut libc::c_void, len: libc::size_t);
        }
        unsafe { sys_icache_invalidate(ptr as *mut libc::c_void, len) };
    }

    #[cfg(all(
        not(target_os = "macos"),
        not(any(target_arch = "x86", target_arch = "x86_64"))
    ))]
    pub fn flush_icache(ptr: *mut u8, len: usize) {
        extern "C" {
            fn __clear_cache(begin: *mut libc::c_char, end: *mut libc::c_char);
        }
        unsafe {
            __clear_cache(
                ptr as *mut libc::c_char,
                ptr.add(len) as *mut libc::c_char,
            )
        };
    }
}

#[cfg(windows)]
mod sys {
    use std::io;
    use std::ptr;

    use windows_sys::Win32::System::Diagnostics::Debug::FlushInstructionCache;
    use windows_sys::Win32::System::Memory::{
        VirtualAlloc, VirtualFree, VirtualProtect, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE,
        PAGE_EXECUTE_READ, PAGE_READWRITE,
    };
    use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};
    use windows_sys::Win32::System::Threading::GetCurrentProcess;

    pub fn page_size() -> usize {
        let mut info: SYSTEM_INFO = unsafe { std::mem::zeroed() };
        unsafe { GetSystemInfo(&mut info) };
        info.dwPageSize as usize
    }

    pub fn map_rw(size: usize) -> io::Result<*mut u8> {
        let ptr = unsafe {
            VirtualAlloc(ptr::null(), size, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE) as *mut u8
        };
        if ptr.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(ptr)
    }

    pub fn protect_rx(ptr: *mut u8, size: usize) -> io::Result<()> {
        let mut old = 0;
        let ok = unsafe { VirtualProtect(ptr as *const _, size, PAGE_EXECUTE_READ, &mut old) };
        if ok == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    pub fn unmap(ptr: *mut u8, _size: usize) -> io::Result<()> {
        let ok = unsafe { VirtualFree(ptr as *mut _, 0, MEM_RELEASE) };
        if ok == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    pub fn flush_icache(ptr: *mut u8, len: usize) {
        unsafe { FlushInstructionCache(GetCurrentProcess(), ptr as *const _, len) };
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    use std::io;

    pub fn page_size() -> usize {
        4096
    }

    pub fn map_rw(_size: usize) -> io::Result<*mut u8> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "executable memory is not available on this platform",
        ))
    }

    pub fn protect_rx(_ptr: *mut u8, _size: usize) -> io::Result<()> {
        Err(io::ErrorKind::Unsupported.into())
    }

    pub fn unmap(_ptr: *mut u8, _size: usize) -> io::Result<()> {
        Ok(())
    }

    pub fn flush_icache(_ptr: *mut u8, _len: usize) {}
}
