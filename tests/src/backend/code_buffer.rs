use thunk_backend::ExecAllocator;
use thunk_core::{FaultKind, StubError};

#[test]
fn test_emit_and_read() {
    let alloc = ExecAllocator::new();
    let mut buf = alloc.allocate(64).unwrap();
    buf.emit_u8(0x90); // NOP
    buf.emit_u32(0xDEADBEEF);
    assert_eq!(buf.offset(), 5);
    assert_eq!(buf.as_slice()[0], 0x90);
    assert_eq!(buf.read_u32(1), 0xDEADBEEF);
}

#[test]
fn test_patch_and_align() {
    let alloc = ExecAllocator::new();
    let mut buf = alloc.allocate(64).unwrap();
    buf.emit_u32(0);
    buf.patch_u32(0, 0x12345678);
    assert_eq!(buf.read_u32(0), 0x12345678);

    buf.emit_u8(0xAA);
    buf.align_to(8);
    assert_eq!(buf.offset(), 8);
    assert_eq!(&buf.as_slice()[5..8], &[0, 0, 0]);
    buf.emit_u64(0x0102_0304_0506_0708);
    assert_eq!(buf.read_u64(8), 0x0102_0304_0506_0708);
}

#[test]
fn test_allocation_is_page_rounded() {
    let page = ExecAllocator::page_size();
    assert!(page.is_power_of_two());
    #[cfg(unix)]
    assert_eq!(page, unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize);

    let alloc = ExecAllocator::new();
    assert_eq!(alloc.allocate(1).unwrap().capacity(), page);
    assert_eq!(alloc.allocate(page).unwrap().capacity(), page);
    assert_eq!(alloc.allocate(page + 1).unwrap().capacity(), 2 * page);
    assert_eq!(alloc.allocate(0).unwrap().capacity(), page);
}

#[test]
fn test_live_block_accounting() {
    let alloc = ExecAllocator::new();
    let a = alloc.allocate(16).unwrap();
    let b = alloc.allocate(16).unwrap();
    assert_eq!(alloc.live_blocks(), 2);
    assert_eq!(alloc.total_allocated(), 2);

    drop(a);
    assert_eq!(alloc.live_blocks(), 1);

    let block = b.into_executable().unwrap();
    assert_eq!(alloc.live_blocks(), 1);
    drop(block);
    assert_eq!(alloc.live_blocks(), 0);
    assert_eq!(alloc.total_allocated(), 2);
}

#[test]
fn test_clones_share_counters() {
    let alloc = ExecAllocator::new();
    let other = alloc.clone();
    let _buf = other.allocate(16).unwrap();
    assert_eq!(alloc.live_blocks(), 1);
}

#[test]
fn test_executable_block_keeps_code() {
    let alloc = ExecAllocator::new();
    let mut buf = alloc.allocate(32).unwrap();
    buf.emit_bytes(&[0xC3, 0x90, 0x90]);
    let base = buf.base_ptr() as usize;
    let block = buf.into_executable().unwrap();

    assert_eq!(block.base_addr(), base);
    assert_eq!(block.len(), 3);
    assert!(!block.is_empty());
    assert_eq!(block.as_slice(), &[0xC3, 0x90, 0x90]);
    assert!(block.contains(base));
    assert!(block.contains(base + block.capacity() - 1));
    assert!(!block.contains(base + block.capacity()));
}

#[test]
fn test_injected_allocate_fault() {
    let alloc = ExecAllocator::new();
    alloc.inject_fault(FaultKind::Allocate, 2);
    let _a = alloc.allocate(16).unwrap();
    let _b = alloc.allocate(16).unwrap();
    let err = alloc.allocate(16).err().unwrap();
    assert!(matches!(err, StubError::Injected(FaultKind::Allocate)));
    assert_eq!(alloc.live_blocks(), 2);
    assert_eq!(alloc.total_allocated(), 2);

    // One-shot.
    let _c = alloc.allocate(16).unwrap();
    assert_eq!(alloc.live_blocks(), 3);
}

#[test]
fn test_injected_protect_fault_releases_block() {
    let alloc = ExecAllocator::new();
    alloc.inject_fault(FaultKind::Protect, 0);
    let mut buf = alloc.allocate(16).unwrap();
    buf.emit_u8(0xC3);
    assert_eq!(alloc.live_blocks(), 1);

    let err = buf.into_executable().err().unwrap();
    assert!(err.is_protect());
    assert_eq!(alloc.live_blocks(), 0);
    assert_eq!(alloc.total_allocated(), 1);
}

#[test]
fn test_clear_fault() {
    let alloc = ExecAllocator::new();
    alloc.inject_fault(FaultKind::Allocate, 0);
    alloc.clear_fault();
    assert!(alloc.allocate(16).is_ok());
}

#[cfg(target_os = "linux")]
#[test]
fn test_finished_block_is_not_writable() {
    let alloc = ExecAllocator::new();
    let mut buf = alloc.allocate(16).unwrap();
    buf.emit_u8(0xC3);
    let block = buf.into_executable().unwrap();

    let perms = crate::integration::mapping_perms(block.base_addr()).unwrap();
    assert!(perms.starts_with("r-x"), "perms {perms}");
}
