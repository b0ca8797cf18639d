use thunk_core::{Abi, CallStyle, ContextPtr, FaultKind, StubError, StubPtr, TargetPtr};

#[test]
fn test_abi_names_round_trip() {
    for abi in Abi::ALL {
        assert_eq!(Abi::from_name(abi.info().name), Some(abi));
    }
    assert_eq!(Abi::from_name("x86_64-sysv"), Some(Abi::X86_64SysV));
    assert_eq!(Abi::from_name("pdp11"), None);
}

#[test]
fn test_register_windows() {
    assert_eq!(Abi::X86_64SysV.info().reg_args, 6);
    assert_eq!(Abi::X86_64Win64.info().reg_args, 4);
    assert_eq!(Abi::AArch64.info().reg_args, 8);
    assert_eq!(Abi::Arm.info().reg_args, 4);
    assert_eq!(Abi::Riscv64.info().reg_args, 8);
    assert_eq!(Abi::MipsO32.info().reg_args, 4);
    assert_eq!(Abi::I386Cdecl.info().reg_args, 0);
    assert_eq!(Abi::I386Stdcall.info().reg_args, 0);
}

#[test]
fn test_only_stdcall_ignores_arity() {
    for abi in Abi::ALL {
        assert_eq!(abi.info().needs_arity, abi != Abi::I386Stdcall, "{abi:?}");
    }
}

#[test]
fn test_call_style_by_arity() {
    let sysv = Abi::X86_64SysV;
    assert_eq!(sysv.call_style(0), CallStyle::TailJump);
    assert_eq!(sysv.call_style(5), CallStyle::TailJump);
    assert_eq!(sysv.call_style(6), CallStyle::DuplicateSlots);
    assert_eq!(sysv.call_style(9), CallStyle::DuplicateSlots);

    assert_eq!(Abi::X86_64Win64.call_style(3), CallStyle::TailJump);
    assert_eq!(Abi::X86_64Win64.call_style(4), CallStyle::DuplicateSlots);

    assert_eq!(Abi::I386Cdecl.call_style(0), CallStyle::CallPop);
    assert_eq!(Abi::I386Cdecl.call_style(1), CallStyle::DuplicateSlots);
    assert_eq!(Abi::I386Stdcall.call_style(0), CallStyle::StackPrepend);
    assert_eq!(Abi::I386Stdcall.call_style(7), CallStyle::StackPrepend);
}

#[test]
fn test_host_abi() {
    let host = Abi::host();
    if cfg!(all(target_arch = "x86_64", unix)) {
        assert_eq!(host, Some(Abi::X86_64SysV));
    }
    if cfg!(target_arch = "aarch64") {
        assert_eq!(host, Some(Abi::AArch64));
    }
    if let Some(abi) = host {
        assert_eq!(abi.info().slot_size, std::mem::size_of::<usize>());
    }
}

#[test]
fn test_context_identity() {
    let a = 5u32;
    let b = 5u32;
    let pa = ContextPtr::from_ptr(&a);
    assert_eq!(pa, ContextPtr::from_ptr(&a));
    assert_ne!(pa, ContextPtr::from_ptr(&b));
    assert!(!pa.is_null());
    assert!(ContextPtr::NULL.is_null());
    assert_eq!(format!("{:?}", ContextPtr(0x10)), "ctx@0x10");
}

extern "C" fn nothing() {}

#[test]
fn test_target_and_stub_ptr() {
    let t = TargetPtr::from_ptr(nothing as *const ());
    assert_eq!(t.addr(), nothing as usize);
    assert_eq!(format!("{:?}", TargetPtr(0x20)), "fn@0x20");

    let s = StubPtr(nothing as usize);
    let f: extern "C" fn() = unsafe { s.cast() };
    f();
    assert_eq!(s.as_ptr() as usize, s.addr());
}

#[test]
fn test_error_classification() {
    let alloc = StubError::Injected(FaultKind::Allocate);
    let protect = StubError::Injected(FaultKind::Protect);
    assert!(alloc.is_alloc());
    assert!(!alloc.is_protect());
    assert!(protect.is_protect());

    let err = StubError::ArityOutOfRange { arity: 40, max: 32 };
    assert!(!err.is_alloc() && !err.is_protect());
    assert_eq!(
        err.to_string(),
        "public arity 40 exceeds the supported maximum of 32"
    );

    let os = StubError::Alloc {
        size: 4096,
        source: std::io::Error::from_raw_os_error(12),
    };
    assert!(os.is_alloc());
    assert!(os.to_string().starts_with("failed to map 4096 bytes"));
}
