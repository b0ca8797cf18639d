//! thunk-stubdump: print the stub any backend emits.
//!
//! Generates one stub for the requested calling convention into a
//! writable scratch block (never made executable, so foreign ABIs
//! work on any host) and writes the bytes as a hex dump, raw, or
//! through objdump.

use std::env;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::process;

use thunk_backend::{codegen_for, ExecAllocator, StubCodeGen};
use thunk_core::{Abi, ContextPtr, TargetPtr};
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Args {
    abi: Abi,
    arity: usize,
    ctx: usize,
    target: usize,
    output: Option<String>,
    raw: bool,
    disas: bool,
}

const USAGE: &str = "\
usage: thunk-stubdump <abi> <arity> [options]

ABIs: x86_64-sysv x86_64-win64 i386-cdecl i386-stdcall
      aarch64 arm riscv64 mips-o32

Options:
  --ctx <value>     Context address to bind (default: 0x1000)
  --target <value>  Target address (default: 0x2000)
  -o <file>         Output to file (default: stdout)
  --raw             Output raw machine code bytes
  --disas           Disassemble via objdump
  -h, --help        Show this help

Set THUNK_LOG (e.g. THUNK_LOG=debug) for generator logs.";

fn parse_value(s: &str) -> Option<usize> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn fail(msg: &str) -> ! {
    eprintln!("{msg}");
    process::exit(1);
}

/// Value following the option at `*i`; advances past it.
fn take_value(args: &[String], i: &mut usize) -> String {
    let opt = &args[*i];
    *i += 1;
    args.get(*i)
        .cloned()
        .unwrap_or_else(|| fail(&format!("{opt} needs a value")))
}

fn parse_args() -> Args {
    let args: Vec<String> = env::args().collect();
    let help = args.len() > 1 && (args[1] == "--help" || args[1] == "-h");
    if help || args.len() < 3 {
        eprintln!("{USAGE}");
        process::exit(if help { 0 } else { 1 });
    }

    let abi = Abi::from_name(&args[1]).unwrap_or_else(|| fail(&format!("unknown abi: {}", args[1])));
    let arity = args[2]
        .parse()
        .unwrap_or_else(|_| fail(&format!("bad arity: {}", args[2])));

    let mut a = Args {
        abi,
        arity,
        ctx: 0x1000,
        target: 0x2000,
        output: None,
        raw: false,
        disas: false,
    };

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--ctx" => {
                let v = take_value(&args, &mut i);
                a.ctx = parse_value(&v).unwrap_or_else(|| fail(&format!("bad context: {v}")));
            }
            "--target" => {
                let v = take_value(&args, &mut i);
                a.target = parse_value(&v).unwrap_or_else(|| fail(&format!("bad target: {v}")));
            }
            "-o" => a.output = Some(take_value(&args, &mut i)),
            "--raw" => a.raw = true,
            "--disas" => a.disas = true,
            other => fail(&format!("unknown option: {other}")),
        }
        i += 1;
    }

    // 32-bit conventions load both addresses as single words.
    if a.abi.info().slot_size == 4 {
        for (what, value) in [("context", a.ctx), ("target", a.target)] {
            if u32::try_from(value).is_err() {
                fail(&format!("{what} {value:#x} does not fit a 32-bit {} slot", a.abi.info().name));
            }
        }
    }
    a
}

fn hex_dump(data: &[u8], w: &mut impl Write) -> io::Result<()> {
    for (i, chunk) in data.chunks(16).enumerate() {
        write!(w, "{:04x}: ", i * 16)?;
        for (j, byte) in chunk.iter().enumerate() {
            if j > 0 && j % 4 == 0 {
                write!(w, " ")?;
            }
            write!(w, " {byte:02x}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// objdump `-m` machine (plus extra flags) for each ABI.
fn objdump_machine(abi: Abi) -> &'static [&'static str] {
    match abi {
        Abi::X86_64SysV | Abi::X86_64Win64 => &["-m", "i386:x86-64"],
        Abi::I386Cdecl | Abi::I386Stdcall => &["-m", "i386"],
        Abi::AArch64 => &["-m", "aarch64"],
        Abi::Arm => &["-m", "arm"],
        Abi::Riscv64 => &["-m", "riscv:rv64"],
        Abi::MipsO32 => &["-m", "mips:isa32", "-EL"],
    }
}

fn disassemble(abi: Abi, code: &[u8]) {
    let tmp = env::temp_dir().join(format!("thunk-stubdump-{}.bin", process::id()));
    if let Err(e) = fs::write(&tmp, code) {
        fail(&format!("cannot write {}: {e}", tmp.display()));
    }
    let status = process::Command::new("objdump")
        .args(["-b", "binary", "-D"])
        .args(objdump_machine(abi))
        .arg(&tmp)
        .status();
    match status {
        Ok(s) if s.success() => {}
        Ok(s) => {
            eprintln!("objdump exited with {s}");
        }
        Err(e) => {
            eprintln!("failed to run objdump: {e}");
        }
    }
    let _ = fs::remove_file(&tmp);
}

fn open_output(path: &Option<String>) -> Box<dyn Write> {
    match path {
        Some(path) => {
            let f = fs::File::create(path).unwrap_or_else(|e| fail(&format!("cannot create {path}: {e}")));
            Box::new(BufWriter::new(f))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("THUNK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = parse_args();
    let backend = codegen_for(args.abi);
    let alloc = ExecAllocator::new();

    let mut buf = alloc
        .allocate(backend.stub_size())
        .unwrap_or_else(|e| fail(&format!("allocation failed: {e}")));
    if let Err(e) = backend.emit_stub(&mut buf, TargetPtr(args.target), ContextPtr(args.ctx), args.arity) {
        fail(&format!("{}: {e}", args.abi.info().name));
    }
    let code = buf.as_slice();

    info!(
        abi = args.abi.info().name,
        arity = args.arity,
        style = ?args.abi.call_style(args.arity),
        len = code.len(),
        "emitted stub"
    );

    if args.disas {
        disassemble(args.abi, code);
        return;
    }

    let mut out = open_output(&args.output);
    let written = if args.raw {
        out.write_all(code)
    } else {
        hex_dump(code, &mut out)
    };
    if let Err(e) = written.and_then(|()| out.flush()) {
        fail(&format!("write failed: {e}"));
    }
}
