use std::env;
use std::path::PathBuf;
use std::process;

use sim8085::memory::{hex_dump, MEMORY_SIZE};
use sim8085::store::{memory_file_path, MemoryStore};

// Hex dump of a persisted memory image.
// Usage:
//   cargo run --bin dump_mem -- progs/demo.mem --start 0x2000 --len 0x100
//   cargo run --bin dump_mem -- --program progs/demo.bin --nonzero
// Environment fallbacks: MEM_START, MEM_LEN

fn parse_u32_hex_or_dec(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(stripped) = s.strip_prefix("0x") {
        u32::from_str_radix(stripped, 16).ok()
    } else {
        s.parse::<u32>().ok()
    }
}

struct Args {
    path: PathBuf,
    start: u32,
    len: u32,
    nonzero_only: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = env::args().skip(1);
    let mut path: Option<PathBuf> = None;
    let mut start: Option<u32> = None;
    let mut len: Option<u32> = None;
    let mut nonzero_only = false;

    while let Some(a) = args.next() {
        match a.as_str() {
            "--start" => start = args.next().and_then(|v| parse_u32_hex_or_dec(&v)),
            "--len" | "--length" => len = args.next().and_then(|v| parse_u32_hex_or_dec(&v)),
            "--nonzero" | "--nz" => nonzero_only = true,
            "--program" => {
                let program = args.next().ok_or("--program requires a value")?;
                path = Some(memory_file_path(&PathBuf::from(program)));
            }
            s if s.starts_with('-') => return Err(format!("Unknown option: {}", s)),
            _ => {
                if path.is_none() {
                    path = Some(PathBuf::from(&a));
                }
            }
        }
    }

    let path = path.ok_or("memory file path is required")?;
    let start = start
        .or_else(|| env::var("MEM_START").ok().and_then(|s| parse_u32_hex_or_dec(&s)))
        .unwrap_or(0x0000);
    let len = len
        .or_else(|| env::var("MEM_LEN").ok().and_then(|s| parse_u32_hex_or_dec(&s)))
        .unwrap_or(MEMORY_SIZE as u32);

    Ok(Args {
        path,
        start,
        len,
        nonzero_only,
    })
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!("Usage: dump_mem [--start ADDR] [--len N] [--nonzero] (<file.mem> | --program <image>)");
            process::exit(2);
        }
    };

    let store = MemoryStore::new(&args.path);
    let data = match store.load() {
        Ok(Some(data)) => data,
        Ok(None) => {
            eprintln!("No memory image at {}", args.path.display());
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to read {}: {}", args.path.display(), e);
            process::exit(1);
        }
    };

    if data.len() != MEMORY_SIZE {
        eprintln!(
            "warning: {} holds {} bytes, expected {}",
            args.path.display(),
            data.len(),
            MEMORY_SIZE
        );
    }
    if args.start as usize >= data.len() {
        eprintln!(
            "Start 0x{:04X} is outside the image (0x{:05X} bytes)",
            args.start,
            data.len()
        );
        process::exit(1);
    }

    let lines = hex_dump(&data, args.start as usize, args.len as usize, args.nonzero_only);
    println!(
        "Memory dump: {} start=0x{:04X} len=0x{:04X}{}",
        args.path.display(),
        args.start,
        args.len,
        if args.nonzero_only { " [nonzero only]" } else { "" }
    );
    for line in lines {
        println!("{}", line);
    }
}
