use std::env;
use std::path::PathBuf;
use std::process;

use sim8085::debug_flags;
use sim8085::emulator::{Control, Emulator, Host, MachineState, RunState};
use sim8085::memory::hex_dump;
use sim8085::savestate::SaveState;
use sim8085::shutdown;
use sim8085::store::{memory_file_path, MemoryStore};

const USAGE: &str = "Usage: sim8085 [--load-at ADDR] [--pc ADDR] [--step N] [--memory FILE] \
[--no-persist] [--dump START LEN] [--save-state FILE] [--load-state FILE] <image>";

// Exit codes
const EXIT_UNSUPPORTED: i32 = 3;
const EXIT_INTERRUPTED: i32 = 130;

// Instructions between two autosaves of the memory file
const AUTOSAVE_INTERVAL: u64 = 1_000_000;

struct Options {
    image: Option<PathBuf>,
    load_at: u16,
    pc: Option<u16>,
    steps: Option<u64>,
    memory_file: Option<PathBuf>,
    persist: bool,
    dump: Option<(u16, usize)>,
    save_state: Option<PathBuf>,
    load_state: Option<PathBuf>,
}

fn parse_u32_hex_or_dec(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(stripped) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(stripped, 16).ok()
    } else if let Some(stripped) = s.strip_suffix('h').or_else(|| s.strip_suffix('H')) {
        u32::from_str_radix(stripped, 16).ok()
    } else {
        s.parse::<u32>().ok()
    }
}

fn parse_addr(flag: &str, value: Option<String>) -> Result<u16, String> {
    let value = value.ok_or_else(|| format!("{} requires a value", flag))?;
    parse_u32_hex_or_dec(&value)
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| format!("{}: '{}' is not a 16-bit address", flag, value))
}

fn parse_args(args: Vec<String>) -> Result<Options, String> {
    let mut opts = Options {
        image: None,
        load_at: 0,
        pc: None,
        steps: None,
        memory_file: None,
        persist: true,
        dump: None,
        save_state: None,
        load_state: None,
    };

    let mut args = args.into_iter().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--load-at" => opts.load_at = parse_addr("--load-at", args.next())?,
            "--pc" => opts.pc = Some(parse_addr("--pc", args.next())?),
            "--step" => {
                let v = args.next().ok_or("--step requires a value")?;
                let n = parse_u32_hex_or_dec(&v).ok_or_else(|| format!("--step: bad count '{}'", v))?;
                opts.steps = Some(n as u64);
            }
            "--memory" => {
                let v = args.next().ok_or("--memory requires a value")?;
                opts.memory_file = Some(PathBuf::from(v));
            }
            "--no-persist" => opts.persist = false,
            "--dump" => {
                let start = parse_addr("--dump", args.next())?;
                let v = args.next().ok_or("--dump requires START and LEN")?;
                let len = parse_u32_hex_or_dec(&v).ok_or_else(|| format!("--dump: bad length '{}'", v))?;
                opts.dump = Some((start, len as usize));
            }
            "--save-state" => {
                let v = args.next().ok_or("--save-state requires a value")?;
                opts.save_state = Some(PathBuf::from(v));
            }
            "--load-state" => {
                let v = args.next().ok_or("--load-state requires a value")?;
                opts.load_state = Some(PathBuf::from(v));
            }
            s if s.starts_with('-') => return Err(format!("Unknown option: {}", s)),
            s => {
                if opts.image.is_some() {
                    return Err(format!("Unexpected argument: {}", s));
                }
                opts.image = Some(PathBuf::from(s));
            }
        }
    }

    if opts.image.is_none() && opts.load_state.is_none() {
        return Err("program image argument missing".into());
    }
    Ok(opts)
}

/// Terminal host adapter: prints notices, persists memory to a file and
/// turns Ctrl-C or the step cap into a break.
struct CliHost {
    store: Option<MemoryStore>,
    executed: u64,
    max_steps: u64,
    dirty: bool,
    last_save: u64,
}

impl CliHost {
    fn new(store: Option<MemoryStore>, max_steps: u64) -> Self {
        Self {
            store,
            executed: 0,
            max_steps,
            dirty: false,
            last_save: 0,
        }
    }

    fn save(&mut self, memory: &[u8]) -> sim8085::Result<()> {
        if let Some(store) = &self.store {
            store.save(memory)?;
        }
        self.dirty = false;
        self.last_save = self.executed;
        Ok(())
    }
}

impl Host for CliHost {
    fn yield_now(&mut self, _state: &MachineState) -> Control {
        self.executed += 1;
        if shutdown::take_interrupt() {
            shutdown::set_exit_code(EXIT_INTERRUPTED);
            return Control::Break;
        }
        if self.max_steps != 0 && self.executed >= self.max_steps {
            log::warn!("Stopping after {} instructions (SIM_MAX_STEPS)", self.executed);
            return Control::Break;
        }
        Control::Continue
    }

    fn unsupported_opcode(&mut self, opcode: u8, pc: u16) {
        eprintln!("Unsupported opcode 0x{:02X} at 0x{:04X}", opcode, pc);
        shutdown::set_exit_code(EXIT_UNSUPPORTED);
    }

    // The final save on exit catches anything this skips
    fn persist(&mut self, memory: &[u8]) {
        self.dirty = true;
        if self.executed.saturating_sub(self.last_save) < AUTOSAVE_INTERVAL {
            return;
        }
        if let Err(e) = self.save(memory) {
            log::warn!("Failed to persist memory: {}", e);
        }
    }
}

fn main() {
    env_logger::init();

    let opts = match parse_args(env::args().collect()) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    };

    // Ctrl-C breaks the run; memory is still flushed below
    shutdown::install();

    if let Err(e) = run(opts) {
        eprintln!("{}", e);
        process::exit(1);
    }

    let code = shutdown::exit_code();
    if code != 0 {
        process::exit(code);
    }
}

/// Single-step `count` instructions, printing each one. Ctrl-C stops the
/// loop between instructions.
fn step_instructions(emu: &mut Emulator, host: &mut CliHost, count: u64) -> RunState {
    let mut state = emu.run_state();
    for _ in 0..count {
        if shutdown::take_interrupt() {
            shutdown::set_exit_code(EXIT_INTERRUPTED);
            return RunState::Paused;
        }
        let line = emu.disassemble_at(emu.get_state().pc);
        state = emu.request_step(host);
        host.executed += 1;
        println!("{}", line);
        if state == RunState::Halted {
            break;
        }
    }
    state
}

fn run(opts: Options) -> sim8085::Result<()> {
    let quiet = debug_flags::quiet();
    let mut emu = Emulator::new();

    let store = if opts.persist {
        opts.memory_file
            .clone()
            .or_else(|| opts.image.as_deref().map(memory_file_path))
            .map(MemoryStore::new)
    } else {
        None
    };
    if store.is_none() {
        emu.set_autosave(false);
    }

    if let Some(store) = &store {
        match store.load() {
            Ok(data) => emu.restore(data.as_deref()),
            Err(e) => {
                log::warn!("Could not read {}: {}", store.path().display(), e);
                emu.restore(None);
            }
        }
    }

    if let Some(path) = &opts.load_state {
        let save_state = SaveState::load_from_file(path)?;
        emu.load_state(&save_state)?;
        if !quiet {
            println!("Restored machine from {}", path.display());
        }
    }

    if let Some(image) = &opts.image {
        let bytes = std::fs::read(image)?;
        emu.load(&bytes, opts.load_at)?;
        if !quiet {
            println!(
                "Loaded {} ({} bytes) at 0x{:04X}",
                image.display(),
                bytes.len(),
                opts.load_at
            );
        }
        emu.set_pc(opts.pc.unwrap_or(opts.load_at));
    } else if let Some(pc) = opts.pc {
        emu.set_pc(pc);
    }

    let mut host = CliHost::new(store, debug_flags::max_steps());

    let final_state = match opts.steps {
        Some(n) => step_instructions(&mut emu, &mut host, n),
        None => emu.request_run(&mut host),
    };

    if !quiet {
        println!("Stopped: {:?}", final_state);
    }
    println!("{}", emu.get_state());

    if let Some((start, len)) = opts.dump {
        for line in hex_dump(emu.memory().ram(), start as usize, len, false) {
            println!("{}", line);
        }
    }

    if host.dirty {
        log::debug!("Flushing memory changes held back by the autosave interval");
    }
    host.save(&emu.persist())?;

    if let Some(path) = &opts.save_state {
        emu.save_state().save_to_file(path)?;
        if !quiet {
            println!("Saved machine to {}", path.display());
        }
    }

    Ok(())
}
