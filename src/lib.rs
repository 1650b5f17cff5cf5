//! Intel 8085 instruction-set simulator.
//!
//! [`cpu::Cpu`] fetches, decodes and executes one instruction at a time
//! against any [`cpu_bus::CpuBus`]. [`emulator::Emulator`] owns a CPU and a
//! 64 KiB [`memory::Memory`] and drives them through the step/run/break/reset
//! state machine a host adapter talks to.

pub mod cpu;
pub mod cpu_bus;
pub mod debug_flags;
pub mod disasm;
pub mod emulator;
pub mod error;
pub mod memory;
pub mod savestate;
pub mod shutdown;
pub mod store;

pub use cpu::{Cpu, Signal, StatusFlags};
pub use emulator::{BreakSignal, Control, Emulator, Host, MachineState, NullHost, RunState};
pub use error::{CpuError, Error, Result};
pub use memory::Memory;
