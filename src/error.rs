//! Error types for the simulator core and its persistence layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Raised by `Cpu::step`. Never fatal: the opcode byte has been consumed and
/// no other state was touched.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    #[error("unsupported opcode 0x{opcode:02X} at 0x{pc:04X}")]
    UnsupportedOpcode { opcode: u8, pc: u16 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("memory image has {len} bytes, expected 65536")]
    MalformedImage { len: usize },
    #[error("save state version {found} is not supported (current: {current})")]
    UnsupportedVersion { found: u32, current: u32 },
    #[error("{len} bytes do not fit at 0x{at:04X}")]
    ImageTooLarge { at: u16, len: usize },
}
