use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::memory::{Memory, MEMORY_SIZE, PORT_COUNT};

/// Full machine snapshot: registers, flags, memory and both port banks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveState {
    pub version: u32,
    pub timestamp: u64,
    pub cpu_state: CpuSaveState,
    pub memory_state: MemoryState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSaveState {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub flags: u8,
    pub halted: bool,
    pub interrupts_enabled: bool,
    pub instructions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryState {
    pub ram: Vec<u8>,
    pub input_ports: Vec<u8>,
    pub output_ports: Vec<u8>,
}

impl SaveState {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(cpu_state: CpuSaveState, memory_state: MemoryState) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            cpu_state,
            memory_state,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let save_state: SaveState = bincode::deserialize(data)?;

        if save_state.version > Self::CURRENT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: save_state.version,
                current: Self::CURRENT_VERSION,
            });
        }
        save_state.memory_state.validate()?;

        Ok(save_state)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = self.to_bytes()?;
        std::fs::write(path.as_ref(), data)?;
        log::info!("Save state written to: {}", path.as_ref().display());
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let save_state = Self::from_bytes(&data)?;
        log::info!("Save state loaded from: {}", path.as_ref().display());
        Ok(save_state)
    }
}

impl MemoryState {
    pub fn capture(memory: &Memory) -> Self {
        let (input, output) = memory.ports();
        Self {
            ram: memory.ram().to_vec(),
            input_ports: input.to_vec(),
            output_ports: output.to_vec(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.ram.len() != MEMORY_SIZE {
            return Err(Error::MalformedImage { len: self.ram.len() });
        }
        if self.input_ports.len() != PORT_COUNT || self.output_ports.len() != PORT_COUNT {
            return Err(Error::MalformedImage {
                len: self.input_ports.len().max(self.output_ports.len()),
            });
        }
        Ok(())
    }

    /// Copy this snapshot into `memory`. Fails without touching `memory`
    /// when any buffer has the wrong size.
    pub fn apply(&self, memory: &mut Memory) -> Result<()> {
        self.validate()?;
        let mut input = [0u8; PORT_COUNT];
        let mut output = [0u8; PORT_COUNT];
        input.copy_from_slice(&self.input_ports);
        output.copy_from_slice(&self.output_ports);
        memory.set_ram(&self.ram);
        memory.set_ports(input, output);
        Ok(())
    }
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            ram: vec![0; MEMORY_SIZE],
            input_ports: vec![0; PORT_COUNT],
            output_ports: vec![0; PORT_COUNT],
        }
    }
}
