use crate::cpu_bus::CpuBus;

pub const MEMORY_SIZE: usize = 0x10000;
pub const PORT_COUNT: usize = 0x100;

/// Flat 64 KiB address space plus the input/output port banks.
///
/// Every accessor takes a `u16` address or a `u8` port number, so an
/// out-of-range index cannot be formed.
#[derive(Clone)]
pub struct Memory {
    pub(crate) ram: Vec<u8>,
    pub(crate) input_ports: [u8; PORT_COUNT],
    pub(crate) output_ports: [u8; PORT_COUNT],
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            ram: vec![0; MEMORY_SIZE],
            input_ports: [0; PORT_COUNT],
            output_ports: [0; PORT_COUNT],
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        self.ram[addr as usize] = data;
    }

    /// Copy `bytes` in starting at `at`, wrapping past 0xFFFF.
    pub fn load(&mut self, bytes: &[u8], at: u16) {
        let mut addr = at;
        for &byte in bytes {
            self.ram[addr as usize] = byte;
            addr = addr.wrapping_add(1);
        }
    }

    pub fn clear(&mut self) {
        self.clear_ram();
        self.input_ports = [0; PORT_COUNT];
        self.output_ports = [0; PORT_COUNT];
    }

    /// Zero the 64 KiB buffer. Ports are left alone.
    pub fn clear_ram(&mut self) {
        self.ram.fill(0);
    }

    pub fn input_port(&self, port: u8) -> u8 {
        self.input_ports[port as usize]
    }

    pub fn set_input_port(&mut self, port: u8, value: u8) {
        self.input_ports[port as usize] = value;
    }

    pub fn output_port(&self, port: u8) -> u8 {
        self.output_ports[port as usize]
    }

    // Save state methods
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Replace the whole buffer. Anything that is not exactly 64 KiB is
    /// rejected and the buffer is left untouched.
    pub fn set_ram(&mut self, ram: &[u8]) -> bool {
        if ram.len() != MEMORY_SIZE {
            return false;
        }
        self.ram.copy_from_slice(ram);
        true
    }

    pub fn ports(&self) -> (&[u8; PORT_COUNT], &[u8; PORT_COUNT]) {
        (&self.input_ports, &self.output_ports)
    }

    pub fn set_ports(&mut self, input: [u8; PORT_COUNT], output: [u8; PORT_COUNT]) {
        self.input_ports = input;
        self.output_ports = output;
    }
}

/// Format `len` bytes of `ram` from `start` as 16-byte hex lines. With
/// `nonzero_only`, lines that are entirely zero are skipped.
pub fn hex_dump(ram: &[u8], start: usize, len: usize, nonzero_only: bool) -> Vec<String> {
    let end = start.saturating_add(len).min(ram.len());
    let mut lines = Vec::new();
    let mut addr = start;
    while addr < end {
        let line_end = (addr + 16).min(end);
        let row = &ram[addr..line_end];
        if !nonzero_only || row.iter().any(|&b| b != 0) {
            let mut line = format!("{:04X}:", addr);
            for byte in row {
                line.push_str(&format!(" {:02X}", byte));
            }
            lines.push(line);
        }
        addr = line_end;
    }
    lines
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBus for Memory {
    fn read_u8(&mut self, addr: u16) -> u8 {
        self.read(addr)
    }

    fn write_u8(&mut self, addr: u16, value: u8) {
        self.write(addr, value);
    }

    fn port_in(&mut self, port: u8) -> u8 {
        self.input_ports[port as usize]
    }

    fn port_out(&mut self, port: u8, value: u8) {
        self.output_ports[port as usize] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_wraps_at_top_of_memory() {
        let mut mem = Memory::new();
        mem.load(&[0x11, 0x22, 0x33], 0xFFFE);
        assert_eq!(mem.read(0xFFFE), 0x11);
        assert_eq!(mem.read(0xFFFF), 0x22);
        assert_eq!(mem.read(0x0000), 0x33);
    }

    #[test]
    fn word_access_is_little_endian() {
        let mut mem = Memory::new();
        mem.write_u16(0x1000, 0xBEEF);
        assert_eq!(mem.read(0x1000), 0xEF);
        assert_eq!(mem.read(0x1001), 0xBE);
        assert_eq!(mem.read_u16(0x1000), 0xBEEF);
    }

    #[test]
    fn set_ram_rejects_wrong_length() {
        let mut mem = Memory::new();
        mem.write(0x10, 0xAA);
        assert!(!mem.set_ram(&[1, 2, 3]));
        assert_eq!(mem.read(0x10), 0xAA);
    }

    #[test]
    fn hex_dump_rows() {
        let mut mem = Memory::new();
        mem.load(&[0xDE, 0xAD, 0xBE, 0xEF], 0x0010);
        let lines = hex_dump(mem.ram(), 0x0000, 0x30, true);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("0010: DE AD BE EF 00"));

        let lines = hex_dump(mem.ram(), 0xFFF8, 0x100, false);
        assert_eq!(lines, vec!["FFF8: 00 00 00 00 00 00 00 00".to_string()]);
    }

    #[test]
    fn clear_zeroes_memory_and_ports() {
        let mut mem = Memory::new();
        mem.write(0x1234, 0x56);
        mem.port_out(0x01, 0x99);
        mem.set_input_port(0x02, 0x77);
        mem.clear();
        assert_eq!(mem.read(0x1234), 0);
        assert_eq!(mem.output_port(0x01), 0);
        assert_eq!(mem.input_port(0x02), 0);
    }
}
