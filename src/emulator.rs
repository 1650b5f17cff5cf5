use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cpu::{Cpu, Signal, StatusFlags};
use crate::debug_flags;
use crate::disasm;
use crate::error::{CpuError, Error, Result};
use crate::memory::{Memory, MEMORY_SIZE};
use crate::savestate::{MemoryState, SaveState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Ready,
    Running,
    Halted,
    Paused,
}

/// Pause request checked between instructions. Clones share one flag, so a
/// host can keep a handle and raise it from elsewhere while a run is going.
#[derive(Debug, Clone, Default)]
pub struct BreakSignal(Arc<AtomicBool>);

impl BreakSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// What the host wants after it has been handed control between two
/// instructions of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Break,
}

/// Callbacks through which the controller reaches the host adapter.
pub trait Host {
    /// Called after every instruction of a run. This is the only point at
    /// which a run can be suspended.
    fn yield_now(&mut self, _state: &MachineState) -> Control {
        Control::Continue
    }

    /// One-way notice for display. Does not change what the controller does.
    fn unsupported_opcode(&mut self, _opcode: u8, _pc: u16) {}

    /// A direct-address store or a poke changed memory; `memory` is the
    /// full buffer.
    fn persist(&mut self, _memory: &[u8]) {}
}

/// Host that never breaks and ignores every notice.
pub struct NullHost;

impl Host for NullHost {}

/// Read-only view of the machine for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineState {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub flags: StatusFlags,
    pub halted: bool,
    pub interrupts_enabled: bool,
    pub run_state: RunState,
    pub instructions: u64,
}

impl MachineState {
    pub fn flag(&self, flag: StatusFlags) -> bool {
        self.flags.contains(flag)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |flag: StatusFlags| if self.flags.contains(flag) { '1' } else { '0' };
        writeln!(
            f,
            "A={:02X} B={:02X} C={:02X} D={:02X} E={:02X} H={:02X} L={:02X}",
            self.a, self.b, self.c, self.d, self.e, self.h, self.l
        )?;
        writeln!(f, "SP={:04X} PC={:04X}", self.sp, self.pc)?;
        write!(
            f,
            "S={} Z={} AC={} P={} CY={} halted={} state={:?}",
            bit(StatusFlags::SIGN),
            bit(StatusFlags::ZERO),
            bit(StatusFlags::AUX_CARRY),
            bit(StatusFlags::PARITY),
            bit(StatusFlags::CARRY),
            self.halted,
            self.run_state
        )
    }
}

/// Execution controller. Owns the CPU and memory; the host reaches them
/// only through these methods, and only between instructions.
pub struct Emulator {
    cpu: Cpu,
    memory: Memory,
    state: RunState,
    break_signal: BreakSignal,
    autosave: bool,
    // Poked since the host last saw memory
    poked: bool,
}

impl Emulator {
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            memory: Memory::new(),
            state: RunState::Ready,
            break_signal: BreakSignal::new(),
            autosave: debug_flags::autosave(),
            poked: false,
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    /// Handle for raising a break while a run is in progress.
    pub fn break_signal(&self) -> BreakSignal {
        self.break_signal.clone()
    }

    pub fn set_autosave(&mut self, enabled: bool) {
        self.autosave = enabled;
    }

    pub fn set_input_port(&mut self, port: u8, value: u8) {
        self.memory.set_input_port(port, value);
    }

    pub fn output_port(&self, port: u8) -> u8 {
        self.memory.output_port(port)
    }

    /// Copy a program image into memory at `at`. Images that would run past
    /// 0xFFFF are rejected and memory is left as it was.
    pub fn load(&mut self, bytes: &[u8], at: u16) -> Result<()> {
        if at as usize + bytes.len() > MEMORY_SIZE {
            return Err(Error::ImageTooLarge {
                at,
                len: bytes.len(),
            });
        }
        self.memory.load(bytes, at);
        log::info!("Loaded {} bytes at 0x{:04X}", bytes.len(), at);
        Ok(())
    }

    pub fn peek(&self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    /// Write one byte. With autosave on, the host is handed memory at the
    /// start of the next step or run.
    pub fn poke(&mut self, addr: u16, value: u8) {
        self.memory.write(addr, value);
        if self.autosave {
            self.poked = true;
        }
    }

    /// Move execution to `addr`. Also the way out of HALTED short of a reset.
    pub fn set_pc(&mut self, addr: u16) {
        self.cpu.pc = addr;
        if self.cpu.halted {
            self.cpu.halted = false;
        }
        if self.state == RunState::Halted {
            self.state = RunState::Ready;
        }
    }

    pub fn get_state(&self) -> MachineState {
        MachineState {
            a: self.cpu.a,
            b: self.cpu.b,
            c: self.cpu.c,
            d: self.cpu.d,
            e: self.cpu.e,
            h: self.cpu.h,
            l: self.cpu.l,
            sp: self.cpu.sp,
            pc: self.cpu.pc,
            flags: self.cpu.flags,
            halted: self.cpu.halted,
            interrupts_enabled: self.cpu.interrupts_enabled,
            run_state: self.state,
            instructions: self.cpu.instructions(),
        }
    }

    /// The whole 64 KiB buffer, for an external store.
    pub fn persist(&self) -> Vec<u8> {
        self.memory.ram().to_vec()
    }

    /// Replace memory with a persisted buffer. A missing buffer, or one that
    /// is not exactly 64 KiB, leaves memory zero-filled.
    pub fn restore(&mut self, data: Option<&[u8]>) {
        match data {
            Some(bytes) if self.memory.set_ram(bytes) => {
                log::info!("Restored {} bytes of memory", bytes.len());
            }
            Some(bytes) => {
                log::warn!(
                    "Ignoring persisted memory of {} bytes (expected {}), starting zero-filled",
                    bytes.len(),
                    MEMORY_SIZE
                );
                self.memory.clear_ram();
            }
            None => self.memory.clear_ram(),
        }
    }

    /// Back to power-on: registers and memory zeroed, state READY.
    pub fn request_reset(&mut self) {
        self.cpu.reset();
        self.memory.clear();
        self.poked = false;
        self.break_signal.clear();
        self.state = RunState::Ready;
        log::info!("Machine reset");
    }

    pub fn request_break(&self) {
        self.break_signal.raise();
    }

    /// Execute exactly one instruction. Returns READY, or HALTED if the
    /// instruction was HLT.
    pub fn request_step(&mut self, host: &mut dyn Host) -> RunState {
        self.flush_pokes(host);
        if self.state == RunState::Halted {
            log::debug!("Step ignored: machine is halted");
            return self.state;
        }

        self.state = RunState::Running;
        self.state = match self.execute_one(host) {
            Ok(Signal::Halted) => RunState::Halted,
            Ok(Signal::Continue) | Err(_) => RunState::Ready,
        };
        self.state
    }

    /// Run until HLT, a break, or an unsupported opcode. The host gets
    /// control back after every instruction. Also resumes from PAUSED.
    pub fn request_run(&mut self, host: &mut dyn Host) -> RunState {
        self.flush_pokes(host);
        if self.state == RunState::Halted {
            log::debug!("Run ignored: machine is halted");
            return self.state;
        }

        self.break_signal.clear();
        self.state = RunState::Running;
        log::debug!("Run from 0x{:04X}", self.cpu.pc);

        loop {
            match self.execute_one(host) {
                Ok(Signal::Halted) => {
                    self.state = RunState::Halted;
                    log::info!("Halted at 0x{:04X}", self.cpu.pc.wrapping_sub(1));
                    break;
                }
                Ok(Signal::Continue) => {}
                Err(_) => {
                    self.state = RunState::Paused;
                    break;
                }
            }

            let snapshot = self.get_state();
            if host.yield_now(&snapshot) == Control::Break {
                self.break_signal.raise();
            }
            if self.break_signal.take() {
                self.state = RunState::Paused;
                log::info!("Break at 0x{:04X}", self.cpu.pc);
                break;
            }
        }

        self.state
    }

    fn flush_pokes(&mut self, host: &mut dyn Host) {
        if std::mem::take(&mut self.poked) {
            host.persist(self.memory.ram());
        }
    }

    fn execute_one(&mut self, host: &mut dyn Host) -> std::result::Result<Signal, CpuError> {
        let line = debug_flags::trace().then(|| disasm::disassemble(&mut self.memory, self.cpu.pc));

        match self.cpu.step(&mut self.memory) {
            Ok(step) => {
                if let Some(line) = line {
                    log::trace!(
                        "{}  A={:02X} BC={:04X} DE={:04X} HL={:04X} SP={:04X} F={:02X}",
                        line,
                        self.cpu.a,
                        self.cpu.bc(),
                        self.cpu.de(),
                        self.cpu.hl(),
                        self.cpu.sp,
                        self.cpu.flags.bits()
                    );
                }
                if step.dirty && self.autosave {
                    host.persist(self.memory.ram());
                }
                Ok(step.signal)
            }
            Err(err) => {
                log::warn!("{}", err);
                let CpuError::UnsupportedOpcode { opcode, pc } = err;
                host.unsupported_opcode(opcode, pc);
                Err(err)
            }
        }
    }

    pub fn disassemble_at(&mut self, addr: u16) -> disasm::Disassembly {
        disasm::disassemble(&mut self.memory, addr)
    }

    // Save state methods
    pub fn save_state(&self) -> SaveState {
        SaveState::new(self.cpu.to_save_state(), MemoryState::capture(&self.memory))
    }

    /// Restore a snapshot. The run state follows the restored halt latch.
    pub fn load_state(&mut self, save_state: &SaveState) -> Result<()> {
        save_state.memory_state.apply(&mut self.memory)?;
        self.cpu.load_from_save_state(&save_state.cpu_state);
        self.state = if self.cpu.halted {
            RunState::Halted
        } else {
            RunState::Ready
        };
        Ok(())
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD_PROGRAM: [u8; 6] = [0x3E, 0x05, 0x06, 0x03, 0x80, 0x76];

    #[derive(Default)]
    struct RecordingHost {
        yields: usize,
        break_after: Option<usize>,
        unsupported: Vec<(u8, u16)>,
        persisted: usize,
    }

    impl Host for RecordingHost {
        fn yield_now(&mut self, _state: &MachineState) -> Control {
            self.yields += 1;
            match self.break_after {
                Some(n) if self.yields >= n => Control::Break,
                _ => Control::Continue,
            }
        }

        fn unsupported_opcode(&mut self, opcode: u8, pc: u16) {
            self.unsupported.push((opcode, pc));
        }

        fn persist(&mut self, memory: &[u8]) {
            assert_eq!(memory.len(), MEMORY_SIZE);
            self.persisted += 1;
        }
    }

    fn emulator_with(program: &[u8]) -> Emulator {
        let mut emu = Emulator::new();
        emu.load(program, 0).unwrap();
        emu
    }

    #[test]
    fn run_to_halt() {
        let mut emu = emulator_with(&ADD_PROGRAM);
        let mut host = RecordingHost::default();

        assert_eq!(emu.request_run(&mut host), RunState::Halted);

        let state = emu.get_state();
        assert_eq!(state.a, 0x08);
        assert_eq!(state.pc, 6);
        assert!(state.halted);
        assert!(!state.flag(StatusFlags::ZERO));
        assert_eq!(state.run_state, RunState::Halted);
        // Yield after every instruction except the final HLT.
        assert_eq!(host.yields, 3);
    }

    #[test]
    fn step_executes_one_instruction() {
        let mut emu = emulator_with(&ADD_PROGRAM);

        assert_eq!(emu.request_step(&mut NullHost), RunState::Ready);
        assert_eq!(emu.get_state().a, 0x05);
        assert_eq!(emu.get_state().pc, 2);

        emu.request_step(&mut NullHost);
        emu.request_step(&mut NullHost);
        assert_eq!(emu.request_step(&mut NullHost), RunState::Halted);
    }

    #[test]
    fn halted_machine_ignores_run_until_pc_is_set() {
        let mut emu = emulator_with(&ADD_PROGRAM);
        emu.request_run(&mut NullHost);
        let before = emu.get_state();

        assert_eq!(emu.request_run(&mut NullHost), RunState::Halted);
        assert_eq!(emu.request_step(&mut NullHost), RunState::Halted);
        assert_eq!(emu.get_state(), before);

        emu.set_pc(0);
        assert_eq!(emu.run_state(), RunState::Ready);
        assert!(!emu.get_state().halted);
        assert_eq!(emu.request_run(&mut NullHost), RunState::Halted);
    }

    #[test]
    fn host_break_pauses_and_run_resumes() {
        // loop: JMP loop
        let mut emu = emulator_with(&[0xC3, 0x00, 0x00]);
        let mut host = RecordingHost {
            break_after: Some(5),
            ..Default::default()
        };

        assert_eq!(emu.request_run(&mut host), RunState::Paused);
        assert_eq!(emu.get_state().instructions, 5);

        host.yields = 0;
        host.break_after = Some(2);
        assert_eq!(emu.request_run(&mut host), RunState::Paused);
        assert_eq!(emu.get_state().instructions, 7);
    }

    #[test]
    fn break_signal_handle_pauses_run() {
        struct RaiseOnThird(BreakSignal, usize);
        impl Host for RaiseOnThird {
            fn yield_now(&mut self, _state: &MachineState) -> Control {
                self.1 += 1;
                if self.1 == 3 {
                    self.0.raise();
                }
                Control::Continue
            }
        }

        let mut emu = emulator_with(&[0x00, 0x00, 0x00, 0x00, 0x76]);
        let mut host = RaiseOnThird(emu.break_signal(), 0);

        assert_eq!(emu.request_run(&mut host), RunState::Paused);
        assert_eq!(emu.get_state().pc, 3);
        assert!(!emu.break_signal().is_raised());
    }

    #[test]
    fn stale_break_does_not_stop_next_run() {
        let mut emu = emulator_with(&ADD_PROGRAM);
        emu.request_break();
        assert_eq!(emu.request_run(&mut NullHost), RunState::Halted);
    }

    #[test]
    fn unsupported_opcode_pauses_run_and_notifies() {
        let mut emu = emulator_with(&[0x3E, 0x01, 0xFF, 0x3E, 0x02, 0x76]);
        let mut host = RecordingHost::default();

        assert_eq!(emu.request_run(&mut host), RunState::Paused);
        assert_eq!(host.unsupported, vec![(0xFF, 0x0002)]);
        assert_eq!(emu.get_state().pc, 3);
        assert_eq!(emu.get_state().a, 0x01);

        // Continuing past it is up to the host.
        assert_eq!(emu.request_run(&mut host), RunState::Halted);
        assert_eq!(emu.get_state().a, 0x02);
    }

    #[test]
    fn unsupported_opcode_in_step_returns_ready() {
        let mut emu = emulator_with(&[0xFF]);
        let mut host = RecordingHost::default();
        assert_eq!(emu.request_step(&mut host), RunState::Ready);
        assert_eq!(host.unsupported.len(), 1);
        assert_eq!(emu.get_state().pc, 1);
    }

    #[test]
    fn direct_store_triggers_persist() {
        // MVI A,42; STA 2000; MOV M,A; HLT
        let program = [0x3E, 0x42, 0x32, 0x00, 0x20, 0x77, 0x76];
        let mut emu = emulator_with(&program);
        emu.set_autosave(true);
        let mut host = RecordingHost::default();

        emu.request_run(&mut host);

        assert_eq!(emu.peek(0x2000), 0x42);
        assert_eq!(host.persisted, 1);

        let mut emu = emulator_with(&program);
        emu.set_autosave(false);
        let mut host = RecordingHost::default();
        emu.request_run(&mut host);
        assert_eq!(host.persisted, 0);
    }

    #[test]
    fn poke_is_persisted_before_next_request() {
        let mut emu = emulator_with(&[0x76]);
        emu.set_autosave(true);
        emu.poke(0x2000, 0x55);
        emu.poke(0x2001, 0x66);
        let mut host = RecordingHost::default();

        assert_eq!(emu.request_run(&mut host), RunState::Halted);
        assert_eq!(host.persisted, 1);

        // Flushed once, even into a halted machine.
        emu.poke(0x2002, 0x77);
        assert_eq!(emu.request_step(&mut host), RunState::Halted);
        assert_eq!(emu.request_step(&mut host), RunState::Halted);
        assert_eq!(host.persisted, 2);
    }

    #[test]
    fn poke_without_autosave_is_not_persisted() {
        let mut emu = emulator_with(&[0x76]);
        emu.set_autosave(false);
        emu.poke(0x2000, 0x55);
        let mut host = RecordingHost::default();
        emu.request_run(&mut host);
        assert_eq!(host.persisted, 0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut emu = emulator_with(&ADD_PROGRAM);
        emu.request_run(&mut NullHost);

        emu.request_reset();

        assert_eq!(emu.run_state(), RunState::Ready);
        assert_eq!(emu.get_state().a, 0);
        assert_eq!(emu.get_state().pc, 0);
        assert!(!emu.get_state().halted);
        assert!(emu.persist().iter().all(|&b| b == 0));
    }

    #[test]
    fn restore_accepts_full_buffer() {
        let mut emu = Emulator::new();
        let mut image = vec![0u8; MEMORY_SIZE];
        image[0x4000] = 0x5A;

        emu.restore(Some(&image));

        assert_eq!(emu.peek(0x4000), 0x5A);
        assert_eq!(emu.persist(), image);
    }

    #[test]
    fn restore_malformed_falls_back_to_zero() {
        let mut emu = emulator_with(&ADD_PROGRAM);
        emu.restore(Some(&[1, 2, 3]));
        assert!(emu.persist().iter().all(|&b| b == 0));

        emu.poke(0x10, 0x99);
        emu.restore(None);
        assert_eq!(emu.peek(0x10), 0);
    }

    #[test]
    fn restore_fallback_keeps_ports() {
        let mut emu = emulator_with(&[0x3E, 0x21, 0xD3, 0x04, 0x76]);
        emu.set_input_port(0x09, 0xA5);
        emu.request_run(&mut NullHost);

        emu.restore(Some(&[0xEE; 16]));
        emu.restore(None);

        assert!(emu.persist().iter().all(|&b| b == 0));
        assert_eq!(emu.output_port(0x04), 0x21);
        assert_eq!(emu.memory().input_port(0x09), 0xA5);
    }

    #[test]
    fn load_rejects_overflowing_image() {
        let mut emu = Emulator::new();
        let err = emu.load(&[1, 2, 3], 0xFFFE).unwrap_err();
        assert!(matches!(err, Error::ImageTooLarge { at: 0xFFFE, len: 3 }));
        assert_eq!(emu.peek(0xFFFE), 0);

        emu.load(&[1, 2], 0xFFFE).unwrap();
        assert_eq!(emu.peek(0xFFFF), 2);
    }

    #[test]
    fn peek_poke() {
        let mut emu = Emulator::new();
        emu.poke(0xFFFF, 0x12);
        assert_eq!(emu.peek(0xFFFF), 0x12);
    }

    #[test]
    fn ports_visible_to_program() {
        // IN 01; OUT 02; HLT
        let mut emu = emulator_with(&[0xDB, 0x01, 0xD3, 0x02, 0x76]);
        emu.set_input_port(0x01, 0x3C);
        emu.request_run(&mut NullHost);
        assert_eq!(emu.output_port(0x02), 0x3C);
    }

    #[test]
    fn save_state_round_trip() {
        let mut emu = emulator_with(&ADD_PROGRAM);
        emu.request_step(&mut NullHost);
        emu.request_step(&mut NullHost);
        let snapshot = emu.save_state();

        emu.request_run(&mut NullHost);
        assert_eq!(emu.run_state(), RunState::Halted);

        emu.load_state(&snapshot).unwrap();
        assert_eq!(emu.run_state(), RunState::Ready);
        assert_eq!(emu.get_state().pc, 4);
        assert_eq!(emu.get_state().b, 0x03);

        assert_eq!(emu.request_run(&mut NullHost), RunState::Halted);
        assert_eq!(emu.get_state().a, 0x08);
    }

    #[test]
    fn state_display_lists_registers_and_flags() {
        let mut emu = emulator_with(&ADD_PROGRAM);
        emu.request_run(&mut NullHost);
        let text = emu.get_state().to_string();
        assert!(text.contains("A=08"));
        assert!(text.contains("PC=0006"));
        assert!(text.contains("halted=true"));
    }
}
