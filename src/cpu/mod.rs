use bitflags::bitflags;

use crate::cpu_bus::CpuBus;
use crate::error::CpuError;
use crate::savestate::CpuSaveState;

pub mod alu;
pub mod decode;

use decode::{decode, AluOp, Instruction, Mode, Operation, Pair, Reg, Source, StackPair};


bitflags! {
    /// Flag bits at their positions in the PSW byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusFlags: u8 {
        const CARRY = 0b0000_0001;
        const PARITY = 0b0000_0100;
        const AUX_CARRY = 0b0001_0000;
        const ZERO = 0b0100_0000;
        const SIGN = 0b1000_0000;
    }
}

/// Bit 1 of the PSW flag byte reads back as 1 on the 8080/8085.
const PSW_FIXED_BITS: u8 = 0b0000_0010;
pub const RESET_SP: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Continue,
    Halted,
}

/// What a single `Cpu::step` did.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub pc: u16,
    pub opcode: u8,
    pub instruction: Instruction,
    pub signal: Signal,
    /// Set by the direct-address stores (STA, SHLD).
    pub dirty: bool,
}

#[derive(Debug, Clone, Copy)]
enum Operand {
    None,
    Byte(u8),
    Word(u16),
}

impl Operand {
    fn byte(self) -> u8 {
        match self {
            Operand::Byte(b) => b,
            Operand::Word(w) => w as u8,
            Operand::None => 0,
        }
    }

    fn word(self) -> u16 {
        match self {
            Operand::Word(w) => w,
            Operand::Byte(b) => b as u16,
            Operand::None => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub a: u8, // Accumulator
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16, // Stack pointer
    pub pc: u16, // Program counter
    pub flags: StatusFlags,
    pub halted: bool,
    /// Latched by EI/DI. Nothing delivers interrupts.
    pub interrupts_enabled: bool,
    instructions: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            a: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: RESET_SP,
            pc: 0,
            flags: StatusFlags::empty(),
            halted: false,
            interrupts_enabled: false,
            instructions: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Cpu::new();
    }

    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    pub fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }

    pub fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    pub fn set_bc(&mut self, value: u16) {
        self.b = (value >> 8) as u8;
        self.c = value as u8;
    }

    pub fn set_de(&mut self, value: u16) {
        self.d = (value >> 8) as u8;
        self.e = value as u8;
    }

    pub fn set_hl(&mut self, value: u16) {
        self.h = (value >> 8) as u8;
        self.l = value as u8;
    }

    pub fn pair(&self, pair: Pair) -> u16 {
        match pair {
            Pair::BC => self.bc(),
            Pair::DE => self.de(),
            Pair::HL => self.hl(),
            Pair::SP => self.sp,
        }
    }

    pub fn set_pair(&mut self, pair: Pair, value: u16) {
        match pair {
            Pair::BC => self.set_bc(value),
            Pair::DE => self.set_de(value),
            Pair::HL => self.set_hl(value),
            Pair::SP => self.sp = value,
        }
    }

    /// Accumulator in the high byte, flag byte in the low byte.
    pub fn psw(&self) -> u16 {
        (self.a as u16) << 8 | (self.flags.bits() | PSW_FIXED_BITS) as u16
    }

    pub fn flag(&self, flag: StatusFlags) -> bool {
        self.flags.contains(flag)
    }

    // Save state methods
    pub fn to_save_state(&self) -> CpuSaveState {
        CpuSaveState {
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            e: self.e,
            h: self.h,
            l: self.l,
            sp: self.sp,
            pc: self.pc,
            flags: self.flags.bits(),
            halted: self.halted,
            interrupts_enabled: self.interrupts_enabled,
            instructions: self.instructions,
        }
    }

    pub fn load_from_save_state(&mut self, state: &CpuSaveState) {
        self.a = state.a;
        self.b = state.b;
        self.c = state.c;
        self.d = state.d;
        self.e = state.e;
        self.h = state.h;
        self.l = state.l;
        self.sp = state.sp;
        self.pc = state.pc;
        self.flags = StatusFlags::from_bits_truncate(state.flags);
        self.halted = state.halted;
        self.interrupts_enabled = state.interrupts_enabled;
        self.instructions = state.instructions;
    }

    fn read_reg(&self, bus: &mut dyn CpuBus, reg: Reg) -> u8 {
        match reg {
            Reg::B => self.b,
            Reg::C => self.c,
            Reg::D => self.d,
            Reg::E => self.e,
            Reg::H => self.h,
            Reg::L => self.l,
            Reg::M => bus.read_u8(self.hl()),
            Reg::A => self.a,
        }
    }

    fn write_reg(&mut self, bus: &mut dyn CpuBus, reg: Reg, value: u8) {
        match reg {
            Reg::B => self.b = value,
            Reg::C => self.c = value,
            Reg::D => self.d = value,
            Reg::E => self.e = value,
            Reg::H => self.h = value,
            Reg::L => self.l = value,
            Reg::M => bus.write_u8(self.hl(), value),
            Reg::A => self.a = value,
        }
    }

    fn stack_pair(&self, pair: StackPair) -> u16 {
        match pair {
            StackPair::BC => self.bc(),
            StackPair::DE => self.de(),
            StackPair::HL => self.hl(),
            StackPair::PSW => self.psw(),
        }
    }

    /// Fetch, decode and execute one instruction.
    ///
    /// An undefined opcode leaves PC one past the opcode byte and changes
    /// nothing else.
    pub fn step(&mut self, bus: &mut dyn CpuBus) -> Result<Step, CpuError> {
        let pc = self.pc;
        let opcode = self.read_byte(bus);
        let instruction = decode(opcode).ok_or(CpuError::UnsupportedOpcode { opcode, pc })?;

        let operand = self.read_operand(bus, instruction.mode);
        let (signal, dirty) = self.execute(bus, instruction, operand);
        self.instructions = self.instructions.wrapping_add(1);

        Ok(Step {
            pc,
            opcode,
            instruction,
            signal,
            dirty,
        })
    }

    fn read_byte(&mut self, bus: &mut dyn CpuBus) -> u8 {
        let byte = bus.read_u8(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn read_word(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let low = self.read_byte(bus) as u16;
        let high = self.read_byte(bus) as u16;
        (high << 8) | low
    }

    fn read_operand(&mut self, bus: &mut dyn CpuBus, mode: Mode) -> Operand {
        match mode.operand_len() {
            1 => Operand::Byte(self.read_byte(bus)),
            2 => Operand::Word(self.read_word(bus)),
            _ => Operand::None,
        }
    }

    fn push(&mut self, bus: &mut dyn CpuBus, value: u16) {
        self.sp = self.sp.wrapping_sub(1);
        bus.write_u8(self.sp, (value >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        bus.write_u8(self.sp, value as u8);
    }

    fn pop(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let low = bus.read_u8(self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        let high = bus.read_u8(self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        (high << 8) | low
    }

    fn accumulate(&mut self, op: AluOp, value: u8) -> StatusFlags {
        let carry = self.flags.contains(StatusFlags::CARRY);
        let (result, flags) = match op {
            AluOp::Add => alu::add(self.a, value, false),
            AluOp::AddWithCarry => alu::add(self.a, value, carry),
            AluOp::Sub | AluOp::Compare => alu::sub(self.a, value, false),
            AluOp::SubWithBorrow => alu::sub(self.a, value, carry),
            AluOp::And => alu::and(self.a, value),
            AluOp::Xor => alu::xor(self.a, value),
            AluOp::Or => alu::or(self.a, value),
        };
        if op != AluOp::Compare {
            self.a = result;
        }
        flags
    }

    fn execute(
        &mut self,
        bus: &mut dyn CpuBus,
        instruction: Instruction,
        operand: Operand,
    ) -> (Signal, bool) {
        let mut signal = Signal::Continue;
        let mut dirty = false;
        let mut computed = StatusFlags::empty();

        match instruction.op {
            Operation::Nop => {}
            Operation::Halt => {
                self.halted = true;
                signal = Signal::Halted;
            }

            Operation::Move { dst, src } => {
                let value = self.read_reg(bus, src);
                self.write_reg(bus, dst, value);
            }
            Operation::MoveImmediate(reg) => self.write_reg(bus, reg, operand.byte()),
            Operation::LoadPairImmediate(pair) => self.set_pair(pair, operand.word()),
            Operation::LoadDirect => self.a = bus.read_u8(operand.word()),
            Operation::StoreDirect => {
                bus.write_u8(operand.word(), self.a);
                dirty = true;
            }
            Operation::LoadHlDirect => {
                let value = bus.read_u16(operand.word());
                self.set_hl(value);
            }
            Operation::StoreHlDirect => {
                bus.write_u16(operand.word(), self.hl());
                dirty = true;
            }
            Operation::LoadIndirect(pair) => self.a = bus.read_u8(self.pair(pair)),
            Operation::StoreIndirect(pair) => bus.write_u8(self.pair(pair), self.a),
            Operation::ExchangeDeHl => {
                std::mem::swap(&mut self.d, &mut self.h);
                std::mem::swap(&mut self.e, &mut self.l);
            }

            Operation::Alu(op, source) => {
                let value = match source {
                    Source::Reg(reg) => self.read_reg(bus, reg),
                    Source::Immediate => operand.byte(),
                };
                computed = self.accumulate(op, value);
            }
            Operation::Increment(reg) => {
                let (value, flags) = alu::increment(self.read_reg(bus, reg));
                self.write_reg(bus, reg, value);
                computed = flags;
            }
            Operation::Decrement(reg) => {
                let (value, flags) = alu::decrement(self.read_reg(bus, reg));
                self.write_reg(bus, reg, value);
                computed = flags;
            }
            Operation::IncrementPair(pair) => {
                self.set_pair(pair, self.pair(pair).wrapping_add(1));
            }
            Operation::DecrementPair(pair) => {
                self.set_pair(pair, self.pair(pair).wrapping_sub(1));
            }
            Operation::AddPair(pair) => {
                let (value, carry) = alu::add_word(self.hl(), self.pair(pair));
                self.set_hl(value);
                computed.set(StatusFlags::CARRY, carry);
            }
            Operation::DecimalAdjust => {
                let (value, flags) = alu::decimal_adjust(self.a, self.flags);
                self.a = value;
                computed = flags;
            }
            Operation::Complement => self.a = !self.a,
            Operation::SetCarry => computed = StatusFlags::CARRY,
            Operation::ComplementCarry => {
                computed.set(StatusFlags::CARRY, !self.flags.contains(StatusFlags::CARRY));
            }
            Operation::Rotate(kind) => {
                let carry = self.flags.contains(StatusFlags::CARRY);
                let (value, carry_out) = alu::rotate(kind, self.a, carry);
                self.a = value;
                computed.set(StatusFlags::CARRY, carry_out);
            }

            // The address operand has already been consumed whether or not
            // the condition holds.
            Operation::Jump(cond) => {
                if cond.map_or(true, |c| c.holds(self.flags)) {
                    self.pc = operand.word();
                }
            }
            Operation::Call(cond) => {
                if cond.map_or(true, |c| c.holds(self.flags)) {
                    let return_addr = self.pc;
                    self.push(bus, return_addr);
                    self.pc = operand.word();
                }
            }
            Operation::Return(cond) => {
                if cond.map_or(true, |c| c.holds(self.flags)) {
                    self.pc = self.pop(bus);
                }
            }
            Operation::JumpHl => self.pc = self.hl(),

            Operation::Push(pair) => {
                let value = self.stack_pair(pair);
                self.push(bus, value);
            }
            Operation::Pop(pair) => {
                let value = self.pop(bus);
                match pair {
                    StackPair::BC => self.set_bc(value),
                    StackPair::DE => self.set_de(value),
                    StackPair::HL => self.set_hl(value),
                    StackPair::PSW => {
                        self.a = (value >> 8) as u8;
                        computed = StatusFlags::from_bits_truncate(value as u8);
                    }
                }
            }
            Operation::ExchangeStackHl => {
                let top = bus.read_u16(self.sp);
                bus.write_u16(self.sp, self.hl());
                self.set_hl(top);
            }
            Operation::LoadSpHl => self.sp = self.hl(),

            Operation::Input => self.a = bus.port_in(operand.byte()),
            Operation::Output => bus.port_out(operand.byte(), self.a),
            Operation::EnableInterrupts => self.interrupts_enabled = true,
            Operation::DisableInterrupts => self.interrupts_enabled = false,
        }

        let affects = instruction.affects;
        self.flags = (self.flags - affects) | (computed & affects);
        (signal, dirty)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
