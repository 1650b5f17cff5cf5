//! Mnemonic rendering for trace output and the CLI.

use crate::cpu::decode::{decode, AluOp, Operation, RotateKind, Source};
use crate::cpu_bus::CpuBus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembly {
    pub addr: u16,
    pub bytes: Vec<u8>,
    pub text: String,
}

impl std::fmt::Display for Disassembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex = self
            .bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{:04X}: {:<8}  {}", self.addr, hex, self.text)
    }
}

fn alu_mnemonic(op: AluOp, immediate: bool) -> &'static str {
    match (op, immediate) {
        (AluOp::Add, false) => "ADD",
        (AluOp::AddWithCarry, false) => "ADC",
        (AluOp::Sub, false) => "SUB",
        (AluOp::SubWithBorrow, false) => "SBB",
        (AluOp::And, false) => "ANA",
        (AluOp::Xor, false) => "XRA",
        (AluOp::Or, false) => "ORA",
        (AluOp::Compare, false) => "CMP",
        (AluOp::Add, true) => "ADI",
        (AluOp::AddWithCarry, true) => "ACI",
        (AluOp::Sub, true) => "SUI",
        (AluOp::SubWithBorrow, true) => "SBI",
        (AluOp::And, true) => "ANI",
        (AluOp::Xor, true) => "XRI",
        (AluOp::Or, true) => "ORI",
        (AluOp::Compare, true) => "CPI",
    }
}

/// Render one instruction from its opcode and the operand bytes that follow
/// it. Undefined opcodes render as a data byte.
pub fn format_instruction(opcode: u8, operand: &[u8]) -> String {
    let Some(instruction) = decode(opcode) else {
        return format!("DB {:02X}H", opcode);
    };
    let byte = operand.first().copied().unwrap_or(0);
    let word = match operand {
        [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
        [lo] => *lo as u16,
        [] => 0,
    };
    let imm8 = format!("{:02X}H", byte);
    let imm16 = format!("{:04X}H", word);

    match instruction.op {
        Operation::Nop => "NOP".into(),
        Operation::Halt => "HLT".into(),
        Operation::Move { dst, src } => format!("MOV {},{}", dst.name(), src.name()),
        Operation::MoveImmediate(reg) => format!("MVI {},{}", reg.name(), imm8),
        Operation::LoadPairImmediate(pair) => format!("LXI {},{}", pair.name(), imm16),
        Operation::LoadDirect => format!("LDA {}", imm16),
        Operation::StoreDirect => format!("STA {}", imm16),
        Operation::LoadHlDirect => format!("LHLD {}", imm16),
        Operation::StoreHlDirect => format!("SHLD {}", imm16),
        Operation::LoadIndirect(pair) => format!("LDAX {}", pair.name()),
        Operation::StoreIndirect(pair) => format!("STAX {}", pair.name()),
        Operation::ExchangeDeHl => "XCHG".into(),
        Operation::Alu(op, Source::Reg(reg)) => format!("{} {}", alu_mnemonic(op, false), reg.name()),
        Operation::Alu(op, Source::Immediate) => format!("{} {}", alu_mnemonic(op, true), imm8),
        Operation::Increment(reg) => format!("INR {}", reg.name()),
        Operation::Decrement(reg) => format!("DCR {}", reg.name()),
        Operation::IncrementPair(pair) => format!("INX {}", pair.name()),
        Operation::DecrementPair(pair) => format!("DCX {}", pair.name()),
        Operation::AddPair(pair) => format!("DAD {}", pair.name()),
        Operation::DecimalAdjust => "DAA".into(),
        Operation::Complement => "CMA".into(),
        Operation::SetCarry => "STC".into(),
        Operation::ComplementCarry => "CMC".into(),
        Operation::Rotate(RotateKind::Left) => "RLC".into(),
        Operation::Rotate(RotateKind::Right) => "RRC".into(),
        Operation::Rotate(RotateKind::LeftThroughCarry) => "RAL".into(),
        Operation::Rotate(RotateKind::RightThroughCarry) => "RAR".into(),
        Operation::Jump(None) => format!("JMP {}", imm16),
        Operation::Jump(Some(cond)) => format!("J{} {}", cond.suffix(), imm16),
        Operation::Call(None) => format!("CALL {}", imm16),
        Operation::Call(Some(cond)) => format!("C{} {}", cond.suffix(), imm16),
        Operation::Return(None) => "RET".into(),
        Operation::Return(Some(cond)) => format!("R{}", cond.suffix()),
        Operation::JumpHl => "PCHL".into(),
        Operation::Push(pair) => format!("PUSH {}", pair.name()),
        Operation::Pop(pair) => format!("POP {}", pair.name()),
        Operation::ExchangeStackHl => "XTHL".into(),
        Operation::LoadSpHl => "SPHL".into(),
        Operation::Input => format!("IN {}", imm8),
        Operation::Output => format!("OUT {}", imm8),
        Operation::EnableInterrupts => "EI".into(),
        Operation::DisableInterrupts => "DI".into(),
    }
}

/// Disassemble the instruction at `addr`. Reads go through the bus, so
/// operands wrap past 0xFFFF like fetches do.
pub fn disassemble(bus: &mut dyn CpuBus, addr: u16) -> Disassembly {
    let opcode = bus.read_u8(addr);
    let len = decode(opcode).map(|i| i.len()).unwrap_or(1);
    let bytes: Vec<u8> = (0..len)
        .map(|i| bus.read_u8(addr.wrapping_add(i)))
        .collect();
    let text = format_instruction(opcode, &bytes[1..]);
    Disassembly { addr, bytes, text }
}

/// Disassemble `count` consecutive instructions starting at `addr`.
pub fn disassemble_range(bus: &mut dyn CpuBus, addr: u16, count: usize) -> Vec<Disassembly> {
    let mut out = Vec::with_capacity(count);
    let mut pc = addr;
    for _ in 0..count {
        let line = disassemble(bus, pc);
        pc = pc.wrapping_add(line.bytes.len() as u16);
        out.push(line);
    }
    out
}
