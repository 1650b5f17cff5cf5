//! Opcode descriptor table.
//!
//! Every opcode maps to at most one [`Instruction`]: the operation to
//! perform, the addressing mode that decides how many operand bytes follow
//! the opcode, and the set of flags the operation is allowed to touch.
//! The table is built at compile time from the 8085 encoding groups.

use super::StatusFlags;

/// 8-bit operand selector in encoding order. `M` is memory at HL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    B,
    C,
    D,
    E,
    H,
    L,
    M,
    A,
}

impl Reg {
    pub const fn from_bits(bits: u8) -> Reg {
        match bits & 0x07 {
            0 => Reg::B,
            1 => Reg::C,
            2 => Reg::D,
            3 => Reg::E,
            4 => Reg::H,
            5 => Reg::L,
            6 => Reg::M,
            _ => Reg::A,
        }
    }

    pub const fn is_memory(self) -> bool {
        matches!(self, Reg::M)
    }

    pub fn name(self) -> &'static str {
        match self {
            Reg::B => "B",
            Reg::C => "C",
            Reg::D => "D",
            Reg::E => "E",
            Reg::H => "H",
            Reg::L => "L",
            Reg::M => "M",
            Reg::A => "A",
        }
    }
}

/// Register pair used by LXI, INX, DCX, DAD, LDAX and STAX.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pair {
    BC,
    DE,
    HL,
    SP,
}

impl Pair {
    pub const fn from_bits(bits: u8) -> Pair {
        match bits & 0x03 {
            0 => Pair::BC,
            1 => Pair::DE,
            2 => Pair::HL,
            _ => Pair::SP,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Pair::BC => "B",
            Pair::DE => "D",
            Pair::HL => "H",
            Pair::SP => "SP",
        }
    }
}

/// Register pair as seen by PUSH and POP, where SP's slot holds A + flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackPair {
    BC,
    DE,
    HL,
    PSW,
}

impl StackPair {
    pub const fn from_bits(bits: u8) -> StackPair {
        match bits & 0x03 {
            0 => StackPair::BC,
            1 => StackPair::DE,
            2 => StackPair::HL,
            _ => StackPair::PSW,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StackPair::BC => "B",
            StackPair::DE => "D",
            StackPair::HL => "H",
            StackPair::PSW => "PSW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    NotZero,
    Zero,
    NoCarry,
    Carry,
    ParityOdd,
    ParityEven,
    Plus,
    Minus,
}

impl Condition {
    pub const fn from_bits(bits: u8) -> Condition {
        match bits & 0x07 {
            0 => Condition::NotZero,
            1 => Condition::Zero,
            2 => Condition::NoCarry,
            3 => Condition::Carry,
            4 => Condition::ParityOdd,
            5 => Condition::ParityEven,
            6 => Condition::Plus,
            _ => Condition::Minus,
        }
    }

    pub fn holds(self, flags: StatusFlags) -> bool {
        match self {
            Condition::NotZero => !flags.contains(StatusFlags::ZERO),
            Condition::Zero => flags.contains(StatusFlags::ZERO),
            Condition::NoCarry => !flags.contains(StatusFlags::CARRY),
            Condition::Carry => flags.contains(StatusFlags::CARRY),
            Condition::ParityOdd => !flags.contains(StatusFlags::PARITY),
            Condition::ParityEven => flags.contains(StatusFlags::PARITY),
            Condition::Plus => !flags.contains(StatusFlags::SIGN),
            Condition::Minus => flags.contains(StatusFlags::SIGN),
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Condition::NotZero => "NZ",
            Condition::Zero => "Z",
            Condition::NoCarry => "NC",
            Condition::Carry => "C",
            Condition::ParityOdd => "PO",
            Condition::ParityEven => "PE",
            Condition::Plus => "P",
            Condition::Minus => "M",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    AddWithCarry,
    Sub,
    SubWithBorrow,
    And,
    Xor,
    Or,
    Compare,
}

impl AluOp {
    pub const fn from_bits(bits: u8) -> AluOp {
        match bits & 0x07 {
            0 => AluOp::Add,
            1 => AluOp::AddWithCarry,
            2 => AluOp::Sub,
            3 => AluOp::SubWithBorrow,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Compare,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateKind {
    Left,
    Right,
    LeftThroughCarry,
    RightThroughCarry,
}

/// Where the second operand of an accumulator operation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Reg(Reg),
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Nop,
    Halt,
    Move { dst: Reg, src: Reg },
    MoveImmediate(Reg),
    LoadPairImmediate(Pair),
    LoadDirect,
    StoreDirect,
    LoadHlDirect,
    StoreHlDirect,
    LoadIndirect(Pair),
    StoreIndirect(Pair),
    ExchangeDeHl,
    Alu(AluOp, Source),
    Increment(Reg),
    Decrement(Reg),
    IncrementPair(Pair),
    DecrementPair(Pair),
    AddPair(Pair),
    DecimalAdjust,
    Complement,
    SetCarry,
    ComplementCarry,
    Rotate(RotateKind),
    Jump(Option<Condition>),
    Call(Option<Condition>),
    Return(Option<Condition>),
    JumpHl,
    Push(StackPair),
    Pop(StackPair),
    ExchangeStackHl,
    LoadSpHl,
    Input,
    Output,
    EnableInterrupts,
    DisableInterrupts,
}

/// How the operand of an instruction is located. Fixed per opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Implied,
    Register,
    RegisterIndirect,
    Immediate8,
    Immediate16,
    Direct,
    Stack,
}

impl Mode {
    /// Operand bytes that follow the opcode.
    pub const fn operand_len(self) -> u16 {
        match self {
            Mode::Immediate8 => 1,
            Mode::Immediate16 | Mode::Direct => 2,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Operation,
    pub mode: Mode,
    pub affects: StatusFlags,
}

impl Instruction {
    const fn new(op: Operation, mode: Mode, affects: StatusFlags) -> Option<Self> {
        Some(Instruction { op, mode, affects })
    }

    /// Total encoded length including the opcode byte.
    pub const fn len(&self) -> u16 {
        1 + self.mode.operand_len()
    }
}

const NONE: StatusFlags = StatusFlags::empty();
const CARRY: StatusFlags = StatusFlags::CARRY;
const ALL: StatusFlags = StatusFlags::all();
const INC_DEC: StatusFlags = StatusFlags::from_bits_retain(
    StatusFlags::SIGN.bits()
        | StatusFlags::ZERO.bits()
        | StatusFlags::AUX_CARRY.bits()
        | StatusFlags::PARITY.bits(),
);

pub static OPCODE_TABLE: [Option<Instruction>; 256] = build_table();

/// Look up the descriptor for `opcode`. `None` means the slot is undefined
/// or deliberately not emulated.
pub fn decode(opcode: u8) -> Option<Instruction> {
    OPCODE_TABLE[opcode as usize]
}

const fn build_table() -> [Option<Instruction>; 256] {
    let mut table = [None; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = describe(i as u8);
        i += 1;
    }
    table
}

const fn reg_mode(r: Reg) -> Mode {
    if r.is_memory() {
        Mode::RegisterIndirect
    } else {
        Mode::Register
    }
}

const fn describe(opcode: u8) -> Option<Instruction> {
    use Operation as Op;

    match opcode {
        0x00 => Instruction::new(Op::Nop, Mode::Implied, NONE),
        0x76 => Instruction::new(Op::Halt, Mode::Implied, NONE),

        0x02 => Instruction::new(Op::StoreIndirect(Pair::BC), Mode::RegisterIndirect, NONE),
        0x12 => Instruction::new(Op::StoreIndirect(Pair::DE), Mode::RegisterIndirect, NONE),
        0x0A => Instruction::new(Op::LoadIndirect(Pair::BC), Mode::RegisterIndirect, NONE),
        0x1A => Instruction::new(Op::LoadIndirect(Pair::DE), Mode::RegisterIndirect, NONE),
        0x22 => Instruction::new(Op::StoreHlDirect, Mode::Direct, NONE),
        0x2A => Instruction::new(Op::LoadHlDirect, Mode::Direct, NONE),
        0x32 => Instruction::new(Op::StoreDirect, Mode::Direct, NONE),
        0x3A => Instruction::new(Op::LoadDirect, Mode::Direct, NONE),

        0x07 => Instruction::new(Op::Rotate(RotateKind::Left), Mode::Implied, CARRY),
        0x0F => Instruction::new(Op::Rotate(RotateKind::Right), Mode::Implied, CARRY),
        0x17 => Instruction::new(Op::Rotate(RotateKind::LeftThroughCarry), Mode::Implied, CARRY),
        0x1F => Instruction::new(Op::Rotate(RotateKind::RightThroughCarry), Mode::Implied, CARRY),
        0x27 => Instruction::new(Op::DecimalAdjust, Mode::Implied, ALL),
        0x2F => Instruction::new(Op::Complement, Mode::Implied, NONE),
        0x37 => Instruction::new(Op::SetCarry, Mode::Implied, CARRY),
        0x3F => Instruction::new(Op::ComplementCarry, Mode::Implied, CARRY),

        0xC3 => Instruction::new(Op::Jump(None), Mode::Immediate16, NONE),
        0xC9 => Instruction::new(Op::Return(None), Mode::Stack, NONE),
        0xCD => Instruction::new(Op::Call(None), Mode::Immediate16, NONE),
        0xD3 => Instruction::new(Op::Output, Mode::Immediate8, NONE),
        0xDB => Instruction::new(Op::Input, Mode::Immediate8, NONE),
        0xE3 => Instruction::new(Op::ExchangeStackHl, Mode::Stack, NONE),
        0xE9 => Instruction::new(Op::JumpHl, Mode::Register, NONE),
        0xEB => Instruction::new(Op::ExchangeDeHl, Mode::Register, NONE),
        0xF3 => Instruction::new(Op::DisableInterrupts, Mode::Implied, NONE),
        0xF9 => Instruction::new(Op::LoadSpHl, Mode::Register, NONE),
        0xFB => Instruction::new(Op::EnableInterrupts, Mode::Implied, NONE),

        0x40..=0x7F => {
            let dst = Reg::from_bits(opcode >> 3);
            let src = Reg::from_bits(opcode);
            let mode = if dst.is_memory() || src.is_memory() {
                Mode::RegisterIndirect
            } else {
                Mode::Register
            };
            Instruction::new(Op::Move { dst, src }, mode, NONE)
        }
        0x80..=0xBF => {
            let src = Reg::from_bits(opcode);
            Instruction::new(
                Op::Alu(AluOp::from_bits(opcode >> 3), Source::Reg(src)),
                reg_mode(src),
                ALL,
            )
        }

        op if op < 0x40 => match op & 0x0F {
            0x01 => Instruction::new(Op::LoadPairImmediate(Pair::from_bits(op >> 4)), Mode::Immediate16, NONE),
            0x03 => Instruction::new(Op::IncrementPair(Pair::from_bits(op >> 4)), Mode::Register, NONE),
            0x09 => Instruction::new(Op::AddPair(Pair::from_bits(op >> 4)), Mode::Register, CARRY),
            0x0B => Instruction::new(Op::DecrementPair(Pair::from_bits(op >> 4)), Mode::Register, NONE),
            _ => match op & 0x07 {
                0x04 => {
                    let r = Reg::from_bits(op >> 3);
                    Instruction::new(Op::Increment(r), reg_mode(r), INC_DEC)
                }
                0x05 => {
                    let r = Reg::from_bits(op >> 3);
                    Instruction::new(Op::Decrement(r), reg_mode(r), INC_DEC)
                }
                0x06 => Instruction::new(Op::MoveImmediate(Reg::from_bits(op >> 3)), Mode::Immediate8, NONE),
                // 0x08 0x10 0x18 0x20 (RIM) 0x28 0x30 (SIM) 0x38
                _ => None,
            },
        },

        op => match op & 0x07 {
            0x00 => Instruction::new(Op::Return(Some(Condition::from_bits(op >> 3))), Mode::Stack, NONE),
            0x02 => Instruction::new(Op::Jump(Some(Condition::from_bits(op >> 3))), Mode::Immediate16, NONE),
            0x04 => Instruction::new(Op::Call(Some(Condition::from_bits(op >> 3))), Mode::Immediate16, NONE),
            0x06 => Instruction::new(Op::Alu(AluOp::from_bits(op >> 3), Source::Immediate), Mode::Immediate8, ALL),
            0x01 if op & 0x08 == 0 => {
                let pair = StackPair::from_bits(op >> 4);
                let affects = if matches!(pair, StackPair::PSW) { ALL } else { NONE };
                Instruction::new(Op::Pop(pair), Mode::Stack, affects)
            }
            0x05 if op & 0x08 == 0 => Instruction::new(Op::Push(StackPair::from_bits(op >> 4)), Mode::Stack, NONE),
            // RST n and the unused slots 0xCB 0xD9 0xDD 0xED 0xFD
            _ => None,
        },
    }
}
