//! Flag arithmetic shared by every instruction family.
//!
//! Each function returns the result and the full set of flags the family
//! computes; the executor masks that set with the instruction's declared
//! flag effects before committing it.

use super::decode::RotateKind;
use super::StatusFlags;

#[inline]
pub fn parity_even(value: u8) -> bool {
    value.count_ones() % 2 == 0
}

/// Zero, sign and parity of a result byte.
pub fn szp(value: u8) -> StatusFlags {
    let mut flags = StatusFlags::empty();
    flags.set(StatusFlags::ZERO, value == 0);
    flags.set(StatusFlags::SIGN, value & 0x80 != 0);
    flags.set(StatusFlags::PARITY, parity_even(value));
    flags
}

pub fn add(a: u8, b: u8, carry_in: bool) -> (u8, StatusFlags) {
    let cin = carry_in as u16;
    let wide = a as u16 + b as u16 + cin;
    let result = wide as u8;
    let mut flags = szp(result);
    flags.set(StatusFlags::CARRY, wide > 0xFF);
    flags.set(
        StatusFlags::AUX_CARRY,
        (a & 0x0F) as u16 + (b & 0x0F) as u16 + cin > 0x0F,
    );
    (result, flags)
}

/// `a - b - borrow_in`. CY is set when the true difference is negative,
/// AC when the low nibble had to borrow from bit 4.
pub fn sub(a: u8, b: u8, borrow_in: bool) -> (u8, StatusFlags) {
    let bin = borrow_in as i16;
    let wide = a as i16 - b as i16 - bin;
    let result = wide as u8;
    let mut flags = szp(result);
    flags.set(StatusFlags::CARRY, wide < 0);
    flags.set(
        StatusFlags::AUX_CARRY,
        ((a & 0x0F) as i16) - ((b & 0x0F) as i16) - bin < 0,
    );
    (result, flags)
}

pub fn and(a: u8, b: u8) -> (u8, StatusFlags) {
    let result = a & b;
    // 8085 ANA/ANI always set AC and clear CY.
    (result, szp(result) | StatusFlags::AUX_CARRY)
}

pub fn xor(a: u8, b: u8) -> (u8, StatusFlags) {
    let result = a ^ b;
    (result, szp(result))
}

pub fn or(a: u8, b: u8) -> (u8, StatusFlags) {
    let result = a | b;
    (result, szp(result))
}

pub fn increment(value: u8) -> (u8, StatusFlags) {
    let result = value.wrapping_add(1);
    let mut flags = szp(result);
    flags.set(StatusFlags::AUX_CARRY, value & 0x0F == 0x0F);
    (result, flags)
}

pub fn decrement(value: u8) -> (u8, StatusFlags) {
    let result = value.wrapping_sub(1);
    let mut flags = szp(result);
    flags.set(StatusFlags::AUX_CARRY, value & 0x0F == 0x00);
    (result, flags)
}

/// Rotate the accumulator one bit. Returns the new value and the new carry.
pub fn rotate(kind: RotateKind, a: u8, carry: bool) -> (u8, bool) {
    match kind {
        RotateKind::Left => (a.rotate_left(1), a & 0x80 != 0),
        RotateKind::Right => (a.rotate_right(1), a & 0x01 != 0),
        RotateKind::LeftThroughCarry => ((a << 1) | carry as u8, a & 0x80 != 0),
        RotateKind::RightThroughCarry => ((a >> 1) | ((carry as u8) << 7), a & 0x01 != 0),
    }
}

/// Sum of HL and another pair in a 17-bit temporary.
pub fn add_word(hl: u16, value: u16) -> (u16, bool) {
    let wide = hl as u32 + value as u32;
    (wide as u16, wide > 0xFFFF)
}

pub fn decimal_adjust(a: u8, flags: StatusFlags) -> (u8, StatusFlags) {
    let low = a & 0x0F;
    let mut correction = 0u8;
    let mut carry = flags.contains(StatusFlags::CARRY);

    if low > 9 || flags.contains(StatusFlags::AUX_CARRY) {
        correction |= 0x06;
    }
    if a > 0x99 || carry {
        correction |= 0x60;
        carry = true;
    }

    let result = a.wrapping_add(correction);
    let mut out = szp(result);
    out.set(StatusFlags::CARRY, carry);
    out.set(StatusFlags::AUX_CARRY, low + (correction & 0x0F) > 0x0F);
    (result, out)
}

#[cfg(test)]
#[path = "alu_tests.rs"]
mod alu_tests;
