use super::*;

#[test]
fn parity_matches_popcount() {
    for v in 0..=255u8 {
        assert_eq!(parity_even(v), v.count_ones() % 2 == 0);
        assert_eq!(szp(v).contains(StatusFlags::PARITY), v.count_ones() % 2 == 0);
    }
}

#[test]
fn add_matches_wide_arithmetic() {
    for a in 0..=255u8 {
        for b in 0..=255u8 {
            for carry_in in [false, true] {
                let cin = carry_in as u16;
                let wide = a as u16 + b as u16 + cin;
                let (r, flags) = add(a, b, carry_in);
                assert_eq!(r as u16, wide % 256, "{a:02X}+{b:02X}+{cin}");
                assert_eq!(flags.contains(StatusFlags::CARRY), wide > 0xFF);
                assert_eq!(
                    flags.contains(StatusFlags::AUX_CARRY),
                    (a & 0x0F) as u16 + (b & 0x0F) as u16 + cin > 0x0F,
                    "{a:02X}+{b:02X}+{cin}"
                );
                assert_eq!(flags.contains(StatusFlags::ZERO), r == 0);
            }
        }
    }
}

#[test]
fn sub_matches_wide_arithmetic() {
    for a in 0..=255u8 {
        for b in 0..=255u8 {
            for borrow_in in [false, true] {
                let bin = borrow_in as i32;
                let wide = a as i32 - b as i32 - bin;
                let (r, flags) = sub(a, b, borrow_in);
                assert_eq!(r as i32, wide.rem_euclid(256), "{a:02X}-{b:02X}-{bin}");
                assert_eq!(flags.contains(StatusFlags::CARRY), wide < 0);
                assert_eq!(
                    flags.contains(StatusFlags::AUX_CARRY),
                    (a & 0x0F) as i32 - (b & 0x0F) as i32 - bin < 0,
                    "{a:02X}-{b:02X}-{bin}"
                );
                assert_eq!(flags.contains(StatusFlags::ZERO), r == 0);
            }
        }
    }
}

#[test]
fn increment_and_decrement_wrap_over_every_value() {
    for v in 0..=255u8 {
        let (r, flags) = increment(v);
        assert_eq!(r as u16, (v as u16 + 1) % 256);
        assert_eq!(flags.contains(StatusFlags::AUX_CARRY), v & 0x0F == 0x0F, "INR {v:02X}");
        assert_eq!(flags.contains(StatusFlags::ZERO), v == 0xFF);
        assert!(!flags.contains(StatusFlags::CARRY));

        let (r, flags) = decrement(v);
        assert_eq!(r as i16, (v as i16 - 1).rem_euclid(256));
        assert_eq!(flags.contains(StatusFlags::AUX_CARRY), v & 0x0F == 0x00, "DCR {v:02X}");
        assert_eq!(flags.contains(StatusFlags::ZERO), v == 0x01);
        assert!(!flags.contains(StatusFlags::CARRY));
    }
}

#[test]
fn add_aux_carry_from_low_nibble() {
    let (_, flags) = add(0x0F, 0x01, false);
    assert!(flags.contains(StatusFlags::AUX_CARRY));
    let (_, flags) = add(0x0E, 0x01, false);
    assert!(!flags.contains(StatusFlags::AUX_CARRY));
    let (_, flags) = add(0x0E, 0x01, true);
    assert!(flags.contains(StatusFlags::AUX_CARRY));
}

#[test]
fn add_with_carry_in_overflows() {
    let (r, flags) = add(0xFF, 0x00, true);
    assert_eq!(r, 0x00);
    assert!(flags.contains(StatusFlags::CARRY));
    assert!(flags.contains(StatusFlags::ZERO));
}

#[test]
fn sub_borrow_flags() {
    let (r, flags) = sub(0x00, 0x01, false);
    assert_eq!(r, 0xFF);
    assert!(flags.contains(StatusFlags::CARRY));
    assert!(flags.contains(StatusFlags::SIGN));
    assert!(flags.contains(StatusFlags::AUX_CARRY));

    let (r, flags) = sub(0x10, 0x0F, true);
    assert_eq!(r, 0x00);
    assert!(flags.contains(StatusFlags::ZERO));
    assert!(!flags.contains(StatusFlags::CARRY));
}

#[test]
fn logic_ops_clear_carry() {
    let (r, flags) = and(0xF0, 0x3C);
    assert_eq!(r, 0x30);
    assert!(!flags.contains(StatusFlags::CARRY));
    assert!(flags.contains(StatusFlags::AUX_CARRY));

    let (r, flags) = xor(0xAA, 0xAA);
    assert_eq!(r, 0);
    assert!(flags.contains(StatusFlags::ZERO));
    assert!(!flags.intersects(StatusFlags::CARRY | StatusFlags::AUX_CARRY));

    let (r, flags) = or(0x80, 0x01);
    assert_eq!(r, 0x81);
    assert!(flags.contains(StatusFlags::SIGN));
    assert!(flags.contains(StatusFlags::PARITY));
}

#[test]
fn increment_and_decrement_aux_carry() {
    let (r, flags) = increment(0x0F);
    assert_eq!(r, 0x10);
    assert!(flags.contains(StatusFlags::AUX_CARRY));

    let (r, flags) = increment(0xFF);
    assert_eq!(r, 0x00);
    assert!(flags.contains(StatusFlags::ZERO));
    assert!(!flags.contains(StatusFlags::CARRY));

    let (r, flags) = decrement(0x10);
    assert_eq!(r, 0x0F);
    assert!(flags.contains(StatusFlags::AUX_CARRY));

    let (_, flags) = decrement(0x11);
    assert!(!flags.contains(StatusFlags::AUX_CARRY));
}

#[test]
fn rotations() {
    assert_eq!(rotate(RotateKind::Left, 0x81, false), (0x03, true));
    assert_eq!(rotate(RotateKind::Right, 0x81, false), (0xC0, true));
    assert_eq!(rotate(RotateKind::LeftThroughCarry, 0x80, false), (0x00, true));
    assert_eq!(rotate(RotateKind::LeftThroughCarry, 0x01, true), (0x03, false));
    assert_eq!(rotate(RotateKind::RightThroughCarry, 0x01, false), (0x00, true));
    assert_eq!(rotate(RotateKind::RightThroughCarry, 0x02, true), (0x81, false));
}

#[test]
fn word_add_carry() {
    assert_eq!(add_word(0xFFFF, 0x0001), (0x0000, true));
    assert_eq!(add_word(0x1234, 0x1111), (0x2345, false));
}

#[test]
fn decimal_adjust_after_bcd_add() {
    // 0x38 + 0x45 = 0x7D -> 0x83
    let (sum, flags) = add(0x38, 0x45, false);
    let (r, flags) = decimal_adjust(sum, flags);
    assert_eq!(r, 0x83);
    assert!(!flags.contains(StatusFlags::CARRY));

    // 0x99 + 0x01 = 0x9A -> 0x00 with carry
    let (sum, flags) = add(0x99, 0x01, false);
    let (r, flags) = decimal_adjust(sum, flags);
    assert_eq!(r, 0x00);
    assert!(flags.contains(StatusFlags::CARRY));
    assert!(flags.contains(StatusFlags::ZERO));
}
