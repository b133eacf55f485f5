//! Sized 2-/4-state bit vectors (§3, "Value").
//!
//! Storage uses the standard two-plane (`aval`/`bval`) encoding that VPI
//! and most 4-state simulator kernels use, rather than a three-state
//! `enum` per bit — it keeps arithmetic on fully-defined values a plain
//! [`BigUint`] operation instead of a bit-by-bit walk:
//!
//! | aval | bval | meaning |
//! |------|------|---------|
//! |  0   |  0   | logic 0 |
//! |  1   |  0   | logic 1 |
//! |  0   |  1   | Z       |
//! |  1   |  1   | X       |
//!
//! For a 2-state value `bval` is always zero and every bit is either 0
//! or 1.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::fmt;

/// A single bit of a [`Value`], decoded out of the aval/bval planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bit {
    Zero,
    One,
    X,
    Z,
}

impl Bit {
    fn from_planes(a: bool, b: bool) -> Self {
        match (a, b) {
            (false, false) => Bit::Zero,
            (true, false) => Bit::One,
            (false, true) => Bit::Z,
            (true, true) => Bit::X,
        }
    }

    fn is_unknown(self) -> bool {
        matches!(self, Bit::X | Bit::Z)
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Bit::Zero => '0',
            Bit::One => '1',
            Bit::X => 'x',
            Bit::Z => 'z',
        };
        write!(f, "{c}")
    }
}

/// A sized bit/logic value with an inclusive `[left:right]` declared
/// range and optional signedness and 4-state support (§3).
#[derive(Debug, Clone)]
pub struct Value {
    left: i32,
    right: i32,
    signed: bool,
    four_state: bool,
    /// bit 0 of these planes is always the LSB of the value,
    /// independent of whether the declared range ascends or descends.
    aval: BigUint,
    bval: BigUint,
}

impl Value {
    pub fn width(&self) -> u32 {
        (self.left - self.right).unsigned_abs() + 1
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn is_four_state(&self) -> bool {
        self.four_state
    }

    fn mask(width: u32) -> BigUint {
        (BigUint::one() << width as usize) - BigUint::one()
    }

    /// All bits zero (a fully-defined 0).
    pub fn zero(left: i32, right: i32, signed: bool, four_state: bool) -> Self {
        Self {
            left,
            right,
            signed,
            four_state,
            aval: BigUint::zero(),
            bval: BigUint::zero(),
        }
    }

    /// All bits `X`. Only meaningful for a four-state value; a 2-state
    /// value has no representable `X` and collapses to zero.
    pub fn x(left: i32, right: i32, signed: bool, four_state: bool) -> Self {
        let width = (left - right).unsigned_abs() + 1;
        if four_state {
            Self {
                left,
                right,
                signed,
                four_state,
                aval: Self::mask(width),
                bval: Self::mask(width),
            }
        } else {
            Self::zero(left, right, signed, four_state)
        }
    }

    pub fn from_u64(
        bits: u64,
        left: i32,
        right: i32,
        signed: bool,
        four_state: bool,
    ) -> Self {
        let width = (left - right).unsigned_abs() + 1;
        let mask = Self::mask(width);
        Self {
            left,
            right,
            signed,
            four_state,
            aval: BigUint::from(bits) & mask,
            bval: BigUint::zero(),
        }
    }

    /// Decodes a declared bit-select index (in `[right, left]` or
    /// `[left, right]`, whichever is valid for this value's direction)
    /// into an internal LSB-first offset.
    fn internal_index(&self, idx: i32) -> usize {
        if self.left >= self.right {
            (idx - self.right) as usize
        } else {
            (self.left - idx).unsigned_abs() as usize
        }
    }

    pub fn get_bit_at(&self, declared_idx: i32) -> Bit {
        let pos = self.internal_index(declared_idx);
        self.get_bit(pos as u32)
    }

    fn plane_bit(plane: &BigUint, pos: u32) -> bool {
        ((plane >> pos as usize) & BigUint::one()) == BigUint::one()
    }

    fn set_plane_bit(plane: &mut BigUint, pos: u32, val: bool) {
        let weight = BigUint::one() << pos as usize;
        let currently_set = Self::plane_bit(plane, pos);
        if val && !currently_set {
            *plane += &weight;
        } else if !val && currently_set {
            *plane -= &weight;
        }
    }

    /// `pos` is an LSB-first offset from bit 0, i.e. independent of the
    /// declared direction.
    pub fn get_bit(&self, pos: u32) -> Bit {
        let a = Self::plane_bit(&self.aval, pos);
        let b = self.four_state && Self::plane_bit(&self.bval, pos);
        Bit::from_planes(a, b)
    }

    /// Sets the bit at a declared index, the write counterpart of
    /// [`Value::get_bit_at`].
    pub fn set_bit_at(&mut self, declared_idx: i32, bit: Bit) {
        let pos = self.internal_index(declared_idx);
        self.set_bit(pos as u32, bit);
    }

    pub fn set_bit(&mut self, pos: u32, bit: Bit) {
        let (a, b) = match bit {
            Bit::Zero => (false, false),
            Bit::One => (true, false),
            Bit::Z => (false, true),
            Bit::X => (true, true),
        };
        Self::set_plane_bit(&mut self.aval, pos, a);
        if self.four_state {
            Self::set_plane_bit(&mut self.bval, pos, b);
        }
    }

    pub fn has_unknown(&self) -> bool {
        self.four_state && !self.bval.is_zero()
    }

    /// Returns the value as a `u64` if it is fully-defined and fits,
    /// `None` otherwise (used by `$display`'s `%d`/`%t` etc.).
    pub fn to_u64(&self) -> Option<u64> {
        if self.has_unknown() {
            return None;
        }
        // `BigUint::to_u64_digits` would also work; iterate bytes for clarity.
        let bytes = self.aval.to_bytes_le();
        if bytes.len() > 8 && bytes[8..].iter().any(|b| *b != 0) {
            return None;
        }
        let mut buf = [0u8; 8];
        let n = bytes.len().min(8);
        buf[..n].copy_from_slice(&bytes[..n]);
        Some(u64::from_le_bytes(buf))
    }

    /// Equality that distinguishes `X` from `Z` — "match" in the spec,
    /// `===` in the language it models. Used for change detection on
    /// assignment (§3).
    pub fn matches(&self, other: &Value) -> bool {
        self.width() == other.width() && self.aval == other.aval && self.bval == other.bval
    }

    /// Logical equality, `==` in the spec: `None` ("x") when either
    /// operand has an unknown bit, `Some(bool)` otherwise. Width-agnostic —
    /// a narrower operand is implicitly zero-extended, matching how
    /// integer/based literals (default width 32) compare against narrower
    /// signals.
    pub fn logic_eq(&self, other: &Value) -> Option<bool> {
        if self.has_unknown() || other.has_unknown() {
            None
        } else {
            Some(self.aval == other.aval)
        }
    }

    /// `===`-style case equality, width-agnostic like `logic_eq` but
    /// distinguishing `x`/`z`: `case(expr) LABEL:` must match a narrower
    /// `expr` against a default-width literal `LABEL`.
    pub fn case_matches(&self, other: &Value) -> bool {
        self.aval == other.aval && self.bval == other.bval
    }

    /// `{self, other}`, `self` occupying the high bits. Result is
    /// unsigned and inherits 4-state-ness from either operand.
    pub fn concat(&self, other: &Value) -> Value {
        let width = self.width() + other.width();
        let aval = (self.aval.clone() << other.width() as usize) | other.aval.clone();
        let bval = (self.bval.clone() << other.width() as usize) | other.bval.clone();
        Value {
            left: width as i32 - 1,
            right: 0,
            signed: false,
            four_state: self.four_state || other.four_state,
            aval,
            bval,
        }
    }

    /// `expr[hi:lo]`, declared-index inclusive, result is `[hi-lo:0]`.
    pub fn slice(&self, hi: i32, lo: i32) -> Value {
        let start = self.internal_index(lo).min(self.internal_index(hi));
        let width = (hi - lo).unsigned_abs() + 1;
        let mask = Self::mask(width);
        Value {
            left: width as i32 - 1,
            right: 0,
            signed: false,
            four_state: self.four_state,
            aval: (self.aval.clone() >> start) & mask.clone(),
            bval: (self.bval.clone() >> start) & mask,
        }
    }

    /// Sign- or zero-extends/truncates to `new_width` bits, LSB-aligned,
    /// result range `[new_width-1:0]`.
    pub fn extend(&self, new_width: u32, signed: bool) -> Value {
        let mask = Self::mask(new_width);
        let mut aval = self.aval.clone();
        let mut bval = self.bval.clone();
        let old_width = self.width();
        if new_width > old_width && signed && self.get_bit(old_width - 1) == Bit::One {
            let fill = Self::mask(new_width - old_width) << old_width as usize;
            aval |= &fill;
        }
        aval &= &mask;
        bval &= &mask;
        Value {
            left: new_width as i32 - 1,
            right: 0,
            signed,
            four_state: self.four_state,
            aval,
            bval,
        }
    }

    pub fn to_signed(&self) -> Value {
        let mut v = self.clone();
        v.signed = true;
        v
    }

    pub fn to_unsigned(&self) -> Value {
        let mut v = self.clone();
        v.signed = false;
        v
    }

    fn binary_bitwise(
        &self,
        other: &Value,
        f: impl Fn(&BigUint, &BigUint) -> BigUint,
    ) -> Value {
        let width = self.width().max(other.width());
        let mask = Self::mask(width);
        Value {
            left: width as i32 - 1,
            right: 0,
            signed: self.signed && other.signed,
            four_state: self.four_state || other.four_state,
            aval: f(&self.aval, &other.aval) & mask.clone(),
            bval: (self.bval.clone() | other.bval.clone()) & mask,
        }
    }

    pub fn bitand(&self, other: &Value) -> Value {
        self.binary_bitwise(other, |a, b| a & b)
    }

    pub fn bitor(&self, other: &Value) -> Value {
        self.binary_bitwise(other, |a, b| a | b)
    }

    pub fn bitxor(&self, other: &Value) -> Value {
        self.binary_bitwise(other, |a, b| a ^ b)
    }

    pub fn bitnot(&self) -> Value {
        let width = self.width();
        let mask = Self::mask(width);
        Value {
            left: self.left,
            right: self.right,
            signed: self.signed,
            four_state: self.four_state,
            aval: (!self.aval.clone()) & mask.clone(),
            bval: self.bval.clone() & mask,
        }
    }

    fn reduce(&self, identity: bool, f: impl Fn(bool, bool) -> bool) -> Value {
        if self.has_unknown() {
            return Value::x(0, 0, self.signed, true);
        }
        let mut acc = identity;
        for pos in 0..self.width() {
            acc = f(acc, Self::plane_bit(&self.aval, pos));
        }
        Value::from_u64(acc as u64, 0, 0, false, self.four_state)
    }

    pub fn reduce_and(&self) -> Value {
        self.reduce(true, |a, b| a && b)
    }

    pub fn reduce_or(&self) -> Value {
        self.reduce(false, |a, b| a || b)
    }

    pub fn reduce_xor(&self) -> Value {
        self.reduce(false, |a, b| a != b)
    }

    /// Arithmetic is only defined for fully-known operands; per LRM
    /// semantics an unknown operand propagates to an all-`X` result.
    fn binary_arith(
        &self,
        other: &Value,
        f: impl Fn(&BigUint, &BigUint) -> BigUint,
    ) -> Value {
        let width = self.width().max(other.width()) + 1;
        if self.has_unknown() || other.has_unknown() {
            return Value::x(width as i32 - 1, 0, self.signed, true);
        }
        let mask = Self::mask(width);
        Value {
            left: width as i32 - 1,
            right: 0,
            signed: self.signed && other.signed,
            four_state: self.four_state || other.four_state,
            aval: f(&self.aval, &other.aval) & mask,
            bval: BigUint::zero(),
        }
    }

    pub fn add(&self, other: &Value) -> Value {
        self.binary_arith(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Value) -> Value {
        let width = self.width().max(other.width()) + 1;
        if self.has_unknown() || other.has_unknown() {
            return Value::x(width as i32 - 1, 0, self.signed, true);
        }
        let mask = Self::mask(width);
        let modulus = BigUint::one() << width as usize;
        let a = &self.aval % &modulus;
        let b = &other.aval % &modulus;
        let result = if a >= b {
            a - b
        } else {
            (&modulus + &a) - b
        };
        Value {
            left: width as i32 - 1,
            right: 0,
            signed: self.signed && other.signed,
            four_state: self.four_state || other.four_state,
            aval: result & mask,
            bval: BigUint::zero(),
        }
    }

    pub fn mul(&self, other: &Value) -> Value {
        self.binary_arith(other, |a, b| a * b)
    }

    /// Two's-complement negation, `-self`.
    pub fn neg(&self) -> Value {
        let one = Value::from_u64(1, self.left, self.right, self.signed, self.four_state);
        self.bitnot().add(&one)
    }

    fn compare(&self, other: &Value, f: impl Fn(&BigUint, &BigUint) -> bool) -> Value {
        if self.has_unknown() || other.has_unknown() {
            return Value::x(0, 0, false, true);
        }
        Value::from_u64(
            f(&self.aval, &other.aval) as u64,
            0,
            0,
            false,
            self.four_state || other.four_state,
        )
    }

    pub fn lt(&self, other: &Value) -> Value {
        self.compare(other, |a, b| a < b)
    }

    pub fn le(&self, other: &Value) -> Value {
        self.compare(other, |a, b| a <= b)
    }

    pub fn gt(&self, other: &Value) -> Value {
        self.compare(other, |a, b| a > b)
    }

    pub fn ge(&self, other: &Value) -> Value {
        self.compare(other, |a, b| a >= b)
    }

    /// Truthiness: any known set bit is true, an all-zero known value is
    /// false, any unknown bit makes the result `x` (one-bit, §3).
    pub fn truthy(&self) -> Option<bool> {
        if self.has_unknown() {
            None
        } else {
            Some(!self.aval.is_zero())
        }
    }

    pub fn logical_not(&self) -> Value {
        match self.truthy() {
            None => Value::x(0, 0, false, true),
            Some(b) => Value::from_u64(!b as u64, 0, 0, false, self.four_state),
        }
    }

    pub fn logical_and(&self, other: &Value) -> Value {
        match (self.truthy(), other.truthy()) {
            (Some(false), _) | (_, Some(false)) => Value::from_u64(0, 0, 0, false, false),
            (Some(a), Some(b)) => Value::from_u64((a && b) as u64, 0, 0, false, false),
            _ => Value::x(0, 0, false, true),
        }
    }

    pub fn logical_or(&self, other: &Value) -> Value {
        match (self.truthy(), other.truthy()) {
            (Some(true), _) | (_, Some(true)) => Value::from_u64(1, 0, 0, false, false),
            (Some(a), Some(b)) => Value::from_u64((a || b) as u64, 0, 0, false, false),
            _ => Value::x(0, 0, false, true),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'b", self.width())?;
        for pos in (0..self.width()).rev() {
            write!(f, "{}", self.get_bit(pos))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_two_state() {
        let v = Value::from_u64(42, 7, 0, false, false);
        assert_eq!(v.to_u64(), Some(42));
    }

    #[test]
    fn match_distinguishes_x_from_z() {
        let mut x = Value::x(0, 0, false, true);
        let mut z = Value::x(0, 0, false, true);
        x.set_bit(0, Bit::X);
        z.set_bit(0, Bit::Z);
        assert!(!x.matches(&z));
        assert!(x.matches(&x.clone()));
    }

    #[test]
    fn concat_and_slice_round_trip() {
        let a = Value::from_u64(0b10, 1, 0, false, false);
        let b = Value::from_u64(0b1, 0, 0, false, false);
        let c = a.concat(&b);
        assert_eq!(c.width(), 3);
        assert_eq!(c.to_u64(), Some(0b101));
        let back_a = c.slice(2, 1);
        assert_eq!(back_a.to_u64(), Some(0b10));
    }

    #[test]
    fn unpack_distributes_bits_in_declaration_order() {
        // {a, b} = expr; with a 2 bits, b 1 bit, expr = 3'b101
        let expr = Value::from_u64(0b101, 2, 0, false, false);
        let a = expr.slice(2, 1);
        let b = expr.slice(0, 0);
        assert_eq!(a.to_u64(), Some(0b10));
        assert_eq!(b.to_u64(), Some(0b1));
    }

    #[test]
    fn arithmetic_with_unknown_operand_yields_x() {
        let defined = Value::from_u64(1, 3, 0, false, true);
        let unknown = Value::x(3, 0, false, true);
        let sum = defined.add(&unknown);
        assert!(sum.has_unknown());
    }
}

/// §8's round-trip invariant ("Writing `v` then reading `v` yields `v`
/// for 2-state... preserves x/z under `match` for 4-state"), checked
/// the way the teacher's interpreter crate checks `BitVecValue`
/// round-trips (`interp/src/tests/values.rs`'s `property_tests` module).
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn u8_round_trip(input: u8) {
            prop_assert_eq!(Value::from_u64(input as u64, 7, 0, false, false).to_u64(), Some(input as u64));
        }

        #[test]
        fn u32_round_trip(input: u32) {
            prop_assert_eq!(Value::from_u64(input as u64, 31, 0, false, false).to_u64(), Some(input as u64));
        }

        #[test]
        fn u64_round_trip(input: u64) {
            prop_assert_eq!(Value::from_u64(input, 63, 0, false, false).to_u64(), Some(input));
        }

        /// A fully-defined four-state value round-trips exactly like its
        /// two-state twin: `has_unknown` only ever comes from an
        /// explicit `x`/`z` bit, never from the encoding itself.
        #[test]
        fn four_state_round_trip_when_fully_defined(input: u32) {
            let v = Value::from_u64(input as u64, 31, 0, false, true);
            prop_assert!(!v.has_unknown());
            prop_assert_eq!(v.to_u64(), Some(input as u64));
        }

        /// `match` distinguishes `x` from `z` at every bit position, and
        /// is reflexive regardless of which one a given lane holds.
        #[test]
        fn match_is_reflexive_with_mixed_unknown_bits(pos in 0u32..32, as_z in any::<bool>()) {
            let mut v = Value::from_u64(0, 31, 0, false, true);
            v.set_bit(pos, if as_z { Bit::Z } else { Bit::X });
            prop_assert!(v.matches(&v.clone()));
        }

        /// Concatenating then slicing back out the same span returns the
        /// original bits, for any width split within a 32-bit value.
        #[test]
        fn concat_then_slice_recovers_operands(hi: u16, lo: u16) {
            let a = Value::from_u64(hi as u64, 15, 0, false, false);
            let b = Value::from_u64(lo as u64, 15, 0, false, false);
            let c = a.concat(&b);
            prop_assert_eq!(c.slice(31, 16).to_u64(), Some(hi as u64));
            prop_assert_eq!(c.slice(15, 0).to_u64(), Some(lo as u64));
        }
    }
}
