//! The arithmetic unit: pure, stateless functions over two `i32` or two `f32`
//! operands. Nothing here touches machine state; each function either returns
//! the exact 32-bit result or a typed fault carrying the program counter the
//! engine passed in.

use crate::fault::Fault;

pub fn iadd(a: i32, b: i32, pc: usize) -> Result<i32, Fault> {
  a.checked_add(b).ok_or(Fault::Overflow { pc })
}

pub fn isub(a: i32, b: i32, pc: usize) -> Result<i32, Fault> {
  a.checked_sub(b).ok_or(Fault::Overflow { pc })
}

pub fn imul(a: i32, b: i32, pc: usize) -> Result<i32, Fault> {
  a.checked_mul(b).ok_or(Fault::Overflow { pc })
}

/// Truncated-toward-zero quotient. `i32::MIN / -1` overflows the
/// representable range and is reported as such, not as a wrap.
pub fn idiv(a: i32, b: i32, pc: usize) -> Result<i32, Fault> {
  if b == 0 {
    return Err(Fault::DivisionByZero { pc });
  }
  if a == i32::MIN && b == -1 {
    return Err(Fault::Overflow { pc });
  }
  Ok(a / b)
}

pub fn ineg(a: i32, pc: usize) -> Result<i32, Fault> {
  a.checked_neg().ok_or(Fault::Overflow { pc })
}

/// Shift amounts outside `[0, 31]` have no defined result on a 32-bit cell.
fn shift_amount(amount: i32, mnemonic: &'static str, pc: usize) -> Result<u32, Fault> {
  if amount < 0 || amount > 31 {
    return Err(Fault::InvalidOperand { mnemonic, operand: amount as i64, pc });
  }
  Ok(amount as u32)
}

pub fn ishl(a: i32, amount: i32, pc: usize) -> Result<i32, Fault> {
  Ok(a << shift_amount(amount, "ishl", pc)?)
}

/// Arithmetic right shift.
pub fn ishr(a: i32, amount: i32, pc: usize) -> Result<i32, Fault> {
  Ok(a >> shift_amount(amount, "ishr", pc)?)
}

// Bitwise operations never fail.

pub fn iand(a: i32, b: i32) -> i32 {
  a & b
}

pub fn ior(a: i32, b: i32) -> i32 {
  a | b
}

pub fn ixor(a: i32, b: i32) -> i32 {
  a ^ b
}

pub fn inot(a: i32) -> i32 {
  !a
}

pub fn fadd(a: f32, b: f32) -> f32 {
  a + b
}

pub fn fsub(a: f32, b: f32) -> f32 {
  a - b
}

pub fn fmul(a: f32, b: f32) -> f32 {
  a * b
}

pub fn fdiv(a: f32, b: f32, pc: usize) -> Result<f32, Fault> {
  if b == 0.0 {
    return Err(Fault::DivisionByZero { pc });
  }
  Ok(a / b)
}

pub fn fneg(a: f32) -> f32 {
  -a
}

/// The explicit int→float conversion, the one permitted numeric promotion.
pub fn i2f(a: i32) -> f32 {
  a as f32
}

/// Float→int truncates toward zero; values outside the i32 range (and NaN)
/// have no exact answer and fault.
pub fn f2i(a: f32, pc: usize) -> Result<i32, Fault> {
  if a.is_nan() {
    return Err(Fault::Overflow { pc });
  }
  let truncated = a.trunc();
  // 2^31 is exactly representable as f32; i32::MAX is not.
  if truncated >= 2147483648.0 || truncated < -2147483648.0 {
    return Err(Fault::Overflow { pc });
  }
  Ok(truncated as i32)
}
