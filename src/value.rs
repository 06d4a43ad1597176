//! The tagged runtime value held by every operand-stack, local, and heap cell.

use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;

/**
  Concrete in-memory representation of a runtime value. Every cell holds exactly
  one tag at a time; there is no implicit numeric promotion. Floats only become
  integers (and vice versa) through the explicit conversion instructions, which
  keeps the bit-level traffic between the two representations auditable.

  Struct and array references are indices into the heap's flat cell array, not
  native pointers, so every dereference can be bounds-checked. As with all
  strings in this codebase, `Value::Str` is interned and clones are cheap.
*/
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
  /// 32-bit signed integer
  Int(i32),
  /// 32-bit IEEE float
  Float(f32),
  Bool(bool),
  /// 16-bit character
  Char(u16),
  /// An interned string
  Str(DefaultAtom),
  /// Index of the first cell of a struct allocation
  StructRef(usize),
  /// Index of the first cell of an array allocation
  ArrayRef(usize),
  Null,
}

impl Value {
  /// The name of this value's tag, used in `TypeMismatch` diagnostics.
  pub fn tag_name(&self) -> &'static str {
    match self {
      Value::Int(_)       => "int",
      Value::Float(_)     => "float",
      Value::Bool(_)      => "bool",
      Value::Char(_)      => "char",
      Value::Str(_)       => "string",
      Value::StructRef(_) => "struct ref",
      Value::ArrayRef(_)  => "array ref",
      Value::Null         => "null",
    }
  }

  /// The all-zero cell. Locals, globals, and fresh allocations start here.
  pub fn zero() -> Value {
    Value::Int(0)
  }
}

impl Display for Value {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Value::Int(i) => {
        write!(f, "{}", i)
      },
      Value::Float(x) => {
        write!(f, "{:?}", x)
      },
      Value::Bool(b) => {
        write!(f, "{}", b)
      },
      Value::Char(c) => {
        match char::from_u32(*c as u32) {
          Some(c) => write!(f, "'{}'", c),
          None    => write!(f, "'\\u{:04x}'", c)
        }
      },
      Value::Str(s) => {
        write!(f, "\"{}\"", s)
      },
      Value::StructRef(i) => {
        write!(f, "<STRUCT, {}>", i)
      },
      Value::ArrayRef(i) => {
        write!(f, "<ARRAY, {}>", i)
      },
      Value::Null => {
        write!(f, "null")
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tag_names_are_distinct_per_tag() {
    assert_eq!(Value::Int(-3).tag_name(), "int");
    assert_eq!(Value::Float(1.5).tag_name(), "float");
    assert_eq!(Value::ArrayRef(7).tag_name(), "array ref");
    assert_ne!(Value::StructRef(0).tag_name(), Value::ArrayRef(0).tag_name());
  }

  #[test]
  fn display_forms() {
    assert_eq!(format!("{}", Value::Int(42)), "42");
    assert_eq!(format!("{}", Value::Str(DefaultAtom::from("hi"))), "\"hi\"");
    assert_eq!(format!("{}", Value::Char('A' as u16)), "'A'");
    assert_eq!(format!("{}", Value::StructRef(3)), "<STRUCT, 3>");
    assert_eq!(format!("{}", Value::Null), "null");
  }

  #[test]
  fn zero_is_the_integer_zero() {
    assert_eq!(Value::zero(), Value::Int(0));
  }
}
