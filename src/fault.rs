//! The fault taxonomy. The engine recovers from nothing: any of these ends the
//! run, and every runtime variant carries the program counter of the faulting
//! instruction.

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Which bounds-checked store an `OutOfBounds` fault refers to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Region {
  OperandStack,
  CallStack,
  Code,
  Heap,
  Array,
  Local,
  Field,
  ConstantPool,
}

impl Display for Region {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Region::OperandStack => "operand stack",
      Region::CallStack    => "call stack",
      Region::Code         => "code",
      Region::Heap         => "heap",
      Region::Array        => "array",
      Region::Local        => "local",
      Region::Field        => "field",
      Region::ConstantPool => "constant pool",
    };
    write!(f, "{}", name)
  }
}

/// Which fixed-capacity resource a `ResourceExhausted` fault refers to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Resource {
  OperandStack,
  CallStack,
  Heap,
}

impl Display for Resource {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Resource::OperandStack => "operand stack",
      Resource::CallStack    => "call stack",
      Resource::Heap         => "heap",
    };
    write!(f, "{}", name)
  }
}

/// A fatal condition raised during loading or execution.
#[derive(Clone, PartialEq, Debug, Error)]
pub enum Fault {
  #[error("integer overflow at pc {pc}")]
  Overflow { pc: usize },

  #[error("division by zero at pc {pc}")]
  DivisionByZero { pc: usize },

  #[error("{region} index {index} out of bounds (limit {limit}) at pc {pc}")]
  OutOfBounds {
    region : Region,
    index  : i64,
    limit  : usize,
    pc     : usize,
  },

  #[error("expected {expected} but found {found} at pc {pc}")]
  TypeMismatch {
    expected : &'static str,
    found    : &'static str,
    pc       : usize,
  },

  #[error("null reference at pc {pc}")]
  NullReference { pc: usize },

  #[error("invalid opcode {opcode:#04x} at pc {pc}")]
  InvalidOpcode { opcode: u8, pc: usize },

  /// An operand outside its instruction's legal range, e.g. a shift amount
  /// outside `[0, 31]`.
  #[error("invalid operand {operand} for {mnemonic} at pc {pc}")]
  InvalidOperand {
    mnemonic : &'static str,
    operand  : i64,
    pc       : usize,
  },

  #[error("{resource} capacity {limit} exhausted at pc {pc}")]
  ResourceExhausted {
    resource : Resource,
    limit    : usize,
    pc       : usize,
  },

  /// Load-time only: the program image failed validation.
  #[error("malformed program image: {0}")]
  MalformedImage(String),
}

impl Fault {
  /// The program counter the fault was raised at, if it was raised at runtime.
  pub fn pc(&self) -> Option<usize> {
    match self {
      Fault::Overflow { pc }
      | Fault::DivisionByZero { pc }
      | Fault::OutOfBounds { pc, .. }
      | Fault::TypeMismatch { pc, .. }
      | Fault::NullReference { pc }
      | Fault::InvalidOpcode { pc, .. }
      | Fault::InvalidOperand { pc, .. }
      | Fault::ResourceExhausted { pc, .. } => Some(*pc),
      Fault::MalformedImage(_)              => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn runtime_faults_carry_their_pc() {
    assert_eq!(Fault::DivisionByZero { pc: 12 }.pc(), Some(12));
    let fault = Fault::OutOfBounds {
      region: Region::Array, index: 5, limit: 3, pc: 40
    };
    assert_eq!(fault.pc(), Some(40));
    assert_eq!(Fault::MalformedImage("truncated".into()).pc(), None);
  }

  #[test]
  fn fault_messages_name_the_condition() {
    let fault = Fault::TypeMismatch { expected: "bool", found: "int", pc: 2 };
    assert_eq!(format!("{}", fault), "expected bool but found int at pc 2");
    let fault = Fault::ResourceExhausted {
      resource: Resource::CallStack, limit: 8, pc: 10
    };
    assert_eq!(format!("{}", fault), "call stack capacity 8 exhausted at pc 10");
  }
}
