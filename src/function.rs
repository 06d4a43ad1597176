//! A function symbol carries the metadata the calling convention needs after
//! the assembler is long gone: where the code starts, how many arguments to
//! pop, and how many local slots to allocate.

use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;

/**
  The `FunctionSymbol` struct represents a callable entry `name/nargs` in the
  constant pool. Clones are cheap. As with all strings in this codebase,
  `FunctionSymbol::name` is interned to preserve names during serializing and
  deserializing bytecode.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSymbol {
  pub name    : DefaultAtom,
  /// Entry address, an absolute byte offset into the code
  pub address : usize,
  /// Number of arguments popped off the operand stack by `call`
  pub nargs   : usize,
  /// Number of local-variable slots in the activation frame
  pub nlocals : usize,
}

impl FunctionSymbol {
  pub fn new(name: &str, address: usize, nargs: usize, nlocals: usize) -> FunctionSymbol {
    FunctionSymbol {
      name: DefaultAtom::from(name),
      address,
      nargs,
      nlocals,
    }
  }
}

impl Display for FunctionSymbol {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    if self.nargs == 0 {
      write!(f, "{}@{}", self.name, self.address)
    } else {
      write!(f, "{}/{}@{}", self.name, self.nargs, self.address)
    }
  }
}
