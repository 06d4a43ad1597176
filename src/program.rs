//! The program image: the load-time-immutable bundle of code bytes, constant
//! pool, and function metadata the engine executes. Building this image out of
//! source text or assembly is an external collaborator's job; loading it here
//! only validates that the engine can trust it.

use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;

use crate::bytecode::{
  instruction_size, try_decode_instruction, DecodeError, Instruction, Opcode
};
use crate::fault::Fault;
use crate::function::FunctionSymbol;
use crate::symboltable::SymbolTable;

/// Function argument and local counts must fit the 16-bit slot field of the
/// packed indexed-addressing operands.
pub const MAX_FUNCTION_SLOTS: usize = u16::MAX as usize;

/// A boxed value in the constant pool, resolved once at load time and
/// immutable during execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
  Str(DefaultAtom),
  Float(f32),
  Function(FunctionSymbol),
}

impl Constant {
  pub fn kind_name(&self) -> &'static str {
    match self {
      Constant::Str(_)      => "string",
      Constant::Float(_)    => "float",
      Constant::Function(_) => "function",
    }
  }
}

impl Display for Constant {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Constant::Str(s)      => write!(f, "\"{}\"", s),
      Constant::Float(x)    => write!(f, "{:?}", x),
      Constant::Function(s) => write!(f, "{}", s),
    }
  }
}

/**
  An accepted program image. The engine never mutates any of this after load:
  the code bytes, the constant pool, and the symbol table stay fixed for the
  lifetime of the image, and the globals size is only read once to size the
  heap's globals region.
*/
#[derive(Debug)]
pub struct Program {
  code         : Vec<u8>,
  constants    : Vec<Constant>,
  globals_size : usize,
  main         : FunctionSymbol,
  symbols      : SymbolTable,
}

impl Program {

  /**
    Validates and accepts a program image. The checks mirror what the engine
    will later take on faith:

      1. the code decodes instruction by instruction with no truncated
         operand and no byte that is not an opcode;
      2. every pool index embedded in the code names a constant of the kind
         the instruction expects;
      3. every function symbol's entry address is an instruction boundary,
         and its argument/local counts fit the calling convention;
      4. `main` resolves, synthesized as a zero-argument entry at address 0
         if the pool does not provide one.

    Anything else is a `MalformedImage`.
  */
  pub fn load(
    code: Vec<u8>,
    constants: Vec<Constant>,
    globals_size: usize
  ) -> Result<Program, Fault> {
    let boundaries = Self::validate_code(&code, &constants)?;
    let symbols    = Self::validate_functions(&code, &constants, &boundaries)?;

    let main = match symbols.get_pool_index("main") {
      Some(index) => {
        match &constants[index] {
          Constant::Function(symbol) => symbol.clone(),
          // `validate_functions` only maps function constants.
          _ => unreachable!()
        }
      }
      // Synthesize a zero-argument entry point.
      None => FunctionSymbol::new("main", 0, 0, 0)
    };

    Ok(Program { code, constants, globals_size, main, symbols })
  }

  /// Walks the code stream, returning the set of instruction boundaries.
  fn validate_code(code: &[u8], constants: &[Constant]) -> Result<Vec<usize>, Fault> {
    let mut boundaries = Vec::new();
    let mut address = 0;

    while address < code.len() {
      boundaries.push(address);
      let instruction = match try_decode_instruction(code, address) {
        Ok(instruction) => instruction,
        Err(DecodeError::UnknownOpcode(byte)) => {
          return Err(Fault::MalformedImage(
            format!("byte {:#04x} at address {} is not an opcode", byte, address)
          ));
        }
        Err(DecodeError::Truncated { address, needed, available }) => {
          return Err(Fault::MalformedImage(
            format!(
              "truncated code: instruction at address {} needs {} bytes but {} remain",
              address, needed, available
            )
          ));
        }
      };

      if let Instruction::Unary { opcode, operand } = instruction {
        Self::validate_pool_reference(opcode, operand, constants, address)?;
      }
      address += instruction_size(instruction.opcode());
    }

    Ok(boundaries)
  }

  /// Checks that a pool index embedded in the code is in range and names a
  /// constant of the kind the instruction expects.
  fn validate_pool_reference(
    opcode: Opcode,
    operand: u32,
    constants: &[Constant],
    address: usize
  ) -> Result<(), Fault> {
    let expected = match opcode {
      Opcode::Sconst => "string",
      Opcode::Fconst => "float",
      Opcode::Call   => "function",
      _              => return Ok(())
    };

    let constant = constants.get(operand as usize).ok_or_else(|| {
      Fault::MalformedImage(format!(
        "{} at address {} references constant {} but the pool holds {}",
        opcode, address, operand, constants.len()
      ))
    })?;

    if constant.kind_name() != expected {
      return Err(Fault::MalformedImage(format!(
        "{} at address {} expects a {} constant but pool entry {} is a {}",
        opcode, address, expected, operand, constant.kind_name()
      )));
    }
    Ok(())
  }

  /// Validates every function constant and builds the symbol table over them.
  fn validate_functions(
    code: &[u8],
    constants: &[Constant],
    boundaries: &[usize]
  ) -> Result<SymbolTable, Fault> {
    let mut symbols = SymbolTable::new();

    for (index, constant) in constants.iter().enumerate() {
      let symbol = match constant {
        Constant::Function(symbol) => symbol,
        _ => continue
      };

      if boundaries.binary_search(&symbol.address).is_err() {
        return Err(Fault::MalformedImage(format!(
          "function {} enters at {}, which is not an instruction boundary",
          symbol, symbol.address
        )));
      }
      if symbol.nargs > MAX_FUNCTION_SLOTS || symbol.nlocals > MAX_FUNCTION_SLOTS {
        return Err(Fault::MalformedImage(format!(
          "function {} declares {} arguments and {} locals; the limit is {}",
          symbol, symbol.nargs, symbol.nlocals, MAX_FUNCTION_SLOTS
        )));
      }
      if symbols.insert(symbol.name.clone(), index).is_err() {
        return Err(Fault::MalformedImage(format!(
          "function name {} is defined more than once", symbol.name
        )));
      }
    }

    Ok(symbols)
  }

  // region Accessors

  pub fn code(&self) -> &[u8] {
    &self.code
  }

  pub fn code_size(&self) -> usize {
    self.code.len()
  }

  pub fn constants(&self) -> &[Constant] {
    &self.constants
  }

  pub fn globals_size(&self) -> usize {
    self.globals_size
  }

  pub fn main(&self) -> &FunctionSymbol {
    &self.main
  }

  pub fn symbols(&self) -> &SymbolTable {
    &self.symbols
  }

  /// The function symbol at the given pool index, if that entry is one.
  pub fn function(&self, pool_index: usize) -> Option<&FunctionSymbol> {
    match self.constants.get(pool_index) {
      Some(Constant::Function(symbol)) => Some(symbol),
      _                                => None
    }
  }

  // endregion
}
