use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

/**
  Opcodes of the virtual machine.

  Rust stores enum variants as bytes. As in C, enum values are represented by
  consecutive natural numbers and can be treated as numeric types. Therefore,
  all opcodes that carry a 32-bit operand are grouped before all opcodes that
  don't, so that a given opcode's instruction width can be determined with a
  trivial comparison. Consequently, the order the opcodes are listed below is
  significant. Order-dependencies:
      ```
      Opcode::has_operand()
      binary::instruction_size()
      binary::try_decode_instruction()
      ```
*/
#[derive(
StrumDisplay, IntoStaticStr, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq, PartialEq,    Debug,         Hash
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Opcode {
  // Operand-carrying instructions //
  // Constants //
  Iconst,      // iconst <i32>
  Cconst,      // cconst <char code>
  Sconst,      // sconst <pool index>
  Fconst,      // fconst <pool index>
  // Locals and globals //
  Load,        // load <slot>
  Store,       // store <slot>
  Gload,       // gload <heap address>
  Gstore,      // gstore <heap address>
  // Structs and arrays //
  Fload,       // fload <field offset>
  Fstore,      // fstore <field offset>
  Iaload,      // iaload <slot:16|byte offset:16>
  Iastore,     // iastore <slot:16|byte offset:16>
  Struct,      // struct <field count>
  Newarray,    // newarray <byte size>
  // Control //
  Call,        // call <pool index>
  Br,          // br <code address>
  Brt,         // brt <code address>
  Brf,         // brf <code address>
  // Opcode 18

  // Nullary instructions //
  // Integer arithmetic //
  Iadd,
  Isub,
  Imul,
  Idiv,
  Ineg,
  Ishl,
  Ishr,
  Iand,
  Ior,
  Ixor,
  Inot,
  // Integer comparison //
  Ilt,
  Ile,
  Igt,
  Ige,
  Ieq,
  Ine,
  // Float arithmetic //
  Fadd,
  Fsub,
  Fmul,
  Fdiv,
  Fneg,
  Flt,
  Feq,
  // Conversions //
  I2F,
  F2I,
  // Booleans //
  Bnot,
  // Stack and control //
  Pop,
  Dup,
  Null,
  Ret,
  Halt,
  Nop,
}

pub const MAX_OPERAND_OPCODE: u8 = 18u8;

/// How an instruction's 32-bit operand is to be interpreted, which is all the
/// disassembler needs to render it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OperandKind {
  None,
  /// A signed immediate
  Int,
  /// A 16-bit character code
  Char,
  /// An index into the constant pool
  PoolIndex,
  /// A local-variable slot of the active frame
  LocalSlot,
  /// An address into the flat heap array
  HeapAddress,
  /// A field offset within a struct allocation
  FieldOffset,
  /// `base_slot << 16 | byte_offset`
  Packed,
  /// A field count for `struct`
  FieldCount,
  /// A byte size for `newarray`
  ByteSize,
  /// An absolute byte offset into the code
  CodeAddress,
}

impl Opcode {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn mnemonic(&self) -> &'static str {
    Into::<&'static str>::into(*self)
  }

  /// Whether this opcode is followed by a 32-bit operand.
  pub fn has_operand(&self) -> bool {
    self.code() < MAX_OPERAND_OPCODE
  }

  pub fn operand_kind(&self) -> OperandKind {
    match self {
      Opcode::Iconst                 => OperandKind::Int,
      Opcode::Cconst                 => OperandKind::Char,
      Opcode::Sconst
      | Opcode::Fconst
      | Opcode::Call                 => OperandKind::PoolIndex,
      Opcode::Load | Opcode::Store   => OperandKind::LocalSlot,
      Opcode::Gload | Opcode::Gstore => OperandKind::HeapAddress,
      Opcode::Fload | Opcode::Fstore => OperandKind::FieldOffset,
      Opcode::Iaload
      | Opcode::Iastore              => OperandKind::Packed,
      Opcode::Struct                 => OperandKind::FieldCount,
      Opcode::Newarray               => OperandKind::ByteSize,
      Opcode::Br
      | Opcode::Brt
      | Opcode::Brf                  => OperandKind::CodeAddress,
      _                              => OperandKind::None,
    }
  }
}

/// Holds the unencoded components of an instruction. As such, it enumerates
/// the possible instruction shapes.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum Instruction {
  /// [OpCode:8][Operand:32]
  Unary {
    opcode  : Opcode,
    operand : u32
  },
  /// [OpCode:8]
  Nullary(Opcode),
}

impl Instruction {
  pub fn opcode(&self) -> Opcode {
    match self {
      Instruction::Unary { opcode, .. } => *opcode,
      Instruction::Nullary(opcode)      => *opcode,
    }
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Instruction::Unary { opcode, operand } => {
        match opcode.operand_kind() {
          // The immediate of `iconst` is the only signed operand.
          OperandKind::Int => write!(f, "{} {}", opcode, *operand as i32),
          _                => write!(f, "{} {}", opcode, operand)
        }
      }

      Instruction::Nullary(opcode) => {
        write!(f, "{}", opcode)
      }

    }
  }
}
