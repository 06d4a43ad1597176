/*!

  The VM uses byte-addressed code with a 32 bit big-endian operand word.
  Instructions are either 1 or 5 bytes: an opcode byte, optionally followed by
  one operand word. Whether an opcode carries an operand is determined by its
  position in the opcode ordering, so decoding never needs a lookup table. The
  sizes of instruction components are as follows:

    Opcode:   8 bits
    Operand: 32 bits

  Operands are overloaded by opcode: a signed immediate, a character code, a
  constant-pool index, a local slot, a heap address, a field offset, a byte
  size, an absolute code address, or a packed pair of a 16-bit base slot and a
  16-bit byte offset for indexed array addressing. Function and string
  constants do not appear literally in the bytecode; they are resolved through
  the constant pool, and the disassembler resolves them back to names through
  the symbol table maintained for that purpose.

  One design decision that needed to be made is whether to store instruction
  arguments as data members of enum variants, with one variant per opcode, in
  the code store itself. Rust enums use a discriminant plus the largest data
  payload, which would waste close to half of the allocated memory for the
  operand-free half of the instruction set. Instead, code stays a flat `u8`
  array exactly as the assembler emitted it, an enum is only used for the
  opcode byte, and the `Instruction` enum exists as a transient decoded form
  for execution, diagnostics, and tests.

*/

mod binary;
mod disasm;
mod opcode;

pub use binary::{
  element_index, encode_instruction, instruction_size, pack_indexed,
  read_word, try_decode_instruction, unpack_indexed, DecodeError, Word,
  CELL_SIZE,
};
pub use disasm::{disassemble_instruction, listing, render};
pub use opcode::{Instruction, Opcode, OperandKind, MAX_OPERAND_OPCODE};
