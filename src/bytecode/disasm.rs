/*!
  The human readable textual face of bytecode. This module leverages the
  `strum` derives of the opcode enum to render instructions back to their
  mnemonics, resolving pool operands against the constant pool so call targets
  and constants appear by name. It is strictly read-only: external tracing and
  visualization tooling consumes it without touching machine state.
*/

use crate::program::Constant;

use super::binary::{instruction_size, try_decode_instruction, unpack_indexed};
use super::opcode::{Instruction, OperandKind};

/// Renders one decoded instruction, resolving pool operands by name.
pub fn render(instruction: &Instruction, constants: &[Constant]) -> String {
  let (opcode, operand) = match instruction {
    Instruction::Unary { opcode, operand } => (opcode, *operand),
    Instruction::Nullary(opcode)           => return format!("{}", opcode),
  };

  match opcode.operand_kind() {

    OperandKind::Int => {
      format!("{} {}", opcode, operand as i32)
    }

    OperandKind::Char => {
      match char::from_u32(operand & 0xFFFF) {
        Some(c) => format!("{} '{}'", opcode, c),
        None    => format!("{} {}", opcode, operand)
      }
    }

    OperandKind::PoolIndex => {
      match constants.get(operand as usize) {
        Some(constant) => format!("{} {}", opcode, constant),
        None           => format!("{} #{}", opcode, operand)
      }
    }

    OperandKind::Packed => {
      let (slot, byte_offset) = unpack_indexed(operand);
      format!("{} {}[{}]", opcode, slot, byte_offset)
    }

    _ => {
      format!("{} {}", opcode, operand)
    }

  }
}

/**
  Disassembles the single instruction at `address`: its opcode mnemonic plus
  decoded operand. Returns `None` if the bytes there do not decode.
*/
pub fn disassemble_instruction(
  code: &[u8],
  constants: &[Constant],
  address: usize
) -> Option<String> {
  let instruction = try_decode_instruction(code, address).ok()?;
  Some(format!("{:04}: {}", address, render(&instruction, constants)))
}

/// Disassembles the whole code store into one listing, one instruction per
/// line.
pub fn listing(code: &[u8], constants: &[Constant]) -> String {
  let mut out = String::new();
  let mut address = 0;

  while address < code.len() {
    match try_decode_instruction(code, address) {
      Ok(instruction) => {
        out.push_str(&format!("{:04}: {}\n", address, render(&instruction, constants)));
        address += instruction_size(instruction.opcode());
      }
      Err(_e) => {
        out.push_str(&format!("{:04}: ??\n", address));
        break;
      }
    }
  }

  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{encode_instruction, pack_indexed, Opcode};
  use crate::function::FunctionSymbol;

  fn emit(instructions: &[Instruction]) -> Vec<u8> {
    let mut code = Vec::new();
    for instruction in instructions {
      encode_instruction(instruction, &mut code);
    }
    code
  }

  #[test]
  fn renders_signed_immediates_and_mnemonics() {
    let code = emit(&[
      Instruction::Unary { opcode: Opcode::Iconst, operand: (-3i32) as u32 },
      Instruction::Nullary(Opcode::Iadd),
    ]);
    assert_eq!(
      disassemble_instruction(&code, &[], 0).unwrap(),
      "0000: iconst -3"
    );
    assert_eq!(
      disassemble_instruction(&code, &[], 5).unwrap(),
      "0005: iadd"
    );
  }

  #[test]
  fn resolves_pool_operands_by_name() {
    let constants = vec![
      Constant::Function(FunctionSymbol::new("add2", 12, 2, 2)),
    ];
    let code = emit(&[
      Instruction::Unary { opcode: Opcode::Call, operand: 0 },
    ]);
    assert_eq!(
      disassemble_instruction(&code, &constants, 0).unwrap(),
      "0000: call add2/2@12"
    );
  }

  #[test]
  fn renders_packed_operands_as_slot_and_offset() {
    let code = emit(&[
      Instruction::Unary { opcode: Opcode::Iastore, operand: pack_indexed(1, 8) },
    ]);
    assert_eq!(
      disassemble_instruction(&code, &[], 0).unwrap(),
      "0000: iastore 1[8]"
    );
  }

  #[test]
  fn listing_walks_every_instruction() {
    let code = emit(&[
      Instruction::Unary { opcode: Opcode::Iconst, operand: 3 },
      Instruction::Unary { opcode: Opcode::Iconst, operand: 4 },
      Instruction::Nullary(Opcode::Iadd),
      Instruction::Nullary(Opcode::Halt),
    ]);
    let listing = listing(&code, &[]);
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(
      lines,
      vec!["0000: iconst 3", "0005: iconst 4", "0010: iadd", "0011: halt"]
    );
  }

  #[test]
  fn undecodable_bytes_do_not_panic_the_disassembler() {
    assert_eq!(disassemble_instruction(&[0xEE], &[], 0), None);
    assert_eq!(listing(&[0xEE], &[]), "0000: ??\n");
  }
}
