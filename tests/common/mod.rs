//! Shared harness for the end-to-end tests: a small byte-emitter for building
//! program images by hand, plus runners that execute them to completion or to
//! an expected fault.

#![allow(dead_code)]

use stackvm::bytecode::{encode_instruction, Instruction, Opcode};
use stackvm::{Constant, Fault, Program, Value, VM};

/// An image under construction. This is test scaffolding, not an assembler:
/// it emits exactly the bytes it is told to.
pub struct Image {
  pub code         : Vec<u8>,
  pub constants    : Vec<Constant>,
  pub globals_size : usize,
}

impl Image {
  pub fn new() -> Image {
    Image {
      code: Vec::new(),
      constants: Vec::new(),
      globals_size: 0,
    }
  }

  pub fn op(&mut self, opcode: Opcode) -> &mut Image {
    encode_instruction(&Instruction::Nullary(opcode), &mut self.code);
    self
  }

  pub fn op1(&mut self, opcode: Opcode, operand: u32) -> &mut Image {
    encode_instruction(&Instruction::Unary { opcode, operand }, &mut self.code);
    self
  }

  /// The address the next emitted instruction will land at.
  pub fn here(&self) -> usize {
    self.code.len()
  }

  /// Adds a pool entry, returning its index for use as an operand.
  pub fn constant(&mut self, constant: Constant) -> u32 {
    self.constants.push(constant);
    (self.constants.len() - 1) as u32
  }

  pub fn globals(&mut self, size: usize) -> &mut Image {
    self.globals_size = size;
    self
  }

  pub fn load(&self) -> Program {
    Program::load(self.code.clone(), self.constants.clone(), self.globals_size)
      .expect("image failed validation")
  }
}

pub fn boot(image: &Image) -> VM {
  VM::new(image.load()).expect("vm construction failed")
}

pub fn boot_with_limits(image: &Image, operands: usize, calls: usize, heap: usize) -> VM {
  VM::with_limits(image.load(), operands, calls, heap).expect("vm construction failed")
}

pub fn run(image: &Image) -> VM {
  let mut vm = boot(image);
  vm.exec().expect("program faulted");
  vm
}

pub fn run_expect_fault(image: &Image) -> (VM, Fault) {
  let mut vm = boot(image);
  let fault = vm.exec().expect_err("expected a fault");
  (vm, fault)
}

/// The value on top of the operand stack.
pub fn top(vm: &VM) -> Value {
  vm.snapshot()
    .operands
    .last()
    .cloned()
    .expect("operand stack is empty")
}
