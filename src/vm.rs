//! Structures and functions for the virtual machine proper: the
//! fetch-decode-execute loop, the calling convention, and the inspection
//! surface external tooling reads machine state through.

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use prettytable::{format as TableFormat, Table};

use crate::alu;
use crate::bytecode::{
  disassemble_instruction, element_index, listing, read_word, unpack_indexed,
  Opcode, CELL_SIZE,
};
use crate::fault::{Fault, Region, Resource};
use crate::frame::{CallStack, StackFrame, NO_CALLER};
use crate::heap::Heap;
use crate::program::{Constant, Program};
use crate::value::Value;

pub const DEFAULT_OPERAND_STACK_CAPACITY : usize = 1024;
pub const DEFAULT_CALL_STACK_DEPTH       : usize = 256;
pub const DEFAULT_HEAP_CELLS             : usize = 65536;

/// The engine's lifecycle. There is no paused state: a cooperative pause
/// returns control to the caller with the machine still `Running`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MachineState {
  Loaded,
  Running,
  Halted,
  Faulted,
}

impl Display for MachineState {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      MachineState::Loaded  => write!(f, "Loaded"),
      MachineState::Running => write!(f, "Running"),
      MachineState::Halted  => write!(f, "Halted"),
      MachineState::Faulted => write!(f, "Faulted"),
    }
  }
}

/**
  A cloneable handle over the engine's cooperative control flags, for
  front-ends that run the engine on a dedicated worker thread. The flags are
  only ever read between instructions, so the engine never blocks or mutates
  mid-instruction on behalf of a controller.
*/
#[derive(Clone)]
pub struct Controller {
  pause_flag : Arc<AtomicBool>,
  stop_flag  : Arc<AtomicBool>,
}

impl Controller {
  pub fn pause(&self) {
    self.pause_flag.store(true, Ordering::Release);
  }

  pub fn resume(&self) {
    self.pause_flag.store(false, Ordering::Release);
  }

  pub fn stop(&self) {
    self.stop_flag.store(true, Ordering::Release);
  }
}

/// A defensive copy of one activation record, for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
  pub function       : String,
  pub locals         : Vec<Value>,
  pub params         : Vec<Value>,
  pub return_address : usize,
}

/// A defensive copy of everything external tooling may inspect. Taking two
/// snapshots without executing an instruction in between yields equal values.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
  pub state     : MachineState,
  pub pc        : usize,
  pub operands  : Vec<Value>,
  pub frames    : Vec<FrameSnapshot>,
  pub memory    : Vec<Value>,
  pub constants : Vec<Constant>,
  pub fault     : Option<Fault>,
}

/**
  The virtual machine. It owns every mutable store (operand stack, call
  stack, heap/globals, instruction pointer) as one cohesive value, so
  independent machines coexist and unit-test in isolation. External consumers
  read state through `snapshot()` and the dump methods; nothing outside this
  struct ever mutates the stores.
*/
pub struct VM {

  // Immutable program image
  program : Program,

  // Memory stores
  operands : Vec<Value>, // The operand stack; its length is the stack pointer
  frames   : CallStack,  // Activation records, indexed by the frame pointer
  heap     : Heap,       // Globals region plus bump-allocated cells

  // Registers
  ip : usize, // Instruction pointer, an absolute byte offset into the code

  state : MachineState,
  fault : Option<Fault>,

  // Capacity of the operand stack; exceeding it is fatal.
  operand_capacity : usize,

  // For tracing computations: print each instruction before executing it.
  trace : bool,

  // Cooperative control surface, shared with `Controller` handles.
  pause_flag : Arc<AtomicBool>,
  stop_flag  : Arc<AtomicBool>,
}

impl VM {

  // region Construction and control surface

  pub fn new(program: Program) -> Result<VM, Fault> {
    VM::with_limits(
      program,
      DEFAULT_OPERAND_STACK_CAPACITY,
      DEFAULT_CALL_STACK_DEPTH,
      DEFAULT_HEAP_CELLS
    )
  }

  /// A machine with explicit resource limits, chiefly so exhaustion paths can
  /// be exercised with small numbers.
  pub fn with_limits(
    program: Program,
    operand_capacity: usize,
    call_stack_depth: usize,
    heap_cells: usize
  ) -> Result<VM, Fault> {
    if program.globals_size() > heap_cells {
      return Err(Fault::MalformedImage(format!(
        "globals size {} exceeds the heap limit of {} cells",
        program.globals_size(), heap_cells
      )));
    }

    let heap = Heap::new(program.globals_size(), heap_cells);
    Ok(VM {
      program,
      operands         : Vec::new(),
      frames           : CallStack::with_capacity(call_stack_depth),
      heap,
      ip               : 0,
      state            : MachineState::Loaded,
      fault            : None,
      operand_capacity,
      trace            : false,
      pause_flag       : Arc::new(AtomicBool::new(false)),
      stop_flag        : Arc::new(AtomicBool::new(false)),
    })
  }

  pub fn set_trace(&mut self, enabled: bool) {
    self.trace = enabled;
  }

  pub fn pause(&self) {
    self.pause_flag.store(true, Ordering::Release);
  }

  pub fn resume(&self) {
    self.pause_flag.store(false, Ordering::Release);
  }

  /// Requests a halt at the next instruction boundary.
  pub fn stop(&self) {
    self.stop_flag.store(true, Ordering::Release);
  }

  /// A handle over the control flags for a front-end thread.
  pub fn controller(&self) -> Controller {
    Controller {
      pause_flag: Arc::clone(&self.pause_flag),
      stop_flag: Arc::clone(&self.stop_flag),
    }
  }

  pub fn state(&self) -> MachineState {
    self.state
  }

  pub fn pc(&self) -> usize {
    self.ip
  }

  pub fn last_fault(&self) -> Option<&Fault> {
    self.fault.as_ref()
  }

  pub fn program(&self) -> &Program {
    &self.program
  }

  // endregion

  // region Execution control

  /**
    Runs until the program halts, faults, is stopped, or a pause is
    requested. A paused machine stays `Running`; clear the pause with
    `resume()` and call `exec()` again to continue.
  */
  pub fn exec(&mut self) -> Result<(), Fault> {
    if self.state == MachineState::Faulted {
      if let Some(fault) = self.fault.clone() {
        return Err(fault);
      }
    }
    self.activate()?;

    while self.state == MachineState::Running {
      if self.stop_flag.swap(false, Ordering::AcqRel) {
        self.state = MachineState::Halted;
        break;
      }
      if self.pause_flag.load(Ordering::Acquire) {
        break;
      }
      self.cycle()?;
    }
    Ok(())
  }

  /// Executes exactly one instruction. Stepping ignores the pause flag; it is
  /// how a paused machine is single-stepped.
  pub fn step(&mut self) -> Result<MachineState, Fault> {
    if self.state == MachineState::Faulted {
      if let Some(fault) = self.fault.clone() {
        return Err(fault);
      }
    }
    self.activate()?;

    if self.state == MachineState::Running {
      if self.stop_flag.swap(false, Ordering::AcqRel) {
        self.state = MachineState::Halted;
      } else {
        self.cycle()?;
      }
    }
    Ok(self.state)
  }

  /// Loaded→Running: push the synthetic frame for `main` with zero-initialized
  /// locals and no caller to return to.
  fn activate(&mut self) -> Result<(), Fault> {
    if self.state != MachineState::Loaded {
      return Ok(());
    }

    let main = self.program.main().clone();
    let limit = self.frames.capacity();
    self.frames.push(&main, NO_CALLER, 0).ok_or(Fault::ResourceExhausted {
      resource: Resource::CallStack, limit, pc: main.address
    })?;
    self.ip = main.address;
    self.state = MachineState::Running;
    Ok(())
  }

  /// One fetch-decode-execute cycle.
  fn cycle(&mut self) -> Result<(), Fault> {
    if self.ip >= self.program.code_size() {
      // Ran off the end of the code store.
      self.state = MachineState::Halted;
      return Ok(());
    }

    let pc = self.ip;
    if self.trace {
      self.trace_cycle(pc);
    }

    match self.dispatch(pc) {
      Ok(()) => Ok(()),
      Err(fault) => {
        // Handlers validate before they mutate, so rewinding the instruction
        // pointer leaves the machine exactly as the faulting instruction
        // found it.
        self.ip = pc;
        self.state = MachineState::Faulted;
        self.fault = Some(fault.clone());
        Err(fault)
      }
    }
  }

  // endregion

  // region Fetch/decode and dispatch

  fn dispatch(&mut self, pc: usize) -> Result<(), Fault> {
    let code_size = self.program.code_size();
    let byte = match self.program.code().get(pc) {
      Some(byte) => *byte,
      None => {
        return Err(Fault::OutOfBounds {
          region: Region::Code, index: pc as i64, limit: code_size, pc
        });
      }
    };
    let opcode = Opcode::try_from(byte)
      .map_err(|_e| Fault::InvalidOpcode { opcode: byte, pc })?;
    self.ip = pc + 1;

    let operand = match opcode.has_operand() {
      true => {
        let word = read_word(self.program.code(), self.ip).ok_or(Fault::OutOfBounds {
          region: Region::Code, index: self.ip as i64, limit: code_size, pc
        })?;
        self.ip += CELL_SIZE;
        word
      }
      false => 0
    };

    match opcode {

      // Constants //
      Opcode::Iconst => {
        self.push_operand(Value::Int(operand as i32), pc)
      }
      Opcode::Cconst => {
        self.push_operand(Value::Char((operand & 0xFFFF) as u16), pc)
      }
      Opcode::Sconst => {
        let value = match self.pool_constant(operand, pc)? {
          Constant::Str(s) => Value::Str(s.clone()),
          other => {
            return Err(Fault::TypeMismatch {
              expected: "string", found: other.kind_name(), pc
            });
          }
        };
        self.push_operand(value, pc)
      }
      Opcode::Fconst => {
        let value = match self.pool_constant(operand, pc)? {
          Constant::Float(x) => Value::Float(*x),
          other => {
            return Err(Fault::TypeMismatch {
              expected: "float", found: other.kind_name(), pc
            });
          }
        };
        self.push_operand(value, pc)
      }

      // Locals //
      Opcode::Load => {
        let value = self.load_local(operand as usize, pc)?;
        self.push_operand(value, pc)
      }
      Opcode::Store => {
        let value = self.operand_at(0, pc)?.clone();
        self.store_local(operand as usize, value, pc)?;
        self.operands.pop();
        Ok(())
      }

      // Globals //
      Opcode::Gload => {
        let value = self.heap.global(operand as usize, pc)?;
        self.push_operand(value, pc)
      }
      Opcode::Gstore => {
        let value = self.operand_at(0, pc)?.clone();
        self.heap.set_global(operand as usize, value, pc)?;
        self.operands.pop();
        Ok(())
      }

      // Structs //
      Opcode::Fload => {
        let base = self.struct_ref_at(0, pc)?;
        let value = self.heap.load_cell(base, operand as usize, Region::Field, pc)?;
        self.shrink_push(1, value);
        Ok(())
      }
      Opcode::Fstore => {
        let value = self.operand_at(0, pc)?.clone();
        let base = self.struct_ref_at(1, pc)?;
        self.heap.store_cell(base, operand as usize, value, Region::Field, pc)?;
        self.operands.truncate(self.operands.len() - 2);
        Ok(())
      }
      Opcode::Struct => {
        self.require_push_room(pc)?;
        let base = self.heap.alloc(operand as usize, pc)?;
        self.operands.push(Value::StructRef(base));
        Ok(())
      }

      // Arrays //
      Opcode::Newarray => {
        self.require_push_room(pc)?;
        let base = self.heap.alloc(operand as usize / CELL_SIZE, pc)?;
        self.operands.push(Value::ArrayRef(base));
        Ok(())
      }
      Opcode::Iaload => {
        let (slot, byte_offset) = unpack_indexed(operand);
        let base = self.array_ref_in_local(slot as usize, pc)?;
        let index = element_index(byte_offset);
        let value = self.heap.load_cell(base, index, Region::Array, pc)?;
        self.push_operand(value, pc)
      }
      Opcode::Iastore => {
        let (slot, byte_offset) = unpack_indexed(operand);
        let value = self.operand_at(0, pc)?.clone();
        let base = self.array_ref_in_local(slot as usize, pc)?;
        let index = element_index(byte_offset);
        self.heap.store_cell(base, index, value, Region::Array, pc)?;
        self.operands.pop();
        Ok(())
      }

      // Calls //
      Opcode::Call => {
        self.call(operand as usize, pc)
      }
      Opcode::Ret => {
        self.ret(pc)
      }

      // Branches //
      Opcode::Br => {
        let target = self.branch_target(operand, pc)?;
        self.ip = target;
        Ok(())
      }
      Opcode::Brt => {
        self.conditional_branch(operand, true, pc)
      }
      Opcode::Brf => {
        self.conditional_branch(operand, false, pc)
      }

      // Integer arithmetic //
      Opcode::Iadd => self.int_binary(pc, alu::iadd),
      Opcode::Isub => self.int_binary(pc, alu::isub),
      Opcode::Imul => self.int_binary(pc, alu::imul),
      Opcode::Idiv => self.int_binary(pc, alu::idiv),
      Opcode::Ishl => self.int_binary(pc, alu::ishl),
      Opcode::Ishr => self.int_binary(pc, alu::ishr),
      Opcode::Iand => self.int_bitwise(pc, alu::iand),
      Opcode::Ior  => self.int_bitwise(pc, alu::ior),
      Opcode::Ixor => self.int_bitwise(pc, alu::ixor),
      Opcode::Ineg => {
        let a = self.int_at(0, pc)?;
        let result = alu::ineg(a, pc)?;
        self.shrink_push(1, Value::Int(result));
        Ok(())
      }
      Opcode::Inot => {
        let a = self.int_at(0, pc)?;
        self.shrink_push(1, Value::Int(alu::inot(a)));
        Ok(())
      }

      // Integer comparison //
      Opcode::Ilt => self.int_compare(pc, |a, b| a < b),
      Opcode::Ile => self.int_compare(pc, |a, b| a <= b),
      Opcode::Igt => self.int_compare(pc, |a, b| a > b),
      Opcode::Ige => self.int_compare(pc, |a, b| a >= b),
      Opcode::Ieq => self.int_compare(pc, |a, b| a == b),
      Opcode::Ine => self.int_compare(pc, |a, b| a != b),

      // Float arithmetic //
      Opcode::Fadd => self.float_binary(pc, alu::fadd),
      Opcode::Fsub => self.float_binary(pc, alu::fsub),
      Opcode::Fmul => self.float_binary(pc, alu::fmul),
      Opcode::Fdiv => {
        let a = self.float_at(1, pc)?;
        let b = self.float_at(0, pc)?;
        let result = alu::fdiv(a, b, pc)?;
        self.shrink_push(2, Value::Float(result));
        Ok(())
      }
      Opcode::Fneg => {
        let a = self.float_at(0, pc)?;
        self.shrink_push(1, Value::Float(alu::fneg(a)));
        Ok(())
      }
      Opcode::Flt => self.float_compare(pc, |a, b| a < b),
      Opcode::Feq => self.float_compare(pc, |a, b| a == b),

      // Conversions //
      Opcode::I2F => {
        let a = self.int_at(0, pc)?;
        self.shrink_push(1, Value::Float(alu::i2f(a)));
        Ok(())
      }
      Opcode::F2I => {
        let a = self.float_at(0, pc)?;
        let result = alu::f2i(a, pc)?;
        self.shrink_push(1, Value::Int(result));
        Ok(())
      }

      // Booleans //
      Opcode::Bnot => {
        let b = self.bool_at(0, pc)?;
        self.shrink_push(1, Value::Bool(!b));
        Ok(())
      }

      // Stack and control //
      Opcode::Pop => {
        self.operand_at(0, pc)?;
        self.operands.pop();
        Ok(())
      }
      Opcode::Dup => {
        let value = self.operand_at(0, pc)?.clone();
        self.push_operand(value, pc)
      }
      Opcode::Null => {
        self.push_operand(Value::Null, pc)
      }
      Opcode::Halt => {
        self.state = MachineState::Halted;
        Ok(())
      }
      Opcode::Nop => {
        Ok(())
      }
    }
  }

  // endregion

  // region Calling convention

  /**
    The call protocol, in order: resolve the function symbol, take exactly
    `nargs` operands off the stack (the value pushed last is argument
    `nargs-1`), activate a frame sized to the callee's locals with the
    arguments in its leading slots, record the caller's post-pop operand
    depth, and jump to the entry address. Every failure is checked before any
    state changes.
  */
  fn call(&mut self, pool_index: usize, pc: usize) -> Result<(), Fault> {
    let symbol = match self.pool_constant(pool_index as u32, pc)? {
      Constant::Function(symbol) => symbol.clone(),
      other => {
        return Err(Fault::TypeMismatch {
          expected: "function", found: other.kind_name(), pc
        });
      }
    };

    let depth = self.operands.len();
    if depth < symbol.nargs {
      return Err(Fault::OutOfBounds {
        region : Region::OperandStack,
        index  : depth as i64 - symbol.nargs as i64,
        limit  : depth,
        pc,
      });
    }
    let saved_operand_depth = depth - symbol.nargs;

    let return_address = self.ip;
    let limit = self.frames.capacity();
    let frame = self.frames
      .push(&symbol, return_address, saved_operand_depth)
      .ok_or(Fault::ResourceExhausted {
        resource: Resource::CallStack, limit, pc
      })?;

    for (index, value) in self.operands.split_off(saved_operand_depth).into_iter().enumerate() {
      frame.set_argument(index, value);
    }
    self.ip = symbol.address;
    Ok(())
  }

  /**
    The return protocol: pop the frame, carry a return value across the
    operand-depth restore if the activation produced one, and resume at the
    saved return address. Returning from the synthetic `main` frame halts.
  */
  fn ret(&mut self, pc: usize) -> Result<(), Fault> {
    let (return_address, saved_operand_depth) =
      self.frames.pop().ok_or(Fault::OutOfBounds {
        region: Region::CallStack, index: -1, limit: 0, pc
      })?;

    let return_value = match self.operands.len() > saved_operand_depth {
      true  => self.operands.pop(),
      false => None
    };
    self.operands.truncate(saved_operand_depth);
    if let Some(value) = return_value {
      self.operands.push(value);
    }

    if return_address == NO_CALLER {
      self.state = MachineState::Halted;
    } else {
      self.ip = return_address;
    }
    Ok(())
  }

  // endregion

  // region Operand-stack and frame helpers

  fn push_operand(&mut self, value: Value, pc: usize) -> Result<(), Fault> {
    self.require_push_room(pc)?;
    self.operands.push(value);
    Ok(())
  }

  fn require_push_room(&self, pc: usize) -> Result<(), Fault> {
    if self.operands.len() == self.operand_capacity {
      return Err(Fault::ResourceExhausted {
        resource: Resource::OperandStack, limit: self.operand_capacity, pc
      });
    }
    Ok(())
  }

  /// The operand `from_top` slots below the top of the stack, without popping.
  fn operand_at(&self, from_top: usize, pc: usize) -> Result<&Value, Fault> {
    let depth = self.operands.len();
    if from_top >= depth {
      return Err(Fault::OutOfBounds {
        region : Region::OperandStack,
        index  : depth as i64 - 1 - from_top as i64,
        limit  : depth,
        pc,
      });
    }
    Ok(&self.operands[depth - 1 - from_top])
  }

  fn int_at(&self, from_top: usize, pc: usize) -> Result<i32, Fault> {
    match self.operand_at(from_top, pc)? {
      Value::Int(i) => Ok(*i),
      other => Err(Fault::TypeMismatch {
        expected: "int", found: other.tag_name(), pc
      })
    }
  }

  fn float_at(&self, from_top: usize, pc: usize) -> Result<f32, Fault> {
    match self.operand_at(from_top, pc)? {
      Value::Float(x) => Ok(*x),
      other => Err(Fault::TypeMismatch {
        expected: "float", found: other.tag_name(), pc
      })
    }
  }

  fn bool_at(&self, from_top: usize, pc: usize) -> Result<bool, Fault> {
    match self.operand_at(from_top, pc)? {
      Value::Bool(b) => Ok(*b),
      other => Err(Fault::TypeMismatch {
        expected: "bool", found: other.tag_name(), pc
      })
    }
  }

  fn struct_ref_at(&self, from_top: usize, pc: usize) -> Result<usize, Fault> {
    match self.operand_at(from_top, pc)? {
      Value::StructRef(base) => Ok(*base),
      Value::Null            => Err(Fault::NullReference { pc }),
      other => Err(Fault::TypeMismatch {
        expected: "struct ref", found: other.tag_name(), pc
      })
    }
  }

  /// Dereferences the array reference held in local `slot` of the active
  /// frame, for the packed indexed-addressing instructions.
  fn array_ref_in_local(&self, slot: usize, pc: usize) -> Result<usize, Fault> {
    match self.load_local(slot, pc)? {
      Value::ArrayRef(base) => Ok(base),
      Value::Null           => Err(Fault::NullReference { pc }),
      other => Err(Fault::TypeMismatch {
        expected: "array ref", found: other.tag_name(), pc
      })
    }
  }

  /// Replaces the top `removed` operands with `value`. Callers have already
  /// peeked at least `removed` operands, so the depth is known sufficient.
  fn shrink_push(&mut self, removed: usize, value: Value) {
    let depth = self.operands.len();
    self.operands.truncate(depth - removed);
    self.operands.push(value);
  }

  fn active_frame(&self, pc: usize) -> Result<&StackFrame, Fault> {
    self.frames.active().ok_or(Fault::OutOfBounds {
      region: Region::CallStack, index: -1, limit: 0, pc
    })
  }

  fn load_local(&self, slot: usize, pc: usize) -> Result<Value, Fault> {
    let frame = self.active_frame(pc)?;
    frame.local(slot).cloned().ok_or(Fault::OutOfBounds {
      region: Region::Local, index: slot as i64, limit: frame.slot_count(), pc
    })
  }

  fn store_local(&mut self, slot: usize, value: Value, pc: usize) -> Result<(), Fault> {
    let frame = self.frames.active_mut().ok_or(Fault::OutOfBounds {
      region: Region::CallStack, index: -1, limit: 0, pc
    })?;
    let limit = frame.slot_count();
    match frame.set_local(slot, value) {
      true  => Ok(()),
      false => Err(Fault::OutOfBounds {
        region: Region::Local, index: slot as i64, limit, pc
      })
    }
  }

  fn pool_constant(&self, index: u32, pc: usize) -> Result<&Constant, Fault> {
    self.program.constants().get(index as usize).ok_or(Fault::OutOfBounds {
      region : Region::ConstantPool,
      index  : index as i64,
      limit  : self.program.constants().len(),
      pc,
    })
  }

  fn branch_target(&self, operand: u32, pc: usize) -> Result<usize, Fault> {
    let target = operand as usize;
    if target >= self.program.code_size() {
      return Err(Fault::OutOfBounds {
        region: Region::Code, index: target as i64, limit: self.program.code_size(), pc
      });
    }
    Ok(target)
  }

  fn conditional_branch(&mut self, operand: u32, jump_on: bool, pc: usize) -> Result<(), Fault> {
    let flag = self.bool_at(0, pc)?;
    let target = self.branch_target(operand, pc)?;
    self.operands.pop();
    if flag == jump_on {
      self.ip = target;
    }
    Ok(())
  }

  // endregion

  // region Arithmetic dispatch helpers

  fn int_binary(
    &mut self,
    pc: usize,
    op: fn(i32, i32, usize) -> Result<i32, Fault>
  ) -> Result<(), Fault> {
    let a = self.int_at(1, pc)?;
    let b = self.int_at(0, pc)?;
    let result = op(a, b, pc)?;
    self.shrink_push(2, Value::Int(result));
    Ok(())
  }

  fn int_bitwise(&mut self, pc: usize, op: fn(i32, i32) -> i32) -> Result<(), Fault> {
    let a = self.int_at(1, pc)?;
    let b = self.int_at(0, pc)?;
    self.shrink_push(2, Value::Int(op(a, b)));
    Ok(())
  }

  fn int_compare(&mut self, pc: usize, op: fn(i32, i32) -> bool) -> Result<(), Fault> {
    let a = self.int_at(1, pc)?;
    let b = self.int_at(0, pc)?;
    self.shrink_push(2, Value::Bool(op(a, b)));
    Ok(())
  }

  fn float_binary(&mut self, pc: usize, op: fn(f32, f32) -> f32) -> Result<(), Fault> {
    let a = self.float_at(1, pc)?;
    let b = self.float_at(0, pc)?;
    self.shrink_push(2, Value::Float(op(a, b)));
    Ok(())
  }

  fn float_compare(&mut self, pc: usize, op: fn(f32, f32) -> bool) -> Result<(), Fault> {
    let a = self.float_at(1, pc)?;
    let b = self.float_at(0, pc)?;
    self.shrink_push(2, Value::Bool(op(a, b)));
    Ok(())
  }

  // endregion

  // region Inspection surface

  /// A defensive copy of everything inspectable. Reading it never perturbs
  /// the machine.
  pub fn snapshot(&self) -> Snapshot {
    Snapshot {
      state     : self.state,
      pc        : self.ip,
      operands  : self.operands.clone(),
      frames    : self.frames.frames().iter().map(|frame| FrameSnapshot {
        function       : frame.function().name.to_string(),
        locals         : frame.locals().to_vec(),
        params         : frame.params().to_vec(),
        return_address : frame.return_address(),
      }).collect(),
      memory    : self.heap.cells().to_vec(),
      constants : self.program.constants().to_vec(),
      fault     : self.fault.clone(),
    }
  }

  /// Disassembles the one instruction at `address`.
  pub fn disassemble(&self, address: usize) -> Option<String> {
    disassemble_instruction(self.program.code(), self.program.constants(), address)
  }

  /// Disassembles the whole code store.
  pub fn disassembly(&self) -> String {
    listing(self.program.code(), self.program.constants())
  }

  /// The full machine-state dump rendered as tables.
  pub fn dump(&self) -> String {
    format!("{}", self)
  }

  fn trace_cycle(&self, pc: usize) {
    if let Some(line) = self.disassemble(pc) {
      let stack = self.operands
        .iter()
        .map(|value| format!("{}", value))
        .collect::<Vec<String>>()
        .join(", ");
      println!("{:<32} [{}]", line, stack);
    }
  }

  fn make_cell_table<T>(name: &str, cells: &[T], highlight: usize) -> Table
    where T: Display
  {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    for (i, cell) in cells.iter().enumerate() {
      match i == highlight {

        true => {
          table.add_row(
            row![r->format!("* --> {}[{}] =", name, i), format!("{}", cell)]
          );
        }

        false => {
          table.add_row(
            row![r->format!("{}[{}] =", name, i), format!("{}", cell)]
          );
        }

      } // end match on highlight
    } // end for
    table
  }

  fn make_frame_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Frame", ubl->"Function", ubl->"Locals", ubl->"Return"]);

    for (i, frame) in self.frames.frames().iter().enumerate() {
      let locals = frame.locals()
        .iter()
        .chain(frame.params().iter())
        .map(|value| format!("{}", value))
        .collect::<Vec<String>>()
        .join(", ");
      let return_address = match frame.return_address() {
        NO_CALLER => String::from("-"),
        address   => format!("{}", address)
      };
      table.add_row(row![
        r->format!("F[{}] =", i),
        format!("{}", frame.function()),
        locals,
        return_address
      ]);
    }
    table
  }

  // endregion
}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for VM {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let operand_highlight = self.operands.len().wrapping_sub(1);
    let operand_table = VM::make_cell_table("S", &self.operands, operand_highlight);
    let memory_table  = VM::make_cell_table("M", self.heap.cells(), self.heap.globals_size());
    let pool_table    = VM::make_cell_table("C", self.program.constants(), usize::MAX);

    let mut combined_table = table!([operand_table, memory_table, pool_table]);
    combined_table.set_titles(row![ub->"Operand Stack", ub->"Memory", ub->"Constant Pool"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    let status = match &self.fault {
      Some(fault) => format!("{} ({})", self.state, fault),
      None        => format!("{}", self.state)
    };

    write!(
      f,
      "State: {}\tip: {}\n{}\n{}",
      status, self.ip, combined_table, self.make_frame_table()
    )
  }
}
