//! The calling convention, end to end: argument passing, frame activation,
//! operand-depth bookkeeping across returns, and the faults the protocol can
//! raise.

mod common;

use pretty_assertions::assert_eq;

use common::*;
use stackvm::bytecode::Opcode;
use stackvm::{
  Constant, Fault, FunctionSymbol, MachineState, Region, Resource, Value,
};

#[test]
fn calling_add2_leaves_its_sum_and_restores_the_call_stack() {
  // main: push 5, push 6, call add2, halt
  // add2(a, b) = a + b
  let mut image = Image::new();
  image
    .op1(Opcode::Iconst, 5)
    .op1(Opcode::Iconst, 6);
  let call_at = image.here();
  image
    .op1(Opcode::Call, 0)
    .op(Opcode::Halt);

  let entry = image.here();
  image
    .op1(Opcode::Load, 0)
    .op1(Opcode::Load, 1)
    .op(Opcode::Iadd)
    .op(Opcode::Ret);
  image.constant(Constant::Function(FunctionSymbol::new("add2", entry, 2, 2)));

  let mut vm = boot(&image);
  // Step to just after the call to observe the callee frame.
  vm.step().unwrap();
  vm.step().unwrap();
  vm.step().unwrap();
  let mid = vm.snapshot();
  assert_eq!(mid.frames.len(), 2);
  assert_eq!(mid.frames[1].function, "add2");
  // Arguments landed in the leading local slots, left to right.
  assert_eq!(mid.frames[1].locals, vec![Value::Int(5), Value::Int(6)]);
  assert_eq!(mid.frames[1].return_address, call_at + 5);
  // The caller's operands were consumed by the call.
  assert_eq!(mid.operands, vec![]);

  vm.exec().unwrap();
  assert_eq!(vm.state(), MachineState::Halted);
  let end = vm.snapshot();
  assert_eq!(end.operands, vec![Value::Int(11)]);
  assert_eq!(end.frames.len(), 1);
  assert_eq!(end.frames[0].function, "main");
}

#[test]
fn a_void_function_leaves_the_operand_depth_unchanged() {
  // noop() has no body beyond ret; the caller's stack is undisturbed.
  let mut image = Image::new();
  image
    .op1(Opcode::Iconst, 99)
    .op1(Opcode::Call, 0)
    .op(Opcode::Halt);
  let entry = image.here();
  image.op(Opcode::Ret);
  image.constant(Constant::Function(FunctionSymbol::new("noop", entry, 0, 0)));

  let vm = run(&image);
  // Depth before the call == depth after: just the unrelated 99.
  assert_eq!(vm.snapshot().operands, vec![Value::Int(99)]);
}

#[test]
fn a_value_returning_function_adds_exactly_one_operand() {
  let mut image = Image::new();
  image
    .op1(Opcode::Call, 0)
    .op(Opcode::Halt);
  let entry = image.here();
  image.op1(Opcode::Iconst, 7).op(Opcode::Ret);
  image.constant(Constant::Function(FunctionSymbol::new("seven", entry, 0, 0)));

  let vm = run(&image);
  assert_eq!(vm.snapshot().operands, vec![Value::Int(7)]);
}

#[test]
fn residual_operands_of_an_activation_are_discarded_on_return() {
  // The callee litters the stack before producing its result; ret restores
  // the recorded depth and carries only the topmost value across.
  let mut image = Image::new();
  image
    .op1(Opcode::Iconst, 1)
    .op1(Opcode::Call, 0)
    .op(Opcode::Halt);
  let entry = image.here();
  image
    .op1(Opcode::Iconst, 100) // residual
    .op1(Opcode::Iconst, 200) // residual
    .op1(Opcode::Iconst, 42)  // the return value
    .op(Opcode::Ret);
  image.constant(Constant::Function(FunctionSymbol::new("messy", entry, 0, 0)));

  let vm = run(&image);
  assert_eq!(vm.snapshot().operands, vec![Value::Int(1), Value::Int(42)]);
}

#[test]
fn arguments_beyond_the_local_capacity_spill_into_the_parameter_area() {
  // third(a, b, c) = c, with only one local slot declared: slots 1 and 2
  // fall through to the parameter area.
  let mut image = Image::new();
  image
    .op1(Opcode::Iconst, 10)
    .op1(Opcode::Iconst, 20)
    .op1(Opcode::Iconst, 30)
    .op1(Opcode::Call, 0)
    .op(Opcode::Halt);
  let entry = image.here();
  image.op1(Opcode::Load, 2).op(Opcode::Ret);
  image.constant(Constant::Function(FunctionSymbol::new("third", entry, 3, 1)));

  let mut vm = boot(&image);
  for _ in 0..4 {
    vm.step().unwrap();
  }
  let mid = vm.snapshot();
  assert_eq!(mid.frames[1].locals, vec![Value::Int(10)]);
  assert_eq!(mid.frames[1].params, vec![Value::Int(20), Value::Int(30)]);

  vm.exec().unwrap();
  assert_eq!(vm.snapshot().operands, vec![Value::Int(30)]);
}

#[test]
fn calling_with_too_few_operands_is_an_underflow_not_a_default() {
  let mut image = Image::new();
  image
    .op1(Opcode::Iconst, 5);
  let call_at = image.here();
  image
    .op1(Opcode::Call, 0)
    .op(Opcode::Halt);
  let entry = image.here();
  image.op(Opcode::Ret);
  image.constant(Constant::Function(FunctionSymbol::new("add2", entry, 2, 2)));

  let (vm, fault) = run_expect_fault(&image);
  assert!(matches!(
    fault,
    Fault::OutOfBounds { region: Region::OperandStack, pc, .. } if pc == call_at
  ));
  // Nothing was consumed by the failed call.
  assert_eq!(vm.snapshot().operands, vec![Value::Int(5)]);
}

#[test]
fn ret_in_main_returns_to_the_no_caller_sentinel_and_halts() {
  let mut image = Image::new();
  image.op(Opcode::Ret);

  let mut vm = boot(&image);
  assert_eq!(vm.step().unwrap(), MachineState::Halted);
  assert_eq!(vm.snapshot().frames.len(), 0);
}

#[test]
fn unbounded_recursion_exhausts_the_call_stack() {
  let mut image = Image::new();
  image
    .op1(Opcode::Call, 0)
    .op(Opcode::Halt);
  let entry = image.here();
  image.op1(Opcode::Call, 0).op(Opcode::Ret);
  image.constant(Constant::Function(FunctionSymbol::new("forever", entry, 0, 0)));

  let mut vm = boot_with_limits(&image, 64, 8, 1024);
  let fault = vm.exec().unwrap_err();
  assert_eq!(vm.state(), MachineState::Faulted);
  assert!(matches!(
    fault,
    Fault::ResourceExhausted { resource: Resource::CallStack, limit: 8, .. }
  ));
  assert_eq!(vm.snapshot().frames.len(), 8);
}

#[test]
fn nested_calls_resume_their_callers_in_order() {
  // main calls outer; outer calls inner twice and sums the results.
  let mut image = Image::new();
  image
    .op1(Opcode::Call, 0)
    .op(Opcode::Halt);

  let outer_entry = image.here();
  image
    .op1(Opcode::Call, 1)
    .op1(Opcode::Call, 1)
    .op(Opcode::Iadd)
    .op(Opcode::Ret);

  let inner_entry = image.here();
  image.op1(Opcode::Iconst, 21).op(Opcode::Ret);

  image.constant(Constant::Function(FunctionSymbol::new("outer", outer_entry, 0, 0)));
  image.constant(Constant::Function(FunctionSymbol::new("inner", inner_entry, 0, 0)));

  let vm = run(&image);
  assert_eq!(vm.snapshot().operands, vec![Value::Int(42)]);
  assert_eq!(vm.snapshot().frames.len(), 1);
}

#[test]
fn a_deep_but_bounded_recursion_unwinds_cleanly() {
  // depth(n) = n == 0 ? 0 : depth(n - 1); every activation reuses a frame
  // slot on the way back down.
  let mut image = Image::new();
  image
    .op1(Opcode::Iconst, 20)
    .op1(Opcode::Call, 0)
    .op(Opcode::Halt);

  let entry = image.here();
  image
    .op1(Opcode::Load, 0)
    .op1(Opcode::Iconst, 0)
    .op(Opcode::Ieq);
  let brt_at = image.here();
  // brt(5) load(5) iconst(5) isub(1) call(5) ret(1)
  let base_case = (brt_at + 22) as u32;
  image
    .op1(Opcode::Brt, base_case)
    .op1(Opcode::Load, 0)
    .op1(Opcode::Iconst, 1)
    .op(Opcode::Isub)
    .op1(Opcode::Call, 0)
    .op(Opcode::Ret);
  image.op1(Opcode::Iconst, 0).op(Opcode::Ret);
  image.constant(Constant::Function(FunctionSymbol::new("depth", entry, 1, 1)));

  let vm = run(&image);
  assert_eq!(vm.snapshot().operands, vec![Value::Int(0)]);
  assert_eq!(vm.snapshot().frames.len(), 1);
}
