/*!

  A stack-based bytecode virtual machine. The machine consumes an already
  built program image (code bytes, constant pool, function table, globals
  size) produced by an upstream assembler, and exposes execution control
  (run/step/trace), a cooperative pause/stop surface, and read-only
  inspection of every store. The heap is a bump allocator: references are
  indices into a flat cell array, nothing is reclaimed, and every access is
  bounds-checked against the allocation it targets.

  What the machine does NOT do: parse anything, verify reachable branches at
  load time, collect garbage, or recover from faults. Any unit-level failure
  carries the faulting program counter and permanently faults the machine.

*/

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

pub mod alu;
pub mod bytecode;
pub mod fault;
pub mod frame;
pub mod function;
pub mod heap;
pub mod program;
pub mod symboltable;
pub mod value;
pub mod vm;

pub use fault::{Fault, Region, Resource};
pub use function::FunctionSymbol;
pub use program::{Constant, Program};
pub use symboltable::SymbolTable;
pub use value::Value;
pub use vm::{Controller, FrameSnapshot, MachineState, Snapshot, VM};
