//! The flat memory store: one growable array of value cells shared by the
//! globals region and the bump-allocated heap. Nothing is ever reclaimed; the
//! allocation cursor only advances.
//!
//! Each allocation is laid out as a header cell holding the allocation's
//! length followed by that many payload cells. A struct or array reference is
//! the index of the first payload cell, so the header is always one cell
//! behind the reference and every access can be validated against it.

use crate::fault::{Fault, Region, Resource};
use crate::value::Value;

#[derive(Debug)]
pub struct Heap {
  cells        : Vec<Value>,
  globals_size : usize,
  limit        : usize,
}

impl Heap {

  /// A fresh store with the globals region zero-initialized.
  pub fn new(globals_size: usize, limit: usize) -> Heap {
    Heap {
      cells: vec![Value::zero(); globals_size],
      globals_size,
      limit,
    }
  }

  /// Bump-allocates `ncells` zero-initialized cells behind a header cell and
  /// returns the reference index of the first payload cell.
  pub fn alloc(&mut self, ncells: usize, pc: usize) -> Result<usize, Fault> {
    let needed = self.cells.len() + ncells + 1;
    if needed > self.limit {
      return Err(Fault::ResourceExhausted {
        resource: Resource::Heap, limit: self.limit, pc
      });
    }

    self.cells.push(Value::Int(ncells as i32));
    let base = self.cells.len();
    self.cells.resize(base + ncells, Value::zero());
    Ok(base)
  }

  /// The recorded length of the allocation referenced by `base`.
  fn length_of(&self, base: usize) -> usize {
    // A reference index is only ever minted by `alloc`, which writes the
    // header immediately before the payload.
    match base.checked_sub(1).and_then(|header| self.cells.get(header)) {
      Some(Value::Int(n)) => *n as usize,
      _                   => 0
    }
  }

  /// Reads payload cell `offset` of the allocation at `base`, bounds-checked
  /// against the allocation header.
  pub fn load_cell(
    &self,
    base: usize,
    offset: usize,
    region: Region,
    pc: usize
  ) -> Result<Value, Fault> {
    let length = self.length_of(base);
    if offset >= length {
      return Err(Fault::OutOfBounds {
        region, index: offset as i64, limit: length, pc
      });
    }
    Ok(self.cells[base + offset].clone())
  }

  /// Writes payload cell `offset` of the allocation at `base`, bounds-checked
  /// against the allocation header.
  pub fn store_cell(
    &mut self,
    base: usize,
    offset: usize,
    value: Value,
    region: Region,
    pc: usize
  ) -> Result<(), Fault> {
    let length = self.length_of(base);
    if offset >= length {
      return Err(Fault::OutOfBounds {
        region, index: offset as i64, limit: length, pc
      });
    }
    self.cells[base + offset] = value;
    Ok(())
  }

  /// Direct read of the flat array, bounds-checked against the current size.
  pub fn global(&self, address: usize, pc: usize) -> Result<Value, Fault> {
    self.cells.get(address).cloned().ok_or(Fault::OutOfBounds {
      region: Region::Heap, index: address as i64, limit: self.cells.len(), pc
    })
  }

  /// Direct write of the flat array, bounds-checked against the current size.
  pub fn set_global(&mut self, address: usize, value: Value, pc: usize) -> Result<(), Fault> {
    let limit = self.cells.len();
    match self.cells.get_mut(address) {
      Some(cell) => {
        *cell = value;
        Ok(())
      }
      None => Err(Fault::OutOfBounds {
        region: Region::Heap, index: address as i64, limit, pc
      })
    }
  }

  pub fn globals_size(&self) -> usize {
    self.globals_size
  }

  pub fn len(&self) -> usize {
    self.cells.len()
  }

  pub fn cells(&self) -> &[Value] {
    &self.cells
  }
}
