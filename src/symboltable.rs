use bimap::BiMap;
use string_cache::DefaultAtom;

/**
  A symbol table is a mapping between function names and the constant-pool
  index of the corresponding function symbol. It resolves `main` at load time
  and lets the disassembler label call targets. A symbol table is really just
  a convenience wrapper around a BiMap.

*/
#[derive(Debug)]
pub struct SymbolTable {
  table: BiMap<DefaultAtom, usize>
}

impl SymbolTable {

  pub fn new() -> SymbolTable {
    SymbolTable {
      table: BiMap::new()
    }
  }

  pub fn get_name(&self, pool_index: usize) -> Option<DefaultAtom> {
    self.table.get_by_right(&pool_index).cloned()
  }

  pub fn get_pool_index(&self, name: &str) -> Option<usize> {
    self.table.get_by_left(&DefaultAtom::from(name)).cloned()
  }

  pub fn insert(&mut self, name: DefaultAtom, pool_index: usize)
    -> Result<(), (DefaultAtom, usize)> {
    self.table.insert_no_overwrite(name, pool_index)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookups_work_both_directions() {
    let mut symbols = SymbolTable::new();
    symbols.insert(DefaultAtom::from("main"), 0).unwrap();
    symbols.insert(DefaultAtom::from("add2"), 3).unwrap();

    assert_eq!(symbols.get_pool_index("add2"), Some(3));
    assert_eq!(symbols.get_name(0), Some(DefaultAtom::from("main")));
    assert_eq!(symbols.get_pool_index("absent"), None);
  }

  #[test]
  fn duplicate_names_are_rejected() {
    let mut symbols = SymbolTable::new();
    symbols.insert(DefaultAtom::from("f"), 0).unwrap();
    assert!(symbols.insert(DefaultAtom::from("f"), 1).is_err());
  }
}
