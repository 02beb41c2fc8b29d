use wasm::Limits;

use crate::{Trap, TrapKind};
use crate::store::FuncAddr;


/// A funcref table: a dense array of optional function addresses.
pub(crate) struct TableInst {
    max:   Option<u32>,
    elems: Vec<Option<FuncAddr>>,
}

impl TableInst {
    pub fn new(limits: Limits) -> TableInst {
        TableInst {
            max:   limits.max,
            elems: vec![None; limits.min as usize],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn limits(&self) -> Limits {
        Limits { min: self.elems.len() as u32, max: self.max }
    }

    /// Indexing past the end is the "undefined element" trap of
    /// `call_indirect`.
    #[inline]
    pub fn get(&self, idx: u32) -> Result<Option<FuncAddr>, Trap> {
        self.elems.get(idx as usize).copied()
            .ok_or_else(|| Trap::new(TrapKind::UndefinedElement))
    }

    #[inline]
    pub fn set(&mut self, idx: u32, value: Option<FuncAddr>) -> Result<(), Trap> {
        let slot = self.elems.get_mut(idx as usize)
            .ok_or_else(|| Trap::new(TrapKind::UndefinedElement))?;
        *slot = value;
        Ok(())
    }
}
