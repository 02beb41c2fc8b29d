use wasm::GlobalType;

use crate::Value;


pub(crate) struct GlobalInst {
    ty:    GlobalType,
    value: Value,
}

impl GlobalInst {
    pub fn new(ty: GlobalType, value: Value) -> GlobalInst {
        debug_assert_eq!(value.ty(), ty.ty);
        GlobalInst { ty, value }
    }

    #[inline]
    pub fn ty(&self) -> GlobalType {
        self.ty
    }

    #[inline]
    pub fn get(&self) -> Value {
        self.value
    }

    /// Unchecked write, for validated code. The host path goes through
    /// `Store::global_set`, which checks type and mutability.
    #[inline]
    pub fn set(&mut self, value: Value) {
        debug_assert_eq!(value.ty(), self.ty.ty);
        self.value = value;
    }
}
