use wasm::ValueType;


#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn ty(self) -> ValueType {
        use Value::*;
        match self {
            I32(_) => ValueType::I32,
            I64(_) => ValueType::I64,
            F32(_) => ValueType::F32,
            F64(_) => ValueType::F64,
        }
    }

    pub fn zero(ty: ValueType) -> Value {
        match ty {
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::F64 => Value::F64(0.0),
        }
    }

    // the accessors are only reachable on validated code, where the operand
    // types are known.

    #[inline]
    pub(crate) fn as_i32(self) -> i32 {
        match self { Value::I32(v) => v, _ => unreachable!() }
    }

    #[inline]
    pub(crate) fn as_u32(self) -> u32 {
        self.as_i32() as u32
    }

    #[inline]
    pub(crate) fn as_i64(self) -> i64 {
        match self { Value::I64(v) => v, _ => unreachable!() }
    }

    #[inline]
    pub(crate) fn as_u64(self) -> u64 {
        self.as_i64() as u64
    }

    #[inline]
    pub(crate) fn as_f32(self) -> f32 {
        match self { Value::F32(v) => v, _ => unreachable!() }
    }

    #[inline]
    pub(crate) fn as_f64(self) -> f64 {
        match self { Value::F64(v) => v, _ => unreachable!() }
    }
}
