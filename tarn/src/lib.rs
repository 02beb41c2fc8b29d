mod value;
mod num;
mod memory;
mod table;
mod global;
mod store;
mod interp;

pub use value::Value;
pub use store::{
    Store, Extern, HostFn,
    InstanceId, FuncAddr, TableAddr, MemAddr, GlobalAddr,
};


/// An execution failure. Traps unwind the invocation they occur in and leave
/// the store as the already-performed writes left it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind}")]
pub struct Trap {
    kind: TrapKind,
}

impl Trap {
    #[inline]
    pub fn new(kind: TrapKind) -> Trap {
        Trap { kind }
    }

    #[inline]
    pub fn kind(&self) -> TrapKind {
        self.kind
    }
}

/// The reason strings follow the reference test suite, which matches on
/// them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TrapKind {
    #[error("unreachable")]
    Unreachable,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    #[error("undefined element")]
    UndefinedElement,
    #[error("uninitialized element")]
    UninitializedElement,
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    #[error("call stack exhausted")]
    CallStackExhausted,
    #[error("elements segment does not fit")]
    ElemSegmentDoesNotFit,
    #[error("data segment does not fit")]
    DataSegmentDoesNotFit,
    #[error("host function error")]
    HostError,
}


/// Instantiation-time linking failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("expected {expected} imports, got {provided}")]
    ImportCount { expected: usize, provided: usize },
    #[error("import {module}::{name}: incompatible import kind")]
    KindMismatch { module: String, name: String },
    #[error("import {module}::{name}: incompatible function type")]
    FuncTypeMismatch { module: String, name: String },
    #[error("import {module}::{name}: incompatible limits")]
    LimitsNotSubsumed { module: String, name: String },
    #[error("import {module}::{name}: incompatible global type")]
    GlobalTypeMismatch { module: String, name: String },
}


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decode: {0}")]
    Parse(#[from] wasm::ParseError),
    #[error("validation: {0}")]
    Validate(#[from] wasm::ValidateError),
    #[error("link: {0}")]
    Link(#[from] LinkError),
    #[error(transparent)]
    Trap(#[from] Trap),
    #[error("argument types do not match the function signature")]
    ArgumentTypes,
    #[error("value type does not match")]
    ValueType,
    #[error("global is immutable")]
    ImmutableGlobal,
    #[error("out of range access")]
    OutOfRange,
    #[error("resource limits exceeded")]
    ResourceLimit,
}

impl Error {
    /// The trap behind this error, if execution trapped.
    pub fn as_trap(&self) -> Option<Trap> {
        match self {
            Error::Trap(trap) => Some(*trap),
            _ => None,
        }
    }
}
