//! Flattens validated instruction trees into jump-resolved code.
//!
//! Structured instructions keep their branch arity and get their targets
//! backpatched, so the runtime label stack is just (arity, height, target)
//! records and a branch is a truncate plus a jump. A `Loop` is its own
//! branch target: re-executing it re-pushes its label.

use wasm::{Module, Instr};


pub(crate) struct Code {
    pub num_params: u32,
    /// declared locals, zero-initialised at entry (parameters excluded).
    pub locals:     Vec<wasm::ValueType>,
    pub num_rets:   u32,
    pub ops:        Vec<Op>,
}

#[derive(Clone, Debug)]
pub(crate) enum Op {
    Unreachable,
    Nop,

    /// `end` is the index of the matching `End`; the label's continuation
    /// is the op after it.
    Block { arity: u32, end: u32 },
    Loop,
    /// `else_target` is where a false condition continues: the first op of
    /// the else body, or the `End` when there is none.
    If { arity: u32, else_target: u32, end: u32 },
    /// reached when the then-branch falls through; skips to the `End`.
    Else { end: u32 },
    End,

    Br      { depth: u32 },
    BrIf    { depth: u32 },
    BrTable { targets: Box<[u32]>, default: u32 },

    Return,
    Call         { func: u32 },
    CallIndirect { ty: u32 },

    Drop,
    Select,

    LocalGet  { idx: u32 },
    LocalSet  { idx: u32 },
    LocalTee  { idx: u32 },
    GlobalGet { idx: u32 },
    GlobalSet { idx: u32 },

    Load  { load:  wasm::Load,  offset: u32 },
    Store { store: wasm::Store, offset: u32 },

    MemorySize,
    MemoryGrow,

    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),

    TestOp(wasm::TestOp),
    RelOp(wasm::RelOp),
    Op1(wasm::Op1),
    Op2(wasm::Op2),
    Convert(wasm::Convert),
    Reinterpret(wasm::Reinterpret),
}


/// Compiles the module's `index`-th own function. The module must have
/// passed validation.
pub(crate) fn compile(module: &Module, index: usize) -> Code {
    let ty = &module.types[module.funcs[index] as usize];
    let code = &module.codes[index];

    let mut ops = Vec::new();
    emit_expr(&code.body, &mut ops);
    // the implicit end of the body, and the function label's target.
    ops.push(Op::Return);

    Code {
        num_params: ty.params.len() as u32,
        locals:     code.locals.clone(),
        num_rets:   ty.rets.len() as u32,
        ops,
    }
}

fn emit_expr(body: &[Instr], ops: &mut Vec<Op>) {
    for instr in body {
        emit_instr(instr, ops);
    }
}

fn emit_instr(instr: &Instr, ops: &mut Vec<Op>) {
    match instr {
        Instr::Unreachable => ops.push(Op::Unreachable),
        Instr::Nop         => ops.push(Op::Nop),

        Instr::Block { ty, body } => {
            let at = ops.len();
            ops.push(Op::Block { arity: ty.arity() as u32, end: 0 });
            emit_expr(body, ops);
            ops.push(Op::End);

            let end = (ops.len() - 1) as u32;
            let Op::Block { end: patch, .. } = &mut ops[at] else { unreachable!() };
            *patch = end;
        }

        Instr::Loop { ty: _, body } => {
            ops.push(Op::Loop);
            emit_expr(body, ops);
            ops.push(Op::End);
        }

        Instr::If { ty, then, els } => {
            let at = ops.len();
            ops.push(Op::If { arity: ty.arity() as u32, else_target: 0, end: 0 });
            emit_expr(then, ops);

            let (else_target, end);
            if els.is_empty() {
                ops.push(Op::End);
                end = (ops.len() - 1) as u32;
                else_target = end;
            }
            else {
                let else_at = ops.len();
                ops.push(Op::Else { end: 0 });
                emit_expr(els, ops);
                ops.push(Op::End);

                end = (ops.len() - 1) as u32;
                else_target = else_at as u32 + 1;
                let Op::Else { end: patch } = &mut ops[else_at] else { unreachable!() };
                *patch = end;
            }

            let Op::If { else_target: et, end: e, .. } = &mut ops[at] else { unreachable!() };
            *et = else_target;
            *e = end;
        }

        Instr::Br(label)   => ops.push(Op::Br { depth: *label }),
        Instr::BrIf(label) => ops.push(Op::BrIf { depth: *label }),

        Instr::BrTable { labels, default } => {
            ops.push(Op::BrTable {
                targets: labels.clone().into_boxed_slice(),
                default: *default,
            });
        }

        Instr::Return            => ops.push(Op::Return),
        Instr::Call(func)        => ops.push(Op::Call { func: *func }),
        Instr::CallIndirect(ty)  => ops.push(Op::CallIndirect { ty: *ty }),

        Instr::Drop   => ops.push(Op::Drop),
        Instr::Select => ops.push(Op::Select),

        Instr::LocalGet(idx)  => ops.push(Op::LocalGet { idx: *idx }),
        Instr::LocalSet(idx)  => ops.push(Op::LocalSet { idx: *idx }),
        Instr::LocalTee(idx)  => ops.push(Op::LocalTee { idx: *idx }),
        Instr::GlobalGet(idx) => ops.push(Op::GlobalGet { idx: *idx }),
        Instr::GlobalSet(idx) => ops.push(Op::GlobalSet { idx: *idx }),

        Instr::Load { load, memarg } => {
            ops.push(Op::Load { load: *load, offset: memarg.offset });
        }

        Instr::Store { store, memarg } => {
            ops.push(Op::Store { store: *store, offset: memarg.offset });
        }

        Instr::MemorySize => ops.push(Op::MemorySize),
        Instr::MemoryGrow => ops.push(Op::MemoryGrow),

        Instr::I32Const(value) => ops.push(Op::I32Const(*value)),
        Instr::I64Const(value) => ops.push(Op::I64Const(*value)),
        Instr::F32Const(value) => ops.push(Op::F32Const(*value)),
        Instr::F64Const(value) => ops.push(Op::F64Const(*value)),

        Instr::TestOp(op)      => ops.push(Op::TestOp(*op)),
        Instr::RelOp(op)       => ops.push(Op::RelOp(*op)),
        Instr::Op1(op)         => ops.push(Op::Op1(*op)),
        Instr::Op2(op)         => ops.push(Op::Op2(*op)),
        Instr::Convert(op)     => ops.push(Op::Convert(*op)),
        Instr::Reinterpret(op) => ops.push(Op::Reinterpret(*op)),
    }
}
