use std::rc::Rc;

use wasm::{Load as LoadOp, Store as StoreOp, TestOp, RelOp, Op1, Op2, Convert, Reinterpret};

use crate::{Trap, TrapKind, Value};
use crate::num;
use crate::memory::MemoryInst;
use crate::store::{Store, FuncAddr, FuncInst, InstanceId};
use super::compiler::{Code, Op};
use super::stack::{Label, Frame};


/// Runs a wasm function to completion. Traps unwind the whole invocation;
/// the per-invocation stacks live on this call's locals, so a host function
/// may re-enter the store.
pub(crate) fn invoke(store: &mut Store, func: FuncAddr, args: &[Value]) -> Result<Vec<Value>, Trap> {
    let mut values: Vec<Value> = args.to_vec();
    let mut labels: Vec<Label> = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();

    // the running frame's registers.
    let (mut frame, mut code) = activate(store, func, &mut values, &mut labels);
    let mut pc: usize = 0;

    loop {
        let op = code.ops[pc].clone();
        pc += 1;

        match op {
            Op::Unreachable => return Err(Trap::new(TrapKind::Unreachable)),

            Op::Nop => {}

            Op::Block { arity, end } => {
                labels.push(Label {
                    arity,
                    height: values.len(),
                    target: end as usize + 1,
                });
            }

            Op::Loop => {
                // a branch here re-executes this op and re-pushes the label.
                labels.push(Label {
                    arity:  0,
                    height: values.len(),
                    target: pc - 1,
                });
            }

            Op::If { arity, else_target, end } => {
                let cond = pop(&mut values).as_i32();
                labels.push(Label {
                    arity,
                    height: values.len(),
                    target: end as usize + 1,
                });
                if cond == 0 {
                    pc = else_target as usize;
                }
            }

            Op::Else { end } => {
                // the then-branch fell through; its End pops the label.
                pc = end as usize;
            }

            Op::End => {
                labels.pop();
            }

            Op::Br { depth } => {
                branch(depth, &mut values, &mut labels, &mut pc);
            }

            Op::BrIf { depth } => {
                let cond = pop(&mut values).as_i32();
                if cond != 0 {
                    branch(depth, &mut values, &mut labels, &mut pc);
                }
            }

            Op::BrTable { targets, default } => {
                let i = pop(&mut values).as_u32() as usize;
                let depth = targets.get(i).copied().unwrap_or(default);
                branch(depth, &mut values, &mut labels, &mut pc);
            }

            Op::Return => {
                let keep = code.num_rets as usize;
                let tail = values.split_off(values.len() - keep);
                values.truncate(frame.height);
                values.extend(tail);
                labels.truncate(frame.label_base);

                match frames.pop() {
                    Some(prev) => {
                        frame = prev;
                        code = frame.code.clone();
                        pc = frame.pc;
                    }
                    None => {
                        return Ok(values);
                    }
                }
            }

            Op::Call { func } => {
                let addr = store.instances[frame.instance.0 as usize].funcs[func as usize];
                call(store, addr, &mut values, &mut labels, &mut frames,
                     &mut frame, &mut code, &mut pc)?;
            }

            Op::CallIndirect { ty } => {
                let i = pop(&mut values).as_u32();

                let inst = &store.instances[frame.instance.0 as usize];
                let table = inst.tables[0];
                let addr = store.tables[table.0 as usize].get(i)?
                    .ok_or_else(|| Trap::new(TrapKind::UninitializedElement))?;

                if store.funcs[addr.0 as usize].ty() != &inst.types[ty as usize] {
                    return Err(Trap::new(TrapKind::IndirectCallTypeMismatch));
                }

                call(store, addr, &mut values, &mut labels, &mut frames,
                     &mut frame, &mut code, &mut pc)?;
            }

            Op::Drop => {
                pop(&mut values);
            }

            Op::Select => {
                let cond = pop(&mut values).as_i32();
                let (b, a) = (pop(&mut values), pop(&mut values));
                values.push(if cond != 0 { a } else { b });
            }

            Op::LocalGet { idx } => {
                values.push(frame.locals[idx as usize]);
            }

            Op::LocalSet { idx } => {
                frame.locals[idx as usize] = pop(&mut values);
            }

            Op::LocalTee { idx } => {
                frame.locals[idx as usize] = top(&values);
            }

            Op::GlobalGet { idx } => {
                let addr = store.instances[frame.instance.0 as usize].globals[idx as usize];
                values.push(store.globals[addr.0 as usize].get());
            }

            Op::GlobalSet { idx } => {
                let value = pop(&mut values);
                let addr = store.instances[frame.instance.0 as usize].globals[idx as usize];
                store.globals[addr.0 as usize].set(value);
            }

            Op::Load { load, offset } => {
                let addr = pop(&mut values).as_u32();
                let mem = memory(store, frame.instance);
                let value = match load {
                    LoadOp::I32     => Value::I32(i32::from_le_bytes(mem.load(addr, offset)?)),
                    LoadOp::I32_8S  => Value::I32(i8::from_le_bytes(mem.load(addr, offset)?) as i32),
                    LoadOp::I32_8U  => Value::I32(u8::from_le_bytes(mem.load(addr, offset)?) as i32),
                    LoadOp::I32_16S => Value::I32(i16::from_le_bytes(mem.load(addr, offset)?) as i32),
                    LoadOp::I32_16U => Value::I32(u16::from_le_bytes(mem.load(addr, offset)?) as i32),

                    LoadOp::I64     => Value::I64(i64::from_le_bytes(mem.load(addr, offset)?)),
                    LoadOp::I64_8S  => Value::I64(i8::from_le_bytes(mem.load(addr, offset)?) as i64),
                    LoadOp::I64_8U  => Value::I64(u8::from_le_bytes(mem.load(addr, offset)?) as i64),
                    LoadOp::I64_16S => Value::I64(i16::from_le_bytes(mem.load(addr, offset)?) as i64),
                    LoadOp::I64_16U => Value::I64(u16::from_le_bytes(mem.load(addr, offset)?) as i64),
                    LoadOp::I64_32S => Value::I64(i32::from_le_bytes(mem.load(addr, offset)?) as i64),
                    LoadOp::I64_32U => Value::I64(u32::from_le_bytes(mem.load(addr, offset)?) as i64),

                    LoadOp::F32 => Value::F32(f32::from_le_bytes(mem.load(addr, offset)?)),
                    LoadOp::F64 => Value::F64(f64::from_le_bytes(mem.load(addr, offset)?)),
                };
                values.push(value);
            }

            Op::Store { store: op, offset } => {
                let value = pop(&mut values);
                let addr = pop(&mut values).as_u32();
                let mem = memory_mut(store, frame.instance);
                match op {
                    StoreOp::I32    => mem.store(addr, offset, value.as_i32().to_le_bytes())?,
                    StoreOp::I32_8  => mem.store(addr, offset, (value.as_i32() as u8).to_le_bytes())?,
                    StoreOp::I32_16 => mem.store(addr, offset, (value.as_i32() as u16).to_le_bytes())?,

                    StoreOp::I64    => mem.store(addr, offset, value.as_i64().to_le_bytes())?,
                    StoreOp::I64_8  => mem.store(addr, offset, (value.as_i64() as u8).to_le_bytes())?,
                    StoreOp::I64_16 => mem.store(addr, offset, (value.as_i64() as u16).to_le_bytes())?,
                    StoreOp::I64_32 => mem.store(addr, offset, (value.as_i64() as u32).to_le_bytes())?,

                    StoreOp::F32 => mem.store(addr, offset, value.as_f32().to_le_bytes())?,
                    StoreOp::F64 => mem.store(addr, offset, value.as_f64().to_le_bytes())?,
                }
            }

            Op::MemorySize => {
                let pages = memory(store, frame.instance).size_pages();
                values.push(Value::I32(pages as i32));
            }

            Op::MemoryGrow => {
                let by_pages = pop(&mut values).as_u32();
                let result = match memory_mut(store, frame.instance).grow(by_pages) {
                    Some(prev) => prev as i32,
                    None       => -1,
                };
                values.push(Value::I32(result));
            }

            Op::I32Const(value) => values.push(Value::I32(value)),
            Op::I64Const(value) => values.push(Value::I64(value)),
            Op::F32Const(value) => values.push(Value::F32(value)),
            Op::F64Const(value) => values.push(Value::F64(value)),

            Op::TestOp(op) => {
                let result = match op {
                    TestOp::I32_EQZ => pop(&mut values).as_i32() == 0,
                    TestOp::I64_EQZ => pop(&mut values).as_i64() == 0,
                };
                values.push(Value::I32(result as i32));
            }

            Op::RelOp(op) => {
                relop(op, &mut values);
            }

            Op::Op1(op) => {
                op1(op, &mut values);
            }

            Op::Op2(op) => {
                op2(op, &mut values)?;
            }

            Op::Convert(op) => {
                convert(op, &mut values)?;
            }

            Op::Reinterpret(op) => {
                let value = pop(&mut values);
                values.push(match op {
                    Reinterpret::I32_FROM_F32 => Value::I32(value.as_f32().to_bits() as i32),
                    Reinterpret::F32_FROM_I32 => Value::F32(f32::from_bits(value.as_u32())),
                    Reinterpret::I64_FROM_F64 => Value::I64(value.as_f64().to_bits() as i64),
                    Reinterpret::F64_FROM_I64 => Value::F64(f64::from_bits(value.as_u64())),
                });
            }
        }
    }
}


// validation guarantees the stack discipline; these only document it.

#[inline]
fn pop(values: &mut Vec<Value>) -> Value {
    values.pop().unwrap()
}

#[inline]
fn top(values: &[Value]) -> Value {
    *values.last().unwrap()
}

/// Unwinds to the label `depth` levels up: carry the top `arity` values,
/// drop everything the unwound labels covered, continue at the target.
fn branch(depth: u32, values: &mut Vec<Value>, labels: &mut Vec<Label>, pc: &mut usize) {
    let idx = labels.len() - 1 - depth as usize;
    let label = labels[idx];

    let tail = values.split_off(values.len() - label.arity as usize);
    values.truncate(label.height);
    values.extend(tail);

    labels.truncate(idx);
    *pc = label.target;
}

/// Builds the frame and function label for a call to `func` and hands back
/// the new register state. The arguments are on top of `values`.
fn activate(
    store: &Store,
    func: FuncAddr,
    values: &mut Vec<Value>,
    labels: &mut Vec<Label>,
) -> (Frame, Rc<Code>) {
    let FuncInst::Wasm(f) = &store.funcs[func.0 as usize] else {
        unreachable!("host functions are dispatched by the caller")
    };
    let code = f.code.clone();

    let num_params = code.num_params as usize;
    let base = values.len() - num_params;
    let mut locals = Vec::with_capacity(num_params + code.locals.len());
    locals.extend(values.drain(base..));
    for ty in code.locals.iter().copied() {
        locals.push(Value::zero(ty));
    }

    let frame = Frame {
        instance:   f.instance,
        code:       code.clone(),
        pc:         0,
        height:     values.len(),
        label_base: labels.len(),
        locals,
    };

    // the function-level label; its target is the trailing return op.
    labels.push(Label {
        arity:  code.num_rets,
        height: values.len(),
        target: code.ops.len() - 1,
    });

    (frame, code)
}

/// `call`/`call_indirect` dispatch: wasm callees swap the register state,
/// host callees run to completion right here.
#[allow(clippy::too_many_arguments)]
fn call(
    store: &mut Store,
    addr: FuncAddr,
    values: &mut Vec<Value>,
    labels: &mut Vec<Label>,
    frames: &mut Vec<Frame>,
    frame: &mut Frame,
    code: &mut Rc<Code>,
    pc: &mut usize,
) -> Result<(), Trap> {
    match &store.funcs[addr.0 as usize] {
        FuncInst::Wasm(_) => {
            if frames.len() + 1 >= store.frame_limit || values.len() >= store.stack_limit {
                return Err(Trap::new(TrapKind::CallStackExhausted));
            }

            frame.pc = *pc;
            let (new_frame, new_code) = activate(store, addr, values, labels);
            frames.push(core::mem::replace(frame, new_frame));
            *code = new_code;
            *pc = 0;
            Ok(())
        }

        FuncInst::Host(host) => {
            let f = host.func.clone();
            let rets = host.ty.rets.clone();
            let num_params = host.ty.params.len();

            let args = values.split_off(values.len() - num_params);
            let results = f.as_ref()(store, &args)?;

            if results.len() != rets.len()
                || results.iter().zip(&rets).any(|(v, ty)| v.ty() != *ty)
            {
                return Err(Trap::new(TrapKind::HostError));
            }
            values.extend(results);
            Ok(())
        }
    }
}

#[inline]
fn memory(store: &Store, instance: InstanceId) -> &MemoryInst {
    let addr = store.instances[instance.0 as usize].memories[0];
    &store.memories[addr.0 as usize]
}

#[inline]
fn memory_mut(store: &mut Store, instance: InstanceId) -> &mut MemoryInst {
    let addr = store.instances[instance.0 as usize].memories[0];
    &mut store.memories[addr.0 as usize]
}


fn relop(op: RelOp, values: &mut Vec<Value>) {
    use RelOp::*;

    let (b, a) = (pop(values), pop(values));
    let result = match op {
        I32_EQ   => a.as_i32() == b.as_i32(),
        I32_NE   => a.as_i32() != b.as_i32(),
        I32_LT_S => a.as_i32() <  b.as_i32(),
        I32_LT_U => a.as_u32() <  b.as_u32(),
        I32_GT_S => a.as_i32() >  b.as_i32(),
        I32_GT_U => a.as_u32() >  b.as_u32(),
        I32_LE_S => a.as_i32() <= b.as_i32(),
        I32_LE_U => a.as_u32() <= b.as_u32(),
        I32_GE_S => a.as_i32() >= b.as_i32(),
        I32_GE_U => a.as_u32() >= b.as_u32(),

        I64_EQ   => a.as_i64() == b.as_i64(),
        I64_NE   => a.as_i64() != b.as_i64(),
        I64_LT_S => a.as_i64() <  b.as_i64(),
        I64_LT_U => a.as_u64() <  b.as_u64(),
        I64_GT_S => a.as_i64() >  b.as_i64(),
        I64_GT_U => a.as_u64() >  b.as_u64(),
        I64_LE_S => a.as_i64() <= b.as_i64(),
        I64_LE_U => a.as_u64() <= b.as_u64(),
        I64_GE_S => a.as_i64() >= b.as_i64(),
        I64_GE_U => a.as_u64() >= b.as_u64(),

        F32_EQ => a.as_f32() == b.as_f32(),
        F32_NE => a.as_f32() != b.as_f32(),
        F32_LT => a.as_f32() <  b.as_f32(),
        F32_GT => a.as_f32() >  b.as_f32(),
        F32_LE => a.as_f32() <= b.as_f32(),
        F32_GE => a.as_f32() >= b.as_f32(),

        F64_EQ => a.as_f64() == b.as_f64(),
        F64_NE => a.as_f64() != b.as_f64(),
        F64_LT => a.as_f64() <  b.as_f64(),
        F64_GT => a.as_f64() >  b.as_f64(),
        F64_LE => a.as_f64() <= b.as_f64(),
        F64_GE => a.as_f64() >= b.as_f64(),
    };
    values.push(Value::I32(result as i32));
}

fn op1(op: Op1, values: &mut Vec<Value>) {
    use Op1::*;

    let v = pop(values);
    let result = match op {
        I32_CLZ    => Value::I32(v.as_u32().leading_zeros() as i32),
        I32_CTZ    => Value::I32(v.as_u32().trailing_zeros() as i32),
        I32_POPCNT => Value::I32(v.as_u32().count_ones() as i32),

        I64_CLZ    => Value::I64(v.as_u64().leading_zeros() as i64),
        I64_CTZ    => Value::I64(v.as_u64().trailing_zeros() as i64),
        I64_POPCNT => Value::I64(v.as_u64().count_ones() as i64),

        F32_ABS     => Value::F32(v.as_f32().abs()),
        F32_NEG     => Value::F32(-v.as_f32()),
        F32_CEIL    => Value::F32(num::canon_f32(v.as_f32().ceil())),
        F32_FLOOR   => Value::F32(num::canon_f32(v.as_f32().floor())),
        F32_TRUNC   => Value::F32(num::canon_f32(v.as_f32().trunc())),
        F32_NEAREST => Value::F32(num::f32_nearest(v.as_f32())),
        F32_SQRT    => Value::F32(num::canon_f32(v.as_f32().sqrt())),

        F64_ABS     => Value::F64(v.as_f64().abs()),
        F64_NEG     => Value::F64(-v.as_f64()),
        F64_CEIL    => Value::F64(num::canon_f64(v.as_f64().ceil())),
        F64_FLOOR   => Value::F64(num::canon_f64(v.as_f64().floor())),
        F64_TRUNC   => Value::F64(num::canon_f64(v.as_f64().trunc())),
        F64_NEAREST => Value::F64(num::f64_nearest(v.as_f64())),
        F64_SQRT    => Value::F64(num::canon_f64(v.as_f64().sqrt())),
    };
    values.push(result);
}

fn op2(op: Op2, values: &mut Vec<Value>) -> Result<(), Trap> {
    use Op2::*;

    let (b, a) = (pop(values), pop(values));
    let result = match op {
        I32_ADD   => Value::I32(a.as_i32().wrapping_add(b.as_i32())),
        I32_SUB   => Value::I32(a.as_i32().wrapping_sub(b.as_i32())),
        I32_MUL   => Value::I32(a.as_i32().wrapping_mul(b.as_i32())),
        I32_DIV_S => Value::I32(num::i32_div_s(a.as_i32(), b.as_i32())?),
        I32_DIV_U => Value::I32(num::i32_div_u(a.as_u32(), b.as_u32())? as i32),
        I32_REM_S => Value::I32(num::i32_rem_s(a.as_i32(), b.as_i32())?),
        I32_REM_U => Value::I32(num::i32_rem_u(a.as_u32(), b.as_u32())? as i32),
        I32_AND   => Value::I32(a.as_i32() & b.as_i32()),
        I32_OR    => Value::I32(a.as_i32() | b.as_i32()),
        I32_XOR   => Value::I32(a.as_i32() ^ b.as_i32()),
        // shift and rotate counts are taken modulo the width.
        I32_SHL   => Value::I32(a.as_i32().wrapping_shl(b.as_u32())),
        I32_SHR_S => Value::I32(a.as_i32().wrapping_shr(b.as_u32())),
        I32_SHR_U => Value::I32((a.as_u32().wrapping_shr(b.as_u32())) as i32),
        I32_ROTL  => Value::I32(a.as_u32().rotate_left(b.as_u32() % 32) as i32),
        I32_ROTR  => Value::I32(a.as_u32().rotate_right(b.as_u32() % 32) as i32),

        I64_ADD   => Value::I64(a.as_i64().wrapping_add(b.as_i64())),
        I64_SUB   => Value::I64(a.as_i64().wrapping_sub(b.as_i64())),
        I64_MUL   => Value::I64(a.as_i64().wrapping_mul(b.as_i64())),
        I64_DIV_S => Value::I64(num::i64_div_s(a.as_i64(), b.as_i64())?),
        I64_DIV_U => Value::I64(num::i64_div_u(a.as_u64(), b.as_u64())? as i64),
        I64_REM_S => Value::I64(num::i64_rem_s(a.as_i64(), b.as_i64())?),
        I64_REM_U => Value::I64(num::i64_rem_u(a.as_u64(), b.as_u64())? as i64),
        I64_AND   => Value::I64(a.as_i64() & b.as_i64()),
        I64_OR    => Value::I64(a.as_i64() | b.as_i64()),
        I64_XOR   => Value::I64(a.as_i64() ^ b.as_i64()),
        I64_SHL   => Value::I64(a.as_i64().wrapping_shl(b.as_u64() as u32)),
        I64_SHR_S => Value::I64(a.as_i64().wrapping_shr(b.as_u64() as u32)),
        I64_SHR_U => Value::I64((a.as_u64().wrapping_shr(b.as_u64() as u32)) as i64),
        I64_ROTL  => Value::I64(a.as_u64().rotate_left((b.as_u64() % 64) as u32) as i64),
        I64_ROTR  => Value::I64(a.as_u64().rotate_right((b.as_u64() % 64) as u32) as i64),

        F32_ADD      => Value::F32(num::canon_f32(a.as_f32() + b.as_f32())),
        F32_SUB      => Value::F32(num::canon_f32(a.as_f32() - b.as_f32())),
        F32_MUL      => Value::F32(num::canon_f32(a.as_f32() * b.as_f32())),
        F32_DIV      => Value::F32(num::canon_f32(a.as_f32() / b.as_f32())),
        F32_MIN      => Value::F32(num::f32_min(a.as_f32(), b.as_f32())),
        F32_MAX      => Value::F32(num::f32_max(a.as_f32(), b.as_f32())),
        F32_COPYSIGN => Value::F32(a.as_f32().copysign(b.as_f32())),

        F64_ADD      => Value::F64(num::canon_f64(a.as_f64() + b.as_f64())),
        F64_SUB      => Value::F64(num::canon_f64(a.as_f64() - b.as_f64())),
        F64_MUL      => Value::F64(num::canon_f64(a.as_f64() * b.as_f64())),
        F64_DIV      => Value::F64(num::canon_f64(a.as_f64() / b.as_f64())),
        F64_MIN      => Value::F64(num::f64_min(a.as_f64(), b.as_f64())),
        F64_MAX      => Value::F64(num::f64_max(a.as_f64(), b.as_f64())),
        F64_COPYSIGN => Value::F64(a.as_f64().copysign(b.as_f64())),
    };
    values.push(result);
    Ok(())
}

fn convert(op: Convert, values: &mut Vec<Value>) -> Result<(), Trap> {
    use Convert::*;

    let v = pop(values);
    let result = match op {
        I32_WRAP_I64 => Value::I32(v.as_i64() as i32),

        I64_EXTEND_I32_S => Value::I64(v.as_i32() as i64),
        I64_EXTEND_I32_U => Value::I64(v.as_u32() as i64),

        I32_TRUNC_F32_S => Value::I32(num::i32_trunc_f32_s(v.as_f32())?),
        I32_TRUNC_F32_U => Value::I32(num::i32_trunc_f32_u(v.as_f32())? as i32),
        I32_TRUNC_F64_S => Value::I32(num::i32_trunc_f64_s(v.as_f64())?),
        I32_TRUNC_F64_U => Value::I32(num::i32_trunc_f64_u(v.as_f64())? as i32),
        I64_TRUNC_F32_S => Value::I64(num::i64_trunc_f32_s(v.as_f32())?),
        I64_TRUNC_F32_U => Value::I64(num::i64_trunc_f32_u(v.as_f32())? as i64),
        I64_TRUNC_F64_S => Value::I64(num::i64_trunc_f64_s(v.as_f64())?),
        I64_TRUNC_F64_U => Value::I64(num::i64_trunc_f64_u(v.as_f64())? as i64),

        F32_CONVERT_I32_S => Value::F32(v.as_i32() as f32),
        F32_CONVERT_I32_U => Value::F32(v.as_u32() as f32),
        F32_CONVERT_I64_S => Value::F32(v.as_i64() as f32),
        F32_CONVERT_I64_U => Value::F32(v.as_u64() as f32),
        F64_CONVERT_I32_S => Value::F64(v.as_i32() as f64),
        F64_CONVERT_I32_U => Value::F64(v.as_u32() as f64),
        F64_CONVERT_I64_S => Value::F64(v.as_i64() as f64),
        F64_CONVERT_I64_U => Value::F64(v.as_u64() as f64),

        F32_DEMOTE_F64  => Value::F32(num::canon_f32(v.as_f64() as f32)),
        F64_PROMOTE_F32 => Value::F64(num::canon_f64(v.as_f32() as f64)),
    };
    values.push(result);
    Ok(())
}
