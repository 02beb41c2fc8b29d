//! Canonical module encoder, the inverse of the decoder. Re-encoding is not
//! byte-identical to arbitrary input (LEB128 admits padded forms; locals are
//! re-grouped), but decoding the output yields a syntactically identical
//! module tree.

use crate::leb128;
use crate::opcode;
use crate::{ValueType, BlockType, FuncType, Limits, TableType, MemoryType, GlobalType};
use crate::{ImportKind, ConstExpr, Export, ExportKind, Code, Module};
use crate::instr::{Instr, MemArg};


pub fn encode_module(module: &Module) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"\0asm");
    out.extend_from_slice(&[1, 0, 0, 0]);

    if !module.types.is_empty() {
        let mut payload = Vec::new();
        leb128::encode_u32(module.types.len() as u32, &mut payload);
        for ty in &module.types {
            encode_func_type(ty, &mut payload);
        }
        section(&mut out, 1, payload);
    }

    if !module.imports.imports.is_empty() {
        let mut payload = Vec::new();
        leb128::encode_u32(module.imports.imports.len() as u32, &mut payload);
        for import in &module.imports.imports {
            encode_name(&import.module, &mut payload);
            encode_name(&import.name, &mut payload);
            match import.kind {
                ImportKind::Func(ty) => {
                    payload.push(0x00);
                    leb128::encode_u32(ty, &mut payload);
                }
                ImportKind::Table(ty) => {
                    payload.push(0x01);
                    encode_table_type(ty, &mut payload);
                }
                ImportKind::Memory(ty) => {
                    payload.push(0x02);
                    encode_memory_type(ty, &mut payload);
                }
                ImportKind::Global(ty) => {
                    payload.push(0x03);
                    encode_global_type(ty, &mut payload);
                }
            }
        }
        section(&mut out, 2, payload);
    }

    if !module.funcs.is_empty() {
        let mut payload = Vec::new();
        leb128::encode_u32(module.funcs.len() as u32, &mut payload);
        for ty in module.funcs.iter().copied() {
            leb128::encode_u32(ty, &mut payload);
        }
        section(&mut out, 3, payload);
    }

    if !module.tables.is_empty() {
        let mut payload = Vec::new();
        leb128::encode_u32(module.tables.len() as u32, &mut payload);
        for ty in module.tables.iter().copied() {
            encode_table_type(ty, &mut payload);
        }
        section(&mut out, 4, payload);
    }

    if !module.memories.is_empty() {
        let mut payload = Vec::new();
        leb128::encode_u32(module.memories.len() as u32, &mut payload);
        for ty in module.memories.iter().copied() {
            encode_memory_type(ty, &mut payload);
        }
        section(&mut out, 5, payload);
    }

    if !module.globals.is_empty() {
        let mut payload = Vec::new();
        leb128::encode_u32(module.globals.len() as u32, &mut payload);
        for global in &module.globals {
            encode_global_type(global.ty, &mut payload);
            encode_const_expr(global.init, &mut payload);
        }
        section(&mut out, 6, payload);
    }

    if !module.exports.is_empty() {
        let mut payload = Vec::new();
        leb128::encode_u32(module.exports.len() as u32, &mut payload);
        for export in &module.exports {
            encode_export(export, &mut payload);
        }
        section(&mut out, 7, payload);
    }

    if let Some(start) = module.start {
        let mut payload = Vec::new();
        leb128::encode_u32(start, &mut payload);
        section(&mut out, 8, payload);
    }

    if !module.elems.is_empty() {
        let mut payload = Vec::new();
        leb128::encode_u32(module.elems.len() as u32, &mut payload);
        for elem in &module.elems {
            leb128::encode_u32(elem.table, &mut payload);
            encode_const_expr(elem.offset, &mut payload);
            leb128::encode_u32(elem.funcs.len() as u32, &mut payload);
            for func in elem.funcs.iter().copied() {
                leb128::encode_u32(func, &mut payload);
            }
        }
        section(&mut out, 9, payload);
    }

    if !module.codes.is_empty() {
        let mut payload = Vec::new();
        leb128::encode_u32(module.codes.len() as u32, &mut payload);
        for code in &module.codes {
            encode_code(code, &mut payload);
        }
        section(&mut out, 10, payload);
    }

    if !module.datas.is_empty() {
        let mut payload = Vec::new();
        leb128::encode_u32(module.datas.len() as u32, &mut payload);
        for data in &module.datas {
            leb128::encode_u32(data.memory, &mut payload);
            encode_const_expr(data.offset, &mut payload);
            leb128::encode_u32(data.bytes.len() as u32, &mut payload);
            payload.extend_from_slice(&data.bytes);
        }
        section(&mut out, 11, payload);
    }

    for custom in &module.customs {
        let mut payload = Vec::new();
        encode_name(&custom.name, &mut payload);
        payload.extend_from_slice(&custom.bytes);
        section(&mut out, 0, payload);
    }

    out
}


fn section(out: &mut Vec<u8>, id: u8, payload: Vec<u8>) {
    out.push(id);
    leb128::encode_u32(payload.len() as u32, out);
    out.extend_from_slice(&payload);
}

fn encode_name(name: &str, out: &mut Vec<u8>) {
    leb128::encode_u32(name.len() as u32, out);
    out.extend_from_slice(name.as_bytes());
}

fn encode_func_type(ty: &FuncType, out: &mut Vec<u8>) {
    out.push(0x60);
    leb128::encode_u32(ty.params.len() as u32, out);
    for param in ty.params.iter().copied() {
        out.push(param.to_u8());
    }
    leb128::encode_u32(ty.rets.len() as u32, out);
    for ret in ty.rets.iter().copied() {
        out.push(ret.to_u8());
    }
}

fn encode_limits(limits: Limits, out: &mut Vec<u8>) {
    match limits.max {
        None => {
            out.push(0x00);
            leb128::encode_u32(limits.min, out);
        }
        Some(max) => {
            out.push(0x01);
            leb128::encode_u32(limits.min, out);
            leb128::encode_u32(max, out);
        }
    }
}

fn encode_table_type(ty: TableType, out: &mut Vec<u8>) {
    out.push(0x70);
    encode_limits(ty.limits, out);
}

fn encode_memory_type(ty: MemoryType, out: &mut Vec<u8>) {
    encode_limits(ty.limits, out);
}

fn encode_global_type(ty: GlobalType, out: &mut Vec<u8>) {
    out.push(ty.ty.to_u8());
    out.push(ty.mutable as u8);
}

fn encode_const_expr(expr: ConstExpr, out: &mut Vec<u8>) {
    match expr {
        ConstExpr::I32(value) => {
            out.push(opcode::I32_CONST);
            leb128::encode_i32(value, out);
        }
        ConstExpr::I64(value) => {
            out.push(opcode::I64_CONST);
            leb128::encode_i64(value, out);
        }
        ConstExpr::F32(value) => {
            out.push(opcode::F32_CONST);
            out.extend_from_slice(&value.to_le_bytes());
        }
        ConstExpr::F64(value) => {
            out.push(opcode::F64_CONST);
            out.extend_from_slice(&value.to_le_bytes());
        }
        ConstExpr::Global(idx) => {
            out.push(opcode::GLOBAL_GET);
            leb128::encode_u32(idx, out);
        }
    }
    out.push(opcode::END);
}

fn encode_export(export: &Export, out: &mut Vec<u8>) {
    encode_name(&export.name, out);
    let (kind, idx) = match export.kind {
        ExportKind::Func(idx)   => (0x00, idx),
        ExportKind::Table(idx)  => (0x01, idx),
        ExportKind::Memory(idx) => (0x02, idx),
        ExportKind::Global(idx) => (0x03, idx),
    };
    out.push(kind);
    leb128::encode_u32(idx, out);
}

fn encode_code(code: &Code, out: &mut Vec<u8>) {
    let mut body = Vec::new();

    // locals, grouped into runs of one type.
    let mut groups: Vec<(u32, ValueType)> = Vec::new();
    for ty in code.locals.iter().copied() {
        match groups.last_mut() {
            Some((n, at)) if *at == ty => *n += 1,
            _ => groups.push((1, ty)),
        }
    }
    leb128::encode_u32(groups.len() as u32, &mut body);
    for (n, ty) in groups {
        leb128::encode_u32(n, &mut body);
        body.push(ty.to_u8());
    }

    encode_expr(&code.body, &mut body);
    body.push(opcode::END);

    leb128::encode_u32(body.len() as u32, out);
    out.extend_from_slice(&body);
}

fn encode_block_type(ty: BlockType, out: &mut Vec<u8>) {
    match ty {
        BlockType::Unit      => out.push(0x40),
        BlockType::Value(ty) => out.push(ty.to_u8()),
    }
}

fn encode_memarg(memarg: MemArg, out: &mut Vec<u8>) {
    leb128::encode_u32(memarg.align, out);
    leb128::encode_u32(memarg.offset, out);
}

fn encode_expr(body: &[Instr], out: &mut Vec<u8>) {
    for instr in body {
        encode_instr(instr, out);
    }
}

fn encode_instr(instr: &Instr, out: &mut Vec<u8>) {
    match instr {
        Instr::Unreachable => out.push(opcode::UNREACHABLE),
        Instr::Nop         => out.push(opcode::NOP),

        Instr::Block { ty, body } => {
            out.push(opcode::BLOCK);
            encode_block_type(*ty, out);
            encode_expr(body, out);
            out.push(opcode::END);
        }

        Instr::Loop { ty, body } => {
            out.push(opcode::LOOP);
            encode_block_type(*ty, out);
            encode_expr(body, out);
            out.push(opcode::END);
        }

        Instr::If { ty, then, els } => {
            out.push(opcode::IF);
            encode_block_type(*ty, out);
            encode_expr(then, out);
            if !els.is_empty() {
                out.push(opcode::ELSE);
                encode_expr(els, out);
            }
            out.push(opcode::END);
        }

        Instr::Br(label) => {
            out.push(opcode::BR);
            leb128::encode_u32(*label, out);
        }

        Instr::BrIf(label) => {
            out.push(opcode::BR_IF);
            leb128::encode_u32(*label, out);
        }

        Instr::BrTable { labels, default } => {
            out.push(opcode::BR_TABLE);
            leb128::encode_u32(labels.len() as u32, out);
            for label in labels.iter().copied() {
                leb128::encode_u32(label, out);
            }
            leb128::encode_u32(*default, out);
        }

        Instr::Return => out.push(opcode::RETURN),

        Instr::Call(func) => {
            out.push(opcode::CALL);
            leb128::encode_u32(*func, out);
        }

        Instr::CallIndirect(ty) => {
            out.push(opcode::CALL_INDIRECT);
            leb128::encode_u32(*ty, out);
            out.push(0x00);
        }

        Instr::Drop   => out.push(opcode::DROP),
        Instr::Select => out.push(opcode::SELECT),

        Instr::LocalGet(idx) => {
            out.push(opcode::LOCAL_GET);
            leb128::encode_u32(*idx, out);
        }

        Instr::LocalSet(idx) => {
            out.push(opcode::LOCAL_SET);
            leb128::encode_u32(*idx, out);
        }

        Instr::LocalTee(idx) => {
            out.push(opcode::LOCAL_TEE);
            leb128::encode_u32(*idx, out);
        }

        Instr::GlobalGet(idx) => {
            out.push(opcode::GLOBAL_GET);
            leb128::encode_u32(*idx, out);
        }

        Instr::GlobalSet(idx) => {
            out.push(opcode::GLOBAL_SET);
            leb128::encode_u32(*idx, out);
        }

        Instr::Load { load, memarg } => {
            out.push(load.to_opcode());
            encode_memarg(*memarg, out);
        }

        Instr::Store { store, memarg } => {
            out.push(store.to_opcode());
            encode_memarg(*memarg, out);
        }

        Instr::MemorySize => {
            out.push(opcode::MEMORY_SIZE);
            out.push(0x00);
        }

        Instr::MemoryGrow => {
            out.push(opcode::MEMORY_GROW);
            out.push(0x00);
        }

        Instr::I32Const(value) => {
            out.push(opcode::I32_CONST);
            leb128::encode_i32(*value, out);
        }

        Instr::I64Const(value) => {
            out.push(opcode::I64_CONST);
            leb128::encode_i64(*value, out);
        }

        Instr::F32Const(value) => {
            out.push(opcode::F32_CONST);
            out.extend_from_slice(&value.to_le_bytes());
        }

        Instr::F64Const(value) => {
            out.push(opcode::F64_CONST);
            out.extend_from_slice(&value.to_le_bytes());
        }

        Instr::TestOp(op)      => out.push(op.to_opcode()),
        Instr::RelOp(op)       => out.push(op.to_opcode()),
        Instr::Op1(op)         => out.push(op.to_opcode()),
        Instr::Op2(op)         => out.push(op.to_opcode()),
        Instr::Convert(op)     => out.push(op.to_opcode()),
        Instr::Reinterpret(op) => out.push(op.to_opcode()),
    }
}
