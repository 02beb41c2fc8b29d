use std::collections::HashSet;

use crate::{TypeIdx, FuncIdx, TableIdx, MemoryIdx, GlobalIdx, LocalIdx, LabelIdx};
use crate::{ValueType, BlockType, Limits, ConstExpr, ImportKind, ExportKind, Module, MAX_PAGES};
use crate::instr::Instr;


#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidateError {
    #[error("type mismatch")]
    TypeMismatch,
    #[error("unknown type {0}")]
    UnknownType(TypeIdx),
    #[error("unknown function {0}")]
    UnknownFunc(FuncIdx),
    #[error("unknown table {0}")]
    UnknownTable(TableIdx),
    #[error("unknown memory {0}")]
    UnknownMemory(MemoryIdx),
    #[error("unknown global {0}")]
    UnknownGlobal(GlobalIdx),
    #[error("unknown local {0}")]
    UnknownLocal(LocalIdx),
    #[error("unknown label {0}")]
    UnknownLabel(LabelIdx),
    #[error("global {0} is immutable")]
    ImmutableGlobal(GlobalIdx),
    #[error("alignment must not be larger than natural")]
    InvalidAlignment,
    #[error("multiple tables")]
    MultipleTables,
    #[error("multiple memories")]
    MultipleMemories,
    #[error("duplicate export name {0:?}")]
    DuplicateExport(String),
    #[error("start function must have type [] -> []")]
    StartFuncType,
    #[error("function type has more than one result")]
    ResultArity,
    #[error("size minimum must not be greater than maximum")]
    LimitsMinGtMax,
    #[error("memory size must be at most 65536 pages")]
    MemoryTooLarge,
    #[error("constant expression type mismatch")]
    ConstExprType,
    #[error("constant expression must be an imported immutable global")]
    ConstExprGlobal,
}

pub type Result<T> = core::result::Result<T, ValidateError>;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControlFrameKind {
    Block,
    Loop,
    If,
    Else,
}

#[derive(Clone, Copy)]
struct ControlFrame {
    kind:        ControlFrameKind,
    ty:          BlockType,
    height:      usize,
    unreachable: bool,
}

impl ControlFrame {
    /// The types a branch to this frame's label must supply. Branching to a
    /// loop re-enters it from the top, so it needs the loop's parameters,
    /// which are always empty in wasm 1.0 block types.
    fn br_types(&self) -> &'static [ValueType] {
        if self.kind == ControlFrameKind::Loop {
            &[]
        }
        else {
            self.ty.end_types()
        }
    }
}


/// The algorithmic validator: an abstract stack of value types (`None` is
/// the unknown type that appears after an unconditional branch and unifies
/// with anything) plus a stack of control frames.
pub struct Validator<'m> {
    module: &'m Module,

    locals: Vec<ValueType>,
    rets:   BlockType,

    values: Vec<Option<ValueType>>,
    frames: Vec<ControlFrame>,
    frame:  ControlFrame,
}

impl<'m> Validator<'m> {
    pub fn validate_module(module: &Module) -> Result<()> {
        for ty in &module.types {
            if ty.rets.len() > 1 {
                return Err(ValidateError::ResultArity);
            }
        }

        for import in &module.imports.imports {
            match import.kind {
                ImportKind::Func(ty) => {
                    if ty as usize >= module.types.len() {
                        return Err(ValidateError::UnknownType(ty));
                    }
                }
                ImportKind::Table(ty)  => check_limits(ty.limits)?,
                ImportKind::Memory(ty) => check_memory_limits(ty.limits)?,
                ImportKind::Global(_)  => (),
            }
        }

        for ty in module.funcs.iter().copied() {
            if ty as usize >= module.types.len() {
                return Err(ValidateError::UnknownType(ty));
            }
        }

        for table in &module.tables {
            check_limits(table.limits)?;
        }
        if module.num_tables() > 1 {
            return Err(ValidateError::MultipleTables);
        }

        for memory in &module.memories {
            check_memory_limits(memory.limits)?;
        }
        if module.num_memories() > 1 {
            return Err(ValidateError::MultipleMemories);
        }

        for global in &module.globals {
            if const_expr_ty(module, global.init)? != global.ty.ty {
                return Err(ValidateError::ConstExprType);
            }
        }

        let mut export_names = HashSet::new();
        for export in &module.exports {
            if !export_names.insert(export.name.as_str()) {
                return Err(ValidateError::DuplicateExport(export.name.clone()));
            }
            match export.kind {
                ExportKind::Func(idx) => {
                    module.get_func(idx).ok_or(ValidateError::UnknownFunc(idx))?;
                }
                ExportKind::Table(idx) => {
                    module.get_table(idx).ok_or(ValidateError::UnknownTable(idx))?;
                }
                ExportKind::Memory(idx) => {
                    module.get_memory(idx).ok_or(ValidateError::UnknownMemory(idx))?;
                }
                ExportKind::Global(idx) => {
                    module.get_global(idx).ok_or(ValidateError::UnknownGlobal(idx))?;
                }
            }
        }

        if let Some(start) = module.start {
            let ty = module.get_func(start).ok_or(ValidateError::UnknownFunc(start))?;
            let ty = &module.types[ty as usize];
            if !ty.params.is_empty() || !ty.rets.is_empty() {
                return Err(ValidateError::StartFuncType);
            }
        }

        for elem in &module.elems {
            module.get_table(elem.table).ok_or(ValidateError::UnknownTable(elem.table))?;
            if const_expr_ty(module, elem.offset)? != ValueType::I32 {
                return Err(ValidateError::ConstExprType);
            }
            for func in elem.funcs.iter().copied() {
                module.get_func(func).ok_or(ValidateError::UnknownFunc(func))?;
            }
        }

        for data in &module.datas {
            module.get_memory(data.memory).ok_or(ValidateError::UnknownMemory(data.memory))?;
            if const_expr_ty(module, data.offset)? != ValueType::I32 {
                return Err(ValidateError::ConstExprType);
            }
        }

        let mut validator = Validator::new(module);
        for i in 0..module.codes.len() {
            validator.func(i)?;
        }

        log::debug!("validated module: {} funcs", module.num_funcs());

        Ok(())
    }

    fn new(module: &'m Module) -> Self {
        Self {
            module,
            locals: Vec::new(),
            rets:   BlockType::Unit,
            values: Vec::new(),
            frames: Vec::new(),
            frame:  ControlFrame {
                kind:        ControlFrameKind::Block,
                ty:          BlockType::Unit,
                height:      0,
                unreachable: false,
            },
        }
    }

    /// Checks the body of the module's `index`-th own function against its
    /// declared type.
    fn func(&mut self, index: usize) -> Result<()> {
        let module = self.module;
        let ty = &module.types[module.funcs[index] as usize];
        let code = &module.codes[index];

        self.rets = match ty.rets.first() {
            None     => BlockType::Unit,
            Some(it) => BlockType::Value(*it),
        };

        self.locals.clear();
        self.locals.extend_from_slice(&ty.params);
        self.locals.extend_from_slice(&code.locals);

        self.values.clear();
        self.frames.clear();
        self.frame = ControlFrame {
            kind:        ControlFrameKind::Block,
            ty:          self.rets,
            height:      0,
            unreachable: false,
        };

        self.expr(&code.body)?;

        // the implicit end of the function body.
        self.expect_n(self.rets.end_types())?;
        if !self.values.is_empty() {
            return Err(ValidateError::TypeMismatch);
        }

        Ok(())
    }


    fn set_unreachable(&mut self) {
        debug_assert!(self.values.len() >= self.frame.height);

        self.frame.unreachable = true;
        self.values.truncate(self.frame.height);
    }

    fn label(&self, depth: LabelIdx) -> Result<ControlFrame> {
        let depth = depth as usize;
        if depth == 0 {
            Ok(self.frame)
        }
        else if depth <= self.frames.len() {
            Ok(self.frames[self.frames.len() - depth])
        }
        else {
            Err(ValidateError::UnknownLabel(depth as LabelIdx))
        }
    }

    fn push(&mut self, ty: ValueType) {
        self.values.push(Some(ty));
    }

    fn push_n(&mut self, tys: &[ValueType]) {
        for ty in tys.iter().copied() {
            self.push(ty);
        }
    }

    fn pop(&mut self) -> Result<Option<ValueType>> {
        debug_assert!(self.values.len() >= self.frame.height);

        if self.values.len() == self.frame.height {
            if self.frame.unreachable {
                Ok(None)
            }
            else {
                Err(ValidateError::TypeMismatch)
            }
        }
        else {
            Ok(self.values.pop().unwrap())
        }
    }

    fn expect(&mut self, ty: ValueType) -> Result<()> {
        match self.pop()? {
            None => Ok(()),
            Some(at) if at == ty => Ok(()),
            Some(_) => Err(ValidateError::TypeMismatch),
        }
    }

    fn expect_n(&mut self, tys: &[ValueType]) -> Result<()> {
        for ty in tys.iter().rev().copied() {
            self.expect(ty)?;
        }
        Ok(())
    }

    fn push_frame(&mut self, kind: ControlFrameKind, ty: BlockType) {
        self.frames.push(self.frame);
        self.frame = ControlFrame {
            kind, ty,
            height:      self.values.len(),
            unreachable: false,
        };
    }

    fn pop_frame(&mut self) -> Result<ControlFrame> {
        self.expect_n(self.frame.ty.end_types())?;
        if self.values.len() != self.frame.height {
            return Err(ValidateError::TypeMismatch);
        }

        let result = self.frame;
        self.frame = self.frames.pop().expect("control stack imbalance");
        Ok(result)
    }


    fn expr(&mut self, body: &[Instr]) -> Result<()> {
        for instr in body {
            self.instr(instr)?;
        }
        Ok(())
    }

    fn instr(&mut self, instr: &Instr) -> Result<()> {
        let module = self.module;

        match instr {
            Instr::Unreachable => {
                self.set_unreachable();
            }

            Instr::Nop => {}

            Instr::Block { ty, body } => {
                self.push_frame(ControlFrameKind::Block, *ty);
                self.expr(body)?;
                let frame = self.pop_frame()?;
                self.push_n(frame.ty.end_types());
            }

            Instr::Loop { ty, body } => {
                self.push_frame(ControlFrameKind::Loop, *ty);
                self.expr(body)?;
                let frame = self.pop_frame()?;
                self.push_n(frame.ty.end_types());
            }

            Instr::If { ty, then, els } => {
                self.expect(ValueType::I32)?;

                self.push_frame(ControlFrameKind::If, *ty);
                self.expr(then)?;
                let frame = self.pop_frame()?;

                // an absent else still has to produce the result types.
                self.push_frame(ControlFrameKind::Else, frame.ty);
                self.expr(els)?;
                let frame = self.pop_frame()?;

                self.push_n(frame.ty.end_types());
            }

            Instr::Br(label) => {
                let frame = self.label(*label)?;
                self.expect_n(frame.br_types())?;
                self.set_unreachable();
            }

            Instr::BrIf(label) => {
                let frame = self.label(*label)?;
                let tys = frame.br_types();
                self.expect(ValueType::I32)?;
                self.expect_n(tys)?;
                self.push_n(tys);
            }

            Instr::BrTable { labels, default } => {
                self.expect(ValueType::I32)?;

                let default_tys = self.label(*default)?.br_types();

                for label in labels.iter().copied() {
                    let tys = self.label(label)?.br_types();
                    if tys.len() != default_tys.len() {
                        return Err(ValidateError::TypeMismatch);
                    }
                    self.expect_n(tys)?;
                    self.push_n(tys);
                }

                self.expect_n(default_tys)?;
                self.set_unreachable();
            }

            Instr::Return => {
                self.expect_n(self.rets.end_types())?;
                self.set_unreachable();
            }

            Instr::Call(func) => {
                let ty = module.get_func(*func)
                    .ok_or(ValidateError::UnknownFunc(*func))?;
                let ty = &module.types[ty as usize];
                self.expect_n(&ty.params)?;
                self.push_n(&ty.rets);
            }

            Instr::CallIndirect(ty) => {
                module.get_table(0).ok_or(ValidateError::UnknownTable(0))?;
                let ty = module.types.get(*ty as usize)
                    .ok_or(ValidateError::UnknownType(*ty))?;
                self.expect(ValueType::I32)?;
                self.expect_n(&ty.params)?;
                self.push_n(&ty.rets);
            }

            Instr::Drop => {
                self.pop()?;
            }

            Instr::Select => {
                self.expect(ValueType::I32)?;
                let t1 = self.pop()?;
                let t2 = self.pop()?;
                if let (Some(a), Some(b)) = (t1, t2) {
                    if a != b {
                        return Err(ValidateError::TypeMismatch);
                    }
                }
                self.values.push(t1.or(t2));
            }

            Instr::LocalGet(idx) => {
                let ty = self.local(*idx)?;
                self.push(ty);
            }

            Instr::LocalSet(idx) => {
                let ty = self.local(*idx)?;
                self.expect(ty)?;
            }

            Instr::LocalTee(idx) => {
                let ty = self.local(*idx)?;
                self.expect(ty)?;
                self.push(ty);
            }

            Instr::GlobalGet(idx) => {
                let ty = module.get_global(*idx)
                    .ok_or(ValidateError::UnknownGlobal(*idx))?;
                self.push(ty.ty);
            }

            Instr::GlobalSet(idx) => {
                let ty = module.get_global(*idx)
                    .ok_or(ValidateError::UnknownGlobal(*idx))?;
                if !ty.mutable {
                    return Err(ValidateError::ImmutableGlobal(*idx));
                }
                self.expect(ty.ty)?;
            }

            Instr::Load { load, memarg } => {
                module.get_memory(0).ok_or(ValidateError::UnknownMemory(0))?;
                if memarg.align > load.natural_align() {
                    return Err(ValidateError::InvalidAlignment);
                }
                self.expect(ValueType::I32)?;
                self.push(load.ty());
            }

            Instr::Store { store, memarg } => {
                module.get_memory(0).ok_or(ValidateError::UnknownMemory(0))?;
                if memarg.align > store.natural_align() {
                    return Err(ValidateError::InvalidAlignment);
                }
                self.expect(store.ty())?;
                self.expect(ValueType::I32)?;
            }

            Instr::MemorySize => {
                module.get_memory(0).ok_or(ValidateError::UnknownMemory(0))?;
                self.push(ValueType::I32);
            }

            Instr::MemoryGrow => {
                module.get_memory(0).ok_or(ValidateError::UnknownMemory(0))?;
                self.expect(ValueType::I32)?;
                self.push(ValueType::I32);
            }

            Instr::I32Const(_) => self.push(ValueType::I32),
            Instr::I64Const(_) => self.push(ValueType::I64),
            Instr::F32Const(_) => self.push(ValueType::F32),
            Instr::F64Const(_) => self.push(ValueType::F64),

            Instr::TestOp(op) => {
                self.expect(op.ty())?;
                self.push(ValueType::I32);
            }

            Instr::RelOp(op) => {
                self.expect(op.ty())?;
                self.expect(op.ty())?;
                self.push(ValueType::I32);
            }

            Instr::Op1(op) => {
                self.expect(op.ty())?;
                self.push(op.ty());
            }

            Instr::Op2(op) => {
                self.expect(op.ty())?;
                self.expect(op.ty())?;
                self.push(op.ty());
            }

            Instr::Convert(cvt) => {
                self.expect(cvt.from_ty())?;
                self.push(cvt.to_ty());
            }

            Instr::Reinterpret(op) => {
                self.expect(op.from_ty())?;
                self.push(op.to_ty());
            }
        }

        Ok(())
    }

    fn local(&self, idx: LocalIdx) -> Result<ValueType> {
        self.locals.get(idx as usize).copied()
            .ok_or(ValidateError::UnknownLocal(idx))
    }
}


fn check_limits(limits: Limits) -> Result<()> {
    if let Some(max) = limits.max {
        if limits.min > max {
            return Err(ValidateError::LimitsMinGtMax);
        }
    }
    Ok(())
}

fn check_memory_limits(limits: Limits) -> Result<()> {
    check_limits(limits)?;
    if limits.min > MAX_PAGES || limits.max.is_some_and(|max| max > MAX_PAGES) {
        return Err(ValidateError::MemoryTooLarge);
    }
    Ok(())
}

fn const_expr_ty(module: &Module, expr: ConstExpr) -> Result<ValueType> {
    Ok(match expr {
        ConstExpr::I32(_) => ValueType::I32,
        ConstExpr::I64(_) => ValueType::I64,
        ConstExpr::F32(_) => ValueType::F32,
        ConstExpr::F64(_) => ValueType::F64,

        ConstExpr::Global(idx) => {
            let ty = module.imports.globals.get(idx as usize).copied()
                .ok_or(ValidateError::ConstExprGlobal)?;
            if ty.mutable {
                return Err(ValidateError::ConstExprGlobal);
            }
            ty.ty
        }
    })
}
