use std::rc::Rc;

use wasm::{FuncType, GlobalType, Limits, ValueType, ImportKind, ExportKind, ConstExpr, Module, MAX_PAGES};

use crate::{Error, LinkError, Trap, TrapKind, Value};
use crate::memory::MemoryInst;
use crate::table::TableInst;
use crate::global::GlobalInst;
use crate::interp;


pub const DEFAULT_STACK_LIMIT: usize = 64 * 1024;
pub const DEFAULT_FRAME_LIMIT: usize = 1024;


// store addresses are dense indices into the store's pools. they are only
// meaningful for the store that handed them out.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncAddr(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TableAddr(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemAddr(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlobalAddr(pub(crate) u32);


/// A reference into the store, as passed across the host boundary: what a
/// host supplies for an import and what an export resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extern {
    Func(FuncAddr),
    Table(TableAddr),
    Memory(MemAddr),
    Global(GlobalAddr),
}


pub type HostFn = dyn Fn(&mut Store, &[Value]) -> Result<Vec<Value>, Trap>;

pub(crate) enum FuncInst {
    Wasm(WasmFunc),
    Host(HostFunc),
}

pub(crate) struct WasmFunc {
    pub ty:       FuncType,
    pub instance: InstanceId,
    pub code:     Rc<interp::Code>,
}

pub(crate) struct HostFunc {
    pub ty:   FuncType,
    pub func: Rc<HostFn>,
}

impl FuncInst {
    pub fn ty(&self) -> &FuncType {
        match self {
            FuncInst::Wasm(f) => &f.ty,
            FuncInst::Host(f) => &f.ty,
        }
    }
}


/// A module instance: symbolic indices resolved to store addresses, imports
/// first, plus the resolved export map.
pub(crate) struct InstanceData {
    pub types:    Vec<FuncType>,
    pub funcs:    Vec<FuncAddr>,
    pub tables:   Vec<TableAddr>,
    pub memories: Vec<MemAddr>,
    pub globals:  Vec<GlobalAddr>,
    pub exports:  Vec<(String, Extern)>,
}


/// The one long-lived mutable container: append-only pools of function,
/// table, memory and global instances, plus the module instances resolving
/// into them. Instances are never freed while the store lives.
pub struct Store {
    pub(crate) funcs:     Vec<FuncInst>,
    pub(crate) tables:    Vec<TableInst>,
    pub(crate) memories:  Vec<MemoryInst>,
    pub(crate) globals:   Vec<GlobalInst>,
    pub(crate) instances: Vec<InstanceData>,

    /// per-invocation interpreter caps; exceeding either traps with
    /// "call stack exhausted".
    pub stack_limit: usize,
    pub frame_limit: usize,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Store {
        Store {
            funcs:     Vec::new(),
            tables:    Vec::new(),
            memories:  Vec::new(),
            globals:   Vec::new(),
            instances: Vec::new(),
            stack_limit: DEFAULT_STACK_LIMIT,
            frame_limit: DEFAULT_FRAME_LIMIT,
        }
    }


    /// Instantiates a *validated* module against the given import values,
    /// which must line up with the module's import list. Allocates the
    /// instance, initialises globals and segments, and runs the start
    /// function.
    pub fn instantiate(&mut self, module: &Module, imports: &[Extern]) -> Result<InstanceId, Error> {
        let declared = &module.imports.imports;
        if imports.len() != declared.len() {
            return Err(LinkError::ImportCount {
                expected: declared.len(),
                provided: imports.len(),
            }.into());
        }

        let mut funcs    = Vec::with_capacity(module.num_funcs());
        let mut tables   = Vec::with_capacity(module.num_tables());
        let mut memories = Vec::with_capacity(module.num_memories());
        let mut globals  = Vec::with_capacity(module.num_globals());

        for (import, ext) in declared.iter().zip(imports.iter().copied()) {
            let link_err = |e: fn(String, String) -> LinkError| {
                e(import.module.clone(), import.name.clone())
            };

            match (import.kind, ext) {
                (ImportKind::Func(ty), Extern::Func(addr)) => {
                    let expect = &module.types[ty as usize];
                    if self.funcs[addr.0 as usize].ty() != expect {
                        return Err(link_err(|module, name| LinkError::FuncTypeMismatch { module, name }).into());
                    }
                    funcs.push(addr);
                }

                (ImportKind::Table(ty), Extern::Table(addr)) => {
                    let have = self.tables[addr.0 as usize].limits();
                    if !subsumes(ty.limits, have) {
                        return Err(link_err(|module, name| LinkError::LimitsNotSubsumed { module, name }).into());
                    }
                    tables.push(addr);
                }

                (ImportKind::Memory(ty), Extern::Memory(addr)) => {
                    let have = self.memories[addr.0 as usize].limits();
                    if !subsumes(ty.limits, have) {
                        return Err(link_err(|module, name| LinkError::LimitsNotSubsumed { module, name }).into());
                    }
                    memories.push(addr);
                }

                (ImportKind::Global(ty), Extern::Global(addr)) => {
                    if self.globals[addr.0 as usize].ty() != ty {
                        return Err(link_err(|module, name| LinkError::GlobalTypeMismatch { module, name }).into());
                    }
                    globals.push(addr);
                }

                _ => {
                    return Err(link_err(|module, name| LinkError::KindMismatch { module, name }).into());
                }
            }
        }

        let id = InstanceId(self.instances.len() as u32);
        let num_imported_globals = globals.len();

        // own allocations, addresses appended after the imported ones.
        for (i, ty) in module.funcs.iter().copied().enumerate() {
            let addr = FuncAddr(self.funcs.len() as u32);
            self.funcs.push(FuncInst::Wasm(WasmFunc {
                ty:       module.types[ty as usize].clone(),
                instance: id,
                code:     Rc::new(interp::compile(module, i)),
            }));
            funcs.push(addr);
        }

        for ty in &module.tables {
            let addr = TableAddr(self.tables.len() as u32);
            self.tables.push(TableInst::new(ty.limits));
            tables.push(addr);
        }

        for ty in &module.memories {
            let addr = MemAddr(self.memories.len() as u32);
            self.memories.push(MemoryInst::new(ty.limits));
            memories.push(addr);
        }

        let imported_globals: Vec<GlobalAddr> = globals[..num_imported_globals].to_vec();
        for global in &module.globals {
            let value = self.eval_const(global.init, &imported_globals);
            let addr = GlobalAddr(self.globals.len() as u32);
            self.globals.push(GlobalInst::new(global.ty, value));
            globals.push(addr);
        }

        // segment offsets are evaluated and bounds-checked against their
        // targets before anything is written; a failure leaves no partial
        // state behind.
        let elem_offsets: Vec<u32> = module.elems.iter()
            .map(|elem| self.eval_const(elem.offset, &imported_globals).as_u32())
            .collect();
        let data_offsets: Vec<u32> = module.datas.iter()
            .map(|data| self.eval_const(data.offset, &imported_globals).as_u32())
            .collect();

        for (elem, offset) in module.elems.iter().zip(elem_offsets.iter().copied()) {
            let table = &self.tables[tables[elem.table as usize].0 as usize];
            if offset as u64 + elem.funcs.len() as u64 > table.len() as u64 {
                return Err(Trap::new(TrapKind::ElemSegmentDoesNotFit).into());
            }
        }
        for (data, offset) in module.datas.iter().zip(data_offsets.iter().copied()) {
            let memory = &self.memories[memories[data.memory as usize].0 as usize];
            if offset as u64 + data.bytes.len() as u64 > memory.len() as u64 {
                return Err(Trap::new(TrapKind::DataSegmentDoesNotFit).into());
            }
        }

        for (elem, offset) in module.elems.iter().zip(elem_offsets.iter().copied()) {
            let table = &mut self.tables[tables[elem.table as usize].0 as usize];
            for (i, func) in elem.funcs.iter().copied().enumerate() {
                table.set(offset + i as u32, Some(funcs[func as usize]))?;
            }
        }
        for (data, offset) in module.datas.iter().zip(data_offsets.iter().copied()) {
            let memory = &mut self.memories[memories[data.memory as usize].0 as usize];
            memory.write(offset, &data.bytes)?;
        }

        let mut exports = Vec::with_capacity(module.exports.len());
        for export in &module.exports {
            let value = match export.kind {
                ExportKind::Func(idx)   => Extern::Func(funcs[idx as usize]),
                ExportKind::Table(idx)  => Extern::Table(tables[idx as usize]),
                ExportKind::Memory(idx) => Extern::Memory(memories[idx as usize]),
                ExportKind::Global(idx) => Extern::Global(globals[idx as usize]),
            };
            exports.push((export.name.clone(), value));
        }

        self.instances.push(InstanceData {
            types: module.types.clone(),
            funcs, tables, memories, globals, exports,
        });

        log::debug!("instantiated module as instance {}", id.0);

        if let Some(start) = module.start {
            let func = self.instances[id.0 as usize].funcs[start as usize];
            self.invoke(func, &[])?;
        }

        Ok(id)
    }

    fn eval_const(&self, expr: ConstExpr, imported_globals: &[GlobalAddr]) -> Value {
        match expr {
            ConstExpr::I32(value) => Value::I32(value),
            ConstExpr::I64(value) => Value::I64(value),
            ConstExpr::F32(value) => Value::F32(value),
            ConstExpr::F64(value) => Value::F64(value),

            // validation pinned this to an imported immutable global.
            ConstExpr::Global(idx) => {
                self.globals[imported_globals[idx as usize].0 as usize].get()
            }
        }
    }


    pub fn exports(&self, instance: InstanceId) -> &[(String, Extern)] {
        &self.instances[instance.0 as usize].exports
    }

    pub fn get_export(&self, instance: InstanceId, name: &str) -> Option<Extern> {
        self.instances[instance.0 as usize].exports.iter()
            .find(|(export, _)| export == name)
            .map(|(_, value)| *value)
    }

    pub fn get_export_func(&self, instance: InstanceId, name: &str) -> Option<FuncAddr> {
        match self.get_export(instance, name) {
            Some(Extern::Func(it)) => Some(it),
            _ => None,
        }
    }

    pub fn get_export_memory(&self, instance: InstanceId, name: &str) -> Option<MemAddr> {
        match self.get_export(instance, name) {
            Some(Extern::Memory(it)) => Some(it),
            _ => None,
        }
    }

    pub fn get_export_global(&self, instance: InstanceId, name: &str) -> Option<GlobalAddr> {
        match self.get_export(instance, name) {
            Some(Extern::Global(it)) => Some(it),
            _ => None,
        }
    }

    pub fn get_export_table(&self, instance: InstanceId, name: &str) -> Option<TableAddr> {
        match self.get_export(instance, name) {
            Some(Extern::Table(it)) => Some(it),
            _ => None,
        }
    }


    pub fn func_ty(&self, func: FuncAddr) -> &FuncType {
        self.funcs[func.0 as usize].ty()
    }

    /// Calls a function with the given arguments, which must match its
    /// parameter types exactly. Runs to completion; a trap unwinds this
    /// invocation only.
    pub fn invoke(&mut self, func: FuncAddr, args: &[Value]) -> Result<Vec<Value>, Error> {
        {
            let ty = self.funcs[func.0 as usize].ty();
            if args.len() != ty.params.len()
                || args.iter().zip(&ty.params).any(|(arg, ty)| arg.ty() != *ty)
            {
                return Err(Error::ArgumentTypes);
            }
        }

        if let FuncInst::Host(host) = &self.funcs[func.0 as usize] {
            let f = host.func.clone();
            let rets = host.ty.rets.clone();

            let results = f.as_ref()(self, args).map_err(Error::Trap)?;
            if results.len() != rets.len()
                || results.iter().zip(&rets).any(|(v, ty)| v.ty() != *ty)
            {
                return Err(Trap::new(TrapKind::HostError).into());
            }
            return Ok(results);
        }

        interp::invoke(self, func, args).map_err(|trap| {
            log::debug!("invocation trapped: {trap}");
            Error::Trap(trap)
        })
    }


    // host-side allocation: the building blocks for import values.

    pub fn new_host_func<F>(&mut self, params: &[ValueType], rets: &[ValueType], f: F) -> FuncAddr
        where F: Fn(&mut Store, &[Value]) -> Result<Vec<Value>, Trap> + 'static
    {
        let addr = FuncAddr(self.funcs.len() as u32);
        self.funcs.push(FuncInst::Host(HostFunc {
            ty: FuncType { params: params.into(), rets: rets.into() },
            func: Rc::new(f),
        }));
        addr
    }

    pub fn new_table(&mut self, limits: Limits) -> Result<TableAddr, Error> {
        if limits.max.is_some_and(|max| limits.min > max) {
            return Err(Error::ResourceLimit);
        }
        let addr = TableAddr(self.tables.len() as u32);
        self.tables.push(TableInst::new(limits));
        Ok(addr)
    }

    pub fn new_memory(&mut self, limits: Limits) -> Result<MemAddr, Error> {
        if limits.min > MAX_PAGES
            || limits.max.is_some_and(|max| max > MAX_PAGES || limits.min > max)
        {
            return Err(Error::ResourceLimit);
        }
        let addr = MemAddr(self.memories.len() as u32);
        self.memories.push(MemoryInst::new(limits));
        Ok(addr)
    }

    pub fn new_global(&mut self, ty: GlobalType, value: Value) -> Result<GlobalAddr, Error> {
        if value.ty() != ty.ty {
            return Err(Error::ValueType);
        }
        let addr = GlobalAddr(self.globals.len() as u32);
        self.globals.push(GlobalInst::new(ty, value));
        Ok(addr)
    }


    // host-side accessors, each bounds- and type-checked.

    pub fn memory_size(&self, memory: MemAddr) -> u32 {
        self.memories[memory.0 as usize].size_pages()
    }

    pub fn memory_grow(&mut self, memory: MemAddr, by_pages: u32) -> Option<u32> {
        self.memories[memory.0 as usize].grow(by_pages)
    }

    pub fn memory_read(&self, memory: MemAddr, addr: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.memories[memory.0 as usize].read(addr, buf)
            .map_err(|_| Error::OutOfRange)
    }

    pub fn memory_write(&mut self, memory: MemAddr, addr: u32, bytes: &[u8]) -> Result<(), Error> {
        self.memories[memory.0 as usize].write(addr, bytes)
            .map_err(|_| Error::OutOfRange)
    }

    pub fn global_get(&self, global: GlobalAddr) -> Value {
        self.globals[global.0 as usize].get()
    }

    pub fn global_set(&mut self, global: GlobalAddr, value: Value) -> Result<(), Error> {
        let inst = &mut self.globals[global.0 as usize];
        if !inst.ty().mutable {
            return Err(Error::ImmutableGlobal);
        }
        if value.ty() != inst.ty().ty {
            return Err(Error::ValueType);
        }
        inst.set(value);
        Ok(())
    }

    pub fn table_get(&self, table: TableAddr, idx: u32) -> Result<Option<FuncAddr>, Error> {
        self.tables[table.0 as usize].get(idx)
            .map_err(|_| Error::OutOfRange)
    }

    pub fn table_set(&mut self, table: TableAddr, idx: u32, value: Option<FuncAddr>) -> Result<(), Error> {
        self.tables[table.0 as usize].set(idx, value)
            .map_err(|_| Error::OutOfRange)
    }
}


/// Import limits subsumption: the provided instance must offer at least the
/// required minimum and stay within the required maximum.
fn subsumes(required: Limits, provided: Limits) -> bool {
    if provided.min < required.min {
        return false;
    }
    match required.max {
        None => true,
        Some(required_max) => provided.max.is_some_and(|max| max <= required_max),
    }
}
