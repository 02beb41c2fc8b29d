use crate::leb128;
use crate::opcode;
use crate::{ValueType, BlockType, FuncType, Limits, TableType, MemoryType, GlobalType};
use crate::{Import, ImportKind, ConstExpr, Global, Export, ExportKind, Elem, Data, Code};
use crate::{CustomSection, SectionKind, ModuleLimits, Module};
use crate::instr::{Instr, MemArg, Load, Store, TestOp, RelOp, Op1, Op2, Convert, Reinterpret};


#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("integer too large")]
    Leb128Overflow,
    #[error("magic header not detected")]
    InvalidMagic,
    #[error("unknown binary version")]
    InvalidVersion,
    #[error("invalid section id")]
    InvalidSectionId,
    #[error("section out of order")]
    SectionOutOfOrder,
    #[error("duplicate section")]
    DuplicateSection,
    #[error("section size mismatch")]
    SectionTrailingData,
    #[error("function body size mismatch")]
    BodySizeMismatch,
    #[error("invalid value type")]
    InvalidValueType,
    #[error("invalid block type")]
    InvalidBlockType,
    #[error("invalid function type")]
    InvalidFuncType,
    #[error("invalid limits flag")]
    InvalidLimits,
    #[error("invalid element type")]
    InvalidElemType,
    #[error("invalid global type")]
    InvalidGlobalType,
    #[error("invalid import kind")]
    InvalidImportKind,
    #[error("invalid export kind")]
    InvalidExportKind,
    #[error("malformed UTF-8 encoding")]
    StringNotUtf8,
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("unexpected else")]
    UnexpectedElse,
    #[error("invalid constant expression")]
    InvalidConstExpr,
    #[error("zero flag expected")]
    ReservedByteNotZero,
    #[error("function and code section have inconsistent lengths")]
    FuncCountMismatch,
    #[error("too many locals")]
    TooManyLocals,
    #[error("block nesting too deep")]
    NestingTooDeep,
    #[error("too many {0}")]
    LimitExceeded(&'static str),
}

/// A decode failure, carrying the byte offset it was detected at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("at offset 0x{pos:x}: {kind}")]
pub struct ParseError {
    pub pos:  usize,
    pub kind: ParseErrorKind,
}

pub type Result<T> = core::result::Result<T, ParseError>;

impl From<leb128::Leb128Error> for ParseErrorKind {
    #[inline]
    fn from(value: leb128::Leb128Error) -> Self {
        match value {
            leb128::Leb128Error::Overflow => ParseErrorKind::Leb128Overflow,
            leb128::Leb128Error::Eof      => ParseErrorKind::UnexpectedEof,
        }
    }
}


/// Byte cursor over the input. Offsets are absolute, also in sub-readers,
/// so errors always report a position in the original byte string.
#[derive(Clone, Copy)]
struct Reader<'a> {
    bytes: &'a [u8],
    pos:   usize,
}

impl<'a> Reader<'a> {
    #[inline]
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    /// a reader over `bytes[pos..pos+len]` that keeps absolute offsets.
    #[inline]
    fn sub(bytes: &'a [u8], pos: usize, len: usize) -> Self {
        Reader { bytes: &bytes[..pos + len], pos }
    }

    #[inline]
    fn len(&self) -> usize {
        self.bytes.len() - self.pos
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }

    #[inline]
    fn next(&mut self) -> Option<u8> {
        let at = self.bytes.get(self.pos).copied()?;
        self.pos += 1;
        Some(at)
    }

    #[inline]
    fn next_n(&mut self, n: usize) -> Option<&'a [u8]> {
        let result = self.bytes.get(self.pos .. self.pos.checked_add(n)?)?;
        self.pos += n;
        Some(result)
    }

    #[inline]
    fn next_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.next_n(N)?;
        Some(bytes.try_into().unwrap())
    }

    #[inline]
    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }
}


pub struct Parser<'a> {
    reader: Reader<'a>,
}

impl<'a> Parser<'a> {
    #[inline]
    pub fn new(wasm: &'a [u8]) -> Self {
        Self { reader: Reader::new(wasm) }
    }

    #[inline]
    fn is_done(&self) -> bool {
        self.reader.is_empty()
    }

    #[inline]
    fn next(&mut self) -> Result<u8> {
        self.reader.next()
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof))
    }

    #[inline]
    fn parse_u32(&mut self) -> Result<u32> {
        let (value, len) = leb128::decode_u32(self.reader.rest())
            .map_err(|e| self.error(e.into()))?;
        self.reader.pos += len;
        Ok(value)
    }

    #[inline]
    fn parse_i32(&mut self) -> Result<i32> {
        let (value, len) = leb128::decode_i32(self.reader.rest())
            .map_err(|e| self.error(e.into()))?;
        self.reader.pos += len;
        Ok(value)
    }

    #[inline]
    fn parse_i64(&mut self) -> Result<i64> {
        let (value, len) = leb128::decode_i64(self.reader.rest())
            .map_err(|e| self.error(e.into()))?;
        self.reader.pos += len;
        Ok(value)
    }

    #[inline]
    fn parse_f32(&mut self) -> Result<f32> {
        let bytes = self.reader.next_array::<4>()
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof))?;
        Ok(f32::from_le_bytes(bytes))
    }

    #[inline]
    fn parse_f64(&mut self) -> Result<f64> {
        let bytes = self.reader.next_array::<8>()
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof))?;
        Ok(f64::from_le_bytes(bytes))
    }

    #[inline]
    fn parse_length(&mut self) -> Result<usize> {
        Ok(self.parse_u32()? as usize)
    }

    fn parse_string(&mut self) -> Result<String> {
        let len = self.parse_length()?;
        let bytes = self.reader.next_n(len)
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof))?;
        let string = core::str::from_utf8(bytes)
            .map_err(|_| self.error(ParseErrorKind::StringNotUtf8))?;
        Ok(string.into())
    }

    fn parse_value_type(&mut self) -> Result<ValueType> {
        let at = self.next()?;
        ValueType::from_u8(at)
            .ok_or_else(|| self.error(ParseErrorKind::InvalidValueType))
    }

    fn parse_block_type(&mut self) -> Result<BlockType> {
        let at = self.next()?;
        if at == 0x40 {
            return Ok(BlockType::Unit);
        }
        let ty = ValueType::from_u8(at)
            .ok_or_else(|| self.error(ParseErrorKind::InvalidBlockType))?;
        Ok(BlockType::Value(ty))
    }

    fn parse_func_type(&mut self) -> Result<FuncType> {
        if self.next()? != 0x60 {
            return Err(self.error_at(self.reader.pos - 1, ParseErrorKind::InvalidFuncType));
        }

        let num_params = self.parse_length()?;
        let mut params = Vec::with_capacity(num_params.min(64));
        for _ in 0..num_params {
            params.push(self.parse_value_type()?);
        }

        let num_rets = self.parse_length()?;
        let mut rets = Vec::with_capacity(num_rets.min(64));
        for _ in 0..num_rets {
            rets.push(self.parse_value_type()?);
        }

        Ok(FuncType { params, rets })
    }

    fn parse_limits(&mut self) -> Result<Limits> {
        Ok(match self.next()? {
            0x00 => Limits { min: self.parse_u32()?, max: None },
            0x01 => Limits { min: self.parse_u32()?, max: Some(self.parse_u32()?) },

            _ => return Err(self.error(ParseErrorKind::InvalidLimits)),
        })
    }

    fn parse_table_type(&mut self) -> Result<TableType> {
        // funcref is the only element type in wasm 1.0.
        if self.next()? != 0x70 {
            return Err(self.error_at(self.reader.pos - 1, ParseErrorKind::InvalidElemType));
        }
        Ok(TableType { limits: self.parse_limits()? })
    }

    fn parse_memory_type(&mut self) -> Result<MemoryType> {
        Ok(MemoryType { limits: self.parse_limits()? })
    }

    fn parse_global_type(&mut self) -> Result<GlobalType> {
        let ty = self.parse_value_type()?;
        let mutable = match self.next()? {
            0 => false,
            1 => true,

            _ => return Err(self.error(ParseErrorKind::InvalidGlobalType)),
        };
        Ok(GlobalType { ty, mutable })
    }

    fn parse_import(&mut self) -> Result<Import> {
        let module = self.parse_string()?;
        let name = self.parse_string()?;

        let kind = match self.next()? {
            0x00 => ImportKind::Func(self.parse_u32()?),
            0x01 => ImportKind::Table(self.parse_table_type()?),
            0x02 => ImportKind::Memory(self.parse_memory_type()?),
            0x03 => ImportKind::Global(self.parse_global_type()?),

            _ => return Err(self.error(ParseErrorKind::InvalidImportKind)),
        };

        Ok(Import { module, name, kind })
    }

    fn parse_export(&mut self) -> Result<Export> {
        let name = self.parse_string()?;
        let kind = match self.next()? {
            0x00 => ExportKind::Func(self.parse_u32()?),
            0x01 => ExportKind::Table(self.parse_u32()?),
            0x02 => ExportKind::Memory(self.parse_u32()?),
            0x03 => ExportKind::Global(self.parse_u32()?),

            _ => return Err(self.error(ParseErrorKind::InvalidExportKind)),
        };
        Ok(Export { name, kind })
    }

    fn parse_const_expr(&mut self) -> Result<ConstExpr> {
        let result = match self.next()? {
            opcode::I32_CONST  => ConstExpr::I32(self.parse_i32()?),
            opcode::I64_CONST  => ConstExpr::I64(self.parse_i64()?),
            opcode::F32_CONST  => ConstExpr::F32(self.parse_f32()?),
            opcode::F64_CONST  => ConstExpr::F64(self.parse_f64()?),
            opcode::GLOBAL_GET => ConstExpr::Global(self.parse_u32()?),

            _ => return Err(self.error(ParseErrorKind::InvalidConstExpr)),
        };

        if self.next()? != opcode::END {
            return Err(self.error(ParseErrorKind::InvalidConstExpr));
        }

        Ok(result)
    }

    fn parse_elem(&mut self) -> Result<Elem> {
        let table = self.parse_u32()?;
        let offset = self.parse_const_expr()?;

        let num_funcs = self.parse_length()?;
        let mut funcs = Vec::with_capacity(num_funcs.min(1024));
        for _ in 0..num_funcs {
            funcs.push(self.parse_u32()?);
        }

        Ok(Elem { table, offset, funcs })
    }

    fn parse_data(&mut self) -> Result<Data> {
        let memory = self.parse_u32()?;
        let offset = self.parse_const_expr()?;

        let len = self.parse_length()?;
        let bytes = self.reader.next_n(len)
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof))?;

        Ok(Data { memory, offset, bytes: bytes.into() })
    }

    fn parse_code(&mut self, limits: &ModuleLimits) -> Result<Code> {
        let size = self.parse_length()?;
        let begin = self.reader.pos;
        self.reader.next_n(size)
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedEof))?;

        let mut p = Parser { reader: Reader::sub(self.reader.bytes, begin, size) };

        let num_groups = p.parse_length()?;
        let mut locals = Vec::new();
        for _ in 0..num_groups {
            let n = p.parse_length()?;
            let ty = p.parse_value_type()?;

            if locals.len() + n > limits.max_locals as usize {
                return Err(p.error(ParseErrorKind::TooManyLocals));
            }

            locals.extend((0..n).map(|_| ty));
        }

        let (body, term) = p.parse_expr(0, limits)?;
        if term != opcode::END {
            return Err(p.error(ParseErrorKind::UnexpectedElse));
        }
        if !p.is_done() {
            return Err(p.error(ParseErrorKind::BodySizeMismatch));
        }

        Ok(Code { locals, body })
    }

    fn parse_memarg(&mut self) -> Result<MemArg> {
        let align = self.parse_u32()?;
        let offset = self.parse_u32()?;
        Ok(MemArg { align, offset })
    }

    /// Parses instructions up to (and including) the terminating `end` or
    /// `else`; returns the terminator's opcode alongside the body.
    fn parse_expr(&mut self, depth: u32, limits: &ModuleLimits) -> Result<(Vec<Instr>, u8)> {
        if depth > limits.max_nesting {
            return Err(self.error(ParseErrorKind::NestingTooDeep));
        }

        let mut body = Vec::new();
        loop {
            let at = self.next()?;
            let instr = match at {
                opcode::END | opcode::ELSE => {
                    return Ok((body, at));
                }

                opcode::UNREACHABLE => Instr::Unreachable,
                opcode::NOP => Instr::Nop,

                opcode::BLOCK => {
                    let ty = self.parse_block_type()?;
                    let (inner, term) = self.parse_expr(depth + 1, limits)?;
                    if term != opcode::END {
                        return Err(self.error(ParseErrorKind::UnexpectedElse));
                    }
                    Instr::Block { ty, body: inner }
                }

                opcode::LOOP => {
                    let ty = self.parse_block_type()?;
                    let (inner, term) = self.parse_expr(depth + 1, limits)?;
                    if term != opcode::END {
                        return Err(self.error(ParseErrorKind::UnexpectedElse));
                    }
                    Instr::Loop { ty, body: inner }
                }

                opcode::IF => {
                    let ty = self.parse_block_type()?;
                    let (then, term) = self.parse_expr(depth + 1, limits)?;
                    let els = if term == opcode::ELSE {
                        let (els, term) = self.parse_expr(depth + 1, limits)?;
                        if term != opcode::END {
                            return Err(self.error(ParseErrorKind::UnexpectedElse));
                        }
                        els
                    }
                    else {
                        Vec::new()
                    };
                    Instr::If { ty, then, els }
                }

                opcode::BR    => Instr::Br(self.parse_u32()?),
                opcode::BR_IF => Instr::BrIf(self.parse_u32()?),

                opcode::BR_TABLE => {
                    let num_labels = self.parse_length()?;
                    let mut labels = Vec::with_capacity(num_labels.min(1024));
                    for _ in 0..num_labels {
                        labels.push(self.parse_u32()?);
                    }
                    let default = self.parse_u32()?;
                    Instr::BrTable { labels, default }
                }

                opcode::RETURN => Instr::Return,
                opcode::CALL   => Instr::Call(self.parse_u32()?),

                opcode::CALL_INDIRECT => {
                    let ty = self.parse_u32()?;
                    if self.next()? != 0x00 {
                        return Err(self.error(ParseErrorKind::ReservedByteNotZero));
                    }
                    Instr::CallIndirect(ty)
                }

                opcode::DROP   => Instr::Drop,
                opcode::SELECT => Instr::Select,

                opcode::LOCAL_GET  => Instr::LocalGet(self.parse_u32()?),
                opcode::LOCAL_SET  => Instr::LocalSet(self.parse_u32()?),
                opcode::LOCAL_TEE  => Instr::LocalTee(self.parse_u32()?),
                opcode::GLOBAL_GET => Instr::GlobalGet(self.parse_u32()?),
                opcode::GLOBAL_SET => Instr::GlobalSet(self.parse_u32()?),

                opcode::I32_LOAD ..= opcode::I64_LOAD32_U => {
                    Instr::Load { load: Load::from_opcode(at), memarg: self.parse_memarg()? }
                }

                opcode::I32_STORE ..= opcode::I64_STORE32 => {
                    Instr::Store { store: Store::from_opcode(at), memarg: self.parse_memarg()? }
                }

                opcode::MEMORY_SIZE => {
                    if self.next()? != 0x00 {
                        return Err(self.error(ParseErrorKind::ReservedByteNotZero));
                    }
                    Instr::MemorySize
                }

                opcode::MEMORY_GROW => {
                    if self.next()? != 0x00 {
                        return Err(self.error(ParseErrorKind::ReservedByteNotZero));
                    }
                    Instr::MemoryGrow
                }

                opcode::I32_CONST => Instr::I32Const(self.parse_i32()?),
                opcode::I64_CONST => Instr::I64Const(self.parse_i64()?),
                opcode::F32_CONST => Instr::F32Const(self.parse_f32()?),
                opcode::F64_CONST => Instr::F64Const(self.parse_f64()?),

                opcode::I32_EQZ | opcode::I64_EQZ => {
                    Instr::TestOp(TestOp::from_opcode(at))
                }

                opcode::I32_EQ ..= opcode::I32_GE_U |
                opcode::I64_EQ ..= opcode::I64_GE_U |
                opcode::F32_EQ ..= opcode::F64_GE => {
                    Instr::RelOp(RelOp::from_opcode(at))
                }

                opcode::I32_CLZ ..= opcode::I32_POPCNT |
                opcode::I64_CLZ ..= opcode::I64_POPCNT |
                opcode::F32_ABS ..= opcode::F32_SQRT |
                opcode::F64_ABS ..= opcode::F64_SQRT => {
                    Instr::Op1(Op1::from_opcode(at))
                }

                opcode::I32_ADD ..= opcode::I32_ROTR |
                opcode::I64_ADD ..= opcode::I64_ROTR |
                opcode::F32_ADD ..= opcode::F32_COPYSIGN |
                opcode::F64_ADD ..= opcode::F64_COPYSIGN => {
                    Instr::Op2(Op2::from_opcode(at))
                }

                opcode::I32_WRAP_I64 ..= opcode::F64_PROMOTE_F32 => {
                    Instr::Convert(Convert::from_opcode(at))
                }

                opcode::I32_REINTERPRET_F32 ..= opcode::F64_REINTERPRET_I64 => {
                    Instr::Reinterpret(Reinterpret::from_opcode(at))
                }

                _ => return Err(self.error_at(self.reader.pos - 1, ParseErrorKind::UnknownOpcode(at))),
            };
            body.push(instr);
        }
    }

    #[inline]
    #[must_use]
    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError { pos: self.reader.pos, kind }
    }

    #[inline]
    #[must_use]
    fn error_at(&self, pos: usize, kind: ParseErrorKind) -> ParseError {
        ParseError { pos, kind }
    }
}


impl<'a> Parser<'a> {
    pub fn parse_module(wasm: &'a [u8], limits: ModuleLimits) -> Result<Module> {
        let mut p = Parser::new(wasm);

        {
            let magic = p.reader.next_array::<4>()
                .ok_or_else(|| p.error(ParseErrorKind::InvalidMagic))?;
            if magic != *b"\0asm" {
                return Err(p.error_at(0, ParseErrorKind::InvalidMagic));
            }
            let version = p.reader.next_array::<4>()
                .ok_or_else(|| p.error(ParseErrorKind::InvalidVersion))?;
            if version != [1, 0, 0, 0] {
                return Err(p.error_at(4, ParseErrorKind::InvalidVersion));
            }
        }

        let mut module = Module::default();
        let mut last_section = SectionKind::Custom;

        while !p.is_done() {
            let id = p.next()?;
            let kind = SectionKind::from_u8(id)
                .ok_or_else(|| p.error_at(p.reader.pos - 1, ParseErrorKind::InvalidSectionId))?;

            // known sections appear at most once, in id order.
            if kind != SectionKind::Custom {
                if kind == last_section {
                    return Err(p.error(ParseErrorKind::DuplicateSection));
                }
                if (kind as u8) < last_section as u8 {
                    return Err(p.error(ParseErrorKind::SectionOutOfOrder));
                }
                last_section = kind;
            }

            let size = p.parse_length()?;
            let begin = p.reader.pos;
            p.reader.next_n(size)
                .ok_or_else(|| p.error(ParseErrorKind::UnexpectedEof))?;

            let mut sp = Parser { reader: Reader::sub(wasm, begin, size) };

            match kind {
                SectionKind::Custom => {
                    if module.customs.len() >= limits.max_customs as usize {
                        return Err(sp.error(ParseErrorKind::LimitExceeded("custom sections")));
                    }

                    let name = sp.parse_string()?;
                    let bytes = sp.reader.rest().into();
                    sp.reader.pos = sp.reader.bytes.len();
                    module.customs.push(CustomSection { name, bytes });
                }

                SectionKind::Type => {
                    let num_types = sp.parse_u32()?;
                    if num_types > limits.max_types {
                        return Err(sp.error(ParseErrorKind::LimitExceeded("types")));
                    }

                    for _ in 0..num_types {
                        module.types.push(sp.parse_func_type()?);
                    }
                }

                SectionKind::Import => {
                    let num_imports = sp.parse_u32()?;
                    if num_imports > limits.max_imports {
                        return Err(sp.error(ParseErrorKind::LimitExceeded("imports")));
                    }

                    for _ in 0..num_imports {
                        let import = sp.parse_import()?;
                        match import.kind {
                            ImportKind::Func(it)   => module.imports.funcs.push(it),
                            ImportKind::Table(it)  => module.imports.tables.push(it),
                            ImportKind::Memory(it) => module.imports.memories.push(it),
                            ImportKind::Global(it) => module.imports.globals.push(it),
                        }
                        module.imports.imports.push(import);
                    }
                }

                SectionKind::Function => {
                    let num_funcs = sp.parse_u32()?;
                    if num_funcs > limits.max_funcs {
                        return Err(sp.error(ParseErrorKind::LimitExceeded("functions")));
                    }

                    for _ in 0..num_funcs {
                        module.funcs.push(sp.parse_u32()?);
                    }
                }

                SectionKind::Table => {
                    let num_tables = sp.parse_u32()?;
                    if num_tables > limits.max_tables {
                        return Err(sp.error(ParseErrorKind::LimitExceeded("tables")));
                    }

                    for _ in 0..num_tables {
                        module.tables.push(sp.parse_table_type()?);
                    }
                }

                SectionKind::Memory => {
                    let num_memories = sp.parse_u32()?;
                    if num_memories > limits.max_memories {
                        return Err(sp.error(ParseErrorKind::LimitExceeded("memories")));
                    }

                    for _ in 0..num_memories {
                        module.memories.push(sp.parse_memory_type()?);
                    }
                }

                SectionKind::Global => {
                    let num_globals = sp.parse_u32()?;
                    if num_globals > limits.max_globals {
                        return Err(sp.error(ParseErrorKind::LimitExceeded("globals")));
                    }

                    for _ in 0..num_globals {
                        let ty = sp.parse_global_type()?;
                        let init = sp.parse_const_expr()?;
                        module.globals.push(Global { ty, init });
                    }
                }

                SectionKind::Export => {
                    let num_exports = sp.parse_u32()?;
                    if num_exports > limits.max_exports {
                        return Err(sp.error(ParseErrorKind::LimitExceeded("exports")));
                    }

                    for _ in 0..num_exports {
                        module.exports.push(sp.parse_export()?);
                    }
                }

                SectionKind::Start => {
                    module.start = Some(sp.parse_u32()?);
                }

                SectionKind::Element => {
                    let num_elems = sp.parse_u32()?;
                    if num_elems > limits.max_elements {
                        return Err(sp.error(ParseErrorKind::LimitExceeded("element segments")));
                    }

                    for _ in 0..num_elems {
                        module.elems.push(sp.parse_elem()?);
                    }
                }

                SectionKind::Code => {
                    let num_codes = sp.parse_u32()?;
                    if num_codes as usize != module.funcs.len() {
                        return Err(sp.error(ParseErrorKind::FuncCountMismatch));
                    }

                    for _ in 0..num_codes {
                        module.codes.push(sp.parse_code(&limits)?);
                    }
                }

                SectionKind::Data => {
                    let num_datas = sp.parse_u32()?;
                    if num_datas > limits.max_datas {
                        return Err(sp.error(ParseErrorKind::LimitExceeded("data segments")));
                    }

                    for _ in 0..num_datas {
                        module.datas.push(sp.parse_data()?);
                    }
                }
            }

            if !sp.is_done() {
                return Err(sp.error(ParseErrorKind::SectionTrailingData));
            }
        }

        if module.codes.len() != module.funcs.len() {
            return Err(p.error(ParseErrorKind::FuncCountMismatch));
        }

        log::debug!(
            "parsed module: {} types, {} imports, {} funcs, {} exports",
            module.types.len(), module.imports.imports.len(),
            module.funcs.len(), module.exports.len());

        Ok(module)
    }
}
