#![doc = include_str!("../../../README.md")]

mod datatype;
mod error;
mod ir;
mod literal;
mod lower;
mod op;
mod symbols;
pub mod tree;

pub use crate::{
    datatype::{DataType, DefaultTypes, TypeSuffix, Value},
    error::{CompileError, CompileResult, ErrorKind},
    ir::{InstrRef, Instruction, Ir},
    literal::parse_numeric,
    lower::{CompiledProgram, MAX_CONTROL_DEPTH, compile, compile_with_source},
    op::Opcode,
    symbols::{ArrayDescriptor, LabelKind, SymbolEntry, SymbolId, SymbolTable, VariableName},
};
