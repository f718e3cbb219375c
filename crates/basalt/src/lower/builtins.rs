//! The built-in function table.
//!
//! Each entry declares the opcode, the accepted argument shapes, and how the
//! result type is derived; [`Lowerer::lower_function`] drives the checks so
//! individual built-ins never need bespoke lowering code. The table is an
//! `IndexMap` so iteration order (and therefore any diagnostics derived from
//! it) is deterministic.

use std::sync::LazyLock;

use indexmap::IndexMap;

use crate::{
    datatype::DataType,
    error::{CompileResult, ErrorKind},
    ir::InstrRef,
    op::Opcode,
    symbols::SymbolId,
    tree::{CodeRange, Expr, ExprKind},
};

use super::Lowerer;

/// Accepted shape of one built-in argument.
#[derive(Debug, Clone, Copy)]
enum ParamRule {
    /// Any numeric expression.
    Numeric,
    /// A string expression.
    Str,
    /// A bare name of a DIM'd 1-D numeric array; the operand is the array
    /// variable id itself.
    Array1dNumeric,
}

/// How a built-in's result type is derived.
#[derive(Debug, Clone, Copy)]
enum ResultRule {
    Fixed(DataType),
    /// The first argument's type (ABS, INT, FIX).
    SameAsFirst,
}

#[derive(Debug, Clone, Copy)]
struct Builtin {
    opcode: Opcode,
    /// Minimum argument count; the maximum is `params.len()`.
    min_args: usize,
    params: &'static [ParamRule],
    result: ResultRule,
}

const fn builtin(opcode: Opcode, min_args: usize, params: &'static [ParamRule], result: ResultRule) -> Builtin {
    Builtin {
        opcode,
        min_args,
        params,
        result,
    }
}

const NUM: &[ParamRule] = &[ParamRule::Numeric];
const NUM2: &[ParamRule] = &[ParamRule::Numeric, ParamRule::Numeric];
const STR: &[ParamRule] = &[ParamRule::Str];
const STR_NUM: &[ParamRule] = &[ParamRule::Str, ParamRule::Numeric];
const STR_NUM2: &[ParamRule] = &[ParamRule::Str, ParamRule::Numeric, ParamRule::Numeric];
const STR2_NUM: &[ParamRule] = &[ParamRule::Str, ParamRule::Str, ParamRule::Numeric];
const NUM_STR: &[ParamRule] = &[ParamRule::Numeric, ParamRule::Str];
const ARR1: &[ParamRule] = &[ParamRule::Array1dNumeric];
const ARR1_NUM: &[ParamRule] = &[ParamRule::Array1dNumeric, ParamRule::Numeric];
const NONE: &[ParamRule] = &[];

static BUILTINS: LazyLock<IndexMap<&'static str, Builtin>> = LazyLock::new(|| {
    use DataType::{Float64, Int32, Int64, String};
    use ResultRule::{Fixed, SameAsFirst};
    IndexMap::from([
        // trig and math
        ("ABS", builtin(Opcode::Abs, 1, NUM, SameAsFirst)),
        ("SIN", builtin(Opcode::Sin, 1, NUM, Fixed(Float64))),
        ("COS", builtin(Opcode::Cos, 1, NUM, Fixed(Float64))),
        ("TAN", builtin(Opcode::Tan, 1, NUM, Fixed(Float64))),
        ("ASIN", builtin(Opcode::Asin, 1, NUM, Fixed(Float64))),
        ("ACOS", builtin(Opcode::Acos, 1, NUM, Fixed(Float64))),
        ("ATN", builtin(Opcode::Atn, 1, NUM, Fixed(Float64))),
        ("SINH", builtin(Opcode::Sinh, 1, NUM, Fixed(Float64))),
        ("COSH", builtin(Opcode::Cosh, 1, NUM, Fixed(Float64))),
        ("TANH", builtin(Opcode::Tanh, 1, NUM, Fixed(Float64))),
        ("EXP", builtin(Opcode::Exp, 1, NUM, Fixed(Float64))),
        ("LOG", builtin(Opcode::Log, 1, NUM, Fixed(Float64))),
        ("LOG10", builtin(Opcode::Log10, 1, NUM, Fixed(Float64))),
        ("SQR", builtin(Opcode::Sqr, 1, NUM, Fixed(Float64))),
        ("CEIL", builtin(Opcode::Ceil, 1, NUM, Fixed(Float64))),
        ("FLOOR", builtin(Opcode::Floor, 1, NUM, Fixed(Float64))),
        ("ROUND", builtin(Opcode::Round, 1, NUM, SameAsFirst)),
        ("SGN", builtin(Opcode::Sgn, 1, NUM, SameAsFirst)),
        // conversions
        ("CINT", builtin(Opcode::Cint, 1, NUM, Fixed(Int32))),
        ("CLNG", builtin(Opcode::Clng, 1, NUM, Fixed(Int64))),
        ("CSNG", builtin(Opcode::Csng, 1, NUM, Fixed(DataType::Float32))),
        ("CDBL", builtin(Opcode::Cdbl, 1, NUM, Fixed(Float64))),
        ("FIX", builtin(Opcode::Fix, 1, NUM, SameAsFirst)),
        ("INT", builtin(Opcode::Int, 1, NUM, SameAsFirst)),
        ("VAL", builtin(Opcode::Val, 1, STR, Fixed(Float64))),
        ("ASC", builtin(Opcode::Asc, 1, STR, Fixed(Int32))),
        ("CHR$", builtin(Opcode::Chr, 1, NUM, Fixed(String))),
        ("STR$", builtin(Opcode::Str, 1, NUM, Fixed(String))),
        ("HEX$", builtin(Opcode::Hex, 1, NUM, Fixed(String))),
        ("OCT$", builtin(Opcode::Oct, 1, NUM, Fixed(String))),
        // strings
        ("LEN", builtin(Opcode::Len, 1, STR, Fixed(Int32))),
        ("LEFT$", builtin(Opcode::Left, 2, STR_NUM, Fixed(String))),
        ("RIGHT$", builtin(Opcode::Right, 2, STR_NUM, Fixed(String))),
        ("MID$", builtin(Opcode::Mid, 2, STR_NUM2, Fixed(String))),
        ("INSTR", builtin(Opcode::Instr, 2, STR2_NUM, Fixed(Int32))),
        ("SPACE$", builtin(Opcode::Space, 1, NUM, Fixed(String))),
        ("STRING$", builtin(Opcode::StringOf, 2, NUM_STR, Fixed(String))),
        ("UCASE$", builtin(Opcode::Ucase, 1, STR, Fixed(String))),
        ("LCASE$", builtin(Opcode::Lcase, 1, STR, Fixed(String))),
        ("LTRIM$", builtin(Opcode::Ltrim, 1, STR, Fixed(String))),
        ("RTRIM$", builtin(Opcode::Rtrim, 1, STR, Fixed(String))),
        ("INPUT$", builtin(Opcode::InputStr, 1, NUM2, Fixed(String))),
        ("ENVIRON$", builtin(Opcode::Environ, 1, STR, Fixed(String))),
        // 1-D array statistics
        ("ARRAY1DMIN", builtin(Opcode::Array1dMin, 1, ARR1, Fixed(Float64))),
        ("ARRAY1DMAX", builtin(Opcode::Array1dMax, 1, ARR1, Fixed(Float64))),
        ("ARRAY1DMEAN", builtin(Opcode::Array1dMean, 1, ARR1, Fixed(Float64))),
        ("ARRAY1DSUM", builtin(Opcode::Array1dSum, 1, ARR1, Fixed(Float64))),
        ("ARRAY1DSTD", builtin(Opcode::Array1dStd, 1, ARR1, Fixed(Float64))),
        ("ARRAY1DMEDIAN", builtin(Opcode::Array1dMedian, 1, ARR1, Fixed(Float64))),
        ("ARRAY1DPCT", builtin(Opcode::Array1dPct, 2, ARR1_NUM, Fixed(Float64))),
        ("ARRAY1DBINSEARCH", builtin(Opcode::Array1dBinSearch, 2, ARR1_NUM, Fixed(Int32))),
        // misc
        ("RND", builtin(Opcode::Rnd, 0, NONE, Fixed(Float64))),
        ("TIMER", builtin(Opcode::Timer, 0, NONE, Fixed(Float64))),
        ("EOF", builtin(Opcode::Eof, 1, NUM, Fixed(Int64))),
    ])
});

impl Lowerer<'_> {
    /// Lowers a built-in function call. The first two arguments become
    /// `op1`/`op2`; any further arguments are pushed via PARAM1 first.
    pub(crate) fn lower_function(&mut self, name: &str, args: &[Expr], range: CodeRange) -> CompileResult<InstrRef> {
        let key = name.to_ascii_uppercase();
        let Some(builtin) = BUILTINS.get(key.as_str()).copied() else {
            return Err(self.err(ErrorKind::BadArgument, range, format!("unknown function {key}")));
        };
        if args.len() < builtin.min_args || args.len() > builtin.params.len() {
            return Err(self.err(
                ErrorKind::BadArgument,
                range,
                format!(
                    "{key} expects {} to {} arguments, got {}",
                    builtin.min_args,
                    builtin.params.len(),
                    args.len()
                ),
            ));
        }

        let mut ids = Vec::with_capacity(args.len());
        for (arg, rule) in args.iter().zip(builtin.params) {
            let id = match rule {
                ParamRule::Numeric => self.numeric_value(arg)?.0,
                ParamRule::Str => self.string_value(arg)?,
                ParamRule::Array1dNumeric => {
                    let ExprKind::Variable(var) = &arg.kind else {
                        return Err(self.err(ErrorKind::BadArgument, arg.range, "expected an array variable"));
                    };
                    if !self.symbols.resolve_type(&var.name, var.suffix).is_numeric() {
                        return Err(self.err(ErrorKind::BadArgument, arg.range, "expected a numeric array"));
                    }
                    self.array_arg(var, Some(1), None)?
                }
            };
            ids.push(id);
        }

        let result_type = match builtin.result {
            ResultRule::Fixed(data_type) => data_type,
            ResultRule::SameAsFirst => self
                .symbols
                .data_type_of(ids[0])
                .ok_or_else(|| self.internal(range, "argument carries no data type"))?,
        };

        for &id in ids.iter().skip(2) {
            self.param1(id, range);
        }
        let op1 = ids.first().copied().unwrap_or(SymbolId::NULL);
        let op2 = ids.get(1).copied().unwrap_or(SymbolId::NULL);
        let tmp = self.symbols.add_tmp(result_type, None);
        Ok(self.emit(range, builtin.opcode, op1, op2, tmp))
    }
}
