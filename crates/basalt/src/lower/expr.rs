//! Expression lowering: literals, variable references (scalar, array element,
//! UDF call), operators with numeric promotion, and conditional expressions.

use crate::{
    datatype::{DataType, Value},
    error::{CompileResult, ErrorKind},
    ir::InstrRef,
    literal,
    op::Opcode,
    symbols::{SymbolEntry, SymbolId, VariableName},
    tree::{BinOp, CodeRange, Expr, ExprKind, UnaryOp, VariableRef},
};

use super::{Lowerer, MAX_EXPR_DEPTH};

/// Whether two types may meet across an assignment or parameter copy:
/// numeric with numeric (implicit promotion) or string with string.
pub(crate) fn assignable(a: DataType, b: DataType) -> bool {
    a.is_numeric() == b.is_numeric()
}

/// What a looked-up variable reference turned out to be.
enum RefKind {
    Scalar,
    Array { rank: usize },
    Udf,
}

impl Lowerer<'_> {
    /// Lowers an expression; the returned instruction's `result` is the id
    /// holding the expression's value.
    pub(crate) fn lower_expr(&mut self, expr: &Expr) -> CompileResult<InstrRef> {
        if self.expr_depth >= MAX_EXPR_DEPTH {
            return Err(self.err(ErrorKind::TooDeeplyNested, expr.range, "expression nests too deeply"));
        }
        self.expr_depth += 1;
        let result = self.lower_expr_inner(expr);
        self.expr_depth -= 1;
        result
    }

    fn lower_expr_inner(&mut self, expr: &Expr) -> CompileResult<InstrRef> {
        match &expr.kind {
            ExprKind::Number { text } => {
                let value = literal::parse_numeric(text, expr.range)?;
                let tmp = self.symbols.add_tmp(value.data_type(), Some(value));
                Ok(self.emit(expr.range, Opcode::Value, SymbolId::NULL, SymbolId::NULL, tmp))
            }
            ExprKind::Str(text) => {
                let tmp = self.symbols.add_tmp(DataType::String, Some(Value::Str(text.clone())));
                Ok(self.emit(expr.range, Opcode::Value, SymbolId::NULL, SymbolId::NULL, tmp))
            }
            ExprKind::Variable(var) => self.lower_variable_expr(var),
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand, expr.range),
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs, expr.range),
            ExprKind::Function { name, args } => self.lower_function(name, args, expr.range),
            ExprKind::If {
                cond,
                then_expr,
                else_expr,
            } => self.lower_if_expr(cond, then_expr, else_expr),
        }
    }

    /// Lowers an expression and returns its result id and data type.
    pub(crate) fn expr_value(&mut self, expr: &Expr) -> CompileResult<(SymbolId, DataType)> {
        let instr = self.lower_expr(expr)?;
        let id = self.ir.result_of(instr);
        let data_type = self
            .symbols
            .data_type_of(id)
            .ok_or_else(|| self.internal(expr.range, "expression produced no value"))?;
        Ok((id, data_type))
    }

    /// Like [`Lowerer::expr_value`] but rejects strings.
    pub(crate) fn numeric_value(&mut self, expr: &Expr) -> CompileResult<(SymbolId, DataType)> {
        let (id, data_type) = self.expr_value(expr)?;
        if !data_type.is_numeric() {
            return Err(self.err(ErrorKind::DataTypeMismatch, expr.range, "expected a numeric expression"));
        }
        Ok((id, data_type))
    }

    /// Like [`Lowerer::expr_value`] but requires a string.
    pub(crate) fn string_value(&mut self, expr: &Expr) -> CompileResult<SymbolId> {
        let (id, data_type) = self.expr_value(expr)?;
        if data_type != DataType::String {
            return Err(self.err(ErrorKind::DataTypeMismatch, expr.range, "expected a string expression"));
        }
        Ok(id)
    }

    /// Emits a COPY into a fresh temporary of type `to` unless the value
    /// already has that type.
    pub(crate) fn coerce(&mut self, id: SymbolId, from: DataType, to: DataType, range: CodeRange) -> SymbolId {
        if from == to {
            return id;
        }
        let tmp = self.symbols.add_tmp(to, None);
        self.emit(range, Opcode::Copy, SymbolId::NULL, id, tmp);
        tmp
    }

    /// Lowers a variable reference in expression position. The reference
    /// resolves to a scalar read, an array element, or a UDF call depending
    /// on what the name is bound to.
    pub(crate) fn lower_variable_expr(&mut self, var: &VariableRef) -> CompileResult<InstrRef> {
        let data_type = self.symbols.resolve_type(&var.name, var.suffix);
        let name = VariableName::new(&var.name, data_type);

        let Some(id) = self.symbols.lookup(&name) else {
            if !var.indices.is_empty() {
                return Err(self.err(
                    ErrorKind::NotDefined,
                    var.range,
                    format!("{} used before DIM or DEF FN", name.name()),
                ));
            }
            // scalar read before any write is fine: BASIC zero-initialises
            let id = self.symbols.define_variable(&name);
            return Ok(self.emit(var.range, Opcode::Variable, SymbolId::NULL, SymbolId::NULL, id));
        };

        let kind = match self.symbols.get(id) {
            SymbolEntry::Udf { .. } => RefKind::Udf,
            SymbolEntry::Variable { array: Some(desc), .. } => RefKind::Array { rank: desc.rank },
            SymbolEntry::Variable { array: None, .. } => RefKind::Scalar,
            _ => return Err(self.internal(var.range, "name bound to a non-variable entry")),
        };
        match kind {
            RefKind::Udf => self.lower_udf_call(id, var),
            RefKind::Array { rank } => {
                if var.indices.is_empty() {
                    // whole-array reference: legal as a statement/function
                    // argument, the interpreter rejects it as a plain value
                    Ok(self.emit(var.range, Opcode::Variable, SymbolId::NULL, SymbolId::NULL, id))
                } else {
                    self.lower_array_element(id, rank, var)
                }
            }
            RefKind::Scalar => {
                if !var.indices.is_empty() {
                    return Err(self.err(
                        ErrorKind::ScalarVariableCannotBeIndexed,
                        var.range,
                        format!("{} is a scalar variable", name.name()),
                    ));
                }
                Ok(self.emit(var.range, Opcode::Variable, SymbolId::NULL, SymbolId::NULL, id))
            }
        }
    }

    /// Builds the runtime index vector and binds an array-ref alias:
    /// RESET_ARRAY_IDX, one SET_ARRAY_IDX per subscript, then ARRAYREF.
    pub(crate) fn lower_array_element(&mut self, array: SymbolId, rank: usize, var: &VariableRef) -> CompileResult<InstrRef> {
        if var.indices.len() != rank {
            return Err(self.err(
                ErrorKind::BadArgument,
                var.range,
                format!("expected {rank} subscripts, got {}", var.indices.len()),
            ));
        }
        self.emit(var.range, Opcode::ResetArrayIdx, array, SymbolId::NULL, SymbolId::NULL);
        for index in &var.indices {
            let (id, _) = self.numeric_value(index)?;
            self.emit(index.range, Opcode::SetArrayIdx, array, id, SymbolId::NULL);
        }
        let element = self.symbols.add_array_ref(array);
        Ok(self.emit(var.range, Opcode::ArrayRef, array, SymbolId::NULL, element))
    }

    /// Resolves a variable reference as an assignment target: the variable
    /// id for a scalar, or a freshly bound array-ref id for an array
    /// element. Assigning to a UDF is rejected.
    pub(crate) fn lower_lvalue(&mut self, var: &VariableRef) -> CompileResult<(SymbolId, DataType)> {
        let data_type = self.symbols.resolve_type(&var.name, var.suffix);
        let name = VariableName::new(&var.name, data_type);

        let Some(id) = self.symbols.lookup(&name) else {
            if !var.indices.is_empty() {
                return Err(self.err(
                    ErrorKind::NotDefined,
                    var.range,
                    format!("{} used before DIM", name.name()),
                ));
            }
            return Ok((self.symbols.define_variable(&name), data_type));
        };

        let array_rank = match self.symbols.get(id) {
            SymbolEntry::Udf { .. } => {
                return Err(self.err(
                    ErrorKind::BadAssignment,
                    var.range,
                    format!("cannot assign to function {}", name.name()),
                ));
            }
            SymbolEntry::Variable { array, .. } => array.map(|desc| desc.rank),
            _ => return Err(self.internal(var.range, "name bound to a non-variable entry")),
        };
        match array_rank {
            Some(rank) => {
                if var.indices.is_empty() {
                    return Err(self.err(
                        ErrorKind::BadArgument,
                        var.range,
                        format!("{} is an array; subscripts required", name.name()),
                    ));
                }
                let instr = self.lower_array_element(id, rank, var)?;
                Ok((self.ir.result_of(instr), data_type))
            }
            None => {
                if !var.indices.is_empty() {
                    return Err(self.err(
                        ErrorKind::ScalarVariableCannotBeIndexed,
                        var.range,
                        format!("{} is a scalar variable", name.name()),
                    ));
                }
                Ok((id, data_type))
            }
        }
    }

    /// Lowers a DEF FN call: actuals are evaluated in the caller's scope,
    /// then PUSH_RT_SCOPE opens the callee frame, the actuals are copied into
    /// the parameters, and control transfers to the function body. The
    /// result is copied out to a fresh temporary so later calls cannot
    /// clobber it.
    fn lower_udf_call(&mut self, udf: SymbolId, var: &VariableRef) -> CompileResult<InstrRef> {
        let SymbolEntry::Udf {
            params,
            result,
            entry_label,
            name,
        } = self.symbols.get(udf)
        else {
            return Err(self.internal(var.range, "UDF id does not name a UDF"));
        };
        let params = params.clone();
        let udf_result = *result;
        let entry_label = *entry_label;
        let return_type = name.data_type();

        if var.indices.len() != params.len() {
            return Err(self.err(
                ErrorKind::InsufficientUdfArgs,
                var.range,
                format!("expected {} arguments, got {}", params.len(), var.indices.len()),
            ));
        }

        let mut actuals = Vec::with_capacity(params.len());
        for (actual, &param) in var.indices.iter().zip(&params) {
            let (id, data_type) = self.expr_value(actual)?;
            let param_type = self
                .symbols
                .data_type_of(param)
                .ok_or_else(|| self.internal(actual.range, "parameter entry has no type"))?;
            if !assignable(data_type, param_type) {
                return Err(self.err(
                    ErrorKind::DataTypeMismatch,
                    actual.range,
                    "argument type does not match the declared parameter",
                ));
            }
            actuals.push(id);
        }

        let push_scope = self.emit(var.range, Opcode::PushRtScope, udf, SymbolId::NULL, SymbolId::NULL);
        for (id, &param) in actuals.into_iter().zip(&params) {
            self.emit(var.range, Opcode::Copy, SymbolId::NULL, id, param);
        }
        self.emit(var.range, Opcode::GotoLabel, entry_label, SymbolId::NULL, SymbolId::NULL);
        let return_label = self.symbols.add_goto_target();
        self.emit_label(return_label, var.range)?;
        self.ir.patch_op2(push_scope, return_label);
        self.emit(var.range, Opcode::PopRtScope, udf, SymbolId::NULL, SymbolId::NULL);

        let tmp = self.symbols.add_tmp(return_type, None);
        Ok(self.emit(var.range, Opcode::Copy, SymbolId::NULL, udf_result, tmp))
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr, range: CodeRange) -> CompileResult<InstrRef> {
        let (id, data_type) = self.numeric_value(operand)?;
        match op {
            UnaryOp::Minus => {
                let tmp = self.symbols.add_tmp(data_type, None);
                Ok(self.emit(range, Opcode::UnaryMinus, id, SymbolId::NULL, tmp))
            }
            UnaryOp::Not => {
                let tmp = self.symbols.add_tmp(DataType::Int64, None);
                Ok(self.emit(range, Opcode::Not, id, SymbolId::NULL, tmp))
            }
        }
    }

    fn lower_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, range: CodeRange) -> CompileResult<InstrRef> {
        let (lid, lt) = self.expr_value(lhs)?;
        let (rid, rt) = self.expr_value(rhs)?;

        match op {
            BinOp::Add if lt == DataType::String && rt == DataType::String => {
                let tmp = self.symbols.add_tmp(DataType::String, None);
                Ok(self.emit(range, Opcode::Concat, lid, rid, tmp))
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Exp => {
                let joined = self.join_or_mismatch(lt, rt, range)?;
                let opcode =
                    arith_opcode(op, joined).ok_or_else(|| self.internal(range, "no opcode for promoted type"))?;
                let tmp = self.symbols.add_tmp(joined, None);
                Ok(self.emit(range, opcode, lid, rid, tmp))
            }
            BinOp::Div => {
                self.join_or_mismatch(lt, rt, range)?;
                let tmp = self.symbols.add_tmp(DataType::Float64, None);
                Ok(self.emit(range, Opcode::FDiv, lid, rid, tmp))
            }
            BinOp::IDiv | BinOp::Mod => {
                self.join_or_mismatch(lt, rt, range)?;
                let opcode = if op == BinOp::IDiv { Opcode::IDiv } else { Opcode::Mod };
                let tmp = self.symbols.add_tmp(DataType::Int64, None);
                Ok(self.emit(range, opcode, lid, rid, tmp))
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let compare_type = if lt == DataType::String && rt == DataType::String {
                    DataType::String
                } else {
                    self.join_or_mismatch(lt, rt, range)?
                };
                let opcode = compare_opcode(op, compare_type)
                    .ok_or_else(|| self.internal(range, "no opcode for compared type"))?;
                let tmp = self.symbols.add_tmp(DataType::Int64, None);
                Ok(self.emit(range, opcode, lid, rid, tmp))
            }
            BinOp::And
            | BinOp::Or
            | BinOp::Xor
            | BinOp::Eqv
            | BinOp::Imp
            | BinOp::LeftShift
            | BinOp::RightShift => {
                self.join_or_mismatch(lt, rt, range)?;
                let opcode = match op {
                    BinOp::And => Opcode::And,
                    BinOp::Or => Opcode::Or,
                    BinOp::Xor => Opcode::Xor,
                    BinOp::Eqv => Opcode::Eqv,
                    BinOp::Imp => Opcode::Imp,
                    BinOp::LeftShift => Opcode::LeftShift,
                    _ => Opcode::RightShift,
                };
                let tmp = self.symbols.add_tmp(DataType::Int64, None);
                Ok(self.emit(range, opcode, lid, rid, tmp))
            }
        }
    }

    /// Promotion-lattice join of two operand types, or the standard
    /// "data type mismatch" semantic error when strings are involved.
    fn join_or_mismatch(&self, lt: DataType, rt: DataType, range: CodeRange) -> CompileResult<DataType> {
        lt.join(rt)
            .ok_or_else(|| self.err(ErrorKind::DataTypeMismatch, range, "data type mismatch"))
    }

    /// Lowers `IF cond THEN a ELSE b` in expression position.
    ///
    /// Branches are lazy: only the selected branch executes, which is what
    /// makes recursive DEF FN bodies terminate. The result takes the THEN
    /// branch's type; the ELSE branch must be assignment-compatible with it
    /// and is coerced on its way into the shared result temporary.
    fn lower_if_expr(&mut self, cond: &Expr, then_expr: &Expr, else_expr: &Expr) -> CompileResult<InstrRef> {
        let (cond_id, _) = self.numeric_value(cond)?;
        let goto_then = self.emit(cond.range, Opcode::GotoLabelIf, cond_id, SymbolId::NULL, SymbolId::NULL);
        let goto_else = self.emit(cond.range, Opcode::GotoLabel, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);

        let then_label = self.symbols.add_goto_target();
        self.emit_label(then_label, then_expr.range)?;
        self.ir.patch_op2(goto_then, then_label);
        let (then_id, then_type) = self.expr_value(then_expr)?;
        let result = self.symbols.add_tmp(then_type, None);
        self.emit(then_expr.range, Opcode::Copy, SymbolId::NULL, then_id, result);
        let goto_end = self.emit(then_expr.range, Opcode::GotoLabel, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);

        let else_label = self.symbols.add_goto_target();
        self.emit_label(else_label, else_expr.range)?;
        self.ir.patch_op1(goto_else, else_label);
        let (else_id, else_type) = self.expr_value(else_expr)?;
        if !assignable(then_type, else_type) {
            return Err(self.err(
                ErrorKind::DataTypeMismatch,
                else_expr.range,
                "branches of a conditional expression must have compatible types",
            ));
        }
        let else_copy = self.emit(else_expr.range, Opcode::Copy, SymbolId::NULL, else_id, result);

        let end_label = self.symbols.add_goto_target();
        self.emit_label(end_label, else_expr.range)?;
        self.ir.patch_op1(goto_end, end_label);
        Ok(else_copy)
    }
}

/// The typed opcode for an arithmetic operator at a promoted numeric type.
pub(crate) fn arith_opcode(op: BinOp, data_type: DataType) -> Option<Opcode> {
    use DataType::{Float32, Float64, Int32, Int64};
    use Opcode::{
        AddF32, AddF64, AddI32, AddI64, ExpF32, ExpF64, ExpI32, ExpI64, MulF32, MulF64, MulI32, MulI64, SubF32,
        SubF64, SubI32, SubI64,
    };
    Some(match (op, data_type) {
        (BinOp::Add, Int32) => AddI32,
        (BinOp::Add, Int64) => AddI64,
        (BinOp::Add, Float32) => AddF32,
        (BinOp::Add, Float64) => AddF64,
        (BinOp::Sub, Int32) => SubI32,
        (BinOp::Sub, Int64) => SubI64,
        (BinOp::Sub, Float32) => SubF32,
        (BinOp::Sub, Float64) => SubF64,
        (BinOp::Mul, Int32) => MulI32,
        (BinOp::Mul, Int64) => MulI64,
        (BinOp::Mul, Float32) => MulF32,
        (BinOp::Mul, Float64) => MulF64,
        (BinOp::Exp, Int32) => ExpI32,
        (BinOp::Exp, Int64) => ExpI64,
        (BinOp::Exp, Float32) => ExpF32,
        (BinOp::Exp, Float64) => ExpF64,
        _ => return None,
    })
}

/// The typed opcode for a relational operator at a compared type.
pub(crate) fn compare_opcode(op: BinOp, data_type: DataType) -> Option<Opcode> {
    use DataType::{Float32, Float64, Int32, Int64, String};
    Some(match (op, data_type) {
        (BinOp::Eq, Int32) => Opcode::EqI32,
        (BinOp::Eq, Int64) => Opcode::EqI64,
        (BinOp::Eq, Float32) => Opcode::EqF32,
        (BinOp::Eq, Float64) => Opcode::EqF64,
        (BinOp::Eq, String) => Opcode::EqStr,
        (BinOp::Ne, Int32) => Opcode::NeI32,
        (BinOp::Ne, Int64) => Opcode::NeI64,
        (BinOp::Ne, Float32) => Opcode::NeF32,
        (BinOp::Ne, Float64) => Opcode::NeF64,
        (BinOp::Ne, String) => Opcode::NeStr,
        (BinOp::Lt, Int32) => Opcode::LtI32,
        (BinOp::Lt, Int64) => Opcode::LtI64,
        (BinOp::Lt, Float32) => Opcode::LtF32,
        (BinOp::Lt, Float64) => Opcode::LtF64,
        (BinOp::Lt, String) => Opcode::LtStr,
        (BinOp::Le, Int32) => Opcode::LeI32,
        (BinOp::Le, Int64) => Opcode::LeI64,
        (BinOp::Le, Float32) => Opcode::LeF32,
        (BinOp::Le, Float64) => Opcode::LeF64,
        (BinOp::Le, String) => Opcode::LeStr,
        (BinOp::Gt, Int32) => Opcode::GtI32,
        (BinOp::Gt, Int64) => Opcode::GtI64,
        (BinOp::Gt, Float32) => Opcode::GtF32,
        (BinOp::Gt, Float64) => Opcode::GtF64,
        (BinOp::Gt, String) => Opcode::GtStr,
        (BinOp::Ge, Int32) => Opcode::GeI32,
        (BinOp::Ge, Int64) => Opcode::GeI64,
        (BinOp::Ge, Float32) => Opcode::GeF32,
        (BinOp::Ge, Float64) => Opcode::GeF64,
        (BinOp::Ge, String) => Opcode::GeStr,
        _ => return None,
    })
}
