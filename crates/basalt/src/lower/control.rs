//! Control-flow lowering: IF (single-line and BEGIN/END IF blocks),
//! WHILE/WEND, FOR/NEXT, GOTO, GOSUB/RETURN, and DEF FN bodies.
//!
//! Structured constructs compile down to conditional and unconditional gotos
//! over synthetic labels. Forward targets are emitted with a NULL operand and
//! patched the moment the target label is placed; the patch-completeness pass
//! at the end of lowering catches anything missed.

use smallvec::SmallVec;

use crate::{
    datatype::{DataType, Value},
    error::{CompileResult, ErrorKind},
    op::Opcode,
    symbols::{SymbolEntry, SymbolId, VariableName},
    tree::{BinOp, CodeRange, Expr, JumpTarget, Stmt, VariableRef},
};

use super::{
    ForState, IfState, Lowerer, MAX_CONTROL_DEPTH, WhileState,
    expr::{arith_opcode, assignable, compare_opcode},
};

impl Lowerer<'_> {
    /// Single-line `IF cond THEN stmts [ELSE stmts]`.
    pub(crate) fn lower_if(
        &mut self,
        cond: &Expr,
        then_stmts: &[Stmt],
        else_stmts: &[Stmt],
        range: CodeRange,
    ) -> CompileResult<()> {
        let (cond_id, _) = self.numeric_value(cond)?;
        let goto_then = self.emit(cond.range, Opcode::GotoLabelIf, cond_id, SymbolId::NULL, SymbolId::NULL);
        let goto_false = self.emit(range, Opcode::GotoLabel, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);

        let then_label = self.symbols.add_goto_target();
        self.emit_label(then_label, range)?;
        self.ir.patch_op2(goto_then, then_label);
        for stmt in then_stmts {
            self.lower_stmt(stmt)?;
        }
        let goto_exit = self.emit(range, Opcode::GotoLabel, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);

        let after_then = self.symbols.add_goto_target();
        self.emit_label(after_then, range)?;
        if else_stmts.is_empty() {
            self.ir.patch_op1(goto_false, after_then);
            self.ir.patch_op1(goto_exit, after_then);
        } else {
            let before_else = self.symbols.add_goto_target();
            self.emit_label(before_else, range)?;
            self.ir.patch_op1(goto_false, before_else);
            for stmt in else_stmts {
                self.lower_stmt(stmt)?;
            }
            let after_else = self.symbols.add_goto_target();
            self.emit_label(after_else, range)?;
            self.ir.patch_op1(goto_exit, after_else);
        }
        Ok(())
    }

    /// `IF cond THEN BEGIN` - opens a block conditional on the if-stack.
    pub(crate) fn lower_if_begin(&mut self, cond: &Expr, range: CodeRange) -> CompileResult<()> {
        if self.if_stack.len() >= MAX_CONTROL_DEPTH {
            return Err(self.err(ErrorKind::TooDeeplyNested, range, "IF blocks nest too deeply"));
        }
        let (cond_id, _) = self.numeric_value(cond)?;
        let goto_then = self.emit(cond.range, Opcode::GotoLabelIf, cond_id, SymbolId::NULL, SymbolId::NULL);
        let false_goto = self.emit(range, Opcode::GotoLabel, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
        let then_label = self.symbols.add_goto_target();
        self.emit_label(then_label, range)?;
        self.ir.patch_op2(goto_then, then_label);
        self.if_stack.push(IfState {
            false_goto,
            exit_gotos: SmallVec::new(),
            else_seen: false,
            range,
        });
        Ok(())
    }

    /// `ELSE BEGIN` - ends the THEN block of the innermost open conditional.
    pub(crate) fn lower_else_begin(&mut self, range: CodeRange) -> CompileResult<()> {
        let Some(mut state) = self.if_stack.pop() else {
            return Err(self.err(ErrorKind::MismatchedElseBegin, range, "ELSE BEGIN without IF THEN BEGIN"));
        };
        if state.else_seen {
            return Err(self.err(ErrorKind::MismatchedElseBegin, range, "second ELSE BEGIN in one IF"));
        }
        let goto_exit = self.emit(range, Opcode::GotoLabel, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
        let else_label = self.symbols.add_goto_target();
        self.emit_label(else_label, range)?;
        self.ir.patch_op1(state.false_goto, else_label);
        state.exit_gotos.push(goto_exit);
        state.else_seen = true;
        self.if_stack.push(state);
        Ok(())
    }

    /// `END IF` - closes the innermost open conditional and patches its exits.
    pub(crate) fn lower_end_if(&mut self, range: CodeRange) -> CompileResult<()> {
        let Some(state) = self.if_stack.pop() else {
            return Err(self.err(ErrorKind::MismatchedEndIf, range, "END IF without IF THEN BEGIN"));
        };
        let exit_label = self.symbols.add_goto_target();
        self.emit_label(exit_label, range)?;
        if !state.else_seen {
            self.ir.patch_op1(state.false_goto, exit_label);
        }
        for goto in state.exit_gotos {
            self.ir.patch_op1(goto, exit_label);
        }
        Ok(())
    }

    pub(crate) fn lower_while(&mut self, cond: &Expr, range: CodeRange) -> CompileResult<()> {
        if self.while_stack.len() >= MAX_CONTROL_DEPTH {
            return Err(self.err(ErrorKind::TooDeeplyNested, range, "WHILE loops nest too deeply"));
        }
        let before_label = self.symbols.add_goto_target();
        self.emit_label(before_label, range)?;
        let (cond_id, _) = self.numeric_value(cond)?;
        let negated = self.symbols.add_tmp(DataType::Int64, None);
        self.emit(cond.range, Opcode::Not, cond_id, SymbolId::NULL, negated);
        let exit_goto = self.emit(range, Opcode::GotoLabelIf, negated, SymbolId::NULL, SymbolId::NULL);
        self.while_stack.push(WhileState {
            before_label,
            exit_goto,
            range,
        });
        Ok(())
    }

    pub(crate) fn lower_wend(&mut self, range: CodeRange) -> CompileResult<()> {
        let Some(state) = self.while_stack.pop() else {
            return Err(self.err(ErrorKind::WendWithoutWhile, range, "WEND without WHILE"));
        };
        self.emit(range, Opcode::GotoLabel, state.before_label, SymbolId::NULL, SymbolId::NULL);
        let after = self.symbols.add_goto_target();
        self.emit_label(after, range)?;
        self.ir.patch_op2(state.exit_goto, after);
        Ok(())
    }

    /// `FOR var = init TO end [STEP step]`.
    ///
    /// The emitted shape runs the body once when init equals end regardless of
    /// the step sign, and not at all when the range is empty: the exit test is
    /// `(step >= 0 AND var > end) OR (step < 0 AND var < end)`.
    pub(crate) fn lower_for(
        &mut self,
        var: &VariableRef,
        init: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        range: CodeRange,
    ) -> CompileResult<()> {
        if self.for_stack.len() >= MAX_CONTROL_DEPTH {
            return Err(self.err(ErrorKind::TooDeeplyNested, range, "FOR loops nest too deeply"));
        }
        if !var.indices.is_empty() {
            return Err(self.err(ErrorKind::BadArgument, var.range, "FOR variable must be a scalar"));
        }
        let (var_id, var_type) = self.lower_lvalue(var)?;
        if !var_type.is_numeric() {
            return Err(self.err(ErrorKind::DataTypeMismatch, var.range, "FOR variable must be numeric"));
        }

        // step value and a zero of the same type, for the sign tests
        let (step_id, step_type) = match step {
            Some(expr) => self.numeric_value(expr)?,
            None => {
                let one = self.symbols.add_tmp(DataType::Int32, Some(Value::Int32(1)));
                self.emit(range, Opcode::Value, SymbolId::NULL, SymbolId::NULL, one);
                (one, DataType::Int32)
            }
        };
        let step_tmp = self.symbols.add_tmp(step_type, None);
        self.emit(range, Opcode::Copy, SymbolId::NULL, step_id, step_tmp);
        let zero = self.symbols.add_tmp(step_type, Some(zero_of(step_type)));

        // var = init
        let (init_id, init_type) = self.numeric_value(init)?;
        let init_coerced = self.coerce(init_id, init_type, var_type, init.range);
        self.emit(range, Opcode::Assign, var_id, init_coerced, SymbolId::NULL);

        // end bound, captured once
        let (end_id, end_type) = self.numeric_value(end)?;
        let end_tmp = self.symbols.add_tmp(end_type, None);
        self.emit(range, Opcode::Copy, SymbolId::NULL, end_id, end_tmp);

        // first iteration skips the increment
        let goto_check = self.emit(range, Opcode::GotoLabel, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);

        // increment block, jumped back to by NEXT
        let apply_step_label = self.symbols.add_goto_target();
        self.emit_label(apply_step_label, range)?;
        let add = arith_opcode(BinOp::Add, var_type)
            .ok_or_else(|| self.internal(range, "no add opcode for loop variable type"))?;
        let sum = self.symbols.add_tmp(var_type, None);
        self.emit(range, add, var_id, step_tmp, sum);
        self.emit(range, Opcode::Assign, var_id, sum, SymbolId::NULL);

        // exit test
        let check_label = self.symbols.add_goto_target();
        self.emit_label(check_label, range)?;
        self.ir.patch_op1(goto_check, check_label);

        let bound_type = var_type
            .join(end_type)
            .ok_or_else(|| self.internal(range, "loop bound type does not join"))?;
        let step_ge_zero = self.compare_into_tmp(BinOp::Ge, step_type, step_tmp, zero, range)?;
        let var_gt_end = self.compare_into_tmp(BinOp::Gt, bound_type, var_id, end_tmp, range)?;
        let ascending_done = self.symbols.add_tmp(DataType::Int64, None);
        self.emit(range, Opcode::And, step_ge_zero, var_gt_end, ascending_done);
        let step_lt_zero = self.compare_into_tmp(BinOp::Lt, step_type, step_tmp, zero, range)?;
        let var_lt_end = self.compare_into_tmp(BinOp::Lt, bound_type, var_id, end_tmp, range)?;
        let descending_done = self.symbols.add_tmp(DataType::Int64, None);
        self.emit(range, Opcode::And, step_lt_zero, var_lt_end, descending_done);
        let done = self.symbols.add_tmp(DataType::Int64, None);
        self.emit(range, Opcode::Or, ascending_done, descending_done, done);
        let exit_goto = self.emit(range, Opcode::GotoLabelIf, done, SymbolId::NULL, SymbolId::NULL);

        self.for_stack.push(ForState {
            var: var_id,
            apply_step_label,
            exit_goto,
            range,
        });
        Ok(())
    }

    /// `NEXT [var[, var...]]` - closes one FOR per listed variable, or the
    /// innermost one when the list is empty.
    pub(crate) fn lower_next(&mut self, vars: &[VariableRef], range: CodeRange) -> CompileResult<()> {
        if vars.is_empty() {
            return self.close_for(None, range);
        }
        for var in vars {
            self.close_for(Some(var), range)?;
        }
        Ok(())
    }

    fn close_for(&mut self, var: Option<&VariableRef>, range: CodeRange) -> CompileResult<()> {
        let Some(state) = self.for_stack.pop() else {
            return Err(self.err(ErrorKind::NextWithoutFor, range, "NEXT without FOR"));
        };
        if let Some(var) = var {
            let data_type = self.symbols.resolve_type(&var.name, var.suffix);
            let name = VariableName::new(&var.name, data_type);
            if self.symbols.lookup(&name) != Some(state.var) {
                return Err(self.err(
                    ErrorKind::NextWithoutFor,
                    var.range,
                    format!("NEXT {} does not match the innermost FOR", name.name()),
                ));
            }
        }
        self.emit(range, Opcode::GotoLabel, state.apply_step_label, SymbolId::NULL, SymbolId::NULL);
        let after = self.symbols.add_goto_target();
        self.emit_label(after, range)?;
        self.ir.patch_op2(state.exit_goto, after);
        Ok(())
    }

    /// Emits a typed comparison into a fresh Int64 boolean temporary.
    fn compare_into_tmp(
        &mut self,
        op: BinOp,
        data_type: DataType,
        lhs: SymbolId,
        rhs: SymbolId,
        range: CodeRange,
    ) -> CompileResult<SymbolId> {
        let opcode =
            compare_opcode(op, data_type).ok_or_else(|| self.internal(range, "no compare opcode for type"))?;
        let tmp = self.symbols.add_tmp(DataType::Int64, None);
        self.emit(range, opcode, lhs, rhs, tmp);
        Ok(tmp)
    }

    pub(crate) fn lower_goto(&mut self, target: &JumpTarget, range: CodeRange) -> CompileResult<()> {
        self.emit_jump(target, range);
        Ok(())
    }

    /// `GOSUB target`: record the return point, jump, and place the return
    /// label immediately after the jump.
    pub(crate) fn lower_gosub(&mut self, target: &JumpTarget, range: CodeRange) -> CompileResult<()> {
        let push_ret = self.emit(range, Opcode::PushRetLabel, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
        self.emit_jump(target, range);
        let return_label = self.symbols.add_goto_target();
        self.emit_label(return_label, range)?;
        self.ir.patch_op1(push_ret, return_label);
        Ok(())
    }

    /// `RETURN [linenum]`: pop back to the recorded return point, or jump to
    /// an explicit line (which also drops the top of the return stack).
    pub(crate) fn lower_return(&mut self, target: Option<u32>, range: CodeRange) -> CompileResult<()> {
        let label = match target {
            Some(line) => self.symbols.linenum_label(line),
            None => SymbolId::NULL,
        };
        self.emit(range, Opcode::Return, label, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    fn emit_jump(&mut self, target: &JumpTarget, range: CodeRange) {
        match target {
            JumpTarget::LineNumber(line) => {
                let label = self.symbols.linenum_label(*line);
                self.emit(range, Opcode::GotoLineNum, label, SymbolId::NULL, SymbolId::NULL);
            }
            JumpTarget::Label(name) => {
                let label = self.symbols.named_label(name);
                self.emit(range, Opcode::GotoLabel, label, SymbolId::NULL, SymbolId::NULL);
            }
        }
    }

    /// `DEF FNname(params) = body`.
    ///
    /// The body is compiled in place, skipped over at straight-line execution
    /// by a leading goto. Parameters live in a child declaration scope;
    /// temporaries created while compiling the body stay in the flat global
    /// pool.
    pub(crate) fn lower_def_fn(
        &mut self,
        name: &VariableRef,
        params: &[VariableRef],
        body: &Expr,
        range: CodeRange,
    ) -> CompileResult<()> {
        if !name.indices.is_empty() {
            return Err(self.err(ErrorKind::BadArgument, name.range, "malformed DEF FN name"));
        }
        let return_type = self.symbols.resolve_type(&name.name, name.suffix);
        let fname = VariableName::new(&name.name, return_type);
        if self.symbols.lookup(&fname).is_some() {
            return Err(self.err(
                ErrorKind::BadArgument,
                name.range,
                format!("{} is already defined", fname.name()),
            ));
        }

        let goto_post = self.emit(range, Opcode::GotoLabel, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
        let entry_label = self.symbols.add_goto_target();
        self.emit_label(entry_label, range)?;
        let result = self.symbols.add_tmp(return_type, None);
        let udf = self.symbols.get_or_insert_with(&fname, |n| SymbolEntry::Udf {
            name: n.clone(),
            params: Vec::new(),
            result,
            entry_label,
        });

        self.symbols.push_scope(udf);
        let mut param_ids = Vec::with_capacity(params.len());
        for param in params {
            if !param.indices.is_empty() {
                self.symbols.pop_scope();
                return Err(self.err(ErrorKind::BadArgument, param.range, "parameters must be scalars"));
            }
            let param_type = self.symbols.resolve_type(&param.name, param.suffix);
            let pname = VariableName::new(&param.name, param_type);
            let Some(id) = self.symbols.declare_scoped(&pname) else {
                self.symbols.pop_scope();
                return Err(self.err(
                    ErrorKind::BadArgument,
                    param.range,
                    format!("duplicate parameter {}", pname.name()),
                ));
            };
            self.emit(param.range, Opcode::Variable, SymbolId::NULL, SymbolId::NULL, id);
            param_ids.push(id);
        }
        match self.symbols.get_mut(udf) {
            SymbolEntry::Udf { params, .. } => *params = param_ids,
            _ => {
                self.symbols.pop_scope();
                return Err(self.internal(range, "UDF entry changed kind"));
            }
        }

        let body_result = self.expr_value(body);
        let (body_id, body_type) = match body_result {
            Ok(value) => value,
            Err(err) => {
                self.symbols.pop_scope();
                return Err(err);
            }
        };
        if !assignable(body_type, return_type) {
            self.symbols.pop_scope();
            return Err(self.err(
                ErrorKind::DataTypeMismatch,
                body.range,
                "function body type does not match the declared return type",
            ));
        }
        self.emit(body.range, Opcode::Copy, SymbolId::NULL, body_id, result);
        self.symbols.pop_scope();
        self.emit(range, Opcode::GotoCaller, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);

        let post_label = self.symbols.add_goto_target();
        self.emit_label(post_label, range)?;
        self.ir.patch_op1(goto_post, post_label);
        log::debug!("compiled DEF {}", fname.name());
        Ok(())
    }
}

/// Zero literal of a numeric type, for step sign tests.
fn zero_of(data_type: DataType) -> Value {
    match data_type {
        DataType::Int32 => Value::Int32(0),
        DataType::Int64 => Value::Int64(0),
        DataType::Float32 => Value::Float32(0.0),
        DataType::Float64 | DataType::String => Value::Float64(0.0),
    }
}
