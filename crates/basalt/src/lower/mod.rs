//! The lowering pass: walks the parse tree and emits typed IR.
//!
//! Lowering is a single deterministic pass. Each statement appends
//! instructions to the [`Ir`] and registers entries in the [`SymbolTable`];
//! forward branch targets (IF/WHILE/FOR exits, GOSUB return points, DEF FN
//! skips) are emitted with NULL operands and back-patched as soon as their
//! label position is known. The first semantic error aborts the compilation.
//!
//! Module layout mirrors the statement groups: `expr` lowers expressions and
//! variable references, `control` the structured control flow, `stmt` the
//! remaining statements, and `builtins` holds the built-in function table.

mod builtins;
mod control;
mod expr;
mod stmt;

use ahash::AHashSet;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    error::{CompileError, CompileResult, ErrorKind},
    ir::{InstrRef, Ir},
    op::Opcode,
    symbols::{LabelKind, SymbolEntry, SymbolId, SymbolTable},
    tree::{CodeRange, Line, Program, Stmt, StmtKind},
};

/// Maximum nesting depth of open IF/WHILE/FOR constructs.
///
/// Exceeding this is reported as a semantic error rather than risking
/// unbounded compiler state on pathological input.
pub const MAX_CONTROL_DEPTH: usize = 64;

/// Maximum recursion depth while lowering one expression tree.
const MAX_EXPR_DEPTH: u32 = 200;

/// A successfully lowered program: the IR plus the symbol table its operand
/// ids resolve in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub ir: Ir,
    pub symbols: SymbolTable,
}

/// Lowers a parse tree to IR.
pub fn compile(program: &Program) -> CompileResult<CompiledProgram> {
    compile_inner(program, None)
}

/// Lowers a parse tree to IR, keeping the source text around so semantic
/// errors carry the offending excerpt.
pub fn compile_with_source(program: &Program, source: &str) -> CompileResult<CompiledProgram> {
    compile_inner(program, Some(source))
}

fn compile_inner(program: &Program, source: Option<&str>) -> CompileResult<CompiledProgram> {
    debug!("lowering {} lines", program.lines.len());
    let mut lowerer = Lowerer::new(source);
    lowerer.run(program)?;
    lowerer.finish()
}

/// An open multi-line `IF ... THEN BEGIN`.
struct IfState {
    /// The unconditional goto taken when the condition is false; patched to
    /// the ELSE block or the END IF exit.
    false_goto: InstrRef,
    /// Gotos that leave the THEN block, patched to the END IF exit.
    exit_gotos: SmallVec<[InstrRef; 2]>,
    else_seen: bool,
    range: CodeRange,
}

/// An open `WHILE`.
struct WhileState {
    /// Label just before the condition; WEND jumps back here.
    before_label: SymbolId,
    /// The conditional exit goto, patched to just after WEND.
    exit_goto: InstrRef,
    range: CodeRange,
}

/// An open `FOR`.
struct ForState {
    /// The loop variable; NEXT validates its name against this.
    var: SymbolId,
    /// Label at the increment block; NEXT jumps back here.
    apply_step_label: SymbolId,
    /// The exit-condition goto, patched to just after NEXT.
    exit_goto: InstrRef,
    range: CodeRange,
}

/// Mutable lowering state for one compilation.
pub(crate) struct Lowerer<'a> {
    pub(crate) symbols: SymbolTable,
    pub(crate) ir: Ir,
    source: Option<&'a str>,
    if_stack: Vec<IfState>,
    while_stack: Vec<WhileState>,
    for_stack: Vec<ForState>,
    expr_depth: u32,
    /// Label ids already used as a LABEL's op1, for the uniqueness invariant.
    emitted_labels: AHashSet<SymbolId>,
    /// Next synthetic line number for lines without an explicit one.
    next_line: u32,
}

impl<'a> Lowerer<'a> {
    fn new(source: Option<&'a str>) -> Self {
        Self {
            symbols: SymbolTable::new(),
            ir: Ir::new(),
            source,
            if_stack: Vec::new(),
            while_stack: Vec::new(),
            for_stack: Vec::new(),
            expr_depth: 0,
            emitted_labels: AHashSet::new(),
            next_line: 1,
        }
    }

    fn run(&mut self, program: &Program) -> CompileResult<()> {
        for line in &program.lines {
            self.lower_line(line)?;
        }
        Ok(())
    }

    fn lower_line(&mut self, line: &Line) -> CompileResult<()> {
        let number = match line.number {
            Some(n) => {
                self.next_line = n.saturating_add(1);
                n
            }
            None => {
                let n = self.next_line;
                self.next_line = n.saturating_add(1);
                n
            }
        };
        trace!("line {number}: {} statements", line.stmts.len());
        let label = self.symbols.linenum_label(number);
        self.emit_label(label, line.range)?;
        for stmt in &line.stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    /// Checks open control structures at EOF and runs the patch-completeness
    /// verification before handing the program over.
    fn finish(self) -> CompileResult<CompiledProgram> {
        if let Some(state) = self.for_stack.last() {
            return Err(self.err(ErrorKind::ForWithoutNext, state.range, "FOR without NEXT"));
        }
        if let Some(state) = self.while_stack.last() {
            return Err(self.err(ErrorKind::WhileWithoutWend, state.range, "WHILE without WEND"));
        }
        if let Some(state) = self.if_stack.last() {
            return Err(self.err(ErrorKind::MismatchedEndIf, state.range, "IF THEN BEGIN without END IF"));
        }
        self.ir.check_patched()?;
        debug!(
            "lowered to {} instructions, {} symbols",
            self.ir.len(),
            self.symbols.len()
        );
        Ok(CompiledProgram {
            ir: self.ir,
            symbols: self.symbols,
        })
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        let range = stmt.range;
        match &stmt.kind {
            StmtKind::Let { target, value } => self.lower_let(target, value, range),
            StmtKind::Print {
                file_number,
                using,
                items,
                trailing_separator,
            } => self.lower_print(file_number.as_ref(), using.as_ref(), items, *trailing_separator, range),
            StmtKind::Write { file_number, items } => self.lower_write(file_number.as_ref(), items, range),
            StmtKind::If {
                cond,
                then_stmts,
                else_stmts,
            } => self.lower_if(cond, then_stmts, else_stmts, range),
            StmtKind::IfBegin { cond } => self.lower_if_begin(cond, range),
            StmtKind::ElseBegin => self.lower_else_begin(range),
            StmtKind::EndIf => self.lower_end_if(range),
            StmtKind::While { cond } => self.lower_while(cond, range),
            StmtKind::Wend => self.lower_wend(range),
            StmtKind::For { var, init, end, step } => self.lower_for(var, init, end, step.as_ref(), range),
            StmtKind::Next { vars } => self.lower_next(vars, range),
            StmtKind::Goto { target } => self.lower_goto(target, range),
            StmtKind::Gosub { target } => self.lower_gosub(target, range),
            StmtKind::Return { target } => self.lower_return(*target, range),
            StmtKind::Label { name } => {
                let label = self.symbols.named_label(name);
                self.emit_label(label, range)
            }
            StmtKind::DefFn { name, params, body } => self.lower_def_fn(name, params, body, range),
            StmtKind::Dim { var } => self.lower_dim(var, range),
            StmtKind::DefType { data_type, ranges } => self.lower_def_type(*data_type, ranges, range),
            StmtKind::Swap { a, b } => self.lower_swap(a, b, range),
            StmtKind::MidAssign {
                target,
                start,
                length,
                value,
            } => self.lower_mid_assign(target, start, length.as_ref(), value, range),
            StmtKind::Input {
                prompt,
                file_number,
                vars,
            } => self.lower_input(prompt.as_deref(), file_number.as_ref(), vars, range),
            StmtKind::LineInput {
                prompt,
                file_number,
                var,
            } => self.lower_line_input(prompt.as_deref(), file_number.as_ref(), var, range),
            StmtKind::Data { values } => self.lower_data(values, range),
            StmtKind::Read { vars } => self.lower_read(vars, range),
            StmtKind::Restore => {
                self.emit(range, Opcode::Restore, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
                Ok(())
            }
            StmtKind::Open {
                filename,
                file_number,
                open_mode,
                access_mode,
                lock_mode,
                record_len,
            } => self.lower_open(filename, file_number, *open_mode, *access_mode, *lock_mode, record_len.as_ref(), range),
            StmtKind::Close { file_numbers } => self.lower_close(file_numbers, range),
            StmtKind::Field { file_number, parts } => self.lower_field(file_number, parts, range),
            StmtKind::GetRec {
                file_number,
                record_number,
            } => self.lower_record_io(Opcode::GetRec, file_number, record_number.as_ref(), range),
            StmtKind::PutRec {
                file_number,
                record_number,
            } => self.lower_record_io(Opcode::PutRec, file_number, record_number.as_ref(), range),
            StmtKind::End => {
                self.emit(range, Opcode::End, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
                Ok(())
            }
            StmtKind::Randomize { seed } => self.lower_randomize(seed.as_ref(), range),
            StmtKind::Sleep { millis } => {
                let (id, _) = self.numeric_value(millis)?;
                self.emit(range, Opcode::Sleep, id, SymbolId::NULL, SymbolId::NULL);
                Ok(())
            }
            StmtKind::Cls => {
                self.emit(range, Opcode::Cls, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
                Ok(())
            }
            StmtKind::Screen {
                title,
                width,
                height,
                manual_repaint,
            } => self.lower_screen(title, width, height, *manual_repaint, range),
            StmtKind::Repaint => {
                self.emit(range, Opcode::Repaint, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
                Ok(())
            }
            StmtKind::Color { r, g, b } => self.lower_color(r, g, b, range),
            StmtKind::Pset { x, y } => {
                let (x, _) = self.numeric_value(x)?;
                let (y, _) = self.numeric_value(y)?;
                self.emit(range, Opcode::Pset, x, y, SymbolId::NULL);
                Ok(())
            }
            StmtKind::DrawLine { x1, y1, x2, y2 } => self.lower_draw_line(x1, y1, x2, y2, range),
            StmtKind::Circle { x, y, rx, ry } => self.lower_circle(x, y, rx, ry, range),
            StmtKind::Paint { x, y, r, g, b } => self.lower_paint(x, y, r, g, b, range),
            StmtKind::Draw { command } => {
                let id = self.string_value(command)?;
                self.emit(range, Opcode::Draw, id, SymbolId::NULL, SymbolId::NULL);
                Ok(())
            }
            StmtKind::Font { name, style, size } => self.lower_font(name, style, size, range),
            StmtKind::DrawStr { text, x, y } => self.lower_draw_str(text, x, y, range),
            StmtKind::GraphicsGet { x1, y1, x2, y2, target } => self.lower_graphics_get(x1, y1, x2, y2, target, range),
            StmtKind::GraphicsPut { x, y, source } => self.lower_graphics_put(x, y, source, range),
            StmtKind::ArrayFill { target, value } => self.lower_array_fill(target, value, range),
            StmtKind::ArrayCopy { src, dst } => self.lower_array_copy(src, dst, range),
            StmtKind::Array1dCopy {
                src,
                src0,
                dst,
                dst0,
                len,
            } => self.lower_array1d_copy(src, src0, dst, dst0, len, range),
            StmtKind::Array1dSort { target } => self.lower_array1d_sort(target, range),
            StmtKind::Array2dShiftHor { target, by } => self.lower_array2d_shift(Opcode::Array2dShiftHor, target, by, range),
            StmtKind::Array2dShiftVer { target, by } => self.lower_array2d_shift(Opcode::Array2dShiftVer, target, by, range),
            StmtKind::LoadWav { path, handle } => self.lower_load_wav(path, handle, range),
            StmtKind::PlayWav { handle } => self.lower_wav_op(Opcode::PlayWav, handle, range),
            StmtKind::StopWav { handle } => self.lower_wav_op(Opcode::StopWav, handle, range),
            StmtKind::LoopWav { handle } => self.lower_wav_op(Opcode::LoopWav, handle, range),
        }
    }

    /// Shorthand for [`Ir::emit`].
    pub(crate) fn emit(&mut self, range: CodeRange, opcode: Opcode, op1: SymbolId, op2: SymbolId, result: SymbolId) -> InstrRef {
        self.ir.emit(range, opcode, op1, op2, result)
    }

    /// Emits a LABEL, enforcing that each label id is marked exactly once.
    fn emit_label(&mut self, label: SymbolId, range: CodeRange) -> CompileResult<()> {
        if !self.emitted_labels.insert(label) {
            return Err(match self.symbols.get(label) {
                SymbolEntry::Label(LabelKind::LineNumber(n)) => {
                    self.err(ErrorKind::BadArgument, range, format!("duplicate line number {n}"))
                }
                SymbolEntry::Label(LabelKind::Named(name)) => {
                    self.err(ErrorKind::BadArgument, range, format!("duplicate label {name}"))
                }
                _ => self.internal(range, "synthetic label marked twice"),
            });
        }
        self.emit(range, Opcode::Label, label, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    /// Builds a semantic error, attaching the source excerpt when available.
    pub(crate) fn err(&self, kind: ErrorKind, range: CodeRange, message: impl Into<String>) -> CompileError {
        CompileError::semantic(kind, range, message).with_excerpt(self.excerpt(range))
    }

    /// Builds an internal (compiler bug) error.
    pub(crate) fn internal(&self, range: CodeRange, message: impl Into<String>) -> CompileError {
        CompileError::internal(range, message).with_excerpt(self.excerpt(range))
    }

    /// The source substring a range covers; empty without source text.
    fn excerpt(&self, range: CodeRange) -> String {
        let Some(source) = self.source else {
            return String::new();
        };
        if range.start.row == 0 {
            return String::new();
        }
        let Some(row) = source.lines().nth(range.start.row as usize - 1) else {
            return String::new();
        };
        if range.start.row == range.end.row && range.start.column >= 1 {
            let from = (range.start.column as usize - 1).min(row.len());
            let to = (range.end.column as usize).saturating_sub(1).min(row.len()).max(from);
            row.get(from..to).map_or_else(|| row.trim().to_string(), |s| s.trim().to_string())
        } else {
            row.trim().to_string()
        }
    }
}
