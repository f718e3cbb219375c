//! Statement lowering: assignment, console and file I/O, DATA, arrays,
//! graphics, and sound.
//!
//! Statements whose opcode needs more than two operands push the extras
//! through the PARAM side channel immediately before the consuming opcode;
//! the push order always matches the layout documented on [`Opcode`].

use crate::{
    datatype::{DataType, Value},
    error::{CompileResult, ErrorKind},
    literal,
    op::Opcode,
    symbols::{SymbolEntry, SymbolId, VariableName},
    tree::{
        CodeRange, DataConst, Expr, FieldPart, FileAccessMode, FileLockMode, FileOpenMode, VariableRef,
    },
};

use super::{Lowerer, expr::assignable};

impl Lowerer<'_> {
    /// `LET target = value`.
    pub(crate) fn lower_let(&mut self, target: &VariableRef, value: &Expr, range: CodeRange) -> CompileResult<()> {
        let (lhs, lhs_type) = self.lower_lvalue(target)?;
        let (rhs, rhs_type) = self.expr_value(value)?;
        if !assignable(lhs_type, rhs_type) {
            return Err(self.err(
                ErrorKind::DataTypeMismatch,
                range,
                "cannot mix string and numeric in assignment",
            ));
        }
        let rhs = self.coerce(rhs, rhs_type, lhs_type, value.range);
        self.emit(range, Opcode::Assign, lhs, rhs, SymbolId::NULL);
        Ok(())
    }

    /// `PRINT` / `PRINT USING`: one PRINT or PRINTUSING per item, a newline
    /// unless a trailing separator suppressed it, then FLUSH.
    pub(crate) fn lower_print(
        &mut self,
        file_number: Option<&Expr>,
        using: Option<&Expr>,
        items: &[Expr],
        trailing_separator: bool,
        range: CodeRange,
    ) -> CompileResult<()> {
        let file = self.optional_file_number(file_number)?;
        let format = match using {
            Some(expr) => Some(self.string_value(expr)?),
            None => None,
        };
        for item in items {
            let (id, _) = self.expr_value(item)?;
            match format {
                // the one format id is reused for every item
                Some(format) => self.emit(item.range, Opcode::PrintUsing, format, id, SymbolId::NULL),
                None => self.emit(item.range, Opcode::Print, id, SymbolId::NULL, SymbolId::NULL),
            };
        }
        if !trailing_separator {
            let newline = self.str_tmp("\n");
            self.emit(range, Opcode::Print, newline, SymbolId::NULL, SymbolId::NULL);
        }
        self.emit(range, Opcode::Flush, file, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    /// `WRITE`: items separated by commas, always newline-terminated.
    pub(crate) fn lower_write(
        &mut self,
        file_number: Option<&Expr>,
        items: &[Expr],
        range: CodeRange,
    ) -> CompileResult<()> {
        let file = self.optional_file_number(file_number)?;
        let comma = if items.len() > 1 { Some(self.str_tmp(",")) } else { None };
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                let comma = comma.unwrap_or(SymbolId::NULL);
                self.emit(item.range, Opcode::Print, comma, SymbolId::NULL, SymbolId::NULL);
            }
            let (id, _) = self.expr_value(item)?;
            self.emit(item.range, Opcode::Print, id, SymbolId::NULL, SymbolId::NULL);
        }
        let newline = self.str_tmp("\n");
        self.emit(range, Opcode::Print, newline, SymbolId::NULL, SymbolId::NULL);
        self.emit(range, Opcode::Flush, file, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    /// `DIM name(d1[, d2...])`.
    pub(crate) fn lower_dim(&mut self, var: &VariableRef, range: CodeRange) -> CompileResult<()> {
        if var.indices.is_empty() {
            return Err(self.err(ErrorKind::BadArgument, range, "DIM requires at least one dimension"));
        }
        let rank = var.indices.len();
        let element_type = self.symbols.resolve_type(&var.name, var.suffix);
        let name = VariableName::new(&var.name, element_type);
        let id = match self.symbols.lookup(&name) {
            Some(id) => {
                match self.symbols.get(id) {
                    SymbolEntry::Variable { array: Some(desc), .. } if desc.rank == rank => id,
                    SymbolEntry::Variable { array: Some(_), .. } => {
                        return Err(self.err(
                            ErrorKind::BadArgument,
                            range,
                            format!("{} is already dimensioned with a different rank", name.name()),
                        ));
                    }
                    SymbolEntry::Variable { array: None, .. } => {
                        return Err(self.err(
                            ErrorKind::BadArgument,
                            range,
                            format!("{} is already a scalar variable", name.name()),
                        ));
                    }
                    _ => {
                        return Err(self.err(
                            ErrorKind::BadArgument,
                            range,
                            format!("{} is already defined", name.name()),
                        ));
                    }
                }
            }
            None => self.symbols.get_or_insert_with(&name, |n| SymbolEntry::Variable {
                name: n.clone(),
                array: Some(crate::symbols::ArrayDescriptor { rank }),
            }),
        };
        for dim in &var.indices {
            let (extent, _) = self.numeric_value(dim)?;
            self.param1(extent, dim.range);
        }
        self.emit(range, Opcode::Dim, id, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    /// DEFINT/DEFLNG/DEFSNG/DEFDBL/DEFSTR. Pure symbol-table effect.
    pub(crate) fn lower_def_type(
        &mut self,
        data_type: DataType,
        ranges: &[(char, char)],
        range: CodeRange,
    ) -> CompileResult<()> {
        for &(from, to) in ranges {
            if !from.is_ascii_alphabetic()
                || !to.is_ascii_alphabetic()
                || from.to_ascii_uppercase() > to.to_ascii_uppercase()
            {
                return Err(self.err(
                    ErrorKind::BadArgument,
                    range,
                    format!("invalid letter range {from}-{to}"),
                ));
            }
            self.symbols.set_default_range(from, to, data_type);
        }
        Ok(())
    }

    /// `SWAP a, b` - both sides must have the same data type.
    pub(crate) fn lower_swap(&mut self, a: &VariableRef, b: &VariableRef, range: CodeRange) -> CompileResult<()> {
        let (a_id, a_type) = self.lower_lvalue(a)?;
        let (b_id, b_type) = self.lower_lvalue(b)?;
        if a_type != b_type {
            return Err(self.err(
                ErrorKind::DataTypeMismatch,
                range,
                "SWAP operands must have the same data type",
            ));
        }
        self.emit(range, Opcode::Swap, a_id, b_id, SymbolId::NULL);
        Ok(())
    }

    /// `MID$(target$, start[, length]) = value$`.
    pub(crate) fn lower_mid_assign(
        &mut self,
        target: &VariableRef,
        start: &Expr,
        length: Option<&Expr>,
        value: &Expr,
        range: CodeRange,
    ) -> CompileResult<()> {
        let target_id = self.defined_string_variable(target)?;
        let (start_id, _) = self.numeric_value(start)?;
        let length_id = match length {
            Some(expr) => self.numeric_value(expr)?.0,
            None => SymbolId::NULL,
        };
        let value_id = self.string_value(value)?;
        self.param2(start_id, length_id, range);
        self.emit(range, Opcode::MidAssign, target_id, value_id, SymbolId::NULL);
        Ok(())
    }

    /// `INPUT [prompt;] var-list`.
    pub(crate) fn lower_input(
        &mut self,
        prompt: Option<&str>,
        file_number: Option<&Expr>,
        vars: &[VariableRef],
        range: CodeRange,
    ) -> CompileResult<()> {
        if vars.is_empty() {
            return Err(self.err(ErrorKind::BadArgument, range, "INPUT requires at least one variable"));
        }
        let prompt_id = prompt.map_or(SymbolId::NULL, |p| self.str_tmp(p));
        let file = self.optional_file_number(file_number)?;
        for var in vars {
            let (id, _) = self.lower_lvalue(var)?;
            self.param1(id, var.range);
        }
        self.emit(range, Opcode::Input, prompt_id, file, SymbolId::NULL);
        Ok(())
    }

    /// `LINE INPUT [prompt;] var$`.
    pub(crate) fn lower_line_input(
        &mut self,
        prompt: Option<&str>,
        file_number: Option<&Expr>,
        var: &VariableRef,
        range: CodeRange,
    ) -> CompileResult<()> {
        let prompt_id = prompt.map_or(SymbolId::NULL, |p| self.str_tmp(p));
        let file = self.optional_file_number(file_number)?;
        let (id, data_type) = self.lower_lvalue(var)?;
        if data_type != DataType::String {
            return Err(self.err(
                ErrorKind::DataTypeMismatch,
                var.range,
                "LINE INPUT target must be a string variable",
            ));
        }
        self.param1(id, var.range);
        self.emit(range, Opcode::LineInput, prompt_id, file, SymbolId::NULL);
        Ok(())
    }

    /// `DATA const-list` - each constant becomes a preinitialised temporary.
    pub(crate) fn lower_data(&mut self, values: &[DataConst], range: CodeRange) -> CompileResult<()> {
        for value in values {
            let value = match value {
                DataConst::Number(text) => literal::parse_numeric(text, range)?,
                DataConst::Str(text) => Value::Str(text.clone()),
            };
            let tmp = self.symbols.add_tmp(value.data_type(), Some(value));
            self.param1(tmp, range);
        }
        self.emit(range, Opcode::Data, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    /// `READ var-list` - one READ per target.
    pub(crate) fn lower_read(&mut self, vars: &[VariableRef], range: CodeRange) -> CompileResult<()> {
        for var in vars {
            let (id, _) = self.lower_lvalue(var)?;
            self.emit(range, Opcode::Read, id, SymbolId::NULL, SymbolId::NULL);
        }
        Ok(())
    }

    /// `OPEN filename$ FOR mode ACCESS access lock AS #n [LEN=reclen]`.
    #[expect(clippy::too_many_arguments, reason = "mirrors the statement's clause list")]
    pub(crate) fn lower_open(
        &mut self,
        filename: &Expr,
        file_number: &Expr,
        open_mode: FileOpenMode,
        access_mode: FileAccessMode,
        lock_mode: FileLockMode,
        record_len: Option<&Expr>,
        range: CodeRange,
    ) -> CompileResult<()> {
        let filename_id = self.string_value(filename)?;
        let (file_id, _) = self.numeric_value(file_number)?;
        self.param2(filename_id, file_id, range);
        let open_id = self.int_tmp(open_mode.code());
        let access_id = self.int_tmp(access_mode.code());
        self.param2(open_id, access_id, range);
        let lock_id = self.int_tmp(lock_mode.code());
        let record_len_id = match record_len {
            Some(expr) => self.numeric_value(expr)?.0,
            None => SymbolId::NULL,
        };
        self.param2(lock_id, record_len_id, range);
        self.emit(range, Opcode::Open, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    /// `CLOSE [#n...]` - no numbers closes everything.
    pub(crate) fn lower_close(&mut self, file_numbers: &[Expr], range: CodeRange) -> CompileResult<()> {
        if file_numbers.is_empty() {
            self.emit(range, Opcode::CloseAll, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
            return Ok(());
        }
        for expr in file_numbers {
            let (id, _) = self.numeric_value(expr)?;
            self.emit(expr.range, Opcode::Close, id, SymbolId::NULL, SymbolId::NULL);
        }
        Ok(())
    }

    /// `FIELD #n, width AS var$...`.
    pub(crate) fn lower_field(&mut self, file_number: &Expr, parts: &[FieldPart], range: CodeRange) -> CompileResult<()> {
        if parts.is_empty() {
            return Err(self.err(ErrorKind::BadArgument, range, "FIELD requires at least one part"));
        }
        let (file_id, _) = self.numeric_value(file_number)?;
        for part in parts {
            let var_id = self.field_string_variable(&part.var)?;
            let (width_id, _) = self.numeric_value(&part.width)?;
            self.param2(var_id, width_id, part.var.range);
        }
        let count = i32::try_from(parts.len()).map_err(|_| self.internal(range, "FIELD part count overflow"))?;
        let count_id = self.int_tmp(count);
        self.emit(range, Opcode::Field, file_id, count_id, SymbolId::NULL);
        Ok(())
    }

    /// `GET #n[, rec]` / `PUT #n[, rec]` record I/O.
    pub(crate) fn lower_record_io(
        &mut self,
        opcode: Opcode,
        file_number: &Expr,
        record_number: Option<&Expr>,
        range: CodeRange,
    ) -> CompileResult<()> {
        let (file_id, _) = self.numeric_value(file_number)?;
        let record_id = match record_number {
            Some(expr) => self.numeric_value(expr)?.0,
            None => SymbolId::NULL,
        };
        self.emit(range, opcode, file_id, record_id, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_randomize(&mut self, seed: Option<&Expr>, range: CodeRange) -> CompileResult<()> {
        match seed {
            Some(expr) => {
                let (id, _) = self.numeric_value(expr)?;
                self.emit(range, Opcode::Randomize, id, SymbolId::NULL, SymbolId::NULL);
            }
            None => {
                self.emit(range, Opcode::RandomizeTimer, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
            }
        }
        Ok(())
    }

    pub(crate) fn lower_screen(
        &mut self,
        title: &Expr,
        width: &Expr,
        height: &Expr,
        manual_repaint: bool,
        range: CodeRange,
    ) -> CompileResult<()> {
        let title_id = self.string_value(title)?;
        let (width_id, _) = self.numeric_value(width)?;
        let (height_id, _) = self.numeric_value(height)?;
        self.param2(width_id, height_id, range);
        let manual_id = self.int_tmp(i32::from(manual_repaint));
        self.emit(range, Opcode::Screen, title_id, manual_id, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_color(&mut self, r: &Expr, g: &Expr, b: &Expr, range: CodeRange) -> CompileResult<()> {
        let (r_id, _) = self.numeric_value(r)?;
        let (g_id, _) = self.numeric_value(g)?;
        let (b_id, _) = self.numeric_value(b)?;
        self.param2(r_id, g_id, range);
        self.emit(range, Opcode::Color, b_id, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_draw_line(
        &mut self,
        x1: &Expr,
        y1: &Expr,
        x2: &Expr,
        y2: &Expr,
        range: CodeRange,
    ) -> CompileResult<()> {
        let (x1_id, _) = self.numeric_value(x1)?;
        let (y1_id, _) = self.numeric_value(y1)?;
        let (x2_id, _) = self.numeric_value(x2)?;
        let (y2_id, _) = self.numeric_value(y2)?;
        self.param2(x1_id, y1_id, range);
        self.param2(x2_id, y2_id, range);
        self.emit(range, Opcode::DrawLine, SymbolId::NULL, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_circle(
        &mut self,
        x: &Expr,
        y: &Expr,
        rx: &Expr,
        ry: &Expr,
        range: CodeRange,
    ) -> CompileResult<()> {
        let (x_id, _) = self.numeric_value(x)?;
        let (y_id, _) = self.numeric_value(y)?;
        let (rx_id, _) = self.numeric_value(rx)?;
        let (ry_id, _) = self.numeric_value(ry)?;
        self.param2(rx_id, ry_id, range);
        self.emit(range, Opcode::Circle, x_id, y_id, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_paint(
        &mut self,
        x: &Expr,
        y: &Expr,
        r: &Expr,
        g: &Expr,
        b: &Expr,
        range: CodeRange,
    ) -> CompileResult<()> {
        let (x_id, _) = self.numeric_value(x)?;
        let (y_id, _) = self.numeric_value(y)?;
        let (r_id, _) = self.numeric_value(r)?;
        let (g_id, _) = self.numeric_value(g)?;
        let (b_id, _) = self.numeric_value(b)?;
        self.param2(r_id, g_id, range);
        self.param1(b_id, range);
        self.emit(range, Opcode::Paint, x_id, y_id, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_font(&mut self, name: &Expr, style: &Expr, size: &Expr, range: CodeRange) -> CompileResult<()> {
        let name_id = self.string_value(name)?;
        let style_id = self.string_value(style)?;
        let (size_id, _) = self.numeric_value(size)?;
        self.param1(size_id, range);
        self.emit(range, Opcode::Font, name_id, style_id, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_draw_str(&mut self, text: &Expr, x: &Expr, y: &Expr, range: CodeRange) -> CompileResult<()> {
        let text_id = self.string_value(text)?;
        let (x_id, _) = self.numeric_value(x)?;
        let (y_id, _) = self.numeric_value(y)?;
        self.param2(x_id, y_id, range);
        self.emit(range, Opcode::DrawStr, text_id, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    /// Graphics `GET (x1,y1)-(x2,y2), target` - target must be a DIM'd 2-D
    /// Int32 array.
    pub(crate) fn lower_graphics_get(
        &mut self,
        x1: &Expr,
        y1: &Expr,
        x2: &Expr,
        y2: &Expr,
        target: &VariableRef,
        range: CodeRange,
    ) -> CompileResult<()> {
        let target_id = self.array_arg(target, Some(2), Some(DataType::Int32))?;
        let (x1_id, _) = self.numeric_value(x1)?;
        let (y1_id, _) = self.numeric_value(y1)?;
        let (x2_id, _) = self.numeric_value(x2)?;
        let (y2_id, _) = self.numeric_value(y2)?;
        self.param2(x1_id, y1_id, range);
        self.param2(x2_id, y2_id, range);
        self.emit(range, Opcode::GraphicsGet, target_id, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    /// Graphics `PUT (x,y), source` - source must be a DIM'd 2-D Int32 array.
    pub(crate) fn lower_graphics_put(
        &mut self,
        x: &Expr,
        y: &Expr,
        source: &VariableRef,
        range: CodeRange,
    ) -> CompileResult<()> {
        let source_id = self.array_arg(source, Some(2), Some(DataType::Int32))?;
        let (x_id, _) = self.numeric_value(x)?;
        let (y_id, _) = self.numeric_value(y)?;
        self.param2(x_id, y_id, range);
        self.emit(range, Opcode::GraphicsPut, source_id, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_array_fill(&mut self, target: &VariableRef, value: &Expr, range: CodeRange) -> CompileResult<()> {
        let target_id = self.array_arg(target, None, None)?;
        let element_type = self.symbols.resolve_type(&target.name, target.suffix);
        let (value_id, value_type) = self.expr_value(value)?;
        if !assignable(element_type, value_type) {
            return Err(self.err(
                ErrorKind::DataTypeMismatch,
                value.range,
                "fill value does not match the array element type",
            ));
        }
        self.emit(range, Opcode::ArrayFill, target_id, value_id, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_array_copy(&mut self, src: &VariableRef, dst: &VariableRef, range: CodeRange) -> CompileResult<()> {
        let src_id = self.array_arg(src, None, None)?;
        let element_type = self.symbols.resolve_type(&src.name, src.suffix);
        let dst_id = self.array_arg(dst, None, Some(element_type))?;
        self.emit(range, Opcode::ArrayCopy, src_id, dst_id, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_array1d_copy(
        &mut self,
        src: &VariableRef,
        src0: &Expr,
        dst: &VariableRef,
        dst0: &Expr,
        len: &Expr,
        range: CodeRange,
    ) -> CompileResult<()> {
        let src_id = self.array_arg(src, Some(1), None)?;
        let element_type = self.symbols.resolve_type(&src.name, src.suffix);
        let dst_id = self.array_arg(dst, Some(1), Some(element_type))?;
        let (src0_id, _) = self.numeric_value(src0)?;
        let (dst0_id, _) = self.numeric_value(dst0)?;
        let (len_id, _) = self.numeric_value(len)?;
        self.param2(src0_id, dst0_id, range);
        self.param1(len_id, range);
        self.emit(range, Opcode::Array1dCopy, src_id, dst_id, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_array1d_sort(&mut self, target: &VariableRef, range: CodeRange) -> CompileResult<()> {
        let target_id = self.array_arg(target, Some(1), None)?;
        self.emit(range, Opcode::Array1dSort, target_id, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    pub(crate) fn lower_array2d_shift(
        &mut self,
        opcode: Opcode,
        target: &VariableRef,
        by: &Expr,
        range: CodeRange,
    ) -> CompileResult<()> {
        let target_id = self.array_arg(target, Some(2), None)?;
        let (by_id, _) = self.numeric_value(by)?;
        self.emit(range, opcode, target_id, by_id, SymbolId::NULL);
        Ok(())
    }

    /// `LOADWAV path$, handle$` - the handle must be a defined string
    /// variable.
    pub(crate) fn lower_load_wav(&mut self, path: &Expr, handle: &VariableRef, range: CodeRange) -> CompileResult<()> {
        let path_id = self.string_value(path)?;
        let handle_id = self.defined_string_variable(handle)?;
        self.emit(range, Opcode::LoadWav, path_id, handle_id, SymbolId::NULL);
        Ok(())
    }

    /// PLAYWAV/STOPWAV/LOOPWAV over a defined string handle.
    pub(crate) fn lower_wav_op(&mut self, opcode: Opcode, handle: &VariableRef, range: CodeRange) -> CompileResult<()> {
        let handle_id = self.defined_string_variable(handle)?;
        self.emit(range, opcode, handle_id, SymbolId::NULL, SymbolId::NULL);
        Ok(())
    }

    // ==========================
    // shared helpers

    pub(crate) fn param1(&mut self, id: SymbolId, range: CodeRange) {
        self.emit(range, Opcode::Param1, id, SymbolId::NULL, SymbolId::NULL);
    }

    pub(crate) fn param2(&mut self, a: SymbolId, b: SymbolId, range: CodeRange) {
        self.emit(range, Opcode::Param2, a, b, SymbolId::NULL);
    }

    /// A fresh Int32 temporary preinitialised to `value`.
    pub(crate) fn int_tmp(&mut self, value: i32) -> SymbolId {
        self.symbols.add_tmp(DataType::Int32, Some(Value::Int32(value)))
    }

    /// A fresh String temporary preinitialised to `value`.
    pub(crate) fn str_tmp(&mut self, value: &str) -> SymbolId {
        self.symbols.add_tmp(DataType::String, Some(Value::Str(value.to_string())))
    }

    fn optional_file_number(&mut self, file_number: Option<&Expr>) -> CompileResult<SymbolId> {
        match file_number {
            Some(expr) => Ok(self.numeric_value(expr)?.0),
            None => Ok(SymbolId::NULL),
        }
    }

    /// Resolves a reference to an already-defined scalar string variable;
    /// used by MID$ assignment and the WAV statements.
    fn defined_string_variable(&mut self, var: &VariableRef) -> CompileResult<SymbolId> {
        if !var.indices.is_empty() {
            return Err(self.err(ErrorKind::BadArgument, var.range, "expected a scalar string variable"));
        }
        let data_type = self.symbols.resolve_type(&var.name, var.suffix);
        if data_type != DataType::String {
            return Err(self.err(
                ErrorKind::DataTypeMismatch,
                var.range,
                format!("{} is not a string variable", var.name.to_ascii_uppercase()),
            ));
        }
        let name = VariableName::new(&var.name, data_type);
        let Some(id) = self.symbols.lookup(&name) else {
            return Err(self.err(
                ErrorKind::NotDefined,
                var.range,
                format!("{} used before it was defined", name.name()),
            ));
        };
        match self.symbols.get(id) {
            SymbolEntry::Variable { array: None, .. } => Ok(id),
            _ => Err(self.err(
                ErrorKind::BadArgument,
                var.range,
                format!("{} is not a scalar string variable", name.name()),
            )),
        }
    }

    /// Resolves (or creates) a scalar string variable for a FIELD part.
    fn field_string_variable(&mut self, var: &VariableRef) -> CompileResult<SymbolId> {
        if !var.indices.is_empty() {
            return Err(self.err(ErrorKind::BadArgument, var.range, "FIELD parts must be scalar variables"));
        }
        let data_type = self.symbols.resolve_type(&var.name, var.suffix);
        if data_type != DataType::String {
            return Err(self.err(
                ErrorKind::DataTypeMismatch,
                var.range,
                "FIELD parts must be string variables",
            ));
        }
        let (id, _) = self.lower_lvalue(var)?;
        Ok(id)
    }

    /// Resolves a bare array name argument, checking rank and element type
    /// when required. The array must have been DIM'd.
    pub(crate) fn array_arg(
        &mut self,
        var: &VariableRef,
        rank: Option<usize>,
        element_type: Option<DataType>,
    ) -> CompileResult<SymbolId> {
        if !var.indices.is_empty() {
            return Err(self.err(ErrorKind::BadArgument, var.range, "expected a bare array name"));
        }
        let data_type = self.symbols.resolve_type(&var.name, var.suffix);
        let name = VariableName::new(&var.name, data_type);
        let Some(id) = self.symbols.lookup(&name) else {
            return Err(self.err(
                ErrorKind::NotDefined,
                var.range,
                format!("{} used before DIM", name.name()),
            ));
        };
        let desc = match self.symbols.get(id) {
            SymbolEntry::Variable { array: Some(desc), .. } => *desc,
            SymbolEntry::Variable { array: None, .. } => {
                return Err(self.err(
                    ErrorKind::BadArgument,
                    var.range,
                    format!("{} is not an array", name.name()),
                ));
            }
            _ => {
                return Err(self.err(
                    ErrorKind::BadArgument,
                    var.range,
                    format!("{} is not an array", name.name()),
                ));
            }
        };
        if let Some(rank) = rank
            && desc.rank != rank
        {
            return Err(self.err(
                ErrorKind::BadArgument,
                var.range,
                format!("expected a {rank}-dimensional array"),
            ));
        }
        if let Some(element_type) = element_type
            && data_type != element_type
        {
            return Err(self.err(
                ErrorKind::BadArgument,
                var.range,
                format!("expected a {element_type} array"),
            ));
        }
        Ok(id)
    }
}
