//! Parse-tree adapter: the typed node kinds the external parser produces.
//!
//! Grammar and parsing live outside this crate. The parser generator walks the
//! source text and builds a [`Program`] out of the node kinds defined here;
//! the lowering pass then consumes that tree. Node constructors double as the
//! builder API for adapters and for tests, which assemble trees directly.
//!
//! Every node carries a [`CodeRange`] so semantic errors and emitted
//! instructions can point back at the source. Adapters that do not track
//! positions may use [`CodeRange::default`] / the `synthetic` constructors.

use serde::{Deserialize, Serialize};

use crate::datatype::{DataType, TypeSuffix};

/// A row/column position in the source text (both 1-based; 0 means unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodeLoc {
    pub row: u32,
    pub column: u32,
}

impl CodeLoc {
    #[must_use]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// A half-open span of source text, attached to every tree node and carried
/// into each emitted instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodeRange {
    pub start: CodeLoc,
    pub end: CodeLoc,
}

impl CodeRange {
    #[must_use]
    pub const fn new(start: CodeLoc, end: CodeLoc) -> Self {
        Self { start, end }
    }
}

/// A whole source program: the ordered list of logical lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub lines: Vec<Line>,
}

impl Program {
    #[must_use]
    pub fn new(lines: Vec<Line>) -> Self {
        Self { lines }
    }
}

/// One logical source line: an optional BASIC line number and its statements.
///
/// Lines without an explicit number receive a synthetic, monotonically
/// increasing number during lowering so that every line is a GOTO target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub number: Option<u32>,
    pub stmts: Vec<Stmt>,
    pub range: CodeRange,
}

impl Line {
    /// A line with an explicit BASIC line number.
    #[must_use]
    pub fn numbered(number: u32, stmts: Vec<Stmt>) -> Self {
        Self {
            number: Some(number),
            stmts,
            range: CodeRange::default(),
        }
    }

    /// A line without a number; lowering assigns a synthetic one.
    #[must_use]
    pub fn unnumbered(stmts: Vec<Stmt>) -> Self {
        Self {
            number: None,
            stmts,
            range: CodeRange::default(),
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: CodeRange) -> Self {
        self.range = range;
        self
    }
}

/// A variable reference as written in the source: bare name, optional type
/// sigil, and subscript/argument expressions.
///
/// The same syntax covers three semantically different things - scalar access,
/// array indexing, and DEF FN calls - and the symbol table disambiguates at
/// lowering time, so the tree keeps them as one node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRef {
    pub name: String,
    pub suffix: Option<TypeSuffix>,
    pub indices: Vec<Expr>,
    pub range: CodeRange,
}

impl VariableRef {
    /// A reference with no subscripts: `A`, `A%`, `NAME$`.
    #[must_use]
    pub fn scalar(name: impl Into<String>, suffix: Option<TypeSuffix>) -> Self {
        Self {
            name: name.into(),
            suffix,
            indices: Vec::new(),
            range: CodeRange::default(),
        }
    }

    /// A reference with subscripts: `A(1)`, `GRID%(I, J)`, `FNF(X)`.
    #[must_use]
    pub fn indexed(name: impl Into<String>, suffix: Option<TypeSuffix>, indices: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            suffix,
            indices,
            range: CodeRange::default(),
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: CodeRange) -> Self {
        self.range = range;
        self
    }
}

/// Binary operators of the expression grammar.
///
/// `Add` doubles as string concatenation; the lowering pass picks CONCAT when
/// both operands are strings. `Div` is float division (always Float64), `IDiv`
/// is the integer `\` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Exp,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
    Eqv,
    Imp,
    LeftShift,
    RightShift,
}

/// Unary operators of the expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Minus,
    Not,
}

/// An expression node with its source range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub range: CodeRange,
}

impl Expr {
    #[must_use]
    pub fn new(kind: ExprKind, range: CodeRange) -> Self {
        Self { kind, range }
    }

    /// A numeric literal, kept as source text (`"2"`, `"3!"`, `"&HFF"`); the
    /// numeric literal parser interprets base prefix and type suffix during
    /// lowering.
    #[must_use]
    pub fn number(text: impl Into<String>) -> Self {
        Self {
            kind: ExprKind::Number { text: text.into() },
            range: CodeRange::default(),
        }
    }

    /// A string literal (quotes already stripped by the parser).
    #[must_use]
    pub fn str_lit(text: impl Into<String>) -> Self {
        Self {
            kind: ExprKind::Str(text.into()),
            range: CodeRange::default(),
        }
    }

    #[must_use]
    pub fn variable(var: VariableRef) -> Self {
        Self {
            kind: ExprKind::Variable(var),
            range: CodeRange::default(),
        }
    }

    #[must_use]
    pub fn binary(op: BinOp, lhs: Self, rhs: Self) -> Self {
        Self {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            range: CodeRange::default(),
        }
    }

    #[must_use]
    pub fn unary(op: UnaryOp, operand: Self) -> Self {
        Self {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            range: CodeRange::default(),
        }
    }

    /// A call to a reserved built-in function: `SIN(X)`, `MID$(A$, 2, 3)`.
    #[must_use]
    pub fn function(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self {
            kind: ExprKind::Function {
                name: name.into(),
                args,
            },
            range: CodeRange::default(),
        }
    }

    /// A conditional expression: `IF cond THEN a ELSE b` in expression
    /// position. Only the selected branch is evaluated.
    #[must_use]
    pub fn if_expr(cond: Self, then_expr: Self, else_expr: Self) -> Self {
        Self {
            kind: ExprKind::If {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            range: CodeRange::default(),
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: CodeRange) -> Self {
        self.range = range;
        self
    }
}

/// The expression node kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Numeric literal source text, including any base prefix (`&H`, `&O`,
    /// bare `&`) and type suffix sigil.
    Number { text: String },
    /// String literal contents.
    Str(String),
    Variable(VariableRef),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Built-in function call; the name is the reserved word as written
    /// (case-insensitive), e.g. `"SIN"` or `"MID$"`.
    Function {
        name: String,
        args: Vec<Expr>,
    },
    /// Conditional expression with lazily evaluated branches.
    If {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
}

/// The target of a GOTO/GOSUB: a BASIC line number or a named label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpTarget {
    LineNumber(u32),
    Label(String),
}

/// A DATA statement constant: a raw numeric token or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataConst {
    Number(String),
    Str(String),
}

/// One `variable AS width` part of a FIELD statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPart {
    pub width: Expr,
    pub var: VariableRef,
}

/// OPEN statement mode: `FOR INPUT|OUTPUT|APPEND|RANDOM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOpenMode {
    Input,
    Output,
    Append,
    Random,
}

impl FileOpenMode {
    /// The integer code pushed through the PARAM channel for the interpreter.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Input => 0,
            Self::Output => 1,
            Self::Append => 2,
            Self::Random => 3,
        }
    }
}

/// OPEN statement access clause: `ACCESS READ|WRITE|READ WRITE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileAccessMode {
    Read,
    Write,
    #[default]
    ReadWrite,
}

impl FileAccessMode {
    /// The integer code pushed through the PARAM channel for the interpreter.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Read => 0,
            Self::Write => 1,
            Self::ReadWrite => 2,
        }
    }
}

/// OPEN statement lock clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileLockMode {
    #[default]
    Shared,
    LockRead,
    LockWrite,
    LockReadWrite,
}

impl FileLockMode {
    /// The integer code pushed through the PARAM channel for the interpreter.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Shared => 0,
            Self::LockRead => 1,
            Self::LockWrite => 2,
            Self::LockReadWrite => 3,
        }
    }
}

/// A statement node with its source range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub range: CodeRange,
}

impl Stmt {
    #[must_use]
    pub fn new(kind: StmtKind, range: CodeRange) -> Self {
        Self { kind, range }
    }

    /// A statement with a default (unknown) source range.
    #[must_use]
    pub fn synthetic(kind: StmtKind) -> Self {
        Self {
            kind,
            range: CodeRange::default(),
        }
    }
}

/// The statement node kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `LET target = value` (the LET keyword itself is optional in most
    /// dialects; the parser normalises both forms to this node).
    Let {
        target: VariableRef,
        value: Expr,
    },
    /// `PRINT [#file,] [USING fmt$;] items...`.
    Print {
        file_number: Option<Expr>,
        using: Option<Expr>,
        items: Vec<Expr>,
        /// A trailing `;` or `,` suppresses the appended newline.
        trailing_separator: bool,
    },
    /// `WRITE [#file,] items...` - comma-separated, always newline-terminated.
    Write {
        file_number: Option<Expr>,
        items: Vec<Expr>,
    },
    /// Single-line `IF cond THEN stmts [ELSE stmts]`.
    If {
        cond: Expr,
        then_stmts: Vec<Stmt>,
        else_stmts: Vec<Stmt>,
    },
    /// `IF cond THEN BEGIN` opening a multi-line conditional.
    IfBegin {
        cond: Expr,
    },
    /// `ELSE BEGIN` inside a multi-line conditional.
    ElseBegin,
    /// `END IF` closing a multi-line conditional.
    EndIf,
    While {
        cond: Expr,
    },
    Wend,
    For {
        var: VariableRef,
        init: Expr,
        end: Expr,
        step: Option<Expr>,
    },
    /// `NEXT [var[, var...]]` - an empty list closes the innermost FOR.
    Next {
        vars: Vec<VariableRef>,
    },
    Goto {
        target: JumpTarget,
    },
    Gosub {
        target: JumpTarget,
    },
    /// `RETURN [linenum]`.
    Return {
        target: Option<u32>,
    },
    /// A named label declaration.
    Label {
        name: String,
    },
    /// `DEF FNname(params) = body`. The name's suffix dictates the return
    /// type; parameters are scalar references whose suffixes dictate their
    /// types.
    DefFn {
        name: VariableRef,
        params: Vec<VariableRef>,
        body: Expr,
    },
    /// `DIM name(d1[, d2...])` - the reference's indices are the dimension
    /// expressions.
    Dim {
        var: VariableRef,
    },
    /// DEFINT/DEFLNG/DEFSNG/DEFDBL/DEFSTR over inclusive letter ranges.
    DefType {
        data_type: DataType,
        ranges: Vec<(char, char)>,
    },
    Swap {
        a: VariableRef,
        b: VariableRef,
    },
    /// `MID$(target$, start[, length]) = value$`.
    MidAssign {
        target: VariableRef,
        start: Expr,
        length: Option<Expr>,
        value: Expr,
    },
    Input {
        prompt: Option<String>,
        file_number: Option<Expr>,
        vars: Vec<VariableRef>,
    },
    LineInput {
        prompt: Option<String>,
        file_number: Option<Expr>,
        var: VariableRef,
    },
    Data {
        values: Vec<DataConst>,
    },
    Read {
        vars: Vec<VariableRef>,
    },
    Restore,
    Open {
        filename: Expr,
        file_number: Expr,
        open_mode: FileOpenMode,
        access_mode: FileAccessMode,
        lock_mode: FileLockMode,
        record_len: Option<Expr>,
    },
    /// `CLOSE [#n[, #n...]]` - an empty list closes every open file.
    Close {
        file_numbers: Vec<Expr>,
    },
    Field {
        file_number: Expr,
        parts: Vec<FieldPart>,
    },
    /// Record read: `GET #n[, rec]`.
    GetRec {
        file_number: Expr,
        record_number: Option<Expr>,
    },
    /// Record write: `PUT #n[, rec]`.
    PutRec {
        file_number: Expr,
        record_number: Option<Expr>,
    },
    End,
    /// `RANDOMIZE seed` or `RANDOMIZE TIMER` when no seed is given.
    Randomize {
        seed: Option<Expr>,
    },
    Sleep {
        millis: Expr,
    },
    Cls,
    Screen {
        title: Expr,
        width: Expr,
        height: Expr,
        manual_repaint: bool,
    },
    Repaint,
    Color {
        r: Expr,
        g: Expr,
        b: Expr,
    },
    Pset {
        x: Expr,
        y: Expr,
    },
    DrawLine {
        x1: Expr,
        y1: Expr,
        x2: Expr,
        y2: Expr,
    },
    Circle {
        x: Expr,
        y: Expr,
        rx: Expr,
        ry: Expr,
    },
    Paint {
        x: Expr,
        y: Expr,
        r: Expr,
        g: Expr,
        b: Expr,
    },
    /// Turtle-style `DRAW cmd$`.
    Draw {
        command: Expr,
    },
    Font {
        name: Expr,
        style: Expr,
        size: Expr,
    },
    DrawStr {
        text: Expr,
        x: Expr,
        y: Expr,
    },
    /// Graphics `GET (x1,y1)-(x2,y2), target` into a DIM'd 2-D Int32 array.
    GraphicsGet {
        x1: Expr,
        y1: Expr,
        x2: Expr,
        y2: Expr,
        target: VariableRef,
    },
    /// Graphics `PUT (x,y), source` from a DIM'd 2-D Int32 array.
    GraphicsPut {
        x: Expr,
        y: Expr,
        source: VariableRef,
    },
    /// `ARRAYFILL target, value`.
    ArrayFill {
        target: VariableRef,
        value: Expr,
    },
    /// `ARRAYCOPY src, dst` - whole-array copy between same-shape arrays.
    ArrayCopy {
        src: VariableRef,
        dst: VariableRef,
    },
    /// `ARRAY1DCOPY src, src0, dst, dst0, len` - ranged copy.
    Array1dCopy {
        src: VariableRef,
        src0: Expr,
        dst: VariableRef,
        dst0: Expr,
        len: Expr,
    },
    Array1dSort {
        target: VariableRef,
    },
    Array2dShiftHor {
        target: VariableRef,
        by: Expr,
    },
    Array2dShiftVer {
        target: VariableRef,
        by: Expr,
    },
    LoadWav {
        path: Expr,
        handle: VariableRef,
    },
    PlayWav {
        handle: VariableRef,
    },
    StopWav {
        handle: VariableRef,
    },
    LoopWav {
        handle: VariableRef,
    },
}
