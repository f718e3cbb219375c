//! The opcode set: the contract between the lowering pass and the interpreter.
//!
//! Each instruction is `(opcode, op1, op2, result, source range)` where the
//! operands are symbol-table ids or [`crate::SymbolId::NULL`]. Opcodes needing
//! more than two operands receive the extras through the PARAM side channel:
//! PARAM1/PARAM2 push one or two ids onto a transient queue that the next
//! non-PARAM opcode drains completely. The emit order of PARAM pushes always
//! matches the consumer's documented operand order.
//!
//! Arithmetic and comparison opcodes come in families specialised on the
//! promoted operand type; the interpreter coerces both operands to that type
//! before applying the operation. Comparisons produce an Int64 boolean
//! (0 false, -1 true).

use serde::{Deserialize, Serialize};
use strum::{Display, FromRepr, IntoStaticStr};

/// Every operation the IR can express.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    // ==========================
    // Data movement
    /// Names a variable; `result` is the variable id. Emitted so expression
    /// nodes have an instruction handle carrying their result id.
    Variable,
    /// Names a literal; `result` is a preinitialised temporary.
    Value,
    /// Store `op2` into `op1` (types already equal at emit time).
    Assign,
    /// Coerce `op2` to `result`'s type, then store into `result`.
    Copy,

    // ==========================
    // Arrays - `op1` is always the array variable
    /// Clear the index vector being built for `op1`.
    ResetArrayIdx,
    /// Append the value of `op2` to `op1`'s index vector.
    SetArrayIdx,
    /// Bind `result` (an array-ref entry) to `op1` at the collected indices.
    ArrayRef,

    // ==========================
    // Arithmetic - result type named by the opcode
    AddI32,
    AddI64,
    AddF32,
    AddF64,
    SubI32,
    SubI64,
    SubF32,
    SubF64,
    MulI32,
    MulI64,
    MulF32,
    MulF64,
    ExpI32,
    ExpI64,
    ExpF32,
    ExpF64,
    /// Integer division; result is Int64.
    IDiv,
    /// Float division; result is always Float64.
    FDiv,
    /// Remainder on the integer representation; result is Int64.
    Mod,
    /// Negate `op1` into a `result` of the same type.
    UnaryMinus,
    /// String concatenation.
    Concat,

    // ==========================
    // Comparisons - Int64 boolean result (0 / -1)
    EqI32,
    EqI64,
    EqF32,
    EqF64,
    EqStr,
    NeI32,
    NeI64,
    NeF32,
    NeF64,
    NeStr,
    LtI32,
    LtI64,
    LtF32,
    LtF64,
    LtStr,
    LeI32,
    LeI64,
    LeF32,
    LeF64,
    LeStr,
    GtI32,
    GtI64,
    GtF32,
    GtF64,
    GtStr,
    GeI32,
    GeI64,
    GeF32,
    GeF64,
    GeStr,

    // ==========================
    // Logical / bitwise - operate on the integer representation
    Not,
    And,
    Or,
    Xor,
    Eqv,
    Imp,
    LeftShift,
    RightShift,

    // ==========================
    // Control flow
    /// Jump to the line-number label in `op1`.
    GotoLineNum,
    /// Jump to the label in `op1`.
    GotoLabel,
    /// Jump to the label in `op2` when `op1` is non-zero.
    GotoLabelIf,
    /// Jump to the caller return label recorded by the innermost
    /// PUSH_RT_SCOPE.
    GotoCaller,
    /// Marks a branch target; `op1` is the label id. Each label id appears as
    /// exactly one LABEL's `op1` in a well-formed program.
    Label,
    /// Open a UDF call scope: `op1` is the UDF id, `op2` the caller's return
    /// label.
    PushRtScope,
    /// Close the innermost UDF call scope; `op1` is the UDF id.
    PopRtScope,
    /// Push `op1` onto the return-label stack (GOSUB).
    PushRetLabel,
    /// Pop the return-label stack and jump to it, or to the explicit
    /// line-number label in `op1` when present.
    Return,
    /// Halt execution.
    End,

    // ==========================
    // Parameter side channel
    /// Push `op1` onto the PARAM queue.
    Param1,
    /// Push `op1` then `op2` onto the PARAM queue.
    Param2,

    // ==========================
    // Statements
    /// Declare array storage for variable `op1`; PARAM1 pushes carry one
    /// extent per dimension, in order.
    Dim,
    /// Exchange the storage of `op1` and `op2` (same data type).
    Swap,
    /// Splice `op2` into string variable `op1`; PARAM2 carries (start, length
    /// or NULL).
    MidAssign,
    /// Buffer the value of `op1` for output.
    Print,
    /// Buffer the value of `op2` formatted with format string `op1`.
    PrintUsing,
    /// Flush buffered output to file number `op1`, or the console when NULL.
    Flush,
    /// Read into the variables pushed via PARAM1; `op1` is the prompt string
    /// or NULL, `op2` the file number or NULL.
    Input,
    /// Read one raw line into the string variable pushed via PARAM1; operands
    /// as for INPUT.
    LineInput,
    /// Append the constants pushed via PARAM1 to the DATA pool.
    Data,
    /// Read the next DATA constant into `op1`.
    Read,
    /// Rewind the DATA pool cursor.
    Restore,
    /// Open a file. PARAM2 pushes carry (filename, file number), (open mode,
    /// access mode), (lock mode, record length or NULL), in that order.
    Open,
    /// Close file number `op1`.
    Close,
    /// Close every open file.
    CloseAll,
    /// Map record-buffer fields: PARAM2 per part carries (variable, width);
    /// `op1` is the file number, `op2` the part count.
    Field,
    /// Read record `op2` (or the next when NULL) from file `op1` into its
    /// FIELD variables.
    GetRec,
    /// Write the FIELD variables to record `op2` (or the next) of file `op1`.
    PutRec,
    /// Seed the random generator from `op1`.
    Randomize,
    /// Seed the random generator from the wall clock.
    RandomizeTimer,
    /// Pause for `op1` milliseconds.
    Sleep,
    Cls,
    /// Create the display: PARAM2 carries (width, height); `op1` is the title
    /// string, `op2` a manual-repaint flag.
    Screen,
    Repaint,
    /// Set the draw colour; PARAM2 carries (r, g), `op1` is b.
    Color,
    /// Set pixel (`op1`, `op2`).
    Pset,
    /// Draw a line; PARAM2 pushes carry (x1, y1) then (x2, y2).
    DrawLine,
    /// Draw an ellipse at (`op1`, `op2`); PARAM2 carries (rx, ry).
    Circle,
    /// Flood fill from (`op1`, `op2`); PARAM2 carries (r, g), PARAM1 carries b.
    Paint,
    /// Run the turtle command string `op1`.
    Draw,
    /// Select font; `op1` name, `op2` style, PARAM1 carries size.
    Font,
    /// Draw string `op1`; PARAM2 carries (x, y).
    DrawStr,
    /// Capture screen rect into 2-D array `op1`; PARAM2 pushes carry (x1, y1)
    /// then (x2, y2).
    GraphicsGet,
    /// Blit 2-D array `op1`; PARAM2 carries (x, y).
    GraphicsPut,
    /// Fill array `op1` with the value of `op2`.
    ArrayFill,
    /// Copy array `op1` into same-shape array `op2`.
    ArrayCopy,
    /// Ranged 1-D copy from `op1` into `op2`; PARAM2 carries (src start, dst
    /// start), PARAM1 carries the element count.
    Array1dCopy,
    /// Sort 1-D array `op1` in place.
    Array1dSort,
    /// Shift the rows of 2-D array `op1` by `op2` positions.
    Array2dShiftHor,
    /// Shift the columns of 2-D array `op1` by `op2` positions.
    Array2dShiftVer,
    /// Load the audio file named by `op1` into string handle `op2`.
    LoadWav,
    PlayWav,
    StopWav,
    LoopWav,

    // ==========================
    // Built-in functions - the first two arguments ride in `op1`/`op2`, any
    // further arguments are pushed via PARAM1 ahead of the opcode, and
    // `result` is a temporary of the documented type
    Abs,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atn,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Log10,
    Sqr,
    Ceil,
    Floor,
    Round,
    Sgn,
    Cint,
    Clng,
    Csng,
    Cdbl,
    Fix,
    Int,
    Val,
    Asc,
    Chr,
    Str,
    Hex,
    Oct,
    Len,
    Left,
    Right,
    Mid,
    Instr,
    Space,
    StringOf,
    Ucase,
    Lcase,
    Ltrim,
    Rtrim,
    InputStr,
    Environ,
    Array1dMin,
    Array1dMax,
    Array1dMean,
    Array1dSum,
    Array1dStd,
    Array1dMedian,
    Array1dPct,
    Array1dBinSearch,
    Rnd,
    Timer,
    Eof,
}

impl Opcode {
    /// Which of (`op1`, `op2`) hold label ids for this opcode.
    ///
    /// The patch-completeness check uses this to verify that no branch
    /// operand is left NULL once lowering finishes.
    #[must_use]
    pub fn label_operands(self) -> (bool, bool) {
        match self {
            Self::GotoLineNum | Self::GotoLabel | Self::Label | Self::PushRetLabel => (true, false),
            Self::GotoLabelIf | Self::PushRtScope => (false, true),
            _ => (false, false),
        }
    }
}
