//! Compile-time errors produced by the lowering pass.
//!
//! Lowering aborts on the first semantic error; there is no recovery within a
//! single compilation. Each error carries its [`ErrorKind`], the source range
//! of the offending construct, the source excerpt when the compiler was given
//! the original text, and a human-readable reason.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::tree::CodeRange;

/// Result type alias for operations that can fail with a [`CompileError`].
pub type CompileResult<T> = Result<T, CompileError>;

/// The kinds of error the compiler can report.
///
/// The `Display` form is the SCREAMING_SNAKE_CASE name, which is what error
/// listings and tests match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Incompatible mixing of string and numeric operands, or mismatched
    /// SWAP/MID$ operand types.
    DataTypeMismatch,
    /// Writing to a user-defined function.
    BadAssignment,
    /// Wrong entity kind or malformed argument (expected variable, array of a
    /// specific rank, known function, valid letter range, ...).
    BadArgument,
    /// Subscripts applied to a scalar variable.
    ScalarVariableCannotBeIndexed,
    /// Actual parameter count does not match a DEF FN declaration.
    InsufficientUdfArgs,
    ForWithoutNext,
    NextWithoutFor,
    WhileWithoutWend,
    WendWithoutWhile,
    /// `ELSE BEGIN` with no open `IF ... THEN BEGIN`.
    MismatchedElseBegin,
    /// `END IF` with no open `IF ... THEN BEGIN`, or an unclosed one at EOF.
    MismatchedEndIf,
    /// Use of an array or string target before DIM/LET defined it.
    NotDefined,
    /// Malformed or out-of-range numeric literal.
    BadNumber,
    /// Control structures nested beyond [`crate::lower::MAX_CONTROL_DEPTH`].
    TooDeeplyNested,
    /// Internal consistency violation; indicates a compiler bug, not a
    /// problem with the source program.
    Internal,
}

/// A semantic or internal error raised while lowering a parse tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileError {
    kind: ErrorKind,
    range: CodeRange,
    excerpt: String,
    message: String,
}

impl CompileError {
    /// Creates a semantic error with no source excerpt attached yet.
    #[must_use]
    pub fn semantic(kind: ErrorKind, range: CodeRange, message: impl Into<String>) -> Self {
        Self {
            kind,
            range,
            excerpt: String::new(),
            message: message.into(),
        }
    }

    /// Creates an internal error; these indicate compiler bugs.
    #[must_use]
    pub fn internal(range: CodeRange, message: impl Into<String>) -> Self {
        Self::semantic(ErrorKind::Internal, range, message)
    }

    /// Attaches the offending source excerpt, replacing any previous one.
    #[must_use]
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn range(&self) -> CodeRange {
        self.range
    }

    /// The offending source substring, empty when the compiler was not given
    /// the source text.
    #[must_use]
    pub fn excerpt(&self) -> &str {
        &self.excerpt
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}:{}: {}",
            self.kind, self.range.start.row, self.range.start.column, self.message
        )?;
        if !self.excerpt.is_empty() {
            write!(f, ": {}", self.excerpt)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}
