//! BASIC data types, the numeric promotion lattice, and suffix sigil rules.
//!
//! Every BASIC variable, temporary, and expression has exactly one [`DataType`].
//! Numeric types form an ordered promotion lattice `Int32 < Int64 < Float32 <
//! Float64`; `String` sits outside the lattice and never mixes implicitly with
//! numbers. A trailing sigil on a variable name (`%`, `&`, `@`, `!`, `#`, `$`)
//! pins the type; without a sigil, the first letter of the name is looked up in
//! the [`DefaultTypes`] table maintained by DEFINT/DEFLNG/DEFSNG/DEFDBL/DEFSTR.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// The closed set of BASIC data types.
///
/// Variant order is significant: for the numeric types it is the promotion
/// order, so [`DataType::join`] can compare discriminants directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, IntoStaticStr, Serialize, Deserialize,
)]
pub enum DataType {
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl DataType {
    /// Whether this type participates in the numeric promotion lattice.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        self != Self::String
    }

    /// Least upper bound of two numeric types in the promotion lattice.
    ///
    /// Returns `None` when either side is `String`: strings never join with
    /// anything, including other strings (string operators keep their own
    /// lowering rules).
    #[must_use]
    pub fn join(self, other: Self) -> Option<Self> {
        if self.is_numeric() && other.is_numeric() {
            Some(self.max(other))
        } else {
            None
        }
    }
}

/// A type sigil suffixed to a BASIC variable name.
///
/// `A%` and `A!` are distinct variables; the sigil is part of the variable's
/// identity, not a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeSuffix {
    /// `%` - Int32
    Percent,
    /// `&` - Int64
    Ampersand,
    /// `@` - Int64
    At,
    /// `!` - Float32
    Bang,
    /// `#` - Float64
    Hash,
    /// `$` - String
    Dollar,
}

impl TypeSuffix {
    /// The data type this sigil dictates.
    #[must_use]
    pub fn data_type(self) -> DataType {
        match self {
            Self::Percent => DataType::Int32,
            Self::Ampersand | Self::At => DataType::Int64,
            Self::Bang => DataType::Float32,
            Self::Hash => DataType::Float64,
            Self::Dollar => DataType::String,
        }
    }

    /// The source character for this sigil.
    #[must_use]
    pub fn sigil(self) -> char {
        match self {
            Self::Percent => '%',
            Self::Ampersand => '&',
            Self::At => '@',
            Self::Bang => '!',
            Self::Hash => '#',
            Self::Dollar => '$',
        }
    }
}

/// The 26-entry default-type table keyed by the first letter of a variable name.
///
/// Letters not touched by a DEFxxx statement default to `Float64`, the BASIC
/// convention for unsuffixed names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultTypes([DataType; 26]);

impl Default for DefaultTypes {
    fn default() -> Self {
        Self([DataType::Float64; 26])
    }
}

impl DefaultTypes {
    /// Assigns `data_type` to every letter in the inclusive range `from..=to`.
    ///
    /// Non-alphabetic endpoints and reversed ranges are ignored; the caller
    /// validates ranges and reports them as semantic errors.
    pub fn set_range(&mut self, from: char, to: char, data_type: DataType) {
        let (Some(lo), Some(hi)) = (letter_index(from), letter_index(to)) else {
            return;
        };
        if lo > hi {
            return;
        }
        for slot in &mut self.0[lo..=hi] {
            *slot = data_type;
        }
    }

    /// The default type for a bare (unsuffixed) variable name.
    ///
    /// Names that somehow start with a non-letter fall back to `Float64`.
    #[must_use]
    pub fn resolve(&self, bare_name: &str) -> DataType {
        bare_name
            .chars()
            .next()
            .and_then(letter_index)
            .map_or(DataType::Float64, |idx| self.0[idx])
    }
}

fn letter_index(c: char) -> Option<usize> {
    let up = c.to_ascii_uppercase();
    up.is_ascii_uppercase().then(|| up as usize - 'A' as usize)
}

/// A typed literal value, used to preinitialise compiler temporaries.
///
/// Literals in the source (numbers, strings, DATA constants, and the mode
/// codes of OPEN) become temporaries carrying one of these; the interpreter
/// seeds the temporary's storage cell from it before execution starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(String),
}

impl Value {
    /// The data type of this literal.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::Str(_) => DataType::String,
        }
    }
}
