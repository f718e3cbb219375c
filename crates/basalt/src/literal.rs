//! Numeric literal parsing.
//!
//! The tree keeps numeric literals as source text; this module interprets the
//! base prefix (`&H` hex, `&O` or bare `&` octal, otherwise decimal) and the
//! trailing type sigil, producing a typed [`Value`]. Malformed or out-of-range
//! input is a semantic error carrying the original token.
//!
//! Sigil rules: `%` forces Int32, `@`/`&` force Int64, `!` forces Float32,
//! `#` forces Float64. An unsuffixed integer is Int32 when it fits and Int64
//! otherwise; an unsuffixed float is Float64.

use crate::{
    datatype::Value,
    error::{CompileError, CompileResult, ErrorKind},
    tree::CodeRange,
};

/// Integer base selected by the literal's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    Octal,
    Decimal,
    Hex,
}

impl Base {
    fn radix(self) -> u32 {
        match self {
            Self::Octal => 8,
            Self::Decimal => 10,
            Self::Hex => 16,
        }
    }
}

/// Parses one numeric literal token into a typed value.
pub fn parse_numeric(text: &str, range: CodeRange) -> CompileResult<Value> {
    let bad = || CompileError::semantic(ErrorKind::BadNumber, range, "malformed number").with_excerpt(text);

    let (base, body) = split_base(text);
    let (body, suffix) = split_suffix(body);
    if body.is_empty() {
        return Err(bad());
    }

    if base == Base::Decimal && is_float(body) {
        let value: f64 = body.parse().map_err(|_| bad())?;
        return match suffix {
            Some('!') => Ok(Value::Float32(value as f32)),
            Some('#') | None => Ok(Value::Float64(value)),
            Some(_) => Err(bad()),
        };
    }

    let value = i64::from_str_radix(body, base.radix())
        .map_err(|_| CompileError::semantic(ErrorKind::BadNumber, range, "number out of range").with_excerpt(text))?;
    match suffix {
        Some('%') => i32::try_from(value).map(Value::Int32).map_err(|_| {
            CompileError::semantic(ErrorKind::BadNumber, range, "number out of 32-bit range").with_excerpt(text)
        }),
        Some('@' | '&') => Ok(Value::Int64(value)),
        Some('#') => Ok(Value::Float64(value as f64)),
        Some('!') => Ok(Value::Float32(value as f32)),
        None => Ok(i32::try_from(value).map_or(Value::Int64(value), Value::Int32)),
        Some(_) => Err(bad()),
    }
}

/// Strips the base prefix, if any, and reports the selected base.
fn split_base(text: &str) -> (Base, &str) {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'&' {
        match bytes[1] {
            b'H' | b'h' => return (Base::Hex, &text[2..]),
            b'O' | b'o' => return (Base::Octal, &text[2..]),
            _ => return (Base::Octal, &text[1..]),
        }
    }
    (Base::Decimal, text)
}

/// Splits a trailing type sigil off the literal body.
fn split_suffix(text: &str) -> (&str, Option<char>) {
    match text.as_bytes().last() {
        Some(b @ (b'%' | b'@' | b'&' | b'!' | b'#')) => (&text[..text.len() - 1], Some(char::from(*b))),
        _ => (text, None),
    }
}

/// Whether a decimal body is a float literal (decimal point or exponent).
fn is_float(body: &str) -> bool {
    body.bytes().any(|b| matches!(b, b'.' | b'e' | b'E'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::DataType;

    fn parse(text: &str) -> Value {
        parse_numeric(text, CodeRange::default()).expect("literal should parse")
    }

    #[test]
    fn decimal_integers() {
        assert_eq!(parse("0"), Value::Int32(0));
        assert_eq!(parse("42"), Value::Int32(42));
        assert_eq!(parse("2147483647"), Value::Int32(i32::MAX));
        // one past i32::MAX widens automatically
        assert_eq!(parse("2147483648"), Value::Int64(2_147_483_648));
    }

    #[test]
    fn suffixes_force_types() {
        assert_eq!(parse("42%"), Value::Int32(42));
        assert_eq!(parse("42@"), Value::Int64(42));
        assert_eq!(parse("42&"), Value::Int64(42));
        assert_eq!(parse("42#"), Value::Float64(42.0));
        assert_eq!(parse("42!"), Value::Float32(42.0));
        assert_eq!(parse("3!"), Value::Float32(3.0));
    }

    #[test]
    fn hex_and_octal() {
        assert_eq!(parse("&HFF"), Value::Int32(255));
        assert_eq!(parse("&hff"), Value::Int32(255));
        assert_eq!(parse("&O17"), Value::Int32(15));
        assert_eq!(parse("&17"), Value::Int32(15));
        assert_eq!(parse("&H100000000"), Value::Int64(0x1_0000_0000));
    }

    #[test]
    fn floats() {
        assert_eq!(parse("2.5"), Value::Float64(2.5));
        assert_eq!(parse("2.5#"), Value::Float64(2.5));
        assert_eq!(parse("2.5!"), Value::Float32(2.5));
        assert_eq!(parse("1e3"), Value::Float64(1000.0));
        assert_eq!(parse("1.5E-2").data_type(), DataType::Float64);
    }

    #[test]
    fn malformed_input_is_rejected() {
        for text in ["", "&", "&H", "ZZ", "1.2.3", "42%%", "9223372036854775808", "2147483648%", "2.5%"] {
            let err = parse_numeric(text, CodeRange::default()).expect_err(text);
            assert_eq!(err.kind(), ErrorKind::BadNumber, "{text}");
            assert_eq!(err.excerpt(), text);
        }
    }
}
