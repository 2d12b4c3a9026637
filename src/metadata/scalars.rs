//! Scalar parsers: parse-tree leaves to host values.
//!
//! Each of these is a pure function over a parse-tree fragment. They fail
//! with a [`MetadataError`] naming the offending construct; nothing here
//! recovers or defaults silently.

use uuid::Uuid;

use crate::decl::{ByteOrder, DisplayBase};
use crate::error::MetadataError;

use super::ast::{AttributeValue, UnaryExpression, UnaryNumber};

fn invalid(attribute: &str, message: String) -> MetadataError {
    MetadataError::InvalidAttribute {
        attribute: attribute.to_string(),
        message,
    }
}

/// Decode an integer literal. An odd number of sign tokens negates.
pub fn parse_unary_integer(n: &UnaryNumber) -> Result<i64, MetadataError> {
    let magnitude = i64::from_str_radix(&n.digits, n.radix.base())
        .map_err(|e| invalid("integer literal", format!("{}: {e}", n.digits)))?;
    if n.signs % 2 == 1 {
        Ok(-magnitude)
    } else {
        Ok(magnitude)
    }
}

/// Decode an integer literal that must not be negative. Values up to
/// `u64::MAX` are accepted (packet sizes and magic numbers need the full
/// range).
pub fn parse_unary_u64(n: &UnaryNumber) -> Result<u64, MetadataError> {
    if n.signs % 2 == 1 {
        return Err(invalid(
            "integer literal",
            format!("-{} must not be negative", n.digits),
        ));
    }
    u64::from_str_radix(&n.digits, n.radix.base())
        .map_err(|e| invalid("integer literal", format!("{}: {e}", n.digits)))
}

/// The text of a string-valued expression, quotes stripped when the
/// quoted form was used.
pub fn parse_unary_string(e: &UnaryExpression) -> Result<String, MetadataError> {
    match e {
        UnaryExpression::Ident(s) | UnaryExpression::Quoted(s) => Ok(s.clone()),
        UnaryExpression::Number(n) => Err(invalid(
            "string",
            format!("expected a string, found number {}", n.digits),
        )),
    }
}

/// Byte order tokens. `native` resolves to the trace's own order, which
/// itself defaults to host order only as a last resort.
pub fn parse_byte_order(
    e: &UnaryExpression,
    trace_order: Option<ByteOrder>,
) -> Result<Option<ByteOrder>, MetadataError> {
    let token = parse_unary_string(e).map_err(|_| {
        invalid("byte_order", "expected le, be, network or native".to_string())
    })?;
    match token.as_str() {
        "le" => Ok(Some(ByteOrder::Little)),
        "be" | "network" => Ok(Some(ByteOrder::Big)),
        // None keeps the declaration eligible for the repair pass.
        "native" => Ok(trace_order),
        other => Err(invalid("byte_order", format!("unknown token {other}"))),
    }
}

/// Alignment in bits: a positive power of two, nothing else.
pub fn parse_alignment(n: &UnaryNumber) -> Result<u64, MetadataError> {
    let value = parse_unary_integer(n)?;
    if value <= 0 || !(value as u64).is_power_of_two() {
        return Err(invalid("alignment", format!("{value} is not a positive power of two")));
    }
    Ok(value as u64)
}

/// Display base: a radix number or one of the symbolic tokens.
pub fn parse_base(e: &UnaryExpression) -> Result<DisplayBase, MetadataError> {
    match e {
        UnaryExpression::Number(n) => match parse_unary_integer(n)? {
            2 => Ok(DisplayBase::Binary),
            8 => Ok(DisplayBase::Octal),
            10 => Ok(DisplayBase::Decimal),
            16 => Ok(DisplayBase::Hexadecimal),
            other => Err(invalid("base", format!("unknown radix {other}"))),
        },
        UnaryExpression::Ident(s) | UnaryExpression::Quoted(s) => match s.as_str() {
            "decimal" | "dec" | "d" | "i" | "u" => Ok(DisplayBase::Decimal),
            "hexadecimal" | "hex" | "x" | "X" | "p" => Ok(DisplayBase::Hexadecimal),
            "octal" | "oct" | "o" => Ok(DisplayBase::Octal),
            "binary" | "bin" | "b" => Ok(DisplayBase::Binary),
            other => Err(invalid("base", format!("unknown token {other}"))),
        },
    }
}

/// Bit width: a positive integer.
pub fn parse_size(n: &UnaryNumber) -> Result<u32, MetadataError> {
    let value = parse_unary_integer(n)?;
    if value <= 0 {
        return Err(invalid("size", format!("{value} is not positive")));
    }
    Ok(value as u32)
}

/// Booleans: `true`/`1` and `false`/`0` only.
pub fn parse_boolean(e: &UnaryExpression) -> Result<bool, MetadataError> {
    match e {
        UnaryExpression::Ident(s) => match s.as_str() {
            "true" | "TRUE" => Ok(true),
            "false" | "FALSE" => Ok(false),
            other => Err(invalid("boolean", format!("unknown token {other}"))),
        },
        UnaryExpression::Number(n) => match parse_unary_integer(n)? {
            1 => Ok(true),
            0 => Ok(false),
            other => Err(invalid("boolean", format!("{other} is not a boolean"))),
        },
        UnaryExpression::Quoted(s) => {
            Err(invalid("boolean", format!("quoted value \"{s}\"")))
        }
    }
}

/// Canonical UUID string.
pub fn parse_uuid(value: &str) -> Result<Uuid, MetadataError> {
    Uuid::parse_str(value).map_err(|_| MetadataError::MalformedUuid {
        value: value.to_string(),
    })
}

/// The clock name out of a `map = clock.<name>.value` attribute.
pub fn parse_clock_map(value: &AttributeValue) -> Result<String, MetadataError> {
    if let AttributeValue::Path(parts) = value {
        if parts.len() == 3 && parts[0] == "clock" && parts[2] == "value" {
            return Ok(parts[1].clone());
        }
    }
    Err(invalid(
        "map",
        "expected clock.<name>.value".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ast::Radix;

    fn num(radix: Radix, digits: &str, signs: usize) -> UnaryNumber {
        UnaryNumber {
            radix,
            digits: digits.to_string(),
            signs,
        }
    }

    #[test]
    fn test_integer_radixes_round_trip() {
        assert_eq!(parse_unary_integer(&num(Radix::Decimal, "42", 0)).unwrap(), 42);
        assert_eq!(parse_unary_integer(&num(Radix::Hexadecimal, "2A", 0)).unwrap(), 42);
        assert_eq!(parse_unary_integer(&num(Radix::Octal, "52", 0)).unwrap(), 42);
    }

    #[test]
    fn test_sign_parity() {
        assert_eq!(parse_unary_integer(&num(Radix::Decimal, "7", 1)).unwrap(), -7);
        assert_eq!(parse_unary_integer(&num(Radix::Decimal, "7", 2)).unwrap(), 7);
        assert_eq!(parse_unary_integer(&num(Radix::Decimal, "7", 3)).unwrap(), -7);
    }

    #[test]
    fn test_garbage_integer_fails() {
        assert!(parse_unary_integer(&num(Radix::Decimal, "4x2", 0)).is_err());
        assert!(parse_unary_integer(&num(Radix::Octal, "9", 0)).is_err());
    }

    #[test]
    fn test_u64_full_range() {
        assert_eq!(
            parse_unary_u64(&num(Radix::Hexadecimal, "FFFFFFFFFFFFFFFF", 0)).unwrap(),
            u64::MAX
        );
        assert!(parse_unary_u64(&num(Radix::Decimal, "1", 1)).is_err());
    }

    #[test]
    fn test_byte_order_tokens() {
        let ident = |s: &str| UnaryExpression::Ident(s.to_string());
        assert_eq!(
            parse_byte_order(&ident("le"), None).unwrap(),
            Some(ByteOrder::Little)
        );
        assert_eq!(
            parse_byte_order(&ident("be"), None).unwrap(),
            Some(ByteOrder::Big)
        );
        assert_eq!(
            parse_byte_order(&ident("network"), None).unwrap(),
            Some(ByteOrder::Big)
        );
        assert_eq!(parse_byte_order(&ident("native"), None).unwrap(), None);
        assert_eq!(
            parse_byte_order(&ident("native"), Some(ByteOrder::Big)).unwrap(),
            Some(ByteOrder::Big)
        );
        assert!(parse_byte_order(&ident("middle"), None).is_err());
    }

    #[test]
    fn test_alignment_power_of_two_only() {
        assert_eq!(parse_alignment(&num(Radix::Decimal, "1", 0)).unwrap(), 1);
        assert_eq!(parse_alignment(&num(Radix::Decimal, "8", 0)).unwrap(), 8);
        assert_eq!(parse_alignment(&num(Radix::Decimal, "4096", 0)).unwrap(), 4096);
        assert!(parse_alignment(&num(Radix::Decimal, "0", 0)).is_err());
        assert!(parse_alignment(&num(Radix::Decimal, "3", 0)).is_err());
        assert!(parse_alignment(&num(Radix::Decimal, "6", 0)).is_err());
        assert!(parse_alignment(&num(Radix::Decimal, "8", 1)).is_err());
    }

    #[test]
    fn test_base_tokens() {
        let ident = |s: &str| UnaryExpression::Ident(s.to_string());
        assert_eq!(parse_base(&ident("hex")).unwrap(), DisplayBase::Hexadecimal);
        assert_eq!(parse_base(&ident("x")).unwrap(), DisplayBase::Hexadecimal);
        assert_eq!(parse_base(&ident("u")).unwrap(), DisplayBase::Decimal);
        assert_eq!(parse_base(&ident("oct")).unwrap(), DisplayBase::Octal);
        assert_eq!(parse_base(&ident("b")).unwrap(), DisplayBase::Binary);
        assert_eq!(
            parse_base(&UnaryExpression::Number(num(Radix::Decimal, "16", 0))).unwrap(),
            DisplayBase::Hexadecimal
        );
        assert!(parse_base(&ident("nonary")).is_err());
        assert!(parse_base(&UnaryExpression::Number(num(Radix::Decimal, "3", 0))).is_err());
    }

    #[test]
    fn test_size_positive_only() {
        assert_eq!(parse_size(&num(Radix::Decimal, "27", 0)).unwrap(), 27);
        assert!(parse_size(&num(Radix::Decimal, "0", 0)).is_err());
        assert!(parse_size(&num(Radix::Decimal, "5", 1)).is_err());
    }

    #[test]
    fn test_boolean_tokens() {
        let ident = |s: &str| UnaryExpression::Ident(s.to_string());
        assert!(parse_boolean(&ident("true")).unwrap());
        assert!(!parse_boolean(&ident("false")).unwrap());
        assert!(parse_boolean(&UnaryExpression::Number(num(Radix::Decimal, "1", 0))).unwrap());
        assert!(!parse_boolean(&UnaryExpression::Number(num(Radix::Decimal, "0", 0))).unwrap());
        assert!(parse_boolean(&ident("yes")).is_err());
        assert!(parse_boolean(&UnaryExpression::Number(num(Radix::Decimal, "2", 0))).is_err());
    }

    #[test]
    fn test_uuid() {
        assert!(parse_uuid("2a6422d0-6cee-11e0-8c08-cb07d7b3a564").is_ok());
        assert!(parse_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_clock_map() {
        let path = AttributeValue::Path(vec![
            "clock".to_string(),
            "monotonic".to_string(),
            "value".to_string(),
        ]);
        assert_eq!(parse_clock_map(&path).unwrap(), "monotonic");
        let bad = AttributeValue::Path(vec!["clock".to_string(), "x".to_string()]);
        assert!(parse_clock_map(&bad).is_err());
    }
}
