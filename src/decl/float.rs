//! Floating-point declarations.

use crate::error::MetadataError;

use super::ByteOrder;

/// An IEEE 754-style float field described by exponent and mantissa widths.
///
/// TSDL counts the mantissa width as `mant_dig`, which includes the implied
/// leading digit, so a binary32 is `exp_dig = 8, mant_dig = 24` and a
/// binary64 is `exp_dig = 11, mant_dig = 53`. Only those two shapes decode
/// to finite values; any other declared shape decodes to NaN.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatDeclaration {
    pub exponent: u32,
    pub mantissa: u32,
    pub byte_order: ByteOrder,
    pub alignment: u64,
    pub(crate) native_order: bool,
}

impl FloatDeclaration {
    pub fn new(
        exponent: u32,
        mantissa: u32,
        byte_order: Option<ByteOrder>,
        alignment: u64,
    ) -> Result<Self, MetadataError> {
        if exponent + mantissa == 0 {
            return Err(MetadataError::InvalidAttribute {
                attribute: "float size".to_string(),
                message: "exp_dig + mant_dig must be nonzero".to_string(),
            });
        }
        // Default rule (see DESIGN.md): unset alignment is 1, except a
        // byte-divisible float defaults to byte alignment.
        let alignment = if alignment == 0 {
            if (exponent + mantissa) % 8 == 0 {
                8
            } else {
                1
            }
        } else {
            alignment
        };
        if !alignment.is_power_of_two() {
            return Err(MetadataError::InvalidAttribute {
                attribute: "alignment".to_string(),
                message: format!("{alignment} is not a power of two"),
            });
        }
        Ok(FloatDeclaration {
            exponent,
            mantissa,
            byte_order: byte_order.unwrap_or_else(ByteOrder::host),
            alignment,
            native_order: byte_order.is_none(),
        })
    }

    /// Total width in bits.
    pub fn total_size(&self) -> u32 {
        self.exponent + self.mantissa
    }

    pub(crate) fn with_byte_order(&self, order: ByteOrder) -> Self {
        let mut fixed = self.clone();
        fixed.byte_order = order;
        fixed.native_order = false;
        fixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_rejected() {
        assert!(FloatDeclaration::new(0, 0, None, 0).is_err());
    }

    #[test]
    fn test_default_alignment_rule() {
        // binary32: byte divisible, defaults to byte alignment.
        let f = FloatDeclaration::new(8, 24, None, 0).unwrap();
        assert_eq!(f.alignment, 8);
        // An odd 17-bit shape defaults to 1.
        let f = FloatDeclaration::new(5, 12, None, 0).unwrap();
        assert_eq!(f.alignment, 1);
        // An explicit alignment wins.
        let f = FloatDeclaration::new(8, 24, None, 32).unwrap();
        assert_eq!(f.alignment, 32);
    }

    #[test]
    fn test_total_size() {
        assert_eq!(FloatDeclaration::new(11, 53, None, 0).unwrap().total_size(), 64);
    }
}
