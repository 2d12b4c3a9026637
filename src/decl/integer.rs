//! Integer declarations.

use crate::error::MetadataError;

use super::{ByteOrder, Encoding};

/// Display radix for an integer field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayBase {
    Binary,
    Octal,
    #[default]
    Decimal,
    Hexadecimal,
}

/// A fixed-width integer field.
///
/// `length` is the width in bits and may be anything from 1 to 64; fields
/// are not required to be byte aligned or byte sized. `alignment` is in
/// bits and is always a power of two.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegerDeclaration {
    pub length: u32,
    pub signed: bool,
    pub base: DisplayBase,
    pub byte_order: ByteOrder,
    pub encoding: Encoding,
    pub alignment: u64,
    /// Name of the clock this integer carries values of, from the TSDL
    /// `map = clock.<name>.value` attribute. Timestamp fields use this.
    pub clock: Option<String>,
    /// True when the byte order came from `native`/unset and is therefore
    /// subject to the one-time repair pass once the trace order is known.
    pub(crate) native_order: bool,
}

impl IntegerDeclaration {
    pub fn new(
        length: u32,
        signed: bool,
        base: DisplayBase,
        byte_order: Option<ByteOrder>,
        encoding: Encoding,
        alignment: u64,
        clock: Option<String>,
    ) -> Result<Self, MetadataError> {
        if length == 0 || length > 64 {
            return Err(MetadataError::InvalidAttribute {
                attribute: "size".to_string(),
                message: format!("integer size must be between 1 and 64 bits, got {length}"),
            });
        }
        let alignment = if alignment == 0 { 1 } else { alignment };
        if !alignment.is_power_of_two() {
            return Err(MetadataError::InvalidAttribute {
                attribute: "alignment".to_string(),
                message: format!("{alignment} is not a power of two"),
            });
        }
        Ok(IntegerDeclaration {
            length,
            signed,
            base,
            byte_order: byte_order.unwrap_or_else(ByteOrder::host),
            encoding,
            alignment,
            clock,
            native_order: byte_order.is_none(),
        })
    }

    /// Rebuild with a corrected byte order (repair pass only).
    pub(crate) fn with_byte_order(&self, order: ByteOrder) -> Self {
        let mut fixed = self.clone();
        fixed.byte_order = order;
        fixed.native_order = false;
        fixed
    }

    /// Smallest value representable in this container.
    pub fn min_value(&self) -> i64 {
        if !self.signed {
            0
        } else if self.length == 64 {
            i64::MIN
        } else {
            -(1i64 << (self.length - 1))
        }
    }

    /// Largest value representable in this container, saturated to `i64`
    /// for unsigned 64-bit fields.
    pub fn max_value(&self) -> i64 {
        if self.signed {
            if self.length == 64 {
                i64::MAX
            } else {
                (1i64 << (self.length - 1)) - 1
            }
        } else if self.length >= 64 {
            i64::MAX
        } else {
            (1i64 << self.length) - 1
        }
    }

    /// True for 8-bit character-like integers that carry text.
    pub fn is_character(&self) -> bool {
        self.length == 8 && self.encoding != Encoding::None
    }
}
