//! The declaration model: metadata-time descriptions of how to decode bits.
//!
//! Every TSDL type becomes one variant of [`Declaration`]. Declarations are
//! built once during metadata parsing, validated at construction, and
//! immutable afterwards; they are shared via `Arc` wherever a scope or a
//! composite type refers to them. The one sanctioned "mutation" is the
//! byte-order repair pass, which is a pure transform producing corrected
//! declarations that replace the stale ones in their owning scope.

pub mod enumeration;
pub mod event_header;
pub mod float;
pub mod integer;
pub mod sequence;
pub mod string;
pub mod structure;
pub mod variant;

use std::sync::Arc;

pub use enumeration::{EnumDeclaration, EnumRange};
pub use event_header::{
    classify_event_header, EventHeaderDeclaration, EventHeaderKind, COMPACT_ID_BITS,
    COMPACT_TIMESTAMP_BITS, EXTENDED_ID_BITS, EXTENDED_TIMESTAMP_BITS, LARGE_ID_BITS,
    LARGE_TIMESTAMP_BITS,
};
pub use float::FloatDeclaration;
pub use integer::{DisplayBase, IntegerDeclaration};
pub use sequence::{ArrayDeclaration, FieldPath, PathRoot, SequenceDeclaration};
pub use string::StringDeclaration;
pub use structure::{StructDeclaration, StructField};
pub use variant::VariantDeclaration;

/// Byte order of a scalar field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// The byte order of the machine running the reader. Only ever used as
    /// a last-resort default for `native` before the trace order is known.
    pub fn host() -> ByteOrder {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteOrder::Big => write!(f, "be"),
            ByteOrder::Little => write!(f, "le"),
        }
    }
}

/// Character encoding of strings and of integer fields used as characters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    None,
    Utf8,
    Ascii,
}

/// A typed description of how to decode one value from a bit cursor.
#[derive(Clone, Debug, PartialEq)]
pub enum Declaration {
    Integer(IntegerDeclaration),
    Float(FloatDeclaration),
    Enum(EnumDeclaration),
    String(StringDeclaration),
    Struct(StructDeclaration),
    Variant(VariantDeclaration),
    Array(ArrayDeclaration),
    Sequence(SequenceDeclaration),
    /// The recognized LTTng compact/large event-header fast path. The
    /// compact and large shapes share a decode strategy and differ only in
    /// field widths, so they share a variant with a kind discriminant.
    EventHeader(EventHeaderDeclaration),
}

impl Declaration {
    /// Alignment of this declaration in bits. Always a power of two.
    pub fn alignment(&self) -> u64 {
        match self {
            Declaration::Integer(d) => d.alignment,
            Declaration::Float(d) => d.alignment,
            Declaration::Enum(d) => d.container.alignment,
            Declaration::String(_) => 8,
            Declaration::Struct(d) => d.alignment,
            Declaration::Variant(_) => 1,
            Declaration::Array(d) => d.element.alignment(),
            Declaration::Sequence(d) => d.element.alignment(),
            Declaration::EventHeader(d) => d.alignment(),
        }
    }

    /// Upper bound on the decoded size in bits, when one exists. Strings,
    /// sequences and variants have no static bound.
    pub fn maximum_size(&self) -> Option<u64> {
        match self {
            Declaration::Integer(d) => Some(d.length as u64),
            Declaration::Float(d) => Some(d.total_size() as u64),
            Declaration::Enum(d) => Some(d.container.length as u64),
            Declaration::String(_) => None,
            Declaration::Struct(d) => {
                let mut total = 0u64;
                for field in &d.fields {
                    let sz = field.declaration.maximum_size()?;
                    let align = field.declaration.alignment();
                    total = total.div_ceil(align) * align + sz;
                }
                Some(total)
            }
            Declaration::Variant(_) => None,
            Declaration::Array(d) => {
                let elem = d.element.maximum_size()?;
                let align = d.element.alignment();
                let stride = elem.div_ceil(align) * align;
                Some(stride * d.length.saturating_sub(1) + elem)
            }
            Declaration::Sequence(_) => None,
            Declaration::EventHeader(d) => Some(d.maximum_size()),
        }
    }

    pub fn as_integer(&self) -> Option<&IntegerDeclaration> {
        match self {
            Declaration::Integer(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDeclaration> {
        match self {
            Declaration::Enum(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructDeclaration> {
        match self {
            Declaration::Struct(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&VariantDeclaration> {
        match self {
            Declaration::Variant(d) => Some(d),
            _ => None,
        }
    }

    /// Pure byte-order repair: returns the same declaration with every
    /// scalar whose order was left to `native` rebuilt with `order`.
    /// Explicit `be`/`le` attributes are never overridden. Returns `None`
    /// when nothing needed fixing, so callers can skip scope replacement.
    pub fn repaired(&self, order: ByteOrder) -> Option<Declaration> {
        match self {
            Declaration::Integer(d) => {
                if d.native_order && d.byte_order != order {
                    Some(Declaration::Integer(d.with_byte_order(order)))
                } else {
                    None
                }
            }
            Declaration::Float(d) => {
                if d.native_order && d.byte_order != order {
                    Some(Declaration::Float(d.with_byte_order(order)))
                } else {
                    None
                }
            }
            Declaration::Enum(d) => {
                if d.container.native_order && d.container.byte_order != order {
                    let mut fixed = d.clone();
                    fixed.container = d.container.with_byte_order(order);
                    Some(Declaration::Enum(fixed))
                } else {
                    None
                }
            }
            Declaration::Struct(d) => {
                let mut changed = false;
                let mut fields = Vec::with_capacity(d.fields.len());
                for field in &d.fields {
                    match field.declaration.repaired(order) {
                        Some(fixed) => {
                            changed = true;
                            fields.push(StructField {
                                name: field.name.clone(),
                                declaration: Arc::new(fixed),
                            });
                        }
                        None => fields.push(field.clone()),
                    }
                }
                if changed {
                    let mut fixed = d.clone();
                    fixed.fields = fields;
                    Some(Declaration::Struct(fixed))
                } else {
                    None
                }
            }
            Declaration::Variant(d) => {
                let mut changed = false;
                let mut fields = Vec::with_capacity(d.fields.len());
                for (name, decl) in &d.fields {
                    match decl.repaired(order) {
                        Some(fixed) => {
                            changed = true;
                            fields.push((name.clone(), Arc::new(fixed)));
                        }
                        None => fields.push((name.clone(), decl.clone())),
                    }
                }
                if changed {
                    let mut fixed = d.clone();
                    fixed.fields = fields;
                    Some(Declaration::Variant(fixed))
                } else {
                    None
                }
            }
            Declaration::Array(d) => d.element.repaired(order).map(|fixed| {
                Declaration::Array(ArrayDeclaration {
                    length: d.length,
                    element: Arc::new(fixed),
                })
            }),
            Declaration::Sequence(d) => d.element.repaired(order).map(|fixed| {
                Declaration::Sequence(SequenceDeclaration {
                    length_path: d.length_path.clone(),
                    element: Arc::new(fixed),
                })
            }),
            Declaration::String(_) | Declaration::EventHeader(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_maximum_size_accounts_for_padding() {
        let byte = IntegerDeclaration::new(8, false, DisplayBase::Decimal, None, Encoding::None, 8, None)
            .unwrap();
        let word =
            IntegerDeclaration::new(32, false, DisplayBase::Decimal, None, Encoding::None, 32, None)
                .unwrap();
        let s = StructDeclaration::new(
            1,
            vec![
                StructField::new("a", Arc::new(Declaration::Integer(byte))),
                StructField::new("b", Arc::new(Declaration::Integer(word))),
            ],
        );
        // 8 bits, pad to 32, then 32 bits.
        assert_eq!(Declaration::Struct(s).maximum_size(), Some(64));
    }

    #[test]
    fn test_repair_leaves_explicit_order_alone() {
        let explicit = IntegerDeclaration::new(
            32,
            false,
            DisplayBase::Decimal,
            Some(ByteOrder::Little),
            Encoding::None,
            8,
            None,
        )
        .unwrap();
        assert!(Declaration::Integer(explicit).repaired(ByteOrder::Big).is_none());
    }
}
