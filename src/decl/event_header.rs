//! The LTTng compact/large event-header fast path.
//!
//! LTTng emits one of two well-known event-header layouts. Recognizing
//! them lets the reader decode id + timestamp directly instead of walking
//! a generic struct/variant definition tree for every event. Recognition
//! is an explicit structural predicate over the parsed struct declaration,
//! so the exact shapes that trigger the rewrite are pinned down by tests.

use super::{ByteOrder, Declaration, EnumDeclaration, IntegerDeclaration, StructDeclaration};

pub const COMPACT_ID_BITS: u32 = 5;
pub const COMPACT_TIMESTAMP_BITS: u32 = 27;
pub const LARGE_ID_BITS: u32 = 16;
pub const LARGE_TIMESTAMP_BITS: u32 = 32;
pub const EXTENDED_ID_BITS: u32 = 32;
pub const EXTENDED_TIMESTAMP_BITS: u32 = 64;

/// Marker value in the compact id enum selecting the extended shape.
pub const COMPACT_EXTENDED_MARKER: u64 = 31;
/// Marker value in the large id enum selecting the extended shape.
pub const LARGE_EXTENDED_MARKER: u64 = 65535;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventHeaderKind {
    Compact,
    Large,
}

/// A recognized fast-path event header.
#[derive(Clone, Debug, PartialEq)]
pub struct EventHeaderDeclaration {
    pub kind: EventHeaderKind,
    pub byte_order: ByteOrder,
}

impl EventHeaderDeclaration {
    pub fn alignment(&self) -> u64 {
        8
    }

    /// Width of the id enum that opens the header.
    pub fn id_bits(&self) -> u32 {
        match self.kind {
            EventHeaderKind::Compact => COMPACT_ID_BITS,
            EventHeaderKind::Large => LARGE_ID_BITS,
        }
    }

    /// Width of the truncated timestamp in the non-extended shape.
    pub fn compact_timestamp_bits(&self) -> u32 {
        match self.kind {
            EventHeaderKind::Compact => COMPACT_TIMESTAMP_BITS,
            EventHeaderKind::Large => LARGE_TIMESTAMP_BITS,
        }
    }

    /// The id value that switches to the extended shape.
    pub fn extended_marker(&self) -> u64 {
        match self.kind {
            EventHeaderKind::Compact => COMPACT_EXTENDED_MARKER,
            EventHeaderKind::Large => LARGE_EXTENDED_MARKER,
        }
    }

    /// Worst-case decoded size: the extended shape.
    pub fn maximum_size(&self) -> u64 {
        let id = self.id_bits() as u64;
        let id_padded = id.div_ceil(8) * 8;
        id_padded + EXTENDED_ID_BITS as u64 + EXTENDED_TIMESTAMP_BITS as u64
    }
}

/// Decide whether `s` is one of the two recognized header shapes.
///
/// The shape checked for, with `W` = 5/27 (compact) or 16/32 (large):
///
/// ```text
/// struct {
///     enum : uintW_t { compact = 0 ... marker-1, extended = marker } id;
///     variant <id> {
///         struct { uintT_t timestamp; } compact;
///         struct { uint32_t id; uint64_t timestamp; } extended;
///     } v;
/// } align(8);
/// ```
pub fn classify_event_header(s: &StructDeclaration) -> Option<EventHeaderDeclaration> {
    if s.fields.len() != 2 || s.alignment != 8 {
        return None;
    }
    let id_field = &s.fields[0];
    let v_field = &s.fields[1];
    if id_field.name != "id" || v_field.name != "v" {
        return None;
    }

    let id_enum = id_field.declaration.as_enum()?;
    let kind = match (id_enum.container.signed, id_enum.container.length) {
        (false, COMPACT_ID_BITS) => EventHeaderKind::Compact,
        (false, LARGE_ID_BITS) => EventHeaderKind::Large,
        _ => return None,
    };
    let header = EventHeaderDeclaration {
        kind,
        byte_order: id_enum.container.byte_order,
    };
    if id_enum.query(header.extended_marker() as i64) != Some("extended") {
        return None;
    }
    if !id_enum.labels().any(|l| l == "compact") {
        return None;
    }

    let variant = v_field.declaration.as_variant()?;
    if variant.tag.as_deref() != Some("id") || variant.fields.len() != 2 {
        return None;
    }
    let compact = variant.field("compact")?.as_struct()?;
    let extended = variant.field("extended")?.as_struct()?;

    if !is_timestamp_only(compact, header.compact_timestamp_bits(), header.byte_order) {
        return None;
    }
    if !is_extended_shape(extended, header.byte_order) {
        return None;
    }
    Some(header)
}

fn is_unsigned_int(decl: &Declaration, bits: u32, order: ByteOrder) -> bool {
    matches!(
        decl.as_integer(),
        Some(IntegerDeclaration {
            length,
            signed: false,
            byte_order,
            ..
        }) if *length == bits && *byte_order == order
    )
}

fn is_timestamp_only(s: &StructDeclaration, bits: u32, order: ByteOrder) -> bool {
    s.fields.len() == 1
        && s.fields[0].name == "timestamp"
        && is_unsigned_int(&s.fields[0].declaration, bits, order)
}

fn is_extended_shape(s: &StructDeclaration, order: ByteOrder) -> bool {
    s.fields.len() == 2
        && s.fields[0].name == "id"
        && is_unsigned_int(&s.fields[0].declaration, EXTENDED_ID_BITS, order)
        && s.fields[1].name == "timestamp"
        && is_unsigned_int(&s.fields[1].declaration, EXTENDED_TIMESTAMP_BITS, order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{
        DisplayBase, Encoding, StructField, VariantDeclaration,
    };
    use std::sync::Arc;

    fn uint(bits: u32, align: u64) -> Arc<Declaration> {
        Arc::new(Declaration::Integer(
            IntegerDeclaration::new(
                bits,
                false,
                DisplayBase::Decimal,
                Some(ByteOrder::Little),
                Encoding::None,
                align,
                None,
            )
            .unwrap(),
        ))
    }

    fn header_struct(id_bits: u32, marker: i64, ts_bits: u32) -> StructDeclaration {
        let container = IntegerDeclaration::new(
            id_bits,
            false,
            DisplayBase::Decimal,
            Some(ByteOrder::Little),
            Encoding::None,
            1,
            None,
        )
        .unwrap();
        let mut id_enum = EnumDeclaration::new(container);
        id_enum.add(0, marker - 1, "compact").unwrap();
        id_enum.add(marker, marker, "extended").unwrap();

        let compact = StructDeclaration::new(
            1,
            vec![StructField::new("timestamp", uint(ts_bits, 1))],
        );
        let extended = StructDeclaration::new(
            1,
            vec![
                StructField::new("id", uint(32, 8)),
                StructField::new("timestamp", uint(64, 8)),
            ],
        );
        let v = VariantDeclaration::new(
            vec![
                ("compact".to_string(), Arc::new(Declaration::Struct(compact))),
                (
                    "extended".to_string(),
                    Arc::new(Declaration::Struct(extended)),
                ),
            ],
            Some("id".to_string()),
        );
        StructDeclaration::new(
            8,
            vec![
                StructField::new("id", Arc::new(Declaration::Enum(id_enum))),
                StructField::new("v", Arc::new(Declaration::Variant(v))),
            ],
        )
    }

    #[test]
    fn test_compact_shape_classifies() {
        let s = header_struct(5, 31, 27);
        let h = classify_event_header(&s).unwrap();
        assert_eq!(h.kind, EventHeaderKind::Compact);
        assert_eq!(h.byte_order, ByteOrder::Little);
        assert_eq!(h.extended_marker(), 31);
    }

    #[test]
    fn test_large_shape_classifies() {
        let s = header_struct(16, 65535, 32);
        let h = classify_event_header(&s).unwrap();
        assert_eq!(h.kind, EventHeaderKind::Large);
        assert_eq!(h.compact_timestamp_bits(), 32);
    }

    #[test]
    fn test_wrong_widths_do_not_classify() {
        // 6-bit id enum is not a recognized shape.
        let s = header_struct(6, 31, 27);
        assert!(classify_event_header(&s).is_none());
        // 26-bit compact timestamp is not either.
        let s = header_struct(5, 31, 26);
        assert!(classify_event_header(&s).is_none());
    }

    #[test]
    fn test_wrong_field_names_do_not_classify() {
        let mut s = header_struct(5, 31, 27);
        s.fields[0].name = "event_id".to_string();
        assert!(classify_event_header(&s).is_none());
    }

    #[test]
    fn test_maximum_size() {
        let h = EventHeaderDeclaration {
            kind: EventHeaderKind::Compact,
            byte_order: ByteOrder::Little,
        };
        // 5-bit id padded to 8, then 32 + 64.
        assert_eq!(h.maximum_size(), 104);
    }
}
