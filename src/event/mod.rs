//! Decoded values: the runtime mirror of the declaration model.
//!
//! Applying a [`crate::decl::Declaration`] to a bit cursor yields a
//! [`Definition`]. Definitions form a tree (structs and variants contain
//! children) addressable by dotted field paths, which is the contract the
//! analysis/UI layers consume: a decoded event with named fields and a
//! timestamp.

pub mod decode;

use std::sync::Arc;

use crate::trace::EventDeclaration;

pub use decode::{DefScope, LocalScope};

/// A decoded integer, preserving signedness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegerValue {
    Signed(i64),
    Unsigned(u64),
}

impl IntegerValue {
    /// The value as u64; negative values wrap to their bit pattern.
    pub fn to_u64(self) -> u64 {
        match self {
            IntegerValue::Signed(v) => v as u64,
            IntegerValue::Unsigned(v) => v,
        }
    }

    /// The value as i64; unsigned values above `i64::MAX` wrap.
    pub fn to_i64(self) -> i64 {
        match self {
            IntegerValue::Signed(v) => v,
            IntegerValue::Unsigned(v) => v as i64,
        }
    }
}

/// The decoded fast-path event header: id and timestamp, with the width
/// the timestamp was stored in (truncated widths need reconstruction).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventHeaderDefinition {
    pub id: u64,
    pub timestamp: u64,
    pub timestamp_bits: u32,
}

/// An ordered set of decoded named fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructDefinition {
    pub fields: Vec<(String, Definition)>,
}

impl StructDefinition {
    pub fn field(&self, name: &str) -> Option<&Definition> {
        self.fields
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }
}

/// A decoded variant: which field the tag selected, and its value.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantDefinition {
    pub tag_label: String,
    pub value: Definition,
}

/// A decoded array or sequence. Character runs also carry a text view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrayDefinition {
    pub elements: Vec<Definition>,
    pub text: Option<String>,
}

/// One decoded value.
#[derive(Clone, Debug, PartialEq)]
pub enum Definition {
    Integer { value: IntegerValue, length: u32 },
    Float(f64),
    Enum { value: i64, label: Option<String> },
    Str(String),
    Struct(StructDefinition),
    Variant(Box<VariantDefinition>),
    Array(ArrayDefinition),
    EventHeader(EventHeaderDefinition),
}

impl Definition {
    pub fn as_struct(&self) -> Option<&StructDefinition> {
        match self {
            Definition::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Definition::Integer { value, .. } => Some(value.to_u64()),
            Definition::Enum { value, .. } => Some(*value as u64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Definition::Integer { value, .. } => Some(value.to_i64()),
            Definition::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Definition::Str(s) => Some(s),
            Definition::Array(a) => a.text.as_deref(),
            _ => None,
        }
    }

    /// Walk a component path through structs and variants.
    pub fn lookup_components(&self, components: &[&str]) -> Option<&Definition> {
        let Some((head, rest)) = components.split_first() else {
            return Some(self);
        };
        match self {
            Definition::Struct(s) => s.field(head)?.lookup_components(rest),
            Definition::Variant(v) => {
                if *head == v.tag_label {
                    v.value.lookup_components(rest)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Dotted-path lookup, e.g. `"v.compact.timestamp"`.
    pub fn lookup(&self, path: &str) -> Option<&Definition> {
        let components: Vec<&str> = path.split('.').collect();
        self.lookup_components(&components)
    }
}

/// How lost events surface: one synthetic pseudo-event per packet that
/// declared a nonzero discarded-event count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LostEventInfo {
    /// Number of events the tracer dropped.
    pub count: u64,
    /// Time span the loss covers, in clock cycles.
    pub duration: u64,
}

/// One decoded event. Produced fresh per read call; the reader keeps only
/// the current one.
#[derive(Clone, Debug)]
pub struct EventDefinition {
    pub declaration: Arc<EventDeclaration>,
    /// Full 64-bit reconstructed timestamp, in clock cycles.
    pub timestamp: u64,
    /// CPU id from the packet context, when the stream carries one.
    pub cpu: Option<u32>,
    pub event_header: Option<Definition>,
    /// The stream-level event context.
    pub stream_context: Option<Definition>,
    /// The event-specific context.
    pub context: Option<Definition>,
    pub fields: Option<Definition>,
    /// Set only on synthesized lost-event pseudo-events.
    pub lost: Option<LostEventInfo>,
}

impl EventDefinition {
    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    /// Look up a field by dotted path, searching the payload first, then
    /// the contexts, then the header.
    pub fn field(&self, path: &str) -> Option<&Definition> {
        for root in [
            &self.fields,
            &self.context,
            &self.stream_context,
            &self.event_header,
        ] {
            if let Some(found) = root.as_ref().and_then(|d| d.lookup(path)) {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uint(v: u64) -> Definition {
        Definition::Integer {
            value: IntegerValue::Unsigned(v),
            length: 32,
        }
    }

    #[test]
    fn test_struct_path_lookup() {
        let inner = Definition::Struct(StructDefinition {
            fields: vec![("x".to_string(), uint(7))],
        });
        let outer = Definition::Struct(StructDefinition {
            fields: vec![("inner".to_string(), inner), ("y".to_string(), uint(9))],
        });
        assert_eq!(outer.lookup("inner.x").unwrap().as_u64(), Some(7));
        assert_eq!(outer.lookup("y").unwrap().as_u64(), Some(9));
        assert!(outer.lookup("inner.z").is_none());
        assert!(outer.lookup("nope").is_none());
    }

    #[test]
    fn test_variant_lookup_follows_active_field() {
        let v = Definition::Variant(Box::new(VariantDefinition {
            tag_label: "compact".to_string(),
            value: Definition::Struct(StructDefinition {
                fields: vec![("timestamp".to_string(), uint(55))],
            }),
        }));
        let s = Definition::Struct(StructDefinition {
            fields: vec![("v".to_string(), v)],
        });
        assert_eq!(s.lookup("v.compact.timestamp").unwrap().as_u64(), Some(55));
        assert!(s.lookup("v.extended.timestamp").is_none());
    }

    #[test]
    fn test_signedness_views() {
        let d = Definition::Integer {
            value: IntegerValue::Signed(-1),
            length: 32,
        };
        assert_eq!(d.as_i64(), Some(-1));
        assert_eq!(d.as_u64(), Some(u64::MAX));
    }
}
