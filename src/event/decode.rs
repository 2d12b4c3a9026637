//! Applying declarations to a bit cursor.
//!
//! Decode-time references (sequence lengths, variant tags) resolve against
//! a [`DefScope`] of already-decoded definitions plus a [`LocalScope`]
//! chain of the partially decoded structs enclosing the current field.

use crate::decl::{
    ArrayDeclaration, Declaration, EventHeaderDeclaration, FieldPath, PathRoot,
    SequenceDeclaration, StructDeclaration, VariantDeclaration,
};
use crate::error::DecodeError;
use crate::input::bitbuffer::BitBuffer;

use super::{
    ArrayDefinition, Definition, EventHeaderDefinition, IntegerValue, StructDefinition,
    VariantDefinition,
};

/// The dynamic scopes a decode-time reference may name.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefScope<'a> {
    pub packet_header: Option<&'a Definition>,
    pub packet_context: Option<&'a Definition>,
    pub event_header: Option<&'a Definition>,
    pub stream_event_context: Option<&'a Definition>,
    pub event_context: Option<&'a Definition>,
}

/// The chain of partially decoded enclosing structs, innermost first.
#[derive(Clone, Copy, Debug)]
pub struct LocalScope<'a> {
    pub fields: &'a [(String, Definition)],
    pub parent: Option<&'a LocalScope<'a>>,
}

fn resolve<'a>(
    path: &FieldPath,
    local: Option<&'a LocalScope<'a>>,
    scope: &DefScope<'a>,
) -> Option<&'a Definition> {
    let components: Vec<&str> = path.components.iter().map(|s| s.as_str()).collect();
    if components.is_empty() {
        return match path.root {
            PathRoot::TracePacketHeader => scope.packet_header,
            PathRoot::StreamPacketContext => scope.packet_context,
            PathRoot::StreamEventHeader => scope.event_header,
            PathRoot::StreamEventContext => scope.stream_event_context,
            PathRoot::EventContext => scope.event_context,
            _ => None,
        };
    }
    match path.root {
        PathRoot::Relative => {
            // Innermost struct outward, most recent field first.
            let mut cursor = local;
            while let Some(l) = cursor {
                for (name, def) in l.fields.iter().rev() {
                    if name == components[0] {
                        return def.lookup_components(&components[1..]);
                    }
                }
                cursor = l.parent;
            }
            // Fall back to the dynamic scopes, nearest first.
            for root in [
                scope.event_context,
                scope.stream_event_context,
                scope.event_header,
                scope.packet_context,
                scope.packet_header,
            ]
            .into_iter()
            .flatten()
            {
                if let Some(found) = root.lookup_components(&components) {
                    return Some(found);
                }
            }
            None
        }
        PathRoot::TracePacketHeader => scope.packet_header?.lookup_components(&components),
        PathRoot::StreamPacketContext => scope.packet_context?.lookup_components(&components),
        PathRoot::StreamEventHeader => scope.event_header?.lookup_components(&components),
        PathRoot::StreamEventContext => {
            scope.stream_event_context?.lookup_components(&components)
        }
        PathRoot::EventContext => scope.event_context?.lookup_components(&components),
        PathRoot::EventFields => {
            let mut cursor = local;
            while let Some(l) = cursor {
                if l.parent.is_none() {
                    for (name, def) in l.fields.iter().rev() {
                        if name == components[0] {
                            return def.lookup_components(&components[1..]);
                        }
                    }
                }
                cursor = l.parent;
            }
            None
        }
    }
}

impl Declaration {
    /// Decode one value at the cursor.
    pub fn read(
        &self,
        buf: &mut BitBuffer<'_>,
        scope: &DefScope<'_>,
        local: Option<&LocalScope<'_>>,
    ) -> Result<Definition, DecodeError> {
        match self {
            Declaration::Integer(d) => {
                buf.align(d.alignment)?;
                let value = if d.signed {
                    IntegerValue::Signed(buf.read_bits_signed(d.length, d.byte_order)?)
                } else {
                    IntegerValue::Unsigned(buf.read_bits(d.length, d.byte_order)?)
                };
                Ok(Definition::Integer {
                    value,
                    length: d.length,
                })
            }
            Declaration::Float(d) => {
                buf.align(d.alignment)?;
                let raw = buf.read_bits(d.total_size(), d.byte_order)?;
                let value = match d.total_size() {
                    32 => f32::from_bits(raw as u32) as f64,
                    64 => f64::from_bits(raw),
                    _ => f64::NAN,
                };
                Ok(Definition::Float(value))
            }
            Declaration::Enum(d) => {
                buf.align(d.container.alignment)?;
                let value = if d.container.signed {
                    buf.read_bits_signed(d.container.length, d.container.byte_order)?
                } else {
                    buf.read_bits(d.container.length, d.container.byte_order)? as i64
                };
                Ok(Definition::Enum {
                    value,
                    label: d.query(value).map(str::to_string),
                })
            }
            Declaration::String(_) => {
                let bytes = buf.read_cstring()?;
                Ok(Definition::Str(
                    String::from_utf8_lossy(&bytes).into_owned(),
                ))
            }
            Declaration::Struct(d) => read_struct(d, buf, scope, local),
            Declaration::Variant(d) => read_variant(d, buf, scope, local),
            Declaration::Array(d) => read_array(d, buf, scope, local),
            Declaration::Sequence(d) => read_sequence(d, buf, scope, local),
            Declaration::EventHeader(d) => read_event_header(d, buf),
        }
    }
}

fn read_struct(
    d: &StructDeclaration,
    buf: &mut BitBuffer<'_>,
    scope: &DefScope<'_>,
    local: Option<&LocalScope<'_>>,
) -> Result<Definition, DecodeError> {
    buf.align(d.alignment)?;
    let mut fields: Vec<(String, Definition)> = Vec::with_capacity(d.fields.len());
    for field in &d.fields {
        // The fields decoded so far become visible to this field's
        // length/tag references.
        let current = LocalScope {
            fields: &fields,
            parent: local,
        };
        let def = field.declaration.read(buf, scope, Some(&current))?;
        fields.push((field.name.clone(), def));
    }
    Ok(Definition::Struct(StructDefinition { fields }))
}

fn read_variant(
    d: &VariantDeclaration,
    buf: &mut BitBuffer<'_>,
    scope: &DefScope<'_>,
    local: Option<&LocalScope<'_>>,
) -> Result<Definition, DecodeError> {
    let tag = d.tag.as_deref().ok_or_else(|| DecodeError::UnresolvedReference {
        path: "<untagged variant>".to_string(),
    })?;
    let raw: Vec<String> = tag.split('.').map(str::to_string).collect();
    let path = FieldPath::parse(&raw);
    let tag_def = resolve(&path, local, scope).ok_or_else(|| DecodeError::UnresolvedReference {
        path: tag.to_string(),
    })?;
    let label = match tag_def {
        Definition::Enum { label: Some(l), .. } => l.clone(),
        _ => {
            return Err(DecodeError::UnresolvedReference {
                path: format!("{tag} (no enum label)"),
            })
        }
    };
    let field = d
        .field(&label)
        .ok_or_else(|| DecodeError::UnresolvedReference {
            path: format!("{tag} -> {label}"),
        })?;
    let value = field.read(buf, scope, local)?;
    Ok(Definition::Variant(Box::new(VariantDefinition {
        tag_label: label,
        value,
    })))
}

fn read_elements(
    element: &Declaration,
    count: u64,
    text: bool,
    buf: &mut BitBuffer<'_>,
    scope: &DefScope<'_>,
    local: Option<&LocalScope<'_>>,
) -> Result<Definition, DecodeError> {
    if text {
        buf.align(8)?;
        let mut bytes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let b = buf.read_bytes(1)?[0];
            bytes.push(b);
        }
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        return Ok(Definition::Array(ArrayDefinition {
            elements: Vec::new(),
            text: Some(String::from_utf8_lossy(&bytes[..end]).into_owned()),
        }));
    }
    let mut elements = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        elements.push(element.read(buf, scope, local)?);
    }
    Ok(Definition::Array(ArrayDefinition {
        elements,
        text: None,
    }))
}

fn read_array(
    d: &ArrayDeclaration,
    buf: &mut BitBuffer<'_>,
    scope: &DefScope<'_>,
    local: Option<&LocalScope<'_>>,
) -> Result<Definition, DecodeError> {
    read_elements(&d.element, d.length, d.is_text(), buf, scope, local)
}

fn read_sequence(
    d: &SequenceDeclaration,
    buf: &mut BitBuffer<'_>,
    scope: &DefScope<'_>,
    local: Option<&LocalScope<'_>>,
) -> Result<Definition, DecodeError> {
    let length = resolve(&d.length_path, local, scope)
        .and_then(Definition::as_u64)
        .ok_or_else(|| DecodeError::UnresolvedReference {
            path: d.length_path.to_string(),
        })?;
    read_elements(&d.element, length, d.is_text(), buf, scope, local)
}

fn read_event_header(
    d: &EventHeaderDeclaration,
    buf: &mut BitBuffer<'_>,
) -> Result<Definition, DecodeError> {
    buf.align(d.alignment())?;
    let id = buf.read_bits(d.id_bits(), d.byte_order)?;
    let header = if id == d.extended_marker() {
        buf.align(8)?;
        let real_id = buf.read_bits(32, d.byte_order)?;
        buf.align(8)?;
        let timestamp = buf.read_bits(64, d.byte_order)?;
        EventHeaderDefinition {
            id: real_id,
            timestamp,
            timestamp_bits: 64,
        }
    } else {
        let timestamp = buf.read_bits(d.compact_timestamp_bits(), d.byte_order)?;
        EventHeaderDefinition {
            id,
            timestamp,
            timestamp_bits: d.compact_timestamp_bits(),
        }
    };
    Ok(Definition::EventHeader(header))
}
