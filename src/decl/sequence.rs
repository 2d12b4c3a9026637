//! Array and sequence declarations, and the field paths that sequence
//! lengths and variant tags resolve through.

use std::fmt;
use std::sync::Arc;

use super::Declaration;

/// Where an absolute field reference starts resolving.
///
/// TSDL allows length and tag references to name one of the dynamic scopes
/// explicitly (`trace.packet.header.len`, `stream.event.context.n`, ...);
/// a bare name resolves relative to the fields decoded so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathRoot {
    Relative,
    TracePacketHeader,
    StreamPacketContext,
    StreamEventHeader,
    StreamEventContext,
    EventContext,
    EventFields,
}

/// A dotted reference to a previously decoded field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPath {
    pub root: PathRoot,
    pub components: Vec<String>,
}

impl FieldPath {
    /// Split a raw dotted path into its scope prefix and remaining
    /// components. Unprefixed paths are relative.
    pub fn parse(raw: &[String]) -> FieldPath {
        let as_strs: Vec<&str> = raw.iter().map(|s| s.as_str()).collect();
        let (root, rest) = match as_strs.as_slice() {
            ["trace", "packet", "header", rest @ ..] => (PathRoot::TracePacketHeader, rest),
            ["stream", "packet", "context", rest @ ..] => (PathRoot::StreamPacketContext, rest),
            ["stream", "event", "header", rest @ ..] => (PathRoot::StreamEventHeader, rest),
            ["stream", "event", "context", rest @ ..] => (PathRoot::StreamEventContext, rest),
            ["event", "context", rest @ ..] => (PathRoot::EventContext, rest),
            ["event", "fields", rest @ ..] => (PathRoot::EventFields, rest),
            rest => (PathRoot::Relative, rest),
        };
        FieldPath {
            root,
            components: rest.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.root {
            PathRoot::Relative => "",
            PathRoot::TracePacketHeader => "trace.packet.header.",
            PathRoot::StreamPacketContext => "stream.packet.context.",
            PathRoot::StreamEventHeader => "stream.event.header.",
            PathRoot::StreamEventContext => "stream.event.context.",
            PathRoot::EventContext => "event.context.",
            PathRoot::EventFields => "event.fields.",
        };
        write!(f, "{}{}", prefix, self.components.join("."))
    }
}

/// A fixed-length run of one element declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayDeclaration {
    pub length: u64,
    pub element: Arc<Declaration>,
}

impl ArrayDeclaration {
    pub fn new(length: u64, element: Arc<Declaration>) -> Self {
        ArrayDeclaration { length, element }
    }

    /// True when this array carries text: 8-bit characters with an
    /// encoding.
    pub fn is_text(&self) -> bool {
        matches!(&*self.element, Declaration::Integer(i) if i.is_character())
    }
}

/// A dynamically sized run whose length comes from a previously decoded
/// unsigned integer field.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceDeclaration {
    pub length_path: FieldPath,
    pub element: Arc<Declaration>,
}

impl SequenceDeclaration {
    pub fn new(length_path: FieldPath, element: Arc<Declaration>) -> Self {
        SequenceDeclaration {
            length_path,
            element,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(&*self.element, Declaration::Integer(i) if i.is_character())
    }
}
