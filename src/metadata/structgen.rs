//! Metadata walker: parse tree in, [`CtfTrace`] model out.
//!
//! [`MetadataBuilder`] walks the statements produced by [`super::parser`]
//! and populates a trace model: trace attributes, streams, events, clocks,
//! environment and callsites, registering typedefs and named types into
//! the scope arena as it descends. One builder handles both the initial
//! metadata (`generate`, which requires exactly one `trace` block) and
//! appended fragments from live sessions (`generate_fragment`, which
//! forbids one).
//!
//! Event blocks are collected and processed after every other statement in
//! the same text, because attaching an event without an explicit
//! `stream_id` needs the final stream set.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;

use crate::decl::{
    classify_event_header, ArrayDeclaration, Declaration, EnumDeclaration, FieldPath,
    FloatDeclaration, IntegerDeclaration, PathRoot, SequenceDeclaration, StringDeclaration,
    StructDeclaration, StructField, VariantDeclaration,
};
use crate::decl::{ByteOrder, DisplayBase, Encoding};
use crate::error::MetadataError;
use crate::trace::{Callsite, Clock, CtfTrace, EventDeclaration, Stream};

use super::ast::{
    ArrayLen, AttributeValue, Declarator, Enumerator, EnumeratorValue, Statement, TypeSpec,
    UnaryExpression,
};
use super::parser;
use super::scalars;
use super::scope::ScopeArena;

fn invalid(attribute: &str, message: impl Into<String>) -> MetadataError {
    MetadataError::InvalidAttribute {
        attribute: attribute.to_string(),
        message: message.into(),
    }
}

pub struct MetadataBuilder {
    trace: CtfTrace,
    scopes: ScopeArena,
    generated: bool,
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        MetadataBuilder::new()
    }
}

impl MetadataBuilder {
    pub fn new() -> Self {
        MetadataBuilder {
            trace: CtfTrace::new(),
            scopes: ScopeArena::new(),
            generated: false,
        }
    }

    /// Parse the initial metadata text. Exactly one `trace` block is
    /// required.
    pub fn generate(&mut self, text: &str) -> Result<(), MetadataError> {
        let statements = parser::parse(text)?;
        let trace_blocks = statements
            .iter()
            .filter(|s| matches!(s, Statement::Trace(_)))
            .count();
        if trace_blocks == 0 {
            return Err(MetadataError::MissingTraceBlock);
        }
        if trace_blocks > 1 {
            return Err(MetadataError::DuplicateTraceBlock);
        }
        self.walk_root(statements)?;
        self.generated = true;
        Ok(())
    }

    /// Parse appended metadata (live sessions). `generate` must have run
    /// first, and a second `trace` block is forbidden.
    pub fn generate_fragment(&mut self, text: &str) -> Result<(), MetadataError> {
        if !self.generated {
            return Err(MetadataError::FragmentBeforeGenerate);
        }
        let statements = parser::parse(text)?;
        if statements.iter().any(|s| matches!(s, Statement::Trace(_))) {
            return Err(MetadataError::DuplicateTraceBlock);
        }
        self.walk_root(statements)
    }

    pub fn trace(&self) -> &CtfTrace {
        &self.trace
    }

    pub fn into_trace(self) -> CtfTrace {
        self.trace
    }

    fn walk_root(&mut self, statements: Vec<Statement>) -> Result<(), MetadataError> {
        let mut event_blocks = Vec::new();
        for stmt in statements {
            match stmt {
                Statement::Trace(body) => self.parse_trace_block(body)?,
                Statement::Stream(body) => self.parse_stream_block(body)?,
                Statement::Event(body) => event_blocks.push(body),
                Statement::Clock(body) => self.parse_clock_block(body)?,
                Statement::Env(body) => self.parse_env_block(body)?,
                Statement::Callsite(body) => self.parse_callsite_block(body)?,
                Statement::TypeDef { spec, declarators } => {
                    self.parse_typedef(&spec, &declarators)?
                }
                Statement::TypeAlias { spec, alias } => self.parse_typealias(&spec, &alias)?,
                Statement::Declaration { spec, declarators } => {
                    let base = self.parse_type_spec(&spec)?;
                    for d in &declarators {
                        let decl = self.apply_subscripts(base.clone(), d)?;
                        self.scopes.register_identifier(&d.name, decl)?;
                    }
                }
                Statement::Assignment { path, .. } | Statement::TypeAssignment { path, .. } => {
                    return Err(invalid(
                        &path.join("."),
                        "assignments are only valid inside blocks",
                    ));
                }
            }
        }
        for body in event_blocks {
            self.parse_event_block(body)?;
        }
        Ok(())
    }

    // ---- trace -----------------------------------------------------------

    fn parse_trace_block(&mut self, body: Vec<Statement>) -> Result<(), MetadataError> {
        self.scopes.push_scope("trace");
        for stmt in body {
            match stmt {
                Statement::Assignment { path, value } => {
                    self.parse_trace_attribute(&path, &value)?
                }
                Statement::TypeAssignment { path, spec } => {
                    if path == ["packet", "header"] {
                        let decl = self.parse_type_spec(&spec)?;
                        if decl.as_struct().is_none() {
                            return Err(invalid("packet.header", "must be a struct"));
                        }
                        self.trace.packet_header = Some(decl);
                    } else {
                        return Err(invalid(&path.join("."), "unknown trace type assignment"));
                    }
                }
                Statement::TypeDef { spec, declarators } => {
                    self.parse_typedef(&spec, &declarators)?
                }
                Statement::TypeAlias { spec, alias } => self.parse_typealias(&spec, &alias)?,
                Statement::Declaration { spec, declarators } => {
                    if declarators.is_empty() {
                        self.parse_type_spec(&spec)?;
                    } else {
                        return Err(invalid("trace", "field declarations are not valid here"));
                    }
                }
                _ => return Err(invalid("trace", "nested blocks are not valid here")),
            }
        }
        self.scopes.pop_scope();

        if let Some(major) = self.trace.major {
            if major != 1 {
                return Err(MetadataError::UnsupportedVersion {
                    major,
                    minor: self.trace.minor.unwrap_or(0),
                });
            }
        }
        Ok(())
    }

    fn parse_trace_attribute(
        &mut self,
        path: &[String],
        value: &AttributeValue,
    ) -> Result<(), MetadataError> {
        let name = path.join(".");
        match name.as_str() {
            "major" => self.trace.major = Some(attr_u64(value, "major")?),
            "minor" => self.trace.minor = Some(attr_u64(value, "minor")?),
            "uuid" => {
                let text = attr_string(value, "uuid")?;
                let uuid = scalars::parse_uuid(&text)?;
                if let Some(existing) = self.trace.uuid {
                    if existing != uuid {
                        return Err(MetadataError::MalformedUuid { value: text });
                    }
                }
                self.trace.uuid = Some(uuid);
            }
            "byte_order" => {
                let expr = attr_expr(value, "byte_order")?;
                let order = scalars::parse_byte_order(expr, self.trace.byte_order_set())?
                    .unwrap_or_else(ByteOrder::host);
                self.trace.set_byte_order(order, &mut self.scopes)?;
            }
            other => {
                warn!("ignoring unknown trace attribute {other}");
            }
        }
        Ok(())
    }

    // ---- stream ----------------------------------------------------------

    fn parse_stream_block(&mut self, body: Vec<Statement>) -> Result<(), MetadataError> {
        self.scopes.push_scope("stream");
        let mut stream = Stream::new(None);
        for stmt in body {
            match stmt {
                Statement::Assignment { path, value } => match path.join(".").as_str() {
                    "id" => stream.id = Some(attr_u64(&value, "stream id")?),
                    "byte_order" => {
                        let expr = attr_expr(&value, "byte_order")?;
                        stream.byte_order =
                            scalars::parse_byte_order(expr, self.trace.byte_order_set())?;
                    }
                    other => warn!("ignoring unknown stream attribute {other}"),
                },
                Statement::TypeAssignment { path, spec } => {
                    let decl = self.parse_type_spec(&spec)?;
                    match path.join(".").as_str() {
                        "event.header" => stream.event_header = Some(decl),
                        "event.context" => stream.event_context = Some(decl),
                        "packet.context" => stream.packet_context = Some(decl),
                        other => {
                            return Err(invalid(other, "unknown stream type assignment"));
                        }
                    }
                }
                Statement::TypeDef { spec, declarators } => {
                    self.parse_typedef(&spec, &declarators)?
                }
                Statement::TypeAlias { spec, alias } => self.parse_typealias(&spec, &alias)?,
                Statement::Declaration { spec, declarators } if declarators.is_empty() => {
                    self.parse_type_spec(&spec)?;
                }
                _ => return Err(invalid("stream", "statement not valid in a stream block")),
            }
        }
        self.scopes.pop_scope();
        self.trace.add_stream(stream)
    }

    // ---- event -----------------------------------------------------------

    fn parse_event_block(&mut self, body: Vec<Statement>) -> Result<(), MetadataError> {
        self.scopes.push_scope("event");
        let mut name: Option<String> = None;
        let mut id: Option<u64> = None;
        let mut stream_id: Option<u64> = None;
        let mut log_level: Option<i64> = None;
        let mut context: Option<Arc<Declaration>> = None;
        let mut fields: Option<Arc<Declaration>> = None;
        let mut attributes = BTreeMap::new();

        for stmt in body {
            match stmt {
                Statement::Assignment { path, value } => match path.join(".").as_str() {
                    "name" => name = Some(attr_string(&value, "event name")?),
                    "id" => id = Some(attr_u64(&value, "event id")?),
                    "stream_id" => stream_id = Some(attr_u64(&value, "stream_id")?),
                    "loglevel" => log_level = Some(attr_i64(&value, "loglevel")?),
                    other => {
                        attributes.insert(other.to_string(), attr_display(&value));
                    }
                },
                Statement::TypeAssignment { path, spec } => {
                    let decl = self.parse_type_spec(&spec)?;
                    match path.join(".").as_str() {
                        "context" => context = Some(decl),
                        "fields" => fields = Some(decl),
                        other => return Err(invalid(other, "unknown event type assignment")),
                    }
                }
                Statement::TypeDef { spec, declarators } => {
                    self.parse_typedef(&spec, &declarators)?
                }
                Statement::TypeAlias { spec, alias } => self.parse_typealias(&spec, &alias)?,
                Statement::Declaration { spec, declarators } if declarators.is_empty() => {
                    self.parse_type_spec(&spec)?;
                }
                _ => return Err(invalid("event", "statement not valid in an event block")),
            }
        }
        self.scopes.pop_scope();

        let name = name.ok_or_else(|| invalid("event", "missing name attribute"))?;

        // Events without a stream_id can only attach to a single-stream
        // trace whose stream is itself unnumbered. A trace with no stream
        // block at all gets one implicit unnumbered stream.
        if stream_id.is_none() {
            if self.trace.stream_count() == 0 {
                self.trace.add_stream(Stream::new(None))?;
            } else if self.trace.stream_count() > 1 {
                return Err(invalid(
                    "event",
                    format!("event {name} has no stream_id in a multi-stream trace"),
                ));
            } else if self.trace.streams().next().map(|s| s.id).unwrap_or(None).is_some() {
                return Err(invalid(
                    "event",
                    format!("event {name} has no stream_id but the stream is numbered"),
                ));
            }
        }

        let event = EventDeclaration {
            name: name.clone(),
            id,
            stream_id,
            log_level,
            context,
            fields,
            attributes,
        };
        let stream = self.trace.stream_mut(stream_id).ok_or_else(|| {
            invalid(
                "event",
                format!("event {name} references unknown stream {stream_id:?}"),
            )
        })?;
        stream.add_event(event)
    }

    // ---- clock / env / callsite -----------------------------------------

    fn parse_clock_block(&mut self, body: Vec<Statement>) -> Result<(), MetadataError> {
        let mut name: Option<String> = None;
        let mut clock = Clock::new("");
        for stmt in body {
            let Statement::Assignment { path, value } = stmt else {
                return Err(invalid("clock", "only attribute assignments are valid here"));
            };
            match path.join(".").as_str() {
                "name" => name = Some(attr_string(&value, "clock name")?),
                "uuid" => {
                    clock.uuid = Some(scalars::parse_uuid(&attr_string(&value, "clock uuid")?)?)
                }
                "description" => clock.description = Some(attr_string(&value, "description")?),
                "freq" => clock.freq = attr_u64(&value, "freq")?,
                "offset" => clock.offset = attr_u64(&value, "offset")?,
                "offset_s" => clock.offset_s = attr_u64(&value, "offset_s")?,
                "precision" => clock.precision = attr_u64(&value, "precision")?,
                "absolute" => {
                    clock.absolute = scalars::parse_boolean(attr_expr(&value, "absolute")?)?
                }
                other => warn!("ignoring unknown clock attribute {other}"),
            }
        }
        let name = name.ok_or_else(|| invalid("clock", "missing name attribute"))?;
        clock.name = name.clone();
        if self.trace.clocks.contains_key(&name) {
            return Err(MetadataError::DuplicateDeclaration {
                name: format!("clock {name}"),
            });
        }
        self.trace.clocks.insert(name, clock);
        Ok(())
    }

    fn parse_env_block(&mut self, body: Vec<Statement>) -> Result<(), MetadataError> {
        for stmt in body {
            let Statement::Assignment { path, value } = stmt else {
                return Err(invalid("env", "only attribute assignments are valid here"));
            };
            self.trace
                .environment
                .insert(path.join("."), attr_display(&value));
        }
        Ok(())
    }

    fn parse_callsite_block(&mut self, body: Vec<Statement>) -> Result<(), MetadataError> {
        let mut callsite = Callsite::default();
        for stmt in body {
            let Statement::Assignment { path, value } = stmt else {
                return Err(invalid("callsite", "only attribute assignments are valid here"));
            };
            match path.join(".").as_str() {
                "name" => callsite.name = Some(attr_string(&value, "callsite name")?),
                "func" => callsite.func = Some(attr_string(&value, "func")?),
                "file" => callsite.file = Some(attr_string(&value, "file")?),
                "line" => callsite.line = Some(attr_u64(&value, "line")?),
                "ip" => callsite.ip = Some(attr_u64(&value, "ip")?),
                other => warn!("ignoring unknown callsite attribute {other}"),
            }
        }
        self.trace.callsites.push(callsite);
        Ok(())
    }

    // ---- typedef / typealias --------------------------------------------

    fn parse_typedef(
        &mut self,
        spec: &TypeSpec,
        declarators: &[Declarator],
    ) -> Result<(), MetadataError> {
        self.reject_untagged_variant_alias(spec)?;
        let base = self.parse_type_spec(spec)?;
        for d in declarators {
            let decl = self.apply_subscripts(base.clone(), d)?;
            self.scopes.register_type(&d.name, decl)?;
        }
        Ok(())
    }

    fn parse_typealias(&mut self, spec: &TypeSpec, alias: &Declarator) -> Result<(), MetadataError> {
        self.reject_untagged_variant_alias(spec)?;
        let base = self.parse_type_spec(spec)?;
        let decl = self.apply_subscripts(base, alias)?;
        self.scopes.register_type(&alias.name, decl)
    }

    fn reject_untagged_variant_alias(&self, spec: &TypeSpec) -> Result<(), MetadataError> {
        if let TypeSpec::Variant { tag: None, body: Some(_), .. } = spec {
            return Err(invalid(
                "variant",
                "an untagged variant cannot be aliased",
            ));
        }
        Ok(())
    }

    // ---- type specifiers -------------------------------------------------

    fn parse_type_spec(&mut self, spec: &TypeSpec) -> Result<Arc<Declaration>, MetadataError> {
        match spec {
            TypeSpec::Integer(body) => self.parse_integer_spec(body),
            TypeSpec::Float(body) => self.parse_float_spec(body),
            TypeSpec::Str(body) => self.parse_string_spec(body),
            TypeSpec::Struct { name, body, align } => {
                let align = match align {
                    Some(n) => scalars::parse_alignment(n)?,
                    None => 0,
                };
                self.parse_struct_spec(name.as_deref(), body.as_deref(), align)
            }
            TypeSpec::Variant { name, tag, body } => {
                self.parse_variant_spec(name.as_deref(), tag.as_deref(), body.as_deref())
            }
            TypeSpec::Enum { name, container, body } => {
                self.parse_enum_spec(name.as_deref(), container.as_deref(), body.as_deref())
            }
            TypeSpec::Named(name) => self
                .scopes
                .lookup_type_recursive(name)
                .cloned()
                .ok_or_else(|| MetadataError::TypeNotFound { name: name.clone() }),
        }
    }

    fn parse_integer_spec(&mut self, body: &[Statement]) -> Result<Arc<Declaration>, MetadataError> {
        let mut signed = false;
        let mut byte_order = self.trace.byte_order_set();
        let mut size: Option<u32> = None;
        let mut alignment = 0u64;
        let mut base = DisplayBase::Decimal;
        let mut encoding = Encoding::None;
        let mut clock = None;

        for stmt in body {
            let Statement::Assignment { path, value } = stmt else {
                return Err(invalid("integer", "only attribute assignments are valid here"));
            };
            match path.join(".").as_str() {
                "signed" => signed = scalars::parse_boolean(attr_expr(value, "signed")?)?,
                "byte_order" => {
                    byte_order = scalars::parse_byte_order(
                        attr_expr(value, "byte_order")?,
                        self.trace.byte_order_set(),
                    )?
                }
                "size" => size = Some(scalars::parse_size(attr_number(value, "size")?)?),
                "align" => alignment = scalars::parse_alignment(attr_number(value, "align")?)?,
                "base" => base = scalars::parse_base(attr_expr(value, "base")?)?,
                "encoding" => encoding = parse_encoding(value)?,
                "map" => clock = Some(scalars::parse_clock_map(value)?),
                other => warn!("ignoring unknown integer attribute {other}"),
            }
        }
        let size = size.ok_or_else(|| invalid("integer", "missing size attribute"))?;
        let decl =
            IntegerDeclaration::new(size, signed, base, byte_order, encoding, alignment, clock)?;
        Ok(Arc::new(Declaration::Integer(decl)))
    }

    fn parse_float_spec(&mut self, body: &[Statement]) -> Result<Arc<Declaration>, MetadataError> {
        let mut exponent = 8u32;
        let mut mantissa = 24u32;
        let mut byte_order = self.trace.byte_order_set();
        let mut alignment = 0u64;

        for stmt in body {
            let Statement::Assignment { path, value } = stmt else {
                return Err(invalid(
                    "floating_point",
                    "only attribute assignments are valid here",
                ));
            };
            match path.join(".").as_str() {
                "exp_dig" => exponent = scalars::parse_size(attr_number(value, "exp_dig")?)?,
                "mant_dig" => mantissa = scalars::parse_size(attr_number(value, "mant_dig")?)?,
                "byte_order" => {
                    byte_order = scalars::parse_byte_order(
                        attr_expr(value, "byte_order")?,
                        self.trace.byte_order_set(),
                    )?
                }
                "align" => alignment = scalars::parse_alignment(attr_number(value, "align")?)?,
                other => warn!("ignoring unknown floating_point attribute {other}"),
            }
        }
        let decl = FloatDeclaration::new(exponent, mantissa, byte_order, alignment)?;
        Ok(Arc::new(Declaration::Float(decl)))
    }

    fn parse_string_spec(&mut self, body: &[Statement]) -> Result<Arc<Declaration>, MetadataError> {
        let mut encoding = Encoding::Utf8;
        for stmt in body {
            let Statement::Assignment { path, value } = stmt else {
                return Err(invalid("string", "only attribute assignments are valid here"));
            };
            match path.join(".").as_str() {
                "encoding" => {
                    encoding = parse_encoding(value)?;
                    // A string with no encoding still terminates at NUL;
                    // treat `none` as raw bytes read as UTF-8.
                }
                other => warn!("ignoring unknown string attribute {other}"),
            }
        }
        Ok(Arc::new(Declaration::String(StringDeclaration::new(
            encoding,
        ))))
    }

    fn parse_struct_spec(
        &mut self,
        name: Option<&str>,
        body: Option<&[Statement]>,
        min_align: u64,
    ) -> Result<Arc<Declaration>, MetadataError> {
        match (name, body) {
            (_, Some(body)) => {
                self.scopes.push_scope("struct");
                let mut fields = Vec::new();
                let result = self.parse_struct_body(body, &mut fields);
                self.scopes.pop_scope();
                result?;

                let s = StructDeclaration::new(min_align, fields);
                // The compact/large event-header rewrite applies wherever
                // a struct is resolved.
                let decl = match classify_event_header(&s) {
                    Some(header) => Arc::new(Declaration::EventHeader(header)),
                    None => Arc::new(Declaration::Struct(s)),
                };
                if let Some(name) = name {
                    self.scopes.register_struct(name, decl.clone())?;
                }
                Ok(decl)
            }
            (Some(name), None) => self
                .scopes
                .lookup_struct_recursive(name)
                .cloned()
                .ok_or_else(|| MetadataError::TypeNotFound {
                    name: format!("struct {name}"),
                }),
            (None, None) => Err(invalid("struct", "requires a name or a body")),
        }
    }

    fn parse_struct_body(
        &mut self,
        body: &[Statement],
        fields: &mut Vec<StructField>,
    ) -> Result<(), MetadataError> {
        for stmt in body {
            match stmt {
                Statement::Declaration { spec, declarators } => {
                    if declarators.is_empty() {
                        self.parse_type_spec(spec)?;
                    } else {
                        let base = self.parse_type_spec(spec)?;
                        for d in declarators {
                            let decl = self.apply_subscripts(base.clone(), d)?;
                            self.check_field_decl(&d.name, &decl)?;
                            self.scopes.register_identifier(&d.name, decl.clone())?;
                            fields.push(StructField::new(&d.name, decl));
                        }
                    }
                }
                Statement::TypeDef { spec, declarators } => {
                    self.parse_typedef(spec, declarators)?
                }
                Statement::TypeAlias { spec, alias } => self.parse_typealias(spec, alias)?,
                _ => return Err(invalid("struct", "statement not valid in a struct body")),
            }
        }
        Ok(())
    }

    /// A variant used as a field must have a tag to decode by.
    fn check_field_decl(&self, name: &str, decl: &Declaration) -> Result<(), MetadataError> {
        if let Declaration::Variant(v) = decl {
            if v.tag.is_none() {
                return Err(invalid(
                    "variant",
                    format!("field {name} uses an untagged variant"),
                ));
            }
        }
        Ok(())
    }

    fn parse_variant_spec(
        &mut self,
        name: Option<&str>,
        tag: Option<&[String]>,
        body: Option<&[Statement]>,
    ) -> Result<Arc<Declaration>, MetadataError> {
        let tag_name = tag.map(|t| t.join("."));
        let base = match (name, body) {
            (_, Some(body)) => {
                self.scopes.push_scope("variant");
                let mut fields = Vec::new();
                let result = self.parse_variant_body(body, &mut fields);
                self.scopes.pop_scope();
                result?;
                let v = VariantDeclaration::new(fields, tag_name.clone());
                let decl = Arc::new(Declaration::Variant(v));
                if let Some(name) = name {
                    self.scopes.register_variant(name, decl.clone())?;
                }
                decl
            }
            (Some(name), None) => {
                let found = self
                    .scopes
                    .lookup_variant_recursive(name)
                    .cloned()
                    .ok_or_else(|| MetadataError::TypeNotFound {
                        name: format!("variant {name}"),
                    })?;
                let rebound = match (&tag_name, found.as_variant()) {
                    (Some(tag), Some(v)) => Some(Declaration::Variant(v.with_tag(tag))),
                    _ => None,
                };
                match rebound {
                    Some(decl) => Arc::new(decl),
                    None => found,
                }
            }
            (None, None) => return Err(invalid("variant", "requires a name or a body")),
        };

        if let Some(tag) = &tag_name {
            self.check_variant_tag(tag, &base)?;
        }
        Ok(base)
    }

    /// Tag validation at declaration time: if the tag identifier is
    /// already in scope it must be an enum whose labels intersect the
    /// variant's field names. A tag that is not yet in scope (typedefs
    /// bound before their tag field exists) is resolved at decode time.
    fn check_variant_tag(
        &self,
        tag: &str,
        variant: &Declaration,
    ) -> Result<(), MetadataError> {
        let Some(variant) = variant.as_variant() else {
            return Ok(());
        };
        let Some(tag_decl) = self.scopes.lookup_identifier_recursive(tag) else {
            return Ok(());
        };
        let Some(tag_enum) = tag_decl.as_enum() else {
            return Err(invalid(
                "variant",
                format!("tag {tag} does not reference an enum"),
            ));
        };
        if !tag_enum.labels().any(|label| variant.has_field(label)) {
            return Err(invalid(
                "variant",
                format!("no label of tag {tag} matches a variant field"),
            ));
        }
        Ok(())
    }

    fn parse_variant_body(
        &mut self,
        body: &[Statement],
        fields: &mut Vec<(String, Arc<Declaration>)>,
    ) -> Result<(), MetadataError> {
        for stmt in body {
            match stmt {
                Statement::Declaration { spec, declarators } => {
                    if declarators.is_empty() {
                        self.parse_type_spec(spec)?;
                    } else {
                        let base = self.parse_type_spec(spec)?;
                        for d in declarators {
                            let decl = self.apply_subscripts(base.clone(), d)?;
                            self.scopes.register_identifier(&d.name, decl.clone())?;
                            fields.push((d.name.clone(), decl));
                        }
                    }
                }
                Statement::TypeDef { spec, declarators } => {
                    self.parse_typedef(spec, declarators)?
                }
                Statement::TypeAlias { spec, alias } => self.parse_typealias(spec, alias)?,
                _ => return Err(invalid("variant", "statement not valid in a variant body")),
            }
        }
        Ok(())
    }

    fn parse_enum_spec(
        &mut self,
        name: Option<&str>,
        container: Option<&TypeSpec>,
        body: Option<&[Enumerator]>,
    ) -> Result<Arc<Declaration>, MetadataError> {
        match (name, body) {
            (_, Some(body)) => {
                let container_decl = match container {
                    Some(spec) => self.parse_type_spec(spec)?,
                    // An enum with no container type uses the scope's
                    // `int` alias.
                    None => self
                        .scopes
                        .lookup_type_recursive("int")
                        .cloned()
                        .ok_or_else(|| MetadataError::TypeNotFound {
                            name: "int".to_string(),
                        })?,
                };
                let Some(container_int) = container_decl.as_integer() else {
                    return Err(invalid("enum", "container type must be an integer"));
                };
                let mut e = EnumDeclaration::new(container_int.clone());
                for enumerator in body {
                    match &enumerator.value {
                        None => e.add_next(&enumerator.label)?,
                        Some(EnumeratorValue::Single(n)) => {
                            let v = scalars::parse_unary_integer(n)?;
                            e.add(v, v, &enumerator.label)?;
                        }
                        Some(EnumeratorValue::Range(low, high)) => {
                            let low = scalars::parse_unary_integer(low)?;
                            let high = scalars::parse_unary_integer(high)?;
                            e.add(low, high, &enumerator.label)?;
                        }
                    }
                }
                let decl = Arc::new(Declaration::Enum(e));
                if let Some(name) = name {
                    self.scopes.register_enum(name, decl.clone())?;
                }
                Ok(decl)
            }
            (Some(name), None) => self
                .scopes
                .lookup_enum_recursive(name)
                .cloned()
                .ok_or_else(|| MetadataError::TypeNotFound {
                    name: format!("enum {name}"),
                }),
            (None, None) => Err(invalid("enum", "requires a name or a body")),
        }
    }

    // ---- declarators -----------------------------------------------------

    /// Wrap `base` per trailing subscript, innermost last.
    fn apply_subscripts(
        &mut self,
        base: Arc<Declaration>,
        declarator: &Declarator,
    ) -> Result<Arc<Declaration>, MetadataError> {
        let mut decl = base;
        for len in declarator.lengths.iter().rev() {
            decl = match len {
                ArrayLen::Fixed(n) => {
                    let length = scalars::parse_unary_u64(n)?;
                    Arc::new(Declaration::Array(ArrayDeclaration::new(length, decl)))
                }
                ArrayLen::Dynamic(raw) => {
                    let path = FieldPath::parse(raw);
                    self.check_sequence_length(&path)?;
                    Arc::new(Declaration::Sequence(SequenceDeclaration::new(path, decl)))
                }
            };
        }
        Ok(decl)
    }

    /// A relative length reference must name an already-declared unsigned
    /// integer. Scope-prefixed references are resolved at decode time
    /// against the dynamic definitions.
    fn check_sequence_length(&self, path: &FieldPath) -> Result<(), MetadataError> {
        if path.root != PathRoot::Relative || path.components.len() != 1 {
            return Ok(());
        }
        let name = &path.components[0];
        let decl = self
            .scopes
            .lookup_identifier_recursive(name)
            .ok_or_else(|| MetadataError::TypeNotFound {
                name: format!("sequence length field {name}"),
            })?;
        match decl.as_integer() {
            Some(i) if !i.signed => Ok(()),
            Some(_) => Err(invalid(
                "sequence",
                format!("length field {name} must be an unsigned integer"),
            )),
            None => Err(invalid(
                "sequence",
                format!("length field {name} is not an integer"),
            )),
        }
    }
}

// ---- attribute value helpers --------------------------------------------

fn attr_expr<'a>(
    value: &'a AttributeValue,
    attribute: &str,
) -> Result<&'a UnaryExpression, MetadataError> {
    match value {
        AttributeValue::Expr(e) => Ok(e),
        AttributeValue::Path(p) => Err(invalid(
            attribute,
            format!("unexpected path value {}", p.join(".")),
        )),
    }
}

fn attr_number<'a>(
    value: &'a AttributeValue,
    attribute: &str,
) -> Result<&'a super::ast::UnaryNumber, MetadataError> {
    match attr_expr(value, attribute)? {
        UnaryExpression::Number(n) => Ok(n),
        _ => Err(invalid(attribute, "expected a number")),
    }
}

fn attr_u64(value: &AttributeValue, attribute: &str) -> Result<u64, MetadataError> {
    scalars::parse_unary_u64(attr_number(value, attribute)?)
}

fn attr_i64(value: &AttributeValue, attribute: &str) -> Result<i64, MetadataError> {
    scalars::parse_unary_integer(attr_number(value, attribute)?)
}

fn attr_string(value: &AttributeValue, attribute: &str) -> Result<String, MetadataError> {
    scalars::parse_unary_string(attr_expr(value, attribute)?)
}

/// Stringified attribute value for env entries and free-form event
/// attributes.
fn attr_display(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Expr(UnaryExpression::Ident(s))
        | AttributeValue::Expr(UnaryExpression::Quoted(s)) => s.clone(),
        AttributeValue::Expr(UnaryExpression::Number(n)) => {
            match scalars::parse_unary_integer(n) {
                Ok(v) => v.to_string(),
                Err(_) => n.digits.clone(),
            }
        }
        AttributeValue::Path(p) => p.join("."),
    }
}

fn parse_encoding(value: &AttributeValue) -> Result<Encoding, MetadataError> {
    let token = attr_string(value, "encoding")?;
    match token.as_str() {
        "none" => Ok(Encoding::None),
        "UTF8" | "utf8" => Ok(Encoding::Utf8),
        "ASCII" | "ascii" => Ok(Encoding::Ascii),
        other => Err(invalid("encoding", format!("unknown encoding {other}"))),
    }
}
