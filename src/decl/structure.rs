//! Struct declarations: ordered named fields.

use std::sync::Arc;

use super::Declaration;

/// One named member of a struct.
#[derive(Clone, Debug, PartialEq)]
pub struct StructField {
    pub name: String,
    pub declaration: Arc<Declaration>,
}

impl StructField {
    pub fn new(name: &str, declaration: Arc<Declaration>) -> Self {
        StructField {
            name: name.to_string(),
            declaration,
        }
    }
}

/// An ordered sequence of named fields, decoded front to back with each
/// field aligned to its own alignment. The struct's alignment is the
/// maximum of its fields' alignments and any explicit `align(n)`.
#[derive(Clone, Debug, PartialEq)]
pub struct StructDeclaration {
    pub fields: Vec<StructField>,
    pub alignment: u64,
}

impl StructDeclaration {
    pub fn new(min_align: u64, fields: Vec<StructField>) -> Self {
        let mut alignment = min_align.max(1);
        for field in &fields {
            alignment = alignment.max(field.declaration.alignment());
        }
        StructDeclaration { fields, alignment }
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}
