//! Variant declarations: tagged unions selected by an enum label.

use std::sync::Arc;

use super::Declaration;

/// A tagged union. Exactly one field decodes per value; which one is
/// selected at decode time by looking up the tag field's enum label among
/// the field names.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantDeclaration {
    pub fields: Vec<(String, Arc<Declaration>)>,
    /// Name of the previously decoded enum field that discriminates this
    /// union. Unset for variants declared via typedef and bound when the
    /// variant is used as a field.
    pub tag: Option<String>,
}

impl VariantDeclaration {
    pub fn new(fields: Vec<(String, Arc<Declaration>)>, tag: Option<String>) -> Self {
        VariantDeclaration { fields, tag }
    }

    pub fn field(&self, name: &str) -> Option<&Arc<Declaration>> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Rebind with a concrete tag reference.
    pub fn with_tag(&self, tag: &str) -> Self {
        VariantDeclaration {
            fields: self.fields.clone(),
            tag: Some(tag.to_string()),
        }
    }
}
