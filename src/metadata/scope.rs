//! Declaration scopes.
//!
//! A scope tree mirrors the TSDL lexical nesting (trace > stream > event >
//! struct/variant bodies). The tree is an arena of nodes addressed by
//! index with parent back-references as indices, not object pointers;
//! nodes are created on block entry and the cursor pops back out on block
//! exit, but registered declarations stay reachable through the arena for
//! the life of the trace.
//!
//! Each node holds five independent namespaces: type aliases, structs,
//! variants, enums, and field identifiers. Lookup walks the parent chain
//! and returns the nearest match, so inner declarations shadow outer ones
//! without overwriting them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::decl::{ByteOrder, Declaration};
use crate::error::MetadataError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Namespace {
    Types,
    Structs,
    Variants,
    Enums,
    Identifiers,
}

#[derive(Debug, Default)]
struct ScopeNode {
    parent: Option<usize>,
    #[allow(dead_code)]
    name: String,
    types: HashMap<String, Arc<Declaration>>,
    structs: HashMap<String, Arc<Declaration>>,
    variants: HashMap<String, Arc<Declaration>>,
    enums: HashMap<String, Arc<Declaration>>,
    identifiers: HashMap<String, Arc<Declaration>>,
}

impl ScopeNode {
    fn map(&self, ns: Namespace) -> &HashMap<String, Arc<Declaration>> {
        match ns {
            Namespace::Types => &self.types,
            Namespace::Structs => &self.structs,
            Namespace::Variants => &self.variants,
            Namespace::Enums => &self.enums,
            Namespace::Identifiers => &self.identifiers,
        }
    }

    fn map_mut(&mut self, ns: Namespace) -> &mut HashMap<String, Arc<Declaration>> {
        match ns {
            Namespace::Types => &mut self.types,
            Namespace::Structs => &mut self.structs,
            Namespace::Variants => &mut self.variants,
            Namespace::Enums => &mut self.enums,
            Namespace::Identifiers => &mut self.identifiers,
        }
    }
}

#[derive(Debug)]
pub struct ScopeArena {
    nodes: Vec<ScopeNode>,
    current: usize,
}

impl Default for ScopeArena {
    fn default() -> Self {
        ScopeArena::new()
    }
}

impl ScopeArena {
    pub fn new() -> Self {
        ScopeArena {
            nodes: vec![ScopeNode {
                parent: None,
                name: "root".to_string(),
                ..Default::default()
            }],
            current: 0,
        }
    }

    /// Create and enter a child of the current scope.
    pub fn push_scope(&mut self, name: &str) {
        let node = ScopeNode {
            parent: Some(self.current),
            name: name.to_string(),
            ..Default::default()
        };
        self.nodes.push(node);
        self.current = self.nodes.len() - 1;
    }

    /// Return to the parent scope. Popping the root is a programming
    /// error.
    pub fn pop_scope(&mut self) {
        match self.nodes[self.current].parent {
            Some(parent) => self.current = parent,
            None => debug_assert!(false, "popped the root scope"),
        }
    }

    fn register(
        &mut self,
        ns: Namespace,
        name: &str,
        decl: Arc<Declaration>,
    ) -> Result<(), MetadataError> {
        let map = self.nodes[self.current].map_mut(ns);
        if map.contains_key(name) {
            return Err(MetadataError::DuplicateDeclaration {
                name: name.to_string(),
            });
        }
        map.insert(name.to_string(), decl);
        Ok(())
    }

    pub fn register_type(&mut self, name: &str, decl: Arc<Declaration>) -> Result<(), MetadataError> {
        self.register(Namespace::Types, name, decl)
    }

    pub fn register_struct(
        &mut self,
        name: &str,
        decl: Arc<Declaration>,
    ) -> Result<(), MetadataError> {
        self.register(Namespace::Structs, name, decl)
    }

    pub fn register_variant(
        &mut self,
        name: &str,
        decl: Arc<Declaration>,
    ) -> Result<(), MetadataError> {
        self.register(Namespace::Variants, name, decl)
    }

    pub fn register_enum(&mut self, name: &str, decl: Arc<Declaration>) -> Result<(), MetadataError> {
        self.register(Namespace::Enums, name, decl)
    }

    pub fn register_identifier(
        &mut self,
        name: &str,
        decl: Arc<Declaration>,
    ) -> Result<(), MetadataError> {
        self.register(Namespace::Identifiers, name, decl)
    }

    fn lookup_recursive(&self, ns: Namespace, name: &str) -> Option<&Arc<Declaration>> {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            if let Some(found) = self.nodes[i].map(ns).get(name) {
                return Some(found);
            }
            idx = self.nodes[i].parent;
        }
        None
    }

    pub fn lookup_type_recursive(&self, name: &str) -> Option<&Arc<Declaration>> {
        self.lookup_recursive(Namespace::Types, name)
    }

    pub fn lookup_struct_recursive(&self, name: &str) -> Option<&Arc<Declaration>> {
        self.lookup_recursive(Namespace::Structs, name)
    }

    pub fn lookup_variant_recursive(&self, name: &str) -> Option<&Arc<Declaration>> {
        self.lookup_recursive(Namespace::Variants, name)
    }

    pub fn lookup_enum_recursive(&self, name: &str) -> Option<&Arc<Declaration>> {
        self.lookup_recursive(Namespace::Enums, name)
    }

    pub fn lookup_identifier_recursive(&self, name: &str) -> Option<&Arc<Declaration>> {
        self.lookup_recursive(Namespace::Identifiers, name)
    }

    /// Overwrite an existing type binding in place, walking outward from
    /// the current scope. Used only by the byte-order repair pass; there
    /// is no error path for new names because repair never invents one.
    pub fn replace_type(&mut self, name: &str, decl: Arc<Declaration>) -> Result<(), MetadataError> {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            if self.nodes[i].types.contains_key(name) {
                self.nodes[i].types.insert(name.to_string(), decl);
                return Ok(());
            }
            idx = self.nodes[i].parent;
        }
        Err(MetadataError::TypeNotFound {
            name: name.to_string(),
        })
    }

    /// The one-time byte-order repair: rebuild every declaration whose
    /// byte order was left to `native` in every scope that exists so far.
    pub fn repair_byte_order(&mut self, order: ByteOrder) {
        for node in &mut self.nodes {
            for ns in [
                Namespace::Types,
                Namespace::Structs,
                Namespace::Variants,
                Namespace::Enums,
                Namespace::Identifiers,
            ] {
                let map = node.map_mut(ns);
                let fixes: Vec<(String, Arc<Declaration>)> = map
                    .iter()
                    .filter_map(|(name, decl)| {
                        decl.repaired(order).map(|fixed| (name.clone(), Arc::new(fixed)))
                    })
                    .collect();
                for (name, fixed) in fixes {
                    map.insert(name, fixed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{DisplayBase, Encoding, IntegerDeclaration};

    fn int_decl(order: Option<ByteOrder>) -> Arc<Declaration> {
        Arc::new(Declaration::Integer(
            IntegerDeclaration::new(
                32,
                false,
                DisplayBase::Decimal,
                order,
                Encoding::None,
                8,
                None,
            )
            .unwrap(),
        ))
    }

    #[test]
    fn test_recursive_lookup_and_shadowing() {
        let mut arena = ScopeArena::new();
        arena.register_type("u32", int_decl(Some(ByteOrder::Little))).unwrap();

        arena.push_scope("stream");
        assert!(arena.lookup_type_recursive("u32").is_some());

        // Shadow in the inner scope; the outer binding survives the pop.
        arena.register_type("u32", int_decl(Some(ByteOrder::Big))).unwrap();
        let inner = arena.lookup_type_recursive("u32").unwrap();
        assert!(
            matches!(&**inner, Declaration::Integer(i) if i.byte_order == ByteOrder::Big)
        );
        arena.pop_scope();
        let outer = arena.lookup_type_recursive("u32").unwrap();
        assert!(
            matches!(&**outer, Declaration::Integer(i) if i.byte_order == ByteOrder::Little)
        );
    }

    #[test]
    fn test_duplicate_in_same_scope_fails() {
        let mut arena = ScopeArena::new();
        arena.register_struct("s", int_decl(None)).unwrap();
        assert!(arena.register_struct("s", int_decl(None)).is_err());
        // A different namespace is fine.
        assert!(arena.register_variant("s", int_decl(None)).is_ok());
    }

    #[test]
    fn test_lookup_not_found() {
        let arena = ScopeArena::new();
        assert!(arena.lookup_type_recursive("missing").is_none());
    }

    #[test]
    fn test_replace_type() {
        let mut arena = ScopeArena::new();
        arena.register_type("t", int_decl(None)).unwrap();
        arena.push_scope("inner");
        arena
            .replace_type("t", int_decl(Some(ByteOrder::Big)))
            .unwrap();
        arena.pop_scope();
        let d = arena.lookup_type_recursive("t").unwrap();
        assert!(matches!(&**d, Declaration::Integer(i) if i.byte_order == ByteOrder::Big));
        assert!(arena.replace_type("missing", int_decl(None)).is_err());
    }

    #[test]
    fn test_repair_byte_order() {
        let mut arena = ScopeArena::new();
        arena.register_type("native_int", int_decl(None)).unwrap();
        arena.register_type("fixed_int", int_decl(Some(ByteOrder::Little))).unwrap();

        arena.repair_byte_order(ByteOrder::Big);

        let repaired = arena.lookup_type_recursive("native_int").unwrap();
        assert!(
            matches!(&**repaired, Declaration::Integer(i) if i.byte_order == ByteOrder::Big)
        );
        let fixed = arena.lookup_type_recursive("fixed_int").unwrap();
        assert!(
            matches!(&**fixed, Declaration::Integer(i) if i.byte_order == ByteOrder::Little)
        );
    }
}
