//! Attribute bags: mergeable key/value stores of analysis facts.
//!
//! Every node carries a bag; the bag may be SHARED by multiple nodes (all
//! references to one declared name alias one bag), so bags live behind
//! `AttrsRef` reference-counted cells and are never duplicated by value -
//! identity of the bag, not its contents, is what aliasing nodes observe.
//!
//! The external analyzer may promote a bag to a Symbol (scope membership,
//! declaration site); this crate only models that capability. The derived
//! predicates at the bottom are pure functions of the bag consumed by the
//! downstream code generator; their logic is codegen policy but their
//! surface is part of this component's contract.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::{NodeRef, Span};
use crate::errors::{self, GraftError};

/// Shared handle to a bag. Clone the handle, never the bag.
pub type AttrsRef = Rc<RefCell<Attrs>>;

// ============================================================================
// WELL-KNOWN KEYS
// ============================================================================

/// Attribute keys with engine-level meaning. Anything else is free-form.
pub mod key {
    /// Resolved type name.
    pub const TYPE: &str = "type";
    /// Known constant value.
    pub const VALUE: &str = "value";
    /// Declared constant.
    pub const CONST: &str = "const";
    /// Compile-time-only entity; folded away before codegen.
    pub const COMPTIME: &str = "comptime";
    /// Static storage duration.
    pub const STATIC: &str = "static";
    /// Exported to other compilation units.
    pub const EXPORT: &str = "export";
    /// Imported from another compilation unit.
    pub const IMPORT: &str = "import";
    /// Suppresses the implicit zero initializer.
    pub const NOINIT: &str = "noinit";
}

// ============================================================================
// VALUES
// ============================================================================

/// An attribute value. Node-valued attributes compare by node IDENTITY,
/// not structure: two structurally identical but distinct nodes conflict.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Node(NodeRef),
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a == b,
            (AttrValue::Int(a), AttrValue::Int(b)) => a == b,
            (AttrValue::Float(a), AttrValue::Float(b)) => a == b,
            (AttrValue::Str(a), AttrValue::Str(b)) => a == b,
            (AttrValue::Node(a), AttrValue::Node(b)) => a.borrow().id == b.borrow().id,
            _ => false,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(x) => write!(f, "{}", x),
            AttrValue::Str(s) => write!(f, "{}", s),
            AttrValue::Node(node) => write!(f, "node#{}", node.borrow().id.0),
        }
    }
}

/// Symbol capability granted by promotion: name and declaration site.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub name: String,
    pub decl_span: Option<Span>,
}

// ============================================================================
// THE BAG
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Attrs {
    entries: BTreeMap<String, AttrValue>,
    symbol: Option<SymbolInfo>,
}

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh bag in a shared handle.
    pub fn new_ref() -> AttrsRef {
        Rc::new(RefCell::new(Self::new()))
    }

    /// A fresh bag seeded with another bag's entries only. Used by clone to
    /// carry persistent attributes forward; promotion never carries over.
    pub fn from_entries_of(other: &Attrs) -> Self {
        Self {
            entries: other.entries.clone(),
            symbol: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: &str, value: AttrValue) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// True when the key is present with boolean true.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(AttrValue::Bool(true)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.entries.iter()
    }

    /// Merges `other` into self. Keys absent from self are copied; a key
    /// present in both with unequal values is a fatal `AttributeConflict` -
    /// two independent analyses disagreeing about one symbol is a
    /// miscompilation signal, never silently resolved. No effect beyond
    /// self; associative and commutative over disjoint-key bags.
    pub fn merge(&mut self, other: &Attrs) -> Result<(), GraftError> {
        for (key, value) in other.entries.iter() {
            match self.entries.get(key) {
                Some(existing) if existing != value => {
                    return Err(errors::attribute_conflict(
                        key,
                        existing.to_string(),
                        value.to_string(),
                    ));
                }
                Some(_) => {}
                None => {
                    self.entries.insert(key.clone(), value.clone());
                }
            }
        }
        if self.symbol.is_none() {
            self.symbol = other.symbol.clone();
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Symbol capability
    // ------------------------------------------------------------------------

    /// Promotes this bag to a Symbol. Performed by the external analyzer.
    pub fn promote(&mut self, info: SymbolInfo) {
        self.symbol = Some(info);
    }

    pub fn is_symbol(&self) -> bool {
        self.symbol.is_some()
    }

    pub fn symbol(&self) -> Option<&SymbolInfo> {
        self.symbol.as_ref()
    }

    // ------------------------------------------------------------------------
    // Derived codegen predicates - pure functions of the current fields
    // ------------------------------------------------------------------------

    /// Storage classification derived from the import/static/export flags.
    pub fn storage(&self) -> Storage {
        if self.flag(key::IMPORT) {
            Storage::Extern
        } else if self.flag(key::STATIC) || self.flag(key::EXPORT) {
            Storage::Static
        } else {
            Storage::Auto
        }
    }

    /// Read-only entities: declared const or compile-time-only.
    pub fn is_readonly(&self) -> bool {
        self.flag(key::CONST) || self.flag(key::COMPTIME)
    }

    /// Sign-possibility: can this entity hold a negative value? A known
    /// constant answers exactly; otherwise the type name decides, with
    /// unknown types conservatively treated as possibly negative.
    pub fn is_maybe_negative(&self) -> bool {
        match self.entries.get(key::VALUE) {
            Some(AttrValue::Int(i)) => *i < 0,
            Some(AttrValue::Float(x)) => *x < 0.0,
            _ => match self.entries.get(key::TYPE) {
                Some(AttrValue::Str(name)) => !(name.starts_with('u') || name == "bool"),
                _ => true,
            },
        }
    }

    /// Must a declaration be emitted? Compile-time entities are folded away
    /// and need none; everything else, including imports, is declared.
    pub fn needs_declare(&self) -> bool {
        !self.flag(key::COMPTIME)
    }

    /// Must a definition be emitted? Imports are defined elsewhere and
    /// compile-time entities nowhere.
    pub fn needs_define(&self) -> bool {
        !self.flag(key::IMPORT) && !self.flag(key::COMPTIME)
    }

    /// Should the definition be zero-initialized? Only definitions without
    /// a known value and without an explicit opt-out.
    pub fn wants_zero_init(&self) -> bool {
        self.needs_define() && !self.contains(key::VALUE) && !self.flag(key::NOINIT)
    }
}

/// Storage classification consumed by the code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Ordinary automatic (stack) storage.
    Auto,
    /// Static storage duration in this unit.
    Static,
    /// Defined in another unit.
    Extern,
}

#[cfg(test)]
mod attrs_tests {
    use super::*;
    use crate::ast::{Node, Scalar, Slot};
    use crate::errors::ErrorCategory;

    fn bag(pairs: &[(&str, AttrValue)]) -> Attrs {
        let mut attrs = Attrs::new();
        for (k, v) in pairs {
            attrs.set(k, v.clone());
        }
        attrs
    }

    #[test]
    fn merge_copies_absent_keys() {
        let mut a = bag(&[("type", AttrValue::Str("int64".into()))]);
        let b = bag(&[("const", AttrValue::Bool(true))]);
        a.merge(&b).unwrap();
        assert_eq!(a.get("type"), Some(&AttrValue::Str("int64".into())));
        assert_eq!(a.get("const"), Some(&AttrValue::Bool(true)));
    }

    #[test]
    fn merge_is_commutative_and_associative_over_disjoint_keys() {
        let a = bag(&[("type", AttrValue::Str("int64".into()))]);
        let b = bag(&[("const", AttrValue::Bool(true))]);
        let c = bag(&[("value", AttrValue::Int(7))]);

        let mut ab = a.clone();
        ab.merge(&b).unwrap();
        let mut ba = b.clone();
        ba.merge(&a).unwrap();
        assert_eq!(ab.entries, ba.entries);

        let mut ab_c = ab.clone();
        ab_c.merge(&c).unwrap();
        let mut bc = b.clone();
        bc.merge(&c).unwrap();
        let mut a_bc = a.clone();
        a_bc.merge(&bc).unwrap();
        assert_eq!(ab_c.entries, a_bc.entries);
    }

    #[test]
    fn merge_conflict_is_fatal_never_silent() {
        let mut a = bag(&[("type", AttrValue::Str("int64".into()))]);
        let b = bag(&[("type", AttrValue::Str("float64".into()))]);
        let err = a.merge(&b).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Internal);
        // The original value survives untouched.
        assert_eq!(a.get("type"), Some(&AttrValue::Str("int64".into())));
    }

    #[test]
    fn merge_equal_values_are_not_conflicts() {
        let mut a = bag(&[("value", AttrValue::Int(1))]);
        let b = bag(&[("value", AttrValue::Int(1))]);
        assert!(a.merge(&b).is_ok());
    }

    #[test]
    fn node_valued_attributes_compare_by_identity() {
        let n1 = Node::new("Literal", vec![Slot::Scalar(Scalar::Int(1))]);
        let n2 = Node::new("Literal", vec![Slot::Scalar(Scalar::Int(1))]);
        let mut a = bag(&[("origin", AttrValue::Node(n1.clone()))]);
        // Structurally identical, different instance: conflict.
        let b = bag(&[("origin", AttrValue::Node(n2))]);
        assert!(a.merge(&b).is_err());
        // Same instance: fine.
        let c = bag(&[("origin", AttrValue::Node(n1))]);
        assert!(a.merge(&c).is_ok());
    }

    #[test]
    fn codegen_predicates_follow_flags() {
        let imported = bag(&[("import", AttrValue::Bool(true))]);
        assert_eq!(imported.storage(), Storage::Extern);
        assert!(imported.needs_declare());
        assert!(!imported.needs_define());

        let comptime = bag(&[("comptime", AttrValue::Bool(true))]);
        assert!(!comptime.needs_declare());
        assert!(comptime.is_readonly());

        let plain = bag(&[("type", AttrValue::Str("uint32".into()))]);
        assert_eq!(plain.storage(), Storage::Auto);
        assert!(!plain.is_maybe_negative());
        assert!(plain.wants_zero_init());

        let negative = bag(&[("value", AttrValue::Int(-3))]);
        assert!(negative.is_maybe_negative());
        assert!(!negative.wants_zero_init());
    }
}
