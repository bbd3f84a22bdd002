//! AST node model for the graft engine.
//!
//! The tree is mutable, shared, and reference-aliased: nodes live behind
//! `Rc<RefCell<..>>` handles, statement lists behind shared list handles, and
//! attribute bags may be aliased across nodes. Two operations carry the whole
//! design: `clone_fresh` (structurally independent copy, fresh ids, persistent
//! attributes only) and `transform` (in-place content replacement preserving
//! node identity, so every alias observes the splice without being told).
//!
//! **INVARIANT:** the tree is finite and acyclic. Node identity is the `id`
//! field and nothing else; spans and attribute bags are freely shared.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::attrs::{Attrs, AttrsRef};
use crate::context::MacroContext;
use crate::errors::GraftError;

mod flow;
mod walk;

pub use flow::ends_with;
pub use walk::{walk, walk_symbols, WalkItem, Walker};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Shared handle to a node. Clone the handle to alias the node.
pub type NodeRef = Rc<RefCell<Node>>;

/// Shared handle to a sibling list. Statement injection holds one of these
/// while the list also sits inside its parent node, so insertions are
/// observed from both sides.
pub type NodeList = Rc<RefCell<Vec<NodeRef>>>;

/// A node's preprocessing callback: compile-time code run once per node,
/// free to inject statements and transform the tree through the context.
pub type PreprocessFn = Rc<dyn Fn(&mut MacroContext, &NodeRef) -> Result<(), GraftError>>;

/// Globally unique node identity, monotonically increasing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Allocates the next id. Ids are never reused within a process.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        NodeId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A byte-offset span into a named source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub source: String,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(source: &str, start: usize, end: usize) -> Self {
        Self {
            source: source.to_string(),
            start,
            end,
        }
    }
}

/// Scalar child payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Scalar {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// One child position: a node, a list of nodes, or a scalar.
#[derive(Debug, Clone)]
pub enum Slot {
    Node(NodeRef),
    List(NodeList),
    Scalar(Scalar),
}

impl Slot {
    /// Builds a list slot from plain node handles.
    pub fn list(nodes: Vec<NodeRef>) -> Self {
        Slot::List(Rc::new(RefCell::new(nodes)))
    }
}

/// Conventional tags with engine-level meaning. The grammar itself is owned
/// by the external parser; these are the shapes flow analysis and macro
/// expansion agree on.
pub mod tag {
    /// `[List(statements)]`
    pub const BLOCK: &str = "Block";
    /// `[Node(callee), List(arguments)]`
    pub const CALL: &str = "Call";
    /// `[Node(cond), Node(then Block), Node(else Block | If)?]`
    pub const IF: &str = "If";
    /// `[Node(subject), List(Case nodes), Node(default Block)?]`
    pub const SWITCH: &str = "Switch";
    /// `[Node(value), Node(Block)]`
    pub const CASE: &str = "Case";
    /// `[Node(Block)]`
    pub const DO: &str = "Do";
    /// `[Node(cond), Node(body Block)]`
    pub const WHILE: &str = "While";
    /// `[Node(iter...), Node(body Block)]`; never qualifies for flow exit.
    pub const FOR: &str = "For";
    pub const BREAK: &str = "Break";
    pub const RETURN: &str = "Return";
    /// `[Scalar(payload)]`
    pub const LITERAL: &str = "Literal";
    /// `[Scalar(Str name)]`; its bag is typically a shared symbol bag.
    pub const ID: &str = "Id";
    /// `[Scalar(Int index)]`; an opaque value parked in the registry.
    pub const REGISTRY: &str = "Registry";
}

/// Raw tree shape handed over by the external parser.
#[derive(Debug, Clone)]
pub enum RawShape {
    Tree {
        tag: String,
        span: Option<Span>,
        children: Vec<RawShape>,
    },
    List(Vec<RawShape>),
    Scalar(Scalar),
}

// ============================================================================
// THE NODE
// ============================================================================

pub struct Node {
    /// Variant discriminator; `None` is a bare list.
    pub tag: Option<String>,
    /// The only basis of identity comparison.
    pub id: NodeId,
    /// Position in the original source; absent on purely synthetic nodes.
    pub span: Option<Span>,
    /// Analysis facts; may be aliased by other nodes.
    pub attrs: AttrsRef,
    /// Persistent subset carried across `clone_fresh`.
    pub pattrs: Attrs,
    /// Ordered heterogeneous children.
    pub slots: Vec<Slot>,
    /// Compile-time callback, run at most once.
    pub preprocess: Option<PreprocessFn>,
    /// Whether the callback already ran. Reset on clone: a cloned macro body
    /// is typically re-expanded in a fresh scope.
    pub preprocessed: bool,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Attrs are omitted: bags may reference ancestor nodes and a derive
        // would recurse through them.
        f.debug_struct("Node")
            .field("tag", &self.tag)
            .field("id", &self.id)
            .field("span", &self.span)
            .field("slots", &self.slots)
            .field("preprocessed", &self.preprocessed)
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Allocates a tagged node with a fresh id and its own empty bag.
    pub fn new(tag: &str, slots: Vec<Slot>) -> NodeRef {
        Rc::new(RefCell::new(Node {
            tag: Some(tag.to_string()),
            id: NodeId::next(),
            span: None,
            attrs: Attrs::new_ref(),
            pattrs: Attrs::new(),
            slots,
            preprocess: None,
            preprocessed: false,
        }))
    }

    /// Allocates a bare list node.
    pub fn bare_list(nodes: Vec<NodeRef>) -> NodeRef {
        Rc::new(RefCell::new(Node {
            tag: None,
            id: NodeId::next(),
            span: None,
            attrs: Attrs::new_ref(),
            pattrs: Attrs::new(),
            slots: vec![Slot::list(nodes)],
            preprocess: None,
            preprocessed: false,
        }))
    }

    /// Builds a node tree from a parser's raw shape. Scalars inside list
    /// positions are wrapped as `Literal` leaves so lists stay homogeneous.
    pub fn from_shape(shape: &RawShape) -> NodeRef {
        match shape {
            RawShape::Tree {
                tag,
                span,
                children,
            } => {
                let slots = children
                    .iter()
                    .map(|child| match child {
                        RawShape::Tree { .. } => Slot::Node(Self::from_shape(child)),
                        RawShape::List(items) => {
                            Slot::list(items.iter().map(Self::from_shape).collect())
                        }
                        RawShape::Scalar(s) => Slot::Scalar(s.clone()),
                    })
                    .collect();
                let node = Node::new(tag, slots);
                node.borrow_mut().span = span.clone();
                node
            }
            RawShape::List(items) => Node::bare_list(items.iter().map(Self::from_shape).collect()),
            RawShape::Scalar(s) => Node::literal(s.clone(), None),
        }
    }

    /// A `Literal` leaf carrying a scalar.
    pub fn literal(scalar: Scalar, span: Option<Span>) -> NodeRef {
        let node = Node::new(tag::LITERAL, vec![Slot::Scalar(scalar)]);
        node.borrow_mut().span = span;
        node
    }

    /// An `Id` leaf referencing a name through a shared symbol bag.
    pub fn ident(name: &str, bag: AttrsRef) -> NodeRef {
        let node = Node::new(tag::ID, vec![Slot::Scalar(Scalar::Str(name.to_string()))]);
        node.borrow_mut().attrs = bag;
        node
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn is(&self, tag: &str) -> bool {
        self.tag.as_deref() == Some(tag)
    }

    pub fn node_slot(&self, index: usize) -> Option<NodeRef> {
        match self.slots.get(index) {
            Some(Slot::Node(node)) => Some(node.clone()),
            _ => None,
        }
    }

    pub fn list_slot(&self, index: usize) -> Option<NodeList> {
        match self.slots.get(index) {
            Some(Slot::List(list)) => Some(list.clone()),
            _ => None,
        }
    }

    pub fn scalar_slot(&self, index: usize) -> Option<Scalar> {
        match self.slots.get(index) {
            Some(Slot::Scalar(scalar)) => Some(scalar.clone()),
            _ => None,
        }
    }

    /// The statement list of a `Block` or bare-list node.
    pub fn stmts(&self) -> Option<NodeList> {
        self.list_slot(0)
    }

    /// Resolves this node's span against registered sources; empty when the
    /// span is missing (synthetic nodes with no copied origin).
    pub fn location(&self, sources: &crate::location::SourceMap) -> crate::location::Location {
        match &self.span {
            Some(span) => sources.locate(span),
            None => crate::location::Location::empty(),
        }
    }

    /// Inspector dump of the tree shape. Attribute contents are reduced to
    /// key lists; identity and sharing are not preserved in the output.
    pub fn to_json(&self) -> serde_json::Value {
        let slots: Vec<serde_json::Value> = self
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Node(node) => node.borrow().to_json(),
                Slot::List(list) => serde_json::Value::Array(
                    list.borrow().iter().map(|n| n.borrow().to_json()).collect(),
                ),
                Slot::Scalar(scalar) => {
                    serde_json::to_value(scalar).unwrap_or(serde_json::Value::Null)
                }
            })
            .collect();
        serde_json::json!({
            "tag": self.tag,
            "id": self.id.0,
            "attrs": self.attrs.borrow().iter().map(|(k, _)| k.clone()).collect::<Vec<_>>(),
            "slots": slots,
        })
    }
}

// ============================================================================
// CLONE AND TRANSFORM
// ============================================================================

/// Deep copy with fresh ids throughout. The copy keeps the source span (so
/// errors about generated code still point at a sensible origin) and ONLY
/// the persistent attributes, seeded into a fresh unshared bag; analysis
/// results are not reusable across instantiations. The preprocess flag is
/// reset: the clone is unprocessed again.
pub fn clone_fresh(node: &NodeRef) -> NodeRef {
    let n = node.borrow();
    let pattrs = n.pattrs.clone();
    let slots = n
        .slots
        .iter()
        .map(|slot| match slot {
            Slot::Node(child) => Slot::Node(clone_fresh(child)),
            Slot::List(list) => Slot::list(list.borrow().iter().map(clone_fresh).collect()),
            Slot::Scalar(scalar) => Slot::Scalar(scalar.clone()),
        })
        .collect();
    Rc::new(RefCell::new(Node {
        tag: n.tag.clone(),
        id: NodeId::next(),
        span: n.span.clone(),
        attrs: Rc::new(RefCell::new(Attrs::from_entries_of(&pattrs))),
        pattrs,
        slots,
        preprocess: n.preprocess.clone(),
        preprocessed: false,
    }))
}

/// Overwrites `target`'s discriminator, children and attribute bag with
/// `other`'s, IN PLACE, preserving `target`'s identity so any structure
/// still holding a reference to it observes the replacement. This is how a
/// macro call site becomes its expansion without the parent being told.
/// Transforming with a bare list leaves a plain list behind: the tag is
/// cleared along with every prior scalar field.
pub fn transform(target: &NodeRef, other: &NodeRef) {
    if Rc::ptr_eq(target, other) {
        return;
    }
    let (tag, attrs, pattrs, slots) = {
        let o = other.borrow();
        (
            o.tag.clone(),
            o.attrs.clone(),
            o.pattrs.clone(),
            o.slots.clone(),
        )
    };
    let mut t = target.borrow_mut();
    t.tag = tag;
    t.attrs = attrs;
    t.pattrs = pattrs;
    t.slots = slots;
}
