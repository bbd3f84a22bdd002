//! Compile-time values traded between macro code and the engine.
//!
//! Macro callbacks receive and return these: plain scalars, tree fragments,
//! symbol bags, spread markers for argument splicing, and callables (plain
//! macros plus the generic/concept callbacks the external type system
//! invokes). Equality is structural for scalars and identity-based for every
//! reference variant; `identity_key` exposes that notion of sameness as a
//! hashable key for the registry and memoization caches.

use std::fmt;
use std::rc::Rc;

use crate::ast::{NodeRef, Scalar};
use crate::attrs::AttrsRef;
use crate::context::MacroContext;
use crate::errors::GraftError;

/// A compile-time callable: receives the context and reduced arguments,
/// optionally returns a value to be injected at the call position.
pub type CtFunc = Rc<dyn Fn(&mut MacroContext, &[Value]) -> Result<Option<Value>, GraftError>>;

/// A deferred callback queued for a later analyzer pass.
pub type DeferredFn = Rc<dyn Fn(&mut MacroContext) -> Result<(), GraftError>>;

/// Canonical compile-time value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A tree fragment, shared by reference.
    Node(NodeRef),
    /// A symbol: the shared attribute bag of a declared name.
    Sym(AttrsRef),
    /// Spread marker: splices one sibling slot per element at injection.
    Spread(Vec<Value>),
    /// A macro callable.
    Func(CtFunc),
    /// A callable the type system invokes to compute an instantiation type.
    Generic(CtFunc),
    /// A callable the type system invokes for a constraint match verdict.
    Concept(CtFunc),
}

/// Hashable identity of a value: structural for scalars, pointer or node id
/// for reference variants. Two values with equal keys are "the same value"
/// for registry and memoization purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Nil,
    Bool(bool),
    Int(i64),
    /// Float bit pattern; NaN payloads included, so each NaN is itself.
    Float(u64),
    Str(String),
    Node(u64),
    Ptr(usize),
    Seq(Vec<IdentityKey>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::Node(_) => "Node",
            Value::Sym(_) => "Sym",
            Value::Spread(_) => "Spread",
            Value::Func(_) => "Func",
            Value::Generic(_) => "Generic",
            Value::Concept(_) => "Concept",
        }
    }

    /// Nil and false are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_node(&self) -> Option<NodeRef> {
        match self {
            Value::Node(node) => Some(node.clone()),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<CtFunc> {
        match self {
            Value::Func(f) | Value::Generic(f) | Value::Concept(f) => Some(Rc::clone(f)),
            _ => None,
        }
    }

    /// The scalar payload, when this value has one.
    pub fn to_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Nil => Some(Scalar::Nil),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Int(i) => Some(Scalar::Int(*i)),
            Value::Float(x) => Some(Scalar::Float(*x)),
            Value::Str(s) => Some(Scalar::Str(s.clone())),
            _ => None,
        }
    }

    pub fn identity_key(&self) -> IdentityKey {
        match self {
            Value::Nil => IdentityKey::Nil,
            Value::Bool(b) => IdentityKey::Bool(*b),
            Value::Int(i) => IdentityKey::Int(*i),
            Value::Float(x) => IdentityKey::Float(x.to_bits()),
            Value::Str(s) => IdentityKey::Str(s.clone()),
            Value::Node(node) => IdentityKey::Node(node.borrow().id.0),
            Value::Sym(bag) => IdentityKey::Ptr(Rc::as_ptr(bag) as usize),
            Value::Spread(items) => {
                IdentityKey::Seq(items.iter().map(Value::identity_key).collect())
            }
            Value::Func(f) | Value::Generic(f) | Value::Concept(f) => {
                IdentityKey::Ptr(Rc::as_ptr(f) as *const () as usize)
            }
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Nil => Value::Nil,
            Scalar::Bool(b) => Value::Bool(b),
            Scalar::Int(i) => Value::Int(i),
            Scalar::Float(x) => Value::Float(x),
            Scalar::Str(s) => Value::Str(s),
        }
    }
}

impl From<&crate::attrs::AttrValue> for Value {
    fn from(attr: &crate::attrs::AttrValue) -> Self {
        use crate::attrs::AttrValue;
        match attr {
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Int(i) => Value::Int(*i),
            AttrValue::Float(x) => Value::Float(*x),
            AttrValue::Str(s) => Value::Str(s.clone()),
            AttrValue::Node(node) => Value::Node(node.clone()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.identity_key() == other.identity_key()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Node(node) => write!(f, "Node(#{})", node.borrow().id.0),
            Value::Sym(bag) => write!(f, "Sym({:p})", Rc::as_ptr(bag)),
            Value::Spread(items) => f.debug_tuple("Spread").field(items).finish(),
            Value::Func(_) => write!(f, "Func(<fn>)"),
            Value::Generic(_) => write!(f, "Generic(<fn>)"),
            Value::Concept(_) => write!(f, "Concept(<fn>)"),
        }
    }
}
