//! Lexical scopes for hygienic name resolution.
//!
//! Resolution is an explicit parent-chain walk through `resolve`; there is
//! no implicit global fallback. Bindings map names to SHARED attribute bags,
//! so every reference to a declared name aliases the declaration's bag.
//! Bindings and pragma sets use `im` persistent maps: a `Checkpoint` taken
//! by the hygiene machinery snapshots them in O(1).

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::Scalar;
use crate::attrs::AttrsRef;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// Active compiler pragmas, snapshotted wholesale by checkpoints.
pub type Pragmas = im::HashMap<String, Scalar>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Block,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    parent: Option<ScopeRef>,
    bindings: im::HashMap<String, AttrsRef>,
    /// Set when statements were injected after this scope already began
    /// resolving names; the scope must be revisited before it is Done.
    pub delayed_resolution: bool,
    depth: usize,
}

impl Scope {
    /// The root module scope of a compilation unit.
    pub fn root() -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            kind: ScopeKind::Module,
            parent: None,
            bindings: im::HashMap::new(),
            delayed_resolution: false,
            depth: 0,
        }))
    }

    pub fn child(parent: &ScopeRef, kind: ScopeKind) -> ScopeRef {
        let depth = parent.borrow().depth + 1;
        Rc::new(RefCell::new(Scope {
            kind,
            parent: Some(parent.clone()),
            bindings: im::HashMap::new(),
            delayed_resolution: false,
            depth,
        }))
    }

    pub fn parent(&self) -> Option<ScopeRef> {
        self.parent.clone()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Binds a name to a shared bag in this scope, shadowing outer bindings.
    pub fn define(&mut self, name: &str, attrs: AttrsRef) {
        self.bindings.insert(name.to_string(), attrs);
    }

    /// Explicit chain walk; `None` means unbound. No global fallback.
    pub fn resolve(scope: &ScopeRef, name: &str) -> Option<AttrsRef> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            let sb = s.borrow();
            if let Some(found) = sb.bindings.get(name) {
                return Some(found.clone());
            }
            current = sb.parent.clone();
        }
        None
    }

    /// The innermost enclosing function scope, if any.
    pub fn innermost_function(scope: &ScopeRef) -> Option<ScopeRef> {
        let mut current = Some(scope.clone());
        while let Some(s) = current {
            if s.borrow().kind == ScopeKind::Function {
                return Some(s);
            }
            current = s.borrow().parent.clone();
        }
        None
    }

    /// Nearest scope on both chains. Walks the deeper chain up to equal
    /// depth, then both in lockstep until the handles coincide.
    pub fn common_ancestor(a: &ScopeRef, b: &ScopeRef) -> Option<ScopeRef> {
        let mut a = Some(a.clone());
        let mut b = Some(b.clone());
        while let (Some(sa), Some(sb)) = (a.clone(), b.clone()) {
            let (da, db) = (sa.borrow().depth, sb.borrow().depth);
            if da > db {
                a = sa.borrow().parent.clone();
            } else if db > da {
                b = sb.borrow().parent.clone();
            } else if Rc::ptr_eq(&sa, &sb) {
                return Some(sa);
            } else {
                a = sa.borrow().parent.clone();
                b = sb.borrow().parent.clone();
            }
        }
        None
    }
}

#[cfg(test)]
mod scope_tests {
    use super::*;
    use crate::attrs::Attrs;

    #[test]
    fn resolve_walks_the_chain_without_fallback() {
        let root = Scope::root();
        let inner = Scope::child(&root, ScopeKind::Block);
        let bag = Attrs::new_ref();
        root.borrow_mut().define("x", bag.clone());
        let found = Scope::resolve(&inner, "x").expect("outer binding visible");
        assert!(Rc::ptr_eq(&found, &bag));
        assert!(Scope::resolve(&inner, "y").is_none());
    }

    #[test]
    fn shadowing_resolves_to_the_innermost_binding() {
        let root = Scope::root();
        let inner = Scope::child(&root, ScopeKind::Block);
        let outer_bag = Attrs::new_ref();
        let inner_bag = Attrs::new_ref();
        root.borrow_mut().define("x", outer_bag);
        inner.borrow_mut().define("x", inner_bag.clone());
        let found = Scope::resolve(&inner, "x").unwrap();
        assert!(Rc::ptr_eq(&found, &inner_bag));
    }

    #[test]
    fn common_ancestor_finds_the_shared_scope() {
        let root = Scope::root();
        let func = Scope::child(&root, ScopeKind::Function);
        let left = Scope::child(&func, ScopeKind::Block);
        let right = Scope::child(&func, ScopeKind::Block);
        let deep = Scope::child(&left, ScopeKind::Block);
        let shared = Scope::common_ancestor(&deep, &right).unwrap();
        assert!(Rc::ptr_eq(&shared, &func));
    }

    #[test]
    fn innermost_function_skips_block_scopes() {
        let root = Scope::root();
        let func = Scope::child(&root, ScopeKind::Function);
        let block = Scope::child(&func, ScopeKind::Block);
        let found = Scope::innermost_function(&block).unwrap();
        assert!(Rc::ptr_eq(&found, &func));
        assert!(Scope::innermost_function(&root).is_none());
    }
}
