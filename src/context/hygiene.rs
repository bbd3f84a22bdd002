//! Hygienic closures and memoized type callbacks.
//!
//! `hygienize` is what makes expansion hygienic: a wrapped macro always runs
//! inside its DEFINITION-TIME environment (lexical scope, enclosing-function
//! marker, pragmas, statement cursor), never the caller's, so its free
//! identifiers resolve against the scope visible when it was defined
//! regardless of where or how often it is invoked.

use std::collections::HashMap;
use std::rc::Rc;

use crate::scope::Scope;
use crate::value::{CtFunc, IdentityKey, Value};

use super::MacroContext;

impl MacroContext {
    /// Wraps `func` so every call restores the definition-time environment
    /// before running it and restores the caller's environment afterward,
    /// also on error. If the wrapped call injects top-level statements
    /// (its definition cursor advances or its list grows), the nearest scope
    /// shared by the call site and the definition site is marked for
    /// delayed resolution: code appeared after that scope already began
    /// resolving names and it must be revisited.
    pub fn hygienize(&mut self, func: CtFunc) -> CtFunc {
        let definition = self.checkpoint();
        Rc::new(move |ctx: &mut MacroContext, args: &[Value]| {
            let (caller_scope, caller_func, caller_pragmas) = ctx.swap_env(
                definition.scope.clone(),
                definition.func_scope.clone(),
                definition.pragmas.clone(),
            );
            let mut watermark = None;
            if let Some(frame) = definition.frame.clone() {
                watermark = Some((frame.list.borrow().len(), frame.cursor));
                ctx.statements.push(frame);
            }
            let result = (*func)(ctx, args);
            let mut advanced = false;
            if let Some((length_before, cursor_before)) = watermark {
                if let Some(frame) = ctx.statements.pop() {
                    let grew = frame.list.borrow().len() > length_before;
                    let moved = match (frame.cursor, cursor_before) {
                        (Some(now), Some(then)) => now > then,
                        _ => false,
                    };
                    advanced = grew || moved;
                }
            }
            if advanced {
                if let Some(shared) = Scope::common_ancestor(&caller_scope, &definition.scope) {
                    shared.borrow_mut().delayed_resolution = true;
                }
            }
            ctx.swap_env(caller_scope, caller_func, caller_pragmas);
            result
        })
    }

    /// Registers a generic-type callback: the external type system invokes
    /// it with concrete instantiation arguments to obtain a result type.
    pub fn generic(&mut self, func: CtFunc) -> Value {
        Value::Generic(func)
    }

    /// Registers a concept callback: invoked by the type system to obtain a
    /// match verdict for a constraint.
    pub fn concept(&mut self, func: CtFunc) -> Value {
        Value::Concept(func)
    }

    /// `generic(memoize(hygienize(func)))`: a hygienic generic whose
    /// identical instantiation arguments always yield the identical cached
    /// result object.
    pub fn generalize(&mut self, func: CtFunc) -> Value {
        let hygienic = self.hygienize(func);
        self.generic(memoize(hygienic))
    }
}

/// Wraps `func` with a structural-identity cache: arguments with equal
/// identity keys return the cached result without re-running `func`. Cached
/// reference values come back as the identical object (shared handle), which
/// is what guarantees one result type per distinct instantiation.
pub fn memoize(func: CtFunc) -> CtFunc {
    let cache: Rc<std::cell::RefCell<HashMap<Vec<IdentityKey>, Option<Value>>>> =
        Rc::new(std::cell::RefCell::new(HashMap::new()));
    Rc::new(move |ctx: &mut MacroContext, args: &[Value]| {
        let key: Vec<IdentityKey> = args.iter().map(Value::identity_key).collect();
        if let Some(hit) = cache.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let computed = (*func)(ctx, args)?;
        cache.borrow_mut().insert(key, computed.clone());
        Ok(computed)
    })
}
