//! Hygiene: macros resolve names against their definition environment.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use graft::prelude::*;

/// A macro defined while one `x` is in scope, invoked from a context that
/// defines a different `x`, must resolve the original `x`.
#[test]
fn free_identifiers_resolve_against_the_definition_scope() {
    let mut ctx = null_context();

    let definition_bag = Attrs::new_ref();
    ctx.push_scope(ScopeKind::Block);
    ctx.define("x", definition_bag.clone());

    let seen: Rc<RefCell<Vec<Option<AttrsRef>>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    let body: CtFunc = Rc::new(move |ctx, _args| {
        seen_clone.borrow_mut().push(ctx.resolve("x"));
        Ok(None)
    });
    let hygienic = ctx.hygienize(body);
    ctx.pop_scope().unwrap();

    // Call site shadows `x` with a different binding.
    ctx.push_scope(ScopeKind::Block);
    let call_site_bag = Attrs::new_ref();
    ctx.define("x", call_site_bag.clone());

    (*hygienic)(&mut ctx, &[]).unwrap();
    (*hygienic)(&mut ctx, &[]).unwrap();

    for resolved in seen.borrow().iter() {
        let bag = resolved.clone().expect("macro saw an x");
        assert!(Rc::ptr_eq(&bag, &definition_bag));
        assert!(!Rc::ptr_eq(&bag, &call_site_bag));
    }

    // The caller's environment is back.
    let after = ctx.resolve("x").unwrap();
    assert!(Rc::ptr_eq(&after, &call_site_bag));
}

#[test]
fn pragmas_and_cursor_are_part_of_the_restored_environment() {
    let mut ctx = null_context();
    ctx.set_pragma("optimize", Scalar::Int(2));
    let definition_list = shared_list(vec![]);
    ctx.push_statements(definition_list.clone());

    let observed: Rc<RefCell<Option<Scalar>>> = Rc::new(RefCell::new(None));
    let observed_clone = observed.clone();
    let body: CtFunc = Rc::new(move |ctx, _args| {
        *observed_clone.borrow_mut() = ctx.pragma("optimize");
        ctx.inject_statement(&Node::literal(Scalar::Int(1), None), true)?;
        Ok(None)
    });
    let hygienic = ctx.hygienize(body);
    ctx.pop_statements().unwrap();

    // Different pragmas and no frame at the call site.
    ctx.set_pragma("optimize", Scalar::Int(0));
    (*hygienic)(&mut ctx, &[]).unwrap();

    assert_eq!(*observed.borrow(), Some(Scalar::Int(2)));
    // The injection landed in the definition-time list.
    assert_eq!(definition_list.borrow().len(), 1);
    // Caller pragmas restored.
    assert_eq!(ctx.pragma("optimize"), Some(Scalar::Int(0)));
    assert_eq!(ctx.statement_depth(), 0);
}

#[test]
fn top_level_injection_marks_the_shared_scope_for_delayed_resolution() {
    let mut ctx = null_context();
    let root = ctx.scope();

    ctx.push_scope(ScopeKind::Block);
    ctx.push_statements(shared_list(vec![]));
    let body: CtFunc = Rc::new(|ctx, _args| {
        ctx.inject_statement(&Node::literal(Scalar::Int(1), None), true)?;
        Ok(None)
    });
    let hygienic = ctx.hygienize(body);
    ctx.pop_statements().unwrap();
    ctx.pop_scope().unwrap();

    ctx.push_scope(ScopeKind::Block);
    assert!(!root.borrow().delayed_resolution);
    (*hygienic)(&mut ctx, &[]).unwrap();
    assert!(root.borrow().delayed_resolution);
}

#[test]
fn environment_is_restored_even_when_the_body_errors() {
    let mut ctx = null_context();
    ctx.push_scope(ScopeKind::Block);
    let body: CtFunc = Rc::new(|ctx, _args| Err(ctx.static_error("deliberate")));
    let hygienic = ctx.hygienize(body);
    ctx.pop_scope().unwrap();

    let caller_scope = ctx.scope();
    let err = (*hygienic)(&mut ctx, &[]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Static);
    assert!(Rc::ptr_eq(&ctx.scope(), &caller_scope));
}

#[test]
fn generalize_caches_by_structural_identity() {
    let mut ctx = null_context();
    let calls = Rc::new(RefCell::new(0usize));
    let calls_clone = calls.clone();
    let instantiate: CtFunc = Rc::new(move |_ctx, args| {
        *calls_clone.borrow_mut() += 1;
        let result = Node::new(tag::ID, vec![Slot::Scalar(Scalar::Str(format!(
            "instance_{}",
            args.len()
        )))]);
        Ok(Some(Value::Node(result)))
    });
    let generic = ctx.generalize(instantiate);

    let first = ctx
        .invoke_callable(&generic, &[Value::Int(1), Value::Str("a".into())])
        .unwrap()
        .unwrap();
    let second = ctx
        .invoke_callable(&generic, &[Value::Int(1), Value::Str("a".into())])
        .unwrap()
        .unwrap();
    let third = ctx
        .invoke_callable(&generic, &[Value::Int(2), Value::Str("a".into())])
        .unwrap()
        .unwrap();

    // Identical instantiation arguments yield the identical result object.
    assert_eq!(*calls.borrow(), 2);
    let (first, second, third) = match (first, second, third) {
        (Value::Node(a), Value::Node(b), Value::Node(c)) => (a, b, c),
        other => panic!("expected node results, got {:?}", other),
    };
    assert!(Rc::ptr_eq(&first, &second));
    assert!(!Rc::ptr_eq(&first, &third));
}

#[test]
fn concept_callbacks_produce_match_verdicts() {
    let mut ctx = null_context();
    let verdict: CtFunc = Rc::new(|_ctx, args| {
        Ok(Some(Value::Bool(matches!(args.first(), Some(Value::Int(_))))))
    });
    let concept = ctx.concept(verdict);

    let yes = ctx.invoke_callable(&concept, &[Value::Int(3)]).unwrap();
    let no = ctx
        .invoke_callable(&concept, &[Value::Str("nope".into())])
        .unwrap();
    assert_eq!(yes, Some(Value::Bool(true)));
    assert_eq!(no, Some(Value::Bool(false)));
}

#[test]
fn non_callables_are_rejected_by_invoke() {
    let mut ctx = null_context();
    let err = ctx.invoke_callable(&Value::Int(1), &[]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Internal);
}
