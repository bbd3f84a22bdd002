//! All-paths-terminate analysis.
//!
//! `ends_with` decides whether every control-flow path through a statement
//! list ends in a statement carrying a given tag. The analyzer uses it to
//! enforce "function must return on all paths". It is a pure predicate;
//! unknown or dynamic constructs are conservatively non-qualifying.

use super::{tag, NodeList, NodeRef, Scalar};
use crate::attrs::{key, AttrValue};

/// Does every path through `stmts` end in a statement tagged `target`?
pub fn ends_with(stmts: &NodeList, target: &str) -> bool {
    slice_ends_with(&stmts.borrow(), target)
}

fn slice_ends_with(stmts: &[NodeRef], target: &str) -> bool {
    match stmts.last() {
        Some(last) => node_ends_with(last, target),
        None => false,
    }
}

fn block_ends_with(block: &NodeRef, target: &str) -> bool {
    match block.borrow().stmts() {
        Some(list) => slice_ends_with(&list.borrow(), target),
        None => false,
    }
}

fn node_ends_with(node: &NodeRef, target: &str) -> bool {
    let n = node.borrow();
    let Some(t) = n.tag.as_deref() else {
        // Bare list: behaves as a block.
        return match n.stmts() {
            Some(list) => slice_ends_with(&list.borrow(), target),
            None => false,
        };
    };
    if t == target {
        return true;
    }
    match t {
        // Qualifies only when every branch, including a PRESENT else,
        // qualifies. A missing else always falls through.
        tag::IF => {
            let Some(then_block) = n.node_slot(1) else {
                return false;
            };
            let Some(else_arm) = n.node_slot(2) else {
                return false;
            };
            drop(n);
            block_ends_with(&then_block, target) && else_arm_ends_with(&else_arm, target)
        }
        tag::SWITCH => {
            let Some(cases) = n.list_slot(1) else {
                return false;
            };
            let Some(default) = n.node_slot(2) else {
                return false;
            };
            drop(n);
            let cases = cases.borrow().clone();
            cases.iter().all(|case| case_ends_with(case, target))
                && block_ends_with(&default, target)
        }
        tag::DO => {
            let Some(inner) = n.node_slot(0) else {
                return false;
            };
            drop(n);
            block_ends_with(&inner, target)
        }
        // A provably infinite loop never falls through, so it trivially
        // qualifies; a reachable break re-opens the fall-through path.
        tag::WHILE => {
            let Some(cond) = n.node_slot(0) else {
                return false;
            };
            let Some(body) = n.node_slot(1) else {
                return false;
            };
            drop(n);
            is_const_true(&cond) && !has_reachable_break(&body)
        }
        _ => false,
    }
}

// The else arm is either another If (else-if chain) or a block.
fn else_arm_ends_with(node: &NodeRef, target: &str) -> bool {
    let is_block = {
        let n = node.borrow();
        n.is(tag::BLOCK) || n.tag.is_none()
    };
    if is_block {
        block_ends_with(node, target)
    } else {
        node_ends_with(node, target)
    }
}

fn case_ends_with(case: &NodeRef, target: &str) -> bool {
    match case.borrow().node_slot(1) {
        Some(block) => block_ends_with(&block, target),
        None => false,
    }
}

// A condition is compile-time true when it is a literal `true` or the
// analyzer recorded a constant true value on its bag.
fn is_const_true(cond: &NodeRef) -> bool {
    let n = cond.borrow();
    if n.is(tag::LITERAL) {
        return matches!(n.scalar_slot(0), Some(Scalar::Bool(true)));
    }
    let result = matches!(n.attrs.borrow().get(key::VALUE), Some(AttrValue::Bool(true)));
    result
}

// Breaks inside nested loops bind to those loops and do not count.
fn has_reachable_break(block: &NodeRef) -> bool {
    let Some(list) = block.borrow().stmts() else {
        return false;
    };
    let items = list.borrow().clone();
    items.iter().any(stmt_has_break)
}

fn stmt_has_break(node: &NodeRef) -> bool {
    let n = node.borrow();
    match n.tag.as_deref() {
        Some(tag::BREAK) => true,
        Some(tag::WHILE) | Some(tag::FOR) => false,
        Some(tag::IF) => {
            let then_found = n
                .node_slot(1)
                .map(|b| has_reachable_break(&b))
                .unwrap_or(false);
            let else_found = n.node_slot(2).map(|e| stmt_has_break(&e)).unwrap_or(false)
                || n.node_slot(2)
                    .map(|e| has_reachable_break(&e))
                    .unwrap_or(false);
            then_found || else_found
        }
        Some(tag::SWITCH) => {
            let case_found = n
                .list_slot(1)
                .map(|cases| {
                    let cases = cases.borrow().clone();
                    cases.iter().any(|case| {
                        case.borrow()
                            .node_slot(1)
                            .map(|b| has_reachable_break(&b))
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false);
            let default_found = n
                .node_slot(2)
                .map(|d| has_reachable_break(&d))
                .unwrap_or(false);
            case_found || default_found
        }
        Some(tag::DO) => n
            .node_slot(0)
            .map(|b| has_reachable_break(&b))
            .unwrap_or(false),
        Some(tag::BLOCK) | None => has_reachable_break(node),
        _ => false,
    }
}
