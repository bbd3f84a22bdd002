//! `ends_with` tie-break rules: every control-flow path must terminate.

mod common;

use common::*;
use graft::prelude::*;

fn ends_in_return(stmts: Vec<NodeRef>) -> bool {
    ends_with(&shared_list(stmts), tag::RETURN)
}

#[test]
fn plain_trailing_return_qualifies() {
    assert!(ends_in_return(vec![lit(1), ret()]));
    assert!(!ends_in_return(vec![ret(), lit(1)]));
    assert!(!ends_in_return(vec![]));
}

#[test]
fn while_true_without_break_trivially_qualifies() {
    let loop_node = while_node(lit_bool(true), block(vec![lit(1)]));
    assert!(ends_in_return(vec![loop_node]));
}

#[test]
fn adding_a_break_disqualifies_the_loop() {
    let loop_node = while_node(lit_bool(true), block(vec![lit(1), brk()]));
    assert!(!ends_in_return(vec![loop_node]));
}

#[test]
fn breaks_inside_nested_loops_do_not_count() {
    let inner = while_node(lit_bool(true), block(vec![brk()]));
    let outer = while_node(lit_bool(true), block(vec![inner]));
    assert!(ends_in_return(vec![outer]));
}

#[test]
fn break_behind_a_condition_still_counts() {
    let conditional_break = if_node(lit(1), block(vec![brk()]), None);
    let loop_node = while_node(lit_bool(true), block(vec![conditional_break]));
    assert!(!ends_in_return(vec![loop_node]));
}

#[test]
fn dynamic_loop_conditions_are_conservatively_rejected() {
    let unknown_cond = call_node("keep_going", vec![]);
    let loop_node = while_node(unknown_cond, block(vec![lit(1)]));
    assert!(!ends_in_return(vec![loop_node]));
}

#[test]
fn analyzer_constant_folding_makes_a_condition_qualify() {
    let cond = call_node("always", vec![]);
    cond.borrow()
        .attrs
        .borrow_mut()
        .set(key::VALUE, AttrValue::Bool(true));
    let loop_node = while_node(cond, block(vec![lit(1)]));
    assert!(ends_in_return(vec![loop_node]));
}

#[test]
fn if_requires_every_branch_including_a_present_else() {
    let without_else = if_node(lit(1), block(vec![ret()]), None);
    assert!(!ends_in_return(vec![without_else]));

    let with_else = if_node(lit(1), block(vec![ret()]), Some(block(vec![ret()])));
    assert!(ends_in_return(vec![with_else]));

    let else_falls_through = if_node(lit(1), block(vec![ret()]), Some(block(vec![lit(2)])));
    assert!(!ends_in_return(vec![else_falls_through]));
}

#[test]
fn else_if_chains_recurse() {
    let tail = if_node(lit(2), block(vec![ret()]), Some(block(vec![ret()])));
    let chain = if_node(lit(1), block(vec![ret()]), Some(tail));
    assert!(ends_in_return(vec![chain]));
}

#[test]
fn switch_requires_all_cases_and_a_default() {
    let qualifying = switch_node(
        lit(0),
        vec![
            case_node(lit(1), block(vec![ret()])),
            case_node(lit(2), block(vec![ret()])),
        ],
        Some(block(vec![ret()])),
    );
    assert!(ends_in_return(vec![qualifying]));

    let missing_default = switch_node(
        lit(0),
        vec![case_node(lit(1), block(vec![ret()]))],
        None,
    );
    assert!(!ends_in_return(vec![missing_default]));

    let leaky_case = switch_node(
        lit(0),
        vec![
            case_node(lit(1), block(vec![ret()])),
            case_node(lit(2), block(vec![lit(3)])),
        ],
        Some(block(vec![ret()])),
    );
    assert!(!ends_in_return(vec![leaky_case]));
}

#[test]
fn do_blocks_follow_their_inner_block() {
    assert!(ends_in_return(vec![do_node(block(vec![ret()]))]));
    assert!(!ends_in_return(vec![do_node(block(vec![lit(1)]))]));
}
