//! Shared helpers for graft integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use graft::prelude::*;

pub fn lit(value: i64) -> NodeRef {
    Node::literal(Scalar::Int(value), None)
}

pub fn lit_bool(value: bool) -> NodeRef {
    Node::literal(Scalar::Bool(value), None)
}

pub fn shared_list(nodes: Vec<NodeRef>) -> NodeList {
    Rc::new(RefCell::new(nodes))
}

pub fn block(stmts: Vec<NodeRef>) -> NodeRef {
    Node::new(tag::BLOCK, vec![Slot::list(stmts)])
}

pub fn block_of(list: NodeList) -> NodeRef {
    Node::new(tag::BLOCK, vec![Slot::List(list)])
}

pub fn ret() -> NodeRef {
    Node::new(tag::RETURN, vec![])
}

pub fn brk() -> NodeRef {
    Node::new(tag::BREAK, vec![])
}

pub fn while_node(cond: NodeRef, body: NodeRef) -> NodeRef {
    Node::new(tag::WHILE, vec![Slot::Node(cond), Slot::Node(body)])
}

pub fn if_node(cond: NodeRef, then_block: NodeRef, else_arm: Option<NodeRef>) -> NodeRef {
    let mut slots = vec![Slot::Node(cond), Slot::Node(then_block)];
    if let Some(else_arm) = else_arm {
        slots.push(Slot::Node(else_arm));
    }
    Node::new(tag::IF, slots)
}

pub fn case_node(value: NodeRef, body: NodeRef) -> NodeRef {
    Node::new(tag::CASE, vec![Slot::Node(value), Slot::Node(body)])
}

pub fn switch_node(subject: NodeRef, cases: Vec<NodeRef>, default: Option<NodeRef>) -> NodeRef {
    let mut slots = vec![Slot::Node(subject), Slot::list(cases)];
    if let Some(default) = default {
        slots.push(Slot::Node(default));
    }
    Node::new(tag::SWITCH, slots)
}

pub fn do_node(body: NodeRef) -> NodeRef {
    Node::new(tag::DO, vec![Slot::Node(body)])
}

pub fn call_node(name: &str, args: Vec<NodeRef>) -> NodeRef {
    let callee = Node::new(tag::ID, vec![Slot::Scalar(Scalar::Str(name.to_string()))]);
    Node::new(tag::CALL, vec![Slot::Node(callee), Slot::list(args)])
}

/// Analyzer that records the ids of submitted nodes in submission order.
#[derive(Default)]
pub struct RecordingAnalyzer {
    pub seen: Vec<u64>,
}

impl Analyzer for RecordingAnalyzer {
    fn traverse_node(
        &mut self,
        _ctx: &mut MacroContext,
        node: &NodeRef,
    ) -> Result<(), GraftError> {
        self.seen.push(node.borrow().id.0);
        Ok(())
    }
}

pub fn null_context() -> MacroContext {
    MacroContext::new(Rc::new(RefCell::new(NullAnalyzer)))
}

pub fn recording_context() -> (MacroContext, Rc<RefCell<RecordingAnalyzer>>) {
    let analyzer = Rc::new(RefCell::new(RecordingAnalyzer::default()));
    let ctx = MacroContext::new(analyzer.clone());
    (ctx, analyzer)
}
