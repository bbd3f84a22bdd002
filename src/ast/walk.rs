//! Tree traversal as an explicit iterator.
//!
//! `walk` yields `(node, parent, index_in_parent)` in depth-first pre-order
//! over the finite, acyclic tree. Each call opens an independent traversal.
//! The walker holds index cursors, not borrows, and re-reads sibling lists
//! on every step: nodes appended ahead of the cursor mid-walk are picked up.
//! Removing entries behind the cursor mid-walk is unsupported and shifts or
//! repeats visits; callers must not do it.

use super::{NodeRef, Slot};

/// One visited position. `index` is the slot position for direct node
/// children and the in-list position for list children.
#[derive(Debug, Clone)]
pub struct WalkItem {
    pub node: NodeRef,
    pub parent: Option<NodeRef>,
    pub index: usize,
}

struct Frame {
    node: NodeRef,
    slot: usize,
    item: usize,
}

/// Restartable pre-order walker. See module docs for the mutation contract.
pub struct Walker {
    pending_root: Option<NodeRef>,
    stack: Vec<Frame>,
}

/// Opens an independent traversal rooted at `root`.
pub fn walk(root: &NodeRef) -> Walker {
    Walker {
        pending_root: Some(root.clone()),
        stack: Vec::new(),
    }
}

/// Filtered walk yielding only nodes whose bag has been promoted to a
/// Symbol by the analyzer.
pub fn walk_symbols(root: &NodeRef) -> impl Iterator<Item = WalkItem> {
    walk(root).filter(|item| item.node.borrow().attrs.borrow().is_symbol())
}

impl Iterator for Walker {
    type Item = WalkItem;

    fn next(&mut self) -> Option<WalkItem> {
        if let Some(root) = self.pending_root.take() {
            self.stack.push(Frame {
                node: root.clone(),
                slot: 0,
                item: 0,
            });
            return Some(WalkItem {
                node: root,
                parent: None,
                index: 0,
            });
        }
        loop {
            let top = self.stack.len().checked_sub(1)?;
            let next_child = {
                let frame = &mut self.stack[top];
                let node = frame.node.clone();
                let n = node.borrow();
                let mut found = None;
                while frame.slot < n.slots.len() {
                    match &n.slots[frame.slot] {
                        Slot::Node(child) => {
                            let index = frame.slot;
                            frame.slot += 1;
                            frame.item = 0;
                            found = Some((child.clone(), index));
                            break;
                        }
                        Slot::List(list) => {
                            // Length re-read each step so concurrent appends
                            // ahead of the cursor are observed.
                            let len = list.borrow().len();
                            if frame.item < len {
                                let child = list.borrow()[frame.item].clone();
                                let index = frame.item;
                                frame.item += 1;
                                found = Some((child, index));
                                break;
                            }
                            frame.slot += 1;
                            frame.item = 0;
                        }
                        Slot::Scalar(_) => {
                            frame.slot += 1;
                            frame.item = 0;
                        }
                    }
                }
                found
            };
            match next_child {
                Some((child, index)) => {
                    let parent = self.stack[top].node.clone();
                    self.stack.push(Frame {
                        node: child.clone(),
                        slot: 0,
                        item: 0,
                    });
                    return Some(WalkItem {
                        node: child,
                        parent: Some(parent),
                        index,
                    });
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}
