//! # Graft Macro Context
//!
//! The orchestrator of compile-time tree transformation. It owns the
//! statement-injection stack, the value registry, the scope/pragma
//! environment, the generated-script bookkeeping for error translation, and
//! the deferred-callback queues, and it drives the external analyzer after
//! every injection so freshly injected code is resolved before the next
//! statement lands.
//!
//! ## Core Principles
//!
//! - **Single-threaded, strictly synchronous**: interleaving of macro
//!   execution and analysis is ordinary nested recursion. A macro body may
//!   recursively drive the analyzer on nodes it just injected before the
//!   macro call itself returns.
//! - **Stack discipline**: `push_statements`/`pop_statements` are strictly
//!   paired; every expansion pushes before injecting and pops exactly once.
//! - **Immediate analysis**: `inject_statement` submits the node to the
//!   analyzer before returning, so a later injected statement can query the
//!   types of an earlier one.
//! - **Fatal unwinding**: every error aborts the compilation through a
//!   single `Result` unwind; there is no retry and no partial result.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use miette::SourceSpan;

use crate::ast::{self, tag, NodeId, NodeList, NodeRef, Scalar, Slot};
use crate::ast::Node;
use crate::attrs::{key, AttrsRef};
use crate::errors::{self, ErrorKind, ErrorReporting, GraftError};
use crate::location::{Location, SourceMap};
use crate::registry::Registry;
use crate::scope::{Pragmas, Scope, ScopeKind, ScopeRef};
use crate::script::{Script, ScriptFrame};
use crate::value::{CtFunc, DeferredFn, Value};

mod hygiene;
mod modules;

pub use hygiene::memoize;
pub use modules::ModuleLoader;

/// Maximum macro expansion depth, guarding against runaway recursion.
pub const MAX_EXPANSION_DEPTH: usize = 128;

// ============================================================================
// EXTERNAL COLLABORATOR SEAMS
// ============================================================================

/// The semantic analyzer's single entry point. Invoked by the context after
/// every injection and while draining the deferred queues; free to call back
/// into the context (nested recursion, never concurrency).
pub trait Analyzer {
    fn traverse_node(&mut self, ctx: &mut MacroContext, node: &NodeRef)
        -> Result<(), GraftError>;
}

pub type AnalyzerRef = Rc<RefCell<dyn Analyzer>>;

/// No-op analyzer for drivers that run preprocessing without semantic
/// analysis (tree dumps, expansion tracing).
pub struct NullAnalyzer;

impl Analyzer for NullAnalyzer {
    fn traverse_node(
        &mut self,
        _ctx: &mut MacroContext,
        _node: &NodeRef,
    ) -> Result<(), GraftError> {
        Ok(())
    }
}

// ============================================================================
// CONTEXT STATE
// ============================================================================

/// One statement-insertion frame: the sibling list being populated plus the
/// optional cursor at which the next injected statement lands. Absent
/// cursor means append.
#[derive(Debug, Clone)]
pub struct Frame {
    pub list: NodeList,
    pub cursor: Option<usize>,
}

/// Immutable snapshot of (lexical scope, innermost function scope, active
/// pragmas, statement frame) at a moment; re-enters that exact environment
/// later regardless of call site.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub scope: ScopeRef,
    pub func_scope: Option<ScopeRef>,
    pub pragmas: Pragmas,
    pub frame: Option<Frame>,
}

/// Construction-time configuration.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub max_expansion_depth: usize,
    /// Roots probed by `require`, in order.
    pub search_paths: Vec<PathBuf>,
    /// File extension of compile-time modules.
    pub module_extension: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_expansion_depth: MAX_EXPANSION_DEPTH,
            search_paths: Vec::new(),
            module_extension: "ct".to_string(),
        }
    }
}

/// A single macro expansion, for traceability.
#[derive(Debug, Clone)]
pub struct ExpansionStep {
    /// The callee name, when the call site had an identifier callee.
    pub name: String,
    /// The call-site node (now transformed into the expansion).
    pub call: NodeRef,
    /// The synthetic block the expansion produced.
    pub block: NodeRef,
}

pub struct MacroContext {
    options: ContextOptions,
    analyzer: AnalyzerRef,
    sources: SourceMap,
    statements: Vec<Frame>,
    registry: Registry,
    scope: ScopeRef,
    func_scope: Option<ScopeRef>,
    pragmas: Pragmas,
    scripts: HashMap<String, Script>,
    script_stack: Vec<ScriptFrame>,
    origins: HashMap<NodeId, NodeRef>,
    after_analyze: Vec<DeferredFn>,
    after_inference: Vec<(Checkpoint, DeferredFn)>,
    /// Trace of macro expansions, oldest first.
    pub trace: Vec<ExpansionStep>,
    expansion_depth: usize,
    modules: HashMap<String, Value>,
    module_paths: HashMap<PathBuf, Value>,
}

impl MacroContext {
    pub fn new(analyzer: AnalyzerRef) -> Self {
        Self::with_options(analyzer, ContextOptions::default())
    }

    pub fn with_options(analyzer: AnalyzerRef, options: ContextOptions) -> Self {
        Self {
            options,
            analyzer,
            sources: SourceMap::new(),
            statements: Vec::new(),
            registry: Registry::new(),
            scope: Scope::root(),
            func_scope: None,
            pragmas: Pragmas::new(),
            scripts: HashMap::new(),
            script_stack: Vec::new(),
            origins: HashMap::new(),
            after_analyze: Vec::new(),
            after_inference: Vec::new(),
            trace: Vec::new(),
            expansion_depth: 0,
            modules: HashMap::new(),
            module_paths: HashMap::new(),
        }
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }

    /// Registers an original user source for span resolution.
    pub fn register_source(&mut self, name: &str, text: &str) {
        self.sources.register(name, text);
    }

    // ------------------------------------------------------------------------
    // Scopes and pragmas
    // ------------------------------------------------------------------------

    pub fn scope(&self) -> ScopeRef {
        self.scope.clone()
    }

    pub fn func_scope(&self) -> Option<ScopeRef> {
        self.func_scope.clone()
    }

    pub fn push_scope(&mut self, kind: ScopeKind) -> ScopeRef {
        let child = Scope::child(&self.scope, kind);
        self.scope = child.clone();
        if kind == ScopeKind::Function {
            self.func_scope = Some(child.clone());
        }
        child
    }

    pub fn pop_scope(&mut self) -> Result<(), GraftError> {
        let parent = self.scope.borrow().parent();
        match parent {
            Some(parent) => {
                self.scope = parent;
                self.func_scope = Scope::innermost_function(&self.scope);
                Ok(())
            }
            None => Err(self.internal_violation("cannot pop the root scope", errors::unspanned())),
        }
    }

    /// Binds a name to a shared bag in the current scope.
    pub fn define(&mut self, name: &str, attrs: AttrsRef) {
        self.scope.borrow_mut().define(name, attrs);
    }

    /// Resolves a name against the current lexical environment.
    pub fn resolve(&self, name: &str) -> Option<AttrsRef> {
        Scope::resolve(&self.scope, name)
    }

    pub fn pragmas(&self) -> &Pragmas {
        &self.pragmas
    }

    pub fn set_pragma(&mut self, name: &str, value: Scalar) {
        self.pragmas.insert(name.to_string(), value);
    }

    pub fn pragma(&self, name: &str) -> Option<Scalar> {
        self.pragmas.get(name).cloned()
    }

    /// Snapshot of the current environment; cheap by construction.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            scope: self.scope.clone(),
            func_scope: self.func_scope.clone(),
            pragmas: self.pragmas.clone(),
            frame: self.statements.last().cloned(),
        }
    }

    pub(crate) fn swap_env(
        &mut self,
        scope: ScopeRef,
        func_scope: Option<ScopeRef>,
        pragmas: Pragmas,
    ) -> (ScopeRef, Option<ScopeRef>, Pragmas) {
        let previous = (
            self.scope.clone(),
            self.func_scope.clone(),
            self.pragmas.clone(),
        );
        self.scope = scope;
        self.func_scope = func_scope;
        self.pragmas = pragmas;
        previous
    }

    /// Runs `f` inside the checkpointed environment, restoring the caller's
    /// environment afterward, also on error.
    pub(crate) fn enter_checkpoint<T>(
        &mut self,
        checkpoint: Checkpoint,
        f: impl FnOnce(&mut Self) -> Result<T, GraftError>,
    ) -> Result<T, GraftError> {
        let (scope, func_scope, pragmas) = self.swap_env(
            checkpoint.scope.clone(),
            checkpoint.func_scope.clone(),
            checkpoint.pragmas.clone(),
        );
        let pushed = match checkpoint.frame {
            Some(frame) => {
                self.statements.push(frame);
                true
            }
            None => false,
        };
        let result = f(self);
        if pushed {
            self.statements.pop();
        }
        self.swap_env(scope, func_scope, pragmas);
        result
    }

    // ------------------------------------------------------------------------
    // Statement injection
    // ------------------------------------------------------------------------

    /// Begins populating a sibling list; injections append.
    pub fn push_statements(&mut self, list: NodeList) {
        self.statements.push(Frame { list, cursor: None });
    }

    /// Begins populating a sibling list with the insertion cursor at
    /// `cursor`; injections land there in call order.
    pub fn push_statements_at(&mut self, list: NodeList, cursor: usize) {
        self.statements.push(Frame {
            list,
            cursor: Some(cursor),
        });
    }

    /// Ends the innermost statement list. Strictly paired with the pushes.
    pub fn pop_statements(&mut self) -> Result<Frame, GraftError> {
        self.statements
            .pop()
            .ok_or_else(|| {
                self.internal_violation("pop_statements on an empty stack", errors::unspanned())
            })
    }

    pub fn statement_depth(&self) -> usize {
        self.statements.len()
    }

    /// The active cursor of the innermost frame, if any.
    pub fn cursor(&self) -> Option<usize> {
        self.statements.last().and_then(|frame| frame.cursor)
    }

    /// Injects a statement into the list on top of the stack and submits it
    /// to the analyzer IMMEDIATELY, so later injections can query its
    /// results. By default the node is cloned first, isolating
    /// macro-internal construction from the caller's tree; pass
    /// `clone = false` to splice the node itself.
    pub fn inject_statement(&mut self, node: &NodeRef, clone: bool) -> Result<NodeRef, GraftError> {
        if self.statements.is_empty() {
            return Err(self.internal_violation(
                "inject_statement with no active statement list",
                errors::unspanned(),
            ));
        }
        let node = if clone { ast::clone_fresh(node) } else { node.clone() };
        let top = self.statements.len() - 1;
        let list = self.statements[top].list.clone();
        match self.statements[top].cursor {
            Some(at) => {
                if at > list.borrow().len() {
                    return Err(self.internal_violation(
                        "statement cursor is past the end of its list",
                        errors::unspanned(),
                    ));
                }
                list.borrow_mut().insert(at, node.clone());
                self.statements[top].cursor = Some(at + 1);
            }
            None => list.borrow_mut().push(node.clone()),
        }
        let analyzer = Rc::clone(&self.analyzer);
        analyzer.borrow_mut().traverse_node(self, &node)?;
        Ok(node)
    }

    /// Converts a compile-time value into tree form at a destination slot:
    /// a spread replaces the destination's sibling slots from `index` onward
    /// with one slot per element; a callable placed where a call-form node
    /// exists triggers macro-call expansion; anything else transforms the
    /// destination node into a literal/reference leaf.
    pub fn inject_value(
        &mut self,
        value: Value,
        dest: &NodeList,
        index: usize,
        origin: &NodeRef,
    ) -> Result<(), GraftError> {
        match value {
            Value::Spread(items) => {
                if index > dest.borrow().len() {
                    return Err(self.internal_violation(
                        "spread destination index is out of range",
                        errors::unspanned(),
                    ));
                }
                dest.borrow_mut().truncate(index);
                for item in items {
                    let leaf = self.value_leaf(item, origin)?;
                    dest.borrow_mut().push(leaf);
                }
                Ok(())
            }
            Value::Func(func) => {
                let Some(target) = dest.borrow().get(index).cloned() else {
                    return Err(self.internal_violation(
                        "injection destination slot does not exist",
                        errors::unspanned(),
                    ));
                };
                let is_call = target.borrow().is(tag::CALL);
                if is_call {
                    self.expand_call(&func, &target).map(|_| ())
                } else {
                    let leaf = self.value_leaf(Value::Func(func), origin)?;
                    ast::transform(&target, &leaf);
                    Ok(())
                }
            }
            other => {
                let Some(target) = dest.borrow().get(index).cloned() else {
                    return Err(self.internal_violation(
                        "injection destination slot does not exist",
                        errors::unspanned(),
                    ));
                };
                let leaf = self.value_leaf(other, origin)?;
                ast::transform(&target, &leaf);
                Ok(())
            }
        }
    }

    /// Builds a leaf node for a value. Scalars become `Literal` leaves,
    /// symbols become `Id` leaves sharing the symbol's bag, callables are
    /// parked in the registry behind a `Registry` leaf. The leaf copies the
    /// origin's span so errors about generated code point somewhere
    /// sensible.
    fn value_leaf(&mut self, value: Value, origin: &NodeRef) -> Result<NodeRef, GraftError> {
        let span = origin.borrow().span.clone();
        match value {
            Value::Nil | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => {
                let scalar = value.to_scalar().unwrap_or_default();
                Ok(Node::literal(scalar, span))
            }
            Value::Node(node) => Ok(node),
            Value::Sym(bag) => {
                let name = bag
                    .borrow()
                    .symbol()
                    .map(|info| info.name.clone())
                    .unwrap_or_default();
                let node = Node::ident(&name, bag);
                node.borrow_mut().span = span;
                Ok(node)
            }
            Value::Spread(_) => Err(self.internal_violation(
                "spread is only valid directly against sibling slots",
                errors::unspanned(),
            )),
            value @ (Value::Func(_) | Value::Generic(_) | Value::Concept(_)) => {
                let index = self.registry.index_of(&value) as i64;
                let node = Node::new(tag::REGISTRY, vec![Slot::Scalar(Scalar::Int(index))]);
                node.borrow_mut().span = span;
                Ok(node)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Macro-call expansion
    // ------------------------------------------------------------------------

    /// The macro-call expansion protocol. The call's argument nodes are
    /// cloned, analyzed, and reduced to their simplest compile-time form;
    /// the callable runs inside a freshly pushed statement list scoped to a
    /// synthetic block; a returned value is injected as the block's result;
    /// finally the call node is transformed in place into the block, so
    /// every other reference to the call observes the expansion.
    pub fn expand_call(&mut self, func: &CtFunc, call: &NodeRef) -> Result<NodeRef, GraftError> {
        if self.expansion_depth >= self.options.max_expansion_depth {
            let limit = self.options.max_expansion_depth;
            return Err(self.expansion_limit(limit, errors::unspanned()));
        }
        self.expansion_depth += 1;
        let result = self.expand_call_inner(func, call);
        self.expansion_depth -= 1;
        result
    }

    fn expand_call_inner(&mut self, func: &CtFunc, call: &NodeRef) -> Result<NodeRef, GraftError> {
        // Snapshot the argument handles; analysis below may grow the tree.
        let args: Vec<NodeRef> = call
            .borrow()
            .list_slot(1)
            .map(|list| list.borrow().clone())
            .unwrap_or_default();
        let mut reduced = Vec::with_capacity(args.len());
        for arg in &args {
            let fresh = ast::clone_fresh(arg);
            let analyzer = Rc::clone(&self.analyzer);
            analyzer.borrow_mut().traverse_node(self, &fresh)?;
            reduced.push(self.reduce_node(&fresh));
        }

        let stmts: NodeList = Rc::new(RefCell::new(Vec::new()));
        let block = Node::new(tag::BLOCK, vec![Slot::List(stmts.clone())]);
        block.borrow_mut().span = call.borrow().span.clone();

        let name = call_name(call);
        self.push_statements(stmts);
        self.push_scope(ScopeKind::Block);
        let body = (**func)(self, &reduced).and_then(|returned| match returned {
            Some(value) if !matches!(value, Value::Nil) => {
                let leaf = self.value_leaf(value, call)?;
                self.inject_statement(&leaf, false).map(|_| ())
            }
            _ => Ok(()),
        });
        let popped_scope = self.pop_scope();
        let popped_frame = self.pop_statements();
        body?;
        popped_scope?;
        popped_frame?;

        ast::transform(call, &block);
        self.trace.push(ExpansionStep {
            name,
            call: call.clone(),
            block: block.clone(),
        });
        Ok(block)
    }

    /// Reduces an analyzed node to its simplest compile-time representation:
    /// the constant value if known, else the symbol it refers to, else the
    /// node itself.
    pub fn reduce_node(&self, node: &NodeRef) -> Value {
        let n = node.borrow();
        if n.is(tag::LITERAL) {
            if let Some(scalar) = n.scalar_slot(0) {
                return Value::from(scalar);
            }
        }
        let attrs = n.attrs.borrow();
        if let Some(value) = attrs.get(key::VALUE) {
            return Value::from(value);
        }
        if attrs.is_symbol() {
            return Value::Sym(n.attrs.clone());
        }
        Value::Node(node.clone())
    }

    /// Runs a node's preprocessing callback, at most once per node. The
    /// callback may inject statements and transform the tree.
    pub fn preprocess(&mut self, node: &NodeRef) -> Result<(), GraftError> {
        let callback = {
            let mut n = node.borrow_mut();
            if n.preprocessed {
                None
            } else {
                n.preprocessed = true;
                n.preprocess.clone()
            }
        };
        match callback {
            Some(callback) => (*callback)(self, node),
            None => Ok(()),
        }
    }

    /// Runs every pending preprocessing callback in the tree, depth-first
    /// pre-order. The walk holds no borrows between steps, so callbacks may
    /// inject statements and transform nodes; nodes that land ahead of the
    /// walk cursor are picked up by the same pass.
    pub fn preprocess_tree(&mut self, root: &NodeRef) -> Result<(), GraftError> {
        let mut walker = ast::walk(root);
        while let Some(item) = walker.next() {
            self.preprocess(&item.node)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    pub fn registry_index_of(&mut self, value: &Value) -> usize {
        self.registry.index_of(value)
    }

    pub fn registry_get(&self, index: usize) -> Option<&Value> {
        self.registry.get(index)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Deferred callbacks
    // ------------------------------------------------------------------------

    /// Queues a callback to run once after the analyzer's main pass.
    pub fn after_analyze(&mut self, callback: DeferredFn) {
        self.after_analyze.push(callback);
    }

    /// Queues a callback to run once after type inference; it re-enters the
    /// environment active at registration time.
    pub fn after_inference(&mut self, callback: DeferredFn) {
        let checkpoint = self.checkpoint();
        self.after_inference.push((checkpoint, callback));
    }

    /// Drains the after-analyze queue, including callbacks enqueued while
    /// draining.
    pub fn run_after_analyze(&mut self) -> Result<(), GraftError> {
        while !self.after_analyze.is_empty() {
            let queue = std::mem::take(&mut self.after_analyze);
            for callback in queue {
                (*callback)(self)?;
            }
        }
        Ok(())
    }

    /// Drains the after-inference queue, re-entering each registration
    /// checkpoint around its callback.
    pub fn run_after_inference(&mut self) -> Result<(), GraftError> {
        while !self.after_inference.is_empty() {
            let queue = std::mem::take(&mut self.after_inference);
            for (checkpoint, callback) in queue {
                self.enter_checkpoint(checkpoint, |ctx| (*callback)(ctx))?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Compile-time scripts and error translation
    // ------------------------------------------------------------------------

    /// Registers the generated intermediate text of a compile-time script;
    /// its `@origin` markers are scanned on registration.
    pub fn register_script(&mut self, name: &str, text: &str) {
        self.scripts.insert(name.to_string(), Script::new(name, text));
    }

    /// Records a node as a script origin and renders its marker line for
    /// embedding in generated text.
    pub fn origin_marker(&mut self, node: &NodeRef) -> String {
        let id = node.borrow().id;
        self.origins.insert(id, node.clone());
        crate::script::origin_marker(id)
    }

    /// Pushes a frame of the currently executing compile-time source stack.
    pub fn push_script(&mut self, name: &str) {
        self.script_stack.push(ScriptFrame {
            script: name.to_string(),
            line: 1,
        });
    }

    /// Updates the executing line of the innermost script frame.
    pub fn set_script_line(&mut self, line: usize) {
        if let Some(frame) = self.script_stack.last_mut() {
            frame.line = line;
        }
    }

    pub fn pop_script(&mut self) {
        self.script_stack.pop();
    }

    /// Maps a (script, line) pair back to the user's source: scans backward
    /// from `line` for the nearest origin marker, applies the residual line
    /// delta, and resolves the origin node's span. Empty on any miss;
    /// location loss degrades diagnostics, it never fails them.
    pub fn location_for(&self, script_name: &str, line: usize) -> Location {
        let Some(script) = self.scripts.get(script_name) else {
            return Location::empty();
        };
        let Some((id, delta)) = script.origin_before(line) else {
            return Location::empty();
        };
        let Some(node) = self.origins.get(&id) else {
            return Location::empty();
        };
        let base = node.borrow().location(&self.sources);
        if base.is_empty() || delta == 0 {
            return base;
        }
        let shifted = self.sources.locate_line(&base.source_name, base.line + delta);
        if shifted.is_empty() {
            base
        } else {
            shifted
        }
    }

    /// Rewrites `script:line` citations in a host error message into user
    /// `file:line` citations. Citations of unregistered scripts or
    /// unresolvable lines are left untouched.
    pub fn translate_error(&self, message: &str) -> String {
        crate::script::rewrite_citations(message, |name, line| {
            if !self.scripts.contains_key(name) {
                return None;
            }
            let loc = self.location_for(name, line);
            if loc.is_empty() {
                None
            } else {
                Some(format!("{}:{}", loc.source_name, loc.line))
            }
        })
    }

    // ------------------------------------------------------------------------
    // Static diagnostics
    // ------------------------------------------------------------------------

    /// A fatal diagnostic raised by compile-time user code, anchored at the
    /// resolved original location of the currently executing script.
    pub fn static_error(&self, message: &str) -> GraftError {
        self.report(
            ErrorKind::StaticError {
                message: message.to_string(),
            },
            errors::unspanned(),
        )
    }

    /// No-op returning the condition when it holds; a fatal diagnostic
    /// otherwise.
    pub fn static_assert(&self, condition: Value, message: &str) -> Result<Value, GraftError> {
        if condition.is_truthy() {
            Ok(condition)
        } else {
            Err(self.report(
                ErrorKind::AssertionFailure {
                    message: message.to_string(),
                },
                errors::unspanned(),
            ))
        }
    }

    /// Invokes a callable value (plain, generic, or concept) with already
    /// reduced arguments. The seam the external type system calls through.
    pub fn invoke_callable(
        &mut self,
        value: &Value,
        args: &[Value],
    ) -> Result<Option<Value>, GraftError> {
        let Some(func) = value.as_callable() else {
            return Err(self.internal_violation(
                &format!("value of type {} is not callable", value.type_name()),
                errors::unspanned(),
            ));
        };
        (*func)(self, args)
    }

    /// The best available anchor for diagnostics: the resolved location of
    /// the innermost executing script frame, else a fallback source.
    fn current_anchor(&self) -> (std::sync::Arc<miette::NamedSource<String>>, SourceSpan) {
        if let Some(frame) = self.script_stack.last() {
            let loc = self.location_for(&frame.script, frame.line);
            if !loc.is_empty() {
                if let Some(source) = self.sources.get(&loc.source_name) {
                    return (source, SourceSpan::from(loc.line_start..loc.line_end));
                }
            }
        }
        (errors::fallback_source("macro context"), errors::unspanned())
    }
}

impl ErrorReporting for MacroContext {
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> GraftError {
        let (source, anchor) = self.current_anchor();
        let span = if span.len() == 0 && span.offset() == 0 {
            anchor
        } else {
            span
        };
        errors::build(kind, source, span, "preprocess")
    }
}

fn call_name(call: &NodeRef) -> String {
    call.borrow()
        .node_slot(0)
        .and_then(|callee| {
            let c = callee.borrow();
            if c.is(tag::ID) {
                match c.scalar_slot(0) {
                    Some(Scalar::Str(name)) => Some(name),
                    _ => None,
                }
            } else {
                None
            }
        })
        .unwrap_or_else(|| "<anonymous>".to_string())
}
