//! # Graft
//!
//! A compile-time tree-transformation engine: an AST node model plus a
//! macro/preprocessing context that lets user-authored compile-time code
//! inspect, generate, and splice program fragments before semantic analysis
//! and code generation run.
//!
//! The engine guarantees four things at once:
//!
//! - a mutable, shared, reference-aliased tree with structural invariants
//!   (`ast`): clone isolates, transform splices in place preserving identity;
//! - HYGIENIC expansion (`context`): a macro's internal names resolve against
//!   its definition environment, never its call site;
//! - interleaved mutation and analysis: injected code is submitted to the
//!   external analyzer immediately, so later-injected code can query its
//!   results;
//! - error-location translation (`script`, `location`): failures inside
//!   host-level compile-time code are mapped back to the user's source.
//!
//! The lexer/parser, the semantic analyzer, and the code generator are
//! external collaborators reached through the seams in `context`.

pub use crate::errors::{ErrorCategory, ErrorKind, ErrorReporting, GraftError};

pub mod ast;
pub mod attrs;
pub mod context;
pub mod errors;
pub mod location;
pub mod registry;
pub mod scope;
pub mod script;
pub mod value;

pub mod prelude {
    //! Everything a compiler driver or macro author typically needs.
    pub use crate::ast::{
        clone_fresh, ends_with, tag, transform, walk, walk_symbols, Node, NodeId, NodeList,
        NodeRef, RawShape, Scalar, Slot, Span, WalkItem, Walker,
    };
    pub use crate::attrs::{key, AttrValue, Attrs, AttrsRef, Storage, SymbolInfo};
    pub use crate::context::{
        memoize, Analyzer, AnalyzerRef, Checkpoint, ContextOptions, ExpansionStep, Frame,
        MacroContext, ModuleLoader, NullAnalyzer,
    };
    pub use crate::errors::{ErrorCategory, ErrorKind, ErrorReporting, GraftError};
    pub use crate::location::{Location, SourceMap};
    pub use crate::registry::Registry;
    pub use crate::scope::{Pragmas, Scope, ScopeKind, ScopeRef};
    pub use crate::value::{CtFunc, DeferredFn, Value};
}
