//! Scope and reference model
//!
//! Provides the per-pass scope arena and the reference abstraction used by
//! rule handlers to read and write bindings uniformly.

pub mod reference;
pub mod scope;

pub use reference::{PutOutcome, Reference, get_value, put_value};
pub use scope::{AncestorIter, Context, Scope, ScopeArena, ScopeId, ScopeKind};
