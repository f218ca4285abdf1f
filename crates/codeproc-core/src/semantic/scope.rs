//! Scope arena for one pass
//!
//! Every scope created during a pass is allocated here and kept until the
//! pass is dropped, so the arena doubles as the pass's scope history. Parent
//! links form the resolution chain; the enter/exit stack lives on the pass.

use std::path::{Path, PathBuf};

use id_arena::{Arena, Id};
use serde::Serialize;

use crate::value::JsValue;

pub type ScopeId = Id<Scope>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScopeKind {
    Global,
    Module,
    Function,
    Catch,
}

/// Where in program structure something happens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Context {
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
    pub col: usize,
}

impl Context {
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>, line: usize, col: usize) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            line,
            col,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub context: Context,
    bindings: Vec<(String, JsValue)>,
}

impl Scope {
    pub fn binding(&self, name: &str) -> Option<&JsValue> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.binding(name).is_some()
    }

    /// Bindings in declaration order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &JsValue)> {
        self.bindings.iter().map(|(name, value)| (name.as_str(), value))
    }

    fn set(&mut self, name: &str, value: JsValue) {
        match self.bindings.iter_mut().find(|(bound, _)| bound == name) {
            Some((_, slot)) => *slot = value,
            None => self.bindings.push((name.to_string(), value)),
        }
    }
}

pub struct ScopeArena {
    arena: Arena<Scope>,
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeArena {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
        }
    }

    pub fn create_scope(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        context: Context,
    ) -> ScopeId {
        self.arena.alloc_with_id(|id| Scope {
            id,
            kind,
            parent,
            context,
            bindings: Vec::new(),
        })
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.arena[id]
    }

    /// Declares `name` in `scope` unless it is already bound there.
    pub fn declare(&mut self, scope: ScopeId, name: &str, value: JsValue) {
        let scope = &mut self.arena[scope];
        if !scope.has_binding(name) {
            scope.set(name, value);
        }
    }

    /// Binds `name` in `scope`, replacing any previous value.
    pub fn set_binding(&mut self, scope: ScopeId, name: &str, value: JsValue) {
        self.arena[scope].set(name, value);
    }

    /// Nearest scope on the chain starting at `from` that binds `name`.
    pub fn resolve(&self, name: &str, from: ScopeId) -> Option<ScopeId> {
        self.ancestors(from)
            .find(|scope| scope.has_binding(name))
            .map(|scope| scope.id)
    }

    pub fn ancestors(&self, id: ScopeId) -> AncestorIter<'_> {
        AncestorIter {
            arena: self,
            current: Some(id),
        }
    }

    /// All scopes of the pass in creation order.
    pub fn history(&self) -> impl Iterator<Item = &Scope> {
        self.arena.iter().map(|(_, scope)| scope)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }
}

pub struct AncestorIter<'a> {
    arena: &'a ScopeArena,
    current: Option<ScopeId>,
}

impl<'a> Iterator for AncestorIter<'a> {
    type Item = &'a Scope;

    fn next(&mut self) -> Option<Self::Item> {
        let current_id = self.current?;
        let scope = &self.arena.arena[current_id];
        self.current = scope.parent;
        Some(scope)
    }
}
