//! References: locators for a binding, independent of its value

use serde::Serialize;

use super::scope::{ScopeArena, ScopeId};
use crate::value::JsValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// A binding owned by a known scope.
    Binding { scope: ScopeId, name: String },
    /// A location that cannot be determined statically, e.g. `obj[key]`.
    Unresolvable { description: String },
}

/// What a `put_value` call did with the written value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PutOutcome {
    Stored,
    UnknownEffect,
}

impl Reference {
    pub fn binding(scope: ScopeId, name: impl Into<String>) -> Self {
        Reference::Binding {
            scope,
            name: name.into(),
        }
    }

    pub fn unresolvable(description: impl Into<String>) -> Self {
        Reference::Unresolvable {
            description: description.into(),
        }
    }

    pub fn is_resolvable(&self) -> bool {
        matches!(self, Reference::Binding { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            Reference::Binding { name, .. } => name,
            Reference::Unresolvable { description } => description,
        }
    }
}

/// Current value behind `reference`, or an unknown value.
pub fn get_value(scopes: &ScopeArena, reference: &Reference) -> JsValue {
    match reference {
        Reference::Binding { scope, name } => scopes
            .get(*scope)
            .binding(name)
            .cloned()
            .unwrap_or_else(JsValue::unknown),
        Reference::Unresolvable { .. } => JsValue::unknown(),
    }
}

/// Stores `value` into the binding behind `reference`.
///
/// Unresolvable targets are left untouched and reported as an unknown effect.
pub fn put_value(scopes: &mut ScopeArena, reference: &Reference, value: JsValue) -> PutOutcome {
    match reference {
        Reference::Binding { scope, name } => {
            scopes.set_binding(*scope, name, value);
            PutOutcome::Stored
        }
        Reference::Unresolvable { description } => {
            tracing::trace!(location = %description, "write through unresolvable reference");
            PutOutcome::UnknownEffect
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::scope::{Context, ScopeKind};

    fn arena_with_global() -> (ScopeArena, ScopeId) {
        let mut arena = ScopeArena::new();
        let global = arena.create_scope(
            ScopeKind::Global,
            None,
            Context::new("global", "app.js", 1, 0),
        );
        (arena, global)
    }

    #[test]
    fn put_then_get_returns_stored_value() {
        let (mut arena, global) = arena_with_global();
        let reference = Reference::binding(global, "x");

        let outcome = put_value(&mut arena, &reference, JsValue::string("hello"));

        assert_eq!(outcome, PutOutcome::Stored);
        assert_eq!(get_value(&arena, &reference), JsValue::string("hello"));
    }

    #[test]
    fn get_of_missing_binding_is_unknown() {
        let (arena, global) = arena_with_global();

        let value = get_value(&arena, &Reference::binding(global, "missing"));

        assert!(value.is_unknown());
    }

    #[test]
    fn unresolvable_reference_reads_unknown_and_ignores_writes() {
        let (mut arena, global) = arena_with_global();
        let reference = Reference::unresolvable("obj[key]");

        let outcome = put_value(&mut arena, &reference, JsValue::number(1.0));

        assert_eq!(outcome, PutOutcome::UnknownEffect);
        assert!(get_value(&arena, &reference).is_unknown());
        assert_eq!(arena.get(global).bindings().count(), 0);
        assert!(!reference.is_resolvable());
    }
}
