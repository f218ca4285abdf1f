use std::mem;
use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{FunctionNode, Node, NodeKind, Position};
use crate::error::InternalError;
use crate::processor::Pass;
use crate::semantic::{Context, ScopeKind};
use crate::value::{JsValue, ValueType};

static INCLUDE_CALLEE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Ti|Titanium)\.include$").expect("Invalid regex pattern"));

const ANONYMOUS: &str = "<anonymous>";

impl Pass<'_> {
    /// Builds the function's scope and walks its body once.
    ///
    /// The body is analyzed where the function is defined, not where it is
    /// called, so writes it makes to outer bindings are recorded as unknown.
    pub(super) fn analyze_function(
        &mut self,
        func: &mut FunctionNode,
        start: Position,
        bind_own_name: bool,
    ) -> Result<JsValue, InternalError> {
        let name = func.name.clone().unwrap_or_else(|| ANONYMOUS.to_string());
        let value = JsValue::of_type(ValueType::Function).with_name(name.as_str());

        let parent = self.ctx.current_scope().unwrap_or_else(|| self.ctx.master_global());
        let file = self
            .ctx
            .current_file()
            .map(|path| path.to_path_buf())
            .unwrap_or_default();
        let scopes = self.ctx.scopes_mut();
        let scope = scopes.create_scope(
            ScopeKind::Function,
            Some(parent),
            Context::new(name.as_str(), file, start.line, start.col),
        );
        scopes.declare(
            scope,
            "arguments",
            JsValue::of_type(ValueType::Object).with_name("arguments"),
        );
        for param in &func.params {
            scopes.set_binding(scope, param, JsValue::unknown().with_name(param.as_str()));
        }
        if bind_own_name && func.name.is_some() {
            scopes.declare(scope, &name, value.clone());
        }
        self.hoist(scope, &func.body);

        self.enter_scope(scope);
        let ambiguous = mem::take(&mut self.ambiguous_depth);
        let dead = mem::take(&mut self.dead_depth);
        let walked = self.statements(&mut func.body);
        self.ambiguous_depth = ambiguous;
        self.dead_depth = dead;
        walked?;
        self.exit_scope()?;

        Ok(value)
    }

    pub(super) fn call(&mut self, callee: &mut Node, args: &mut [Node]) -> Result<JsValue, InternalError> {
        let target = self.eval(callee)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args.iter_mut() {
            values.push(self.eval(arg)?);
        }

        let is_require = matches!(&callee.kind, NodeKind::Name(name) if name == "require")
            && self.ctx.resolve("require").is_none();
        if is_require {
            return self.call_require(&values);
        }

        let is_include = target
            .name
            .as_deref()
            .is_some_and(|name| INCLUDE_CALLEE.is_match(name));
        if is_include {
            if self.dead_depth > 0 {
                tracing::trace!("include in unreachable code not followed");
                return Ok(JsValue::undefined());
            }
            for file in values.iter().filter_map(JsValue::as_str) {
                self.include_file(file)?;
            }
            return Ok(JsValue::undefined());
        }

        Ok(JsValue::unknown())
    }

    fn call_require(&mut self, args: &[JsValue]) -> Result<JsValue, InternalError> {
        let Some(id) = args.first().and_then(JsValue::as_str) else {
            tracing::debug!("require with a non-constant module id");
            return Ok(JsValue::unknown());
        };
        let module = JsValue::of_type(ValueType::Object).with_name(id);
        if self.dead_depth > 0 {
            tracing::trace!(module = id, "require in unreachable code not followed");
            return Ok(module);
        }
        self.require_module(id)?;
        Ok(module)
    }

    pub(super) fn new_expression(
        &mut self,
        callee: &mut Node,
        args: &mut [Node],
    ) -> Result<JsValue, InternalError> {
        let constructor = self.eval(callee)?;
        for arg in args {
            self.eval(arg)?;
        }
        let instance = JsValue::of_type(ValueType::Object);
        Ok(match constructor.name {
            Some(name) => instance.with_name(name),
            None => instance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_callee_matches_both_namespaces() {
        assert!(INCLUDE_CALLEE.is_match("Ti.include"));
        assert!(INCLUDE_CALLEE.is_match("Titanium.include"));
        assert!(!INCLUDE_CALLEE.is_match("Ti.includeFile"));
        assert!(!INCLUDE_CALLEE.is_match("foo.Ti.include"));
    }
}
