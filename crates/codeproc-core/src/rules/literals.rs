use crate::ast::{Atom, Node, Property};
use crate::error::InternalError;
use crate::processor::Pass;
use crate::semantic::{Reference, get_value};
use crate::value::{JsValue, ValueType};

impl Pass<'_> {
    pub(super) fn atom(&self, atom: Atom) -> JsValue {
        match atom {
            Atom::True => JsValue::boolean(true),
            Atom::False => JsValue::boolean(false),
            Atom::Null => JsValue::null(),
            Atom::Undefined => JsValue::undefined(),
            Atom::This => JsValue::unknown().with_name("this"),
        }
    }

    pub(super) fn name(&self, name: &str) -> JsValue {
        let value = match self.ctx.resolve(name) {
            Some(scope) => get_value(self.ctx.scopes(), &Reference::binding(scope, name)),
            None => JsValue::unknown(),
        };
        if value.name.as_deref().is_some_and(is_platform_path) {
            return value;
        }
        value.with_name(name)
    }

    pub(super) fn array(&mut self, items: &mut [Node]) -> Result<JsValue, InternalError> {
        for item in items {
            self.eval(item)?;
        }
        Ok(JsValue::of_type(ValueType::Array))
    }

    pub(super) fn object(&mut self, props: &mut [Property]) -> Result<JsValue, InternalError> {
        for prop in props {
            self.eval(&mut prop.value)?;
        }
        Ok(JsValue::of_type(ValueType::Object))
    }
}

/// `Ti.UI`, `Titanium.App.Properties` and the like. An alias bound to one of
/// these keeps reporting the platform path.
fn is_platform_path(name: &str) -> bool {
    name.split_once('.')
        .is_some_and(|(root, _)| matches!(root, "Ti" | "Titanium"))
}
