use crate::ast::{Node, NodeKind, SwitchCase};
use crate::error::InternalError;
use crate::processor::Pass;
use crate::value::{JsValue, ValueType};

use super::{Completion, CompletionKind};

/// What a loop statement completes with once its body has been walked.
///
/// Unlabeled `break`/`continue` end at the loop. A `return` only escapes if
/// the body is known to run at least once.
fn loop_completion(body: Completion, entered: bool) -> Completion {
    match body.kind {
        CompletionKind::Break | CompletionKind::Continue if body.target.is_none() => {
            Completion::normal(None)
        }
        CompletionKind::Return if !entered => Completion::normal(None),
        _ => body,
    }
}

impl Pass<'_> {
    pub(super) fn if_statement(
        &mut self,
        test: &mut Node,
        consequent: &mut Node,
        alternate: Option<&mut Node>,
    ) -> Result<Completion, InternalError> {
        let test = self.eval(test)?;
        match (test.truthiness(), alternate) {
            (Some(true), alternate) => {
                let taken = self.execute(consequent)?;
                if let Some(alternate) = alternate {
                    self.dead(|pass| pass.execute(alternate))?;
                }
                Ok(taken)
            }
            (Some(false), alternate) => {
                self.dead(|pass| pass.execute(consequent))?;
                match alternate {
                    Some(alternate) => self.execute(alternate),
                    None => Ok(Completion::normal(None)),
                }
            }
            (None, Some(alternate)) => {
                let a = self.ambiguous(|pass| pass.execute(consequent))?;
                let b = self.ambiguous(|pass| pass.execute(alternate))?;
                Ok(a.merge(b))
            }
            (None, None) => {
                self.ambiguous(|pass| pass.execute(consequent))?;
                Ok(Completion::normal(None))
            }
        }
    }

    pub(super) fn while_loop(&mut self, test: &mut Node, body: &mut Node) -> Result<Completion, InternalError> {
        let test = self.eval(test)?.truthiness();
        if test == Some(false) {
            self.dead(|pass| pass.execute(body))?;
            return Ok(Completion::normal(None));
        }
        let completion = self.ambiguous(|pass| pass.execute(body))?;
        Ok(loop_completion(completion, test == Some(true)))
    }

    pub(super) fn do_loop(&mut self, test: &mut Node, body: &mut Node) -> Result<Completion, InternalError> {
        let completion = self.ambiguous(|pass| {
            let completion = pass.execute(body)?;
            pass.eval(test)?;
            Ok(completion)
        })?;
        Ok(loop_completion(completion, true))
    }

    pub(super) fn for_loop(
        &mut self,
        init: Option<&mut Node>,
        test: Option<&mut Node>,
        update: Option<&mut Node>,
        body: &mut Node,
    ) -> Result<Completion, InternalError> {
        if let Some(init) = init {
            self.execute(init)?;
        }
        let test = match test {
            Some(test) => self.eval(test)?.truthiness(),
            None => Some(true),
        };

        let region = |pass: &mut Self| -> Result<Completion, InternalError> {
            let completion = pass.execute(body)?;
            if let Some(update) = update {
                pass.eval(update)?;
            }
            Ok(completion)
        };
        if test == Some(false) {
            self.dead(region)?;
            return Ok(Completion::normal(None));
        }
        let completion = self.ambiguous(region)?;
        Ok(loop_completion(completion, test == Some(true)))
    }

    pub(super) fn for_in(
        &mut self,
        left: &mut Node,
        right: &mut Node,
        body: &mut Node,
    ) -> Result<Completion, InternalError> {
        let declared = match &left.kind {
            NodeKind::Var(decls) if decls.len() == 1 => Some(decls[0].name.clone()),
            _ => None,
        };
        let reference = match declared {
            Some(name) => {
                self.execute(left)?;
                self.binding_reference(&name)
            }
            None => self.target(left)?.1,
        };
        self.eval(right)?;

        let completion = self.ambiguous(|pass| {
            pass.store(&reference, JsValue::of_type(ValueType::String));
            pass.execute(body)
        })?;
        Ok(loop_completion(completion, false))
    }

    /// Evaluates every case; which ones run is never known, so all of them
    /// are walked as possibly executing.
    pub(super) fn switch(
        &mut self,
        discriminant: &mut Node,
        cases: &mut [SwitchCase],
    ) -> Result<Completion, InternalError> {
        self.eval(discriminant)?;
        self.ambiguous(|pass| {
            for case in cases {
                if let Some(test) = case.test.as_mut() {
                    pass.eval(test)?;
                }
                pass.statements(&mut case.body)?;
            }
            Ok(())
        })?;
        Ok(Completion::normal(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlabeled_break_ends_at_loop() {
        let body = Completion::abrupt(CompletionKind::Break, None, None);

        assert_eq!(loop_completion(body, false), Completion::normal(None));
    }

    #[test]
    fn labeled_continue_propagates() {
        let body = Completion::abrupt(CompletionKind::Continue, None, Some("outer".to_string()));

        assert_eq!(loop_completion(body.clone(), true), body);
    }

    #[test]
    fn return_escapes_only_entered_loops() {
        let body = Completion::abrupt(CompletionKind::Return, Some(JsValue::number(1.0)), None);

        assert_eq!(loop_completion(body.clone(), true), body);
        assert_eq!(loop_completion(body, false), Completion::normal(None));
    }
}
