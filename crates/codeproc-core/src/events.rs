//! Listener registry and event payloads
//!
//! Listeners are grouped into sets. The default set has no tag; every other
//! set is keyed by the tag it was registered under and gets a full pass of
//! its own. Within a set, process-state listeners are keyed by event name and
//! rule listeners by rule name and traversal order.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::ast::{ALL_RULES, Node, Rule};
use crate::processor::PassContext;
use crate::rules::RuleValue;
use crate::semantic::Context;

pub const FILE_LOAD_ERROR: &str = "fileLoadError";
pub const FILE_PROCESSING_BEGIN: &str = "fileProcessingBegin";
pub const FILE_PROCESSING_END: &str = "fileProcessingEnd";
pub const PARSE_ERROR: &str = "parseError";
pub const CONTEXT_CHANGE: &str = "contextChange";
pub const FILE_INCLUDE: &str = "fileInclude";
pub const FILE_REQUIRE: &str = "fileRequire";
pub const PROCESSING_COMPLETE: &str = "processingComplete";

/// Event names the engine fires.
pub const STATE_EVENTS: &[&str] = &[
    FILE_LOAD_ERROR,
    FILE_PROCESSING_BEGIN,
    FILE_PROCESSING_END,
    PARSE_ERROR,
    CONTEXT_CHANGE,
    FILE_INCLUDE,
    FILE_REQUIRE,
    PROCESSING_COMPLETE,
];

/// Payload of a process-state event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    #[serde(rename_all = "camelCase")]
    FileLoadError { file: PathBuf, error: String },
    FileProcessingBegin { file: PathBuf },
    FileProcessingEnd { file: PathBuf },
    ParseError {
        file: PathBuf,
        message: String,
        line: usize,
        column: usize,
    },
    #[serde(rename_all = "camelCase")]
    ContextChange { previous_context: Option<Context> },
    #[serde(rename_all = "camelCase")]
    FileInclude { including_file: PathBuf, file: PathBuf },
    #[serde(rename_all = "camelCase")]
    FileRequire { requiring_file: PathBuf, module: String },
    ProcessingComplete {},
}

impl EventData {
    pub fn name(&self) -> &'static str {
        match self {
            EventData::FileLoadError { .. } => FILE_LOAD_ERROR,
            EventData::FileProcessingBegin { .. } => FILE_PROCESSING_BEGIN,
            EventData::FileProcessingEnd { .. } => FILE_PROCESSING_END,
            EventData::ParseError { .. } => PARSE_ERROR,
            EventData::ContextChange { .. } => CONTEXT_CHANGE,
            EventData::FileInclude { .. } => FILE_INCLUDE,
            EventData::FileRequire { .. } => FILE_REQUIRE,
            EventData::ProcessingComplete {} => PROCESSING_COMPLETE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEvent {
    pub name: &'static str,
    pub current_context: Option<Context>,
    pub data: EventData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvent<'a> {
    pub current_context: Option<Context>,
    pub rule: Rule,
    pub node: &'a Node,
    pub value: &'a RuleValue,
    pub preorder: bool,
}

pub type StateCallback = Box<dyn FnMut(&mut PassContext, &StateEvent)>;
pub type RuleCallback = Box<dyn FnMut(&mut PassContext, &RuleEvent<'_>)>;

#[derive(Default)]
struct RuleListeners {
    pre: Vec<RuleCallback>,
    post: Vec<RuleCallback>,
}

impl RuleListeners {
    fn order(&mut self, preorder: bool) -> &mut Vec<RuleCallback> {
        if preorder { &mut self.pre } else { &mut self.post }
    }
}

/// Listeners that take part in one pass.
#[derive(Default)]
pub struct ListenerSet {
    tag: Option<String>,
    state: HashMap<String, Vec<StateCallback>>,
    rules: HashMap<String, RuleListeners>,
}

impl ListenerSet {
    fn new(tag: Option<String>) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Number of registered callbacks of either kind.
    pub fn len(&self) -> usize {
        let state: usize = self.state.values().map(Vec::len).sum();
        let rules: usize = self
            .rules
            .values()
            .map(|listeners| listeners.pre.len() + listeners.post.len())
            .sum();
        state + rules
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn fire_state(&mut self, ctx: &mut PassContext, event: &StateEvent) {
        if let Some(callbacks) = self.state.get_mut(event.name) {
            for callback in callbacks.iter_mut() {
                callback(ctx, event);
            }
        }
    }

    /// Runs the listeners for the node's rule, then the wildcard listeners.
    pub(crate) fn fire_rule(&mut self, ctx: &mut PassContext, event: &RuleEvent<'_>) {
        for key in [event.rule.name(), ALL_RULES] {
            if let Some(listeners) = self.rules.get_mut(key) {
                for callback in listeners.order(event.preorder).iter_mut() {
                    ctx.enter_rule_callback();
                    callback(ctx, event);
                    ctx.leave_rule_callback();
                }
            }
        }
    }
}

/// Every listener registered with a processor, grouped by tag.
#[derive(Default)]
pub struct ListenerRegistry {
    default: ListenerSet,
    tagged: Vec<ListenerSet>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_mut(&mut self, tag: Option<&str>) -> &mut ListenerSet {
        let Some(tag) = tag else {
            return &mut self.default;
        };
        let index = match self.tagged.iter().position(|set| set.tag() == Some(tag)) {
            Some(index) => index,
            None => {
                self.tagged.push(ListenerSet::new(Some(tag.to_string())));
                self.tagged.len() - 1
            }
        };
        &mut self.tagged[index]
    }

    pub fn on_state(&mut self, event: &str, tag: Option<&str>, callback: StateCallback) {
        if !STATE_EVENTS.contains(&event) {
            tracing::warn!(event, "listener registered for an event that is never fired");
        }
        self.set_mut(tag)
            .state
            .entry(event.to_string())
            .or_default()
            .push(callback);
    }

    pub fn on_rule(&mut self, rule: &str, preorder: bool, tag: Option<&str>, callback: RuleCallback) {
        if rule != ALL_RULES && Rule::from_name(rule).is_none() {
            tracing::warn!(rule, "listener registered for an unknown rule");
        }
        self.set_mut(tag)
            .rules
            .entry(rule.to_string())
            .or_default()
            .order(preorder)
            .push(callback);
    }

    /// Tags in registration order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tagged.iter().filter_map(ListenerSet::tag)
    }

    /// Tagged sets in registration order, then the default set.
    pub(crate) fn passes_mut(&mut self) -> impl Iterator<Item = &mut ListenerSet> {
        self.tagged
            .iter_mut()
            .chain(std::iter::once(&mut self.default))
    }

    pub fn pass_count(&self) -> usize {
        self.tagged.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_state() -> StateCallback {
        Box::new(|_: &mut PassContext, _: &StateEvent| {})
    }

    fn noop_rule() -> RuleCallback {
        Box::new(|_: &mut PassContext, _: &RuleEvent<'_>| {})
    }

    #[test]
    fn untagged_listeners_go_to_default_set() {
        let mut registry = ListenerRegistry::new();
        registry.on_state(FILE_PROCESSING_BEGIN, None, noop_state());
        registry.on_rule("Call", true, None, noop_rule());

        assert_eq!(registry.pass_count(), 1);
        assert_eq!(registry.default.len(), 2);
        assert_eq!(registry.tags().count(), 0);
    }

    #[test]
    fn tags_keep_registration_order() {
        let mut registry = ListenerRegistry::new();
        registry.on_rule("Call", true, Some("b"), noop_rule());
        registry.on_rule("Call", true, Some("a"), noop_rule());
        registry.on_state(PROCESSING_COMPLETE, Some("b"), noop_state());

        let tags: Vec<&str> = registry.tags().collect();

        assert_eq!(tags, vec!["b", "a"]);
        assert_eq!(registry.pass_count(), 3);
        assert_eq!(registry.tagged[0].len(), 2);
    }

    #[test]
    fn default_set_runs_last() {
        let mut registry = ListenerRegistry::new();
        registry.on_rule("Call", true, Some("lint"), noop_rule());

        let tags: Vec<Option<String>> = registry
            .passes_mut()
            .map(|set| set.tag().map(str::to_string))
            .collect();

        assert_eq!(tags, vec![Some("lint".to_string()), None]);
    }

    #[test]
    fn unknown_rule_name_is_accepted_but_never_matches() {
        let mut registry = ListenerRegistry::new();
        registry.on_rule("Yield", false, None, noop_rule());

        assert_eq!(registry.default.len(), 1);
        assert!(Rule::from_name("Yield").is_none());
    }

    #[test]
    fn event_data_serializes_camel_case_payload() {
        let data = EventData::FileInclude {
            including_file: PathBuf::from("app.js"),
            file: PathBuf::from("lib.js"),
        };

        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(data.name(), FILE_INCLUDE);
        assert_eq!(
            json,
            serde_json::json!({"includingFile": "app.js", "file": "lib.js"})
        );
    }

    #[test]
    fn processing_complete_has_empty_payload() {
        let json = serde_json::to_value(EventData::ProcessingComplete {}).unwrap();

        assert_eq!(json, serde_json::json!({}));
    }
}
