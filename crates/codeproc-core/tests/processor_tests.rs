//! End-to-end tests: real project layouts on disk, driven through the
//! public listener surface.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use codeproc_core::ast::Position;
use codeproc_core::config::Config;
use codeproc_core::events::STATE_EVENTS;
use codeproc_core::processor::FileKind;
use codeproc_core::semantic::ScopeKind;
use codeproc_core::{
    CompletionKind, JsValue, JsonAstParser, PluginError, ProcessError, Processor, Rule,
};
use insta::assert_json_snapshot;
use tempfile::TempDir;

const TIAPP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ti:app xmlns:ti="http://ti.appcelerator.org">
    <id>com.example.app</id>
    <name>example</name>
</ti:app>
"#;

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(dir.path().join("tiapp.xml"), TIAPP).expect("Failed to write manifest");
    for (relative, source) in files {
        write_source(dir.path(), relative, source);
    }
    dir
}

fn write_source(root: &Path, relative: &str, source: &str) {
    let path = root.join("Resources").join(relative);
    fs::create_dir_all(path.parent().expect("source has a parent")).expect("Failed to create dir");
    fs::write(path, source).expect("Failed to write source");
}

fn processor() -> Processor {
    Processor::new().with_config(Config::default())
}

type Log<T> = Rc<RefCell<Vec<T>>>;

fn record_state_events(processor: &mut Processor, tag: Option<&str>) -> Log<String> {
    let log = Log::default();
    for &name in STATE_EVENTS {
        let log = Rc::clone(&log);
        processor.on_state(name, tag, move |_, event| {
            log.borrow_mut().push(event.name.to_string());
        });
    }
    log
}

/// Value of `name` as seen by every post-order `Stat` callback.
fn record_lookups_at_statements(processor: &mut Processor, name: &'static str, tag: Option<&str>) -> Log<JsValue> {
    let log = Log::default();
    let sink = Rc::clone(&log);
    processor.on_rule("Stat", false, tag, move |ctx, _| {
        sink.borrow_mut()
            .push(ctx.lookup_variable(name).expect("lookup inside a rule callback"));
    });
    log
}

fn last(log: &Log<JsValue>) -> JsValue {
    log.borrow().last().cloned().expect("at least one lookup")
}

#[test]
fn return_callback_sees_outer_variable() {
    let dir = project(&[("app.js", "var x = 5;\nfunction f() { return x; }\n")]);
    let mut processor = processor();
    let seen: Log<JsValue> = Log::default();
    let sink = Rc::clone(&seen);
    processor.on_rule("Return", false, None, move |ctx, _| {
        sink.borrow_mut()
            .push(ctx.lookup_variable("x").expect("lookup inside a rule callback"));
    });
    let events = record_state_events(&mut processor, None);

    let report = processor.process(dir.path()).expect("processing succeeds");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].as_number(), Some(5.0));
    assert_eq!(report.passes.len(), 1);
    assert_json_snapshot!(events.borrow().clone(), @r#"
    [
      "fileProcessingBegin",
      "contextChange",
      "contextChange",
      "contextChange",
      "contextChange",
      "fileProcessingEnd",
      "processingComplete"
    ]
    "#);
}

#[test]
fn context_changes_carry_the_scope_being_left() {
    let dir = project(&[("app.js", "function outer() { return 1; }\n")]);
    let mut processor = processor();
    let previous: Log<Option<String>> = Log::default();
    let sink = Rc::clone(&previous);
    processor.on_state("contextChange", None, move |_, event| {
        let serialized = serde_json::to_value(&event.data).expect("event data serializes");
        let name = serialized["previousContext"]["name"].as_str().map(str::to_string);
        sink.borrow_mut().push(name);
    });

    processor.process(dir.path()).expect("processing succeeds");

    assert_eq!(
        *previous.borrow(),
        vec![
            None,
            Some("global".to_string()),
            Some("outer".to_string()),
            Some("global".to_string()),
        ]
    );
}

#[test]
fn missing_entry_point_fails_before_any_event() {
    let dir = project(&[]);
    let mut processor = processor();
    let events = record_state_events(&mut processor, None);

    let err = processor.process(dir.path()).unwrap_err();

    assert!(matches!(err, ProcessError::InvalidArgument(_)), "got {err:?}");
    assert!(events.borrow().is_empty());
}

#[test]
fn missing_manifest_is_invalid_argument() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    write_source(dir.path(), "app.js", "var a = 1;");

    let err = processor().process(dir.path()).unwrap_err();

    assert!(matches!(err, ProcessError::InvalidArgument(_)), "got {err:?}");
    assert!(!err.is_fatal());
}

#[test]
fn process_starts_at_mobileweb_main() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(
        dir.path().join("tiapp.xml"),
        "<ti:app xmlns:ti=\"http://ti.appcelerator.org\"><mobileweb><main>main.js</main></mobileweb></ti:app>",
    )
    .expect("Failed to write manifest");
    write_source(dir.path(), "main.js", "var a = 1;");

    let report = processor().process(dir.path()).expect("processing succeeds");

    assert!(report.entry_file.ends_with("Resources/main.js"));
}

#[test]
fn unrecognized_node_info_key_is_fatal() {
    let ast = r#"[
        {"name": "Toplevel", "start": {"line": 1, "col": 0}, "end": {"line": 2, "col": 0}},
        [
            [{"name": "Stat", "start": {"line": 1, "col": 0}, "end": {"line": 1, "col": 2}},
                [{"name": "Num", "start": {"line": 1, "col": 0}, "end": {"line": 1, "col": 1}}, 1]],
            [{"name": "Stat", "start": {"line": 2, "col": 0}, "end": {"line": 2, "col": 2}},
                [{"name": "Num", "start": {"line": 2, "col": 0}, "end": {"line": 2, "col": 1}, "bogus": true}, 2]]
        ]
    ]"#;
    let dir = project(&[("app.js", ast)]);
    let mut processor = processor().with_parser(JsonAstParser);
    let rules: Log<Rule> = Log::default();
    let sink = Rc::clone(&rules);
    processor.on_rule("allrules", true, None, move |_, event| {
        sink.borrow_mut().push(event.rule);
    });
    let events = record_state_events(&mut processor, None);

    let err = processor.process(dir.path()).unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(&err, ProcessError::Internal { pass, .. } if pass == "default"));
    assert_eq!(*rules.borrow(), vec![Rule::Num, Rule::Stat]);
    assert!(!events.borrow().iter().any(|name| name == "processingComplete"));
}

#[test]
fn preorder_and_postorder_see_the_same_value() {
    let dir = project(&[("app.js", "var a = 1 + 2;\na++;\nfoo(a);\n")]);
    let mut processor = processor();
    let pre: Log<(Rule, serde_json::Value)> = Log::default();
    let post: Log<(Rule, serde_json::Value)> = Log::default();
    for (preorder, log) in [(true, &pre), (false, &post)] {
        let sink = Rc::clone(log);
        processor.on_rule("allrules", preorder, None, move |_, event| {
            let value = serde_json::to_value(event.value).expect("value serializes");
            sink.borrow_mut().push((event.rule, value));
        });
    }

    processor.process(dir.path()).expect("processing succeeds");

    assert!(!pre.borrow().is_empty());
    assert_eq!(*pre.borrow(), *post.borrow());
}

#[test]
fn specific_listener_runs_before_wildcard() {
    let dir = project(&[("app.js", "foo();\n")]);
    let mut processor = processor();
    let order: Log<&'static str> = Log::default();
    let wildcard = Rc::clone(&order);
    processor.on_rule("allrules", false, None, move |_, event| {
        if event.rule == Rule::Call {
            wildcard.borrow_mut().push("allrules");
        }
    });
    let specific = Rc::clone(&order);
    processor.on_rule("Call", false, None, move |_, _| {
        specific.borrow_mut().push("Call");
    });

    processor.process(dir.path()).expect("processing succeeds");

    assert_eq!(*order.borrow(), vec!["Call", "allrules"]);
}

#[test]
fn tagged_passes_run_first_in_registration_order() {
    let dir = project(&[("app.js", "var a = 1;\n")]);
    let mut processor = processor();
    let order: Log<String> = Log::default();
    for tag in [Some("b"), Some("a"), None] {
        let sink = Rc::clone(&order);
        processor.on_state("processingComplete", tag, move |ctx, _| {
            sink.borrow_mut()
                .push(ctx.tag().unwrap_or("default").to_string());
        });
    }

    let report = processor.process(dir.path()).expect("processing succeeds");

    assert_eq!(*order.borrow(), vec!["b", "a", "default"]);
    assert_eq!(report.passes.len(), 3);
    assert!(report.pass(Some("a")).is_some());
    assert!(report.pass(None).is_some());
}

#[test]
fn replacement_in_one_tag_is_invisible_to_others() {
    let dir = project(&[("app.js", "var x = 1;\nx;\n")]);
    let mut processor = processor();
    processor.on_rule("Num", false, Some("rewrite"), |ctx, event| {
        let is_one = event.value.as_value().and_then(JsValue::as_number) == Some(1.0);
        if is_one {
            ctx.replace_branch_with_source("2;").expect("replacement parses");
        }
    });
    let rewritten = record_lookups_at_statements(&mut processor, "x", Some("rewrite"));
    let untouched = record_lookups_at_statements(&mut processor, "x", None);

    processor.process(dir.path()).expect("processing succeeds");

    assert_eq!(last(&rewritten).as_number(), Some(2.0));
    assert_eq!(last(&untouched).as_number(), Some(1.0));
}

#[test]
fn replacement_source_must_be_one_statement() {
    let dir = project(&[("app.js", "a;\n")]);
    let mut processor = processor();
    let results: Log<Result<(), PluginError>> = Log::default();
    let sink = Rc::clone(&results);
    processor.on_rule("Stat", false, None, move |ctx, _| {
        sink.borrow_mut().push(ctx.replace_branch_with_source("b; c;"));
    });

    processor.process(dir.path()).expect("processing succeeds");

    let results = results.borrow();
    assert_eq!(results.len(), 1);
    assert!(matches!(&results[0], Err(PluginError::InvalidArgument(msg)) if msg.contains("found 2")));
}

#[test]
fn lookup_outside_rule_callback_is_invalid_context() {
    let dir = project(&[("app.js", "var a = 1;\n")]);
    let mut processor = processor();
    let results: Log<Result<JsValue, PluginError>> = Log::default();
    let sink = Rc::clone(&results);
    processor.on_state("fileProcessingEnd", None, move |ctx, _| {
        sink.borrow_mut().push(ctx.lookup_variable("a"));
    });

    processor.process(dir.path()).expect("processing succeeds");

    assert_eq!(
        *results.borrow(),
        vec![Err(PluginError::InvalidContext("lookup_variable"))]
    );
}

#[test]
fn parse_error_abandons_only_that_file() {
    let dir = project(&[
        ("app.js", "Ti.include('broken.js');\nvar after = 1;\n"),
        ("broken.js", "var = ;\n"),
    ]);
    let mut processor = processor();
    let events = record_state_events(&mut processor, None);
    let after = record_lookups_at_statements(&mut processor, "after", None);

    let report = processor.process(dir.path()).expect("processing succeeds");

    let events = events.borrow();
    let count = |name: &str| events.iter().filter(|e| e.as_str() == name).count();
    assert_eq!(count("parseError"), 1);
    assert_eq!(count("fileProcessingBegin"), 2);
    assert_eq!(count("fileProcessingEnd"), 1);
    assert_eq!(count("processingComplete"), 1);

    let summary = report.pass(None).expect("default pass");
    assert_eq!(summary.parse_errors.len(), 1);
    assert!(summary.parse_errors[0].file.ends_with("broken.js"));
    assert!(!after.borrow().is_empty());
}

#[test]
fn includes_and_requires_are_processed_once() {
    let dir = project(&[
        (
            "app.js",
            "Ti.include('lib.js');\nTitanium.include('/lib.js');\nvar m = require('mod');\nvar n = require('./mod');\nsecret;\n",
        ),
        ("lib.js", "var shared = 1;\n"),
        ("mod.js", "var secret = 42;\n"),
    ]);
    let mut processor = processor();
    let events = record_state_events(&mut processor, None);
    let secret = record_lookups_at_statements(&mut processor, "secret", None);
    let shared = record_lookups_at_statements(&mut processor, "shared", None);

    let report = processor.process(dir.path()).expect("processing succeeds");

    let events = events.borrow();
    let count = |name: &str| events.iter().filter(|e| e.as_str() == name).count();
    assert_eq!(count("fileInclude"), 2);
    assert_eq!(count("fileRequire"), 2);
    assert_eq!(count("fileProcessingBegin"), 3);

    let files = &report.passes[0].files;
    let kinds: Vec<(String, FileKind)> = files
        .iter()
        .map(|f| {
            let name = f.path.file_name().map(|n| n.to_string_lossy().into_owned());
            (name.unwrap_or_default(), f.kind)
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("app.js".to_string(), FileKind::Script),
            ("lib.js".to_string(), FileKind::Script),
            ("mod.js".to_string(), FileKind::Module),
        ]
    );

    assert!(last(&secret).is_unknown());
    assert_eq!(last(&shared).as_number(), Some(1.0));
}

#[test]
fn missing_include_reports_load_error() {
    let dir = project(&[("app.js", "Ti.include('nowhere.js');\n")]);
    let mut processor = processor();
    let errors: Log<String> = Log::default();
    let sink = Rc::clone(&errors);
    processor.on_state("fileLoadError", None, move |_, event| {
        let data = serde_json::to_value(&event.data).expect("event data serializes");
        sink.borrow_mut()
            .push(data["error"].as_str().unwrap_or_default().to_string());
    });

    let report = processor.process(dir.path()).expect("processing succeeds");

    assert_eq!(*errors.borrow(), vec!["File Not Found"]);
    assert_eq!(report.passes[0].load_errors.len(), 1);
}

#[test]
fn disabled_includes_are_announced_but_not_followed() {
    let dir = project(&[
        ("app.js", "Ti.include('lib.js');\n"),
        ("lib.js", "var shared = 1;\n"),
    ]);
    let mut config = Config::default();
    config.processor.follow_includes = false;
    let mut processor = Processor::new().with_config(config);
    let events = record_state_events(&mut processor, None);

    let report = processor.process(dir.path()).expect("processing succeeds");

    assert!(events.borrow().iter().any(|e| e == "fileInclude"));
    assert_eq!(report.passes[0].files.len(), 1);
}

#[test]
fn write_under_unknown_condition_becomes_unknown() {
    let dir = project(&[("app.js", "var a = 1;\nif (flag) { a = 2; }\na;\n")]);
    let mut processor = processor();
    let a = record_lookups_at_statements(&mut processor, "a", None);

    processor.process(dir.path()).expect("processing succeeds");

    assert!(last(&a).is_unknown());
}

#[test]
fn write_in_unreachable_branch_is_ignored() {
    let dir = project(&[("app.js", "var b = 1;\nif (false) { b = 2; }\nb;\n")]);
    let mut processor = processor();
    let b = record_lookups_at_statements(&mut processor, "b", None);

    processor.process(dir.path()).expect("processing succeeds");

    assert_eq!(last(&b).as_number(), Some(1.0));
}

#[test]
fn write_from_function_body_makes_outer_binding_unknown() {
    let dir = project(&[("app.js", "var c = 1;\nfunction g() { c = 5; }\nc;\n")]);
    let mut processor = processor();
    let c = record_lookups_at_statements(&mut processor, "c", None);

    processor.process(dir.path()).expect("processing succeeds");

    assert!(last(&c).is_unknown());
}

#[test]
fn writes_through_properties_count_as_unknown_effects() {
    let dir = project(&[("app.js", "var o = {};\no.p = 1;\ndelete o.q;\n")]);

    let report = processor().process(dir.path()).expect("processing succeeds");

    assert_eq!(report.passes[0].unknown_effects, 2);
}

#[test]
fn extra_position_key_is_fatal() {
    let ast = r#"[
        {"name": "Toplevel", "start": {"line": 1, "col": 0, "offset": 0}, "end": {"line": 1, "col": 2}},
        [[{"name": "Stat", "start": {"line": 1, "col": 0}, "end": {"line": 1, "col": 2}},
            [{"name": "Num", "start": {"line": 1, "col": 0}, "end": {"line": 1, "col": 1}}, 1]]]
    ]"#;
    let dir = project(&[("app.js", ast)]);
    let mut processor = processor().with_parser(JsonAstParser);

    let err = processor.process(dir.path()).unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, ProcessError::Internal { .. }), "got {err:?}");
}

#[test]
fn each_node_fires_once_in_each_order() {
    let dir = project(&[("app.js", "var a = 1 + 2;\na++;\nfoo(a);\n")]);
    let mut processor = processor();
    let counts: Rc<RefCell<BTreeMap<(&'static str, Position, Position), (usize, usize)>>> =
        Rc::default();
    for preorder in [true, false] {
        let sink = Rc::clone(&counts);
        processor.on_rule("allrules", preorder, None, move |_, event| {
            let key = (event.rule.name(), event.node.info.start, event.node.info.end);
            let mut counts = sink.borrow_mut();
            let entry = counts.entry(key).or_default();
            if event.preorder {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        });
    }

    processor.process(dir.path()).expect("processing succeeds");

    let counts = counts.borrow();
    assert!(counts.len() > 5);
    for (key, fired) in counts.iter() {
        assert_eq!(*fired, (1, 1), "{key:?}");
    }
}

#[test]
fn dot_events_carry_platform_api_names() {
    let dir = project(&[(
        "app.js",
        "var win = Ti.UI.createWindow();\nvar ui = Ti.UI;\nui.createView();\nvar w = win;\nw.open();\n",
    )]);
    let mut processor = processor();
    let names: Log<Option<String>> = Log::default();
    let sink = Rc::clone(&names);
    processor.on_rule("Dot", false, None, move |_, event| {
        sink.borrow_mut()
            .push(event.value.as_value().and_then(|value| value.name.clone()));
    });

    processor.process(dir.path()).expect("processing succeeds");

    let names: Vec<String> = names.borrow().iter().flatten().cloned().collect();
    assert_eq!(
        names,
        vec![
            "Ti.UI",
            "Ti.UI.createWindow",
            "Ti.UI",
            "Ti.UI.createView",
            "w.open"
        ]
    );
}

#[test]
fn shadowed_require_is_not_followed() {
    let dir = project(&[
        ("app.js", "function load(require) { require('mod'); }\nload(1);\n"),
        ("mod.js", "var secret = 42;\n"),
    ]);
    let mut processor = processor();
    let events = record_state_events(&mut processor, None);

    let report = processor.process(dir.path()).expect("processing succeeds");

    assert!(!events.borrow().iter().any(|e| e == "fileRequire"));
    assert_eq!(report.passes[0].files.len(), 1);
}

#[test]
fn replacement_chain_stops_after_sixteen_levels() {
    let dir = project(&[("app.js", "1;\n")]);
    let mut processor = processor();
    let firings: Log<Option<f64>> = Log::default();
    let sink = Rc::clone(&firings);
    processor.on_rule("Num", false, None, move |ctx, event| {
        sink.borrow_mut()
            .push(event.value.as_value().and_then(JsValue::as_number));
        ctx.replace_branch_with_source("2;").expect("replacement parses");
    });

    processor.process(dir.path()).expect("processing succeeds");

    let firings = firings.borrow();
    assert_eq!(firings.len(), 17);
    assert_eq!(firings[0], Some(1.0));
    assert!(firings[1..].iter().all(|n| *n == Some(2.0)));
}

#[test]
fn labels_absorb_their_own_break_and_continue() {
    let dir = project(&[(
        "app.js",
        "var z = 0;\nouter: { break outer; }\nloop: while (true) { continue loop; }\nz = 1;\nz;\n",
    )]);
    let mut processor = processor();
    let labels: Log<CompletionKind> = Log::default();
    let sink = Rc::clone(&labels);
    processor.on_rule("Label", false, None, move |_, event| {
        if let Some(completion) = event.value.as_completion() {
            sink.borrow_mut().push(completion.kind);
        }
    });
    let z = record_lookups_at_statements(&mut processor, "z", None);

    processor.process(dir.path()).expect("processing succeeds");

    assert_eq!(
        *labels.borrow(),
        vec![CompletionKind::Normal, CompletionKind::Normal]
    );
    assert_eq!(last(&z).as_number(), Some(1.0));
}

#[test]
fn return_leaves_entered_loops_only() {
    let dir = project(&[
        (
            "app.js",
            "function f() {\n  do { return 1; } while (x);\n  Ti.include('late.js');\n}\n\
             function g() {\n  while (true) { return 2; }\n  Ti.include('late.js');\n}\n\
             function h() {\n  for (var k in o) { return 3; }\n  Ti.include('reached.js');\n}\n",
        ),
        ("late.js", "var late = 1;\n"),
        ("reached.js", "var reached = 1;\n"),
    ]);
    let mut processor = processor();
    let loops: Log<(Rule, CompletionKind)> = Log::default();
    for rule in ["Do", "While", "ForIn"] {
        let sink = Rc::clone(&loops);
        processor.on_rule(rule, false, None, move |_, event| {
            if let Some(completion) = event.value.as_completion() {
                sink.borrow_mut().push((event.rule, completion.kind));
            }
        });
    }

    let report = processor.process(dir.path()).expect("processing succeeds");

    assert_eq!(
        *loops.borrow(),
        vec![
            (Rule::Do, CompletionKind::Return),
            (Rule::While, CompletionKind::Return),
            (Rule::ForIn, CompletionKind::Normal),
        ]
    );
    let files: Vec<_> = report.passes[0]
        .files
        .iter()
        .filter_map(|f| f.path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(files, vec!["app.js", "reached.js"]);
}

#[test]
fn scope_history_follows_creation_order() {
    let dir = project(&[
        (
            "app.js",
            "function outer() {\n  try { risky(); } catch (e) {}\n}\nvar m = require('mod');\n",
        ),
        ("mod.js", "function inner() {}\n"),
    ]);
    let mut processor = processor();
    let history: Log<(ScopeKind, String, Option<String>)> = Log::default();
    let sink = Rc::clone(&history);
    processor.on_state("processingComplete", None, move |ctx, _| {
        let scopes = ctx.scopes();
        sink.borrow_mut().extend(scopes.history().map(|scope| {
            let parent = scope.parent.map(|id| scopes.get(id).context.name.clone());
            (scope.kind, scope.context.name.clone(), parent)
        }));
    });

    processor.process(dir.path()).expect("processing succeeds");

    let global = Some("global".to_string());
    assert_eq!(
        *history.borrow(),
        vec![
            (ScopeKind::Global, "global".to_string(), None),
            (ScopeKind::Function, "outer".to_string(), global.clone()),
            (ScopeKind::Catch, "catch".to_string(), Some("outer".to_string())),
            (ScopeKind::Module, "mod.js".to_string(), global),
            (ScopeKind::Function, "inner".to_string(), Some("mod.js".to_string())),
        ]
    );
}
