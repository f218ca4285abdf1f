use std::fs;
use std::hint::black_box;
use std::path::Path;

use codeproc_core::config::Config;
use codeproc_core::parser::{SourceParser, SwcParser};
use codeproc_core::Processor;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tempfile::TempDir;

const TIAPP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ti:app xmlns:ti="http://ti.appcelerator.org">
    <id>com.example.bench</id>
</ti:app>
"#;

fn generate_window_module(i: usize) -> String {
    format!(
        r#"var count{i} = 0;
var labels{i} = ["a", "b", "c"];

function createWindow{i}(title) {{
    var win = Ti.UI.createWindow({{ title: title, backgroundColor: "#fff" }});
    for (var j = 0; j < labels{i}.length; j++) {{
        var label = Ti.UI.createLabel({{ text: labels{i}[j] }});
        win.add(label);
    }}
    if (title.length > 10) {{
        count{i} = count{i} + 1;
    }} else {{
        count{i}++;
    }}
    try {{
        win.open();
    }} catch (e) {{
        Ti.API.error(e);
    }}
    return win;
}}

exports.open{i} = function () {{
    return createWindow{i}("Window {i}");
}};
"#
    )
}

/// Entry point that requires `modules` generated files.
fn generate_project(modules: usize) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let resources = dir.path().join("Resources");
    fs::create_dir_all(resources.join("ui")).expect("Failed to create Resources");
    fs::write(dir.path().join("tiapp.xml"), TIAPP).expect("Failed to write manifest");

    let mut app = String::from("var windows = [];\n");
    for i in 0..modules {
        app.push_str(&format!("var ui{i} = require('ui/window{i}');\n"));
        app.push_str(&format!("windows.push(ui{i}.open{i}());\n"));
        fs::write(
            resources.join("ui").join(format!("window{i}.js")),
            generate_window_module(i),
        )
        .expect("Failed to write module");
    }
    fs::write(resources.join("app.js"), app).expect("Failed to write entry point");
    dir
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    let source: String = (0..20).map(generate_window_module).collect();
    group.throughput(Throughput::Bytes(source.len() as u64));

    let parser = SwcParser::new();
    group.bench_function("swc_lowering", |b| {
        b.iter(|| parser.parse(Path::new("bench.js"), black_box(&source)))
    });
    group.finish();
}

fn bench_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("processing");

    for modules in [1, 10, 50] {
        let project = generate_project(modules);
        group.throughput(Throughput::Elements(modules as u64));
        group.bench_with_input(BenchmarkId::new("no_listeners", modules), &project, |b, project| {
            b.iter(|| {
                let mut processor = Processor::new().with_config(Config::default());
                processor.process(black_box(project.path()))
            })
        });
        group.bench_with_input(BenchmarkId::new("allrules_listener", modules), &project, |b, project| {
            b.iter(|| {
                let mut processor = Processor::new().with_config(Config::default());
                processor.on_rule("allrules", false, None, |ctx, event| {
                    black_box((ctx.current_context(), event.rule));
                });
                processor.process(black_box(project.path()))
            })
        });
    }
    group.finish();
}

fn bench_tagged_passes(c: &mut Criterion) {
    let project = generate_project(10);
    c.bench_function("four_tagged_passes", |b| {
        b.iter(|| {
            let mut processor = Processor::new().with_config(Config::default());
            for tag in ["a", "b", "c", "d"] {
                processor.on_rule("Call", true, Some(tag), |ctx, _| {
                    black_box(ctx.lookup_variable("windows").ok());
                });
            }
            processor.process(black_box(project.path()))
        })
    });
}

criterion_group!(benches, bench_parsing, bench_processing, bench_tagged_passes);
criterion_main!(benches);
