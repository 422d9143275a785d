//! Criterion benchmarks for the expression engine

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::time::Duration;
use tessera_expr::{Engine, MapScope};

fn custom_criterion() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .warm_up_time(Duration::from_millis(100))
        .measurement_time(Duration::from_secs(1))
        .nresamples(1000)
        .noise_threshold(0.05)
}

fn test_scope() -> MapScope {
    let lines: Vec<_> = (0..50)
        .map(|i| json!({"sku": format!("sku-{}", i), "qty": i % 7, "price": i as f64 * 0.5}))
        .collect();
    MapScope::new()
        .with("name", json!("world"))
        .with("order", json!({"id": "A-17", "lines": lines}))
}

fn bench_value_expressions(c: &mut Criterion) {
    let engine = Engine::new();
    let scope = test_scope();

    c.bench_function("simple_arithmetic", |b| {
        b.iter(|| engine.evaluate(black_box("1 + 2 * 3"), &scope).unwrap())
    });

    c.bench_function("member_navigation", |b| {
        b.iter(|| engine.evaluate(black_box("order.lines[10].sku"), &scope).unwrap())
    });

    c.bench_function("function_call", |b| {
        b.iter(|| engine.evaluate(black_box("name.upper().size()"), &scope).unwrap())
    });
}

fn bench_templates(c: &mut Criterion) {
    let engine = Engine::new();
    let scope = test_scope();

    c.bench_function("template_render", |b| {
        b.iter(|| {
            engine
                .render_template(black_box("Hello ${name}, order ${order.id}"), &scope)
                .unwrap()
        })
    });
}

fn bench_paths(c: &mut Criterion) {
    let engine = Engine::new();
    let scope = test_scope();

    c.bench_function("path_predicate", |b| {
        b.iter(|| {
            engine
                .select_path(black_box("/order/lines[sku = 'sku-42']/qty"), &scope)
                .unwrap()
        })
    });

    c.bench_function("path_descendant_multi", |b| {
        b.iter(|| engine.select_all(black_box("//qty"), &scope).unwrap())
    });
}

fn bench_compile_uncached(c: &mut Criterion) {
    c.bench_function("compile_uncached", |b| {
        b.iter(|| {
            let engine = Engine::new();
            engine
                .compile(black_box("a > 1 && (b ?? 'x').size() == 3 ? [1, 2] : {k: c}"))
                .unwrap()
        })
    });
}

criterion_group! {
    name = benches;
    config = custom_criterion();
    targets = bench_value_expressions, bench_templates, bench_paths, bench_compile_uncached
}
criterion_main!(benches);
