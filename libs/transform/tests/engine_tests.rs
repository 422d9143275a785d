//! Behavioural properties of the transform engine

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_expr::{Engine, Error as ExprError};
use tessera_transform::{
    Context, Error, FsLoader, MapContext, MemoryLoader, OutputFormat, Template, TransformEngine,
    XmlGenerator, YamlGenerator,
};

fn process(template: Value, context: &mut MapContext) -> tessera_transform::Result<Value> {
    let template = Template::from_value(&template)?;
    TransformEngine::new().process(&template, context)
}

#[test]
fn test_false_condition_omits_key_and_index() {
    let mut ctx = MapContext::new().with("show", json!(false));
    let result = process(
        json!({
            "field": {"@condition": "show", "a": 1},
            "list": [1, {"@condition": "show", "@value": 2}, 3],
            "guarded": ["@condition: show", 1]
        }),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(result, json!({"list": [1, 3]}));
    assert!(result.get("field").is_none());
    assert!(result.get("guarded").is_none());
}

#[test]
fn test_false_root_condition_yields_null() {
    let mut ctx = MapContext::new();
    let result = process(json!({"@condition": "false", "a": 1}), &mut ctx).unwrap();
    assert_eq!(result, Value::Null);
}

#[test]
fn test_value_short_circuits_other_fields() {
    let mut engine = Engine::new();
    let touched = Arc::new(AtomicUsize::new(0));
    let counter = touched.clone();
    engine.register_function("touch", move |_args: &[Value]| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(ExprError::EvaluationError("must not be evaluated".into()))
    });
    let engine = TransformEngine::builder().evaluator(engine).build().unwrap();

    let template = Template::from_value(&json!({
        "x": {"@value": "resolved", "other": "@expr: touch()", "@expr: touch()": 1}
    }))
    .unwrap();
    let result = engine.process(&template, &mut MapContext::new()).unwrap();
    assert_eq!(result, json!({"x": "resolved"}));
    assert_eq!(touched.load(Ordering::SeqCst), 0);
}

#[test]
fn test_fan_out_without_name_keeps_last_iteration() {
    let mut ctx = MapContext::new();
    let result = process(
        json!({"k": {"@for-each(x)": [1, 2, 3], "v": "@expr: x"}}),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(result, json!({"k": {"v": 3}}));
    assert_eq!(result.as_object().map(|o| o.len()), Some(1));
}

#[test]
fn test_fan_out_with_dynamic_keys() {
    let mut ctx = MapContext::new();
    let result = process(
        json!({"k-${x}": {"@for-each(x)": [1, 2, 3], "v": "@expr: x"}}),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(
        result,
        json!({"k-1": {"v": 1}, "k-2": {"v": 2}, "k-3": {"v": 3}})
    );
}

#[test]
fn test_set_only_object_vanishes_and_binds() {
    let mut ctx = MapContext::new();
    let result = process(
        json!({"holder": {"@set(v)": "@expr: 6 * 7"}, "other": 1}),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(result, json!({"other": 1}));
    assert_eq!(ctx.get("v"), Some(json!(42)));

    let mut ctx = MapContext::new();
    let result = process(json!({"@set(v)": null}), &mut ctx).unwrap();
    assert_eq!(result, Value::Null);
    assert_eq!(ctx.get("v"), Some(Value::Null));
}

#[test]
fn test_replace_splices_entries() {
    let mut ctx = MapContext::new().with("extra", json!({"a": 1, "b": 2}));
    let result = process(json!({"@replace(tag)": "@expr: extra", "c": 3}), &mut ctx).unwrap();
    assert_eq!(result, json!({"a": 1, "b": 2, "c": 3}));
    assert!(result.get("tag").is_none());
}

#[test]
fn test_replace_overwrites_earlier_keys() {
    let mut ctx = MapContext::new();
    let result = process(json!({"a": 0, "@replace(tag)": {"a": 1}}), &mut ctx).unwrap();
    assert_eq!(result, json!({"a": 1}));
}

#[test]
fn test_transform_hook_runs_on_false_value() {
    let mut ctx = MapContext::new().with("code", json!("ab"));
    let result = process(
        json!({
            "status": {
                "@condition": "false",
                "@value": "@expr: 1 / 0",
                "@falseValue": "@expr: code",
                "@transform": "@expr: upper(thisValue)"
            }
        }),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(result, json!({"status": "AB"}));
    assert_eq!(ctx.get("thisValue"), Some(json!("ab")));
}

#[test]
fn test_transform_hook_binds_null_for_absent_value() {
    let mut ctx = MapContext::new();
    let result = process(
        json!({"a": {"@value": "@expr: missing", "@transform": "@expr: thisValue ?? 'fallback'"}}),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(result, json!({"a": "fallback"}));
    assert_eq!(ctx.get("thisValue"), Some(Value::Null));
}

#[test]
fn test_unmarked_template_substitution() {
    let mut ctx = MapContext::new().with("name", json!("world"));
    let result = process(json!("hello ${name}"), &mut ctx).unwrap();
    assert_eq!(result, json!("hello world"));
}

#[test]
fn test_error_breadcrumb_names_index_and_field() {
    let mut ctx = MapContext::new();
    let err = process(
        json!({"list": [{"x": 1}, {"x": 2}, {"x": "@expr: 1 / 0"}]}),
        &mut ctx,
    )
    .unwrap_err();
    let path = err.path().unwrap_or_default();
    assert_eq!(path, "/list[2]/x");
    assert!(err.to_string().starts_with("/list[2]/x: failed to evaluate '1 / 0'"));
    assert!(matches!(
        err,
        Error::Evaluation {
            source: ExprError::EvaluationError(_),
            ..
        }
    ));
}

#[test]
fn test_error_breadcrumb_names_iteration() {
    let mut ctx = MapContext::new();
    let err = process(
        json!({"rows": [{"@for-each(i)": [1, 0], "q": "@expr: 10 / i"}]}),
        &mut ctx,
    )
    .unwrap_err();
    assert_eq!(err.path(), Some("/rows[0]{clone:1}/q"));
}

#[test]
fn test_loop_iterations_are_isolated() {
    let mut ctx = MapContext::new();
    let result = process(
        json!([{
            "@for-each(i)": [1, 2],
            "first": "@expr: i",
            "nested": {"again": "@expr: i * 100"}
        }]),
        &mut ctx,
    )
    .unwrap();
    assert_eq!(
        result,
        json!([
            {"first": 1, "nested": {"again": 100}},
            {"first": 2, "nested": {"again": 200}}
        ])
    );
}

#[test]
fn test_template_is_reusable_across_contexts() {
    let template = Template::parse(r#"{"id": "@expr: id"}"#).unwrap();
    let engine = TransformEngine::new();
    for id in 0..3 {
        let mut ctx = MapContext::new().with("id", json!(id));
        assert_eq!(engine.process(&template, &mut ctx).unwrap(), json!({"id": id}));
    }
}

#[test]
fn test_engine_is_shareable_across_threads() {
    let engine = Arc::new(TransformEngine::new());
    let template = Arc::new(Template::parse(r#"{"n": "@expr: n * 2"}"#).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let engine = engine.clone();
            let template = template.clone();
            std::thread::spawn(move || {
                let mut ctx = MapContext::new().with("n", json!(n));
                engine.process(&template, &mut ctx).unwrap()
            })
        })
        .collect();
    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), json!({"n": n * 2}));
    }
}

#[test]
fn test_yaml_output() {
    let engine = TransformEngine::builder()
        .generator(YamlGenerator)
        .build()
        .unwrap();
    let template = Template::from_yaml("name: \"${who}\"\ntags:\n  - a\n").unwrap();
    let mut ctx = MapContext::new().with("who", json!("ada"));
    assert_eq!(
        engine.process_as_string(&template, &mut ctx).unwrap(),
        "name: ada\ntags:\n- a\n"
    );
}

#[test]
fn test_xml_output() {
    let loader = MemoryLoader::new().with(
        "customer.json",
        r#"{"customer": {"-name": "@expr: params.name", "since": "2020"}}"#,
    );
    let engine = TransformEngine::builder()
        .generator(XmlGenerator::new(false))
        .loader(loader)
        .build()
        .unwrap();
    let template = Template::from_value(&json!({
        "invoice": {
            "@set(meta)": {"-id": "@expr: order.id", "-rush": "@expr: order.rush"},
            "-number": "@expr: meta.id + 1",
            "buyer": {"@include": "customer.json", "@params": {"-name": "@expr: order.customer"}},
            "line": {"@for-each(item)": "order.items", "sku": "@expr: item.sku", "qty": "@expr: item.qty"},
            "note": {"@condition": "meta.rush", "#text": "rush order"}
        }
    }))
    .unwrap();
    let mut ctx = MapContext::new().with(
        "order",
        json!({
            "id": 41,
            "rush": true,
            "customer": "ada",
            "items": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 2}]
        }),
    );

    let result = engine.process(&template, &mut ctx).unwrap();
    assert_eq!(
        result,
        json!({"invoice": {
            "-number": "42",
            "buyer": {"-name": "ada", "since": "2020"},
            "line": [{"sku": "a", "qty": "1"}, {"sku": "b", "qty": "2"}],
            "note": {"#text": "rush order"}
        }})
    );
    assert_eq!(ctx.get("meta"), Some(json!({"id": 41, "rush": true})));

    assert_eq!(
        engine.process_as_string(&template, &mut ctx).unwrap(),
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<invoice number="42"><buyer name="ada"><since>2020</since></buyer>"#,
            "<line><sku>a</sku><qty>1</qty></line><line><sku>b</sku><qty>2</qty></line>",
            "<note>rush order</note></invoice>"
        )
    );
}

#[test]
fn test_xml_format_from_config() {
    let engine = TransformEngine::builder()
        .config(tessera_transform::EngineConfig {
            format: OutputFormat::Xml,
            ..Default::default()
        })
        .build()
        .unwrap();
    assert_eq!(engine.generator().name(), "xml");
    let template = Template::from_value(&json!({"a": {"b": "1"}})).unwrap();
    let text = engine.process_as_string(&template, &mut MapContext::new()).unwrap();
    assert_eq!(text, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a>\n  <b>1</b>\n</a>");
}

#[test]
fn test_fs_loader_include() {
    let dir = std::env::temp_dir().join(format!("tessera-include-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("part.json"), r#"{"who": "${params.name}"}"#).unwrap();

    let engine = TransformEngine::builder()
        .loader(FsLoader::new(&dir))
        .build()
        .unwrap();
    let template = Template::parse(
        r#"{"a": {"@include": "part.json", "@params": {"name": "x"}}, "b": {"@include": "../escape.json"}}"#,
    )
    .unwrap();
    let err = engine
        .process(&template, &mut MapContext::new())
        .unwrap_err();
    assert!(err.to_string().contains("outside the resource root"));

    let template = Template::parse(r#"{"@include": "part.json", "@params": {"name": "x"}}"#).unwrap();
    assert_eq!(
        engine.process(&template, &mut MapContext::new()).unwrap(),
        json!({"who": "x"})
    );
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_template_stats() {
    let template = Template::from_value(&json!({
        "@condition": "true",
        "items": [{"@for-each(i)": "xs", "v": "@expr: i"}],
        "@set(a)": 1,
        "@replace(r)": {},
        "${k}": "${v}"
    }))
    .unwrap();
    let stats = template.stats();
    assert_eq!(stats.objects, 3);
    assert_eq!(stats.lists, 1);
    assert_eq!(stats.loops, 1);
    assert_eq!(stats.conditions, 1);
    assert_eq!(stats.set_fields, 1);
    assert_eq!(stats.replace_fields, 1);
    assert_eq!(stats.dynamic_keys, 1);
    assert_eq!(stats.expressions, 2);
}
