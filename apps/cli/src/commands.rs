use crate::{EvalKind, RenderArgs};
use anyhow::{bail, Context as _, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tessera_expr::{Engine, MapScope};
use tessera_transform::{EngineConfig, FsLoader, MapContext, Template, TransformEngine};
use tracing::info;

pub fn render(args: RenderArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(format) = args.format {
        config.format = format;
    }
    if args.compact {
        config.pretty = false;
    }

    let template = load_template(&args.template)?;
    let resources = match &args.resources {
        Some(dir) => dir.clone(),
        None => args
            .template
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    info!(resources = %resources.display(), "resolving includes and resources");

    let engine = TransformEngine::builder()
        .config(config)
        .loader(FsLoader::new(resources))
        .build()?;

    let mut context = MapContext::from_value(read_data(args.context.as_deref())?)?;
    let output = engine
        .process_as_string(&template, &mut context)
        .with_context(|| format!("Failed to render {}", args.template.display()))?;
    println!("{}", output.trim_end());
    Ok(())
}

pub fn check(path: &Path) -> Result<()> {
    let template = load_template(path)?;
    println!("{}: ok", path.display());
    println!("{}", template.stats());
    Ok(())
}

pub fn eval(expression: &str, context: Option<&Path>, kind: EvalKind) -> Result<()> {
    let engine = Engine::new();
    let scope = MapScope::from_value(read_data(context)?);
    let value = match kind {
        EvalKind::Value => engine.evaluate(expression, &scope)?,
        EvalKind::Template => Value::String(engine.render_template(expression, &scope)?),
        EvalKind::Path => engine.select_path(expression, &scope)?,
        EvalKind::PathMulti => Value::Array(engine.select_all(expression, &scope)?),
        EvalKind::Condition => Value::Bool(engine.evaluate_condition(expression, &scope)?),
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

fn load_template(path: &Path) -> Result<Template> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    let template = if is_yaml(path) {
        Template::from_yaml(&text)
    } else {
        Template::parse(&text)
    }
    .with_context(|| format!("Failed to parse template {}", path.display()))?;
    Ok(template.with_name(path.display().to_string()))
}

/// Context data; without a file the context is empty
fn read_data(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Null);
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read context {}", path.display()))?;
    let value: Value = if is_yaml(path) {
        serde_yaml::from_str(&text)?
    } else {
        serde_json::from_str(&text)?
    };
    if !matches!(value, Value::Object(_) | Value::Null) {
        bail!("Context in {} must be an object", path.display());
    }
    Ok(value)
}
