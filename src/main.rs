use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use ara_template_engine::batch::BatchCompiler;
use ara_template_engine::config::Settings;
use ara_template_engine::error::AppError;
use ara_template_engine::telemetry::init_tracing;
use ara_template_engine::template::{Compiler, Template, TemplateError};

const USAGE: &str = "usage: template-preview <record.json> [<context.json>]

A context file holding a JSON array compiles the template once per element.";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load configuration
    let settings = Settings::new()?;

    init_tracing(&settings.logging)?;
    tracing::debug!("Configuration loaded");

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let Some(record_path) = args.next() else {
        eprintln!("{}", USAGE);
        return Ok(ExitCode::from(2));
    };
    let context_path = args.next();

    let record = read_json(&record_path)?;
    let variables = match context_path {
        Some(path) => read_json(&path)?,
        None => serde_json::Value::Object(Default::default()),
    };

    match preview(&settings, record, variables).await {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(AppError::Template(TemplateError::Validation(errors))) => {
            tracing::warn!(fields = errors.len(), "Template failed validation");
            println!("{}", serde_json::to_string_pretty(&errors)?);
            Ok(ExitCode::FAILURE)
        }
        Err(err) => {
            tracing::error!(code = err.code(), error = %err, "Preview failed");
            Err(err.into())
        }
    }
}

async fn preview(
    settings: &Settings,
    record: serde_json::Value,
    variables: serde_json::Value,
) -> Result<serde_json::Value, AppError> {
    let template = Template::from_record(record, settings.templates.unknown_channel)?;
    template.validate().map_err(TemplateError::Validation)?;

    let compiler = Compiler::with_unresolved(settings.render.unresolved);

    let payload = match variables {
        serde_json::Value::Array(contexts) => {
            let variant = Arc::new(template.map()?);
            let batch = BatchCompiler::new(Arc::new(compiler), &settings.batch);
            serde_json::to_value(batch.compile_all(variant, contexts).await?)?
        }
        variables => serde_json::to_value(compiler.compile_template(&template, &variables)?)?,
    };

    tracing::info!(
        template_id = template.id,
        channel = %template.channel,
        locale = %template.locale,
        "Template compiled"
    );
    Ok(payload)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
