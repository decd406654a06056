use thiserror::Error;

use crate::batch::BatchError;
use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Stable code for logs and process exit reporting
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Template(TemplateError::Validation(_)) => "VALIDATION_ERROR",
            AppError::Template(TemplateError::NotFound(_)) => "TEMPLATE_NOT_FOUND",
            AppError::Template(TemplateError::UnknownChannel(_)) => "UNKNOWN_CHANNEL",
            AppError::Template(TemplateError::MalformedData { .. }) => "MALFORMED_DATA",
            AppError::Template(_) => "INVALID_TEMPLATE",
            AppError::Batch(_) => "BATCH_ERROR",
            AppError::Json(_) => "JSON_ERROR",
        }
    }
}
