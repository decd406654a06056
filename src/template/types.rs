//! Template types and error definitions

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Template-specific error type
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(u64),

    #[error("Template already exists for campaign {campaign_id} in locale {locale}")]
    AlreadyExists { campaign_id: u64, locale: String },

    #[error("Unknown channel type: {0}")]
    UnknownChannel(String),

    #[error("Template channel cannot change from {from} to {to}")]
    ChannelChange { from: ChannelType, to: ChannelType },

    #[error("Malformed template data at `{field}`: {reason}")]
    MalformedData { field: String, reason: String },

    #[error("Invalid template: {0}")]
    Validation(FieldErrors),

    #[error("Invalid template record: {0}")]
    InvalidRecord(#[from] serde_json::Error),
}

impl TemplateError {
    pub(crate) fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TemplateError::MalformedData {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Delivery medium a template targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Text,
    Push,
    Webhook,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Email => "email",
            ChannelType::Text => "text",
            ChannelType::Push => "push",
            ChannelType::Webhook => "webhook",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(ChannelType::Email),
            "text" => Ok(ChannelType::Text),
            "push" => Ok(ChannelType::Push),
            "webhook" => Ok(ChannelType::Webhook),
            other => Err(TemplateError::UnknownChannel(other.to_string())),
        }
    }
}

/// How a stored record with an unrecognised `type` is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownChannelPolicy {
    /// Fail with `TemplateError::UnknownChannel`
    #[default]
    Reject,
    /// Treat the record as a webhook template
    Webhook,
}

/// Field name to user-facing message, as shown next to the offending input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn extend(&mut self, other: FieldErrors) {
        self.0.extend(other.0);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for message in self.0.values() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(message)?;
            first = false;
        }
        Ok(())
    }
}

/// A stored, channel-typed template row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: u64,

    pub project_id: u64,

    pub campaign_id: u64,

    /// Channel discriminator, fixed at creation
    #[serde(rename = "type")]
    pub channel: ChannelType,

    /// Which translated copy of the campaign this row holds
    pub locale: String,

    /// Channel-specific fields, only read through [`Template::map`]
    #[serde(default = "empty_data")]
    pub data: serde_json::Value,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    /// Set on soft delete; deleted rows are never returned by queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

pub(crate) fn empty_data() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Template {
    /// Load a record coming from storage.
    ///
    /// The `type` column is resolved against `policy` before the rest of the
    /// record is decoded, so an unknown channel is either rejected or read as
    /// a webhook.
    pub fn from_record(
        mut record: serde_json::Value,
        policy: UnknownChannelPolicy,
    ) -> TemplateResult<Template> {
        let raw = record
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| TemplateError::malformed("type", "expected a string"))?;

        let channel = match raw.parse::<ChannelType>() {
            Ok(channel) => channel,
            Err(err) => match policy {
                UnknownChannelPolicy::Reject => return Err(err),
                UnknownChannelPolicy::Webhook => {
                    tracing::warn!(channel = %raw, "Unknown channel type, loading as webhook");
                    ChannelType::Webhook
                }
            },
        };

        if let Some(obj) = record.as_object_mut() {
            obj.insert(
                "type".to_string(),
                serde_json::Value::String(channel.as_str().to_string()),
            );
        }

        Ok(serde_json::from_value(record)?)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Build the per-field "missing and required" messages for this locale
    pub fn required_errors<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for field in fields {
            errors.insert(
                field,
                format!(
                    "The `{}` field on the `{}` template is missing and is required.",
                    field, self.locale
                ),
            );
        }
        errors
    }
}

/// Request to create a new template
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateRequest {
    pub project_id: u64,

    pub campaign_id: u64,

    #[serde(rename = "type")]
    pub channel: ChannelType,

    pub locale: String,

    #[serde(default = "empty_data")]
    pub data: serde_json::Value,
}

/// Request to replace a template's data
///
/// `type` may be repeated for clarity but must match the stored channel.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTemplateRequest {
    #[serde(rename = "type", default)]
    pub channel: Option<ChannelType>,

    pub data: serde_json::Value,
}
