//! Required-field validation per channel.

use serde_json::Value;

use super::types::{ChannelType, FieldErrors, Template};
use super::variant::WebhookMethod;

const EMAIL_REQUIRED: &[&str] = &["from", "subject", "text", "html"];
const TEXT_REQUIRED: &[&str] = &["text"];
const PUSH_REQUIRED: &[&str] = &["title", "topic", "body"];
const WEBHOOK_REQUIRED: &[&str] = &["method", "endpoint"];

impl Template {
    /// Fields that must be present on `data` for this channel
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self.channel {
            ChannelType::Email => EMAIL_REQUIRED,
            ChannelType::Text => TEXT_REQUIRED,
            ChannelType::Push => PUSH_REQUIRED,
            ChannelType::Webhook => WEBHOOK_REQUIRED,
        }
    }

    /// Check `data` against the channel's schema.
    ///
    /// Every offending field is reported; fields not named by the schema are
    /// left alone.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let required = self.required_fields();

        let Value::Object(data) = &self.data else {
            return Err(self.required_errors(required.iter().copied()));
        };

        let mut errors = FieldErrors::new();
        for &field in required {
            match data.get(field) {
                None | Some(Value::Null) => {
                    errors.extend(self.required_errors([field]));
                }
                Some(Value::String(value)) => {
                    if field == "method" && value.parse::<WebhookMethod>().is_err() {
                        errors.insert(
                            field,
                            format!(
                                "The `{}` field on the `{}` template must be one of {}.",
                                field,
                                self.locale,
                                WebhookMethod::ALL.map(|m| m.as_str()).join(", ")
                            ),
                        );
                    }
                }
                Some(_) => {
                    errors.insert(
                        field,
                        format!(
                            "The `{}` field on the `{}` template must be a string.",
                            field, self.locale
                        ),
                    );
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(
                template_id = self.id,
                channel = %self.channel,
                locale = %self.locale,
                fields = ?errors.fields().collect::<Vec<_>>(),
                "Template failed validation"
            );
            Err(errors)
        }
    }
}
