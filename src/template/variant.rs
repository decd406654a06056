//! Typed channel views over a template's `data` blob.
//!
//! [`Template::map`] is the only place the untyped blob is read. Absent or
//! `null` fields default to an empty string or empty map; a value of the
//! wrong shape is reported as [`TemplateError::MalformedData`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::{ChannelType, Template, TemplateError, TemplateResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    pub from: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextTemplate {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushTemplate {
    pub title: String,
    /// Routing key for the push transport, never rendered
    pub topic: String,
    pub body: String,
    pub custom: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookTemplate {
    pub method: WebhookMethod,
    pub endpoint: String,
    pub body: Map<String, Value>,
    pub headers: BTreeMap<String, String>,
}

/// HTTP verb used by a webhook template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    Delete,
    Get,
    Patch,
    #[default]
    Post,
    Put,
}

impl WebhookMethod {
    pub const ALL: [WebhookMethod; 5] = [
        WebhookMethod::Delete,
        WebhookMethod::Get,
        WebhookMethod::Patch,
        WebhookMethod::Post,
        WebhookMethod::Put,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookMethod::Delete => "DELETE",
            WebhookMethod::Get => "GET",
            WebhookMethod::Patch => "PATCH",
            WebhookMethod::Post => "POST",
            WebhookMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for WebhookMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookMethod {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WebhookMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TemplateError::malformed("method", format!("unsupported method `{}`", s)))
    }
}

/// The typed view of a template, one per channel
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateVariant {
    Email(EmailTemplate),
    Text(TextTemplate),
    Push(PushTemplate),
    Webhook(WebhookTemplate),
}

impl TemplateVariant {
    pub fn channel(&self) -> ChannelType {
        match self {
            TemplateVariant::Email(_) => ChannelType::Email,
            TemplateVariant::Text(_) => ChannelType::Text,
            TemplateVariant::Push(_) => ChannelType::Push,
            TemplateVariant::Webhook(_) => ChannelType::Webhook,
        }
    }

    /// Convert back into the storage blob used by [`Template::data`]
    pub fn to_data(&self) -> Value {
        let mut data = Map::new();
        match self {
            TemplateVariant::Email(email) => {
                data.insert("from".into(), Value::String(email.from.clone()));
                for (key, value) in [
                    ("cc", &email.cc),
                    ("bcc", &email.bcc),
                    ("reply_to", &email.reply_to),
                ] {
                    if let Some(value) = value {
                        data.insert(key.into(), Value::String(value.clone()));
                    }
                }
                data.insert("subject".into(), Value::String(email.subject.clone()));
                data.insert("text".into(), Value::String(email.text.clone()));
                data.insert("html".into(), Value::String(email.html.clone()));
            }
            TemplateVariant::Text(text) => {
                data.insert("text".into(), Value::String(text.text.clone()));
            }
            TemplateVariant::Push(push) => {
                data.insert("title".into(), Value::String(push.title.clone()));
                data.insert("topic".into(), Value::String(push.topic.clone()));
                data.insert("body".into(), Value::String(push.body.clone()));
                data.insert("custom".into(), Value::Object(push.custom.clone()));
            }
            TemplateVariant::Webhook(webhook) => {
                data.insert(
                    "method".into(),
                    Value::String(webhook.method.as_str().to_string()),
                );
                data.insert("endpoint".into(), Value::String(webhook.endpoint.clone()));
                data.insert("body".into(), Value::Object(webhook.body.clone()));
                let headers = webhook
                    .headers
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                data.insert("headers".into(), Value::Object(headers));
            }
        }
        Value::Object(data)
    }
}

impl Template {
    /// Decode `data` into the view selected by the channel type
    pub fn map(&self) -> TemplateResult<TemplateVariant> {
        let data = DataReader::new(&self.data)?;

        let variant = match self.channel {
            ChannelType::Email => TemplateVariant::Email(EmailTemplate {
                from: data.string("from")?,
                cc: data.optional_string("cc")?,
                bcc: data.optional_string("bcc")?,
                reply_to: data.optional_string("reply_to")?,
                subject: data.string("subject")?,
                text: data.string("text")?,
                html: data.string("html")?,
            }),
            ChannelType::Text => TemplateVariant::Text(TextTemplate {
                text: data.string("text")?,
            }),
            ChannelType::Push => TemplateVariant::Push(PushTemplate {
                title: data.string("title")?,
                topic: data.string("topic")?,
                body: data.string("body")?,
                custom: data.object("custom")?,
            }),
            ChannelType::Webhook => TemplateVariant::Webhook(WebhookTemplate {
                method: match data.optional_string("method")? {
                    Some(method) => method.parse()?,
                    None => WebhookMethod::default(),
                },
                endpoint: data.string("endpoint")?,
                body: data.object("body")?,
                headers: data.string_map("headers")?,
            }),
        };

        Ok(variant)
    }
}

struct DataReader<'a> {
    data: &'a Map<String, Value>,
}

impl<'a> DataReader<'a> {
    fn new(data: &'a Value) -> TemplateResult<Self> {
        match data {
            Value::Object(data) => Ok(Self { data }),
            _ => Err(TemplateError::malformed("data", "expected an object")),
        }
    }

    fn field(&self, key: &str) -> Option<&'a Value> {
        self.data.get(key).filter(|v| !v.is_null())
    }

    fn string(&self, key: &str) -> TemplateResult<String> {
        match self.field(key) {
            None => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(TemplateError::malformed(key, "expected a string")),
        }
    }

    fn optional_string(&self, key: &str) -> TemplateResult<Option<String>> {
        let value = self.string(key)?;
        Ok((!value.is_empty()).then_some(value))
    }

    fn object(&self, key: &str) -> TemplateResult<Map<String, Value>> {
        match self.field(key) {
            None => Ok(Map::new()),
            Some(Value::Object(obj)) => Ok(obj.clone()),
            Some(_) => Err(TemplateError::malformed(key, "expected an object")),
        }
    }

    fn string_map(&self, key: &str) -> TemplateResult<BTreeMap<String, String>> {
        self.object(key)?
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(s) => Ok((name, s)),
                _ => Err(TemplateError::malformed(
                    format!("{}.{}", key, name),
                    "expected a string",
                )),
            })
            .collect()
    }
}
