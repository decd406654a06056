//! Renders a typed template into the payload handed to a delivery transport.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::substitution::{render_tree, Render, SubstitutionRenderer, UnresolvedPolicy};
use super::types::{Template, TemplateResult};
use super::variant::{
    EmailTemplate, PushTemplate, TemplateVariant, TextTemplate, WebhookMethod, WebhookTemplate,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledEmail {
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledText {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPush {
    pub title: String,
    pub topic: String,
    pub body: String,
    pub custom: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledWebhookRequest {
    pub method: WebhookMethod,
    pub endpoint: String,
    pub headers: BTreeMap<String, String>,
    pub body: Map<String, Value>,
}

/// Channel-ready output, serialized as the bare payload of its channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CompiledTemplate {
    Email(CompiledEmail),
    Text(CompiledText),
    Push(CompiledPush),
    Webhook(CompiledWebhookRequest),
}

/// Applies a [`Render`] implementation to every textual field of a template.
///
/// Holds nothing but the renderer, so one compiler can be shared across
/// threads for a whole batch.
#[derive(Debug, Clone, Default)]
pub struct Compiler<R = SubstitutionRenderer> {
    renderer: R,
}

impl Compiler {
    /// A compiler using `{{path}}` substitution with the given unresolved policy
    pub fn with_unresolved(policy: UnresolvedPolicy) -> Self {
        Self::new(SubstitutionRenderer::new(policy))
    }
}

impl<R: Render> Compiler<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    /// Compile an already-mapped variant.
    ///
    /// No validation happens here; missing fields render as whatever the
    /// variant view defaulted them to.
    pub fn compile(&self, variant: &TemplateVariant, variables: &Value) -> CompiledTemplate {
        match variant {
            TemplateVariant::Email(email) => {
                CompiledTemplate::Email(self.compile_email(email, variables))
            }
            TemplateVariant::Text(text) => CompiledTemplate::Text(self.compile_text(text, variables)),
            TemplateVariant::Push(push) => CompiledTemplate::Push(self.compile_push(push, variables)),
            TemplateVariant::Webhook(webhook) => {
                CompiledTemplate::Webhook(self.compile_webhook(webhook, variables))
            }
        }
    }

    /// Map a stored template and compile it
    pub fn compile_template(
        &self,
        template: &Template,
        variables: &Value,
    ) -> TemplateResult<CompiledTemplate> {
        let variant = template.map()?;
        tracing::debug!(
            template_id = template.id,
            channel = %template.channel,
            locale = %template.locale,
            "Compiling template"
        );
        Ok(self.compile(&variant, variables))
    }

    pub fn compile_email(&self, email: &EmailTemplate, variables: &Value) -> CompiledEmail {
        let render_optional = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| self.renderer.render(v, variables))
        };

        CompiledEmail {
            subject: self.renderer.render(&email.subject, variables),
            from: self.renderer.render(&email.from, variables),
            html: self.renderer.render(&email.html, variables),
            text: self.renderer.render(&email.text, variables),
            reply_to: render_optional(&email.reply_to),
            cc: render_optional(&email.cc),
            bcc: render_optional(&email.bcc),
        }
    }

    pub fn compile_text(&self, text: &TextTemplate, variables: &Value) -> CompiledText {
        CompiledText {
            text: self.renderer.render(&text.text, variables),
        }
    }

    pub fn compile_push(&self, push: &PushTemplate, variables: &Value) -> CompiledPush {
        CompiledPush {
            topic: push.topic.clone(),
            title: self.renderer.render(&push.title, variables),
            body: self.renderer.render(&push.body, variables),
            custom: self.render_map(&push.custom, variables),
        }
    }

    pub fn compile_webhook(
        &self,
        webhook: &WebhookTemplate,
        variables: &Value,
    ) -> CompiledWebhookRequest {
        let headers = webhook
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), self.renderer.render(value, variables)))
            .collect();

        CompiledWebhookRequest {
            method: webhook.method,
            endpoint: self.renderer.render(&webhook.endpoint, variables),
            headers,
            body: self.render_map(&webhook.body, variables),
        }
    }

    fn render_map(&self, map: &Map<String, Value>, variables: &Value) -> Map<String, Value> {
        map.iter()
            .map(|(key, value)| (key.clone(), render_tree(&self.renderer, value, variables)))
            .collect()
    }
}
