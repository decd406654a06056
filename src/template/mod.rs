//! Channel template system.
//!
//! This module provides:
//! - Stored template records typed by channel (email, text, push, webhook)
//! - Typed channel views decoded from the record's `data` blob
//! - Per-locale required-field validation
//! - Variable substitution ({{path.to.value}}) and payload compilation
//! - In-memory template storage with soft delete
//!
//! # Example
//!
//! ```ignore
//! let store = TemplateStore::new();
//!
//! let template = store.create(CreateTemplateRequest {
//!     project_id: 1,
//!     campaign_id: 42,
//!     channel: ChannelType::Push,
//!     locale: "en".to_string(),
//!     data: json!({
//!         "title": "Your order has shipped",
//!         "topic": "orders",
//!         "body": "Order {{order.id}} is on its way via {{order.carrier}}",
//!         "custom": { "order_id": "{{order.id}}" }
//!     }),
//! })?;
//!
//! let compiler = Compiler::default();
//! let compiled = store.compile(&compiler, template.id, &json!({
//!     "order": { "id": "ORD-123", "carrier": "FedEx" }
//! }))?;
//! ```

mod compiler;
mod store;
mod substitution;
mod types;
mod validation;
mod variant;

pub use compiler::{
    CompiledEmail, CompiledPush, CompiledTemplate, CompiledText, CompiledWebhookRequest, Compiler,
};
pub use store::TemplateStore;
pub use substitution::{
    render_tree, substitute_string, Render, SubstitutionRenderer, UnresolvedPolicy,
};
pub use types::{
    ChannelType, CreateTemplateRequest, FieldErrors, Template, TemplateError, TemplateResult,
    UnknownChannelPolicy, UpdateTemplateRequest,
};
pub use variant::{
    EmailTemplate, PushTemplate, TemplateVariant, TextTemplate, WebhookMethod, WebhookTemplate,
};
