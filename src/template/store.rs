//! In-memory template storage with soft delete

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::compiler::{CompiledTemplate, Compiler};
use super::substitution::Render;
use super::types::{
    CreateTemplateRequest, Template, TemplateError, TemplateResult, UpdateTemplateRequest,
};

type LocaleKey = (u64, u64, String);

/// In-memory template storage
///
/// Rows are never removed; [`TemplateStore::delete`] stamps `deleted_at` and
/// every read skips stamped rows. `locales` maps each live
/// `(project_id, campaign_id, locale)` to the ID holding it.
pub struct TemplateStore {
    templates: DashMap<u64, Template>,
    locales: DashMap<LocaleKey, u64>,
    next_id: AtomicU64,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    /// Create a new template store
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
            locales: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new template after validating its data
    #[tracing::instrument(
        skip(self, request),
        fields(campaign_id = request.campaign_id, channel = %request.channel, locale = %request.locale)
    )]
    pub fn create(&self, request: CreateTemplateRequest) -> TemplateResult<Template> {
        let now = Utc::now();
        let mut template = Template {
            id: 0,
            project_id: request.project_id,
            campaign_id: request.campaign_id,
            channel: request.channel,
            locale: request.locale,
            data: request.data,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        template.validate().map_err(TemplateError::Validation)?;
        // Structural problems in optional fields only show up when mapping
        template.map()?;

        // Lock order: locales, then templates
        let key = (template.project_id, template.campaign_id, template.locale.clone());
        match self.locales.entry(key) {
            Entry::Occupied(_) => Err(TemplateError::AlreadyExists {
                campaign_id: template.campaign_id,
                locale: template.locale,
            }),
            Entry::Vacant(slot) => {
                template.id = self.next_id.fetch_add(1, Ordering::Relaxed);
                self.templates.insert(template.id, template.clone());
                slot.insert(template.id);
                tracing::info!(template_id = template.id, "Template created");
                Ok(template)
            }
        }
    }

    /// Get a live template by ID
    pub fn get(&self, id: u64) -> TemplateResult<Template> {
        self.templates
            .get(&id)
            .filter(|t| !t.is_deleted())
            .map(|t| t.clone())
            .ok_or(TemplateError::NotFound(id))
    }

    /// List all live templates, ordered by ID
    pub fn list(&self) -> Vec<Template> {
        let mut templates: Vec<Template> = self
            .templates
            .iter()
            .filter(|entry| !entry.is_deleted())
            .map(|entry| entry.value().clone())
            .collect();
        templates.sort_by_key(|t| t.id);
        templates
    }

    /// Every live locale variant of a campaign
    pub fn list_for_campaign(&self, project_id: u64, campaign_id: u64) -> Vec<Template> {
        self.list()
            .into_iter()
            .filter(|t| t.project_id == project_id && t.campaign_id == campaign_id)
            .collect()
    }

    /// The live template of a campaign in one locale
    pub fn find_by_locale(&self, project_id: u64, campaign_id: u64, locale: &str) -> Option<Template> {
        let id = *self
            .locales
            .get(&(project_id, campaign_id, locale.to_string()))?;
        self.get(id).ok()
    }

    /// Replace a template's data. The channel type cannot change.
    #[tracing::instrument(skip(self, updates))]
    pub fn update(&self, id: u64, updates: UpdateTemplateRequest) -> TemplateResult<Template> {
        let mut entry = self
            .templates
            .get_mut(&id)
            .filter(|t| !t.is_deleted())
            .ok_or(TemplateError::NotFound(id))?;

        if let Some(channel) = updates.channel {
            if channel != entry.channel {
                return Err(TemplateError::ChannelChange {
                    from: entry.channel,
                    to: channel,
                });
            }
        }

        let mut candidate = entry.clone();
        candidate.data = updates.data;
        candidate.validate().map_err(TemplateError::Validation)?;
        candidate.map()?;
        candidate.updated_at = Utc::now();

        *entry = candidate.clone();
        tracing::info!(template_id = id, "Template updated");

        Ok(candidate)
    }

    /// Soft delete a template by ID and release its locale
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, id: u64) -> TemplateResult<()> {
        let key = {
            let mut entry = self
                .templates
                .get_mut(&id)
                .filter(|t| !t.is_deleted())
                .ok_or(TemplateError::NotFound(id))?;

            let now = Utc::now();
            entry.deleted_at = Some(now);
            entry.updated_at = now;
            (entry.project_id, entry.campaign_id, entry.locale.clone())
        };

        self.locales.remove_if(&key, |_, holder| *holder == id);
        tracing::info!(template_id = id, "Template deleted");

        Ok(())
    }

    /// Check if a live template exists
    pub fn exists(&self, id: u64) -> bool {
        self.get(id).is_ok()
    }

    /// Get the number of live templates
    pub fn count(&self) -> usize {
        self.templates.iter().filter(|t| !t.is_deleted()).count()
    }

    /// Compile a stored template for one recipient
    pub fn compile<R: Render>(
        &self,
        compiler: &Compiler<R>,
        id: u64,
        variables: &serde_json::Value,
    ) -> TemplateResult<CompiledTemplate> {
        let template = self.get(id)?;
        compiler.compile_template(&template, variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::template::substitution::UnresolvedPolicy;
    use crate::template::types::ChannelType;
    use serde_json::json;

    fn text_request(campaign_id: u64, locale: &str, text: &str) -> CreateTemplateRequest {
        CreateTemplateRequest {
            project_id: 1,
            campaign_id,
            channel: ChannelType::Text,
            locale: locale.to_string(),
            data: json!({ "text": text }),
        }
    }

    #[test]
    fn test_store_create_and_get() {
        let store = TemplateStore::new();

        let created = store.create(text_request(10, "en", "Hello")).unwrap();
        assert_eq!(created.channel, ChannelType::Text);

        let retrieved = store.get(created.id).unwrap();
        assert_eq!(retrieved.locale, "en");
        assert_eq!(retrieved.data["text"], "Hello");
    }

    #[test]
    fn test_store_create_duplicate_locale() {
        let store = TemplateStore::new();

        store.create(text_request(10, "en", "Hello")).unwrap();
        store.create(text_request(10, "es", "Hola")).unwrap();
        assert!(matches!(
            store.create(text_request(10, "en", "Hi again")),
            Err(TemplateError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_store_create_rejects_invalid_data() {
        let store = TemplateStore::new();

        let mut request = text_request(10, "en", "");
        request.data = json!({});
        let err = store.create(request).unwrap_err();
        let TemplateError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.contains("text"));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_store_create_rejects_malformed_data() {
        let store = TemplateStore::new();

        let request = CreateTemplateRequest {
            project_id: 1,
            campaign_id: 1,
            channel: ChannelType::Push,
            locale: "en".to_string(),
            data: json!({ "title": "t", "topic": "n", "body": "b", "custom": "oops" }),
        };
        assert!(matches!(
            store.create(request),
            Err(TemplateError::MalformedData { .. })
        ));
    }

    #[test]
    fn test_store_update() {
        let store = TemplateStore::new();
        let created = store.create(text_request(10, "en", "Hello")).unwrap();

        let updated = store
            .update(
                created.id,
                UpdateTemplateRequest {
                    channel: Some(ChannelType::Text),
                    data: json!({ "text": "Updated" }),
                },
            )
            .unwrap();
        assert_eq!(updated.data["text"], "Updated");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[test]
    fn test_store_update_rejects_channel_change() {
        let store = TemplateStore::new();
        let created = store.create(text_request(10, "en", "Hello")).unwrap();

        let result = store.update(
            created.id,
            UpdateTemplateRequest {
                channel: Some(ChannelType::Email),
                data: json!({}),
            },
        );
        assert!(matches!(
            result,
            Err(TemplateError::ChannelChange {
                from: ChannelType::Text,
                to: ChannelType::Email
            })
        ));
        assert_eq!(store.get(created.id).unwrap().data["text"], "Hello");
    }

    #[test]
    fn test_store_soft_delete() {
        let store = TemplateStore::new();
        let created = store.create(text_request(10, "en", "Hello")).unwrap();
        assert!(store.exists(created.id));

        store.delete(created.id).unwrap();
        assert!(!store.exists(created.id));
        assert!(matches!(store.get(created.id), Err(TemplateError::NotFound(_))));
        assert!(matches!(store.delete(created.id), Err(TemplateError::NotFound(_))));
        assert!(store.list().is_empty());

        // The locale slot is free again once the old row is deleted
        assert!(store.create(text_request(10, "en", "Again")).is_ok());
    }

    #[test]
    fn test_store_update_after_delete() {
        let store = TemplateStore::new();
        let created = store.create(text_request(10, "en", "Hello")).unwrap();
        store.delete(created.id).unwrap();

        let result = store.update(
            created.id,
            UpdateTemplateRequest {
                channel: None,
                data: json!({ "text": "Back" }),
            },
        );
        assert!(matches!(result, Err(TemplateError::NotFound(_))));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_store_concurrent_create_same_locale() {
        let store = Arc::new(TemplateStore::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.create(text_request(10, "en", &format!("Hello {}", n)))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, TemplateError::AlreadyExists { .. })));
        assert_eq!(store.count(), 1);
        assert_eq!(store.list_for_campaign(1, 10).len(), 1);
    }

    #[test]
    fn test_store_concurrent_update_and_delete() {
        let store = Arc::new(TemplateStore::new());
        let id = store.create(text_request(10, "en", "Hello")).unwrap().id;
        let barrier = Arc::new(Barrier::new(2));

        let updater = {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.update(
                    id,
                    UpdateTemplateRequest {
                        channel: None,
                        data: json!({ "text": "Updated" }),
                    },
                )
            })
        };
        let deleter = {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.delete(id)
            })
        };

        let _ = updater.join().unwrap();
        deleter.join().unwrap().unwrap();

        // Whichever ran first, the row stays deleted
        assert!(matches!(store.get(id), Err(TemplateError::NotFound(_))));
        assert!(store.list().is_empty());
        assert!(store.find_by_locale(1, 10, "en").is_none());
    }

    #[test]
    fn test_store_list_for_campaign() {
        let store = TemplateStore::new();

        for locale in ["en", "fr", "de"] {
            store.create(text_request(1, locale, "x")).unwrap();
        }
        store.create(text_request(2, "en", "y")).unwrap();

        let campaign = store.list_for_campaign(1, 1);
        assert_eq!(campaign.len(), 3);
        assert_eq!(store.list().len(), 4);
        assert_eq!(
            store.find_by_locale(1, 1, "fr").map(|t| t.locale),
            Some("fr".to_string())
        );
        assert!(store.find_by_locale(1, 1, "it").is_none());
    }

    #[test]
    fn test_store_compile() {
        let store = TemplateStore::new();
        let created = store
            .create(text_request(10, "en", "Order {{order.id}} shipped"))
            .unwrap();

        let compiled = store
            .compile(
                &Compiler::with_unresolved(UnresolvedPolicy::Empty),
                created.id,
                &json!({ "order": { "id": "ORD-1" } }),
            )
            .unwrap();
        assert_eq!(
            serde_json::to_value(compiled).unwrap(),
            json!({ "text": "Order ORD-1 shipped" })
        );
    }
}
