//! Write pipeline
//!
//! The host-side path a write takes: hooks before persistence, the store
//! commit, then the after-update hook. Used by the harness binary and by the
//! integration tests to drive the rules exactly the way a content host does.

use crate::error::{SyncError, SyncResult};
use crate::models::{FieldMap, LocaleVariant, DOCUMENT_ID_KEY, LOCALE_KEY};
use crate::store::DocumentStore;
use crate::sync::{LifecycleEvent, LifecycleHooks};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct WritePipeline {
    store: Arc<dyn DocumentStore>,
    hooks: Arc<dyn LifecycleHooks>,
}

impl WritePipeline {
    pub fn new(store: Arc<dyn DocumentStore>, hooks: Arc<dyn LifecycleHooks>) -> Self {
        Self { store, hooks }
    }

    /// Create a locale variant. `data` must name its `locale`; a
    /// `documentId` attaches the variant to an existing record.
    pub async fn create(&self, record_type: &str, data: FieldMap) -> SyncResult<LocaleVariant> {
        let mut event = LifecycleEvent::new(record_type, data);
        self.hooks.on_before_create(&mut event).await?;

        let locale = event
            .locale()
            .ok_or_else(|| SyncError::Validation("locale is required to create a variant".to_string()))?
            .to_string();
        let document_id = event.document_id().map(str::to_string);

        let committed = self
            .store
            .create(record_type, document_id.as_deref(), &locale, event.data)
            .await?;
        debug!("Committed new {} variant of {}", locale, committed.document_id);
        Ok(committed)
    }

    /// Update one locale variant. The target locale and document id are
    /// echoed into the payload so the hooks see them.
    pub async fn update(
        &self,
        record_type: &str,
        document_id: &str,
        locale: &str,
        data: FieldMap,
    ) -> SyncResult<LocaleVariant> {
        let mut payload = data;
        payload.insert(LOCALE_KEY.to_string(), Value::String(locale.to_string()));
        payload.insert(DOCUMENT_ID_KEY.to_string(), Value::String(document_id.to_string()));

        let mut event = LifecycleEvent::new(record_type, payload);
        self.hooks.on_before_update(&mut event).await?;

        let committed = self
            .store
            .update(record_type, document_id, locale, event.data.clone())
            .await?;

        // The response does not wait on anything scheduled here.
        let event = event.with_result(committed.to_field_map());
        self.hooks.on_after_update(&event);
        Ok(committed)
    }
}
