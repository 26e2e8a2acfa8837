//! In-memory collaborators
//!
//! Thread-safe map-backed store and a fixed locale registry.

use crate::error::{not_found_error, store_error, SyncResult};
use crate::models::{FieldMap, Locale, LocaleVariant, DOCUMENT_ID_KEY, LOCALE_KEY};
use crate::store::{DocumentStore, LocaleRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// (record type, document id, locale)
type VariantKey = (String, String, String);

fn key(record_type: &str, document_id: &str, locale: &str) -> VariantKey {
    (
        record_type.to_string(),
        document_id.to_string(),
        locale.to_string(),
    )
}

/// Identity lives in the key, not in the stored field data.
fn without_identity(mut data: FieldMap) -> FieldMap {
    data.remove(LOCALE_KEY);
    data.remove(DOCUMENT_ID_KEY);
    data
}

/// Thread-safe document store
pub struct InMemoryDocumentStore {
    variants: Arc<RwLock<HashMap<VariantKey, FieldMap>>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            variants: Arc::new(RwLock::new(HashMap::new())),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Put a variant in place directly, bypassing counters and hooks
    pub async fn insert(&self, record_type: &str, document_id: &str, locale: &str, data: FieldMap) {
        let mut variants = self.variants.write().await;
        variants.insert(key(record_type, document_id, locale), without_identity(data));
    }

    /// Snapshot of one variant
    pub async fn get(&self, record_type: &str, document_id: &str, locale: &str) -> Option<LocaleVariant> {
        let variants = self.variants.read().await;
        variants
            .get(&key(record_type, document_id, locale))
            .map(|fields| LocaleVariant {
                document_id: document_id.to_string(),
                locale: locale.to_string(),
                fields: fields.clone(),
            })
    }

    /// All variants of one logical record, ordered by locale
    pub async fn variants_of(&self, record_type: &str, document_id: &str) -> Vec<LocaleVariant> {
        let variants = self.variants.read().await;
        let mut list: Vec<_> = variants
            .iter()
            .filter(|((rt, id, _), _)| rt == record_type && id == document_id)
            .map(|((_, id, locale), fields)| LocaleVariant {
                document_id: id.clone(),
                locale: locale.clone(),
                fields: fields.clone(),
            })
            .collect();
        list.sort_by(|a, b| a.locale.cmp(&b.locale));
        list
    }

    /// Number of `find_one` calls served
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `update` and `create` calls committed
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_one(
        &self,
        record_type: &str,
        document_id: &str,
        locale: &str,
        fields: &[String],
    ) -> SyncResult<Option<FieldMap>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let variants = self.variants.read().await;
        let Some(stored) = variants.get(&key(record_type, document_id, locale)) else {
            return Ok(None);
        };

        if fields.is_empty() {
            return Ok(Some(stored.clone()));
        }
        let selected = fields
            .iter()
            .filter_map(|f| stored.get(f).map(|v| (f.clone(), v.clone())))
            .collect();
        Ok(Some(selected))
    }

    async fn update(
        &self,
        record_type: &str,
        document_id: &str,
        locale: &str,
        data: FieldMap,
    ) -> SyncResult<LocaleVariant> {
        let mut variants = self.variants.write().await;
        let stored = variants
            .get_mut(&key(record_type, document_id, locale))
            .ok_or_else(|| {
                not_found_error(format!("{} {} ({})", record_type, document_id, locale))
            })?;

        for (field, value) in without_identity(data) {
            stored.insert(field, value);
        }
        self.writes.fetch_add(1, Ordering::Relaxed);

        tracing::debug!("Updated {} {} ({})", record_type, document_id, locale);
        Ok(LocaleVariant {
            document_id: document_id.to_string(),
            locale: locale.to_string(),
            fields: stored.clone(),
        })
    }

    async fn create(
        &self,
        record_type: &str,
        document_id: Option<&str>,
        locale: &str,
        data: FieldMap,
    ) -> SyncResult<LocaleVariant> {
        let document_id = document_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut variants = self.variants.write().await;
        let variant_key = key(record_type, &document_id, locale);
        if variants.contains_key(&variant_key) {
            return Err(store_error(format!(
                "{} {} already has a {} variant",
                record_type, document_id, locale
            )));
        }

        let fields = without_identity(data);
        variants.insert(variant_key, fields.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);

        tracing::debug!("Created {} {} ({})", record_type, document_id, locale);
        Ok(LocaleVariant {
            document_id,
            locale: locale.to_string(),
            fields,
        })
    }
}

/// Locale registry serving a fixed, replaceable list
pub struct StaticLocaleRegistry {
    locales: RwLock<Vec<Locale>>,
}

impl StaticLocaleRegistry {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            locales: RwLock::new(codes.into_iter().map(Locale::new).collect()),
        }
    }

    pub async fn set_locales(&self, locales: Vec<Locale>) {
        *self.locales.write().await = locales;
    }
}

#[async_trait]
impl LocaleRegistry for StaticLocaleRegistry {
    async fn list_locales(&self) -> SyncResult<Vec<Locale>> {
        Ok(self.locales.read().await.clone())
    }
}
