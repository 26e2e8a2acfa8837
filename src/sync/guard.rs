//! Locale guard
//!
//! Runs before a write reaches the store. New variants of an existing record
//! inherit the default locale's synced values; updates to a non-default
//! variant lose any synced field they carry.

use crate::error::SyncResult;
use crate::models::has_value;
use crate::store::DocumentStore;
use crate::sync::policy::SyncFieldPolicy;
use crate::sync::{with_timeout, LifecycleEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct LocaleGuard {
    policy: Arc<SyncFieldPolicy>,
    store: Arc<dyn DocumentStore>,
    store_timeout: Duration,
}

impl LocaleGuard {
    pub fn new(
        policy: Arc<SyncFieldPolicy>,
        store: Arc<dyn DocumentStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            policy,
            store,
            store_timeout,
        }
    }

    /// Copy the default variant's synced values into a pending non-default
    /// create. Returns the fields that were overwritten.
    ///
    /// A failed lookup aborts the create: better no variant than one born
    /// with a diverging slug.
    pub async fn before_create(&self, event: &mut LifecycleEvent) -> SyncResult<Vec<String>> {
        let (Some(locale), Some(document_id)) = (event.locale(), event.document_id()) else {
            return Ok(Vec::new());
        };
        if self.policy.is_default_locale(locale) {
            return Ok(Vec::new());
        }
        let locale = locale.to_string();
        let document_id = document_id.to_string();

        let default_locale = self.policy.default_locale();
        let lookup = self.store.find_one(
            self.policy.record_type(),
            &document_id,
            default_locale,
            self.policy.fields(),
        );
        let default_entry = with_timeout(
            self.store_timeout,
            format!("find_one {} ({})", document_id, default_locale),
            lookup,
        )
        .await?;

        let Some(default_entry) = default_entry else {
            debug!(
                "No {} variant of {} {} yet, creating {} as requested",
                default_locale,
                self.policy.record_type(),
                document_id,
                locale
            );
            return Ok(Vec::new());
        };

        let mut seeded = Vec::new();
        for field in self.policy.fields() {
            if let Some(value) = default_entry.get(field).filter(|v| has_value(Some(*v))) {
                event.data.insert(field.clone(), value.clone());
                seeded.push(field.clone());
            }
        }

        if !seeded.is_empty() {
            debug!(
                "Seeded {:?} on new {} variant of {} {} from {}",
                seeded,
                locale,
                self.policy.record_type(),
                document_id,
                default_locale
            );
        }
        Ok(seeded)
    }

    /// Drop synced fields from a pending update of a non-default variant.
    /// The caller is not told; the removed field names are returned for the
    /// host's own bookkeeping.
    pub fn before_update(&self, event: &mut LifecycleEvent) -> Vec<String> {
        let Some(locale) = event.locale() else {
            // The guard only trusts the locale echoed in the payload. A host
            // that identifies the variant some other way bypasses stripping.
            if self.policy.fields().iter().any(|f| event.data.contains_key(f)) {
                debug!(
                    "Update of {} carries synced fields but no locale, leaving it untouched",
                    self.policy.record_type()
                );
            }
            return Vec::new();
        };
        if self.policy.is_default_locale(locale) {
            return Vec::new();
        }
        let locale = locale.to_string();

        let stripped: Vec<String> = self
            .policy
            .fields()
            .iter()
            .filter(|field| event.data.remove(field.as_str()).is_some())
            .cloned()
            .collect();

        if !stripped.is_empty() {
            debug!(
                "Stripped {:?} from {} update of {}; owned by {}",
                stripped,
                locale,
                self.policy.record_type(),
                self.policy.default_locale()
            );
        }
        stripped
    }
}
