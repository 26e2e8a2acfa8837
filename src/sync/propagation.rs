//! Propagation scheduler
//!
//! After the default-locale variant of a record commits new synced values,
//! every other existing variant is brought in line by a detached cycle on the
//! task queue. Cycles are best-effort: a locale that fails is logged and left
//! divergent until the next default-locale edit.

use crate::error::SyncResult;
use crate::models::FieldMap;
use crate::store::{DocumentStore, LocaleRegistry};
use crate::sync::policy::SyncFieldPolicy;
use crate::sync::{with_timeout, LifecycleEvent};
use crate::tasks::TaskQueue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// A locale whose mirror could not be brought up to date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleFailure {
    pub locale: String,
    pub error: String,
}

/// Outcome of one propagation cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationReport {
    pub cycle_id: Uuid,
    pub record_type: String,
    pub document_id: String,
    /// Locales that received a write
    pub updated: Vec<String>,
    /// Locales already carrying the committed values
    pub unchanged: Vec<String>,
    /// Locales with no variant for this record yet
    pub missing: Vec<String>,
    pub failed: Vec<LocaleFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PropagationReport {
    /// Every existing mirror matches the default variant
    pub fn is_converged(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn write_count(&self) -> usize {
        self.updated.len()
    }
}

enum LocaleOutcome {
    Updated,
    Unchanged,
    Missing,
}

#[derive(Clone)]
pub struct PropagationScheduler {
    policy: Arc<SyncFieldPolicy>,
    store: Arc<dyn DocumentStore>,
    registry: Arc<dyn LocaleRegistry>,
    queue: TaskQueue,
    store_timeout: Duration,
}

impl PropagationScheduler {
    pub fn new(
        policy: Arc<SyncFieldPolicy>,
        store: Arc<dyn DocumentStore>,
        registry: Arc<dyn LocaleRegistry>,
        queue: TaskQueue,
        store_timeout: Duration,
    ) -> Self {
        Self {
            policy,
            store,
            registry,
            queue,
            store_timeout,
        }
    }

    /// Schedule a cycle for a committed update, if it was a default-locale
    /// update carrying synced values. Returns the cycle id when one was
    /// submitted. Never waits for the cycle and never fails the caller.
    pub fn after_update(&self, event: &LifecycleEvent) -> Option<Uuid> {
        let locale = event.resolved_locale()?;
        if !self.policy.is_default_locale(locale) {
            return None;
        }
        let values = self.policy.synced_values(event.result.as_ref()?);
        if values.is_empty() {
            return None;
        }
        let document_id = event.resolved_document_id()?.to_string();

        let cycle_id = Uuid::new_v4();
        let scheduler = self.clone();
        let job_document_id = document_id.clone();
        let job = async move {
            scheduler
                .run_cycle(cycle_id, &job_document_id, &values)
                .await
                .map(|_| ())
        };

        match self.queue.submit(format!("propagate {} {}", self.policy.record_type(), document_id), job) {
            Ok(()) => {
                debug!(
                    "Scheduled propagation cycle {} for {} {}",
                    cycle_id,
                    self.policy.record_type(),
                    document_id
                );
                Some(cycle_id)
            }
            Err(e) => {
                error!(
                    "Could not schedule propagation for {} {}: {}",
                    self.policy.record_type(),
                    document_id,
                    e
                );
                None
            }
        }
    }

    /// Run a cycle inline and return its report. `values` are the synced
    /// values the default variant now holds.
    pub async fn propagate_now(&self, document_id: &str, values: &FieldMap) -> SyncResult<PropagationReport> {
        self.run_cycle(Uuid::new_v4(), document_id, values).await
    }

    async fn run_cycle(
        &self,
        cycle_id: Uuid,
        document_id: &str,
        values: &FieldMap,
    ) -> SyncResult<PropagationReport> {
        let span = info_span!(
            "propagation",
            cycle_id = %cycle_id,
            record_type = %self.policy.record_type(),
            document_id = %document_id
        );
        self.cycle(cycle_id, document_id, values).instrument(span).await
    }

    async fn cycle(
        &self,
        cycle_id: Uuid,
        document_id: &str,
        values: &FieldMap,
    ) -> SyncResult<PropagationReport> {
        let started_at = Utc::now();

        let locales = with_timeout(self.store_timeout, "list_locales", self.registry.list_locales())
            .await
            .map_err(|e| {
                error!("Error syncing {:?} to other locales: {}", values.keys().collect::<Vec<_>>(), e);
                e
            })?;

        let mut report = PropagationReport {
            cycle_id,
            record_type: self.policy.record_type().to_string(),
            document_id: document_id.to_string(),
            updated: Vec::new(),
            unchanged: Vec::new(),
            missing: Vec::new(),
            failed: Vec::new(),
            started_at,
            finished_at: started_at,
        };

        let targets = locales
            .iter()
            .map(|l| l.code.as_str())
            .filter(|code| !self.policy.is_default_locale(code));

        for locale in targets {
            match self.sync_locale(document_id, locale, values).await {
                Ok(LocaleOutcome::Updated) => report.updated.push(locale.to_string()),
                Ok(LocaleOutcome::Unchanged) => report.unchanged.push(locale.to_string()),
                Ok(LocaleOutcome::Missing) => report.missing.push(locale.to_string()),
                Err(e) => {
                    if e.is_collaborator_failure() {
                        warn!("Propagation to {} failed, leaving it divergent: {}", locale, e);
                    } else {
                        error!("Propagation to {} failed, leaving it divergent: {}", locale, e);
                    }
                    report.failed.push(LocaleFailure {
                        locale: locale.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            "Propagation finished: {} updated, {} unchanged, {} missing, {} failed",
            report.updated.len(),
            report.unchanged.len(),
            report.missing.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// One locale, one unit of work: read the mirror, write only if it differs.
    async fn sync_locale(
        &self,
        document_id: &str,
        locale: &str,
        values: &FieldMap,
    ) -> SyncResult<LocaleOutcome> {
        let record_type = self.policy.record_type();
        let fields: Vec<String> = values.keys().cloned().collect();

        let current = with_timeout(
            self.store_timeout,
            format!("find_one {} ({})", document_id, locale),
            self.store.find_one(record_type, document_id, locale, &fields),
        )
        .await?;

        let Some(current) = current else {
            // Seeded by the guard once this variant is created.
            return Ok(LocaleOutcome::Missing);
        };

        let differs = values
            .iter()
            .any(|(field, value)| current.get(field) != Some(value));
        if !differs {
            return Ok(LocaleOutcome::Unchanged);
        }

        with_timeout(
            self.store_timeout,
            format!("update {} ({})", document_id, locale),
            self.store.update(record_type, document_id, locale, values.clone()),
        )
        .await?;

        debug!("Mirrored {:?} to {}", fields, locale);
        Ok(LocaleOutcome::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryDocumentStore, StaticLocaleRegistry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const ARTICLE: &str = "api::article.article";

    fn map(value: serde_json::Value) -> FieldMap {
        value.as_object().cloned().unwrap()
    }

    async fn setup() -> (PropagationScheduler, Arc<InMemoryDocumentStore>, TaskQueue) {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.insert(ARTICLE, "D1", "en", map(json!({"slug": "b"}))).await;
        store.insert(ARTICLE, "D1", "es", map(json!({"slug": "a", "title": "Hola"}))).await;
        store.insert(ARTICLE, "D1", "de", map(json!({"slug": "b"}))).await;

        let registry = Arc::new(StaticLocaleRegistry::new(["en", "es", "de", "fr"]));
        let (queue, _worker) = TaskQueue::start();
        let policy = Arc::new(SyncFieldPolicy::with_defaults(ARTICLE).unwrap());
        let scheduler = PropagationScheduler::new(
            policy,
            store.clone(),
            registry,
            queue.clone(),
            Duration::from_secs(1),
        );
        (scheduler, store, queue)
    }

    #[tokio::test]
    async fn test_propagate_now_classifies_locales() {
        let (scheduler, store, _queue) = setup().await;

        let report = scheduler
            .propagate_now("D1", &map(json!({"slug": "b"})))
            .await
            .unwrap();

        assert_eq!(report.updated, vec!["es".to_string()]);
        assert_eq!(report.unchanged, vec!["de".to_string()]);
        assert_eq!(report.missing, vec!["fr".to_string()]);
        assert!(report.is_converged());

        let es = store.get(ARTICLE, "D1", "es").await.unwrap();
        assert_eq!(es.fields, map(json!({"slug": "b", "title": "Hola"})));
        assert!(store.get(ARTICLE, "D1", "fr").await.is_none());
    }

    #[tokio::test]
    async fn test_after_update_ignores_non_triggering_events() {
        let (scheduler, _store, queue) = setup().await;

        let non_default = LifecycleEvent::new(ARTICLE, map(json!({"locale": "es"})))
            .with_result(map(json!({"documentId": "D1", "slug": "b"})));
        let no_synced_value = LifecycleEvent::new(ARTICLE, map(json!({"locale": "en"})))
            .with_result(map(json!({"documentId": "D1", "title": "T"})));
        let no_document = LifecycleEvent::new(ARTICLE, map(json!({"locale": "en"})))
            .with_result(map(json!({"slug": "b"})));
        let no_locale = LifecycleEvent::new(ARTICLE, map(json!({})))
            .with_result(map(json!({"documentId": "D1", "slug": "b"})));

        assert_eq!(scheduler.after_update(&non_default), None);
        assert_eq!(scheduler.after_update(&no_synced_value), None);
        assert_eq!(scheduler.after_update(&no_document), None);
        assert_eq!(scheduler.after_update(&no_locale), None);
        assert_eq!(queue.stats().submitted(), 0);
    }

    #[tokio::test]
    async fn test_after_update_schedules_detached_cycle() {
        let (scheduler, store, queue) = setup().await;

        let event = LifecycleEvent::new(ARTICLE, map(json!({"locale": "en", "slug": "b"})))
            .with_result(map(json!({"locale": "en", "documentId": "D1", "slug": "b"})));

        assert!(scheduler.after_update(&event).is_some());
        // Still untouched: the cycle has not had a chance to run.
        assert_eq!(store.get(ARTICLE, "D1", "es").await.unwrap().get("slug"), Some(&json!("a")));

        queue.flush().await.unwrap();
        assert_eq!(store.get(ARTICLE, "D1", "es").await.unwrap().get("slug"), Some(&json!("b")));
        assert_eq!(queue.stats().succeeded(), 1);
    }
}
