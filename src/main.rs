//! locale-sync host harness
//!
//! Wires the rule table against the in-memory store and registry and drives
//! one record through the full write path:
//! - create the default-locale variant
//! - create a second locale, which inherits the synced fields
//! - change the synced fields on the default locale and let them fan out
//! - create a third locale after the fact, which is seeded with the new values
//!
//! Configure with `SYNC_LOCALES=en,es,fr` (and optionally `SYNC_RULES`,
//! `SYNC_DEFAULT_LOCALE`, `SYNC_STORE_TIMEOUT_MS`).

use locale_sync::config::Settings;
use locale_sync::models::{FieldMap, DOCUMENT_ID_KEY, LOCALE_KEY};
use locale_sync::store::{InMemoryDocumentStore, StaticLocaleRegistry};
use locale_sync::sync::{SyncContext, SyncRuleSet};
use locale_sync::tasks::TaskQueue;
use locale_sync::{telemetry, WritePipeline};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    info!("🚀 Starting locale-sync host harness...");

    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let store = Arc::new(InMemoryDocumentStore::new());
    let registry = Arc::new(StaticLocaleRegistry::new(settings.locales.clone()));
    let (queue, worker) = TaskQueue::start();

    let ctx = SyncContext::new(
        store.clone(),
        registry,
        queue.clone(),
        settings.propagation.clone(),
    );
    let rules = Arc::new(SyncRuleSet::from_configs(&settings.rules, &ctx)?);

    info!("📚 Sync rules:");
    for record_type in rules.record_types() {
        if let Some(rule) = rules.get(record_type) {
            info!(
                "   {} - {:?} owned by '{}'",
                record_type,
                rule.policy().fields(),
                rule.policy().default_locale()
            );
        }
    }
    info!("🌐 Locales: {}", settings.locales.join(", "));

    let pipeline = WritePipeline::new(store.clone(), rules.clone());
    if let Some(record_type) = rules.record_types().first().map(|s| s.to_string()) {
        run_scenario(&pipeline, &store, &queue, &settings, &record_type).await?;
    } else {
        warn!("⚠️  No sync rules configured, nothing to run");
    }

    queue.shutdown().await?;
    worker.await?;

    info!("👋 Harness finished");
    Ok(())
}

async fn run_scenario(
    pipeline: &WritePipeline,
    store: &InMemoryDocumentStore,
    queue: &TaskQueue,
    settings: &Settings,
    record_type: &str,
) -> anyhow::Result<()> {
    let default_locale = settings
        .rules
        .iter()
        .find(|r| r.record_type == record_type)
        .map(|r| r.default_locale.clone())
        .unwrap_or_else(|| settings.default_locale.clone());
    let others: Vec<&String> = settings
        .locales
        .iter()
        .filter(|l| **l != default_locale)
        .collect();
    if others.is_empty() {
        warn!("⚠️  Only the default locale is configured; set SYNC_LOCALES to see propagation");
    }

    let original = pipeline
        .create(
            record_type,
            payload(json!({ LOCALE_KEY: default_locale, "slug": "intro", "title": "Introduction" })),
        )
        .await?;
    let document_id = original.document_id.clone();
    info!("✅ Created {} {} ({})", record_type, document_id, default_locale);

    if let Some(first) = others.first() {
        pipeline
            .create(
                record_type,
                payload(json!({ LOCALE_KEY: first, DOCUMENT_ID_KEY: document_id, "slug": "intro" })),
            )
            .await?;
        info!("✅ Created {} variant", first);
    }

    pipeline
        .update(
            record_type,
            &document_id,
            &default_locale,
            payload(json!({ "slug": "introduction" })),
        )
        .await?;
    info!("✅ Updated {} slug, propagation scheduled", default_locale);

    queue.flush().await?;

    if let Some(late) = others.get(1) {
        pipeline
            .create(
                record_type,
                payload(json!({ LOCALE_KEY: late, DOCUMENT_ID_KEY: document_id, "slug": "bonjour" })),
            )
            .await?;
        info!("✅ Created {} variant after the update", late);
    }

    for variant in store.variants_of(record_type, &document_id).await {
        let fields = Value::Object(variant.fields);
        info!("   {} -> {}", variant.locale, fields);
    }
    Ok(())
}

fn payload(value: Value) -> FieldMap {
    match value {
        Value::Object(map) => map,
        _ => FieldMap::new(),
    }
}
