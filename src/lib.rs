//! locale-sync - single-writer synchronization of locale-independent fields
//!
//! Every record type keeps some fields (a URL slug, a SKU) identical across
//! its locale variants. Only the default locale may change them:
//! - new variants are seeded from the default variant
//! - edits on other locales are silently dropped
//! - default-locale edits fan out to the other variants in the background

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod sync;
pub mod tasks;
pub mod telemetry;

pub use config::{PropagationConfig, RuleConfig, Settings};
pub use error::{SyncError, SyncResult};
pub use models::{FieldMap, Locale, LocaleVariant};
pub use pipeline::WritePipeline;
pub use store::{DocumentStore, InMemoryDocumentStore, LocaleRegistry, StaticLocaleRegistry};
pub use sync::{
    create_sync_rule, LifecycleEvent, LifecycleHooks, PropagationReport, SyncContext,
    SyncFieldPolicy, SyncRule, SyncRuleSet,
};
pub use tasks::TaskQueue;
