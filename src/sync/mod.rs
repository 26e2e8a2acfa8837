//! Locale Field Synchronization
//!
//! Keeps locale-independent fields (slugs, SKUs, ...) owned by the default
//! locale of each record type:
//!
//! 1. **Guard**: seed synced fields on new variants, strip edits to them on
//!    non-default variants
//! 2. **Propagation**: after a default-locale update, mirror the new values to
//!    every other existing variant in a detached, best-effort cycle
//! 3. **Rules**: one guard + propagation pair per record type, built from the
//!    rule table

pub mod event;
pub mod guard;
pub mod policy;
pub mod propagation;
pub mod rule;

pub use event::LifecycleEvent;
pub use guard::LocaleGuard;
pub use policy::SyncFieldPolicy;
pub use propagation::{LocaleFailure, PropagationReport, PropagationScheduler};
pub use rule::{create_sync_rule, LifecycleHooks, SyncRule, SyncRuleSet};

use crate::config::PropagationConfig;
use crate::error::{SyncError, SyncResult};
use crate::store::{DocumentStore, LocaleRegistry};
use crate::tasks::TaskQueue;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Collaborators injected into every rule
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn DocumentStore>,
    pub registry: Arc<dyn LocaleRegistry>,
    pub queue: TaskQueue,
    pub propagation: PropagationConfig,
}

impl SyncContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<dyn LocaleRegistry>,
        queue: TaskQueue,
        propagation: PropagationConfig,
    ) -> Self {
        Self {
            store,
            registry,
            queue,
            propagation,
        }
    }
}

/// Bound a collaborator call so a stuck store cannot hold a write or a cycle
/// forever.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    operation: impl Into<String>,
    call: impl Future<Output = SyncResult<T>>,
) -> SyncResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout {
            operation: operation.into(),
            millis: limit.as_millis() as u64,
        }),
    }
}
