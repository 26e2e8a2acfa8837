//! Collaborator interfaces
//!
//! The engine never owns storage or the locale list. It talks to the host
//! through these two traits; `memory` holds reference implementations used by
//! the host harness and the tests.

pub mod memory;

use crate::error::SyncResult;
use crate::models::{FieldMap, Locale, LocaleVariant};
use async_trait::async_trait;

pub use memory::{InMemoryDocumentStore, StaticLocaleRegistry};

/// Per-locale document storage. Every call targets exactly one locale variant
/// and is atomic on its own; nothing spans several variants.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one variant, restricted to `fields` (all fields when empty).
    /// A variant that does not exist is `Ok(None)`, not an error.
    async fn find_one(
        &self,
        record_type: &str,
        document_id: &str,
        locale: &str,
        fields: &[String],
    ) -> SyncResult<Option<FieldMap>>;

    /// Merge `data` into an existing variant and return the committed state.
    async fn update(
        &self,
        record_type: &str,
        document_id: &str,
        locale: &str,
        data: FieldMap,
    ) -> SyncResult<LocaleVariant>;

    /// Create a variant. Without a `document_id` a new logical record is
    /// started and the store assigns its identity.
    async fn create(
        &self,
        record_type: &str,
        document_id: Option<&str>,
        locale: &str,
        data: FieldMap,
    ) -> SyncResult<LocaleVariant>;
}

/// Source of the configured locales
#[async_trait]
pub trait LocaleRegistry: Send + Sync {
    async fn list_locales(&self) -> SyncResult<Vec<Locale>>;
}
