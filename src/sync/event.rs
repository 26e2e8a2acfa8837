//! Lifecycle events handed to the rules by the host write pipeline

use crate::models::{string_field, FieldMap, DOCUMENT_ID_KEY, LOCALE_KEY};

/// A write passing through the host: the pending payload, and once the store
/// has committed it, the committed result.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub record_type: String,
    pub data: FieldMap,
    pub result: Option<FieldMap>,
}

impl LifecycleEvent {
    pub fn new(record_type: impl Into<String>, data: FieldMap) -> Self {
        Self {
            record_type: record_type.into(),
            data,
            result: None,
        }
    }

    pub fn with_result(mut self, result: FieldMap) -> Self {
        self.result = Some(result);
        self
    }

    /// Locale named by the pending payload
    pub fn locale(&self) -> Option<&str> {
        string_field(&self.data, LOCALE_KEY)
    }

    /// Document id named by the pending payload
    pub fn document_id(&self) -> Option<&str> {
        string_field(&self.data, DOCUMENT_ID_KEY)
    }

    /// Payload locale, falling back to the committed result
    pub fn resolved_locale(&self) -> Option<&str> {
        self.locale().or_else(|| {
            self.result
                .as_ref()
                .and_then(|r| string_field(r, LOCALE_KEY))
        })
    }

    /// Payload document id, falling back to the committed result
    pub fn resolved_document_id(&self) -> Option<&str> {
        self.document_id().or_else(|| {
            self.result
                .as_ref()
                .and_then(|r| string_field(r, DOCUMENT_ID_KEY))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> FieldMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_resolution_prefers_payload() {
        let event = LifecycleEvent::new("article", map(json!({"locale": "en", "documentId": "D1"})))
            .with_result(map(json!({"locale": "es", "documentId": "D2"})));

        assert_eq!(event.resolved_locale(), Some("en"));
        assert_eq!(event.resolved_document_id(), Some("D1"));
    }

    #[test]
    fn test_resolution_falls_back_to_result() {
        let event = LifecycleEvent::new("article", map(json!({"slug": "b", "locale": ""})))
            .with_result(map(json!({"locale": "en", "documentId": "D1"})));

        assert_eq!(event.locale(), None);
        assert_eq!(event.resolved_locale(), Some("en"));
        assert_eq!(event.resolved_document_id(), Some("D1"));
    }
}
