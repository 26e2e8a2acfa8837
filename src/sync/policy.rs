//! Synced field policy
//!
//! Which locale owns which fields, for one record type.

use crate::config::{RuleConfig, DEFAULT_LOCALE, DEFAULT_SYNC_FIELD};
use crate::error::SyncResult;
use crate::models::{has_value, FieldMap};
use validator::Validate;

/// Immutable ownership policy of one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFieldPolicy {
    record_type: String,
    default_locale: String,
    fields: Vec<String>,
}

impl SyncFieldPolicy {
    /// Build a policy. Field order is kept; repeated names collapse onto their
    /// first occurrence.
    pub fn new<I, S>(
        record_type: impl Into<String>,
        default_locale: impl Into<String>,
        fields: I,
    ) -> SyncResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = RuleConfig::new(record_type)
            .with_default_locale(default_locale)
            .with_fields(fields);
        Self::from_config(&config)
    }

    /// Policy with the stock locale (`en`) and field list (`slug`)
    pub fn with_defaults(record_type: impl Into<String>) -> SyncResult<Self> {
        Self::new(record_type, DEFAULT_LOCALE, [DEFAULT_SYNC_FIELD])
    }

    pub fn from_config(config: &RuleConfig) -> SyncResult<Self> {
        config.validate()?;

        let mut fields: Vec<String> = Vec::with_capacity(config.fields.len());
        for field in &config.fields {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }

        Ok(Self {
            record_type: config.record_type.clone(),
            default_locale: config.default_locale.clone(),
            fields,
        })
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_default_locale(&self, locale: &str) -> bool {
        locale == self.default_locale
    }

    /// Synced fields of `data` that carry a value, in policy order
    pub fn synced_values(&self, data: &FieldMap) -> FieldMap {
        self.fields
            .iter()
            .filter_map(|field| {
                data.get(field)
                    .filter(|value| has_value(Some(*value)))
                    .map(|value| (field.clone(), value.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let policy = SyncFieldPolicy::with_defaults("api::article.article").unwrap();
        assert_eq!(policy.default_locale(), "en");
        assert_eq!(policy.fields(), &["slug".to_string()]);
        assert!(policy.is_default_locale("en"));
        assert!(!policy.is_default_locale("es"));
    }

    #[test]
    fn test_duplicate_fields_collapse() {
        let policy = SyncFieldPolicy::new("product", "en", ["sku", "slug", "sku"]).unwrap();
        assert_eq!(policy.fields(), &["sku".to_string(), "slug".to_string()]);
    }

    #[test]
    fn test_invalid_policies_rejected() {
        assert!(SyncFieldPolicy::new("", "en", ["slug"]).is_err());
        assert!(SyncFieldPolicy::new("article", "en", Vec::<String>::new()).is_err());
        assert!(SyncFieldPolicy::new("article", "en", [""]).is_err());
        assert!(SyncFieldPolicy::new("article", "", ["slug"]).is_err());
    }

    #[test]
    fn test_identity_keys_cannot_be_synced() {
        let err = SyncFieldPolicy::new("article", "en", ["slug", "locale"]).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(SyncFieldPolicy::new("article", "en", ["documentId"]).is_err());
    }

    #[test]
    fn test_equivalent_configuration_is_equal() {
        let a = SyncFieldPolicy::with_defaults("article").unwrap();
        let b = SyncFieldPolicy::new("article", "en", ["slug"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_synced_values_skip_empty() {
        let policy = SyncFieldPolicy::new("product", "en", ["slug", "sku"]).unwrap();
        let data = json!({"slug": "intro", "sku": "", "title": "Intro"});

        let values = policy.synced_values(data.as_object().unwrap());
        assert_eq!(values, json!({"slug": "intro"}).as_object().cloned().unwrap());
    }
}
