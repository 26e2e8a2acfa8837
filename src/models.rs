//! Record and locale models shared by the engine and its collaborators

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name carrying the locale code of a variant
pub const LOCALE_KEY: &str = "locale";

/// Field name carrying the locale-independent identity of a record
pub const DOCUMENT_ID_KEY: &str = "documentId";

/// Arbitrary field data of one locale variant, as exchanged with the host
pub type FieldMap = Map<String, Value>;

/// A locale configured in the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locale {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Locale {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
        }
    }
}

/// One locale variant of a logical record, keyed by (document id, locale)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleVariant {
    pub document_id: String,
    pub locale: String,
    pub fields: FieldMap,
}

impl LocaleVariant {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field data including the identifying keys, the shape the host hands
    /// to lifecycle hooks as a committed result.
    pub fn to_field_map(&self) -> FieldMap {
        let mut map = self.fields.clone();
        map.insert(DOCUMENT_ID_KEY.to_string(), Value::String(self.document_id.clone()));
        map.insert(LOCALE_KEY.to_string(), Value::String(self.locale.clone()));
        map
    }
}

/// Whether a field value counts as set. `null` and the empty string do not.
pub fn has_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Read a non-empty string field
pub fn string_field<'a>(data: &'a FieldMap, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_has_value() {
        assert!(!has_value(None));
        assert!(!has_value(Some(&Value::Null)));
        assert!(!has_value(Some(&json!(""))));
        assert!(has_value(Some(&json!("intro"))));
        assert!(has_value(Some(&json!(0))));
        assert!(has_value(Some(&json!(false))));
    }

    #[test]
    fn test_variant_field_map_carries_identity() {
        let variant = LocaleVariant {
            document_id: "D1".to_string(),
            locale: "es".to_string(),
            fields: json!({"slug": "intro"}).as_object().cloned().unwrap(),
        };
        let map = variant.to_field_map();

        assert_eq!(string_field(&map, DOCUMENT_ID_KEY), Some("D1"));
        assert_eq!(string_field(&map, LOCALE_KEY), Some("es"));
        assert_eq!(map.get("slug"), Some(&json!("intro")));
    }
}
