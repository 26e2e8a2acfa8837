//! Application configuration module
//!
//! Handles loading and validating the synchronization rule table and the
//! runtime knobs from environment variables.

use crate::models::{DOCUMENT_ID_KEY, LOCALE_KEY};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Locale used when neither the rule nor the environment names one
pub const DEFAULT_LOCALE: &str = "en";

/// Field synchronized when a rule does not list any
pub const DEFAULT_SYNC_FIELD: &str = "slug";

static LOCALE_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{2,8})*$").expect("locale code pattern is valid")
});

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// One entry of the rule table: which record type is synchronized, from
/// which locale, and on which fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    #[validate(length(min = 1, message = "Record type is required"))]
    pub record_type: String,

    #[serde(default = "default_locale")]
    #[validate(custom(function = "validate_locale_code"))]
    pub default_locale: String,

    #[serde(default = "default_fields")]
    #[validate(length(min = 1, message = "At least one synced field is required"))]
    #[validate(custom(function = "validate_field_names"))]
    pub fields: Vec<String>,
}

impl RuleConfig {
    /// Rule entry with the stock locale and field list
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            default_locale: default_locale(),
            fields: default_fields(),
        }
    }

    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

fn default_fields() -> Vec<String> {
    vec![DEFAULT_SYNC_FIELD.to_string()]
}

/// Validate a locale code such as `en`, `es` or `pt-BR`
pub fn validate_locale_code(code: &str) -> Result<(), ValidationError> {
    if !LOCALE_CODE.is_match(code) {
        let mut err = ValidationError::new("invalid_locale_code");
        err.message = Some(format!("Invalid locale code '{}'", code).into());
        return Err(err);
    }
    Ok(())
}

fn validate_field_names(fields: &[String]) -> Result<(), ValidationError> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        let mut err = ValidationError::new("empty_field_name");
        err.message = Some("Synced field names cannot be empty".into());
        return Err(err);
    }
    // Identity keys address the variant; they are never owned data.
    let reserved = fields
        .iter()
        .find(|f| f.as_str() == LOCALE_KEY || f.as_str() == DOCUMENT_ID_KEY);
    if let Some(key) = reserved {
        let mut err = ValidationError::new("reserved_field_name");
        err.message = Some(format!("'{}' identifies the variant and cannot be synced", key).into());
        return Err(err);
    }
    Ok(())
}

/// Propagation runtime configuration
#[derive(Debug, Clone)]
pub struct PropagationConfig {
    /// Upper bound for every store or registry call made by a cycle
    pub store_timeout: Duration,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(5000),
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub default_locale: String,
    /// Locale codes served by the reference registry
    pub locales: Vec<String>,
    pub rules: Vec<RuleConfig>,
    pub propagation: PropagationConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let default_locale =
            std::env::var("SYNC_DEFAULT_LOCALE").unwrap_or_else(|_| DEFAULT_LOCALE.to_string());
        validate_locale_code(&default_locale)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let locales = match std::env::var("SYNC_LOCALES") {
            Ok(raw) => Self::parse_locales(&raw)?,
            Err(_) => vec![default_locale.clone()],
        };

        let rules = match std::env::var("SYNC_RULES") {
            Ok(raw) => Self::parse_rules(&raw, &default_locale)?,
            Err(_) => Self::default_rules(&default_locale),
        };

        let propagation = match std::env::var("SYNC_STORE_TIMEOUT_MS") {
            Ok(raw) => PropagationConfig {
                store_timeout: Self::parse_timeout(&raw)?,
            },
            Err(_) => PropagationConfig::default(),
        };

        Ok(Self {
            default_locale,
            locales,
            rules,
            propagation,
        })
    }

    /// The rule table shipped with the content model: articles and glossary
    /// categories keep their slug on the default locale.
    pub fn default_rules(default_locale: &str) -> Vec<RuleConfig> {
        ["api::article.article", "api::glossary-category.glossary-category"]
            .into_iter()
            .map(|record_type| RuleConfig::new(record_type).with_default_locale(default_locale))
            .collect()
    }

    /// Parse a comma-separated locale list, dropping blanks and duplicates
    pub fn parse_locales(raw: &str) -> Result<Vec<String>, ConfigError> {
        let mut locales: Vec<String> = Vec::new();
        for code in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            validate_locale_code(code)
                .map_err(|e| ConfigError::InvalidValue(format!("SYNC_LOCALES: {}", e)))?;
            if !locales.iter().any(|l| l == code) {
                locales.push(code.to_string());
            }
        }
        Ok(locales)
    }

    /// Parse a timeout given in milliseconds
    pub fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
        raw.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue(format!("SYNC_STORE_TIMEOUT_MS '{}': {}", raw, e)))
    }

    /// Parse a JSON rule table (`[{"recordType": "...", "fields": [...]}]`).
    /// Entries without `defaultLocale` inherit the process-wide one.
    pub fn parse_rules(raw: &str, default_locale: &str) -> Result<Vec<RuleConfig>, ConfigError> {
        let values: Vec<serde_json::Value> = serde_json::from_str(raw)
            .map_err(|e| ConfigError::ParseError(format!("SYNC_RULES: {}", e)))?;

        let mut rules = Vec::with_capacity(values.len());
        for value in values {
            let has_locale = value.get("defaultLocale").is_some();
            let mut rule: RuleConfig = serde_json::from_value(value)
                .map_err(|e| ConfigError::ParseError(format!("SYNC_RULES entry: {}", e)))?;
            if !has_locale {
                rule.default_locale = default_locale.to_string();
            }
            rule.validate()
                .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", rule.record_type, e)))?;
            if rules.iter().any(|r: &RuleConfig| r.record_type == rule.record_type) {
                return Err(ConfigError::InvalidValue(format!(
                    "Duplicate rule for record type {}",
                    rule.record_type
                )));
            }
            rules.push(rule);
        }
        Ok(rules)
    }
}
