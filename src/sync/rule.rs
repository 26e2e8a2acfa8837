//! Sync rules
//!
//! A rule binds one record type's policy to a guard and a scheduler. Every
//! record type goes through the same engine; only the policy differs.

use crate::config::{ConfigError, RuleConfig};
use crate::error::SyncResult;
use crate::sync::guard::LocaleGuard;
use crate::sync::policy::SyncFieldPolicy;
use crate::sync::propagation::PropagationScheduler;
use crate::sync::{LifecycleEvent, SyncContext};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Hooks the host write pipeline calls around persistence.
///
/// `on_before_create` and `on_before_update` may rewrite the pending payload
/// and must finish before the host persists it. `on_after_update` runs after
/// the commit and must not hold up the host's response.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn on_before_create(&self, event: &mut LifecycleEvent) -> SyncResult<()>;

    async fn on_before_update(&self, event: &mut LifecycleEvent) -> SyncResult<()>;

    fn on_after_update(&self, event: &LifecycleEvent) -> Option<Uuid>;
}

#[derive(Clone)]
pub struct SyncRule {
    policy: Arc<SyncFieldPolicy>,
    guard: LocaleGuard,
    scheduler: PropagationScheduler,
}

impl SyncRule {
    /// Bind a policy to the injected collaborators. Pure data capture: no
    /// store or registry call happens here.
    pub fn new(policy: SyncFieldPolicy, ctx: &SyncContext) -> Self {
        let policy = Arc::new(policy);
        let timeout = ctx.propagation.store_timeout;
        Self {
            guard: LocaleGuard::new(policy.clone(), ctx.store.clone(), timeout),
            scheduler: PropagationScheduler::new(
                policy.clone(),
                ctx.store.clone(),
                ctx.registry.clone(),
                ctx.queue.clone(),
                timeout,
            ),
            policy,
        }
    }

    pub fn policy(&self) -> &SyncFieldPolicy {
        &self.policy
    }

    pub fn scheduler(&self) -> &PropagationScheduler {
        &self.scheduler
    }
}

#[async_trait]
impl LifecycleHooks for SyncRule {
    async fn on_before_create(&self, event: &mut LifecycleEvent) -> SyncResult<()> {
        self.guard.before_create(event).await.map(|_| ())
    }

    async fn on_before_update(&self, event: &mut LifecycleEvent) -> SyncResult<()> {
        self.guard.before_update(event);
        Ok(())
    }

    fn on_after_update(&self, event: &LifecycleEvent) -> Option<Uuid> {
        self.scheduler.after_update(event)
    }
}

/// Build the rule for one rule-table entry
pub fn create_sync_rule(config: &RuleConfig, ctx: &SyncContext) -> SyncResult<SyncRule> {
    let policy = SyncFieldPolicy::from_config(config)?;
    Ok(SyncRule::new(policy, ctx))
}

/// All configured rules, keyed by record type. Events for record types
/// without a rule pass through untouched.
#[derive(Clone, Default)]
pub struct SyncRuleSet {
    rules: HashMap<String, SyncRule>,
}

impl SyncRuleSet {
    pub fn from_configs(configs: &[RuleConfig], ctx: &SyncContext) -> SyncResult<Self> {
        let mut set = Self::default();
        for config in configs {
            set.insert(create_sync_rule(config, ctx)?)?;
        }
        info!("Loaded {} locale sync rules", set.rules.len());
        Ok(set)
    }

    pub fn insert(&mut self, rule: SyncRule) -> SyncResult<()> {
        let record_type = rule.policy().record_type().to_string();
        if self.rules.contains_key(&record_type) {
            return Err(ConfigError::InvalidValue(format!(
                "Duplicate rule for record type {}",
                record_type
            ))
            .into());
        }
        self.rules.insert(record_type, rule);
        Ok(())
    }

    pub fn get(&self, record_type: &str) -> Option<&SyncRule> {
        self.rules.get(record_type)
    }

    /// Configured record types, sorted
    pub fn record_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[async_trait]
impl LifecycleHooks for SyncRuleSet {
    async fn on_before_create(&self, event: &mut LifecycleEvent) -> SyncResult<()> {
        match self.rules.get(&event.record_type) {
            Some(rule) => rule.on_before_create(event).await,
            None => Ok(()),
        }
    }

    async fn on_before_update(&self, event: &mut LifecycleEvent) -> SyncResult<()> {
        match self.rules.get(&event.record_type) {
            Some(rule) => rule.on_before_update(event).await,
            None => Ok(()),
        }
    }

    fn on_after_update(&self, event: &LifecycleEvent) -> Option<Uuid> {
        self.rules
            .get(&event.record_type)
            .and_then(|rule| rule.on_after_update(event))
    }
}
