//! Per-client strategy configuration and resolution.
//!
//! Strategies arrive as JSON pushed at runtime, keyed per client, and are
//! resolved per request with this precedence (highest first): a JS override
//! restricting the algorithm list, an A/B test (when the testing switch is
//! on and a test is configured), a rectag override, the client's own
//! default, then the process-wide global default. Every stored value is an
//! immutable whole replaced atomically per key; a rejected update leaves the
//! previous value untouched.

pub mod schema;
pub mod variation;

#[cfg(test)]
pub mod test_support;

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::constants::{
    CONFIG_KEY_ALGS, CONFIG_KEY_RECTAG, CONFIG_KEY_TEST, CONFIG_KEY_TEST_SWITCH,
};
use crate::errors::{EngineError, Result};
use crate::metrics::{CONFIG_UPDATES_TOTAL, STRATEGY_RESOLUTIONS_TOTAL};
use crate::pipeline::{ItemFilter, ItemIncluder, RecommendationAlgorithm, ResultCombiner};
use crate::registry::ComponentRegistry;
use self::schema::{AlgorithmsConfig, RecTagConfig, StrategySpec, TestConfig};
use self::variation::{Variation, VariationSet};

/// One algorithm of a strategy, fully resolved.
#[derive(Clone)]
pub struct AlgorithmSpec {
    pub name: String,
    pub algorithm: Arc<dyn RecommendationAlgorithm>,
    pub includers: Vec<Arc<dyn ItemIncluder>>,
    /// Already unioned with the always-on filters at build time.
    pub filters: Vec<Arc<dyn ItemFilter>>,
    pub config: HashMap<String, String>,
}

/// An executable recommendation strategy. Immutable once built.
#[derive(Clone)]
pub struct Strategy {
    pub label: String,
    pub algorithms: Vec<AlgorithmSpec>,
    pub combiner: Arc<dyn ResultCombiner>,
    pub diversity_level: f64,
    pub action_weights: HashMap<i32, f64>,
}

impl Strategy {
    /// The weight for an action type; unconfigured types weigh 1.0.
    pub fn action_weight(&self, action_type: i32) -> f64 {
        self.action_weights.get(&action_type).copied().unwrap_or(1.0)
    }
}

/// A stored strategy value: plain, or a variation test resolved per draw.
enum LeafStrategy {
    Simple(Arc<Strategy>),
    Test(Arc<VariationSet>),
}

impl LeafStrategy {
    fn select(&self) -> Arc<Strategy> {
        match self {
            Self::Simple(strategy) => strategy.clone(),
            Self::Test(set) => set.pick(),
        }
    }
}

/// Per-tag strategy override with a required default.
pub struct RecTagOverride {
    default: LeafStrategy,
    by_tag: HashMap<String, LeafStrategy>,
}

impl RecTagOverride {
    fn select(&self, rec_tag: Option<&str>) -> Arc<Strategy> {
        match rec_tag.and_then(|tag| self.by_tag.get(tag)) {
            Some(leaf) => leaf.select(),
            None => self.default.select(),
        }
    }
}

/// Concurrent registry of per-client strategy configuration.
pub struct StrategyStore {
    registry: Arc<ComponentRegistry>,
    always_on: Vec<Arc<dyn ItemFilter>>,
    defaults: DashMap<String, Arc<Strategy>>,
    testing_on: DashMap<String, bool>,
    tests: DashMap<String, Arc<VariationSet>>,
    rectags: DashMap<String, Arc<RecTagOverride>>,
    global_default: RwLock<Option<Arc<Strategy>>>,
}

impl StrategyStore {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        let always_on = registry.always_on_filters();
        Self {
            registry,
            always_on,
            defaults: DashMap::new(),
            testing_on: DashMap::new(),
            tests: DashMap::new(),
            rectags: DashMap::new(),
            global_default: RwLock::new(None),
        }
    }

    /// Resolve the strategy to execute for a request. `None` means no
    /// configuration at any level: the caller returns no recommendations.
    pub fn resolve(
        &self,
        client: &str,
        rec_tag: Option<&str>,
        js_override_algorithms: Option<&[String]>,
    ) -> Option<Arc<Strategy>> {
        let resolved = self.resolve_base(client, rec_tag);
        match (resolved, js_override_algorithms) {
            (Some(strategy), Some(names)) => Some(Arc::new(restrict_to(&strategy, names))),
            (resolved, _) => resolved,
        }
    }

    fn resolve_base(&self, client: &str, rec_tag: Option<&str>) -> Option<Arc<Strategy>> {
        if self.testing_on.get(client).map(|on| *on).unwrap_or(false) {
            if let Some(set) = self.tests.get(client) {
                STRATEGY_RESOLUTIONS_TOTAL.with_label_values(&["test"]).inc();
                return Some(set.pick());
            }
            warn!(
                client,
                "testing is switched on but no test is configured, falling back"
            );
        }
        if let Some(rectag) = self.rectags.get(client) {
            STRATEGY_RESOLUTIONS_TOTAL
                .with_label_values(&["rectag"])
                .inc();
            return Some(rectag.select(rec_tag));
        }
        if let Some(strategy) = self.defaults.get(client) {
            STRATEGY_RESOLUTIONS_TOTAL
                .with_label_values(&["client"])
                .inc();
            return Some(strategy.clone());
        }
        let global = self.global_default.read().clone();
        STRATEGY_RESOLUTIONS_TOTAL
            .with_label_values(&[if global.is_some() { "global" } else { "none" }])
            .inc();
        global
    }

    /// Apply one pushed config value. All-or-nothing per key: any parse or
    /// component-resolution failure keeps the previous value for that key.
    pub fn apply_config_update(&self, client: &str, key: &str, json: &str) -> Result<()> {
        let result = self.try_apply(client, key, json);
        match &result {
            Ok(()) => {
                CONFIG_UPDATES_TOTAL.with_label_values(&[key, "ok"]).inc();
            }
            Err(err) => {
                error!(
                    client,
                    key,
                    error = %err,
                    "config update rejected, previous configuration kept"
                );
                CONFIG_UPDATES_TOTAL
                    .with_label_values(&[key, "error"])
                    .inc();
            }
        }
        result
    }

    fn try_apply(&self, client: &str, key: &str, json: &str) -> Result<()> {
        match key {
            CONFIG_KEY_ALGS => {
                info!(client, "received new algorithm config");
                let config: AlgorithmsConfig = parse(key, json)?;
                let strategy = self.build_strategy(&config, "-")?;
                self.defaults.insert(client.to_string(), Arc::new(strategy));
                info!(client, "installed new algorithm config");
            }
            CONFIG_KEY_TEST_SWITCH => {
                let on = parse_switch(json)?;
                let previous = self.testing_on.insert(client.to_string(), on);
                info!(
                    client,
                    from = previous.unwrap_or(false),
                    to = on,
                    "testing switch updated"
                );
            }
            CONFIG_KEY_TEST => {
                info!(client, "received new test config");
                let config: TestConfig = parse(key, json)?;
                let set = self.build_variation_set(&config)?;
                let count = set.variations().len();
                self.tests.insert(client.to_string(), Arc::new(set));
                info!(client, variations = count, "installed variation test");
            }
            CONFIG_KEY_RECTAG => {
                info!(client, "received new rectag config");
                let config: RecTagConfig = parse(key, json)?;
                let default_spec =
                    config
                        .default_strategy
                        .as_ref()
                        .ok_or_else(|| EngineError::ConfigParse {
                            key: key.to_string(),
                            reason: "rectag config needs a default strategy".to_string(),
                        })?;
                let default = self.build_leaf(default_spec)?;
                let mut by_tag = HashMap::new();
                for (tag, spec) in &config.rec_tag_to_strategy {
                    by_tag.insert(tag.clone(), self.build_leaf(spec)?);
                }
                self.rectags
                    .insert(client.to_string(), Arc::new(RecTagOverride { default, by_tag }));
                info!(client, "installed rectag strategies");
            }
            _ => {
                warn!(client, key, "ignored unknown config key");
            }
        }
        Ok(())
    }

    /// Remove one stored config value; resolution falls through to the next
    /// precedence level.
    pub fn apply_config_removal(&self, client: &str, key: &str) {
        info!(client, key, "received config removal");
        match key {
            CONFIG_KEY_ALGS => {
                self.defaults.remove(client);
            }
            CONFIG_KEY_TEST_SWITCH => {
                self.testing_on.remove(client);
            }
            CONFIG_KEY_TEST => {
                self.tests.remove(client);
            }
            CONFIG_KEY_RECTAG => {
                self.rectags.remove(client);
            }
            _ => {
                warn!(client, key, "ignored unknown config removal");
            }
        }
    }

    /// Replace the process-wide fallback strategy.
    pub fn set_global_default(&self, json: &str) -> Result<()> {
        let trimmed = json.trim();
        if trimmed.is_empty() {
            warn!("no global default strategy is set");
            return Ok(());
        }
        let config: AlgorithmsConfig = parse("default_strategy", trimmed)?;
        let strategy = self.build_strategy(&config, "-")?;
        *self.global_default.write() = Some(Arc::new(strategy));
        info!("changed global default strategy");
        Ok(())
    }

    fn build_strategy(&self, config: &AlgorithmsConfig, label: &str) -> Result<Strategy> {
        let mut algorithms = Vec::with_capacity(config.algorithms.len());
        for entry in &config.algorithms {
            let algorithm = self.registry.algorithm(&entry.name)?;
            let mut includers = Vec::new();
            if let Some(names) = &entry.includers {
                for name in names {
                    includers.push(self.registry.includer(name)?);
                }
            }
            let mut filters: Vec<Arc<dyn ItemFilter>> = Vec::new();
            if let Some(names) = &entry.filters {
                for name in names {
                    filters.push(self.registry.filter(name)?);
                }
            }
            for always_on in &self.always_on {
                if !filters.iter().any(|f| f.name() == always_on.name()) {
                    filters.push(always_on.clone());
                }
            }
            algorithms.push(AlgorithmSpec {
                name: entry.name.clone(),
                algorithm,
                includers,
                filters,
                config: schema::to_config_map(&entry.config),
            });
        }
        let combiner = self.registry.combiner(&config.combiner)?;
        let action_weights = schema::to_action_weights(&config.action_weights)?;
        Ok(Strategy {
            label: label.to_string(),
            algorithms,
            combiner,
            diversity_level: config.diversity_level.unwrap_or(0.0),
            action_weights,
        })
    }

    fn build_variation_set(&self, config: &TestConfig) -> Result<VariationSet> {
        let mut variations = Vec::with_capacity(config.variations.len());
        for entry in &config.variations {
            let ratio = entry.ratio.value()?;
            let strategy = self.build_strategy(&entry.config, &entry.label)?;
            variations.push(Variation {
                strategy: Arc::new(strategy),
                ratio,
            });
        }
        VariationSet::build(variations)
    }

    fn build_leaf(&self, spec: &StrategySpec) -> Result<LeafStrategy> {
        match spec {
            StrategySpec::Algorithms(config) => Ok(LeafStrategy::Simple(Arc::new(
                self.build_strategy(config, "-")?,
            ))),
            StrategySpec::Test(config) => Ok(LeafStrategy::Test(Arc::new(
                self.build_variation_set(config)?,
            ))),
        }
    }
}

/// Restrict a strategy to the named algorithms, keeping everything else.
fn restrict_to(strategy: &Strategy, names: &[String]) -> Strategy {
    let mut restricted = strategy.clone();
    restricted
        .algorithms
        .retain(|spec| names.iter().any(|name| name == &spec.name));
    restricted
}

fn parse<'a, T: serde::Deserialize<'a>>(key: &str, json: &'a str) -> Result<T> {
    serde_json::from_str(json).map_err(|err| EngineError::ConfigParse {
        key: key.to_string(),
        reason: err.to_string(),
    })
}

fn parse_switch(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        other => Err(EngineError::ConfigParse {
            key: CONFIG_KEY_TEST_SWITCH.to_string(),
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}
