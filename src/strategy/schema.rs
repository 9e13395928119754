//! JSON shapes for pushed strategy configuration.
//!
//! Payload layout, per config kind:
//!
//! * algorithms: `{algorithms:[{name, includers:[..], filters:[..],
//!   config:[{name,value}]}], combiner, diversityLevel,
//!   actionWeights:[{type,value}]}`
//! * test: the algorithms shape nested under
//!   `variations:[{label, ratio, config:<algorithms-shape>}]`
//! * rectag: `{defaultStrategy:<strategy>, recTagToStrategy:{tag:<strategy>}}`
//!   where `<strategy>` is either the algorithms or the test shape.

use std::collections::HashMap;

use serde::Deserialize;

use crate::errors::{EngineError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct AlgorithmsConfig {
    pub algorithms: Vec<AlgorithmEntry>,
    pub combiner: String,
    #[serde(rename = "diversityLevel", default)]
    pub diversity_level: Option<f64>,
    #[serde(rename = "actionWeights", default)]
    pub action_weights: Option<Vec<ActionWeightEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlgorithmEntry {
    pub name: String,
    #[serde(default)]
    pub includers: Option<Vec<String>>,
    #[serde(default)]
    pub filters: Option<Vec<String>>,
    #[serde(default)]
    pub config: Option<Vec<ConfigEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigEntry {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionWeightEntry {
    #[serde(rename = "type")]
    pub action_type: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestConfig {
    pub variations: Vec<TestVariationEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestVariationEntry {
    pub label: String,
    pub ratio: RatioValue,
    pub config: AlgorithmsConfig,
}

/// Variation ratios arrive as numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RatioValue {
    Number(f64),
    Text(String),
}

impl RatioValue {
    pub fn value(&self) -> Result<f64> {
        let ratio = match self {
            Self::Number(n) => *n,
            Self::Text(raw) => raw.trim().parse().map_err(|_| EngineError::ConfigParse {
                key: "ratio".to_string(),
                reason: format!("'{raw}' is not a number"),
            })?,
        };
        if ratio.is_finite() && ratio > 0.0 {
            Ok(ratio)
        } else {
            Err(EngineError::ConfigParse {
                key: "ratio".to_string(),
                reason: format!("ratio must be positive, got {ratio}"),
            })
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecTagConfig {
    #[serde(rename = "defaultStrategy", default)]
    pub default_strategy: Option<StrategySpec>,
    #[serde(rename = "recTagToStrategy", default)]
    pub rec_tag_to_strategy: HashMap<String, StrategySpec>,
}

/// A rectag value is either a plain algorithms config or a variation test.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StrategySpec {
    Test(TestConfig),
    Algorithms(AlgorithmsConfig),
}

/// Convert the `actionWeights` list into the action-type→weight map.
pub fn to_action_weights(entries: &Option<Vec<ActionWeightEntry>>) -> Result<HashMap<i32, f64>> {
    let mut weights = HashMap::new();
    if let Some(entries) = entries {
        for entry in entries {
            let action_type: i32 =
                entry
                    .action_type
                    .parse()
                    .map_err(|_| EngineError::ConfigParse {
                        key: "actionWeights".to_string(),
                        reason: format!("'{}' is not an action type", entry.action_type),
                    })?;
            weights.insert(action_type, entry.value);
        }
    }
    Ok(weights)
}

/// Convert the `config` name/value list into a param map.
pub fn to_config_map(entries: &Option<Vec<ConfigEntry>>) -> HashMap<String, String> {
    entries
        .as_ref()
        .map(|entries| {
            entries
                .iter()
                .map(|entry| (entry.name.clone(), entry.value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithms_shape_parses() {
        let json = r#"{
            "algorithms": [
                {"name": "clusterCounts",
                 "includers": ["pinnedItemsIncluder"],
                 "filters": [],
                 "config": [{"name": "decay", "value": "1.0"}]}
            ],
            "combiner": "firstSuccessful",
            "diversityLevel": 0.4,
            "actionWeights": [{"type": "1", "value": 2.0}]
        }"#;
        let config: AlgorithmsConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(config.algorithms.len(), 1);
        assert_eq!(config.combiner, "firstSuccessful");
        assert_eq!(config.diversity_level, Some(0.4));
        let weights = to_action_weights(&config.action_weights).expect("weights");
        assert_eq!(weights.get(&1), Some(&2.0));
        let params = to_config_map(&config.algorithms[0].config);
        assert_eq!(params.get("decay"), Some(&"1.0".to_string()));
    }

    #[test]
    fn test_ratio_accepts_string_and_number() {
        let text = RatioValue::Text("2.5".to_string());
        assert!((text.value().expect("parse") - 2.5).abs() < 1e-9);
        let number = RatioValue::Number(1.0);
        assert!((number.value().expect("parse") - 1.0).abs() < 1e-9);
        assert!(RatioValue::Text("abc".to_string()).value().is_err());
        assert!(RatioValue::Number(-1.0).value().is_err());
    }

    #[test]
    fn test_rectag_spec_disambiguates() {
        let json = r#"{
            "defaultStrategy": {"algorithms": [{"name": "clusterCounts"}], "combiner": "firstSuccessful"},
            "recTagToStrategy": {
                "sports": {"variations": [
                    {"label": "a", "ratio": "1",
                     "config": {"algorithms": [{"name": "clusterCounts"}], "combiner": "firstSuccessful"}}
                ]}
            }
        }"#;
        let config: RecTagConfig = serde_json::from_str(json).expect("parse");
        assert!(matches!(
            config.default_strategy,
            Some(StrategySpec::Algorithms(_))
        ));
        assert!(matches!(
            config.rec_tag_to_strategy.get("sports"),
            Some(StrategySpec::Test(_))
        ));
    }
}
