//! Per-stage progress weights.

use crate::core::Stage;
use crate::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Allowed deviation of the weight total from 100.
const SUM_TOLERANCE: f64 = 1e-6;

/// Percentage weight of every real stage in the overall progress figure.
///
/// Weights are validated at construction: exactly the five real stages,
/// each finite and non-negative, summing to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Stage, f64>", into = "BTreeMap<Stage, f64>")]
pub struct StageWeights {
    weights: BTreeMap<Stage, f64>,
}

impl StageWeights {
    /// Creates validated weights from `(stage, percentage)` pairs.
    pub fn new(pairs: impl IntoIterator<Item = (Stage, f64)>) -> Result<Self, ConfigurationError> {
        let mut weights = BTreeMap::new();
        for (stage, weight) in pairs {
            if !stage.is_real() {
                return Err(ConfigurationError::new(format!(
                    "'{stage}' is a pseudo-stage and cannot carry a weight"
                ))
                .with_field("stage_weights"));
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigurationError::new(format!(
                    "weight for '{stage}' must be a non-negative number, got {weight}"
                ))
                .with_field("stage_weights"));
            }
            if weights.insert(stage, weight).is_some() {
                return Err(ConfigurationError::new(format!("duplicate weight for '{stage}'"))
                    .with_field("stage_weights"));
            }
        }

        let missing: Vec<String> = Stage::REAL
            .iter()
            .filter(|s| !weights.contains_key(*s))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigurationError::new(format!(
                "missing weights for: {}",
                missing.join(", ")
            ))
            .with_field("stage_weights"));
        }

        let total: f64 = weights.values().sum();
        if (total - 100.0).abs() > SUM_TOLERANCE {
            return Err(ConfigurationError::new(format!(
                "weights must sum to 100, got {total}"
            ))
            .with_field("stage_weights"));
        }

        Ok(Self { weights })
    }

    /// Creates weights from percentages listed in stage order.
    ///
    /// # Examples
    ///
    /// ```
    /// use contentflow::progress::StageWeights;
    /// use contentflow::core::Stage;
    ///
    /// let weights = StageWeights::from_percentages([10.0, 20.0, 40.0, 15.0, 15.0]).unwrap();
    /// assert_eq!(weights.weight(Stage::ArticleWriting), 40.0);
    /// ```
    pub fn from_percentages(percentages: [f64; 5]) -> Result<Self, ConfigurationError> {
        Self::new(Stage::REAL.into_iter().zip(percentages))
    }

    /// Returns the weight of a stage. Pseudo-stages weigh nothing.
    #[must_use]
    pub fn weight(&self, stage: Stage) -> f64 {
        self.weights.get(&stage).copied().unwrap_or(0.0)
    }

    /// Iterates over `(stage, weight)` in stage order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, f64)> + '_ {
        self.weights.iter().map(|(s, w)| (*s, *w))
    }
}

impl TryFrom<BTreeMap<Stage, f64>> for StageWeights {
    type Error = ConfigurationError;

    fn try_from(map: BTreeMap<Stage, f64>) -> Result<Self, Self::Error> {
        Self::new(map)
    }
}

impl From<StageWeights> for BTreeMap<Stage, f64> {
    fn from(weights: StageWeights) -> Self {
        weights.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_percentages() {
        let weights = StageWeights::from_percentages([10.0, 20.0, 40.0, 15.0, 15.0]).unwrap();
        assert_eq!(weights.weight(Stage::TopicDiscovery), 10.0);
        assert_eq!(weights.weight(Stage::StyleAdaptation), 15.0);
        assert_eq!(weights.weight(Stage::Completed), 0.0);
        assert_eq!(weights.iter().count(), 5);
    }

    #[test]
    fn test_rejects_bad_sum() {
        let err = StageWeights::from_percentages([10.0, 20.0, 40.0, 15.0, 10.0]).unwrap_err();
        assert!(err.message.contains("sum to 100"));
        assert_eq!(err.field.as_deref(), Some("stage_weights"));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let err = StageWeights::from_percentages([-10.0, 40.0, 40.0, 15.0, 15.0]).unwrap_err();
        assert!(err.message.contains("non-negative"));
    }

    #[test]
    fn test_rejects_missing_stage() {
        let err = StageWeights::new([
            (Stage::TopicDiscovery, 50.0),
            (Stage::ArticleWriting, 50.0),
        ])
        .unwrap_err();
        assert!(err.message.contains("topic_research"));
    }

    #[test]
    fn test_rejects_pseudo_stage() {
        let err = StageWeights::new([(Stage::Paused, 100.0)]).unwrap_err();
        assert!(err.message.contains("pseudo-stage"));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: StageWeights = serde_json::from_str(
            r#"{"topic_discovery": 10, "topic_research": 20, "article_writing": 40,
                "style_adaptation": 15, "article_review": 15}"#,
        )
        .unwrap();
        assert_eq!(ok.weight(Stage::ArticleReview), 15.0);

        let bad = serde_json::from_str::<StageWeights>(r#"{"topic_discovery": 100}"#);
        assert!(bad.is_err());
    }
}
