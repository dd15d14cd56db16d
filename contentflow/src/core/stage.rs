//! The stage catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One step of the content production pipeline.
///
/// The five real stages run in declaration order. `Completed` and `Failed`
/// are absorbing pseudo-stages, `Paused` is the suspend pseudo-stage. The
/// derived `Ord` follows declaration order, so ordered maps keyed by `Stage`
/// iterate in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pick a topic to write about.
    TopicDiscovery,
    /// Gather research material for the topic.
    TopicResearch,
    /// Draft the article.
    ArticleWriting,
    /// Rewrite the draft in the requested style. Optional.
    StyleAdaptation,
    /// Review the final article.
    ArticleReview,
    /// The run finished successfully.
    Completed,
    /// The run failed or was cancelled.
    Failed,
    /// The run is suspended.
    Paused,
}

impl Stage {
    /// The real stages in production order.
    pub const REAL: [Self; 5] = [
        Self::TopicDiscovery,
        Self::TopicResearch,
        Self::ArticleWriting,
        Self::StyleAdaptation,
        Self::ArticleReview,
    ];

    /// Returns true for the five real production stages.
    #[must_use]
    pub const fn is_real(self) -> bool {
        !matches!(self, Self::Completed | Self::Failed | Self::Paused)
    }

    /// Returns true for the absorbing pseudo-stages.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the stage may be skipped when the request doesn't need it.
    #[must_use]
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::StyleAdaptation)
    }

    /// Position of a real stage in the production order.
    #[must_use]
    pub fn index(self) -> Option<usize> {
        Self::REAL.iter().position(|s| *s == self)
    }

    /// The real stage that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.index().and_then(|i| Self::REAL.get(i + 1).copied())
    }

    /// Real stages that must be completed before this one may start.
    #[must_use]
    pub fn predecessors(self) -> &'static [Self] {
        match self.index() {
            Some(i) => &Self::REAL[..i],
            None => &[],
        }
    }

    /// Returns the snake_case name of the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopicDiscovery => "topic_discovery",
            Self::TopicResearch => "topic_research",
            Self::ArticleWriting => "article_writing",
            Self::StyleAdaptation => "style_adaptation",
            Self::ArticleReview => "article_review",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown stage: '{0}'")]
pub struct ParseStageError(pub String);

impl FromStr for Stage {
    type Err = ParseStageError;

    /// Accepts both `TopicDiscovery` and `topic_discovery` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "topicdiscovery" => Ok(Self::TopicDiscovery),
            "topicresearch" => Ok(Self::TopicResearch),
            "articlewriting" => Ok(Self::ArticleWriting),
            "styleadaptation" => Ok(Self::StyleAdaptation),
            "articlereview" => Ok(Self::ArticleReview),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "paused" => Ok(Self::Paused),
            _ => Err(ParseStageError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_stage_order() {
        assert_eq!(Stage::TopicDiscovery.next(), Some(Stage::TopicResearch));
        assert_eq!(Stage::StyleAdaptation.next(), Some(Stage::ArticleReview));
        assert_eq!(Stage::ArticleReview.next(), None);
        assert_eq!(Stage::Paused.next(), None);
    }

    #[test]
    fn test_pseudo_stages() {
        assert!(Stage::Completed.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::Paused.is_terminal());
        assert!(!Stage::Paused.is_real());
        assert!(Stage::REAL.iter().all(|s| s.is_real()));
    }

    #[test]
    fn test_predecessors() {
        assert!(Stage::TopicDiscovery.predecessors().is_empty());
        assert_eq!(
            Stage::ArticleWriting.predecessors(),
            &[Stage::TopicDiscovery, Stage::TopicResearch]
        );
        assert!(Stage::Completed.predecessors().is_empty());
    }

    #[test]
    fn test_ord_follows_pipeline_order() {
        let mut stages = vec![Stage::ArticleReview, Stage::TopicDiscovery, Stage::ArticleWriting];
        stages.sort();
        assert_eq!(
            stages,
            vec![Stage::TopicDiscovery, Stage::ArticleWriting, Stage::ArticleReview]
        );
    }

    #[test]
    fn test_parse_both_spellings() {
        assert_eq!("TopicResearch".parse::<Stage>(), Ok(Stage::TopicResearch));
        assert_eq!("topic_research".parse::<Stage>(), Ok(Stage::TopicResearch));
        assert_eq!(" article-review ".parse::<Stage>(), Ok(Stage::ArticleReview));
        assert!("publishing".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_serialize() {
        let json = serde_json::to_string(&Stage::StyleAdaptation).unwrap();
        assert_eq!(json, r#""style_adaptation""#);

        let stage: Stage = serde_json::from_str(r#""article_writing""#).unwrap();
        assert_eq!(stage, Stage::ArticleWriting);
    }
}
