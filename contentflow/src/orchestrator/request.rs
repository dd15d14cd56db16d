//! Production requests and outcomes.

use crate::core::Stage;
use crate::errors::ContentflowError;
use crate::progress::ProgressSummary;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// Publication state of the article a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    /// Not yet published.
    #[default]
    Draft,
    /// Waiting for editorial review.
    InReview,
    /// Scheduled for publication.
    Scheduled,
    /// Live.
    Published,
    /// Taken down.
    Archived,
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::InReview => write!(f, "in_review"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Published => write!(f, "published"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// The existing article a production writes into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRef {
    /// Article id in the external store.
    pub id: String,
    /// Its current publication state.
    pub status: ArticleStatus,
}

impl ArticleRef {
    /// Creates a reference.
    #[must_use]
    pub fn new(id: impl Into<String>, status: ArticleStatus) -> Self {
        Self {
            id: id.into(),
            status,
        }
    }
}

/// What to produce.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionRequest {
    /// A fixed topic. Without one, topic discovery picks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Keywords to steer discovery and research.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Target writing style. Without one, style adaptation is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// The article to write into, if it already exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<ArticleRef>,
    /// Free-form data passed through to workers.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ProductionRequest {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Adds a keyword.
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    /// Sets the target style.
    #[must_use]
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Sets the target article.
    #[must_use]
    pub fn with_article(mut self, article: ArticleRef) -> Self {
        self.article = Some(article);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns true if a non-blank style was requested.
    #[must_use]
    pub fn wants_style(&self) -> bool {
        self.style.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// Rejects requests that must never start a run.
    pub fn validate(&self) -> Result<(), ContentflowError> {
        if let Some(article) = &self.article {
            if article.status == ArticleStatus::Published {
                return Err(ContentflowError::InvalidRequest(format!(
                    "article '{}' is already published and cannot be produced again",
                    article.id
                )));
            }
        }
        if self.topic.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ContentflowError::InvalidRequest(
                "topic must not be blank when given".to_string(),
            ));
        }
        Ok(())
    }
}

/// The result of a successful production run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOutcome {
    /// Run id.
    pub run_id: Uuid,
    /// Final progress snapshot.
    pub summary: ProgressSummary,
    /// Output of every stage whose worker ran, in stage order.
    pub outputs: BTreeMap<Stage, serde_json::Value>,
    /// Quality score of every stage whose worker ran.
    pub scores: BTreeMap<Stage, f64>,
}

impl ProductionOutcome {
    /// Output of the last stage that produced one.
    #[must_use]
    pub fn final_output(&self) -> Option<&serde_json::Value> {
        self.outputs.values().next_back()
    }

    /// Output of one stage.
    #[must_use]
    pub fn output_of(&self, stage: Stage) -> Option<&serde_json::Value> {
        self.outputs.get(&stage)
    }
}
