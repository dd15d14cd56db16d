//! Automation policy.

use crate::core::Stage;
use crate::errors::{codes, ContractViolation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How stages are gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationMode {
    /// Every stage runs without confirmation.
    #[default]
    Auto,
    /// Every stage waits for confirmation.
    Human,
    /// Only the listed stages run without confirmation.
    Mixed,
}

impl fmt::Display for AutomationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Human => write!(f, "human"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

/// Maps every real stage to "runs without waiting for confirmation".
///
/// The map is always derived from a mode and, for `Mixed`, the explicit
/// list of automatic stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationPolicy {
    mode: AutomationMode,
    auto: BTreeMap<Stage, bool>,
}

impl Default for AutomationPolicy {
    fn default() -> Self {
        Self::all_auto()
    }
}

impl AutomationPolicy {
    /// Builds a policy from a mode. `explicit_auto_stages` is only read for
    /// `Mixed`.
    pub fn new(mode: AutomationMode, explicit_auto_stages: &[Stage]) -> Result<Self, ContractViolation> {
        Ok(Self {
            mode,
            auto: derive_map(mode, explicit_auto_stages)?,
        })
    }

    /// Every stage automatic.
    #[must_use]
    pub fn all_auto() -> Self {
        Self {
            mode: AutomationMode::Auto,
            auto: Stage::REAL.into_iter().map(|s| (s, true)).collect(),
        }
    }

    /// Every stage waits for confirmation.
    #[must_use]
    pub fn all_assisted() -> Self {
        Self {
            mode: AutomationMode::Human,
            auto: Stage::REAL.into_iter().map(|s| (s, false)).collect(),
        }
    }

    /// Only `auto_stages` run without confirmation.
    pub fn mixed(auto_stages: &[Stage]) -> Result<Self, ContractViolation> {
        Self::new(AutomationMode::Mixed, auto_stages)
    }

    /// Replaces the policy. On error the previous policy is kept.
    pub fn set_mode(
        &mut self,
        mode: AutomationMode,
        explicit_auto_stages: &[Stage],
    ) -> Result<(), ContractViolation> {
        self.auto = derive_map(mode, explicit_auto_stages)?;
        self.mode = mode;
        Ok(())
    }

    /// Returns true if the stage runs without confirmation.
    pub fn is_auto(&self, stage: Stage) -> Result<bool, ContractViolation> {
        self.auto.get(&stage).copied().ok_or_else(|| {
            ContractViolation::new(
                codes::POLICY_STAGE,
                format!("'{stage}' is not a real stage and has no automation setting"),
            )
            .with_stage(stage)
        })
    }

    /// Returns the mode the policy was derived from.
    #[must_use]
    pub fn mode(&self) -> AutomationMode {
        self.mode
    }

    /// Returns the automatic stages in stage order.
    #[must_use]
    pub fn auto_stages(&self) -> Vec<Stage> {
        self.auto
            .iter()
            .filter(|(_, auto)| **auto)
            .map(|(stage, _)| *stage)
            .collect()
    }
}

fn derive_map(
    mode: AutomationMode,
    explicit_auto_stages: &[Stage],
) -> Result<BTreeMap<Stage, bool>, ContractViolation> {
    if mode == AutomationMode::Mixed {
        if let Some(bad) = explicit_auto_stages.iter().find(|s| !s.is_real()) {
            return Err(ContractViolation::new(
                codes::POLICY_STAGE,
                format!("'{bad}' is not a real stage and cannot be automated"),
            )
            .with_stage(*bad));
        }
    }

    Ok(Stage::REAL
        .into_iter()
        .map(|stage| {
            let auto = match mode {
                AutomationMode::Auto => true,
                AutomationMode::Human => false,
                AutomationMode::Mixed => explicit_auto_stages.contains(&stage),
            };
            (stage, auto)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let auto = AutomationPolicy::all_auto();
        let human = AutomationPolicy::all_assisted();
        for stage in Stage::REAL {
            assert!(auto.is_auto(stage).unwrap());
            assert!(!human.is_auto(stage).unwrap());
        }
        assert_eq!(auto.mode(), AutomationMode::Auto);
        assert_eq!(human.mode(), AutomationMode::Human);
    }

    #[test]
    fn test_mixed_policy() {
        let policy =
            AutomationPolicy::mixed(&[Stage::TopicDiscovery, Stage::ArticleWriting]).unwrap();

        assert!(policy.is_auto(Stage::TopicDiscovery).unwrap());
        assert!(!policy.is_auto(Stage::TopicResearch).unwrap());
        assert!(policy.is_auto(Stage::ArticleWriting).unwrap());
        assert!(!policy.is_auto(Stage::ArticleReview).unwrap());
        assert_eq!(
            policy.auto_stages(),
            vec![Stage::TopicDiscovery, Stage::ArticleWriting]
        );
    }

    #[test]
    fn test_set_mode_is_idempotent() {
        let mut policy = AutomationPolicy::all_auto();
        policy.set_mode(AutomationMode::Mixed, &[Stage::ArticleReview]).unwrap();
        let first = policy.clone();
        policy.set_mode(AutomationMode::Mixed, &[Stage::ArticleReview]).unwrap();
        assert_eq!(policy, first);
    }

    #[test]
    fn test_explicit_list_ignored_outside_mixed() {
        let policy = AutomationPolicy::new(AutomationMode::Human, &[Stage::TopicDiscovery]).unwrap();
        assert!(!policy.is_auto(Stage::TopicDiscovery).unwrap());
    }

    #[test]
    fn test_pseudo_stage_lookup_fails() {
        let policy = AutomationPolicy::all_auto();
        let err = policy.is_auto(Stage::Completed).unwrap_err();
        assert_eq!(err.code, codes::POLICY_STAGE);
    }

    #[test]
    fn test_failed_set_mode_keeps_previous_policy() {
        let mut policy = AutomationPolicy::all_auto();
        assert!(policy.set_mode(AutomationMode::Mixed, &[Stage::Paused]).is_err());
        assert_eq!(policy, AutomationPolicy::all_auto());
    }

    #[test]
    fn test_mode_serialize() {
        let json = serde_json::to_string(&AutomationMode::Mixed).unwrap();
        assert_eq!(json, r#""mixed""#);
    }
}
