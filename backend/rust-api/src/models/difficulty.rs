use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    Low,
    Mid,
    High,
}

impl DifficultyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyTier::Low => "low",
            DifficultyTier::Mid => "mid",
            DifficultyTier::High => "high",
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyTier {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "easy" => Ok(DifficultyTier::Low),
            "mid" | "medium" => Ok(DifficultyTier::Mid),
            "high" | "hard" => Ok(DifficultyTier::High),
            other => Err(format!("Unknown difficulty tier: {}", other)),
        }
    }
}

/// Generation parameters attached to a difficulty tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifficultyProfile {
    pub tier: DifficultyTier,
    pub question_count: u32,
    pub time_limit_seconds: u32,
    pub complexity_descriptor: String,
}

/// Immutable tier table. Built once at startup and handed to the services
/// that need it.
#[derive(Debug, Clone)]
pub struct DifficultyCatalog {
    profiles: HashMap<DifficultyTier, DifficultyProfile>,
}

impl DifficultyCatalog {
    pub fn new(profiles: Vec<DifficultyProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .filter(|profile| profile.question_count > 0)
            .map(|profile| (profile.tier, profile))
            .collect();
        Self { profiles }
    }

    pub fn profile(&self, tier: DifficultyTier) -> Option<&DifficultyProfile> {
        self.profiles.get(&tier)
    }
}

impl Default for DifficultyCatalog {
    fn default() -> Self {
        Self::new(vec![
            DifficultyProfile {
                tier: DifficultyTier::Low,
                question_count: 10,
                time_limit_seconds: 600,
                complexity_descriptor:
                    "introductory questions checking recall of core definitions and facts"
                        .to_string(),
            },
            DifficultyProfile {
                tier: DifficultyTier::Mid,
                question_count: 20,
                time_limit_seconds: 1200,
                complexity_descriptor:
                    "intermediate questions that require applying concepts to familiar situations"
                        .to_string(),
            },
            DifficultyProfile {
                tier: DifficultyTier::High,
                question_count: 30,
                time_limit_seconds: 1800,
                complexity_descriptor:
                    "advanced questions that require multi-step reasoning and analysis of unfamiliar cases"
                        .to_string(),
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_every_tier() {
        let catalog = DifficultyCatalog::default();
        for tier in [DifficultyTier::Low, DifficultyTier::Mid, DifficultyTier::High] {
            let profile = catalog.profile(tier).unwrap();
            assert_eq!(profile.tier, tier);
            assert!(profile.question_count > 0);
        }
    }

    #[test]
    fn zero_count_profiles_are_dropped() {
        let catalog = DifficultyCatalog::new(vec![DifficultyProfile {
            tier: DifficultyTier::Low,
            question_count: 0,
            time_limit_seconds: 60,
            complexity_descriptor: "empty".to_string(),
        }]);
        assert!(catalog.profile(DifficultyTier::Low).is_none());
    }

    #[test]
    fn tier_parsing_accepts_aliases() {
        assert_eq!("LOW".parse::<DifficultyTier>(), Ok(DifficultyTier::Low));
        assert_eq!("medium".parse::<DifficultyTier>(), Ok(DifficultyTier::Mid));
        assert_eq!("hard".parse::<DifficultyTier>(), Ok(DifficultyTier::High));
        assert!("extreme".parse::<DifficultyTier>().is_err());
    }
}
