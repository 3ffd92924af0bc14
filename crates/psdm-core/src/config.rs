//! Assembly configuration.

use serde::{Deserialize, Serialize};

use crate::EntityKind;

/// How per-record failures of one kind affect that kind's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Any failed record fails the whole kind; nothing of it is kept.
    #[default]
    AllOrNothing,
    /// Successful records are kept, failures are reported alongside.
    Partial,
}

impl std::str::FromStr for AggregationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::record::normalize_key(s).as_str() {
            "allornothing" | "strict" => Ok(AggregationPolicy::AllOrNothing),
            "partial" => Ok(AggregationPolicy::Partial),
            _ => Err(format!("unknown aggregation policy '{s}'")),
        }
    }
}

impl std::fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationPolicy::AllOrNothing => f.write_str("all_or_nothing"),
            AggregationPolicy::Partial => f.write_str("partial"),
        }
    }
}

/// Settings of one [`crate::GridAssembler`] run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    pub policy: AggregationPolicy,
    /// Convert records on the rayon pool and fetch edge kinds concurrently.
    pub parallel: bool,
    /// Kinds to assemble; kinds left out are reported as skipped.
    pub kinds: Vec<EntityKind>,
    /// Run structural graph checks after assembly.
    pub validate_topology: bool,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            policy: AggregationPolicy::default(),
            parallel: false,
            kinds: EntityKind::ALL.to_vec(),
            validate_topology: true,
        }
    }
}

impl AssemblyConfig {
    pub fn with_policy(mut self, policy: AggregationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Whether `kind` is part of this run.
    pub fn includes(&self, kind: EntityKind) -> bool {
        self.kinds.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_strict_and_complete() {
        let config = AssemblyConfig::default();
        assert_eq!(config.policy, AggregationPolicy::AllOrNothing);
        assert!(!config.parallel);
        assert!(EntityKind::ALL.iter().all(|kind| config.includes(*kind)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AssemblyConfig =
            serde_json::from_str(r#"{"policy":"partial","kinds":["node","line"]}"#).unwrap();
        assert_eq!(config.policy, AggregationPolicy::Partial);
        assert!(config.includes(EntityKind::Line));
        assert!(!config.includes(EntityKind::Switch));
        assert!(config.validate_topology);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("all-or-nothing".parse::<AggregationPolicy>(), Ok(AggregationPolicy::AllOrNothing));
        assert_eq!("Partial".parse::<AggregationPolicy>(), Ok(AggregationPolicy::Partial));
        assert!("lenient".parse::<AggregationPolicy>().is_err());
    }
}
