//! Quality checks on a baseline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::baseline::Baseline;
use crate::config::ValidationConfig;

/// Outcome of one check, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    /// Check passed.
    Pass,
    /// Suspicious but usable.
    Warning,
    /// The baseline is unusable for this aspect.
    Fail,
}

/// One named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCheck {
    /// Check name.
    pub name: String,
    /// Outcome.
    pub status: CheckStatus,
    /// What was found.
    pub message: String,
}

impl ValidationCheck {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
        }
    }
}

/// Counts gathered while validating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatistics {
    /// Components in the baseline.
    pub components: usize,
    /// Part components.
    pub parts: usize,
    /// Assembly components.
    pub assemblies: usize,
    /// Deepest level.
    pub max_depth: usize,
    /// Parts with positive volume.
    pub parts_with_volume: usize,
}

/// Result of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Worst check outcome.
    pub overall_status: CheckStatus,
    /// Summary sentence.
    pub message: String,
    /// Individual checks, in a fixed order.
    pub checks: Vec<ValidationCheck>,
    /// Counts.
    pub statistics: ValidationStatistics,
}

impl ValidationReport {
    /// Look up a check by name.
    pub fn check(&self, name: &str) -> Option<&ValidationCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Run every check on `baseline`.
pub fn validate(baseline: &Baseline, config: &ValidationConfig) -> ValidationReport {
    use CheckStatus::*;

    let statistics = ValidationStatistics {
        components: baseline.components.len(),
        parts: baseline.parts().count(),
        assemblies: baseline.components.iter().filter(|c| !c.is_part()).count(),
        max_depth: baseline.components.iter().map(|c| c.level).max().unwrap_or(0),
        parts_with_volume: baseline
            .parts()
            .filter(|p| baseline.summary(&p.component_id).is_some_and(|g| g.volume > 0.0))
            .count(),
    };

    let mut checks = Vec::with_capacity(6);

    checks.push(if baseline.metadata.is_empty() {
        ValidationCheck::new("metadata", Warning, "file header carries no metadata")
    } else {
        ValidationCheck::new("metadata", Pass, "file header present")
    });

    checks.push(match baseline.metadata.schema.as_deref() {
        None => ValidationCheck::new("schema", Warning, "no schema declared"),
        Some(schema) => {
            let upper = schema.to_ascii_uppercase();
            if config.known_schemas.iter().any(|k| upper.starts_with(&k.to_ascii_uppercase())) {
                ValidationCheck::new("schema", Pass, format!("schema {schema}"))
            } else {
                ValidationCheck::new("schema", Warning, format!("unrecognized schema {schema}"))
            }
        }
    });

    checks.push(if statistics.max_depth > config.max_depth {
        ValidationCheck::new(
            "hierarchy",
            Warning,
            format!("depth {} exceeds {}", statistics.max_depth, config.max_depth),
        )
    } else {
        ValidationCheck::new("hierarchy", Pass, format!("depth {}", statistics.max_depth))
    });

    let unnamed: Vec<&str> = baseline
        .components
        .iter()
        .filter(|c| c.name.trim().is_empty())
        .map(|c| c.component_id.as_str())
        .collect();
    checks.push(if unnamed.is_empty() {
        ValidationCheck::new("naming", Pass, "every component is named")
    } else {
        ValidationCheck::new("naming", Fail, format!("unnamed components: {}", unnamed.join(", ")))
    });

    checks.push(if statistics.parts_with_volume > 0 {
        ValidationCheck::new(
            "geometry",
            Pass,
            format!("{} of {} parts have volume", statistics.parts_with_volume, statistics.parts),
        )
    } else {
        ValidationCheck::new("geometry", Fail, "no part has a positive volume")
    });

    let mut by_name: BTreeMap<&str, usize> = BTreeMap::new();
    for c in &baseline.components {
        *by_name.entry(c.name.as_str()).or_default() += 1;
    }
    let duplicates: Vec<&str> = by_name
        .into_iter()
        .filter(|&(name, n)| n > 1 && !name.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
    checks.push(if duplicates.is_empty() {
        ValidationCheck::new("duplicates", Pass, "component names are unique")
    } else {
        ValidationCheck::new(
            "duplicates",
            Warning,
            format!("names used by several components: {}", duplicates.join(", ")),
        )
    });

    let overall_status = checks.iter().map(|c| c.status).max().unwrap_or(Pass);
    let message = match overall_status {
        Pass => "Baseline is valid".to_string(),
        Warning => format!(
            "Baseline is usable with {} warning(s)",
            checks.iter().filter(|c| c.status == Warning).count()
        ),
        Fail => format!(
            "Baseline failed {} check(s)",
            checks.iter().filter(|c| c.status == Fail).count()
        ),
    };

    ValidationReport {
        overall_status,
        message,
        checks,
        statistics,
    }
}
