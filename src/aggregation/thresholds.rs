use crate::monitor::error::{MonitorError, MonitorResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Three strictly ascending thresholds, in SOL of net buying pressure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct StagedThresholds {
    values: [f64; 3],
}

impl StagedThresholds {
    pub fn new(stage1: f64, stage2: f64, stage3: f64) -> MonitorResult<Self> {
        let values = [stage1, stage2, stage3];

        if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(MonitorError::ConfigError(format!(
                "Staged thresholds must be positive: {:?}",
                values
            )));
        }

        if !(stage1 < stage2 && stage2 < stage3) {
            return Err(MonitorError::ConfigError(format!(
                "Staged thresholds must be strictly ascending: {:?}",
                values
            )));
        }

        Ok(Self { values })
    }

    pub fn values(&self) -> [f64; 3] {
        self.values
    }
}

impl TryFrom<[f64; 3]> for StagedThresholds {
    type Error = MonitorError;

    fn try_from(values: [f64; 3]) -> Result<Self, Self::Error> {
        Self::new(values[0], values[1], values[2])
    }
}

impl From<StagedThresholds> for [f64; 3] {
    fn from(thresholds: StagedThresholds) -> Self {
        thresholds.values
    }
}

/// How the window decides when to fire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdMode {
    /// One threshold, one trigger
    Simple { threshold: f64 },
    /// Three ordered thresholds with independent one-shot triggers
    Staged { thresholds: StagedThresholds },
}

impl ThresholdMode {
    /// Ordered (stage, threshold) pairs
    pub fn levels(&self) -> Vec<(TriggerStage, f64)> {
        match self {
            ThresholdMode::Simple { threshold } => vec![(TriggerStage::Default, *threshold)],
            ThresholdMode::Staged { thresholds } => thresholds
                .values()
                .iter()
                .enumerate()
                .map(|(i, value)| (TriggerStage::Stage(i as u8 + 1), *value))
                .collect(),
        }
    }

    pub fn validate(&self) -> MonitorResult<()> {
        match self {
            ThresholdMode::Simple { threshold } if !threshold.is_finite() || *threshold <= 0.0 => {
                Err(MonitorError::ConfigError(format!(
                    "Threshold must be positive: {}",
                    threshold
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Which trigger fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerStage {
    /// The single trigger of simple mode
    Default,
    /// 1-based stage of staged mode
    Stage(u8),
}

impl fmt::Display for TriggerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerStage::Default => write!(f, "default"),
            TriggerStage::Stage(n) => write!(f, "stage {}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_thresholds_must_ascend() {
        assert!(StagedThresholds::new(5.0, 10.0, 20.0).is_ok());
        assert!(StagedThresholds::new(5.0, 5.0, 20.0).is_err());
        assert!(StagedThresholds::new(10.0, 5.0, 20.0).is_err());
        assert!(StagedThresholds::new(-1.0, 5.0, 20.0).is_err());
    }

    #[test]
    fn test_levels_order() {
        let mode = ThresholdMode::Staged {
            thresholds: StagedThresholds::new(5.0, 10.0, 20.0).unwrap(),
        };
        let levels = mode.levels();
        assert_eq!(levels[0], (TriggerStage::Stage(1), 5.0));
        assert_eq!(levels[2], (TriggerStage::Stage(3), 20.0));
    }

    #[test]
    fn test_staged_deserialize_rejects_descending() {
        let ok: ThresholdMode =
            serde_json::from_str(r#"{"kind":"staged","thresholds":[1.0,2.0,3.0]}"#).unwrap();
        assert!(matches!(ok, ThresholdMode::Staged { .. }));

        let bad = serde_json::from_str::<ThresholdMode>(
            r#"{"kind":"staged","thresholds":[3.0,2.0,1.0]}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_simple_threshold_validation() {
        assert!(ThresholdMode::Simple { threshold: 1.0 }.validate().is_ok());
        assert!(ThresholdMode::Simple { threshold: 0.0 }.validate().is_err());
    }
}
