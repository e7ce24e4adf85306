//! Threshold rules that turn measurements into stress / fatigue labels.

use super::FeatureSet;
use crate::config::ThresholdConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressLevel {
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FatigueLevel {
    Low,
    High,
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StressLevel::Normal => write!(f, "Normal"),
            StressLevel::High => write!(f, "High"),
        }
    }
}

impl fmt::Display for FatigueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatigueLevel::Low => write!(f, "Low"),
            FatigueLevel::High => write!(f, "High"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub stress_level: StressLevel,
    pub fatigue_level: FatigueLevel,
}

/// Apply the rule constants to a feature set.
///
/// - stress is High iff `energy > stress_energy` and `pitch > stress_pitch_hz`
/// - fatigue is High iff `energy < fatigue_energy`
///
/// Both comparisons are strict, so values sitting exactly on a threshold
/// keep the calm label.
pub fn classify(features: &FeatureSet, thresholds: &ThresholdConfig) -> ClassificationResult {
    let stress_level = if features.energy > thresholds.stress_energy && features.pitch > thresholds.stress_pitch_hz {
        StressLevel::High
    } else {
        StressLevel::Normal
    };

    let fatigue_level = if features.energy < thresholds.fatigue_energy {
        FatigueLevel::High
    } else {
        FatigueLevel::Low
    };

    ClassificationResult { stress_level, fatigue_level }
}
