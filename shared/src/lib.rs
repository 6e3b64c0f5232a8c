use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Wear grade predicted for a piece of nonstick cookware.
///
/// Declaration order is the presentation order used in reports; the order in
/// which a model emits its outputs is configured separately on the backend.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClassLabel {
    New,
    Minor,
    Moderate,
    Severe,
}

impl ClassLabel {
    pub const ALL: [ClassLabel; 4] = [
        ClassLabel::New,
        ClassLabel::Minor,
        ClassLabel::Moderate,
        ClassLabel::Severe,
    ];

    /// Position of this label in [`ClassLabel::ALL`].
    pub fn index(self) -> usize {
        match self {
            ClassLabel::New => 0,
            ClassLabel::Minor => 1,
            ClassLabel::Moderate => 2,
            ClassLabel::Severe => 3,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AnalyzeRequest {
    pub image: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProbabilityEntry {
    pub probability: f64,
    pub percentage: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AnalysisReport {
    pub predicted_class: ClassLabel,
    pub confidence: f64,
    pub confidence_percent: String,
    pub status: String,
    pub emoji: String,
    pub condition: String,
    pub recommended_action: String,
    pub urgency_level: String,
    pub safety_assessment: String,
    pub condition_score: u8,
    pub replacement_timeline: String,
    pub care_tips: String,
    pub all_probabilities: BTreeMap<ClassLabel, ProbabilityEntry>,
    pub analysis_id: u32,
    pub timestamp: String,
    pub model_name: String,
    pub model_accuracy: String,
    pub fallback_mode: bool,
    pub deployment: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub service: String,
    pub version: String,
    pub model_loaded: bool,
    pub model_status: String,
    pub model_info: String,
    pub deployment: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
