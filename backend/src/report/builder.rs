use chrono::{SecondsFormat, Utc};
use rand::Rng;
use shared::{AnalysisReport, ClassLabel, ProbabilityEntry};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::advisory::advisory_for;
use crate::inference::{ModelHandle, ProbabilityVector};

pub const ANALYSIS_ID_RANGE: RangeInclusive<u32> = 1000..=9999;
pub const FALLBACK_MODEL_NAME: &str = "Demo Mode";
pub const FALLBACK_MODEL_ACCURACY: &str = "44.89% (fallback)";

/// Which artifact, or the demo simulator, produced a report.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub model_name: String,
    pub model_accuracy: String,
    pub fallback: bool,
}

impl Provenance {
    pub fn from_handle(handle: &ModelHandle) -> Self {
        Self {
            model_name: handle.source.name.clone(),
            model_accuracy: handle.source.accuracy.clone(),
            fallback: false,
        }
    }

    pub fn fallback() -> Self {
        Self {
            model_name: FALLBACK_MODEL_NAME.to_string(),
            model_accuracy: FALLBACK_MODEL_ACCURACY.to_string(),
            fallback: true,
        }
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

#[derive(Debug, Clone)]
pub struct ReportBuilder {
    deployment: String,
}

impl ReportBuilder {
    pub fn new(deployment: impl Into<String>) -> Self {
        Self {
            deployment: deployment.into(),
        }
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    pub fn build<R: Rng>(
        &self,
        label: ClassLabel,
        confidence: f64,
        probabilities: &ProbabilityVector,
        provenance: &Provenance,
        rng: &mut R,
    ) -> AnalysisReport {
        let advisory = advisory_for(label);
        let all_probabilities: BTreeMap<ClassLabel, ProbabilityEntry> = probabilities
            .iter()
            .map(|(label, probability)| {
                (
                    label,
                    ProbabilityEntry {
                        probability,
                        percentage: format_percent(probability),
                    },
                )
            })
            .collect();

        AnalysisReport {
            predicted_class: label,
            confidence,
            confidence_percent: format_percent(confidence),
            status: advisory.status.to_string(),
            emoji: advisory.emoji.to_string(),
            condition: advisory.condition.to_string(),
            recommended_action: advisory.action.to_string(),
            urgency_level: advisory.urgency.to_string(),
            safety_assessment: advisory.safety.to_string(),
            condition_score: advisory.score,
            replacement_timeline: advisory.timeline.to_string(),
            care_tips: advisory.tips.to_string(),
            all_probabilities,
            analysis_id: rng.random_range(ANALYSIS_ID_RANGE),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            model_name: provenance.model_name.clone(),
            model_accuracy: provenance.model_accuracy.clone(),
            fallback_mode: provenance.fallback,
            deployment: self.deployment.clone(),
        }
    }
}
