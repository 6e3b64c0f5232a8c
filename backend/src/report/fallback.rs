use rand::Rng;
use shared::{AnalysisReport, ClassLabel};
use std::ops::Range;

use super::builder::{Provenance, ReportBuilder};
use crate::inference::ProbabilityVector;

pub const FALLBACK_CONFIDENCE: Range<f64> = 0.85..0.99;

struct DemoCase {
    label: ClassLabel,
    // ClassLabel::ALL order
    probabilities: [f64; 4],
}

const CATALOG: [DemoCase; 4] = [
    DemoCase {
        label: ClassLabel::New,
        probabilities: [0.92, 0.05, 0.02, 0.01],
    },
    DemoCase {
        label: ClassLabel::Minor,
        probabilities: [0.05, 0.78, 0.15, 0.02],
    },
    DemoCase {
        label: ClassLabel::Moderate,
        probabilities: [0.14, 0.12, 0.72, 0.02],
    },
    DemoCase {
        label: ClassLabel::Severe,
        probabilities: [0.15, 0.05, 0.08, 0.72],
    },
];

/// Produces demo reports with the same shape as real ones when no model can
/// answer. Only the provenance fields give it away.
#[derive(Debug, Clone)]
pub struct FallbackSimulator {
    builder: ReportBuilder,
}

impl FallbackSimulator {
    pub fn new(builder: ReportBuilder) -> Self {
        Self { builder }
    }

    pub fn generate<R: Rng>(&self, rng: &mut R) -> AnalysisReport {
        let case = &CATALOG[rng.random_range(0..CATALOG.len())];
        let confidence = rng.random_range(FALLBACK_CONFIDENCE);
        let probabilities = rescale(case, confidence);
        self.builder.build(
            case.label,
            confidence,
            &probabilities,
            &Provenance::fallback(),
            rng,
        )
    }
}

/// Pins the predicted label to `confidence` and shares the rest of the mass
/// among the other labels in the catalog's proportions.
fn rescale(case: &DemoCase, confidence: f64) -> ProbabilityVector {
    let predicted = case.label.index();
    let others: f64 = 1.0 - case.probabilities[predicted];
    let scale = (1.0 - confidence) / others;
    let mut values = case.probabilities.map(|p| p * scale);
    values[predicted] = confidence;
    ProbabilityVector::new(values)
}
