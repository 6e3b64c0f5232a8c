use shared::ClassLabel;
use std::panic::{self, AssertUnwindSafe};

use super::preprocess::{INPUT_SHAPE, NormalizedTensor};

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Input tensor shape {actual:?} does not match expected {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("Model produced {0} outputs, expected 4")]
    OutputArity(usize),
    #[error("Model produced non-finite outputs")]
    NonFinite,
    #[error("Forward pass failed: {0}")]
    Runtime(String),
}

/// A loaded classifier that maps one normalized image to one raw score per
/// output index.
pub trait Classifier: Send + Sync {
    fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, InferenceError>;
}

/// Class probabilities stored in [`ClassLabel::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityVector([f64; 4]);

impl ProbabilityVector {
    pub fn new(values: [f64; 4]) -> Self {
        Self(values)
    }

    /// Re-keys raw model outputs whose index `i` means `order[i]`.
    pub fn from_model_output(raw: &[f64; 4], order: &[ClassLabel; 4]) -> Self {
        let mut values = [0.0; 4];
        for (value, label) in raw.iter().zip(order) {
            values[label.index()] = *value;
        }
        Self(values)
    }

    pub fn get(&self, label: ClassLabel) -> f64 {
        self.0[label.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassLabel, f64)> + '_ {
        ClassLabel::ALL.iter().map(move |label| (*label, self.get(*label)))
    }

    /// Highest-probability label; ties go to the earlier label in
    /// [`ClassLabel::ALL`].
    pub fn argmax(&self) -> (ClassLabel, f64) {
        let mut best = (ClassLabel::ALL[0], self.0[0]);
        for (label, value) in self.iter().skip(1) {
            if value > best.1 {
                best = (label, value);
            }
        }
        best
    }
}

#[derive(Debug, Clone)]
pub struct InferenceEngine {
    label_order: [ClassLabel; 4],
}

impl InferenceEngine {
    pub fn new(label_order: [ClassLabel; 4]) -> Self {
        Self { label_order }
    }

    pub fn predict(
        &self,
        classifier: &dyn Classifier,
        tensor: &NormalizedTensor,
    ) -> Result<ProbabilityVector, InferenceError> {
        if tensor.shape() != INPUT_SHAPE {
            return Err(InferenceError::ShapeMismatch {
                expected: INPUT_SHAPE.to_vec(),
                actual: tensor.shape().to_vec(),
            });
        }

        let output = panic::catch_unwind(AssertUnwindSafe(|| classifier.forward(tensor)))
            .unwrap_or_else(|_| Err(InferenceError::Runtime("forward pass panicked".into())))?;
        let raw: [f32; 4] = output
            .as_slice()
            .try_into()
            .map_err(|_| InferenceError::OutputArity(output.len()))?;
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite);
        }

        let probabilities = to_distribution(raw.map(f64::from));
        Ok(ProbabilityVector::from_model_output(&probabilities, &self.label_order))
    }
}

/// Passes softmax outputs through untouched and normalizes raw logits.
fn to_distribution(raw: [f64; 4]) -> [f64; 4] {
    let sum: f64 = raw.iter().sum();
    if raw.iter().all(|v| *v >= 0.0) && (sum - 1.0).abs() < 1e-3 {
        return raw;
    }
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = raw.map(|v| (v - max).exp());
    let total: f64 = exps.iter().sum();
    exps.map(|v| v / total)
}

#[cfg(feature = "torch")]
pub use torch::TorchClassifier;

#[cfg(feature = "torch")]
mod torch {
    use std::path::Path;
    use std::sync::Mutex;
    use tch::{CModule, Device, Kind, Tensor};

    use super::{Classifier, InferenceError};
    use crate::inference::preprocess::{INPUT_SHAPE, NormalizedTensor};

    /// TorchScript module. Forward passes are serialised through the mutex
    /// since the module is not assumed to be reentrant.
    pub struct TorchClassifier {
        module: Mutex<CModule>,
        device: Device,
    }

    impl TorchClassifier {
        pub fn load(path: &Path) -> Result<Self, tch::TchError> {
            let device = Device::cuda_if_available();
            let module = CModule::load_on_device(path, device)?;
            Ok(Self {
                module: Mutex::new(module),
                device,
            })
        }
    }

    impl Classifier for TorchClassifier {
        fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, InferenceError> {
            let data = input
                .as_slice()
                .ok_or_else(|| InferenceError::Runtime("input tensor is not contiguous".into()))?;
            let runtime = |e: tch::TchError| InferenceError::Runtime(e.to_string());
            let tensor = Tensor::from_slice(data)
                .f_view(INPUT_SHAPE.map(|d| d as i64))
                .and_then(|t| t.f_to_device(self.device))
                .map_err(runtime)?;

            let output = {
                let module = self
                    .module
                    .lock()
                    .map_err(|_| InferenceError::Runtime("model lock poisoned".into()))?;
                module.forward_ts(&[tensor]).map_err(runtime)?
            };

            let output_flat = output
                .f_to_kind(Kind::Float)
                .and_then(|t| t.f_reshape([-1]))
                .map_err(runtime)?;
            Vec::<f32>::try_from(&output_flat).map_err(|e| InferenceError::Runtime(e.to_string()))
        }
    }
}
