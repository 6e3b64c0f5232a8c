pub mod model;
pub mod preprocess;
pub mod resolver;

pub use model::{Classifier, InferenceEngine, InferenceError, ProbabilityVector};
pub use preprocess::{DecodeError, ImageDecoder, NormalizedTensor};
pub use resolver::{ArtifactLoader, LoadError, ModelHandle, ModelResolver, TorchScriptLoader};
