use chrono::{SecondsFormat, Utc};
use rand::Rng;
use shared::{AnalysisReport, AnalyzeRequest, ClassLabel, HealthResponse};

use crate::config::AnalyzerConfig;
use crate::inference::{
    ArtifactLoader, DecodeError, ImageDecoder, InferenceEngine, InferenceError, ModelResolver,
    ProbabilityVector, TorchScriptLoader,
};
use crate::report::{FallbackSimulator, Provenance, ReportBuilder};

pub const SERVICE_NAME: &str = "Cookware Damage Analyzer API";

/// Errors a caller can see. Everything that goes wrong between decoding and
/// inference is absorbed by the fallback simulator instead.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, thiserror::Error)]
enum PipelineError {
    #[error("image decoding failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("no model available")]
    ModelUnavailable,
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

struct Prediction {
    label: ClassLabel,
    confidence: f64,
    probabilities: ProbabilityVector,
    provenance: Provenance,
}

pub struct Analyzer {
    decoder: ImageDecoder,
    resolver: ModelResolver,
    engine: InferenceEngine,
    builder: ReportBuilder,
    fallback: FallbackSimulator,
}

impl Analyzer {
    pub fn new(config: &AnalyzerConfig, loader: Box<dyn ArtifactLoader>) -> Self {
        let builder = ReportBuilder::new(config.deployment.clone());
        Self {
            decoder: ImageDecoder::new(config.max_image_bytes),
            resolver: ModelResolver::new(config.resolved_candidates(), loader),
            engine: InferenceEngine::new(config.label_order_array()),
            fallback: FallbackSimulator::new(builder.clone()),
            builder,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config, Box::new(TorchScriptLoader))
    }

    /// Largest request body worth reading: the image cap after base64
    /// inflation, plus room for the JSON envelope.
    pub fn max_body_bytes(&self) -> usize {
        self.decoder.max_image_bytes().saturating_mul(2)
    }

    /// Resolves the model up front. Returns whether a real model is ready.
    pub fn warm_up(&self) -> bool {
        self.resolver.resolve().is_some()
    }

    pub fn parse_request(body: &[u8]) -> Result<AnalyzeRequest, ApiError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|_| ApiError::Validation("Invalid JSON data".to_string()))?;
        let image = value
            .get("image")
            .ok_or_else(|| ApiError::Validation("No image data provided".to_string()))?;
        let image = image
            .as_str()
            .ok_or_else(|| ApiError::Validation("Image data must be a string".to_string()))?;
        Ok(AnalyzeRequest {
            image: image.to_string(),
        })
    }

    pub fn handle(&self, body: &[u8]) -> Result<AnalysisReport, ApiError> {
        let request = Self::parse_request(body)?;
        Ok(self.analyze(&request.image))
    }

    pub fn analyze(&self, image: &str) -> AnalysisReport {
        self.analyze_with_rng(image, &mut rand::rng())
    }

    pub fn analyze_with_rng<R: Rng>(&self, image: &str, rng: &mut R) -> AnalysisReport {
        match self.run_model(image) {
            Ok(prediction) => {
                log::debug!(
                    "Built report for {} ({:.3}) from {}",
                    prediction.label,
                    prediction.confidence,
                    prediction.provenance.model_name
                );
                self.builder.build(
                    prediction.label,
                    prediction.confidence,
                    &prediction.probabilities,
                    &prediction.provenance,
                    rng,
                )
            }
            Err(e) => {
                log::warn!("Serving fallback analysis: {}", e);
                self.fallback.generate(rng)
            }
        }
    }

    fn run_model(&self, image: &str) -> Result<Prediction, PipelineError> {
        log::debug!("Decoding image payload ({} chars)", image.len());
        let tensor = self.decoder.decode(image)?;

        let handle = self.resolver.resolve().ok_or(PipelineError::ModelUnavailable)?;

        log::debug!("Running inference with {}", handle.source.name);
        let probabilities = self.engine.predict(handle.classifier.as_ref(), &tensor)?;
        let (label, confidence) = probabilities.argmax();

        Ok(Prediction {
            label,
            confidence,
            probabilities,
            provenance: Provenance::from_handle(&handle),
        })
    }

    pub fn health(&self) -> HealthResponse {
        let handle = self.resolver.loaded();
        HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            service: SERVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model_loaded: handle.is_some(),
            model_status: if handle.is_some() { "loaded" } else { "not_loaded" }.to_string(),
            model_info: handle
                .map(|h| h.file_name())
                .unwrap_or_else(|| "none".to_string()),
            deployment: self.builder.deployment().to_string(),
        }
    }
}
