use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use super::model::Classifier;
use crate::config::ModelCandidate;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Artifact not found: {0}")]
    Missing(PathBuf),
    #[error("Model runtime not compiled into this build")]
    RuntimeUnavailable,
    #[error("Failed to load artifact: {0}")]
    Runtime(String),
}

/// Turns an artifact on disk into a ready classifier.
pub trait ArtifactLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, LoadError>;
}

/// Loads TorchScript artifacts when built with the `torch` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct TorchScriptLoader;

impl ArtifactLoader for TorchScriptLoader {
    #[cfg(feature = "torch")]
    fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
        let classifier = super::model::TorchClassifier::load(path)
            .map_err(|e| LoadError::Runtime(e.to_string()))?;
        Ok(Arc::new(classifier))
    }

    #[cfg(not(feature = "torch"))]
    fn load(&self, _path: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
        Err(LoadError::RuntimeUnavailable)
    }
}

pub struct ModelHandle {
    pub classifier: Arc<dyn Classifier>,
    pub source: ModelCandidate,
    pub loaded_at: DateTime<Utc>,
}

impl ModelHandle {
    pub fn file_name(&self) -> String {
        self.source
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.file.display().to_string())
    }
}

/// Owns the process-wide classifier. The first call to [`resolve`] walks the
/// candidate list; concurrent first callers block on that single load and
/// share its outcome, including "no model".
///
/// [`resolve`]: ModelResolver::resolve
pub struct ModelResolver {
    candidates: Vec<ModelCandidate>,
    loader: Box<dyn ArtifactLoader>,
    handle: OnceLock<Option<Arc<ModelHandle>>>,
}

impl ModelResolver {
    pub fn new(candidates: Vec<ModelCandidate>, loader: Box<dyn ArtifactLoader>) -> Self {
        Self {
            candidates,
            loader,
            handle: OnceLock::new(),
        }
    }

    pub fn resolve(&self) -> Option<Arc<ModelHandle>> {
        self.handle.get_or_init(|| self.load_first()).clone()
    }

    /// The handle if resolution already ran and succeeded. Never loads.
    pub fn loaded(&self) -> Option<Arc<ModelHandle>> {
        self.handle.get().cloned().flatten()
    }

    fn load_first(&self) -> Option<Arc<ModelHandle>> {
        for candidate in &self.candidates {
            match self.try_load(&candidate.file) {
                Ok(classifier) => {
                    let handle = ModelHandle {
                        classifier,
                        source: candidate.clone(),
                        loaded_at: Utc::now(),
                    };
                    log::info!(
                        "Model loaded from {} ({}) at {}",
                        candidate.file.display(),
                        candidate.name,
                        handle.loaded_at.to_rfc3339()
                    );
                    return Some(Arc::new(handle));
                }
                Err(e) => {
                    log::warn!("Skipping model candidate {}: {}", candidate.file.display(), e);
                }
            }
        }
        log::error!(
            "No loadable model among {} candidates, serving fallback analyses",
            self.candidates.len()
        );
        None
    }

    fn try_load(&self, path: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
        if !path.is_file() {
            return Err(LoadError::Missing(path.to_path_buf()));
        }
        panic::catch_unwind(AssertUnwindSafe(|| self.loader.load(path)))
            .unwrap_or_else(|_| Err(LoadError::Runtime("loader panicked".into())))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::inference::model::tests::StubClassifier;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Loads every existing path unless its file name is listed as broken.
    pub(crate) struct StubLoader {
        pub outputs: Vec<f32>,
        pub broken: Vec<&'static str>,
        pub calls: AtomicUsize,
    }

    impl StubLoader {
        pub(crate) fn new(outputs: Vec<f32>) -> Self {
            Self {
                outputs,
                broken: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ArtifactLoader for StubLoader {
        fn load(&self, path: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if self.broken.iter().any(|broken| *broken == name) {
                return Err(LoadError::Runtime(format!("corrupt artifact {}", name)));
            }
            Ok(Arc::new(StubClassifier(self.outputs.clone())))
        }
    }

    pub(crate) fn candidates(dir: &Path) -> Vec<ModelCandidate> {
        vec![
            ModelCandidate::new(dir.join("primary.pt"), "Primary", "71.02%"),
            ModelCandidate::new(dir.join("fallback_1.pt"), "Fallback 1", "40.34%"),
            ModelCandidate::new(dir.join("fallback_2.pt"), "Fallback 2", "44.89%"),
        ]
    }

    fn touch(dir: &TempDir, names: &[&str]) {
        for name in names {
            fs::write(dir.path().join(name), b"artifact").unwrap();
        }
    }

    fn resolved_name(dir: &TempDir) -> Option<String> {
        let resolver = ModelResolver::new(
            candidates(dir.path()),
            Box::new(StubLoader::new(vec![0.25; 4])),
        );
        resolver.resolve().map(|h| h.source.name.clone())
    }

    #[test]
    fn prefers_primary_then_fallbacks_in_order() {
        let dir = TempDir::new().unwrap();
        touch(&dir, &["primary.pt", "fallback_1.pt", "fallback_2.pt"]);
        assert_eq!(resolved_name(&dir).as_deref(), Some("Primary"));

        fs::remove_file(dir.path().join("primary.pt")).unwrap();
        assert_eq!(resolved_name(&dir).as_deref(), Some("Fallback 1"));

        fs::remove_file(dir.path().join("fallback_1.pt")).unwrap();
        assert_eq!(resolved_name(&dir).as_deref(), Some("Fallback 2"));

        fs::remove_file(dir.path().join("fallback_2.pt")).unwrap();
        assert_eq!(resolved_name(&dir), None);
    }

    #[test]
    fn load_failures_fall_through_to_next_candidate() {
        let dir = TempDir::new().unwrap();
        touch(&dir, &["primary.pt", "fallback_1.pt"]);
        let mut loader = StubLoader::new(vec![0.25; 4]);
        loader.broken = vec!["primary.pt"];
        let resolver = ModelResolver::new(candidates(dir.path()), Box::new(loader));
        let before = Utc::now();
        let handle = resolver.resolve().unwrap();
        assert!(handle.loaded_at >= before && handle.loaded_at <= Utc::now());
        assert_eq!(handle.source.name, "Fallback 1");
        assert_eq!(handle.file_name(), "fallback_1.pt");
    }

    #[test]
    fn panicking_loader_is_treated_as_failed_load() {
        struct PanickingLoader;
        impl ArtifactLoader for PanickingLoader {
            fn load(&self, _path: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
                panic!("native library blew up")
            }
        }

        let dir = TempDir::new().unwrap();
        touch(&dir, &["primary.pt"]);
        let resolver = ModelResolver::new(candidates(dir.path()), Box::new(PanickingLoader));
        assert!(resolver.resolve().is_none());
    }

    #[test]
    fn resolution_is_memoized_including_absence() {
        let dir = TempDir::new().unwrap();
        let resolver = ModelResolver::new(
            candidates(dir.path()),
            Box::new(StubLoader::new(vec![0.25; 4])),
        );
        assert!(resolver.loaded().is_none());
        assert!(resolver.resolve().is_none());

        touch(&dir, &["primary.pt"]);
        assert!(resolver.resolve().is_none());
    }

    #[test]
    fn concurrent_first_callers_share_one_load() {
        struct SlowLoader {
            calls: Arc<AtomicUsize>,
        }
        impl ArtifactLoader for SlowLoader {
            fn load(&self, _path: &Path) -> Result<Arc<dyn Classifier>, LoadError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                Ok(Arc::new(StubClassifier(vec![0.25; 4])))
            }
        }

        let dir = TempDir::new().unwrap();
        touch(&dir, &["primary.pt"]);
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = ModelResolver::new(
            candidates(dir.path()),
            Box::new(SlowLoader {
                calls: calls.clone(),
            }),
        );

        let handles: Vec<Arc<ModelHandle>> = thread::scope(|s| {
            let workers: Vec<_> = (0..8).map(|_| s.spawn(|| resolver.resolve())).collect();
            workers
                .into_iter()
                .map(|w| w.join().unwrap().unwrap())
                .collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert!(resolver.loaded().is_some());
    }

    #[cfg(not(feature = "torch"))]
    #[test]
    fn torchscript_loader_reports_missing_runtime() {
        let dir = TempDir::new().unwrap();
        touch(&dir, &["primary.pt"]);
        let resolver = ModelResolver::new(candidates(dir.path()), Box::new(TorchScriptLoader));
        assert!(resolver.resolve().is_none());
    }
}
