//! Process-wide model cache
//!
//! Each model is loaded at most once, on first use, and then shared
//! read-only by every request. A failed load is not cached: the next caller
//! retries.
//!
//! Pose estimation is optional. Its availability is resolved once when the
//! cache is built and never re-probed.

use crate::error::AnalyzerError;
use crate::models::{EmotionClassifier, EyeDetector, FaceDetector, PoseEstimator, SpeechModel};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Loader closure for one model
pub type ModelLoader<T> = Box<dyn Fn() -> anyhow::Result<Arc<T>> + Send + Sync>;

/// One lazily loaded, shared model
struct LazyModel<T: ?Sized> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
    loader: Option<ModelLoader<T>>,
}

impl<T: ?Sized> LazyModel<T> {
    fn new(name: &'static str, loader: Option<ModelLoader<T>>) -> Self {
        Self {
            name,
            cell: OnceCell::new(),
            loader,
        }
    }

    /// Get the model, loading it on first call
    ///
    /// Concurrent first callers block until the single load finishes.
    fn get(&self) -> Result<Arc<T>, AnalyzerError> {
        if let Some(model) = self.cell.get() {
            return Ok(Arc::clone(model));
        }

        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| AnalyzerError::ModelUnavailable(format!("{}: no loader configured", self.name)))?;

        self.cell
            .get_or_try_init(|| {
                let start = Instant::now();
                let model = loader()?;
                info!(
                    model = self.name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Model loaded"
                );
                Ok::<_, anyhow::Error>(model)
            })
            .map(Arc::clone)
            .map_err(|e| AnalyzerError::ModelUnavailable(format!("{}: {:#}", self.name, e)))
    }

    fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Shared, lazily initialised collaborator models
pub struct ModelCache {
    speech: LazyModel<dyn SpeechModel>,
    face: LazyModel<dyn FaceDetector>,
    eyes: LazyModel<dyn EyeDetector>,
    emotion: LazyModel<dyn EmotionClassifier>,
    pose: Option<Arc<dyn PoseEstimator>>,
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("speech_loaded", &self.speech.is_loaded())
            .field("face_loaded", &self.face.is_loaded())
            .field("eyes_loaded", &self.eyes.is_loaded())
            .field("emotion_loaded", &self.emotion.is_loaded())
            .field("pose_available", &self.pose.is_some())
            .finish()
    }
}

impl ModelCache {
    /// Start configuring a cache
    pub fn builder() -> ModelCacheBuilder {
        ModelCacheBuilder::default()
    }

    /// Speech recognition model
    pub fn speech_model(&self) -> Result<Arc<dyn SpeechModel>, AnalyzerError> {
        self.speech.get()
    }

    /// Face detector
    pub fn face_detector(&self) -> Result<Arc<dyn FaceDetector>, AnalyzerError> {
        self.face.get()
    }

    /// Eye detector
    pub fn eye_detector(&self) -> Result<Arc<dyn EyeDetector>, AnalyzerError> {
        self.eyes.get()
    }

    /// Emotion classifier, if one is configured and loads
    ///
    /// Smile scoring falls back to neutral without it.
    pub fn emotion_classifier(&self) -> Option<Arc<dyn EmotionClassifier>> {
        if self.emotion.loader.is_none() {
            return None;
        }
        match self.emotion.get() {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(error = %e, "Emotion classifier unavailable");
                None
            }
        }
    }

    /// Pose estimator, `None` when the capability is unavailable
    pub fn pose_model(&self) -> Option<Arc<dyn PoseEstimator>> {
        self.pose.clone()
    }

    /// Whether pose estimation is available for this process
    pub fn pose_available(&self) -> bool {
        self.pose.is_some()
    }
}

/// Builder for `ModelCache`
#[derive(Default)]
pub struct ModelCacheBuilder {
    speech: Option<ModelLoader<dyn SpeechModel>>,
    face: Option<ModelLoader<dyn FaceDetector>>,
    eyes: Option<ModelLoader<dyn EyeDetector>>,
    emotion: Option<ModelLoader<dyn EmotionClassifier>>,
    pose: Option<ModelLoader<dyn PoseEstimator>>,
}

impl ModelCacheBuilder {
    pub fn speech_model<F>(mut self, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn SpeechModel>> + Send + Sync + 'static,
    {
        self.speech = Some(Box::new(loader));
        self
    }

    pub fn face_detector<F>(mut self, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn FaceDetector>> + Send + Sync + 'static,
    {
        self.face = Some(Box::new(loader));
        self
    }

    pub fn eye_detector<F>(mut self, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn EyeDetector>> + Send + Sync + 'static,
    {
        self.eyes = Some(Box::new(loader));
        self
    }

    pub fn emotion_classifier<F>(mut self, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn EmotionClassifier>> + Send + Sync + 'static,
    {
        self.emotion = Some(Box::new(loader));
        self
    }

    /// Optional pose capability; probed once in `build()`
    pub fn pose_model<F>(mut self, loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Arc<dyn PoseEstimator>> + Send + Sync + 'static,
    {
        self.pose = Some(Box::new(loader));
        self
    }

    /// Build the cache, resolving pose availability
    pub fn build(self) -> ModelCache {
        let pose = match self.pose {
            Some(loader) => match loader() {
                Ok(model) => {
                    info!("Pose estimation available");
                    Some(model)
                }
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "Pose estimation unavailable, body analysis will use neutral defaults");
                    None
                }
            },
            None => {
                info!("No pose model configured, body analysis will use neutral defaults");
                None
            }
        };

        ModelCache {
            speech: LazyModel::new("speech", self.speech),
            face: LazyModel::new("face_detector", self.face),
            eyes: LazyModel::new("eye_detector", self.eyes),
            emotion: LazyModel::new("emotion_classifier", self.emotion),
            pose,
        }
    }
}
