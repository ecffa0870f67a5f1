//! Model provider: the tract backend and the readiness-checked handle.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tract_onnx::prelude::*;

use crate::errors::{ClassifierError, ClassifierResult};

/// Anything able to turn an input tensor into one raw score per class.
pub trait ScoreModel: Send + Sync {
    fn predict(&self, input: Tensor) -> ClassifierResult<Vec<f32>>;
}

impl<F> ScoreModel for F
where
    F: Fn(Tensor) -> ClassifierResult<Vec<f32>> + Send + Sync,
{
    fn predict(&self, input: Tensor) -> ClassifierResult<Vec<f32>> {
        self(input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Onnx,
    Nnef,
}

impl FromStr for ModelFormat {
    type Err = ClassifierError;
    fn from_str(s: &str) -> ClassifierResult<ModelFormat> {
        match s {
            "onnx" => Ok(ModelFormat::Onnx),
            "nnef" => Ok(ModelFormat::Nnef),
            _ => Err(ClassifierError::config(format!("unknown model format {s:?}"))),
        }
    }
}

impl ModelFormat {
    /// Resolves the file to load and its format, looking into directories
    /// for `graph.nnef` or `model.onnx`.
    pub fn discover(path: &Path) -> Option<(PathBuf, ModelFormat)> {
        let name = path.to_string_lossy();
        if path.is_dir() && path.join("graph.nnef").exists() {
            Some((path.to_path_buf(), ModelFormat::Nnef))
        } else if path.is_dir() && path.join("model.onnx").exists() {
            Some((path.join("model.onnx"), ModelFormat::Onnx))
        } else if path.extension().is_some_and(|ext| ext == "onnx") {
            Some((path.to_path_buf(), ModelFormat::Onnx))
        } else if name.ends_with(".tar") || name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some((path.to_path_buf(), ModelFormat::Nnef))
        } else {
            None
        }
    }
}

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// A model loaded, optimized and planned by tract.
pub struct TractModel {
    path: PathBuf,
    plan: Plan,
}

impl std::fmt::Debug for TractModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractModel").field("path", &self.path).finish()
    }
}

impl TractModel {
    pub fn load(
        path: impl AsRef<Path>,
        format: Option<ModelFormat>,
        input_shape: [usize; 4],
    ) -> ClassifierResult<TractModel> {
        let path = path.as_ref();
        let load_err =
            |source: anyhow::Error| ClassifierError::ModelLoad { path: path.to_path_buf(), source };
        if !path.exists() {
            return Err(load_err(anyhow::anyhow!("model not found")));
        }
        let (path, format) = match (format, ModelFormat::discover(path)) {
            (Some(format), Some((resolved, _))) => (resolved, format),
            (Some(format), None) => (path.to_path_buf(), format),
            (None, Some(found)) => found,
            (None, None) => {
                return Err(load_err(anyhow::anyhow!(
                    "can not guess model format, use an .onnx file or a NNEF directory"
                )));
            }
        };
        info!("Loading {format:?} model from {}", path.display());
        let plan = match format {
            ModelFormat::Onnx => Self::plan_onnx(&path, input_shape),
            ModelFormat::Nnef => Self::plan_nnef(&path),
        }
        .map_err(load_err)?;
        Ok(TractModel { path, plan })
    }

    fn plan_onnx(path: &Path, input_shape: [usize; 4]) -> TractResult<Plan> {
        tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(0, f32::fact(input_shape).into())?
            .into_optimized()?
            .into_runnable()
    }

    fn plan_nnef(path: &Path) -> TractResult<Plan> {
        tract_nnef::nnef().with_tract_core().model_for_path(path)?.into_optimized()?.into_runnable()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScoreModel for TractModel {
    fn predict(&self, input: Tensor) -> ClassifierResult<Vec<f32>> {
        let outputs = self.plan.run(tvec!(input.into())).map_err(ClassifierError::Inference)?;
        let output = outputs
            .first()
            .ok_or_else(|| ClassifierError::Inference(anyhow::anyhow!("model has no output")))?;
        let scores = output.cast_to::<f32>().map_err(ClassifierError::Inference)?;
        let scores = scores.as_slice::<f32>().map_err(ClassifierError::Inference)?;
        trace!("raw output {:?}: {scores:?}", output.shape());
        Ok(scores.to_vec())
    }
}

/// Runs a loader, turning a panic into a failed load.
fn guarded<F>(loader: F) -> ClassifierResult<Arc<dyn ScoreModel>>
where
    F: FnOnce() -> ClassifierResult<Arc<dyn ScoreModel>>,
{
    std::panic::catch_unwind(AssertUnwindSafe(loader)).unwrap_or_else(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown cause".to_string());
        Err(ClassifierError::ModelUnavailable(format!("model loader panicked: {reason}")))
    })
}

/// Observable state of a [`ModelHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Default)]
enum Slot {
    #[default]
    Unloaded,
    Loading,
    Ready(Arc<dyn ScoreModel>),
    Failed(String),
}

impl Slot {
    fn status(&self) -> ModelStatus {
        match self {
            Slot::Unloaded => ModelStatus::Unloaded,
            Slot::Loading => ModelStatus::Loading,
            Slot::Ready(_) => ModelStatus::Ready,
            Slot::Failed(msg) => ModelStatus::Failed(msg.clone()),
        }
    }
}

/// Shared, readiness-checked access to the model.
///
/// The model is written once, when loading completes, and read by every
/// prediction afterwards. Asking for it before that fails fast.
#[derive(Clone, Default)]
pub struct ModelHandle {
    inner: Arc<(Mutex<Slot>, Condvar)>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModelHandle({:?})", self.status())
    }
}

impl ModelHandle {
    pub fn new() -> ModelHandle {
        ModelHandle::default()
    }

    /// A handle already holding `model`.
    pub fn ready(model: Arc<dyn ScoreModel>) -> ModelHandle {
        let handle = ModelHandle::new();
        *handle.slot() = Slot::Ready(model);
        handle
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ModelStatus {
        self.slot().status()
    }

    fn begin_loading(&self) -> ClassifierResult<()> {
        let mut slot = self.slot();
        if matches!(*slot, Slot::Loading | Slot::Ready(_)) {
            return Err(ClassifierError::LoadRefused(slot.status()));
        }
        info!("Loading model...");
        *slot = Slot::Loading;
        Ok(())
    }

    fn finish(&self, result: ClassifierResult<Arc<dyn ScoreModel>>) -> ModelStatus {
        let mut slot = self.slot();
        *slot = match result {
            Ok(model) => {
                info!("Model loaded successfully");
                Slot::Ready(model)
            }
            Err(e) => {
                error!("Error loading the model: {e}");
                Slot::Failed(e.to_string())
            }
        };
        self.inner.1.notify_all();
        slot.status()
    }

    /// Runs `loader` on the calling thread.
    ///
    /// Only refusing to start (a load is running or done) is an error; a
    /// failing loader is logged and leaves the handle `Failed`.
    pub fn load_with<F>(&self, loader: F) -> ClassifierResult<ModelStatus>
    where
        F: FnOnce() -> ClassifierResult<Arc<dyn ScoreModel>>,
    {
        self.begin_loading()?;
        Ok(self.finish(guarded(loader)))
    }

    /// Runs `loader` on a background thread. The handle is `Loading` when
    /// this returns.
    pub fn spawn_load<F>(&self, loader: F) -> ClassifierResult<JoinHandle<ModelStatus>>
    where
        F: FnOnce() -> ClassifierResult<Arc<dyn ScoreModel>> + Send + 'static,
    {
        self.begin_loading()?;
        let handle = self.clone();
        std::thread::Builder::new()
            .name("model-loader".into())
            .spawn(move || handle.finish(guarded(loader)))
            .map_err(ClassifierError::from)
    }

    /// Blocks while a load is in progress, at most `timeout` if given.
    pub fn wait_ready(&self, timeout: Option<Duration>) -> ModelStatus {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let loading = |slot: &mut Slot| matches!(slot, Slot::Loading);
        let guard = match timeout {
            Some(timeout) => {
                cvar.wait_timeout_while(guard, timeout, loading)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            }
            None => cvar.wait_while(guard, loading).unwrap_or_else(PoisonError::into_inner),
        };
        guard.status()
    }

    pub fn model(&self) -> ClassifierResult<Arc<dyn ScoreModel>> {
        match &*self.slot() {
            Slot::Ready(model) => Ok(model.clone()),
            Slot::Failed(msg) => Err(ClassifierError::ModelUnavailable(msg.clone())),
            other => Err(ClassifierError::ModelNotReady(other.status())),
        }
    }
}
