use std::path::PathBuf;

use crate::model::ModelStatus;

/// Errors raised along the classification path.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("failed to load model from {path:?}: {source:#}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("model is not ready (status: {0:?})")]
    ModelNotReady(ModelStatus),

    #[error("model load refused, handle is {0:?}")]
    LoadRefused(ModelStatus),

    #[error("model is unavailable: {0}")]
    ModelUnavailable(String),

    #[error("unsupported image format {mime:?}, expected image/jpeg or image/png")]
    UnsupportedFormat { mime: String },

    #[error("could not decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("tensor construction failed: {0}")]
    Tensor(String),

    #[error("inference failed: {0:#}")]
    Inference(#[source] anyhow::Error),

    #[error("model produced {got} scores for {expected} classes")]
    ClassCountMismatch { expected: usize, got: usize },

    #[error("model produced no scores")]
    EmptyScores,

    #[error("softmax produced non finite probabilities from scores {0:?}")]
    NonFiniteProbabilities(Vec<f32>),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ClassifierResult<T> = Result<T, ClassifierError>;

impl ClassifierError {
    pub fn config(message: impl Into<String>) -> ClassifierError {
        ClassifierError::Config(message.into())
    }
}
