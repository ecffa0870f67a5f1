//! # veggie-classifier
//!
//! Classifies one vegetable photo at a time with a pre-trained image model.
//!
//! An [`upload::Upload`] goes through the format gate and is decoded. The
//! [`normalizer`] then canonicalizes it to RGB8, and the [`preprocess`] step
//! builds a `1x3x128x128` NCHW tensor with ImageNet normalization. The model
//! is run by tract behind a readiness-checked [`model::ModelHandle`], and the
//! raw scores are turned into a [`postprocess::Prediction`] by softmax and
//! argmax. A [`session::Session`] ties all of it to a [`render::Render`]
//! implementation, with last-upload-wins semantics.
//!
//! ```no_run
//! use std::sync::Arc;
//! use veggie_classifier::prelude::*;
//!
//! # fn main() -> ClassifierResult<()> {
//! let config = ClassifierConfig::default();
//! let handle = ModelHandle::new();
//! handle.load_with(|| {
//!     let model = TractModel::load("assets/model.onnx", None, [1, 3, 128, 128])?;
//!     Ok(Arc::new(model) as Arc<dyn ScoreModel>)
//! })?;
//! let session = Session::new(Classifier::new(&config, handle)?, TerminalRenderer::new(std::io::stdout()));
//! session.submit(&Upload::from_path("carrot.jpg")?)?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod config;
pub mod errors;
pub mod labels;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod render;
pub mod request;
pub mod session;
pub mod upload;

pub mod prelude {
    pub use crate::config::{ClassifierConfig, SoftmaxMode};
    pub use crate::errors::{ClassifierError, ClassifierResult};
    pub use crate::labels::ClassLabels;
    pub use crate::model::{ModelFormat, ModelHandle, ModelStatus, ScoreModel, TractModel};
    pub use crate::normalizer::{CanonicalImage, canonicalize};
    pub use crate::pipeline::Classifier;
    pub use crate::postprocess::Prediction;
    pub use crate::preprocess::Preprocessor;
    pub use crate::render::{JsonRenderer, Render, TerminalRenderer};
    pub use crate::session::{Outcome, Session};
    pub use crate::upload::{SupportedFormat, Upload};
}
