use std::sync::{Mutex, PoisonError};

use crate::errors::ClassifierResult;
use crate::normalizer::canonicalize;
use crate::pipeline::Classifier;
use crate::postprocess::Prediction;
use crate::render::Render;
use crate::request::{RequestSlot, RequestTicket};
use crate::upload::Upload;

/// What happened to an accepted upload.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The outcome was handed to the renderer. `None` is a failed prediction.
    Rendered(Option<Prediction>),
    /// A newer upload started meanwhile, this result was dropped.
    Superseded,
}

/// Ties the upload gate, the classifier and a renderer together.
pub struct Session<R: Render> {
    classifier: Classifier,
    requests: RequestSlot,
    renderer: Mutex<R>,
}

impl<R: Render> Session<R> {
    pub fn new(classifier: Classifier, renderer: R) -> Session<R> {
        Session { classifier, requests: RequestSlot::new(), renderer: Mutex::new(renderer) }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn into_renderer(self) -> R {
        self.renderer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Classifies an upload and renders the outcome if still relevant.
    ///
    /// An unsupported declared type is the only error: it is returned before
    /// any work starts. Every later failure is logged and rendered as `None`.
    pub fn submit(&self, upload: &Upload) -> ClassifierResult<Outcome> {
        upload.format()?;
        let ticket = self.requests.begin();
        debug!("request #{} for {}", ticket.generation(), upload.name);
        let prediction = match self.run(upload) {
            Ok(prediction) => Some(prediction),
            Err(e) => {
                error!("Error during prediction of {}: {e}", upload.name);
                None
            }
        };
        self.publish(&ticket, prediction)
    }

    fn run(&self, upload: &Upload) -> ClassifierResult<Prediction> {
        let image = upload.decode()?;
        let canonical = canonicalize(&image);
        self.classifier.predict(&canonical)
    }

    fn publish(&self, ticket: &RequestTicket, prediction: Option<Prediction>) -> ClassifierResult<Outcome> {
        let mut renderer = self.renderer.lock().unwrap_or_else(PoisonError::into_inner);
        if !ticket.is_current() {
            info!("request #{} superseded, result dropped", ticket.generation());
            return Ok(Outcome::Superseded);
        }
        renderer.render(self.classifier.labels(), prediction.as_ref())?;
        Ok(Outcome::Rendered(prediction))
    }
}
