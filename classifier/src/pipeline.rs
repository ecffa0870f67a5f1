use crate::config::{ClassifierConfig, SoftmaxMode};
use crate::errors::{ClassifierError, ClassifierResult};
use crate::labels::ClassLabels;
use crate::model::ModelHandle;
use crate::normalizer::CanonicalImage;
use crate::postprocess::Prediction;
use crate::preprocess::Preprocessor;

/// Preprocessing, inference and postprocessing for one canonical image.
#[derive(Debug, Clone)]
pub struct Classifier {
    labels: ClassLabels,
    preprocessor: Preprocessor,
    softmax: SoftmaxMode,
    handle: ModelHandle,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig, handle: ModelHandle) -> ClassifierResult<Classifier> {
        config.validate()?;
        Ok(Classifier {
            labels: config.class_labels()?,
            preprocessor: Preprocessor::new(config),
            softmax: config.softmax,
            handle,
        })
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    pub fn predict(&self, image: &CanonicalImage) -> ClassifierResult<Prediction> {
        let input = self.preprocessor.to_tensor(image)?;
        let model = self.handle.model()?;
        let scores = model.predict(input)?;
        self.postprocess(&scores)
    }

    /// Turns raw scores into a prediction, checking them against the label
    /// table first.
    pub fn postprocess(&self, scores: &[f32]) -> ClassifierResult<Prediction> {
        if scores.len() != self.labels.len() {
            return Err(ClassifierError::ClassCountMismatch {
                expected: self.labels.len(),
                got: scores.len(),
            });
        }
        let prediction = Prediction::from_scores(scores, self.softmax)?;
        debug!("Probabilities: {:?}", prediction.probabilities);
        debug!(
            "Predicted class index: {} ({})",
            prediction.predicted_class, &self.labels[prediction.predicted_class]
        );
        Ok(prediction)
    }
}
