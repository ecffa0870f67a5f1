use crate::config::SoftmaxMode;
use crate::errors::{ClassifierError, ClassifierResult};

/// Probabilities per class, in label table order, and the winning index.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub probabilities: Vec<f32>,
    pub predicted_class: usize,
}

impl Prediction {
    pub fn from_scores(scores: &[f32], mode: SoftmaxMode) -> ClassifierResult<Prediction> {
        let probabilities = softmax(scores, mode)?;
        let predicted_class = argmax(&probabilities).ok_or(ClassifierError::EmptyScores)?;
        Ok(Prediction { probabilities, predicted_class })
    }

    pub fn confidence(&self) -> f32 {
        self.probabilities[self.predicted_class]
    }

    /// `(class, probability)` by decreasing probability. Equal probabilities
    /// keep table order.
    pub fn ranked(&self) -> Vec<(usize, f32)> {
        let mut ranked: Vec<(usize, f32)> = self.probabilities.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// Exponentials are taken in f32, so naive mode overflows past a score of
/// about 88.7. Stable mode shifts scores by their max first.
pub fn softmax(scores: &[f32], mode: SoftmaxMode) -> ClassifierResult<Vec<f32>> {
    if scores.is_empty() {
        return Err(ClassifierError::EmptyScores);
    }
    let shift = match mode {
        SoftmaxMode::Naive => 0f32,
        SoftmaxMode::Stable => scores.iter().copied().fold(f32::NEG_INFINITY, f32::max),
    };
    let exps: Vec<f32> = scores.iter().map(|&x| (x - shift).exp()).collect();
    let sum: f64 = exps.iter().map(|&e| e as f64).sum();
    let probabilities: Vec<f32> = exps.iter().map(|&e| (e as f64 / sum) as f32).collect();
    if probabilities.iter().any(|p| !p.is_finite()) {
        return Err(ClassifierError::NonFiniteProbabilities(scores.to_vec()));
    }
    Ok(probabilities)
}

/// Index of the first maximum, scanning left to right.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (ix, &v) in values.iter().enumerate() {
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((ix, v));
        }
    }
    best.map(|(ix, _)| ix)
}

/// Probability as an integer percentage, rounding halves up.
pub fn percent(probability: f32) -> u32 {
    (probability as f64 * 100.0 + 0.5).floor().clamp(0.0, 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn three_classes() -> ClassifierResult<()> {
        let prediction = Prediction::from_scores(&[1.0, 2.0, 3.0], SoftmaxMode::Naive)?;
        for (got, expected) in prediction.probabilities.iter().zip([0.0900f32, 0.2447, 0.6652]) {
            assert_abs_diff_eq!(*got, expected, epsilon = 1e-4);
        }
        assert_eq!(prediction.predicted_class, 2);
        Ok(())
    }

    #[test]
    fn ties_go_to_first() -> ClassifierResult<()> {
        let prediction = Prediction::from_scores(&[5.0, 5.0, 5.0], SoftmaxMode::Naive)?;
        for p in &prediction.probabilities {
            assert_abs_diff_eq!(*p, 1.0 / 3.0, epsilon = 1e-6);
        }
        assert_eq!(prediction.predicted_class, 0);
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
        Ok(())
    }

    #[test]
    fn naive_overflows_stable_does_not() {
        let scores = [1000.0, 0.0, -1000.0];
        assert!(matches!(
            softmax(&scores, SoftmaxMode::Naive),
            Err(ClassifierError::NonFiniteProbabilities(_))
        ));
        let stable = softmax(&scores, SoftmaxMode::Stable).unwrap();
        assert_abs_diff_eq!(stable[0], 1.0);
        assert_eq!(stable[2], 0.0);
    }

    #[test]
    fn naive_overflows_at_f32_range() {
        let scores = [100.0, 0.0, 0.0];
        assert!(matches!(
            softmax(&scores, SoftmaxMode::Naive),
            Err(ClassifierError::NonFiniteProbabilities(_))
        ));
        let stable = softmax(&scores, SoftmaxMode::Stable).unwrap();
        assert!(stable.iter().all(|p| p.is_finite()));
        assert_eq!(argmax(&stable), Some(0));
        assert!(softmax(&[88.0, 0.0], SoftmaxMode::Naive).is_ok());
    }

    #[test]
    fn modes_agree_on_small_logits() {
        let scores = [0.3, -1.2, 2.5, 0.0, 1.1, -0.7, 0.9];
        let naive = softmax(&scores, SoftmaxMode::Naive).unwrap();
        let stable = softmax(&scores, SoftmaxMode::Stable).unwrap();
        for (a, b) in naive.iter().zip(&stable) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn nan_scores_are_reported() {
        assert!(softmax(&[0.0, f32::NAN], SoftmaxMode::Stable).is_err());
        assert!(matches!(softmax(&[], SoftmaxMode::Naive), Err(ClassifierError::EmptyScores)));
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(0.0), 0);
        assert_eq!(percent(0.004), 0);
        assert_eq!(percent(0.125), 13);
        assert_eq!(percent(0.6652), 67);
        assert_eq!(percent(1.0), 100);
    }

    #[test]
    fn ranking() -> ClassifierResult<()> {
        let prediction = Prediction::from_scores(&[1.0, 3.0, 1.0, 2.0], SoftmaxMode::Naive)?;
        let order: Vec<usize> = prediction.ranked().iter().map(|r| r.0).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
        assert_eq!(prediction.confidence(), prediction.probabilities[1]);
        Ok(())
    }

    proptest! {
        #[test]
        fn softmax_is_a_distribution(scores in proptest::collection::vec(-30f32..30f32, 1..12)) {
            for mode in [SoftmaxMode::Naive, SoftmaxMode::Stable] {
                let prediction = Prediction::from_scores(&scores, mode).unwrap();
                prop_assert_eq!(prediction.probabilities.len(), scores.len());
                prop_assert!(prediction.probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
                let sum: f64 = prediction.probabilities.iter().map(|&p| p as f64).sum();
                prop_assert!((sum - 1.0).abs() < 1e-6);
                prop_assert!(prediction.predicted_class < scores.len());
                let max = prediction.probabilities.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let first = prediction.probabilities.iter().position(|&p| p == max).unwrap();
                prop_assert_eq!(prediction.predicted_class, first);
            }
        }
    }
}
