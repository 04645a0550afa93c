use crate::features::FeatureVector;

/// Verdict returned by a classifier for a single feature row.
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict {
    Normal,
    Anomaly,
}

/// The model boundary (§9 design note): a single-method interface so the
/// concrete classifier implementation (whatever serialization format the
/// offline training pipeline produces) stays swappable without touching the
/// pipeline. No serialized model artifact ships with this crate, so
/// `ThresholdClassifier` below is the reference implementation — it
/// reproduces the documented §8.6 behavior (reject once request frequency
/// within the window crosses a threshold) without pretending to load a
/// model file that does not exist in this repository.
pub trait Classifier: Send + Sync {
    fn classify(&self, features: &FeatureVector) -> Verdict;
}

/// Anomaly scorer reference implementation: flags a request as anomalous
/// once its IP's request frequency within the sliding window reaches
/// `frequency_threshold`. A production deployment swaps this for a
/// `Classifier` impl wrapping a deserialized trained model; the pipeline
/// code does not change.
pub struct ThresholdClassifier {
    frequency_threshold: u32,
}

impl ThresholdClassifier {
    pub fn new(frequency_threshold: u32) -> Self {
        Self { frequency_threshold }
    }
}

impl Classifier for ThresholdClassifier {
    fn classify(&self, features: &FeatureVector) -> Verdict {
        if features.request_frequency >= self.frequency_threshold {
            Verdict::Anomaly
        } else {
            Verdict::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(request_frequency: u32) -> FeatureVector {
        FeatureVector {
            request_frequency,
            error_rate: 0.0,
            unique_paths_accessed: 0,
            is_empty_user_agent: false,
            user_agent_length: 0,
            request_body_size: 0,
            is_json_content_type: false,
            num_headers: 0,
        }
    }

    #[test]
    fn test_below_threshold_is_normal() {
        let c = ThresholdClassifier::new(100);
        assert_eq!(c.classify(&fv(99)), Verdict::Normal);
    }

    #[test]
    fn test_at_or_above_threshold_is_anomaly() {
        let c = ThresholdClassifier::new(100);
        assert_eq!(c.classify(&fv(100)), Verdict::Anomaly);
        assert_eq!(c.classify(&fv(1000)), Verdict::Anomaly);
    }
}
