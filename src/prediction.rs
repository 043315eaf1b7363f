use serde::Serialize;

use crate::error::PredictError;

/// Probabilities at or above this value are reported as infected.
pub const THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Diagnosis {
    #[serde(rename = "Infecté")]
    Infected,
    #[serde(rename = "Sain")]
    Healthy,
}

impl Diagnosis {
    pub fn from_probability(probability: f32) -> Self {
        if probability >= THRESHOLD {
            Diagnosis::Infected
        } else {
            Diagnosis::Healthy
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub prediction: f32,
    pub prediction_percent: String,
    pub classe: Diagnosis,
}

impl Prediction {
    pub fn from_probability(probability: f32) -> Self {
        let percentage = f64::from(probability) * 100.0;
        Prediction {
            prediction: probability,
            prediction_percent: format!("{:.2}%", percentage),
            classe: Diagnosis::from_probability(probability),
        }
    }
}

/// Picks element `[0][0]` of a flattened `(1, 1)` sigmoid output.
pub fn probability_from_output(output: &[f32]) -> Result<f32, PredictError> {
    output
        .first()
        .copied()
        .ok_or_else(|| PredictError::Inference("model returned an empty output".into()))
}
