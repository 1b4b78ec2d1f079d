use std::path::PathBuf;

use thiserror::Error;

use crate::controls::{AudioFeatures, SynthesisControls};

/// Errors surfaced by control predictors.
#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("failed to load model from {path}: {source}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: ort::Error,
    },

    #[error("model does not expose required tensor '{0}'")]
    TensorContract(String),

    #[error("tensor '{name}' returned {got} values, expected {expected}")]
    TensorShape {
        name: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),
}

/// Per-hop control prediction with persistent recurrent state.
///
/// Implementations consume the normalized `(f0, loudness)` pair and fill
/// `controls` with amplitude, harmonic distribution, and noise band
/// magnitudes. The recurrent state carries across calls so the model
/// resumes its context each hop; `reset` clears it.
pub trait ControlPredictor: Send {
    fn predict(
        &mut self,
        features: &AudioFeatures,
        controls: &mut SynthesisControls,
    ) -> Result<(), PredictorError>;

    fn reset(&mut self);
}
