use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use crate::constants::*;
use crate::controls::{AudioFeatures, SynthesisControls};
use crate::predictor::{ControlPredictor, PredictorError};

/// ONNX-backed control predictor.
///
/// Owns the session and the 512-float recurrent state, feeding the state
/// back on every call. The name-addressed tensor contract is validated
/// once at load time so a mismatched model fails fast instead of at the
/// first render tick.
///
/// Input tensors are views over buffers preallocated in `load`, and the
/// recurrent state is double-buffered so state-in and state-out never
/// alias; `predict` does not allocate on the render path.
pub struct OrtPredictor {
    session: Session,
    f0_input: [f32; 1],
    loudness_input: [f32; 1],
    state: Vec<f32>,
    next_state: Vec<f32>,
}

fn build_session(model_path: &Path, num_threads: usize) -> Result<Session, ort::Error> {
    Session::builder()?
        .with_intra_threads(num_threads)?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model_path)
}

fn session_has_input(session: &Session, name: &str) -> bool {
    session.inputs().iter().any(|input| input.name() == name)
}

fn session_has_output(session: &Session, name: &str) -> bool {
    session.outputs().iter().any(|output| output.name() == name)
}

impl OrtPredictor {
    pub fn load(model_path: &Path, num_threads: usize) -> Result<Self, PredictorError> {
        let session =
            build_session(model_path, num_threads).map_err(|source| PredictorError::ModelLoad {
                path: model_path.to_path_buf(),
                source,
            })?;

        for name in [INPUT_F0, INPUT_LOUDNESS, INPUT_STATE] {
            if !session_has_input(&session, name) {
                return Err(PredictorError::TensorContract(name.to_string()));
            }
        }
        for name in [
            OUTPUT_AMPLITUDE,
            OUTPUT_HARMONICS,
            OUTPUT_NOISE_AMPS,
            OUTPUT_STATE,
        ] {
            if !session_has_output(&session, name) {
                return Err(PredictorError::TensorContract(name.to_string()));
            }
        }

        log::info!(
            "control model loaded from {:?} ({} intra threads)",
            model_path,
            num_threads
        );

        Ok(Self {
            session,
            f0_input: [0.0],
            loudness_input: [0.0],
            state: vec![0.0; GRU_STATE_SIZE],
            next_state: vec![0.0; GRU_STATE_SIZE],
        })
    }
}

fn check_len(name: &'static str, got: usize, expected: usize) -> Result<(), PredictorError> {
    if got == expected {
        Ok(())
    } else {
        Err(PredictorError::TensorShape {
            name,
            got,
            expected,
        })
    }
}

impl ControlPredictor for OrtPredictor {
    fn predict(
        &mut self,
        features: &AudioFeatures,
        controls: &mut SynthesisControls,
    ) -> Result<(), PredictorError> {
        self.f0_input[0] = features.f0_norm;
        self.loudness_input[0] = features.loudness_norm;

        let outputs = self.session.run(ort::inputs![
            INPUT_F0 => TensorRef::from_array_view(([1usize], self.f0_input.as_slice()))?,
            INPUT_LOUDNESS => TensorRef::from_array_view(([1usize], self.loudness_input.as_slice()))?,
            INPUT_STATE => TensorRef::from_array_view(([GRU_STATE_SIZE], self.state.as_slice()))?,
        ])?;

        let (_, amplitude) = outputs[OUTPUT_AMPLITUDE].try_extract_tensor::<f32>()?;
        check_len(OUTPUT_AMPLITUDE, amplitude.len(), 1)?;
        controls.amplitude = amplitude[0];

        let (_, harmonics) = outputs[OUTPUT_HARMONICS].try_extract_tensor::<f32>()?;
        check_len(OUTPUT_HARMONICS, harmonics.len(), N_HARMONICS)?;
        controls.harmonics.copy_from_slice(harmonics);

        let (_, noise_amps) = outputs[OUTPUT_NOISE_AMPS].try_extract_tensor::<f32>()?;
        check_len(OUTPUT_NOISE_AMPS, noise_amps.len(), N_NOISE_BANDS)?;
        controls.noise_amps.copy_from_slice(noise_amps);

        let (_, state) = outputs[OUTPUT_STATE].try_extract_tensor::<f32>()?;
        check_len(OUTPUT_STATE, state.len(), GRU_STATE_SIZE)?;
        self.next_state.copy_from_slice(state);

        drop(outputs);
        std::mem::swap(&mut self.state, &mut self.next_state);

        controls.f0_hz = features.f0_hz;
        controls.sanitize();
        Ok(())
    }

    fn reset(&mut self) {
        self.state.fill(0.0);
        self.next_state.fill(0.0);
    }
}
