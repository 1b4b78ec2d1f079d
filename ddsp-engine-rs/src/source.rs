use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::constants::{PITCH_MAX_HZ, PITCH_MIN_HZ};
use crate::controls::AudioFeatures;
use crate::dsp;
use crate::params::SharedParams;

/// Supplies one hop of normalized control features to the render worker.
pub trait FeatureSource: Send {
    fn next_hop(&mut self) -> AudioFeatures;

    fn reset(&mut self) {}
}

/// Feature source backed by the shared parameter block (synth mode).
///
/// Applies the pitch shift, clamps f0 to the model's pitch range, and
/// normalizes over the MIDI note scale.
pub struct ParamSource {
    params: Arc<SharedParams>,
}

impl ParamSource {
    pub fn new(params: Arc<SharedParams>) -> Self {
        Self { params }
    }
}

impl FeatureSource for ParamSource {
    fn next_hop(&mut self) -> AudioFeatures {
        let shift = self.params.pitch_shift_semitones.load(Ordering::Relaxed);
        let shifted = dsp::offset_pitch(self.params.f0_hz.load(Ordering::Relaxed), shift);
        let f0_hz = shifted.clamp(PITCH_MIN_HZ, PITCH_MAX_HZ);
        let loudness_norm = self.params.loudness_norm.load(Ordering::Relaxed);

        AudioFeatures {
            f0_hz,
            f0_norm: dsp::normalized_pitch(f0_hz),
            loudness_db: dsp::denormalized_loudness(loudness_norm),
            loudness_norm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_source_applies_pitch_shift() {
        let params = Arc::new(SharedParams::new());
        params.f0_hz.store(440.0, Ordering::Relaxed);
        params.pitch_shift_semitones.store(12.0, Ordering::Relaxed);

        let mut source = ParamSource::new(Arc::clone(&params));
        let features = source.next_hop();
        assert!((features.f0_hz - 880.0).abs() < 0.1);
    }

    #[test]
    fn param_source_clamps_to_pitch_range() {
        let params = Arc::new(SharedParams::new());
        params.f0_hz.store(12000.0, Ordering::Relaxed);
        params.pitch_shift_semitones.store(24.0, Ordering::Relaxed);

        let mut source = ParamSource::new(Arc::clone(&params));
        let features = source.next_hop();
        assert!(features.f0_hz <= PITCH_MAX_HZ);
        assert!(features.f0_norm <= 1.0 + 1e-5);
    }

    #[test]
    fn param_source_passes_loudness_through() {
        let params = Arc::new(SharedParams::new());
        params.loudness_norm.store(0.75, Ordering::Relaxed);

        let mut source = ParamSource::new(Arc::clone(&params));
        let features = source.next_hop();
        assert_eq!(features.loudness_norm, 0.75);
        assert!((features.loudness_db - (-20.0)).abs() < 1e-4);
    }
}
