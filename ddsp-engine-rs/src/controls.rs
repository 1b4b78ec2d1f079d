use crate::constants::{N_HARMONICS, N_NOISE_BANDS};

/// Normalized control features for one hop, fed to the control model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioFeatures {
    /// Fundamental frequency in Hz.
    pub f0_hz: f32,
    /// Normalized F0 in [0, 1].
    pub f0_norm: f32,
    /// Loudness in dB (typically -80 to 0).
    pub loudness_db: f32,
    /// Normalized loudness in [0, 1].
    pub loudness_norm: f32,
}

/// Per-frame synthesis controls predicted by the control model.
#[derive(Debug, Clone)]
pub struct SynthesisControls {
    /// Overall harmonic amplitude.
    pub amplitude: f32,
    /// F0 passed through from the input features.
    pub f0_hz: f32,
    /// Harmonic distribution (one coefficient per partial).
    pub harmonics: Vec<f32>,
    /// Noise band magnitudes.
    pub noise_amps: Vec<f32>,
}

impl Default for SynthesisControls {
    fn default() -> Self {
        Self {
            amplitude: 0.0,
            f0_hz: 0.0,
            harmonics: vec![0.0; N_HARMONICS],
            noise_amps: vec![0.0; N_NOISE_BANDS],
        }
    }
}

impl SynthesisControls {
    pub fn clear(&mut self) {
        self.amplitude = 0.0;
        self.f0_hz = 0.0;
        self.harmonics.fill(0.0);
        self.noise_amps.fill(0.0);
    }

    /// Zero any NaN harmonic coefficient. A single NaN also forces the
    /// frame amplitude to zero, muting the hop instead of feeding garbage
    /// into the phase accumulator.
    pub fn sanitize(&mut self) {
        for harmonic in &mut self.harmonics {
            if harmonic.is_nan() {
                *harmonic = 0.0;
                self.amplitude = 0.0;
            }
        }
    }
}
