use std::sync::atomic::AtomicU64;

use atomic_float::AtomicF32;

/// Scalar control block shared between the control surface, the render
/// worker, and the audio thread.
///
/// Every field is single-writer/single-reader; values are per-hop hints
/// rather than synchronization barriers, so relaxed ordering is enough.
pub struct SharedParams {
    pub f0_hz: AtomicF32,
    pub loudness_norm: AtomicF32,
    pub pitch_shift_semitones: AtomicF32,
    pub harmonic_gain: AtomicF32,
    pub noise_gain: AtomicF32,

    // UI feedback, written once per hop by the render worker.
    pub current_pitch: AtomicF32,
    pub current_rms: AtomicF32,

    // Diagnostics
    pub overrun_count: AtomicU64,
    pub underrun_count: AtomicU64,
}

impl SharedParams {
    pub fn new() -> Self {
        Self {
            f0_hz: AtomicF32::new(440.0),
            loudness_norm: AtomicF32::new(0.5),
            pitch_shift_semitones: AtomicF32::new(0.0),
            harmonic_gain: AtomicF32::new(1.0),
            noise_gain: AtomicF32::new(1.0),
            current_pitch: AtomicF32::new(0.0),
            current_rms: AtomicF32::new(0.0),
            overrun_count: AtomicU64::new(0),
            underrun_count: AtomicU64::new(0),
        }
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::new()
    }
}
