//! Engine-wide constants.
//!
//! The model-side values are fixed by the control model's training setup
//! and must not drift: the synthesizers, the pipeline timing, and the
//! tensor contract all assume them.

/// Internal synthesis sample rate the control model was trained at.
pub const SAMPLE_RATE: u32 = 16000;
/// Analysis frame length at the model rate.
pub const FRAME_LENGTH: usize = 1024;
/// Samples produced per inference tick at the model rate (20 ms).
pub const HOP_LENGTH: usize = 320;
/// Render worker tick interval in milliseconds.
pub const INFERENCE_INTERVAL_MS: u64 = 20;
/// End-to-end latency budget of the streaming path.
pub const TOTAL_LATENCY_MS: f32 = 64.0;

/// Number of harmonic partials in the predicted distribution.
pub const N_HARMONICS: usize = 60;
/// Number of noise band magnitudes.
pub const N_NOISE_BANDS: usize = 65;
/// Size of the model's recurrent hidden state.
pub const GRU_STATE_SIZE: usize = 512;

/// MIDI note 0 in Hz.
pub const PITCH_MIN_HZ: f32 = 8.18;
/// MIDI note 127 in Hz.
pub const PITCH_MAX_HZ: f32 = 12543.84;
/// Loudness normalization range in dB.
pub const LOUDNESS_RANGE_DB: f32 = 80.0;

/// Output ring capacity in samples (~3.8 s at the model rate).
pub const RING_BUFFER_CAPACITY: usize = 61440;

/// Pitch wheel center value (14-bit).
pub const PITCH_BEND_CENTER: f32 = 8192.0;
/// Pitch wheel steps per semitone (full wheel spans +-2 semitones).
pub const PITCH_BEND_PER_SEMITONE: f32 = 4096.0;

// Name-addressed tensor contract of the control model.
pub const INPUT_F0: &str = "call_f0_scaled:0";
pub const INPUT_LOUDNESS: &str = "call_pw_scaled:0";
pub const INPUT_STATE: &str = "call_state:0";
pub const OUTPUT_AMPLITUDE: &str = "StatefulPartitionedCall:0";
pub const OUTPUT_HARMONICS: &str = "StatefulPartitionedCall:1";
pub const OUTPUT_NOISE_AMPS: &str = "StatefulPartitionedCall:2";
pub const OUTPUT_STATE: &str = "StatefulPartitionedCall:3";
