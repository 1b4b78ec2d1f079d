//! Realtime DDSP synthesis engine.
//!
//! A neural network predicts per-frame synthesis controls (amplitude,
//! 60-band harmonic distribution, 65 noise band magnitudes) at a fixed
//! 16 kHz internal rate; an additive harmonic synthesizer and a filtered
//! noise synthesizer render those controls into audio, which is resampled
//! to the host rate and delivered through a lock-free ring buffer.
//!
//! The audio thread only ever touches [`pipeline::InferencePipeline::pop`]
//! and the atomic parameter setters; inference and synthesis run on a
//! background render worker.

pub mod constants;
pub mod controls;
pub mod dsp;
pub mod harmonic;
pub mod midi;
pub mod noise;
pub mod ort_predictor;
pub mod params;
pub mod pipeline;
pub mod predictor;
pub mod resampler;
pub mod ring_buffer;
pub mod source;
