//! MIDI-driven feature source.
//!
//! Tracks the current note, 14-bit pitch wheel, and velocity through
//! atomics so the event-producing thread never blocks the render worker,
//! and shapes loudness with an ADSR envelope advanced one hop per call.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;

use crate::controls::AudioFeatures;
use crate::dsp;
use crate::source::FeatureSource;

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;
const PITCH_WHEEL: u8 = 0xE0;

/// ADSR envelope parameters. Times in seconds, sustain is a level in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct AdsrParams {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdsrPhase {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Sample-rate-aware ADSR envelope state machine.
struct Adsr {
    params: AdsrParams,
    sample_rate: f64,
    phase: AdsrPhase,
    level: f32,
    release_step: f32,
}

impl Adsr {
    fn new() -> Self {
        Self {
            params: AdsrParams::default(),
            sample_rate: 48000.0,
            phase: AdsrPhase::Idle,
            level: 0.0,
            release_step: 0.0,
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn set_params(&mut self, params: AdsrParams) {
        self.params = params;
    }

    fn note_on(&mut self) {
        self.phase = AdsrPhase::Attack;
    }

    fn note_off(&mut self) {
        if self.phase != AdsrPhase::Idle {
            let release_samples = (self.params.release as f64 * self.sample_rate) as f32;
            self.release_step = if release_samples > 0.0 {
                self.level / release_samples
            } else {
                self.level
            };
            self.phase = AdsrPhase::Release;
        }
    }

    fn reset(&mut self) {
        self.phase = AdsrPhase::Idle;
        self.level = 0.0;
        self.release_step = 0.0;
    }

    fn next_sample(&mut self) -> f32 {
        match self.phase {
            AdsrPhase::Idle => {
                self.level = 0.0;
            }
            AdsrPhase::Attack => {
                let attack_samples = (self.params.attack as f64 * self.sample_rate) as f32;
                if attack_samples > 0.0 {
                    self.level += 1.0 / attack_samples;
                }
                if attack_samples <= 0.0 || self.level >= 1.0 {
                    self.level = 1.0;
                    self.phase = AdsrPhase::Decay;
                }
            }
            AdsrPhase::Decay => {
                let decay_samples = (self.params.decay as f64 * self.sample_rate) as f32;
                if decay_samples > 0.0 {
                    self.level -= (1.0 - self.params.sustain) / decay_samples;
                }
                if decay_samples <= 0.0 || self.level <= self.params.sustain {
                    self.level = self.params.sustain;
                    self.phase = AdsrPhase::Sustain;
                }
            }
            AdsrPhase::Sustain => {
                self.level = self.params.sustain;
            }
            AdsrPhase::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.phase = AdsrPhase::Idle;
                }
            }
        }
        self.level
    }
}

/// Note state shared between the event producer and the render worker.
struct NoteState {
    note: AtomicI32,
    pitch_bend: AtomicI32,
    velocity: AtomicF32,
    note_on_seq: AtomicU32,
    note_off_seq: AtomicU32,
}

impl NoteState {
    fn new() -> Self {
        Self {
            note: AtomicI32::new(69),
            pitch_bend: AtomicI32::new(8192),
            velocity: AtomicF32::new(0.0),
            note_on_seq: AtomicU32::new(0),
            note_off_seq: AtomicU32::new(0),
        }
    }
}

/// Cloneable handle for feeding MIDI events into a [`MidiSource`] from
/// another thread. Lock-free; safe to call from an audio callback.
#[derive(Clone)]
pub struct MidiInput {
    shared: Arc<NoteState>,
}

impl MidiInput {
    /// Decode one raw MIDI message. NoteOn with zero velocity counts as
    /// NoteOff; everything but NoteOn/NoteOff/PitchWheel is ignored.
    pub fn handle_message(&self, status: u8, data1: u8, data2: u8) {
        match status & 0xF0 {
            NOTE_ON if data2 > 0 => self.note_on(data1 as i32, data2 as f32 / 127.0),
            NOTE_ON | NOTE_OFF => self.note_off(),
            PITCH_WHEEL => self.set_pitch_bend(((data2 as i32) << 7) | data1 as i32),
            _ => {}
        }
    }

    pub fn note_on(&self, note: i32, velocity: f32) {
        self.shared.note.store(note, Ordering::Release);
        self.shared.velocity.store(velocity, Ordering::Release);
        self.shared.note_on_seq.fetch_add(1, Ordering::Release);
    }

    pub fn note_off(&self) {
        self.shared.note_off_seq.fetch_add(1, Ordering::Release);
    }

    pub fn set_pitch_bend(&self, value: i32) {
        self.shared.pitch_bend.store(value, Ordering::Release);
    }
}

/// Feature source driven by MIDI note events (MIDI mode).
///
/// f0 normalization uses the log10-range mapping, deliberately different
/// from [`crate::source::ParamSource`].
pub struct MidiSource {
    shared: Arc<NoteState>,
    adsr: Adsr,
    hop_size: usize,
    seen_note_on: u32,
    seen_note_off: u32,
}

impl MidiSource {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(NoteState::new()),
            adsr: Adsr::new(),
            hop_size: 960,
            seen_note_on: 0,
            seen_note_off: 0,
        }
    }

    /// Handle for the event-producing side.
    pub fn input(&self) -> MidiInput {
        MidiInput {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Set the host sample rate and the hop size at that rate; the ADSR
    /// envelope advances `hop_size` samples per `next_hop` call.
    pub fn prepare(&mut self, sample_rate: f64, hop_size: usize) {
        self.adsr.set_sample_rate(sample_rate);
        self.hop_size = hop_size;
    }

    pub fn set_adsr(&mut self, params: AdsrParams) {
        self.adsr.set_params(params);
    }
}

impl Default for MidiSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureSource for MidiSource {
    fn next_hop(&mut self) -> AudioFeatures {
        let note_on = self.shared.note_on_seq.load(Ordering::Acquire);
        if note_on != self.seen_note_on {
            self.seen_note_on = note_on;
            self.adsr.note_on();
        }
        let note_off = self.shared.note_off_seq.load(Ordering::Acquire);
        if note_off != self.seen_note_off {
            self.seen_note_off = note_off;
            self.adsr.note_off();
        }

        let note = self.shared.note.load(Ordering::Acquire);
        let pitch_bend = self.shared.pitch_bend.load(Ordering::Acquire);
        let velocity = self.shared.velocity.load(Ordering::Acquire);

        let f0_hz = dsp::freq_from_note_and_bend(note, pitch_bend);

        let mut level = 0.0;
        for _ in 0..self.hop_size {
            level = self.adsr.next_sample();
        }
        let loudness_norm = level * velocity;

        AudioFeatures {
            f0_hz,
            f0_norm: dsp::map_from_log10(f0_hz),
            loudness_db: dsp::denormalized_loudness(loudness_norm),
            loudness_norm,
        }
    }

    fn reset(&mut self) {
        self.adsr.reset();
        self.shared.note.store(69, Ordering::Release);
        self.shared.pitch_bend.store(8192, Ordering::Release);
        self.shared.velocity.store(0.0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 48 kHz host, 960-sample hop (20 ms).
    fn prepared_source() -> MidiSource {
        let mut source = MidiSource::new();
        source.prepare(48000.0, 960);
        source
    }

    #[test]
    fn silent_before_any_note() {
        let mut source = prepared_source();
        let features = source.next_hop();
        assert_eq!(features.loudness_norm, 0.0);
    }

    #[test]
    fn note_lifecycle_attack_sustain_release() {
        let mut source = prepared_source();
        let input = source.input();

        input.note_on(60, 1.0);

        // First hop covers attack (10 ms) and part of decay.
        let first = source.next_hop();
        assert!((first.f0_hz - 261.63).abs() < 0.01, "f0 = {}", first.f0_hz);
        assert!(first.loudness_norm > 0.0);

        // 500 ms in: settled on sustain.
        for _ in 0..24 {
            source.next_hop();
        }
        let sustained = source.next_hop();
        assert!(
            (sustained.loudness_norm - 0.7).abs() < 0.01,
            "sustain = {}",
            sustained.loudness_norm
        );

        // Release (200 ms) decays to silence.
        input.note_off();
        for _ in 0..15 {
            source.next_hop();
        }
        let released = source.next_hop();
        assert!(released.loudness_norm < 1e-3);
    }

    #[test]
    fn velocity_scales_loudness() {
        let mut source = prepared_source();
        let input = source.input();

        input.note_on(69, 0.5);
        for _ in 0..25 {
            source.next_hop();
        }
        let features = source.next_hop();
        assert!((features.loudness_norm - 0.35).abs() < 0.01);
    }

    #[test]
    fn raw_message_decoding() {
        let mut source = prepared_source();
        let input = source.input();

        // NoteOn ch0, note 69, velocity 127
        input.handle_message(0x90, 69, 127);
        let features = source.next_hop();
        assert!((features.f0_hz - 440.0).abs() < 0.01);
        assert!(features.loudness_norm > 0.0);

        // Wheel all the way up: +2 semitones
        input.handle_message(0xE0, 0x7F, 0x7F);
        let bent = source.next_hop();
        assert!((bent.f0_hz - dsp::offset_pitch(440.0, 2.0)).abs() < 0.5);

        // NoteOn with zero velocity acts as NoteOff
        input.handle_message(0x90, 69, 0);
        for _ in 0..20 {
            source.next_hop();
        }
        assert!(source.next_hop().loudness_norm < 1e-3);
    }

    #[test]
    fn uses_log10_pitch_normalization() {
        let mut source = prepared_source();
        source.input().note_on(69, 1.0);
        let features = source.next_hop();
        assert!((features.f0_norm - dsp::map_from_log10(440.0)).abs() < 1e-6);
    }
}
