//! Pitch and loudness unit conversions.
//!
//! Pure functions shared by the feature sources and the pipeline. The
//! numeric contracts here match the training-side normalization, so they
//! must stay exact: `midi = 12*log2(f/440) + 69`, loudness normalized
//! over an 80 dB range.

use crate::constants::{
    LOUDNESS_RANGE_DB, PITCH_BEND_CENTER, PITCH_BEND_PER_SEMITONE, PITCH_MAX_HZ, PITCH_MIN_HZ,
};

const SEMITONES_PER_OCTAVE: f32 = 12.0;
const MIDI_NOTE_A4: f32 = 69.0;
const FREQ_A4_HZ: f32 = 440.0;

/// Frequency in Hz to (fractional) MIDI note number.
pub fn freq_to_midi(freq_hz: f32) -> f32 {
    SEMITONES_PER_OCTAVE * (freq_hz / FREQ_A4_HZ).log2() + MIDI_NOTE_A4
}

/// MIDI note number to frequency in Hz.
pub fn midi_to_freq(midi: f32) -> f32 {
    FREQ_A4_HZ * 2.0f32.powf((midi - MIDI_NOTE_A4) / SEMITONES_PER_OCTAVE)
}

/// Hz to [0, 1] over the MIDI note scale (param/audio mode mapping).
pub fn normalized_pitch(freq_hz: f32) -> f32 {
    let clamped = freq_hz.clamp(PITCH_MIN_HZ, PITCH_MAX_HZ);
    freq_to_midi(clamped) / 127.0
}

/// Shift a frequency by a fractional number of semitones.
pub fn offset_pitch(freq_hz: f32, semitones: f32) -> f32 {
    freq_hz * 2.0f32.powf(semitones / SEMITONES_PER_OCTAVE)
}

/// Hz to [0, 1] on a log10 scale between the pitch range bounds.
///
/// MIDI-mode mapping. Deliberately different from [`normalized_pitch`];
/// both modes are preserved.
pub fn map_from_log10(freq_hz: f32) -> f32 {
    let clamped = freq_hz.clamp(PITCH_MIN_HZ, PITCH_MAX_HZ);
    let log_min = PITCH_MIN_HZ.log10();
    let log_max = PITCH_MAX_HZ.log10();
    (clamped.log10() - log_min) / (log_max - log_min)
}

/// MIDI note plus 14-bit pitch wheel value to frequency in Hz.
pub fn freq_from_note_and_bend(midi_note: i32, pitch_bend: i32) -> f32 {
    let note_octaves = (midi_note as f32 - MIDI_NOTE_A4) / SEMITONES_PER_OCTAVE;
    let bend_octaves =
        (pitch_bend as f32 - PITCH_BEND_CENTER) / PITCH_BEND_PER_SEMITONE / SEMITONES_PER_OCTAVE;
    FREQ_A4_HZ * 2.0f32.powf(note_octaves + bend_octaves)
}

/// Loudness in dB to [0, 1].
pub fn normalized_loudness(loudness_db: f32) -> f32 {
    loudness_db / LOUDNESS_RANGE_DB + 1.0
}

/// Normalized loudness back to dB.
pub fn denormalized_loudness(loudness_norm: f32) -> f32 {
    (loudness_norm - 1.0) * LOUDNESS_RANGE_DB
}

/// dB to linear amplitude.
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Linear amplitude to dB, floored at -200 dB.
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.max(1e-10).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_roundtrip() {
        for &f in &[20.0f32, 55.0, 261.63, 440.0, 1234.5, 8000.0] {
            let back = midi_to_freq(freq_to_midi(f));
            assert!(
                (back - f).abs() / f < 1e-4,
                "roundtrip {f} Hz -> {back} Hz"
            );
        }
    }

    #[test]
    fn a4_is_midi_69() {
        assert!((freq_to_midi(440.0) - 69.0).abs() < 1e-5);
        assert!((midi_to_freq(69.0) - 440.0).abs() < 1e-3);
    }

    #[test]
    fn normalized_pitch_clamps_to_midi_range() {
        assert!((normalized_pitch(440.0) - 69.0 / 127.0).abs() < 1e-5);
        assert!(normalized_pitch(1.0) >= 0.0);
        assert!(normalized_pitch(20000.0) <= 1.0 + 1e-5);
    }

    #[test]
    fn loudness_roundtrip() {
        for db in -80..=0 {
            let db = db as f32;
            let back = denormalized_loudness(normalized_loudness(db));
            assert!((back - db).abs() < 1e-4, "roundtrip {db} dB -> {back} dB");
        }
    }

    #[test]
    fn log10_map_spans_unit_interval() {
        assert!(map_from_log10(PITCH_MIN_HZ).abs() < 1e-6);
        assert!((map_from_log10(PITCH_MAX_HZ) - 1.0).abs() < 1e-6);
        let mid = map_from_log10(440.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn note_and_bend_to_freq() {
        assert!((freq_from_note_and_bend(69, 8192) - 440.0).abs() < 1e-2);
        // Full wheel up = +2 semitones
        let up = freq_from_note_and_bend(69, 16383);
        let expected = offset_pitch(440.0, 2.0);
        assert!((up - expected).abs() / expected < 1e-3);
        // Middle C
        assert!((freq_from_note_and_bend(60, 8192) - 261.63).abs() < 0.01);
    }

    #[test]
    fn offset_pitch_octaves() {
        assert!((offset_pitch(440.0, 12.0) - 880.0).abs() < 1e-2);
        assert!((offset_pitch(440.0, -12.0) - 220.0).abs() < 1e-2);
    }

    #[test]
    fn db_linear_conversions() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-6);
        assert!((linear_to_db(1.0)).abs() < 1e-5);
    }
}
