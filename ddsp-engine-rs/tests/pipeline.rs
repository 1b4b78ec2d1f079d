use std::path::PathBuf;
use std::sync::atomic::Ordering;

use ddsp_engine_rs::constants::{HOP_LENGTH, N_HARMONICS, N_NOISE_BANDS, SAMPLE_RATE};
use ddsp_engine_rs::controls::{AudioFeatures, SynthesisControls};
use ddsp_engine_rs::midi::MidiSource;
use ddsp_engine_rs::pipeline::InferencePipeline;
use ddsp_engine_rs::predictor::{ControlPredictor, PredictorError};

/// Predictor stub returning fixed controls, with f0 passed through from
/// the input features like the real model wrapper does.
struct StubPredictor {
    amplitude: f32,
    harmonics: Vec<f32>,
    noise_amps: Vec<f32>,
}

impl StubPredictor {
    fn silent() -> Self {
        Self {
            amplitude: 0.0,
            harmonics: vec![0.0; N_HARMONICS],
            noise_amps: vec![0.0; N_NOISE_BANDS],
        }
    }

    fn single_harmonic() -> Self {
        let mut harmonics = vec![0.0; N_HARMONICS];
        harmonics[0] = 1.0;
        Self {
            amplitude: 1.0,
            harmonics,
            noise_amps: vec![0.0; N_NOISE_BANDS],
        }
    }
}

impl ControlPredictor for StubPredictor {
    fn predict(
        &mut self,
        features: &AudioFeatures,
        controls: &mut SynthesisControls,
    ) -> Result<(), PredictorError> {
        controls.amplitude = self.amplitude;
        controls.harmonics.copy_from_slice(&self.harmonics);
        controls.noise_amps.copy_from_slice(&self.noise_amps);
        controls.f0_hz = features.f0_hz;
        Ok(())
    }

    fn reset(&mut self) {}
}

#[test]
fn silent_predictor_yields_all_zeros() {
    let pipeline = InferencePipeline::new();
    pipeline.prepare(48000.0, 512).unwrap();
    pipeline.set_predictor(Box::new(StubPredictor::silent()));

    for _ in 0..100 {
        pipeline.trigger_render();
    }

    let mut out = vec![1.0f32; 48000];
    let read = pipeline.pop(&mut out);
    assert!(read > 0);
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn single_harmonic_renders_unit_sine() {
    // Host at the model rate so no resampler sits in the way.
    let pipeline = InferencePipeline::new();
    pipeline.prepare(SAMPLE_RATE as f64, 320).unwrap();
    pipeline.set_predictor(Box::new(StubPredictor::single_harmonic()));
    pipeline.set_f0_hz(440.0);

    // Drain the silence cushion.
    let mut cushion = vec![0.0f32; pipeline.host_frame_size()];
    pipeline.pop(&mut cushion);
    assert!(cushion.iter().all(|&s| s == 0.0));

    // First hop ramps the amplitude envelope in; the second is steady.
    pipeline.trigger_render();
    pipeline.trigger_render();
    let mut out = vec![0.0f32; 2 * HOP_LENGTH];
    assert_eq!(pipeline.pop(&mut out), 2 * HOP_LENGTH);

    let steady = &out[HOP_LENGTH..];
    let peak = steady.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
    assert!((peak - 1.0).abs() < 0.02, "peak = {peak}");

    // ~440 Hz: count sign changes over the 20 ms hop.
    let crossings = steady
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    let expected = (2.0 * 440.0 * HOP_LENGTH as f32 / SAMPLE_RATE as f32) as usize;
    assert!(
        crossings.abs_diff(expected) <= 2,
        "{crossings} sign changes, expected ~{expected}"
    );
}

#[test]
fn nyquist_filter_passes_only_fundamental() {
    let pipeline = InferencePipeline::new();
    pipeline.prepare(SAMPLE_RATE as f64, 320).unwrap();

    let mut harmonics = vec![0.0; N_HARMONICS];
    harmonics[..4].fill(1.0);
    pipeline.set_predictor(Box::new(StubPredictor {
        amplitude: 1.0,
        harmonics,
        noise_amps: vec![0.0; N_NOISE_BANDS],
    }));
    pipeline.set_f0_hz(4000.0);

    let mut cushion = vec![0.0f32; pipeline.host_frame_size()];
    pipeline.pop(&mut cushion);

    pipeline.trigger_render();
    pipeline.trigger_render();
    let mut out = vec![0.0f32; 2 * HOP_LENGTH];
    pipeline.pop(&mut out);

    // Partials 2..4 sit at/above Nyquist; the survivor renders a pure
    // 4 kHz sine at full amplitude.
    let steady = &out[HOP_LENGTH..];
    let energy: f32 = steady.iter().map(|&s| s * s).sum();
    assert!(
        (energy - HOP_LENGTH as f32 / 2.0).abs() < 1.0,
        "energy = {energy}"
    );
}

#[test]
fn nan_harmonics_mute_the_hop() {
    let pipeline = InferencePipeline::new();
    pipeline.prepare(SAMPLE_RATE as f64, 320).unwrap();

    let mut harmonics = vec![0.0; N_HARMONICS];
    harmonics[0] = 1.0;
    harmonics[3] = f32::NAN;
    pipeline.set_predictor(Box::new(StubPredictor {
        amplitude: 1.0,
        harmonics,
        noise_amps: vec![0.0; N_NOISE_BANDS],
    }));

    let mut cushion = vec![0.0f32; pipeline.host_frame_size()];
    pipeline.pop(&mut cushion);

    pipeline.trigger_render();
    let mut out = vec![0.0f32; HOP_LENGTH];
    pipeline.pop(&mut out);
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn pop_on_empty_pipeline_never_blocks() {
    let pipeline = InferencePipeline::new();
    let mut out = vec![1.0f32; 512];
    let read = pipeline.pop(&mut out);
    assert_eq!(read, 0);
    assert!(out.iter().all(|&s| s == 0.0));
    assert_eq!(pipeline.params().underrun_count.load(Ordering::Relaxed), 1);
}

#[test]
fn setters_clamp_to_documented_ranges() {
    let pipeline = InferencePipeline::new();

    pipeline.set_harmonic_gain(50.0);
    assert_eq!(
        pipeline.params().harmonic_gain.load(Ordering::Relaxed),
        10.0
    );
    pipeline.set_noise_gain(-3.0);
    assert_eq!(pipeline.params().noise_gain.load(Ordering::Relaxed), 0.0);

    pipeline.set_f0_hz(100_000.0);
    assert!(pipeline.params().f0_hz.load(Ordering::Relaxed) <= 12543.84);

    pipeline.set_loudness_norm(1.5);
    assert_eq!(pipeline.params().loudness_norm.load(Ordering::Relaxed), 1.0);

    // -40 dB over an 80 dB range normalizes to 0.5.
    pipeline.set_loudness_db(-40.0);
    assert!((pipeline.params().loudness_norm.load(Ordering::Relaxed) - 0.5).abs() < 1e-5);
}

#[test]
fn prepare_rejects_bad_arguments() {
    let pipeline = InferencePipeline::new();
    assert!(pipeline.prepare(0.0, 512).is_err());
    assert!(pipeline.prepare(-44100.0, 512).is_err());
    assert!(pipeline.prepare(48000.0, 0).is_err());
}

#[test]
fn hop_and_frame_sizes_scale_with_host_rate() {
    let pipeline = InferencePipeline::new();
    pipeline.prepare(48000.0, 512).unwrap();
    assert_eq!(pipeline.host_hop_size(), 960);
    assert_eq!(pipeline.host_frame_size(), 3072);

    pipeline.prepare(44100.0, 512).unwrap();
    assert_eq!(pipeline.host_hop_size(), 882);
    assert_eq!(pipeline.host_frame_size(), 2823);
}

#[test]
fn ready_samples_grow_by_about_one_hop_per_render() {
    let pipeline = InferencePipeline::new();
    pipeline.prepare(44100.0, 512).unwrap();
    pipeline.set_predictor(Box::new(StubPredictor::silent()));

    let cushion = pipeline.num_ready_samples();
    assert_eq!(cushion, pipeline.host_frame_size());

    pipeline.trigger_render();
    let grown = pipeline.num_ready_samples() - cushion;
    assert!(
        grown.abs_diff(pipeline.host_hop_size()) <= 1,
        "grew by {grown}"
    );
}

#[test]
fn reset_restores_the_silence_cushion() {
    let pipeline = InferencePipeline::new();
    pipeline.prepare(48000.0, 512).unwrap();
    pipeline.set_predictor(Box::new(StubPredictor::single_harmonic()));

    for _ in 0..10 {
        pipeline.trigger_render();
    }
    pipeline.reset();

    assert_eq!(pipeline.num_ready_samples(), pipeline.host_frame_size());
    let mut out = vec![1.0f32; pipeline.host_frame_size()];
    pipeline.pop(&mut out);
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn streaming_worker_fills_the_ring() {
    let pipeline = InferencePipeline::new();
    pipeline.prepare(48000.0, 512).unwrap();
    pipeline.set_predictor(Box::new(StubPredictor::single_harmonic()));
    pipeline.set_f0_hz(440.0);

    let before = pipeline.num_ready_samples();
    pipeline.start(5);
    std::thread::sleep(std::time::Duration::from_millis(120));
    pipeline.stop();

    let after = pipeline.num_ready_samples();
    assert!(
        after > before + pipeline.host_hop_size(),
        "ring did not grow: {before} -> {after}"
    );
}

#[test]
fn midi_source_drives_pitch_and_loudness_feedback() {
    let pipeline = InferencePipeline::new();
    pipeline.prepare(48000.0, 512).unwrap();
    pipeline.set_predictor(Box::new(StubPredictor::single_harmonic()));

    let mut source = MidiSource::new();
    source.prepare(48000.0, pipeline.host_hop_size());
    let input = source.input();
    pipeline.set_feature_source(Box::new(source));

    input.note_on(60, 1.0);
    for _ in 0..25 {
        pipeline.trigger_render();
    }
    // Sustain level 0.7 at full velocity, published as current_rms.
    assert!((pipeline.current_rms() - 0.7).abs() < 0.01);
    assert!(pipeline.current_pitch() > 0.0);

    input.note_off();
    for _ in 0..20 {
        pipeline.trigger_render();
    }
    assert!(pipeline.current_rms() < 1e-3);
}

#[test]
#[ignore = "requires a control model on disk; set DDSP_MODEL_PATH"]
fn smoke_real_model_renders_finite_audio() {
    let Some(model_path) = std::env::var_os("DDSP_MODEL_PATH").map(PathBuf::from) else {
        eprintln!("skip: DDSP_MODEL_PATH not set");
        return;
    };

    let pipeline = InferencePipeline::new();
    pipeline.prepare(48000.0, 512).unwrap();
    pipeline
        .load_model(&model_path, 2)
        .expect("model should load");
    assert!(pipeline.is_ready());

    pipeline.set_f0_hz(261.63);
    pipeline.set_loudness_norm(0.8);

    let mut energy = 0.0f32;
    let mut out = vec![0.0f32; pipeline.host_hop_size()];
    for _ in 0..32 {
        pipeline.trigger_render();
        pipeline.pop(&mut out);
        for &s in &out {
            assert!(s.is_finite(), "output contains non-finite sample");
            energy += s * s;
        }
    }
    assert!(energy > 0.0, "output energy should be positive");
}
