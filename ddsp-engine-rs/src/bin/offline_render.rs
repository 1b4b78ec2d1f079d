use std::path::PathBuf;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

use ddsp_engine_rs::constants::INFERENCE_INTERVAL_MS;
use ddsp_engine_rs::pipeline::InferencePipeline;

fn parse_arg(args: &[String], key: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == key)
        .map(|w| w[1].clone())
}

fn parse_arg_f32(args: &[String], key: &str, default: f32) -> f32 {
    parse_arg(args, key)
        .and_then(|v| v.parse::<f32>().ok())
        .unwrap_or(default)
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if parse_arg(&args, "--model").is_none() || parse_arg(&args, "--output").is_none() {
        eprintln!(
            "Usage: cargo run -p ddsp-engine-rs --bin offline_render -- \\\n  --model <model.onnx> --output <out.wav> [--rate 48000] [--seconds 4.0] \\\n  [--f0 440] [--loudness 0.8] [--pitch-shift 0] [--harmonic-gain 1] [--noise-gain 1]"
        );
        std::process::exit(2);
    }

    let model_path = PathBuf::from(parse_arg(&args, "--model").unwrap());
    let output_path = PathBuf::from(parse_arg(&args, "--output").unwrap());
    let rate = parse_arg_f32(&args, "--rate", 48000.0) as f64;
    let seconds = parse_arg_f32(&args, "--seconds", 4.0).max(0.1);
    let f0 = parse_arg_f32(&args, "--f0", 440.0);
    let loudness = parse_arg_f32(&args, "--loudness", 0.8);
    let pitch_shift = parse_arg_f32(&args, "--pitch-shift", 0.0);
    let harmonic_gain = parse_arg_f32(&args, "--harmonic-gain", 1.0);
    let noise_gain = parse_arg_f32(&args, "--noise-gain", 1.0);

    let pipeline = InferencePipeline::new();
    pipeline
        .prepare(rate, 512)
        .context("failed to prepare pipeline")?;
    pipeline
        .load_model(&model_path, 2)
        .with_context(|| format!("failed to load model: {}", model_path.display()))?;

    pipeline.set_f0_hz(f0);
    pipeline.set_loudness_norm(loudness);
    pipeline.set_pitch_shift(pitch_shift);
    pipeline.set_harmonic_gain(harmonic_gain);
    pipeline.set_noise_gain(noise_gain);

    let total_samples = (seconds as f64 * rate) as usize;
    let hop = pipeline.host_hop_size();
    let num_hops = total_samples / hop + 1;

    // Drain the startup silence cushion so the file starts at t=0.
    let mut cushion = vec![0.0f32; pipeline.host_frame_size()];
    pipeline.pop(&mut cushion);

    let mut samples = Vec::with_capacity(total_samples + hop);
    let mut scratch = vec![0.0f32; hop + 2];
    for _ in 0..num_hops {
        pipeline.trigger_render();
        let ready = pipeline.num_ready_samples().min(scratch.len());
        pipeline.pop(&mut scratch[..ready]);
        samples.extend_from_slice(&scratch[..ready]);
    }
    samples.truncate(total_samples);

    let spec = WavSpec {
        channels: 1,
        sample_rate: rate.round() as u32,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&output_path, spec)
        .with_context(|| format!("failed to create output wav: {}", output_path.display()))?;
    for &s in &samples {
        let v = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        writer.write_sample(v)?;
    }
    writer.finalize()?;

    println!(
        "done: {} ({} samples @{} Hz, {} ms/hop, f0={:.1} Hz, loudness={:.2})",
        output_path.display(),
        samples.len(),
        spec.sample_rate,
        INFERENCE_INTERVAL_MS,
        f0,
        loudness
    );
    Ok(())
}
