mod audio;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use ddsp_engine_rs::constants::INFERENCE_INTERVAL_MS;
use ddsp_engine_rs::pipeline::InferencePipeline;

const DEFAULT_BUFFER_SIZE: u32 = 512;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(model_path) = args.get(1).map(PathBuf::from) else {
        eprintln!("Usage: ddsp-rt <model.onnx> [output-device-name]");
        eprintln!("\nAvailable output devices:");
        for name in audio::list_output_devices() {
            eprintln!("  {name}");
        }
        std::process::exit(2);
    };
    let device_name = args.get(2).map(String::as_str);

    let rate = audio::default_output_rate(device_name)?;
    log::info!("output device rate: {rate} Hz");

    let pipeline = Arc::new(InferencePipeline::new());
    pipeline
        .prepare(rate as f64, DEFAULT_BUFFER_SIZE as usize)
        .context("failed to prepare pipeline")?;
    pipeline
        .load_model(&model_path, 2)
        .with_context(|| format!("failed to load model: {}", model_path.display()))?;

    pipeline.start(INFERENCE_INTERVAL_MS);
    let output = audio::start(device_name, DEFAULT_BUFFER_SIZE, Arc::clone(&pipeline))?;
    log::info!(
        "streaming at {} Hz, {}-sample blocks",
        output.sample_rate,
        output.buffer_size
    );

    println!("commands: f0 <hz> | loud <0..1> | db <dB> | shift <semitones> | harm <0..10> | noise <0..10> | status | quit");
    repl(&pipeline)?;

    pipeline.stop();
    Ok(())
}

fn repl(pipeline: &InferencePipeline) -> Result<()> {
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let value: Option<f32> = parts.next().and_then(|v| v.parse().ok());

        match (command, value) {
            ("f0", Some(v)) => pipeline.set_f0_hz(v),
            ("loud", Some(v)) => pipeline.set_loudness_norm(v),
            ("db", Some(v)) => pipeline.set_loudness_db(v),
            ("shift", Some(v)) => pipeline.set_pitch_shift(v),
            ("harm", Some(v)) => pipeline.set_harmonic_gain(v),
            ("noise", Some(v)) => pipeline.set_noise_gain(v),
            ("status", _) => {
                println!(
                    "pitch={:.3} rms={:.3} ready={} samples",
                    pipeline.current_pitch(),
                    pipeline.current_rms(),
                    pipeline.num_ready_samples()
                );
            }
            ("quit", _) | ("exit", _) => return Ok(()),
            _ => println!("unrecognized command: {}", line.trim()),
        }
    }
}
