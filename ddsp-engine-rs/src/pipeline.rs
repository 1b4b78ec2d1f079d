use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

use crate::constants::*;
use crate::controls::SynthesisControls;
use crate::dsp;
use crate::harmonic::HarmonicSynthesizer;
use crate::noise::NoiseSynthesizer;
use crate::ort_predictor::OrtPredictor;
use crate::params::SharedParams;
use crate::predictor::{ControlPredictor, PredictorError};
use crate::resampler::PolyphaseResampler;
use crate::ring_buffer::SpscRingBuffer;
use crate::source::{FeatureSource, ParamSource};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("invalid block size: {0}")]
    InvalidBlockSize(usize),

    #[error(transparent)]
    Predictor(#[from] PredictorError),
}

/// Everything the render worker mutates. Locked by the worker once per
/// hop and by control-thread operations (prepare, load, reset); the audio
/// thread never touches it.
struct RenderState {
    predictor: Option<Box<dyn ControlPredictor>>,
    source: Box<dyn FeatureSource>,
    harmonic: HarmonicSynthesizer,
    noise: NoiseSynthesizer,
    resampler: Option<PolyphaseResampler>,
    controls: SynthesisControls,
    mix: Vec<f32>,
    resampled: Vec<f32>,
    user_frame_size: usize,
    user_hop_size: usize,
    model_ready: bool,
    prepared: bool,
}

impl RenderState {
    fn new(params: Arc<SharedParams>) -> Self {
        Self {
            predictor: None,
            source: Box::new(ParamSource::new(params)),
            harmonic: HarmonicSynthesizer::new(N_HARMONICS, HOP_LENGTH, SAMPLE_RATE as f32),
            noise: NoiseSynthesizer::new(N_NOISE_BANDS, HOP_LENGTH),
            resampler: None,
            controls: SynthesisControls::default(),
            mix: vec![0.0; HOP_LENGTH],
            resampled: Vec::new(),
            user_frame_size: 0,
            user_hop_size: 0,
            model_ready: false,
            prepared: false,
        }
    }

    fn prepare(&mut self, host_rate: f64, _block_size: usize) {
        self.user_frame_size =
            (host_rate * FRAME_LENGTH as f64 / SAMPLE_RATE as f64).ceil() as usize;
        self.user_hop_size = (host_rate * HOP_LENGTH as f64 / SAMPLE_RATE as f64) as usize;

        let host_rate_u32 = host_rate.round() as u32;
        if host_rate_u32 != SAMPLE_RATE {
            self.resampler = Some(PolyphaseResampler::new(SAMPLE_RATE, host_rate_u32));
            self.resampled = vec![
                0.0;
                PolyphaseResampler::max_output_len(HOP_LENGTH, SAMPLE_RATE, host_rate_u32)
            ];
        } else {
            self.resampler = None;
            self.resampled.clear();
        }
        self.prepared = true;
    }

    /// One render tick: features -> prediction -> synthesis -> resample
    /// -> ring. A failed prediction drops the hop; the audio side
    /// underflows into silence.
    fn render_one_hop(&mut self, params: &SharedParams, ring: &SpscRingBuffer) {
        if !self.prepared || !self.model_ready {
            return;
        }
        let Some(predictor) = self.predictor.as_mut() else {
            return;
        };

        let features = self.source.next_hop();
        params
            .current_pitch
            .store(features.f0_norm, Ordering::Relaxed);
        params
            .current_rms
            .store(features.loudness_norm, Ordering::Relaxed);

        if let Err(e) = predictor.predict(&features, &mut self.controls) {
            log::warn!("control prediction failed, dropping hop: {e}");
            return;
        }
        self.controls.sanitize();

        self.controls.amplitude *= params.harmonic_gain.load(Ordering::Relaxed);
        let noise_gain = params.noise_gain.load(Ordering::Relaxed);
        for amp in &mut self.controls.noise_amps {
            *amp *= noise_gain;
        }

        let amplitude = self.controls.amplitude;
        let f0_hz = self.controls.f0_hz;
        let harmonic_out = self
            .harmonic
            .render(&mut self.controls.harmonics, amplitude, f0_hz);
        for (mixed, &sample) in self.mix.iter_mut().zip(harmonic_out) {
            *mixed = sample;
        }
        let noise_out = self.noise.render(&self.controls.noise_amps);
        for (mixed, &sample) in self.mix.iter_mut().zip(noise_out) {
            *mixed += sample;
        }

        let (pushed, produced) = match self.resampler.as_mut() {
            Some(resampler) => {
                let produced = resampler.process(&self.mix, &mut self.resampled);
                (ring.write(&self.resampled[..produced]), produced)
            }
            None => (ring.write(&self.mix), HOP_LENGTH),
        };
        if pushed < produced {
            params.overrun_count.fetch_add(1, Ordering::Relaxed);
            log::warn!("output ring full, dropped {} samples", produced - pushed);
        }
    }

    fn reset(&mut self) {
        if let Some(predictor) = self.predictor.as_mut() {
            predictor.reset();
        }
        self.source.reset();
        self.harmonic.reset();
        self.noise.reset();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
        self.controls.clear();
        self.mix.fill(0.0);
    }
}

/// Couples a feature source, the control predictor, and both synthesizers
/// into a streaming engine.
///
/// A background worker renders one hop every `interval_ms` and pushes the
/// host-rate samples into a lock-free ring; the audio callback drains it
/// through [`InferencePipeline::pop`], which never blocks. Parameter
/// setters write atomics and are safe from any thread. `prepare`,
/// `load_model`, `start`, `stop`, and `reset` are control-thread
/// operations, serialized by the caller.
pub struct InferencePipeline {
    params: Arc<SharedParams>,
    output_ring: Arc<SpscRingBuffer>,
    state: Arc<Mutex<RenderState>>,
    should_run: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InferencePipeline {
    pub fn new() -> Self {
        let params = Arc::new(SharedParams::new());
        let state = RenderState::new(Arc::clone(&params));
        Self {
            params,
            output_ring: Arc::new(SpscRingBuffer::new(RING_BUFFER_CAPACITY)),
            state: Arc::new(Mutex::new(state)),
            should_run: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Compute host-rate frame/hop sizes, build the resampler, and prime
    /// the output ring with one frame of silence. The silence cushion is
    /// what absorbs inference jitter within the 64 ms latency budget.
    pub fn prepare(&self, host_rate: f64, block_size: usize) -> Result<(), PipelineError> {
        if !host_rate.is_finite() || host_rate <= 0.0 {
            return Err(PipelineError::InvalidSampleRate(host_rate));
        }
        if block_size == 0 {
            return Err(PipelineError::InvalidBlockSize(block_size));
        }

        let mut state = self.state.lock();
        state.prepare(host_rate, block_size);
        self.output_ring.reset();
        self.zero_pad_output(state.user_frame_size);
        Ok(())
    }

    fn zero_pad_output(&self, len: usize) {
        let zeros = vec![0.0f32; len];
        self.output_ring.write(&zeros);
    }

    /// Load the control model and mark the pipeline ready.
    pub fn load_model(&self, model_path: &Path, num_threads: usize) -> Result<(), PipelineError> {
        let predictor = OrtPredictor::load(model_path, num_threads)?;
        let mut state = self.state.lock();
        state.predictor = Some(Box::new(predictor));
        state.model_ready = true;
        Ok(())
    }

    /// Install a predictor directly (stubs, alternative backends).
    pub fn set_predictor(&self, predictor: Box<dyn ControlPredictor>) {
        let mut state = self.state.lock();
        state.predictor = Some(predictor);
        state.model_ready = true;
    }

    /// Swap the feature source (e.g. a `MidiSource` for MIDI mode).
    pub fn set_feature_source(&self, source: Box<dyn FeatureSource>) {
        self.state.lock().source = source;
    }

    pub fn is_ready(&self) -> bool {
        self.state.lock().model_ready
    }

    /// Mark the model not ready; render ticks become no-ops.
    pub fn release_resources(&self) {
        self.state.lock().model_ready = false;
    }

    /// Start the render worker, ticking every `interval_ms`.
    pub fn start(&self, interval_ms: u64) {
        if self.should_run.swap(true, Ordering::AcqRel) {
            return;
        }

        let state = Arc::clone(&self.state);
        let ring = Arc::clone(&self.output_ring);
        let params = Arc::clone(&self.params);
        let should_run = Arc::clone(&self.should_run);

        let handle = thread::Builder::new()
            .name("ddsp-render".to_string())
            .spawn(move || {
                let interval = Duration::from_millis(interval_ms);
                while should_run.load(Ordering::Acquire) {
                    let t0 = Instant::now();
                    state.lock().render_one_hop(&params, &ring);
                    if let Some(remaining) = interval.checked_sub(t0.elapsed()) {
                        thread::sleep(remaining);
                    }
                }
            })
            .expect("failed to spawn render worker");

        *self.worker.lock() = Some(handle);
    }

    /// Stop the render worker. The pending hop is allowed to finish.
    pub fn stop(&self) {
        self.should_run.store(false, Ordering::Release);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    /// Render a single hop synchronously. Non-streaming and test use.
    pub fn trigger_render(&self) {
        self.state
            .lock()
            .render_one_hop(&self.params, &self.output_ring);
    }

    /// Pop up to `out.len()` samples from the output ring. Never blocks;
    /// the unfilled remainder is zeroed and the number of samples
    /// actually available is returned.
    pub fn pop(&self, out: &mut [f32]) -> usize {
        let read = self.output_ring.read(out);
        if read < out.len() {
            out[read..].fill(0.0);
            self.params.underrun_count.fetch_add(1, Ordering::Relaxed);
        }
        read
    }

    pub fn num_ready_samples(&self) -> usize {
        self.output_ring.available()
    }

    /// Samples produced per hop at the host rate.
    pub fn host_hop_size(&self) -> usize {
        self.state.lock().user_hop_size
    }

    /// One model frame expressed at the host rate; also the size of the
    /// startup silence cushion.
    pub fn host_frame_size(&self) -> usize {
        self.state.lock().user_frame_size
    }

    pub fn set_f0_hz(&self, f0_hz: f32) {
        self.params
            .f0_hz
            .store(f0_hz.clamp(PITCH_MIN_HZ, PITCH_MAX_HZ), Ordering::Relaxed);
    }

    pub fn set_loudness_norm(&self, loudness_norm: f32) {
        self.params
            .loudness_norm
            .store(loudness_norm.clamp(0.0, 1.0), Ordering::Relaxed);
    }

    pub fn set_loudness_db(&self, loudness_db: f32) {
        let norm = dsp::normalized_loudness(loudness_db);
        self.set_loudness_norm(norm);
    }

    pub fn set_pitch_shift(&self, semitones: f32) {
        self.params
            .pitch_shift_semitones
            .store(semitones, Ordering::Relaxed);
    }

    pub fn set_harmonic_gain(&self, gain: f32) {
        self.params
            .harmonic_gain
            .store(gain.clamp(0.0, 10.0), Ordering::Relaxed);
    }

    pub fn set_noise_gain(&self, gain: f32) {
        self.params
            .noise_gain
            .store(gain.clamp(0.0, 10.0), Ordering::Relaxed);
    }

    pub fn current_pitch(&self) -> f32 {
        self.params.current_pitch.load(Ordering::Relaxed)
    }

    pub fn current_rms(&self) -> f32 {
        self.params.current_rms.load(Ordering::Relaxed)
    }

    pub fn params(&self) -> &Arc<SharedParams> {
        &self.params
    }

    /// Stop the worker, reset predictor and synthesizers, clear the ring,
    /// and restore the silence cushion.
    pub fn reset(&self) {
        self.stop();
        let mut state = self.state.lock();
        state.reset();
        self.output_ring.reset();
        if state.prepared {
            self.zero_pad_output(state.user_frame_size);
        }
    }
}

impl Default for InferencePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InferencePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
