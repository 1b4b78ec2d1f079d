use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Filtered-noise synthesizer.
///
/// Designs a linear-phase FIR by frequency sampling of the predicted band
/// magnitudes, then filters one hop of white noise with it via FFT
/// convolution. Each frame is independent; the only state carried across
/// renders is the RNG stream.
///
/// FFT plans and every working buffer are allocated in `new`; `render`
/// does not allocate.
pub struct NoiseSynthesizer {
    num_bands: usize,
    num_output_samples: usize,
    ir_length: usize,
    fft_size: usize,

    rng: SmallRng,
    zp_hann_window: Vec<f32>,

    window_ifft: Arc<dyn Fft<f32>>,
    convolve_fft: Arc<dyn Fft<f32>>,
    convolve_ifft: Arc<dyn Fft<f32>>,
    fft_scratch: Vec<Complex<f32>>,

    design_spectrum: Vec<Complex<f32>>,
    impulse_response: Vec<f32>,
    ir_spectrum: Vec<Complex<f32>>,
    noise_spectrum: Vec<Complex<f32>>,
    noise_audio: Vec<f32>,
}

impl NoiseSynthesizer {
    pub fn new(num_bands: usize, num_output_samples: usize) -> Self {
        let ir_length = (num_bands - 1) * 2;
        let fft_size = (ir_length + num_output_samples).next_power_of_two();

        let mut planner = FftPlanner::new();
        let window_ifft = planner.plan_fft_inverse(ir_length);
        let convolve_fft = planner.plan_fft_forward(fft_size);
        let convolve_ifft = planner.plan_fft_inverse(fft_size);
        let scratch_len = window_ifft
            .get_inplace_scratch_len()
            .max(convolve_fft.get_inplace_scratch_len())
            .max(convolve_ifft.get_inplace_scratch_len());

        Self {
            num_bands,
            num_output_samples,
            ir_length,
            fft_size,
            rng: SmallRng::from_entropy(),
            zp_hann_window: zero_phase_hann(ir_length),
            window_ifft,
            convolve_fft,
            convolve_ifft,
            fft_scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            design_spectrum: vec![Complex::new(0.0, 0.0); ir_length],
            impulse_response: vec![0.0; ir_length],
            ir_spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            noise_spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            noise_audio: vec![0.0; num_output_samples],
        }
    }

    pub fn reset(&mut self) {
        self.noise_audio.fill(0.0);
        self.impulse_response.fill(0.0);
    }

    /// Render one hop of filtered noise from the band magnitudes.
    pub fn render(&mut self, magnitudes: &[f32]) -> &[f32] {
        debug_assert_eq!(magnitudes.len(), self.num_bands);
        self.design_impulse_response(magnitudes);
        self.convolve();
        &self.noise_audio
    }

    /// Frequency-sampling FIR design: the band magnitudes become the
    /// zero-phase spectrum, the inverse FFT gives the impulse response,
    /// which is windowed and rotated into causal linear-phase form.
    fn design_impulse_response(&mut self, magnitudes: &[f32]) {
        self.design_spectrum.fill(Complex::new(0.0, 0.0));
        for (bin, &magnitude) in self.design_spectrum.iter_mut().zip(magnitudes) {
            *bin = Complex::new(magnitude, 0.0);
        }
        // Hermitian mirror so the inverse transform is real-valued.
        for i in 1..self.num_bands - 1 {
            self.design_spectrum[self.ir_length - i] = self.design_spectrum[i].conj();
        }

        self.window_ifft
            .process_with_scratch(&mut self.design_spectrum, &mut self.fft_scratch);

        let scale = 1.0 / self.ir_length as f32;
        for ((sample, bin), &window) in self
            .impulse_response
            .iter_mut()
            .zip(&self.design_spectrum)
            .zip(&self.zp_hann_window)
        {
            *sample = bin.re * scale * window;
        }

        // Rotate the zero-phase response to causal form (peak at center).
        self.impulse_response.rotate_left(self.ir_length / 2);
    }

    fn convolve(&mut self) {
        // Zero-padded IR spectrum
        self.ir_spectrum.fill(Complex::new(0.0, 0.0));
        for (bin, &sample) in self.ir_spectrum.iter_mut().zip(&self.impulse_response) {
            *bin = Complex::new(sample, 0.0);
        }

        // White noise on [-1, 1]
        for bin in self.noise_spectrum.iter_mut() {
            *bin = Complex::new(self.rng.gen_range(-1.0..=1.0), 0.0);
        }

        self.convolve_fft
            .process_with_scratch(&mut self.ir_spectrum, &mut self.fft_scratch);
        self.convolve_fft
            .process_with_scratch(&mut self.noise_spectrum, &mut self.fft_scratch);

        for (noise_bin, &ir_bin) in self.noise_spectrum.iter_mut().zip(&self.ir_spectrum) {
            *noise_bin *= ir_bin;
        }

        self.convolve_ifft
            .process_with_scratch(&mut self.noise_spectrum, &mut self.fft_scratch);

        // Crop past the filter's group delay. The extra -1 matches the
        // causal rotation above and is kept bit-compatible.
        let delay = (self.ir_length - 1) / 2 - 1;
        let scale = 1.0 / self.fft_size as f32;
        for (out, bin) in self
            .noise_audio
            .iter_mut()
            .zip(&self.noise_spectrum[delay..delay + self.num_output_samples])
        {
            *out = bin.re * scale;
        }
    }
}

/// Length-N Hann window rotated so it is centered at index 0.
fn zero_phase_hann(length: usize) -> Vec<f32> {
    let mut window: Vec<f32> = (0..length)
        .map(|i| 0.5 * (1.0 - (std::f32::consts::TAU * i as f32 / length as f32).cos()))
        .collect();
    window.rotate_left(length / 2);
    window
}
