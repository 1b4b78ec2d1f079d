use std::f32::consts::TAU;

/// Phase-continuous additive harmonic synthesizer.
///
/// Renders one hop of summed sinusoids at the model rate. The harmonic
/// distribution is Nyquist-filtered and renormalized in place, each
/// per-harmonic amplitude and the fundamental are midway-lerped from the
/// previous frame, and the running phase carries across hops so frame
/// boundaries stay glitch-free.
///
/// All working buffers are allocated in `new`; `render` does not allocate.
pub struct HarmonicSynthesizer {
    num_harmonics: usize,
    num_output_samples: usize,
    sample_rate: f32,

    previous_phase: f32,
    previous_f0: Option<f32>,
    #[allow(dead_code)]
    previous_amplitude: f32,
    previous_distribution: Vec<f32>,

    frame_frequencies: Vec<f32>,
    frequency_envelope: Vec<f32>,
    phases: Vec<f32>,
    // [num_harmonics][num_output_samples]
    harmonic_amplitudes: Vec<Vec<f32>>,
    render_buffer: Vec<f32>,
}

impl HarmonicSynthesizer {
    pub fn new(num_harmonics: usize, num_output_samples: usize, sample_rate: f32) -> Self {
        Self {
            num_harmonics,
            num_output_samples,
            sample_rate,
            previous_phase: 0.0,
            previous_f0: None,
            previous_amplitude: 0.0,
            previous_distribution: vec![0.0; num_harmonics],
            frame_frequencies: vec![0.0; num_harmonics],
            frequency_envelope: vec![0.0; num_output_samples],
            phases: vec![0.0; num_output_samples],
            harmonic_amplitudes: vec![vec![0.0; num_output_samples]; num_harmonics],
            render_buffer: vec![0.0; num_output_samples],
        }
    }

    pub fn reset(&mut self) {
        self.previous_phase = 0.0;
        self.previous_f0 = None;
        self.previous_amplitude = 0.0;
        self.previous_distribution.fill(0.0);
        self.render_buffer.fill(0.0);
    }

    /// Render one hop.
    ///
    /// `harmonic_distribution` is normalized and amplitude-scaled in place:
    /// coefficients above Nyquist are zeroed, the survivors are rescaled to
    /// sum to one, then everything is multiplied by `amplitude`.
    pub fn render(
        &mut self,
        harmonic_distribution: &mut [f32],
        amplitude: f32,
        f0_hz: f32,
    ) -> &[f32] {
        debug_assert_eq!(harmonic_distribution.len(), self.num_harmonics);

        self.normalize_distribution(harmonic_distribution, amplitude, f0_hz);
        self.previous_amplitude = amplitude;

        // First call has no history: flat envelope at the current f0.
        let previous_f0 = self.previous_f0.unwrap_or(f0_hz);
        midway_lerp(previous_f0, f0_hz, &mut self.frequency_envelope);
        self.previous_f0 = Some(f0_hz);

        for (h, envelope) in self.harmonic_amplitudes.iter_mut().enumerate() {
            midway_lerp(
                self.previous_distribution[h],
                harmonic_distribution[h],
                envelope,
            );
        }
        self.previous_distribution.copy_from_slice(harmonic_distribution);

        self.synthesize()
    }

    fn normalize_distribution(&mut self, distribution: &mut [f32], amplitude: f32, f0_hz: f32) {
        for (i, frequency) in self.frame_frequencies.iter_mut().enumerate() {
            *frequency = (i + 1) as f32 * f0_hz;
        }

        let nyquist = self.sample_rate / 2.0;
        for (coefficient, &frequency) in distribution.iter_mut().zip(&self.frame_frequencies) {
            if frequency >= nyquist {
                *coefficient = 0.0;
            }
        }

        let total: f32 = distribution.iter().sum();
        if total != 0.0 {
            for coefficient in distribution.iter_mut() {
                *coefficient /= total;
            }
        }

        for coefficient in distribution.iter_mut() {
            *coefficient *= amplitude;
        }
    }

    fn synthesize(&mut self) -> &[f32] {
        // Hz -> radians per sample, then cumulative sum = instantaneous
        // phase, offset by the phase carried over from the previous hop.
        let radians_per_sample = TAU / self.sample_rate;
        let mut accumulated = 0.0f32;
        for (phase, &frequency) in self.phases.iter_mut().zip(&self.frequency_envelope) {
            accumulated += frequency * radians_per_sample;
            *phase = accumulated + self.previous_phase;
        }
        self.previous_phase = self.phases[self.num_output_samples - 1] % TAU;

        self.render_buffer.fill(0.0);
        for (h, envelope) in self.harmonic_amplitudes.iter().enumerate() {
            let order = (h + 1) as f32;
            for ((out, &phase), &amp) in self
                .render_buffer
                .iter_mut()
                .zip(&self.phases)
                .zip(envelope)
            {
                *out += (phase * order).sin() * amp;
            }
        }

        &self.render_buffer
    }
}

/// First half: linear ramp from `first` to `last`; second half holds
/// `last`. Suppresses audible swoops across a 20 ms hop.
fn midway_lerp(first: f32, last: f32, out: &mut [f32]) {
    let mid = out.len() / 2;
    let span = mid as f32;
    for (i, value) in out[..mid].iter_mut().enumerate() {
        *value = first + (last - first) * i as f32 / span;
    }
    out[mid..].fill(last);
}
