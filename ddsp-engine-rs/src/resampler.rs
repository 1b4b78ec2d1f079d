use std::f32::consts::PI;

const TAPS_PER_PHASE: usize = 16;
const KAISER_BETA: f32 = 5.0;

/// Rational polyphase resampler with a Kaiser-windowed sinc prototype.
///
/// Converts between the model rate and the host rate. The delay line and
/// the fractional phase accumulator persist across `process` calls, so
/// consecutive hops resample phase-continuously and the long-run output
/// rate is exactly `dst_rate / src_rate` even when a single call's output
/// count is off by one.
///
/// `process` performs no heap allocation.
pub struct PolyphaseResampler {
    /// Flattened coefficient bank: phase `p`, tap `t` at `p * TAPS_PER_PHASE + t`.
    coefficients: Vec<f32>,
    history: Vec<f32>,
    hist_pos: usize,
    up_factor: usize,
    down_factor: usize,
    phase_acc: usize,
}

impl PolyphaseResampler {
    /// Build a resampler converting from `src_rate` to `dst_rate`.
    ///
    /// Cutoff sits at `min(pi/L, pi/M)` to suppress both imaging and
    /// aliasing; the interpolation branch gain is folded into the sinc.
    pub fn new(src_rate: u32, dst_rate: u32) -> Self {
        let g = gcd(src_rate, dst_rate);
        let up = (dst_rate / g) as usize;
        let down = (src_rate / g) as usize;

        let total_taps = TAPS_PER_PHASE * up;
        let cutoff = PI / up.max(down) as f32;
        let center = (total_taps - 1) as f32 / 2.0;

        let mut coefficients = vec![0.0f32; up * TAPS_PER_PHASE];
        for p in 0..up {
            for t in 0..TAPS_PER_PHASE {
                let i = p + t * up;
                let x = i as f32 - center;
                let sinc = if x.abs() < 1e-6 {
                    1.0
                } else {
                    (cutoff * x).sin() / (PI * x)
                };
                coefficients[p * TAPS_PER_PHASE + t] =
                    sinc * up as f32 * kaiser_window(i, total_taps, KAISER_BETA);
            }
        }

        Self {
            coefficients,
            history: vec![0.0; TAPS_PER_PHASE],
            hist_pos: 0,
            up_factor: up,
            down_factor: down,
            phase_acc: 0,
        }
    }

    /// Resample `input` into `output`, returning the number of samples
    /// written. `output` must hold at least
    /// [`PolyphaseResampler::max_output_len`] samples.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        let mut out_idx = 0;

        for &sample in input {
            self.history[self.hist_pos] = sample;
            self.hist_pos = (self.hist_pos + 1) % TAPS_PER_PHASE;

            while self.phase_acc < self.up_factor {
                let coeffs = &self.coefficients
                    [self.phase_acc * TAPS_PER_PHASE..(self.phase_acc + 1) * TAPS_PER_PHASE];
                let mut acc = 0.0f32;
                for (t, &c) in coeffs.iter().enumerate() {
                    let idx = (self.hist_pos + TAPS_PER_PHASE - 1 - t) % TAPS_PER_PHASE;
                    acc += self.history[idx] * c;
                }

                if out_idx < output.len() {
                    output[out_idx] = acc;
                }
                out_idx += 1;
                self.phase_acc += self.down_factor;
            }
            self.phase_acc -= self.up_factor;
        }

        out_idx
    }

    /// Upper bound on the output length for `input_len` input samples.
    pub fn max_output_len(input_len: usize, src_rate: u32, dst_rate: u32) -> usize {
        let num = input_len as u64 * dst_rate as u64 + src_rate as u64 - 1;
        (num / src_rate as u64) as usize + 1
    }

    /// Clear the delay line and phase accumulator.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.hist_pos = 0;
        self.phase_acc = 0;
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Modified zeroth-order Bessel function of the first kind.
fn bessel_i0(x: f32) -> f32 {
    let mut sum = 1.0f32;
    let mut term = 1.0f32;
    let x2 = x * x * 0.25;
    for k in 1..20 {
        term *= x2 / (k * k) as f32;
        sum += term;
        if term < 1e-10 * sum {
            break;
        }
    }
    sum
}

fn kaiser_window(n: usize, length: usize, beta: f32) -> f32 {
    let center = (length - 1) as f32 / 2.0;
    let x = (n as f32 - center) / center;
    bessel_i0(beta * (1.0 - x * x).max(0.0).sqrt()) / bessel_i0(beta)
}
