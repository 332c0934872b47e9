/// Second-order band-pass IIR filter, bilinear transform design with unity
/// gain at the center frequency.
pub struct BandPassFilter {
    b0: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BandPassFilter {
    /// Creates a band-pass centered on `center_frequency_hz` with the given
    /// quality factor. `center_frequency_hz` must be below Nyquist.
    pub fn new(sample_rate: f64, center_frequency_hz: f64, q: f64) -> Self {
        let n = 1.0 / (std::f64::consts::PI * center_frequency_hz / sample_rate).tan();
        let n_squared = n * n;
        let c1 = 1.0 / (1.0 + n / q + n_squared);

        Self {
            b0: c1 * n / q,
            b2: -c1 * n / q,
            a1: c1 * 2.0 * (1.0 - n_squared),
            a2: c1 * (1.0 - n / q + n_squared),
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Filters `samples` in place, carrying state across calls.
    pub fn process(&mut self, samples: &mut [f32]) {
        for sample in samples {
            let x = f64::from(*sample);
            // b1 is zero for this design
            let y = self.b0 * x + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;

            self.x2 = self.x1;
            self.x1 = x;
            self.y2 = self.y1;
            self.y1 = y;

            *sample = y as f32;
        }
    }
}

/// Applies the band-pass forward and backward over the whole buffer:
/// filter, reverse, filter again with fresh state, reverse back. The second
/// pass cancels the phase shift of the first, which shapes envelopes
/// without smearing onsets asymmetrically.
pub fn zero_phase_band_pass(samples: &mut [f32], sample_rate: f64, center_frequency_hz: f64, q: f64) {
    let mut forward = BandPassFilter::new(sample_rate, center_frequency_hz, q);
    forward.process(samples);
    samples.reverse();

    let mut backward = BandPassFilter::new(sample_rate, center_frequency_hz, q);
    backward.process(samples);
    samples.reverse();
}
