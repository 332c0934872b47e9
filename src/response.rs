use rand::{distributions::Standard, Rng};
use rand_pcg::Pcg32;

use crate::{
    bands::{BAND_CENTER_FREQUENCIES_HZ, BAND_COUNT},
    config::{ExcitationMode, SimulationSettings},
    error::{Result, SonoError},
    filter,
    gather::Histogram,
    math::SPEED_OF_SOUND_MPS,
    sono_debug, sono_trace,
};

/// Band-pass quality factor used for all six octave bands.
const BAND_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// An empty histogram window decays the previous gain to zero over this span.
const GAIN_DECAY_MS: f64 = 10.0;

/// Event rate cap of the Poisson model, so late-tail intervals can't
/// degenerate to fractions of a sample.
const MAX_EVENT_RATE: f64 = 10_000.0;

/// The synthesized impulse response, one buffer per output channel.
#[derive(Clone, Debug)]
pub struct ImpulseResponse {
    pub sample_rate: f64,
    pub channels: Vec<Vec<f32>>,
}

impl ImpulseResponse {
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

/// Synthesizes the impulse response for one receiver from its gathered
/// histogram and the estimated room volume.
///
/// The histogram must be sorted by delay and non-empty.
pub fn synthesize(
    receiver: &str,
    histogram: &Histogram,
    room_volume_m3: f32,
    settings: &SimulationSettings,
    rng: &mut Pcg32,
    should_exit: &mut dyn FnMut() -> bool,
    progress: &mut dyn FnMut(f32),
) -> Result<ImpulseResponse> {
    if histogram.is_empty() {
        return Err(SonoError::EmptyHistogram {
            receiver: receiver.into(),
        });
    }

    let sample_rate = settings.sample_rate;
    let latest_reflection_s = f64::from(histogram.last_delay_ms()) / 1000.0;
    let num_samples = (sample_rate * (latest_reflection_s + 0.1)).round() as usize;
    let num_channels = settings.channels.channel_count();

    sono_debug!(
        "synthesize: {} samples at {} Hz for receiver {}",
        num_samples,
        sample_rate,
        receiver
    );

    let excitation = match settings.excitation {
        ExcitationMode::WhiteNoise => white_noise(num_channels, num_samples, rng),
        ExcitationMode::DiracSequence => dirac_sequence(
            num_channels,
            num_samples,
            histogram,
            f64::from(room_volume_m3),
            sample_rate,
            rng,
            should_exit,
        )?,
    };

    let gain_curves = gain_curves(histogram, num_samples, sample_rate, should_exit, progress)?;

    // Weigh each zero-phase filtered band with its envelope and sum
    let mut channels = vec![vec![0.0f32; num_samples]; num_channels];
    for (band, center_frequency) in BAND_CENTER_FREQUENCIES_HZ.iter().enumerate() {
        if should_exit() {
            return Err(SonoError::Cancelled);
        }
        sono_trace!(
            "synthesize: filtering band {}/{} ({} Hz)",
            band + 1,
            BAND_COUNT,
            center_frequency
        );

        for (channel, output) in channels.iter_mut().enumerate() {
            let mut band_buffer = excitation[channel].clone();
            filter::zero_phase_band_pass(
                &mut band_buffer,
                sample_rate,
                f64::from(*center_frequency),
                BAND_Q,
            );

            for sample in 0..num_samples {
                output[sample] += band_buffer[sample] * gain_curves[band][sample];
            }
        }
    }

    Ok(ImpulseResponse {
        sample_rate,
        channels,
    })
}

/// Full-bandwidth excitation: uniform samples in [-1, 1).
fn white_noise(num_channels: usize, num_samples: usize, rng: &mut Pcg32) -> Vec<Vec<f32>> {
    let mut channels = vec![vec![0.0f32; num_samples]; num_channels];
    for channel in &mut channels {
        for sample in channel.iter_mut() {
            *sample = (rng.sample::<f32, _>(Standard) - 0.5) * 2.0;
        }
    }
    channels
}

/// Sparse excitation: a Poisson process of unit diracs with random sign,
/// rate growing quadratically with time as the reflection density of the
/// room builds up.
///
/// See section 5.3.4 in Dirk Schroeder, "Physically Based Real-Time
/// Auralization of Interactive Virtual Environments".
fn dirac_sequence(
    num_channels: usize,
    num_samples: usize,
    histogram: &Histogram,
    room_volume_m3: f64,
    sample_rate: f64,
    rng: &mut Pcg32,
    should_exit: &mut dyn FnMut() -> bool,
) -> Result<Vec<Vec<f32>>> {
    let mut channels = vec![vec![0.0f32; num_samples]; num_channels];

    let sample_length_ms = 1.0 / sample_rate * 1000.0;
    let latest_reflection_ms = f64::from(histogram.last_delay_ms());
    let mut end_of_previous_interval_ms = f64::from(histogram.portions[0].delay_ms);

    // Intervals are floored to a sample period, so a healthy sequence can't
    // have many more events than samples
    let max_events = num_samples * 4 + 16;
    let mut events = 0usize;

    while end_of_previous_interval_ms < latest_reflection_ms {
        if should_exit() {
            return Err(SonoError::Cancelled);
        }
        events += 1;
        if events > max_events {
            return Err(SonoError::DidNotConverge {
                stage: "dirac sequence generation",
            });
        }

        // Uniform in (0, 1]: it ends up in a denominator below
        let random_number = (rng.sample::<f64, _>(Standard) - 1.0).abs();
        let current_time_s = end_of_previous_interval_ms / 1000.0;

        let speed_of_sound_mps = f64::from(SPEED_OF_SOUND_MPS);
        let u = (4.0 * std::f64::consts::PI * speed_of_sound_mps.powi(3) * current_time_s
            * current_time_s
            / room_volume_m3)
            .min(MAX_EVENT_RATE);

        let mut interval_size_ms = 1.0 / u * (1.0 / random_number).ln() * 1000.0;
        // Also catches the NaN/zero-rate degeneracies of a start at t = 0
        if !(interval_size_ms >= sample_length_ms) {
            interval_size_ms = sample_length_ms;
        }

        let dirac = if rng.sample::<f64, _>(Standard) > 0.5 {
            -1.0
        } else {
            1.0
        };

        let event_time_ms =
            end_of_previous_interval_ms + rng.sample::<f64, _>(Standard) * interval_size_ms;
        let sample = (event_time_ms * sample_rate / 1000.0) as usize;
        if sample < num_samples {
            for channel in &mut channels {
                channel[sample] = dirac;
            }
        }

        end_of_previous_interval_ms += interval_size_ms;
    }

    Ok(channels)
}

/// One gain envelope per band: the average band energy of the histogram
/// portions falling into each sample window, decaying toward zero while
/// windows stay empty.
fn gain_curves(
    histogram: &Histogram,
    num_samples: usize,
    sample_rate: f64,
    should_exit: &mut dyn FnMut() -> bool,
    progress: &mut dyn FnMut(f32),
) -> Result<Vec<Vec<f32>>> {
    let mut curves = vec![vec![0.0f32; num_samples]; BAND_COUNT];
    let mut gains = [0.0f32; BAND_COUNT];

    for sample in 0..num_samples {
        if sample % 1024 == 0 {
            if should_exit() {
                return Err(SonoError::Cancelled);
            }
            progress(sample as f32 / num_samples as f32);
        }

        let start_time_ms = sample as f64 / sample_rate * 1000.0;
        let end_time_ms = start_time_ms + 1000.0 / sample_rate;
        let slice = histogram.slice(start_time_ms, end_time_ms);

        for band in 0..BAND_COUNT {
            if !slice.is_empty() {
                gains[band] = slice
                    .iter()
                    .map(|portion| portion.energy_coefficients[band])
                    .sum::<f32>()
                    / slice.len() as f32;
            } else {
                let duration_ms = end_time_ms - start_time_ms;
                gains[band] *= if duration_ms < GAIN_DECAY_MS {
                    1.0 - (duration_ms / GAIN_DECAY_MS) as f32
                } else {
                    0.0
                };
            }

            curves[band][sample] = gains[band];
        }
    }

    progress(1.0);
    Ok(curves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bands::Band6Coefficients,
        config::{ChannelLayout, VolumeQuality},
        gather::EnergyPortion,
    };

    fn test_histogram(delays_ms: &[f32]) -> Histogram {
        let mut histogram = Histogram {
            portions: delays_ms
                .iter()
                .map(|&delay_ms| EnergyPortion {
                    energy_coefficients: Band6Coefficients::splat(0.5),
                    delay_ms,
                })
                .collect(),
        };
        histogram.sort_by_delay();
        histogram
    }

    fn test_settings(excitation: ExcitationMode) -> SimulationSettings {
        SimulationSettings {
            rays_per_source: 10,
            volume_quality: VolumeQuality::Off,
            sample_rate: 8_000.0,
            channels: ChannelLayout::Mono,
            excitation,
            clamp_lambert_cosine: false,
            seed: 1234,
        }
    }

    #[test]
    fn buffer_length_matches_latest_reflection() {
        let histogram = test_histogram(&[10.3, 31.7, 50.9]);
        let settings = test_settings(ExcitationMode::WhiteNoise);
        let mut rng = Pcg32::new(settings.seed, 0);

        let ir = synthesize(
            "Mic1",
            &histogram,
            120.0,
            &settings,
            &mut rng,
            &mut || false,
            &mut |_| {},
        )
        .unwrap();

        let expected = (8_000.0f64 * (50.9 / 1000.0 + 0.1)).round() as usize;
        assert_eq!(ir.num_samples(), expected);
        assert_eq!(ir.num_channels(), 1);
    }

    #[test]
    fn stereo_runs_produce_two_channels() {
        let histogram = test_histogram(&[10.3, 31.7]);
        let settings = SimulationSettings {
            channels: ChannelLayout::Stereo,
            ..test_settings(ExcitationMode::DiracSequence)
        };
        let mut rng = Pcg32::new(settings.seed, 0);

        let ir = synthesize(
            "Mic1",
            &histogram,
            120.0,
            &settings,
            &mut rng,
            &mut || false,
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(ir.num_channels(), 2);
        assert_eq!(ir.channels[0].len(), ir.channels[1].len());
    }

    #[test]
    fn output_is_silent_before_the_first_reflection() {
        let first_delay_ms = 12.7f32;
        let histogram = test_histogram(&[first_delay_ms, 40.1]);
        let settings = test_settings(ExcitationMode::DiracSequence);
        let mut rng = Pcg32::new(settings.seed, 0);

        let ir = synthesize(
            "Mic1",
            &histogram,
            120.0,
            &settings,
            &mut rng,
            &mut || false,
            &mut |_| {},
        )
        .unwrap();

        let first_sample = (f64::from(first_delay_ms) / 1000.0 * 8_000.0) as usize;
        assert!(ir.channels[0][..first_sample]
            .iter()
            .all(|&sample| sample == 0.0));
        assert!(ir.channels[0][first_sample..]
            .iter()
            .any(|&sample| sample != 0.0));
    }

    #[test]
    fn synthesis_is_idempotent_by_seed() {
        let histogram = test_histogram(&[10.3, 20.9, 33.1, 47.6]);
        let settings = test_settings(ExcitationMode::DiracSequence);

        let mut runs = Vec::new();
        for _ in 0..2 {
            let mut rng = Pcg32::new(settings.seed, 0);
            runs.push(
                synthesize(
                    "Mic1",
                    &histogram,
                    200.0,
                    &settings,
                    &mut rng,
                    &mut || false,
                    &mut |_| {},
                )
                .unwrap(),
            );
        }
        assert_eq!(runs[0].channels, runs[1].channels);
    }

    #[test]
    fn empty_histogram_is_nothing_to_do() {
        let histogram = Histogram::default();
        let settings = test_settings(ExcitationMode::WhiteNoise);
        let mut rng = Pcg32::new(0, 0);

        let result = synthesize(
            "Mic1",
            &histogram,
            100.0,
            &settings,
            &mut rng,
            &mut || false,
            &mut |_| {},
        );
        match result {
            Err(err) => assert!(err.is_nothing_to_do()),
            Ok(_) => panic!("empty histogram must not synthesize"),
        }
    }

    #[test]
    fn cancellation_interrupts_synthesis() {
        let histogram = test_histogram(&[10.3, 500.9]);
        let settings = test_settings(ExcitationMode::WhiteNoise);
        let mut rng = Pcg32::new(1, 0);

        let mut checks = 0;
        let result = synthesize(
            "Mic1",
            &histogram,
            100.0,
            &settings,
            &mut rng,
            &mut || {
                checks += 1;
                checks > 2
            },
            &mut |_| {},
        );
        assert!(matches!(result, Err(SonoError::Cancelled)));
    }
}
