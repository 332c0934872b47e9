use approx::{AbsDiffEq, RelativeEq};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut, Mul, MulAssign, Neg};

/// Center frequencies of the six octave bands, 125 Hz doubling up to 4 kHz.
pub const BAND_CENTER_FREQUENCIES_HZ: [f32; 6] =
    [125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0];

/// Number of octave bands tracked per surface and per energy packet.
pub const BAND_COUNT: usize = 6;

/// A fixed six-element per-octave-band vector, used both for surface
/// absorption and for accumulated ray energy.
///
/// Defaults to all ones: full energy for a fresh ray, total absorption for an
/// unspecified material.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Band6Coefficients {
    pub bands: [f32; BAND_COUNT],
}

impl Band6Coefficients {
    pub fn new(bands: [f32; BAND_COUNT]) -> Self {
        Self { bands }
    }

    /// Creates coefficients with the same value in every band.
    pub fn splat(value: f32) -> Self {
        Self {
            bands: [value; BAND_COUNT],
        }
    }

    /// Level of the loudest band relative to unity, in dB.
    ///
    /// Magnitudes are used so the complement-negated energy chain (see
    /// [`Neg`](#impl-Neg-for-Band6Coefficients)) can be thresholded no matter
    /// how many sign flips it has accumulated. All-zero coefficients report
    /// negative infinity.
    pub fn relative_volume_db(&self) -> f32 {
        let peak = self
            .bands
            .iter()
            .fold(0.0f32, |acc, band| acc.max(band.abs()));
        20.0 * peak.log10()
    }
}

impl Default for Band6Coefficients {
    fn default() -> Self {
        Self::splat(1.0)
    }
}

impl Index<usize> for Band6Coefficients {
    type Output = f32;

    fn index(&self, index: usize) -> &f32 {
        &self.bands[index]
    }
}

impl IndexMut<usize> for Band6Coefficients {
    fn index_mut(&mut self, index: usize) -> &mut f32 {
        &mut self.bands[index]
    }
}

/// Complement negation: `(-c)[i] == c[i] - 1.0`.
///
/// This is the absorption-to-energy-multiplier conversion used by the
/// per-bounce update `energy *= -absorption`: each band is scaled by
/// `absorption - 1`, a factor of magnitude `1 - absorption` that flips the
/// accumulated sign on every bounce.
impl Neg for Band6Coefficients {
    type Output = Self;

    fn neg(self) -> Self {
        let mut ret = self;
        for band in &mut ret.bands {
            *band -= 1.0;
        }
        ret
    }
}

impl MulAssign for Band6Coefficients {
    fn mul_assign(&mut self, other: Self) {
        for (band, other_band) in self.bands.iter_mut().zip(other.bands) {
            *band *= other_band;
        }
    }
}

impl Mul for Band6Coefficients {
    type Output = Self;

    fn mul(mut self, other: Self) -> Self {
        self *= other;
        self
    }
}

impl MulAssign<f32> for Band6Coefficients {
    fn mul_assign(&mut self, scalar: f32) {
        for band in &mut self.bands {
            *band *= scalar;
        }
    }
}

impl Mul<f32> for Band6Coefficients {
    type Output = Self;

    fn mul(mut self, scalar: f32) -> Self {
        self *= scalar;
        self
    }
}

impl AbsDiffEq for Band6Coefficients {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.bands
            .iter()
            .zip(other.bands.iter())
            .all(|(a, b)| a.abs_diff_eq(b, epsilon))
    }
}

impl RelativeEq for Band6Coefficients {
    fn default_max_relative() -> f32 {
        f32::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f32, max_relative: f32) -> bool {
        self.bands
            .iter()
            .zip(other.bands.iter())
            .all(|(a, b)| a.relative_eq(b, epsilon, max_relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn complement_negation() {
        let absorption = Band6Coefficients::new([0.0, 0.1, 0.25, 0.5, 0.9, 1.0]);
        let negated = -absorption;
        assert_abs_diff_eq!(
            negated,
            Band6Coefficients::new([-1.0, -0.9, -0.75, -0.5, -0.1, 0.0]),
            epsilon = 1e-6
        );
    }

    #[test]
    fn energy_update_chain_flips_sign() {
        // energy *= -absorption, twice, with absorption 0.1 everywhere
        let absorption = Band6Coefficients::splat(0.1);
        let mut energy = Band6Coefficients::default();

        energy *= -absorption;
        assert_relative_eq!(energy, Band6Coefficients::splat(-0.9), epsilon = 1e-6);

        energy *= -absorption;
        assert_relative_eq!(energy, Band6Coefficients::splat(0.81), epsilon = 1e-6);
    }

    #[test]
    fn relative_volume_uses_peak_magnitude() {
        let energy = Band6Coefficients::new([0.001, -0.1, 0.0, 0.0, 0.0, 0.0]);
        assert_relative_eq!(energy.relative_volume_db(), -20.0, epsilon = 1e-4);

        assert_relative_eq!(
            Band6Coefficients::default().relative_volume_db(),
            0.0,
            epsilon = 1e-6
        );
        assert_eq!(
            Band6Coefficients::splat(0.0).relative_volume_db(),
            f32::NEG_INFINITY
        );
    }

    #[test]
    fn scalar_multiply() {
        let mut energy = Band6Coefficients::splat(-0.9);
        energy *= 0.5;
        assert_relative_eq!(energy, Band6Coefficients::splat(-0.45), epsilon = 1e-6);
    }
}
