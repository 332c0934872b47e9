use rand::{distributions::Standard, Rng};
use rand_pcg::Pcg32;

use crate::math::Vec3;

/// A random float from a normal distribution with mean 0 and standard
/// deviation 1, via the Box-Muller transform.
///
/// https://en.wikipedia.org/wiki/Box%E2%80%93Muller_transform
pub fn random_normal(rng: &mut Pcg32) -> f32 {
    let theta = 2.0 * std::f32::consts::PI * rng.sample::<f32, _>(Standard);
    // Redraw zero so the log stays finite
    let u = loop {
        let u: f32 = rng.sample(Standard);
        if u > 0.0 {
            break u;
        }
    };
    let rho = (-2.0 * u.ln()).sqrt();

    rho * theta.cos()
}

/// A random unit vector, approximately uniform over the sphere: three
/// independent normal components, normalized.
pub fn random_direction(rng: &mut Pcg32) -> Vec3 {
    loop {
        let v = Vec3::new(
            random_normal(rng),
            random_normal(rng),
            random_normal(rng),
        );
        // Degenerate draws are vanishingly rare but would normalize to NaN
        if v.length_squared() > 1e-12 {
            return v.normalize();
        }
    }
}

/// Returns -1.0 or 1.0 with equal probability.
pub fn random_sign(rng: &mut Pcg32) -> f32 {
    if rng.sample::<f64, _>(Standard) > 0.5 {
        -1.0
    } else {
        1.0
    }
}
