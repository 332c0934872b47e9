pub use glam::{IVec3, Vec3};

/// Speed of sound in air used for all delay accounting.
pub const SPEED_OF_SOUND_MPS: f32 = 343.0;

/// Mirror reflection of `d` around the surface normal `n`.
/// `n` is expected to be normalized.
pub fn reflect(d: Vec3, n: Vec3) -> Vec3 {
    d - 2.0 * d.dot(n) * n
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reflect_flips_normal_component() {
        let d = Vec3::new(1.0, -1.0, 0.0).normalize();
        let n = Vec3::Y;
        let r = reflect(d, n);
        assert_relative_eq!(r.x, d.x, epsilon = 1e-6);
        assert_relative_eq!(r.y, -d.y, epsilon = 1e-6);
        assert_relative_eq!(r.length(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn reflect_preserves_tangential_rays() {
        // Direction orthogonal to the normal reflects onto itself
        let d = Vec3::X;
        let r = reflect(d, Vec3::Y);
        assert_relative_eq!(r.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(r.y, 0.0, epsilon = 1e-6);
    }
}
