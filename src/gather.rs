use std::collections::HashMap;

use crate::{
    bands::Band6Coefficients,
    error::{Result, SonoError},
    geometry::Ray,
    math::{Vec3, SPEED_OF_SOUND_MPS},
    scene::{Object, Room},
    sono_trace,
    tracer::SecondarySource,
};

/// One visible energy contribution at a receiver.
#[derive(Copy, Clone, Debug)]
pub struct EnergyPortion {
    pub energy_coefficients: Band6Coefficients,
    pub delay_ms: f32,
}

/// All energy portions gathered for one receiver, ordered by delay after
/// [Histogram::sort_by_delay] so time windows can be sliced out.
#[derive(Clone, Debug, Default)]
pub struct Histogram {
    pub portions: Vec<EnergyPortion>,
}

impl Histogram {
    pub fn is_empty(&self) -> bool {
        self.portions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.portions.len()
    }

    pub fn sort_by_delay(&mut self) {
        self.portions
            .sort_by(|a, b| a.delay_ms.total_cmp(&b.delay_ms));
    }

    /// Delay of the latest portion. Requires a sorted, non-empty histogram.
    pub fn last_delay_ms(&self) -> f32 {
        self.portions
            .last()
            .map_or(0.0, |portion| portion.delay_ms)
    }

    /// All portions with delay strictly within `(start_ms, end_ms)`.
    /// Requires the histogram to be sorted by delay.
    pub fn slice(&self, start_ms: f64, end_ms: f64) -> &[EnergyPortion] {
        let lower = self
            .portions
            .partition_point(|portion| f64::from(portion.delay_ms) <= start_ms);
        let upper = self
            .portions
            .partition_point(|portion| f64::from(portion.delay_ms) < end_ms);
        &self.portions[lower..upper.max(lower)]
    }
}

/// Histograms of one gather run, keyed by receiver name.
#[derive(Clone, Debug, Default)]
pub struct GatherResult {
    pub histograms: HashMap<String, Histogram>,
}

/// Line-of-sight check against the room geometry.
pub fn check_visibility(room: &Room, position_a: Vec3, position_b: Vec3) -> bool {
    let ray = Ray::new(position_a, (position_b - position_a).normalize());

    match room.closest_hit(&ray) {
        Some(hit) => hit.distance >= (position_b - position_a).length(),
        None => true,
    }
}

/// Collects the energy of every visible [SecondarySource] into per-receiver
/// histograms, applying Lambert's cosine law to reflected (order > 0)
/// contributions.
pub fn gather(
    room: &Room,
    sources: &[SecondarySource],
    microphones: &[&Object],
    clamp_lambert_cosine: bool,
    should_exit: &mut dyn FnMut() -> bool,
    progress: &mut dyn FnMut(f32),
) -> Result<GatherResult> {
    let mut result = GatherResult::default();
    let total = microphones.len() * sources.len();

    for (microphone_num, microphone) in microphones.iter().enumerate() {
        if should_exit() {
            return Err(SonoError::Cancelled);
        }

        sono_trace!(
            "gather: collecting contributions for receiver {}/{}",
            microphone_num + 1,
            microphones.len()
        );
        let histogram = result
            .histograms
            .entry(microphone.name.clone())
            .or_default();

        for (source_num, source) in sources.iter().enumerate() {
            if should_exit() {
                return Err(SonoError::Cancelled);
            }

            if check_visibility(room, source.position, microphone.position) {
                let mut energy_coefficients = source.energy_coefficients;

                if source.order > 0 {
                    // Lambert's cosine law: the energy received at the
                    // observer is proportional to the cosine of the angle
                    // between the surface normal and the direction to the
                    // receiver
                    let to_receiver = (microphone.position - source.position).normalize();
                    let mut cosine = source.normal.normalize().dot(to_receiver);
                    if clamp_lambert_cosine {
                        cosine = cosine.max(0.0);
                    }
                    energy_coefficients *= cosine;
                }

                let delay_ms = source.delay_ms
                    + (source.position - microphone.position).length() / SPEED_OF_SOUND_MPS
                        * 1000.0;

                histogram.portions.push(EnergyPortion {
                    energy_coefficients,
                    delay_ms,
                });
            }

            let done = microphone_num * sources.len() + source_num + 1;
            progress(done as f32 / total as f32);
        }

        histogram.sort_by_delay();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MaterialProperties, ObjectKind, Shape};
    use approx::assert_relative_eq;
    use rand::Rng;
    use rand_pcg::Pcg32;

    fn microphone(position: Vec3) -> Object {
        Object {
            name: "Mic1".into(),
            kind: ObjectKind::Microphone,
            active: true,
            position,
        }
    }

    fn source(position: Vec3, normal: Vec3, order: u32) -> SecondarySource {
        SecondarySource {
            order,
            position,
            normal,
            scatter_coefficient: 0.5,
            energy_coefficients: Band6Coefficients::default(),
            delay_ms: 0.0,
        }
    }

    fn divided_room() -> Room {
        // A single wall in the x = 0 plane
        let mut room = Room::rectangular(
            Vec3::new(-10.0, -10.0, -10.0),
            Vec3::new(10.0, 10.0, 10.0),
            MaterialProperties::default(),
        );
        let divider = Room::rectangular(
            Vec3::new(-0.1, -10.0, -10.0),
            Vec3::new(0.1, 10.0, 10.0),
            MaterialProperties::default(),
        );
        room.shapes.extend(divider.shapes.into_iter().map(|shape| Shape {
            name: "divider".into(),
            ..shape
        }));
        room
    }

    #[test]
    fn visibility_respects_occluders() {
        let room = divided_room();
        assert!(!check_visibility(
            &room,
            Vec3::new(-5.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0)
        ));
        assert!(check_visibility(
            &room,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0)
        ));
    }

    #[test]
    fn direct_sound_keeps_full_energy() {
        let room = Room::rectangular(
            Vec3::new(-10.0, -10.0, -10.0),
            Vec3::new(10.0, 10.0, 10.0),
            MaterialProperties::default(),
        );
        let microphone = microphone(Vec3::new(3.43, 0.0, 0.0));
        let sources = [source(Vec3::ZERO, Vec3::ZERO, 0)];

        let result = gather(
            &room,
            &sources,
            &[&microphone],
            false,
            &mut || false,
            &mut |_| {},
        )
        .unwrap();

        let histogram = &result.histograms["Mic1"];
        assert_eq!(histogram.len(), 1);
        let portion = &histogram.portions[0];
        assert_eq!(portion.energy_coefficients, Band6Coefficients::default());
        // 3.43 m at 343 m/s is 10 ms
        assert_relative_eq!(portion.delay_ms, 10.0, epsilon = 1e-4);
    }

    #[test]
    fn lambert_cosine_clamping_is_configurable() {
        let room = Room::rectangular(
            Vec3::new(-10.0, -10.0, -10.0),
            Vec3::new(10.0, 10.0, 10.0),
            MaterialProperties::default(),
        );
        let microphone = microphone(Vec3::new(5.0, 0.0, 0.0));
        // Surface normal faces away from the receiver
        let sources = [source(Vec3::ZERO, Vec3::new(-1.0, 0.0, 0.0), 1)];

        let unclamped = gather(
            &room,
            &sources,
            &[&microphone],
            false,
            &mut || false,
            &mut |_| {},
        )
        .unwrap();
        let portion = &unclamped.histograms["Mic1"].portions[0];
        assert_relative_eq!(portion.energy_coefficients[0], -1.0, epsilon = 1e-5);

        let clamped = gather(
            &room,
            &sources,
            &[&microphone],
            true,
            &mut || false,
            &mut |_| {},
        )
        .unwrap();
        let portion = &clamped.histograms["Mic1"].portions[0];
        assert_relative_eq!(portion.energy_coefficients[0], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn slice_bounds_are_strict() {
        let mut rng = Pcg32::new(0xfeed, 0);
        let mut histogram = Histogram::default();
        for _ in 0..500 {
            histogram.portions.push(EnergyPortion {
                energy_coefficients: Band6Coefficients::default(),
                delay_ms: rng.gen::<f32>() * 100.0,
            });
        }
        // Boundary values that must be excluded
        for delay_ms in [20.0, 30.0] {
            histogram.portions.push(EnergyPortion {
                energy_coefficients: Band6Coefficients::default(),
                delay_ms,
            });
        }
        histogram.sort_by_delay();

        let slice = histogram.slice(20.0, 30.0);
        let expected = histogram
            .portions
            .iter()
            .filter(|portion| 20.0 < portion.delay_ms && portion.delay_ms < 30.0)
            .count();
        assert_eq!(slice.len(), expected);
        assert!(slice
            .iter()
            .all(|portion| 20.0 < portion.delay_ms && portion.delay_ms < 30.0));
    }

    #[test]
    fn gather_cancellation() {
        let room = divided_room();
        let microphone = microphone(Vec3::new(5.0, 0.0, 0.0));
        let sources = vec![source(Vec3::new(1.0, 0.0, 0.0), Vec3::X, 1); 100];

        let mut checks = 0;
        let result = gather(
            &room,
            &sources,
            &[&microphone],
            false,
            &mut || {
                checks += 1;
                checks > 5
            },
            &mut |_| {},
        );
        assert!(matches!(result, Err(SonoError::Cancelled)));
    }
}
