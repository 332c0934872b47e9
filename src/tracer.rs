use itertools::{Itertools, MinMaxResult};
use rand_pcg::Pcg32;

use crate::{
    bands::Band6Coefficients,
    error::{Result, SonoError},
    geometry::{scatter_direction, Ray},
    math::{Vec3, SPEED_OF_SOUND_MPS},
    sampling,
    scene::{Object, Room},
    sono_trace,
};

/// Rays stop bouncing once their loudest band has dropped this far below
/// the emitted level.
pub const TERMINATION_THRESHOLD_DB: f32 = -60.0;

/// Hard bounce cap for rooms so lossless the dB cutoff barely bites.
pub const MAX_BOUNCES: u32 = 64;

/// A virtual source created at a ray-mesh bounce point, carrying the energy
/// and delay accumulated since the emitting speaker. Order 0 marks the
/// direct sound registered at the emitter itself.
#[derive(Clone, Debug)]
pub struct SecondarySource {
    pub order: u32,
    pub position: Vec3,
    pub normal: Vec3,
    pub scatter_coefficient: f32,
    pub energy_coefficients: Band6Coefficients,
    pub delay_ms: f32,
}

/// Everything one trace run produced, returned by value so no state leaks
/// between runs.
#[derive(Clone, Debug, Default)]
pub struct TraceResult {
    pub secondary_sources: Vec<SecondarySource>,
    /// Lowest and highest recorded bounce order, for host legends
    pub min_order: u32,
    pub max_order: u32,
    pub rays_traced: usize,
}

/// Casts `rays_per_source` random rays from every active speaker and records
/// a [SecondarySource] per bounce.
pub fn trace_scene(
    room: &Room,
    speakers: &[&Object],
    rays_per_source: u32,
    rng: &mut Pcg32,
    should_exit: &mut dyn FnMut() -> bool,
    progress: &mut dyn FnMut(f32),
) -> Result<TraceResult> {
    let mut secondary_sources = Vec::new();
    let total_rays = speakers.len() * rays_per_source as usize;

    for (speaker_num, speaker) in speakers.iter().enumerate() {
        if should_exit() {
            return Err(SonoError::Cancelled);
        }

        sono_trace!(
            "trace: casting {} rays for source {}/{}",
            rays_per_source,
            speaker_num + 1,
            speakers.len()
        );

        // Register the direct sound so it participates in gathering like any
        // reflection
        secondary_sources.push(SecondarySource {
            order: 0,
            position: speaker.position,
            normal: Vec3::ZERO,
            scatter_coefficient: 0.0,
            energy_coefficients: Band6Coefficients::default(),
            delay_ms: 0.0,
        });

        for ray_num in 0..rays_per_source {
            if should_exit() {
                return Err(SonoError::Cancelled);
            }

            let ray = Ray::new(speaker.position, sampling::random_direction(rng));
            trace_ray(room, ray, &mut secondary_sources, rng);

            let rays_done = speaker_num * rays_per_source as usize + ray_num as usize + 1;
            progress(rays_done as f32 / total_rays as f32);
        }
    }

    let (min_order, max_order) = match secondary_sources
        .iter()
        .filter(|source| source.order > 0)
        .map(|source| source.order)
        .minmax()
    {
        MinMaxResult::NoElements => (1, 1),
        MinMaxResult::OneElement(order) => (order, order),
        MinMaxResult::MinMax(min, max) => (min, max),
    };

    Ok(TraceResult {
        secondary_sources,
        min_order,
        max_order,
        rays_traced: total_rays,
    })
}

/// Bounces one ray through the room until it escapes, runs out of energy or
/// hits the bounce cap.
fn trace_ray(room: &Room, mut ray: Ray, sources: &mut Vec<SecondarySource>, rng: &mut Pcg32) {
    let mut order = 0;
    let mut energy_coefficients = Band6Coefficients::default();
    let mut delay_ms = 0.0;

    while energy_coefficients.relative_volume_db() > TERMINATION_THRESHOLD_DB
        && order < MAX_BOUNCES
    {
        let Some(hit) = room.closest_hit(&ray) else {
            break;
        };

        order += 1;
        delay_ms += hit.distance / SPEED_OF_SOUND_MPS * 1000.0;
        energy_coefficients *= -hit.material.absorption;

        // The recorded copy is additionally scaled by the surface roughness;
        // the propagating state is not
        sources.push(SecondarySource {
            order,
            position: hit.point,
            normal: hit.normal,
            scatter_coefficient: hit.material.roughness,
            energy_coefficients: energy_coefficients * hit.material.roughness,
            delay_ms,
        });

        ray.position = hit.point;
        ray.direction = scatter_direction(ray.direction, hit.normal, hit.material.roughness, rng);
    }
}
