use std::collections::{HashSet, VecDeque};

use crate::{
    error::{Result, SonoError},
    geometry::Ray,
    math::{IVec3, Vec3},
    scene::Room,
    sono_debug,
    tracer::SecondarySource,
};

/// Flood fills exceeding this many cubes are treated as leaking rooms.
pub const MAX_FLOOD_CUBES: usize = 2_000_000;

/// Lattice point the fill starts from: 1 m up the Z axis, which has to lie
/// inside the room.
const FLOOD_START_CM: IVec3 = IVec3::new(0, 0, 100);

fn fold_signed(n: i64) -> u64 {
    // Mirror the negative half onto odd numbers so both signs stay distinct
    if n < 0 {
        (-2 * n - 1) as u64
    } else {
        (2 * n) as u64
    }
}

fn cantor_pair(a: u64, b: u64) -> u64 {
    (a + b) * (a + b + 1) / 2 + b
}

/// Maps a signed lattice coordinate to a unique non-negative key via nested
/// Cantor pairing of the sign-mirrored components. Injective over the
/// coordinate range flood filling can reach; a collision here would silently
/// corrupt the visited set.
pub fn cube_key(cube: IVec3) -> u64 {
    cantor_pair(
        cantor_pair(fold_signed(cube.x as i64), fold_signed(cube.y as i64)),
        fold_signed(cube.z as i64),
    )
}

/// Coarse room volume from the bounding box of all secondary-source
/// positions, extents measured from the origin outward, floored to a
/// multiple of 10 m^3.
pub fn bounding_box_volume(sources: &[SecondarySource]) -> f32 {
    let mut min = Vec3::ZERO;
    let mut max = Vec3::ZERO;

    for source in sources {
        min = min.min(source.position);
        max = max.max(source.position);
    }

    let volume = (min.x.abs() + max.x.abs())
        * (min.y.abs() + max.y.abs())
        * (min.z.abs() + max.z.abs());
    (volume / 10.0).floor() * 10.0
}

/// Refined room volume: breadth-first flood fill over a cube lattice of
/// `cube_size_cm` edge length, corrected for voxelization error.
pub fn flood_volume(
    room: &Room,
    cube_size_cm: i32,
    should_exit: &mut dyn FnMut() -> bool,
) -> Result<f32> {
    flood_volume_with_cap(room, cube_size_cm, MAX_FLOOD_CUBES, should_exit)
}

fn flood_volume_with_cap(
    room: &Room,
    cube_size_cm: i32,
    max_cubes: usize,
    should_exit: &mut dyn FnMut() -> bool,
) -> Result<f32> {
    // Rays are blocked well before a full cube diagonal so the fill can't
    // slip through corner gaps between lattice points
    let collision_margin_m = 3.0f32.sqrt() * cube_size_cm as f32 / 100.0 * 1.5;

    let mut visited: HashSet<u64> = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(FLOOD_START_CM);

    while let Some(cube) = queue.pop_front() {
        if should_exit() {
            return Err(SonoError::Cancelled);
        }
        if visited.len() >= max_cubes {
            return Err(SonoError::DidNotConverge {
                stage: "room volume flood fill",
            });
        }

        let offsets = [
            IVec3::new(-cube_size_cm, 0, 0),
            IVec3::new(cube_size_cm, 0, 0),
            IVec3::new(0, -cube_size_cm, 0),
            IVec3::new(0, cube_size_cm, 0),
            IVec3::new(0, 0, -cube_size_cm),
            IVec3::new(0, 0, cube_size_cm),
        ];

        for offset in offsets {
            let neighbor = cube + offset;
            if !visited.insert(cube_key(neighbor)) {
                continue;
            }

            // Blocked neighbors stay in the visited count; they form the
            // boundary layer the correction factor was calibrated with
            let from = cube.as_vec3() / 100.0;
            let to = neighbor.as_vec3() / 100.0;
            let ray = Ray::new(from, (to - from).normalize());
            let collides = room
                .closest_hit(&ray)
                .map_or(false, |hit| hit.distance < collision_margin_m);

            if !collides {
                queue.push_back(neighbor);
            }
        }
    }

    sono_debug!(
        "flood fill visited {} cubes at {} cm",
        visited.len(),
        cube_size_cm
    );

    let cube_volume = (f64::from(cube_size_cm) / 100.0).powi(3);
    let volume = correction_factor(cube_size_cm) * visited.len() as f64 * cube_volume;
    Ok(volume as f32)
}

/// Empirically fitted compensation for the voxelization error of a given
/// cube size. A calibration constant, not physics.
fn correction_factor(cube_size_cm: i32) -> f64 {
    let s = f64::from(cube_size_cm);
    5e-5 * s * s - 0.0025 * s + 1.15
}
