use rand_pcg::Pcg32;

use crate::{
    math::{reflect, Vec3},
    sampling,
};

/// Minimum accepted hit distance so a bounced ray can't re-hit the surface
/// it just left.
pub const HIT_EPSILON: f32 = 1e-4;

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub position: Vec3,
    /// Should be normalized so hit distances are in meters.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(position: Vec3, direction: Vec3) -> Self {
        Self {
            position,
            direction,
        }
    }

    /// Finds the point on this `Ray` at distance `t`.
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.position + self.direction * t
    }
}

/// A flat-shaded room triangle, derived per mesh face at bounce-test time.
#[derive(Copy, Clone, Debug)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    pub normal: Vec3,
}

impl Triangle {
    /// Creates a `Triangle` with its normal computed from the winding order.
    pub fn with_flat_normal(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            a,
            b,
            c,
            normal: (b - a).cross(c - a).normalize(),
        }
    }
}

/// Info of a surface hit.
#[derive(Copy, Clone, Debug)]
pub struct Hit {
    /// Hit distance along the ray
    pub distance: f32,
    /// World position
    pub point: Vec3,
    /// Flat surface normal of the struck face
    pub normal: Vec3,
}

/// Ray-triangle intersection test.
///
/// Points of the ray can be expressed as `P = position + t*direction` with
/// `t` in range 0 to inf, points of the triangle plane as
/// `P = a + u*edgeAB + v*edgeAC` with `P` inside the triangle if
/// `u >= 0, v >= 0, u+v <= 1`.
///
/// https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm
pub fn collision_triangle(ray: &Ray, triangle: &Triangle) -> Option<Hit> {
    // Dot product is zero when ray and triangle plane are parallel
    if ray.direction.dot(triangle.normal) == 0.0 {
        return None;
    }

    let edge_ab = triangle.b - triangle.a;
    let edge_ac = triangle.c - triangle.a;
    let n = edge_ab.cross(edge_ac);
    let det = -ray.direction.dot(n);
    // Degenerate face
    if det == 0.0 {
        return None;
    }

    let ap = ray.position - triangle.a;
    let dap = ap.cross(ray.direction);

    let u = edge_ac.dot(dap) / det;
    let v = -edge_ab.dot(dap) / det;
    let t = ap.dot(n) / det;

    if t >= HIT_EPSILON && u >= 0.0 && v >= 0.0 && u + v <= 1.0 {
        Some(Hit {
            distance: t,
            point: ray.point_at(t),
            normal: triangle.normal,
        })
    } else {
        None
    }
}

/// Ray-sphere intersection test via the standard quadratic equation with
/// `p = 2*(d . (o - c))/(d . d)` and `q = ((o - c)^2 - r^2)/(d . d)`.
///
/// https://en.wikipedia.org/wiki/Line%E2%80%93sphere_intersection
pub fn collision_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<Hit> {
    let oc = ray.position - center;
    let dd = ray.direction.dot(ray.direction);

    let p = 2.0 * ray.direction.dot(oc) / dd;
    let q = (oc.dot(oc) - radius * radius) / dd;
    let radicand = p * p / 4.0 - q;

    // No solution: ray missed the sphere
    if radicand < 0.0 {
        return None;
    }

    // Only the nearest intersection is of interest
    let distance = -p / 2.0 - radicand.sqrt();
    // Ignore intersections behind the ray
    if distance < 0.0 {
        return None;
    }

    let point = ray.point_at(distance);
    Some(Hit {
        distance,
        point,
        normal: (point - center).normalize(),
    })
}

/// Bounce direction off a surface: mirror reflection mixed with an
/// independently sampled diffuse direction, weighted by the surface
/// roughness (0 = pure specular, 1 = pure diffuse).
pub fn scatter_direction(direction: Vec3, normal: Vec3, roughness: f32, rng: &mut Pcg32) -> Vec3 {
    let specular = reflect(direction, normal);
    let mut diffuse = sampling::random_direction(rng);

    // Negative dot product means the sample is not in the surface hemisphere,
    // so invert it
    if normal.dot(diffuse) < 0.0 {
        diffuse = -diffuse;
    }

    specular.lerp(diffuse, roughness).normalize()
}
