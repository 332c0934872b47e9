pub mod material;

pub use material::{parse_material_name, MaterialParseError, MaterialProperties};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    error::{Result, SonoError},
    geometry::{collision_triangle, Hit, Ray, Triangle},
    math::Vec3,
};

/// Stores the geometry data of one triangle mesh.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Triangle vertex indices stored as triplets
    pub indices: Vec<usize>,
    /// Vertex positions in world space, meters
    pub vertices: Vec<Vec3>,
    /// Per-vertex normals; the normal of a face's first vertex is used as
    /// the flat face normal
    pub normals: Vec<Vec3>,
}

/// One surface group of the room: a mesh and its acoustic material.
#[derive(Clone, Debug)]
pub struct Shape {
    pub name: String,
    pub mesh: Mesh,
    pub material: MaterialProperties,
}

/// A [Hit] with the material of the struck shape attached.
#[derive(Copy, Clone, Debug)]
pub struct SurfaceHit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub material: MaterialProperties,
}

/// The room geometry all rays are traced against. Read-only during a run.
#[derive(Clone, Debug, Default)]
pub struct Room {
    pub shapes: Vec<Shape>,
}

impl Room {
    /// `true` if the room has no triangles to trace against.
    pub fn is_empty(&self) -> bool {
        self.shapes.iter().all(|shape| shape.mesh.indices.len() < 3)
    }

    /// Finds the nearest triangle hit across all shapes, with the struck
    /// shape's material attached.
    pub fn closest_hit(&self, ray: &Ray) -> Option<SurfaceHit> {
        let mut closest: Option<SurfaceHit> = None;

        for shape in &self.shapes {
            let mesh = &shape.mesh;
            debug_assert!(mesh.indices.len() % 3 == 0);

            for face in mesh.indices.chunks_exact(3) {
                let triangle = Triangle {
                    a: mesh.vertices[face[0]],
                    b: mesh.vertices[face[1]],
                    c: mesh.vertices[face[2]],
                    normal: mesh.normals[face[0]],
                };

                if let Some(Hit {
                    distance,
                    point,
                    normal,
                }) = collision_triangle(ray, &triangle)
                {
                    if closest.map_or(true, |hit| distance < hit.distance) {
                        closest = Some(SurfaceHit {
                            distance,
                            point,
                            normal,
                            material: shape.material,
                        });
                    }
                }
            }
        }

        closest
    }

    /// Builds an axis-aligned box room between `min` and `max` with one
    /// material on all six walls and normals pointing into the interior.
    pub fn rectangular(min: Vec3, max: Vec3, material: MaterialProperties) -> Self {
        let mut mesh = Mesh::default();

        let mut add_face = |corners: [Vec3; 4], normal: Vec3| {
            let base = mesh.vertices.len();
            mesh.vertices.extend_from_slice(&corners);
            mesh.normals.extend_from_slice(&[normal; 4]);
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        };

        add_face(
            [
                Vec3::new(min.x, min.y, min.z),
                Vec3::new(min.x, max.y, min.z),
                Vec3::new(min.x, max.y, max.z),
                Vec3::new(min.x, min.y, max.z),
            ],
            Vec3::X,
        );
        add_face(
            [
                Vec3::new(max.x, min.y, min.z),
                Vec3::new(max.x, max.y, min.z),
                Vec3::new(max.x, max.y, max.z),
                Vec3::new(max.x, min.y, max.z),
            ],
            -Vec3::X,
        );
        add_face(
            [
                Vec3::new(min.x, min.y, min.z),
                Vec3::new(max.x, min.y, min.z),
                Vec3::new(max.x, min.y, max.z),
                Vec3::new(min.x, min.y, max.z),
            ],
            Vec3::Y,
        );
        add_face(
            [
                Vec3::new(min.x, max.y, min.z),
                Vec3::new(max.x, max.y, min.z),
                Vec3::new(max.x, max.y, max.z),
                Vec3::new(min.x, max.y, max.z),
            ],
            -Vec3::Y,
        );
        add_face(
            [
                Vec3::new(min.x, min.y, min.z),
                Vec3::new(max.x, min.y, min.z),
                Vec3::new(max.x, max.y, min.z),
                Vec3::new(min.x, max.y, min.z),
            ],
            Vec3::Z,
        );
        add_face(
            [
                Vec3::new(min.x, min.y, max.z),
                Vec3::new(max.x, min.y, max.z),
                Vec3::new(max.x, max.y, max.z),
                Vec3::new(min.x, max.y, max.z),
            ],
            -Vec3::Z,
        );

        Self {
            shapes: vec![Shape {
                name: "room".into(),
                mesh,
                material,
            }],
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Display, EnumString)]
pub enum ObjectKind {
    Microphone,
    Speaker,
}

/// A named, user-editable entity in the scene: an emitter or a receiver.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Object {
    pub name: String,
    pub kind: ObjectKind,
    pub active: bool,
    pub position: Vec3,
}

/// Adds `object` to the set, rejecting duplicate names. Name uniqueness is
/// enforced here, at the editing boundary, so the tracing stages can key
/// histograms by name without further checks.
pub fn add_object(objects: &mut Vec<Object>, object: Object) -> Result<()> {
    if objects.iter().any(|existing| existing.name == object.name) {
        return Err(SonoError::DuplicateObjectName { name: object.name });
    }
    objects.push(object);
    Ok(())
}

/// The first active microphone drives IR generation.
pub fn active_microphone(objects: &[Object]) -> Option<&Object> {
    objects
        .iter()
        .find(|object| object.kind == ObjectKind::Microphone && object.active)
}

/// All active speakers emit rays.
pub fn active_speakers(objects: &[Object]) -> Vec<&Object> {
    objects
        .iter()
        .filter(|object| object.kind == ObjectKind::Speaker && object.active)
        .collect()
}

/// All active microphones gather energy.
pub fn active_microphones(objects: &[Object]) -> Vec<&Object> {
    objects
        .iter()
        .filter(|object| object.kind == ObjectKind::Microphone && object.active)
        .collect()
}
