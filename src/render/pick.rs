//! CPU click picking.
//!
//! A click is turned into a world-space ray through the camera, then tested
//! against every pickable mesh in its local space. Spheres are intersected
//! exactly; other primitives use their local bounding box.

use crate::render::camera::{CameraPose, FIELD_OF_VIEW_DEG};
use crate::scene::{EntityId, Geometry, SceneRegistry};
use glam::DVec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub entity: EntityId,
    pub distance: f64,
    pub point: DVec3,
}

/// Converts a pixel position in a `width` x `height` viewport to normalized device coordinates.
pub fn screen_to_ndc(x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
    let width = width.max(1.0);
    let height = height.max(1.0);
    ((x / width) * 2.0 - 1.0, -(y / height) * 2.0 + 1.0)
}

/// Ray from the camera through the given NDC point.
pub fn ray_from_ndc(pose: &CameraPose, ndc_x: f64, ndc_y: f64, aspect: f64) -> Ray {
    let (right, up) = pose.basis();
    let half_height = (FIELD_OF_VIEW_DEG.to_radians() * 0.5).tan();
    let half_width = half_height * aspect;
    let direction =
        (pose.forward + right * (ndc_x * half_width) + up * (ndc_y * half_height)).normalize();
    Ray {
        origin: pose.position,
        direction,
    }
}

/// Nearest pickable mesh along `ray`. The ground, lights and imported models never match.
pub fn pick_nearest(registry: &SceneRegistry, ray: &Ray) -> Option<PickHit> {
    let mut best: Option<PickHit> = None;
    for entity in registry.objects() {
        if !entity.is_pickable() {
            continue;
        }
        let Some(mesh) = entity.mesh() else {
            continue;
        };
        let matrix = entity.transform.matrix();
        let Some(distance) = intersect_entity(&mesh.geometry, &matrix, ray) else {
            continue;
        };
        if best.map_or(true, |hit| distance < hit.distance) {
            best = Some(PickHit {
                entity: entity.id,
                distance,
                point: ray.at(distance),
            });
        }
    }
    best
}

fn intersect_entity(geometry: &Geometry, world: &glam::DMat4, ray: &Ray) -> Option<f64> {
    if world.determinant().abs() < 1e-12 {
        return None;
    }
    let inverse = world.inverse();
    // Direction is left unnormalized so `t` stays in world units.
    let local = Ray {
        origin: inverse.transform_point3(ray.origin),
        direction: inverse.transform_vector3(ray.direction),
    };
    match geometry {
        Geometry::Sphere { radius, .. } => intersect_sphere(&local, *radius),
        _ => {
            let (min, max) = geometry.local_bounds();
            intersect_box(&local, min, max)
        }
    }
}

fn intersect_box(ray: &Ray, min: DVec3, max: DVec3) -> Option<f64> {
    let mut t_near = f64::NEG_INFINITY;
    let mut t_far = f64::INFINITY;
    for axis in 0..3 {
        let origin = ray.origin[axis];
        let direction = ray.direction[axis];
        if direction.abs() < 1e-15 {
            if origin < min[axis] || origin > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / direction;
        let mut t0 = (min[axis] - origin) * inv;
        let mut t1 = (max[axis] - origin) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_near = t_near.max(t0);
        t_far = t_far.min(t1);
        if t_near > t_far {
            return None;
        }
    }
    nearest_non_negative(t_near, t_far)
}

fn intersect_sphere(ray: &Ray, radius: f64) -> Option<f64> {
    let a = ray.direction.length_squared();
    let b = 2.0 * ray.origin.dot(ray.direction);
    let c = ray.origin.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || a == 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    nearest_non_negative((-b - root) / (2.0 * a), (-b + root) / (2.0 * a))
}

fn nearest_non_negative(t_near: f64, t_far: f64) -> Option<f64> {
    if t_near >= 0.0 {
        Some(t_near)
    } else if t_far >= 0.0 {
        Some(t_far)
    } else {
        None
    }
}
