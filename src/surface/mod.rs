#![warn(missing_docs)]
//! Module for handling optical surfaces
//!
//! All surfaces are expressed in the local frame of their optical element:
//! the surface touches the origin (the element pole), x/y span the tangent
//! plane and z points away from the substrate. The closed [`SurfaceShape`]
//! variant set keeps the per-operation dispatch in one place; adding a new
//! surface family means adding one variant and one match arm.
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::ray::RayFlag;

mod conic;
mod mesh;
mod toroid;

pub use conic::{Conic, RootChoice};
pub use mesh::Mesh;
pub use toroid::Toroid;

/// Result of a successful ray/surface intersection in the local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    /// intersection point in meters
    pub point: Point3<f64>,
    /// unit surface normal at the intersection, oriented against the
    /// incoming direction
    pub normal: Vector3<f64>,
    /// path length traveled from the ray position to the intersection, in
    /// meters
    pub path_length: f64,
}

/// Geometric surface of an optical element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SurfaceShape {
    /// the z = 0 tangent plane itself
    Plane,
    /// general second-degree (quadric) surface
    Conic(Conic),
    /// toroidal surface given by its two optical radii
    Toroid(Toroid),
    /// tabulated height-field surface
    Mesh(Mesh),
}
impl SurfaceShape {
    /// Intersect a ray (position in meters, unit direction, local frame)
    /// with this surface and evaluate the surface normal there.
    ///
    /// # Errors
    ///
    /// Per-ray failures are reported as the [`RayFlag`] the ray shall be
    /// marked with: [`RayFlag::LostNoIntersection`] if no forward
    /// intersection exists, [`RayFlag::LostNoConvergence`] if an iterative
    /// solver did not converge.
    pub fn intersect(
        &self,
        position: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Result<Intersection, RayFlag> {
        match self {
            Self::Plane => intersect_plane(position, direction),
            Self::Conic(conic) => conic.intersect(position, direction),
            Self::Toroid(toroid) => toroid.intersect(position, direction),
            Self::Mesh(mesh) => mesh.intersect(position, direction),
        }
    }
    /// Surface type as string (for error messages).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Plane => "plane",
            Self::Conic(_) => "conic",
            Self::Toroid(_) => "toroid",
            Self::Mesh(_) => "mesh",
        }
    }
}

/// Orient a (unit) normal against the incoming direction, so that
/// `normal · direction <= 0`.
pub(crate) fn orient_against(normal: Vector3<f64>, direction: &Vector3<f64>) -> Vector3<f64> {
    if normal.dot(direction) > 0.0 {
        -normal
    } else {
        normal
    }
}

fn intersect_plane(
    position: &Point3<f64>,
    direction: &Vector3<f64>,
) -> Result<Intersection, RayFlag> {
    if direction.z.abs() < f64::EPSILON {
        return Err(RayFlag::LostNoIntersection);
    }
    let t = -position.z / direction.z;
    if t < 0.0 {
        // surface lies behind the ray
        return Err(RayFlag::LostNoIntersection);
    }
    let point = position + t * direction;
    Ok(Intersection {
        point,
        normal: orient_against(Vector3::z(), direction),
        path_length: t,
    })
}
