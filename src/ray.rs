#![warn(missing_docs)]
//! Module for handling single photon rays
use nalgebra::{vector, Point3, Vector3};
use num::Zero;
use serde::{Deserialize, Serialize};
use uom::si::f64::{Energy, Length};

use crate::{
    error::{BeamtraceError, BtResult},
    meter,
};

/// Status of a [`Ray`] within a beam.
///
/// A ray is never removed from its ensemble. Instead it is marked with one of
/// the lost states below, which identifies the test that failed. The integer
/// [`sentinel`](RayFlag::sentinel) codes follow the SHADOW convention
/// (positive = alive, negative = lost).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RayFlag {
    /// ray propagates normally
    #[default]
    Alive,
    /// ray fell outside an aperture (or inside an obstruction)
    LostBoundary,
    /// ray does not intersect the surface (no positive root)
    LostNoIntersection,
    /// iterative intersection (mesh, toroid) did not converge
    LostNoConvergence,
}
impl RayFlag {
    /// Integer sentinel code of this flag (1 = alive, negative = lost).
    #[must_use]
    pub const fn sentinel(&self) -> i32 {
        match self {
            Self::Alive => 1,
            Self::LostBoundary => -1,
            Self::LostNoIntersection => -2,
            Self::LostNoConvergence => -3,
        }
    }
    /// Returns `true` if the ray is still alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        matches!(self, Self::Alive)
    }
}

/// Struct that contains all information about a single photon ray
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    /// current position of the ray
    pos: Point3<Length>,
    /// current propagation direction (stored as direction cosines, unit norm)
    dir: Vector3<f64>,
    /// electric field amplitude, s (sigma) polarization
    e_field_s: f64,
    /// electric field amplitude, p (pi) polarization
    e_field_p: f64,
    /// photon energy of the ray
    energy: Energy,
    /// geometric path length accumulated so far
    path_length: Length,
    /// status flag
    flag: RayFlag,
    /// index of the originating sample in the source grid
    source_index: usize,
}
impl Ray {
    /// Creates a new [`Ray`].
    ///
    /// The direction vector is normalized and stored as direction cosines.
    /// The ray starts alive, s-polarized with unit field amplitude and zero
    /// path length.
    ///
    /// # Errors
    /// This function returns an error if
    ///  - the given photon energy is <= 0.0, `NaN` or +inf
    ///  - the direction vector has a (near) zero length
    pub fn new(position: Point3<Length>, direction: Vector3<f64>, energy: Energy) -> BtResult<Self> {
        if energy.is_sign_negative() || energy.is_zero() || !energy.is_finite() {
            return Err(BeamtraceError::Other("photon energy must be >0".into()));
        }
        if direction.norm() < f64::EPSILON {
            return Err(BeamtraceError::Other("length of direction must be >0".into()));
        }
        Ok(Self {
            pos: position,
            dir: direction.normalize(),
            e_field_s: 1.0,
            e_field_p: 0.0,
            energy,
            path_length: Length::zero(),
            flag: RayFlag::default(),
            source_index: 0,
        })
    }
    /// Create a ray at the coordinate origin pointing along the positive y axis
    /// (the beam propagation axis).
    ///
    /// # Errors
    /// This function returns an error if the photon energy is <= 0.0 or not finite.
    pub fn origin_along_y(energy: Energy) -> BtResult<Self> {
        Self::new(Point3::origin(), Vector3::y(), energy)
    }
    /// Returns the position of this [`Ray`].
    #[must_use]
    pub fn position(&self) -> Point3<Length> {
        self.pos
    }
    /// Returns the position of this [`Ray`] as raw values in meters.
    #[must_use]
    pub fn position_in_meters(&self) -> Point3<f64> {
        self.pos.map(|c| c.value)
    }
    /// Sets the position of this [`Ray`].
    pub fn set_position(&mut self, pos: Point3<Length>) {
        self.pos = pos;
    }
    /// Returns the direction cosines of this [`Ray`].
    #[must_use]
    pub const fn direction(&self) -> Vector3<f64> {
        self.dir
    }
    /// Sets the direction of this [`Ray`]. The vector is normalized.
    ///
    /// # Errors
    ///
    /// This function will return an error if a (near) zero length direction
    /// vector is provided.
    pub fn set_direction(&mut self, dir: Vector3<f64>) -> BtResult<()> {
        if dir.norm() < f64::EPSILON {
            return Err(BeamtraceError::Other("length of direction must be >0".into()));
        }
        self.dir = dir.normalize();
        Ok(())
    }
    /// Set an already unit-norm direction (rigid transforms only).
    pub(crate) fn set_direction_unchecked(&mut self, dir: Vector3<f64>) {
        self.dir = dir;
    }
    /// Returns the photon energy of this [`Ray`].
    #[must_use]
    pub fn energy(&self) -> Energy {
        self.energy
    }
    /// Returns the s/p electric field amplitudes of this [`Ray`].
    #[must_use]
    pub const fn field_amplitudes(&self) -> (f64, f64) {
        (self.e_field_s, self.e_field_p)
    }
    /// Sets the s/p electric field amplitudes of this [`Ray`].
    pub fn set_field_amplitudes(&mut self, e_s: f64, e_p: f64) {
        self.e_field_s = e_s;
        self.e_field_p = e_p;
    }
    /// Scale the stored electric field amplitudes.
    ///
    /// The scale factors are *amplitude* factors. Callers applying an
    /// intensity reflectivity R must pass √R.
    pub fn scale_field_amplitudes(&mut self, r_s: f64, r_p: f64) {
        self.e_field_s *= r_s;
        self.e_field_p *= r_p;
    }
    /// Intensity of this [`Ray`] (Es² + Ep²).
    #[must_use]
    pub fn intensity(&self) -> f64 {
        self.e_field_s.mul_add(self.e_field_s, self.e_field_p * self.e_field_p)
    }
    /// Returns the accumulated geometric path length of this [`Ray`].
    #[must_use]
    pub fn path_length(&self) -> Length {
        self.path_length
    }
    /// Returns the status flag of this [`Ray`].
    #[must_use]
    pub const fn flag(&self) -> RayFlag {
        self.flag
    }
    /// Returns `true` if this [`Ray`] is still alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.flag.is_alive()
    }
    /// Mark this [`Ray`] as lost. An already lost ray keeps its first flag.
    pub fn mark_lost(&mut self, flag: RayFlag) {
        if self.flag.is_alive() {
            self.flag = flag;
        }
    }
    /// Returns the source sample index this [`Ray`] originated from.
    #[must_use]
    pub const fn source_index(&self) -> usize {
        self.source_index
    }
    /// Sets the source sample index of this [`Ray`].
    pub fn set_source_index(&mut self, index: usize) {
        self.source_index = index;
    }
    /// Propagate the ray freely along its direction by the given length.
    ///
    /// The accumulated path length is signed, so propagating backwards
    /// (negative length) shortens it again, consistent with
    /// [`Beam::retrace`](crate::beam::Beam::retrace).
    ///
    /// # Errors
    /// This function returns an error if the propagation length is not finite.
    pub fn propagate(&mut self, length: Length) -> BtResult<()> {
        if !length.is_finite() {
            return Err(BeamtraceError::Other(
                "propagation length must be finite".into(),
            ));
        }
        self.pos += vector![
            length * self.dir.x,
            length * self.dir.y,
            length * self.dir.z
        ];
        self.path_length += length;
        Ok(())
    }
    /// Accumulate (signed) traveled path length without moving the ray.
    pub(crate) fn add_path_length(&mut self, length: Length) {
        self.path_length += length;
    }
    /// Move the ray to a new intersection point, accumulating the traveled
    /// path length, and set the (specularly) reflected direction.
    pub fn set_intersection(&mut self, point: Point3<f64>, new_dir: Vector3<f64>) {
        let travel = (point - self.position_in_meters()).norm();
        self.pos = meter!(point.x, point.y, point.z);
        self.path_length += meter!(travel);
        self.dir = new_dir.normalize();
    }
}

/// Specular reflection of a direction on a surface normal:
/// `d' = d − 2 (d·n) n`. Both inputs are expected unit norm.
#[must_use]
pub fn specular_reflection(dir: &Vector3<f64>, normal: &Vector3<f64>) -> Vector3<f64> {
    dir - 2.0 * dir.dot(normal) * normal
}
