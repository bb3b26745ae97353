#![warn(missing_docs)]
//! Module for handling ray ensembles
//!
//! A [`Beam`] is the ordered, fixed-length batch of rays that is threaded
//! through a beamline, one element trace at a time. Rays are never removed
//! from a beam: clipping and numerical failures mark the affected rays lost
//! (see [`RayFlag`]) so that ordering and indexing stay stable across the
//! whole beamline and lost-ray accounting remains attributable.
use nalgebra::{vector, Rotation3, Vector3};
use num::Zero;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use crate::{
    coordinates::ElementCoordinates,
    error::{BeamtraceError, BtResult},
    meter,
    ray::{Ray, RayFlag},
};

/// Rotation axis selector for [`Beam::rotate`].
///
/// In the beam frame, y is the propagation axis, x the horizontal and z the
/// vertical transverse axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// transverse horizontal axis
    X,
    /// longitudinal (propagation) axis
    Y,
    /// transverse vertical axis
    Z,
}

/// An ordered ensemble of [`Ray`]s.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    rays: Vec<Ray>,
}
impl Beam {
    /// Create a new [`Beam`] from the given rays.
    #[must_use]
    pub fn new(rays: Vec<Ray>) -> Self {
        Self { rays }
    }
    /// Number of rays in this [`Beam`] (alive and lost).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rays.len()
    }
    /// Returns `true` if this [`Beam`] contains no rays.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }
    /// Returns the rays of this [`Beam`].
    #[must_use]
    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }
    /// Returns the rays of this [`Beam`] mutably.
    pub(crate) fn rays_mut(&mut self) -> &mut [Ray] {
        &mut self.rays
    }
    /// Returns an iterator over the rays of this [`Beam`].
    pub fn iter(&self) -> std::slice::Iter<'_, Ray> {
        self.rays.iter()
    }
    /// Returns a mutable iterator over the rays of this [`Beam`].
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Ray> {
        self.rays.iter_mut()
    }
    /// Number of rays still alive.
    #[must_use]
    pub fn nr_of_alive_rays(&self) -> usize {
        self.rays.iter().filter(|r| r.is_alive()).count()
    }
    /// Number of lost rays carrying the given flag.
    #[must_use]
    pub fn nr_of_rays_with_flag(&self, flag: RayFlag) -> usize {
        self.rays.iter().filter(|r| r.flag() == flag).count()
    }
    /// Summed intensity (Es² + Ep²) of all alive rays.
    #[must_use]
    pub fn total_intensity(&self) -> f64 {
        self.rays
            .iter()
            .filter(|r| r.is_alive())
            .map(Ray::intensity)
            .sum()
    }
    /// Rotate all ray positions and directions around the given axis.
    ///
    /// The angle is in radians, right-handed around the chosen axis.
    pub fn rotate(&mut self, axis: Axis, angle: f64) {
        let axis = match axis {
            Axis::X => Vector3::x_axis(),
            Axis::Y => Vector3::y_axis(),
            Axis::Z => Vector3::z_axis(),
        };
        let rot = Rotation3::from_axis_angle(&axis, angle);
        for ray in &mut self.rays {
            let pos = rot * ray.position_in_meters();
            ray.set_position(meter!(pos.x, pos.y, pos.z));
            // rotation is rigid, the norm is preserved
            ray.set_direction_unchecked(rot * ray.direction());
        }
    }
    /// Translate all ray positions by the given displacement.
    pub fn translate(&mut self, displacement: Vector3<Length>) {
        for ray in &mut self.rays {
            let pos = ray.position() + displacement;
            ray.set_position(pos);
        }
    }
    /// Propagate all alive rays to the transverse plane at y = `distance`.
    ///
    /// With `reset_y` the longitudinal coordinate is zeroed afterwards, which
    /// moves the frame origin into that plane (the original's
    /// `retrace(..., resetY=True)`). Rays propagating parallel to the plane
    /// are left unmodified.
    pub fn retrace(&mut self, distance: Length, reset_y: bool) {
        for ray in &mut self.rays {
            if !ray.is_alive() {
                continue;
            }
            let vy = ray.direction().y;
            if vy.abs() < f64::EPSILON {
                continue;
            }
            let t = (distance - ray.position().y) / vy;
            // t may be negative: retracing backwards is legitimate
            let pos = ray.position()
                + vector![
                    t * ray.direction().x,
                    t * ray.direction().y,
                    t * ray.direction().z
                ];
            ray.set_position(pos);
            ray.add_path_length(t);
            if reset_y {
                let mut p = ray.position();
                p.y = Length::zero();
                ray.set_position(p);
            }
        }
    }
    /// Transform the beam from the frame of the previous element (or source)
    /// into the local frame of an element described by `coords`.
    ///
    /// Rotates around the propagation axis by the azimuthal angle, then
    /// around the transverse x axis by the grazing angle, then translates so
    /// that the element pole sits at the origin and the beam enters from
    /// `(0, −p·cosθ_g, p·sinθ_g)`.
    pub fn to_element_frame(&mut self, coords: &ElementCoordinates) {
        let theta_g = coords.grazing_angle();
        self.rotate(Axis::Y, coords.angle_azimuthal());
        self.rotate(Axis::X, -theta_g);
        let p = coords.p();
        self.translate(vector![
            Length::zero(),
            -p * theta_g.cos(),
            p * theta_g.sin()
        ]);
    }
    /// Inverse of [`Beam::to_element_frame`]: undoes translation and
    /// rotations in reverse order.
    pub fn from_element_frame(&mut self, coords: &ElementCoordinates) {
        let theta_g = coords.grazing_angle();
        let p = coords.p();
        self.translate(vector![
            Length::zero(),
            p * theta_g.cos(),
            -p * theta_g.sin()
        ]);
        self.rotate(Axis::X, theta_g);
        self.rotate(Axis::Y, -coords.angle_azimuthal());
    }
    /// Transform the beam from the element local frame into the image frame:
    /// rotate around x by the exit grazing angle so the reflected central ray
    /// runs along +y, then retrace the exit distance q (frame origin moves to
    /// the image plane).
    pub fn to_image_frame(&mut self, coords: &ElementCoordinates) {
        self.rotate(Axis::X, -coords.grazing_angle_out());
        if coords.q().value != 0.0 {
            self.retrace(coords.q(), true);
        }
    }
    /// Check that all ray directions are unit norm within the given
    /// tolerance.
    ///
    /// # Errors
    ///
    /// This function will return an error naming the first offending ray
    /// index.
    pub fn check_direction_norms(&self, tolerance: f64) -> BtResult<()> {
        for (idx, ray) in self.rays.iter().enumerate() {
            if (ray.direction().norm() - 1.0).abs() > tolerance {
                return Err(BeamtraceError::Other(format!(
                    "direction of ray {idx} is not unit norm"
                )));
            }
        }
        Ok(())
    }
}

impl IntoIterator for Beam {
    type Item = Ray;
    type IntoIter = std::vec::IntoIter<Ray>;
    fn into_iter(self) -> Self::IntoIter {
        self.rays.into_iter()
    }
}
