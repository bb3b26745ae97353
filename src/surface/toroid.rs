#![warn(missing_docs)]
//! Toroidal surfaces
//!
//! A toroid decouples the tangential (meridional) from the sagittal
//! curvature: the surface is swept by a circle of radius `r_sagittal`
//! moving along a circle of radius `r_tangential − r_sagittal` in the
//! tangential (y–z) plane, tangent to the origin. The ray intercept
//! equation is quartic; instead of solving it algebraically, the root is
//! bracketed with the two osculating spheres at the pole and polished with
//! Brent's method on the implicit torus function.
use nalgebra::{Point3, Vector3};
use roots::{find_root_brent, SimpleConvergency};
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use super::{orient_against, Intersection};
use crate::error::{BeamtraceError, BtResult};
use crate::ray::RayFlag;

const BRENT_TOLERANCE: f64 = 1e-12;
const BRENT_MAX_ITERATIONS: usize = 100;
const SCAN_STEPS: usize = 128;

/// A toroidal surface given by its two optical radii (in meters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toroid {
    r_tangential: f64,
    r_sagittal: f64,
}
impl Toroid {
    /// Create a new [`Toroid`] from its tangential (major) and sagittal
    /// (minor) curvature radii at the pole.
    ///
    /// # Errors
    ///
    /// This function will return an error if the radii are not finite or do
    /// not satisfy `r_tangential > r_sagittal > 0` (for equal radii use a
    /// sphere).
    pub fn new(r_tangential: Length, r_sagittal: Length) -> BtResult<Self> {
        let (r_t, r_s) = (r_tangential.value, r_sagittal.value);
        if !r_t.is_finite() || !r_s.is_finite() || r_s <= 0.0 || r_t <= r_s {
            return Err(BeamtraceError::Surface(
                "toroid radii must be finite with r_tangential > r_sagittal > 0".into(),
            ));
        }
        Ok(Self {
            r_tangential: r_t,
            r_sagittal: r_s,
        })
    }
    /// Create the [`Toroid`] that images an entrance focus at distance `p`
    /// onto an exit focus at distance `q`, in both planes, for the given
    /// grazing angle.
    ///
    /// # Errors
    ///
    /// This function will return an error if `p` or `q` is not positive and
    /// finite or the grazing angle is outside `(0, π/2)`.
    pub fn from_focal_distances(p: Length, q: Length, theta_grazing: f64) -> BtResult<Self> {
        if !p.is_finite() || !q.is_finite() || p.value <= 0.0 || q.value <= 0.0 {
            return Err(BeamtraceError::Surface(
                "focal distances must be positive and finite".into(),
            ));
        }
        if !(theta_grazing > 0.0 && theta_grazing < std::f64::consts::FRAC_PI_2) {
            return Err(BeamtraceError::Surface(
                "grazing angle must be within (0, pi/2)".into(),
            ));
        }
        let harmonic = 2.0 * p.value * q.value / (p.value + q.value);
        Self::new(
            crate::meter!(harmonic / theta_grazing.sin()),
            crate::meter!(harmonic * theta_grazing.sin()),
        )
    }
    /// Tangential curvature radius at the pole, in meters.
    #[must_use]
    pub const fn r_tangential(&self) -> f64 {
        self.r_tangential
    }
    /// Sagittal curvature radius at the pole, in meters.
    #[must_use]
    pub const fn r_sagittal(&self) -> f64 {
        self.r_sagittal
    }
    /// radius of the sweep circle
    fn r_major(&self) -> f64 {
        self.r_tangential - self.r_sagittal
    }
    /// Implicit torus function, zero on the surface.
    ///
    /// The torus center sits at `(0, 0, r_tangential)` with its rotation
    /// axis along x, so that the surface is tangent to z = 0 at the origin.
    #[must_use]
    pub fn surface_value(&self, point: &Point3<f64>) -> f64 {
        let r_major = self.r_major();
        let dz = point.z - self.r_tangential;
        let u = point.y.mul_add(point.y, dz * dz);
        let s = point.x.mul_add(point.x, u) + r_major.mul_add(r_major, -self.r_sagittal.powi(2));
        s.mul_add(s, -4.0 * r_major * r_major * u)
    }
    /// Gradient of the implicit torus function (unnormalized normal).
    #[must_use]
    pub fn gradient(&self, point: &Point3<f64>) -> Vector3<f64> {
        let r_major = self.r_major();
        let dz = point.z - self.r_tangential;
        let u = point.y.mul_add(point.y, dz * dz);
        let s = point.x.mul_add(point.x, u) + r_major.mul_add(r_major, -self.r_sagittal.powi(2));
        let ring = 2.0 * r_major * r_major;
        Vector3::new(
            4.0 * point.x * s,
            4.0 * point.y * (s - ring),
            4.0 * dz * (s - ring),
        )
    }
    pub(crate) fn intersect(
        &self,
        position: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Result<Intersection, RayFlag> {
        // seed path lengths from the two osculating spheres at the pole
        let t_tangential = sphere_intercept(position, direction, self.r_tangential);
        let t_sagittal = sphere_intercept(position, direction, self.r_sagittal);
        let (t_ref, half_width) = match (t_tangential, t_sagittal) {
            (Some(a), Some(b)) => (a.min(b), (a - b).abs().max(self.r_sagittal)),
            (Some(a), None) => (a, self.r_sagittal.max(0.1 * a)),
            (None, Some(b)) => (b, self.r_sagittal.max(0.1 * b)),
            (None, None) => return Err(RayFlag::LostNoIntersection),
        };
        let lo = (t_ref - 2.0 * half_width).max(0.0);
        let hi = t_ref + 2.0 * half_width;
        let f = |t: f64| self.surface_value(&(position + t * direction));
        let bracket = find_sign_change(&f, lo, hi).ok_or(RayFlag::LostNoIntersection)?;
        let mut convergency = SimpleConvergency {
            eps: BRENT_TOLERANCE,
            max_iter: BRENT_MAX_ITERATIONS,
        };
        let t = find_root_brent(bracket.0, bracket.1, &f, &mut convergency)
            .map_err(|_| RayFlag::LostNoConvergence)?;
        if t < 0.0 {
            return Err(RayFlag::LostNoIntersection);
        }
        let point = position + t * direction;
        let gradient = self.gradient(&point);
        if gradient.norm() < f64::EPSILON {
            return Err(RayFlag::LostNoIntersection);
        }
        Ok(Intersection {
            point,
            normal: orient_against(gradient.normalize(), direction),
            path_length: t,
        })
    }
}

/// Nearest positive intercept with a sphere of the given radius tangent to
/// the origin (center at `(0, 0, radius)`).
fn sphere_intercept(position: &Point3<f64>, direction: &Vector3<f64>, radius: f64) -> Option<f64> {
    let center = Vector3::new(0.0, 0.0, radius);
    let oc = position.coords - center;
    let bb = 2.0 * direction.dot(&oc);
    let cc = oc.norm_squared() - radius * radius;
    let discriminant = bb.mul_add(bb, -4.0 * cc);
    if discriminant < 0.0 {
        return None;
    }
    let w = -0.5 * (bb + bb.signum() * discriminant.sqrt());
    [w, cc / w]
        .into_iter()
        .filter(|t| *t >= 0.0)
        .reduce(f64::min)
}

/// Scan `[lo, hi]` for the first subinterval over which `f` changes sign.
fn find_sign_change<F: Fn(f64) -> f64>(f: &F, lo: f64, hi: f64) -> Option<(f64, f64)> {
    let step = (hi - lo) / crate::utils::usize_to_f64(SCAN_STEPS);
    let mut left = lo;
    let mut f_left = f(left);
    for i in 1..=SCAN_STEPS {
        let right = step.mul_add(crate::utils::usize_to_f64(i), lo);
        let f_right = f(right);
        if f_left == 0.0 {
            // widen a degenerate bracket so Brent sees the sign change
            return Some((left, right));
        }
        if f_left * f_right < 0.0 {
            return Some((left, right));
        }
        left = right;
        f_left = f_right;
    }
    None
}
