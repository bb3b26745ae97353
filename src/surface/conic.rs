#![warn(missing_docs)]
//! General quadric (second-degree) surfaces
//!
//! A [`Conic`] stores the ten coefficients of the implicit surface equation
//!
//! ```text
//! c0·x² + c1·y² + c2·z² + c3·xy + c4·yz + c5·xz + c6·x + c7·y + c8·z + c9 = 0
//! ```
//!
//! in the element local frame (surface through the origin, z away from the
//! substrate). This covers planes, spheres, cylinders, ellipsoids,
//! paraboloids and hyperboloids in one representation; the named
//! constructors derive the coefficients from the optical focal geometry
//! (entrance arm, exit arm, grazing angle at the pole).
use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use super::{orient_against, Intersection};
use crate::error::{BeamtraceError, BtResult};
use crate::ray::RayFlag;

/// Which root of the quadratic intercept equation to take.
///
/// Both intercepts of a ray with a closed quadric are valid surface points;
/// picking the far one effectively selects the opposite (convex vs. concave)
/// side of the surface.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootChoice {
    /// smallest positive path length (first surface hit). This is the default.
    #[default]
    Nearest,
    /// largest positive path length (second surface hit)
    Farthest,
}

/// A general quadric surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conic {
    ccc: [f64; 10],
    root_choice: RootChoice,
}
impl Conic {
    /// Create a new [`Conic`] directly from its ten coefficients.
    ///
    /// # Errors
    ///
    /// This function will return an error if a coefficient is not finite or
    /// all coefficients are zero.
    pub fn new(ccc: [f64; 10]) -> BtResult<Self> {
        if ccc.iter().any(|c| !c.is_finite()) {
            return Err(BeamtraceError::Surface(
                "conic coefficients must be finite".into(),
            ));
        }
        if ccc.iter().all(|c| *c == 0.0) {
            return Err(BeamtraceError::Surface(
                "conic coefficients must not all be zero".into(),
            ));
        }
        Ok(Self {
            ccc,
            root_choice: RootChoice::default(),
        })
    }
    /// The z = 0 tangent plane as a degenerate conic.
    #[must_use]
    pub fn plane() -> Self {
        let mut ccc = [0.0; 10];
        ccc[8] = -1.0;
        Self {
            ccc,
            root_choice: RootChoice::default(),
        }
    }
    /// Sphere tangent to the origin with the given curvature radius.
    ///
    /// A positive radius places the center at `(0, 0, R)`, i.e. a surface
    /// concave towards the incoming beam.
    ///
    /// # Errors
    ///
    /// This function will return an error if the radius is zero or not
    /// finite.
    pub fn sphere(radius: Length) -> BtResult<Self> {
        let r = radius.value;
        if r == 0.0 || !r.is_finite() {
            return Err(BeamtraceError::Surface(
                "sphere radius must be nonzero and finite".into(),
            ));
        }
        Self::new([1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, -2.0 * r, 0.0])
    }
    /// Ellipsoid of revolution imaging the entrance focus onto the exit
    /// focus.
    ///
    /// The mirror pole sits at the origin; the source focus lies at distance
    /// `p` along the incoming central ray and the image focus at distance `q`
    /// along the reflected one, for the given grazing angle.
    ///
    /// # Errors
    ///
    /// This function will return an error if `p` or `q` is not positive and
    /// finite, or the grazing angle is outside `(0, π/2)`.
    pub fn ellipsoid_from_focal_distances(p: Length, q: Length, theta_grazing: f64) -> BtResult<Self> {
        check_focal_geometry(p, q, theta_grazing)?;
        let (source, image) = focal_points(p.value, q.value, theta_grazing);
        let half_axis = (p.value + q.value) / 2.0;
        // semi-minor axis b² = a² − c² = p·q·sin²θ_g
        let b2 = p.value * q.value * theta_grazing.sin().powi(2);
        let center = nalgebra::center(&source, &image);
        let axis = (image - source).normalize();
        let ccc = quadric_of_revolution(&center, &axis, 1.0 / half_axis.powi(2), 1.0 / b2);
        Self::new(ccc)
    }
    /// Hyperboloid of revolution with one real focus at distance `p` and the
    /// virtual conjugate at distance `q`.
    ///
    /// # Errors
    ///
    /// This function will return an error if `p` or `q` is not positive and
    /// finite, `p == q` (the hyperboloid degenerates into a plane), or the
    /// grazing angle is outside `(0, π/2)`.
    pub fn hyperboloid_from_focal_distances(
        p: Length,
        q: Length,
        theta_grazing: f64,
    ) -> BtResult<Self> {
        check_focal_geometry(p, q, theta_grazing)?;
        if p == q {
            return Err(BeamtraceError::Surface(
                "hyperboloid focal distances must differ".into(),
            ));
        }
        let (source, image) = focal_points(p.value, q.value, theta_grazing);
        let half_axis = (p.value - q.value).abs() / 2.0;
        let half_foci = nalgebra::distance(&source, &image) / 2.0;
        let b2 = half_foci.mul_add(half_foci, -half_axis.powi(2));
        if b2 <= 0.0 {
            return Err(BeamtraceError::Surface(
                "degenerate hyperboloid focal geometry".into(),
            ));
        }
        let center = nalgebra::center(&source, &image);
        let axis = (image - source).normalize();
        let ccc = quadric_of_revolution(&center, &axis, 1.0 / half_axis.powi(2), -1.0 / b2);
        Self::new(ccc)
    }
    /// Paraboloid of revolution with its focus on the finite side.
    ///
    /// For `p >= q` the incoming beam is taken as parallel and focused into
    /// the exit focus at distance `q`; for `p < q` the source at distance `p`
    /// is collimated (the other arm is treated as infinite, matching the
    /// convention of the original implementation).
    ///
    /// # Errors
    ///
    /// This function will return an error if `p` or `q` is not positive and
    /// finite, or the grazing angle is outside `(0, π/2)`.
    pub fn paraboloid_from_focal_distances(
        p: Length,
        q: Length,
        theta_grazing: f64,
    ) -> BtResult<Self> {
        check_focal_geometry(p, q, theta_grazing)?;
        let (source, image) = focal_points(p.value, q.value, theta_grazing);
        let (cos_t, sin_t) = (theta_grazing.cos(), theta_grazing.sin());
        // the parabola satisfies |r − F| = (r − F)·axis + c with the axis
        // antiparallel to the rays on the infinite side
        let (focus, axis, c) = if p >= q {
            let axis = Vector3::new(0.0, -cos_t, sin_t);
            (image, axis, 2.0 * q.value * sin_t.powi(2))
        } else {
            let axis = Vector3::new(0.0, cos_t, sin_t);
            (source, axis, 2.0 * p.value * sin_t.powi(2))
        };
        let m = Matrix3::identity() - axis * axis.transpose();
        let linear = -2.0 * (m * focus.coords) - 2.0 * c * axis;
        let constant = (focus.coords.dot(&(m * focus.coords)))
            + 2.0 * c * focus.coords.dot(&axis)
            - c * c;
        let ccc = [
            m[(0, 0)],
            m[(1, 1)],
            m[(2, 2)],
            2.0 * m[(0, 1)],
            2.0 * m[(1, 2)],
            2.0 * m[(0, 2)],
            linear.x,
            linear.y,
            linear.z,
            constant,
        ];
        Self::new(ccc)
    }
    /// Select which intercept root to take (see [`RootChoice`]).
    #[must_use]
    pub const fn with_root_choice(mut self, root_choice: RootChoice) -> Self {
        self.root_choice = root_choice;
        self
    }
    /// Flatten this conic into a cylinder whose flat axis makes the given
    /// angle with the x axis (0 = sagittally flat, π/2 = tangentially flat).
    pub fn to_cylindrical(&mut self, cyl_angle: f64) {
        let (sin_c, cos_c) = cyl_angle.sin_cos();
        let a = self.ccc;
        self.ccc[0] = a[0] * sin_c.powi(4) + a[1] * cos_c.powi(2) * sin_c.powi(2)
            - a[3] * cos_c * sin_c.powi(3);
        self.ccc[1] = a[1] * cos_c.powi(4) + a[0] * cos_c.powi(2) * sin_c.powi(2)
            - a[3] * cos_c.powi(3) * sin_c;
        self.ccc[3] = -2.0 * a[0] * cos_c * sin_c.powi(3) - 2.0 * a[1] * cos_c.powi(3) * sin_c
            + 2.0 * a[3] * cos_c.powi(2) * sin_c.powi(2);
        self.ccc[4] = a[4] * cos_c.powi(2) - a[5] * cos_c * sin_c;
        self.ccc[5] = a[5] * sin_c.powi(2) - a[4] * cos_c * sin_c;
        self.ccc[6] = a[6] * sin_c.powi(2) - a[7] * cos_c * sin_c;
        self.ccc[7] = a[7] * cos_c.powi(2) - a[6] * cos_c * sin_c;
    }
    /// Mirror this conic at the z = 0 plane, turning a concave surface into
    /// its convex counterpart.
    pub fn switch_convexity(&mut self) {
        self.ccc[4] = -self.ccc[4];
        self.ccc[5] = -self.ccc[5];
        self.ccc[8] = -self.ccc[8];
    }
    /// The ten surface coefficients.
    #[must_use]
    pub const fn coefficients(&self) -> &[f64; 10] {
        &self.ccc
    }
    /// Evaluate the implicit surface equation at a point (zero on the
    /// surface).
    #[must_use]
    pub fn surface_value(&self, point: &Point3<f64>) -> f64 {
        let c = &self.ccc;
        let (x, y, z) = (point.x, point.y, point.z);
        c[0] * x * x
            + c[1] * y * y
            + c[2] * z * z
            + c[3] * x * y
            + c[4] * y * z
            + c[5] * x * z
            + c[6] * x
            + c[7] * y
            + c[8] * z
            + c[9]
    }
    /// Gradient of the implicit surface equation (unnormalized normal).
    #[must_use]
    pub fn gradient(&self, point: &Point3<f64>) -> Vector3<f64> {
        let c = &self.ccc;
        let (x, y, z) = (point.x, point.y, point.z);
        Vector3::new(
            2.0 * c[0] * x + c[3] * y + c[5] * z + c[6],
            2.0 * c[1] * y + c[3] * x + c[4] * z + c[7],
            2.0 * c[2] * z + c[4] * y + c[5] * x + c[8],
        )
    }
    /// Intersect a ray with this conic (see
    /// [`SurfaceShape::intersect`](super::SurfaceShape::intersect)).
    pub(crate) fn intersect(
        &self,
        position: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Result<Intersection, RayFlag> {
        let c = &self.ccc;
        let (x, y, z) = (position.x, position.y, position.z);
        let (vx, vy, vz) = (direction.x, direction.y, direction.z);
        let aa = c[0] * vx * vx
            + c[1] * vy * vy
            + c[2] * vz * vz
            + c[3] * vx * vy
            + c[4] * vy * vz
            + c[5] * vx * vz;
        let bb = 2.0 * (c[0] * x * vx + c[1] * y * vy + c[2] * z * vz)
            + c[3] * (x * vy + y * vx)
            + c[4] * (y * vz + z * vy)
            + c[5] * (x * vz + z * vx)
            + c[6] * vx
            + c[7] * vy
            + c[8] * vz;
        let cc = self.surface_value(position);
        let t = if aa.abs() <= 1e-15 * bb.abs() {
            // (near) linear case, e.g. a plane or a ray along a cylinder axis
            if bb == 0.0 {
                return Err(RayFlag::LostNoIntersection);
            }
            let t = -cc / bb;
            if t < 0.0 {
                return Err(RayFlag::LostNoIntersection);
            }
            t
        } else {
            let discriminant = bb.mul_add(bb, -4.0 * aa * cc);
            if discriminant < 0.0 {
                return Err(RayFlag::LostNoIntersection);
            }
            // numerically stable form avoiding cancellation between -bb and
            // the square root
            let w = -0.5 * (bb + bb.signum() * discriminant.sqrt());
            let (t1, t2) = (w / aa, cc / w);
            let positive: Vec<f64> = [t1, t2].into_iter().filter(|t| *t >= 0.0).collect();
            let chosen = match self.root_choice {
                RootChoice::Nearest => positive.iter().copied().reduce(f64::min),
                RootChoice::Farthest => positive.iter().copied().reduce(f64::max),
            };
            match chosen {
                Some(t) => t,
                None => return Err(RayFlag::LostNoIntersection),
            }
        };
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

/// Source and image focal points in the element local frame.
fn focal_points(p: f64, q: f64, theta_grazing: f64) -> (Point3<f64>, Point3<f64>) {
    let (sin_t, cos_t) = theta_grazing.sin_cos();
    (
        Point3::new(0.0, -p * cos_t, p * sin_t),
        Point3::new(0.0, q * cos_t, q * sin_t),
    )
}

fn check_focal_geometry(p: Length, q: Length, theta_grazing: f64) -> BtResult<()> {
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
    Ok(())
}

/// Coefficients of a quadric of revolution
/// `axial·ξ² + radial·ρ² = 1` with `ξ = (r−C)·e` and `ρ² = |r−C|² − ξ²`.
fn quadric_of_revolution(
    center: &Point3<f64>,
    axis: &Vector3<f64>,
    axial: f64,
    radial: f64,
) -> [f64; 10] {
    let m = radial * Matrix3::identity() + (axial - radial) * (axis * axis.transpose());
    let linear = -2.0 * (m * center.coords);
    let constant = center.coords.dot(&(m * center.coords)) - 1.0;
    [
        m[(0, 0)],
        m[(1, 1)],
        m[(2, 2)],
        2.0 * m[(0, 1)],
        2.0 * m[(1, 2)],
        2.0 * m[(0, 2)],
        linear.x,
        linear.y,
        linear.z,
        constant,
    ]
}
