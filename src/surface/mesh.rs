#![warn(missing_docs)]
//! Tabulated (height-field) surfaces
//!
//! A [`Mesh`] stores surface heights z(x, y) on a rectilinear grid, e.g. a
//! measured mirror figure error map. Heights between grid nodes are
//! bilinearly interpolated, which also yields analytic partial derivatives
//! inside each cell. The ray intercept is found with a Newton iteration on
//! the height residual, started from the intercept with the z = 0 tangent
//! plane.
use nalgebra::{DMatrix, Point3, Vector3};
use serde::{Deserialize, Serialize};

use super::{orient_against, Intersection};
use crate::error::{BeamtraceError, BtResult};
use crate::ray::RayFlag;

/// residual tolerance in meters
const NEWTON_TOLERANCE: f64 = 1e-11;
const NEWTON_MAX_ITERATIONS: usize = 40;

/// A height-field surface z(x, y) on a rectilinear grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// grid node coordinates along x, strictly increasing, in meters
    x: Vec<f64>,
    /// grid node coordinates along y, strictly increasing, in meters
    y: Vec<f64>,
    /// surface heights, row index over x, column index over y, in meters
    z: DMatrix<f64>,
}
impl Mesh {
    /// Create a new [`Mesh`] from grid node coordinates and heights (all in
    /// meters).
    ///
    /// # Errors
    ///
    /// This function will return an error if an axis has fewer than two
    /// nodes, is not strictly increasing or not finite, a height is not
    /// finite, or the height matrix shape does not match the axes.
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: DMatrix<f64>) -> BtResult<Self> {
        check_axis(&x, "x")?;
        check_axis(&y, "y")?;
        if z.nrows() != x.len() || z.ncols() != y.len() {
            return Err(BeamtraceError::Surface(format!(
                "mesh height shape {}x{} does not match axes {}x{}",
                z.nrows(),
                z.ncols(),
                x.len(),
                y.len()
            )));
        }
        if z.iter().any(|h| !h.is_finite()) {
            return Err(BeamtraceError::Surface(
                "mesh heights must be finite".into(),
            ));
        }
        Ok(Self { x, y, z })
    }
    /// Bilinearly interpolated height and its partial derivatives
    /// `(h, ∂h/∂x, ∂h/∂y)` at the given transverse position.
    ///
    /// Returns `None` outside the tabulated grid.
    #[must_use]
    pub fn height_and_slopes(&self, x: f64, y: f64) -> Option<(f64, f64, f64)> {
        let i = cell_index(&self.x, x)?;
        let j = cell_index(&self.y, y)?;
        let (x0, x1) = (self.x[i], self.x[i + 1]);
        let (y0, y1) = (self.y[j], self.y[j + 1]);
        let (dx, dy) = (x1 - x0, y1 - y0);
        let tx = (x - x0) / dx;
        let ty = (y - y0) / dy;
        let (h00, h10) = (self.z[(i, j)], self.z[(i + 1, j)]);
        let (h01, h11) = (self.z[(i, j + 1)], self.z[(i + 1, j + 1)]);
        let h = (1.0 - tx) * (1.0 - ty) * h00
            + tx * (1.0 - ty) * h10
            + (1.0 - tx) * ty * h01
            + tx * ty * h11;
        let slope_x = ((1.0 - ty) * (h10 - h00) + ty * (h11 - h01)) / dx;
        let slope_y = ((1.0 - tx) * (h01 - h00) + tx * (h11 - h10)) / dy;
        Some((h, slope_x, slope_y))
    }
    pub(crate) fn intersect(
        &self,
        position: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Result<Intersection, RayFlag> {
        if direction.z.abs() < f64::EPSILON {
            return Err(RayFlag::LostNoIntersection);
        }
        // start from the intercept with the tangent plane
        let mut t = -position.z / direction.z;
        if t < 0.0 {
            return Err(RayFlag::LostNoIntersection);
        }
        for _ in 0..NEWTON_MAX_ITERATIONS {
            let point = position + t * direction;
            let Some((h, slope_x, slope_y)) = self.height_and_slopes(point.x, point.y) else {
                // walked off the tabulated area
                return Err(RayFlag::LostNoIntersection);
            };
            let residual = point.z - h;
            if residual.abs() < NEWTON_TOLERANCE {
                let normal = Vector3::new(-slope_x, -slope_y, 1.0).normalize();
                if t < 0.0 {
                    return Err(RayFlag::LostNoIntersection);
                }
                return Ok(Intersection {
                    point,
                    normal: orient_against(normal, direction),
                    path_length: t,
                });
            }
            let derivative = direction.z
                - slope_x.mul_add(direction.x, slope_y * direction.y);
            if derivative.abs() < f64::EPSILON {
                log::warn!("mesh intercept stalled, ray parallel to local slope");
                return Err(RayFlag::LostNoConvergence);
            }
            t -= residual / derivative;
        }
        log::warn!("mesh intercept did not converge within {NEWTON_MAX_ITERATIONS} iterations");
        Err(RayFlag::LostNoConvergence)
    }
}

fn check_axis(axis: &[f64], name: &str) -> BtResult<()> {
    if axis.len() < 2 {
        return Err(BeamtraceError::Surface(format!(
            "mesh {name} axis needs at least two nodes"
        )));
    }
    if axis.iter().any(|v| !v.is_finite()) {
        return Err(BeamtraceError::Surface(format!(
            "mesh {name} axis must be finite"
        )));
    }
    if axis.windows(2).any(|w| w[1] <= w[0]) {
        return Err(BeamtraceError::Surface(format!(
            "mesh {name} axis must be strictly increasing"
        )));
    }
    Ok(())
}

/// Index of the grid cell containing `value`, `None` outside the axis range.
fn cell_index(axis: &[f64], value: f64) -> Option<usize> {
    if value < axis[0] || value > axis[axis.len() - 1] {
        return None;
    }
    let upper = axis.partition_point(|v| *v <= value);
    // the last node belongs to the last cell
    Some(upper.clamp(1, axis.len() - 1) - 1)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_mesh(height: f64) -> Mesh {
        let x = vec![-0.01, 0.0, 0.01];
        let y = vec![-0.1, 0.0, 0.1];
        Mesh::new(x, y, DMatrix::from_element(3, 3, height)).unwrap()
    }
    /// heights of a sphere of the given radius tangent to the origin
    fn spherical_mesh(radius: f64) -> Mesh {
        let x: Vec<f64> = (0..21).map(|i| f64::from(i - 10) * 1e-3).collect();
        let y: Vec<f64> = (0..41).map(|i| f64::from(i - 20) * 5e-3).collect();
        let z = DMatrix::from_fn(x.len(), y.len(), |i, j| {
            let r2 = x[i].mul_add(x[i], y[j] * y[j]);
            radius - (radius * radius - r2).sqrt()
        });
        Mesh::new(x, y, z).unwrap()
    }
    #[test]
    fn new() {
        assert!(Mesh::new(vec![0.0], vec![0.0, 1.0], DMatrix::zeros(1, 2)).is_err());
        assert!(Mesh::new(vec![1.0, 0.0], vec![0.0, 1.0], DMatrix::zeros(2, 2)).is_err());
        assert!(Mesh::new(vec![0.0, 1.0], vec![0.0, 1.0], DMatrix::zeros(3, 2)).is_err());
        assert!(Mesh::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            DMatrix::from_element(2, 2, f64::NAN)
        )
        .is_err());
    }
    #[test]
    fn interpolation() {
        let x = vec![0.0, 1.0];
        let y = vec![0.0, 1.0];
        let z = DMatrix::from_fn(2, 2, |i, j| if i == 1 && j == 1 { 1.0 } else { 0.0 });
        let mesh = Mesh::new(x, y, z).unwrap();
        let (h, sx, sy) = mesh.height_and_slopes(0.5, 0.5).unwrap();
        assert_relative_eq!(h, 0.25);
        assert_relative_eq!(sx, 0.5);
        assert_relative_eq!(sy, 0.5);
        assert!(mesh.height_and_slopes(1.5, 0.5).is_none());
        // grid edges are part of the surface
        assert!(mesh.height_and_slopes(1.0, 1.0).is_some());
    }
    #[test]
    fn flat_mesh_behaves_like_offset_plane() {
        let mesh = flat_mesh(1e-6);
        let theta_g = 0.05_f64;
        let pos = Point3::new(0.0, -0.05 * theta_g.cos(), 0.05 * theta_g.sin());
        let dir = Vector3::new(0.0, theta_g.cos(), -theta_g.sin());
        let isect = mesh.intersect(&pos, &dir).unwrap();
        assert_relative_eq!(isect.point.z, 1e-6, epsilon = 1e-10);
        assert_relative_eq!(isect.normal.z, 1.0, epsilon = 1e-12);
    }
    #[test]
    fn spherical_mesh_matches_conic() {
        let radius = 50.0;
        let mesh = spherical_mesh(radius);
        let conic = super::super::Conic::sphere(crate::meter!(radius)).unwrap();
        let theta_g = 0.3_f64;
        let pos = Point3::new(1e-4, -0.02 * theta_g.cos(), 0.02 * theta_g.sin());
        let dir = Vector3::new(0.0, theta_g.cos(), -theta_g.sin());
        let from_mesh = mesh.intersect(&pos, &dir).unwrap();
        let from_conic = conic.intersect(&pos, &dir).unwrap();
        assert_relative_eq!(from_mesh.point.y, from_conic.point.y, epsilon = 1e-6);
        assert_relative_eq!(from_mesh.point.z, from_conic.point.z, epsilon = 1e-6);
    }
    #[test]
    fn stalled_iteration_warns_and_loses_ray() {
        testing_logger::setup();
        // 45 degree ramp h(x, y) = x
        let mesh = Mesh::new(
            vec![-1.0, 1.0],
            vec![-1.0, 1.0],
            DMatrix::from_fn(2, 2, |i, _| if i == 0 { -1.0 } else { 1.0 }),
        )
        .unwrap();
        // ray running parallel to the ramp, the residual never shrinks
        let pos = Point3::new(0.5, 0.0, 0.6);
        let dir = Vector3::new(-1.0, 0.0, -1.0).normalize();
        assert_eq!(mesh.intersect(&pos, &dir), Err(RayFlag::LostNoConvergence));
        testing_logger::validate(|captured| {
            assert!(captured.iter().any(|entry| entry.body.contains("stalled")));
        });
    }
    #[test]
    fn off_grid_is_lost() {
        let mesh = flat_mesh(0.0);
        let pos = Point3::new(0.05, 0.0, 1.0);
        let dir = -Vector3::z();
        assert_eq!(mesh.intersect(&pos, &dir), Err(RayFlag::LostNoIntersection));
        // ray parallel to the surface
        let pos = Point3::new(0.0, -1.0, 1.0);
        let dir = Vector3::y();
        assert_eq!(mesh.intersect(&pos, &dir), Err(RayFlag::LostNoIntersection));
    }
}
