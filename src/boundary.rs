#![warn(missing_docs)]
//! Module for handling 2D boundary (aperture/obstruction) shapes
//!
//! A [`Boundary`] defines the clear area of an optical element in its local
//! transverse plane. Each shape can act as a hole (rays outside are lost) or
//! as an obstruction (rays inside are lost, the original's `negative` flag).
//! A set of boundaries can be stacked to form shapes of higher complexity.
//!
//! ```rust
//! use nalgebra::Point2;
//! use beamtrace::boundary::{Boundary, BoundaryType, RectangleConfig};
//! use beamtrace::millimeter;
//!
//! let r = RectangleConfig::new(
//!     millimeter!(-1.0), millimeter!(1.0),
//!     millimeter!(-2.0), millimeter!(2.0),
//! ).unwrap();
//! let b = Boundary::Rectangle(r);
//! assert!(b.transmits(&millimeter!(0.0, 0.0)));
//! assert!(!b.transmits(&millimeter!(1.5, 0.0)));
//! ```
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use crate::error::{BeamtraceError, BtResult};

/// The inclusion semantics of a [`Boundary`].
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryType {
    /// the shape acts as a hole (aperture): the inner part transmits
    #[default]
    Hole,
    /// the shape acts as an obstruction (beam stopper): the inner part blocks
    Obstruction,
}

/// Boundary shapes of an optical element.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Boundary {
    /// unlimited element, nothing is clipped. This is the default.
    #[default]
    None,
    /// axis-aligned rectangle given by its edge coordinates
    Rectangle(RectangleConfig),
    /// axis-aligned ellipse given by its bounding intervals
    Ellipse(EllipseConfig),
    /// a stack of boundaries; a point transmits if every member transmits
    Stack(Vec<Boundary>),
}
impl Boundary {
    /// Returns `true` if a ray at the given transverse point passes this
    /// [`Boundary`].
    #[must_use]
    pub fn transmits(&self, point: &Point2<Length>) -> bool {
        match self {
            Self::None => true,
            Self::Rectangle(r) => r.transmits(point),
            Self::Ellipse(e) => e.transmits(point),
            Self::Stack(shapes) => shapes.iter().all(|s| s.transmits(point)),
        }
    }
}

/// Configuration data for a rectangular boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleConfig {
    x_left: Length,
    x_right: Length,
    y_bottom: Length,
    y_top: Length,
    boundary_type: BoundaryType,
}
impl RectangleConfig {
    /// Create a new rectangular boundary from its edge coordinates.
    ///
    /// By default the boundary acts as a [`BoundaryType::Hole`].
    ///
    /// # Errors
    ///
    /// This function will return an error if an edge coordinate is not finite
    /// or an interval is empty (left >= right, bottom >= top).
    pub fn new(x_left: Length, x_right: Length, y_bottom: Length, y_top: Length) -> BtResult<Self> {
        if !x_left.is_finite() || !x_right.is_finite() || !y_bottom.is_finite() || !y_top.is_finite()
        {
            return Err(BeamtraceError::Element(
                "rectangle boundary edges must be finite".into(),
            ));
        }
        if x_left >= x_right || y_bottom >= y_top {
            return Err(BeamtraceError::Element(
                "rectangle boundary intervals must not be empty".into(),
            ));
        }
        Ok(Self {
            x_left,
            x_right,
            y_bottom,
            y_top,
            boundary_type: BoundaryType::default(),
        })
    }
    /// Set the boundary type (hole or obstruction).
    pub fn set_boundary_type(&mut self, boundary_type: BoundaryType) {
        self.boundary_type = boundary_type;
    }
    fn transmits(&self, point: &Point2<Length>) -> bool {
        let inside = point.x >= self.x_left
            && point.x <= self.x_right
            && point.y >= self.y_bottom
            && point.y <= self.y_top;
        match self.boundary_type {
            BoundaryType::Hole => inside,
            BoundaryType::Obstruction => !inside,
        }
    }
}

/// Configuration data for an elliptical boundary.
///
/// The ellipse is given by its axis-aligned bounding intervals
/// `[a_min, a_max]` (x) and `[b_min, b_max]` (y), following the convention of
/// the original implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EllipseConfig {
    a_min: Length,
    a_max: Length,
    b_min: Length,
    b_max: Length,
    boundary_type: BoundaryType,
}
impl EllipseConfig {
    /// Create a new elliptical boundary from its bounding intervals.
    ///
    /// By default the boundary acts as a [`BoundaryType::Hole`].
    ///
    /// # Errors
    ///
    /// This function will return an error if an interval edge is not finite
    /// or an interval is empty.
    pub fn new(a_min: Length, a_max: Length, b_min: Length, b_max: Length) -> BtResult<Self> {
        if !a_min.is_finite() || !a_max.is_finite() || !b_min.is_finite() || !b_max.is_finite() {
            return Err(BeamtraceError::Element(
                "ellipse boundary intervals must be finite".into(),
            ));
        }
        if a_min >= a_max || b_min >= b_max {
            return Err(BeamtraceError::Element(
                "ellipse boundary intervals must not be empty".into(),
            ));
        }
        Ok(Self {
            a_min,
            a_max,
            b_min,
            b_max,
            boundary_type: BoundaryType::default(),
        })
    }
    /// Set the boundary type (hole or obstruction).
    pub fn set_boundary_type(&mut self, boundary_type: BoundaryType) {
        self.boundary_type = boundary_type;
    }
    fn transmits(&self, point: &Point2<Length>) -> bool {
        let x_c = (self.a_min.value + self.a_max.value) / 2.0;
        let y_c = (self.b_min.value + self.b_max.value) / 2.0;
        let a = (self.a_max.value - self.a_min.value) / 2.0;
        let b = (self.b_max.value - self.b_min.value) / 2.0;
        let u = (point.x.value - x_c) / a;
        let v = (point.y.value - y_c) / b;
        let inside = u.mul_add(u, v * v) <= 1.0;
        match self.boundary_type {
            BoundaryType::Hole => inside,
            BoundaryType::Obstruction => !inside,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::millimeter;

    #[test]
    fn default() {
        assert!(matches!(Boundary::default(), Boundary::None));
        assert!(Boundary::None.transmits(&millimeter!(1e6, -1e6)));
    }
    #[test]
    fn rectangle_config() {
        assert!(RectangleConfig::new(
            millimeter!(1.0),
            millimeter!(-1.0),
            millimeter!(-1.0),
            millimeter!(1.0)
        )
        .is_err());
        assert!(RectangleConfig::new(
            millimeter!(f64::NAN),
            millimeter!(1.0),
            millimeter!(-1.0),
            millimeter!(1.0)
        )
        .is_err());
        assert!(RectangleConfig::new(
            millimeter!(-1.0),
            millimeter!(1.0),
            millimeter!(1.0),
            millimeter!(1.0)
        )
        .is_err());
    }
    #[test]
    fn rectangle_hole() {
        let r = RectangleConfig::new(
            millimeter!(-1.0),
            millimeter!(2.0),
            millimeter!(-3.0),
            millimeter!(4.0),
        )
        .unwrap();
        let b = Boundary::Rectangle(r);
        assert!(b.transmits(&millimeter!(0.0, 0.0)));
        assert!(b.transmits(&millimeter!(-1.0, 4.0)));
        assert!(!b.transmits(&millimeter!(2.1, 0.0)));
        assert!(!b.transmits(&millimeter!(0.0, -3.1)));
    }
    #[test]
    fn rectangle_obstruction() {
        let mut r = RectangleConfig::new(
            millimeter!(-1.0),
            millimeter!(1.0),
            millimeter!(-1.0),
            millimeter!(1.0),
        )
        .unwrap();
        r.set_boundary_type(BoundaryType::Obstruction);
        let b = Boundary::Rectangle(r);
        assert!(!b.transmits(&millimeter!(0.0, 0.0)));
        assert!(b.transmits(&millimeter!(1.5, 0.0)));
    }
    #[test]
    fn ellipse() {
        let e = EllipseConfig::new(
            millimeter!(-2.0),
            millimeter!(2.0),
            millimeter!(-1.0),
            millimeter!(1.0),
        )
        .unwrap();
        let b = Boundary::Ellipse(e);
        assert!(b.transmits(&millimeter!(0.0, 0.0)));
        assert!(b.transmits(&millimeter!(2.0, 0.0)));
        assert!(!b.transmits(&millimeter!(2.0, 1.0)));
        assert!(EllipseConfig::new(
            millimeter!(2.0),
            millimeter!(-2.0),
            millimeter!(-1.0),
            millimeter!(1.0)
        )
        .is_err());
    }
    #[test]
    fn clipped_fraction_matches_aperture_area() {
        // half-width aperture inside the unit square
        let r = RectangleConfig::new(
            millimeter!(0.25),
            millimeter!(0.75),
            millimeter!(0.0),
            millimeter!(1.0),
        )
        .unwrap();
        let b = Boundary::Rectangle(r);
        let n = 100;
        let mut transmitted = 0usize;
        for i in 0..n {
            for j in 0..n {
                let x = (f64::from(i) + 0.5) / f64::from(n);
                let y = (f64::from(j) + 0.5) / f64::from(n);
                if b.transmits(&millimeter!(x, y)) {
                    transmitted += 1;
                }
            }
        }
        let fraction = crate::utils::usize_to_f64(transmitted) / f64::from(n * n);
        assert!((fraction - 0.5).abs() < 1e-2, "transmitted fraction {fraction}");
    }
    #[test]
    fn stack() {
        let r = RectangleConfig::new(
            millimeter!(-2.0),
            millimeter!(2.0),
            millimeter!(-2.0),
            millimeter!(2.0),
        )
        .unwrap();
        let mut hole = RectangleConfig::new(
            millimeter!(-0.5),
            millimeter!(0.5),
            millimeter!(-0.5),
            millimeter!(0.5),
        )
        .unwrap();
        hole.set_boundary_type(BoundaryType::Obstruction);
        let b = Boundary::Stack(vec![Boundary::Rectangle(r), Boundary::Rectangle(hole)]);
        assert!(b.transmits(&millimeter!(1.0, 1.0)));
        assert!(!b.transmits(&millimeter!(0.0, 0.0)));
        assert!(!b.transmits(&millimeter!(3.0, 0.0)));
    }
}
