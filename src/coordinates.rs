#![warn(missing_docs)]
//! Positioning of an optical element relative to the beam
//!
//! [`ElementCoordinates`] holds the two distances and two angles that fully
//! determine the entry and exit frame transforms of one beamline element:
//! the source-to-element distance `p`, the element-to-image distance `q`,
//! the radial incidence angle (measured from the surface normal) and the
//! azimuthal rotation of the element around the incoming beam axis. An
//! optional distinct exit angle covers asymmetric configurations (e.g.
//! gratings).
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use crate::error::{BeamtraceError, BtResult};

/// Immutable coordinate set of one optical element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementCoordinates {
    p: Length,
    q: Length,
    angle_radial: f64,
    angle_azimuthal: f64,
    angle_radial_out: Option<f64>,
}
impl ElementCoordinates {
    /// Create a new [`ElementCoordinates`].
    ///
    /// `angle_radial` and `angle_azimuthal` are in radians. The radial angle
    /// is measured from the surface normal, so a grazing incidence of 3 mrad
    /// corresponds to `angle_radial = π/2 − 0.003`.
    ///
    /// # Errors
    ///
    /// This function will return an error if a distance or angle is not
    /// finite or if `angle_radial` is outside `[0, π]`.
    pub fn new(p: Length, q: Length, angle_radial: f64, angle_azimuthal: f64) -> BtResult<Self> {
        if !p.is_finite() || !q.is_finite() {
            return Err(BeamtraceError::Element(
                "element distances p,q must be finite".into(),
            ));
        }
        if !angle_radial.is_finite() || !(0.0..=std::f64::consts::PI).contains(&angle_radial) {
            return Err(BeamtraceError::Element(
                "angle_radial must be finite and within [0, pi]".into(),
            ));
        }
        if !angle_azimuthal.is_finite() {
            return Err(BeamtraceError::Element("angle_azimuthal must be finite".into()));
        }
        Ok(Self {
            p,
            q,
            angle_radial,
            angle_azimuthal,
            angle_radial_out: None,
        })
    }
    /// Create a new [`ElementCoordinates`] with a distinct exit angle.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ElementCoordinates::new`], additionally the exit
    /// angle must be finite and within `[0, π]`.
    pub fn with_exit_angle(
        p: Length,
        q: Length,
        angle_radial: f64,
        angle_azimuthal: f64,
        angle_radial_out: f64,
    ) -> BtResult<Self> {
        let mut coords = Self::new(p, q, angle_radial, angle_azimuthal)?;
        if !angle_radial_out.is_finite()
            || !(0.0..=std::f64::consts::PI).contains(&angle_radial_out)
        {
            return Err(BeamtraceError::Element(
                "angle_radial_out must be finite and within [0, pi]".into(),
            ));
        }
        coords.angle_radial_out = Some(angle_radial_out);
        Ok(coords)
    }
    /// Source-to-element distance.
    #[must_use]
    pub fn p(&self) -> Length {
        self.p
    }
    /// Element-to-image distance.
    #[must_use]
    pub fn q(&self) -> Length {
        self.q
    }
    /// Radial incidence angle (from the surface normal) in radians.
    #[must_use]
    pub const fn angle_radial(&self) -> f64 {
        self.angle_radial
    }
    /// Azimuthal rotation around the incoming beam axis in radians.
    #[must_use]
    pub const fn angle_azimuthal(&self) -> f64 {
        self.angle_azimuthal
    }
    /// Grazing incidence angle (complement of the radial angle) in radians.
    #[must_use]
    pub fn grazing_angle(&self) -> f64 {
        std::f64::consts::FRAC_PI_2 - self.angle_radial
    }
    /// Grazing exit angle in radians.
    ///
    /// Falls back to the entrance grazing angle if no distinct exit angle was
    /// configured.
    #[must_use]
    pub fn grazing_angle_out(&self) -> f64 {
        self.angle_radial_out
            .map_or_else(|| self.grazing_angle(), |a| std::f64::consts::FRAC_PI_2 - a)
    }
}
