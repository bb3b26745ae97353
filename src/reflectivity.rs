#![warn(missing_docs)]
//! Reflectivity and attenuation provider contracts
//!
//! Material optics (optical constants, Fresnel tables) are not part of this
//! crate. Elements consume them through the narrow provider traits below:
//! a [`ReflectivityProvider`] returns polarization-resolved *intensity*
//! reflectivities as a function of grazing angle and photon energy, an
//! [`AttenuationProvider`] returns linear attenuation coefficients as a
//! function of photon energy. The tracer applies the square root of these
//! factors to the stored field amplitudes.
use std::sync::Arc;

use uom::si::f64::Length;

use crate::error::{BeamtraceError, BtResult};

/// Provider of polarization-resolved mirror reflectivities.
///
/// All slices have equal length; one entry per ray. Returned values must be
/// intensity reflectivities within `[0, 1]`.
pub trait ReflectivityProvider: Send + Sync {
    /// Calculate (Rs, Rp) intensity reflectivities.
    ///
    /// `grazing_angle_mrad` and `photon_energy_ev` have one entry per ray,
    /// `roughness_rms` is the surface rms roughness in Ångström.
    ///
    /// # Errors
    ///
    /// Implementations return an error if the requested angles/energies are
    /// outside their tabulated range.
    fn reflectivity(
        &self,
        grazing_angle_mrad: &[f64],
        photon_energy_ev: &[f64],
        roughness_rms: f64,
    ) -> BtResult<(Vec<f64>, Vec<f64>)>;
}

/// Provider of linear attenuation coefficients (1/m).
pub trait AttenuationProvider: Send + Sync {
    /// Calculate the linear attenuation coefficient for each photon energy.
    ///
    /// # Errors
    ///
    /// Implementations return an error if an energy is outside their
    /// tabulated range.
    fn attenuation_coefficient(&self, photon_energy_ev: &[f64]) -> BtResult<Vec<f64>>;
}

/// Reflectivity configuration of a mirror.
///
/// Only [`MirrorReflectivity::None`] and
/// [`MirrorReflectivity::FullPolarization`] are traceable; the remaining
/// source modes of the original implementation are kept as explicit variants
/// that fail fast during tracing.
#[derive(Clone, Default)]
pub enum MirrorReflectivity {
    /// geometry only, field amplitudes are left untouched. This is the default.
    #[default]
    None,
    /// full polarization treatment via an external provider
    FullPolarization {
        /// the external reflectivity provider
        provider: Arc<dyn ReflectivityProvider>,
        /// surface rms roughness in Ångström, handed through to the provider
        roughness_rms: f64,
    },
    /// electric susceptibility model (not implemented)
    Susceptibility,
    /// tabulated 1D reflectivity vs. angle or energy (not implemented)
    TabulatedFile,
}
impl MirrorReflectivity {
    /// Validate that this reflectivity mode can be traced.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error for the unimplemented source modes.
    pub fn check_supported(&self) -> BtResult<()> {
        match self {
            Self::None | Self::FullPolarization { .. } => Ok(()),
            Self::Susceptibility => Err(BeamtraceError::Element(
                "unimplemented reflectivity source: electric susceptibility".into(),
            )),
            Self::TabulatedFile => Err(BeamtraceError::Element(
                "unimplemented reflectivity source: tabulated file".into(),
            )),
        }
    }
}
impl std::fmt::Debug for MirrorReflectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::FullPolarization { roughness_rms, .. } => {
                write!(f, "FullPolarization(roughness_rms: {roughness_rms})")
            }
            Self::Susceptibility => write!(f, "Susceptibility"),
            Self::TabulatedFile => write!(f, "TabulatedFile"),
        }
    }
}

/// Absorbing filter specification: attenuation provider plus thickness.
///
/// The transmitted intensity fraction is `exp(−μ(E)·d)`.
#[derive(Clone)]
pub struct FilterSpec {
    provider: Arc<dyn AttenuationProvider>,
    thickness: Length,
}
impl FilterSpec {
    /// Create a new [`FilterSpec`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the thickness is negative or not
    /// finite.
    pub fn new(provider: Arc<dyn AttenuationProvider>, thickness: Length) -> BtResult<Self> {
        if thickness.is_sign_negative() || !thickness.is_finite() {
            return Err(BeamtraceError::Element(
                "filter thickness must be >= 0 and finite".into(),
            ));
        }
        Ok(Self { provider, thickness })
    }
    /// Amplitude transmission factor per photon energy: `√exp(−μ·d)`.
    ///
    /// # Errors
    ///
    /// Propagates provider errors.
    pub fn transmission_amplitudes(&self, photon_energy_ev: &[f64]) -> BtResult<Vec<f64>> {
        let coefficients = self.provider.attenuation_coefficient(photon_energy_ev)?;
        Ok(coefficients
            .iter()
            .map(|mu| (-mu * self.thickness.value).exp().sqrt())
            .collect())
    }
}
impl std::fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FilterSpec(thickness: {} m)", self.thickness.value)
    }
}

/// Ideal provider with constant, angle- and energy-independent reflectivity.
#[derive(Debug, Clone, Copy)]
pub struct ConstantReflectivity {
    r_s: f64,
    r_p: f64,
}
impl ConstantReflectivity {
    /// Create a new [`ConstantReflectivity`] provider.
    ///
    /// # Errors
    ///
    /// This function will return an error if a reflectivity is outside
    /// `[0, 1]`.
    pub fn new(r_s: f64, r_p: f64) -> BtResult<Self> {
        if !(0.0..=1.0).contains(&r_s) || !(0.0..=1.0).contains(&r_p) {
            return Err(BeamtraceError::Element(
                "reflectivity must be within [0,1]".into(),
            ));
        }
        Ok(Self { r_s, r_p })
    }
}
impl ReflectivityProvider for ConstantReflectivity {
    fn reflectivity(
        &self,
        grazing_angle_mrad: &[f64],
        _photon_energy_ev: &[f64],
        _roughness_rms: f64,
    ) -> BtResult<(Vec<f64>, Vec<f64>)> {
        let n = grazing_angle_mrad.len();
        Ok((vec![self.r_s; n], vec![self.r_p; n]))
    }
}

/// Ideal provider with a constant, energy-independent attenuation coefficient.
#[derive(Debug, Clone, Copy)]
pub struct ConstantAttenuation {
    /// linear attenuation coefficient in 1/m
    coefficient: f64,
}
impl ConstantAttenuation {
    /// Create a new [`ConstantAttenuation`] provider (coefficient in 1/m).
    ///
    /// # Errors
    ///
    /// This function will return an error if the coefficient is negative or
    /// not finite.
    pub fn new(coefficient: f64) -> BtResult<Self> {
        if coefficient < 0.0 || !coefficient.is_finite() {
            return Err(BeamtraceError::Element(
                "attenuation coefficient must be >= 0 and finite".into(),
            ));
        }
        Ok(Self { coefficient })
    }
}
impl AttenuationProvider for ConstantAttenuation {
    fn attenuation_coefficient(&self, photon_energy_ev: &[f64]) -> BtResult<Vec<f64>> {
        Ok(vec![self.coefficient; photon_energy_ev.len()])
    }
}

/// Incidence angle (from the surface normal) between a ray direction and the
/// surface normal, both unit norm.
///
/// The dot product is clamped into `[-1, 1]` before the `acos` call to guard
/// against rounding just outside the domain at exact normal or grazing
/// incidence.
#[must_use]
pub fn incidence_angle(direction: &nalgebra::Vector3<f64>, normal: &nalgebra::Vector3<f64>) -> f64 {
    direction.dot(normal).abs().clamp(0.0, 1.0).acos()
}

/// Grazing angle in mrad corresponding to an incidence angle in radians.
#[must_use]
pub fn grazing_angle_mrad(incidence_angle: f64) -> f64 {
    1e3 * (std::f64::consts::FRAC_PI_2 - incidence_angle)
}
