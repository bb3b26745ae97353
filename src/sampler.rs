#![warn(missing_docs)]
//! Inverse-CDF sampling of tabulated distributions
//!
//! The source model delivers intensity tables, not closed-form
//! distributions. The samplers in this module turn such tables into random
//! variates by the inverse transform method: a discrete cumulative sum over
//! the table (compensated with Kahan summation, the tables can hold many
//! strongly varying bins), normalized to one, inverted by linear
//! interpolation. All samplers consume uniform variates in `[0, 1)` handed
//! in by the caller, so a seeded generator reproduces a beam exactly.
use itertools::Itertools;
use kahan::KahanSum;
use nalgebra::DMatrix;

use crate::error::{BeamtraceError, BtResult};

/// Inverse-CDF sampler of a 1D tabulated distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampler1d {
    abscissas: Vec<f64>,
    /// cumulative distribution, normalized so the last entry is 1
    cdf: Vec<f64>,
}
impl Sampler1d {
    /// Create a new [`Sampler1d`] from tabulated (non-negative) distribution
    /// values on the given abscissas.
    ///
    /// # Errors
    ///
    /// This function will return an error if fewer than two points are
    /// given, the lengths differ, the abscissas are not strictly increasing
    /// and finite, a value is negative or not finite, or all values are
    /// zero.
    pub fn new(abscissas: Vec<f64>, values: &[f64]) -> BtResult<Self> {
        if abscissas.len() < 2 {
            return Err(BeamtraceError::Sampling(
                "sampler needs at least two tabulated points".into(),
            ));
        }
        if abscissas.len() != values.len() {
            return Err(BeamtraceError::Sampling(format!(
                "{} abscissas given for {} values",
                abscissas.len(),
                values.len()
            )));
        }
        if abscissas.iter().any(|a| !a.is_finite())
            || abscissas.iter().tuple_windows().any(|(a, b)| b <= a)
        {
            return Err(BeamtraceError::Sampling(
                "abscissas must be finite and strictly increasing".into(),
            ));
        }
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(BeamtraceError::Sampling(
                "distribution values must be finite and >= 0".into(),
            ));
        }
        let mut running = KahanSum::new_with_value(0.0);
        let cdf: Vec<f64> = values
            .iter()
            .map(|v| {
                running += *v;
                running.sum()
            })
            .collect();
        let total = running.sum();
        if total <= 0.0 {
            return Err(BeamtraceError::Sampling(
                "distribution must not be all zero".into(),
            ));
        }
        let cdf = cdf.into_iter().map(|c| c / total).collect();
        Ok(Self { abscissas, cdf })
    }
    /// Draw one variate for the uniform `u` in `[0, 1)`.
    #[must_use]
    pub fn sample(&self, u: f64) -> f64 {
        self.sample_with_index(u).0
    }
    /// Draw one variate plus the index of the table bin it fell into.
    #[must_use]
    pub fn sample_with_index(&self, u: f64) -> (f64, usize) {
        let u = u.clamp(0.0, 1.0);
        let idx = self.cdf.partition_point(|c| *c < u);
        if idx == 0 {
            return (self.abscissas[0], 0);
        }
        let idx = idx.min(self.cdf.len() - 1);
        let (c_lo, c_hi) = (self.cdf[idx - 1], self.cdf[idx]);
        let (x_lo, x_hi) = (self.abscissas[idx - 1], self.abscissas[idx]);
        if c_hi <= c_lo {
            // zero-mass bin, no interpolation possible
            return (x_hi, idx);
        }
        let x = ((u - c_lo) / (c_hi - c_lo))
            .mul_add(x_hi - x_lo, x_lo)
            .clamp(x_lo, x_hi);
        (x, idx)
    }
}

/// Inverse-CDF sampler of a 2D tabulated distribution on a (θ, φ) grid.
///
/// Sampling factorizes into the marginal distribution over θ (φ-summed
/// grid) and, per θ bin, the conditional distribution over φ.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampler2d {
    marginal: Sampler1d,
    conditionals: Vec<Option<Sampler1d>>,
}
impl Sampler2d {
    /// Create a new [`Sampler2d`] from an intensity grid with one row per θ
    /// node and one column per φ node.
    ///
    /// # Errors
    ///
    /// This function will return an error if the grid shape does not match
    /// the axes or the tabulated data is invalid (see [`Sampler1d::new`]).
    pub fn new(theta: Vec<f64>, phi: Vec<f64>, intensity: &DMatrix<f64>) -> BtResult<Self> {
        if intensity.nrows() != theta.len() || intensity.ncols() != phi.len() {
            return Err(BeamtraceError::Sampling(format!(
                "intensity grid {}x{} does not match axes {}x{}",
                intensity.nrows(),
                intensity.ncols(),
                theta.len(),
                phi.len()
            )));
        }
        let row_sums: Vec<f64> = (0..intensity.nrows())
            .map(|i| {
                let mut sum = KahanSum::new_with_value(0.0);
                for j in 0..intensity.ncols() {
                    sum += intensity[(i, j)];
                }
                sum.sum()
            })
            .collect();
        let marginal = Sampler1d::new(theta, &row_sums)?;
        let conditionals = (0..intensity.nrows())
            .map(|i| {
                if row_sums[i] > 0.0 {
                    Sampler1d::new(phi.clone(), intensity.row(i).transpose().as_slice()).map(Some)
                } else {
                    Ok(None)
                }
            })
            .collect::<BtResult<Vec<_>>>()?;
        Ok(Self {
            marginal,
            conditionals,
        })
    }
    /// Draw one (θ, φ) pair for two independent uniforms in `[0, 1)`.
    #[must_use]
    pub fn sample(&self, u_theta: f64, u_phi: f64) -> (f64, f64) {
        let (theta, row) = self.marginal.sample_with_index(u_theta);
        let conditional = self.nearest_conditional(row);
        (theta, conditional.sample(u_phi))
    }
    /// Conditional φ sampler of the given row, falling back to the nearest
    /// row carrying intensity.
    fn nearest_conditional(&self, row: usize) -> &Sampler1d {
        if let Some(Some(sampler)) = self.conditionals.get(row) {
            return sampler;
        }
        // a zero-mass row can only be hit at a cdf plateau edge
        for offset in 1..self.conditionals.len() {
            for candidate in [row.checked_sub(offset), row.checked_add(offset)] {
                if let Some(Some(sampler)) = candidate.and_then(|c| self.conditionals.get(c)) {
                    return sampler;
                }
            }
        }
        // at least one row has intensity, the marginal constructor enforced it
        unreachable!("sampler grid without any intensity")
    }
}

/// Inverse-CDF sampler of a 3D tabulated distribution on an
/// (energy, θ, φ) grid.
///
/// The energy is drawn from the marginal over the (θ, φ)-summed slices and
/// interpolated continuously; θ and φ are then drawn from the 2D sampler of
/// the nearest tabulated energy slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampler3d {
    energies: Vec<f64>,
    marginal: Sampler1d,
    slices: Vec<Sampler2d>,
}
impl Sampler3d {
    /// Create a new [`Sampler3d`] from per-energy intensity grids.
    ///
    /// # Errors
    ///
    /// This function will return an error if the number of slices does not
    /// match the energy axis or any slice is invalid (see [`Sampler2d::new`]).
    pub fn new(
        energies: Vec<f64>,
        theta: Vec<f64>,
        phi: Vec<f64>,
        intensity: &[DMatrix<f64>],
    ) -> BtResult<Self> {
        if intensity.len() != energies.len() {
            return Err(BeamtraceError::Sampling(format!(
                "{} intensity slices given for {} energies",
                intensity.len(),
                energies.len()
            )));
        }
        let slice_sums: Vec<f64> = intensity
            .iter()
            .map(|slice| {
                let mut sum = KahanSum::new_with_value(0.0);
                for v in slice {
                    sum += *v;
                }
                sum.sum()
            })
            .collect();
        let marginal = Sampler1d::new(energies.clone(), &slice_sums)?;
        let slices = intensity
            .iter()
            .map(|slice| Sampler2d::new(theta.clone(), phi.clone(), slice))
            .collect::<BtResult<Vec<_>>>()?;
        Ok(Self {
            energies,
            marginal,
            slices,
        })
    }
    /// Draw one (energy, θ, φ) triple for three independent uniforms in
    /// `[0, 1)`.
    #[must_use]
    pub fn sample(&self, u_energy: f64, u_theta: f64, u_phi: f64) -> (f64, f64, f64) {
        let (energy, idx) = self.marginal.sample_with_index(u_energy);
        // angular distribution of the nearest tabulated slice
        let slice = if idx > 0
            && (energy - self.energies[idx - 1]).abs() < (self.energies[idx] - energy).abs()
        {
            idx - 1
        } else {
            idx
        };
        let (theta, phi) = self.slices[slice].sample(u_theta, u_phi);
        (energy, theta, phi)
    }
}
