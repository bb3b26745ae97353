#![warn(missing_docs)]
//! Source modeling: turning tabulated radiation patterns into beams
//!
//! A [`RadiationTable`] holds the far-field intensity of a source on a
//! polar (θ, φ) grid, either for a single photon energy or per energy
//! slice. A [`SourceSampler`] weights the table with the polar Jacobian,
//! builds the inverse-CDF samplers and draws rays from it: polar emission
//! angles are converted to direction cosines, optional Gaussian jitter
//! models the finite electron beam size and divergence. All randomness
//! comes from a caller-provided generator, so a seeded run reproduces its
//! beam bit for bit.
use nalgebra::{DMatrix, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use uom::si::f64::Length;

use crate::{
    beam::Beam,
    electronvolt,
    error::{BeamtraceError, BtResult},
    meter,
    ray::Ray,
    sampler::{Sampler2d, Sampler3d},
};

/// weight floor keeping zero-angle bins reachable
const JACOBIAN_FLOOR: f64 = 1e-6;

/// Tabulated far-field intensity of a source on a polar angle grid.
///
/// θ is the polar angle measured from the beam axis (radians, `>= 0`), φ
/// the azimuth within one quadrant. Intensities are relative weights, their
/// absolute scale cancels in the sampling.
#[derive(Debug, Clone, PartialEq)]
pub enum RadiationTable {
    /// single-energy table
    Monochromatic {
        /// photon energy in eV
        energy_ev: f64,
        /// polar angle nodes in radians, strictly increasing, starting >= 0
        theta: Vec<f64>,
        /// azimuth nodes in radians, strictly increasing
        phi: Vec<f64>,
        /// intensity grid, one row per θ node, one column per φ node
        intensity: DMatrix<f64>,
    },
    /// table with one intensity grid per photon energy
    Polychromatic {
        /// photon energies in eV, strictly increasing, positive
        energies_ev: Vec<f64>,
        /// polar angle nodes in radians, strictly increasing, starting >= 0
        theta: Vec<f64>,
        /// azimuth nodes in radians, strictly increasing
        phi: Vec<f64>,
        /// intensity grids, one per energy
        intensity: Vec<DMatrix<f64>>,
    },
}
impl RadiationTable {
    fn theta(&self) -> &[f64] {
        match self {
            Self::Monochromatic { theta, .. } | Self::Polychromatic { theta, .. } => theta,
        }
    }
    fn validate(&self) -> BtResult<()> {
        let theta = self.theta();
        if theta.first().map_or(true, |t| *t < 0.0) {
            return Err(BeamtraceError::Sampling(
                "polar angle grid must start at >= 0".into(),
            ));
        }
        if theta.last().map_or(true, |t| *t <= 0.0) {
            return Err(BeamtraceError::Sampling(
                "polar angle grid must extend beyond zero".into(),
            ));
        }
        match self {
            Self::Monochromatic { energy_ev, .. } => {
                if *energy_ev <= 0.0 || !energy_ev.is_finite() {
                    return Err(BeamtraceError::Sampling(
                        "photon energy must be positive and finite".into(),
                    ));
                }
            }
            Self::Polychromatic { energies_ev, .. } => {
                if energies_ev.iter().any(|e| *e <= 0.0 || !e.is_finite()) {
                    return Err(BeamtraceError::Sampling(
                        "photon energies must be positive and finite".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Weight an intensity grid with the polar Jacobian.
///
/// A polar table holds intensity per solid angle; sampling (θ, φ) as plain
/// coordinates requires the `sin θ ≈ θ` area weight. The angles are
/// normalized to the largest one and floored so that the on-axis bins keep
/// a nonzero sampling probability.
fn apply_polar_jacobian(theta: &[f64], intensity: &DMatrix<f64>) -> DMatrix<f64> {
    // validate() guarantees a positive maximum
    let theta_max = theta[theta.len() - 1];
    let mut weighted = intensity.clone();
    for (i, t) in theta.iter().enumerate() {
        let weight = t / theta_max + JACOBIAN_FLOOR;
        for j in 0..weighted.ncols() {
            weighted[(i, j)] *= weight;
        }
    }
    weighted
}

enum AngularSampler {
    Fixed {
        energy_ev: f64,
        angles: Sampler2d,
    },
    PerEnergy(Sampler3d),
}

/// Draws beams from a [`RadiationTable`].
pub struct SourceSampler {
    sampler: AngularSampler,
    size_rms: Option<(f64, f64)>,
    divergence_rms: Option<(f64, f64)>,
}
impl SourceSampler {
    /// Create a new [`SourceSampler`] for the given table.
    ///
    /// # Errors
    ///
    /// This function will return an error if the table fails validation
    /// (see [`RadiationTable`] field requirements).
    pub fn new(table: &RadiationTable) -> BtResult<Self> {
        table.validate()?;
        let sampler = match table {
            RadiationTable::Monochromatic {
                energy_ev,
                theta,
                phi,
                intensity,
            } => AngularSampler::Fixed {
                energy_ev: *energy_ev,
                angles: Sampler2d::new(
                    theta.clone(),
                    phi.clone(),
                    &apply_polar_jacobian(theta, intensity),
                )?,
            },
            RadiationTable::Polychromatic {
                energies_ev,
                theta,
                phi,
                intensity,
            } => {
                let weighted: Vec<DMatrix<f64>> = intensity
                    .iter()
                    .map(|slice| apply_polar_jacobian(theta, slice))
                    .collect();
                AngularSampler::PerEnergy(Sampler3d::new(
                    energies_ev.clone(),
                    theta.clone(),
                    phi.clone(),
                    &weighted,
                )?)
            }
        };
        Ok(Self {
            sampler,
            size_rms: None,
            divergence_rms: None,
        })
    }
    /// Add Gaussian jitter of the ray starting positions (finite source
    /// size), rms values per transverse axis.
    ///
    /// # Errors
    ///
    /// This function will return an error if an rms value is negative or
    /// not finite.
    pub fn with_size_jitter(mut self, rms_x: Length, rms_z: Length) -> BtResult<Self> {
        check_rms(rms_x.value, rms_z.value)?;
        self.size_rms = Some((rms_x.value, rms_z.value));
        Ok(self)
    }
    /// Add Gaussian jitter of the emission angles (electron beam
    /// divergence), rms values in radians per transverse axis.
    ///
    /// # Errors
    ///
    /// This function will return an error if an rms value is negative or
    /// not finite.
    pub fn with_divergence_jitter(mut self, rms_x: f64, rms_z: f64) -> BtResult<Self> {
        check_rms(rms_x, rms_z)?;
        self.divergence_rms = Some((rms_x, rms_z));
        Ok(self)
    }
    /// Draw a beam of the given number of rays.
    ///
    /// Each ray starts alive and s-polarized with unit field amplitude; its
    /// [`source_index`](Ray::source_index) records the draw order.
    ///
    /// # Errors
    ///
    /// This function will return an error if the number of rays is zero or
    /// the jitter configuration is degenerate.
    pub fn sample_beam<R: Rng + ?Sized>(&self, nr_of_rays: usize, rng: &mut R) -> BtResult<Beam> {
        if nr_of_rays == 0 {
            return Err(BeamtraceError::Sampling(
                "cannot sample an empty beam".into(),
            ));
        }
        let size_normals = self
            .size_rms
            .map(|(x, z)| new_normal_pair(x, z))
            .transpose()?;
        let divergence_normals = self
            .divergence_rms
            .map(|(x, z)| new_normal_pair(x, z))
            .transpose()?;
        let mut rays = Vec::with_capacity(nr_of_rays);
        for index in 0..nr_of_rays {
            let (energy_ev, theta, phi) = match &self.sampler {
                AngularSampler::Fixed { energy_ev, angles } => {
                    let (theta, phi) = angles.sample(rng.random(), rng.random());
                    (*energy_ev, theta, phi)
                }
                AngularSampler::PerEnergy(sampler) => {
                    sampler.sample(rng.random(), rng.random(), rng.random())
                }
            };
            // split the polar angle into the two projected angles and
            // unfold the one-quadrant table with random sign flips
            let angle_v = (theta.sin() * phi.sin()).asin();
            let mut angle_x = (theta.cos() / angle_v.cos()).clamp(-1.0, 1.0).acos();
            let mut angle_v = angle_v.abs();
            if rng.random::<bool>() {
                angle_x = -angle_x;
            }
            if rng.random::<bool>() {
                angle_v = -angle_v;
            }
            if let Some((normal_x, normal_v)) = &divergence_normals {
                angle_x += normal_x.sample(rng);
                angle_v += normal_v.sample(rng);
            }
            let direction = Vector3::new(angle_x.tan(), 1.0, angle_v.tan() / angle_x.cos());
            let position = size_normals.as_ref().map_or_else(
                || meter!(0.0, 0.0, 0.0),
                |(normal_x, normal_z)| meter!(normal_x.sample(rng), 0.0, normal_z.sample(rng)),
            );
            let mut ray = Ray::new(position, direction, electronvolt!(energy_ev))?;
            ray.set_source_index(index);
            rays.push(ray);
        }
        Ok(Beam::new(rays))
    }
}

fn check_rms(rms_x: f64, rms_z: f64) -> BtResult<()> {
    if rms_x < 0.0 || rms_z < 0.0 || !rms_x.is_finite() || !rms_z.is_finite() {
        return Err(BeamtraceError::Sampling(
            "jitter rms values must be >= 0 and finite".into(),
        ));
    }
    Ok(())
}

fn new_normal_pair(rms_a: f64, rms_b: f64) -> BtResult<(Normal<f64>, Normal<f64>)> {
    let make = |rms| {
        Normal::new(0.0, rms)
            .map_err(|e| BeamtraceError::Sampling(format!("invalid jitter rms: {e}")))
    };
    Ok((make(rms_a)?, make(rms_b)?))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::millimeter;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn ring_table() -> RadiationTable {
        // all intensity in the middle polar ring
        let theta = vec![9.0e-4, 1.0e-3, 1.1e-3];
        let phi = vec![0.0, std::f64::consts::FRAC_PI_4, std::f64::consts::FRAC_PI_2];
        let mut intensity = DMatrix::zeros(3, 3);
        for j in 0..3 {
            intensity[(1, j)] = 1.0;
        }
        RadiationTable::Monochromatic {
            energy_ev: 12_400.0,
            theta,
            phi,
            intensity,
        }
    }
    #[test]
    fn validation() {
        let table = RadiationTable::Monochromatic {
            energy_ev: 1000.0,
            theta: vec![-1e-3, 1e-3],
            phi: vec![0.0, 1.0],
            intensity: DMatrix::from_element(2, 2, 1.0),
        };
        assert!(SourceSampler::new(&table).is_err());
        let table = RadiationTable::Monochromatic {
            energy_ev: -5.0,
            theta: vec![0.0, 1e-3],
            phi: vec![0.0, 1.0],
            intensity: DMatrix::from_element(2, 2, 1.0),
        };
        assert!(SourceSampler::new(&table).is_err());
        let table = RadiationTable::Monochromatic {
            energy_ev: 1000.0,
            theta: vec![0.0, 1e-3],
            phi: vec![0.0, 1.0],
            intensity: DMatrix::zeros(2, 2),
        };
        assert!(SourceSampler::new(&table).is_err());
    }
    #[test]
    fn sampled_beam_basics() {
        let sampler = SourceSampler::new(&ring_table()).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let beam = sampler.sample_beam(200, &mut rng).unwrap();
        assert_eq!(beam.len(), 200);
        assert_eq!(beam.nr_of_alive_rays(), 200);
        assert!(beam.check_direction_norms(1e-12).is_ok());
        for (index, ray) in beam.iter().enumerate() {
            assert_eq!(ray.source_index(), index);
            assert_relative_eq!(ray.intensity(), 1.0);
            assert_relative_eq!(
                ray.energy().get::<uom::si::energy::electronvolt>(),
                12_400.0,
                max_relative = 1e-9
            );
            // rays start in the source plane
            assert_relative_eq!(ray.position_in_meters().y, 0.0);
        }
        assert!(sampler.sample_beam(0, &mut rng).is_err());
    }
    #[test]
    fn ring_table_preserves_polar_angle() {
        let sampler = SourceSampler::new(&ring_table()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let beam = sampler.sample_beam(500, &mut rng).unwrap();
        for ray in beam.iter() {
            // the projected-angle conversion preserves cos θ = v·ŷ
            let polar = ray.direction().y.acos();
            assert!(
                (8.9e-4..=1.01e-3).contains(&polar),
                "polar angle {polar} outside the tabulated ring"
            );
        }
    }
    #[test]
    fn flat_table_density_grows_with_polar_angle() {
        // a flat intensity table covers equal solid angle per ring area, so
        // the sampled polar-angle density must grow linearly with theta
        let theta_max = 1.0e-3;
        let theta: Vec<f64> = (0..101)
            .map(|i| f64::from(i) * theta_max / 100.0)
            .collect();
        let phi = vec![0.0, std::f64::consts::FRAC_PI_4, std::f64::consts::FRAC_PI_2];
        let table = RadiationTable::Monochromatic {
            energy_ev: 1000.0,
            theta,
            phi,
            intensity: DMatrix::from_element(101, 3, 1.0),
        };
        let sampler = SourceSampler::new(&table).unwrap();
        let mut rng = StdRng::seed_from_u64(271_828);
        let beam = sampler.sample_beam(30_000, &mut rng).unwrap();
        let band_count = |lo: f64, hi: f64| {
            beam.iter()
                .filter(|r| {
                    let polar = r.direction().y.acos();
                    polar >= lo && polar < hi
                })
                .count()
        };
        // equal-width bands at mean radii 2.5e-4 and 7.5e-4
        let inner = band_count(2.0e-4, 3.0e-4);
        let outer = band_count(7.0e-4, 8.0e-4);
        assert!(inner > 0);
        let ratio = crate::utils::usize_to_f64(outer) / crate::utils::usize_to_f64(inner);
        assert!((2.6..=3.4).contains(&ratio), "band count ratio {ratio}");
    }
    #[test]
    fn seeded_sampling_is_reproducible() {
        let sampler = SourceSampler::new(&ring_table())
            .unwrap()
            .with_size_jitter(millimeter!(0.1), millimeter!(0.02))
            .unwrap()
            .with_divergence_jitter(1e-5, 1e-5)
            .unwrap();
        let beam_a = sampler
            .sample_beam(50, &mut StdRng::seed_from_u64(123))
            .unwrap();
        let beam_b = sampler
            .sample_beam(50, &mut StdRng::seed_from_u64(123))
            .unwrap();
        assert_eq!(beam_a, beam_b);
        let beam_c = sampler
            .sample_beam(50, &mut StdRng::seed_from_u64(124))
            .unwrap();
        assert_ne!(beam_a, beam_c);
    }
    #[test]
    fn size_jitter_spreads_positions() {
        let sampler = SourceSampler::new(&ring_table())
            .unwrap()
            .with_size_jitter(millimeter!(0.1), millimeter!(0.0))
            .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let beam = sampler.sample_beam(1000, &mut rng).unwrap();
        let spread: f64 = beam
            .iter()
            .map(|r| r.position_in_meters().x.powi(2))
            .sum::<f64>()
            / 1000.0;
        // rms within 20% of the requested 0.1 mm
        assert!((spread.sqrt() - 1e-4).abs() < 2e-5, "rms {}", spread.sqrt());
        for ray in beam.iter() {
            assert_relative_eq!(ray.position_in_meters().z, 0.0);
        }
    }
}
