#![warn(missing_docs)]
//! Module for handling optical elements
//!
//! An optical element consumes a [`Beam`] and produces the beam in its own
//! image frame. Tracing never changes the number of rays: rays that fail a
//! geometric or boundary test are marked lost and carried along. A
//! [`Mirror`] reflects on one of the [`SurfaceShape`]s and optionally
//! applies a polarization-resolved reflectivity; a [`Screen`] clips and
//! attenuates the beam at a transverse plane.
use rayon::prelude::*;
use uom::si::energy::electronvolt;
use uom::si::f64::Length;

use crate::{
    beam::Beam,
    boundary::Boundary,
    coordinates::ElementCoordinates,
    error::{BeamtraceError, BtResult},
    meter,
    ray::{specular_reflection, RayFlag},
    reflectivity::{grazing_angle_mrad, incidence_angle, FilterSpec, MirrorReflectivity},
    surface::SurfaceShape,
};

/// A reflective optical element.
#[derive(Debug, Clone)]
pub struct Mirror {
    surface: SurfaceShape,
    coordinates: ElementCoordinates,
    boundary: Boundary,
    reflectivity: MirrorReflectivity,
}
impl Mirror {
    /// Create a new unlimited, lossless [`Mirror`] with the given surface
    /// shape and beamline position.
    #[must_use]
    pub fn new(surface: SurfaceShape, coordinates: ElementCoordinates) -> Self {
        Self {
            surface,
            coordinates,
            boundary: Boundary::default(),
            reflectivity: MirrorReflectivity::default(),
        }
    }
    /// Limit the optically active area of this [`Mirror`].
    ///
    /// The boundary is evaluated on the (x, y) footprint of each
    /// intersection point in the element local frame.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }
    /// Set the reflectivity model of this [`Mirror`].
    #[must_use]
    pub fn with_reflectivity(mut self, reflectivity: MirrorReflectivity) -> Self {
        self.reflectivity = reflectivity;
        self
    }
    /// Returns the surface shape of this [`Mirror`].
    #[must_use]
    pub const fn surface(&self) -> &SurfaceShape {
        &self.surface
    }
    /// Returns the beamline position of this [`Mirror`].
    #[must_use]
    pub const fn coordinates(&self) -> &ElementCoordinates {
        &self.coordinates
    }
    /// Trace a beam through this [`Mirror`].
    ///
    /// The incoming beam is expected in the image frame of the previous
    /// element (or the source frame); the returned beam is in the image
    /// frame of this mirror. The number of rays is preserved.
    ///
    /// # Errors
    ///
    /// This function will return an error for an unsupported reflectivity
    /// configuration or a misbehaving reflectivity provider. Per-ray
    /// failures do not abort the trace, the affected rays are marked lost.
    pub fn trace_beam(&self, incoming: &Beam) -> BtResult<Beam> {
        // reject bad configurations before touching any ray
        self.reflectivity.check_supported()?;
        let mut beam = incoming.clone();
        beam.to_element_frame(&self.coordinates);
        let grazing_mrad: Vec<Option<f64>> = beam
            .rays_mut()
            .par_iter_mut()
            .map(|ray| {
                if !ray.is_alive() {
                    return None;
                }
                let dir = ray.direction();
                match self.surface.intersect(&ray.position_in_meters(), &dir) {
                    Ok(isect) => {
                        let grazing = grazing_angle_mrad(incidence_angle(&dir, &isect.normal));
                        ray.set_intersection(
                            isect.point,
                            specular_reflection(&dir, &isect.normal),
                        );
                        if self.boundary.transmits(&meter!(isect.point.x, isect.point.y)) {
                            Some(grazing)
                        } else {
                            ray.mark_lost(RayFlag::LostBoundary);
                            None
                        }
                    }
                    Err(flag) => {
                        ray.mark_lost(flag);
                        None
                    }
                }
            })
            .collect();
        if let MirrorReflectivity::FullPolarization {
            provider,
            roughness_rms,
        } = &self.reflectivity
        {
            let mut indices = Vec::new();
            let mut angles = Vec::new();
            let mut energies = Vec::new();
            for (idx, grazing) in grazing_mrad.iter().enumerate() {
                if let Some(angle) = grazing {
                    indices.push(idx);
                    angles.push(*angle);
                    energies.push(beam.rays()[idx].energy().get::<electronvolt>());
                }
            }
            let (r_s, r_p) = provider.reflectivity(&angles, &energies, *roughness_rms)?;
            if r_s.len() != indices.len() || r_p.len() != indices.len() {
                return Err(BeamtraceError::Element(
                    "reflectivity provider returned wrong number of values".into(),
                ));
            }
            if r_s
                .iter()
                .chain(r_p.iter())
                .any(|r| !(0.0..=1.0).contains(r))
            {
                return Err(BeamtraceError::Element(
                    "reflectivity provider returned values outside [0,1]".into(),
                ));
            }
            for ((idx, r_s), r_p) in indices.iter().zip(&r_s).zip(&r_p) {
                // intensity reflectivities act as √R on the amplitudes
                beam.rays_mut()[*idx].scale_field_amplitudes(r_s.sqrt(), r_p.sqrt());
            }
        }
        beam.to_image_frame(&self.coordinates);
        Ok(beam)
    }
}

/// A transmissive plane perpendicular to the beam: aperture, beam stopper
/// or absorbing filter.
#[derive(Debug, Clone)]
pub struct Screen {
    p: Length,
    q: Length,
    boundary: Boundary,
    filter: Option<FilterSpec>,
}
impl Screen {
    /// Create a new unlimited, lossless [`Screen`] at distance `p` behind
    /// the previous image plane, with its own image plane a further `q`
    /// downstream.
    ///
    /// # Errors
    ///
    /// This function will return an error if a distance is negative or not
    /// finite.
    pub fn new(p: Length, q: Length) -> BtResult<Self> {
        if !p.is_finite() || !q.is_finite() || p.value < 0.0 || q.value < 0.0 {
            return Err(BeamtraceError::Element(
                "screen distances must be >= 0 and finite".into(),
            ));
        }
        Ok(Self {
            p,
            q,
            boundary: Boundary::default(),
            filter: None,
        })
    }
    /// Limit the open area of this [`Screen`].
    ///
    /// The boundary is evaluated on the transverse (x, z) position of each
    /// ray in the screen plane.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }
    /// Place an absorbing filter in this [`Screen`].
    #[must_use]
    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = Some(filter);
        self
    }
    /// Trace a beam through this [`Screen`].
    ///
    /// The beam is propagated to the screen plane, clipped, attenuated and
    /// propagated on to the image plane. The number of rays is preserved.
    ///
    /// # Errors
    ///
    /// This function will return an error if the attenuation provider fails.
    pub fn trace_beam(&self, incoming: &Beam) -> BtResult<Beam> {
        let mut beam = incoming.clone();
        if self.p.value != 0.0 {
            beam.retrace(self.p, true);
        }
        for ray in beam.iter_mut() {
            if !ray.is_alive() {
                continue;
            }
            let pos = ray.position_in_meters();
            if !self.boundary.transmits(&meter!(pos.x, pos.z)) {
                ray.mark_lost(RayFlag::LostBoundary);
            }
        }
        if let Some(filter) = &self.filter {
            let energies: Vec<f64> = beam
                .iter()
                .filter(|r| r.is_alive())
                .map(|r| r.energy().get::<electronvolt>())
                .collect();
            let amplitudes = filter.transmission_amplitudes(&energies)?;
            if amplitudes.len() != energies.len() {
                return Err(BeamtraceError::Element(
                    "attenuation provider returned wrong number of values".into(),
                ));
            }
            let mut factors = amplitudes.into_iter();
            for ray in beam.iter_mut() {
                if !ray.is_alive() {
                    continue;
                }
                if let Some(factor) = factors.next() {
                    ray.scale_field_amplitudes(factor, factor);
                }
            }
        }
        if self.q.value != 0.0 {
            beam.retrace(self.q, true);
        }
        Ok(beam)
    }
}

/// Any traceable beamline element.
#[derive(Debug, Clone)]
pub enum Element {
    /// a reflective element
    Mirror(Mirror),
    /// a transmissive plane
    Screen(Screen),
}
impl Element {
    /// Trace a beam through this [`Element`].
    ///
    /// # Errors
    ///
    /// Propagates the element's trace error.
    pub fn trace_beam(&self, incoming: &Beam) -> BtResult<Beam> {
        match self {
            Self::Mirror(mirror) => mirror.trace_beam(incoming),
            Self::Screen(screen) => screen.trace_beam(incoming),
        }
    }
}

/// Trace a beam through a sequence of elements, returning the beam in the
/// image frame of the last one.
///
/// # Errors
///
/// Propagates the first element trace error.
pub fn trace_beamline(source_beam: &Beam, elements: &[Element]) -> BtResult<Beam> {
    let mut beam = source_beam.clone();
    for element in elements {
        beam = element.trace_beam(&beam)?;
    }
    Ok(beam)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        boundary::RectangleConfig,
        electronvolt,
        millimeter,
        ray::Ray,
        reflectivity::{ConstantAttenuation, ConstantReflectivity},
        surface::Conic,
    };
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::sync::Arc;

    fn grazing_coords(p: f64, q: f64, theta_g: f64) -> ElementCoordinates {
        ElementCoordinates::new(
            meter!(p),
            meter!(q),
            std::f64::consts::FRAC_PI_2 - theta_g,
            0.0,
        )
        .unwrap()
    }
    fn central_beam() -> Beam {
        Beam::new(vec![Ray::origin_along_y(electronvolt!(1000.0)).unwrap()])
    }
    #[test]
    fn plane_mirror_central_ray() {
        let theta_g = 0.003;
        let mirror = Mirror::new(SurfaceShape::Plane, grazing_coords(10.0, 5.0, theta_g));
        let traced = mirror.trace_beam(&central_beam()).unwrap();
        assert_eq!(traced.len(), 1);
        let ray = &traced.rays()[0];
        assert!(ray.is_alive());
        // the central ray ends up on the image plane axis, along +y
        let pos = ray.position_in_meters();
        assert_relative_eq!(pos.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pos.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pos.z, 0.0, epsilon = 1e-9);
        assert_relative_eq!((ray.direction() - Vector3::y()).norm(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(ray.path_length().value, 15.0, epsilon = 1e-9);
    }
    #[test]
    fn ellipsoid_mirror_focuses() {
        let theta_g = 0.005;
        let (p, q) = (10.0, 3.0);
        let surface = SurfaceShape::Conic(
            Conic::ellipsoid_from_focal_distances(meter!(p), meter!(q), theta_g).unwrap(),
        );
        let mirror = Mirror::new(surface, grazing_coords(p, q, theta_g));
        let mut rays = vec![];
        for tilt in [0.0, 1e-4, -1e-4] {
            rays.push(
                Ray::new(
                    meter!(0.0, 0.0, 0.0),
                    Vector3::new(0.0, 1.0, tilt),
                    electronvolt!(1000.0),
                )
                .unwrap(),
            );
        }
        let traced = mirror.trace_beam(&Beam::new(rays)).unwrap();
        assert_eq!(traced.nr_of_alive_rays(), 3);
        // a point source in the entrance focus images onto the image plane axis
        for ray in traced.iter() {
            let pos = ray.position_in_meters();
            assert_relative_eq!(pos.x, 0.0, epsilon = 1e-8);
            assert_relative_eq!(pos.z, 0.0, epsilon = 1e-8);
        }
    }
    #[test]
    fn mirror_boundary_clips_footprint() {
        let theta_g = 0.01;
        // footprint of a ray 1 mm above the axis: y offset ≈ z/θ ≈ 100 mm
        let aperture = RectangleConfig::new(
            millimeter!(-5.0),
            millimeter!(5.0),
            millimeter!(-50.0),
            millimeter!(50.0),
        )
        .unwrap();
        let mirror = Mirror::new(SurfaceShape::Plane, grazing_coords(10.0, 5.0, theta_g))
            .with_boundary(Boundary::Rectangle(aperture));
        let rays = vec![
            Ray::origin_along_y(electronvolt!(1000.0)).unwrap(),
            Ray::new(
                meter!(0.0, 0.0, 1e-3),
                Vector3::y(),
                electronvolt!(1000.0),
            )
            .unwrap(),
        ];
        let traced = mirror.trace_beam(&Beam::new(rays)).unwrap();
        assert_eq!(traced.len(), 2);
        assert_eq!(traced.nr_of_alive_rays(), 1);
        assert_eq!(traced.nr_of_rays_with_flag(RayFlag::LostBoundary), 1);
    }
    #[test]
    fn mirror_applies_reflectivity() {
        let provider = Arc::new(ConstantReflectivity::new(0.81, 0.49).unwrap());
        let mirror = Mirror::new(SurfaceShape::Plane, grazing_coords(10.0, 5.0, 0.003))
            .with_reflectivity(MirrorReflectivity::FullPolarization {
                provider,
                roughness_rms: 0.0,
            });
        let traced = mirror.trace_beam(&central_beam()).unwrap();
        let (e_s, e_p) = traced.rays()[0].field_amplitudes();
        assert_relative_eq!(e_s, 0.9, epsilon = 1e-12);
        assert_relative_eq!(e_p, 0.0, epsilon = 1e-12);
        assert_relative_eq!(traced.total_intensity(), 0.81, epsilon = 1e-12);
    }
    #[test]
    fn unsupported_reflectivity_fails_fast() {
        let mirror = Mirror::new(SurfaceShape::Plane, grazing_coords(10.0, 5.0, 0.003))
            .with_reflectivity(MirrorReflectivity::Susceptibility);
        assert_matches::assert_matches!(
            mirror.trace_beam(&central_beam()),
            Err(BeamtraceError::Element(_))
        );
    }
    #[test]
    fn screen_clips_and_attenuates() {
        let aperture = RectangleConfig::new(
            millimeter!(-1.0),
            millimeter!(1.0),
            millimeter!(-1.0),
            millimeter!(1.0),
        )
        .unwrap();
        let filter = FilterSpec::new(
            Arc::new(ConstantAttenuation::new(1e4).unwrap()),
            crate::micrometer!(100.0),
        )
        .unwrap();
        let screen = Screen::new(meter!(1.0), meter!(0.0))
            .unwrap()
            .with_boundary(Boundary::Rectangle(aperture))
            .with_filter(filter);
        let rays = vec![
            Ray::origin_along_y(electronvolt!(1000.0)).unwrap(),
            Ray::new(
                meter!(0.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 2e-3),
                electronvolt!(1000.0),
            )
            .unwrap(),
        ];
        let traced = screen.trace_beam(&Beam::new(rays)).unwrap();
        assert_eq!(traced.len(), 2);
        // the tilted ray arrives 2 mm off axis and is stopped
        assert_eq!(traced.nr_of_alive_rays(), 1);
        assert_relative_eq!(
            traced.total_intensity(),
            (-1e4 * 1e-4_f64).exp(),
            epsilon = 1e-12
        );
        assert!(Screen::new(meter!(-1.0), meter!(0.0)).is_err());
    }
    #[test]
    fn beamline_composition() {
        let theta_g = 0.003;
        let elements = vec![
            Element::Mirror(Mirror::new(
                SurfaceShape::Plane,
                grazing_coords(10.0, 5.0, theta_g),
            )),
            Element::Screen(Screen::new(meter!(2.0), meter!(0.0)).unwrap()),
        ];
        let traced = trace_beamline(&central_beam(), &elements).unwrap();
        assert_eq!(traced.len(), 1);
        let ray = &traced.rays()[0];
        assert!(ray.is_alive());
        assert_relative_eq!(ray.path_length().value, 17.0, epsilon = 1e-9);
    }
}
