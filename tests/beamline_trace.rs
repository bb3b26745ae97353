//! End-to-end trace of a small beamline: tabulated source, focusing
//! ellipsoidal mirror with reflectivity, filtering screen.
use std::sync::Arc;

use approx::assert_relative_eq;
use beamtrace::{
    boundary::{Boundary, RectangleConfig},
    coordinates::ElementCoordinates,
    elements::{trace_beamline, Element, Mirror, Screen},
    meter, micrometer, millimeter,
    reflectivity::{ConstantAttenuation, ConstantReflectivity, FilterSpec, MirrorReflectivity},
    source::{RadiationTable, SourceSampler},
    surface::{Conic, SurfaceShape},
};
use nalgebra::DMatrix;
use rand::{rngs::StdRng, SeedableRng};

const NR_OF_RAYS: usize = 300;

fn narrow_ring_source() -> SourceSampler {
    // all intensity in a narrow polar ring around 50 µrad
    let theta = vec![0.0, 5.0e-5, 1.0e-4];
    let phi = vec![0.0, std::f64::consts::FRAC_PI_4, std::f64::consts::FRAC_PI_2];
    let mut intensity = DMatrix::zeros(3, 3);
    for j in 0..3 {
        intensity[(1, j)] = 1.0;
    }
    let table = RadiationTable::Monochromatic {
        energy_ev: 12_400.0,
        theta,
        phi,
        intensity,
    };
    SourceSampler::new(&table).unwrap()
}

#[test]
fn point_source_is_imaged_through_the_beamline() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut rng = StdRng::seed_from_u64(314_159);
    let beam = narrow_ring_source()
        .sample_beam(NR_OF_RAYS, &mut rng)
        .unwrap();

    let theta_g = 0.005;
    let (p, q) = (meter!(10.0), meter!(3.0));
    let surface = SurfaceShape::Conic(
        Conic::ellipsoid_from_focal_distances(p, q, theta_g).unwrap(),
    );
    let coordinates = ElementCoordinates::new(
        p,
        q,
        std::f64::consts::FRAC_PI_2 - theta_g,
        0.0,
    )
    .unwrap();
    let footprint = RectangleConfig::new(
        millimeter!(-20.0),
        millimeter!(20.0),
        millimeter!(-400.0),
        millimeter!(400.0),
    )
    .unwrap();
    let mirror = Mirror::new(surface, coordinates)
        .with_boundary(Boundary::Rectangle(footprint))
        .with_reflectivity(MirrorReflectivity::FullPolarization {
            provider: Arc::new(ConstantReflectivity::new(0.81, 0.49).unwrap()),
            roughness_rms: 0.0,
        });

    let aperture = RectangleConfig::new(
        millimeter!(-1.0),
        millimeter!(1.0),
        millimeter!(-1.0),
        millimeter!(1.0),
    )
    .unwrap();
    let filter = FilterSpec::new(
        Arc::new(ConstantAttenuation::new(1e4).unwrap()),
        micrometer!(100.0),
    )
    .unwrap();
    let screen = Screen::new(meter!(0.0), meter!(0.0))
        .unwrap()
        .with_boundary(Boundary::Rectangle(aperture))
        .with_filter(filter);

    let elements = vec![Element::Mirror(mirror), Element::Screen(screen)];
    let traced = trace_beamline(&beam, &elements).unwrap();

    // every source ray is accounted for and none was clipped
    assert_eq!(traced.len(), NR_OF_RAYS);
    assert_eq!(traced.nr_of_alive_rays(), NR_OF_RAYS);
    // the point source images onto the axis of the image plane
    for ray in traced.iter() {
        let pos = ray.position_in_meters();
        assert!(pos.x.abs() < 1e-7, "image x {}", pos.x);
        assert!(pos.z.abs() < 1e-7, "image z {}", pos.z);
    }
    // mirror reflectivity and filter attenuation act on the intensity
    let expected = 0.81 * (-1e4 * 1e-4_f64).exp();
    assert_relative_eq!(
        traced.total_intensity(),
        beamtrace::utils::usize_to_f64(NR_OF_RAYS) * expected,
        max_relative = 1e-9
    );
    // directions stay unit norm through all transforms
    assert!(traced.check_direction_norms(1e-9).is_ok());
}
