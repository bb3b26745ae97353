#![warn(missing_docs)]
//! beamtrace - a ray tracing core for synchrotron beamline optics
//!
//! This crate traces batches of photon rays through grazing-incidence
//! beamlines: a [`source::SourceSampler`] draws rays from a tabulated
//! radiation pattern, [`elements::Mirror`]s reflect them on plane, conic,
//! toroidal or tabulated surfaces and [`elements::Screen`]s clip and
//! attenuate them. Rays are never dropped along the way; geometric or
//! boundary failures mark them lost so that every ray of the source batch
//! stays accounted for at the image plane.
//!
//! ```rust
//! use beamtrace::{
//!     beam::Beam,
//!     coordinates::ElementCoordinates,
//!     electronvolt,
//!     elements::Mirror,
//!     meter,
//!     ray::Ray,
//!     surface::SurfaceShape,
//! };
//!
//! let beam = Beam::new(vec![Ray::origin_along_y(electronvolt!(1000.0)).unwrap()]);
//! let coordinates = ElementCoordinates::new(
//!     meter!(10.0),
//!     meter!(5.0),
//!     std::f64::consts::FRAC_PI_2 - 0.003,
//!     0.0,
//! )
//! .unwrap();
//! let mirror = Mirror::new(SurfaceShape::Plane, coordinates);
//! let traced = mirror.trace_beam(&beam).unwrap();
//! assert_eq!(traced.nr_of_alive_rays(), 1);
//! ```
pub mod beam;
pub mod boundary;
pub mod coordinates;
pub mod elements;
pub mod error;
pub mod ray;
pub mod reflectivity;
pub mod sampler;
pub mod source;
pub mod surface;
pub mod utils;
