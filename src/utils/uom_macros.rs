#![warn(missing_docs)]
//! Module for additional uom macros that facilitate the creation of Points, vecs or single unit values
/// helper macro to create the units
#[macro_export]
macro_rules! uom_unit_creator {
    ($unit:ident, $unit_type:ident, $val1:expr) => {
        $unit_type::new::<$unit>($val1)
    };
    ($unit:ident, $unit_type:ident, $val1:expr, $val2:expr) => {{
        use nalgebra::Point2;
        Point2::new(
            $unit_type::new::<$unit>($val1),
            $unit_type::new::<$unit>($val2),
        )
    }};
    ($unit:ident, $unit_type:ident, $val1:expr, $val2:expr, $val3:expr) => {{
        use nalgebra::Point3;
        Point3::new(
            $unit_type::new::<$unit>($val1),
            $unit_type::new::<$unit>($val2),
            $unit_type::new::<$unit>($val3),
        )
    }};
}

///macro to create a Length in meter
#[macro_export]
macro_rules! meter {
    ($( $x:expr ),*) => {{
        use uom::si::{f64::Length, length::meter};
        $crate::uom_unit_creator![meter, Length, $( $x ),*]
    }};
}
///macro to create a Length in millimeter
#[macro_export]
macro_rules! millimeter {
    ($( $x:expr ),*) => {{
        use uom::si::{f64::Length, length::millimeter};
        $crate::uom_unit_creator![millimeter, Length, $( $x ),*]
    }};
}
///macro to create a Length in micrometer
#[macro_export]
macro_rules! micrometer {
    ($( $x:expr ),*) => {{
        use uom::si::{f64::Length, length::micrometer};
        $crate::uom_unit_creator![micrometer, Length, $( $x ),*]
    }};
}
///macro to create an Energy in electronvolt
#[macro_export]
macro_rules! electronvolt {
    ($( $x:expr ),*) => {{
        use uom::si::{energy::electronvolt, f64::Energy};
        $crate::uom_unit_creator![electronvolt, Energy, $( $x ),*]
    }};
}
///macro to create an Energy in kiloelectronvolt
#[macro_export]
macro_rules! kiloelectronvolt {
    ($( $x:expr ),*) => {{
        use uom::si::{energy::kiloelectronvolt, f64::Energy};
        $crate::uom_unit_creator![kiloelectronvolt, Energy, $( $x ),*]
    }};
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use uom::si::{energy::electronvolt, f64::Energy, length::meter};

    #[test]
    fn single_value() {
        let l = meter!(1.5);
        assert_relative_eq!(l.get::<meter>(), 1.5);
        let e = electronvolt!(1000.0);
        assert_relative_eq!(e.get::<electronvolt>(), 1000.0, max_relative = 1e-12);
    }
    #[test]
    fn point3() {
        let p = millimeter!(1.0, 2.0, 3.0);
        assert_relative_eq!(p.z.get::<meter>(), 3e-3);
    }
    #[test]
    fn kev() {
        let e: Energy = kiloelectronvolt!(12.4);
        assert_relative_eq!(e.get::<electronvolt>(), 12400.0, max_relative = 1e-12);
    }
}
