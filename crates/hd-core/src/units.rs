// hd-core/src/units.rs

use uom::si::f64::Length as UomLength;

// Public canonical unit types (SI, f64)
pub type Length = UomLength;

/// Drawings store heights in metres (`floorHeightM`, `bottomHeightM`, ...).
#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

/// Back to the metre value persisted in documents.
#[inline]
pub fn to_m(v: Length) -> f64 {
    use uom::si::length::meter;
    v.get::<meter>()
}
