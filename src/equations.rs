//! Closed-form two-bar truss equations.
//!
//! Both the optimization model ([`crate::truss`]) and the grid evaluator
//! ([`crate::grid`]) call these functions, so the two can never disagree.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Fixed physical properties of the truss.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrussProperties {
    /// Span between the two supports
    pub width: f64,
    /// Tube wall thickness
    pub thickness: f64,
    pub density: f64,
    /// Young's modulus
    pub modulus: f64,
    pub load: f64,
}

impl Default for TrussProperties {
    fn default() -> Self {
        Self {
            width: 60.0,
            thickness: 0.15,
            density: 0.3,
            modulus: 30000.0,
            load: 66.0,
        }
    }
}

impl TrussProperties {
    /// `(name, value)` pairs in model parameter order.
    pub fn as_parameters(&self) -> [(&'static str, f64); 5] {
        [
            ("width", self.width),
            ("thickness", self.thickness),
            ("density", self.density),
            ("modulus", self.modulus),
            ("load", self.load),
        ]
    }
}

/// Every derived quantity at one design point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrussResponse {
    pub length: f64,
    pub area: f64,
    pub shape_factor: f64,
    pub weight: f64,
    pub stress: f64,
    pub buckling: f64,
    pub deflection: f64,
}

pub fn member_length(width: f64, height: f64) -> f64 {
    ((width / 2.0).powi(2) + height.powi(2)).sqrt()
}

pub fn tube_area(diameter: f64, thickness: f64) -> f64 {
    PI * diameter * thickness
}

/// I/A of a thin-walled tube
pub fn shape_factor(diameter: f64, thickness: f64) -> f64 {
    (diameter.powi(2) + thickness.powi(2)) / 8.0
}

pub fn weight(density: f64, area: f64, length: f64) -> f64 {
    2.0 * density * area * length
}

pub fn stress(load: f64, length: f64, area: f64, height: f64) -> f64 {
    load * length / (2.0 * area * height)
}

/// Euler buckling stress limit
pub fn buckling(modulus: f64, shape_factor: f64, length: f64) -> f64 {
    PI.powi(2) * modulus * shape_factor / length.powi(2)
}

pub fn deflection(load: f64, length: f64, modulus: f64, area: f64, height: f64) -> f64 {
    load * length.powi(3) / (2.0 * modulus * area * height.powi(2))
}

/// Evaluate every quantity at `(height, diameter)`. Non-finite results pass through.
pub fn evaluate(height: f64, diameter: f64, props: &TrussProperties) -> TrussResponse {
    let length = member_length(props.width, height);
    let area = tube_area(diameter, props.thickness);
    let shape_factor = shape_factor(diameter, props.thickness);

    TrussResponse {
        length,
        area,
        shape_factor,
        weight: weight(props.density, area, length),
        stress: stress(props.load, length, area, height),
        buckling: buckling(props.modulus, shape_factor, length),
        deflection: deflection(props.load, length, props.modulus, area, height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn initial_guess_values() {
        let r = evaluate(30.0, 3.0, &TrussProperties::default());

        assert_relative_eq!(r.length, 1800.0_f64.sqrt(), max_relative = 1e-12);
        assert_relative_eq!(r.area, PI * 0.45, max_relative = 1e-12);
        assert_relative_eq!(r.shape_factor, 9.0225 / 8.0, max_relative = 1e-12);
        assert_relative_eq!(r.weight, 0.6 * PI * 0.45 * 1800.0_f64.sqrt(), max_relative = 1e-12);
        assert_relative_eq!(
            r.stress,
            66.0 * 1800.0_f64.sqrt() / (2.0 * PI * 0.45 * 30.0),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            r.deflection,
            66.0 * 1800.0_f64.powf(1.5) / (2.0 * 30000.0 * PI * 0.45 * 900.0),
            max_relative = 1e-12
        );
    }

    #[test]
    fn buckling_falls_with_length() {
        let props = TrussProperties::default();
        let short = evaluate(10.0, 2.0, &props);
        let long = evaluate(40.0, 2.0, &props);
        assert!(short.buckling > long.buckling);
        assert_relative_eq!(
            short.buckling * short.length.powi(2),
            long.buckling * long.length.powi(2),
            max_relative = 1e-12
        );
    }

    #[test]
    fn zero_height_propagates_non_finite_values() {
        let r = evaluate(0.0, 2.0, &TrussProperties::default());
        assert!(r.stress.is_infinite());
        assert!(r.deflection.is_infinite());
        assert!(r.weight.is_finite());
    }
}
