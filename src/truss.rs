//! The minimum-weight two-bar truss as an optimization [`Model`].

use crate::core::{Model, ModelError, RelationshipType, Sense};
use crate::equations::{self, TrussProperties};
use serde::{Deserialize, Serialize};

/// Bounds and initial guess of one decision variable.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableRange {
    pub initial: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Allowed design limits.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignLimits {
    pub max_weight: f64,
    pub max_stress: f64,
    pub max_deflection: f64,
}

impl Default for DesignLimits {
    fn default() -> Self {
        Self {
            max_weight: 24.0,
            max_stress: 100.0,
            max_deflection: 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignSpace {
    pub height: VariableRange,
    pub diameter: VariableRange,
    pub limits: DesignLimits,
}

impl Default for DesignSpace {
    fn default() -> Self {
        Self {
            height: VariableRange {
                initial: 30.0,
                lower: 10.0,
                upper: 50.0,
            },
            diameter: VariableRange {
                initial: 3.0,
                lower: 1.0,
                upper: 4.0,
            },
            limits: DesignLimits::default(),
        }
    }
}

fn define_variables(
    model: &mut Model,
    props: &TrussProperties,
    space: &DesignSpace,
) -> Result<(), ModelError> {
    model.define_parameters(props.as_parameters())?;
    let DesignSpace {
        height, diameter, ..
    } = space;
    model.define_variable("height", height.initial, height.lower, height.upper)?;
    model.define_variable("diameter", diameter.initial, diameter.lower, diameter.upper)?;
    Ok(())
}

fn add_constraints_and_objective(model: &mut Model, limits: &DesignLimits) -> Result<(), ModelError> {
    model.add_constraint("weight", RelationshipType::LessThan, limits.max_weight)?;
    model.add_constraint("stress", RelationshipType::LessThan, limits.max_stress)?;
    model.add_constraint("stress - buckling", RelationshipType::LessThan, 0.0)?;
    model.add_constraint("deflection", RelationshipType::LessThan, limits.max_deflection)?;
    model.set_objective("weight", Sense::Minimize)
}

/// Build the truss model with intermediates backed by [`crate::equations`].
pub fn build_model(props: &TrussProperties, space: &DesignSpace) -> Result<Model, ModelError> {
    let mut model = Model::new();
    define_variables(&mut model, props, space)?;

    model.define_intermediate_fn("leng", &["width", "height"], |v| {
        equations::member_length(v[0], v[1])
    })?;
    model.define_intermediate_fn("area", &["diameter", "thickness"], |v| {
        equations::tube_area(v[0], v[1])
    })?;
    model.define_intermediate_fn("iovera", &["diameter", "thickness"], |v| {
        equations::shape_factor(v[0], v[1])
    })?;
    model.define_intermediate_fn("weight", &["density", "area", "leng"], |v| {
        equations::weight(v[0], v[1], v[2])
    })?;
    model.define_intermediate_fn("stress", &["load", "leng", "area", "height"], |v| {
        equations::stress(v[0], v[1], v[2], v[3])
    })?;
    model.define_intermediate_fn("buckling", &["modulus", "iovera", "leng"], |v| {
        equations::buckling(v[0], v[1], v[2])
    })?;
    model.define_intermediate_fn(
        "deflection",
        &["load", "leng", "modulus", "area", "height"],
        |v| equations::deflection(v[0], v[1], v[2], v[3], v[4]),
    )?;

    add_constraints_and_objective(&mut model, &space.limits)?;
    Ok(model)
}

/// Same model written as textual formulas.
pub fn build_expression_model(
    props: &TrussProperties,
    space: &DesignSpace,
) -> Result<Model, ModelError> {
    let mut model = Model::new();
    define_variables(&mut model, props, space)?;

    model.define_intermediate("leng", "sqrt((width / 2)^2 + height^2)")?;
    model.define_intermediate("area", "pi * diameter * thickness")?;
    model.define_intermediate("iovera", "(diameter^2 + thickness^2) / 8")?;
    model.define_intermediate("weight", "2 * density * area * leng")?;
    model.define_intermediate("stress", "load * leng / (2 * area * height)")?;
    model.define_intermediate("buckling", "pi^2 * modulus * iovera / leng^2")?;
    model.define_intermediate("deflection", "load * leng^3 / (2 * modulus * area * height^2)")?;

    add_constraints_and_objective(&mut model, &space.limits)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn native_model_matches_equations() {
        let props = TrussProperties::default();
        let model = build_model(&props, &DesignSpace::default()).unwrap();
        let expected = equations::evaluate(30.0, 3.0, &props);

        assert_relative_eq!(model.evaluate("weight").unwrap(), expected.weight);
        assert_relative_eq!(model.evaluate("stress").unwrap(), expected.stress);
        assert_relative_eq!(model.evaluate("buckling").unwrap(), expected.buckling);
        assert_relative_eq!(model.evaluate("deflection").unwrap(), expected.deflection);
        assert_eq!(model.num_constraints(), 4);
        assert!(model.has_objective());
    }

    #[test]
    fn expression_model_agrees_with_native_model() {
        let props = TrussProperties::default();
        let space = DesignSpace::default();
        let native = build_model(&props, &space).unwrap().compile().unwrap();
        let textual = build_expression_model(&props, &space).unwrap().compile().unwrap();

        for x in [[10.0, 1.0], [15.0, 1.7], [30.0, 3.0], [50.0, 4.0]] {
            let a = native.node_values(&x);
            let b = textual.node_values(&x);
            let objective_a = native.objective().unwrap().formula.evaluate(&a);
            let objective_b = textual.objective().unwrap().formula.evaluate(&b);
            assert_relative_eq!(objective_a, objective_b, max_relative = 1e-12);

            for (ca, cb) in native.constraints().iter().zip(textual.constraints()) {
                assert_relative_eq!(
                    ca.formula.evaluate(&a),
                    cb.formula.evaluate(&b),
                    max_relative = 1e-12,
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn initial_guess_is_over_the_weight_limit() {
        let model = build_model(&TrussProperties::default(), &DesignSpace::default()).unwrap();
        let values = model.constraint_values().unwrap();
        assert!(!values[0].satisfied);
        assert!(values[0].value > 24.0);
    }
}
