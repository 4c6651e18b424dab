use approx::assert_relative_eq;
use twobar::equations::{self, TrussProperties};
use twobar::truss::build_expression_model;
use twobar::{
    DesignSpace, SolveConfig, SolveStatus, SolverMethod, arange, build_model, evaluate_grid,
};

fn feasible(h: f64, d: f64, props: &TrussProperties) -> bool {
    let r = equations::evaluate(h, d, props);
    r.weight < 24.0 && r.stress < 100.0 && r.stress < r.buckling && r.deflection < 0.25
}

/// Lightest feasible point of a 0.5 x 0.02 mesh over the whole design box.
fn mesh_minimum(props: &TrussProperties) -> f64 {
    let mut best = f64::INFINITY;
    for i in 0..=80 {
        for j in 0..=150 {
            let (h, d) = (10.0 + 0.5 * i as f64, 1.0 + 0.02 * j as f64);
            if feasible(h, d, props) {
                best = best.min(equations::evaluate(h, d, props).weight);
            }
        }
    }
    best
}

#[test]
fn worked_truss_converges_to_light_feasible_design() {
    let props = TrussProperties::default();
    let mut model = build_model(&props, &DesignSpace::default()).unwrap();
    let result = model.solve(&SolveConfig::default()).unwrap();

    assert_eq!(result.status, SolveStatus::Converged, "{}", result.message);
    assert!(result.objective_value < 24.0);

    let h = model.value("height").unwrap();
    let d = model.value("diameter").unwrap();
    assert!((10.0..=50.0).contains(&h));
    assert!((1.0..=4.0).contains(&d));
    assert_eq!(result.get_variable("height"), Some(h));

    // Every constraint holds strictly at the written-back values
    for constraint in model.constraint_values().unwrap() {
        assert!(constraint.satisfied, "{} = {}", constraint.expression, constraint.value);
    }
    assert!(feasible(h, d, &props));

    assert_relative_eq!(
        result.objective_value,
        equations::evaluate(h, d, &props).weight,
        max_relative = 1e-12
    );
    assert!(result.objective_value <= mesh_minimum(&props));

    for (ch, cd) in [(10.0, 1.0), (10.0, 4.0), (50.0, 1.0), (50.0, 4.0)] {
        if feasible(ch, cd, &props) {
            assert!(result.objective_value < equations::evaluate(ch, cd, &props).weight);
        }
    }
}

#[test]
fn gradient_descent_stalled_on_a_kink_is_not_converged() {
    let props = TrussProperties::default();
    let mut model = build_model(&props, &DesignSpace::default()).unwrap();
    let config = SolveConfig {
        method: SolverMethod::Newton,
        polish: false,
        ..SolveConfig::default()
    };
    let result = model.solve(&config).unwrap();

    assert!(result.gradient_evaluations > 0);
    if result.status == SolveStatus::Converged {
        assert!(
            result.objective_value <= mesh_minimum(&props),
            "converged at W = {}",
            result.objective_value
        );
    } else {
        // Nothing is written back
        assert_eq!(model.value("height"), Some(30.0));
        assert_eq!(model.value("diameter"), Some(3.0));
    }
}

#[test]
fn textual_model_reaches_the_same_design() {
    let props = TrussProperties::default();
    let mut model = build_expression_model(&props, &DesignSpace::default()).unwrap();
    let result = model.solve(&SolveConfig::default()).unwrap();

    assert_eq!(result.status, SolveStatus::Converged);
    assert!(result.objective_value <= mesh_minimum(&props));
}

#[test]
fn grid_scenario_has_expected_shape() {
    let h = arange(10.0, 30.0, 2.0);
    let d = arange(1.0, 3.0, 0.3);
    let grid = evaluate_grid(&h, &d, &TrussProperties::default());

    assert_eq!(grid.names().count(), 5);
    for (name, field) in &grid.fields {
        assert_eq!(field.shape(), (7, 10), "{name}");
        assert!(field.values().iter().all(|v| v.is_finite()), "{name}");
    }
}

#[test]
fn grid_is_bit_identical_on_repeat() {
    let h = arange(10.0, 30.0, 0.5);
    let d = arange(1.0, 3.0, 0.05);
    let props = TrussProperties::default();
    let first = evaluate_grid(&h, &d, &props);
    let second = evaluate_grid(&h, &d, &props);

    for (a, b) in first.fields.values().zip(second.fields.values()) {
        let a_bits: Vec<u64> = a.values().iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u64> = b.values().iter().map(|v| v.to_bits()).collect();
        assert_eq!(a_bits, b_bits);
    }
}

#[test]
fn overstressed_cells_match_closed_form() {
    let props = TrussProperties::default();
    let h = arange(10.0, 30.0, 2.0);
    let d = arange(1.0, 3.0, 0.3);
    let grid = evaluate_grid(&h, &d, &props);
    let stress = grid.get("stress").unwrap();

    let mut checked = 0;
    for (r, &dv) in d.iter().enumerate() {
        for (c, &hv) in h.iter().enumerate() {
            let cell = stress.get(r, c).unwrap();
            if cell > 100.0 {
                let length = ((props.width / 2.0).powi(2) + hv * hv).sqrt();
                let area = std::f64::consts::PI * dv * props.thickness;
                let expected = props.load * length / (2.0 * area * hv);
                assert_relative_eq!(cell, expected, max_relative = 1e-12);
                checked += 1;
            }
        }
    }
    assert!(checked > 0);
}
