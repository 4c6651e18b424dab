pub mod callback;
pub mod problem;
pub mod solvers;

pub use callback::ProgressCallback;
pub use problem::ModelProblem;
pub use solvers::{
    CMAESOptimizer, Evaluation, NewtonOptimizer, ParticleOptimizer, SimplexPolish, select_solver,
};
pub use solvers::{OptimizationCallback, Problem, Solver, SolverResult};

use crate::core::{CompiledModel, SolveConfig, SolveError, SolveResult, SolveStatus};

/// Run the configured global solver on a compiled model, optionally refine
/// its best point with Nelder-Mead, and classify the outcome.
pub fn solve(model: &CompiledModel, config: &SolveConfig) -> Result<SolveResult, SolveError> {
    let problem = ModelProblem::new(model, config)?;
    let names: Vec<String> = model.variable_names().map(str::to_string).collect();
    let mut callback = ProgressCallback::new(config.verbose, config.max_iterations, names);

    let (mut solver, reason) = select_solver(problem.bounds(), problem.has_constraints(), config);
    if config.verbose {
        eprintln!("✓ {reason}");
    }

    let mut result = solver.solve(&problem, &mut callback)?;
    let mut solver_name = solver.name().to_string();

    if config.polish {
        callback.reset_budget();
        let mut polish =
            SimplexPolish::new(result.params.clone(), config.max_iterations, config.tolerance);
        let refined = polish.solve(&problem, &mut callback)?;

        let accepted = !result.evaluation.is_better_than(&refined.evaluation);
        if config.verbose {
            eprintln!(
                "{} Nelder-Mead polish: objective {:.6e} → {:.6e}",
                if accepted { "✓" } else { "✗" },
                result.evaluation.objective,
                refined.evaluation.objective
            );
        }

        result.cost_evals += refined.cost_evals;
        result.grad_evals += refined.grad_evals;
        result.iterations += refined.iterations;
        if accepted {
            result.converged |= refined.converged;
            result.evaluation = refined.evaluation;
            result.params = refined.params;
            result.message = format!("{}; polish: {}", result.message, refined.message);
            solver_name = format!("{solver_name}+{}", polish.name());
        }
    }

    let status = if !result.evaluation.is_feasible() {
        SolveStatus::Infeasible
    } else if result.converged {
        SolveStatus::Converged
    } else {
        SolveStatus::MaxIterations
    };

    let solve_result = SolveResult {
        status,
        variable_values: problem.variable_values(&result.params),
        objective_value: problem.reported_objective(&result.evaluation),
        constraint_violation: result.evaluation.violation,
        iterations: result.iterations,
        evaluations: result.cost_evals,
        gradient_evaluations: result.grad_evals,
        solver: solver_name,
        message: result.message,
    };
    callback.print_summary(&solve_result);

    Ok(solve_result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Model, RelationshipType, Sense, SolverMethod};

    fn bounded_square() -> Model {
        // minimize (x - 3)^2 with x < 2 on [0, 5]
        let mut model = Model::new();
        model.define_variable("x", 4.0, 0.0, 5.0).unwrap();
        model.define_intermediate("err", "(x - 3)^2").unwrap();
        model.add_constraint("x", RelationshipType::LessThan, 2.0).unwrap();
        model.set_objective("err", Sense::Minimize).unwrap();
        model
    }

    #[test]
    fn converges_onto_active_constraint() {
        let compiled = bounded_square().compile().unwrap();
        let result = solve(&compiled, &SolveConfig::default()).unwrap();

        assert_eq!(result.status, SolveStatus::Converged);
        let x = result.get_variable("x").unwrap();
        assert!(x < 2.0);
        assert!(x > 1.99);
        assert_eq!(result.constraint_violation, 0.0);
    }

    #[test]
    fn contradictory_constraints_are_infeasible() {
        let mut model = bounded_square();
        model.add_constraint("x", RelationshipType::GreaterThan, 3.0).unwrap();
        let compiled = model.compile().unwrap();
        let result = solve(&compiled, &SolveConfig::default()).unwrap();
        assert_eq!(result.status, SolveStatus::Infeasible);
        assert!(result.constraint_violation > 0.0);
    }

    #[test]
    fn maximization_reports_original_sign() {
        let mut model = Model::new();
        model.define_variable("x", 1.0, 0.0, 2.0).unwrap();
        model.set_objective("x * (2 - x)", Sense::Maximize).unwrap();
        let compiled = model.compile().unwrap();
        let config = SolveConfig {
            method: SolverMethod::Pso,
            ..SolveConfig::default()
        };
        let result = solve(&compiled, &config).unwrap();
        assert!((result.objective_value - 1.0).abs() < 1e-6);
    }

    #[test]
    fn same_seed_is_reproducible() {
        let compiled = bounded_square().compile().unwrap();
        let a = solve(&compiled, &SolveConfig::default()).unwrap();
        let b = solve(&compiled, &SolveConfig::default()).unwrap();
        assert_eq!(a.variable_values, b.variable_values);
        assert_eq!(a.evaluations, b.evaluations);
    }
}
