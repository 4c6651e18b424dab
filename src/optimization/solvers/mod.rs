mod cma_es;
mod newton;
mod particle;
mod simplex;
pub mod traits;

pub use cma_es::CMAESOptimizer;
pub use newton::NewtonOptimizer;
pub use particle::ParticleOptimizer;
pub use simplex::SimplexPolish;
pub use traits::{Evaluation, OptimizationCallback, Problem, Solver, SolverResult};

use crate::core::{SolveConfig, SolverMethod};

/// Build the solver named by `config.method`, picking one from the problem
/// shape when the method is `Auto`. Returns the solver and a one-line reason.
pub fn select_solver(
    bounds: &[(f64, f64)],
    has_constraints: bool,
    config: &SolveConfig,
) -> (Box<dyn Solver>, String) {
    let num_params = bounds.len();
    let max_iterations = config.max_iterations;
    let tolerance = config.tolerance;
    let seed = config.seed;

    match config.method {
        SolverMethod::Pso => {
            let pop_size = swarm_size(num_params);
            return (
                Box::new(
                    ParticleOptimizer::new(max_iterations, tolerance, seed)
                        .with_population_size(pop_size),
                ),
                format!("PSO (pop={pop_size})"),
            );
        }
        SolverMethod::Newton => {
            return (
                Box::new(NewtonOptimizer::new(max_iterations, tolerance)),
                "AdaptiveNewton".into(),
            );
        }
        SolverMethod::CmaEs => {
            return (
                Box::new(CMAESOptimizer::new(max_iterations, tolerance, seed)),
                "CMA-ES".into(),
            );
        }
        SolverMethod::Auto => {}
    }

    let ranges: Vec<f64> = bounds.iter().map(|&(min, max)| max - min).collect();
    let avg_range = ranges.iter().sum::<f64>() / num_params.max(1) as f64;
    let has_tight_bounds = avg_range < 1.0;

    // Coefficient of variation of the parameter ranges
    let parameter_scale_variance = if ranges.len() > 1 && avg_range > 0.0 {
        let variance =
            ranges.iter().map(|r| (r - avg_range).powi(2)).sum::<f64>() / ranges.len() as f64;
        variance.sqrt() / avg_range
    } else {
        0.0
    };

    match (num_params, has_tight_bounds, parameter_scale_variance, has_constraints) {
        // Tiny smooth unconstrained problems -> gradient descent
        (n, true, _, false) if n <= 2 && avg_range < 0.1 => (
            Box::new(NewtonOptimizer::new(max_iterations, tolerance)),
            format!("Auto: Tiny problem ({n} params, range {avg_range:.3}) → AdaptiveNewton"),
        ),

        // Small to medium problems -> PSO, robust against constraint kinks
        (n, _, _, _) if n <= 8 => {
            let pop_size = swarm_size(n);
            (
                Box::new(
                    ParticleOptimizer::new(max_iterations, tolerance, seed)
                        .with_population_size(pop_size),
                ),
                format!("Auto: {n} params → PSO (pop={pop_size})"),
            )
        }

        // Large or poorly scaled problems -> CMA-ES
        (n, _, var, _) => (
            Box::new(CMAESOptimizer::new(max_iterations, tolerance, seed)),
            format!("Auto: Large problem ({n} params, scale var: {var:.2}) → CMA-ES"),
        ),
    }
}

fn swarm_size(num_params: usize) -> usize {
    (20 + num_params * 5).min(50)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::traits::{Evaluation, OptimizationCallback, Problem};
    use crate::core::SolveError;

    /// (x - a)^2 + (y - b)^2 on [-5, 5]^2, optionally with x <= limit
    pub struct Quadratic {
        target: [f64; 2],
        limit: Option<f64>,
        bounds: [(f64, f64); 2],
        initial: [f64; 2],
    }

    impl Quadratic {
        pub fn new(target: [f64; 2], limit: Option<f64>) -> Self {
            Self {
                target,
                limit,
                bounds: [(-5.0, 5.0); 2],
                initial: [0.0; 2],
            }
        }
    }

    impl Problem for Quadratic {
        fn evaluate(&self, params: &[f64]) -> Result<Evaluation, SolveError> {
            let objective = (params[0] - self.target[0]).powi(2)
                + (params[1] - self.target[1]).powi(2);
            let violation = self
                .limit
                .map_or(0.0, |limit| (params[0] - limit).max(0.0) / limit.abs().max(1.0));
            Ok(Evaluation {
                objective,
                violation,
            })
        }

        fn num_params(&self) -> usize {
            2
        }

        fn initial_params(&self) -> &[f64] {
            &self.initial
        }

        fn bounds(&self) -> &[(f64, f64)] {
            &self.bounds
        }
    }

    pub struct Silent;

    impl OptimizationCallback for Silent {
        fn on_iteration(&mut self, _: u32, _: &[f64], _: &Evaluation) -> Result<(), SolveError> {
            Ok(())
        }
    }
}
