use super::traits::{Evaluation, OptimizationCallback, Problem, Solver, SolverResult, clamp_params};
use crate::core::SolveError;

/// Adaptive projected-gradient optimizer with Armijo line search and learning
/// rate adaptation. Works on the penalized cost, with every step measured as
/// a fraction of the parameter ranges so differently scaled variables move alike.
pub struct NewtonOptimizer {
    max_iter: u32,
    tolerance: f64,
    learning_rate: f64,
    min_learning_rate: f64,
    max_learning_rate: f64,
    armijo_c: f64,         // Armijo condition parameter
    backtrack_factor: f64, // Line search backtracking
    increase_factor: f64,  // Learning rate increase when successful
}

impl NewtonOptimizer {
    pub fn new(max_iter: u32, tolerance: f64) -> Self {
        Self {
            max_iter,
            tolerance,
            learning_rate: 0.1,
            min_learning_rate: 1e-10,
            max_learning_rate: 0.5,
            armijo_c: 1e-4,
            backtrack_factor: 0.5,
            increase_factor: 1.2,
        }
    }

    /// Central differences in range-scaled coordinates, one-sided at a bound
    fn compute_gradient(
        &self,
        problem: &dyn Problem,
        params: &[f64],
        scale: &[f64],
        grad: &mut [f64],
        cost_evals: &mut usize,
    ) -> Result<(), SolveError> {
        let bounds = problem.bounds();

        for i in 0..params.len() {
            let h = 1e-7 * scale[i];
            let mut p_plus = params.to_vec();
            let mut p_minus = params.to_vec();
            p_plus[i] = (params[i] + h).min(bounds[i].1);
            p_minus[i] = (params[i] - h).max(bounds[i].0);

            let width = p_plus[i] - p_minus[i];
            if width <= 0.0 {
                grad[i] = 0.0;
                continue;
            }

            let c_plus = problem.cost(&p_plus)?;
            let c_minus = problem.cost(&p_minus)?;
            *cost_evals += 2;

            grad[i] = (c_plus - c_minus) / width * scale[i];
        }

        Ok(())
    }

    /// Armijo backtracking along the normalized descent direction.
    /// Returns the accepted step and its point, or `None` when no step decreases the cost.
    fn line_search(
        &self,
        problem: &dyn Problem,
        params: &[f64],
        direction: &[f64],
        scale: &[f64],
        slope: f64,
        current_cost: f64,
        cost_evals: &mut usize,
    ) -> Result<Option<(f64, Vec<f64>, f64)>, SolveError> {
        let mut alpha = self.learning_rate;

        while alpha >= self.min_learning_rate {
            let mut candidate: Vec<f64> = params
                .iter()
                .zip(direction.iter().zip(scale))
                .map(|(&p, (&d, &s))| p - alpha * d * s)
                .collect();
            clamp_params(&mut candidate, problem.bounds());

            let new_cost = problem.cost(&candidate)?;
            *cost_evals += 1;

            // Armijo condition: sufficient decrease
            if new_cost <= current_cost - self.armijo_c * alpha * slope {
                return Ok(Some((alpha, candidate, new_cost)));
            }

            alpha *= self.backtrack_factor;
        }

        Ok(None)
    }
}

/// Norm of the projected-gradient step in range-scaled coordinates.
/// Zero exactly at a bound-constrained stationary point.
fn projected_gradient_norm(
    params: &[f64],
    gradient: &[f64],
    scale: &[f64],
    bounds: &[(f64, f64)],
) -> f64 {
    params
        .iter()
        .zip(gradient)
        .zip(scale.iter().zip(bounds))
        .map(|((&p, &g), (&s, &(min, max)))| {
            let moved = (p - g * s).clamp(min, max);
            ((p - moved) / s).powi(2)
        })
        .sum::<f64>()
        .sqrt()
}

impl Solver for NewtonOptimizer {
    fn name(&self) -> &str {
        "AdaptiveNewton"
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> Result<SolverResult, SolveError> {
        let n = problem.num_params();
        let bounds = problem.bounds();
        let scale: Vec<f64> = bounds
            .iter()
            .map(|&(min, max)| (max - min).max(f64::EPSILON))
            .collect();

        let mut params = problem.initial_params().to_vec();
        clamp_params(&mut params, bounds);
        let mut gradient = vec![0.0; n];

        let mut cost_evals = 0;
        let mut grad_evals = 0;
        let mut consecutive_improvements = 0;

        let mut evaluation = problem.evaluate(&params)?;
        let mut cost = evaluation.penalized(problem.penalty_weight());
        cost_evals += 1;

        // Best point by feasibility rules; the penalized descent may wander across a bound
        let mut best_params = params.clone();
        let mut best = evaluation;

        let finish = |converged: bool,
                      iterations: u32,
                      message: &str,
                      best: Evaluation,
                      best_params: Vec<f64>,
                      cost_evals: usize,
                      grad_evals: usize| SolverResult {
            converged,
            evaluation: best,
            iterations,
            message: message.into(),
            params: best_params,
            cost_evals,
            grad_evals,
        };

        for iter in 0..self.max_iter {
            callback.on_iteration(iter + 1, &best_params, &best)?;

            if callback.should_stop() {
                return Ok(finish(
                    false,
                    iter + 1,
                    "Stopped by callback",
                    best,
                    best_params,
                    cost_evals,
                    grad_evals,
                ));
            }

            self.compute_gradient(problem, &params, &scale, &mut gradient, &mut cost_evals)?;
            grad_evals += 1;

            let norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
            if !norm.is_finite() {
                return Ok(finish(
                    false,
                    iter + 1,
                    "Non-finite gradient",
                    best,
                    best_params,
                    cost_evals,
                    grad_evals,
                ));
            }

            let stationary = projected_gradient_norm(&params, &gradient, &scale, bounds)
                <= self.tolerance * (1.0 + cost.abs());
            if stationary && evaluation.is_feasible() {
                let message = if norm == 0.0 { "Zero gradient" } else { "Converged" };
                return Ok(finish(
                    !best.is_better_than(&evaluation),
                    iter + 1,
                    message,
                    best,
                    best_params,
                    cost_evals,
                    grad_evals,
                ));
            }
            if norm == 0.0 {
                return Ok(finish(
                    false,
                    iter + 1,
                    "Zero gradient at an infeasible point",
                    best,
                    best_params,
                    cost_evals,
                    grad_evals,
                ));
            }
            let direction: Vec<f64> = gradient.iter().map(|g| g / norm).collect();

            let Some((step, next, next_cost)) =
                self.line_search(problem, &params, &direction, &scale, norm, cost, &mut cost_evals)?
            else {
                return Ok(finish(
                    false,
                    iter + 1,
                    "Line search stalled",
                    best,
                    best_params,
                    cost_evals,
                    grad_evals,
                ));
            };

            // Adapt learning rate to the accepted step
            if step < self.learning_rate {
                consecutive_improvements = 0;
                self.learning_rate = step;
            } else {
                consecutive_improvements += 1;
                if consecutive_improvements >= 3 {
                    self.learning_rate =
                        (self.learning_rate * self.increase_factor).min(self.max_learning_rate);
                }
            }

            params = next;
            cost = next_cost;
            evaluation = problem.evaluate(&params)?;
            cost_evals += 1;

            if evaluation.is_better_than(&best) {
                best = evaluation;
                best_params.clone_from(&params);
            }
        }

        Ok(finish(
            false,
            self.max_iter,
            "Max iterations reached",
            best,
            best_params,
            cost_evals,
            grad_evals,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::solvers::testing::{Quadratic, Silent};

    #[test]
    fn descends_to_unconstrained_minimum() {
        let problem = Quadratic::new([0.5, -1.5], None);
        let mut solver = NewtonOptimizer::new(500, 1e-14);
        let result = solver.solve(&problem, &mut Silent).unwrap();

        assert!(result.evaluation.is_feasible());
        assert!((result.params[0] - 0.5).abs() < 1e-3);
        assert!((result.params[1] + 1.5).abs() < 1e-3);
        assert!(result.grad_evals > 0);
    }

    #[test]
    fn stays_inside_bounds() {
        // Minimum lies outside the box; the answer sits on the bound
        let problem = Quadratic::new([9.0, 0.0], None);
        let result = NewtonOptimizer::new(500, 1e-14).solve(&problem, &mut Silent).unwrap();
        assert!(result.params[0] <= 5.0);
        assert!((result.params[0] - 5.0).abs() < 1e-3);
    }

    #[test]
    fn flat_start_is_stationary() {
        let problem = Quadratic::new([0.0, 0.0], None);
        let result = NewtonOptimizer::new(50, 1e-6).solve(&problem, &mut Silent).unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.params, vec![0.0, 0.0]);
    }

    #[test]
    fn constraint_kink_is_not_reported_as_converged() {
        // Optimum sits on x = 1 where the penalized cost has a kink,
        // so the projected gradient never vanishes there
        let problem = Quadratic::new([3.0, 0.0], Some(1.0));
        let result = NewtonOptimizer::new(200, 1e-6).solve(&problem, &mut Silent).unwrap();

        assert!(!result.converged, "{}", result.message);
        assert!(result.evaluation.is_feasible());
        assert!(result.params[0] <= 1.0);
        assert!(result.params[0] > 0.5);
    }
}
