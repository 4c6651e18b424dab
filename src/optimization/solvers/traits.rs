use crate::core::SolveError;
use std::cmp::Ordering;

/// Objective and constraint violation of one candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    /// Objective to minimize (already sign-adjusted for maximization).
    pub objective: f64,
    /// Summed normalized constraint violation; zero means feasible.
    pub violation: f64,
}

impl Evaluation {
    pub const WORST: Self = Self {
        objective: f64::INFINITY,
        violation: f64::INFINITY,
    };

    pub fn is_feasible(&self) -> bool {
        self.violation == 0.0
    }

    /// Feasibility rules: feasible beats infeasible, then lower objective
    /// among feasible, lower violation among infeasible.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self.is_feasible(), other.is_feasible()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => self.objective.total_cmp(&other.objective),
            (false, false) => self.violation.total_cmp(&other.violation),
        }
    }

    pub fn is_better_than(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Less
    }

    /// Exact-penalty scalarization for solvers that need a single cost.
    pub fn penalized(&self, weight: f64) -> f64 {
        self.objective + weight * self.violation
    }
}

#[derive(Clone, Debug)]
pub struct SolverResult {
    /// The solver met its own stopping criterion (as opposed to running out of budget).
    pub converged: bool,
    pub evaluation: Evaluation,
    pub iterations: u32,
    pub message: String,
    pub params: Vec<f64>,
    pub cost_evals: usize,
    pub grad_evals: usize,
}

/// Callback interface for optimization progress
pub trait OptimizationCallback {
    /// Called at each iteration with the best parameters and evaluation so far
    fn on_iteration(
        &mut self,
        iteration: u32,
        params: &[f64],
        best: &Evaluation,
    ) -> Result<(), SolveError>;

    /// Check if optimization should stop early
    fn should_stop(&self) -> bool {
        false
    }
}

/// Core problem definition - just the essentials
pub trait Problem {
    /// Evaluate objective and constraint violation for given parameters
    fn evaluate(&self, params: &[f64]) -> Result<Evaluation, SolveError>;

    /// Number of parameters
    fn num_params(&self) -> usize;

    /// Initial parameter values
    fn initial_params(&self) -> &[f64];

    /// Parameter bounds (min, max) for each parameter
    fn bounds(&self) -> &[(f64, f64)];

    /// Weight of the violation term in [`Problem::cost`]
    fn penalty_weight(&self) -> f64 {
        1e3
    }

    /// Penalized scalar cost
    fn cost(&self, params: &[f64]) -> Result<f64, SolveError> {
        Ok(self.evaluate(params)?.penalized(self.penalty_weight()))
    }
}

/// Solver interface - takes problem and callback
pub trait Solver {
    fn name(&self) -> &str;

    /// Solve the optimization problem with callback for progress tracking
    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> Result<SolverResult, SolveError>;
}

#[inline]
pub fn clamp_params(params: &mut [f64], bounds: &[(f64, f64)]) {
    for (param, &(min, max)) in params.iter_mut().zip(bounds) {
        *param = param.clamp(min, max);
    }
}

/// Relative improvement test shared by the stagnation checks.
#[inline]
pub fn is_negligible(previous: f64, current: f64, tolerance: f64) -> bool {
    if !previous.is_finite() || !current.is_finite() {
        return false;
    }
    (previous - current).abs() <= tolerance * (1.0 + current.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(objective: f64, violation: f64) -> Evaluation {
        Evaluation {
            objective,
            violation,
        }
    }

    #[test]
    fn feasible_beats_infeasible_regardless_of_objective() {
        assert!(eval(100.0, 0.0).is_better_than(&eval(1.0, 1e-9)));
        assert!(!eval(1.0, 1e-9).is_better_than(&eval(100.0, 0.0)));
    }

    #[test]
    fn ties_broken_by_objective_then_violation() {
        assert!(eval(1.0, 0.0).is_better_than(&eval(2.0, 0.0)));
        assert!(eval(9.0, 0.1).is_better_than(&eval(1.0, 0.2)));
        assert!(eval(0.0, 0.0).is_better_than(&Evaluation::WORST));
    }

    #[test]
    fn clamps_to_bounds() {
        let mut params = [-1.0, 5.0, 0.5];
        clamp_params(&mut params, &[(0.0, 1.0), (0.0, 1.0), (0.0, 1.0)]);
        assert_eq!(params, [0.0, 1.0, 0.5]);
    }

    #[test]
    fn negligible_change_is_relative() {
        assert!(is_negligible(100.0, 100.0 + 1e-5, 1e-6));
        assert!(!is_negligible(100.0, 99.0, 1e-6));
        assert!(!is_negligible(f64::INFINITY, 1.0, 1e-6));
    }
}
