use super::traits::{Evaluation, OptimizationCallback, Problem, Solver, SolverResult, clamp_params};
use crate::core::SolveError;
use argmin::core::{CostFunction, Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;
use std::cell::Cell;

/// Penalized cost seen by argmin. Points outside the box are clamped and
/// charged for the distance they strayed.
struct PenalizedCost<'a> {
    problem: &'a dyn Problem,
    scale: Vec<f64>,
    evals: Cell<usize>,
}

impl PenalizedCost<'_> {
    fn project(&self, params: &[f64]) -> (Vec<f64>, f64) {
        let mut inside = params.to_vec();
        clamp_params(&mut inside, self.problem.bounds());
        let strayed = params
            .iter()
            .zip(&inside)
            .zip(&self.scale)
            .map(|((p, q), s)| (p - q).abs() / s)
            .sum();
        (inside, strayed)
    }
}

impl CostFunction for PenalizedCost<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let (inside, strayed) = self.project(params);
        self.evals.set(self.evals.get() + 1);
        let cost = self.problem.cost(&inside).map_err(argmin::core::Error::new)?;
        Ok(cost + self.problem.penalty_weight() * strayed)
    }
}

/// Nelder-Mead refinement of a single point through argmin.
pub struct SimplexPolish {
    start: Vec<f64>,
    max_iter: u32,
    tolerance: f64,
    /// Initial simplex edge as a fraction of each parameter range
    spread: f64,
}

impl SimplexPolish {
    pub fn new(start: Vec<f64>, max_iter: u32, tolerance: f64) -> Self {
        Self {
            start,
            max_iter,
            tolerance,
            spread: 0.05,
        }
    }

    /// The start point plus one vertex per axis, stepped inward from any bound
    fn initial_simplex(&self, bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        let mut start = self.start.clone();
        clamp_params(&mut start, bounds);

        let mut vertices = vec![start.clone()];
        for (i, &(min, max)) in bounds.iter().enumerate() {
            let step = (max - min).max(f64::EPSILON) * self.spread;
            let mut vertex = start.clone();
            vertex[i] = if vertex[i] + step <= max { vertex[i] + step } else { vertex[i] - step };
            vertices.push(vertex);
        }
        vertices
    }
}

impl Solver for SimplexPolish {
    fn name(&self) -> &str {
        "NelderMead"
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> Result<SolverResult, SolveError> {
        let bounds = problem.bounds();
        let cost = PenalizedCost {
            problem,
            scale: bounds
                .iter()
                .map(|&(min, max)| (max - min).max(f64::EPSILON))
                .collect(),
            evals: Cell::new(0),
        };

        let solver =
            NelderMead::new(self.initial_simplex(bounds)).with_sd_tolerance(self.tolerance)?;
        let result = Executor::new(cost, solver)
            .configure(|state| state.max_iters(u64::from(self.max_iter)))
            .run()?;

        let state = result.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| SolveError::Solver("Nelder-Mead returned no best parameters".into()))?;
        let converged = matches!(
            state.get_termination_reason(),
            Some(TerminationReason::SolverConverged)
        );
        let iterations = u32::try_from(state.get_iter()).unwrap_or(u32::MAX);

        let Some(cost) = result.problem.problem.as_ref() else {
            return Err(SolveError::Solver("Nelder-Mead lost its cost function".into()));
        };
        let (params, _) = cost.project(best);
        let cost_evals = cost.evals.get();

        let evaluation: Evaluation = problem.evaluate(&params)?;
        callback.on_iteration(iterations, &params, &evaluation)?;

        Ok(SolverResult {
            converged,
            evaluation,
            iterations,
            message: match state.get_termination_reason() {
                Some(reason) => reason.to_string(),
                None => "Terminated".into(),
            },
            params,
            cost_evals: cost_evals + 1,
            grad_evals: 0,
        })
    }
}
