use super::traits::{
    Evaluation, OptimizationCallback, Problem, Solver, SolverResult, clamp_params, is_negligible,
};
use crate::core::SolveError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

const STALL_GENERATIONS: u32 = 20;

/// Simplified CMA-ES. Sampling works in range-normalized coordinates and
/// uses the diagonal of the covariance; ranking uses feasibility rules.
pub struct CMAESOptimizer {
    max_iter: u32,
    tolerance: f64,
    seed: u64,
    population_size: usize,
    sigma: f64,
}

impl CMAESOptimizer {
    pub fn new(max_iter: u32, tolerance: f64, seed: u64) -> Self {
        Self {
            max_iter,
            tolerance,
            seed,
            population_size: 0,
            sigma: 0.3,
        }
    }

    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }
}

impl Solver for CMAESOptimizer {
    fn name(&self) -> &str {
        "CMA-ES"
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> Result<SolverResult, SolveError> {
        let n = problem.num_params();
        let bounds = problem.bounds();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let nf = n as f64;

        let lambda = if self.population_size == 0 {
            4 + (3.0 * nf.ln()).floor() as usize
        } else {
            self.population_size
        }
        .max(4);
        let mu = lambda / 2;

        let scale: Vec<f64> = bounds
            .iter()
            .map(|&(min, max)| (max - min).max(f64::EPSILON))
            .collect();

        let mut mean = problem.initial_params().to_vec();
        clamp_params(&mut mean, bounds);

        let mut cov: Vec<Vec<f64>> = vec![vec![0.0_f64; n]; n];
        for (i, row) in cov.iter_mut().enumerate() {
            row[i] = 1.0;
        }

        // Step size and evolution paths
        let mut sigma = self.sigma;
        let mut ps: Vec<f64> = vec![0.0; n];
        let mut pc: Vec<f64> = vec![0.0; n];

        // Recombination weights
        let mut weights: Vec<f64> = (0..mu)
            .map(|i| ((mu as f64 + 0.5).ln() - (i as f64 + 1.0).ln()).max(0.0))
            .collect();
        let sum_weights: f64 = weights.iter().sum();
        for w in weights.iter_mut() {
            *w /= sum_weights;
        }
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        // Strategy parameters
        let cc = 4.0 / (nf + 4.0);
        let cs = (mu_eff + 2.0) / (nf + mu_eff + 5.0);
        let c1 = 2.0 / ((nf + 1.3).powi(2) + mu_eff);
        let cmu = (1.0 - c1)
            .min(2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((nf + 2.0).powi(2) + mu_eff))
            .max(0.0);
        let damps = 1.0 + 2.0 * (0.0_f64).max(((mu_eff - 1.0) / (nf + 1.0)).sqrt() - 1.0) + cs;
        let expectation_norm = nf.sqrt() * (1.0 - 1.0 / (4.0 * nf) + 1.0 / (21.0 * nf * nf));

        let mut cost_evals = 0;
        let mut best = Evaluation::WORST;
        let mut best_params = mean.clone();
        let mut stagnation_counter = 0;

        for iter in 0..self.max_iter {
            let prev_best = best;
            let mut population = Vec::with_capacity(lambda);
            let mut evaluations = Vec::with_capacity(lambda);

            for _ in 0..lambda {
                let mut offspring = mean.clone();
                for i in 0..n {
                    let z: f64 = StandardNormal.sample(&mut rng);
                    offspring[i] += sigma * scale[i] * cov[i][i].max(0.0).sqrt() * z;
                }
                clamp_params(&mut offspring, bounds);

                let evaluation = problem.evaluate(&offspring)?;
                cost_evals += 1;

                if evaluation.is_better_than(&best) {
                    best = evaluation;
                    best_params.copy_from_slice(&offspring);
                }

                population.push(offspring);
                evaluations.push(evaluation);
            }

            callback.on_iteration(iter + 1, &best_params, &best)?;

            if callback.should_stop() {
                return Ok(SolverResult {
                    converged: false,
                    evaluation: best,
                    iterations: iter + 1,
                    message: "Stopped by callback".into(),
                    params: best_params,
                    cost_evals,
                    grad_evals: 0,
                });
            }

            let settled = best.is_feasible()
                && prev_best.is_feasible()
                && is_negligible(prev_best.objective, best.objective, self.tolerance);
            stagnation_counter = if settled { stagnation_counter + 1 } else { 0 };
            if stagnation_counter >= STALL_GENERATIONS || sigma < self.tolerance {
                let converged = best.is_feasible();
                return Ok(SolverResult {
                    converged,
                    evaluation: best,
                    iterations: iter + 1,
                    message: if converged { "Converged" } else { "Step size collapsed" }.into(),
                    params: best_params,
                    cost_evals,
                    grad_evals: 0,
                });
            }

            let mut indices: Vec<usize> = (0..lambda).collect();
            indices.sort_by(|&a, &b| evaluations[a].compare(&evaluations[b]));

            // Recombination
            let old_mean = mean.clone();
            mean = vec![0.0; n];
            for (w, &idx) in weights.iter().zip(&indices) {
                for j in 0..n {
                    mean[j] += w * population[idx][j];
                }
            }

            // Mean shift in normalized coordinates
            let mean_shift: Vec<f64> = (0..n)
                .map(|i| (mean[i] - old_mean[i]) / (sigma * scale[i]))
                .collect();

            for i in 0..n {
                ps[i] = (1.0 - cs) * ps[i] + (cs * (2.0 - cs) * mu_eff).sqrt() * mean_shift[i];
                pc[i] = (1.0 - cc) * pc[i] + (cc * (2.0 - cc) * mu_eff).sqrt() * mean_shift[i];
            }

            // Rank-one plus rank-mu update
            let steps: Vec<Vec<f64>> = indices[..mu]
                .iter()
                .map(|&idx| {
                    (0..n)
                        .map(|i| (population[idx][i] - old_mean[i]) / (sigma * scale[i]))
                        .collect()
                })
                .collect();
            for i in 0..n {
                for j in 0..n {
                    let rank_mu: f64 = weights
                        .iter()
                        .zip(&steps)
                        .map(|(w, y)| w * y[i] * y[j])
                        .sum();
                    cov[i][j] =
                        (1.0 - c1 - cmu) * cov[i][j] + c1 * pc[i] * pc[j] + cmu * rank_mu;
                }
            }

            let ps_norm: f64 = ps.iter().map(|x| x * x).sum::<f64>().sqrt();
            sigma *= ((cs / damps) * (ps_norm / expectation_norm - 1.0)).exp();
            sigma = sigma.min(1.0);
        }

        Ok(SolverResult {
            converged: false,
            evaluation: best,
            iterations: self.max_iter,
            message: "Max iterations reached".into(),
            params: best_params,
            cost_evals,
            grad_evals: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::solvers::testing::{Quadratic, Silent};

    #[test]
    fn improves_on_initial_guess() {
        let problem = Quadratic::new([2.0, -3.0], None);
        let start = problem.evaluate(problem.initial_params()).unwrap();
        let result = CMAESOptimizer::new(200, 1e-9, 3)
            .with_population_size(12)
            .solve(&problem, &mut Silent)
            .unwrap();

        assert!(result.evaluation.objective < start.objective);
        assert!(result.evaluation.objective < 1e-2);
    }

    #[test]
    fn reaches_feasible_region() {
        let problem = Quadratic::new([3.0, 0.0], Some(-1.0));
        let result = CMAESOptimizer::new(200, 1e-9, 5)
            .with_population_size(12)
            .solve(&problem, &mut Silent)
            .unwrap();
        assert!(result.evaluation.is_feasible());
        assert!(result.params[0] <= -1.0);
    }
}
