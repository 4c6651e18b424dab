use super::traits::{
    Evaluation, OptimizationCallback, Problem, Solver, SolverResult, clamp_params, is_negligible,
};
use crate::core::SolveError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Consecutive feasible iterations without a meaningful improvement before the swarm is done.
const STALL_ITERATIONS: u32 = 20;

/// Particle Swarm Optimization ranked by feasibility rules, so it needs no
/// gradient and tolerates the kinks that constraint boundaries introduce.
pub struct ParticleOptimizer {
    max_iter: u32,
    tolerance: f64,
    seed: u64,
    population_size: usize,
    inertia: f64,   // w - velocity inertia weight
    cognitive: f64, // c1 - personal best influence
    social: f64,    // c2 - global best influence
}

impl ParticleOptimizer {
    pub fn new(max_iter: u32, tolerance: f64, seed: u64) -> Self {
        Self {
            max_iter,
            tolerance,
            seed,
            population_size: 20,
            inertia: 0.7,
            cognitive: 1.5,
            social: 1.5,
        }
    }

    /// Configure swarm size (default: 20)
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    /// The initial guess plus uniform samples inside the bounds
    fn initialize_particles(
        &self,
        rng: &mut StdRng,
        bounds: &[(f64, f64)],
        initial_params: &[f64],
    ) -> Vec<Vec<f64>> {
        let mut particles = Vec::with_capacity(self.population_size);

        let mut first = initial_params.to_vec();
        clamp_params(&mut first, bounds);
        particles.push(first);

        for _ in 1..self.population_size {
            particles.push(
                bounds
                    .iter()
                    .map(|&(min, max)| if max > min { rng.gen_range(min..=max) } else { min })
                    .collect(),
            );
        }

        particles
    }

    /// Small random velocities, a tenth of each parameter range at most
    fn initialize_velocities(&self, rng: &mut StdRng, bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        (0..self.population_size)
            .map(|_| {
                bounds
                    .iter()
                    .map(|&(min, max)| {
                        let reach = (max - min) * 0.1;
                        if reach > 0.0 { rng.gen_range(-reach..=reach) } else { 0.0 }
                    })
                    .collect()
            })
            .collect()
    }
}

impl Solver for ParticleOptimizer {
    fn name(&self) -> &str {
        "PSO"
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> Result<SolverResult, SolveError> {
        let n = problem.num_params();
        let bounds = problem.bounds();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut particles = self.initialize_particles(&mut rng, bounds, problem.initial_params());
        let mut velocities = self.initialize_velocities(&mut rng, bounds);
        let mut personal_best_positions = particles.clone();
        let mut personal_best = vec![Evaluation::WORST; self.population_size];

        let mut global_best_idx = 0;
        let mut global_best = Evaluation::WORST;

        let mut cost_evals = 0;
        let mut stagnation_counter = 0;

        let result = |converged: bool,
                      iterations: u32,
                      message: &str,
                      best: Evaluation,
                      params: &[f64],
                      cost_evals: usize| SolverResult {
            converged,
            evaluation: best,
            iterations,
            message: message.into(),
            params: params.to_vec(),
            cost_evals,
            grad_evals: 0,
        };

        for iter in 0..self.max_iter {
            let prev_global_best = global_best;

            for p in 0..self.population_size {
                let evaluation = problem.evaluate(&particles[p])?;
                cost_evals += 1;

                if evaluation.is_better_than(&personal_best[p]) {
                    personal_best[p] = evaluation;
                    personal_best_positions[p].copy_from_slice(&particles[p]);
                }

                if evaluation.is_better_than(&global_best) {
                    global_best = evaluation;
                    global_best_idx = p;
                }
            }

            let best_params = &personal_best_positions[global_best_idx];
            callback.on_iteration(iter + 1, best_params, &global_best)?;

            if callback.should_stop() {
                return Ok(result(
                    false,
                    iter + 1,
                    "Stopped by callback",
                    global_best,
                    best_params,
                    cost_evals,
                ));
            }

            // Stagnation only counts once the swarm holds a feasible point
            let settled = global_best.is_feasible()
                && prev_global_best.is_feasible()
                && is_negligible(prev_global_best.objective, global_best.objective, self.tolerance);
            if settled {
                stagnation_counter += 1;
                if stagnation_counter >= STALL_ITERATIONS {
                    return Ok(result(
                        true,
                        iter + 1,
                        "Converged",
                        global_best,
                        best_params,
                        cost_evals,
                    ));
                }
            } else {
                stagnation_counter = 0;
            }

            for p in 0..self.population_size {
                for i in 0..n {
                    let r1: f64 = rng.gen_range(0.0..1.0);
                    let r2: f64 = rng.gen_range(0.0..1.0);

                    velocities[p][i] = self.inertia * velocities[p][i]
                        + self.cognitive * r1 * (personal_best_positions[p][i] - particles[p][i])
                        + self.social
                            * r2
                            * (personal_best_positions[global_best_idx][i] - particles[p][i]);

                    let (min, max) = bounds[i];
                    let v_max = (max - min) * 0.2;
                    velocities[p][i] = velocities[p][i].clamp(-v_max, v_max);

                    particles[p][i] += velocities[p][i];
                }

                clamp_params(&mut particles[p], bounds);
            }
        }

        Ok(result(
            false,
            self.max_iter,
            "Max iterations reached",
            global_best,
            &personal_best_positions[global_best_idx],
            cost_evals,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::solvers::testing::{Quadratic, Silent};

    #[test]
    fn finds_constrained_minimum() {
        // minimize (x-3)^2 + (y+1)^2 subject to x <= 2
        let problem = Quadratic::new([3.0, -1.0], Some(2.0));
        let mut solver = ParticleOptimizer::new(300, 1e-9, 7).with_population_size(25);
        let result = solver.solve(&problem, &mut Silent).unwrap();

        assert!(result.evaluation.is_feasible());
        assert!((result.params[0] - 2.0).abs() < 1e-2);
        assert!((result.params[1] + 1.0).abs() < 1e-2);
    }

    #[test]
    fn same_seed_same_answer() {
        let problem = Quadratic::new([0.5, 0.5], None);
        let a = ParticleOptimizer::new(50, 1e-9, 11).solve(&problem, &mut Silent).unwrap();
        let b = ParticleOptimizer::new(50, 1e-9, 11).solve(&problem, &mut Silent).unwrap();
        assert_eq!(a.params, b.params);
        assert_eq!(a.cost_evals, b.cost_evals);
    }
}
