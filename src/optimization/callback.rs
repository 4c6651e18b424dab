use super::solvers::traits::{Evaluation, OptimizationCallback};
use crate::core::{SolveError, SolveResult};

/// Iteration result for tracking optimization progress
#[derive(Debug, Clone)]
pub struct IterationResult {
    pub params: Vec<f64>,
    pub evaluation: Evaluation,
}

/// Records every reported iteration and, when verbose, echoes it to stderr.
pub struct ProgressCallback {
    verbose: bool,
    max_iterations: u32,
    iteration_count: u32,
    history: Vec<IterationResult>,
    param_names: Vec<String>,
}

impl ProgressCallback {
    pub fn new(verbose: bool, max_iterations: u32, param_names: Vec<String>) -> Self {
        Self {
            verbose,
            max_iterations,
            iteration_count: 0,
            history: Vec::new(),
            param_names,
        }
    }

    /// Get iteration history
    pub fn history(&self) -> &[IterationResult] {
        &self.history
    }

    /// Start a new phase; the iteration budget applies per phase.
    pub fn reset_budget(&mut self) {
        self.iteration_count = 0;
    }

    fn print_iteration(&self, iteration: u32, params: &[f64], best: &Evaluation) {
        eprint!(
            "Iter {:4}: Objective = {:.6e}  Violation = {:.3e} ",
            iteration, best.objective, best.violation
        );
        for (name, value) in self.param_names.iter().zip(params) {
            eprint!(" {name}={value:.6}");
        }
        eprintln!();
    }

    /// Print optimization summary
    pub fn print_summary(&self, result: &SolveResult) {
        if !self.verbose {
            return;
        }

        eprintln!("\n{}", "=".repeat(60));
        eprintln!("OPTIMIZATION SUMMARY");
        eprintln!("{}", "=".repeat(60));

        eprintln!(
            "\nStatus: {}",
            if result.is_converged() {
                "✓ CONVERGED".to_string()
            } else {
                format!("✗ {}", result.status.to_string().to_uppercase())
            }
        );
        eprintln!("Solver: {}", result.solver);
        eprintln!("Stop Reason: {}", result.message);
        eprintln!("Recorded Iterations: {}", self.history.len());
        eprintln!("Evaluations: {}", result.evaluations);
        if result.gradient_evaluations > 0 {
            eprintln!("Gradient Evaluations: {}", result.gradient_evaluations);
        }
        eprintln!("\nObjective: {:.6e}", result.objective_value);
        eprintln!("Constraint Violation: {:.3e}", result.constraint_violation);
        eprintln!("\nVariables:");
        for (name, value) in &result.variable_values {
            eprintln!("  {name} = {value:.6e}");
        }
        eprintln!("\n{}\n", "=".repeat(60));
    }
}

impl OptimizationCallback for ProgressCallback {
    fn on_iteration(
        &mut self,
        iteration: u32,
        params: &[f64],
        best: &Evaluation,
    ) -> Result<(), SolveError> {
        self.iteration_count = iteration;

        self.history.push(IterationResult {
            params: params.to_vec(),
            evaluation: *best,
        });

        if self.verbose {
            self.print_iteration(iteration, params, best);
        }

        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.iteration_count >= self.max_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_history_and_stops_at_budget() {
        let mut callback = ProgressCallback::new(false, 2, vec!["x".into()]);
        let eval = Evaluation {
            objective: 1.0,
            violation: 0.0,
        };

        callback.on_iteration(1, &[0.5], &eval).unwrap();
        assert!(!callback.should_stop());
        callback.on_iteration(2, &[0.25], &eval).unwrap();
        assert!(callback.should_stop());
        assert_eq!(callback.history().len(), 2);
        assert_eq!(callback.history()[1].params, vec![0.25]);

        callback.reset_budget();
        assert!(!callback.should_stop());
    }
}
