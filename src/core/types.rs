use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ===== ENUMS =====

/// Direction of the objective.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipType {
    Equals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl RelationshipType {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThanOrEqual => "<=",
        }
    }

    pub fn is_strict(self) -> bool {
        matches!(self, Self::GreaterThan | Self::LessThan)
    }

    /// Check the relation exactly, without tolerances.
    pub fn is_satisfied(self, value: f64, bound: f64) -> bool {
        match self {
            Self::Equals => value == bound,
            Self::GreaterThan => value > bound,
            Self::LessThan => value < bound,
            Self::GreaterThanOrEqual => value >= bound,
            Self::LessThanOrEqual => value <= bound,
        }
    }

    /// Normalized amount by which `value` misses `bound`; zero when satisfied.
    ///
    /// Strict relations are tightened by `strict_margin` and equality is
    /// relaxed by `equality_tolerance`, both relative to `max(1, |bound|)`.
    /// A non-finite value is infinitely violating.
    pub fn violation(
        self,
        value: f64,
        bound: f64,
        strict_margin: f64,
        equality_tolerance: f64,
    ) -> f64 {
        if !value.is_finite() {
            return f64::INFINITY;
        }
        let scale = bound.abs().max(1.0);
        let excess = match self {
            Self::LessThan => value - (bound - strict_margin * scale),
            Self::LessThanOrEqual => value - bound,
            Self::GreaterThan => bound + strict_margin * scale - value,
            Self::GreaterThanOrEqual => bound - value,
            Self::Equals => (value - bound).abs() - equality_tolerance * scale,
        };
        excess.max(0.0) / scale
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Which optimizer `solve` runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverMethod {
    #[default]
    Auto,
    Pso,
    Newton,
    #[serde(rename = "cmaes")]
    CmaEs,
}

/// Outcome of a solve run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// A feasible point was found and the solver met its stopping criterion.
    Converged,
    /// No point satisfying every constraint was found.
    Infeasible,
    /// A feasible point was found but the iteration budget ran out first.
    MaxIterations,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Converged => "converged",
            Self::Infeasible => "infeasible",
            Self::MaxIterations => "max_iterations",
        })
    }
}

// ===== CONFIGURATION =====

/// Solver settings, passed explicitly to [`Model::solve`](super::Model::solve).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveConfig {
    pub method: SolverMethod,
    pub max_iterations: u32,
    /// Relative objective change below which a feasible run counts as converged.
    pub tolerance: f64,
    /// Tightening applied to strict relations (`<`, `>`).
    pub strict_margin: f64,
    /// Slack allowed on equality constraints.
    pub equality_tolerance: f64,
    /// Weight of the violation term in the penalized objective.
    pub penalty_weight: f64,
    /// Refine the best point with Nelder-Mead afterwards.
    pub polish: bool,
    pub seed: u64,
    pub verbose: bool,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            method: SolverMethod::Auto,
            max_iterations: 250,
            tolerance: 1e-6,
            strict_margin: 1e-6,
            equality_tolerance: 1e-6,
            penalty_weight: 1e3,
            polish: true,
            seed: 0x7775_6261,
            verbose: false,
        }
    }
}

// ===== RESULTS =====

#[derive(Clone, Debug, Serialize)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub variable_values: IndexMap<String, f64>,
    pub objective_value: f64,
    /// Summed normalized constraint violation at the reported point.
    pub constraint_violation: f64,
    pub iterations: u32,
    pub evaluations: usize,
    /// Finite-difference gradients taken, zero for derivative-free runs.
    pub gradient_evaluations: usize,
    pub solver: String,
    pub message: String,
}

impl SolveResult {
    pub fn is_converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }

    pub fn get_variable(&self, name: &str) -> Option<f64> {
        self.variable_values.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_relations_are_tightened() {
        let rel = RelationshipType::LessThan;
        assert!(rel.violation(100.0, 100.0, 1e-6, 0.0) > 0.0);
        assert_eq!(rel.violation(99.0, 100.0, 1e-6, 0.0), 0.0);
        assert_eq!(RelationshipType::LessThanOrEqual.violation(100.0, 100.0, 1e-6, 0.0), 0.0);
    }

    #[test]
    fn violation_is_normalized_by_bound() {
        let v = RelationshipType::LessThanOrEqual.violation(30.0, 24.0, 0.0, 0.0);
        assert!((v - 0.25).abs() < 1e-12);
        let v = RelationshipType::GreaterThanOrEqual.violation(-0.5, 0.0, 0.0, 0.0);
        assert!((v - 0.5).abs() < 1e-12);
    }

    #[test]
    fn equality_within_tolerance() {
        let rel = RelationshipType::Equals;
        assert_eq!(rel.violation(1.0 + 1e-9, 1.0, 0.0, 1e-6), 0.0);
        assert!(rel.violation(1.1, 1.0, 0.0, 1e-6) > 0.0);
    }

    #[test]
    fn non_finite_values_are_infinitely_violating() {
        let rel = RelationshipType::LessThan;
        assert_eq!(rel.violation(f64::NAN, 1.0, 0.0, 0.0), f64::INFINITY);
        assert_eq!(rel.violation(f64::INFINITY, 1.0, 0.0, 0.0), f64::INFINITY);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: SolveConfig =
            serde_json::from_str(r#"{"method": "cmaes", "max_iterations": 40}"#).unwrap();
        assert_eq!(config.method, SolverMethod::CmaEs);
        assert_eq!(config.max_iterations, 40);
        assert_eq!(config.seed, SolveConfig::default().seed);
        assert!(config.polish);
    }
}
