use crate::core::{CompiledModel, ModelError, Objective, SolveConfig, SolveError, Sense};
use crate::optimization::solvers::traits::{Evaluation, Problem};
use indexmap::IndexMap;
use std::cell::RefCell;

/// A compiled model seen through the solver interface.
///
/// Maximization is turned into minimization by negating the objective, and
/// a candidate whose objective is not finite counts as infinitely violating.
pub struct ModelProblem<'a> {
    model: &'a CompiledModel,
    objective: &'a Objective,
    initial: Vec<f64>,
    strict_margin: f64,
    equality_tolerance: f64,
    penalty_weight: f64,

    // Node value table reused across evaluations
    scratch: RefCell<Vec<f64>>,
}

impl<'a> ModelProblem<'a> {
    pub fn new(model: &'a CompiledModel, config: &SolveConfig) -> Result<Self, SolveError> {
        let objective = model.objective().ok_or(ModelError::MissingObjective)?;
        let mut initial = model.initial_values().to_vec();
        crate::optimization::solvers::traits::clamp_params(&mut initial, model.bounds());

        Ok(Self {
            model,
            objective,
            initial,
            strict_margin: config.strict_margin,
            equality_tolerance: config.equality_tolerance,
            penalty_weight: config.penalty_weight,
            scratch: RefCell::new(Vec::with_capacity(model.slot_count())),
        })
    }

    fn sign(&self) -> f64 {
        match self.objective.sense {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        }
    }

    /// Objective in the model's own sense.
    pub fn reported_objective(&self, evaluation: &Evaluation) -> f64 {
        self.sign() * evaluation.objective
    }

    pub fn variable_values(&self, params: &[f64]) -> IndexMap<String, f64> {
        self.model
            .variable_names()
            .zip(params)
            .map(|(name, &value)| (name.to_string(), value))
            .collect()
    }

    pub fn has_constraints(&self) -> bool {
        !self.model.constraints().is_empty()
    }
}

impl Problem for ModelProblem<'_> {
    fn evaluate(&self, params: &[f64]) -> Result<Evaluation, SolveError> {
        let mut values = self.scratch.borrow_mut();
        self.model.fill_values(params, &mut values);

        let objective = self.sign() * self.objective.formula.evaluate(&values);
        if !objective.is_finite() {
            return Ok(Evaluation::WORST);
        }

        let violation = self
            .model
            .constraints()
            .iter()
            .map(|c| c.violation(&values, self.strict_margin, self.equality_tolerance))
            .sum();

        Ok(Evaluation {
            objective,
            violation,
        })
    }

    fn num_params(&self) -> usize {
        self.model.num_variables()
    }

    fn initial_params(&self) -> &[f64] {
        &self.initial
    }

    fn bounds(&self) -> &[(f64, f64)] {
        self.model.bounds()
    }

    fn penalty_weight(&self) -> f64 {
        self.penalty_weight
    }
}
