use super::error::{ModelError, SolveError};
use super::expression::CompiledExpression;
use super::graph::{detect_cycles, topological_order};
use super::types::{RelationshipType, Sense, SolveConfig, SolveResult, SolveStatus};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Native formula body: receives its inputs in declaration order.
pub type NativeFn = Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// Index of a node in the model arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// A derived quantity, a constraint body or the objective.
#[derive(Clone)]
pub enum Formula {
    Expression(CompiledExpression),
    Native {
        label: String,
        inputs: Vec<usize>,
        func: NativeFn,
    },
}

impl Formula {
    /// Arena slots this formula reads.
    pub fn inputs(&self) -> Vec<usize> {
        match self {
            Self::Expression(expr) => expr.inputs().iter().map(|&i| i as usize).collect(),
            Self::Native { inputs, .. } => inputs.clone(),
        }
    }

    #[inline]
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        match self {
            Self::Expression(expr) => expr.evaluate(values),
            Self::Native { inputs, func, .. } => {
                let args: Vec<f64> = inputs.iter().map(|&i| values[i]).collect();
                func(&args)
            }
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            Self::Expression(expr) => expr.source(),
            Self::Native { label, .. } => label,
        }
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(expr) => f.debug_tuple("Expression").field(&expr.source()).finish(),
            Self::Native { label, inputs, .. } => f
                .debug_struct("Native")
                .field("label", label)
                .field("inputs", inputs)
                .finish_non_exhaustive(),
        }
    }
}

/// Closed set of arena entries.
#[derive(Clone, Debug)]
pub enum Node {
    Parameter {
        value: f64,
    },
    Variable {
        value: f64,
        initial: f64,
        lower: f64,
        upper: f64,
    },
    Intermediate(Formula),
    /// Referenced by some formula but not defined yet.
    Unresolved,
}

#[derive(Clone, Debug)]
pub struct Constraint {
    pub formula: Formula,
    pub relation: RelationshipType,
    pub bound: f64,
}

impl Constraint {
    pub fn violation(&self, values: &[f64], strict_margin: f64, equality_tolerance: f64) -> f64 {
        let value = self.formula.evaluate(values);
        self.relation
            .violation(value, self.bound, strict_margin, equality_tolerance)
    }
}

#[derive(Clone, Debug)]
pub struct Objective {
    pub formula: Formula,
    pub sense: Sense,
}

/// Value of one constraint at the current variable values.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintValue {
    pub expression: String,
    pub relation: RelationshipType,
    pub bound: f64,
    pub value: f64,
    pub satisfied: bool,
}

/// Optimization model: an arena of named nodes plus constraints and one objective.
///
/// Formulas may name nodes that are defined later; such names become
/// placeholders until defined. Every definition that fails leaves the model
/// exactly as it was.
#[derive(Clone, Debug, Default)]
pub struct Model {
    nodes: IndexMap<String, Node>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register fixed constants. All-or-nothing.
    pub fn define_parameters<I, S>(&mut self, values: I) -> Result<(), ModelError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let values: Vec<(String, f64)> = values.into_iter().map(|(n, v)| (n.into(), v)).collect();

        for (i, (name, value)) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(ModelError::InvalidParameter {
                    name: name.clone(),
                    value: *value,
                });
            }
            self.check_definable(name)?;
            if values[..i].iter().any(|(other, _)| other == name) {
                return Err(ModelError::DuplicateName(name.clone()));
            }
        }

        for (name, value) in values {
            self.put(name, Node::Parameter { value });
        }
        Ok(())
    }

    /// Register a bounded decision variable.
    pub fn define_variable(
        &mut self,
        name: &str,
        initial: f64,
        lower: f64,
        upper: f64,
    ) -> Result<NodeId, ModelError> {
        let finite = initial.is_finite() && lower.is_finite() && upper.is_finite();
        if !finite || lower > upper || initial < lower || initial > upper {
            return Err(ModelError::InvalidBounds {
                name: name.to_string(),
                initial,
                lower,
                upper,
            });
        }
        self.check_definable(name)?;

        Ok(self.put(
            name.to_string(),
            Node::Variable {
                value: initial,
                initial,
                lower,
                upper,
            },
        ))
    }

    /// Register a derived quantity from a textual formula.
    pub fn define_intermediate(&mut self, name: &str, expression: &str) -> Result<NodeId, ModelError> {
        self.check_definable(name)?;
        let own = self.reserve(name);
        let (expr, pending) = self.compile_expression(expression, Some((name, own)))?;
        self.commit_intermediate(name, own, Formula::Expression(expr), pending)
    }

    /// Register a derived quantity computed by a Rust function of `inputs`.
    pub fn define_intermediate_fn<F>(
        &mut self,
        name: &str,
        inputs: &[&str],
        func: F,
    ) -> Result<NodeId, ModelError>
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        self.check_definable(name)?;
        let own = self.reserve(name);
        let mut pending = Vec::new();
        let slots: Vec<usize> = inputs
            .iter()
            .map(|input| self.resolve(input, Some((name, own)), &mut pending))
            .collect();
        let formula = Formula::Native {
            label: format!("{name}({})", inputs.join(", ")),
            inputs: slots,
            func: Arc::new(func),
        };
        self.commit_intermediate(name, own, formula, pending)
    }

    /// Register `expression relation bound`.
    pub fn add_constraint(
        &mut self,
        expression: &str,
        relation: RelationshipType,
        bound: f64,
    ) -> Result<(), ModelError> {
        if !bound.is_finite() {
            return Err(ModelError::InvalidParameter {
                name: expression.to_string(),
                value: bound,
            });
        }
        let (expr, pending) = self.compile_expression(expression, None)?;
        self.add_placeholders(pending);
        self.constraints.push(Constraint {
            formula: Formula::Expression(expr),
            relation,
            bound,
        });
        Ok(())
    }

    pub fn set_objective(&mut self, expression: &str, sense: Sense) -> Result<(), ModelError> {
        if self.objective.is_some() {
            return Err(ModelError::ObjectiveAlreadySet);
        }
        let (expr, pending) = self.compile_expression(expression, None)?;
        self.add_placeholders(pending);
        self.objective = Some(Objective {
            formula: Formula::Expression(expr),
            sense,
        });
        Ok(())
    }

    /// Validate the model and fix its evaluation order.
    pub fn compile(&self) -> Result<CompiledModel, ModelError> {
        let compiled = self.build()?;
        if compiled.objective.is_none() {
            return Err(ModelError::MissingObjective);
        }
        if compiled.variables.is_empty() {
            return Err(ModelError::NoDecisionVariables);
        }
        Ok(compiled)
    }

    /// Hand the model to the optimizer.
    ///
    /// Variable values are written back only when the run converges.
    pub fn solve(&mut self, config: &SolveConfig) -> Result<SolveResult, SolveError> {
        let compiled = self.compile()?;
        let result = crate::optimization::solve(&compiled, config)?;

        if result.status == SolveStatus::Converged {
            for (name, &value) in &result.variable_values {
                if let Some(Node::Variable { value: slot, .. }) = self.nodes.get_mut(name) {
                    *slot = value;
                }
            }
        }
        Ok(result)
    }

    /// Value of a parameter or decision variable.
    pub fn value(&self, name: &str) -> Option<f64> {
        match self.nodes.get(name)? {
            Node::Parameter { value } | Node::Variable { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Evaluate any node at the current variable values.
    pub fn evaluate(&self, name: &str) -> Result<f64, ModelError> {
        let id = self
            .nodes
            .get_index_of(name)
            .ok_or_else(|| ModelError::UnknownName(name.to_string()))?;
        let compiled = self.build()?;
        let values = compiled.node_values(&self.current_variables());
        Ok(values[id])
    }

    /// Every constraint evaluated at the current variable values, checked exactly.
    pub fn constraint_values(&self) -> Result<Vec<ConstraintValue>, ModelError> {
        let compiled = self.build()?;
        let values = compiled.node_values(&self.current_variables());
        Ok(self
            .constraints
            .iter()
            .map(|c| {
                let value = c.formula.evaluate(&values);
                ConstraintValue {
                    expression: c.formula.describe().to_string(),
                    relation: c.relation,
                    bound: c.bound,
                    value,
                    satisfied: c.relation.is_satisfied(value, c.bound),
                }
            })
            .collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        matches!(self.nodes.get(name), Some(node) if !matches!(node, Node::Unresolved))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn has_objective(&self) -> bool {
        self.objective.is_some()
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    fn current_variables(&self) -> Vec<f64> {
        self.nodes
            .values()
            .filter_map(|node| match node {
                Node::Variable { value, .. } => Some(*value),
                _ => None,
            })
            .collect()
    }

    fn check_definable(&self, name: &str) -> Result<(), ModelError> {
        match self.nodes.get(name) {
            None | Some(Node::Unresolved) => Ok(()),
            Some(_) => Err(ModelError::DuplicateName(name.to_string())),
        }
    }

    /// Slot `name` will occupy: its placeholder if one exists, else the next free index.
    fn reserve(&self, name: &str) -> usize {
        self.nodes.get_index_of(name).unwrap_or(self.nodes.len())
    }

    /// First slot handed to names that are still unknown.
    fn placeholder_base(&self, own: Option<(&str, usize)>) -> usize {
        match own {
            Some((_, id)) if id == self.nodes.len() => id + 1,
            _ => self.nodes.len(),
        }
    }

    fn resolve(&self, name: &str, own: Option<(&str, usize)>, pending: &mut Vec<String>) -> usize {
        if let Some((own_name, id)) = own {
            if name == own_name {
                return id;
            }
        }
        if let Some(id) = self.nodes.get_index_of(name) {
            return id;
        }
        let base = self.placeholder_base(own);
        if let Some(k) = pending.iter().position(|p| p == name) {
            return base + k;
        }
        pending.push(name.to_string());
        base + pending.len() - 1
    }

    fn compile_expression(
        &self,
        expression: &str,
        own: Option<(&str, usize)>,
    ) -> Result<(CompiledExpression, Vec<String>), ModelError> {
        let mut pending = Vec::new();
        let expr = CompiledExpression::compile(expression, |name| {
            self.resolve(name, own, &mut pending) as u32
        })
        .map_err(|source| ModelError::Expression {
            expression: expression.to_string(),
            source,
        })?;
        Ok((expr, pending))
    }

    fn commit_intermediate(
        &mut self,
        name: &str,
        own: usize,
        formula: Formula,
        pending: Vec<String>,
    ) -> Result<NodeId, ModelError> {
        let base = self.placeholder_base(Some((name, own)));
        let mut graph = self.dependency_graph(base + pending.len());
        graph[own] = formula.inputs();

        if detect_cycles(&graph).is_err() {
            return Err(ModelError::CyclicDependency(name.to_string()));
        }

        let id = self.put(name.to_string(), Node::Intermediate(formula));
        debug_assert_eq!(id.0, own);
        self.add_placeholders(pending);
        Ok(id)
    }

    fn dependency_graph(&self, size: usize) -> Vec<Vec<usize>> {
        let mut graph = vec![Vec::new(); size];
        for (i, node) in self.nodes.values().enumerate() {
            if let Node::Intermediate(formula) = node {
                graph[i] = formula.inputs();
            }
        }
        graph
    }

    fn add_placeholders(&mut self, pending: Vec<String>) {
        for name in pending {
            self.nodes.insert(name, Node::Unresolved);
        }
    }

    /// Insert or fill a placeholder in place.
    fn put(&mut self, name: String, node: Node) -> NodeId {
        match self.nodes.get_index_of(&name) {
            Some(id) => {
                if let Some((_, slot)) = self.nodes.get_index_mut(id) {
                    *slot = node;
                }
                NodeId(id)
            }
            None => {
                let (id, _) = self.nodes.insert_full(name, node);
                NodeId(id)
            }
        }
    }

    fn build(&self) -> Result<CompiledModel, ModelError> {
        if let Some((name, _)) = self
            .nodes
            .iter()
            .find(|(_, node)| matches!(node, Node::Unresolved))
        {
            return Err(ModelError::UnresolvedReference(name.clone()));
        }

        let graph = self.dependency_graph(self.nodes.len());
        let order = topological_order(&graph).map_err(|i| {
            let name = self.nodes.get_index(i).map(|(n, _)| n.clone()).unwrap_or_default();
            ModelError::CyclicDependency(name)
        })?;

        let mut base_values = vec![0.0; self.nodes.len()];
        let mut formulas = vec![None; self.nodes.len()];
        let mut variables = Vec::new();
        let mut initial = Vec::new();
        let mut bounds = Vec::new();

        for (i, (name, node)) in self.nodes.iter().enumerate() {
            match node {
                Node::Parameter { value } => base_values[i] = *value,
                Node::Variable {
                    initial: start,
                    lower,
                    upper,
                    value,
                } => {
                    base_values[i] = *value;
                    variables.push((i, name.clone()));
                    initial.push(*start);
                    bounds.push((*lower, *upper));
                }
                Node::Intermediate(formula) => formulas[i] = Some(formula.clone()),
                Node::Unresolved => unreachable!("checked above"),
            }
        }

        let order = order
            .into_iter()
            .filter(|&i| formulas[i].is_some())
            .collect();

        Ok(CompiledModel {
            base_values,
            formulas,
            order,
            variables,
            initial,
            bounds,
            constraints: self.constraints.clone(),
            objective: self.objective.clone(),
        })
    }
}

/// Validated, order-fixed snapshot of a [`Model`] that solvers evaluate.
#[derive(Clone, Debug)]
pub struct CompiledModel {
    base_values: Vec<f64>,
    formulas: Vec<Option<Formula>>,
    order: Vec<usize>,
    variables: Vec<(usize, String)>,
    initial: Vec<f64>,
    bounds: Vec<(f64, f64)>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

impl CompiledModel {
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|(_, name)| name.as_str())
    }

    pub fn initial_values(&self) -> &[f64] {
        &self.initial
    }

    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    /// Number of arena slots a value table needs.
    pub fn slot_count(&self) -> usize {
        self.base_values.len()
    }

    /// Fill `values` with every node's value for decision vector `x`.
    pub fn fill_values(&self, x: &[f64], values: &mut Vec<f64>) {
        values.clear();
        values.extend_from_slice(&self.base_values);
        for (&(slot, _), &xi) in self.variables.iter().zip(x) {
            values[slot] = xi;
        }
        for &i in &self.order {
            if let Some(formula) = &self.formulas[i] {
                values[i] = formula.evaluate(values);
            }
        }
    }

    pub fn node_values(&self, x: &[f64]) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.slot_count());
        self.fill_values(x, &mut values);
        values
    }
}
