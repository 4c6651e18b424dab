use thiserror::Error;

/// Errors raised while compiling a textual formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("expression cannot be empty")]
    Empty,

    #[error("unexpected '{token}' at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("expression nests deeper than {0} values")]
    TooDeep(usize),

    #[error("expression nests deeper than {0} levels")]
    TooNested(usize),
}

/// Caller errors raised while a model is being defined or compiled.
///
/// Every operation that returns one of these leaves the model untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("parameter '{name}' must be finite, got {value}")]
    InvalidParameter { name: String, value: f64 },

    #[error("variable '{name}': bounds [{lower}, {upper}] with initial guess {initial} are invalid")]
    InvalidBounds {
        name: String,
        initial: f64,
        lower: f64,
        upper: f64,
    },

    #[error("cyclic dependency detected involving '{0}'")]
    CyclicDependency(String),

    #[error("objective has already been set")]
    ObjectiveAlreadySet,

    #[error("'{0}' is already defined")]
    DuplicateName(String),

    #[error("'{0}' is referenced but never defined")]
    UnresolvedReference(String),

    #[error("no objective has been set")]
    MissingObjective,

    #[error("model has no decision variables")]
    NoDecisionVariables,

    #[error("unknown name '{0}'")]
    UnknownName(String),

    #[error("failed to compile '{expression}': {source}")]
    Expression {
        expression: String,
        #[source]
        source: ExpressionError,
    },
}

/// Failures of a solve run. Non-convergence is reported through
/// [`SolveStatus`](super::SolveStatus), not here.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("solver error: {0}")]
    Solver(String),
}

impl From<argmin::core::Error> for SolveError {
    fn from(e: argmin::core::Error) -> Self {
        Self::Solver(e.to_string())
    }
}
