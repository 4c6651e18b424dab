pub mod error;
pub mod expression;
pub mod graph;
pub mod model;
pub mod types;

pub use error::{ExpressionError, ModelError, SolveError};
pub use expression::CompiledExpression;
pub use graph::{detect_cycles, topological_order};
pub use model::*;
pub use types::*;
