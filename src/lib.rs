//! Minimum-weight two-bar truss design.
//!
//! [`core`] defines optimization models, [`optimization`] solves them,
//! [`truss`] builds the worked example and [`grid`] plus [`render`] map its
//! feasible design space.

pub mod config;
pub mod core;
pub mod equations;
pub mod grid;
pub mod optimization;
pub mod render;
pub mod truss;

pub use config::{ConfigError, RunConfig};
pub use self::core::*;
pub use equations::{TrussProperties, TrussResponse};
pub use grid::{FieldEquations, GridField, GridFields, arange, evaluate_grid};
pub use render::{ContourLayer, ContourPlot, ContourRenderer, Levels, RenderError, SvgRenderer};
pub use truss::{DesignLimits, DesignSpace, VariableRange, build_model};
