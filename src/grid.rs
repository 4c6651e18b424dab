//! Evaluation of scalar fields over a Cartesian mesh of two design variables.

use crate::equations::{self, TrussProperties};
use indexmap::IndexMap;
use rayon::prelude::*;

/// Half-open axis `start, start + step, ...` strictly below `stop`.
///
/// Each value is computed as `start + i * step` so rounding never accumulates.
/// Returns an empty axis for a non-positive or non-finite step.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if !step.is_finite() || step <= 0.0 || !start.is_finite() || !stop.is_finite() {
        return Vec::new();
    }
    let count = ((stop - start) / step).ceil();
    if count <= 0.0 {
        return Vec::new();
    }
    (0..count as usize).map(|i| start + i as f64 * step).collect()
}

/// Immutable row-major 2-D field: rows follow the y axis, columns the x axis.
#[derive(Clone, Debug, PartialEq)]
pub struct GridField {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl GridField {
    pub fn from_rows(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self { rows, cols, data })
    }

    /// `(rows, cols)`, i.e. `(len(y), len(x))`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Smallest and largest finite entries.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Named fields over one mesh, with the axes they were evaluated on.
#[derive(Clone, Debug, PartialEq)]
pub struct GridFields {
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
    pub fields: IndexMap<String, GridField>,
}

impl GridFields {
    pub fn get(&self, name: &str) -> Option<&GridField> {
        self.fields.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Pointwise equations that produce a fixed set of named fields.
pub trait FieldEquations: Sync {
    fn field_names(&self) -> &[&'static str];

    /// Write one value per field name into `out` for the point `(x, y)`.
    fn evaluate_point(&self, x: f64, y: f64, out: &mut [f64]);
}

pub const TRUSS_FIELDS: [&str; 5] = [
    "weight",
    "stress",
    "buckling",
    "deflection",
    "stress_minus_buckling",
];

/// x = height, y = diameter
impl FieldEquations for TrussProperties {
    fn field_names(&self) -> &[&'static str] {
        &TRUSS_FIELDS
    }

    fn evaluate_point(&self, height: f64, diameter: f64, out: &mut [f64]) {
        let r = equations::evaluate(height, diameter, self);
        out.copy_from_slice(&[
            r.weight,
            r.stress,
            r.buckling,
            r.deflection,
            r.stress - r.buckling,
        ]);
    }
}

/// Evaluate `equations` at every `(x, y)` of the mesh.
///
/// Each field has shape `(y_values.len(), x_values.len())`. Rows are
/// computed in parallel; the result does not depend on scheduling.
pub fn evaluate_grid<E: FieldEquations>(x_values: &[f64], y_values: &[f64], equations: &E) -> GridFields {
    let names = equations.field_names();
    let n_fields = names.len();
    let cols = x_values.len();

    // rows[r] holds cols * n_fields values, point-major
    let rows: Vec<Vec<f64>> = y_values
        .par_iter()
        .map(|&y| {
            let mut row = vec![0.0; cols * n_fields];
            for (chunk, &x) in row.chunks_mut(n_fields.max(1)).zip(x_values) {
                equations.evaluate_point(x, y, &mut chunk[..n_fields]);
            }
            row
        })
        .collect();

    let fields = names
        .iter()
        .enumerate()
        .map(|(f, &name)| {
            let data: Vec<f64> = rows
                .iter()
                .flat_map(|row| row.iter().skip(f).step_by(n_fields).copied())
                .collect();
            let field = GridField {
                rows: y_values.len(),
                cols,
                data,
            };
            (name.to_string(), field)
        })
        .collect();

    GridFields {
        x_values: x_values.to_vec(),
        y_values: y_values.to_vec(),
        fields,
    }
}
