//! Contour plot description and the renderers that consume it.

pub mod contour;
pub mod svg;

pub use contour::{Segment, iso_segments, nice_levels};
pub use svg::SvgRenderer;

use crate::grid::GridFields;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write plot: {0}")]
    Io(#[from] std::io::Error),

    #[error("field '{0}' is not in the grid")]
    UnknownField(String),

    #[error("field '{field}' has shape {actual:?}, axes need {expected:?}")]
    AxisMismatch {
        field: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Which iso-levels a layer draws.
#[derive(Clone, Debug, PartialEq)]
pub enum Levels {
    Explicit(Vec<f64>),
    /// About this many round-numbered levels across the field's finite range
    Auto(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContourLayer {
    pub field: String,
    pub levels: Levels,
    /// CSS color; `None` picks from the palette
    pub color: Option<String>,
    /// One width per level; the last one repeats
    pub line_widths: Vec<f64>,
    /// Write the level value next to each line
    pub label: bool,
}

impl ContourLayer {
    pub fn new(field: &str, levels: Levels) -> Self {
        Self {
            field: field.to_string(),
            levels,
            color: None,
            line_widths: vec![1.0],
            label: true,
        }
    }

    pub fn color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn widths(mut self, widths: &[f64]) -> Self {
        self.line_widths = widths.to_vec();
        self
    }

    pub fn line_width(&self, index: usize) -> f64 {
        self.line_widths
            .get(index)
            .or(self.line_widths.last())
            .copied()
            .unwrap_or(1.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContourPlot {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub layers: Vec<ContourLayer>,
}

impl ContourPlot {
    /// Levels of `layer` resolved against the grid.
    pub fn resolve_levels(layer: &ContourLayer, grid: &GridFields) -> Result<Vec<f64>, RenderError> {
        let field = grid
            .get(&layer.field)
            .ok_or_else(|| RenderError::UnknownField(layer.field.clone()))?;
        Ok(match &layer.levels {
            Levels::Explicit(levels) => levels.clone(),
            Levels::Auto(count) => field
                .finite_range()
                .map(|(lo, hi)| nice_levels(lo, hi, *count))
                .unwrap_or_default(),
        })
    }

    /// Check every layer names a field shaped like the axes.
    pub fn validate(&self, grid: &GridFields) -> Result<(), RenderError> {
        let expected = (grid.y_values.len(), grid.x_values.len());
        for layer in &self.layers {
            let field = grid
                .get(&layer.field)
                .ok_or_else(|| RenderError::UnknownField(layer.field.clone()))?;
            if field.shape() != expected {
                return Err(RenderError::AxisMismatch {
                    field: layer.field.clone(),
                    expected,
                    actual: field.shape(),
                });
            }
        }
        Ok(())
    }
}

pub trait ContourRenderer {
    fn render(&self, plot: &ContourPlot, grid: &GridFields, path: &Path) -> Result<(), RenderError>;
}

const TITLE: &str = "Two Bar Optimization Problem";

/// Weight everywhere plus the three limit lines.
pub fn overview_plot(max_stress: f64, max_deflection: f64) -> ContourPlot {
    ContourPlot {
        title: TITLE.into(),
        x_label: "Height".into(),
        y_label: "Diameter".into(),
        layers: vec![
            ContourLayer::new("weight", Levels::Auto(8)),
            ContourLayer::new("stress", Levels::Explicit(vec![max_stress]))
                .color("black")
                .widths(&[4.0]),
            ContourLayer::new("deflection", Levels::Explicit(vec![max_deflection]))
                .color("blue")
                .widths(&[4.0]),
            ContourLayer::new("stress_minus_buckling", Levels::Explicit(vec![0.0]))
                .color("red")
                .widths(&[4.0]),
        ],
    }
}

/// The limit lines plus a thin line just inside each one.
pub fn detail_plot(max_stress: f64, max_deflection: f64) -> ContourPlot {
    let mut plot = overview_plot(max_stress, max_deflection);
    let inside = [
        max_stress * 0.9,
        max_deflection * 0.88,
        -5.0,
    ];
    for (layer, inner) in plot.layers[1..].iter_mut().zip(inside) {
        if let Levels::Explicit(levels) = &mut layer.levels {
            levels.insert(0, inner);
        }
        layer.line_widths = vec![0.5, 4.0];
    }
    plot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equations::TrussProperties;
    use crate::grid::evaluate_grid;

    #[test]
    fn detail_plot_adds_inner_levels() {
        let plot = detail_plot(100.0, 0.25);
        let levels: Vec<_> = plot.layers[1..].iter().map(|l| l.levels.clone()).collect();
        assert_eq!(levels[0], Levels::Explicit(vec![90.0, 100.0]));
        assert_eq!(levels[1], Levels::Explicit(vec![0.22, 0.25]));
        assert_eq!(levels[2], Levels::Explicit(vec![-5.0, 0.0]));
        assert_eq!(plot.layers[1].line_width(0), 0.5);
        assert_eq!(plot.layers[1].line_width(7), 4.0);
    }

    #[test]
    fn validate_reports_unknown_fields() {
        let grid = evaluate_grid(&[10.0, 20.0], &[1.0, 2.0], &TrussProperties::default());
        let mut plot = overview_plot(100.0, 0.25);
        assert!(plot.validate(&grid).is_ok());

        plot.layers.push(ContourLayer::new("torque", Levels::Auto(5)));
        assert!(matches!(plot.validate(&grid), Err(RenderError::UnknownField(f)) if f == "torque"));
    }

    #[test]
    fn auto_levels_follow_field_range() {
        let grid = evaluate_grid(&[10.0, 20.0, 30.0], &[1.0, 2.0, 3.0], &TrussProperties::default());
        let layer = ContourLayer::new("weight", Levels::Auto(6));
        let levels = ContourPlot::resolve_levels(&layer, &grid).unwrap();
        let (lo, hi) = grid.get("weight").unwrap().finite_range().unwrap();
        assert!(!levels.is_empty());
        assert!(levels.iter().all(|&l| l >= lo && l <= hi));
    }
}
