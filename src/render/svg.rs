use super::contour::{iso_segments, nice_levels};
use super::{ContourPlot, ContourRenderer, RenderError};
use crate::grid::GridFields;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Colors for layers that do not name one, cycled by level.
const PALETTE: [&str; 8] = [
    "#440154", "#46327e", "#365c8d", "#277f8e", "#1fa187", "#4ac16d", "#a0da39", "#fde725",
];

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 55.0;

/// Writes contour plots as standalone SVG documents.
#[derive(Clone, Debug)]
pub struct SvgRenderer {
    pub width: f64,
    pub height: f64,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 480.0,
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn format_level(value: f64) -> String {
    let text = format!("{value:.4}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" { "0".into() } else { text.into() }
}

/// Maps data coordinates into the plot frame.
struct Frame {
    x: (f64, f64),
    y: (f64, f64),
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl Frame {
    fn px(&self, x: f64) -> f64 {
        let span = self.x.1 - self.x.0;
        if span == 0.0 {
            return (self.left + self.right) / 2.0;
        }
        self.left + (x - self.x.0) / span * (self.right - self.left)
    }

    fn py(&self, y: f64) -> f64 {
        let span = self.y.1 - self.y.0;
        if span == 0.0 {
            return (self.top + self.bottom) / 2.0;
        }
        self.bottom - (y - self.y.0) / span * (self.bottom - self.top)
    }
}

fn axis_extent(values: &[f64]) -> (f64, f64) {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo.is_finite() && hi.is_finite() { (lo, hi) } else { (0.0, 1.0) }
}

impl SvgRenderer {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Render to an SVG string without touching the filesystem.
    pub fn render_to_string(&self, plot: &ContourPlot, grid: &GridFields) -> Result<String, RenderError> {
        plot.validate(grid)?;

        let (width, height) = (self.width, self.height);
        let frame = Frame {
            x: axis_extent(&grid.x_values),
            y: axis_extent(&grid.y_values),
            left: MARGIN_LEFT,
            right: width - MARGIN_RIGHT,
            top: MARGIN_TOP,
            bottom: height - MARGIN_BOTTOM,
        };

        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
             viewBox=\"0 0 {width} {height}\" style=\"background:#ffffff\">\n\
             <text x=\"{:.1}\" y=\"24\" font-family=\"sans-serif\" font-size=\"16\" \
             text-anchor=\"middle\">{}</text>\n",
            width / 2.0,
            escape(&plot.title)
        );

        self.write_axes(&mut svg, plot, &frame);

        for layer in &plot.layers {
            let levels = ContourPlot::resolve_levels(layer, grid)?;
            let field = grid
                .get(&layer.field)
                .ok_or_else(|| RenderError::UnknownField(layer.field.clone()))?;

            let _ = writeln!(svg, "  <g class=\"{}\">", escape(&layer.field));
            for (i, &level) in levels.iter().enumerate() {
                let segments = iso_segments(field, &grid.x_values, &grid.y_values, level);
                if segments.is_empty() {
                    continue;
                }
                let color = layer
                    .color
                    .as_deref()
                    .unwrap_or(PALETTE[i % PALETTE.len()]);

                let mut d = String::new();
                for s in &segments {
                    let _ = write!(
                        d,
                        "M{:.2} {:.2}L{:.2} {:.2}",
                        frame.px(s.start.0),
                        frame.py(s.start.1),
                        frame.px(s.end.0),
                        frame.py(s.end.1)
                    );
                }
                let _ = writeln!(
                    svg,
                    "    <path d=\"{d}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\" \
                     stroke-linecap=\"round\"/>",
                    escape(color),
                    layer.line_width(i)
                );

                if layer.label {
                    let longest = segments
                        .iter()
                        .max_by(|a, b| a.length().total_cmp(&b.length()))
                        .map(|s| s.midpoint());
                    if let Some((x, y)) = longest {
                        let _ = writeln!(
                            svg,
                            "    <text x=\"{:.2}\" y=\"{:.2}\" font-family=\"sans-serif\" \
                             font-size=\"10\" fill=\"{}\" stroke=\"#ffffff\" stroke-width=\"3\" \
                             paint-order=\"stroke\" text-anchor=\"middle\">{}</text>",
                            frame.px(x),
                            frame.py(y),
                            escape(color),
                            format_level(level)
                        );
                    }
                }
            }
            svg.push_str("  </g>\n");
        }

        svg.push_str("</svg>\n");
        Ok(svg)
    }

    fn write_axes(&self, svg: &mut String, plot: &ContourPlot, frame: &Frame) {
        let _ = writeln!(
            svg,
            "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" stroke=\"#333333\"/>",
            frame.left,
            frame.top,
            frame.right - frame.left,
            frame.bottom - frame.top
        );

        for tick in nice_levels(frame.x.0, frame.x.1, 6) {
            let x = frame.px(tick);
            let _ = writeln!(
                svg,
                "  <line x1=\"{x:.2}\" y1=\"{:.1}\" x2=\"{x:.2}\" y2=\"{:.1}\" stroke=\"#333333\"/>\n\
                 \x20 <text x=\"{x:.2}\" y=\"{:.1}\" font-family=\"sans-serif\" font-size=\"11\" \
                 text-anchor=\"middle\">{}</text>",
                frame.bottom,
                frame.bottom + 5.0,
                frame.bottom + 18.0,
                format_level(tick)
            );
        }
        for tick in nice_levels(frame.y.0, frame.y.1, 6) {
            let y = frame.py(tick);
            let _ = writeln!(
                svg,
                "  <line x1=\"{:.1}\" y1=\"{y:.2}\" x2=\"{:.1}\" y2=\"{y:.2}\" stroke=\"#333333\"/>\n\
                 \x20 <text x=\"{:.1}\" y=\"{:.2}\" font-family=\"sans-serif\" font-size=\"11\" \
                 text-anchor=\"end\">{}</text>",
                frame.left - 5.0,
                frame.left,
                frame.left - 8.0,
                y + 4.0,
                format_level(tick)
            );
        }

        let _ = writeln!(
            svg,
            "  <text x=\"{:.1}\" y=\"{:.1}\" font-family=\"sans-serif\" font-size=\"13\" \
             text-anchor=\"middle\">{}</text>",
            (frame.left + frame.right) / 2.0,
            self.height - 15.0,
            escape(&plot.x_label)
        );
        let mid_y = (frame.top + frame.bottom) / 2.0;
        let _ = writeln!(
            svg,
            "  <text x=\"18\" y=\"{mid_y:.1}\" font-family=\"sans-serif\" font-size=\"13\" \
             text-anchor=\"middle\" transform=\"rotate(-90 18 {mid_y:.1})\">{}</text>",
            escape(&plot.y_label)
        );
    }
}

impl ContourRenderer for SvgRenderer {
    fn render(&self, plot: &ContourPlot, grid: &GridFields, path: &Path) -> Result<(), RenderError> {
        let svg = self.render_to_string(plot, grid)?;
        fs::write(path, svg)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equations::TrussProperties;
    use crate::grid::{arange, evaluate_grid};
    use crate::render::{ContourLayer, Levels, overview_plot};

    fn truss_grid() -> GridFields {
        evaluate_grid(
            &arange(10.0, 30.0, 2.0),
            &arange(1.0, 3.0, 0.3),
            &TrussProperties::default(),
        )
    }

    #[test]
    fn renders_title_labels_and_limit_lines() {
        let svg = SvgRenderer::default()
            .render_to_string(&overview_plot(100.0, 0.25), &truss_grid())
            .unwrap();

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains("Two Bar Optimization Problem"));
        assert!(svg.contains(">Height</text>"));
        assert!(svg.contains(">Diameter</text>"));
        assert!(svg.contains("stroke=\"red\" stroke-width=\"4\""));
        assert!(svg.contains("stroke=\"blue\" stroke-width=\"4\""));
    }

    #[test]
    fn unknown_field_is_an_error() {
        let mut plot = overview_plot(100.0, 0.25);
        plot.layers = vec![ContourLayer::new("torque", Levels::Auto(4))];
        let err = SvgRenderer::default()
            .render_to_string(&plot, &truss_grid())
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownField(_)));
    }

    #[test]
    fn level_formatting_is_compact() {
        assert_eq!(format_level(100.0), "100");
        assert_eq!(format_level(0.22), "0.22");
        assert_eq!(format_level(0.30000000000000004), "0.3");
        assert_eq!(format_level(-0.0), "0");
        assert_eq!(escape("a<b & c"), "a&lt;b &amp; c");
    }

    #[test]
    fn writes_file() {
        let path = std::env::temp_dir().join(format!("twobar-svg-{}.svg", std::process::id()));
        SvgRenderer::default()
            .render(&overview_plot(100.0, 0.25), &truss_grid(), &path)
            .unwrap();
        let written = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(written.contains("<path"));
    }
}
