use crate::grid::GridField;

/// One straight piece of an iso-line, in data coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: (f64, f64),
    pub end: (f64, f64),
}

impl Segment {
    pub fn length(&self) -> f64 {
        (self.end.0 - self.start.0).hypot(self.end.1 - self.start.1)
    }

    pub fn midpoint(&self) -> (f64, f64) {
        (
            (self.start.0 + self.end.0) / 2.0,
            (self.start.1 + self.end.1) / 2.0,
        )
    }
}

fn crossing(a: (f64, f64, f64), b: (f64, f64, f64), level: f64) -> Option<(f64, f64)> {
    let (ax, ay, av) = a;
    let (bx, by, bv) = b;
    if (av >= level) == (bv >= level) {
        return None;
    }
    let t = (level - av) / (bv - av);
    Some((ax + t * (bx - ax), ay + t * (by - ay)))
}

/// Marching squares over `field` sampled at `x_values` (columns) and `y_values` (rows).
///
/// Cells with any non-finite corner produce nothing. Saddle cells are
/// resolved by the value at the cell centre.
pub fn iso_segments(field: &GridField, x_values: &[f64], y_values: &[f64], level: f64) -> Vec<Segment> {
    let (rows, cols) = field.shape();
    let mut segments = Vec::new();
    if !level.is_finite() || rows < 2 || cols < 2 {
        return segments;
    }

    for r in 0..rows - 1 {
        for c in 0..cols - 1 {
            let corner = |rr: usize, cc: usize| {
                let v = field.get(rr, cc).unwrap_or(f64::NAN);
                (x_values[cc], y_values[rr], v)
            };
            let p00 = corner(r, c);
            let p01 = corner(r, c + 1);
            let p11 = corner(r + 1, c + 1);
            let p10 = corner(r + 1, c);
            if [p00.2, p01.2, p11.2, p10.2].iter().any(|v| !v.is_finite()) {
                continue;
            }

            // Edge order: bottom, right, top, left
            let edges = [
                crossing(p00, p01, level),
                crossing(p01, p11, level),
                crossing(p11, p10, level),
                crossing(p10, p00, level),
            ];
            let hits: Vec<(usize, (f64, f64))> = edges
                .iter()
                .enumerate()
                .filter_map(|(i, e)| e.map(|p| (i, p)))
                .collect();

            match hits.as_slice() {
                [(_, a), (_, b)] => segments.push(Segment { start: *a, end: *b }),
                [(_, bottom), (_, right), (_, top), (_, left)] => {
                    let centre = (p00.2 + p01.2 + p11.2 + p10.2) / 4.0;
                    if (centre >= level) == (p00.2 >= level) {
                        segments.push(Segment { start: *bottom, end: *right });
                        segments.push(Segment { start: *top, end: *left });
                    } else {
                        segments.push(Segment { start: *left, end: *bottom });
                        segments.push(Segment { start: *right, end: *top });
                    }
                }
                _ => {}
            }
        }
    }

    segments
}

/// 1, 2, 2.5 or 5 times a power of ten, nearest above `raw`.
fn nice_step(raw: f64) -> f64 {
    let magnitude = 10f64.powf(raw.log10().floor());
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 2.5 {
        2.5
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Round-numbered levels spanning `[lo, hi]`, about `target` of them.
pub fn nice_levels(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    if !lo.is_finite() || !hi.is_finite() || hi < lo {
        return Vec::new();
    }
    if hi == lo {
        return vec![lo];
    }
    let step = nice_step((hi - lo) / target.max(1) as f64);
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}
