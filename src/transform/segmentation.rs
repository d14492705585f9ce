// Geometric segmentation - the default seam transform
//
// Splits a profile into runs of neighbouring points and reports the run
// endpoints as seam candidates. Edge transitions between runs are where a
// groove or lap joint shows up in a laser profile.

use crate::error::IndexError;
use crate::profile::Point;

/// Contiguous index range `[start, end]` of one run (both inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub start: usize,
    pub end: usize,
}

#[allow(clippy::len_without_is_empty)]
impl Run {
    /// Number of points in the run (never zero)
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Group consecutive points into runs
///
/// Neighbours stay in one run while `|Δx| <= dx_max` and `|Δy| <= dy_max`;
/// any violation starts a new run. Runs shorter than `min_run_len` are
/// dropped. Single pass, O(n).
///
/// `xs` and `ys` must have equal length; extra values on either side are
/// ignored.
pub fn segment(xs: &[f64], ys: &[f64], dx_max: f64, dy_max: f64, min_run_len: usize) -> Vec<Run> {
    let n = xs.len().min(ys.len());
    let mut runs = Vec::new();
    if n == 0 {
        return runs;
    }

    let mut start = 0;
    for i in 1..n {
        let dx = (xs[i] - xs[i - 1]).abs();
        let dy = (ys[i] - ys[i - 1]).abs();
        // NaN deltas fail both comparisons and break the run
        let connected = dx <= dx_max && dy <= dy_max;
        if !connected {
            push_run(&mut runs, start, i - 1, min_run_len);
            start = i;
        }
    }
    push_run(&mut runs, start, n - 1, min_run_len);

    runs
}

fn push_run(runs: &mut Vec<Run>, start: usize, end: usize, min_run_len: usize) {
    let run = Run { start, end };
    if run.len() >= min_run_len {
        runs.push(run);
    }
}

/// First and last point of every run, in profile order
///
/// A single-point run contributes that point once.
pub fn run_endpoints(points: &[Point], runs: &[Run]) -> Vec<Point> {
    let mut candidates = Vec::with_capacity(runs.len() * 2);
    for run in runs {
        candidates.push(points[run.start]);
        if run.end != run.start {
            candidates.push(points[run.end]);
        }
    }
    candidates
}

/// Candidate at `index`, or `IndexError` when `index >= candidates.len()`
pub fn pick(candidates: &[Point], index: usize) -> Result<Point, IndexError> {
    candidates.get(index).copied().ok_or(IndexError {
        index,
        len: candidates.len(),
    })
}

/// Segment a point list and return the run endpoints
pub fn segment_points(points: &[Point], dx_max: f64, dy_max: f64, min_run_len: usize) -> Vec<Point> {
    let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
    let runs = segment(&xs, &ys, dx_max, dy_max, min_run_len);
    run_endpoints(points, &runs)
}
