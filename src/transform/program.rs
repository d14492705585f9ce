//! Transform programs - the operator-editable body of a task.
//!
//! A body is a short line-oriented script. Each line names one stage and its
//! `key=value` parameters; `#` starts a comment:
//!
//! ```text
//! # groove on the second plate edge
//! roi x_min=-20 x_max=20
//! segment dx_max=0.4 dy_max=0.4 min_len=30
//! pick 2
//! ```
//!
//! Stages run in order over a point list seeded with the profile. Once the
//! list is empty the remaining stages are skipped: "no detection" is a normal
//! outcome, not a failure.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::SegmentationConfig;
use crate::error::{ProgramError, TransformError};
use crate::profile::{Point, ProfileSample};

use super::segmentation::{pick, segment_points};

/// Body given to newly appended tasks: yields no candidates until edited
pub const DEFAULT_TRANSFORM_BODY: &str = "none";

/// One compiled step of a transform program
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Replace the points with the endpoints of their contiguous runs
    Segment {
        dx_max: f64,
        dy_max: f64,
        min_len: usize,
    },
    /// Keep points inside the (optionally open) window
    Roi {
        x_min: Option<f64>,
        x_max: Option<f64>,
        y_min: Option<f64>,
        y_max: Option<f64>,
    },
    /// Keep only the point at `index`
    Pick { index: usize },
    /// Keep only the point with the smallest y
    Lowest,
    /// Keep only the point with the largest y
    Highest,
    /// Drop everything
    Nothing,
}

impl Stage {
    fn apply(&self, points: Vec<Point>) -> Result<Vec<Point>, TransformError> {
        match self {
            Stage::Segment {
                dx_max,
                dy_max,
                min_len,
            } => Ok(segment_points(&points, *dx_max, *dy_max, *min_len)),
            Stage::Roi {
                x_min,
                x_max,
                y_min,
                y_max,
            } => Ok(points
                .into_iter()
                .filter(|p| {
                    x_min.map_or(true, |v| p.x >= v)
                        && x_max.map_or(true, |v| p.x <= v)
                        && y_min.map_or(true, |v| p.y >= v)
                        && y_max.map_or(true, |v| p.y <= v)
                })
                .collect()),
            Stage::Pick { index } => Ok(vec![pick(&points, *index)?]),
            Stage::Lowest => Ok(points
                .into_iter()
                .min_by(|a, b| a.y.total_cmp(&b.y))
                .into_iter()
                .collect()),
            Stage::Highest => Ok(points
                .into_iter()
                .max_by(|a, b| a.y.total_cmp(&b.y))
                .into_iter()
                .collect()),
            Stage::Nothing => Ok(Vec::new()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Segment {
                dx_max,
                dy_max,
                min_len,
            } => write!(
                f,
                "segment dx_max={} dy_max={} min_len={}",
                dx_max, dy_max, min_len
            ),
            Stage::Roi {
                x_min,
                x_max,
                y_min,
                y_max,
            } => {
                f.write_str("roi")?;
                for (key, value) in [
                    ("x_min", x_min),
                    ("x_max", x_max),
                    ("y_min", y_min),
                    ("y_max", y_max),
                ] {
                    if let Some(value) = value {
                        write!(f, " {}={}", key, value)?;
                    }
                }
                Ok(())
            }
            Stage::Pick { index } => write!(f, "pick {}", index),
            Stage::Lowest => f.write_str("lowest"),
            Stage::Highest => f.write_str("highest"),
            Stage::Nothing => f.write_str("none"),
        }
    }
}

/// A compiled transform body
#[derive(Debug, Clone, PartialEq)]
pub struct TransformProgram {
    stages: Vec<Stage>,
}

impl TransformProgram {
    /// Compile a body, filling omitted `segment` parameters from `defaults`
    pub fn compile(body: &str, defaults: &SegmentationConfig) -> Result<Self, ProgramError> {
        let mut stages = Vec::new();

        for (idx, raw_line) in body.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let name = tokens.next().unwrap_or_default();
            let mut params = Params::parse(line_no, tokens)?;
            let stage = match name {
                "segment" => compile_segment(&mut params, defaults)?,
                "roi" => compile_roi(&mut params)?,
                "pick" => Stage::Pick {
                    index: params.take_index()?,
                },
                "lowest" => Stage::Lowest,
                "highest" => Stage::Highest,
                "none" => Stage::Nothing,
                other => {
                    return Err(ProgramError::new(
                        line_no,
                        format!("unknown stage '{}'", other),
                    ))
                }
            };
            params.finish()?;
            stages.push(stage);
        }

        if stages.is_empty() {
            return Err(ProgramError::new(0, "empty transform body"));
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run the program against one sample
    ///
    /// The budget is checked before every stage and once at the end; a run
    /// that reaches it fails with `TransformError::Timeout`.
    pub fn run(
        &self,
        sample: &ProfileSample,
        budget: Option<Duration>,
    ) -> Result<Vec<Point>, TransformError> {
        let started = Instant::now();
        sample.validate()?;

        let mut points = sample.points();
        for stage in &self.stages {
            if points.is_empty() {
                break;
            }
            check_budget(started, budget)?;
            points = stage.apply(points)?;
        }
        check_budget(started, budget)?;

        Ok(points)
    }

    /// Dry-run the program before it is allowed to become active
    ///
    /// The empty profile must run cleanly. Each synthetic profile must either
    /// succeed or miss an index; a program that misses on every one of them
    /// cannot produce a coordinate on a realistic scan and is rejected too.
    pub fn self_test(&self, budget: Option<Duration>) -> Result<(), TransformError> {
        self.run(&ProfileSample::empty(), budget)?;

        let mut ran_clean = false;
        let mut last_miss = None;
        for profile in self_test_profiles() {
            match self.run(&profile, budget) {
                Ok(_) => ran_clean = true,
                Err(TransformError::Index(err)) => last_miss = Some(err),
                Err(err) => return Err(err),
            }
        }

        match last_miss {
            Some(err) if !ran_clean => Err(TransformError::Index(err)),
            _ => Ok(()),
        }
    }
}

const SELF_TEST_STEP: f64 = 0.1;

/// Flat plate, two plates with a height step, and a V-groove, all 30 wide
fn self_test_profiles() -> [ProfileSample; 3] {
    let span = |from: f64, count: usize| -> Vec<f64> {
        (0..count).map(|i| from + SELF_TEST_STEP * i as f64).collect()
    };

    let flat_x = span(-15.0, 301);
    let flat = ProfileSample::new(flat_x.clone(), vec![0.0; flat_x.len()]);

    let mut step_x = span(-15.0, 121);
    step_x.extend(span(3.0, 121));
    let step_y = step_x
        .iter()
        .map(|&x| if x < 0.0 { 0.0 } else { 2.0 })
        .collect();
    let step = ProfileSample::new(step_x, step_y);

    let groove_y = flat_x.iter().map(|x| 0.5 * x.abs()).collect();
    let groove = ProfileSample::new(flat_x, groove_y);

    [flat, step, groove]
}

impl fmt::Display for TransformProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", stage)?;
        }
        Ok(())
    }
}

fn check_budget(started: Instant, budget: Option<Duration>) -> Result<(), TransformError> {
    let Some(budget) = budget else {
        return Ok(());
    };
    let elapsed = started.elapsed();
    if elapsed >= budget {
        return Err(TransformError::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
            budget_ms: budget.as_millis() as u64,
        });
    }
    Ok(())
}

fn compile_segment(
    params: &mut Params,
    defaults: &SegmentationConfig,
) -> Result<Stage, ProgramError> {
    let dx_max = params.take_f64("dx_max")?.unwrap_or(defaults.dx_max);
    let dy_max = params.take_f64("dy_max")?.unwrap_or(defaults.dy_max);
    let min_len = params.take_usize("min_len")?.unwrap_or(defaults.min_run_len);

    if dx_max < 0.0 || dy_max < 0.0 {
        return Err(params.error("segment tolerances must not be negative"));
    }
    if min_len == 0 {
        return Err(params.error("min_len must be at least 1"));
    }

    Ok(Stage::Segment {
        dx_max,
        dy_max,
        min_len,
    })
}

fn compile_roi(params: &mut Params) -> Result<Stage, ProgramError> {
    let x_min = params.take_f64("x_min")?;
    let x_max = params.take_f64("x_max")?;
    let y_min = params.take_f64("y_min")?;
    let y_max = params.take_f64("y_max")?;

    for (lo, hi, axis) in [(x_min, x_max, "x"), (y_min, y_max, "y")] {
        if let (Some(lo), Some(hi)) = (lo, hi) {
            if lo > hi {
                return Err(params.error(format!("{}_min is greater than {}_max", axis, axis)));
            }
        }
    }

    Ok(Stage::Roi {
        x_min,
        x_max,
        y_min,
        y_max,
    })
}

/// Parameters of one stage line, consumed as the stage is compiled
struct Params {
    line: usize,
    named: Vec<(String, String)>,
    positional: Vec<String>,
}

impl Params {
    fn parse<'a>(
        line: usize,
        tokens: impl Iterator<Item = &'a str>,
    ) -> Result<Self, ProgramError> {
        let mut named = Vec::new();
        let mut positional = Vec::new();
        let mut seen = HashSet::new();

        for token in tokens {
            match token.split_once('=') {
                Some((key, value)) => {
                    if key.is_empty() || value.is_empty() {
                        return Err(ProgramError::new(
                            line,
                            format!("malformed parameter '{}'", token),
                        ));
                    }
                    if !seen.insert(key.to_string()) {
                        return Err(ProgramError::new(
                            line,
                            format!("duplicate parameter '{}'", key),
                        ));
                    }
                    named.push((key.to_string(), value.to_string()));
                }
                None => positional.push(token.to_string()),
            }
        }

        Ok(Self {
            line,
            named,
            positional,
        })
    }

    fn error(&self, reason: impl Into<String>) -> ProgramError {
        ProgramError::new(self.line, reason)
    }

    fn take(&mut self, key: &str) -> Option<String> {
        let pos = self.named.iter().position(|(k, _)| k == key)?;
        Some(self.named.remove(pos).1)
    }

    fn take_f64(&mut self, key: &str) -> Result<Option<f64>, ProgramError> {
        match self.take(key) {
            None => Ok(None),
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(Some(value)),
                _ => Err(self.error(format!("{} expects a finite number, got '{}'", key, raw))),
            },
        }
    }

    fn take_usize(&mut self, key: &str) -> Result<Option<usize>, ProgramError> {
        match self.take(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<usize>().map(Some).map_err(|_| {
                self.error(format!(
                    "{} expects a non-negative integer, got '{}'",
                    key, raw
                ))
            }),
        }
    }

    /// `pick 2` and `pick index=2` are equivalent
    fn take_index(&mut self) -> Result<usize, ProgramError> {
        let named = self.take_usize("index")?;
        let positional = match self.positional.len() {
            0 => None,
            1 => {
                let raw = self.positional.remove(0);
                Some(raw.parse::<usize>().map_err(|_| {
                    self.error(format!(
                        "pick expects a non-negative integer, got '{}'",
                        raw
                    ))
                })?)
            }
            _ => return Err(self.error("pick takes a single index")),
        };

        match (named, positional) {
            (Some(_), Some(_)) => Err(self.error("pick index given twice")),
            (Some(index), None) | (None, Some(index)) => Ok(index),
            (None, None) => Err(self.error("pick requires an index")),
        }
    }

    /// Reject anything the stage did not consume
    fn finish(self) -> Result<(), ProgramError> {
        if let Some((key, _)) = self.named.first() {
            return Err(self.error(format!("unknown parameter '{}'", key)));
        }
        if let Some(token) = self.positional.first() {
            return Err(self.error(format!("unexpected argument '{}'", token)));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "program_tests.rs"]
mod tests;
