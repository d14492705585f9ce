// SeamPipeline - one cycle per arriving profile sample
//
// Flow per sample:
// 1. malformed sample → reported like a transform failure, counted as dropout
//    empty sample → invalid output, transform and filter untouched
// 2. active transform → candidates (errors and "nothing found" are dropouts)
// 3. primary pick → continuity filter
// 4. confirmed pick + offset → `Seam` point, other candidates → `Candidate`
//
// A confirmed output carries the timestamp of the sample its pick came from,
// one cycle behind the newest sample. Its candidates and echoed profile
// belong to the newest sample.
//
// The only state carried between cycles is the filter window and the message
// of the last reported transform failure.

use std::time::Instant;

use crate::config::{ContinuityConfig, OffsetConfig};
use crate::error::{log_transform_error, ErrorCode, TransformError};
use crate::filter::{ContinuityFilter, FilterOutput};
use crate::profile::{Point, ProfileSample};
use crate::telemetry::TelemetryCollector;
use crate::transform::SeamTransform;

use super::output::{PointKind, SeamOutput, TaggedPoint};

/// Per-sample orchestrator owning the continuity window
#[derive(Debug, Clone)]
pub struct SeamPipeline {
    filter: ContinuityFilter,
    last_error: Option<String>,
    echo_profile: bool,
}

impl SeamPipeline {
    pub fn new(continuity: ContinuityConfig, echo_profile: bool) -> Self {
        Self {
            filter: ContinuityFilter::new(continuity),
            last_error: None,
            echo_profile,
        }
    }

    /// Message of the last reported transform failure, if it is still current
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Forget the continuity history, e.g. after switching tasks
    pub fn reset(&mut self) {
        self.filter.reset();
        self.last_error = None;
    }

    /// Process one sample
    ///
    /// `offsets` is the snapshot taken for this cycle. Telemetry, when given,
    /// receives the cycle latency and each distinct transform failure.
    pub fn process(
        &mut self,
        sample: &ProfileSample,
        transform: &dyn SeamTransform,
        offsets: OffsetConfig,
        telemetry: Option<&TelemetryCollector>,
    ) -> SeamOutput {
        let started = Instant::now();
        let output = self.run_cycle(sample, transform, offsets, telemetry);

        if let Some(telemetry) = telemetry {
            telemetry.record_cycle(started.elapsed(), output.valid);
        }
        output
    }

    fn run_cycle(
        &mut self,
        sample: &ProfileSample,
        transform: &dyn SeamTransform,
        offsets: OffsetConfig,
        telemetry: Option<&TelemetryCollector>,
    ) -> SeamOutput {
        // Length mismatches are checked before emptiness: x=[] with y=[1]
        // is malformed, not empty
        if let Err(err) = sample.validate() {
            self.report_failure(&err, telemetry);
            self.filter
                .push_entry(FilterOutput::INVALID.at(sample.timestamp_ms));
            return SeamOutput::invalid(sample.timestamp_ms);
        }
        if sample.is_empty() {
            return SeamOutput::invalid(sample.timestamp_ms);
        }

        let candidates = match transform.transform(sample) {
            Ok(candidates) => {
                self.last_error = None;
                candidates
            }
            Err(err) => {
                self.report_failure(&err, telemetry);
                Vec::new()
            }
        };

        let Some(primary) = candidates.first().copied() else {
            self.filter
                .push_entry(FilterOutput::INVALID.at(sample.timestamp_ms));
            return self.invalid_output(sample);
        };

        let confirmed = self
            .filter
            .push_entry(FilterOutput::new(true, primary.x, primary.y).at(sample.timestamp_ms));
        if !confirmed.valid {
            return self.invalid_output(sample);
        }

        let seam = Point::new(confirmed.x + offsets.x, confirmed.y + offsets.y);
        let mut points = Vec::with_capacity(candidates.len() + sample.len());
        points.push(TaggedPoint::new(seam, PointKind::Seam));
        points.extend(
            candidates[1..]
                .iter()
                .map(|p| TaggedPoint::new(*p, PointKind::Candidate)),
        );

        let output = SeamOutput {
            valid: true,
            x: seam.x,
            y: seam.y,
            timestamp_ms: confirmed.timestamp_ms,
            points,
        };
        if self.echo_profile {
            output.with_echo(sample)
        } else {
            output
        }
    }

    /// Log and publish a failure unless it repeats the last one
    fn report_failure(&mut self, err: &TransformError, telemetry: Option<&TelemetryCollector>) {
        let message = err.message();
        if self.last_error.as_deref() == Some(message.as_str()) {
            return;
        }
        log_transform_error(err, "SeamPipeline::process");
        if let Some(telemetry) = telemetry {
            telemetry.record_transform_failure(message.clone());
        }
        self.last_error = Some(message);
    }

    fn invalid_output(&self, sample: &ProfileSample) -> SeamOutput {
        let output = SeamOutput::invalid(sample.timestamp_ms);
        if self.echo_profile {
            output.with_echo(sample)
        } else {
            output
        }
    }
}

impl Default for SeamPipeline {
    fn default() -> Self {
        Self::new(ContinuityConfig::default(), true)
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
