//! 3-sample continuity filter.
//!
//! A pick is only confirmed once both of its neighbours are valid and within
//! tolerance of it, so every confirmed coordinate is one sample old. Entries
//! keep the timestamp of the sample they came from, and a confirmed entry
//! reports that timestamp rather than the newest one. Single frame spikes
//! and sensor dropouts never reach the output.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::ContinuityConfig;

/// Number of entries inspected per push
pub const WINDOW_LEN: usize = 3;

/// One window entry, also the filter's output
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterOutput {
    pub valid: bool,
    pub x: f64,
    pub y: f64,
    /// Timestamp of the sample the entry was taken from
    #[serde(default)]
    pub timestamp_ms: u64,
}

impl FilterOutput {
    pub const INVALID: Self = Self {
        valid: false,
        x: 0.0,
        y: 0.0,
        timestamp_ms: 0,
    };

    pub fn new(valid: bool, x: f64, y: f64) -> Self {
        Self {
            valid,
            x,
            y,
            timestamp_ms: 0,
        }
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

/// Sliding window over the last three primary picks
#[derive(Debug, Clone)]
pub struct ContinuityFilter {
    window: VecDeque<FilterOutput>,
    tolerance: ContinuityConfig,
}

impl ContinuityFilter {
    pub fn new(tolerance: ContinuityConfig) -> Self {
        let mut filter = Self {
            window: VecDeque::with_capacity(WINDOW_LEN + 1),
            tolerance,
        };
        filter.reset();
        filter
    }

    pub fn tolerance(&self) -> ContinuityConfig {
        self.tolerance
    }

    /// Refill the window with invalid entries
    pub fn reset(&mut self) {
        self.window.clear();
        self.window
            .extend(std::iter::repeat(FilterOutput::INVALID).take(WINDOW_LEN));
    }

    /// Append one untimed entry, see [`ContinuityFilter::push_entry`]
    pub fn push(&mut self, valid: bool, x: f64, y: f64) -> FilterOutput {
        self.push_entry(FilterOutput::new(valid, x, y))
    }

    /// Append one entry, evict the oldest and return the middle entry
    ///
    /// The result is valid only when all three entries are valid and both
    /// neighbouring steps stay within tolerance; otherwise it is
    /// `FilterOutput::INVALID`.
    pub fn push_entry(&mut self, entry: FilterOutput) -> FilterOutput {
        self.window.push_back(entry);
        while self.window.len() > WINDOW_LEN {
            self.window.pop_front();
        }

        let (before, middle, after) = (self.window[0], self.window[1], self.window[2]);
        let confirmed = before.valid
            && middle.valid
            && after.valid
            && self.within_tolerance(&before, &middle)
            && self.within_tolerance(&middle, &after);

        if confirmed {
            middle
        } else {
            FilterOutput::INVALID
        }
    }

    fn within_tolerance(&self, a: &FilterOutput, b: &FilterOutput) -> bool {
        (b.x - a.x).abs() <= self.tolerance.dx_tolerance
            && (b.y - a.y).abs() <= self.tolerance.dy_tolerance
    }
}

impl Default for ContinuityFilter {
    fn default() -> Self {
        Self::new(ContinuityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ContinuityFilter {
        ContinuityFilter::new(ContinuityConfig {
            dx_tolerance: 2.0,
            dy_tolerance: 2.0,
        })
    }

    #[test]
    fn test_first_two_pushes_always_invalid() {
        let mut f = filter();
        assert_eq!(f.push(true, 1.0, 1.0), FilterOutput::INVALID);
        assert_eq!(f.push(true, 1.0, 1.0), FilterOutput::INVALID);
    }

    #[test]
    fn test_three_consistent_points_confirm_middle() {
        let mut f = filter();
        f.push(true, 10.0, 5.0);
        f.push(true, 11.0, 5.5);
        let out = f.push(true, 12.0, 6.0);
        assert_eq!(out, FilterOutput::new(true, 11.0, 5.5));
    }

    #[test]
    fn test_jump_on_either_side_rejects() {
        let mut f = filter();
        f.push(true, 0.0, 0.0);
        f.push(true, 1.0, 0.0);
        assert!(!f.push(true, 9.0, 0.0).valid);

        let mut f = filter();
        f.push(true, 0.0, 0.0);
        f.push(true, 0.0, 5.0);
        assert!(!f.push(true, 0.0, 5.0).valid);
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let mut f = filter();
        f.push(true, 0.0, 0.0);
        f.push(true, 2.0, -2.0);
        assert!(f.push(true, 4.0, -4.0).valid);
    }

    #[test]
    fn test_spike_is_suppressed_for_whole_window() {
        let mut f = filter();
        let picks = [0.0, 0.5, 20.0, 1.0, 1.5, 2.0];
        let valid: Vec<bool> = picks.iter().map(|x| f.push(true, *x, 0.0).valid).collect();
        // the spike poisons every window it is part of
        assert_eq!(valid, vec![false, false, false, false, false, true]);
    }

    #[test]
    fn test_dropout_invalidates_neighbours() {
        let mut f = filter();
        f.push(true, 0.0, 0.0);
        f.push(true, 0.0, 0.0);
        assert!(f.push(true, 0.0, 0.0).valid);
        assert!(!f.push(false, 0.0, 0.0).valid);
        assert!(!f.push(true, 0.0, 0.0).valid);
        assert!(!f.push(true, 0.0, 0.0).valid);
        assert!(f.push(true, 0.0, 0.0).valid);
    }

    #[test]
    fn test_reset_restores_initial_window() {
        let mut f = filter();
        for _ in 0..3 {
            f.push(true, 1.0, 1.0);
        }
        f.reset();
        assert!(!f.push(true, 1.0, 1.0).valid);
        assert!(!f.push(true, 1.0, 1.0).valid);
        assert!(f.push(true, 1.0, 1.0).valid);
    }

    #[test]
    fn test_confirmed_entry_keeps_its_timestamp() {
        let mut f = filter();
        f.push_entry(FilterOutput::new(true, 1.0, 0.0).at(100));
        f.push_entry(FilterOutput::new(true, 1.5, 0.0).at(110));
        let out = f.push_entry(FilterOutput::new(true, 2.0, 0.0).at(120));
        assert_eq!(out, FilterOutput::new(true, 1.5, 0.0).at(110));
    }

    #[test]
    fn test_nan_never_confirms() {
        let mut f = filter();
        f.push(true, 0.0, 0.0);
        f.push(true, f64::NAN, 0.0);
        assert!(!f.push(true, 0.0, 0.0).valid);
    }
}
