// Filter module - temporal validation of the primary pick

pub mod continuity;

pub use continuity::{ContinuityFilter, FilterOutput, WINDOW_LEN};
