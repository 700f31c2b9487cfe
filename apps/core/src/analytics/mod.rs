//! Computations over stored readings: windows, condition queries, cohort
//! stability, and descriptive statistics.

pub mod cohort;
pub mod condition;
pub mod stats;
pub mod summary;
pub mod window;
