//! # Brain Module
//!
//! Question analysis for VitalChat. Runs before any handler touches the
//! store or the LLM.
//!
//! ## Components
//! - `slots`: pure slot extractors (metric, name, window, condition)
//! - `korean`: particle selection
//! - `intent`: ordered rule cascade (fast path)
//! - `fallback`: LLM classification when the rules are ambiguous
//! - `context_packet`: output data structure
//! - `analyzer`: main entry point

pub mod analyzer;
pub mod context_packet;
pub mod fallback;
pub mod intent;
pub mod korean;
pub mod slots;

pub use analyzer::BrainAnalyzer;
pub use intent::Intent;
