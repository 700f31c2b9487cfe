//! Test Module
//!
//! Cross-module test suite for the VitalChat backend.
//!
//! ## Test Categories
//! - `fixtures`: seeded in-memory store and mock actors
//! - `brain_tests`: question analysis over realistic questions
//! - `database_tests`: readings store queries
//! - `integration_tests`: full question flows through the supervisor
//! - `server_tests`: HTTP routes

pub mod integration_tests;
