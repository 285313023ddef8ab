//! Shared test fixtures for treewalk crates.
//!
//! This crate provides synthetic particle tables, trees, and payload types
//! for exercising `treewalk-engine` without a production particle store or
//! tree builder. It does NOT depend on `treewalk-engine`, to avoid circular
//! dev-dependencies.
//!
//! - [`fixtures`] - `FlatParticleTable`, `SingleLeafTree`, `TestQuery`,
//!   `TestResult`, and a brute-force neighbour-count reference
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! treewalk-test = { workspace = true }
//! ```
//!
//! Then import the fixtures you need:
//!
//! ```ignore
//! use treewalk_test::fixtures::{FlatParticleTable, SingleLeafTree, TestQuery, TestResult};
//! ```

pub mod fixtures;
