//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - typed keys (`RegionId`, `IndustryCode`) and the `Dataset` of counts
//! - engine outputs (`LocationQuotient`, `LqRow`, aggregates)
//! - run configuration (`EngineConfig`, `Smoothing`, `UndefinedPolicy`)

pub mod types;

pub use types::*;
