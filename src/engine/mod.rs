//! Location-quotient engine.
//!
//! Responsibilities:
//!
//! - precompute region / industry / national totals
//! - raw and smoothed location quotients, stability
//! - credibility statistics (EPV, VHM, k, Z) and the blended quotient

pub mod aggregate;
pub mod credibility;
pub mod lq;
pub mod run;

pub use aggregate::*;
pub use credibility::*;
pub use lq::*;
pub use run::*;
