//! `lq-cred` library crate.
//!
//! Location quotients for regional industry data, with Laplace smoothing and a
//! Bühlmann credibility adjustment. The binary (`lq`) is a thin wrapper around
//! this library so that:
//!
//! - core logic is testable without spawning processes
//! - the engine can be reused on in-memory datasets

pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod engine;
pub mod error;
pub mod io;
pub mod report;
