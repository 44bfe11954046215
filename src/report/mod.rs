//! Reporting utilities: rankings and formatted terminal output.

pub mod format;

pub use format::*;
