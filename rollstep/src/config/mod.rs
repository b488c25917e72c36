//! Step configuration and runtime options

pub mod options;
pub mod step;
