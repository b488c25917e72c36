//! Data models shared by the pipeline stages

pub mod target;
pub mod version;
