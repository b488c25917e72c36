//! HTTP plumbing for the Azure endpoints

pub mod client;
