//! Azure identity and control plane clients

pub mod connector;
pub mod container_service;
pub mod credentials;
pub mod token;
