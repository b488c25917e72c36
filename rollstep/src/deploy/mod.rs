//! Rolling update pipeline

pub mod credentials;
pub mod executor;
pub mod fsm;
pub mod kubeconfig;
pub mod kubectl;
