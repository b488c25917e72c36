//! Secret store binding

pub mod keyvault;
pub mod store;
