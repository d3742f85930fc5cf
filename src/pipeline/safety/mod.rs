#[cfg(test)]
mod phi_audit;
pub mod sanitize;

pub use sanitize::*;
