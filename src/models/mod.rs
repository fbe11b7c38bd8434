//! Core data models for promptgate.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Concrete types with compile-time guarantees
//! - B_i (Beliefs): Wrapped in Result/Option
//! - I^R (Resolvable): Config parameters
//! - I^B (Bounded): Error variants with retry classification

mod call;
mod config;
mod error;

pub use call::*;
pub use config::*;
pub use error::*;
