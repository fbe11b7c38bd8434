//! Pool module - worker dispatch over the gateway.

mod worker;

pub use worker::*;
