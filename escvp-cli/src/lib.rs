//! Library half of the `escvp` binary, split out so it can be tested.

pub mod config;
pub mod monitor;
