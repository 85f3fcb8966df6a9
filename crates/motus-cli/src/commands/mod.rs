//! CLI command implementations.

pub mod check;
pub mod common;
pub mod patches;
pub mod run;
pub mod templates;
