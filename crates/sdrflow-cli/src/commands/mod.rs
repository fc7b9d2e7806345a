//! CLI command implementations.

pub mod common;
pub mod parse;
pub mod run;
pub mod schema;
