//! Configuration for sdrflow pipelines.
//!
//! This crate loads engine options and the control-parameter schema from TOML,
//! and turns client query strings into typed control updates for the engine.
//!
//! # Features
//!
//! - **Flow files**: [`FlowConfig`] with an `[engine]` section and a
//!   `[controls]` schema, loaded and saved as TOML
//! - **Control schema**: [`ControlSchema`] names each control's kind and
//!   optional numeric range
//! - **Query parsing**: `freq=103500000&mono=1` → [`ControlUpdates`](sdrflow_core::ControlUpdates)
//! - **Validators**: clamping closures derived from schema ranges, ready for
//!   [`Graph::bind`](sdrflow_core::Graph::bind)
//!
//! # Example
//!
//! ```rust,no_run
//! use sdrflow_config::FlowConfig;
//! use sdrflow_core::Graph;
//!
//! let config = FlowConfig::load("flow.toml").unwrap();
//! let mut graph = Graph::with_options(config.engine.graph_options());
//!
//! let updates = config.controls.parse_query("freq=103500000&mono=1").unwrap();
//! graph.post_updates(&updates).unwrap();
//! ```

mod error;
mod flow;
mod schema;

pub use error::ConfigError;
pub use flow::{EngineConfig, FlowConfig};
pub use schema::{ControlSchema, ControlSpec, RangeBound};
