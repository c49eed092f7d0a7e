//! Synthesizes OpenAPI 3.0.3 documents from observed HTTP traffic.
//!
//! - [`analyzer`] templates request paths, groups them into resources and
//!   computes traffic statistics.
//! - [`synth`] turns observations into a [`models::SpecificationDocument`]
//!   and serializes it to JSON or YAML.
//! - [`web`] exposes both over HTTP.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod models;
pub mod synth;
pub mod web;

pub use analyzer::{analyze, infer_parameter_types, template_path};
pub use config::SynthesisOptions;
pub use error::{ApiscopeError, Result};
pub use models::{Observation, SpecificationDocument};
pub use synth::synthesize;
