#![forbid(unsafe_code)]
//! lazyflow-dsl: linear YAML jobs over JSON records.
//!
//! A job is a list of steps plus one terminal; `lower` turns it into a
//! `Pipeline<serde_json::Value>` and runs the terminal. Filter expressions use
//! a `field OP literal` mini-language (see `predicate`).

pub mod error;
pub mod input;
pub mod job;
pub mod lower;
pub mod predicate;
pub mod value;

pub use error::{DslError, Result};
pub use job::{parse_job, Job, Step, Terminal};
pub use lower::{build_pipeline, explain_job, run_job};
pub use predicate::Predicate;
