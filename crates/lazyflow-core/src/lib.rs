#![forbid(unsafe_code)]
//! lazyflow-core: shared vocabulary for the lazyflow engine.
//!
//! - `stage`: the four-hook protocol (`initialize`/`consume`/`finalize`/`cancelled`)
//!   that every fused operator implements, and the `Setup` record passed at start.
//! - `source`: forward-only cursors plus a length hint.
//! - `field`: dotted paths into `serde_json::Value` records.
//! - `config`/`error`: engine-wide configuration and the error taxonomy.
//!
//! No threads or pools live here; see `lazyflow-operators`.

pub mod config;
pub mod error;
pub mod field;
pub mod hint;
pub mod prelude;
pub mod source;
pub mod stage;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use hint::LengthHint;
pub use stage::{AbortSignal, ExecMode, Setup, Stage, StageRef};
