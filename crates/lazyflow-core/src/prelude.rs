//! Convenient re-exports for downstream crates.

pub use crate::config::PipelineConfig;
pub use crate::error::{BoxError, Error, Result};
pub use crate::field::FieldPath;
pub use crate::hint::LengthHint;
pub use crate::source::{ChannelSource, IterSource, SliceSource, Source};
pub use crate::stage::{AbortSignal, ExecMode, Setup, Stage, StageRef};
