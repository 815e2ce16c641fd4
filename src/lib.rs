#![forbid(unsafe_code)]
//! lazyflow: lazy, composable, fused data pipelines.
//!
//! Intermediate operators only describe work. A terminal operation fuses the
//! description into one chain of stages and drives a single pass over the
//! source:
//!
//! ```ignore
//! use lazyflow::prelude::*;
//!
//! let window = Pipeline::from_vec(vec![1, 5, 2, 7, 7, 8, 10, 5, 12, 6, 2, 6, 9, 3, 2, 4, 11])
//!     .sorted()
//!     .limit(10)
//!     .skip(3)
//!     .to_vec()?;
//! assert_eq!(window, vec![2, 3, 4, 5, 5, 6, 6]);
//! ```

pub use lazyflow_core::{Error, ExecMode, LengthHint, PipelineConfig, Result, Setup, Stage, StageRef};
pub use lazyflow_exec::{Origin, PassStats, Pipeline};

pub use lazyflow_dsl as dsl;
pub use lazyflow_operators as operators;

pub mod prelude {
    pub use lazyflow_core::prelude::*;
    pub use lazyflow_exec::{Origin, PassStats, Pipeline};
}
