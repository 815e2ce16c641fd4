#![forbid(unsafe_code)]
//! lazyflow-exec: the `Pipeline<T>` builder, fusion and the single-pass
//! executor.
//!
//! ```ignore
//! let top = Pipeline::from_vec(vec![5, 1, 4, 1, 3])
//!     .distinct()
//!     .sorted()
//!     .limit(2)
//!     .to_vec()?;
//! assert_eq!(top, vec![1, 3]);
//! ```

mod fuse;
pub mod metrics;
pub mod pipeline;
mod runtime;
mod terminal;

pub use metrics::PassStats;
pub use pipeline::{Origin, Pipeline};
