//! Engine configuration that pipelines carry into every pass.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker count used by `parallel_default()` stages.
    pub default_parallelism: usize,

    /// Bound of the queue feeding a sorted stage's drain thread. When `None`
    /// the exact source length is used if known, capped at
    /// `fallback_funnel_capacity`, else `fallback_funnel_capacity` itself.
    pub funnel_capacity: Option<usize>,

    /// Queue bound used when neither `funnel_capacity` nor an exact hint exists.
    pub fallback_funnel_capacity: usize,

    /// Upper bound on elements preallocated from a capacity hint.
    /// Hints are estimates (filters shrink the real count), so cap them.
    pub max_preallocate: usize,

    /// Prefix for worker and funnel thread names.
    pub thread_name_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            funnel_capacity: None,
            fallback_funnel_capacity: 1024,
            max_preallocate: 1 << 20, // 1 Mi elements
            thread_name_prefix: "lazyflow".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `LAZYFLOW_DEFAULT_PARALLELISM`: worker count for `parallel_default()`
    /// - `LAZYFLOW_FUNNEL_CAPACITY`: sorted-stage queue bound
    /// - `LAZYFLOW_FALLBACK_FUNNEL_CAPACITY`: queue bound for unknown-length sources
    /// - `LAZYFLOW_MAX_PREALLOCATE`: preallocation cap
    /// - `LAZYFLOW_THREAD_PREFIX`: thread name prefix
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("LAZYFLOW_DEFAULT_PARALLELISM") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.default_parallelism = v;
            }
        }

        if let Ok(s) = std::env::var("LAZYFLOW_FUNNEL_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.funnel_capacity = Some(v);
            }
        }

        if let Ok(s) = std::env::var("LAZYFLOW_FALLBACK_FUNNEL_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.fallback_funnel_capacity = v;
            }
        }

        if let Ok(s) = std::env::var("LAZYFLOW_MAX_PREALLOCATE") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_preallocate = v;
            }
        }

        if let Ok(s) = std::env::var("LAZYFLOW_THREAD_PREFIX") {
            cfg.thread_name_prefix = s;
        }

        cfg
    }

    /// Reject settings no pass can run with.
    pub fn validate(&self) -> Result<()> {
        if self.default_parallelism == 0 {
            return Err(Error::Config("default_parallelism must be at least 1".into()));
        }
        if self.funnel_capacity == Some(0) {
            return Err(Error::Config("funnel_capacity must be at least 1".into()));
        }
        if self.fallback_funnel_capacity == 0 {
            return Err(Error::Config(
                "fallback_funnel_capacity must be at least 1".into(),
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(Error::Config("thread_name_prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Queue bound for a funnel fed by a source with the given exact length.
    ///
    /// Bounded channels allocate every slot up front, so an exact length only
    /// ever shrinks the fallback bound.
    pub fn funnel_bound(&self, exact_len: Option<usize>) -> usize {
        let derived = match exact_len {
            Some(n) => n.min(self.fallback_funnel_capacity),
            None => self.fallback_funnel_capacity,
        };
        self.funnel_capacity.unwrap_or(derived).max(1)
    }

    /// Clamp a capacity hint before preallocating.
    pub fn preallocation(&self, hint: usize) -> usize {
        hint.min(self.max_preallocate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.default_parallelism >= 1);
    }

    #[test]
    fn zero_values_are_rejected() {
        let cfg = PipelineConfig {
            default_parallelism: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let cfg = PipelineConfig {
            funnel_capacity: Some(0),
            ..PipelineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn funnel_bound_prefers_explicit_then_exact() {
        let mut cfg = PipelineConfig::default();
        assert_eq!(cfg.funnel_bound(Some(17)), 17);
        assert_eq!(cfg.funnel_bound(None), 1024);
        assert_eq!(cfg.funnel_bound(Some(0)), 1);
        cfg.funnel_capacity = Some(8);
        assert_eq!(cfg.funnel_bound(Some(17)), 8);
    }

    #[test]
    fn huge_exact_lengths_do_not_size_the_funnel() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.funnel_bound(Some(10_000_000)), 1024);

        let cfg = PipelineConfig {
            fallback_funnel_capacity: 64,
            ..PipelineConfig::default()
        };
        assert_eq!(cfg.funnel_bound(Some(1_000)), 64);
        assert_eq!(cfg.funnel_bound(Some(10)), 10);
    }

    #[test]
    fn config_round_trips_through_json_with_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"default_parallelism": 3}"#).unwrap();
        assert_eq!(cfg.default_parallelism, 3);
        assert_eq!(cfg.fallback_funnel_capacity, 1024);
        assert_eq!(cfg.thread_name_prefix, "lazyflow");
    }
}
