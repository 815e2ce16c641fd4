//! YAML job schema for *linear* pipelines over JSON records.
//!
//! Example:
//! ```yaml
//! config:
//!   default_parallelism: 4
//! steps:
//!   - { op: filter, expr: "age >= 18" }
//!   - { op: parallel, workers: 4 }
//!   - { op: distinct, key: "user.id" }
//!   - { op: sort, key: "age", descending: true }
//!   - { op: limit, n: 10 }
//!   - { op: map_field, path: "user.name" }
//! terminal: { op: collect }
//! ```

use serde::{Deserialize, Serialize};

use lazyflow_core::field::FieldPath;
use lazyflow_core::PipelineConfig;

use crate::error::{DslError, Result};
use crate::predicate::Predicate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    /// Overrides on top of `PipelineConfig::default()`.
    #[serde(default)]
    pub config: Option<PipelineConfig>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub terminal: Terminal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Step {
    Filter {
        expr: String,
    },
    MapField {
        path: String,
    },
    /// Dedup on the whole record, or on the value at `key`.
    Distinct {
        #[serde(default)]
        key: Option<String>,
    },
    Sort {
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        descending: bool,
        #[serde(default)]
        keep_parallel: bool,
    },
    Limit {
        n: usize,
    },
    Skip {
        n: usize,
    },
    /// `workers` defaults to `config.default_parallelism`.
    Parallel {
        #[serde(default)]
        workers: Option<usize>,
    },
    /// Logs every record at `trace`.
    Peek,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Terminal {
    #[default]
    Collect,
    Count,
    First,
    #[serde(rename = "any")]
    AnyMatch { expr: String },
    #[serde(rename = "all")]
    AllMatch { expr: String },
    #[serde(rename = "none")]
    NoneMatch { expr: String },
    /// Sum of the numbers at `key` (or of the records themselves).
    Sum {
        #[serde(default)]
        key: Option<String>,
    },
}

impl Terminal {
    pub fn label(&self) -> &'static str {
        match self {
            Terminal::Collect => "collect",
            Terminal::Count => "count",
            Terminal::First => "first",
            Terminal::AnyMatch { .. } => "any",
            Terminal::AllMatch { .. } => "all",
            Terminal::NoneMatch { .. } => "none",
            Terminal::Sum { .. } => "sum",
        }
    }
}

impl Job {
    pub fn config(&self) -> PipelineConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Check everything that can be checked without input: config values,
    /// every predicate and every field path.
    pub fn validate(&self) -> Result<()> {
        self.config().validate()?;
        for step in &self.steps {
            match step {
                Step::Filter { expr } => {
                    Predicate::parse(expr)?;
                }
                Step::MapField { path } => {
                    FieldPath::parse(path)?;
                }
                Step::Distinct { key: Some(key) } | Step::Sort { key: Some(key), .. } => {
                    FieldPath::parse(key)?;
                }
                _ => {}
            }
        }
        match &self.terminal {
            Terminal::AnyMatch { expr }
            | Terminal::AllMatch { expr }
            | Terminal::NoneMatch { expr } => {
                Predicate::parse(expr)?;
            }
            Terminal::Sum { key: Some(key) } => {
                FieldPath::parse(key)?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Parse and validate a YAML job.
pub fn parse_job(yaml_src: &str) -> Result<Job> {
    let job: Job = serde_yaml::from_str(yaml_src)?;
    job.validate()?;
    Ok(job)
}

impl std::str::FromStr for Job {
    type Err = DslError;

    fn from_str(s: &str) -> Result<Self> {
        parse_job(s)
    }
}
