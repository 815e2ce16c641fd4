//! Lowering: `Job` → `Pipeline<Value>` → terminal result.

use serde_json::{Number, Value};

use lazyflow_core::error::BoxError;
use lazyflow_core::field::FieldPath;
use lazyflow_exec::{Origin, Pipeline};

use crate::error::Result;
use crate::job::{Job, Step, Terminal};
use crate::predicate::Predicate;
use crate::value::{compare, identity, key_of};

/// Build the step chain over `records`. Runs nothing.
pub fn build_pipeline(job: &Job, records: Vec<Value>) -> Result<Pipeline<Value>> {
    let origin = Origin::new(job.config());
    let mut pipeline = origin.from_vec(records);
    for step in &job.steps {
        pipeline = lower_step(&pipeline, step)?;
    }
    Ok(pipeline)
}

fn lower_step(p: &Pipeline<Value>, step: &Step) -> Result<Pipeline<Value>> {
    Ok(match step {
        Step::Filter { expr } => {
            let pred = Predicate::parse(expr)?;
            p.try_filter(move |v| pred.eval(v))
        }
        Step::MapField { path } => p.map_field(path.clone()),
        Step::Distinct { key: None } => p.distinct_by(identity),
        Step::Distinct { key: Some(key) } => {
            let path = FieldPath::parse(key)?;
            p.distinct_by(move |v| identity(key_of(&path, v)))
        }
        Step::Sort {
            key,
            descending,
            keep_parallel,
        } => {
            let path = key.as_deref().map(FieldPath::parse).transpose()?;
            let descending = *descending;
            p.sorted_with(
                move |a: &Value, b: &Value| {
                    let ord = match &path {
                        Some(path) => compare(key_of(path, a), key_of(path, b)),
                        None => compare(a, b),
                    };
                    if descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                },
                *keep_parallel,
            )
        }
        Step::Limit { n } => p.limit(*n),
        Step::Skip { n } => p.skip(*n),
        Step::Parallel { workers: Some(n) } => p.parallel(*n),
        Step::Parallel { workers: None } => p.parallel_default(),
        Step::Peek => p.peek(|v| tracing::trace!(record = %v, "peek")),
    })
}

fn number_at(path: Option<&FieldPath>, record: &Value) -> std::result::Result<f64, BoxError> {
    let value = match path {
        Some(path) => path.require(record)?,
        None => record,
    };
    value
        .as_f64()
        .ok_or_else(|| format!("cannot sum non-numeric value {value}").into())
}

fn sum_value(total: f64) -> Value {
    if total.fract() == 0.0 && total.abs() < i64::MAX as f64 {
        Value::from(total as i64)
    } else {
        Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Run the job's steps and terminal over `records`.
pub fn run_job(job: &Job, records: Vec<Value>) -> Result<Value> {
    let input_len = records.len();
    let p = build_pipeline(job, records)?;

    let out = match &job.terminal {
        Terminal::Collect => Value::Array(p.to_vec()?),
        Terminal::Count => Value::from(p.count()?),
        Terminal::First => p.find_first()?.unwrap_or(Value::Null),
        Terminal::AnyMatch { expr } => {
            let pred = Predicate::parse(expr)?;
            Value::Bool(p.try_map(move |v| pred.eval(&v)).any_match(|hit| *hit)?)
        }
        Terminal::AllMatch { expr } => {
            let pred = Predicate::parse(expr)?;
            Value::Bool(p.try_map(move |v| pred.eval(&v)).all_match(|hit| *hit)?)
        }
        Terminal::NoneMatch { expr } => {
            let pred = Predicate::parse(expr)?;
            Value::Bool(p.try_map(move |v| pred.eval(&v)).none_match(|hit| *hit)?)
        }
        Terminal::Sum { key } => {
            let path = key.as_deref().map(FieldPath::parse).transpose()?;
            let total = p
                .try_map(move |v| number_at(path.as_ref(), &v))
                .reduce_from(0.0, |a, b| a + b)?;
            sum_value(total)
        }
    };

    tracing::info!(
        terminal = job.terminal.label(),
        input = input_len,
        "job complete"
    );
    Ok(out)
}

/// Stage names of the fused chain, terminal included. Runs nothing.
pub fn explain_job(job: &Job) -> Result<Vec<&'static str>> {
    let mut names = build_pipeline(job, Vec::new())?.explain();
    match job.terminal {
        Terminal::AnyMatch { .. }
        | Terminal::AllMatch { .. }
        | Terminal::NoneMatch { .. }
        | Terminal::Sum { .. } => names.push("try_map"),
        _ => {}
    }
    names.push(job.terminal.label());
    Ok(names)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::job::parse_job;

    fn people() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "ada", "age": 36, "team": "core"}),
            json!({"id": 2, "name": "bob", "age": 17, "team": "web"}),
            json!({"id": 3, "name": "cyd", "age": 52, "team": "core"}),
            json!({"id": 4, "name": "dee", "age": 29, "team": "web"}),
            json!({"id": 5, "name": "eve", "age": 41, "team": "ops"}),
        ]
    }

    fn run(yaml: &str) -> Value {
        run_job(&parse_job(yaml).unwrap(), people()).unwrap()
    }

    #[test]
    fn filter_sort_project() {
        let out = run(r#"
steps:
  - { op: filter, expr: "age >= 18" }
  - { op: sort, key: age, descending: true }
  - { op: limit, n: 2 }
  - { op: map_field, path: name }
"#);
        assert_eq!(out, json!(["cyd", "eve"]));
    }

    #[test]
    fn distinct_by_key_keeps_first() {
        let out = run(r#"
steps:
  - { op: distinct, key: team }
  - { op: map_field, path: id }
"#);
        assert_eq!(out, json!([1, 2, 5]));
    }

    #[test]
    fn parallel_steps_with_scalar_terminals() {
        let count = run(r#"
steps:
  - { op: parallel, workers: 3 }
  - { op: filter, expr: "team == core" }
terminal: { op: count }
"#);
        assert_eq!(count, json!(2));

        let sum = run(r#"
steps: [ { op: parallel } ]
terminal: { op: sum, key: age }
"#);
        assert_eq!(sum, json!(175));
    }

    #[test]
    fn quantifiers_and_first() {
        assert_eq!(run("terminal: { op: any, expr: \"age < 18\" }"), json!(true));
        assert_eq!(run("terminal: { op: all, expr: \"age < 60\" }"), json!(true));
        assert_eq!(run("terminal: { op: none, expr: \"team == web\" }"), json!(false));
        assert_eq!(
            run("steps: [ { op: skip, n: 4 } ]\nterminal: { op: first }"),
            json!({"id": 5, "name": "eve", "age": 41, "team": "ops"})
        );
    }

    #[test]
    fn missing_fields_fail_the_run() {
        let job = parse_job("steps: [ { op: filter, expr: \"salary > 1\" } ]").unwrap();
        let err = run_job(&job, people()).unwrap_err();
        assert!(err.to_string().contains("salary"));
    }

    #[test]
    fn explain_names_every_stage() {
        let job = parse_job(
            r#"
steps:
  - { op: filter, expr: "age > 1" }
  - { op: sort, keep_parallel: true }
terminal: { op: sum }
"#,
        )
        .unwrap();
        assert_eq!(
            explain_job(&job).unwrap(),
            vec!["source", "try_filter", "sorted", "parallel", "try_map", "sum"]
        );
    }
}
