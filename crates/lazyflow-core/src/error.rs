use std::any::Any;

use thiserror::Error;

/// Boxed error carried by fallible user closures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Canonical result for every lazyflow crate below the DSL.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Field path '{path}' did not resolve")]
    FieldNotFound { path: String },

    #[error("Stage '{stage}' failed: {source}")]
    Transform {
        stage: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Panic during {phase}: {message}")]
    Panicked { phase: &'static str, message: String },

    #[error("Resource allocation failed: {0}")]
    Resource(String),

    #[error("No value present")]
    Absent,

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    /// Wrap the error returned by a fallible closure of `stage`.
    /// A closure that already failed with an `Error` keeps it unchanged.
    pub fn transform(stage: &'static str, source: impl Into<BoxError>) -> Self {
        match source.into().downcast::<Error>() {
            Ok(own) => *own,
            Err(source) => Error::Transform { stage, source },
        }
    }

    /// Convert a caught panic payload into an `Error::Panicked`.
    pub fn from_panic(phase: &'static str, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panicked { phase, message }
    }
}

/// Run `f`, turning a panic into `Error::Panicked` tagged with `phase`.
pub fn catch_panic<R>(phase: &'static str, f: impl FnOnce() -> Result<R>) -> Result<R> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(res) => res,
        Err(payload) => Err(Error::from_panic(phase, payload)),
    }
}

/// Combine the outcome of a pass body with the outcome of its release step.
/// The first fault wins; the returned flag says whether a second fault was dropped.
pub fn first_fault(primary: Result<()>, release: Result<()>) -> (Result<()>, Option<Error>) {
    match (primary, release) {
        (Ok(()), released) => (released, None),
        (Err(e), Ok(())) => (Err(e), None),
        (Err(e), Err(dropped)) => (Err(e), Some(dropped)),
    }
}

/// Retrieve a present value or fail with `Error::Absent`.
pub fn present<T>(value: Option<T>) -> Result<T> {
    value.ok_or(Error::Absent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_become_messages() {
        let err = catch_panic::<()>("consume", || panic!("boom")).unwrap_err();
        match err {
            Error::Panicked { phase, message } => {
                assert_eq!(phase, "consume");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = catch_panic::<()>("worker", || panic!("{} {}", "formatted", 7)).unwrap_err();
        assert!(err.to_string().contains("formatted 7"));
    }

    #[test]
    fn transform_keeps_source() {
        let parse = "x".parse::<i32>().unwrap_err();
        let err = Error::transform("try_map", parse);
        assert!(err.to_string().starts_with("Stage 'try_map' failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn transform_passes_engine_errors_through() {
        let inner = Error::FieldNotFound { path: "a.b".into() };
        let err = Error::transform("try_filter", inner);
        assert!(matches!(err, Error::FieldNotFound { path } if path == "a.b"));
    }

    #[test]
    fn first_fault_keeps_primary() {
        let (res, dropped) = first_fault(Err(Error::Absent), Err(Error::Config("x".into())));
        assert!(matches!(res, Err(Error::Absent)));
        assert!(matches!(dropped, Some(Error::Config(_))));

        let (res, dropped) = first_fault(Ok(()), Err(Error::Absent));
        assert!(matches!(res, Err(Error::Absent)));
        assert!(dropped.is_none());
    }

    #[test]
    fn present_fails_on_absent() {
        assert_eq!(present(Some(3)).unwrap(), 3);
        assert!(matches!(present::<i32>(None), Err(Error::Absent)));
    }
}
