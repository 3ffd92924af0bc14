//! Capturing per-record outcomes and folding them into one batch verdict.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::debug;

use crate::error::{AggregateError, IngestError, IngestResult};
use crate::UniqueEntity;

/// Run one unit of work, capturing error returns and panics as failures.
///
/// A captured panic still runs the process panic hook, which by default
/// prints to stderr. Binaries that want a clean log install their own hook.
pub fn apply<R, F>(op: F) -> IngestResult<R>
where
    F: FnOnce() -> IngestResult<R>,
{
    match catch_unwind(AssertUnwindSafe(op)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(IngestError::Panicked(message))
        }
    }
}

/// All values in input order, or one error summarizing every failure.
pub fn scan_for_exceptions<T: UniqueEntity>(
    results: impl IntoIterator<Item = IngestResult<T>>,
) -> Result<Vec<T>, AggregateError> {
    scan_labelled(T::KIND.entity_name(), results)
}

/// Like [`scan_for_exceptions`] with an explicit batch label.
pub fn scan_labelled<T>(
    label: &str,
    results: impl IntoIterator<Item = IngestResult<T>>,
) -> Result<Vec<T>, AggregateError> {
    let (values, errors) = partition_results(results);
    let total = values.len() + errors.len();
    let failed = errors.len();
    match errors.into_iter().next() {
        None => Ok(values),
        Some(first) => {
            debug!(label, failed, total, "batch contains failures");
            Err(AggregateError {
                label: label.to_string(),
                failed,
                total,
                first: Box::new(first),
            })
        }
    }
}

/// Split outcomes into successes and failures, both in input order.
pub fn partition_results<T>(
    results: impl IntoIterator<Item = IngestResult<T>>,
) -> (Vec<T>, Vec<IngestError>) {
    let mut values = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(err) => errors.push(err),
        }
    }
    (values, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityKind;
    use uuid::Uuid;

    #[derive(Debug, PartialEq)]
    struct Dummy(u32);

    impl UniqueEntity for Dummy {
        const KIND: EntityKind = EntityKind::Switch;

        fn uuid(&self) -> Uuid {
            Uuid::nil()
        }
    }

    fn outcome(i: u32) -> IngestResult<Dummy> {
        if i % 3 == 1 {
            Err(IngestError::DanglingReference { id: i.to_string() })
        } else {
            Ok(Dummy(i))
        }
    }

    #[test]
    fn test_apply_passes_results_through() {
        assert_eq!(apply(|| Ok(3)).unwrap(), 3);
        assert!(matches!(
            apply::<(), _>(|| Err(IngestError::DuplicateId { id: "x".into() })),
            Err(IngestError::DuplicateId { .. })
        ));
    }

    #[test]
    fn test_apply_captures_panics() {
        let result = apply::<u32, _>(|| panic!("boom"));
        match result {
            Err(IngestError::Panicked(message)) => assert_eq!(message, "boom"),
            other => panic!("expected captured panic, got {other:?}"),
        }
        let result = apply::<u32, _>(|| panic!("{} failed", 7));
        assert!(matches!(result, Err(IngestError::Panicked(m)) if m == "7 failed"));
    }

    #[test]
    fn test_scan_counts_failures() {
        let err = scan_for_exceptions((0..10).map(outcome)).unwrap_err();
        assert_eq!(err.failed, 3);
        assert_eq!(err.total, 10);
        assert_eq!(err.label, "SwitchInput");
        assert!(matches!(*err.first, IngestError::DanglingReference { ref id } if id == "1"));
        assert!(err.to_string().starts_with("3 exception(s) occurred within \"SwitchInput\""));
    }

    #[test]
    fn test_scan_keeps_order_on_success() {
        let values = scan_for_exceptions([0, 2, 3, 5].into_iter().map(outcome)).unwrap();
        assert_eq!(values, vec![Dummy(0), Dummy(2), Dummy(3), Dummy(5)]);
        let empty: Vec<IngestResult<Dummy>> = Vec::new();
        assert!(scan_for_exceptions(empty).unwrap().is_empty());
    }

    #[test]
    fn test_partition() {
        let (values, errors) = partition_results((0..5).map(outcome));
        assert_eq!(values.len(), 3);
        assert_eq!(errors.len(), 2);
    }
}
