//! Record normalization stage.

use crate::error::Result;
use crate::model::{CanonicalUser, RawRecord};

/// Normalize raw records into canonical users, one-to-one, preserving input
/// order. The iterator is lazy; the first invalid record yields an `Err`
/// identifying the offending index and field, and the caller is expected to
/// stop there (fail-fast, no skip-and-continue).
pub fn normalize_users<I>(records: I) -> impl Iterator<Item = Result<CanonicalUser>>
where
    I: IntoIterator<Item = RawRecord>,
{
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| CanonicalUser::from_raw(index, &record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use serde_json::{json, Value};

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_order_is_preserved() {
        let records = vec![
            raw(json!({"id": 2, "first_name": "b", "last_name": "b"})),
            raw(json!({"id": 1, "first_name": "a", "last_name": "a"})),
        ];
        let users: Vec<_> = normalize_users(records)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(users[0].id, 2);
        assert_eq!(users[1].id, 1);
    }

    #[test]
    fn test_first_failure_reports_record_index() {
        let records = vec![
            raw(json!({"id": 1, "first_name": "a", "last_name": "a"})),
            raw(json!({"id": 2, "last_name": "b"})),
            raw(json!({"id": 3, "first_name": "c", "last_name": "c"})),
        ];
        let err = normalize_users(records)
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation { index: 1, ref field, .. } if field == "first_name"
        ));
    }

    #[test]
    fn test_empty_input_yields_empty_batch() {
        let users = normalize_users(Vec::new()).collect::<Result<Vec<_>>>().unwrap();
        assert!(users.is_empty());
    }
}
