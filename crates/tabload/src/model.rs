//! Canonical record types and field normalization rules.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};

/// An untyped record as produced by any extractor: field name -> scalar value.
pub type RawRecord = serde_json::Map<String, Value>;

/// The validated, normalized user entity handed to a loader.
///
/// Built from a [`RawRecord`] by [`CanonicalUser::from_raw`]; `id` uniqueness
/// is enforced only by the target table's key constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalUser {
    pub id: i64,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
}

impl CanonicalUser {
    /// Column names in the order the loaders write them.
    pub const COLUMNS: [&'static str; 5] = ["id", "email", "first_name", "last_name", "avatar"];

    /// Build a canonical user from a raw record, applying the normalization
    /// rules. `index` is the record's position in the batch, reported on
    /// validation failure.
    pub fn from_raw(index: usize, record: &RawRecord) -> Result<Self> {
        let id = required_integer(index, record, "id")?;
        let email = optional_string(index, record, "email")?.map(|s| s.trim().to_lowercase());
        let first_name = title_case(required_string(index, record, "first_name")?.trim());
        let last_name = title_case(required_string(index, record, "last_name")?.trim());
        let avatar = optional_string(index, record, "avatar")?;

        Ok(Self {
            id,
            email,
            first_name,
            last_name,
            avatar,
        })
    }

    /// The user as a plain field mapping, in [`Self::COLUMNS`] order values.
    pub fn to_record(&self) -> RawRecord {
        let mut record = RawRecord::new();
        record.insert("id".to_string(), Value::from(self.id));
        record.insert("email".to_string(), opt_value(&self.email));
        record.insert("first_name".to_string(), Value::from(self.first_name.clone()));
        record.insert("last_name".to_string(), Value::from(self.last_name.clone()));
        record.insert("avatar".to_string(), opt_value(&self.avatar));
        record
    }
}

fn opt_value(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::from(s.clone()),
        None => Value::Null,
    }
}

/// Title-case a string: each alphabetic run starts upper-case, the remainder
/// is lower-cased. Non-alphabetic characters reset the run.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut start_of_word = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if start_of_word {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            start_of_word = false;
        } else {
            out.push(c);
            start_of_word = true;
        }
    }
    out
}

fn required_integer(index: usize, record: &RawRecord, field: &str) -> Result<i64> {
    match record.get(field) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
            PipelineError::validation(index, field, format!("'{}' is not an integer", n))
        }),
        // CSV and spreadsheet cells arrive as text
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| {
            PipelineError::validation(index, field, format!("'{}' is not an integer", s))
        }),
        Some(other) => Err(PipelineError::validation(
            index,
            field,
            format!("expected an integer, got {}", type_name(other)),
        )),
        None => Err(PipelineError::validation(
            index,
            field,
            "missing required field",
        )),
    }
}

fn required_string(index: usize, record: &RawRecord, field: &str) -> Result<String> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(PipelineError::validation(
            index,
            field,
            "missing required field",
        )),
        Some(other) => Err(PipelineError::validation(
            index,
            field,
            format!("expected a string, got {}", type_name(other)),
        )),
    }
}

fn optional_string(index: usize, record: &RawRecord, field: &str) -> Result<Option<String>> {
    match record.get(field) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(other) => Err(PipelineError::validation(
            index,
            field,
            format!("expected a string, got {}", type_name(other)),
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
