use std::fmt;

use serde::{Deserialize, Serialize};

/// Call names that page through a connection without changing which edges
/// belong to it.
pub const PAGINATION_CALLS: &[&str] = &["first", "last", "after", "before", "surrounds"];

/// Argument value of a connection or root call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallValue {
    /// Explicit null argument.
    Null,
    /// Boolean argument.
    Bool(bool),
    /// Integer argument.
    Int(i64),
    /// Floating point argument.
    Float(f64),
    /// String argument (cursors, enum values, ids).
    Str(String),
    /// List argument.
    List(Vec<CallValue>),
}

impl CallValue {
    fn as_count(&self) -> Option<usize> {
        match self {
            CallValue::Int(n) => usize::try_from(*n).ok(),
            CallValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    fn as_cursor(&self) -> Option<&str> {
        match self {
            CallValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CallValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallValue::Null => f.write_str("null"),
            CallValue::Bool(v) => write!(f, "{v}"),
            CallValue::Int(v) => write!(f, "{v}"),
            CallValue::Float(v) => write!(f, "{v}"),
            CallValue::Str(v) => f.write_str(v),
            CallValue::List(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{value}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for CallValue {
    fn from(value: &str) -> Self {
        CallValue::Str(value.to_owned())
    }
}

impl From<String> for CallValue {
    fn from(value: String) -> Self {
        CallValue::Str(value)
    }
}

impl From<i64> for CallValue {
    fn from(value: i64) -> Self {
        CallValue::Int(value)
    }
}

impl From<bool> for CallValue {
    fn from(value: bool) -> Self {
        CallValue::Bool(value)
    }
}

/// A named argument applied to a connection field, e.g. `orderby(top)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Argument name.
    pub name: String,
    /// Argument value.
    pub value: CallValue,
}

impl Call {
    /// Creates a call from a name and anything convertible into a value.
    pub fn new(name: impl Into<String>, value: impl Into<CallValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.value)
    }
}

/// Reduces `calls` to those that affect result identity.
pub fn filter_calls<S: AsRef<str>>(calls: &[Call], pagination_calls: &[S]) -> Vec<Call> {
    calls
        .iter()
        .filter(|call| {
            !pagination_calls
                .iter()
                .any(|name| name.as_ref() == call.name)
        })
        .cloned()
        .collect()
}

/// Canonical segment key for a list of filter calls.
///
/// Call order is significant; the empty list maps to the empty key.
pub fn segment_key(filter_calls: &[Call]) -> String {
    filter_calls
        .iter()
        .map(Call::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Pagination arguments extracted from a call list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pagination {
    /// `first(n)`: page forward from the head, or from `after`.
    pub first: Option<usize>,
    /// `last(n)`: page backward from the tail, or from `before`.
    pub last: Option<usize>,
    /// `after(cursor)`.
    pub after: Option<String>,
    /// `before(cursor)`.
    pub before: Option<String>,
}

impl Pagination {
    /// Reads `first`/`last`/`after`/`before` out of `calls`; other calls are ignored.
    pub fn from_calls(calls: &[Call]) -> Self {
        let mut page = Pagination::default();
        for call in calls {
            match call.name.as_str() {
                "first" => page.first = call.value.as_count(),
                "last" => page.last = call.value.as_count(),
                "after" => page.after = call.value.as_cursor().map(str::to_owned),
                "before" => page.before = call.value.as_cursor().map(str::to_owned),
                _ => {}
            }
        }
        page
    }

    /// True when no pagination argument is present.
    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.last.is_none() && self.after.is_none() && self.before.is_none()
    }
}

/// A call list split into its identity-bearing and paging halves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallSplit {
    /// Calls that select the segment.
    pub filter: Vec<Call>,
    /// Paging arguments within that segment.
    pub pagination: Pagination,
}

/// Splits `calls` using the configured pagination call names.
pub fn split_calls<S: AsRef<str>>(calls: &[Call], pagination_calls: &[S]) -> CallSplit {
    CallSplit {
        filter: filter_calls(calls, pagination_calls),
        pagination: Pagination::from_calls(calls),
    }
}
