//! Optional-path traversal over `serde_json::Value`.
//!
//! Every step returns a cursor; a missing key, out-of-range index or wrong
//! container type turns the cursor empty instead of failing. Callers decide
//! at the end whether an empty result is fatal via [`required`].

use serde_json::Value;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JsonPath<'a> {
    value: Option<&'a Value>,
}

impl<'a> JsonPath<'a> {
    pub fn root(value: &'a Value) -> Self {
        Self { value: Some(value) }
    }

    pub const fn empty() -> Self {
        Self { value: None }
    }

    pub fn key(self, name: &str) -> Self {
        Self {
            value: self.value.and_then(|value| value.as_object()?.get(name)),
        }
    }

    /// Follow a chain of object keys.
    pub fn dig(self, names: &[&str]) -> Self {
        names.iter().fold(self, |cursor, name| cursor.key(name))
    }

    pub fn index(self, position: usize) -> Self {
        Self {
            value: self.value.and_then(|value| value.as_array()?.get(position)),
        }
    }

    pub fn first(self) -> Self {
        self.index(0)
    }

    /// The value under the cursor; JSON `null` counts as absent.
    pub fn value(self) -> Option<&'a Value> {
        self.value.filter(|value| !value.is_null())
    }

    pub fn is_present(self) -> bool {
        self.value().is_some()
    }

    pub fn as_str(self) -> Option<&'a str> {
        self.value.and_then(Value::as_str)
    }

    pub fn as_array(self) -> Option<&'a [Value]> {
        self.value.and_then(Value::as_array).map(Vec::as_slice)
    }

    pub fn array_or_empty(self) -> &'a [Value] {
        self.as_array().unwrap_or(&[])
    }

    /// An array's items, or a lone object as a one-element list.
    pub fn one_or_many(self) -> Option<Vec<&'a Value>> {
        match self.value? {
            Value::Array(items) => Some(items.iter().collect()),
            single @ Value::Object(_) => Some(vec![single]),
            _ => None,
        }
    }
}

/// Turn an absent lookup into [`ParseError::MissingField`].
pub fn required<T>(value: Option<T>, path: &str) -> Result<T, ParseError> {
    value.ok_or_else(|| ParseError::MissingField {
        path: path.to_owned(),
    })
}
