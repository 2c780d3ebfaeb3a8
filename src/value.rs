//! The input model: a read-only, lazily-decoded document tree.
//!
//! Real callers hand the translator a tree already decoded from Fleece or
//! JSON; this crate never reads a document off disk itself (that belongs to
//! the storage layer). [`Value`] is the owned representation the parser
//! walks. It is immutable once built: the translator never mutates it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node in the input value tree.
///
/// `Int` and `Number` are kept distinct so integer literals round-trip
/// without floating-point rounding; a Fleece-backed implementation would
/// make the same distinction between its integer and float storage forms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Number(f64),
	String(String),
	Bytes(Vec<u8>),
	Array(Vec<Value>),
	Dict(IndexMap<String, Value>),
}

impl Default for Value {
	fn default() -> Self {
		Value::Null
	}
}

impl Value {
	pub fn as_array(&self) -> Option<&[Value]> {
		match self {
			Value::Array(a) => Some(a),
			_ => None,
		}
	}

	pub fn as_dict(&self) -> Option<&IndexMap<String, Value>> {
		match self {
			Value::Dict(d) => Some(d),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	/// Whether this value is an array whose first element is a string: the
	/// shape that makes an array an "operator application" rather than a
	/// plain array literal.
	pub fn as_operation(&self) -> Option<(&str, &[Value])> {
		match self {
			Value::Array(items) => match items.first() {
				Some(Value::String(op)) => Some((op.as_str(), &items[1..])),
				_ => None,
			},
			_ => None,
		}
	}

	pub fn is_integer(&self) -> bool {
		matches!(self, Value::Int(_))
	}

	/// Best-effort conversion to an integer, accepting both `Int` and a
	/// whole-valued `Number`, the way Fleece's `asInt` treats both storage
	/// forms interchangeably.
	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			Value::Number(n) if n.fract() == 0.0 => Some(*n as i64),
			_ => None,
		}
	}

	/// Parses a JSON document into a [`Value`] tree. This is the only place
	/// `serde_json` appears in the non-test surface of the crate; it exists
	/// because query trees are conventionally authored and transmitted as
	/// JSON even though the translator itself is schema-, not format-, aware.
	pub fn from_json_str(json: &str) -> Result<Value, serde_json::Error> {
		let raw: serde_json::Value = serde_json::from_str(json)?;
		Ok(Value::from(raw))
	}
}

impl From<serde_json::Value> for Value {
	fn from(v: serde_json::Value) -> Self {
		match v {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => {
				if let Some(i) = n.as_i64() {
					Value::Int(i)
				} else {
					Value::Number(n.as_f64().unwrap_or(f64::NAN))
				}
			}
			serde_json::Value::String(s) => Value::String(s),
			serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
			serde_json::Value::Object(o) => {
				Value::Dict(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
			}
		}
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_string())
	}
}

impl From<i64> for Value {
	fn from(i: i64) -> Self {
		Value::Int(i)
	}
}

impl From<f64> for Value {
	fn from(n: f64) -> Self {
		Value::Number(n)
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(v: Vec<T>) -> Self {
		Value::Array(v.into_iter().map(Into::into).collect())
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => write!(f, "null"),
			Value::Bool(b) => write!(f, "{b}"),
			Value::Int(i) => write!(f, "{i}"),
			Value::Number(n) => write!(f, "{n}"),
			Value::String(s) => write!(f, "{s:?}"),
			Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
			Value::Array(_) => write!(f, "[array]"),
			Value::Dict(_) => write!(f, "{{dict}}"),
		}
	}
}

/// Shorthand for building a `Value::Array` operation node in tests, mirroring
/// how query-syntax arrays read in the abbreviated JSON-query notation.
#[macro_export]
macro_rules! op {
	($($v:expr),* $(,)?) => {
		$crate::value::Value::Array(vec![$($crate::value::Value::from($v)),*])
	};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_json_object_preserving_key_order() {
		let v = Value::from_json_str(r#"{"b":1,"a":2}"#).unwrap();
		let d = v.as_dict().unwrap();
		let keys: Vec<&str> = d.keys().map(String::as_str).collect();
		assert_eq!(keys, vec!["b", "a"]);
	}

	#[test]
	fn recognizes_operation_arrays() {
		let v = Value::Array(vec![Value::from("="), Value::Int(1), Value::Int(2)]);
		let (op, args) = v.as_operation().unwrap();
		assert_eq!(op, "=");
		assert_eq!(args.len(), 2);
	}

	#[test]
	fn distinguishes_int_from_float() {
		let v = Value::from_json_str("3").unwrap();
		assert!(v.is_integer());
		let v = Value::from_json_str("3.5").unwrap();
		assert!(!v.is_integer());
	}
}
