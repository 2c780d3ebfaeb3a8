//! Key paths: a parsed sequence of dict-key or array-index components.
//!
//! Property paths in the query syntax are either dotted strings (leading
//! `.`) or arrays of string/single-element-array pairs. A path whose first
//! character is `$` is escaped with a leading backslash before being handed
//! to the dotted-string parser, so a literal leading `$` is never mistaken
//! for a JSONPath root marker.

use crate::err::{fail, Error, Result};
use crate::value::Value;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum PathComponent {
	Key(String),
	Index(i32),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyPath(pub Vec<PathComponent>);

impl KeyPath {
	pub fn new() -> Self {
		KeyPath(Vec::new())
	}

	pub fn count(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn get(&self, i: usize) -> Option<&PathComponent> {
		self.0.get(i)
	}

	pub fn drop_components(&mut self, n: usize) {
		self.0.drain(0..n.min(self.0.len()));
	}

	pub fn add_key(&mut self, key: impl Into<String>) {
		self.0.push(PathComponent::Key(key.into()));
	}

	pub fn add_index(&mut self, index: i32) {
		self.0.push(PathComponent::Index(index));
	}

	/// Parses a dotted-string path, e.g. `foo.bar[2].baz`. A leading `.` is
	/// optional and ignored. This is a small hand-rolled scanner rather than
	/// a `nom` grammar: the accepted syntax is a handful of fixed shapes
	/// (dotted keys, bracketed non-negative integer indices), not a language
	/// worth a parser-combinator stack.
	pub fn parse_dotted(path_str: &str) -> Result<KeyPath> {
		let mut s = path_str;
		// The `$`-escape: a literal leading backslash means "the next
		// character is not a JSONPath root marker, take it literally".
		if let Some(rest) = s.strip_prefix('\\') {
			s = rest;
		}
		let mut path = KeyPath::new();
		let mut chars = s.char_indices().peekable();
		let mut current = String::new();
		let flush = |current: &mut String, path: &mut KeyPath| {
			if !current.is_empty() {
				path.add_key(std::mem::take(current));
			}
		};
		while let Some((_, c)) = chars.next() {
			match c {
				'.' => {
					flush(&mut current, &mut path);
				}
				'[' => {
					flush(&mut current, &mut path);
					let mut digits = String::new();
					let mut closed = false;
					for (_, c2) in chars.by_ref() {
						if c2 == ']' {
							closed = true;
							break;
						}
						digits.push(c2);
					}
					if !closed {
						fail!("invalid property path '{path_str}'");
					}
					let index: i32 = digits
						.parse()
						.map_err(|_| Error::invalid(format!("invalid array index in path '{path_str}'")))?;
					path.add_index(index);
				}
				_ => current.push(c),
			}
		}
		flush(&mut current, &mut path);
		if path.is_empty() {
			fail!("invalid property path '{path_str}'");
		}
		Ok(path)
	}

	/// Parses the `[".", "a", "b", ["2"], ...]` array-component form used
	/// when a property path is spelled out as explicit JSON components
	/// rather than as a single dotted string.
	pub fn parse_components(components: &[Value]) -> Result<KeyPath> {
		let mut path = KeyPath::new();
		for item in components {
			match item {
				Value::String(key) => path.add_key(key.clone()),
				Value::Array(arr) => {
					require_len_one(arr)?;
					let index_val = &arr[0];
					let index = index_val
						.as_int()
						.ok_or_else(|| Error::invalid("property array index must be an integer"))?;
					if index < i32::MIN as i64 || index > i32::MAX as i64 {
						fail!("array index out of bounds in property path");
					}
					path.add_index(index as i32);
				}
				_ => fail!("invalid JSON value in property path"),
			}
		}
		Ok(path)
	}

	/// Full parse: an (optional) leading dotted-string segment followed by
	/// any number of explicit array components, matching how the `.` / `_.`
	/// operators pass both a path string and a trailing components slice.
	pub fn parse(path_str: &str, components: &[Value]) -> Result<KeyPath> {
		let mut path = if path_str.is_empty() {
			KeyPath::new()
		} else {
			Self::parse_dotted(path_str)?
		};
		path.0.extend(Self::parse_components(components)?.0);
		Ok(path)
	}
}

fn require_len_one(arr: &[Value]) -> Result<()> {
	if arr.len() != 1 {
		fail!("property array index must have exactly one item");
	}
	Ok(())
}

impl fmt::Display for KeyPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, c) in self.0.iter().enumerate() {
			match c {
				PathComponent::Key(k) => {
					if i > 0 {
						write!(f, ".")?;
					}
					write!(f, "{k}")?;
				}
				PathComponent::Index(idx) => write!(f, "[{idx}]")?,
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_dotted_path_with_index() {
		let p = KeyPath::parse_dotted("addresses[0].city").unwrap();
		assert_eq!(
			p.0,
			vec![
				PathComponent::Key("addresses".into()),
				PathComponent::Index(0),
				PathComponent::Key("city".into()),
			]
		);
	}

	#[test]
	fn escapes_leading_dollar() {
		let p = KeyPath::parse_dotted("\\$special").unwrap();
		assert_eq!(p.0, vec![PathComponent::Key("$special".into())]);
	}

	#[test]
	fn rejects_unclosed_bracket() {
		assert!(KeyPath::parse_dotted("a[0").is_err());
	}
}
