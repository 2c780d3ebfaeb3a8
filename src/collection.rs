//! Collection-path parsing: `scope.collection` naming, with the default
//! scope/collection name normalized at the point it's read off the value
//! tree (the Open Question in §9 resolved: `_` and `_default` both
//! canonicalize to an empty string, once, here — never again compared
//! against their literal spellings downstream).

pub const DEFAULT_SCOPE_NAME: &str = "_default";
pub const DEFAULT_COLLECTION_NAME: &str = "_default";

/// A parsed `scope.collection` reference. An empty `scope`/`collection`
/// means "the default".
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CollectionPath {
	pub scope: String,
	pub collection: String,
}

fn canonicalize(name: &str) -> String {
	if name.is_empty() || name == "_" || name.eq_ignore_ascii_case(DEFAULT_SCOPE_NAME) {
		String::new()
	} else {
		name.to_string()
	}
}

impl CollectionPath {
	/// Parses `"a.b"` as scope `a`, collection `b`; a bare `"b"` as the
	/// default scope and collection `b`.
	pub fn parse(path: &str) -> CollectionPath {
		match path.rsplit_once('.') {
			Some((scope, collection)) => CollectionPath {
				scope: canonicalize(scope),
				collection: canonicalize(collection),
			},
			None => CollectionPath {
				scope: String::new(),
				collection: canonicalize(path),
			},
		}
	}

	pub fn is_default(&self) -> bool {
		self.scope.is_empty() && self.collection.is_empty()
	}

	/// The bare display name used as the default alias / column-name
	/// disambiguation prefix when no explicit `AS` is given.
	pub fn default_alias(&self) -> String {
		if self.collection.is_empty() {
			DEFAULT_COLLECTION_NAME.to_string()
		} else {
			self.collection.clone()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_underscore_and_default_spellings_the_same_way() {
		assert_eq!(CollectionPath::parse("_"), CollectionPath::parse("_default"));
		assert_eq!(CollectionPath::parse("_"), CollectionPath::parse(""));
	}

	#[test]
	fn splits_scope_and_collection() {
		let p = CollectionPath::parse("library.books");
		assert_eq!(p.scope, "library");
		assert_eq!(p.collection, "books");
	}
}
