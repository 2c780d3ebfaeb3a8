//! Alias resolution (§4.2): binding a property path's leading component to
//! one of the `Select`'s declared `Source`s.

use crate::ast::{Arena, NodeId, NodeKind, SourceKind};
use crate::err::{fail, Result};
use crate::path::{KeyPath, PathComponent};
use super::context::{AliasTarget, ParseContext};

/// The reserved alias given to an anonymous default-collection primary
/// source when no `AS` is specified and no collection name exists to fall
/// back on (mirrors the storage layer's own convention for "the" document
/// table of a query with no named FROM).
pub const ANONYMOUS_SOURCE_ALIAS: &str = "_doc";

/// Resolves an explicit `META(alias)` argument against the declared aliases.
/// Unlike bare property-path resolution, this never falls back to the
/// primary source: an explicit alias that doesn't exist is always an error.
pub fn find_alias_source(ctx: &ParseContext, alias: &str) -> Result<NodeId> {
	match ctx.aliases.get(alias) {
		Some(AliasTarget::Source(id)) => Ok(*id),
		Some(AliasTarget::What(_)) => fail!("'{alias}' is a result column, not a data source"),
		None => fail!("no such data source alias '{alias}'"),
	}
}

fn source_collection_and_alias<'a>(arena: &'a Arena, id: NodeId) -> (&'a str, bool) {
	match arena.get(id) {
		NodeKind::Source {
			collection,
			has_explicit_alias,
			..
		} => (collection.as_str(), *has_explicit_alias),
		_ => ("", true),
	}
}

/// Resolves the source a property path is rooted at, consuming the leading
/// path component(s) that named it (§4.2):
///
///  1. Longest-prefix match against declared (case-sensitive) aliases.
///  2. Else, the leading segment names the primary source's bare collection
///     name and the primary has no explicit alias: consume it.
///  3. Else, if more than one usable collection source is in scope: fail.
///  4. Else bind to the primary (or to no source at all, for a stand-alone
///     expression compiled with no `FROM` whatsoever).
pub fn resolve_property_source(
	arena: &Arena,
	path: &mut KeyPath,
	ctx: &ParseContext,
) -> Result<Option<NodeId>> {
	if let Some(PathComponent::Key(first)) = path.get(0) {
		if let Some(AliasTarget::Source(id)) = ctx.aliases.get(first.as_str()).copied() {
			path.drop_components(1);
			return Ok(Some(id));
		}
	}

	if let Some(primary) = ctx.from {
		let (collection, has_explicit_alias) = source_collection_and_alias(arena, primary);
		if !has_explicit_alias {
			if let Some(PathComponent::Key(first)) = path.get(0) {
				let matches_default = collection.is_empty()
					&& (first == "_default" || first == "_" || first == ANONYMOUS_SOURCE_ALIAS);
				if matches_default || (!collection.is_empty() && first.eq_ignore_ascii_case(collection)) {
					path.drop_components(1);
					return Ok(Some(primary));
				}
			}
		}
	}

	let collection_source_count = ctx
		.sources
		.iter()
		.filter(|&&id| matches!(arena.get(id), NodeKind::Source { kind: SourceKind::Collection, .. }))
		.count();
	if collection_source_count > 1 {
		fail!(
			"property path '{path}' does not begin with a declared 'AS' alias, and more than one \
			 collection is in scope"
		);
	}

	Ok(ctx.from)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::{Arena, NodeKind};

	fn make_source(arena: &mut Arena, collection: &str, alias: &str, explicit: bool) -> NodeId {
		arena.alloc(NodeKind::Source {
			kind: SourceKind::Collection,
			scope: String::new(),
			collection: collection.to_string(),
			alias: alias.to_string(),
			table_name: String::new(),
			join: None,
			on: None,
			unnest_expr: None,
			uses_deleted: false,
			has_explicit_alias: explicit,
		})
	}

	#[test]
	fn binds_to_declared_alias_and_consumes_it() {
		let mut arena = Arena::new();
		let src = make_source(&mut arena, "", "book", true);
		let mut ctx = ParseContext::new();
		ctx.aliases.insert("book".to_string(), AliasTarget::Source(src));
		ctx.from = Some(src);
		ctx.sources.push(src);

		let mut path = KeyPath::parse_dotted("book.title").unwrap();
		let resolved = resolve_property_source(&arena, &mut path, &ctx).unwrap();
		assert_eq!(resolved, Some(src));
		assert_eq!(path.count(), 1);
	}

	#[test]
	fn falls_back_to_sole_primary_when_no_alias_matches() {
		let mut arena = Arena::new();
		let src = make_source(&mut arena, "", ANONYMOUS_SOURCE_ALIAS, false);
		let mut ctx = ParseContext::new();
		ctx.from = Some(src);
		ctx.sources.push(src);

		let mut path = KeyPath::parse_dotted("first").unwrap();
		let resolved = resolve_property_source(&arena, &mut path, &ctx).unwrap();
		assert_eq!(resolved, Some(src));
		assert_eq!(path.count(), 1, "unmatched leading segment must not be consumed");
	}

	#[test]
	fn ambiguous_with_multiple_unaliased_sources() {
		let mut arena = Arena::new();
		let a = make_source(&mut arena, "a", "a", false);
		let b = make_source(&mut arena, "b", "b", false);
		let mut ctx = ParseContext::new();
		ctx.from = Some(a);
		ctx.sources.push(a);
		ctx.sources.push(b);

		let mut path = KeyPath::parse_dotted("name").unwrap();
		assert!(resolve_property_source(&arena, &mut path, &ctx).is_err());
	}
}
