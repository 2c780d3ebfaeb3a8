//! `ParseContext`: the per-Select (or per-nested-Select) mutable state a
//! parse threads through. The arena itself is threaded alongside as a
//! separate `&mut Arena` parameter rather than embedded here, since a
//! `Select` nested inside another one gets a *fresh* `ParseContext` (so its
//! aliases don't leak into the outer scope) while still allocating nodes
//! into the one arena shared by the whole compilation.

use crate::ast::{Collation, NodeId};
use indexmap::IndexMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AliasTarget {
	/// A `FROM`/`JOIN`/`UNNEST` source.
	Source(NodeId),
	/// A `WHAT` projection with an explicit `AS` alias.
	What(NodeId),
}

/// Per-Select parsing state: the declared aliases, the primary (`FROM`)
/// source, every source registered so far, and the ambient collation.
pub struct ParseContext {
	pub aliases: IndexMap<String, AliasTarget>,
	/// The primary (first, non-JOIN, non-UNNEST) collection source, once
	/// parsed. `None` while parsing a stand-alone expression outside any
	/// `SELECT` (e.g. the index-creation sub-paths in §4.6).
	pub from: Option<NodeId>,
	pub sources: Vec<NodeId>,
	pub collation: Collation,
	/// Whether any descendant of the current `COLLATE` scope has already
	/// emitted the `COLLATE` keyword; reset on entering a new scope and
	/// restored on exit (§9 Design Notes).
	pub collation_applied: bool,
	/// True while writing a `GROUP BY` target: property access must read the
	/// source's `data` column rather than `value`, so grouping observes the
	/// outer dict rather than the current UNNEST loop value.
	pub in_group_by: bool,
}

impl Default for ParseContext {
	fn default() -> Self {
		ParseContext {
			aliases: IndexMap::new(),
			from: None,
			sources: Vec::new(),
			collation: Collation::default(),
			collation_applied: false,
			in_group_by: false,
		}
	}
}

impl ParseContext {
	pub fn new() -> Self {
		ParseContext::default()
	}

	/// A context for the index-creation sub-paths (§4.6): a single
	/// synthetic source standing in for the table/alias being indexed, no
	/// `FROM` parsing, no deleted-doc rewriting.
	pub fn with_single_source(alias: NodeId) -> Self {
		let mut ctx = ParseContext::new();
		ctx.from = Some(alias);
		ctx.sources.push(alias);
		ctx
	}
}
