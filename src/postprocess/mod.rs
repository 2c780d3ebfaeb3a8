//! The post-processor (§4.3/§4.4): a second pass over the tree a `Select`
//! was parsed into. Runs bottom-up over nested `Select`s (a subquery's own
//! index/deleted-doc decisions never depend on its containing query's), then
//! against the given `Select` itself: resolves each `Source`'s physical
//! table name and deleted-doc visibility, synthesizes `IndexSource` joins
//! for every `Match`/`Rank`/`VectorDistance`, validates their placement,
//! classifies vector-distance hybrid form, and makes result-column titles
//! unique.

use std::collections::HashMap;

use indexmap::IndexSet;
use tracing::{debug, trace};

use crate::ast::{Arena, IndexIdentity, IndexKind, IndexKindKey, NodeId, NodeKind, SourceKind};
use crate::ast::tables::{self, OpType};
use crate::delegate::{Delegate, DeletionStatus};
use crate::err::{require, Result};
use crate::value::Value;

/// Side outputs accumulated across the whole compilation (the top `Select`
/// plus every nested one), mirroring the façade's §6 output fields.
#[derive(Default)]
pub struct Outputs {
	pub collection_tables_used: IndexSet<String>,
	pub fts_tables_used: Vec<String>,
	pub uses_expiration: bool,
}

pub fn run(arena: &mut Arena, select_id: NodeId, delegate: &dyn Delegate, out: &mut Outputs) -> Result<()> {
	trace!(?select_id, "postprocess: entering select");

	for nested in nested_selects(arena, select_id) {
		run(arena, nested, delegate, out)?;
	}

	resolve_source_tables(arena, select_id, delegate, out)?;
	detect_vector_hybrid(arena, select_id)?;
	validate_index_placement(arena, select_id)?;
	resolve_indexed_nodes(arena, select_id, delegate, out)?;
	inject_deleted_predicates(arena, select_id)?;
	unique_column_titles(arena, select_id)?;
	detect_expiration_usage(arena, select_id, out);

	Ok(())
}

fn select_roots(arena: &Arena, select_id: NodeId) -> Vec<NodeId> {
	let NodeKind::Select {
		what,
		sources,
		where_clause,
		group_by,
		having,
		order_by,
		..
	} = arena.get(select_id)
	else {
		return Vec::new();
	};
	let mut roots = Vec::new();
	roots.extend(what.iter().copied());
	roots.extend(where_clause.iter().copied());
	roots.extend(group_by.iter().copied());
	roots.extend(having.iter().copied());
	roots.extend(order_by.iter().map(|(id, _)| *id));
	for &src in sources {
		if let NodeKind::Source {
			on,
			unnest_expr,
			..
		} = arena.get(src)
		{
			roots.extend(on.iter().copied());
			roots.extend(unnest_expr.iter().copied());
		}
	}
	roots
}

fn nested_selects(arena: &Arena, select_id: NodeId) -> Vec<NodeId> {
	let mut found = Vec::new();
	for root in select_roots(arena, select_id) {
		NodeKind::for_each_descendant(root, arena, &mut |id, kind| {
			if matches!(kind, NodeKind::Select { .. }) {
				found.push(id);
			}
		});
	}
	found
}

/// Sources (by id) any descendant of this `Select` marks as "uses deleted":
/// a `Meta(Deleted)`/`Meta(None)` (bare `meta()`) referencing that source.
fn sources_using_deleted(arena: &Arena, select_id: NodeId) -> IndexSet<NodeId> {
	let mut used = IndexSet::new();
	for root in select_roots(arena, select_id) {
		NodeKind::for_each_descendant(root, arena, &mut |_, kind| {
			if let NodeKind::Meta {
				property,
				source: Some(source),
			} = kind
			{
				if matches!(property, tables::MetaProperty::Deleted | tables::MetaProperty::None) {
					used.insert(*source);
				}
			}
		});
	}
	used
}

fn resolve_source_tables(arena: &mut Arena, select_id: NodeId, delegate: &dyn Delegate, out: &mut Outputs) -> Result<()> {
	let uses_deleted = sources_using_deleted(arena, select_id);
	let sources = match arena.get(select_id) {
		NodeKind::Select {
			sources,
			..
		} => sources.clone(),
		_ => return Ok(()),
	};

	for src in sources {
		let (kind, scope, collection) = match arena.get(src) {
			NodeKind::Source {
				kind,
				scope,
				collection,
				..
			} => (*kind, scope.clone(), collection.clone()),
			_ => continue,
		};
		if !matches!(kind, SourceKind::Collection | SourceKind::Join) {
			continue;
		}
		let status = if uses_deleted.contains(&src) {
			DeletionStatus::LiveAndDeleted
		} else {
			DeletionStatus::Live
		};
		let table_name = delegate.collection_table_name(&scope, &collection, status)?;
		out.collection_tables_used.insert(table_name.clone());
		if let NodeKind::Source {
			table_name: slot,
			uses_deleted: flag,
			..
		} = arena.get_mut(src)
		{
			*slot = table_name;
			*flag = uses_deleted.contains(&src);
		}
	}
	Ok(())
}

/// §4.4.4: classifies every `VectorDistance` in the select as "hybrid"
/// (nested-SELECT join form) exactly when the WHERE clause is absent
/// entirely or consists solely of a top-level comparison against a vector
/// distance; every other placement uses the JOIN-with-MATCH form. Mirrors
/// `VectorDistanceNode::setIndexSource`'s `_simple` lambda, which treats "no
/// WHERE at all" the same as "WHERE is just the distance test".
fn detect_vector_hybrid(arena: &mut Arena, select_id: NodeId) -> Result<()> {
	let (where_clause, limit) = match arena.get(select_id) {
		NodeKind::Select {
			where_clause,
			limit,
			..
		} => (*where_clause, *limit),
		_ => return Ok(()),
	};

	let simple = match where_clause {
		None => true,
		Some(where_id) => match arena.get(where_id) {
			NodeKind::Op {
				op,
				operands,
			} if matches!(op.op_type, OpType::Infix) && matches!(op.name, "<" | "<=" | ">" | ">=") && operands.len() == 2 => {
				let (lhs, rhs) = (operands[0], operands[1]);
				matches!(
					(arena.get(lhs), arena.get(rhs)),
					(NodeKind::VectorDistance { .. }, NodeKind::Literal(_)) | (NodeKind::Literal(_), NodeKind::VectorDistance { .. })
				)
			}
			_ => false,
		},
	};
	if !simple {
		return Ok(());
	}

	let mut vector_nodes = Vec::new();
	for root in select_roots(arena, select_id) {
		NodeKind::for_each_descendant(root, arena, &mut |id, kind| {
			if matches!(kind, NodeKind::VectorDistance { .. }) {
				vector_nodes.push(id);
			}
		});
	}
	if vector_nodes.is_empty() {
		return Ok(());
	}
	require!(limit.is_some(), "a vector search used as the sole WHERE comparison requires a LIMIT");
	for vd_id in vector_nodes {
		if let NodeKind::VectorDistance {
			hybrid,
			..
		} = arena.get_mut(vd_id)
		{
			*hybrid = true;
			debug!(?vd_id, "vector distance classified as hybrid (nested-SELECT) form");
		}
	}
	Ok(())
}

fn validate_index_placement(arena: &Arena, select_id: NodeId) -> Result<()> {
	let where_clause = match arena.get(select_id) {
		NodeKind::Select {
			where_clause,
			..
		} => *where_clause,
		_ => return Ok(()),
	};
	if let Some(where_id) = where_clause {
		check_index_placement(arena, where_id, true, false)?;
	}
	Ok(())
}

fn check_index_placement(arena: &Arena, id: NodeId, in_top_and_chain: bool, in_or: bool) -> Result<()> {
	match arena.get(id) {
		NodeKind::Select {
			..
		} => Ok(()),
		NodeKind::Op {
			op,
			operands,
		} if op.name.eq_ignore_ascii_case("AND") => {
			for &operand in operands {
				check_index_placement(arena, operand, in_top_and_chain, in_or)?;
			}
			Ok(())
		}
		NodeKind::Op {
			op,
			operands,
		} if op.name.eq_ignore_ascii_case("OR") => {
			for &operand in operands {
				check_index_placement(arena, operand, false, true)?;
			}
			Ok(())
		}
		NodeKind::Match {
			..
		}
		| NodeKind::Rank {
			..
		} => {
			require!(in_top_and_chain, "MATCH()/RANK() may only appear at the top level of WHERE or within a top-level AND");
			Ok(())
		}
		NodeKind::VectorDistance {
			..
		} => {
			require!(!in_or, "APPROX_VECTOR_DISTANCE() may not appear within an OR");
			Ok(())
		}
		other => {
			for child in other.children() {
				check_index_placement(arena, child, false, in_or)?;
			}
			Ok(())
		}
	}
}

enum IndexedNodeTag {
	Match,
	Rank,
	Vector,
	Predictive,
}

fn collect_indexed_nodes(arena: &Arena, select_id: NodeId) -> Vec<(NodeId, IndexedNodeTag)> {
	let mut found = Vec::new();
	for root in select_roots(arena, select_id) {
		NodeKind::for_each_descendant(root, arena, &mut |id, kind| match kind {
			NodeKind::Match {
				..
			} => found.push((id, IndexedNodeTag::Match)),
			NodeKind::Rank {
				..
			} => found.push((id, IndexedNodeTag::Rank)),
			NodeKind::VectorDistance {
				..
			} => found.push((id, IndexedNodeTag::Vector)),
			NodeKind::Prediction {
				..
			} => found.push((id, IndexedNodeTag::Predictive)),
			_ => {}
		});
	}
	found
}

/// A structural digest of an expression for `IndexIdentity.expr_json`: two
/// occurrences of the same model+input call collide onto the same backing
/// table even though the parsed tree no longer carries the original JSON
/// array around to compare directly. Property paths and literals dominate
/// what `PREDICTION()`/`UNNEST()` arguments actually look like in practice;
/// anything else falls back to a node-kind tag so distinct shapes never
/// collide by accident.
fn identity_digest(arena: &Arena, id: NodeId) -> String {
	match arena.get(id) {
		NodeKind::Literal(v) => format!("lit:{v}"),
		NodeKind::Property {
			path, ..
		} => format!("prop:{path}"),
		NodeKind::Parameter {
			name,
		} => format!("param:{name}"),
		NodeKind::Variable {
			name, ..
		} => format!("var:{name}"),
		NodeKind::Meta {
			property, ..
		} => format!("meta:{property:?}"),
		NodeKind::Function {
			spec, args, ..
		} => {
			let parts: Vec<String> = args.iter().map(|a| identity_digest(arena, *a)).collect();
			format!("fn:{}({})", spec.name, parts.join(","))
		}
		NodeKind::Op {
			op, operands,
		} => {
			let parts: Vec<String> = operands.iter().map(|a| identity_digest(arena, *a)).collect();
			format!("op:{}({})", op.name, parts.join(","))
		}
		_ => "other".to_string(),
	}
}

fn primary_source(arena: &Arena, select_id: NodeId) -> Option<NodeId> {
	let sources = match arena.get(select_id) {
		NodeKind::Select {
			sources,
			..
		} => sources,
		_ => return None,
	};
	sources.iter().copied().find(|&s| matches!(arena.get(s), NodeKind::Source { kind: SourceKind::Collection, .. }))
}

fn index_property_name(arena: &Arena, id: NodeId) -> Result<String> {
	match arena.get(id) {
		NodeKind::Literal(Value::String(s)) => Ok(s.clone()),
		NodeKind::Property {
			path,
			..
		} => Ok(path.to_string()),
		_ => Err(crate::err::Error::invalid("MATCH()/RANK() index argument must be a property name")),
	}
}

fn resolve_indexed_nodes(arena: &mut Arena, select_id: NodeId, delegate: &dyn Delegate, out: &mut Outputs) -> Result<()> {
	let nodes = collect_indexed_nodes(arena, select_id);
	if nodes.is_empty() {
		return Ok(());
	}
	let Some(primary) = primary_source(arena, select_id) else {
		return Err(crate::err::Error::invalid("MATCH()/RANK()/APPROX_VECTOR_DISTANCE() require a primary collection source"));
	};
	let (primary_table, collection) = match arena.get(primary) {
		NodeKind::Source {
			table_name,
			collection,
			..
		} => (table_name.clone(), collection.clone()),
		_ => unreachable!(),
	};

	let mut identity_map: HashMap<IndexIdentity, NodeId> = HashMap::new();
	let mut aux_only: HashMap<NodeId, bool> = HashMap::new();
	let mut new_fts_sources = 0usize;

	for (id, tag) in nodes {
		if matches!(tag, IndexedNodeTag::Predictive) {
			let NodeKind::Prediction {
				model,
				input,
				..
			} = arena.get(id)
			else {
				unreachable!()
			};
			let (model, input) = (*model, *input);
			let digest = format!("{}|{}", identity_digest(arena, model), identity_digest(arena, input));
			let identity = IndexIdentity {
				kind: IndexKindKey::Predictive,
				collection: collection.clone(),
				expr_json: digest.clone(),
			};
			let source_id = if let Some(&existing) = identity_map.get(&identity) {
				trace!(?identity.expr_json, "reusing predictive index source");
				Some(existing)
			} else {
				let table_name = predictive_table_name(delegate, &primary_table, &digest)?;
				if !delegate.table_exists(&table_name)? {
					None
				} else {
					let n = identity_map.len() + 1;
					let alias = format!("<idx{n}>");
					debug!(%alias, %table_name, "creating implicit predictive index source");
					let new_id = arena.alloc(NodeKind::IndexSource {
						index_kind: IndexKind::Predictive,
						identity: identity.clone(),
						alias,
						table_name,
						on_source: primary,
						auxiliary_only: false,
					});
					arena.set_parent(new_id, select_id);
					if let NodeKind::Select {
						sources, ..
					} = arena.get_mut(select_id)
					{
						sources.push(new_id);
					}
					identity_map.insert(identity, new_id);
					Some(new_id)
				}
			};
			if let NodeKind::Prediction {
				resolved_index, ..
			} = arena.get_mut(id)
			{
				*resolved_index = source_id;
			}
			continue;
		}

		let (index_kind, kindkey, property) = match tag {
			IndexedNodeTag::Match => {
				let NodeKind::Match {
					index,
					..
				} = arena.get(id)
				else {
					unreachable!()
				};
				(IndexKind::Fts, IndexKindKey::Fts, index_property_name(arena, *index)?)
			}
			IndexedNodeTag::Rank => {
				let NodeKind::Rank {
					index,
					..
				} = arena.get(id)
				else {
					unreachable!()
				};
				(IndexKind::Fts, IndexKindKey::Fts, index_property_name(arena, *index)?)
			}
			IndexedNodeTag::Vector => {
				let NodeKind::VectorDistance {
					expr,
					..
				} = arena.get(id)
				else {
					unreachable!()
				};
				(IndexKind::Vector, IndexKindKey::Vector, index_property_name(arena, *expr)?)
			}
			IndexedNodeTag::Predictive => unreachable!("handled above via early continue"),
		};

		let identity = IndexIdentity {
			kind: kindkey,
			collection: collection.clone(),
			expr_json: property.clone(),
		};

		let source_id = if let Some(&existing) = identity_map.get(&identity) {
			trace!(?identity.expr_json, "reusing index source");
			existing
		} else {
			let n = identity_map.len() + 1;
			let alias = format!("<idx{n}>");
			let table_name = match index_kind {
				IndexKind::Fts => {
					let name = delegate.fts_table_name(&primary_table, &property)?;
					out.fts_tables_used.push(name.clone());
					new_fts_sources += 1;
					name
				}
				IndexKind::Vector => vector_table_name(delegate, &collection, &property)?,
				IndexKind::Unnest | IndexKind::Predictive => unreachable!(),
			};
			debug!(%alias, %table_name, "creating implicit index source");
			let new_id = arena.alloc(NodeKind::IndexSource {
				index_kind,
				identity: identity.clone(),
				alias,
				table_name,
				on_source: primary,
				auxiliary_only: true,
			});
			arena.set_parent(new_id, select_id);
			if let NodeKind::Select {
				sources,
				..
			} = arena.get_mut(select_id)
			{
				sources.push(new_id);
			}
			identity_map.insert(identity, new_id);
			aux_only.insert(new_id, true);
			new_id
		};

		if !matches!(tag, IndexedNodeTag::Rank) {
			aux_only.insert(source_id, false);
		}

		match arena.get_mut(id) {
			NodeKind::Match {
				resolved_index, ..
			}
			| NodeKind::Rank {
				resolved_index, ..
			} => *resolved_index = Some(source_id),
			NodeKind::VectorDistance {
				index, ..
			} => *index = Some(source_id),
			_ => {}
		}
	}

	for (&source_id, &aux) in &aux_only {
		if aux {
			if let NodeKind::IndexSource {
				index_kind: IndexKind::Fts,
				..
			} = arena.get(source_id)
			{
				return Err(crate::err::Error::invalid("RANK() cannot be used without a corresponding MATCH() on the same index"));
			}
		}
		if let NodeKind::IndexSource {
			auxiliary_only, ..
		} = arena.get_mut(source_id)
		{
			*auxiliary_only = aux;
		}
	}

	if new_fts_sources > 0 {
		let is_aggregate = matches!(arena.get(select_id), NodeKind::Select { is_aggregate: true, .. });
		if !is_aggregate {
			if let NodeKind::Select {
				prepended_columns, ..
			} = arena.get_mut(select_id)
			{
				*prepended_columns += 2 * new_fts_sources;
			}
		}
	}

	reuse_repeated_unnests(arena, select_id, delegate, &mut identity_map, &primary_table, &collection, primary)?;

	Ok(())
}

/// A lone `UNNEST()` keeps emitting its virtual `fl_each()` join untouched;
/// only once the *same* array expression is unnested more than once in this
/// select does it pay to materialize one shared index source and fold the
/// extra `Source`s onto it, the same reuse discipline `MATCH`/`RANK`/
/// `APPROX_VECTOR_DISTANCE()` already get. A folded `Source` keeps its own
/// `NodeId` (so `Property`/`Meta` nodes that already captured it as their
/// `source` keep resolving) but its `kind` flips to `SourceKind::Index` so
/// the writer's FROM-clause loop skips emitting a second join for it, and
/// its `alias`/`table_name` are overwritten to the shared index source's, so
/// `column_ref` transparently reads through to the one real join.
fn reuse_repeated_unnests(
	arena: &mut Arena,
	select_id: NodeId,
	delegate: &dyn Delegate,
	identity_map: &mut HashMap<IndexIdentity, NodeId>,
	primary_table: &str,
	collection: &str,
	primary: NodeId,
) -> Result<()> {
	let sources = match arena.get(select_id) {
		NodeKind::Select {
			sources, ..
		} => sources.clone(),
		_ => return Ok(()),
	};

	let unnests: Vec<(NodeId, String)> = sources
		.iter()
		.filter_map(|&src| match arena.get(src) {
			NodeKind::Source {
				kind: SourceKind::Unnest,
				unnest_expr: Some(expr),
				..
			} => Some((src, identity_digest(arena, *expr))),
			_ => None,
		})
		.collect();

	let mut counts: HashMap<&str, usize> = HashMap::new();
	for (_, digest) in &unnests {
		*counts.entry(digest.as_str()).or_insert(0) += 1;
	}

	for (src, digest) in &unnests {
		if counts[digest.as_str()] < 2 {
			continue;
		}
		let identity = IndexIdentity {
			kind: IndexKindKey::Unnest,
			collection: collection.to_string(),
			expr_json: digest.clone(),
		};
		let source_id = if let Some(&existing) = identity_map.get(&identity) {
			existing
		} else {
			let n = identity_map.len() + 1;
			let alias = format!("<idx{n}>");
			let table_name = delegate.unnested_table_name(primary_table, digest)?;
			debug!(%alias, %table_name, "creating shared unnest index source");
			let new_id = arena.alloc(NodeKind::IndexSource {
				index_kind: IndexKind::Unnest,
				identity: identity.clone(),
				alias,
				table_name,
				on_source: primary,
				auxiliary_only: false,
			});
			arena.set_parent(new_id, select_id);
			if let NodeKind::Select {
				sources, ..
			} = arena.get_mut(select_id)
			{
				sources.push(new_id);
			}
			identity_map.insert(identity, new_id);
			new_id
		};

		let (shared_alias, shared_table) = match arena.get(source_id) {
			NodeKind::IndexSource {
				alias, table_name, ..
			} => (alias.clone(), table_name.clone()),
			_ => unreachable!(),
		};
		if let NodeKind::Source {
			alias,
			table_name,
			kind,
			..
		} = arena.get_mut(*src)
		{
			*alias = shared_alias;
			*table_name = shared_table;
			*kind = SourceKind::Index;
		}
	}

	Ok(())
}

#[cfg(feature = "vector-search")]
fn vector_table_name(delegate: &dyn Delegate, collection: &str, property: &str) -> Result<String> {
	delegate.vector_table_name(collection, property, "default")
}

#[cfg(not(feature = "vector-search"))]
fn vector_table_name(_delegate: &dyn Delegate, collection: &str, property: &str) -> Result<String> {
	Ok(format!("{collection}:vector:{property}Index"))
}

#[cfg(feature = "predictive-query")]
fn predictive_table_name(delegate: &dyn Delegate, on_table: &str, digest: &str) -> Result<String> {
	delegate.predictive_table_name(on_table, digest)
}

#[cfg(not(feature = "predictive-query"))]
fn predictive_table_name(_delegate: &dyn Delegate, on_table: &str, digest: &str) -> Result<String> {
	Ok(format!("{on_table}:pred:{digest}"))
}

fn and_node(arena: &mut Arena, a: NodeId, b: NodeId) -> NodeId {
	let op = tables::OPERATION_LIST
		.iter()
		.find(|o| o.name.eq_ignore_ascii_case("AND") && o.op_type == OpType::Infix)
		.expect("AND operator must exist in the operation table");
	let id = arena.alloc(NodeKind::Op {
		op,
		operands: vec![a, b],
	});
	arena.attach(id, [a, b]);
	id
}

/// §4.3: for every `Collection`/`Join` source that does not reference
/// `_deleted`, inject `(<alias>.flags & 1 = 0)` into its owning predicate.
fn inject_deleted_predicates(arena: &mut Arena, select_id: NodeId) -> Result<()> {
	let sources = match arena.get(select_id) {
		NodeKind::Select {
			sources,
			..
		} => sources.clone(),
		_ => return Ok(()),
	};

	for src in sources {
		let (kind, alias, uses_deleted) = match arena.get(src) {
			NodeKind::Source {
				kind,
				alias,
				uses_deleted,
				..
			} => (*kind, alias.clone(), *uses_deleted),
			_ => continue,
		};
		if !matches!(kind, SourceKind::Collection | SourceKind::Join) || uses_deleted {
			continue;
		}
		debug!(%alias, "injecting deleted-doc visibility predicate");
		let predicate = arena.alloc(NodeKind::RawSql(format!("({alias}.flags & 1 = 0)")));

		if kind == SourceKind::Collection {
			let existing = match arena.get(select_id) {
				NodeKind::Select {
					where_clause,
					..
				} => *where_clause,
				_ => None,
			};
			let combined = match existing {
				Some(w) => and_node(arena, w, predicate),
				None => predicate,
			};
			arena.set_parent(combined, select_id);
			if let NodeKind::Select {
				where_clause, ..
			} = arena.get_mut(select_id)
			{
				*where_clause = Some(combined);
			}
			continue;
		}

		// Join: goes into the ON clause, unless this is a CROSS join with no
		// ON at all, in which case it falls back onto the select's WHERE.
		let on = match arena.get(src) {
			NodeKind::Source {
				on, ..
			} => *on,
			_ => None,
		};
		match on {
			Some(existing_on) => {
				let combined = and_node(arena, existing_on, predicate);
				arena.set_parent(combined, src);
				if let NodeKind::Source {
					on, ..
				} = arena.get_mut(src)
				{
					*on = Some(combined);
				}
			}
			None => {
				let existing = match arena.get(select_id) {
					NodeKind::Select {
						where_clause, ..
					} => *where_clause,
					_ => None,
				};
				let combined = match existing {
					Some(w) => and_node(arena, w, predicate),
					None => predicate,
				};
				arena.set_parent(combined, select_id);
				if let NodeKind::Select {
					where_clause, ..
				} = arena.get_mut(select_id)
				{
					*where_clause = Some(combined);
				}
			}
		}
	}
	Ok(())
}

/// §3.4/§8 (Unique titles): explicit aliases are reserved first and kept
/// verbatim; anonymous-but-named columns keep their bare name the first
/// time it's seen and get ` #2`, ` #3`, … on collision; fully anonymous
/// columns are numbered `$1`, `$2`, ….
fn unique_column_titles(arena: &mut Arena, select_id: NodeId) -> Result<()> {
	let whats = match arena.get(select_id) {
		NodeKind::Select {
			what, ..
		} => what.clone(),
		_ => return Ok(()),
	};

	let mut seen: HashMap<String, usize> = HashMap::new();
	for &what_id in &whats {
		if let NodeKind::What {
			name,
			explicit_alias: true,
			..
		} = arena.get(what_id)
		{
			seen.insert(name.to_ascii_lowercase(), 1);
		}
	}

	let mut anon_counter = 0;
	for &what_id in &whats {
		let (name, explicit) = match arena.get(what_id) {
			NodeKind::What {
				name,
				explicit_alias,
				..
			} => (name.clone(), *explicit_alias),
			_ => continue,
		};
		if explicit {
			continue;
		}
		let title = if name.is_empty() {
			anon_counter += 1;
			format!("${anon_counter}")
		} else {
			let key = name.to_ascii_lowercase();
			match seen.get(&key).copied() {
				None => {
					seen.insert(key, 1);
					name
				}
				Some(n) => {
					let next = n + 1;
					seen.insert(key, next);
					format!("{name} #{next}")
				}
			}
		};
		if let NodeKind::What {
			name: slot, ..
		} = arena.get_mut(what_id)
		{
			*slot = title;
		}
	}
	Ok(())
}

fn detect_expiration_usage(arena: &Arena, select_id: NodeId, out: &mut Outputs) {
	for root in select_roots(arena, select_id) {
		NodeKind::for_each_descendant(root, arena, &mut |_, kind| {
			if let NodeKind::Meta {
				property: tables::MetaProperty::Expiration,
				..
			} = kind
			{
				out.uses_expiration = true;
			}
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parser::select::parse_query;

	struct FixtureDelegate;

	impl Delegate for FixtureDelegate {
		fn table_exists(&self, _name: &str) -> Result<bool> {
			Ok(true)
		}
		fn collection_table_name(&self, _scope: &str, collection: &str, _status: DeletionStatus) -> Result<String> {
			Ok(if collection.is_empty() {
				"kv_default".to_string()
			} else {
				format!("kv_{collection}")
			})
		}
		fn fts_table_name(&self, on_table: &str, property: &str) -> Result<String> {
			Ok(format!("{on_table}::{property}"))
		}
		fn unnested_table_name(&self, on_table: &str, property: &str) -> Result<String> {
			Ok(format!("{on_table}:unnest:{property}"))
		}
		#[cfg(feature = "predictive-query")]
		fn predictive_table_name(&self, on_table: &str, property: &str) -> Result<String> {
			Ok(format!("{on_table}:pred:{property}"))
		}
		#[cfg(feature = "vector-search")]
		fn vector_table_name(&self, collection: &str, property_json: &str, metric_name: &str) -> Result<String> {
			Ok(format!("{collection}:vector:{property_json}:{metric_name}"))
		}
	}

	#[test]
	fn injects_deleted_predicate_when_unreferenced() {
		let v = Value::from_json_str(r#"{"WHERE":["=",[".","last"],"Smith"]}"#).unwrap();
		let mut arena = Arena::new();
		let select_id = parse_query(&mut arena, &v).unwrap();
		let mut out = Outputs::default();
		run(&mut arena, select_id, &FixtureDelegate, &mut out).unwrap();
		match arena.get(select_id) {
			NodeKind::Select {
				where_clause: Some(w),
				..
			} => match arena.get(*w) {
				NodeKind::Op {
					op,
					operands,
				} => {
					assert_eq!(op.name, "AND");
					assert_eq!(operands.len(), 2);
				}
				_ => panic!("expected AND"),
			},
			_ => panic!("expected WHERE"),
		}
	}

	#[test]
	fn duplicate_anonymous_titles_get_suffixed() {
		let v = Value::from_json_str(r#"{"WHAT":[[".name"],[".name"]]}"#).unwrap();
		let mut arena = Arena::new();
		let select_id = parse_query(&mut arena, &v).unwrap();
		let mut out = Outputs::default();
		run(&mut arena, select_id, &FixtureDelegate, &mut out).unwrap();
		let titles: Vec<String> = match arena.get(select_id) {
			NodeKind::Select {
				what, ..
			} => what
				.iter()
				.map(|id| match arena.get(*id) {
					NodeKind::What {
						name, ..
					} => name.clone(),
					_ => String::new(),
				})
				.collect(),
			_ => Vec::new(),
		};
		assert_eq!(titles, vec!["name".to_string(), "name #2".to_string()]);
	}

	#[test]
	fn match_and_rank_on_same_property_share_one_index_source() {
		let v = Value::from_json_str(r#"{"WHAT":[["rank()","bio"]],"WHERE":["MATCH()","bio","mobile"]}"#).unwrap();
		let mut arena = Arena::new();
		let select_id = parse_query(&mut arena, &v).unwrap();
		let mut out = Outputs::default();
		run(&mut arena, select_id, &FixtureDelegate, &mut out).unwrap();
		let index_sources = match arena.get(select_id) {
			NodeKind::Select {
				sources, ..
			} => sources
				.iter()
				.filter(|id| matches!(arena.get(**id), NodeKind::IndexSource { .. }))
				.count(),
			_ => 0,
		};
		assert_eq!(index_sources, 1);
	}

	#[test]
	fn rank_without_match_is_rejected() {
		let v = Value::from_json_str(r#"{"WHAT":[["rank()","bio"]]}"#).unwrap();
		let mut arena = Arena::new();
		let select_id = parse_query(&mut arena, &v).unwrap();
		let mut out = Outputs::default();
		assert!(run(&mut arena, select_id, &FixtureDelegate, &mut out).is_err());
	}

	#[test]
	fn match_inside_or_is_rejected() {
		let v = Value::from_json_str(
			r#"{"WHERE":["OR",["MATCH()","bio","mobile"],["=",[".","x"],1]]}"#,
		)
		.unwrap();
		let mut arena = Arena::new();
		let select_id = parse_query(&mut arena, &v).unwrap();
		let mut out = Outputs::default();
		assert!(run(&mut arena, select_id, &FixtureDelegate, &mut out).is_err());
	}
}
