//! SELECT-statement parsing (§4.1): FROM/WHAT/WHERE/ORDER BY/GROUP BY/HAVING/
//! LIMIT/OFFSET, in the dependency order the design calls for so forward
//! alias references (a JOIN's `ON` referring to a later source, a `WHAT`
//! alias referenced by `WHERE`) resolve correctly.

use crate::ast::tables::lookup_fn;
use crate::ast::{Arena, JoinType, NodeId, NodeKind, SourceKind};
use crate::collection::CollectionPath;
use crate::err::{require, Result};
use crate::path::KeyPath;
use crate::value::Value;

use super::context::{AliasTarget, ParseContext};
use super::resolve::ANONYMOUS_SOURCE_ALIAS;
use super::parse_expr;

/// Parses a whole query: either a dict (the `SELECT` body directly) or an
/// `["SELECT", {...}]` array, with a fresh top-level `ParseContext`.
pub fn parse_query(arena: &mut Arena, value: &Value) -> Result<NodeId> {
	let mut ctx = ParseContext::new();
	let dict = select_dict(value)?;
	parse_select_dict(arena, &mut ctx, dict)
}

/// The `SELECT` operator dispatch: a nested subquery always gets a *fresh*
/// `ParseContext` so its aliases cannot leak into (or shadow) the outer
/// scope (§4.1).
pub fn parse_nested_select(arena: &mut Arena, _outer_ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	require!(args.len() == 1, "SELECT takes exactly one argument");
	let mut inner_ctx = ParseContext::new();
	let dict = select_dict(&args[0])?;
	parse_select_dict(arena, &mut inner_ctx, dict)
}

fn select_dict(value: &Value) -> Result<&indexmap::IndexMap<String, Value>> {
	if let Some((op, args)) = value.as_operation() {
		if op.eq_ignore_ascii_case("SELECT") {
			require!(args.len() == 1, "SELECT takes exactly one argument");
			return select_dict(&args[0]);
		}
	}
	value.as_dict().ok_or_else(|| crate::err::Error::invalid("expected a SELECT dictionary"))
}

const FORBIDDEN_ALIAS_CHARS: &[char] = &['\'', '"', '\\', ':'];

fn validate_alias(name: &str) -> Result<()> {
	require!(!name.is_empty(), "an 'AS' alias must not be empty");
	require!(
		!name.chars().any(|c| FORBIDDEN_ALIAS_CHARS.contains(&c)),
		"invalid character in alias '{name}'"
	);
	Ok(())
}

fn register_alias(ctx: &mut ParseContext, name: &str, target: AliasTarget) -> Result<()> {
	require!(
		ctx.aliases.keys().all(|existing| !existing.eq_ignore_ascii_case(name)),
		"duplicate alias '{name}'"
	);
	ctx.aliases.insert(name.to_string(), target);
	Ok(())
}

struct DeferredSource {
	id: NodeId,
	on_raw: Option<Value>,
	unnest_raw: Option<Value>,
}

fn parse_select_dict(
	arena: &mut Arena,
	ctx: &mut ParseContext,
	dict: &indexmap::IndexMap<String, Value>,
) -> Result<NodeId> {
	// Step 1 + 2: FROM sources, registering aliases as they're created.
	let default_from = default_collection_dict();
	let from_items: Vec<Value> = match dict.get("FROM") {
		Some(Value::Array(items)) => items.clone(),
		Some(other) => vec![other.clone()],
		None => vec![default_from],
	};
	require!(!from_items.is_empty(), "FROM must name at least one source");

	let mut deferred = Vec::with_capacity(from_items.len());
	for (i, item) in from_items.iter().enumerate() {
		deferred.push(parse_from_item(arena, ctx, item, i == 0)?);
	}

	// Step 3: WHAT wrappers, aliases registered before expressions are parsed
	// so later WHAT entries, WHERE, etc. can reference them forward.
	let what_items: Vec<Value> = match dict.get("WHAT") {
		Some(Value::Array(items)) if !items.is_empty() => items.clone(),
		_ => default_what_items(),
	};
	let mut what_ids = Vec::with_capacity(what_items.len());
	let mut what_raw = Vec::with_capacity(what_items.len());
	for item in &what_items {
		let (raw_expr, explicit_alias) = split_as_alias(item)?;
		let (name, has_explicit) = match &explicit_alias {
			Some(alias) => {
				validate_alias(alias)?;
				(alias.clone(), true)
			}
			None => (default_column_name(raw_expr).unwrap_or_default(), false),
		};
		let placeholder = arena.alloc(NodeKind::Literal(Value::Null));
		let what_id = arena.alloc(NodeKind::What {
			expr: placeholder,
			name: name.clone(),
			explicit_alias: has_explicit,
		});
		arena.set_parent(placeholder, what_id);
		if has_explicit {
			register_alias(ctx, &name, AliasTarget::What(what_id))?;
		}
		what_ids.push(what_id);
		what_raw.push(raw_expr.clone());
	}

	// Step 4: deferred Source ON/UNNEST parsing, now that every alias (FROM
	// and WHAT) is registered.
	for d in &deferred {
		if let Some(on_raw) = &d.on_raw {
			let on_id = parse_expr(arena, ctx, on_raw)?;
			arena.set_parent(on_id, d.id);
			if let NodeKind::Source {
				on,
				..
			} = arena.get_mut(d.id)
			{
				*on = Some(on_id);
			}
		}
		if let Some(unnest_raw) = &d.unnest_raw {
			let unnest_id = parse_expr(arena, ctx, unnest_raw)?;
			arena.set_parent(unnest_id, d.id);
			if let NodeKind::Source {
				unnest_expr,
				..
			} = arena.get_mut(d.id)
			{
				*unnest_expr = Some(unnest_id);
			}
		}
	}

	// Step 5: WHAT expressions.
	for (what_id, raw) in what_ids.iter().zip(what_raw.iter()) {
		let expr_id = parse_expr(arena, ctx, raw)?;
		arena.set_parent(expr_id, *what_id);
		if let NodeKind::What {
			expr,
			..
		} = arena.get_mut(*what_id)
		{
			*expr = expr_id;
		}
	}

	// Step 6: WHERE, ORDER BY, DISTINCT, GROUP BY, HAVING, LIMIT, OFFSET.
	let where_clause = match dict.get("WHERE") {
		Some(v) => Some(parse_expr(arena, ctx, v)?),
		None => None,
	};

	let order_by = match dict.get("ORDER_BY") {
		Some(Value::Array(items)) => {
			let mut parsed = Vec::with_capacity(items.len());
			for item in items {
				parsed.push(parse_order_by_item(arena, ctx, item)?);
			}
			parsed
		}
		_ => Vec::new(),
	};

	let distinct = dict.get("DISTINCT").and_then(Value::as_bool).unwrap_or(false);

	let group_by = match dict.get("GROUP_BY") {
		Some(Value::Array(items)) => {
			let mut parsed = Vec::with_capacity(items.len());
			for item in items {
				parsed.push(parse_expr(arena, ctx, item)?);
			}
			parsed
		}
		_ => Vec::new(),
	};

	let having = match dict.get("HAVING") {
		Some(v) => Some(parse_expr(arena, ctx, v)?),
		None => None,
	};

	let limit = match dict.get("LIMIT") {
		Some(v) => Some(parse_limit_offset(arena, ctx, v)?),
		None => None,
	};
	let offset = match dict.get("OFFSET") {
		Some(v) => Some(parse_limit_offset(arena, ctx, v)?),
		None => None,
	};

	let is_aggregate = distinct
		|| !group_by.is_empty()
		|| what_ids.iter().any(|id| contains_aggregate(arena, *id));

	let sources: Vec<NodeId> = deferred.iter().map(|d| d.id).collect();

	let select_id = arena.alloc(NodeKind::Select {
		what: what_ids.clone(),
		sources: sources.clone(),
		where_clause,
		group_by: group_by.clone(),
		having,
		order_by: order_by.clone(),
		limit,
		offset,
		distinct,
		is_aggregate,
		prepended_columns: 0,
	});
	arena.attach(select_id, what_ids);
	arena.attach(select_id, sources);
	arena.attach(select_id, where_clause);
	arena.attach(select_id, group_by);
	arena.attach(select_id, having);
	arena.attach(select_id, order_by.iter().map(|(id, _)| *id).collect::<Vec<_>>());
	arena.attach(select_id, limit);
	arena.attach(select_id, offset);

	Ok(select_id)
}

fn default_collection_dict() -> Value {
	Value::Dict(indexmap::IndexMap::new())
}

fn default_what_items() -> Vec<Value> {
	vec![
		Value::Array(vec![Value::from("."), Value::from("_id")]),
		Value::Array(vec![Value::from("."), Value::from("_sequence")]),
	]
}

fn parse_from_item(arena: &mut Arena, ctx: &mut ParseContext, item: &Value, is_primary: bool) -> Result<DeferredSource> {
	let dict = item
		.as_dict()
		.ok_or_else(|| crate::err::Error::invalid("each FROM item must be a dictionary"))?;

	let unnest_raw = dict.get("UNNEST").cloned();
	let on_raw = dict.get("ON").cloned();
	let explicit_alias = dict.get("AS").and_then(Value::as_str).map(str::to_string);
	let join_name = dict.get("JOIN").and_then(Value::as_str);

	if let Some(alias) = &explicit_alias {
		validate_alias(alias)?;
	}

	let collection_str = dict.get("COLLECTION").and_then(Value::as_str).unwrap_or("");
	let scope_str = dict.get("SCOPE").and_then(Value::as_str);
	let path = match scope_str {
		Some(scope) => CollectionPath {
			scope: canonicalize_scope(scope),
			collection: canonicalize_scope(collection_str),
		},
		None => CollectionPath::parse(collection_str),
	};

	let kind = if unnest_raw.is_some() {
		SourceKind::Unnest
	} else if is_primary {
		require!(on_raw.is_none() && join_name.is_none(), "the primary FROM source cannot specify JOIN/ON");
		SourceKind::Collection
	} else {
		SourceKind::Join
	};

	let join = match kind {
		SourceKind::Join => {
			let jt = join_name.map(JoinType::lookup).unwrap_or(Some(JoinType::Inner));
			let jt = jt.ok_or_else(|| crate::err::Error::invalid(format!("unknown JOIN type '{}'", join_name.unwrap_or(""))))?;
			match jt {
				JoinType::Cross => require!(on_raw.is_none(), "CROSS JOIN cannot accept an ON clause"),
				_ => require!(on_raw.is_some(), "JOIN requires an ON clause"),
			}
			Some(jt)
		}
		_ => None,
	};

	let has_explicit_alias = explicit_alias.is_some();
	let alias = explicit_alias.unwrap_or_else(|| {
		if path.collection.is_empty() && kind == SourceKind::Collection {
			ANONYMOUS_SOURCE_ALIAS.to_string()
		} else if !path.collection.is_empty() {
			path.collection.clone()
		} else {
			format!("_src{}", ctx.sources.len())
		}
	});

	let source_id = arena.alloc(NodeKind::Source {
		kind,
		scope: path.scope.clone(),
		collection: path.collection.clone(),
		alias: alias.clone(),
		table_name: String::new(),
		join,
		on: None,
		unnest_expr: None,
		uses_deleted: false,
		has_explicit_alias,
	});

	register_alias(ctx, &alias, AliasTarget::Source(source_id))?;
	ctx.sources.push(source_id);
	if is_primary {
		ctx.from = Some(source_id);
	}

	Ok(DeferredSource {
		id: source_id,
		on_raw,
		unnest_raw,
	})
}

fn canonicalize_scope(name: &str) -> String {
	if name.is_empty() || name == "_" || name.eq_ignore_ascii_case("_default") {
		String::new()
	} else {
		name.to_string()
	}
}

/// Recognizes the `["AS", expr, alias]` WHAT-item wrapper.
fn split_as_alias(item: &Value) -> Result<(&Value, Option<String>)> {
	if let Value::Array(items) = item {
		if let Some(Value::String(op)) = items.first() {
			if op.eq_ignore_ascii_case("AS") {
				require!(items.len() == 3, "AS takes exactly an expression and an alias");
				let alias = items[2]
					.as_str()
					.ok_or_else(|| crate::err::Error::invalid("AS alias must be a string"))?
					.to_string();
				return Ok((&items[1], Some(alias)));
			}
		}
	}
	Ok((item, None))
}

/// Best-effort default title for an anonymous `WHAT` entry: the tail
/// component of a property path, when the expression is one. Anything else
/// is left unnamed for the post-processor's uniqueness pass to fill in.
fn default_column_name(value: &Value) -> Option<String> {
	let (op, args) = value.as_operation()?;
	let (path_str, components): (&str, &[Value]) = if op == "." {
		("", args)
	} else if let Some(rest) = op.strip_prefix('.') {
		if rest.is_empty() {
			return None;
		}
		(rest, args)
	} else {
		return None;
	};
	let path = KeyPath::parse(path_str, components).ok()?;
	match path.0.last()? {
		crate::path::PathComponent::Key(k) => Some(k.clone()),
		crate::path::PathComponent::Index(_) => None,
	}
}

fn parse_order_by_item(arena: &mut Arena, ctx: &mut ParseContext, item: &Value) -> Result<(NodeId, bool)> {
	if let Some((op, args)) = item.as_operation() {
		if op.eq_ignore_ascii_case("ASC") && args.len() == 1 {
			return Ok((parse_expr(arena, ctx, &args[0])?, false));
		}
		if op.eq_ignore_ascii_case("DESC") && args.len() == 1 {
			return Ok((parse_expr(arena, ctx, &args[0])?, true));
		}
	}
	Ok((parse_expr(arena, ctx, item)?, false))
}

/// LIMIT/OFFSET: a literal integer is kept as-is; any other expression is
/// wrapped as `GREATEST(expr, 0)` so a negative runtime value reads as zero
/// rather than "unlimited" (§4.1 step 6).
fn parse_limit_offset(arena: &mut Arena, ctx: &mut ParseContext, value: &Value) -> Result<NodeId> {
	let expr_id = parse_expr(arena, ctx, value)?;
	if matches!(value, Value::Int(_)) {
		return Ok(expr_id);
	}
	let zero = arena.alloc(NodeKind::Literal(Value::Int(0)));
	let spec = lookup_fn("greatest", 2)?;
	let args = vec![expr_id, zero];
	let id = arena.alloc(NodeKind::Function {
		spec,
		args: args.clone(),
		collation: None,
	});
	arena.attach(id, args);
	Ok(id)
}

/// Whether `id`'s subtree (not crossing into a nested `Select`) uses an
/// aggregate function/operator, making the owning `Select` an aggregate
/// query (glossary: "a query with DISTINCT, a GROUP BY, or an aggregate
/// function in WHAT").
fn contains_aggregate(arena: &Arena, id: NodeId) -> bool {
	let mut found = false;
	NodeKind::for_each_descendant(id, arena, &mut |_, kind| {
		if kind.result_flags().aggregate {
			found = true;
		}
	});
	found
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::Value;

	fn select(json: &str) -> (Arena, NodeId) {
		let v = Value::from_json_str(json).unwrap();
		let mut arena = Arena::new();
		let id = parse_query(&mut arena, &v).unwrap();
		(arena, id)
	}

	#[test]
	fn default_from_and_what_produce_id_and_sequence() {
		let (arena, id) = select(r#"{"WHERE":["=",[".","last"],"Smith"]}"#);
		match arena.get(id) {
			NodeKind::Select {
				what,
				sources,
				..
			} => {
				assert_eq!(what.len(), 2);
				assert_eq!(sources.len(), 1);
			}
			_ => panic!("expected Select"),
		}
	}

	#[test]
	fn explicit_what_alias_is_registered_and_reachable() {
		let (arena, id) = select(r#"{"WHAT":[["AS",[".","name"],"n"]], "ORDER_BY":[[".","n"]]}"#);
		match arena.get(id) {
			NodeKind::Select {
				order_by,
				..
			} => {
				assert_eq!(order_by.len(), 1);
			}
			_ => panic!("expected Select"),
		}
	}

	#[test]
	fn join_without_on_fails() {
		let v = Value::from_json_str(r#"{"FROM":[{"AS":"a"},{"AS":"b","JOIN":"INNER"}]}"#).unwrap();
		let mut arena = Arena::new();
		assert!(parse_query(&mut arena, &v).is_err());
	}

	#[test]
	fn cross_join_with_on_fails() {
		let v = Value::from_json_str(
			r#"{"FROM":[{"AS":"a"},{"AS":"b","JOIN":"CROSS","ON":["=",[".","a","x"],[".","b","x"]]}]}"#,
		)
		.unwrap();
		let mut arena = Arena::new();
		assert!(parse_query(&mut arena, &v).is_err());
	}

	#[test]
	fn aggregate_detected_from_count_in_what() {
		let (arena, id) = select(r#"{"WHAT":[["count()"]]}"#);
		match arena.get(id) {
			NodeKind::Select {
				is_aggregate,
				..
			} => assert!(*is_aggregate),
			_ => panic!("expected Select"),
		}
	}
}
