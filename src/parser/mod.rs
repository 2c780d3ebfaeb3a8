//! The expression parser: a pure function from a [`Value`] tree to an AST
//! rooted at an [`NodeId`]. Dispatch is driven by the first element of each
//! array, matched against the operation table and then the function table
//! (§4.1 of the design).

pub mod context;
pub mod resolve;
pub mod select;

use crate::ast::tables::{self, lookup_fn, lookup_op, MetaProperty, OpType, MAX_ARGS};
use crate::ast::{AnyEveryKind, Arena, Collation, NodeId, NodeKind, PropertyAccessor};
use crate::err::{fail, require, Result};
use crate::path::{KeyPath, PathComponent};
use crate::value::Value;
use context::{AliasTarget, ParseContext};

/// Parses any value-tree node into an expression. This is the recursion
/// point every operator-specific parser below calls back into for its
/// operands.
pub fn parse_expr(arena: &mut Arena, ctx: &mut ParseContext, value: &Value) -> Result<NodeId> {
	match value {
		Value::Array(items) => parse_array(arena, ctx, items),
		Value::Dict(dict) => {
			let mut args = Vec::with_capacity(dict.len() * 2);
			for (k, v) in dict {
				args.push(arena.alloc(NodeKind::Literal(Value::String(k.clone()))));
				args.push(parse_expr(arena, ctx, v)?);
			}
			let id = arena.alloc(NodeKind::Function {
				spec: &tables::DICT_OF_FUNCTION,
				args: args.clone(),
				collation: None,
			});
			arena.attach(id, args);
			Ok(id)
		}
		other => Ok(arena.alloc(NodeKind::Literal(other.clone()))),
	}
}

fn parse_array(arena: &mut Arena, ctx: &mut ParseContext, items: &[Value]) -> Result<NodeId> {
	let Some(Value::String(op_name)) = items.first() else {
		fail!("array expression must begin with an operator name string");
	};
	let args = &items[1..];
	let nargs = args.len().min(MAX_ARGS);

	if let Some(op) = lookup_op(op_name, nargs)? {
		return dispatch_op(arena, ctx, op, op_name, args);
	}

	parse_prefix_suffix(arena, ctx, op_name, args)
}

fn dispatch_op(
	arena: &mut Arena,
	ctx: &mut ParseContext,
	op: &'static tables::Operation,
	raw_name: &str,
	args: &[Value],
) -> Result<NodeId> {
	match op.op_type {
		OpType::Property => parse_property(arena, ctx, "", args),
		OpType::Parameter => parse_parameter(arena, args),
		OpType::Variable => parse_variable(arena, ctx, args),
		OpType::ObjectProperty => parse_object_property(arena, ctx, args),
		OpType::ArrayLiteral => parse_array_of(arena, ctx, args),
		OpType::Blob => parse_blob(arena, ctx, args),
		OpType::Missing => Ok(arena.alloc(NodeKind::RawSql("NULL".to_string()))),
		OpType::Exists => parse_exists(arena, ctx, args),
		OpType::In => parse_in(arena, ctx, op, args, false),
		OpType::NotIn => parse_in(arena, ctx, op, args, true),
		OpType::Collate => parse_collate(arena, ctx, args),
		OpType::Case => parse_case(arena, ctx, args),
		OpType::Any => parse_any_every(arena, ctx, AnyEveryKind::Any, args),
		OpType::Every => parse_any_every(arena, ctx, AnyEveryKind::Every, args),
		OpType::AnyAndEvery => parse_any_every(arena, ctx, AnyEveryKind::AnyAndEvery, args),
		OpType::Meta => parse_meta(arena, ctx, args),
		OpType::Select => select::parse_nested_select(arena, ctx, args),
		OpType::Match => parse_match(arena, ctx, args),
		OpType::Rank => parse_rank(arena, ctx, args),
		OpType::VectorDistance => parse_vector_distance(arena, ctx, args),
		OpType::Prediction => parse_prediction(arena, ctx, args),
		OpType::Prefix | OpType::Infix | OpType::Postfix | OpType::Concat | OpType::Is | OpType::IsNot
		| OpType::Like | OpType::Between | OpType::IsValued => {
			parse_generic_op(arena, ctx, op, args)
		}
	}
	.map(|id| {
		let _ = raw_name;
		id
	})
}

fn parse_generic_op(
	arena: &mut Arena,
	ctx: &mut ParseContext,
	op: &'static tables::Operation,
	args: &[Value],
) -> Result<NodeId> {
	let mut operands = Vec::with_capacity(args.len());
	for (i, a) in args.iter().enumerate() {
		let operand = parse_expr(arena, ctx, a)?;
		// Infix comparison/LIKE operators implicitly COLLATE their first
		// operand under the ambient collation, unless an explicit COLLATE
		// has already been emitted somewhere in the subtree.
		let operand = if i == 0 && wants_implicit_collation(op.op_type) && !ctx.collation_applied {
			wrap_implicit_collation(arena, ctx, operand)
		} else {
			operand
		};
		operands.push(operand);
	}
	let id = arena.alloc(NodeKind::Op {
		op,
		operands: operands.clone(),
	});
	arena.attach(id, operands);
	Ok(id)
}

fn wants_implicit_collation(op_type: OpType) -> bool {
	matches!(
		op_type,
		OpType::Infix | OpType::Is | OpType::IsNot | OpType::Like | OpType::Between | OpType::Concat
	)
}

fn wrap_implicit_collation(arena: &mut Arena, ctx: &ParseContext, inner: NodeId) -> NodeId {
	if ctx.collation.is_binary() {
		return inner;
	}
	let id = arena.alloc(NodeKind::Collate {
		inner,
		collation: ctx.collation.clone(),
		needs_keyword: true,
	});
	arena.attach(id, [inner]);
	id
}

fn parse_parameter(arena: &mut Arena, args: &[Value]) -> Result<NodeId> {
	require!(args.len() == 1, "$ requires exactly one argument");
	let name = args[0]
		.as_str()
		.ok_or_else(|| crate::err::Error::invalid("parameter name must be a string"))?;
	require!(
		!name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
		"invalid parameter name '{name}'"
	);
	Ok(arena.alloc(NodeKind::Parameter {
		name: name.to_string(),
	}))
}

fn parse_variable(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	let name = args[0]
		.as_str()
		.ok_or_else(|| crate::err::Error::invalid("variable name must be a string"))?
		.to_string();
	let var = arena.alloc(NodeKind::Variable {
		name,
		returns_body: false,
	});
	if args.len() > 1 {
		let path = KeyPath::parse_components(&args[1..])?;
		return wrap_object_property_path(arena, ctx, var, path);
	}
	Ok(var)
}

fn wrap_object_property_path(arena: &mut Arena, _ctx: &mut ParseContext, container: NodeId, path: KeyPath) -> Result<NodeId> {
	let key_literal = arena.alloc(NodeKind::Literal(Value::String(path.to_string())));
	let op = tables::lookup_op_by_type(OpType::ObjectProperty);
	let id = arena.alloc(NodeKind::Op {
		op,
		operands: vec![container, key_literal],
	});
	arena.attach(id, [container, key_literal]);
	Ok(id)
}

fn parse_object_property(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	require!(args.len() == 2, "_. requires a value and a key");
	// Special case: `["_.", ["META()"], key]` simplifies to a typed Meta
	// property, the same as writing `.{key}` on the meta source directly.
	if let Value::Array(inner) = &args[0] {
		if matches!(inner.first(), Some(Value::String(s)) if s.eq_ignore_ascii_case("META()")) {
			if let Some(key) = args[1].as_str() {
				if let Some(meta) = MetaProperty::lookup(key) {
					let source = ctx.from;
					return Ok(arena.alloc(NodeKind::Meta {
						property: meta,
						source,
					}));
				}
			}
		}
	}
	let value_expr = parse_expr(arena, ctx, &args[0])?;
	let key_expr = parse_expr(arena, ctx, &args[1])?;
	let op = tables::lookup_op_by_type(OpType::ObjectProperty);
	let id = arena.alloc(NodeKind::Op {
		op,
		operands: vec![value_expr, key_expr],
	});
	arena.attach(id, [value_expr, key_expr]);
	Ok(id)
}

fn parse_array_of(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	let mut parsed = Vec::with_capacity(args.len());
	for a in args {
		parsed.push(parse_expr(arena, ctx, a)?);
	}
	let id = arena.alloc(NodeKind::Function {
		spec: &ARRAY_OF_SPEC,
		args: parsed.clone(),
		collation: None,
	});
	arena.attach(id, parsed);
	Ok(id)
}

static ARRAY_OF_SPEC: tables::FunctionSpec = tables::FunctionSpec {
	name: "array_of",
	min_args: 0,
	max_args: 9,
	sqlite_name: None,
	flags: tables::OpFlags::NONE,
};

fn parse_blob(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	require!(args.len() == 1, "BLOB takes exactly one argument");
	let inner = parse_expr(arena, ctx, &args[0])?;
	if let NodeKind::Property {
		accessor,
		..
	} = arena.get_mut(inner)
	{
		*accessor = PropertyAccessor::Blob;
		return Ok(inner);
	}
	fail!("BLOB requires a property argument");
}

fn parse_exists(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	require!(args.len() == 1, "EXISTS takes exactly one argument");
	let inner = parse_expr(arena, ctx, &args[0])?;
	if let NodeKind::Property {
		accessor,
		..
	} = arena.get_mut(inner)
	{
		*accessor = PropertyAccessor::Exists;
		return Ok(inner);
	}
	let op = tables::lookup_op_by_type(OpType::Exists);
	let id = arena.alloc(NodeKind::Op {
		op,
		operands: vec![inner],
	});
	arena.attach(id, [inner]);
	Ok(id)
}

fn parse_in(
	arena: &mut Arena,
	ctx: &mut ParseContext,
	op: &'static tables::Operation,
	args: &[Value],
	negate: bool,
) -> Result<NodeId> {
	require!(args.len() >= 2, "IN requires at least two arguments");
	let needle = parse_expr(arena, ctx, &args[0])?;
	// Literal array RHS (just one item, itself an `["[]", ...]` literal)
	// expands into a plain SQL `IN (...)` list; anything else becomes
	// `array_contains(haystack, needle)`.
	if args.len() == 2 {
		if let Value::Array(rhs) = &args[1] {
			if matches!(rhs.first(), Some(Value::String(s)) if s == "[]") {
				let mut operands = vec![needle];
				for item in &rhs[1..] {
					operands.push(parse_expr(arena, ctx, item)?);
				}
				let id = arena.alloc(NodeKind::Op {
					op,
					operands: operands.clone(),
				});
				arena.attach(id, operands);
				return Ok(id);
			}
		}
	}
	require!(args.len() == 2, "IN against a non-literal array takes exactly one haystack");
	let haystack = parse_expr(arena, ctx, &args[1])?;
	let contains = arena.alloc(NodeKind::Function {
		spec: &ARRAY_CONTAINS_SPEC,
		args: vec![haystack, needle],
		collation: None,
	});
	arena.attach(contains, [haystack, needle]);
	if negate {
		let not_op = tables::OPERATION_LIST
			.iter()
			.find(|o| o.name.eq_ignore_ascii_case("NOT") && o.op_type == OpType::Prefix)
			.expect("NOT operator must exist");
		let id = arena.alloc(NodeKind::Op {
			op: not_op,
			operands: vec![contains],
		});
		arena.attach(id, [contains]);
		return Ok(id);
	}
	Ok(contains)
}

static ARRAY_CONTAINS_SPEC: tables::FunctionSpec = tables::FunctionSpec {
	name: "array_contains",
	min_args: 2,
	max_args: 2,
	sqlite_name: None,
	flags: tables::OpFlags::BOOL,
};

fn parse_collate(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	require!(args.len() == 2, "COLLATE requires an options dict and an expression");
	let opts = args[0]
		.as_dict()
		.ok_or_else(|| crate::err::Error::invalid("COLLATE options must be a dictionary"))?;

	let saved_collation = ctx.collation.clone();
	let saved_applied = ctx.collation_applied;
	let mut collation = ctx.collation.clone();
	for (k, v) in opts {
		match k.to_ascii_uppercase().as_str() {
			"CASE" => collation.case_sensitive = v.as_bool().unwrap_or(true),
			"DIAC" => collation.diacritic_sensitive = v.as_bool().unwrap_or(true),
			"UNICODE" => collation.unicode_aware = v.as_bool().unwrap_or(false),
			"LOCALE" => collation.locale = v.as_str().map(str::to_string),
			_ => {}
		}
	}
	ctx.collation = collation.clone();
	ctx.collation_applied = false;

	let inner = parse_expr(arena, ctx, &args[1])?;

	let result = if ctx.collation_applied {
		inner
	} else {
		let id = arena.alloc(NodeKind::Collate {
			inner,
			collation,
			needs_keyword: true,
		});
		arena.attach(id, [inner]);
		id
	};

	ctx.collation = saved_collation;
	ctx.collation_applied = saved_applied;
	Ok(result)
}

fn parse_case(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	let mut operands = Vec::with_capacity(args.len());
	for a in args {
		operands.push(parse_expr(arena, ctx, a)?);
	}
	let op = tables::lookup_op_by_type(OpType::Case);
	let id = arena.alloc(NodeKind::Op {
		op,
		operands: operands.clone(),
	});
	arena.attach(id, operands);
	Ok(id)
}

fn parse_any_every(arena: &mut Arena, ctx: &mut ParseContext, kind: AnyEveryKind, args: &[Value]) -> Result<NodeId> {
	require!(args.len() == 3, "ANY/EVERY takes exactly three arguments: variable, collection, predicate");
	let var_name = args[0]
		.as_str()
		.ok_or_else(|| crate::err::Error::invalid("ANY/EVERY variable name must be a string"))?
		.to_string();
	let collection = parse_expr(arena, ctx, &args[1])?;
	let predicate = parse_expr(arena, ctx, &args[2])?;
	let id = arena.alloc(NodeKind::AnyEvery {
		kind,
		variable: var_name,
		collection,
		predicate,
	});
	arena.attach(id, [collection, predicate]);
	Ok(id)
}

fn parse_meta(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	let source = if let Some(alias) = args.first().and_then(Value::as_str) {
		Some(resolve::find_alias_source(ctx, alias)?)
	} else {
		match ctx.from {
			Some(from) if ctx.sources.len() <= 1 => Some(from),
			Some(_) => fail!("META() with no argument does not begin with a declared 'AS' alias"),
			None => None,
		}
	};
	Ok(arena.alloc(NodeKind::Meta {
		property: MetaProperty::None,
		source,
	}))
}

fn parse_match(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	require!(args.len() == 2, "MATCH() takes exactly two arguments");
	let index_expr = parse_expr(arena, ctx, &args[0])?;
	let search = parse_expr(arena, ctx, &args[1])?;
	let id = arena.alloc(NodeKind::Match {
		index: index_expr,
		search,
		resolved_index: None,
	});
	arena.attach(id, [index_expr, search]);
	Ok(id)
}

fn parse_rank(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	require!(args.len() == 1, "RANK() takes exactly one argument");
	let index_expr = parse_expr(arena, ctx, &args[0])?;
	let id = arena.alloc(NodeKind::Rank {
		index: index_expr,
		resolved_index: None,
	});
	arena.attach(id, [index_expr]);
	Ok(id)
}

#[allow(unused_variables)]
fn parse_vector_distance(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	require!(
		(2..=5).contains(&args.len()),
		"APPROX_VECTOR_DISTANCE() takes 2 to 5 arguments"
	);
	let expr = parse_expr(arena, ctx, &args[0])?;
	let query = parse_expr(arena, ctx, &args[1])?;
	let metric = args.get(2).and_then(Value::as_str).map(str::to_string);
	let probes = match args.get(3) {
		Some(v) => Some(parse_expr(arena, ctx, v)?),
		None => None,
	};
	if let Some(accurate) = args.get(4) {
		require!(
			!accurate.as_bool().unwrap_or(false),
			"APPROX_VECTOR_DISTANCE() does not support accurate=true"
		);
	}
	let mut children = vec![expr, query];
	if let Some(p) = probes {
		children.push(p);
	}
	let id = arena.alloc(NodeKind::VectorDistance {
		expr,
		query,
		metric,
		probes,
		hybrid: false,
		index: None,
	});
	arena.attach(id, children);
	Ok(id)
}

fn parse_prediction(arena: &mut Arena, ctx: &mut ParseContext, args: &[Value]) -> Result<NodeId> {
	require!((2..=3).contains(&args.len()), "PREDICTION() takes 2 or 3 arguments");
	let model = parse_expr(arena, ctx, &args[0])?;
	let input = parse_expr(arena, ctx, &args[1])?;
	let property = match args.get(2) {
		Some(v) => {
			let Some(s) = v.as_str() else {
				fail!("PREDICTION()'s third argument must be a property path string");
			};
			Some(s.to_string())
		}
		None => None,
	};
	let id = arena.alloc(NodeKind::Prediction {
		model,
		input,
		property,
		resolved_index: None,
	});
	arena.attach(id, [model, input]);
	Ok(id)
}

/// Prefix/suffix fallback dispatch for array operator names that didn't
/// match the operation table: `.`/`_.`-prefixed property paths, `$`/`?`
/// shorthands, and `name()`-suffixed function calls.
fn parse_prefix_suffix(arena: &mut Arena, ctx: &mut ParseContext, op_name: &str, args: &[Value]) -> Result<NodeId> {
	if let Some(rest) = op_name.strip_prefix('.') {
		return parse_property(arena, ctx, rest, args);
	}
	if let Some(rest) = op_name.strip_prefix('$') {
		if !rest.is_empty() {
			require!(
				rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
				"invalid parameter name '{rest}'"
			);
			return Ok(arena.alloc(NodeKind::Parameter {
				name: rest.to_string(),
			}));
		}
	}
	if let Some(rest) = op_name.strip_prefix('?') {
		if !rest.is_empty() {
			let var = arena.alloc(NodeKind::Variable {
				name: rest.to_string(),
				returns_body: false,
			});
			if !args.is_empty() {
				let path = KeyPath::parse_components(args)?;
				return wrap_object_property_path(arena, ctx, var, path);
			}
			return Ok(var);
		}
	}
	if let Some(fn_name) = op_name.strip_suffix("()") {
		let spec = lookup_fn(fn_name, args.len())?;
		let mut parsed = Vec::with_capacity(args.len());
		for a in args {
			parsed.push(parse_expr(arena, ctx, a)?);
		}
		let wants_collation = spec.flags.wants_collation;
		// `array_count(prop)` rewrites to reading the property directly
		// with the `fl_count` SQL accessor rather than calling a function.
		if fn_name.eq_ignore_ascii_case("array_count") && parsed.len() == 1 {
			if let NodeKind::Property {
				accessor,
				..
			} = arena.get_mut(parsed[0])
			{
				*accessor = PropertyAccessor::Count;
				return Ok(parsed[0]);
			}
		}
		let collation = if wants_collation {
			Some(ctx.collation.clone())
		} else {
			None
		};
		let id = arena.alloc(NodeKind::Function {
			spec,
			args: parsed.clone(),
			collation,
		});
		arena.attach(id, parsed);
		return Ok(id);
	}
	fail!("Unknown operator '{op_name}'");
}

/// Parses a property path (`.`/`_.`-stripped path string plus any trailing
/// explicit components) into a `Property` or `Meta` node, resolving the
/// leading alias/meta-shortcut/result-alias segment against `ctx`.
fn parse_property(arena: &mut Arena, ctx: &mut ParseContext, path_str: &str, components: &[Value]) -> Result<NodeId> {
	let mut path = KeyPath::parse(path_str, components)?;

	if let Some(PathComponent::Key(first)) = path.get(0) {
		if let Some(meta) = MetaProperty::lookup_shortcut(first) {
			path.drop_components(1);
			require!(path.is_empty(), "meta shortcut property '{first}' does not take a further path");
			let source = resolve::resolve_property_source(arena, &mut path, ctx)?;
			return Ok(arena.alloc(NodeKind::Meta {
				property: meta,
				source,
			}));
		}
		if let Some(target) = ctx.aliases.get(first).copied() {
			if let AliasTarget::What(what_id) = target {
				path.drop_components(1);
				return Ok(bind_to_what_alias(arena, what_id, path));
			}
		}
	}

	let source = resolve::resolve_property_source(arena, &mut path, ctx)?;
	Ok(arena.alloc(NodeKind::Property {
		source,
		path,
		accessor: PropertyAccessor::Value,
	}))
}

fn bind_to_what_alias(arena: &mut Arena, what_id: NodeId, remaining: KeyPath) -> NodeId {
	let alias_name = if let NodeKind::What {
		name,
		..
	} = arena.get(what_id)
	{
		name.clone()
	} else {
		String::new()
	};
	if remaining.is_empty() {
		return arena.alloc(NodeKind::RawSql(alias_name));
	}
	let accessor = arena.alloc(NodeKind::RawSql(alias_name));
	let key_literal = arena.alloc(NodeKind::Literal(Value::String(remaining.to_string())));
	let op = tables::lookup_op_by_type(OpType::ObjectProperty);
	let id = arena.alloc(NodeKind::Op {
		op,
		operands: vec![accessor, key_literal],
	});
	arena.attach(id, [accessor, key_literal]);
	id
}

/// Builds the `_<name>` collation-scope-aware fallback used when a COLLATE
/// result still needs rendering even though an explicit keyword already
/// exists in a nested expression.
pub(crate) fn default_collation_for(ctx: &ParseContext) -> Collation {
	ctx.collation.clone()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn expr(json: &str) -> (Arena, ParseContext, NodeId) {
		let v = Value::from_json_str(json).unwrap();
		let mut arena = Arena::new();
		let mut ctx = ParseContext::new();
		let id = parse_expr(&mut arena, &mut ctx, &v).unwrap();
		(arena, ctx, id)
	}

	#[test]
	fn parses_equality_into_infix_op() {
		let (arena, _, id) = expr(r#"["=", [".", "name"], "bob"]"#);
		match arena.get(id) {
			NodeKind::Op {
				op,
				operands,
			} => {
				assert_eq!(op.name, "=");
				assert_eq!(operands.len(), 2);
			}
			_ => panic!("expected Op"),
		}
	}

	#[test]
	fn dotted_string_shorthand_produces_property() {
		let (arena, _, id) = expr(r#"[".first"]"#);
		assert!(matches!(arena.get(id), NodeKind::Property { .. }));
	}

	#[test]
	fn meta_shortcut_produces_meta_node() {
		let (arena, _, id) = expr(r#"[".", "_id"]"#);
		assert!(matches!(
			arena.get(id),
			NodeKind::Meta {
				property: MetaProperty::Id,
				..
			}
		));
	}

	#[test]
	fn in_with_literal_array_builds_op_not_function() {
		let (arena, _, id) = expr(r#"["IN", [".", "x"], ["[]", 1, 2, 3]]"#);
		match arena.get(id) {
			NodeKind::Op {
				op,
				operands,
			} => {
				assert_eq!(op.name, "IN");
				assert_eq!(operands.len(), 4);
			}
			_ => panic!("expected Op"),
		}
	}

	#[test]
	fn unknown_operator_fails() {
		assert!(Value::from_json_str(r#"["bogus_op_xyz", 1]"#)
			.map(|v| {
				let mut arena = Arena::new();
				let mut ctx = ParseContext::new();
				parse_expr(&mut arena, &mut ctx, &v)
			})
			.unwrap()
			.is_err());
	}
}
