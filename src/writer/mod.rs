//! The SQL writer (§4.5): turns a post-processed `Select` (or a bare
//! expression) into SQLite text. Every node type has exactly one emission
//! rule; the only structural decision made here is parenthesization, which
//! compares a child's own precedence against the precedence the parent
//! operator requires (see the constants in `ast::tables`).

use crate::ast::tables::{self, MetaProperty, OpType};
use crate::ast::{Arena, IndexKind, NodeId, NodeKind, SourceKind};
use crate::err::Result;
use crate::value::Value;

pub struct Writer<'a> {
	arena: &'a Arena,
	body_column: &'a str,
}

impl<'a> Writer<'a> {
	pub fn new(arena: &'a Arena, body_column: &'a str) -> Self {
		Writer {
			arena,
			body_column,
		}
	}

	/// Renders a full `Select` node as a standalone statement (no trailing
	/// semicolon, no surrounding parens).
	pub fn write_select(&self, select_id: NodeId) -> Result<String> {
		self.render_select_body(select_id)
	}

	/// Renders any expression node on its own, as used by the façade's
	/// `expression_sql`/`where_clause_sql` helpers (§4.6): no enclosing
	/// source context, so a bare `Property` with no `source` reads straight
	/// off the configured body column.
	pub fn write_expression(&self, id: NodeId) -> Result<String> {
		let mut buf = String::new();
		self.write_node(&mut buf, id)?;
		Ok(buf)
	}

	fn write_node(&self, buf: &mut String, id: NodeId) -> Result<()> {
		match self.arena.get(id) {
			NodeKind::Literal(v) => {
				buf.push_str(&self.write_literal(v));
			}
			NodeKind::Meta {
				property,
				source,
			} => {
				buf.push_str(&self.write_meta(*source, property));
			}
			NodeKind::Parameter {
				name,
			} => {
				buf.push_str("$_");
				buf.push_str(name);
			}
			NodeKind::Property {
				source,
				path,
				accessor,
			} => {
				buf.push_str(&self.write_property(*source, path, *accessor));
			}
			NodeKind::Variable {
				name,
				..
			} => {
				buf.push_str(name);
			}
			NodeKind::Collate {
				inner,
				collation,
				needs_keyword,
			} => {
				self.write_operand(buf, *inner, tables::COLLATE_PRECEDENCE)?;
				if *needs_keyword {
					buf.push_str(" COLLATE ");
					buf.push_str(&collation.sqlite_name());
				}
			}
			NodeKind::RawSql(sql) => buf.push_str(sql),
			NodeKind::Op {
				op,
				operands,
			} => self.write_op(buf, op, operands)?,
			NodeKind::AnyEvery {
				kind,
				variable,
				collection,
				predicate,
			} => self.write_any_every(buf, *kind, variable, *collection, *predicate)?,
			NodeKind::Function {
				spec,
				args,
				collation,
			} => {
				buf.push_str(spec.sql_name());
				buf.push('(');
				for (i, &arg) in args.iter().enumerate() {
					if i > 0 {
						buf.push_str(", ");
					}
					self.write_node(buf, arg)?;
				}
				if spec.flags.wants_collation {
					if !args.is_empty() {
						buf.push_str(", ");
					}
					let name = collation.clone().unwrap_or_default().sqlite_name();
					buf.push('\'');
					buf.push_str(&name.replace('\'', "''"));
					buf.push('\'');
				}
				buf.push(')');
			}
			NodeKind::Match {
				resolved_index,
				search,
				..
			} => {
				let Some(idx) = resolved_index else {
					return Err(crate::err::Error::internal("MATCH() written before its index was resolved"));
				};
				buf.push_str(&self.fts_column_ref(*idx));
				buf.push_str(" MATCH ");
				self.write_node(buf, *search)?;
			}
			NodeKind::Rank {
				resolved_index,
				..
			} => {
				let Some(idx) = resolved_index else {
					return Err(crate::err::Error::internal("RANK() written before its index was resolved"));
				};
				buf.push_str("rank(matchinfo(");
				buf.push_str(&self.fts_column_ref(*idx));
				buf.push_str("))");
			}
			NodeKind::VectorDistance {
				index, ..
			} => {
				let Some(idx) = index else {
					return Err(crate::err::Error::internal("APPROX_VECTOR_DISTANCE() written before its index was resolved"));
				};
				buf.push_str(&quote_ident(&self.alias_for(*idx)));
				buf.push_str(".distance");
			}
			NodeKind::Prediction {
				model,
				input,
				property,
				resolved_index,
			} => {
				match resolved_index {
					Some(idx) => {
						let col = format!("{}.{}", quote_ident(&self.alias_for(*idx)), self.body_column);
						match property {
							Some(p) => buf.push_str(&format!("fl_value({col}, {})", quote_string(p))),
							None => buf.push_str(&format!("fl_root({col})")),
						}
					}
					None => {
						let nargs = if property.is_some() { 3 } else { 2 };
						let fn_name = tables::lookup_fn("prediction", nargs)?.sql_name();
						buf.push_str(fn_name);
						buf.push('(');
						self.write_node(buf, *model)?;
						buf.push_str(", ");
						self.write_node(buf, *input)?;
						if let Some(p) = property {
							buf.push_str(", ");
							buf.push_str(&quote_string(p));
						}
						buf.push(')');
					}
				}
			}
			NodeKind::What {
				expr, ..
			} => self.write_node(buf, *expr)?,
			NodeKind::Source {
				..
			}
			| NodeKind::IndexSource {
				..
			} => {
				return Err(crate::err::Error::internal("a Source node cannot appear inside an expression"));
			}
			NodeKind::Select {
				..
			} => {
				buf.push('(');
				buf.push_str(&self.render_select_body(id)?);
				buf.push(')');
			}
		}
		Ok(())
	}

	fn write_operand(&self, buf: &mut String, id: NodeId, min_prec: i32) -> Result<()> {
		if node_precedence(self.arena, id) < min_prec {
			buf.push('(');
			self.write_node(buf, id)?;
			buf.push(')');
		} else {
			self.write_node(buf, id)?;
		}
		Ok(())
	}

	fn write_op(&self, buf: &mut String, op: &tables::Operation, operands: &[NodeId]) -> Result<()> {
		match op.op_type {
			OpType::Prefix if op.name == "-" => {
				buf.push('-');
				self.write_operand(buf, operands[0], op.precedence)?;
			}
			OpType::Prefix => {
				buf.push_str(op.name);
				buf.push(' ');
				self.write_operand(buf, operands[0], op.precedence)?;
			}
			OpType::ArrayLiteral => {
				buf.push_str("array_of(");
				for (i, &o) in operands.iter().enumerate() {
					if i > 0 {
						buf.push_str(", ");
					}
					self.write_node(buf, o)?;
				}
				buf.push(')');
			}
			OpType::In | OpType::NotIn => {
				self.write_operand(buf, operands[0], op.precedence)?;
				buf.push_str(if matches!(op.op_type, OpType::In) {
					" IN ("
				} else {
					" NOT IN ("
				});
				for (i, &o) in operands[1..].iter().enumerate() {
					if i > 0 {
						buf.push_str(", ");
					}
					self.write_node(buf, o)?;
				}
				buf.push(')');
			}
			OpType::Between => {
				self.write_operand(buf, operands[0], op.precedence)?;
				buf.push_str(" BETWEEN ");
				self.write_operand(buf, operands[1], op.precedence)?;
				buf.push_str(" AND ");
				self.write_operand(buf, operands[2], op.precedence)?;
			}
			OpType::Exists => {
				buf.push_str("EXISTS(");
				self.write_node(buf, operands[0])?;
				buf.push(')');
			}
			OpType::IsValued => {
				buf.push('(');
				self.write_node(buf, operands[0])?;
				buf.push_str(" IS NOT NULL)");
			}
			OpType::Case => {
				buf.push_str("CASE");
				let mut i = 0;
				while i + 1 < operands.len() {
					buf.push_str(" WHEN ");
					self.write_node(buf, operands[i])?;
					buf.push_str(" THEN ");
					self.write_node(buf, operands[i + 1])?;
					i += 2;
				}
				if i < operands.len() {
					buf.push_str(" ELSE ");
					self.write_node(buf, operands[i])?;
				}
				buf.push_str(" END");
			}
			// A non-binary COLLATE on the LHS can't use SQLite's built-in LIKE
			// (always case-sensitive), so it's rerouted through fl_like with the
			// collation name passed explicitly; otherwise plain LIKE with the
			// escape character N1QL expects.
			OpType::Like => {
				if let NodeKind::Collate {
					inner,
					collation,
					..
				} = self.arena.get(operands[0])
				{
					if !collation.is_binary() {
						let fn_name = tables::lookup_fn("fl_like", 2)?.sql_name();
						buf.push_str(fn_name);
						buf.push('(');
						self.write_node(buf, *inner)?;
						buf.push_str(", ");
						self.write_node(buf, operands[1])?;
						buf.push_str(", ");
						buf.push_str(&quote_string(&collation.sqlite_name()));
						buf.push(')');
						return Ok(());
					}
				}
				self.write_operand(buf, operands[0], op.precedence)?;
				buf.push_str(" LIKE ");
				self.write_operand(buf, operands[1], op.precedence)?;
				buf.push_str(" ESCAPE '\\'");
			}
			// Infix, Concat, Is, IsNot and plain comparisons all share the same
			// "a OP b [OP c ...]" shape; only the separator text differs.
			_ => {
				let sep = match op.op_type {
					OpType::Concat => " || ".to_string(),
					OpType::Is => " IS ".to_string(),
					OpType::IsNot => " IS NOT ".to_string(),
					_ => format!(" {} ", op.name),
				};
				for (i, &o) in operands.iter().enumerate() {
					if i > 0 {
						buf.push_str(&sep);
					}
					self.write_operand(buf, o, op.precedence)?;
				}
			}
		}
		Ok(())
	}

	fn write_any_every(
		&self,
		buf: &mut String,
		kind: crate::ast::AnyEveryKind,
		variable: &str,
		collection: NodeId,
		predicate: NodeId,
	) -> Result<()> {
		use crate::ast::AnyEveryKind;

		if let AnyEveryKind::Any = kind {
			if let Some(sql) = self.try_fl_contains(variable, collection, predicate)? {
				buf.push_str(&sql);
				return Ok(());
			}
		}

		let mut collection_sql = String::new();
		self.write_node(&mut collection_sql, collection)?;
		let mut predicate_sql = String::new();
		self.write_node(&mut predicate_sql, predicate)?;

		match kind {
			AnyEveryKind::Any => {
				buf.push_str(&format!("EXISTS(SELECT 1 FROM fl_each({collection_sql}) AS {variable} WHERE {predicate_sql})"));
			}
			AnyEveryKind::Every => {
				buf.push_str(&format!(
					"NOT EXISTS(SELECT 1 FROM fl_each({collection_sql}) AS {variable} WHERE NOT ({predicate_sql}))"
				));
			}
			AnyEveryKind::AnyAndEvery => {
				buf.push_str(&format!(
					"(EXISTS(SELECT 1 FROM fl_each({collection_sql}) AS {variable} WHERE {predicate_sql}) AND NOT EXISTS(SELECT 1 FROM fl_each({collection_sql}) AS {variable} WHERE NOT ({predicate_sql})))"
				));
			}
		}
		Ok(())
	}

	/// §8: `ANY x IN <path> SATISFIES x = <literal> END` collapses to a single
	/// `fl_contains` call instead of a correlated subquery.
	fn try_fl_contains(&self, variable: &str, collection: NodeId, predicate: NodeId) -> Result<Option<String>> {
		let NodeKind::Property {
			source,
			path,
			accessor: crate::ast::PropertyAccessor::Value,
		} = self.arena.get(collection)
		else {
			return Ok(None);
		};
		let NodeKind::Op {
			op,
			operands,
		} = self.arena.get(predicate)
		else {
			return Ok(None);
		};
		if op.name != "=" || operands.len() != 2 {
			return Ok(None);
		}
		let (var_side, lit_side) = (operands[0], operands[1]);
		let literal = match (self.arena.get(var_side), self.arena.get(lit_side)) {
			(NodeKind::Variable { name, .. }, NodeKind::Literal(v)) if name == variable => lit_side,
			(NodeKind::Literal(v), NodeKind::Variable { name, .. }) if name == variable => {
				let _ = v;
				var_side
			}
			_ => return Ok(None),
		};
		let col = self.column_ref(*source);
		let path_str = path.to_string();
		let mut lit_sql = String::new();
		self.write_node(&mut lit_sql, literal)?;
		Ok(Some(format!("fl_contains({col}, {}, {lit_sql})", quote_string(&path_str))))
	}

	fn write_literal(&self, v: &Value) -> String {
		match v {
			Value::Null => "NULL".to_string(),
			Value::Bool(b) => {
				if *b {
					"1".to_string()
				} else {
					"0".to_string()
				}
			}
			Value::Int(i) => i.to_string(),
			Value::Number(n) => n.to_string(),
			Value::String(s) => quote_string(s),
			Value::Bytes(b) => {
				let mut hex = String::with_capacity(b.len() * 2 + 3);
				hex.push_str("X'");
				for byte in b {
					hex.push_str(&format!("{byte:02X}"));
				}
				hex.push('\'');
				hex
			}
			Value::Array(_) | Value::Dict(_) => quote_string(&v.to_string()),
		}
	}

	fn write_property(&self, source: Option<NodeId>, path: &crate::path::KeyPath, accessor: crate::ast::PropertyAccessor) -> String {
		use crate::ast::PropertyAccessor;
		let col = self.column_ref(source);
		if path.is_empty() {
			return col;
		}
		let func = match accessor {
			PropertyAccessor::Value => "fl_value",
			PropertyAccessor::Exists => "fl_exists",
			PropertyAccessor::Blob => "fl_blob",
			PropertyAccessor::Count => "fl_count",
		};
		format!("{func}({col}, {})", quote_string(&path.to_string()))
	}

	fn write_meta(&self, source: Option<NodeId>, property: &MetaProperty) -> String {
		let prefix = match source {
			Some(id) => format!("{}.", self.alias_for(id)),
			None => String::new(),
		};
		match property {
			MetaProperty::Id | MetaProperty::Sequence | MetaProperty::Expiration | MetaProperty::Rowid => {
				format!("{prefix}{}", property.sqlite_column().expect("direct meta properties map to a column"))
			}
			MetaProperty::Deleted => format!("({prefix}flags & 1 != 0)"),
			MetaProperty::NotDeleted => format!("({prefix}flags & 1 = 0)"),
			MetaProperty::RevisionId => format!("fl_version({prefix}sequence)"),
			MetaProperty::None => format!(
				"dict_of('id', {prefix}key, 'sequence', {prefix}sequence, 'deleted', ({prefix}flags & 1 != 0), 'expiration', {prefix}expiration, 'revisionID', fl_version({prefix}sequence))"
			),
		}
	}

	fn column_ref(&self, source: Option<NodeId>) -> String {
		match source {
			Some(id) => format!("{}.{}", self.alias_for(id), self.body_column),
			None => self.body_column.to_string(),
		}
	}

	fn alias_for(&self, id: NodeId) -> String {
		match self.arena.get(id) {
			NodeKind::Source {
				alias, ..
			} => alias.clone(),
			NodeKind::IndexSource {
				alias, ..
			} => alias.clone(),
			_ => String::new(),
		}
	}

	fn fts_column_ref(&self, idx: NodeId) -> String {
		let NodeKind::IndexSource {
			alias,
			table_name,
			..
		} = self.arena.get(idx)
		else {
			return String::new();
		};
		format!("{}.{}", quote_ident(alias), quote_ident(table_name))
	}

	fn render_select_body(&self, select_id: NodeId) -> Result<String> {
		let NodeKind::Select {
			what,
			sources,
			where_clause,
			group_by,
			having,
			order_by,
			limit,
			offset,
			distinct,
			prepended_columns,
			..
		} = self.arena.get(select_id)
		else {
			return Err(crate::err::Error::internal("render_select_body called on a non-Select node"));
		};
		let (what, sources, where_clause, group_by, having, order_by, limit, offset, distinct, prepended_columns) = (
			what.clone(),
			sources.clone(),
			*where_clause,
			group_by.clone(),
			*having,
			order_by.clone(),
			*limit,
			*offset,
			*distinct,
			*prepended_columns,
		);

		let mut sql = String::from("SELECT ");
		if distinct {
			sql.push_str("DISTINCT ");
		}

		let mut columns = Vec::new();
		if prepended_columns > 0 {
			if let Some(primary) = sources.iter().copied().find(|&s| matches!(self.arena.get(s), NodeKind::Source { kind: SourceKind::Collection, .. })) {
				let primary_alias = self.alias_for(primary);
				for &src in &sources {
					if let NodeKind::IndexSource {
						index_kind: IndexKind::Fts,
						alias,
						table_name,
						..
					} = self.arena.get(src)
					{
						columns.push(format!("{primary_alias}.rowid"));
						columns.push(format!("offsets({}.{})", quote_ident(alias), quote_ident(table_name)));
					}
				}
			}
		}

		for &what_id in &what {
			let NodeKind::What {
				expr,
				name,
				explicit_alias,
			} = self.arena.get(what_id)
			else {
				continue;
			};
			let bare = match self.arena.get(*expr) {
				NodeKind::Meta {
					property, ..
				} => property.sqlite_column().is_some(),
				NodeKind::Rank {
					..
				} => true,
				_ => false,
			};
			let mut col = String::new();
			if bare {
				self.write_node(&mut col, *expr)?;
			} else {
				col.push_str("fl_result(");
				self.write_node(&mut col, *expr)?;
				col.push(')');
			}
			if *explicit_alias {
				col.push_str(" AS ");
				col.push_str(&quote_ident(name));
			}
			columns.push(col);
		}
		sql.push_str(&columns.join(", "));

		sql.push_str(" FROM ");
		let mut from_parts = Vec::new();
		for &src in &sources {
			if let NodeKind::Source {
				kind: SourceKind::Collection,
				table_name,
				alias,
				..
			} = self.arena.get(src)
			{
				from_parts.push(format!("{table_name} AS {alias}"));
			}
		}
		for &src in &sources {
			match self.arena.get(src) {
				NodeKind::Source {
					kind: SourceKind::Join,
					join,
					table_name,
					alias,
					on,
					..
				} => {
					let keyword = join.map(|j| j.sql_keyword()).unwrap_or("INNER JOIN");
					let mut part = format!("{keyword} {table_name} AS {alias}");
					if let Some(on_id) = on {
						part.push_str(" ON ");
						let mut on_sql = String::new();
						self.write_node(&mut on_sql, *on_id)?;
						part.push_str(&on_sql);
					}
					from_parts.push(part);
				}
				NodeKind::Source {
					kind: SourceKind::Unnest,
					alias,
					unnest_expr: Some(expr),
					..
				} => {
					let mut expr_sql = String::new();
					self.write_node(&mut expr_sql, *expr)?;
					from_parts.push(format!("JOIN fl_each({expr_sql}) AS {alias}"));
				}
				NodeKind::IndexSource {
					index_kind,
					alias,
					table_name,
					on_source,
					..
				} => {
					let on_alias = self.alias_for(*on_source);
					let quoted_alias = quote_ident(alias);
					match index_kind {
						IndexKind::Fts => {
							from_parts.push(format!(
								"INNER JOIN {} AS {quoted_alias} ON {quoted_alias}.docid = {on_alias}.rowid",
								quote_ident(table_name)
							));
						}
						IndexKind::Vector => {
							let vd = self.find_vector_node(select_id, src);
							let (query_id, hybrid) = match vd.map(|id| self.arena.get(id)) {
								Some(NodeKind::VectorDistance {
									query, hybrid, ..
								}) => (Some(*query), *hybrid),
								_ => (None, false),
							};
							let mut query_sql = String::new();
							if let Some(q) = query_id {
								self.write_node(&mut query_sql, q)?;
							}
							if hybrid {
								let mut limit_sql = String::new();
								if let Some(l) = limit {
									self.write_node(&mut limit_sql, l)?;
								}
								from_parts.push(format!(
									"INNER JOIN (SELECT docid, distance FROM {} WHERE vector MATCH encode_vector({query_sql}) LIMIT {limit_sql}) AS {quoted_alias} ON {quoted_alias}.docid = {on_alias}.rowid",
									quote_ident(table_name)
								));
							} else {
								from_parts.push(format!(
									"INNER JOIN {} AS {quoted_alias} ON {quoted_alias}.docid = {on_alias}.rowid AND {quoted_alias}.vector MATCH encode_vector({query_sql})",
									quote_ident(table_name)
								));
							}
						}
						IndexKind::Unnest | IndexKind::Predictive => {
							from_parts.push(format!(
								"INNER JOIN {} AS {quoted_alias} ON {quoted_alias}.docid = {on_alias}.rowid",
								quote_ident(table_name)
							));
						}
					}
				}
				_ => {}
			}
		}
		sql.push_str(&from_parts.join(" "));

		if let Some(w) = where_clause {
			sql.push_str(" WHERE ");
			self.write_node(&mut sql, w)?;
		}
		if !group_by.is_empty() {
			sql.push_str(" GROUP BY ");
			for (i, &g) in group_by.iter().enumerate() {
				if i > 0 {
					sql.push_str(", ");
				}
				self.write_node(&mut sql, g)?;
			}
		}
		if let Some(h) = having {
			sql.push_str(" HAVING ");
			self.write_node(&mut sql, h)?;
		}
		if !order_by.is_empty() {
			sql.push_str(" ORDER BY ");
			for (i, (expr_id, desc)) in order_by.iter().enumerate() {
				if i > 0 {
					sql.push_str(", ");
				}
				self.write_node(&mut sql, *expr_id)?;
				if *desc {
					sql.push_str(" DESC");
				}
			}
		}
		if let Some(l) = limit {
			sql.push_str(" LIMIT ");
			self.write_node(&mut sql, l)?;
		}
		if let Some(o) = offset {
			sql.push_str(" OFFSET ");
			self.write_node(&mut sql, o)?;
		}

		Ok(sql)
	}

	fn find_vector_node(&self, select_id: NodeId, idx_id: NodeId) -> Option<NodeId> {
		let mut found = None;
		for root in select_children_roots(self.arena, select_id) {
			NodeKind::for_each_descendant(root, self.arena, &mut |id, kind| {
				if let NodeKind::VectorDistance {
					index: Some(i), ..
				} = kind
				{
					if *i == idx_id {
						found = Some(id);
					}
				}
			});
		}
		found
	}
}

fn select_children_roots(arena: &Arena, select_id: NodeId) -> Vec<NodeId> {
	let NodeKind::Select {
		what,
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
	roots
}

fn node_precedence(arena: &Arena, id: NodeId) -> i32 {
	match arena.get(id) {
		NodeKind::Op {
			op, ..
		} => op.precedence,
		NodeKind::Collate {
			..
		} => tables::COLLATE_PRECEDENCE,
		NodeKind::AnyEvery {
			..
		} | NodeKind::Select {
			..
		} => tables::SELECT_PRECEDENCE,
		_ => tables::FN_PRECEDENCE,
	}
}

pub(crate) fn quote_ident(s: &str) -> String {
	let safe = !s.is_empty()
		&& s.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_').unwrap_or(false)
		&& s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
	if safe {
		s.to_string()
	} else {
		format!("\"{}\"", s.replace('"', "\"\""))
	}
}

pub(crate) fn quote_string(s: &str) -> String {
	format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::delegate::{Delegate, DeletionStatus};
	use crate::parser::select::parse_query;
	use crate::postprocess;

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

	fn translate(json: &str) -> String {
		let v = Value::from_json_str(json).unwrap();
		let mut arena = Arena::new();
		let select_id = parse_query(&mut arena, &v).unwrap();
		let mut out = postprocess::Outputs::default();
		postprocess::run(&mut arena, select_id, &FixtureDelegate, &mut out).unwrap();
		Writer::new(&arena, "body").write_select(select_id).unwrap()
	}

	#[test]
	fn scenario_bare_expression() {
		let mut arena = Arena::new();
		let v = Value::from_json_str(r#"["=",[".","name"],"Puddin' Tane"]"#).unwrap();
		let mut ctx = crate::parser::context::ParseContext::new();
		let expr_id = crate::parser::parse_expr(&mut arena, &mut ctx, &v).unwrap();
		let sql = Writer::new(&arena, "body").write_expression(expr_id).unwrap();
		assert_eq!(sql, "fl_value(body, 'name') = 'Puddin'' Tane'");
	}

	#[test]
	fn scenario_default_what_columns_stay_bare() {
		let sql = translate(r#"{"WHERE":["=",[".","last"],"Smith"]}"#);
		assert_eq!(
			sql,
			"SELECT _doc.key, _doc.sequence FROM kv_default AS _doc WHERE fl_value(_doc.body, 'last') = 'Smith' AND (_doc.flags & 1 = 0)"
		);
	}

	#[test]
	fn scenario_explicit_what_and_where() {
		let sql = translate(r#"{"WHAT":[[".first"]], "WHERE":["=",[".","last"],"Smith"]}"#);
		assert_eq!(
			sql,
			"SELECT fl_result(fl_value(_doc.body, 'first')) FROM kv_default AS _doc WHERE fl_value(_doc.body, 'last') = 'Smith' AND (_doc.flags & 1 = 0)"
		);
	}

	#[test]
	fn scenario_join() {
		let sql = translate(
			r#"{"FROM":[{"AS":"book"},{"AS":"lib","ON":["=",[".book.library"],[".lib._id"]]}], "WHAT":[".book.title"], "WHERE":["=",[".book.author"],["$","AUTHOR"]]}"#,
		);
		assert_eq!(
			sql,
			"SELECT fl_result(fl_value(book.body, 'title')) FROM kv_default AS book INNER JOIN kv_default AS lib ON fl_value(book.body, 'library') = lib.key AND (lib.flags & 1 = 0) WHERE fl_value(book.body, 'author') = $_AUTHOR AND (book.flags & 1 = 0)"
		);
	}

	#[test]
	fn scenario_match_and_rank() {
		let sql = translate(r#"{"WHAT":[["rank()","bio"]],"WHERE":["MATCH()","bio","mobile"]}"#);
		assert_eq!(
			sql,
			"SELECT _doc.rowid, offsets(\"<idx1>\".\"kv_default::bio\"), rank(matchinfo(\"<idx1>\".\"kv_default::bio\")) FROM kv_default AS _doc INNER JOIN \"kv_default::bio\" AS \"<idx1>\" ON \"<idx1>\".docid = _doc.rowid WHERE \"<idx1>\".\"kv_default::bio\" MATCH 'mobile' AND (_doc.flags & 1 = 0)"
		);
	}

	#[test]
	fn scenario_like_with_non_binary_collation() {
		let sql = translate(r#"{"WHERE":["LIKE",["COLLATE",{"UNICODE":true},[".","name"]],"A%"]}"#);
		assert_eq!(
			sql,
			"SELECT _doc.key, _doc.sequence FROM kv_default AS _doc WHERE fl_like(fl_value(_doc.body, 'name'), 'A%', 'LCUnicode_CD') AND (_doc.flags & 1 = 0)"
		);
	}

	#[test]
	fn scenario_vector_hybrid() {
		let sql = translate(r#"{"ORDER_BY":[["APPROX_VECTOR_DISTANCE()",[".vector"],["[]",12,34]]],"LIMIT":5}"#);
		assert_eq!(
			sql,
			"SELECT _doc.key, _doc.sequence FROM kv_default AS _doc INNER JOIN (SELECT docid, distance FROM \":vector:vectorIndex\" WHERE vector MATCH encode_vector(array_of(12, 34)) LIMIT 5) AS \"<idx1>\" ON \"<idx1>\".docid = _doc.rowid WHERE (_doc.flags & 1 = 0) ORDER BY \"<idx1>\".distance LIMIT 5"
		);
	}

	#[test]
	fn scenario_prediction_indexed() {
		let sql = translate(r#"{"WHAT":[["PREDICTION()",[".","model"],[".","text"]]]}"#);
		assert_eq!(
			sql,
			"SELECT fl_result(fl_root(\"<idx1>\".body)) FROM kv_default AS _doc INNER JOIN \"kv_default:pred:prop:model|prop:text\" AS \"<idx1>\" ON \"<idx1>\".docid = _doc.rowid WHERE (_doc.flags & 1 = 0)"
		);
	}
}
