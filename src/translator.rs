//! The `QueryTranslator` façade (§2/§6): the one entry point external callers
//! use, wiring the parser, post-processor and SQL writer into a single
//! `parse` call, plus the index-creation sub-paths (§4.6) that share the
//! same expression machinery but start from a stub context instead of a
//! fully parsed `SELECT`.

use indexmap::IndexSet;
use tracing::instrument;

use crate::ast::{Arena, NodeId, NodeKind, SourceKind};
use crate::delegate::Delegate;
use crate::err::{require, Error, Result};
use crate::parser::context::ParseContext;
use crate::parser::select::parse_query;
use crate::parser::parse_expr;
use crate::postprocess::{self, Outputs};
use crate::value::Value;
use crate::writer::{quote_ident, quote_string, Writer};

/// Wraps a property read so it addresses an FTS virtual table's indexed
/// column rather than the ordinary document body.
const FTS_VALUE_FN: &str = "fl_fts_value";
/// Wraps a property read so it evaluates to the vector to feed a vector
/// index, or `NULL` if the document has none.
const VECTOR_TO_INDEX_FN: &str = "fl_vector_to_index";
/// Addresses the single unnamed column of an unnested-array virtual table.
const UNNESTED_VALUE_FN: &str = "fl_unnested_value";

/// Everything a caller gets back from a successful [`QueryTranslator::parse`]
/// (§6 façade outputs).
#[derive(Debug, Clone, Default)]
pub struct TranslatedQuery {
	pub sql: String,
	pub parameters: IndexSet<String>,
	pub collection_tables_used: IndexSet<String>,
	pub fts_tables_used: Vec<String>,
	pub first_custom_result_column: usize,
	pub column_titles: Vec<String>,
	pub is_aggregate: bool,
	pub uses_expiration: bool,
}

/// Translates JSON/Fleece query trees into SQLite-flavor SQL.
///
/// One instance is a reusable, stateless (beyond its own configuration)
/// compiler: nothing about a single `parse` call survives into the next one
/// except what the delegate itself remembers. Not `Sync`-required but safely
/// `Send` so independent instances can run one per worker thread.
pub struct QueryTranslator<D> {
	delegate: D,
	body_column: String,
}

impl<D: Delegate> QueryTranslator<D> {
	/// Builds a translator over the given delegate. The delegate alone
	/// decides what an unqualified (default) collection's table name is;
	/// the translator only ever asks for a canonicalized empty scope and
	/// collection and trusts the answer (§9 Design Notes).
	pub fn new(delegate: D) -> Self {
		QueryTranslator {
			delegate,
			body_column: "body".to_string(),
		}
	}

	/// Renames the body column; used by index-creation trigger bodies that
	/// refer to `new.body`/`old.body` rather than `body` (§4.6).
	pub fn with_body_column(mut self, name: impl Into<String>) -> Self {
		self.body_column = name.into();
		self
	}

	pub fn delegate(&self) -> &D {
		&self.delegate
	}

	/// Parses one query tree end to end: parse, postprocess, write, and
	/// collect the side outputs external callers need (§6).
	#[instrument(skip(self, value), level = "debug")]
	pub fn parse(&self, value: &Value) -> Result<TranslatedQuery> {
		let mut arena = Arena::new();
		let select_id = parse_query(&mut arena, value)?;

		let mut outputs = Outputs::default();
		postprocess::run(&mut arena, select_id, &self.delegate, &mut outputs)?;

		let writer = Writer::new(&arena, &self.body_column);
		let sql = writer.write_select(select_id)?;

		let mut parameters = IndexSet::new();
		let mut uses_expiration = outputs.uses_expiration;
		walk_whole_tree(&arena, select_id, &mut |kind| match kind {
			NodeKind::Parameter {
				name,
			} => {
				parameters.insert(name.clone());
			}
			NodeKind::Meta {
				property,
				..
			} => {
				if matches!(property, crate::ast::tables::MetaProperty::Expiration) {
					uses_expiration = true;
				}
			}
			_ => {}
		});

		let (column_titles, is_aggregate, prepended_columns) = match arena.get(select_id) {
			NodeKind::Select {
				what,
				is_aggregate,
				prepended_columns,
				..
			} => {
				let titles = what
					.iter()
					.map(|&id| match arena.get(id) {
						NodeKind::What {
							name, ..
						} => name.clone(),
						_ => String::new(),
					})
					.collect();
				(titles, *is_aggregate, *prepended_columns)
			}
			_ => (Vec::new(), false, 0),
		};

		Ok(TranslatedQuery {
			sql,
			parameters,
			collection_tables_used: outputs.collection_tables_used,
			fts_tables_used: outputs.fts_tables_used,
			first_custom_result_column: prepended_columns,
			column_titles,
			is_aggregate,
			uses_expiration,
		})
	}

	/// Translates a bare expression (no enclosing `SELECT`) to SQL, reading
	/// the unqualified body column with no source alias (§4.6).
	pub fn expression_sql(&self, expr: &Value) -> Result<String> {
		let mut arena = Arena::new();
		let mut ctx = ParseContext::new();
		let id = parse_expr(&mut arena, &mut ctx, expr)?;
		Writer::new(&arena, &self.body_column).write_expression(id)
	}

	/// Returns a `WHERE` clause for `expr`, with property paths qualified by
	/// `db_alias` (used by index-creation code that indexes into a specific
	/// aliased table rather than the default collection).
	pub fn where_clause_sql(&self, expr: Option<&Value>, db_alias: &str) -> Result<String> {
		let Some(expr) = expr else {
			return Ok(String::new());
		};
		let mut arena = Arena::new();
		let source = arena.alloc(NodeKind::Source {
			kind: SourceKind::Collection,
			scope: String::new(),
			collection: String::new(),
			alias: db_alias.to_string(),
			table_name: String::new(),
			join: None,
			on: None,
			unnest_expr: None,
			uses_deleted: false,
			has_explicit_alias: true,
		});
		let mut ctx = ParseContext::with_single_source(source);
		let id = parse_expr(&mut arena, &mut ctx, expr)?;
		let rendered = Writer::new(&arena, &self.body_column).write_expression(id)?;
		Ok(format!("WHERE {rendered}"))
	}

	/// Translates `expr` to SQL for use as an FTS index's indexed
	/// expression, via the `fl_fts_value` column-getter variant.
	pub fn fts_expression_sql(&self, expr: &Value) -> Result<String> {
		self.function_call_sql(FTS_VALUE_FN, expr, None)
	}

	/// Translates `expr_to_index` to a SQL expression that evaluates to the
	/// vector value to feed a vector index, or `NULL` if the document has
	/// none, via the `fl_vector_to_index` column-getter variant.
	pub fn vector_to_index_expression_sql(&self, expr_to_index: &Value, dimensions: i64) -> Result<String> {
		self.function_call_sql(VECTOR_TO_INDEX_FN, expr_to_index, Some(&Value::Int(dimensions)))
	}

	/// Writes a `CREATE INDEX` statement indexing `what_expressions` (each
	/// either a bare string, wrapped in an implicit property-path array, or
	/// a full expression) over `on_table_name`, with an optional
	/// `where_clause` and, for unnested/array tables, indexing the whole
	/// unnested value instead of any explicit expression list.
	pub fn write_create_index(
		&self,
		index_name: &str,
		on_table_name: &str,
		what_expressions: &[Value],
		where_clause: Option<&Value>,
		is_unnested_table: bool,
	) -> Result<String> {
		let mut arena = Arena::new();
		let mut ctx = ParseContext::new();

		let mut columns = Vec::new();
		if !what_expressions.is_empty() {
			for item in what_expressions {
				let wrapped;
				let expr = if item.as_str().is_some() {
					wrapped = Value::Array(vec![item.clone()]);
					&wrapped
				} else {
					item
				};
				let id = parse_expr(&mut arena, &mut ctx, expr)?;
				columns.push(id);
			}
		} else {
			require!(is_unnested_table, "no index expressions given for a non-unnested table");
		}

		let writer = Writer::new(&arena, &self.body_column);
		let mut sql = format!("CREATE INDEX {} ON {} (", quote_ident(index_name), quote_ident(on_table_name));
		if columns.is_empty() {
			sql.push_str(&format!("{UNNESTED_VALUE_FN}({})", self.body_column));
		} else {
			for (i, id) in columns.iter().enumerate() {
				if i > 0 {
					sql.push_str(", ");
				}
				sql.push_str(&writer.write_expression(*id)?);
			}
		}
		sql.push(')');

		if let (Some(where_clause), false) = (where_clause, is_unnested_table) {
			let id = parse_expr(&mut arena, &mut ctx, where_clause)?;
			let writer = Writer::new(&arena, &self.body_column);
			sql.push_str(" WHERE ");
			sql.push_str(&writer.write_expression(id)?);
		}

		Ok(sql)
	}

	/// Mirrors `functionCallSQL`: parses `arg` (and `param`, if given) with a
	/// bare stub context, then wraps the rendered SQL in a call to
	/// `fn_name`. A bare property read gets its accessor function swapped
	/// for `fn_name` directly (so `fl_value(body, 'x')` becomes
	/// `fn_name(body, 'x'[, param])`); anything else is wrapped wholesale as
	/// `fn_name(expr[, NULL, param])`.
	fn function_call_sql(&self, fn_name: &str, arg: &Value, param: Option<&Value>) -> Result<String> {
		let mut arena = Arena::new();
		let mut ctx = ParseContext::new();
		let arg_id = parse_expr(&mut arena, &mut ctx, arg)?;
		let param_sql = match param {
			Some(p) => {
				let id = parse_expr(&mut arena, &mut ctx, p)?;
				Some(Writer::new(&arena, &self.body_column).write_expression(id)?)
			}
			None => None,
		};

		if let NodeKind::Property {
			path,
			accessor: crate::ast::PropertyAccessor::Value,
			..
		} = arena.get(arg_id)
		{
			// `ctx` has no `FROM`, so `source` is always `None` here: the
			// path always reads off the bare body column.
			let mut out = format!("{fn_name}({}", self.body_column);
			if path.count() > 0 {
				out.push_str(&format!(", {}", quote_string(&path.to_string())));
			}
			if let Some(param_sql) = &param_sql {
				out.push_str(&format!(", {param_sql}"));
			}
			out.push(')');
			return Ok(out);
		}

		let rendered = Writer::new(&arena, &self.body_column).write_expression(arg_id)?;
		let mut out = format!("{fn_name}({rendered}");
		if let Some(param_sql) = &param_sql {
			out.push_str(&format!(", NULL, {param_sql}"));
		}
		out.push(')');
		Ok(out)
	}
}

/// The column name of the FTS virtual table backing a `MATCH` expression's
/// index: the textual property path, with no leading operator tag or
/// enclosing function call. Doesn't depend on a delegate or body-column
/// configuration, so unlike the rest of the index-creation sub-paths this
/// is a free function rather than a `QueryTranslator` method.
pub fn fts_column_name(expr: &Value) -> Result<String> {
	let mut arena = Arena::new();
	let mut ctx = ParseContext::new();
	let id = parse_expr(&mut arena, &mut ctx, expr)?;
	let NodeKind::Property {
		path, ..
	} = arena.get(id)
	else {
		return Err(Error::invalid("FTS index expression must be a property path"));
	};
	require!(path.count() > 0, "invalid property expression");
	Ok(path.to_string())
}

/// Walks every node reachable from `root`, including into nested `Select`s
/// (unlike [`NodeKind::for_each_descendant`], which stops at a nested
/// `Select` boundary for aggregate/collation scoping purposes): parameter
/// names and `_expiration` meta-property usage belong to the whole compiled
/// query, subqueries included.
fn walk_whole_tree(arena: &Arena, root: NodeId, f: &mut impl FnMut(&NodeKind)) {
	let kind = arena.get(root);
	f(kind);
	for child in kind.children() {
		walk_whole_tree(arena, child, f);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::delegate::DeletionStatus;

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

	fn translator() -> QueryTranslator<FixtureDelegate> {
		QueryTranslator::new(FixtureDelegate)
	}

	#[test]
	fn parse_collects_every_facade_output() {
		let v = Value::from_json_str(
			r#"{"WHAT":[[".first"],["AS",["$","NAME"],"who"]], "WHERE":["=",[".","last"],"Smith"]}"#,
		)
		.unwrap();
		let out = translator().parse(&v).unwrap();
		assert_eq!(
			out.sql,
			"SELECT fl_result(fl_value(_doc.body, 'first')), fl_result($_NAME) AS who FROM kv_default AS _doc WHERE fl_value(_doc.body, 'last') = 'Smith' AND (_doc.flags & 1 = 0)"
		);
		assert_eq!(out.parameters.iter().collect::<Vec<_>>(), vec!["NAME"]);
		assert_eq!(out.collection_tables_used.iter().collect::<Vec<_>>(), vec!["kv_default"]);
		assert!(out.fts_tables_used.is_empty());
		assert_eq!(out.first_custom_result_column, 0);
		assert_eq!(out.column_titles, vec!["first", "who"]);
		assert!(!out.is_aggregate);
		assert!(!out.uses_expiration);
	}

	#[test]
	fn parse_detects_aggregate_and_expiration_through_nested_select() {
		let v = Value::from_json_str(
			r#"{"WHAT":[["count()",[".","x"]]], "WHERE":["IN",["META()","expiration"],["SELECT",{"WHAT":[[".","y"]]}]]}"#,
		)
		.unwrap();
		let out = translator().parse(&v).unwrap();
		assert!(out.is_aggregate);
		assert!(out.uses_expiration);
	}

	#[test]
	fn expression_sql_reads_bare_body_column() {
		let v = Value::from_json_str(r#"["=",[".","name"],"Puddin' Tane"]"#).unwrap();
		let sql = translator().expression_sql(&v).unwrap();
		assert_eq!(sql, "fl_value(body, 'name') = 'Puddin'' Tane'");
	}

	#[test]
	fn where_clause_sql_qualifies_properties_by_the_given_alias() {
		let v = Value::from_json_str(r#"["=",[".","name"],"Puddin' Tane"]"#).unwrap();
		let sql = translator().where_clause_sql(Some(&v), "new").unwrap();
		assert_eq!(sql, "WHERE fl_value(new.body, 'name') = 'Puddin'' Tane'");
	}

	#[test]
	fn where_clause_sql_of_no_expression_is_empty() {
		let sql = translator().where_clause_sql(None, "new").unwrap();
		assert_eq!(sql, "");
	}

	#[test]
	fn fts_expression_sql_swaps_in_the_fts_accessor() {
		let v = Value::from_json_str(r#"[".", "bio"]"#).unwrap();
		let sql = translator().fts_expression_sql(&v).unwrap();
		assert_eq!(sql, "fl_fts_value(body, 'bio')");
	}

	#[test]
	fn fts_column_name_returns_the_bare_property_path() {
		let v = Value::from_json_str(r#"[".", "bio"]"#).unwrap();
		assert_eq!(fts_column_name(&v).unwrap(), "bio");
	}

	#[test]
	fn fts_column_name_rejects_non_property_expressions() {
		let v = Value::from_json_str(r#"["+", 1, 2]"#).unwrap();
		assert!(fts_column_name(&v).is_err());
	}

	#[test]
	fn vector_to_index_expression_sql_appends_dimensions() {
		let v = Value::from_json_str(r#"[".", "vector"]"#).unwrap();
		let sql = translator().vector_to_index_expression_sql(&v, 768).unwrap();
		assert_eq!(sql, "fl_vector_to_index(body, 'vector', 768)");
	}

	#[test]
	fn write_create_index_wraps_bare_strings_as_property_paths() {
		let sql = translator()
			.write_create_index("idx_name", "kv_default", &[Value::from("name")], None, false)
			.unwrap();
		assert_eq!(sql, "CREATE INDEX idx_name ON kv_default (fl_value(body, 'name'))");
	}

	#[test]
	fn write_create_index_on_unnested_table_indexes_the_whole_value() {
		let sql = translator()
			.write_create_index("idx_tags", "kv_default:unnest:tags", &[], None, true)
			.unwrap();
		assert_eq!(sql, "CREATE INDEX idx_tags ON \"kv_default:unnest:tags\" (fl_unnested_value(body))");
	}

	#[test]
	fn write_create_index_rejects_empty_expressions_on_a_regular_table() {
		let result = translator().write_create_index("idx", "kv_default", &[], None, false);
		assert!(result.is_err());
	}
}
