//! The operation and function tables: compile-time constant data driving
//! parser dispatch and SQL-writer behavior. Modeled as static arrays of POD
//! records, scanned linearly on lookup — the tables are a few dozen entries
//! long, short enough that a linear scan beats building a lookup map.

/// Result-shape and behavior flags attached to an operator or function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpFlags {
	pub bool_result: bool,
	pub number_result: bool,
	pub string_result: bool,
	pub aggregate: bool,
	pub wants_collation: bool,
}

impl OpFlags {
	pub const NONE: OpFlags = OpFlags {
		bool_result: false,
		number_result: false,
		string_result: false,
		aggregate: false,
		wants_collation: false,
	};
	pub const BOOL: OpFlags = OpFlags {
		bool_result: true,
		..OpFlags::NONE
	};
	pub const NUMBER: OpFlags = OpFlags {
		number_result: true,
		..OpFlags::NONE
	};
	pub const STRING: OpFlags = OpFlags {
		string_result: true,
		..OpFlags::NONE
	};
	pub const AGGREGATE: OpFlags = OpFlags {
		aggregate: true,
		..OpFlags::NONE
	};
	pub const fn with_collation(mut self) -> OpFlags {
		self.wants_collation = true;
		self
	}
	pub const fn with_aggregate(mut self) -> OpFlags {
		self.aggregate = true;
		self
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum OpType {
	Prefix,
	Infix,
	Postfix,

	Property,
	Parameter,
	Variable,
	ObjectProperty,
	ArrayLiteral,
	Blob,
	Missing,
	Concat,
	Is,
	IsNot,
	In,
	NotIn,
	Like,
	Between,
	Exists,
	IsValued,
	Collate,
	Case,
	Any,
	Every,
	AnyAndEvery,
	Meta,
	Select,
	Match,
	Rank,
	VectorDistance,
	Prediction,
}

pub const ARG_LIST_PRECEDENCE: i32 = -2;
pub const SELECT_PRECEDENCE: i32 = 1;
pub const AND_PRECEDENCE: i32 = 2;
pub const MATCH_PRECEDENCE: i32 = 3;
pub const COLLATE_PRECEDENCE: i32 = 10;
pub const FN_PRECEDENCE: i32 = 99;
/// Precedence used for the outermost expression written by a stand-alone
/// `expression_sql`/`where_clause_sql` call: binds more loosely than
/// anything real so no spurious parens are ever emitted around the root.
pub const OUTER_STATEMENT_PRECEDENCE: i32 = -1;
pub const EXPRESSION_LIST_PRECEDENCE: i32 = -3;

pub struct Operation {
	pub name: &'static str,
	pub min_args: usize,
	pub max_args: usize,
	pub precedence: i32,
	pub op_type: OpType,
	pub flags: OpFlags,
}

/// `max_args` caps queries with unbounded arities (e.g. variadic `AND`) at 9,
/// matching the arity cap the parser applies when counting array elements.
pub const MAX_ARGS: usize = 9;

#[rustfmt::skip]
pub static OPERATION_LIST: &[Operation] = &[
	Operation { name: ".",             min_args: 0, max_args: 9, precedence: FN_PRECEDENCE,      op_type: OpType::Property,       flags: OpFlags::NONE },
	Operation { name: "$",             min_args: 1, max_args: 1, precedence: FN_PRECEDENCE,      op_type: OpType::Parameter,      flags: OpFlags::NONE },
	Operation { name: "?",             min_args: 1, max_args: 9, precedence: FN_PRECEDENCE,      op_type: OpType::Variable,       flags: OpFlags::NONE },
	Operation { name: "_.",            min_args: 1, max_args: 2, precedence: FN_PRECEDENCE,      op_type: OpType::ObjectProperty, flags: OpFlags::NONE },
	Operation { name: "[]",            min_args: 0, max_args: 9, precedence: FN_PRECEDENCE,      op_type: OpType::ArrayLiteral,   flags: OpFlags::NONE },
	Operation { name: "BLOB",          min_args: 1, max_args: 1, precedence: FN_PRECEDENCE,      op_type: OpType::Blob,           flags: OpFlags::NONE },

	Operation { name: "MISSING",       min_args: 0, max_args: 0, precedence: FN_PRECEDENCE,      op_type: OpType::Missing,        flags: OpFlags::NONE },

	Operation { name: "||",            min_args: 2, max_args: 9, precedence: 3,                  op_type: OpType::Concat,         flags: OpFlags::STRING },

	Operation { name: "*",             min_args: 2, max_args: 9, precedence: 7,                  op_type: OpType::Infix,          flags: OpFlags::NUMBER },
	Operation { name: "/",             min_args: 2, max_args: 2, precedence: 7,                  op_type: OpType::Infix,          flags: OpFlags::NUMBER },
	Operation { name: "%",             min_args: 2, max_args: 2, precedence: 7,                  op_type: OpType::Infix,          flags: OpFlags::NUMBER },

	Operation { name: "+",             min_args: 2, max_args: 9, precedence: 6,                  op_type: OpType::Infix,          flags: OpFlags::NUMBER },
	Operation { name: "-",             min_args: 2, max_args: 2, precedence: 6,                  op_type: OpType::Infix,          flags: OpFlags::NUMBER },
	Operation { name: "-",             min_args: 1, max_args: 1, precedence: 9,                  op_type: OpType::Prefix,         flags: OpFlags::NUMBER },

	Operation { name: "<",             min_args: 2, max_args: 2, precedence: 4,                  op_type: OpType::Infix,          flags: OpFlags::BOOL },
	Operation { name: "<=",            min_args: 2, max_args: 2, precedence: 4,                  op_type: OpType::Infix,          flags: OpFlags::BOOL },
	Operation { name: ">",             min_args: 2, max_args: 2, precedence: 4,                  op_type: OpType::Infix,          flags: OpFlags::BOOL },
	Operation { name: ">=",            min_args: 2, max_args: 2, precedence: 4,                  op_type: OpType::Infix,          flags: OpFlags::BOOL },

	Operation { name: "=",             min_args: 2, max_args: 2, precedence: 3,                  op_type: OpType::Infix,          flags: OpFlags::BOOL },
	Operation { name: "!=",            min_args: 2, max_args: 2, precedence: 3,                  op_type: OpType::Infix,          flags: OpFlags::BOOL },
	Operation { name: "IS",            min_args: 2, max_args: 2, precedence: 3,                  op_type: OpType::Is,             flags: OpFlags::BOOL },
	Operation { name: "IS NOT",        min_args: 2, max_args: 2, precedence: 3,                  op_type: OpType::IsNot,          flags: OpFlags::BOOL },
	Operation { name: "IN",            min_args: 2, max_args: 9, precedence: 3,                  op_type: OpType::In,             flags: OpFlags::BOOL },
	Operation { name: "LIKE",          min_args: 2, max_args: 3, precedence: 3,                  op_type: OpType::Like,           flags: OpFlags::BOOL },
	Operation { name: "NOT IN",        min_args: 2, max_args: 9, precedence: 3,                  op_type: OpType::NotIn,          flags: OpFlags::BOOL },
	Operation { name: "BETWEEN",       min_args: 3, max_args: 3, precedence: 3,                  op_type: OpType::Between,        flags: OpFlags::BOOL },
	Operation { name: "EXISTS",        min_args: 1, max_args: 1, precedence: 8,                  op_type: OpType::Exists,         flags: OpFlags::BOOL },
	Operation { name: "IS VALUED",     min_args: 1, max_args: 1, precedence: 3,                  op_type: OpType::IsValued,       flags: OpFlags::BOOL },

	Operation { name: "NOT",           min_args: 1, max_args: 1, precedence: 9,                  op_type: OpType::Prefix,         flags: OpFlags::BOOL },
	Operation { name: "AND",           min_args: 2, max_args: 9, precedence: AND_PRECEDENCE,      op_type: OpType::Infix,          flags: OpFlags::BOOL },
	Operation { name: "OR",            min_args: 2, max_args: 9, precedence: AND_PRECEDENCE,      op_type: OpType::Infix,          flags: OpFlags::BOOL },

	Operation { name: "ANY",           min_args: 3, max_args: 3, precedence: SELECT_PRECEDENCE,   op_type: OpType::Any,            flags: OpFlags::BOOL },
	Operation { name: "EVERY",         min_args: 3, max_args: 3, precedence: SELECT_PRECEDENCE,   op_type: OpType::Every,          flags: OpFlags::BOOL },
	Operation { name: "ANY AND EVERY", min_args: 3, max_args: 3, precedence: SELECT_PRECEDENCE,   op_type: OpType::AnyAndEvery,    flags: OpFlags::BOOL },

	Operation { name: "CASE",          min_args: 3, max_args: 9, precedence: AND_PRECEDENCE,      op_type: OpType::Case,           flags: OpFlags::NONE },

	Operation { name: "META()",        min_args: 0, max_args: 1, precedence: FN_PRECEDENCE,       op_type: OpType::Meta,           flags: OpFlags::NONE },
	Operation { name: "MATCH()",       min_args: 2, max_args: 2, precedence: FN_PRECEDENCE,       op_type: OpType::Match,          flags: OpFlags::BOOL },
	Operation { name: "RANK()",        min_args: 1, max_args: 1, precedence: FN_PRECEDENCE,       op_type: OpType::Rank,           flags: OpFlags::NUMBER },
	Operation { name: "COLLATE",       min_args: 2, max_args: 2, precedence: COLLATE_PRECEDENCE,  op_type: OpType::Collate,        flags: OpFlags::NONE },

	Operation { name: "SELECT",        min_args: 1, max_args: 1, precedence: SELECT_PRECEDENCE,   op_type: OpType::Select,         flags: OpFlags::NONE },

	Operation { name: "APPROX_VECTOR_DISTANCE()", min_args: 2, max_args: 5, precedence: FN_PRECEDENCE, op_type: OpType::VectorDistance, flags: OpFlags::NUMBER },
	Operation { name: "PREDICTION()", min_args: 2, max_args: 3, precedence: FN_PRECEDENCE,        op_type: OpType::Prediction,     flags: OpFlags::NONE },
];

/// Looks up `(name, nargs)` in [`OPERATION_LIST`]; name matching is
/// case-insensitive (ASCII-only). Returns `Ok(None)` on a clean miss (no
/// entry has this name at all) so callers can fall through to prefix/suffix
/// dispatch, but `Err` when the name matched yet arity didn't, matching the
/// asymmetric error behavior of the original lookup.
pub fn lookup_op(name: &str, nargs: usize) -> crate::err::Result<Option<&'static Operation>> {
	let mut name_matched = false;
	for def in OPERATION_LIST {
		if def.name.eq_ignore_ascii_case(name) {
			name_matched = true;
			if nargs >= def.min_args && nargs <= def.max_args {
				return Ok(Some(def));
			}
		}
	}
	if name_matched {
		crate::err::fail!("Wrong number of arguments to {name}");
	}
	Ok(None)
}

pub fn lookup_op_by_type(op_type: OpType) -> &'static Operation {
	OPERATION_LIST
		.iter()
		.find(|def| def.op_type == op_type)
		.expect("internal error: no Operation for requested OpType")
}

pub struct FunctionSpec {
	pub name: &'static str,
	pub min_args: usize,
	pub max_args: usize,
	pub sqlite_name: Option<&'static str>,
	pub flags: OpFlags,
}

impl FunctionSpec {
	pub fn sql_name(&self) -> &'static str {
		self.sqlite_name.unwrap_or(self.name)
	}
}

#[rustfmt::skip]
pub static FUNCTION_LIST: &[FunctionSpec] = &[
	// Array:
	FunctionSpec { name: "array_agg",      min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::AGGREGATE },
	FunctionSpec { name: "array_avg",      min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "array_contains", min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::BOOL },
	FunctionSpec { name: "array_count",    min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "array_ifnull",   min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NONE },
	FunctionSpec { name: "array_length",   min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "array_max",      min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "array_min",      min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "array_of",       min_args: 0, max_args: 9, sqlite_name: None, flags: OpFlags::NONE },
	FunctionSpec { name: "array_sum",      min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },

	// Comparison (SQLite's scalar min/max, not the aggregate forms):
	FunctionSpec { name: "greatest",       min_args: 2, max_args: 9, sqlite_name: Some("max"), flags: OpFlags::NONE },
	FunctionSpec { name: "least",          min_args: 2, max_args: 9, sqlite_name: Some("min"), flags: OpFlags::NONE },

	// Conditionals:
	FunctionSpec { name: "ifmissing",        min_args: 2, max_args: 9, sqlite_name: Some("coalesce"), flags: OpFlags::NONE },
	FunctionSpec { name: "ifnull",           min_args: 2, max_args: 9, sqlite_name: Some("N1QL_ifnull"), flags: OpFlags::NONE },
	FunctionSpec { name: "ifmissingornull",  min_args: 2, max_args: 9, sqlite_name: None, flags: OpFlags::NONE },
	FunctionSpec { name: "missingif",        min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::NONE },
	FunctionSpec { name: "nullif",           min_args: 2, max_args: 2, sqlite_name: Some("N1QL_nullif"), flags: OpFlags::NONE },

	// Dates/times:
	FunctionSpec { name: "millis_to_str",    min_args: 1, max_args: 2, sqlite_name: None, flags: OpFlags::STRING },
	FunctionSpec { name: "millis_to_utc",    min_args: 1, max_args: 2, sqlite_name: None, flags: OpFlags::STRING },
	FunctionSpec { name: "millis_to_tz",     min_args: 2, max_args: 3, sqlite_name: None, flags: OpFlags::STRING },
	FunctionSpec { name: "str_to_millis",    min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "str_to_utc",       min_args: 1, max_args: 2, sqlite_name: None, flags: OpFlags::STRING },
	FunctionSpec { name: "date_diff_str",    min_args: 3, max_args: 3, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "date_diff_millis", min_args: 3, max_args: 3, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "date_add_str",     min_args: 3, max_args: 4, sqlite_name: None, flags: OpFlags::STRING },
	FunctionSpec { name: "date_add_millis",  min_args: 3, max_args: 3, sqlite_name: None, flags: OpFlags::STRING },
	FunctionSpec { name: "str_to_tz",        min_args: 2, max_args: 3, sqlite_name: None, flags: OpFlags::STRING },

	// Math:
	FunctionSpec { name: "abs",        min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "acos",       min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "asin",       min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "atan",       min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "atan2",      min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "ceil",       min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "cos",        min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "degrees",    min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "e",          min_args: 0, max_args: 0, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "exp",        min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "floor",      min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "ln",         min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "log",        min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "pi",         min_args: 0, max_args: 0, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "power",      min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "radians",    min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "round",      min_args: 1, max_args: 2, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "round_even", min_args: 1, max_args: 2, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "sign",       min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "sin",        min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "sqrt",       min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "tan",        min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "trunc",      min_args: 1, max_args: 2, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "div",        min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "idiv",       min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::NUMBER },

	// Patterns:
	FunctionSpec { name: "regexp_contains", min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::BOOL },
	FunctionSpec { name: "regexp_like",     min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::BOOL },
	FunctionSpec { name: "regexp_position", min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "regexp_replace",  min_args: 3, max_args: 9, sqlite_name: None, flags: OpFlags::NONE },
	FunctionSpec { name: "fl_like",         min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags { bool_result: true, wants_collation: true, ..OpFlags::NONE } },

	// Strings:
	FunctionSpec { name: "concat",   min_args: 2, max_args: 9, sqlite_name: None, flags: OpFlags::STRING },
	FunctionSpec { name: "contains", min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags { bool_result: true, wants_collation: true, ..OpFlags::NONE } },
	FunctionSpec { name: "length",   min_args: 1, max_args: 1, sqlite_name: Some("N1QL_length"), flags: OpFlags::NUMBER },
	FunctionSpec { name: "lower",    min_args: 1, max_args: 1, sqlite_name: Some("N1QL_lower"),  flags: OpFlags::NUMBER },
	FunctionSpec { name: "ltrim",    min_args: 1, max_args: 2, sqlite_name: Some("N1QL_ltrim"),  flags: OpFlags::STRING },
	FunctionSpec { name: "rtrim",    min_args: 1, max_args: 2, sqlite_name: Some("N1QL_rtrim"),  flags: OpFlags::STRING },
	FunctionSpec { name: "trim",     min_args: 1, max_args: 2, sqlite_name: Some("N1QL_trim"),   flags: OpFlags::STRING },
	FunctionSpec { name: "upper",    min_args: 1, max_args: 1, sqlite_name: Some("N1QL_upper"),  flags: OpFlags::STRING },

	// Types:
	FunctionSpec { name: "isarray",     min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::BOOL },
	FunctionSpec { name: "is_array",    min_args: 1, max_args: 1, sqlite_name: Some("isarray"), flags: OpFlags::BOOL },
	FunctionSpec { name: "isatom",      min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::BOOL },
	FunctionSpec { name: "is_atom",     min_args: 1, max_args: 1, sqlite_name: Some("isatom"), flags: OpFlags::BOOL },
	FunctionSpec { name: "isboolean",   min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::BOOL },
	FunctionSpec { name: "is_boolean",  min_args: 1, max_args: 1, sqlite_name: Some("isboolean"), flags: OpFlags::BOOL },
	FunctionSpec { name: "isnumber",    min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::BOOL },
	FunctionSpec { name: "is_number",   min_args: 1, max_args: 1, sqlite_name: Some("isnumber"), flags: OpFlags::BOOL },
	FunctionSpec { name: "isobject",    min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::BOOL },
	FunctionSpec { name: "is_object",   min_args: 1, max_args: 1, sqlite_name: Some("isobject"), flags: OpFlags::BOOL },
	FunctionSpec { name: "isstring",    min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::BOOL },
	FunctionSpec { name: "is_string",   min_args: 1, max_args: 1, sqlite_name: Some("isstring"), flags: OpFlags::BOOL },
	FunctionSpec { name: "type",        min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::STRING },
	FunctionSpec { name: "typename",    min_args: 1, max_args: 1, sqlite_name: Some("type"), flags: OpFlags::STRING },
	FunctionSpec { name: "toarray",     min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NONE },
	FunctionSpec { name: "to_array",    min_args: 1, max_args: 1, sqlite_name: Some("toarray"), flags: OpFlags::NONE },
	FunctionSpec { name: "toatom",      min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NONE },
	FunctionSpec { name: "to_atom",     min_args: 1, max_args: 1, sqlite_name: Some("toatom"), flags: OpFlags::NONE },
	FunctionSpec { name: "toboolean",   min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::BOOL },
	FunctionSpec { name: "to_boolean",  min_args: 1, max_args: 1, sqlite_name: Some("toboolean"), flags: OpFlags::BOOL },
	FunctionSpec { name: "tonumber",    min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "to_number",   min_args: 1, max_args: 1, sqlite_name: Some("tonumber"), flags: OpFlags::NUMBER },
	FunctionSpec { name: "toobject",    min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::NONE },
	FunctionSpec { name: "to_object",   min_args: 1, max_args: 1, sqlite_name: Some("toobject"), flags: OpFlags::NONE },
	FunctionSpec { name: "tostring",    min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::STRING },
	FunctionSpec { name: "to_string",   min_args: 1, max_args: 1, sqlite_name: Some("tostring"), flags: OpFlags::STRING },
	FunctionSpec { name: "is valued",   min_args: 1, max_args: 1, sqlite_name: Some("isvalued"), flags: OpFlags::BOOL },

	// Aggregates:
	FunctionSpec { name: "avg",   min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags { number_result: true, aggregate: true, ..OpFlags::NONE } },
	FunctionSpec { name: "count", min_args: 0, max_args: 1, sqlite_name: None, flags: OpFlags { number_result: true, aggregate: true, ..OpFlags::NONE } },
	FunctionSpec { name: "max",   min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::AGGREGATE },
	FunctionSpec { name: "min",   min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags::AGGREGATE },
	FunctionSpec { name: "sum",   min_args: 1, max_args: 1, sqlite_name: None, flags: OpFlags { number_result: true, aggregate: true, ..OpFlags::NONE } },

	// Predictive query (feature "predictive-query"):
	FunctionSpec { name: "prediction",         min_args: 2, max_args: 3, sqlite_name: None, flags: OpFlags::NONE },
	FunctionSpec { name: "euclidean_distance", min_args: 2, max_args: 3, sqlite_name: None, flags: OpFlags::NUMBER },
	FunctionSpec { name: "cosine_distance",    min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::NUMBER },

	// Vector search (feature "vector-search"):
	FunctionSpec { name: "approx_vector_distance", min_args: 2, max_args: 5, sqlite_name: None, flags: OpFlags::NUMBER },
];

pub static DICT_OF_FUNCTION: FunctionSpec =
	FunctionSpec { name: "dict_of", min_args: 0, max_args: 9, sqlite_name: None, flags: OpFlags::NONE };
pub static NESTED_VALUE_FUNCTION: FunctionSpec =
	FunctionSpec { name: "fl_nested_value", min_args: 2, max_args: 2, sqlite_name: None, flags: OpFlags::NONE };

pub fn lookup_fn(name: &str, nargs: usize) -> crate::err::Result<&'static FunctionSpec> {
	let mut name_matched = false;
	for def in FUNCTION_LIST {
		if def.name.eq_ignore_ascii_case(name) {
			name_matched = true;
			if nargs >= def.min_args && nargs <= def.max_args {
				return Ok(def);
			}
		}
	}
	if name_matched {
		crate::err::fail!("Wrong number of arguments to {name}()");
	}
	crate::err::fail!("Unknown function '{name}'");
}

/// A document's own meta-properties, addressable via `meta().foo` or the
/// `_foo` property shortcut.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum MetaProperty {
	/// Internal-only: the synthesized `(flags & 1 = 0)` predicate.
	NotDeleted,
	/// Bare `meta()`, with no property selected: emits a `dict_of(...)` of
	/// every meta property.
	None,
	Id,
	Sequence,
	Deleted,
	Expiration,
	RevisionId,
	Rowid,
}

impl MetaProperty {
	pub const NAMES: &'static [(&'static str, MetaProperty)] = &[
		("id", MetaProperty::Id),
		("sequence", MetaProperty::Sequence),
		("deleted", MetaProperty::Deleted),
		("expiration", MetaProperty::Expiration),
		("revisionID", MetaProperty::RevisionId),
		("rowid", MetaProperty::Rowid),
	];

	pub const SHORTCUTS: &'static [(&'static str, MetaProperty)] = &[
		("_id", MetaProperty::Id),
		("_sequence", MetaProperty::Sequence),
		("_deleted", MetaProperty::Deleted),
		("_expiration", MetaProperty::Expiration),
		("_revisionID", MetaProperty::RevisionId),
		("_rowid", MetaProperty::Rowid),
	];

	/// Looks up a meta property by its bare name (`id`, `sequence`, ...),
	/// case-insensitively, returning `None` (the enum variant) on a miss —
	/// distinct from `Option::None`, which signals "not a meta name at all".
	pub fn lookup(name: &str) -> Option<MetaProperty> {
		Self::NAMES
			.iter()
			.find(|(n, _)| n.eq_ignore_ascii_case(name))
			.map(|(_, m)| *m)
	}

	/// Looks up a `_`-prefixed shortcut name (`_id`, `_deleted`, ...).
	pub fn lookup_shortcut(name: &str) -> Option<MetaProperty> {
		Self::SHORTCUTS
			.iter()
			.find(|(n, _)| n.eq_ignore_ascii_case(name))
			.map(|(_, m)| *m)
	}

	pub fn sqlite_column(&self) -> Option<&'static str> {
		match self {
			MetaProperty::Id => Some("key"),
			MetaProperty::Sequence => Some("sequence"),
			MetaProperty::Expiration => Some("expiration"),
			MetaProperty::Rowid => Some("rowid"),
			MetaProperty::Deleted | MetaProperty::RevisionId | MetaProperty::None | MetaProperty::NotDeleted => None,
		}
	}

	pub fn flags(&self) -> OpFlags {
		match self {
			MetaProperty::NotDeleted => OpFlags::BOOL,
			MetaProperty::None => OpFlags::NONE,
			MetaProperty::Id => OpFlags::STRING,
			MetaProperty::Sequence => OpFlags::NUMBER,
			MetaProperty::Deleted => OpFlags::BOOL,
			MetaProperty::Expiration => OpFlags::NUMBER,
			MetaProperty::RevisionId => OpFlags::STRING,
			MetaProperty::Rowid => OpFlags::NUMBER,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
	Inner,
	Left,
	LeftOuter,
	Cross,
}

impl JoinType {
	pub fn lookup(name: &str) -> Option<JoinType> {
		const NAMES: &[(&str, JoinType)] = &[
			("INNER", JoinType::Inner),
			("LEFT", JoinType::Left),
			("LEFT OUTER", JoinType::LeftOuter),
			("CROSS", JoinType::Cross),
		];
		NAMES.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, j)| *j)
	}

	pub fn sql_keyword(&self) -> &'static str {
		match self {
			JoinType::Inner => "INNER JOIN",
			JoinType::Left => "LEFT JOIN",
			JoinType::LeftOuter => "LEFT OUTER JOIN",
			JoinType::Cross => "CROSS JOIN",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn finds_operator_case_insensitively() {
		let op = lookup_op("and", 2).unwrap().unwrap();
		assert_eq!(op.op_type, OpType::Infix);
	}

	#[test]
	fn wrong_arity_is_an_error_not_a_miss() {
		let err = lookup_op("BETWEEN", 2).unwrap_err();
		assert!(err.to_string().contains("Wrong number of arguments"));
	}

	#[test]
	fn unmatched_name_is_a_clean_miss() {
		assert!(lookup_op("nonexistent_op_xyz", 2).unwrap().is_none());
	}

	#[test]
	fn unknown_function_is_an_error() {
		let err = lookup_fn("not_a_real_fn", 1).unwrap_err();
		assert!(err.to_string().contains("Unknown function"));
	}
}
