//! The node arena and the tagged-variant AST it holds.
//!
//! All AST nodes live in a single `Vec<Node>` owned by the [`Arena`]; a
//! [`NodeId`] is a typed index into that vector rather than a pointer, so
//! child/parent references never entangle with Rust's borrow checker and
//! the whole tree is freed in one shot when the arena drops.

pub mod tables;

use crate::path::KeyPath;
use crate::value::Value;
use tables::{FunctionSpec, JoinType, MetaProperty, Operation};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
	fn index(self) -> usize {
		self.0 as usize
	}
}

pub struct Node {
	pub parent: Option<NodeId>,
	pub kind: NodeKind,
}

/// Owns every node allocated while compiling one query. Dropping the arena
/// frees every node at once; nothing referencing a `NodeId` can outlive it
/// in practice because a `NodeId` is meaningless without the arena it was
/// allocated from.
#[derive(Default)]
pub struct Arena {
	nodes: Vec<Node>,
}

impl Arena {
	pub fn new() -> Self {
		Arena::default()
	}

	pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
		let id = NodeId(self.nodes.len() as u32);
		self.nodes.push(Node {
			parent: None,
			kind,
		});
		id
	}

	pub fn get(&self, id: NodeId) -> &NodeKind {
		&self.nodes[id.index()].kind
	}

	pub fn get_mut(&mut self, id: NodeId) -> &mut NodeKind {
		&mut self.nodes[id.index()].kind
	}

	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.nodes[id.index()].parent
	}

	pub fn set_parent(&mut self, child: NodeId, parent: NodeId) {
		self.nodes[child.index()].parent = Some(parent);
	}

	/// Binds every child in `children` to `parent` in one pass, the usual
	/// shape right after allocating a node that owns a list of operands.
	pub fn attach(&mut self, parent: NodeId, children: impl IntoIterator<Item = NodeId>) {
		for child in children {
			self.set_parent(child, parent);
		}
	}

	/// Replaces `id`'s node in place, used by postprocessing passes that
	/// rewrite a child slot (e.g. simplifying `_.` over `META()`). The
	/// parent back-reference of `id` itself is preserved; callers are
	/// responsible for re-parenting any of the new kind's children.
	pub fn replace(&mut self, id: NodeId, kind: NodeKind) {
		self.nodes[id.index()].kind = kind;
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyAccessor {
	Value,
	Exists,
	Blob,
	Count,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnyEveryKind {
	Any,
	Every,
	AnyAndEvery,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Collation {
	pub locale: Option<String>,
	pub case_sensitive: bool,
	pub diacritic_sensitive: bool,
	pub unicode_aware: bool,
}

impl Default for Collation {
	/// The binary (SQLite built-in `BINARY`) collation: case- and
	/// diacritic-sensitive, no locale, no Unicode-aware folding.
	fn default() -> Self {
		Collation {
			locale: None,
			case_sensitive: true,
			diacritic_sensitive: true,
			unicode_aware: false,
		}
	}
}

impl Collation {
	pub fn is_binary(&self) -> bool {
		self.locale.is_none() && self.case_sensitive && self.diacritic_sensitive && !self.unicode_aware
	}

	/// The name this collation is referred to by in emitted SQL and in
	/// `fl_like`'s trailing collation argument.
	pub fn sqlite_name(&self) -> String {
		if self.is_binary() {
			return "BINARY".to_string();
		}
		let mut name = String::from("LCUnicode_");
		name.push(if self.case_sensitive {
			'C'
		} else {
			'c'
		});
		name.push(if self.diacritic_sensitive {
			'D'
		} else {
			'd'
		});
		if let Some(locale) = &self.locale {
			name.push('_');
			name.push_str(locale);
		}
		name
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
	Collection,
	Join,
	Unnest,
	Index,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKind {
	Fts,
	Vector,
	Unnest,
	Predictive,
}

/// The canonical identity of an indexed-node's backing table: two
/// `IndexedNode`s with equal identities within the same `Select` share a
/// single `IndexSource` (§4.4 of the design).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexIdentity {
	pub kind: IndexKindKey,
	pub collection: String,
	/// JSON rendering of the indexed expression with the source alias
	/// stripped, so the same property accessed via different aliases
	/// collides onto the same index.
	pub expr_json: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexKindKey {
	Fts,
	Vector,
	Unnest,
	Predictive,
}

/// The tagged-variant AST node body; see the crate's data-model notes for a
/// field-by-field description of each variant.
pub enum NodeKind {
	Literal(Value),

	Meta {
		property: MetaProperty,
		source: Option<NodeId>,
	},

	Parameter {
		name: String,
	},

	Property {
		source: Option<NodeId>,
		path: KeyPath,
		accessor: PropertyAccessor,
	},

	Variable {
		name: String,
		returns_body: bool,
	},

	Collate {
		inner: NodeId,
		collation: Collation,
		/// Whether this node's own write_sql must emit the `COLLATE`
		/// keyword; false when a descendant already emitted it.
		needs_keyword: bool,
	},

	RawSql(String),

	Op {
		op: &'static Operation,
		operands: Vec<NodeId>,
	},

	AnyEvery {
		kind: AnyEveryKind,
		variable: String,
		collection: NodeId,
		predicate: NodeId,
	},

	Function {
		spec: &'static FunctionSpec,
		args: Vec<NodeId>,
		collation: Option<Collation>,
	},

	Match {
		index: NodeId,
		search: NodeId,
		/// Filled in by the postprocessor once the `IndexSource` backing this
		/// index is resolved/created.
		resolved_index: Option<NodeId>,
	},

	Rank {
		index: NodeId,
		resolved_index: Option<NodeId>,
	},

	VectorDistance {
		expr: NodeId,
		query: NodeId,
		metric: Option<String>,
		probes: Option<NodeId>,
		/// Filled in by the postprocessor: true when this node is the sole
		/// top-level WHERE comparison and can use the nested-SELECT form.
		hybrid: bool,
		index: Option<NodeId>,
	},

	Prediction {
		model: NodeId,
		input: NodeId,
		/// Optional dotted path into the model's output dict; `None` reads
		/// the whole result via `fl_root`.
		property: Option<String>,
		/// `Some` once the postprocessor finds the model indexed (the
		/// backing table exists); `None` means this call stays a plain
		/// runtime `prediction(...)` call.
		resolved_index: Option<NodeId>,
	},

	What {
		expr: NodeId,
		name: String,
		explicit_alias: bool,
	},

	Source {
		kind: SourceKind,
		scope: String,
		collection: String,
		alias: String,
		table_name: String,
		join: Option<JoinType>,
		on: Option<NodeId>,
		unnest_expr: Option<NodeId>,
		uses_deleted: bool,
		has_explicit_alias: bool,
	},

	IndexSource {
		index_kind: IndexKind,
		identity: IndexIdentity,
		alias: String,
		table_name: String,
		on_source: NodeId,
		auxiliary_only: bool,
	},

	Select {
		what: Vec<NodeId>,
		sources: Vec<NodeId>,
		where_clause: Option<NodeId>,
		group_by: Vec<NodeId>,
		having: Option<NodeId>,
		order_by: Vec<(NodeId, bool)>,
		limit: Option<NodeId>,
		offset: Option<NodeId>,
		distinct: bool,
		is_aggregate: bool,
		prepended_columns: usize,
	},
}

impl NodeKind {
	/// The immediate children of this node, in emission order. This is the
	/// `visit_children` contract every node type honors (§3 data model):
	/// generic tree walks (aggregate detection, COLLATE-emitted scanning,
	/// arena-confinement checks) go through this rather than matching on
	/// every variant themselves.
	pub fn children(&self) -> Vec<NodeId> {
		match self {
			NodeKind::Literal(_) | NodeKind::Parameter { .. } | NodeKind::Variable { .. } | NodeKind::RawSql(_) => {
				Vec::new()
			}
			NodeKind::Meta {
				source,
				..
			}
			| NodeKind::Property {
				source,
				..
			} => source.into_iter().copied().collect(),
			NodeKind::Collate {
				inner,
				..
			} => vec![*inner],
			NodeKind::Op {
				operands,
				..
			} => operands.clone(),
			NodeKind::AnyEvery {
				collection,
				predicate,
				..
			} => vec![*collection, *predicate],
			NodeKind::Function {
				args,
				..
			} => args.clone(),
			NodeKind::Match {
				index,
				search,
				resolved_index,
			} => {
				let mut kids = vec![*index, *search];
				kids.extend(resolved_index.iter().copied());
				kids
			}
			NodeKind::Rank {
				index,
				resolved_index,
			} => {
				let mut kids = vec![*index];
				kids.extend(resolved_index.iter().copied());
				kids
			}
			NodeKind::VectorDistance {
				expr,
				query,
				probes,
				index,
				..
			} => {
				let mut kids = vec![*expr, *query];
				kids.extend(probes.iter().copied());
				kids.extend(index.iter().copied());
				kids
			}
			NodeKind::Prediction {
				model,
				input,
				resolved_index,
				..
			} => {
				let mut kids = vec![*model, *input];
				kids.extend(resolved_index.iter().copied());
				kids
			}
			NodeKind::What {
				expr,
				..
			} => vec![*expr],
			NodeKind::Source {
				on,
				unnest_expr,
				..
			} => on.iter().copied().chain(unnest_expr.iter().copied()).collect(),
			NodeKind::IndexSource {
				on_source,
				..
			} => vec![*on_source],
			NodeKind::Select {
				what,
				sources,
				where_clause,
				group_by,
				having,
				order_by,
				limit,
				offset,
				..
			} => {
				let mut kids = Vec::new();
				kids.extend(what.iter().copied());
				kids.extend(sources.iter().copied());
				kids.extend(where_clause.iter().copied());
				kids.extend(group_by.iter().copied());
				kids.extend(having.iter().copied());
				kids.extend(order_by.iter().map(|(id, _)| *id));
				kids.extend(limit.iter().copied());
				kids.extend(offset.iter().copied());
				kids
			}
		}
	}

	/// Recursively walks this node and its descendants, stopping at nested
	/// `Select` boundaries (a subquery's own aggregate-ness/collation state
	/// never leaks into its containing query).
	pub fn for_each_descendant(id: NodeId, arena: &Arena, f: &mut impl FnMut(NodeId, &NodeKind)) {
		let kind = arena.get(id);
		f(id, kind);
		if matches!(kind, NodeKind::Select { .. }) {
			return;
		}
		for child in kind.children() {
			NodeKind::for_each_descendant(child, arena, f);
		}
	}

	pub fn result_flags(&self) -> tables::OpFlags {
		match self {
			NodeKind::Literal(_) => tables::OpFlags::NONE,
			NodeKind::Meta {
				property,
				..
			} => property.flags(),
			NodeKind::Op {
				op,
				..
			} => op.flags,
			NodeKind::Function {
				spec,
				..
			} => spec.flags,
			NodeKind::Match {
				..
			} => tables::OpFlags::BOOL,
			NodeKind::Rank {
				..
			} => tables::OpFlags::NUMBER,
			NodeKind::VectorDistance {
				..
			} => tables::OpFlags::NUMBER,
			NodeKind::AnyEvery {
				..
			} => tables::OpFlags::BOOL,
			_ => tables::OpFlags::NONE,
		}
	}
}
