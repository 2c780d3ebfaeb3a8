//! The [`Delegate`] trait: the translator's only capability for talking to
//! the storage layer. Every method is synchronous and assumed pure (same
//! inputs, same answer) for the lifetime of one `parse` call.

use crate::err::Result;

/// Which rows a collection's physical table name should expose.
///
/// `LiveAndDeleted` is asked for only when the query itself references
/// `_deleted`/`meta().deleted` and therefore wants to see tombstones; in
/// every other case the translator asks for `Live` and additionally injects
/// a `(flags & 1 = 0)` predicate of its own (§4.3), so a delegate backed by
/// a single physical table holding both kinds of row can legitimately
/// return the same name for both statuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletionStatus {
	Live,
	Deleted,
	LiveAndDeleted,
}

/// The capability the translator requires from its host: existence checks
/// and logical-to-physical table name mapping. Implementations are trusted
/// to be pure and to return `Err` only for a genuine engine-level failure
/// (e.g. a corrupted catalog read), which the translator propagates
/// unchanged as [`crate::err::Error::Delegate`].
pub trait Delegate {
	fn table_exists(&self, name: &str) -> Result<bool>;

	/// `collection` is the canonicalized `scope.collection` pair already
	/// normalized by [`crate::collection::CollectionPath`] (empty string
	/// means "the default").
	fn collection_table_name(&self, scope: &str, collection: &str, status: DeletionStatus) -> Result<String>;

	fn fts_table_name(&self, on_table: &str, property: &str) -> Result<String>;

	fn unnested_table_name(&self, on_table: &str, property: &str) -> Result<String>;

	#[cfg(feature = "predictive-query")]
	fn predictive_table_name(&self, on_table: &str, property: &str) -> Result<String>;

	#[cfg(feature = "vector-search")]
	fn vector_table_name(&self, collection: &str, property_json: &str, metric_name: &str) -> Result<String>;
}
