//! Translates queries from the JSON/Fleece query schema into SQLite-flavor
//! SQL for an embedded document store.
//!
//! The translator is a library with no owned I/O: callers decode a query
//! tree (typically from JSON) into a [`Value`], hand it to a
//! [`QueryTranslator`] built over their own [`Delegate`], and get back SQL
//! plus the side information (referenced tables, parameters, column titles,
//! …) needed to run and bind it.

pub mod ast;
pub mod collection;
pub mod delegate;
pub mod err;
pub mod parser;
pub mod path;
pub mod postprocess;
pub mod translator;
pub mod value;
pub mod writer;

pub use collection::CollectionPath;
pub use delegate::{Delegate, DeletionStatus};
pub use err::{Error, Result};
pub use translator::{fts_column_name, QueryTranslator, TranslatedQuery};
pub use value::Value;
