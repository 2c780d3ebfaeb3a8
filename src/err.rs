use thiserror::Error;

/// The single error surface crossing the translator's façade boundary.
///
/// [`Error::InvalidQuery`] covers every malformed-input case enumerated in the
/// crate's component design (structural, naming and semantic failures, plus
/// value-tree parsing failures folded in with their underlying message).
/// [`Error::Internal`] is reserved for "this should be impossible" assertions
/// and should never be triggered by untrusted input alone.
/// [`Error::Delegate`] wraps an error a [`crate::delegate::Delegate`]
/// implementation chooses to surface (e.g. a genuine storage-engine failure
/// behind an existence check) and is propagated unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	#[error("Invalid query: {0}")]
	InvalidQuery(String),

	#[error("Internal error: {0}")]
	Internal(String),

	#[error("Delegate error: {0}")]
	Delegate(String),
}

impl Error {
	/// Builds an [`Error::InvalidQuery`] from a format string, mirroring the
	/// single `fail(...)` raise point every invariant check routes through.
	pub fn invalid(msg: impl Into<String>) -> Self {
		Error::InvalidQuery(msg.into())
	}

	pub fn internal(msg: impl Into<String>) -> Self {
		Error::Internal(msg.into())
	}
}

pub type Result<T> = std::result::Result<T, Error>;

/// Raises [`Error::InvalidQuery`] with a formatted message; the translator's
/// one and only error-raising primitive, used the way `require`/`fail` are
/// used throughout the parser and postprocessor.
macro_rules! fail {
	($($arg:tt)*) => {
		return Err($crate::err::Error::invalid(format!($($arg)*)))
	};
}

macro_rules! require {
	($cond:expr, $($arg:tt)*) => {
		if !($cond) {
			fail!($($arg)*);
		}
	};
}

pub(crate) use fail;
pub(crate) use require;
