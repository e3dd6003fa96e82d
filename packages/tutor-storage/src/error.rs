/// Message fragments that identify a dropped or unreachable connection.
const TRANSIENT_MESSAGE_MARKERS: [&str; 14] = [
	"connection reset",
	"connection refused",
	"connection closed",
	"connection aborted",
	"server closed the connection",
	"broken pipe",
	"unexpected eof",
	"ssl",
	"tls",
	"transport error",
	"unavailable",
	"deadline exceeded",
	"timed out",
	"goaway",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
	/// The call may succeed if repeated on a fresh connection.
	Transient,
	/// Repeating the call cannot change the outcome.
	Permanent,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Malformed record: {0}")]
	MalformedRecord(String),
	#[error("{operation} failed after {attempts} attempts: {source}")]
	Exhausted { operation: &'static str, attempts: u32, source: Box<Error> },
	#[error("{operation} was cancelled.")]
	Cancelled { operation: &'static str },
}
impl Error {
	pub fn class(&self) -> ErrorClass {
		let transient = match self {
			Self::Sqlx(err) => sqlx_is_transient(err),
			Self::Qdrant(err) => message_is_transient(&err.to_string()),
			Self::InvalidArgument(_)
			| Self::MalformedRecord(_)
			| Self::Exhausted { .. }
			| Self::Cancelled { .. } => false,
		};

		if transient { ErrorClass::Transient } else { ErrorClass::Permanent }
	}

	pub fn is_transient(&self) -> bool {
		self.class() == ErrorClass::Transient
	}
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}

fn sqlx_is_transient(err: &sqlx::Error) -> bool {
	match err {
		sqlx::Error::Io(_)
		| sqlx::Error::Tls(_)
		| sqlx::Error::PoolTimedOut
		| sqlx::Error::WorkerCrashed => true,
		sqlx::Error::Database(db_err) =>
			db_err.code().map(|code| sqlstate_is_transient(&code)).unwrap_or(false),
		sqlx::Error::Protocol(message) => message_is_transient(message),
		_ => false,
	}
}

/// Connection exceptions (class 08), operator shutdowns (57P01..57P03) and connection
/// exhaustion (53300).
fn sqlstate_is_transient(code: &str) -> bool {
	code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03" | "53300")
}

fn message_is_transient(message: &str) -> bool {
	let message = message.to_lowercase();

	TRANSIENT_MESSAGE_MARKERS.iter().any(|marker| message.contains(marker))
}
