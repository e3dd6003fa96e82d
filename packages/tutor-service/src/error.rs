pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Evidence retrieval failed: {operation} gave up after {attempts} attempts: {message}")]
	RetrievalFailed { operation: &'static str, attempts: u32, message: String },
	#[error("Data access error in {operation} for {query:?}: {message}")]
	DataAccess { operation: &'static str, query: String, message: String },
	#[error("Budget configuration error: {message}")]
	BudgetConfiguration { message: String },
	#[error("Configuration error: {message}")]
	Configuration { message: String },
	#[error("{operation} was cancelled.")]
	Cancelled { operation: &'static str },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
}
impl Error {
	/// Maps a storage error raised while serving `operation` for `query`.
	pub fn data_access(operation: &'static str, query: &str, err: tutor_storage::Error) -> Self {
		match err {
			tutor_storage::Error::Exhausted { operation, attempts, source } =>
				Self::RetrievalFailed { operation, attempts, message: source.to_string() },
			tutor_storage::Error::Cancelled { operation } => Self::Cancelled { operation },
			tutor_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::DataAccess { operation, query: query.to_string(), message: other.to_string() },
		}
	}

	/// True when evidence could not be retrieved, as opposed to retrieval finding nothing.
	pub fn is_retrieval_failure(&self) -> bool {
		matches!(
			self,
			Self::RetrievalFailed { .. } | Self::DataAccess { .. } | Self::Provider { .. }
		)
	}
}
impl From<tutor_storage::Error> for Error {
	fn from(err: tutor_storage::Error) -> Self {
		Self::data_access("storage", "", err)
	}
}

impl From<tutor_providers::Error> for Error {
	fn from(err: tutor_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<tutor_config::Error> for Error {
	fn from(err: tutor_config::Error) -> Self {
		match err {
			tutor_config::Error::Budget { message } => Self::BudgetConfiguration { message },
			other => Self::Configuration { message: other.to_string() },
		}
	}
}
