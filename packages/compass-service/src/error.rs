use std::fmt::{self, Display, Formatter};

use serde::Serialize;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Invalid filter: {message}")]
	InvalidFilter { message: String },
	#[error("Invalid query: {message}")]
	InvalidQuery { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("All embedding providers failed: {}", join_failures(.failures))]
	Embedding { failures: Vec<ProviderFailure> },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Store unavailable: {message}")]
	StoreUnavailable { message: String },
	#[error("Tool loop did not finish within {iterations} model turns.")]
	ToolLoopExhausted { iterations: u32 },
}
impl From<compass_storage::Error> for Error {
	fn from(err: compass_storage::Error) -> Self {
		match err {
			compass_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			compass_storage::Error::UnsupportedFilter(message) => Self::InvalidFilter { message },
			compass_storage::Error::NotFound(message) => Self::NotFound { message },
			other => Self::StoreUnavailable { message: other.to_string() },
		}
	}
}

impl From<compass_domain::FilterError> for Error {
	fn from(err: compass_domain::FilterError) -> Self {
		Self::InvalidFilter { message: err.to_string() }
	}
}

impl From<compass_providers::Error> for Error {
	fn from(err: compass_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

/// Why one embedding provider in the fallback chain did not produce a vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
	pub provider_id: String,
	pub message: String,
}
impl Display for ProviderFailure {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.provider_id, self.message)
	}
}

fn join_failures(failures: &[ProviderFailure]) -> String {
	failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
