#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error(transparent)]
	Redis(#[from] redis::RedisError),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Unsupported filter: {0}")]
	UnsupportedFilter(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Unavailable: {0}")]
	Unavailable(String),
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
