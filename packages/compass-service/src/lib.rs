pub mod cache;
pub mod chat;
pub mod companies;
pub mod embedding;
pub mod search;

mod error;

pub use cache::{CacheFacade, ResultSource};
pub use chat::{ChatRequest, ChatResponse};
pub use companies::{
	AddCompanyResponse, CompanyListResponse, DeleteCompanyResponse, ImportReport,
};
pub use compass_storage::{
	index::BoxFuture,
	models::{Company, NewCompany},
};
pub use error::{Error, ProviderFailure, Result};
pub use search::{SearchItem, SearchMode, SearchRequest, SearchResponse};

use std::{future::Future, sync::Arc, time::Duration};

use serde_json::Value;

use compass_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use compass_providers::{chat::ChatReply, embedding as openai, pinecone};
use compass_storage::{
	cache::{CacheStore, RedisCache},
	db::Db,
	index::{CompanyStore, SearchIndex},
	qdrant::QdrantStore,
};

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, compass_providers::Result<Vec<Vec<f32>>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		tools: &'a [Value],
	) -> BoxFuture<'a, compass_providers::Result<ChatReply>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub chat: Arc<dyn ChatProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, chat: Arc<dyn ChatProvider>) -> Self {
		Self { embedding, chat }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), chat: provider }
	}
}

/// Search, company management, and chat over one shared set of stores and providers.
pub struct CompassService {
	pub cfg: Config,
	pub index: Arc<dyn SearchIndex>,
	pub companies: Arc<dyn CompanyStore>,
	pub cache: CacheFacade,
	pub providers: Providers,
}
impl CompassService {
	pub fn new(
		cfg: Config,
		index: Arc<dyn SearchIndex>,
		companies: Arc<dyn CompanyStore>,
		cache_store: Option<Arc<dyn CacheStore>>,
	) -> Self {
		Self::with_providers(cfg, index, companies, cache_store, Providers::default())
	}

	pub fn with_providers(
		cfg: Config,
		index: Arc<dyn SearchIndex>,
		companies: Arc<dyn CompanyStore>,
		cache_store: Option<Arc<dyn CacheStore>>,
		providers: Providers,
	) -> Self {
		let cache = CacheFacade::new(cache_store, &cfg.cache);

		Self { cfg, index, companies, cache, providers }
	}

	/// Connects to the configured stores and bootstraps their schema.
	pub async fn connect(cfg: Config) -> Result<Self> {
		let db = Arc::new(Db::connect(&cfg.storage.postgres).await?);

		db.ensure_schema(cfg.storage.vector_dim).await?;

		let index: Arc<dyn SearchIndex> = match cfg.storage.qdrant.as_ref() {
			Some(qdrant_cfg) if cfg.storage.backend == "qdrant" => {
				let store = QdrantStore::new(qdrant_cfg, cfg.storage.vector_dim)?;

				store.ensure_collection().await?;

				Arc::new(store)
			},
			_ => db.clone(),
		};
		let cache_store: Option<Arc<dyn CacheStore>> = if cfg.cache.enabled {
			let command_timeout = Duration::from_millis(cfg.cache.timeout_ms);

			Some(Arc::new(RedisCache::new(&cfg.cache.url, command_timeout)?))
		} else {
			None
		};

		tracing::info!(
			backend = %cfg.storage.backend,
			cache_enabled = cfg.cache.enabled,
			embedding_providers = cfg.providers.embedding.len(),
			"Compass service connected."
		);

		Ok(Self::new(cfg, index, db, cache_store))
	}

	pub(crate) fn store_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.search.store_timeout_ms)
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, compass_providers::Result<Vec<Vec<f32>>>> {
		match cfg.kind.as_str() {
			"pinecone" => Box::pin(pinecone::embed(cfg, texts)),
			_ => Box::pin(openai::embed(cfg, texts)),
		}
	}
}

impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		tools: &'a [Value],
	) -> BoxFuture<'a, compass_providers::Result<ChatReply>> {
		Box::pin(compass_providers::chat::complete(cfg, messages, tools))
	}
}

/// Bounds a store call; a timeout or store error becomes a typed service error.
pub(crate) async fn store_call<T, F>(
	operation: &'static str,
	timeout: Duration,
	fut: F,
) -> Result<T>
where
	F: Future<Output = compass_storage::Result<T>>,
{
	match tokio::time::timeout(timeout, fut).await {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(err)) => {
			tracing::warn!(operation, error = %err, "Store call failed.");

			Err(err.into())
		},
		Err(_) => {
			tracing::warn!(
				operation,
				timeout_ms = timeout.as_millis() as u64,
				"Store call timed out."
			);

			Err(Error::StoreUnavailable { message: format!("{operation} timed out.") })
		},
	}
}
