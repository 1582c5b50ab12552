pub mod hydrate;
pub mod ranking;

pub use ranking::{RankParams, RankedHit, SearchMode};

use serde::{Deserialize, Serialize};

use compass_domain::{FilterSpec, filter};
use compass_storage::models::Company;

use crate::{CompassService, Error, Result, ResultSource, embedding::normalize_text};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub filters: Vec<FilterSpec>,
	#[serde(default = "enabled")]
	pub vector_search: bool,
	#[serde(default = "enabled")]
	pub text_search: bool,
}
impl SearchRequest {
	/// A hybrid search with default `top_k` and no filters.
	pub fn new(query: impl Into<String>) -> Self {
		Self {
			query: query.into(),
			top_k: None,
			filters: Vec::new(),
			vector_search: true,
			text_search: true,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
	/// 1-based position in this response.
	pub rank: u32,
	pub score: f64,
	pub vector_rank: Option<u32>,
	pub lexical_rank: Option<u32>,
	pub company: Company,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
	pub mode: SearchMode,
	/// Set when the vector branch was skipped because no embedding provider answered.
	pub degraded: bool,
	pub source: ResultSource,
	pub items: Vec<SearchItem>,
}

/// The cached part of a [`SearchResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchPage {
	mode: SearchMode,
	degraded: bool,
	items: Vec<SearchItem>,
}
impl SearchPage {
	fn into_response(self, source: ResultSource) -> SearchResponse {
		SearchResponse { mode: self.mode, degraded: self.degraded, source, items: self.items }
	}
}

impl CompassService {
	/// Ranks companies for `req.query`, serving repeated requests from the cache.
	///
	/// Filters and the query are validated before any store or cache call.
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let top = self.resolve_top_k(req.top_k)?;
		let predicate = filter::build::<Company>(&req.filters)?;
		let query = normalize_text(&req.query);

		if query.is_empty() {
			return Err(Error::InvalidQuery { message: "query must be non-empty.".to_string() });
		}

		SearchMode::select(req.vector_search, req.text_search)?;

		let digest = self.search_digest(&req, top);
		let key = self.cache.search_key(&query, digest.as_deref());

		if let Some(page) = self.cache.lookup::<SearchPage>(&key).await {
			tracing::debug!(key, "Search served from cache.");

			return Ok(page.into_response(ResultSource::Cache));
		}

		let page = self
			.search_uncached(&query, req.vector_search, req.text_search, &predicate, top)
			.await?;

		// Degraded pages would pin lexical-only results for the whole TTL.
		if !page.degraded {
			self.cache.put(&key, &page).await;
		}

		Ok(page.into_response(ResultSource::Database))
	}

	async fn search_uncached(
		&self,
		query: &str,
		vector_search: bool,
		text_search: bool,
		predicate: &compass_domain::Predicate,
		top: u32,
	) -> Result<SearchPage> {
		let mut degraded = false;
		let vector = if vector_search {
			match self.embed(query).await {
				Ok(vector) => Some(vector),
				Err(err @ Error::Embedding { .. })
					if text_search && self.cfg.search.degrade_to_lexical =>
				{
					tracing::warn!(error = %err, "Embedding failed; serving lexical results only.");

					degraded = true;

					None
				},
				Err(err) => return Err(err),
			}
		} else {
			None
		};
		let text = text_search.then_some(query);
		let params = RankParams::from_config(&self.cfg.search, top as usize);
		let (mode, hits) =
			ranking::rank(self.index.as_ref(), vector.as_deref(), text, predicate, &params).await?;
		let rows = hydrate::hydrate(self.companies.as_ref(), &hits, self.store_timeout()).await?;
		let items = rows
			.into_iter()
			.enumerate()
			.map(|(idx, (hit, company))| SearchItem {
				rank: idx as u32 + 1,
				score: hit.score,
				vector_rank: hit.vector_rank,
				lexical_rank: hit.lexical_rank,
				company,
			})
			.collect::<Vec<_>>();

		tracing::info!(?mode, degraded, results = items.len(), "Search completed.");

		Ok(SearchPage { mode, degraded, items })
	}

	fn resolve_top_k(&self, requested: Option<u32>) -> Result<u32> {
		let top = requested.unwrap_or(self.cfg.search.top_k);
		let window = self.cfg.search.fusion_window;

		if top == 0 || top > window {
			return Err(Error::InvalidRequest {
				message: format!("top_k must be between 1 and {window}."),
			});
		}

		Ok(top)
	}

	/// `None` for a default request, so the plain query key is shared by the chat tool and callers.
	fn search_digest(&self, req: &SearchRequest, top: u32) -> Option<String> {
		if top == self.cfg.search.top_k
			&& req.filters.is_empty()
			&& req.vector_search
			&& req.text_search
		{
			return None;
		}

		let payload = serde_json::json!({
			"top_k": top,
			"filters": req.filters,
			"vector_search": req.vector_search,
			"text_search": req.text_search,
		});

		Some(blake3::hash(payload.to_string().as_bytes()).to_hex().to_string())
	}
}

fn enabled() -> bool {
	true
}
