use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub cache: Cache,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	/// Which index answers the two ranking branches: "postgres" or "qdrant".
	/// Company records are always read from Postgres.
	#[serde(default = "default_backend")]
	pub backend: String,
	pub vector_dim: u32,
	pub postgres: Postgres,
	pub qdrant: Option<Qdrant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	/// One of "cosine", "l2", or "inner_product".
	#[serde(default = "default_distance")]
	pub distance: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cache {
	pub enabled: bool,
	pub url: String,
	#[serde(default = "default_key_prefix")]
	pub key_prefix: String,
	#[serde(default = "default_ttl_secs")]
	pub ttl_secs: u64,
	/// Bounds each cache round trip.
	#[serde(default = "default_cache_timeout_ms")]
	pub timeout_ms: u64,
	/// Bounds a whole pattern invalidation, which takes several SCAN and DEL round trips.
	#[serde(default = "default_invalidate_timeout_ms")]
	pub invalidate_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	/// Tried in order; the first provider that answers wins.
	pub embedding: Vec<EmbeddingProviderConfig>,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	/// Wire protocol: "openai" or "pinecone".
	pub kind: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_tokens: Option<u32>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub top_k: u32,
	/// Per-branch candidate cap before fusion.
	pub fusion_window: u32,
	pub rrf_k: u32,
	/// Serve lexical-only results when every embedding provider fails.
	pub degrade_to_lexical: bool,
	pub store_timeout_ms: u64,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			top_k: 5,
			fusion_window: 20,
			rrf_k: 60,
			degrade_to_lexical: true,
			store_timeout_ms: 5_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Chat {
	pub max_tool_iterations: u32,
	pub system_prompt: Option<String>,
}
impl Default for Chat {
	fn default() -> Self {
		Self { max_tool_iterations: 4, system_prompt: None }
	}
}

fn default_backend() -> String {
	"postgres".to_string()
}

fn default_distance() -> String {
	"cosine".to_string()
}

fn default_key_prefix() -> String {
	"compass".to_string()
}

fn default_ttl_secs() -> u64 {
	3_600
}

fn default_cache_timeout_ms() -> u64 {
	250
}

fn default_invalidate_timeout_ms() -> u64 {
	5_000
}
