use serde_json::Map;

use compass_config::{
	Cache, Chat, Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres, Providers, Search,
	Service, Storage,
};

/// A valid configuration with two embedding providers (`pinecone` then `openai`) and a cache
/// that gives up after 50 ms.
pub fn test_config(vector_dim: u32) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage {
			backend: "postgres".to_string(),
			vector_dim,
			postgres: Postgres {
				dsn: "postgres://postgres@127.0.0.1:5432/compass".to_string(),
				pool_max_conns: 2,
				distance: "cosine".to_string(),
			},
			qdrant: None,
		},
		cache: Cache {
			enabled: true,
			url: "redis://127.0.0.1:6379".to_string(),
			key_prefix: "compass".to_string(),
			ttl_secs: 3_600,
			timeout_ms: 50,
			invalidate_timeout_ms: 1_000,
		},
		providers: Providers {
			embedding: vec![
				embedding_provider("pinecone", "pinecone", vector_dim),
				embedding_provider("openai", "openai", vector_dim),
			],
			llm: LlmProviderConfig {
				provider_id: "groq".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/openai/v1/chat/completions".to_string(),
				model: "llama3-groq-70b-8192-tool-use-preview".to_string(),
				temperature: 0.0,
				max_tokens: None,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		search: Search::default(),
		chat: Chat::default(),
	}
}

fn embedding_provider(provider_id: &str, kind: &str, dimensions: u32) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: provider_id.to_string(),
		kind: kind.to_string(),
		api_base: "http://127.0.0.1:9".to_string(),
		api_key: "test-key".to_string(),
		path: "/embed".to_string(),
		model: "test-embedding".to_string(),
		dimensions,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}
