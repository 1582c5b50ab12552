mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Chat, Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres, Providers, Qdrant,
	Search, Service, Storage,
};

use std::{collections::HashSet, fs, path::Path};

pub const STORAGE_BACKENDS: [&str; 2] = ["postgres", "qdrant"];
pub const DISTANCE_METRICS: [&str; 3] = ["cosine", "l2", "inner_product"];
pub const EMBEDDING_KINDS: [&str; 2] = ["openai", "pinecone"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if !STORAGE_BACKENDS.contains(&cfg.storage.backend.as_str()) {
		return Err(Error::Validation {
			message: "storage.backend must be one of postgres or qdrant.".to_string(),
		});
	}
	if cfg.storage.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if !DISTANCE_METRICS.contains(&cfg.storage.postgres.distance.as_str()) {
		return Err(Error::Validation {
			message: "storage.postgres.distance must be one of cosine, l2, or inner_product."
				.to_string(),
		});
	}
	if cfg.storage.backend == "qdrant" {
		let Some(qdrant) = cfg.storage.qdrant.as_ref() else {
			return Err(Error::Validation {
				message: "storage.qdrant is required when storage.backend is qdrant.".to_string(),
			});
		};

		if qdrant.url.trim().is_empty() || qdrant.collection.trim().is_empty() {
			return Err(Error::Validation {
				message: "storage.qdrant.url and storage.qdrant.collection must be non-empty."
					.to_string(),
			});
		}
	}
	if cfg.cache.enabled && cfg.cache.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "cache.url must be non-empty when cache.enabled is true.".to_string(),
		});
	}
	if cfg.cache.key_prefix.trim().is_empty() || cfg.cache.key_prefix.contains(['*', '?', '[']) {
		return Err(Error::Validation {
			message: "cache.key_prefix must be non-empty and free of glob characters.".to_string(),
		});
	}
	if cfg.cache.ttl_secs == 0 {
		return Err(Error::Validation {
			message: "cache.ttl_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "cache.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.invalidate_timeout_ms < cfg.cache.timeout_ms {
		return Err(Error::Validation {
			message: "cache.invalidate_timeout_ms must be at least cache.timeout_ms.".to_string(),
		});
	}

	validate_embedding_providers(cfg)?;

	if cfg.providers.llm.model.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.llm.model must be non-empty.".to_string(),
		});
	}
	if !cfg.providers.llm.temperature.is_finite() || cfg.providers.llm.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number, zero or greater."
				.to_string(),
		});
	}
	if cfg.search.top_k == 0 {
		return Err(Error::Validation {
			message: "search.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.fusion_window < cfg.search.top_k {
		return Err(Error::Validation {
			message: "search.fusion_window must be greater than or equal to search.top_k."
				.to_string(),
		});
	}
	if cfg.search.store_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.store_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.chat.max_tool_iterations == 0 {
		return Err(Error::Validation {
			message: "chat.max_tool_iterations must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_embedding_providers(cfg: &Config) -> Result<()> {
	if cfg.providers.embedding.is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding must list at least one provider.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for (idx, provider) in cfg.providers.embedding.iter().enumerate() {
		if provider.provider_id.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("providers.embedding[{idx}].provider_id must be non-empty."),
			});
		}
		if !seen.insert(provider.provider_id.as_str()) {
			return Err(Error::Validation {
				message: format!("providers.embedding[{idx}].provider_id must be unique."),
			});
		}
		if !EMBEDDING_KINDS.contains(&provider.kind.as_str()) {
			return Err(Error::Validation {
				message: format!(
					"providers.embedding[{idx}].kind must be one of openai or pinecone."
				),
			});
		}
		if provider.dimensions == 0 {
			return Err(Error::Validation {
				message: format!(
					"providers.embedding[{idx}].dimensions must be greater than zero."
				),
			});
		}
		if provider.dimensions != cfg.storage.vector_dim {
			return Err(Error::Validation {
				message: format!(
					"providers.embedding[{idx}].dimensions must match storage.vector_dim."
				),
			});
		}
		if provider.timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!(
					"providers.embedding[{idx}].timeout_ms must be greater than zero."
				),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if let Some(qdrant) = cfg.storage.qdrant.as_mut()
		&& qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false)
	{
		qdrant.api_key = None;
	}
	if cfg.chat.system_prompt.as_deref().map(|prompt| prompt.trim().is_empty()).unwrap_or(false) {
		cfg.chat.system_prompt = None;
	}

	cfg.storage.backend = cfg.storage.backend.trim().to_ascii_lowercase();
	cfg.storage.postgres.distance = cfg.storage.postgres.distance.trim().to_ascii_lowercase();

	for provider in &mut cfg.providers.embedding {
		provider.kind = provider.kind.trim().to_ascii_lowercase();
	}
}
