//! Ordered embedding-provider fallback.

use compass_config::EmbeddingProviderConfig;

use crate::{CompassService, EmbeddingProvider, Error, ProviderFailure, Result};

impl CompassService {
	/// Embeds `text` with the first configured provider that answers at the configured dimension.
	pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
		embed_with_fallback(
			self.providers.embedding.as_ref(),
			&self.cfg.providers.embedding,
			text,
			self.cfg.storage.vector_dim,
		)
		.await
	}
}

/// Newlines become spaces, whitespace runs collapse to one space, and the ends are trimmed.
pub fn normalize_text(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tries each provider once, in order, with the same normalized text.
///
/// A provider that errors or answers with the wrong dimensionality is logged and skipped.
pub async fn embed_with_fallback(
	provider: &dyn EmbeddingProvider,
	configs: &[EmbeddingProviderConfig],
	text: &str,
	dims: u32,
) -> Result<Vec<f32>> {
	let normalized = normalize_text(text);

	if normalized.is_empty() {
		return Err(Error::InvalidQuery { message: "text to embed must be non-empty.".to_string() });
	}

	let texts = [normalized];
	let mut failures = Vec::with_capacity(configs.len());

	for cfg in configs {
		let message = match provider.embed(cfg, &texts).await {
			Ok(vectors) => match vectors.into_iter().next() {
				Some(vector) if vector.len() == dims as usize => return Ok(vector),
				Some(vector) =>
					format!("returned {} dimensions, expected {dims}.", vector.len()),
				None => "returned no embeddings.".to_string(),
			},
			Err(err) => err.to_string(),
		};

		tracing::warn!(
			provider_id = %cfg.provider_id,
			error = %message,
			"Embedding provider failed; trying the next one."
		);

		failures.push(ProviderFailure { provider_id: cfg.provider_id.clone(), message });
	}

	Err(Error::Embedding { failures })
}
