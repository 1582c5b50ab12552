use serde_json::Value;

use crate::{AuthScheme, Error, Result};

/// Calls the Pinecone inference `/embed` endpoint with passage-mode inputs.
pub async fn embed(
	cfg: &compass_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = client
		.post(url)
		.headers(crate::auth_headers(AuthScheme::ApiKey, &cfg.api_key, &cfg.default_headers)?)
		.json(&request_body(&cfg.model, texts))
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vectors = parse_embed_response(json)?;

	if vectors.len() != texts.len() {
		return Err(Error::InvalidResponse {
			message: format!(
				"Pinecone response has {} vectors for {} inputs.",
				vectors.len(),
				texts.len()
			),
		});
	}

	Ok(vectors)
}

fn request_body(model: &str, texts: &[String]) -> Value {
	let inputs = texts.iter().map(|text| serde_json::json!({ "text": text })).collect::<Vec<_>>();

	serde_json::json!({
		"model": model,
		"inputs": inputs,
		"parameters": { "input_type": "passage", "truncate": "END" },
	})
}

fn parse_embed_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json.get("data").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Pinecone response is missing data array.".to_string() }
	})?;

	data.iter()
		.map(|item| {
			let values = item.get("values").ok_or_else(|| Error::InvalidResponse {
				message: "Pinecone item is missing values.".to_string(),
			})?;

			crate::embedding::parse_vector(values)
		})
		.collect()
}
