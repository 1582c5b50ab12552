//! HTTP clients for the embedding and chat providers Compass talks to.

pub mod chat;
pub mod embedding;
pub mod pinecone;

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::{Map, Value};

/// How a provider expects its API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
	/// `Authorization: Bearer <key>`.
	Bearer,
	/// `Api-Key: <key>`.
	ApiKey,
}

pub fn auth_headers(
	scheme: AuthScheme,
	api_key: &str,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	match scheme {
		AuthScheme::Bearer => {
			headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
		},
		AuthScheme::ApiKey => {
			headers.insert(HeaderName::from_static("api-key"), HeaderValue::from_str(api_key)?);
		},
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: format!("Default header value for {key:?} must be a string."),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}
