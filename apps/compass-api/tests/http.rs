use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use compass_api::{routes, state::AppState};
use compass_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use compass_providers::chat::ChatReply;
use compass_service::{BoxFuture, ChatProvider, CompassService, EmbeddingProvider, Providers};
use compass_testkit::{MemoryCache, MemoryIndex};

struct FlatEmbedding {
	healthy: bool,
}
impl EmbeddingProvider for FlatEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, compass_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			if !self.healthy {
				return Err(compass_providers::Error::InvalidResponse {
					message: format!("{} is down.", cfg.provider_id),
				});
			}

			Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
		})
	}
}

struct CannedChat;
impl ChatProvider for CannedChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		_messages: &'a [Value],
		_tools: &'a [Value],
	) -> BoxFuture<'a, compass_providers::Result<ChatReply>> {
		Box::pin(async move {
			Ok(ChatReply { content: Some("No search needed.".to_string()), tool_calls: Vec::new() })
		})
	}
}

struct TestApp {
	router: Router,
	index: Arc<MemoryIndex>,
}
impl TestApp {
	fn new(cfg: Config, healthy: bool) -> Self {
		let index = Arc::new(MemoryIndex::new());
		let cache = Arc::new(MemoryCache::new());
		let providers = Providers::new(Arc::new(FlatEmbedding { healthy }), Arc::new(CannedChat));
		let service = CompassService::with_providers(
			cfg,
			index.clone(),
			index.clone(),
			Some(cache),
			providers,
		);
		let router = routes::router(AppState::from_service(service));

		Self { router, index }
	}

	async fn send(&self, method: &str, uri: &str, payload: Option<Value>) -> (StatusCode, Value) {
		let mut builder = Request::builder().method(method).uri(uri);
		let body = match payload {
			Some(payload) => {
				builder = builder.header("content-type", "application/json");

				Body::from(payload.to_string())
			},
			None => Body::empty(),
		};
		let response = self
			.router
			.clone()
			.oneshot(builder.body(body).expect("Failed to build request."))
			.await
			.expect("Failed to call router.");
		let status = response.status();
		let bytes = body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("Failed to read response body.");
		let json = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).expect("Failed to parse response.")
		};

		(status, json)
	}
}

fn company_body(name: &str) -> Value {
	json!({
		"name": name,
		"description": "Tech platform for logistics.",
		"industry": "Technology",
		"size": "51-200",
		"location": "San Francisco",
		"tags": ["saas"],
	})
}

#[tokio::test]
async fn health_ok() {
	let app = TestApp::new(compass_testkit::test_config(3), true);
	let (status, _) = app.send("GET", "/health", None).await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn company_lifecycle_over_http() {
	let app = TestApp::new(compass_testkit::test_config(3), true);
	let (status, created) = app.send("POST", "/v1/companies", Some(company_body("Acme"))).await;

	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(created["embedded"], true);

	let id = created["id"].as_i64().expect("Created id must be an integer.");
	let (status, listing) = app.send("GET", "/v1/companies", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(listing["source"], "database");
	assert_eq!(listing["items"][0]["name"], "Acme");

	let (status, results) = app
		.send("POST", "/v1/companies/search", Some(json!({ "query": "tech in San Francisco" })))
		.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(results["mode"], "hybrid");
	assert_eq!(results["items"][0]["company"]["id"], id);
	assert_eq!(results["items"][0]["rank"], 1);

	let (status, deleted) = app.send("DELETE", &format!("/v1/companies/{id}"), None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(deleted["deleted"], true);

	let (status, err) = app.send("DELETE", &format!("/v1/companies/{id}"), None).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(err["error_code"], "not_found");
}

#[tokio::test]
async fn invalid_filters_are_bad_requests() {
	let app = TestApp::new(compass_testkit::test_config(3), true);
	let payload = json!({
		"query": "tech",
		"filters": [{ "field": "name; DROP TABLE companies", "operator": "=", "value": "x" }],
	});
	let (status, err) = app.send("POST", "/v1/companies/search", Some(payload)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(err["error_code"], "invalid_filter");
	assert_eq!(app.index.calls(), 0);

	let (status, err) =
		app.send("POST", "/v1/companies/search", Some(json!({ "query": "   " }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(err["error_code"], "invalid_query");
}

#[tokio::test]
async fn store_outage_maps_to_service_unavailable() {
	let app = TestApp::new(compass_testkit::test_config(3), true);

	app.index.set_unavailable(true);

	let (status, err) =
		app.send("POST", "/v1/companies/search", Some(json!({ "query": "tech" }))).await;

	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(err["error_code"], "store_unavailable");
}

#[tokio::test]
async fn exhausted_embedding_chain_maps_to_bad_gateway() {
	let mut cfg = compass_testkit::test_config(3);

	cfg.search.degrade_to_lexical = false;

	let app = TestApp::new(cfg, false);
	let (status, err) =
		app.send("POST", "/v1/companies/search", Some(json!({ "query": "tech" }))).await;

	assert_eq!(status, StatusCode::BAD_GATEWAY);
	assert_eq!(err["error_code"], "embedding_unavailable");
	assert!(
		err["message"].as_str().is_some_and(|message| message.contains("pinecone")),
		"Unexpected message: {err}."
	);
}

#[tokio::test]
async fn chat_returns_the_model_answer() {
	let app = TestApp::new(compass_testkit::test_config(3), true);
	let (status, reply) =
		app.send("POST", "/v1/chat", Some(json!({ "query": "Say hello." }))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(reply["response"], "No search needed.");
	assert_eq!(reply["iterations"], 1);
	assert_eq!(reply["companies"], json!([]));
}
