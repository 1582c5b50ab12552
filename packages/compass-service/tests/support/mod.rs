#![allow(dead_code)]

use std::{
	collections::{HashSet, VecDeque},
	sync::{Arc, Mutex},
};

use serde_json::Value;

use compass_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use compass_providers::chat::{ChatReply, ToolCall};
use compass_service::{BoxFuture, ChatProvider, CompassService, EmbeddingProvider, Providers};
use compass_storage::models::NewCompany;
use compass_testkit::{MemoryCache, MemoryIndex, company_fixture};

pub const DIM: u32 = 3;

/// Embeds text as `[tech, finance, san francisco]` keyword flags.
#[derive(Default)]
pub struct KeywordEmbedding {
	failing: Mutex<HashSet<String>>,
	calls: Mutex<Vec<(String, String)>>,
}
impl KeywordEmbedding {
	pub fn fail(&self, provider_id: &str) {
		self.failing.lock().expect("Lock must not be poisoned.").insert(provider_id.to_string());
	}

	pub fn recover(&self) {
		self.failing.lock().expect("Lock must not be poisoned.").clear();
	}

	/// `(provider_id, text)` for every attempt, in order.
	pub fn calls(&self) -> Vec<(String, String)> {
		self.calls.lock().expect("Lock must not be poisoned.").clone()
	}

	pub fn clear_calls(&self) {
		self.calls.lock().expect("Lock must not be poisoned.").clear();
	}
}
impl EmbeddingProvider for KeywordEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, compass_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			for text in texts {
				self.calls
					.lock()
					.expect("Lock must not be poisoned.")
					.push((cfg.provider_id.clone(), text.clone()));
			}

			if self.failing.lock().expect("Lock must not be poisoned.").contains(&cfg.provider_id) {
				return Err(compass_providers::Error::InvalidResponse {
					message: format!("{} is down.", cfg.provider_id),
				});
			}

			Ok(texts.iter().map(|text| keyword_vector(text)).collect())
		})
	}
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
	let text = text.to_lowercase();
	let flag = |needle: &str| if text.contains(needle) { 1.0 } else { 0.0 };

	vec![flag("tech"), flag("financ"), flag("san francisco")]
}

/// Replays scripted replies, then repeats `fallback` forever.
pub struct ScriptedChat {
	replies: Mutex<VecDeque<ChatReply>>,
	fallback: ChatReply,
	seen: Mutex<Vec<Vec<Value>>>,
}
impl ScriptedChat {
	pub fn new(replies: Vec<ChatReply>, fallback: ChatReply) -> Self {
		Self { replies: Mutex::new(replies.into()), fallback, seen: Mutex::new(Vec::new()) }
	}

	/// The message list sent on each model turn.
	pub fn seen(&self) -> Vec<Vec<Value>> {
		self.seen.lock().expect("Lock must not be poisoned.").clone()
	}
}
impl ChatProvider for ScriptedChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		_tools: &'a [Value],
	) -> BoxFuture<'a, compass_providers::Result<ChatReply>> {
		Box::pin(async move {
			self.seen.lock().expect("Lock must not be poisoned.").push(messages.to_vec());

			let next = self.replies.lock().expect("Lock must not be poisoned.").pop_front();

			Ok(next.unwrap_or_else(|| self.fallback.clone()))
		})
	}
}

pub fn text_reply(content: &str) -> ChatReply {
	ChatReply { content: Some(content.to_string()), tool_calls: Vec::new() }
}

pub fn tool_reply(id: &str, name: &str, arguments: &str) -> ChatReply {
	ChatReply {
		content: None,
		tool_calls: vec![ToolCall {
			id: id.to_string(),
			name: name.to_string(),
			arguments: arguments.to_string(),
		}],
	}
}

pub struct Harness {
	pub service: CompassService,
	pub index: Arc<MemoryIndex>,
	pub cache: Arc<MemoryCache>,
	pub embedding: Arc<KeywordEmbedding>,
	pub chat: Arc<ScriptedChat>,
}

pub fn harness() -> Harness {
	harness_with(compass_testkit::test_config(DIM), ScriptedChat::new(Vec::new(), text_reply("")))
}

pub fn harness_with(cfg: Config, chat: ScriptedChat) -> Harness {
	let index = Arc::new(MemoryIndex::new());
	let cache = Arc::new(MemoryCache::new());
	let embedding = Arc::new(KeywordEmbedding::default());
	let chat = Arc::new(chat);
	let providers = Providers::new(embedding.clone(), chat.clone());
	let service = CompassService::with_providers(
		cfg,
		index.clone(),
		index.clone(),
		Some(cache.clone()),
		providers,
	);

	Harness { service, index, cache, embedding, chat }
}

pub fn companies() -> Vec<NewCompany> {
	let mut acme = company_fixture(
		"Acme",
		"AI software for logistics teams.",
		"Technology",
		"San Francisco",
	);

	acme.tags = vec!["ai".to_string(), "saas".to_string()];

	let mut cobalt =
		company_fixture("Cobalt", "Robotics and tech hardware.", "Technology", "Berlin");

	cobalt.tags = vec!["robotics".to_string()];

	vec![
		acme,
		company_fixture("Borealis", "Banking and finance platform.", "Finance", "Toronto"),
		cobalt,
		company_fixture("Dune", "Outdoor retail stores.", "Retail", "San Francisco"),
	]
}

/// Adds the standard fixtures through the service and forgets the embedding calls they made.
pub async fn seed(harness: &Harness) {
	for company in companies() {
		harness.service.add_company(company).await.expect("Seeding must succeed.");
	}

	harness.embedding.clear_calls();
}
