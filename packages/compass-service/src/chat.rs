//! Tool-calling chat over company search.
//!
//! The model loop runs as a small state machine: the model is asked for a turn, any tool calls it
//! makes are answered, and the model is asked again until it replies without tools or the turn
//! budget runs out.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use compass_providers::chat::{self, ToolCall};
use compass_storage::models::Company;

use crate::{CompassService, Error, Result, SearchRequest};

pub const SEARCH_TOOL_NAME: &str = "search_companies";
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a company search assistant.
You provide an overview of the companies found based on the search query.
You just tell about the companies names, ranks them in order of relevance to the search query.
You must use tool `search_companies` to search for companies based on the search query.

- Always output well formatted markdown text.
- Use the `search_companies` tool to search for companies based on the search query.
- Keep your answers concise and to the point.
- Your answer must always show a two liner summary of all the companies found.
";

const NO_RESULTS: &str = "No companies found for the given search query.";
const RESULTS_HEADER: &str = "Retrieved the following companies based on your search query:\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
	pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
	pub response: String,
	/// Companies from the last successful tool call.
	pub companies: Vec<Company>,
	/// Model turns taken.
	pub iterations: u32,
}

enum ChatState {
	AwaitingModel,
	ExecuteTools(Vec<ToolCall>),
	Done(String),
}

#[derive(Debug, Deserialize)]
struct SearchToolArgs {
	search_query: String,
}

impl CompassService {
	pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let max_iterations = self.cfg.chat.max_tool_iterations;
		let system_prompt =
			self.cfg.chat.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT);
		let tools = [search_tool_definition()];
		let mut messages = vec![
			json!({ "role": "system", "content": system_prompt }),
			json!({ "role": "user", "content": query }),
		];
		let mut companies = Vec::new();
		let mut iterations = 0_u32;
		let mut state = ChatState::AwaitingModel;

		loop {
			state = match state {
				ChatState::AwaitingModel => {
					if iterations >= max_iterations {
						tracing::warn!(iterations, "Chat tool loop exhausted.");

						return Err(Error::ToolLoopExhausted { iterations });
					}

					iterations += 1;

					let reply = self
						.providers
						.chat
						.complete(&self.cfg.providers.llm, &messages, &tools)
						.await?;

					messages.push(chat::assistant_message(&reply));

					if reply.tool_calls.is_empty() {
						ChatState::Done(reply.content.unwrap_or_default())
					} else {
						ChatState::ExecuteTools(reply.tool_calls)
					}
				},
				ChatState::ExecuteTools(calls) => {
					for call in calls {
						let content = self.run_tool(&call, &mut companies).await;

						messages.push(json!({
							"role": "tool",
							"tool_call_id": call.id,
							"name": call.name,
							"content": content,
						}));
					}

					ChatState::AwaitingModel
				},
				ChatState::Done(response) => {
					tracing::info!(iterations, companies = companies.len(), "Chat completed.");

					return Ok(ChatResponse { response, companies, iterations });
				},
			};
		}
	}

	/// Runs one tool call and renders its outcome for the model. Failures become the tool message.
	async fn run_tool(&self, call: &ToolCall, companies: &mut Vec<Company>) -> String {
		tracing::info!(tool = %call.name, arguments = %call.arguments, "Calling tool.");

		if call.name != SEARCH_TOOL_NAME {
			return format!("Error: unknown tool '{}'.", call.name);
		}

		let args = match serde_json::from_str::<SearchToolArgs>(&call.arguments) {
			Ok(args) => args,
			Err(err) => return format!("Error: invalid arguments for {SEARCH_TOOL_NAME}: {err}."),
		};

		match self.search(SearchRequest::new(args.search_query)).await {
			Ok(response) => {
				*companies = response.items.into_iter().map(|item| item.company).collect();

				render_search_result(companies)
			},
			Err(err) => {
				tracing::warn!(error = %err, "Search tool failed.");

				format!("Error: {err}")
			},
		}
	}
}

pub fn search_tool_definition() -> Value {
	json!({
		"type": "function",
		"function": {
			"name": SEARCH_TOOL_NAME,
			"description": "This function is used to search companies based on the search_query.",
			"parameters": {
				"type": "object",
				"properties": {
					"search_query": {
						"type": "string",
						"description": concat!(
							"The search query to search the companies.\n",
							"eg: 'tech companies in San Francisco' or ",
							"'large manufacturing companies'",
						),
					},
				},
				"required": ["search_query"],
			},
		},
	})
}

fn render_search_result(companies: &[Company]) -> String {
	if companies.is_empty() {
		return NO_RESULTS.to_string();
	}

	let lines = companies.iter().map(|company| company.content.as_str()).collect::<Vec<_>>();

	format!("{RESULTS_HEADER}{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tool_definition_requires_the_query() {
		let tool = search_tool_definition();

		assert_eq!(tool["function"]["name"], SEARCH_TOOL_NAME);
		assert_eq!(tool["function"]["parameters"]["required"], json!(["search_query"]));
	}

	#[test]
	fn empty_results_use_the_fixed_message() {
		assert_eq!(render_search_result(&[]), NO_RESULTS);
	}
}
