use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AuthScheme, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
	pub id: String,
	pub name: String,
	/// Raw JSON arguments as produced by the model. May be malformed.
	pub arguments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
	pub content: Option<String>,
	pub tool_calls: Vec<ToolCall>,
}

/// Sends one chat-completions turn with the given tool definitions.
pub async fn complete(
	cfg: &compass_config::LlmProviderConfig,
	messages: &[Value],
	tools: &[Value],
) -> Result<ChatReply> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});

	if let Some(max_tokens) = cfg.max_tokens {
		body["max_tokens"] = Value::from(max_tokens);
	}
	if !tools.is_empty() {
		body["tools"] = Value::from(tools.to_vec());
		body["tool_choice"] = Value::from("auto");
	}

	let res = client
		.post(url)
		.headers(crate::auth_headers(AuthScheme::Bearer, &cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_chat_response(&json)
}

/// Renders a reply back into the assistant message the API expects in the next turn.
pub fn assistant_message(reply: &ChatReply) -> Value {
	let mut message = serde_json::json!({
		"role": "assistant",
		"content": reply.content,
	});

	if !reply.tool_calls.is_empty() {
		let calls = reply
			.tool_calls
			.iter()
			.map(|call| {
				serde_json::json!({
					"id": call.id,
					"type": "function",
					"function": { "name": call.name, "arguments": call.arguments },
				})
			})
			.collect::<Vec<_>>();

		message["tool_calls"] = Value::from(calls);
	}

	message
}

fn parse_chat_response(json: &Value) -> Result<ChatReply> {
	let message = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing choices[0].message.".to_string(),
		})?;
	let content = message.get("content").and_then(|c| c.as_str()).map(str::to_string);
	let mut tool_calls = Vec::new();

	for raw in message.get("tool_calls").and_then(|v| v.as_array()).into_iter().flatten() {
		let function = raw.get("function").ok_or_else(|| Error::InvalidResponse {
			message: "Tool call is missing function.".to_string(),
		})?;
		let name = function.get("name").and_then(|v| v.as_str()).ok_or_else(|| {
			Error::InvalidResponse { message: "Tool call is missing function.name.".to_string() }
		})?;
		let arguments = match function.get("arguments") {
			Some(Value::String(raw)) => raw.clone(),
			Some(other) => serde_json::to_string(other)?,
			None => "{}".to_string(),
		};
		let id = raw.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();

		tool_calls.push(ToolCall { id, name: name.to_string(), arguments });
	}

	Ok(ChatReply { content, tool_calls })
}
