mod support;

use compass_service::{ChatRequest, Error, chat::SEARCH_TOOL_NAME};

use support::{DIM, ScriptedChat, harness_with, seed, text_reply, tool_reply};

fn chat_harness(replies: Vec<compass_providers::chat::ChatReply>) -> support::Harness {
	harness_with(
		compass_testkit::test_config(DIM),
		ScriptedChat::new(replies, text_reply("fallback")),
	)
}

#[tokio::test]
async fn tool_results_reach_the_model_and_companies_are_returned() {
	let harness = chat_harness(vec![
		tool_reply("call-1", SEARCH_TOOL_NAME, r#"{"search_query":"tech companies in San Francisco"}"#),
		text_reply("**Acme** leads the list."),
	]);

	seed(&harness).await;

	let response = harness
		.service
		.chat(ChatRequest { query: "Which tech companies are in San Francisco?".to_string() })
		.await
		.expect("Chat must succeed.");

	assert_eq!(response.response, "**Acme** leads the list.");
	assert_eq!(response.iterations, 2);
	assert_eq!(response.companies[0].name, "Acme");

	let turns = harness.chat.seen();
	let second_turn = &turns[1];
	let tool_message = second_turn.last().expect("Tool message must be sent.");

	assert_eq!(turns[0].len(), 2);
	assert_eq!(turns[0][0]["role"], "system");
	assert_eq!(second_turn[2]["role"], "assistant");
	assert_eq!(second_turn[2]["tool_calls"][0]["id"], "call-1");
	assert_eq!(tool_message["role"], "tool");
	assert_eq!(tool_message["tool_call_id"], "call-1");

	let content = tool_message["content"].as_str().expect("Tool content must be text.");

	assert!(content.starts_with("Retrieved the following companies based on your search query:\n"));
	assert!(content.contains("Company: Acme\n"));
	assert!(harness.cache.contains("compass:search:tech companies in san francisco"));
}

#[tokio::test]
async fn empty_search_tells_the_model_nothing_was_found() {
	let harness = chat_harness(vec![
		tool_reply("call-1", SEARCH_TOOL_NAME, r#"{"search_query":"underwater basket weaving"}"#),
		text_reply("Nothing matched."),
	]);
	let response = harness
		.service
		.chat(ChatRequest { query: "basket weavers".to_string() })
		.await
		.expect("Chat must succeed.");
	let turns = harness.chat.seen();

	assert!(response.companies.is_empty());
	assert_eq!(
		turns[1].last().expect("Tool message must be sent.")["content"],
		"No companies found for the given search query."
	);
}

#[tokio::test]
async fn tool_errors_are_reported_to_the_model() {
	let harness = chat_harness(vec![
		tool_reply("call-1", "lookup_weather", r#"{"city":"Paris"}"#),
		tool_reply("call-2", SEARCH_TOOL_NAME, r#"{"query":"missing field"}"#),
		text_reply("Sorry."),
	]);
	let response = harness
		.service
		.chat(ChatRequest { query: "weather?".to_string() })
		.await
		.expect("Tool errors must not fail the chat.");
	let turns = harness.chat.seen();
	let unknown = turns[1].last().expect("Tool message must be sent.")["content"].clone();
	let malformed = turns[2].last().expect("Tool message must be sent.")["content"].clone();

	assert_eq!(response.iterations, 3);
	assert_eq!(unknown, "Error: unknown tool 'lookup_weather'.");
	assert!(
		malformed.as_str().is_some_and(|text| text.starts_with("Error: invalid arguments")),
		"Unexpected tool content: {malformed}."
	);
}

#[tokio::test]
async fn endless_tool_calls_exhaust_the_turn_budget() {
	let mut cfg = compass_testkit::test_config(DIM);

	cfg.chat.max_tool_iterations = 2;

	let looping = tool_reply("call", SEARCH_TOOL_NAME, r#"{"search_query":"tech"}"#);
	let harness = harness_with(cfg, ScriptedChat::new(Vec::new(), looping));
	let err = harness
		.service
		.chat(ChatRequest { query: "tech".to_string() })
		.await
		.expect_err("Expected exhausted tool loop.");

	assert!(matches!(err, Error::ToolLoopExhausted { iterations: 2 }), "Unexpected error: {err}.");
	assert_eq!(harness.chat.seen().len(), 2);
}

#[tokio::test]
async fn blank_chat_queries_are_rejected() {
	let harness = chat_harness(Vec::new());
	let err = harness
		.service
		.chat(ChatRequest { query: "   ".to_string() })
		.await
		.expect_err("Expected invalid request.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert!(harness.chat.seen().is_empty());
}
