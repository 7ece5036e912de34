#![cfg(feature = "ollama")]

mod common;

use agentscope::formatter::{
    Formatter, OllamaChatFormatter, OllamaMultiAgentFormatter, DEFAULT_HISTORY_PROMPT,
};
use agentscope::message::{ContentBlock, Msg, Role, Source};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{tool_call_msg, tool_result_msg, weather_conversation, SYSTEM_PROMPT};

fn to_json<F: Formatter>(formatter: &F, msgs: &[Msg]) -> Value {
    serde_json::to_value(formatter.format(msgs).unwrap()).unwrap()
}

fn tool_entries() -> Vec<Value> {
    vec![
        json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{"function": {"name": "get_weather", "arguments": {"city": "Paris"}}}]
        }),
        json!({"role": "tool", "content": "Sunny, 25C", "tool_name": "get_weather"}),
    ]
}

#[test]
fn chat_formatter_ground_truth() {
    let mut expected = vec![
        json!({"role": "system", "content": SYSTEM_PROMPT}),
        json!({"role": "user", "content": "What is the capital of France?"}),
        json!({"role": "assistant", "content": "The capital of France is Paris."}),
        json!({"role": "user", "content": "What is the weather there?"}),
    ];
    expected.extend(tool_entries());
    expected.push(json!({"role": "assistant", "content": "It is sunny and 25C in Paris."}));

    assert_eq!(
        to_json(&OllamaChatFormatter::new(), &weather_conversation()),
        Value::Array(expected)
    );
}

#[test]
fn multi_agent_formatter_ground_truth() {
    let mut expected = vec![
        json!({"role": "system", "content": SYSTEM_PROMPT}),
        json!({"role": "user", "content": format!(
            "{DEFAULT_HISTORY_PROMPT}<history>\n\
             user: What is the capital of France?\n\
             assistant: The capital of France is Paris.\n\
             user: What is the weather there?\n\
             </history>"
        )}),
    ];
    expected.extend(tool_entries());
    expected.push(json!({"role": "user", "content":
        "<history>\nassistant: It is sunny and 25C in Paris.\n</history>"}));

    assert_eq!(
        to_json(&OllamaMultiAgentFormatter::new(), &weather_conversation()),
        Value::Array(expected)
    );
}

#[test]
fn inline_images_are_collected() {
    let msgs = vec![
        Msg::user("alice", "see this"),
        Msg::new(
            "alice",
            Role::User,
            vec![ContentBlock::image(Source::base64("image/png", "iVBORw0K"))],
        ),
        Msg::assistant("bob", "nice"),
    ];

    assert_eq!(
        to_json(&OllamaMultiAgentFormatter::new().with_history_prompt(""), &msgs),
        json!([{
            "role": "user",
            "content": "<history>\nalice: see this\nbob: nice\n</history>",
            "images": ["iVBORw0K"]
        }])
    );
}

#[test]
fn remote_images_are_skipped() {
    let msg = Msg::new(
        "user",
        Role::User,
        vec![
            ContentBlock::text("what is this"),
            ContentBlock::image(Source::url("https://example.com/cat.png")),
        ],
    );

    assert_eq!(
        to_json(&OllamaChatFormatter::new(), &[msg]),
        json!([{"role": "user", "content": "what is this"}])
    );
}

fn weather_lookup(speaker_msg: Msg) -> Vec<Msg> {
    vec![
        speaker_msg,
        tool_call_msg("call_1", "get_weather", json!({"city": "Paris"})),
        tool_result_msg("call_1", "get_weather", "Sunny, 25C"),
        Msg::user("alice", "hi"),
    ]
}

#[test]
fn prompt_moves_past_a_history_group_that_renders_empty() {
    let remote_only = Msg::new(
        "bob",
        Role::User,
        vec![ContentBlock::image(Source::url("https://example.com/cat.png"))],
    );

    let value = to_json(&OllamaMultiAgentFormatter::new(), &weather_lookup(remote_only));

    let entries = value.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(
        entries[2]["content"],
        format!("{DEFAULT_HISTORY_PROMPT}<history>\nalice: hi\n</history>")
    );
}

#[test]
fn leading_image_adds_no_blank_line() {
    let msgs = vec![
        Msg::new(
            "alice",
            Role::User,
            vec![ContentBlock::image(Source::base64("image/png", "iVBORw0K"))],
        ),
        Msg::user("alice", "hi"),
    ];

    assert_eq!(
        to_json(&OllamaMultiAgentFormatter::new().with_history_prompt("P\n"), &msgs),
        json!([{
            "role": "user",
            "content": "P\n<history>\nalice: hi\n</history>",
            "images": ["iVBORw0K"]
        }])
    );
}

#[test]
fn system_turn_keeps_text_only() {
    let system = Msg::new(
        "system",
        Role::System,
        vec![
            ContentBlock::image(Source::base64("image/png", "iVBORw0K")),
            ContentBlock::text("be brief"),
        ],
    );
    let formatter = OllamaMultiAgentFormatter::new().with_history_prompt("");

    let value = to_json(&formatter, &[system, Msg::user("alice", "hi")]);
    assert_eq!(value[0], json!({"role": "system", "content": "be brief"}));

    let value = to_json(&formatter, &[Msg::system(""), Msg::user("alice", "hi")]);
    assert_eq!(
        value,
        json!([{"role": "user", "content": "<history>\nalice: hi\n</history>"}])
    );
}
