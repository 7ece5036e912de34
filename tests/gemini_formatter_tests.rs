#![cfg(feature = "gemini")]

mod common;

use agentscope::formatter::gemini::{GeminiMessageConverter, GeminiPart};
use agentscope::formatter::{
    Formatter, GeminiChatFormatter, GeminiMultiAgentFormatter, DEFAULT_HISTORY_PROMPT,
};
use agentscope::message::{ContentBlock, Msg, Role, Source, ThinkingBlock, ToolUseBlock};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{tool_call_msg, tool_result_msg, weather_conversation, SYSTEM_PROMPT};

fn to_json<F: Formatter>(formatter: &F, msgs: &[Msg]) -> Value {
    serde_json::to_value(formatter.format(msgs).unwrap()).unwrap()
}

fn tool_contents() -> Vec<Value> {
    vec![
        json!({"role": "model", "parts": [{"functionCall": {
            "id": "call_1", "name": "get_weather", "args": {"city": "Paris"}
        }}]}),
        json!({"role": "user", "parts": [{"functionResponse": {
            "id": "call_1", "name": "get_weather", "response": {"output": "Sunny, 25C"}
        }}]}),
    ]
}

#[test]
fn chat_formatter_ground_truth() {
    let mut contents = vec![
        json!({"role": "user", "parts": [{"text": "What is the capital of France?"}]}),
        json!({"role": "model", "parts": [{"text": "The capital of France is Paris."}]}),
        json!({"role": "user", "parts": [{"text": "What is the weather there?"}]}),
    ];
    contents.extend(tool_contents());
    contents.push(json!({"role": "model", "parts": [{"text": "It is sunny and 25C in Paris."}]}));

    assert_eq!(
        to_json(&GeminiChatFormatter::new(), &weather_conversation()),
        json!({
            "systemInstruction": {"parts": [{"text": SYSTEM_PROMPT}]},
            "contents": contents,
        })
    );
}

#[test]
fn multi_agent_formatter_ground_truth() {
    let mut contents = vec![json!({"role": "user", "parts": [{"text": format!(
        "{DEFAULT_HISTORY_PROMPT}<history>\n\
         user: What is the capital of France?\n\
         assistant: The capital of France is Paris.\n\
         user: What is the weather there?\n\
         </history>"
    )}]})];
    contents.extend(tool_contents());
    contents.push(json!({"role": "user", "parts": [{"text":
        "<history>\nassistant: It is sunny and 25C in Paris.\n</history>"}]}));

    assert_eq!(
        to_json(&GeminiMultiAgentFormatter::new(), &weather_conversation()),
        json!({
            "systemInstruction": {"parts": [{"text": SYSTEM_PROMPT}]},
            "contents": contents,
        })
    );
}

#[test]
fn no_system_message_omits_instruction() {
    let value = to_json(&GeminiChatFormatter::new(), &[Msg::user("user", "hi")]);
    assert_eq!(
        value,
        json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]})
    );
}

#[test]
fn web_url_becomes_file_data() {
    let msg = Msg::new(
        "user",
        Role::User,
        vec![
            ContentBlock::text("describe"),
            ContentBlock::image(Source::url("https://example.com/cat.jpg")),
        ],
    );

    assert_eq!(
        to_json(&GeminiChatFormatter::new(), &[msg])["contents"][0]["parts"],
        json!([
            {"text": "describe"},
            {"fileData": {"mimeType": "image/jpeg", "fileUri": "https://example.com/cat.jpg"}}
        ])
    );
}

#[test]
fn base64_becomes_inline_data() {
    let msg = Msg::new(
        "user",
        Role::User,
        vec![ContentBlock::audio(Source::base64("audio/mp3", "SUQz"))],
    );

    assert_eq!(
        to_json(&GeminiChatFormatter::new(), &[msg])["contents"][0]["parts"],
        json!([{"inlineData": {"mimeType": "audio/mp3", "data": "SUQz"}}])
    );
}

#[test]
fn unanswered_call_gets_synthetic_response() {
    let msgs = vec![
        Msg::user("user", "weather?"),
        tool_call_msg("call_9", "get_weather", json!({"city": "Oslo"})),
        Msg::user("user", "never mind"),
    ];

    let value = to_json(&GeminiChatFormatter::new(), &msgs);
    let contents = value["contents"].as_array().unwrap();

    assert_eq!(contents.len(), 4);
    let response = &contents[2]["parts"][0]["functionResponse"];
    assert_eq!(response["id"], "call_9");
    assert_eq!(response["name"], "get_weather");
    assert!(response["response"]["output"]
        .as_str()
        .unwrap()
        .starts_with("Error: missing tool result"));
    assert_eq!(contents[3]["parts"][0]["text"], "never mind");
}

#[test]
fn thought_signature_moves_onto_the_next_part() {
    let msg = Msg::new(
        "assistant",
        Role::Assistant,
        vec![
            ContentBlock::Thinking(ThinkingBlock {
                thinking: "hidden".to_string(),
                signature: Some("sig-1".to_string()),
            }),
            ContentBlock::ToolUse(
                ToolUseBlock::new("call_1", "get_weather", json!({})),
            ),
        ],
    );
    let msgs = vec![
        msg,
        tool_result_msg("call_1", "get_weather", "ok"),
    ];

    let value = to_json(&GeminiChatFormatter::new(), &msgs);

    assert_eq!(
        value["contents"][0],
        json!({"role": "model", "parts": [{
            "thoughtSignature": "sig-1",
            "functionCall": {"id": "call_1", "name": "get_weather", "args": {}}
        }]})
    );
}

#[test]
fn signature_on_plain_text_is_kept_in_an_empty_thinking_block() {
    let parts: Vec<GeminiPart> = serde_json::from_value(json!([
        {"text": "Sunny in Paris.", "thoughtSignature": "sig-7"}
    ]))
    .unwrap();

    let blocks = GeminiMessageConverter.parts_to_blocks(&parts);

    assert_eq!(
        blocks,
        vec![
            ContentBlock::Thinking(ThinkingBlock {
                thinking: String::new(),
                signature: Some("sig-7".to_string()),
            }),
            ContentBlock::text("Sunny in Paris."),
        ]
    );
}

#[test]
fn text_signature_survives_the_round_trip() {
    let parts: Vec<GeminiPart> = serde_json::from_value(json!([
        {"text": "Sunny in Paris.", "thoughtSignature": "sig-7"}
    ]))
    .unwrap();
    let reply = Msg::new(
        "assistant",
        Role::Assistant,
        GeminiMessageConverter.parts_to_blocks(&parts),
    );

    let value = to_json(
        &GeminiChatFormatter::new(),
        &[Msg::user("user", "Weather?"), reply],
    );

    assert_eq!(
        value["contents"][1],
        json!({"role": "model", "parts": [
            {"text": "Sunny in Paris.", "thoughtSignature": "sig-7"}
        ]})
    );
}

#[test]
fn prompt_moves_past_a_history_group_that_renders_empty() {
    let thinking_only = Msg::new(
        "bob",
        Role::Assistant,
        vec![ContentBlock::thinking("Paris, probably")],
    );
    let msgs = vec![
        thinking_only,
        tool_call_msg("call_1", "get_weather", json!({"city": "Paris"})),
        tool_result_msg("call_1", "get_weather", "Sunny, 25C"),
        Msg::user("alice", "hi"),
    ];

    let value = to_json(&GeminiMultiAgentFormatter::new(), &msgs);

    let contents = value["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(
        contents[2],
        json!({"role": "user", "parts": [{
            "text": format!("{DEFAULT_HISTORY_PROMPT}<history>\nalice: hi\n</history>")
        }]})
    );
}

#[test]
fn system_instruction_keeps_text_only() {
    let system = Msg::new(
        "system",
        Role::System,
        vec![
            ContentBlock::text("be brief"),
            ContentBlock::image(Source::url("https://example.com/logo.png")),
        ],
    );
    let formatter = GeminiMultiAgentFormatter::new().with_history_prompt("");

    let value = to_json(&formatter, &[system, Msg::user("alice", "hi")]);
    assert_eq!(
        value["systemInstruction"],
        json!({"parts": [{"text": "be brief"}]})
    );

    let value = to_json(&formatter, &[Msg::system(""), Msg::user("alice", "hi")]);
    assert_eq!(
        value,
        json!({"contents": [{"role": "user", "parts": [
            {"text": "<history>\nalice: hi\n</history>"}
        ]}]})
    );
}
