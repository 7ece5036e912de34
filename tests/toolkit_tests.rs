mod common;

use agentscope::error::AgentScopeError;
use agentscope::message::{ContentBlock, Msg, Role, ToolUseBlock};
use agentscope::tool::{FnTool, ToolArguments, ToolContext, ToolParameters, ToolResponse, Toolkit};
use pretty_assertions::assert_eq;
use serde_json::json;

fn weather_tool() -> FnTool {
    FnTool::new(
        "get_weather",
        "Current weather for a city",
        ToolParameters::object()
            .string("city", "City name", true)
            .string_enum("unit", "Temperature unit", &["celsius", "fahrenheit"], false)
            .build(),
        |args: ToolArguments, ctx: ToolContext| async move {
            let city = args.get_str("city")?.to_string();
            Ok::<_, AgentScopeError>(ToolResponse::text(format!(
                "{city}: sunny ({})",
                ctx.call_id
            )))
        },
    )
}

fn failing_tool() -> FnTool {
    FnTool::new(
        "flaky",
        "Always fails",
        ToolParameters::empty(),
        |_args: ToolArguments, _ctx: ToolContext| async move {
            Err::<ToolResponse, _>(AgentScopeError::ToolExecution {
                tool_name: "flaky".into(),
                message: "offline".into(),
            })
        },
    )
}

fn result_text(block: &agentscope::message::ToolResultBlock) -> String {
    match block.output.as_slice() {
        [ContentBlock::Text { text }] => text.clone(),
        other => panic!("unexpected output {other:?}"),
    }
}

#[tokio::test]
async fn executes_registered_tool() {
    let mut toolkit = Toolkit::new();
    toolkit.register(weather_tool()).unwrap();

    let result = toolkit
        .call_tool(&ToolUseBlock::new("call_7", "get_weather", json!({"city": "Oslo"})))
        .await;

    assert_eq!(result.id, "call_7");
    assert_eq!(result.name, "get_weather");
    assert_eq!(result_text(&result), "Oslo: sunny (call_7)");
}

#[tokio::test]
async fn string_arguments_are_parsed() {
    let mut toolkit = Toolkit::new();
    toolkit.register(weather_tool()).unwrap();

    let result = toolkit
        .call_tool(&ToolUseBlock::new("c", "get_weather", json!("{\"city\":\"Rome\"}")))
        .await;

    assert_eq!(result_text(&result), "Rome: sunny (c)");
}

#[tokio::test]
async fn failures_become_error_results() {
    let mut toolkit = Toolkit::new();
    toolkit.register(weather_tool()).unwrap();
    toolkit.register(failing_tool()).unwrap();

    let missing = toolkit
        .call_tool(&ToolUseBlock::new("1", "teleport", json!({})))
        .await;
    assert_eq!(
        result_text(&missing),
        "FunctionNotFoundError: Cannot find the function named teleport."
    );

    let invalid = toolkit
        .call_tool(&ToolUseBlock::new("2", "get_weather", json!({"unit": "kelvin", "city": "X"})))
        .await;
    assert!(result_text(&invalid).starts_with("InvalidArgumentsError: field 'unit' must be one of"));

    let no_city = toolkit
        .call_tool(&ToolUseBlock::new("3", "get_weather", json!({})))
        .await;
    assert_eq!(
        result_text(&no_city),
        "InvalidArgumentsError: missing required field 'city'"
    );

    let failed = toolkit.call_tool(&ToolUseBlock::new("4", "flaky", json!({}))).await;
    assert_eq!(
        result_text(&failed),
        "Error: Tool execution error: flaky: offline"
    );
}

#[tokio::test]
async fn inactive_groups_hide_and_block_tools() {
    let mut toolkit = Toolkit::new();
    toolkit
        .create_tool_group("outdoor", "Tools for planning trips.", false)
        .unwrap();
    toolkit.register_in_group(weather_tool(), "outdoor").unwrap();
    toolkit.register(failing_tool()).unwrap();

    let names: Vec<String> = toolkit.json_schemas().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["flaky"]);
    assert_eq!(toolkit.activated_notes(), None);

    let blocked = toolkit
        .call_tool(&ToolUseBlock::new("1", "get_weather", json!({"city": "Oslo"})))
        .await;
    assert_eq!(
        result_text(&blocked),
        "FunctionInactiveError: The function 'get_weather' belongs to the inactive tool group 'outdoor'."
    );

    toolkit.update_tool_groups(&["outdoor", "basic", "unknown"], true);
    let names: Vec<String> = toolkit.json_schemas().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["get_weather", "flaky"]);
    assert_eq!(
        toolkit.activated_notes().as_deref(),
        Some("# Activated tool groups\n## outdoor\nTools for planning trips.")
    );

    toolkit.remove_tool_groups(&["outdoor"]);
    assert!(toolkit.get("get_weather").is_none());
    assert_eq!(toolkit.len(), 1);
}

#[test]
fn registration_errors() {
    let mut toolkit = Toolkit::new();
    toolkit.register(weather_tool()).unwrap();

    assert!(matches!(
        toolkit.register(weather_tool()),
        Err(AgentScopeError::Configuration(_))
    ));
    assert!(matches!(
        toolkit.register_in_group(failing_tool(), "nope"),
        Err(AgentScopeError::Configuration(_))
    ));
    assert!(toolkit.create_tool_group("basic", "", true).is_err());
    assert!(toolkit.remove("get_weather"));
    assert!(!toolkit.remove("get_weather"));
    assert!(toolkit.is_empty());
}

#[test]
fn schema_is_exported_as_function_tool() {
    let mut toolkit = Toolkit::new();
    toolkit.register(weather_tool()).unwrap();

    let tool = toolkit.json_schemas()[0].to_function_tool();

    assert_eq!(tool["type"], "function");
    assert_eq!(tool["function"]["name"], "get_weather");
    assert_eq!(tool["function"]["parameters"]["required"], json!(["city"]));
    assert_eq!(
        tool["function"]["parameters"]["properties"]["unit"]["enum"],
        json!(["celsius", "fahrenheit"])
    );
}

#[cfg(feature = "openai")]
#[tokio::test]
async fn tool_result_round_trips_into_a_prompt() {
    use agentscope::formatter::{Formatter, OpenAiChatFormatter};

    let mut toolkit = Toolkit::new();
    toolkit.register(weather_tool()).unwrap();

    let call = common::tool_call_msg("call_1", "get_weather", json!({"city": "Lima"}));
    let result = toolkit.call_tool(call.tool_uses()[0]).await;
    let transcript = vec![
        Msg::user("user", "weather in Lima?"),
        call,
        Msg::new("system", Role::Tool, vec![ContentBlock::ToolResult(result)]),
    ];

    let prompt = serde_json::to_value(OpenAiChatFormatter::new().format(&transcript).unwrap()).unwrap();

    assert_eq!(
        prompt[2],
        json!({
            "role": "tool",
            "name": "get_weather",
            "content": "Lima: sunny (call_1)",
            "tool_call_id": "call_1"
        })
    );
}
