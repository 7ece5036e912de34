//! Tests for the error system.

use agentscope::error::*;

#[test]
fn error_api_creation() {
    let err = AgentScopeError::api(404, "Not found");
    assert!(matches!(&err, AgentScopeError::Api { status: 404, .. }));
    assert_eq!(err.to_string(), "API error (status 404): Not found");
}

#[test]
fn error_format_creation() {
    let err = AgentScopeError::format("unsupported audio type 'audio/ogg'");
    assert_eq!(
        err.to_string(),
        "Format error: unsupported audio type 'audio/ogg'"
    );
    assert_eq!(err.category(), ErrorCategory::Format);
    assert!(!err.is_retryable());
}

#[test]
fn error_helper_mappings_are_stable_for_major_variants() {
    let network_error = reqwest::Client::new()
        .get("http://[::1")
        .build()
        .unwrap_err();
    let io_error = std::io::Error::new(std::io::ErrorKind::Other, "disk");
    let serde_error = serde_json::from_str::<serde_json::Value>("{not-json}").unwrap_err();

    let cases = vec![
        (AgentScopeError::Authentication("bad-key".into()), ErrorCategory::Authentication, false),
        (
            AgentScopeError::RateLimited { retry_after_ms: Some(1000) },
            ErrorCategory::RateLimit,
            true,
        ),
        (AgentScopeError::Timeout(5000), ErrorCategory::Timeout, true),
        (AgentScopeError::Configuration("bad".into()), ErrorCategory::Configuration, false),
        (AgentScopeError::Network(network_error), ErrorCategory::Network, true),
        (AgentScopeError::Serialization(serde_error), ErrorCategory::Serialization, false),
        (
            AgentScopeError::ToolExecution {
                tool_name: "tool-a".into(),
                message: "failed".into(),
            },
            ErrorCategory::ToolExecution,
            false,
        ),
        (AgentScopeError::api(401, "Unauthorized"), ErrorCategory::Authentication, false),
        (AgentScopeError::api(429, "Rate limited"), ErrorCategory::RateLimit, true),
        (AgentScopeError::api(503, "Unavailable"), ErrorCategory::Server, true),
        (AgentScopeError::api(418, "Teapot"), ErrorCategory::Api, false),
        (AgentScopeError::Io(io_error), ErrorCategory::Unknown, false),
        (AgentScopeError::InvalidArgument("bad-arg".into()), ErrorCategory::Unknown, false),
        (
            AgentScopeError::Provider {
                provider: "dashscope".into(),
                message: "InvalidParameter".into(),
            },
            ErrorCategory::Unknown,
            false,
        ),
        (AgentScopeError::Stream("cut".into()), ErrorCategory::Unknown, false),
        (AgentScopeError::Agent("refused".into()), ErrorCategory::Unknown, false),
    ];

    for (error, category, retryable) in cases {
        assert_eq!(error.category(), category, "{error}");
        assert_eq!(error.is_retryable(), retryable, "{error}");
    }
}

#[test]
fn toml_errors_become_configuration_errors() {
    let toml_error = toml::from_str::<toml::Value>("= broken").unwrap_err();
    let err: AgentScopeError = toml_error.into();
    assert!(matches!(err, AgentScopeError::Configuration(message) if message.starts_with("invalid config file")));
}
