use ts_domain::config::{Config, ConfigSeverity};

#[test]
fn default_config_has_no_errors() {
    let config = Config::default();
    let issues = config.validate();
    assert!(issues
        .iter()
        .all(|i| i.severity == ConfigSeverity::Warning));
}

#[test]
fn default_agent_limits() {
    let config = Config::default();
    assert_eq!(config.agent.recursion_limit, 50);
    assert_eq!(config.agent.bridge_workers, 2);
    assert_eq!(config.agent.default_reasoning_tier, 1);
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[server]
host = "127.0.0.1"
port = 9090

[llm]
model = "claude-sonnet-4-20250514"
max_tokens = 32000

[agent]
recursion_limit = 10
bridge_workers = 4

[artifacts.source]
kind = "http"
base_url = "http://localhost:9000/diagrams"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.llm.max_tokens, 32_000);
    assert_eq!(config.agent.recursion_limit, 10);
    assert_eq!(config.agent.bridge_workers, 4);
    assert!(config.validate().iter().all(|i| i.severity != ConfigSeverity::Error));
}

#[test]
fn zero_workers_is_an_error() {
    let toml_str = r#"
[agent]
bridge_workers = 0
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error && i.field == "agent.bridge_workers"));
}

#[test]
fn empty_http_base_url_is_an_error() {
    let toml_str = r#"
[artifacts.source]
kind = "http"
base_url = ""
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert!(config
        .validate()
        .iter()
        .any(|i| i.field == "artifacts.source.base_url"));
}
