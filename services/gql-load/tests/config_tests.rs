//! Scenario loading, resolution, and a resolved scenario driving a run.

use gql_load::config::{list_scenarios, Overrides, ScenarioFile};
use gql_load::LoadRunner;
use load_common::LoadError;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{scenario_path, scenarios_dir, StubTransport, SAMPLE_SCENARIO_YAML};

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

#[test]
fn test_environment_headers_override_shared() {
    let scenario = ScenarioFile::from_yaml(SAMPLE_SCENARIO_YAML).unwrap();
    assert_eq!(scenario.environment_names(), vec!["local", "staging"]);

    let local = scenario.resolve("local", &Overrides::default()).unwrap();
    assert_eq!(local.spec.headers["X-Env"], "local");
    assert!(local.spec.headers.contains_key("X-Request-Id"));
    assert_eq!(local.spec.auth.header, "Authorization");
    assert_eq!(local.spec.concurrency, 4);
    assert_eq!(local.spec.total_requests, Some(20));
    assert!(local.spec.log_file.is_none());

    let staging = scenario.resolve("staging", &Overrides::default()).unwrap();
    assert_eq!(staging.spec.headers["X-Env"], "shared");
    assert_eq!(staging.spec.auth.header, "X-Api-Key");
    assert_eq!(staging.spec.url, "https://staging.example.com/graphql");
}

#[test]
fn test_overrides_replace_load_section() {
    let scenario = ScenarioFile::from_yaml(SAMPLE_SCENARIO_YAML).unwrap();
    let overrides = Overrides {
        concurrency: Some(9),
        requests: Some(3),
        ..Default::default()
    };
    let spec = scenario.resolve("local", &overrides).unwrap().spec;
    assert_eq!(spec.concurrency, 9);
    assert_eq!(spec.total_requests, Some(3));
}

#[test]
fn test_unknown_environment_is_config_error() {
    let scenario = ScenarioFile::from_yaml(SAMPLE_SCENARIO_YAML).unwrap();
    let err = scenario.resolve("production", &Overrides::default()).unwrap_err();
    assert!(matches!(err, LoadError::Config(_)));
    assert!(err.to_string().contains("production"));
}

#[test]
fn test_malformed_yaml() {
    assert!(matches!(
        ScenarioFile::from_yaml("environments: [unclosed"),
        Err(LoadError::Yaml(_))
    ));
}

#[test]
fn test_shipped_scenario_resolves() {
    let scenario = ScenarioFile::from_file(scenario_path("create_user.yaml")).unwrap();
    assert_eq!(scenario.name, "create-user");

    let spec = scenario.resolve("staging", &Overrides::default()).unwrap().spec;
    assert_eq!(spec.target_rps, Some(50));
    assert_eq!(spec.duration, Some(Duration::from_secs(30)));
    assert_eq!(spec.total_requests, None);
    assert_eq!(spec.request_budget(), 1500);
    assert_eq!(spec.effective_concurrency(), 20);
    assert_eq!(spec.headers["X-Client"], "gql-load");
}

#[test]
fn test_list_scenarios_finds_shipped_files() {
    let scenarios = list_scenarios(scenarios_dir()).unwrap();
    assert!(scenarios
        .iter()
        .any(|(path, s)| path.ends_with("create_user.yaml") && s.name == "create-user"));
}

#[tokio::test(start_paused = true)]
async fn test_resolved_scenario_renders_requests() {
    let scenario = ScenarioFile::from_yaml(SAMPLE_SCENARIO_YAML).unwrap();
    let spec = scenario.resolve("local", &Overrides::default()).unwrap().spec;

    let stub = Arc::new(StubTransport::ok(Duration::from_millis(2)));
    let snapshot = LoadRunner::new(spec, stub.clone()).unwrap().run().await;
    assert_eq!(snapshot.total, 20);
    assert!(stub.max_in_flight() <= 4);

    for request in stub.requests() {
        assert_eq!(request.url, "http://localhost:4000/graphql");
        assert_eq!(header(&request.headers, "X-Env"), Some("local"));

        let auth = header(&request.headers, "Authorization").unwrap();
        let token = auth.strip_prefix("Bearer ").unwrap();
        assert_eq!(token.len(), 16);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        let input = &body["variables"]["input"];
        let age = input["age"].as_i64().unwrap();
        assert!((18..=90).contains(&age));
        let plan = input["plan"].as_str().unwrap();
        assert!(["free", "pro", "team"].contains(&plan));
        assert!(input["email"].as_str().unwrap().contains('@'));
        assert_eq!(input["id"].as_str().unwrap().len(), 36);
    }
}
