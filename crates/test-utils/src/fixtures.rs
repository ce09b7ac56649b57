//! Common load test spec fixtures.

use load_common::LoadTestSpec;
use std::time::Duration;

/// Endpoint used by every fixture; stub transports never dial it.
pub const STUB_URL: &str = "http://stub.invalid/graphql";

/// Mutation used by every fixture.
pub const STUB_QUERY: &str = "mutation Ping($input: PingInput!) { ping(input: $input) { id } }";

/// A run bounded by request count.
pub fn count_spec(total_requests: u64, concurrency: u32) -> LoadTestSpec {
    LoadTestSpec {
        name: "fixture-count".to_string(),
        concurrency,
        total_requests: Some(total_requests),
        ..base_spec()
    }
}

/// A run bounded by target rate and duration.
pub fn rate_spec(target_rps: u32, duration: Duration, concurrency: u32) -> LoadTestSpec {
    LoadTestSpec {
        name: "fixture-rate".to_string(),
        concurrency,
        target_rps: Some(target_rps),
        duration: Some(duration),
        ..base_spec()
    }
}

fn base_spec() -> LoadTestSpec {
    let mut spec = LoadTestSpec::new(STUB_URL, STUB_QUERY);
    spec.auth.value = "Bearer test-token".to_string();
    spec
}

/// Scenario YAML with one environment, used by config loader tests.
pub const SAMPLE_SCENARIO_YAML: &str = r#"
name: create-user
description: Create users with randomized input
environments:
  local:
    url: http://localhost:4000/graphql
    headers:
      X-Env: local
    auth:
      value: "Bearer {{random.string(16)}}"
  staging:
    url: https://staging.example.com/graphql
    auth:
      header: X-Api-Key
      value: static-key
query: |
  mutation CreateUser($input: CreateUserInput!) {
    createUser(input: $input) { id }
  }
variables:
  input:
    id: "{{random.uuid}}"
    name: "{{random.name}}"
    email: "{{random.email}}"
    age: "{{random.int(18,90)}}"
    plan: "{{random.choice(free, pro, team)}}"
headers:
  X-Env: shared
  X-Request-Id: "{{random.uuid}}"
load:
  concurrency: 4
  requests: 20
logging:
  enabled: false
"#;
