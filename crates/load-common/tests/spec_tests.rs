//! Tests for LoadTestSpec validation and derived run parameters.

use load_common::{LoadError, LoadTestSpec, DEFAULT_CONCURRENCY};
use std::time::Duration;

fn spec() -> LoadTestSpec {
    LoadTestSpec::new("http://localhost:4000/graphql", "mutation { ping }")
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_count_bound_is_valid() {
    let s = LoadTestSpec {
        total_requests: Some(10),
        ..spec()
    };
    assert!(s.validate().is_ok());
}

#[test]
fn test_rate_and_duration_bound_is_valid() {
    let s = LoadTestSpec {
        target_rps: Some(50),
        duration: Some(Duration::from_secs(2)),
        ..spec()
    };
    assert!(s.validate().is_ok());
}

#[test]
fn test_missing_bound_is_rejected() {
    let s = LoadTestSpec {
        target_rps: Some(50),
        ..spec()
    };
    assert!(matches!(s.validate(), Err(LoadError::InvalidSpec(_))));
    assert!(matches!(spec().validate(), Err(LoadError::InvalidSpec(_))));
}

#[test]
fn test_zero_values_are_rejected() {
    for s in [
        LoadTestSpec {
            total_requests: Some(0),
            ..spec()
        },
        LoadTestSpec {
            total_requests: Some(1),
            target_rps: Some(0),
            ..spec()
        },
        LoadTestSpec {
            total_requests: Some(1),
            duration: Some(Duration::ZERO),
            ..spec()
        },
    ] {
        assert!(s.validate().is_err(), "{s:?} should be invalid");
    }
}

#[test]
fn test_empty_url_or_query_rejected() {
    let mut s = LoadTestSpec {
        total_requests: Some(1),
        ..spec()
    };
    s.url = "  ".into();
    assert!(s.validate().is_err());

    let mut s = LoadTestSpec {
        total_requests: Some(1),
        ..spec()
    };
    s.query.clear();
    assert!(s.validate().is_err());
}

// ============================================================================
// Derived parameters
// ============================================================================

#[test]
fn test_request_budget() {
    let counted = LoadTestSpec {
        total_requests: Some(25),
        target_rps: Some(100),
        duration: Some(Duration::from_secs(10)),
        ..spec()
    };
    assert_eq!(counted.request_budget(), 25);

    let timed = LoadTestSpec {
        target_rps: Some(40),
        duration: Some(Duration::from_millis(2500)),
        ..spec()
    };
    assert_eq!(timed.request_budget(), 100);
}

#[test]
fn test_explicit_concurrency_wins() {
    let s = LoadTestSpec {
        concurrency: 7,
        target_rps: Some(1000),
        ..spec()
    };
    assert_eq!(s.effective_concurrency(), 7);
}

#[test]
fn test_concurrency_derived_from_rate() {
    let s = LoadTestSpec {
        target_rps: Some(100),
        ..spec()
    };
    assert_eq!(s.effective_concurrency(), 30);

    let slow = LoadTestSpec {
        target_rps: Some(1),
        ..spec()
    };
    assert_eq!(slow.effective_concurrency(), 1);
}

#[test]
fn test_concurrency_default_without_rate() {
    assert_eq!(spec().effective_concurrency(), DEFAULT_CONCURRENCY);
}
