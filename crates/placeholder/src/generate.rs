//! Random value generators backing each placeholder kind.

use chrono::{Duration, SecondsFormat, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const EMAIL_NAMES: &[&str] = &[
    "john", "jane", "bob", "alice", "charlie", "diana", "eve", "frank",
];
const EMAIL_DOMAINS: &[&str] = &["example.com", "test.com", "demo.org", "sample.net"];

const FIRST_NAMES: &[&str] = &[
    "John", "Jane", "Bob", "Alice", "Charlie", "Diana", "Eve", "Frank", "Grace", "Henry",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Brown", "Davis", "Miller", "Wilson", "Moore", "Taylor", "Anderson",
    "Thomas",
];

/// Window that `random.timestamp` draws from, ending now.
pub const TIMESTAMP_WINDOW_DAYS: i64 = 30;

pub fn alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

/// Uniform float in `[min, max)`; returns `min` for an empty range.
///
/// A range wider than `f64::MAX` is drawn by interpolation instead of
/// `gen_range`, which cannot sample it.
pub fn float_in<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    if min >= max || min.is_nan() || max.is_nan() {
        return min;
    }
    if (max - min).is_finite() {
        return rng.gen_range(min..max);
    }
    let t: f64 = rng.gen();
    (min * (1.0 - t) + max * t).clamp(min, max)
}

pub fn uuid_v4<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}

pub fn email<R: Rng + ?Sized>(rng: &mut R) -> String {
    let name = pick(rng, EMAIL_NAMES);
    let domain = pick(rng, EMAIL_DOMAINS);
    let suffix = rng.gen_range(0..9999);
    format!("{name}{suffix}@{domain}")
}

pub fn full_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES))
}

pub fn recent_timestamp<R: Rng + ?Sized>(rng: &mut R) -> String {
    let window = Duration::days(TIMESTAMP_WINDOW_DAYS).num_seconds();
    let back = rng.gen_range(0..window);
    (Utc::now() - Duration::seconds(back)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn choice<R: Rng + ?Sized>(rng: &mut R, options: &[String]) -> String {
    options.choose(rng).cloned().unwrap_or_default()
}

fn pick<R: Rng + ?Sized>(rng: &mut R, pool: &[&'static str]) -> &'static str {
    pool.choose(rng).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_uuid_is_version_4() {
        let mut rng = StdRng::seed_from_u64(1);
        let id = uuid_v4(&mut rng);
        let parsed = uuid::Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(parsed.get_variant(), uuid::Variant::RFC4122);
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn test_email_shape() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let e = email(&mut rng);
            let (local, domain) = e.split_once('@').unwrap();
            assert!(EMAIL_DOMAINS.contains(&domain));
            assert!(EMAIL_NAMES.iter().any(|n| local.starts_with(n)));
        }
    }

    #[test]
    fn test_name_is_first_and_last() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = full_name(&mut rng);
        let (first, last) = n.split_once(' ').unwrap();
        assert!(FIRST_NAMES.contains(&first));
        assert!(LAST_NAMES.contains(&last));
    }

    #[test]
    fn test_timestamp_within_window() {
        let mut rng = StdRng::seed_from_u64(4);
        let now = Utc::now();
        for _ in 0..50 {
            let ts = chrono::DateTime::parse_from_rfc3339(&recent_timestamp(&mut rng)).unwrap();
            let age = now.signed_duration_since(ts);
            assert!(age >= Duration::seconds(-1));
            assert!(age <= Duration::days(TIMESTAMP_WINDOW_DAYS));
        }
    }

    #[test]
    fn test_float_empty_range() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(float_in(&mut rng, 4.0, 4.0), 4.0);
    }

    #[test]
    fn test_float_wider_than_f64_max() {
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..100 {
            let f = float_in(&mut rng, -1e308, 1e308);
            assert!(f.is_finite());
            assert!((-1e308..=1e308).contains(&f));
        }
    }
}
