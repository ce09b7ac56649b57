//! Scenario file loading and per-environment resolution.

use chrono::Local;
use load_common::{AuthTemplate, LoadError, LoadResult, LoadTestSpec};
use placeholder::VarValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Request count used when the file gives no other way to end the run.
pub const DEFAULT_REQUESTS: u64 = 100;

/// A scenario YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub environments: BTreeMap<String, EnvConfig>,
    pub query: String,
    #[serde(default)]
    pub variables: Option<VarValue>,
    /// Header templates sent with every request in every environment.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub load: LoadSection,
    #[serde(default)]
    pub logging: LoggingSection,
    /// Where results artifacts go; defaults to `results/<env>`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

/// Target endpoint and credentials for one environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    pub url: String,
    /// Override scenario headers of the same name.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub header: Option<String>,
    /// May contain placeholders; rendered per request.
    #[serde(default)]
    pub value: String,
}

/// Run bounds. Zero means unset for every field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadSection {
    #[serde(default)]
    pub concurrency: u32,
    #[serde(default)]
    pub requests: u64,
    #[serde(default)]
    pub rps: u32,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Command-line values that replace their `load` counterparts.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub concurrency: Option<u32>,
    pub requests: Option<u64>,
    pub rps: Option<u32>,
    pub duration_seconds: Option<u64>,
}

/// A scenario bound to one environment, ready to run.
#[derive(Debug, Clone)]
pub struct ResolvedScenario {
    pub environment: String,
    pub description: String,
    pub spec: LoadTestSpec,
    pub output_dir: PathBuf,
}

impl ScenarioFile {
    /// Load a scenario from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LoadError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut scenario = Self::from_yaml(&content)?;
        if scenario.name.is_empty() {
            scenario.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
        }
        Ok(scenario)
    }

    pub fn from_yaml(content: &str) -> LoadResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Environment names in sorted order.
    pub fn environment_names(&self) -> Vec<&str> {
        self.environments.keys().map(String::as_str).collect()
    }

    /// Bind the scenario to `environment`, apply overrides and defaults, and
    /// validate the result.
    pub fn resolve(&self, environment: &str, overrides: &Overrides) -> LoadResult<ResolvedScenario> {
        let env = self.environments.get(environment).ok_or_else(|| {
            LoadError::Config(format!(
                "environment '{}' not found (available: {})",
                environment,
                self.environment_names().join(", ")
            ))
        })?;

        if env.url.trim().is_empty() {
            return Err(LoadError::Config(format!(
                "url is required for environment '{}'",
                environment
            )));
        }
        if self.query.trim().is_empty() {
            return Err(LoadError::Config("query is required".into()));
        }
        if env.auth.value.trim().is_empty() {
            return Err(LoadError::Config(format!(
                "auth value is required for environment '{}'",
                environment
            )));
        }

        let concurrency = overrides.concurrency.unwrap_or(self.load.concurrency);
        let requests = overrides.requests.unwrap_or(self.load.requests);
        let rps = overrides.rps.unwrap_or(self.load.rps);
        let duration_seconds = overrides
            .duration_seconds
            .unwrap_or(self.load.duration_seconds);

        let target_rps = (rps > 0).then_some(rps);
        let duration = (duration_seconds > 0).then(|| Duration::from_secs(duration_seconds));
        let total_requests = match (requests, target_rps, duration) {
            (n, _, _) if n > 0 => Some(n),
            (_, Some(_), Some(_)) => None,
            _ => Some(DEFAULT_REQUESTS),
        };

        let mut headers = self.headers.clone();
        headers.extend(env.headers.clone());

        let log_file = self.logging.enabled.then(|| {
            self.logging.file.clone().unwrap_or_else(|| {
                PathBuf::from(format!(
                    "results/{}/request_log_{}.csv",
                    environment,
                    Local::now().format("%Y%m%d_%H%M%S")
                ))
            })
        });

        let auth_header = env
            .auth
            .header
            .clone()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| AuthTemplate::default().header);

        let spec = LoadTestSpec {
            name: self.name.clone(),
            url: env.url.clone(),
            query: self.query.clone(),
            auth: AuthTemplate {
                header: auth_header,
                value: env.auth.value.clone(),
            },
            headers,
            concurrency,
            total_requests,
            target_rps,
            duration,
            variables: self.variables.clone(),
            log_file,
            seed: self.load.seed,
        };
        spec.validate()?;

        Ok(ResolvedScenario {
            environment: environment.to_string(),
            description: self.description.clone(),
            spec,
            output_dir: self
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("results/{}", environment))),
        })
    }
}

/// Every parseable `.yaml`/`.yml` scenario in `dir`, sorted by file name.
///
/// Files that fail to parse are skipped.
pub fn list_scenarios(dir: impl AsRef<Path>) -> LoadResult<Vec<(PathBuf, ScenarioFile)>> {
    let mut scenarios = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        if !is_yaml {
            continue;
        }
        match ScenarioFile::from_file(&path) {
            Ok(scenario) => scenarios.push((path, scenario)),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "Skipping scenario"),
        }
    }
    scenarios.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(scenarios)
}
