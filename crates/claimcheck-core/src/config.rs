use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::warn;

use crate::router::TriagePolicy;
use crate::{ClaimCheckError, SecretValue, optional_env, require_env};

const DEFAULT_CONFIG_PATH: &str = "claimcheck.toml";
const CONFIG_PATH_ENV: &str = "CLAIMCHECK_CONFIG";

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub triage: TriageConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve every data-source credential from the environment.
    ///
    /// Absent credentials are not fatal here; the affected workers report
    /// them as error envelopes at call time.
    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials {
            gnews: optional_env(&self.sources.gnews.api_key_env),
            factcheck: optional_env(&self.sources.factcheck.api_key_env),
            virustotal: optional_env(&self.sources.virustotal.api_key_env),
            perplexity: optional_env(&self.sources.perplexity.api_key_env),
        };

        for var in credentials.missing(self) {
            warn!(env = %var, "data source credential not set; dependent workers will report errors");
        }

        credentials
    }
}

/// Credential state of one data source, as shown by `claimcheck doctor`.
#[derive(Debug)]
pub struct CredentialCheck {
    pub source: &'static str,
    pub env: String,
    /// `MissingSecret` when the variable is unset or blank.
    pub error: Option<ClaimCheckError>,
}

impl CredentialCheck {
    pub fn is_configured(&self) -> bool {
        self.error.is_none()
    }
}

impl Config {
    /// Re-read every credential, keeping the error for each missing one.
    pub fn check_credentials(&self) -> Vec<CredentialCheck> {
        let sources = &self.sources;
        [
            ("News search", &sources.gnews.api_key_env),
            ("Fact-check registry", &sources.factcheck.api_key_env),
            ("URL reputation", &sources.virustotal.api_key_env),
            ("Research assistant", &sources.perplexity.api_key_env),
        ]
        .into_iter()
        .map(|(source, var)| CredentialCheck {
            source,
            env: var.clone(),
            error: require_env(var).err(),
        })
        .collect()
    }
}

/// Helper to load configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `CLAIMCHECK_CONFIG` environment variable.
    /// 3. `claimcheck.toml` in the current working directory, falling back to
    ///    built-in defaults when that file does not exist.
    pub fn load(path: Option<PathBuf>) -> Result<Config, ClaimCheckError> {
        let config = match resolve_path(path) {
            ConfigSource::Required(candidate) => Self::read(&candidate)?,
            ConfigSource::Default(candidate) if candidate.exists() => Self::read(&candidate)?,
            ConfigSource::Default(_) => Config::default(),
        };

        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(raw: &str) -> Result<Config, ClaimCheckError> {
        let config: Config = toml::from_str(raw)
            .map_err(|err| ClaimCheckError::InvalidConfiguration(err.to_string()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn read(candidate: &Path) -> Result<Config, ClaimCheckError> {
        let raw = fs::read_to_string(candidate)
            .map_err(|err| ClaimCheckError::config_io(candidate.to_path_buf(), err))?;
        toml::from_str(&raw).map_err(|err| ClaimCheckError::InvalidConfiguration(err.to_string()))
    }

    fn validate(config: &Config) -> Result<(), ClaimCheckError> {
        let sources = &config.sources;
        for (name, env_name) in [
            ("gnews", &sources.gnews.api_key_env),
            ("factcheck", &sources.factcheck.api_key_env),
            ("virustotal", &sources.virustotal.api_key_env),
            ("perplexity", &sources.perplexity.api_key_env),
        ] {
            if env_name.trim().is_empty() {
                return Err(ClaimCheckError::InvalidConfiguration(format!(
                    "sources.{name}.api_key_env must reference an environment variable"
                )));
            }
        }

        if sources.request_timeout_secs == 0
            || sources.research_timeout_secs == 0
            || sources.worker_deadline_secs == 0
        {
            return Err(ClaimCheckError::InvalidConfiguration(
                "source timeouts must be greater than zero".into(),
            ));
        }

        if sources.virustotal.poll_attempts == 0 {
            return Err(ClaimCheckError::InvalidConfiguration(
                "sources.virustotal.poll_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

enum ConfigSource {
    Required(PathBuf),
    Default(PathBuf),
}

fn resolve_path(path: Option<PathBuf>) -> ConfigSource {
    if let Some(path) = path {
        return ConfigSource::Required(path);
    }

    if let Ok(from_env) = env::var(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return ConfigSource::Required(PathBuf::from(from_env));
        }
    }

    ConfigSource::Default(Path::new(DEFAULT_CONFIG_PATH).to_path_buf())
}

/// Data-source credentials resolved once at start-up; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub gnews: Option<SecretValue>,
    pub factcheck: Option<SecretValue>,
    pub virustotal: Option<SecretValue>,
    pub perplexity: Option<SecretValue>,
}

impl Credentials {
    /// Environment variable names whose credential is absent.
    pub fn missing(&self, config: &Config) -> Vec<String> {
        let sources = &config.sources;
        [
            (&self.gnews, &sources.gnews.api_key_env),
            (&self.factcheck, &sources.factcheck.api_key_env),
            (&self.virustotal, &sources.virustotal.api_key_env),
            (&self.perplexity, &sources.perplexity.api_key_env),
        ]
        .into_iter()
        .filter(|(secret, _)| secret.is_none())
        .map(|(_, var)| var.clone())
        .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriageConfig {
    #[serde(default)]
    pub policy: TriagePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "SourcesConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "SourcesConfig::default_research_timeout_secs")]
    pub research_timeout_secs: u64,
    #[serde(default = "SourcesConfig::default_worker_deadline_secs")]
    pub worker_deadline_secs: u64,
    #[serde(default)]
    pub gnews: GnewsConfig,
    #[serde(default)]
    pub factcheck: FactcheckConfig,
    #[serde(default)]
    pub virustotal: VirusTotalConfig,
    #[serde(default)]
    pub perplexity: PerplexityConfig,
}

impl SourcesConfig {
    const fn default_request_timeout_secs() -> u64 {
        10
    }

    const fn default_research_timeout_secs() -> u64 {
        30
    }

    const fn default_worker_deadline_secs() -> u64 {
        90
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn research_timeout(&self) -> Duration {
        Duration::from_secs(self.research_timeout_secs)
    }

    pub fn worker_deadline(&self) -> Duration {
        Duration::from_secs(self.worker_deadline_secs)
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: Self::default_request_timeout_secs(),
            research_timeout_secs: Self::default_research_timeout_secs(),
            worker_deadline_secs: Self::default_worker_deadline_secs(),
            gnews: GnewsConfig::default(),
            factcheck: FactcheckConfig::default(),
            virustotal: VirusTotalConfig::default(),
            perplexity: PerplexityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GnewsConfig {
    pub api_key_env: String,
    pub base_url: String,
    pub max_results: u8,
    pub language: String,
}

impl Default for GnewsConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GNEWS_API_KEY".into(),
            base_url: "https://gnews.io/api/v4".into(),
            max_results: 10,
            language: "en".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FactcheckConfig {
    pub api_key_env: String,
    pub base_url: String,
    pub max_results: u8,
    pub language: String,
}

impl Default for FactcheckConfig {
    fn default() -> Self {
        Self {
            api_key_env: "FACTCHECK_API_KEY".into(),
            base_url: "https://factchecktools.googleapis.com/v1alpha1".into(),
            max_results: 10,
            language: "en".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VirusTotalConfig {
    pub api_key_env: String,
    pub base_url: String,
    pub poll_attempts: u32,
    pub poll_interval_secs: u64,
}

impl VirusTotalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for VirusTotalConfig {
    fn default() -> Self {
        Self {
            api_key_env: "VT_API_KEY".into(),
            base_url: "https://www.virustotal.com/api/v3".into(),
            poll_attempts: 6,
            poll_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PerplexityConfig {
    pub api_key_env: String,
    pub base_url: String,
    pub model: String,
}

impl Default for PerplexityConfig {
    fn default() -> Self {
        Self {
            api_key_env: "PERPLEXITY_API_KEY".into(),
            base_url: "https://api.perplexity.ai".into(),
            model: "sonar".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: PathBuf,
    pub retention_days: u64,
    pub persist: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            dir: PathBuf::from("data/logs"),
            retention_days: 90,
            persist: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ConfigLoader::from_toml("").expect("defaults are valid");
        assert_eq!(config.triage.policy, TriagePolicy::Multi);
        assert_eq!(config.sources.request_timeout_secs, 10);
        assert_eq!(config.sources.research_timeout_secs, 30);
        assert_eq!(config.sources.virustotal.poll_attempts, 6);
        assert_eq!(config.sources.virustotal.poll_interval_secs, 5);
        assert_eq!(config.sources.virustotal.api_key_env, "VT_API_KEY");
        assert_eq!(config.sources.perplexity.model, "sonar");
    }

    #[test]
    fn parses_overrides() {
        let config = ConfigLoader::from_toml(
            r#"
            [triage]
            policy = "single"

            [sources]
            worker_deadline_secs = 45

            [sources.gnews]
            api_key_env = "MY_GNEWS"

            [logging]
            persist = true
            dir = "/tmp/claimcheck"
            "#,
        )
        .expect("config parses");

        assert_eq!(config.triage.policy, TriagePolicy::Single);
        assert_eq!(config.sources.worker_deadline_secs, 45);
        assert_eq!(config.sources.gnews.api_key_env, "MY_GNEWS");
        assert_eq!(config.sources.gnews.base_url, "https://gnews.io/api/v4");
        assert!(config.logging.persist);
    }

    #[test]
    fn rejects_blank_key_env_and_zero_polls() {
        let err = ConfigLoader::from_toml("[sources.factcheck]\napi_key_env = \"\"\n").unwrap_err();
        assert!(matches!(err, ClaimCheckError::InvalidConfiguration(_)));

        let err =
            ConfigLoader::from_toml("[sources.virustotal]\npoll_attempts = 0\n").unwrap_err();
        assert!(err.to_string().contains("poll_attempts"));
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = ConfigLoader::load(Some(PathBuf::from("/nonexistent/claimcheck.toml")))
            .unwrap_err();
        assert!(matches!(err, ClaimCheckError::ConfigIo { .. }));
    }

    #[test]
    fn loads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[sources]\nrequest_timeout_secs = 3").unwrap();

        let config = ConfigLoader::load(Some(file.path().to_path_buf())).expect("loads");
        assert_eq!(config.sources.request_timeout_secs, 3);
    }

    #[test]
    fn missing_credentials_are_listed_by_env_name() {
        let mut config = Config::default();
        config.sources.gnews.api_key_env = "CLAIMCHECK_TEST_ABSENT_GNEWS".into();
        let credentials = Credentials {
            factcheck: Some(SecretValue::new("f")),
            virustotal: Some(SecretValue::new("v")),
            perplexity: Some(SecretValue::new("p")),
            ..Credentials::default()
        };

        assert_eq!(
            credentials.missing(&config),
            vec!["CLAIMCHECK_TEST_ABSENT_GNEWS".to_string()]
        );
    }

    #[test]
    fn example_config_parses() {
        let config = ConfigLoader::from_toml(include_str!("../../../config.example.toml"))
            .expect("example config is valid");
        assert_eq!(config.sources.virustotal.poll_attempts, 6);
        assert_eq!(config.sources.perplexity.model, "sonar");
        assert!(!config.logging.persist);
    }

    #[test]
    fn credential_checks_report_missing_secrets() {
        unsafe {
            std::env::set_var("CLAIMCHECK_TEST_DOCTOR_VT", "vt-key");
            std::env::remove_var("CLAIMCHECK_TEST_DOCTOR_GNEWS");
        }
        let mut config = Config::default();
        config.sources.gnews.api_key_env = "CLAIMCHECK_TEST_DOCTOR_GNEWS".into();
        config.sources.virustotal.api_key_env = "CLAIMCHECK_TEST_DOCTOR_VT".into();

        let checks = config.check_credentials();
        assert_eq!(checks.len(), 4);

        let gnews = &checks[0];
        assert_eq!(gnews.source, "News search");
        assert!(!gnews.is_configured());
        assert!(matches!(
            gnews.error,
            Some(ClaimCheckError::MissingSecret(ref var)) if var == "CLAIMCHECK_TEST_DOCTOR_GNEWS"
        ));

        let virustotal = &checks[2];
        assert_eq!(virustotal.env, "CLAIMCHECK_TEST_DOCTOR_VT");
        assert!(virustotal.is_configured());
    }
}
