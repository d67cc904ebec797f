//! Loader for skyscan configuration: built-in defaults, optional YAML files
//! and `SKYSCAN__`-prefixed environment overrides, in that precedence order.
//!
//! String values may reference environment variables as `${VAR}`; expansion is
//! recursive up to a fixed depth, and unknown variables are left untouched.
//! The built-in defaults point the Bluesky credentials at `${BLUESKY_HANDLE}`
//! and `${BLUESKY_APP_PASSWORD}`, so exporting those two is enough to run.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "SKYSCAN";
const ENV_SEPARATOR: &str = "__";

const DEFAULTS_YAML: &str = r#"
bluesky:
  service: "https://bsky.social"
  handle: "${BLUESKY_HANDLE}"
  app_password: "${BLUESKY_APP_PASSWORD}"
http:
  timeout_secs: 15
"#;

#[derive(Debug, Default, Deserialize)]
pub struct SkyscanConfig {
    #[serde(default)]
    pub bluesky: BlueskyConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Upstream account and service settings.
#[derive(Deserialize)]
pub struct BlueskyConfig {
    /// XRPC service used for both login and search.
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default, deserialize_with = "string_like")]
    pub handle: Option<String>,
    #[serde(default, deserialize_with = "string_like")]
    pub app_password: Option<String>,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            handle: None,
            app_password: None,
        }
    }
}

impl fmt::Debug for BlueskyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueskyConfig")
            .field("service", &self.service)
            .field("handle", &self.handle)
            .field("app_password", &self.app_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl BlueskyConfig {
    /// Usable credentials, or [`MissingCredentials`] when either value is
    /// absent, blank, or still an unexpanded `${VAR}` placeholder.
    ///
    /// ```
    /// use skyscan_config::BlueskyConfig;
    ///
    /// let mut cfg = BlueskyConfig::default();
    /// assert!(cfg.credentials().is_err());
    ///
    /// cfg.handle = Some("alice.bsky.social".into());
    /// cfg.app_password = Some("abcd-efgh-ijkl-mnop".into());
    /// let creds = cfg.credentials().unwrap();
    /// assert_eq!(creds.identifier, "alice.bsky.social");
    /// ```
    pub fn credentials(&self) -> Result<Credentials, MissingCredentials> {
        match (usable(&self.handle), usable(&self.app_password)) {
            (Some(identifier), Some(password)) => Ok(Credentials {
                identifier: identifier.to_string(),
                password: password.to_string(),
            }),
            _ => Err(MissingCredentials),
        }
    }
}

fn usable(v: &Option<String>) -> Option<&str> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.contains("${"))
}

/// Identifier + app password for the upstream login call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Missing Bluesky credentials on server.")]
pub struct MissingCredentials;

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    /// Deadline applied to every upstream call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_service() -> String {
    "https://bsky.social".into()
}
fn default_timeout_secs() -> u64 {
    15
}

/// Accept numbers and booleans where a string is expected; env parsing turns
/// an all-digit value into a number before we ever see it.
fn string_like<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(de)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// `~/.config/skyscan/skyscan.yaml` (platform equivalent), if a config dir exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("skyscan").join("skyscan.yaml"))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') => {
            let mut cur = std::mem::take(s);
            for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                let expanded = match shellexpand::env(&cur) {
                    Ok(cow) => cow.into_owned(),
                    Err(_) => break,
                };
                if expanded == cur {
                    break;
                }
                cur = expanded;
            }
            *s = cur;
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder over the `config` crate. Environment overrides are attached last in
/// [`SkyscanConfigLoader::load`] so they win over every file.
pub struct SkyscanConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for SkyscanConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SkyscanConfigLoader {
    /// Start from the built-in defaults.
    ///
    /// ```
    /// use skyscan_config::SkyscanConfigLoader;
    ///
    /// let cfg = SkyscanConfigLoader::new()
    ///     .with_yaml_str("http:\n  timeout_secs: 3")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.bluesky.service, "https://bsky.social");
    /// assert_eq!(cfg.http.timeout_secs, 3);
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULTS_YAML, FileFormat::Yaml));
        Self { builder }
    }

    /// Attach a required YAML/TOML/JSON file; the format is inferred from the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is silently skipped when it does not exist.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet (tests and embedding callers).
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and deserialize.
    ///
    /// ```
    /// use skyscan_config::SkyscanConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOCTEST_SKY_HANDLE", "bob.bsky.social"); }
    ///
    /// let cfg = SkyscanConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// bluesky:
    ///   handle: "${DOCTEST_SKY_HANDLE}"
    ///   app_password: "aaaa-bbbb-cccc-dddd"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// let creds = cfg.bluesky.credentials().unwrap();
    /// assert_eq!(creds.identifier, "bob.bsky.social");
    ///
    /// unsafe { std::env::remove_var("DOCTEST_SKY_HANDLE"); }
    /// ```
    pub fn load(self) -> Result<SkyscanConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
