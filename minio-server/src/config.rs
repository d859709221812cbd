//! Configuration for the minio server.
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command line flags of the selected mode (applied by [`cli`](crate::cli))
//! 2. Environment variables (prefixed with `MINIO__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `MINIO__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `MINIO__API__ADDR=127.0.0.1:9000` sets the object API address
//! - `MINIO__LOGGING__FORMAT=json` switches to JSON logs
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! api:
//!   addr: 127.0.0.1:9000
//! logging:
//!   format: json
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Yaml};
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "MINIO__";

/// Newtype around `String` that keeps secrets out of logs. Use with [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// Returns the secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl std::ops::Deref for ConfigSecret {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Object API listener configuration.
///
/// Used in: [`Config::api`]
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    /// Bind address of the object API.
    ///
    /// Either `host:port` or `:port` to bind all interfaces.
    ///
    /// # Default
    ///
    /// `:9000`
    ///
    /// # Environment Variable
    ///
    /// `MINIO__API__ADDR`
    pub addr: String,

    /// PEM encoded certificate chain for HTTPS.
    ///
    /// HTTPS is enabled only if both `cert` and `key` are set.
    ///
    /// # Environment Variable
    ///
    /// `MINIO__API__CERT`
    pub cert: Option<PathBuf>,

    /// PEM encoded private key for HTTPS.
    ///
    /// # Environment Variable
    ///
    /// `MINIO__API__KEY`
    pub key: Option<PathBuf>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            addr: ":9000".to_owned(),
            cert: None,
            key: None,
        }
    }
}

/// Management listener configuration.
///
/// The management listener always serves plain HTTP.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Web {
    /// Bind address of the management API.
    ///
    /// # Default
    ///
    /// `:9001`
    ///
    /// # Environment Variable
    ///
    /// `MINIO__WEB__ADDR`
    pub addr: String,
}

impl Default for Web {
    fn default() -> Self {
        Self {
            addr: ":9001".to_owned(),
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Runtime {
    /// Number of worker threads for the async runtime.
    ///
    /// # Default
    ///
    /// The number of logical CPUs.
    ///
    /// # Environment Variable
    ///
    /// `MINIO__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// [Sentry](https://sentry.io/) configuration.
///
/// Sentry is disabled unless a DSN is configured.
#[derive(Debug, Deserialize, Serialize)]
pub struct Sentry {
    /// Sentry DSN. Redacted in debug output.
    ///
    /// # Environment Variable
    ///
    /// `MINIO__SENTRY__DSN`
    pub dsn: Option<SecretBox<ConfigSecret>>,

    /// Environment name reported with events.
    ///
    /// # Environment Variable
    ///
    /// `MINIO__SENTRY__ENVIRONMENT`
    pub environment: Option<Cow<'static, str>>,

    /// Error event sampling rate.
    ///
    /// # Default
    ///
    /// `1.0`
    pub sample_rate: f32,

    /// Performance trace sampling rate.
    ///
    /// # Default
    ///
    /// `0.01`
    pub traces_sample_rate: f32,
}

impl Sentry {
    /// Returns whether Sentry integration is enabled.
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.01,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty for a TTY, simplified otherwise.
    Auto,

    /// Pretty printing with colors.
    ///
    /// ```text
    ///  INFO  minio_server::bootstrap > starting listener
    /// ```
    Pretty,

    /// Plain text without colors.
    ///
    /// ```text
    /// 2024-05-04T12:10:32Z  INFO minio_server::bootstrap: starting listener
    /// ```
    Simplified,

    /// JSON lines.
    Json,
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration. Logs are always written to stderr.
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level.
    ///
    /// `RUST_LOG` takes precedence when set.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `MINIO__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Environment Variable
    ///
    /// `MINIO__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Metrics configuration.
///
/// Request counts, latencies and in-flight requests of both listeners are submitted to Datadog.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Metrics {
    /// Datadog API key. Metrics are disabled without it.
    ///
    /// # Environment Variable
    ///
    /// `MINIO__METRICS__DATADOG_KEY`
    pub datadog_key: Option<SecretBox<ConfigSecret>>,

    /// Tags attached to every metric.
    ///
    /// # Environment Variables
    ///
    /// Each tag is set individually, for example `MINIO__METRICS__TAGS__REGION=eu`.
    pub tags: BTreeMap<String, String>,
}

/// Main configuration of the minio server.
///
/// Mode selection and the storage backend are not part of this struct. They are given on the
/// command line only.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Object API listener.
    pub api: Api,

    /// Management listener.
    pub web: Web,

    /// Enables debug mode: system information is logged at startup and served by the management
    /// API.
    ///
    /// # Environment Variable
    ///
    /// `MINIO__DEBUG`
    pub debug: bool,

    /// Async runtime settings.
    pub runtime: Runtime,

    /// Log verbosity and format.
    pub logging: Logging,

    /// Optional error reporting to Sentry.
    pub sentry: Sentry,

    /// Optional metrics submission to Datadog.
    pub metrics: Metrics,
}

impl Config {
    /// Loads configuration from defaults, the optional YAML file at `path` and the environment.
    ///
    /// # Errors
    ///
    /// Fails if the file can not be read or parsed, or if a value has the wrong type.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn has_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.api.addr, ":9000");
            assert_eq!(config.api.cert, None);
            assert_eq!(config.web.addr, ":9001");
            assert!(!config.debug);
            assert!(config.runtime.worker_threads > 0);
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert_eq!(config.logging.format, LogFormat::Auto);
            assert!(!config.sentry.is_enabled());
            assert!(config.metrics.datadog_key.is_none());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MINIO__API__ADDR", "127.0.0.1:9100");
            jail.set_env("MINIO__WEB__ADDR", ":9101");
            jail.set_env("MINIO__DEBUG", "true");
            jail.set_env("MINIO__LOGGING__LEVEL", "debug");
            jail.set_env("MINIO__LOGGING__FORMAT", "json");
            jail.set_env("MINIO__SENTRY__DSN", "abcde");
            jail.set_env("MINIO__SENTRY__SAMPLE_RATE", "0.5");
            jail.set_env("MINIO__METRICS__DATADOG_KEY", "dd-key");
            jail.set_env("MINIO__METRICS__TAGS__REGION", "eu");

            let config = Config::load(None).unwrap();

            assert_eq!(config.api.addr, "127.0.0.1:9100");
            assert_eq!(config.web.addr, ":9101");
            assert!(config.debug);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);
            assert_eq!(config.sentry.dsn.unwrap().expose_secret().as_str(), "abcde");
            assert_eq!(config.sentry.sample_rate, 0.5);
            assert_eq!(
                config.metrics.datadog_key.unwrap().expose_secret().as_str(),
                "dd-key"
            );
            assert_eq!(config.metrics.tags["region"], "eu");

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            api:
                addr: ":8000"
                cert: /etc/minio/cert.pem
                key: /etc/minio/key.pem
            sentry:
                dsn: abcde
                environment: production
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.api.addr, ":8000");
            assert_eq!(config.api.cert.as_deref(), Some(Path::new("/etc/minio/cert.pem")));
            assert_eq!(config.api.key.as_deref(), Some(Path::new("/etc/minio/key.pem")));
            assert_eq!(config.web.addr, ":9001");
            assert_eq!(config.sentry.environment.as_deref(), Some("production"));

            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile.write_all(b"web:\n  addr: \":8001\"\n").unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("MINIO__WEB__ADDR", ":8002");

            let config = Config::load(Some(tempfile.path())).unwrap();
            assert_eq!(config.web.addr, ":8002");

            Ok(())
        });
    }

    #[test]
    fn redacts_secrets() {
        let sentry = Sentry {
            dsn: Some(SecretBox::new(Box::new("https://key@sentry.example/1".into()))),
            ..Default::default()
        };

        let debug = format!("{sentry:?}");
        assert!(!debug.contains("key@sentry"), "{debug}");

        let secret = ConfigSecret::from("hunter2");
        assert_eq!(format!("{secret:?}"), "[redacted]");
        assert_eq!(&*secret, "hunter2");
    }
}
