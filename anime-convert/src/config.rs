//! Application configuration.
//!
//! Every setting comes from an environment variable and falls back to a
//! default. A `.env` file is loaded by the binary before this runs.

use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

use crate::api::server::ApiServerConfig;
use crate::pipeline::{DEFAULT_STYLE, DispatcherConfig, PurgeConfig};
use crate::{Error, Result};

const DEFAULT_PORT: u16 = 7860;
const DEFAULT_MAX_UPLOAD_MB: usize = 1024;
const DEFAULT_FPS: u32 = 30;
const DEFAULT_INTERPRETER: &str = "python3";
/// Upper bound for `JOB_RETENTION_HOURS` (100 years).
const MAX_RETENTION_HOURS: u64 = 100 * 365 * 24;

/// Fully resolved configuration for the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ApiServerConfig,
    pub dispatcher: DispatcherConfig,
    pub purge: PurgeConfig,
    pub results_dir: PathBuf,
    pub scripts_dir: PathBuf,
    /// `None` runs stage scripts directly.
    pub interpreter: Option<OsString>,
    pub fps: u32,
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ApiServerConfig::default(),
            dispatcher: DispatcherConfig::default(),
            purge: PurgeConfig::default(),
            results_dir: PathBuf::from("backend_results"),
            scripts_dir: PathBuf::from("scripts"),
            interpreter: Some(OsString::from(DEFAULT_INTERPRETER)),
            fps: DEFAULT_FPS,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Supported env vars:
    /// - `API_BIND_ADDRESS`, `API_PORT`, `API_ENABLE_CORS`, `MAX_UPLOAD_MB`
    /// - `UPLOADS_DIR`, `RESULTS_DIR`, `SCRIPTS_DIR`, `LOG_DIR`
    /// - `STAGE_INTERPRETER` (empty = run scripts directly)
    /// - `DEFAULT_STYLE`, `OUTPUT_FPS`
    /// - `MAX_CONCURRENT_JOBS` (0 = unbounded)
    /// - `JOB_RETENTION_HOURS` (0 = keep forever), `PURGE_INTERVAL_SECS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = Self::default();

        let server = ApiServerConfig {
            bind_address: env
                .string("API_BIND_ADDRESS")
                .unwrap_or(defaults.server.bind_address),
            port: env.parse("API_PORT", DEFAULT_PORT)?,
            enable_cors: env.flag("API_ENABLE_CORS", defaults.server.enable_cors)?,
            body_limit: env
                .parse("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)?
                .saturating_mul(1024 * 1024),
        };

        let dispatcher = DispatcherConfig {
            uploads_dir: env
                .string("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.dispatcher.uploads_dir),
            default_style: env
                .string("DEFAULT_STYLE")
                .unwrap_or_else(|| DEFAULT_STYLE.to_string()),
            max_concurrent_jobs: env.parse("MAX_CONCURRENT_JOBS", 0)?,
        };

        let retention_hours: u64 = env.parse("JOB_RETENTION_HOURS", 0)?;
        if retention_hours > MAX_RETENTION_HOURS {
            return Err(Error::config(format!(
                "JOB_RETENTION_HOURS must be at most {MAX_RETENTION_HOURS}, got {retention_hours}"
            )));
        }

        let purge = PurgeConfig::default()
            .with_retention_hours(retention_hours)
            .with_check_interval_secs(
                env.parse("PURGE_INTERVAL_SECS", defaults.purge.check_interval_secs)?,
            );

        // Set but empty means "no interpreter".
        let interpreter = match env.raw("STAGE_INTERPRETER") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(OsString::from(value.trim())),
            None => defaults.interpreter,
        };

        let fps = env.parse("OUTPUT_FPS", DEFAULT_FPS)?;
        if fps == 0 {
            return Err(Error::config("OUTPUT_FPS must be greater than 0"));
        }

        Ok(Self {
            server,
            dispatcher,
            purge,
            results_dir: env
                .string("RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            scripts_dir: env
                .string("SCRIPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scripts_dir),
            interpreter,
            fps,
            log_dir: env
                .string("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    /// Non-blank value, trimmed.
    fn string(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            Some(value) => value
                .parse()
                .map_err(|e| Error::config(format!("invalid {key}={value:?}: {e}"))),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        let Some(value) = self.string(key) else {
            return Ok(default);
        };
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::config(format!("invalid {key}={value:?}: expected a boolean"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.port, 7860);
        assert!(config.server.enable_cors);
        assert_eq!(config.server.body_limit, 1024 * 1024 * 1024);
        assert_eq!(config.dispatcher.uploads_dir, PathBuf::from("backend_uploads"));
        assert_eq!(config.dispatcher.default_style, "face_paint_512_v2");
        assert_eq!(config.dispatcher.max_concurrent_jobs, 0);
        assert_eq!(config.results_dir, PathBuf::from("backend_results"));
        assert_eq!(config.interpreter, Some(OsString::from("python3")));
        assert_eq!(config.fps, 30);
        assert!(!config.purge.is_enabled());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("API_PORT", "9000"),
            ("API_ENABLE_CORS", "off"),
            ("MAX_UPLOAD_MB", "2"),
            ("RESULTS_DIR", "/data/results"),
            ("STAGE_INTERPRETER", ""),
            ("MAX_CONCURRENT_JOBS", "2"),
            ("JOB_RETENTION_HOURS", "48"),
            ("DEFAULT_STYLE", "hayao"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(!config.server.enable_cors);
        assert_eq!(config.server.body_limit, 2 * 1024 * 1024);
        assert_eq!(config.results_dir, PathBuf::from("/data/results"));
        assert_eq!(config.interpreter, None);
        assert_eq!(config.dispatcher.max_concurrent_jobs, 2);
        assert_eq!(config.purge.retention_hours, 48);
        assert_eq!(config.dispatcher.default_style, "hayao");
    }

    #[test]
    fn test_retention_hours_bound() {
        let config = load(&[("JOB_RETENTION_HOURS", "876000")]).unwrap();
        assert_eq!(config.purge.retention_hours, MAX_RETENTION_HOURS);

        let err = load(&[("JOB_RETENTION_HOURS", "876001")]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = load(&[("JOB_RETENTION_HOURS", "18446744073709551615")]).unwrap_err();
        assert!(err.to_string().contains("JOB_RETENTION_HOURS"));
    }

    #[test]
    fn test_invalid_numbers_are_configuration_errors() {
        let err = load(&[("API_PORT", "not-a-port")]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("API_PORT"));

        assert!(matches!(
            load(&[("OUTPUT_FPS", "0")]).unwrap_err(),
            Error::Configuration(_)
        ));
        assert!(matches!(
            load(&[("API_ENABLE_CORS", "maybe")]).unwrap_err(),
            Error::Configuration(_)
        ));
    }
}
