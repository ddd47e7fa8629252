//! Configuration loading and management.
//!
//! Values come, in increasing priority, from built-in defaults, the
//! persisted [`Settings`] file, the environment (including a `.env` file)
//! and finally whatever the caller overrides on the returned [`Config`].

use crate::error::{AppError, Result};
use crate::settings::{Settings, ShortcutConfig};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
pub const DEFAULT_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_PROMPT: &str =
    "Explain what is shown in these screenshots and solve the problem they contain.";

/// Which analysis backend to talk to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Built-in canned results, no network.
    #[default]
    Seeded,
    /// Canned results served by a local json-server.
    Server,
    /// Google Gemini.
    Gemini,
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "seeded" | "offline" => Ok(Self::Seeded),
            "server" | "json-server" => Ok(Self::Server),
            "gemini" => Ok(Self::Gemini),
            other => Err(AppError::config(format!(
                "unknown backend {other:?} (expected seeded, server or gemini)"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Seeded => "seeded",
            Self::Server => "server",
            Self::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub backend: BackendKind,
    pub server_url: String,
    /// json-server style `db.json` for the seeded backend.
    pub seed_file: Option<PathBuf>,
    pub gemini_api_key: Option<String>,
    pub model_name: String,
    /// Prompt used when the user leaves the description empty.
    pub default_prompt: String,
    /// Pause between lifting protection and taking the screenshot.
    pub settle_delay: Duration,
    pub capture_timeout: Duration,
    pub analysis_timeout: Duration,
    pub monitor_index: usize,
    pub restore_on_failure: bool,
    pub shortcuts: ShortcutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            seed_file: None,
            gemini_api_key: None,
            model_name: DEFAULT_MODEL.to_string(),
            default_prompt: DEFAULT_PROMPT.to_string(),
            settle_delay: Duration::from_millis(150),
            capture_timeout: Duration::from_secs(10),
            analysis_timeout: Duration::from_secs(60),
            monitor_index: 0,
            restore_on_failure: false,
            shortcuts: ShortcutConfig::default(),
        }
    }
}

impl Config {
    /// Loads settings and environment into a validated configuration,
    /// applying caller overrides (command-line flags) before validation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for unparsable values and
    /// [`AppError::MissingEnvVar`] when the Gemini backend is selected
    /// without an API key.
    pub fn load_with(overrides: impl FnOnce(&mut Self)) -> Result<Self> {
        let config = Self::read_with(overrides)?;
        config.validate()?;
        Ok(config)
    }

    /// Settings, environment and overrides without validation, for tasks
    /// such as persisting settings that do not need a usable backend.
    pub fn read_with(overrides: impl FnOnce(&mut Self)) -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        Self::resolve(Settings::load(), |key| env::var(key).ok(), overrides)
    }

    /// Layers `lookup` over `settings`, then applies `overrides`. Does not
    /// validate.
    pub fn resolve(
        settings: Settings,
        lookup: impl Fn(&str) -> Option<String>,
        overrides: impl FnOnce(&mut Self),
    ) -> Result<Self> {
        let mut config = Self::from_lookup(settings, lookup)?;
        overrides(&mut config);
        Ok(config)
    }

    /// Builds a configuration from settings and an arbitrary variable
    /// lookup. Does not validate.
    pub fn from_lookup(
        settings: Settings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self {
            restore_on_failure: settings.restore_on_failure,
            shortcuts: settings.shortcuts,
            ..Self::default()
        };

        if let Some(backend) = lookup("SHADE_SHOT_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(url) = lookup("SHADE_SHOT_SERVER_URL") {
            config.server_url = url;
        }
        config.seed_file = lookup("SHADE_SHOT_SEED_FILE").map(PathBuf::from);
        config.gemini_api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(model) = lookup("GEMINI_MODEL") {
            config.model_name = model;
        }
        if let Some(ms) = lookup("SHADE_SHOT_SETTLE_MS") {
            config.settle_delay = parse_millis("SHADE_SHOT_SETTLE_MS", &ms)?;
        }
        if let Some(ms) = lookup("SHADE_SHOT_CAPTURE_TIMEOUT_MS") {
            config.capture_timeout = parse_millis("SHADE_SHOT_CAPTURE_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("SHADE_SHOT_ANALYSIS_TIMEOUT_MS") {
            config.analysis_timeout = parse_millis("SHADE_SHOT_ANALYSIS_TIMEOUT_MS", &ms)?;
        }
        if let Some(index) = lookup("SHADE_SHOT_MONITOR") {
            config.monitor_index = index.trim().parse().map_err(|_| {
                AppError::config(format!("SHADE_SHOT_MONITOR must be a number, got {index:?}"))
            })?;
        }

        Ok(config)
    }

    /// Checks cross-field requirements.
    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Gemini && self.gemini_api_key.is_none() {
            return Err(AppError::MissingEnvVar("GEMINI_API_KEY".to_string()));
        }
        if self.capture_timeout <= self.settle_delay {
            return Err(AppError::config(
                "capture timeout must be longer than the settling delay",
            ));
        }
        Ok(())
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The settings part of this configuration, for persisting.
    pub fn settings(&self) -> Settings {
        Settings {
            shortcuts: self.shortcuts.clone(),
            restore_on_failure: self.restore_on_failure,
        }
    }
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| AppError::config(format!("{name} must be milliseconds, got {value:?}")))
}

/// Programmatic construction of a [`Config`], starting from defaults.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gemini_api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model_name = model.into();
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    pub fn with_timeouts(mut self, capture: Duration, analysis: Duration) -> Self {
        self.config.capture_timeout = capture;
        self.config.analysis_timeout = analysis;
        self
    }

    pub fn with_restore_on_failure(mut self, restore: bool) -> Self {
        self.config.restore_on_failure = restore;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_lookup(Settings::default(), lookup(&[])).unwrap();
        assert_eq!(config.backend, BackendKind::Seeded);
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.settle_delay, Duration::from_millis(150));
        config.validate().unwrap();
    }

    #[test]
    fn environment_overrides_settings() {
        let mut settings = Settings::default();
        settings.restore_on_failure = true;
        let config = Config::from_lookup(
            settings,
            lookup(&[
                ("SHADE_SHOT_BACKEND", "Server"),
                ("SHADE_SHOT_SETTLE_MS", "40"),
                ("SHADE_SHOT_MONITOR", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.backend, BackendKind::Server);
        assert_eq!(config.settle_delay, Duration::from_millis(40));
        assert_eq!(config.monitor_index, 1);
        assert!(config.restore_on_failure);
    }

    #[test]
    fn overrides_apply_before_validation() {
        let env = lookup(&[("SHADE_SHOT_BACKEND", "gemini")]);
        let config = Config::resolve(Settings::default(), env, |c| c.backend = BackendKind::Seeded)
            .unwrap();
        assert_eq!(config.backend, BackendKind::Seeded);
        config.validate().unwrap();

        let env = lookup(&[("SHADE_SHOT_BACKEND", "gemini")]);
        let config = Config::resolve(Settings::default(), env, |_| {}).unwrap();
        assert!(matches!(config.validate(), Err(AppError::MissingEnvVar(_))));
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        let err = Config::from_lookup(Settings::default(), lookup(&[("SHADE_SHOT_SETTLE_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn gemini_requires_an_api_key() {
        let err = Config::builder()
            .with_backend(BackendKind::Gemini)
            .build()
            .unwrap_err();
        assert!(matches!(err, AppError::MissingEnvVar(_)));

        Config::builder()
            .with_backend(BackendKind::Gemini)
            .with_api_key("key")
            .build()
            .unwrap();
    }

    #[test]
    fn backend_names_round_trip_through_display() {
        for kind in [BackendKind::Seeded, BackendKind::Server, BackendKind::Gemini] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
    }
}
