use anyhow::anyhow;
use std::{env, path::PathBuf, time::Duration};

use crate::api::AuthScheme;

pub const PRODUCTION_ORIGIN: &str = "https://celebstalks.pythonanywhere.com";
pub const DEV_PROXY_URL: &str = "http://localhost:5173/api";
pub const DEFAULT_FETCH_COOLDOWN: Duration = Duration::from_millis(500);
pub const DEFAULT_SESSION_FILE: &str = ".celebstalks-session.json";

/// Where API calls go when no explicit base URL is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiTarget {
    /// Local development proxy that forwards `/api/*` to the production origin.
    DevProxy,
    #[default]
    Production,
}

impl ApiTarget {
    pub fn base_url(self) -> &'static str {
        match self {
            ApiTarget::DevProxy => DEV_PROXY_URL,
            ApiTarget::Production => PRODUCTION_ORIGIN,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" | "dev_proxy" | "proxy" | "local" => Some(ApiTarget::DevProxy),
            "prod" | "production" => Some(ApiTarget::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_target: ApiTarget,
    pub api_base_url: Option<String>,
    pub auth_scheme: AuthScheme,
    pub fetch_cooldown: Duration,
    pub request_timeout: Option<Duration>,
    pub session_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_target: ApiTarget::default(),
            api_base_url: None,
            auth_scheme: AuthScheme::default(),
            fetch_cooldown: DEFAULT_FETCH_COOLDOWN,
            request_timeout: None,
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let api_target = match lookup("CELEBSTALKS_API_TARGET") {
            Some(raw) => ApiTarget::parse(&raw)
                .ok_or_else(|| anyhow!("Invalid CELEBSTALKS_API_TARGET value: {}", raw))?,
            None => defaults.api_target,
        };

        let api_base_url = lookup("CELEBSTALKS_API_BASE_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let auth_scheme = match lookup("CELEBSTALKS_AUTH_SCHEME") {
            Some(raw) => raw.parse::<AuthScheme>().map_err(|err| anyhow!(err))?,
            None => defaults.auth_scheme,
        };

        let fetch_cooldown = lookup("CELEBSTALKS_FETCH_COOLDOWN_MS")
            .and_then(|raw| raw.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.fetch_cooldown);

        let request_timeout = lookup("CELEBSTALKS_REQUEST_TIMEOUT_SECS")
            .and_then(|raw| raw.trim().parse().ok())
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs);

        let session_file = lookup("CELEBSTALKS_SESSION_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.session_file);

        Ok(Config {
            api_target,
            api_base_url,
            auth_scheme,
            fetch_cooldown,
            request_timeout,
            session_file,
        })
    }

    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    pub fn with_fetch_cooldown(mut self, cooldown: Duration) -> Self {
        self.fetch_cooldown = cooldown;
        self
    }

    pub fn with_auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.auth_scheme = scheme;
        self
    }

    /// Explicit override first, then the target's fixed origin.
    pub fn base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or_else(|| self.api_target.base_url())
    }
}
