use std::path::PathBuf;
use std::time::Duration;

use jobscout_core::error::AppError;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_USER_DATA_DIR: &str = "./.chrome-profile";

/// Backend gateway connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Load from `API_BASE_URL` and `API_KEY`.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let api_key = lookup("API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AppError::ConfigError("API_KEY not set. Required for backend access.".into())
            })?;

        let base_url = lookup("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.into());
        url::Url::parse(&base_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid API_BASE_URL '{base_url}': {e}"))
        })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(30),
        })
    }
}

/// Site login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Load from `LINKEDIN_EMAIL` and `LINKEDIN_PASSWORD`.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let required = |key: &str| {
            lookup(key).filter(|v| !v.is_empty()).ok_or_else(|| {
                AppError::ConfigError(format!("{key} not set. Required to log in."))
            })
        };
        Ok(Self {
            email: required("LINKEDIN_EMAIL")?,
            password: required("LINKEDIN_PASSWORD")?,
        })
    }
}

/// How the browser process is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    pub headless: bool,
    /// Explicit browser binary; auto-detected when `None`.
    pub executable_path: Option<PathBuf>,
    /// Persistent profile directory, so the login session survives runs.
    pub user_data_dir: PathBuf,
    pub disable_gpu: bool,
    pub no_sandbox: bool,
    pub disable_images: bool,
    pub disable_extensions: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable_path: None,
            user_data_dir: PathBuf::from(DEFAULT_USER_DATA_DIR),
            disable_gpu: true,
            no_sandbox: true,
            disable_images: true,
            disable_extensions: true,
        }
    }
}

impl BrowserSettings {
    /// Load from `HEADLESS`, `CHROME_BIN` and `CHROME_USER_DATA_DIR`.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut settings = Self::default();
        if let Some(raw) = lookup("HEADLESS") {
            settings.headless = parse_bool("HEADLESS", &raw)?;
        }
        settings.executable_path = lookup("CHROME_BIN")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        if let Some(dir) = lookup("CHROME_USER_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            settings.user_data_dir = PathBuf::from(dir);
        }
        Ok(settings)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::ConfigError(format!(
            "Invalid {key} '{raw}': expected true or false"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn gateway_requires_api_key() {
        assert!(matches!(
            GatewayConfig::from_lookup(env(&[])),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn gateway_defaults_and_trims_base_url() {
        let cfg = GatewayConfig::from_lookup(env(&[("API_KEY", "k")])).unwrap();
        assert_eq!(cfg.base_url, "http://localhost:8080/api");
        assert_eq!(cfg.timeout, Duration::from_secs(30));

        let cfg = GatewayConfig::from_lookup(env(&[
            ("API_KEY", "k"),
            ("API_BASE_URL", "https://jobs.internal/api/"),
        ]))
        .unwrap();
        assert_eq!(cfg.base_url, "https://jobs.internal/api");
    }

    #[test]
    fn gateway_rejects_bad_url() {
        assert!(
            GatewayConfig::from_lookup(env(&[("API_KEY", "k"), ("API_BASE_URL", "not a url")]))
                .is_err()
        );
    }

    #[test]
    fn credentials_are_required_and_redacted() {
        assert!(Credentials::from_lookup(env(&[("LINKEDIN_EMAIL", "a@b.c")])).is_err());
        let creds = Credentials::from_lookup(env(&[
            ("LINKEDIN_EMAIL", "a@b.c"),
            ("LINKEDIN_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn browser_settings_from_lookup() {
        let settings = BrowserSettings::from_lookup(env(&[])).unwrap();
        assert_eq!(settings, BrowserSettings::default());

        let settings = BrowserSettings::from_lookup(env(&[
            ("HEADLESS", "false"),
            ("CHROME_BIN", "/opt/chrome/chrome"),
            ("CHROME_USER_DATA_DIR", "/tmp/profile"),
        ]))
        .unwrap();
        assert!(!settings.headless);
        assert_eq!(settings.executable_path, Some(PathBuf::from("/opt/chrome/chrome")));
        assert_eq!(settings.user_data_dir, PathBuf::from("/tmp/profile"));

        assert!(BrowserSettings::from_lookup(env(&[("HEADLESS", "maybe")])).is_err());
    }
}
