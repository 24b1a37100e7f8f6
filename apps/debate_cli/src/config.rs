use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use url::Url;

pub const SETTINGS_FILE: &str = "debate.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub access_token: Option<String>,
    pub author: String,
    pub request_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            access_token: None,
            author: "user".into(),
            request_timeout_seconds: 120,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file, then environment variables.
fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<toml::Table>(&raw) {
            if let Some(v) = file_cfg.get("api_url").and_then(toml::Value::as_str) {
                settings.api_url = v.to_string();
            }
            if let Some(v) = file_cfg.get("access_token").and_then(toml::Value::as_str) {
                settings.access_token = Some(v.to_string());
            }
            if let Some(v) = file_cfg.get("author").and_then(toml::Value::as_str) {
                settings.author = v.to_string();
            }
            if let Some(v) = file_cfg
                .get("request_timeout_seconds")
                .and_then(toml::Value::as_integer)
                .and_then(|v| u64::try_from(v).ok())
            {
                settings.request_timeout_seconds = v;
            }
        }
    }

    if let Some(v) = env("DEBATE_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = env("DEBATE_ACCESS_TOKEN") {
        settings.access_token = Some(v);
    }
    if let Some(v) = env("APP__ACCESS_TOKEN") {
        settings.access_token = Some(v);
    }

    if let Some(v) = env("DEBATE_AUTHOR") {
        settings.author = v;
    }
    if let Some(v) = env("APP__AUTHOR") {
        settings.author = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_seconds = parsed;
        }
    }

    settings.access_token = settings
        .access_token
        .filter(|token| !token.trim().is_empty());
    settings
}

/// Normalizes the backend URL: assumes `http://` when no scheme is given and
/// drops trailing slashes.
pub fn prepare_api_url(raw_api_url: &str) -> anyhow::Result<String> {
    let raw_api_url = raw_api_url.trim();
    if raw_api_url.is_empty() {
        return Ok(Settings::default().api_url);
    }

    let with_scheme = if raw_api_url.contains("://") {
        raw_api_url.to_string()
    } else {
        format!("http://{raw_api_url}")
    };
    let url = Url::parse(&with_scheme)
        .with_context(|| format!("invalid api url '{raw_api_url}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("api url '{raw_api_url}' must use http or https");
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn temp_settings_file(contents: &str) -> std::path::PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("debate_cli_settings_{suffix}.toml"));
        fs::write(&path, contents).expect("write settings");
        path
    }

    #[test]
    fn missing_file_and_env_yield_defaults() {
        let settings =
            load_settings_from(Path::new("/nonexistent/debate.toml"), |_| None);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn environment_overrides_file() {
        let path = temp_settings_file(
            r#"
api_url = "http://file-host:9000"
author = "file-author"
request_timeout_seconds = 30
"#,
        );
        let vars = HashMap::from([
            ("APP__API_URL", "http://env-host:8000"),
            ("DEBATE_ACCESS_TOKEN", "tok-env"),
        ]);

        let settings = load_settings_from(&path, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.api_url, "http://env-host:8000");
        assert_eq!(settings.author, "file-author");
        assert_eq!(settings.access_token.as_deref(), Some("tok-env"));
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn blank_token_means_anonymous() {
        let settings = load_settings_from(Path::new("/nonexistent/debate.toml"), |key| {
            (key == "APP__ACCESS_TOKEN").then(|| "  ".to_string())
        });
        assert_eq!(settings.access_token, None);
    }

    #[test]
    fn api_url_is_normalized() {
        assert_eq!(
            prepare_api_url("localhost:8000/").expect("url"),
            "http://localhost:8000"
        );
        assert_eq!(
            prepare_api_url("https://debate.example.org/backend/").expect("url"),
            "https://debate.example.org/backend"
        );
        assert_eq!(prepare_api_url("  ").expect("url"), "http://localhost:8000");
        assert!(prepare_api_url("ftp://debate.example.org").is_err());
    }
}
