use std::{fs, path::Path, time::Duration};

use shared::domain::{Role, UrlPolicy};
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "direct_live.toml";

const KEYS: &[&str] = &[
    "publish_url",
    "role",
    "allowed_schemes",
    "connect_timeout_ms",
    "loopback_latency_ms",
    "loopback_fail_reason",
    "teardown_grace_ms",
    "log_filter",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub publish_url: Option<String>,
    pub role: Option<Role>,
    pub allowed_schemes: Vec<String>,
    pub connect_timeout_ms: u64,
    pub loopback_latency_ms: u64,
    pub loopback_fail_reason: Option<String>,
    pub teardown_grace_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            publish_url: None,
            role: None,
            allowed_schemes: UrlPolicy::default().allowed_schemes().to_vec(),
            connect_timeout_ms: 10_000,
            loopback_latency_ms: 400,
            loopback_fail_reason: None,
            teardown_grace_ms: 2_000,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn url_policy(&self) -> UrlPolicy {
        UrlPolicy::new(self.allowed_schemes.iter().cloned())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn loopback_latency(&self) -> Duration {
        Duration::from_millis(self.loopback_latency_ms)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

/// Defaults, then the TOML file if it exists, then `DIRECT_LIVE_*` and
/// `APP__*` environment variables.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

pub(crate) fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let table = match raw.parse::<toml::Table>() {
        Ok(table) => table,
        Err(err) => {
            warn!("config: ignoring unreadable settings file: {err}");
            return;
        }
    };

    for key in KEYS {
        let value = match table.get(*key) {
            Some(toml::Value::String(v)) => v.clone(),
            Some(toml::Value::Integer(v)) => v.to_string(),
            Some(toml::Value::Array(items)) => items
                .iter()
                .filter_map(toml::Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
            Some(other) => {
                warn!("config: unsupported value for {key}: {other}");
                continue;
            }
            None => continue,
        };
        apply_value(settings, key, &value);
    }
}

pub(crate) fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for key in KEYS {
        let upper = key.to_ascii_uppercase();
        if let Some(v) = lookup(&format!("DIRECT_LIVE_{upper}")) {
            apply_value(settings, key, &v);
        }
        if let Some(v) = lookup(&format!("APP__{upper}")) {
            apply_value(settings, key, &v);
        }
    }
}

fn apply_value(settings: &mut Settings, key: &str, value: &str) {
    let value = value.trim();
    match key {
        "publish_url" => settings.publish_url = non_empty(value),
        "role" => match value.parse::<Role>() {
            Ok(role) => settings.role = Some(role),
            Err(err) => warn!("config: {err}"),
        },
        "allowed_schemes" => {
            let schemes = value
                .split(',')
                .map(str::trim)
                .filter(|scheme| !scheme.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();
            if !schemes.is_empty() {
                settings.allowed_schemes = schemes;
            }
        }
        "connect_timeout_ms" => set_millis(&mut settings.connect_timeout_ms, key, value),
        "loopback_latency_ms" => set_millis(&mut settings.loopback_latency_ms, key, value),
        "teardown_grace_ms" => set_millis(&mut settings.teardown_grace_ms, key, value),
        "loopback_fail_reason" => settings.loopback_fail_reason = non_empty(value),
        "log_filter" => {
            if !value.is_empty() {
                settings.log_filter = value.to_string();
            }
        }
        _ => {}
    }
}

fn set_millis(slot: &mut u64, key: &str, value: &str) {
    match value.parse::<u64>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!("config: ignoring non-numeric {key}={value}"),
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
