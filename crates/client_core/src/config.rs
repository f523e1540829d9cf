use std::{collections::HashMap, fs, time::Duration};

use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const SETTINGS_FILE: &str = "duties.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Hold a table-wide lock across mutate + refresh so concurrent
    /// mutations cannot interleave their refreshes.
    pub serialize_mutations: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            serialize_mutations: false,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }
}

/// Defaults, then `duties.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from_sources(file.as_deref(), &env_snapshot())
}

/// Process environment, skipping entries that are not valid UTF-8.
fn env_snapshot() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

pub fn settings_from_sources(file: Option<&str>, env: &HashMap<String, String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, toml::Value>>(raw) {
            Ok(file_cfg) => {
                let file_cfg: HashMap<String, String> = file_cfg
                    .into_iter()
                    .map(|(key, value)| (key, toml_value_to_string(value)))
                    .collect();
                apply_overrides(&mut settings, &file_cfg, FILE_KEYS);
            }
            Err(error) => warn!(%error, file = SETTINGS_FILE, "ignoring unreadable settings file"),
        }
    }

    apply_overrides(&mut settings, env, ENV_KEYS);
    settings
}

struct SettingKeys {
    base_url: &'static [&'static str],
    request_timeout_secs: &'static [&'static str],
    serialize_mutations: &'static [&'static str],
}

const FILE_KEYS: SettingKeys = SettingKeys {
    base_url: &["base_url"],
    request_timeout_secs: &["request_timeout_secs"],
    serialize_mutations: &["serialize_mutations"],
};

// Later names win.
const ENV_KEYS: SettingKeys = SettingKeys {
    base_url: &["BASEURL", "APP__BASE_URL"],
    request_timeout_secs: &["APP__REQUEST_TIMEOUT_SECS"],
    serialize_mutations: &["APP__SERIALIZE_MUTATIONS"],
};

fn apply_overrides(settings: &mut Settings, source: &HashMap<String, String>, keys: SettingKeys) {
    for key in keys.base_url {
        if let Some(v) = source.get(*key) {
            settings.base_url = normalize_base_url(v);
        }
    }

    for key in keys.request_timeout_secs {
        if let Some(v) = source.get(*key) {
            match v.trim().parse::<u64>() {
                Ok(parsed) if parsed > 0 => settings.request_timeout_secs = parsed,
                _ => warn!(setting = *key, value = %v, "ignoring invalid request timeout"),
            }
        }
    }

    for key in keys.serialize_mutations {
        if let Some(v) = source.get(*key) {
            match parse_flag(v) {
                Some(flag) => settings.serialize_mutations = flag,
                None => warn!(setting = *key, value = %v, "ignoring invalid boolean flag"),
            }
        }
    }
}

fn toml_value_to_string(value: toml::Value) -> String {
    match value {
        toml::Value::String(s) => s,
        other => other.to_string(),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Settings::default().base_url;
    }
    trimmed.to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
