use std::fs;

use toml::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub graphql_endpoint: String,
    pub bearer_token: Option<String>,
    pub default_limit: u32,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            graphql_endpoint: "http://127.0.0.1:4000/graphql".into(),
            bearer_token: None,
            default_limit: 10,
            request_timeout_secs: 30,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("admin.toml") {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<toml::Table>(raw) else {
        tracing::warn!("config: ignoring unparsable admin.toml");
        return;
    };

    if let Some(v) = file_cfg.get("graphql_endpoint").and_then(Value::as_str) {
        settings.graphql_endpoint = v.to_string();
    }
    if let Some(v) = file_cfg.get("bearer_token").and_then(Value::as_str) {
        settings.bearer_token = Some(v.to_string());
    }
    if let Some(v) = file_cfg.get("default_limit").and_then(as_number) {
        if let Ok(limit) = u32::try_from(v) {
            settings.default_limit = limit;
        }
    }
    if let Some(v) = file_cfg.get("request_timeout_secs").and_then(as_number) {
        if let Ok(secs) = u64::try_from(v) {
            settings.request_timeout_secs = secs;
        }
    }
}

fn as_number(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(v) => Some(*v),
        Value::String(v) => v.trim().parse().ok(),
        _ => None,
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("ADMIN_GRAPHQL_ENDPOINT") {
        settings.graphql_endpoint = v;
    }
    if let Some(v) = var("APP__GRAPHQL_ENDPOINT") {
        settings.graphql_endpoint = v;
    }

    if let Some(v) = var("ADMIN_TOKEN") {
        settings.bearer_token = Some(v);
    }
    if let Some(v) = var("APP__BEARER_TOKEN") {
        settings.bearer_token = Some(v);
    }

    if let Some(v) = var("APP__DEFAULT_LIMIT") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.default_limit = parsed;
        }
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
}
