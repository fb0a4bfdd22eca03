use std::env;
use std::path::{Path, PathBuf};

use mabar_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let mut render = |field: &str, value: &str, env_var: Option<&str>| {
        lines.push(render_line(
            field,
            value,
            field_source(field, env_var, config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    };

    render("database.url", &config.database.url, Some("MABAR_DATABASE_URL"));
    render(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        Some("MABAR_DATABASE_MAX_CONNECTIONS"),
    );
    render(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        Some("MABAR_DATABASE_TIMEOUT_SECS"),
    );

    render("baas.server_url", &config.baas.server_url, Some("MABAR_BAAS_SERVER_URL"));
    render(
        "baas.app_id",
        &redact_secret(config.baas.app_id.expose_secret()),
        Some("MABAR_BAAS_APP_ID"),
    );
    render(
        "baas.api_key",
        &redact_secret(config.baas.api_key.expose_secret()),
        Some("MABAR_BAAS_API_KEY"),
    );

    render(
        "llm.provider",
        &format!("{:?}", config.llm.provider).to_lowercase(),
        Some("MABAR_LLM_PROVIDER"),
    );
    render("llm.model", &config.llm.model, Some("MABAR_LLM_MODEL"));
    render(
        "llm.api_key",
        &config
            .llm
            .api_key
            .as_ref()
            .map(|key| redact_secret(key.expose_secret()))
            .unwrap_or_else(|| "(unset)".to_string()),
        Some("MABAR_LLM_API_KEY"),
    );
    render(
        "llm.max_retries",
        &config.llm.max_retries.to_string(),
        Some("MABAR_LLM_MAX_RETRIES"),
    );

    render("server.bind_address", &config.server.bind_address, Some("MABAR_SERVER_BIND_ADDRESS"));
    render("server.port", &config.server.port.to_string(), Some("MABAR_SERVER_PORT"));

    render(
        "assistant.max_history_messages",
        &config.assistant.max_history_messages.to_string(),
        Some("MABAR_ASSISTANT_MAX_HISTORY_MESSAGES"),
    );
    render(
        "assistant.max_policy_rounds",
        &config.assistant.max_policy_rounds.to_string(),
        Some("MABAR_ASSISTANT_MAX_POLICY_ROUNDS"),
    );
    render(
        "assistant.max_cards",
        &config.assistant.max_cards.to_string(),
        Some("MABAR_ASSISTANT_MAX_CARDS"),
    );
    render(
        "assistant.default_location",
        &config.assistant.default_location,
        Some("MABAR_ASSISTANT_DEFAULT_LOCATION"),
    );

    render("logging.level", &config.logging.level, Some("MABAR_LOGGING_LEVEL"));
    render(
        "logging.format",
        &format!("{:?}", config.logging.format).to_lowercase(),
        Some("MABAR_LOGGING_FORMAT"),
    );

    lines.join("\n")
}

fn render_line(field: &str, value: &str, source: &'static str) -> String {
    format!("  {field} = {value}  [{source}]")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("mabar.toml"), PathBuf::from("config/mabar.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = std::fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &str,
    env_var: Option<&str>,
    config_doc: Option<&Value>,
    config_path: Option<&Path>,
) -> &'static str {
    if let Some(env_var) = env_var {
        if env::var(env_var).map(|value| !value.trim().is_empty()).unwrap_or(false) {
            return "env";
        }
    }

    if config_path.is_some() && file_has_field(config_doc, field) {
        return "file";
    }

    "default"
}

fn file_has_field(config_doc: Option<&Value>, field: &str) -> bool {
    let Some(mut current) = config_doc else {
        return false;
    };
    for segment in field.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

fn redact_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(unset)".to_string();
    }
    if secret.len() <= 4 {
        return "****".to_string();
    }
    format!("{}****", &secret[..4])
}
