use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub baas: BaasConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub assistant: AssistantConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Credentials and endpoint for the hosted data service (Parse-style REST).
#[derive(Clone, Debug)]
pub struct BaasConfig {
    pub server_url: String,
    pub app_id: SecretString,
    pub api_key: SecretString,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Knobs for the conversation pipeline itself.
#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub max_history_messages: usize,
    pub max_policy_rounds: u8,
    pub max_cards: usize,
    pub default_location: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Gemini,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub baas_server_url: Option<String>,
    pub baas_app_id: Option<String>,
    pub baas_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://mabar.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            baas: BaasConfig {
                server_url: "https://parseapi.back4app.com".to_string(),
                app_id: String::new().into(),
                api_key: String::new().into(),
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Gemini,
                api_key: None,
                base_url: Some("https://generativelanguage.googleapis.com".to_string()),
                model: "gemini-2.5-flash-lite".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            assistant: AssistantConfig {
                max_history_messages: 20,
                max_policy_rounds: 3,
                max_cards: 3,
                default_location: "jakarta_area".to_string(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected gemini|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("mabar.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(baas) = patch.baas {
            if let Some(server_url) = baas.server_url {
                self.baas.server_url = server_url;
            }
            if let Some(app_id_value) = baas.app_id {
                self.baas.app_id = secret_value(app_id_value);
            }
            if let Some(api_key_value) = baas.api_key {
                self.baas.api_key = secret_value(api_key_value);
            }
            if let Some(timeout_secs) = baas.timeout_secs {
                self.baas.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(assistant) = patch.assistant {
            if let Some(max_history_messages) = assistant.max_history_messages {
                self.assistant.max_history_messages = max_history_messages;
            }
            if let Some(max_policy_rounds) = assistant.max_policy_rounds {
                self.assistant.max_policy_rounds = max_policy_rounds;
            }
            if let Some(max_cards) = assistant.max_cards {
                self.assistant.max_cards = max_cards;
            }
            if let Some(default_location) = assistant.default_location {
                self.assistant.default_location = default_location;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MABAR_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("MABAR_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("MABAR_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MABAR_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("MABAR_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MABAR_BAAS_SERVER_URL") {
            self.baas.server_url = value;
        }
        if let Some(value) = read_env("MABAR_BAAS_APP_ID") {
            self.baas.app_id = secret_value(value);
        }
        if let Some(value) = read_env("MABAR_BAAS_API_KEY") {
            self.baas.api_key = secret_value(value);
        }
        if let Some(value) = read_env("MABAR_BAAS_TIMEOUT_SECS") {
            self.baas.timeout_secs = parse_u64("MABAR_BAAS_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MABAR_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("MABAR_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MABAR_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("MABAR_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("MABAR_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("MABAR_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("MABAR_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("MABAR_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("MABAR_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("MABAR_SERVER_PORT") {
            self.server.port = parse_u16("MABAR_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("MABAR_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("MABAR_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("MABAR_ASSISTANT_MAX_HISTORY_MESSAGES") {
            self.assistant.max_history_messages =
                parse_u32("MABAR_ASSISTANT_MAX_HISTORY_MESSAGES", &value)? as usize;
        }
        if let Some(value) = read_env("MABAR_ASSISTANT_MAX_POLICY_ROUNDS") {
            self.assistant.max_policy_rounds =
                parse_u8("MABAR_ASSISTANT_MAX_POLICY_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("MABAR_ASSISTANT_MAX_CARDS") {
            self.assistant.max_cards = parse_u32("MABAR_ASSISTANT_MAX_CARDS", &value)? as usize;
        }
        if let Some(value) = read_env("MABAR_ASSISTANT_DEFAULT_LOCATION") {
            self.assistant.default_location = value;
        }

        let log_level = read_env("MABAR_LOGGING_LEVEL").or_else(|| read_env("MABAR_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("MABAR_LOGGING_FORMAT").or_else(|| read_env("MABAR_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(baas_server_url) = overrides.baas_server_url {
            self.baas.server_url = baas_server_url;
        }
        if let Some(baas_app_id) = overrides.baas_app_id {
            self.baas.app_id = secret_value(baas_app_id);
        }
        if let Some(baas_api_key) = overrides.baas_api_key {
            self.baas.api_key = secret_value(baas_api_key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_baas(&self.baas)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_assistant(&self.assistant)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("mabar.toml"), PathBuf::from("config/mabar.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_baas(baas: &BaasConfig) -> Result<(), ConfigError> {
    if !baas.server_url.starts_with("http://") && !baas.server_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "baas.server_url must start with http:// or https://".to_string(),
        ));
    }

    if baas.app_id.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "baas.app_id is required. Get it from your Back4App dashboard > App Settings > Security & Keys".to_string(),
        ));
    }

    if baas.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "baas.api_key is required. Use the REST API key from your Back4App dashboard".to_string(),
        ));
    }

    if baas.timeout_secs == 0 || baas.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "baas.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::Gemini => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the gemini provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for the ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_assistant(assistant: &AssistantConfig) -> Result<(), ConfigError> {
    if assistant.max_history_messages == 0 || assistant.max_history_messages > 200 {
        return Err(ConfigError::Validation(
            "assistant.max_history_messages must be in range 1..=200".to_string(),
        ));
    }

    if assistant.max_policy_rounds == 0 || assistant.max_policy_rounds > 10 {
        return Err(ConfigError::Validation(
            "assistant.max_policy_rounds must be in range 1..=10".to_string(),
        ));
    }

    if assistant.max_cards == 0 || assistant.max_cards > 10 {
        return Err(ConfigError::Validation(
            "assistant.max_cards must be in range 1..=10".to_string(),
        ));
    }

    if assistant.default_location.trim().is_empty() {
        return Err(ConfigError::Validation(
            "assistant.default_location must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    baas: Option<BaasPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    assistant: Option<AssistantPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BaasPatch {
    server_url: Option<String>,
    app_id: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantPatch {
    max_history_messages: Option<usize>,
    max_policy_rounds: Option<u8>,
    max_cards: Option<usize>,
    default_location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn set_required_vars() {
        env::set_var("MABAR_BAAS_APP_ID", "app-test");
        env::set_var("MABAR_BAAS_API_KEY", "rest-test");
        env::set_var("MABAR_LLM_API_KEY", "llm-test");
    }

    const REQUIRED_VARS: &[&str] =
        &["MABAR_BAAS_APP_ID", "MABAR_BAAS_API_KEY", "MABAR_LLM_API_KEY"];

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("TEST_BAAS_SERVER_URL", "https://parse.example.com");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("mabar.toml");
            fs::write(
                &path,
                r#"
[baas]
server_url = "${TEST_BAAS_SERVER_URL}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.baas.server_url == "https://parse.example.com",
                "server url should be interpolated from the environment",
            )?;
            ensure(
                config.baas.app_id.expose_secret() == "app-test",
                "required credentials still come from env overrides",
            )?;
            Ok(())
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["TEST_BAAS_SERVER_URL"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("MABAR_LOG_LEVEL", "warn");
        env::set_var("MABAR_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn log level should come from env alias")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty log format should come from env alias",
            )?;
            Ok(())
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["MABAR_LOG_LEVEL", "MABAR_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_vars();
        env::set_var("MABAR_DATABASE_URL", "sqlite://from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("mabar.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"

[assistant]
max_cards = 4
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "programmatic override should win over env and file",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.assistant.max_cards == 4, "file value should win over default")?;
            Ok(())
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["MABAR_DATABASE_URL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MABAR_BAAS_APP_ID", "app-test");
        env::set_var("MABAR_BAAS_API_KEY", "rest-test");
        // No LLM key: the default gemini provider must refuse to start.

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")
        })();

        clear_vars(REQUIRED_VARS);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MABAR_BAAS_APP_ID", "app-secret-value");
        env::set_var("MABAR_BAAS_API_KEY", "rest-secret-value");
        env::set_var("MABAR_LLM_API_KEY", "llm-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("app-secret-value"), "debug must not contain the app id")?;
            ensure(!debug.contains("rest-secret-value"), "debug must not contain the api key")?;
            ensure(!debug.contains("llm-secret-value"), "debug must not contain the llm key")?;
            Ok(())
        })();

        clear_vars(REQUIRED_VARS);
        result
    }

    #[test]
    fn ollama_provider_requires_base_url_instead_of_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("MABAR_BAAS_APP_ID", "app-test");
        env::set_var("MABAR_BAAS_API_KEY", "rest-test");
        env::set_var("MABAR_LLM_PROVIDER", "ollama");
        env::set_var("MABAR_LLM_BASE_URL", "http://localhost:11434");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.llm.api_key.is_none(),
                "ollama provider should not require an api key",
            )
        })();

        clear_vars(REQUIRED_VARS);
        clear_vars(&["MABAR_LLM_PROVIDER", "MABAR_LLM_BASE_URL"]);
        result
    }
}
