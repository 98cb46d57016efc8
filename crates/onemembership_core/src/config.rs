//! JSON configuration loaded from a config directory.
//!
//! # Layout
//! - `config.server.json`: storage, domains, ports and log files.
//! - `accounts/account.api.telebirr.json`: Telebirr merchant account.
//! - `keys/public.telebirr.pem`: Telebirr RSA public key.
//! - `config.onemembership.json`: chat-bot credentials.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

pub const SERVER_CONFIG_FILE: &str = "config.server.json";
pub const TELEBIRR_ACCOUNT_FILE: &str = "accounts/account.api.telebirr.json";
pub const TELEBIRR_PUBLIC_KEY_FILE: &str = "keys/public.telebirr.pem";
pub const BOT_CONFIG_FILE: &str = "config.onemembership.json";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, message: String },
    Missing(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "read {}: {source}", path.display()),
            Self::Parse { path, message } => write!(f, "parse {}: {message}", path.display()),
            Self::Missing(field) => write!(f, "missing required config field `{field}`"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { .. } | Self::Missing(_) => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Server-wide settings from `config.server.json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub database_path: String,
    pub cookie_name: String,
    pub secret_key: String,
    pub super_admin_email: String,
    pub http_domain_address: String,
    pub bot_domain_address: String,
    pub bot_client_server_port: String,
    pub http_client_server_port: String,
    pub logs_path: String,
    pub archives_path: String,
    /// Channel name to log file basename.
    pub logs: BTreeMap<String, String>,
}

/// Telebirr merchant account.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TelebirrAccount {
    pub api_access_point: String,
    pub app_id: String,
    pub app_key: String,
    pub notify_url: String,
    pub return_url: String,
    pub short_code: String,
    pub transaction_fee: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawBotConfig {
    api_access_point: String,
    sp_bot_api_token: String,
    sp_bot_username: String,
    sp_bot_id: String,
}

/// Chat-bot credentials from `config.onemembership.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub api_access_point: String,
    pub sp_bot_api_token: String,
    pub sp_bot_username: String,
    pub sp_bot_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub system: SystemConfig,
    pub telebirr: TelebirrAccount,
    /// PEM text of the Telebirr public key.
    pub telebirr_public_key: String,
    pub bot: BotConfig,
}

/// Loads every config file under `dir`.
pub fn load_config_dir(dir: impl AsRef<Path>) -> ConfigResult<AppConfig> {
    let dir = dir.as_ref();
    let system = parse_system_config(&dir.join(SERVER_CONFIG_FILE))?;
    let telebirr = parse_telebirr_account(&dir.join(TELEBIRR_ACCOUNT_FILE))?;
    let key_path = dir.join(TELEBIRR_PUBLIC_KEY_FILE);
    let telebirr_public_key = read_file(&key_path)?;
    if telebirr_public_key.trim().is_empty() {
        return Err(ConfigError::Missing("telebirr_public_key"));
    }
    let bot = parse_bot_config(&dir.join(BOT_CONFIG_FILE))?;
    Ok(AppConfig {
        system,
        telebirr,
        telebirr_public_key,
        bot,
    })
}

pub fn parse_system_config(path: &Path) -> ConfigResult<SystemConfig> {
    let config: SystemConfig = read_json(path)?;
    require("database_path", &config.database_path)?;
    require("logs_path", &config.logs_path)?;
    require("archives_path", &config.archives_path)?;
    Ok(config)
}

pub fn parse_telebirr_account(path: &Path) -> ConfigResult<TelebirrAccount> {
    let account: TelebirrAccount = read_json(path)?;
    require("api_access_point", &account.api_access_point)?;
    require("app_id", &account.app_id)?;
    require("app_key", &account.app_key)?;
    require("short_code", &account.short_code)?;
    Ok(account)
}

pub fn parse_bot_config(path: &Path) -> ConfigResult<BotConfig> {
    let raw: RawBotConfig = read_json(path)?;
    require("api_access_point", &raw.api_access_point)?;
    require("sp_bot_api_token", &raw.sp_bot_api_token)?;
    require("sp_bot_id", &raw.sp_bot_id)?;
    let sp_bot_id = raw
        .sp_bot_id
        .trim()
        .parse::<i64>()
        .map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: format!("sp_bot_id: {err}"),
        })?;
    Ok(BotConfig {
        api_access_point: raw.api_access_point,
        sp_bot_api_token: raw.sp_bot_api_token,
        sp_bot_username: raw.sp_bot_username,
        sp_bot_id,
    })
}

fn read_file(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> ConfigResult<T> {
    let text = read_file(path)?;
    serde_json::from_str(&text).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn require(field: &'static str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_config_dir, ConfigError};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn seed(dir: &Path, bot_id: &str) {
        write(
            dir,
            "config.server.json",
            r#"{
                "database_path": "/var/lib/onemembership/db.sqlite",
                "http_domain_address": "https://example.test",
                "logs_path": "/var/log/onemembership",
                "archives_path": "/var/log/onemembership/archives",
                "logs": {"user": "user.log", "error": "error.log"}
            }"#,
        );
        write(
            dir,
            "accounts/account.api.telebirr.json",
            r#"{
                "api_access_point": "https://pay.example.test/service-openup/",
                "app_id": "app-1",
                "app_key": "key-1",
                "short_code": "500100",
                "transaction_fee": 1.5
            }"#,
        );
        write(
            dir,
            "keys/public.telebirr.pem",
            "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n",
        );
        write(
            dir,
            "config.onemembership.json",
            &format!(
                r#"{{"api_access_point": "https://bot.example.test/", "sp_bot_api_token": "t", "sp_bot_username": "om_bot", "sp_bot_id": "{bot_id}"}}"#
            ),
        );
    }

    #[test]
    fn loads_full_config_dir() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), "123456");

        let config = load_config_dir(dir.path()).unwrap();
        assert_eq!(config.system.database_path, "/var/lib/onemembership/db.sqlite");
        assert_eq!(config.system.logs.get("user").map(String::as_str), Some("user.log"));
        assert_eq!(config.telebirr.transaction_fee, 1.5);
        assert!(config.telebirr.notify_url.is_empty());
        assert!(config.telebirr_public_key.contains("BEGIN PUBLIC KEY"));
        assert_eq!(config.bot.sp_bot_id, 123456);
    }

    #[test]
    fn malformed_bot_id_is_parse_error() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), "not-a-number");

        let err = load_config_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_required_field_is_reported_by_name() {
        let dir = TempDir::new().unwrap();
        seed(dir.path(), "1");
        write(dir.path(), "config.server.json", r#"{"logs_path": "/tmp/logs"}"#);

        let err = load_config_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("database_path")));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_config_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
