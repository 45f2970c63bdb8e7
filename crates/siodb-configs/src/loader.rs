//! Configuration file loading.
//!
//! The instance configuration file is TOML with flat top-level options and
//! `[iomgr]`, `[encryption]`, `[client]` and `[log.<channel>]` sections.
//! Environment variables override file values, and the assembled option
//! set is validated before it is returned.

use crate::defaults;
use crate::error::{ConfigError, Result};
use crate::paths::{instance_config_file_path, validate_instance_name};
use crate::types::{
    ClientOptions, EncryptionOptions, GeneralOptions, InstanceOptions, IoManagerOptions,
    LogChannelOptions, LogChannelType, LogOptions, LogSeverity,
};
use crate::units::{parse_duration_option, parse_size_option};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Parses a yes/no/true/false option value, case-insensitively.
pub fn parse_bool_option(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    ipv4_port: Option<u16>,
    ipv6_port: Option<u16>,
    data_dir: Option<String>,
    admin_connection_listener_backlog: Option<u32>,
    max_admin_connections: Option<u32>,
    user_connection_listener_backlog: Option<u32>,
    max_user_connections: Option<u32>,
    log_channels: Option<String>,
    log: BTreeMap<String, RawLogChannel>,
    iomgr: RawIoManager,
    encryption: RawEncryption,
    client: RawClient,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawLogChannel {
    #[serde(rename = "type")]
    channel_type: Option<String>,
    destination: Option<String>,
    max_file_size: Option<String>,
    max_files: Option<u64>,
    exp_time: Option<String>,
    severity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIoManager {
    ipv4_port: Option<u16>,
    ipv6_port: Option<u16>,
    worker_thread_number: Option<u32>,
    writer_thread_number: Option<u32>,
    block_cache_capacity: Option<usize>,
    user_cache_capacity: Option<usize>,
    database_cache_capacity: Option<usize>,
    table_cache_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEncryption {
    default_cipher_id: Option<String>,
    system_db_cipher_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawClient {
    enable_encryption: Option<String>,
    tls_certificate: Option<String>,
    tls_certificate_chain: Option<String>,
    tls_private_key: Option<String>,
}

impl InstanceOptions {
    /// Loads and validates options of the named instance from its
    /// configuration file under `/etc/siodb/instances`.
    pub fn load(instance_name: &str) -> Result<Self> {
        validate_instance_name(instance_name)?;
        let path = instance_config_file_path(instance_name);
        Self::from_file(instance_name, &path)
    }

    /// Loads and validates options from an explicit configuration file.
    pub fn from_file<P: AsRef<Path>>(instance_name: &str, path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(instance_name, &content)
    }

    /// Parses, applies environment overrides, and validates options from
    /// configuration file content.
    pub fn from_toml_str(instance_name: &str, content: &str) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut options = build_options(instance_name, raw)?;
        apply_env_overrides(&mut options)?;
        options.validate()?;
        Ok(options)
    }
}

fn build_options(instance_name: &str, raw: RawConfig) -> Result<InstanceOptions> {
    let data_dir = raw
        .data_dir
        .unwrap_or_default()
        .trim()
        .trim_end_matches('/')
        .to_string();

    let general = GeneralOptions {
        name: instance_name.to_string(),
        data_dir,
        ipv4_port: raw.ipv4_port.unwrap_or(defaults::DEFAULT_IPV4_PORT),
        ipv6_port: raw.ipv6_port.unwrap_or(defaults::DEFAULT_IPV6_PORT),
        admin_connection_listener_backlog: raw
            .admin_connection_listener_backlog
            .unwrap_or(defaults::DEFAULT_ADMIN_CONNECTION_LISTENER_BACKLOG),
        max_admin_connections: raw
            .max_admin_connections
            .unwrap_or(defaults::DEFAULT_MAX_ADMIN_CONNECTIONS),
        user_connection_listener_backlog: raw
            .user_connection_listener_backlog
            .unwrap_or(defaults::DEFAULT_USER_CONNECTION_LISTENER_BACKLOG),
        max_user_connections: raw
            .max_user_connections
            .unwrap_or(defaults::DEFAULT_MAX_USER_CONNECTIONS),
    };

    let log = build_log_options(raw.log_channels.as_deref(), &raw.log)?;

    let iomgr = IoManagerOptions {
        ipv4_port: raw
            .iomgr
            .ipv4_port
            .unwrap_or(defaults::DEFAULT_IOMGR_IPV4_PORT),
        ipv6_port: raw
            .iomgr
            .ipv6_port
            .unwrap_or(defaults::DEFAULT_IOMGR_IPV6_PORT),
        worker_thread_number: raw
            .iomgr
            .worker_thread_number
            .unwrap_or(defaults::DEFAULT_IOMGR_WORKER_THREAD_NUMBER),
        writer_thread_number: raw
            .iomgr
            .writer_thread_number
            .unwrap_or(defaults::DEFAULT_IOMGR_WRITER_THREAD_NUMBER),
        block_cache_capacity: raw
            .iomgr
            .block_cache_capacity
            .unwrap_or(defaults::DEFAULT_IOMGR_BLOCK_CACHE_CAPACITY),
        user_cache_capacity: raw
            .iomgr
            .user_cache_capacity
            .unwrap_or(defaults::DEFAULT_IOMGR_USER_CACHE_CAPACITY),
        database_cache_capacity: raw
            .iomgr
            .database_cache_capacity
            .unwrap_or(defaults::DEFAULT_IOMGR_DATABASE_CACHE_CAPACITY),
        table_cache_capacity: raw
            .iomgr
            .table_cache_capacity
            .unwrap_or(defaults::DEFAULT_IOMGR_TABLE_CACHE_CAPACITY),
    };

    let default_cipher_id = raw
        .encryption
        .default_cipher_id
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| defaults::DEFAULT_CIPHER_ID.to_string());
    let system_db_cipher_id = raw
        .encryption
        .system_db_cipher_id
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| default_cipher_id.clone());
    let encryption = EncryptionOptions {
        default_cipher_id,
        system_db_cipher_id,
    };

    let enable_encryption = match raw.client.enable_encryption {
        Some(value) => parse_bool_option(&value).ok_or_else(|| {
            ConfigError::invalid_option(format!(
                "client.enable_encryption: invalid boolean value '{}'",
                value
            ))
        })?,
        None => defaults::DEFAULT_CLIENT_ENABLE_ENCRYPTION,
    };
    let client = ClientOptions {
        enable_encryption,
        tls_certificate: raw
            .client
            .tls_certificate
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        tls_certificate_chain: raw
            .client
            .tls_certificate_chain
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        tls_private_key: raw
            .client
            .tls_private_key
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    };

    Ok(InstanceOptions {
        general,
        log,
        iomgr,
        encryption,
        client,
    })
}

fn build_log_options(
    log_channels: Option<&str>,
    channels: &BTreeMap<String, RawLogChannel>,
) -> Result<LogOptions> {
    let names: Vec<String> = match log_channels {
        Some(value) => value.split(',').map(|s| s.trim().to_string()).collect(),
        // Without an explicit channel list, a console channel is implied.
        None => vec!["console".to_string()],
    };

    let mut known = std::collections::HashSet::new();
    for name in &names {
        if name.is_empty() {
            return Err(ConfigError::invalid_option(
                "Empty log channel name detected",
            ));
        }
        if !known.insert(name.as_str()) {
            return Err(ConfigError::invalid_option(format!(
                "Duplicate log channel name {}",
                name
            )));
        }
    }

    let mut result = Vec::with_capacity(names.len());
    for name in &names {
        let raw = channels.get(name).cloned().unwrap_or_default();
        let channel_type = match raw.channel_type.as_deref() {
            Some("console") => LogChannelType::Console,
            Some("file") => LogChannelType::File,
            Some(other) => {
                return Err(ConfigError::invalid_option(format!(
                    "Unsupported channel type '{}' specified for the log channel {}",
                    other, name
                )));
            }
            None if name == "console" => LogChannelType::Console,
            None => {
                return Err(ConfigError::invalid_option(format!(
                    "Type not defined for the log channel {}",
                    name
                )));
            }
        };

        let destination = match raw.destination {
            Some(d) if !d.trim().is_empty() => d.trim().to_string(),
            _ if channel_type == LogChannelType::Console => "stdout".to_string(),
            _ => {
                return Err(ConfigError::invalid_option(format!(
                    "Destination not defined for the log channel {}",
                    name
                )));
            }
        };

        let max_file_size = match raw.max_file_size {
            Some(value) => parse_size_option(&value).map_err(|e| {
                ConfigError::invalid_option(format!(
                    "Invalid value of max. file size for the log channel {}: {}",
                    name, e
                ))
            })?,
            None => defaults::DEFAULT_MAX_LOG_FILE_SIZE,
        };

        let max_files = raw.max_files.unwrap_or(defaults::DEFAULT_MAX_LOG_FILES);
        if max_files == 0 {
            return Err(ConfigError::invalid_option(format!(
                "Invalid value of max. number of log files for the log channel {}: value is zero",
                name
            )));
        }

        let expiration_timeout = match raw.exp_time {
            Some(value) => parse_duration_option(&value).map_err(|e| {
                ConfigError::invalid_option(format!(
                    "Invalid value of expiration time for the log channel {}: {}",
                    name, e
                ))
            })?,
            None => defaults::DEFAULT_LOG_FILE_EXPIRATION_TIMEOUT,
        };

        let severity = match raw.severity {
            Some(value) => LogSeverity::parse(value.trim()).ok_or_else(|| {
                ConfigError::invalid_option(format!(
                    "Invalid log severity level for the log channel {}",
                    name
                ))
            })?,
            None => LogSeverity::Info,
        };

        result.push(LogChannelOptions {
            name: name.clone(),
            channel_type,
            destination,
            max_file_size,
            max_files,
            expiration_timeout,
            severity,
        });
    }

    Ok(LogOptions { channels: result })
}

/// Environment variable overrides, applied after file parsing.
///
/// Supported variables: `SIODB_DATA_DIR`, `SIODB_IPV4_PORT`,
/// `SIODB_IPV6_PORT`, `SIODB_IOMGR_IPV4_PORT`, `SIODB_IOMGR_IPV6_PORT`.
fn apply_env_overrides(options: &mut InstanceOptions) -> Result<()> {
    if let Ok(value) = std::env::var("SIODB_DATA_DIR") {
        options.general.data_dir = value.trim_end_matches('/').to_string();
    }
    if let Ok(value) = std::env::var("SIODB_IPV4_PORT") {
        options.general.ipv4_port = parse_env_port("SIODB_IPV4_PORT", &value)?;
    }
    if let Ok(value) = std::env::var("SIODB_IPV6_PORT") {
        options.general.ipv6_port = parse_env_port("SIODB_IPV6_PORT", &value)?;
    }
    if let Ok(value) = std::env::var("SIODB_IOMGR_IPV4_PORT") {
        options.iomgr.ipv4_port = parse_env_port("SIODB_IOMGR_IPV4_PORT", &value)?;
    }
    if let Ok(value) = std::env::var("SIODB_IOMGR_IPV6_PORT") {
        options.iomgr.ipv6_port = parse_env_port("SIODB_IOMGR_IPV6_PORT", &value)?;
    }
    Ok(())
}

fn parse_env_port(variable: &str, value: &str) -> Result<u16> {
    value.parse().map_err(|_| {
        ConfigError::invalid_option(format!("Invalid {} value: {}", variable, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
ipv4_port = 50000
ipv6_port = 0
data_dir = "/var/lib/siodb/siodb000/data/"
max_user_connections = 10
log_channels = "console, file"

[log.console]
type = "console"
destination = "stdout"
severity = "info"

[log.file]
type = "file"
destination = "/var/log/siodb/siodb000"
max_file_size = "10m"
max_files = 5
exp_time = "1d"
severity = "debug"

[iomgr]
ipv4_port = 50001
worker_thread_number = 2
writer_thread_number = 2

[encryption]
default_cipher_id = "aes128"

[client]
enable_encryption = "no"
"#;

    #[test]
    fn test_load_sample_config() {
        let options = InstanceOptions::from_toml_str("siodb000", SAMPLE).unwrap();
        assert_eq!(options.general.name, "siodb000");
        assert_eq!(options.general.ipv4_port, 50000);
        // Trailing slash is trimmed.
        assert_eq!(options.general.data_dir, "/var/lib/siodb/siodb000/data");
        assert_eq!(options.general.max_user_connections, 10);
        assert_eq!(options.iomgr.ipv4_port, 50001);
        assert_eq!(options.encryption.default_cipher_id, "aes128");
        // System database cipher defaults to the general default cipher.
        assert_eq!(options.encryption.system_db_cipher_id, "aes128");
        assert!(!options.client.enable_encryption);
        assert_eq!(options.log.channels.len(), 2);
        let file_channel = &options.log.channels[1];
        assert_eq!(file_channel.name, "file");
        assert_eq!(file_channel.channel_type, LogChannelType::File);
        assert_eq!(file_channel.max_file_size, 10 * 1024 * 1024);
        assert_eq!(file_channel.max_files, 5);
        assert_eq!(file_channel.expiration_timeout, 86400);
        assert_eq!(file_channel.severity, LogSeverity::Debug);
    }

    #[test]
    fn test_port_collision_detected() {
        let content = r#"
ipv4_port = 50000
data_dir = "/data"

[iomgr]
ipv4_port = 50000
"#;
        let err = InstanceOptions::from_toml_str("t", content).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption(_)));
        assert!(err.to_string().contains("same IPv4 port number"));
    }

    #[test]
    fn test_missing_data_dir_rejected() {
        let err = InstanceOptions::from_toml_str("t", "ipv4_port = 50000").unwrap_err();
        assert!(err.to_string().contains("Data directory"));
    }

    #[test]
    fn test_duplicate_log_channel_names_rejected() {
        let content = r#"
data_dir = "/data"
log_channels = "console, console"

[log.console]
type = "console"
"#;
        let err = InstanceOptions::from_toml_str("t", content).unwrap_err();
        assert!(err.to_string().contains("Duplicate log channel name"));
    }

    #[test]
    fn test_file_channel_requires_destination() {
        let content = r#"
data_dir = "/data"
log_channels = "main"

[log.main]
type = "file"
"#;
        let err = InstanceOptions::from_toml_str("t", content).unwrap_err();
        assert!(err.to_string().contains("Destination not defined"));
    }

    #[test]
    fn test_invalid_enable_encryption_value_rejected() {
        let content = r#"
data_dir = "/data"

[client]
enable_encryption = "maybe"
"#;
        let err = InstanceOptions::from_toml_str("t", content).unwrap_err();
        assert!(err.to_string().contains("client.enable_encryption"));
    }

    #[test]
    fn test_enable_encryption_accepts_yes_no_true_false() {
        assert_eq!(parse_bool_option("Yes"), Some(true));
        assert_eq!(parse_bool_option("TRUE"), Some(true));
        assert_eq!(parse_bool_option("no"), Some(false));
        assert_eq!(parse_bool_option("False"), Some(false));
        assert_eq!(parse_bool_option("1"), None);
    }

    #[test]
    fn test_invalid_toml_reported_as_parse_error() {
        let err = InstanceOptions::from_toml_str("t", "not == toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, SAMPLE).unwrap();
        let options = InstanceOptions::from_file("siodb000", &path).unwrap();
        assert_eq!(options.general.ipv4_port, 50000);

        let err = InstanceOptions::from_file("siodb000", dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }

    #[test]
    fn test_unknown_cipher_passes_load_but_named_in_options() {
        // Cipher resolution happens in the engine; the loader only keeps
        // the id. Unknown ids travel through so the engine can report them
        // with the right error code.
        let content = r#"
data_dir = "/data"

[encryption]
default_cipher_id = "rot13"
"#;
        let options = InstanceOptions::from_toml_str("t", content).unwrap();
        assert_eq!(options.encryption.default_cipher_id, "rot13");
    }
}
