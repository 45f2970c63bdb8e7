//! Validated instance option types.

use crate::defaults;
use crate::error::{ConfigError, Result};
use siodb_commons::constants::{MAX_PORT_NUMBER, MIN_PORT_NUMBER};
use std::fmt;

/// Log channel kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChannelType {
    Console,
    File,
}

/// Log severity level of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogSeverity {
    /// Parses a severity name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "trace" => Some(LogSeverity::Trace),
            "debug" => Some(LogSeverity::Debug),
            "info" => Some(LogSeverity::Info),
            "warning" => Some(LogSeverity::Warning),
            "error" => Some(LogSeverity::Error),
            "fatal" => Some(LogSeverity::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogSeverity::Trace => "trace",
            LogSeverity::Debug => "debug",
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
            LogSeverity::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Options of a single log channel.
#[derive(Debug, Clone)]
pub struct LogChannelOptions {
    pub name: String,
    pub channel_type: LogChannelType,
    pub destination: String,
    pub max_file_size: u64,
    pub max_files: u64,
    /// Log file expiration timeout, in seconds.
    pub expiration_timeout: u64,
    pub severity: LogSeverity,
}

/// Logging options.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub channels: Vec<LogChannelOptions>,
}

/// General instance options.
#[derive(Debug, Clone)]
pub struct GeneralOptions {
    /// Instance name.
    pub name: String,
    /// Instance data directory, without a trailing slash.
    pub data_dir: String,
    /// Server IPv4 listener port, 0 disables.
    pub ipv4_port: u16,
    /// Server IPv6 listener port, 0 disables.
    pub ipv6_port: u16,
    pub admin_connection_listener_backlog: u32,
    pub max_admin_connections: u32,
    pub user_connection_listener_backlog: u32,
    pub max_user_connections: u32,
}

/// IOMgr options.
#[derive(Debug, Clone)]
pub struct IoManagerOptions {
    /// IOMgr IPv4 listener port, 0 disables.
    pub ipv4_port: u16,
    /// IOMgr IPv6 listener port, 0 disables.
    pub ipv6_port: u16,
    pub worker_thread_number: u32,
    pub writer_thread_number: u32,
    pub block_cache_capacity: usize,
    pub user_cache_capacity: usize,
    pub database_cache_capacity: usize,
    pub table_cache_capacity: usize,
}

/// Encryption options.
#[derive(Debug, Clone)]
pub struct EncryptionOptions {
    /// Cipher id used for new databases unless overridden by DDL.
    pub default_cipher_id: String,
    /// Cipher id used for the system database.
    pub system_db_cipher_id: String,
}

/// Client connection options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub enable_encryption: bool,
    pub tls_certificate: String,
    pub tls_certificate_chain: String,
    pub tls_private_key: String,
}

/// Complete validated instance options.
#[derive(Debug, Clone)]
pub struct InstanceOptions {
    pub general: GeneralOptions,
    pub log: LogOptions,
    pub iomgr: IoManagerOptions,
    pub encryption: EncryptionOptions,
    pub client: ClientOptions,
}

impl InstanceOptions {
    /// Builds an option set with all defaults for the given instance name
    /// and data directory. Used by tests and embedded callers.
    pub fn with_defaults(instance_name: &str, data_dir: &str) -> Self {
        InstanceOptions {
            general: GeneralOptions {
                name: instance_name.to_string(),
                data_dir: data_dir.trim_end_matches('/').to_string(),
                ipv4_port: defaults::DEFAULT_IPV4_PORT,
                ipv6_port: defaults::DEFAULT_IPV6_PORT,
                admin_connection_listener_backlog:
                    defaults::DEFAULT_ADMIN_CONNECTION_LISTENER_BACKLOG,
                max_admin_connections: defaults::DEFAULT_MAX_ADMIN_CONNECTIONS,
                user_connection_listener_backlog:
                    defaults::DEFAULT_USER_CONNECTION_LISTENER_BACKLOG,
                max_user_connections: defaults::DEFAULT_MAX_USER_CONNECTIONS,
            },
            log: LogOptions {
                channels: vec![LogChannelOptions {
                    name: "console".to_string(),
                    channel_type: LogChannelType::Console,
                    destination: "stdout".to_string(),
                    max_file_size: defaults::DEFAULT_MAX_LOG_FILE_SIZE,
                    max_files: defaults::DEFAULT_MAX_LOG_FILES,
                    expiration_timeout: defaults::DEFAULT_LOG_FILE_EXPIRATION_TIMEOUT,
                    severity: LogSeverity::Info,
                }],
            },
            iomgr: IoManagerOptions {
                ipv4_port: defaults::DEFAULT_IOMGR_IPV4_PORT,
                ipv6_port: defaults::DEFAULT_IOMGR_IPV6_PORT,
                worker_thread_number: defaults::DEFAULT_IOMGR_WORKER_THREAD_NUMBER,
                writer_thread_number: defaults::DEFAULT_IOMGR_WRITER_THREAD_NUMBER,
                block_cache_capacity: defaults::DEFAULT_IOMGR_BLOCK_CACHE_CAPACITY,
                user_cache_capacity: defaults::DEFAULT_IOMGR_USER_CACHE_CAPACITY,
                database_cache_capacity: defaults::DEFAULT_IOMGR_DATABASE_CACHE_CAPACITY,
                table_cache_capacity: defaults::DEFAULT_IOMGR_TABLE_CACHE_CAPACITY,
            },
            encryption: EncryptionOptions {
                default_cipher_id: defaults::DEFAULT_CIPHER_ID.to_string(),
                system_db_cipher_id: defaults::DEFAULT_CIPHER_ID.to_string(),
            },
            client: ClientOptions {
                enable_encryption: defaults::DEFAULT_CLIENT_ENABLE_ENCRYPTION,
                tls_certificate: String::new(),
                tls_certificate_chain: String::new(),
                tls_private_key: String::new(),
            },
        }
    }

    /// Validates every option.
    ///
    /// Every violation is reported as [`ConfigError::InvalidOption`] with
    /// the dotted option name the operator wrote in the file.
    pub fn validate(&self) -> Result<()> {
        validate_port("ipv4_port", self.general.ipv4_port)?;
        validate_port("ipv6_port", self.general.ipv6_port)?;
        if self.general.ipv4_port == 0 && self.general.ipv6_port == 0 {
            return Err(ConfigError::invalid_option(
                "Both IPv4 and IPv6 are disabled",
            ));
        }

        if self.general.data_dir.is_empty() {
            return Err(ConfigError::invalid_option(
                "data_dir: Data directory not specified or empty",
            ));
        }

        validate_range(
            "admin_connection_listener_backlog",
            self.general.admin_connection_listener_backlog,
            1,
            defaults::MAX_ADMIN_CONNECTION_LISTENER_BACKLOG,
        )?;
        validate_range(
            "max_admin_connections",
            self.general.max_admin_connections,
            1,
            defaults::MAX_MAX_ADMIN_CONNECTIONS,
        )?;
        validate_range(
            "user_connection_listener_backlog",
            self.general.user_connection_listener_backlog,
            1,
            defaults::MAX_USER_CONNECTION_LISTENER_BACKLOG,
        )?;
        validate_range(
            "max_user_connections",
            self.general.max_user_connections,
            1,
            defaults::MAX_MAX_USER_CONNECTIONS,
        )?;

        self.validate_log_channels()?;

        validate_port("iomgr.ipv4_port", self.iomgr.ipv4_port)?;
        validate_port("iomgr.ipv6_port", self.iomgr.ipv6_port)?;
        if self.iomgr.ipv4_port == 0 && self.iomgr.ipv6_port == 0 {
            return Err(ConfigError::invalid_option(
                "Both IPv4 and IPv6 are disabled for IO Manager",
            ));
        }
        if self.iomgr.ipv4_port != 0 && self.iomgr.ipv4_port == self.general.ipv4_port {
            return Err(ConfigError::invalid_option(
                "iomgr.ipv4_port: IO Manager and database use the same IPv4 port number",
            ));
        }
        if self.iomgr.ipv6_port != 0 && self.iomgr.ipv6_port == self.general.ipv6_port {
            return Err(ConfigError::invalid_option(
                "iomgr.ipv6_port: IO Manager and database use the same IPv6 port number",
            ));
        }

        if self.iomgr.worker_thread_number < 1 {
            return Err(ConfigError::invalid_option(
                "iomgr.worker_thread_number: Number of IO Manager worker threads is out of range",
            ));
        }
        if self.iomgr.writer_thread_number < 1 {
            return Err(ConfigError::invalid_option(
                "iomgr.writer_thread_number: Number of IO Manager writer threads is out of range",
            ));
        }

        validate_cache_capacity(
            "iomgr.block_cache_capacity",
            self.iomgr.block_cache_capacity,
            defaults::MIN_IOMGR_BLOCK_CACHE_CAPACITY,
        )?;
        validate_cache_capacity(
            "iomgr.user_cache_capacity",
            self.iomgr.user_cache_capacity,
            defaults::MIN_IOMGR_USER_CACHE_CAPACITY,
        )?;
        validate_cache_capacity(
            "iomgr.database_cache_capacity",
            self.iomgr.database_cache_capacity,
            defaults::MIN_IOMGR_DATABASE_CACHE_CAPACITY,
        )?;
        validate_cache_capacity(
            "iomgr.table_cache_capacity",
            self.iomgr.table_cache_capacity,
            defaults::MIN_IOMGR_TABLE_CACHE_CAPACITY,
        )?;

        if self.encryption.default_cipher_id.is_empty() {
            return Err(ConfigError::invalid_option(
                "encryption.default_cipher_id: cipher id is empty",
            ));
        }
        if self.encryption.system_db_cipher_id.is_empty() {
            return Err(ConfigError::invalid_option(
                "encryption.system_db_cipher_id: cipher id is empty",
            ));
        }

        if self.client.enable_encryption {
            if self.client.tls_certificate.is_empty() && self.client.tls_certificate_chain.is_empty()
            {
                return Err(ConfigError::invalid_option(
                    "client.tls_certificate: certificate or certificate chain must be set \
                     to create a TLS connection",
                ));
            }
            if self.client.tls_private_key.is_empty() {
                return Err(ConfigError::invalid_option(
                    "client.tls_private_key: TLS private key is empty",
                ));
            }
        }

        Ok(())
    }

    fn validate_log_channels(&self) -> Result<()> {
        if self.log.channels.is_empty() {
            return Err(ConfigError::invalid_option("No log channels defined"));
        }
        let mut seen = std::collections::HashSet::new();
        for channel in &self.log.channels {
            if channel.name.is_empty() {
                return Err(ConfigError::invalid_option(
                    "Empty log channel name detected",
                ));
            }
            if !seen.insert(channel.name.as_str()) {
                return Err(ConfigError::invalid_option(format!(
                    "Duplicate log channel name {}",
                    channel.name
                )));
            }
            if channel.destination.is_empty() {
                return Err(ConfigError::invalid_option(format!(
                    "Destination not defined for the log channel {}",
                    channel.name
                )));
            }
            if channel.max_file_size == 0 || channel.max_file_size > defaults::MAX_MAX_LOG_FILE_SIZE
            {
                return Err(ConfigError::invalid_option(format!(
                    "Invalid value of max. file size for the log channel {}",
                    channel.name
                )));
            }
            if channel.max_files == 0 {
                return Err(ConfigError::invalid_option(format!(
                    "Invalid value of max. number of log files for the log channel {}",
                    channel.name
                )));
            }
            if channel.expiration_timeout > defaults::MAX_LOG_FILE_EXPIRATION_TIMEOUT {
                return Err(ConfigError::invalid_option(format!(
                    "Invalid value of expiration time for the log channel {}",
                    channel.name
                )));
            }
        }
        Ok(())
    }
}

fn validate_port(option: &str, port: u16) -> Result<()> {
    if port != 0 && !(MIN_PORT_NUMBER..=MAX_PORT_NUMBER).contains(&port) {
        return Err(ConfigError::invalid_option(format!(
            "{}: port number is out of range",
            option
        )));
    }
    Ok(())
}

fn validate_range(option: &str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(ConfigError::invalid_option(format!(
            "{}: value is out of range",
            option
        )));
    }
    Ok(())
}

fn validate_cache_capacity(option: &str, value: usize, min: usize) -> Result<()> {
    if value < min {
        return Err(ConfigError::invalid_option(format!(
            "{}: cache capacity is too small",
            option
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        let options = InstanceOptions::with_defaults("test", "/var/lib/siodb/test/data");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_both_server_ports_disabled_rejected() {
        let mut options = InstanceOptions::with_defaults("test", "/data");
        options.general.ipv4_port = 0;
        options.general.ipv6_port = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_iomgr_port_collision_rejected() {
        let mut options = InstanceOptions::with_defaults("test", "/data");
        options.general.ipv4_port = 50000;
        options.iomgr.ipv4_port = 50000;
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("same IPv4 port number"));
    }

    #[test]
    fn test_empty_data_dir_rejected() {
        let mut options = InstanceOptions::with_defaults("test", "");
        options.general.data_dir.clear();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_cache_capacity_minimums_enforced() {
        let mut options = InstanceOptions::with_defaults("test", "/data");
        options.iomgr.table_cache_capacity = 1;
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("iomgr.table_cache_capacity"));
    }

    #[test]
    fn test_tls_options_required_when_encryption_enabled() {
        let mut options = InstanceOptions::with_defaults("test", "/data");
        options.client.enable_encryption = true;
        assert!(options.validate().is_err());

        options.client.tls_certificate = "/etc/siodb/cert.pem".to_string();
        assert!(options.validate().is_err());

        options.client.tls_private_key = "/etc/siodb/key.pem".to_string();
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_duplicate_log_channel_rejected() {
        let mut options = InstanceOptions::with_defaults("test", "/data");
        let dup = options.log.channels[0].clone();
        options.log.channels.push(dup);
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate log channel name"));
    }

    #[test]
    fn test_worker_thread_minimum() {
        let mut options = InstanceOptions::with_defaults("test", "/data");
        options.iomgr.worker_thread_number = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_log_severity_parse() {
        assert_eq!(LogSeverity::parse("INFO"), Some(LogSeverity::Info));
        assert_eq!(LogSeverity::parse("warning"), Some(LogSeverity::Warning));
        assert_eq!(LogSeverity::parse("loud"), None);
    }
}
