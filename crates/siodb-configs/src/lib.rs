//! Instance configuration for the Siodb engine.
//!
//! An instance is configured by a single file; this crate parses it,
//! applies environment overrides and validates every option before the
//! engine sees it. Invalid options are reported with the offending
//! option's dotted name so operators can find them in the file.

mod defaults;
mod error;
mod loader;
mod paths;
mod types;
mod units;

pub use defaults::*;
pub use error::{ConfigError, Result};
pub use loader::parse_bool_option;
pub use paths::{
    instance_config_file_path, instance_initialization_lock_file_path,
    iomgr_initialization_flag_file_path, validate_instance_name,
};
pub use types::{
    ClientOptions, EncryptionOptions, GeneralOptions, InstanceOptions, IoManagerOptions,
    LogChannelOptions, LogChannelType, LogOptions, LogSeverity,
};
pub use units::{parse_duration_option, parse_size_option};
