//! Default values and enforced limits for instance options.

/// Default server IPv4 listener port.
pub const DEFAULT_IPV4_PORT: u16 = 50000;

/// Default server IPv6 listener port (0 = disabled).
pub const DEFAULT_IPV6_PORT: u16 = 0;

/// Default IOMgr IPv4 listener port.
pub const DEFAULT_IOMGR_IPV4_PORT: u16 = 50001;

/// Default IOMgr IPv6 listener port (0 = disabled).
pub const DEFAULT_IOMGR_IPV6_PORT: u16 = 0;

/// Default admin connection listener backlog.
pub const DEFAULT_ADMIN_CONNECTION_LISTENER_BACKLOG: u32 = 10;

/// Largest accepted admin connection listener backlog.
pub const MAX_ADMIN_CONNECTION_LISTENER_BACKLOG: u32 = 128;

/// Default maximum number of admin connections.
pub const DEFAULT_MAX_ADMIN_CONNECTIONS: u32 = 10;

/// Largest accepted maximum number of admin connections.
pub const MAX_MAX_ADMIN_CONNECTIONS: u32 = 4096;

/// Default user connection listener backlog.
pub const DEFAULT_USER_CONNECTION_LISTENER_BACKLOG: u32 = 10;

/// Largest accepted user connection listener backlog.
pub const MAX_USER_CONNECTION_LISTENER_BACKLOG: u32 = 32768;

/// Default maximum number of user connections.
pub const DEFAULT_MAX_USER_CONNECTIONS: u32 = 100;

/// Largest accepted maximum number of user connections.
pub const MAX_MAX_USER_CONNECTIONS: u32 = 32768;

/// Default number of IOMgr worker threads.
pub const DEFAULT_IOMGR_WORKER_THREAD_NUMBER: u32 = 2;

/// Default number of IOMgr writer threads.
pub const DEFAULT_IOMGR_WRITER_THREAD_NUMBER: u32 = 2;

/// Default block cache capacity.
pub const DEFAULT_IOMGR_BLOCK_CACHE_CAPACITY: usize = 103;

/// Smallest accepted block cache capacity.
pub const MIN_IOMGR_BLOCK_CACHE_CAPACITY: usize = 25;

/// Default user cache capacity.
pub const DEFAULT_IOMGR_USER_CACHE_CAPACITY: usize = 100;

/// Smallest accepted user cache capacity.
pub const MIN_IOMGR_USER_CACHE_CAPACITY: usize = 2;

/// Default database cache capacity.
pub const DEFAULT_IOMGR_DATABASE_CACHE_CAPACITY: usize = 103;

/// Smallest accepted database cache capacity. The system database must
/// always fit with room for at least two user databases.
pub const MIN_IOMGR_DATABASE_CACHE_CAPACITY: usize = 3;

/// Default table cache capacity.
pub const DEFAULT_IOMGR_TABLE_CACHE_CAPACITY: usize = 103;

/// Smallest accepted table cache capacity. Must accommodate the catalog
/// tables of a single database.
pub const MIN_IOMGR_TABLE_CACHE_CAPACITY: usize = 16;

/// Default cipher id for new databases.
pub const DEFAULT_CIPHER_ID: &str = "aes128";

/// Default client encryption switch.
pub const DEFAULT_CLIENT_ENABLE_ENCRYPTION: bool = false;

/// Default maximum log file size.
pub const DEFAULT_MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Largest accepted log file size.
pub const MAX_MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Default maximum number of log files per channel.
pub const DEFAULT_MAX_LOG_FILES: u64 = 10;

/// Default log file expiration timeout, in seconds (one day).
pub const DEFAULT_LOG_FILE_EXPIRATION_TIMEOUT: u64 = 24 * 60 * 60;

/// Largest accepted log file expiration timeout, in seconds (ten years).
pub const MAX_LOG_FILE_EXPIRATION_TIMEOUT: u64 = 10 * 365 * 24 * 60 * 60;
