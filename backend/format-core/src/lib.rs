pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod server;
pub mod session;
pub mod style_config;

#[cfg(test)]
mod tests;

pub const SERVER_HOSTNAME: &str = "127.0.0.1";
pub const SERVER_BASE_URL: &str = const_format::concatcp!("http://", SERVER_HOSTNAME);

pub const INSTANCE_ID_FLAG: &str = "--node-server-instance-id=";

pub const PORT_FILE_NAME: &str = "server.port";
pub const PORT_FILE_PREFIX: &str = "server-";
pub const PORT_FILE_EXTENSION: &str = ".port";
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Request bodies above this size are rejected with 413.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

pub const SHUTDOWN_PATH: &str = "/shutdown";
pub const SHUTDOWN_ACKNOWLEDGEMENT: &str = "Graceful shutdown started";
