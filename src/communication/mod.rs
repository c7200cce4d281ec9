pub mod error_handler;
pub mod host;
pub mod init_data;

pub use host::{HostBridge, PlatformUser, SelectionMessage};
