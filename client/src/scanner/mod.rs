mod directory_poller;
mod error;
mod scanner;
mod scanner_config;
mod server_list;

pub use error::ScannerError;
pub use scanner::ServerScanner;
pub use scanner_config::ScannerConfig;
pub use server_list::{ServerCallback, ServerInfo, ServerList, ServerSource};
