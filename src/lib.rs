pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::toml_config::ServerConfig;
pub use core::{
    environment::SumoEnvironment,
    instances::{LibraryHandle, LocalLibSumoInstance, LocalTcpSumoInstance},
    manager::{ManagedInstance, SumoInstanceManager},
    server::SumoServer,
    tcp::SumoTcpConnection,
};
pub use utils::error::{Result, SumoError};
