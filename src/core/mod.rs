pub mod environment;
pub mod instances;
pub mod manager;
pub mod server;
pub mod tcp;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::domain::model::{ConnectRetry, InstanceKind, InstanceSnapshot};
pub use crate::domain::ports::{ProcessLauncher, SimulationLibrary, SumoInstance, SumoProcess};
pub use crate::utils::error::Result;
