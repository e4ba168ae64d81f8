use crate::domain::model::{InstanceKind, InstanceSnapshot};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// A simulation that can be started, stepped and stopped.
#[async_trait]
pub trait SumoInstance: Send + Sync {
    fn kind(&self) -> InstanceKind;

    /// Path to the `sumocfg` configuration file used by this instance.
    fn config(&self) -> &Path;

    fn port(&self) -> Option<u16> {
        None
    }

    fn started_at(&self) -> Option<DateTime<Utc>>;

    fn is_started(&self) -> bool {
        self.started_at().is_some()
    }

    async fn start(&mut self) -> Result<()>;
    async fn step(&mut self) -> Result<()>;
    async fn stop(&mut self) -> Result<()>;

    fn snapshot(&self, name: &str) -> InstanceSnapshot {
        InstanceSnapshot {
            name: name.to_string(),
            kind: self.kind(),
            config: self.config().to_path_buf(),
            port: self.port(),
            started: self.is_started(),
            started_at: self.started_at(),
        }
    }
}

/// A spawned simulator process.
#[async_trait]
pub trait SumoProcess: Send + Sync {
    fn id(&self) -> Option<u32>;

    /// Kills the process and waits for it to exit.
    async fn terminate(&mut self) -> Result<()>;
}

pub trait ProcessLauncher: Send + Sync {
    fn spawn(&self, program: &Path, args: &[String]) -> Result<Box<dyn SumoProcess>>;
}

/// The libsumo surface used by the library backend. Errors carry the
/// library's own message.
pub trait SimulationLibrary: Send + Sync {
    fn start(&self, args: &[String]) -> std::result::Result<(), String>;
    fn simulation_step(&self) -> std::result::Result<(), String>;
    fn close(&self) -> std::result::Result<(), String>;
}
