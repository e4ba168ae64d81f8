use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIGURATION_FLAG: &str = "-c";
pub const PORT_NUMBER_FLAG: &str = "--remote-port";
pub const NUM_CLIENTS_FLAG: &str = "--num-clients";
pub const NUM_CLIENTS: u32 = 1;

pub const LOCAL_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

pub const DEFAULT_INSTANCE_NAME: &str = "default";
pub const DEFAULT_SUMO_COMMAND: &str = "sumo";
pub const STARTING_PORT_NUMBER: u16 = 8800;

/// Python packages a SUMO installation ships under `$SUMO_HOME/tools`.
pub const SUMO_PACKAGES: [&str; 3] = ["libsumo", "traci", "sumolib"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceKind {
    /// A local `sumo` process reached over TCP.
    Tcp,
    /// An in-process simulation driven through libsumo.
    Lib,
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKind::Tcp => write!(f, "tcp"),
            InstanceKind::Lib => write!(f, "lib"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    pub name: String,
    pub kind: InstanceKind,
    pub config: PathBuf,
    pub port: Option<u16>,
    pub started: bool,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetry {
    pub attempts: u32,
    pub delay: Duration,
}

impl ConnectRetry {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(200))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageStatus {
    pub name: String,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentReport {
    pub sumo_home: Option<PathBuf>,
    pub executable: Option<PathBuf>,
    pub packages: Vec<PackageStatus>,
}

impl EnvironmentReport {
    pub fn missing_packages(&self) -> Vec<&str> {
        self.packages
            .iter()
            .filter(|p| p.path.is_none())
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.executable.is_some() && self.missing_packages().is_empty()
    }
}
