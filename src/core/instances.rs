//! SUMO instance backends.
//!
//! Instances are normally created and owned by
//! [`SumoInstanceManager`](crate::core::manager::SumoInstanceManager) rather than
//! constructed directly.

use crate::core::tcp::SumoTcpConnection;
use crate::domain::model::{
    ConnectRetry, InstanceKind, CONFIGURATION_FLAG, LOCAL_HOST, NUM_CLIENTS, NUM_CLIENTS_FLAG,
    PORT_NUMBER_FLAG,
};
use crate::domain::ports::{ProcessLauncher, SimulationLibrary, SumoInstance, SumoProcess};
use crate::utils::error::{Result, SumoError};
use crate::utils::validation::{validate_existing_file, validate_range};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Manages one local SUMO process and the TCP connection to it.
pub struct LocalTcpSumoInstance {
    config: PathBuf,
    executable: PathBuf,
    port: u16,
    launcher: Arc<dyn ProcessLauncher>,
    retry: ConnectRetry,
    process: Option<Box<dyn SumoProcess>>,
    connection: Option<SumoTcpConnection>,
    started_at: Option<DateTime<Utc>>,
}

impl LocalTcpSumoInstance {
    pub fn new(
        config: impl Into<PathBuf>,
        executable: impl Into<PathBuf>,
        port: u16,
        launcher: Arc<dyn ProcessLauncher>,
        retry: ConnectRetry,
    ) -> Result<Self> {
        let config = config.into();
        let executable = executable.into();

        validate_existing_file("config", &config)?;
        validate_existing_file("executable", &executable)?;
        validate_range("port", port, 1, u16::MAX)?;

        Ok(Self {
            config,
            executable,
            port,
            launcher,
            retry,
            process: None,
            connection: None,
            started_at: None,
        })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Arguments passed to the SUMO executable.
    pub fn command_args(&self) -> Vec<String> {
        vec![
            CONFIGURATION_FLAG.to_string(),
            self.config.display().to_string(),
            PORT_NUMBER_FLAG.to_string(),
            self.port.to_string(),
            NUM_CLIENTS_FLAG.to_string(),
            NUM_CLIENTS.to_string(),
        ]
    }

    pub fn process(&self) -> Result<&dyn SumoProcess> {
        self.process
            .as_deref()
            .ok_or_else(|| SumoError::ProcessError {
                message: "SUMO process is not spawned".to_string(),
                source: None,
            })
    }

    pub fn connection(&mut self) -> Result<&mut SumoTcpConnection> {
        self.connection
            .as_mut()
            .ok_or_else(|| SumoError::ConnectionError {
                message: "SUMO connection is not established".to_string(),
            })
    }

    fn spawn(&mut self) -> Result<()> {
        let process = self.launcher.spawn(&self.executable, &self.command_args())?;
        tracing::info!(
            pid = process.id(),
            port = self.port,
            "Spawned SUMO from {}",
            self.executable.display()
        );
        self.process = Some(process);
        Ok(())
    }

    async fn connect(&mut self) -> Result<()> {
        let mut connection = SumoTcpConnection::new(LOCAL_HOST, self.port);
        connection.connect_with_retry(&self.retry).await?;
        self.connection = Some(connection);
        Ok(())
    }

    async fn terminate_process(&mut self) -> Result<()> {
        match self.process.take() {
            Some(mut process) => process.terminate().await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SumoInstance for LocalTcpSumoInstance {
    fn kind(&self) -> InstanceKind {
        InstanceKind::Tcp
    }

    fn config(&self) -> &Path {
        &self.config
    }

    fn port(&self) -> Option<u16> {
        Some(self.port)
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    async fn start(&mut self) -> Result<()> {
        if self.is_started() {
            return Err(SumoError::status("this SUMO instance is already started"));
        }

        self.spawn()?;
        if let Err(e) = self.connect().await {
            if let Err(kill_error) = self.terminate_process().await {
                tracing::warn!("Failed to clean up SUMO process: {}", kill_error);
            }
            return Err(e);
        }

        self.started_at = Some(Utc::now());
        Ok(())
    }

    async fn step(&mut self) -> Result<()> {
        if !self.is_started() {
            return Err(SumoError::status("this SUMO instance is not started"));
        }

        Err(SumoError::Unsupported {
            operation: "step".to_string(),
            backend: InstanceKind::Tcp.to_string(),
        })
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.is_started() {
            return Err(SumoError::status("this SUMO instance is not started"));
        }

        if let Some(mut connection) = self.connection.take() {
            // SUMO may already have closed its end
            if let Err(e) = connection.close().await {
                tracing::warn!("Closing SUMO connection failed: {}", e);
            }
        }
        self.started_at = None;
        self.terminate_process().await
    }
}

/// Shared handle to libsumo.
///
/// libsumo holds one simulation per process, so every instance created from
/// the same handle shares a single running flag.
#[derive(Clone)]
pub struct LibraryHandle {
    backend: Arc<dyn SimulationLibrary>,
    running: Arc<AtomicBool>,
}

impl LibraryHandle {
    pub fn new(backend: Arc<dyn SimulationLibrary>) -> Self {
        Self {
            backend,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn try_acquire(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn release(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Drives a simulation in-process through libsumo.
pub struct LocalLibSumoInstance {
    config: PathBuf,
    library: LibraryHandle,
    started_at: Option<DateTime<Utc>>,
}

impl LocalLibSumoInstance {
    pub fn new(config: impl Into<PathBuf>, library: LibraryHandle) -> Result<Self> {
        let config = config.into();
        validate_existing_file("config", &config)?;

        Ok(Self {
            config,
            library,
            started_at: None,
        })
    }

    /// libsumo ignores the first argument, where a CLI would put the executable.
    pub fn library_args(&self) -> Vec<String> {
        vec![
            String::new(),
            CONFIGURATION_FLAG.to_string(),
            self.config.display().to_string(),
        ]
    }
}

#[async_trait]
impl SumoInstance for LocalLibSumoInstance {
    fn kind(&self) -> InstanceKind {
        InstanceKind::Lib
    }

    fn config(&self) -> &Path {
        &self.config
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    async fn start(&mut self) -> Result<()> {
        if self.is_started() {
            return Err(SumoError::status("this SUMO instance is already started"));
        }
        if !self.library.try_acquire() {
            return Err(SumoError::library(
                "`libsumo` only supports one simulation running at a time",
            ));
        }

        if let Err(e) = self.library.backend.start(&self.library_args()) {
            self.library.release();
            return Err(SumoError::library(e));
        }

        tracing::info!("Started libsumo simulation for {}", self.config.display());
        self.started_at = Some(Utc::now());
        Ok(())
    }

    async fn step(&mut self) -> Result<()> {
        if !self.is_started() {
            return Err(SumoError::status("this SUMO instance is not started"));
        }

        if let Err(e) = self.library.backend.simulation_step() {
            if let Err(stop_error) = self.stop().await {
                tracing::warn!("Stopping after a failed step also failed: {}", stop_error);
            }
            return Err(SumoError::library(e));
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.is_started() {
            return Err(SumoError::status("this SUMO instance is not started"));
        }

        let closed = self.library.backend.close();
        self.started_at = None;
        self.library.release();

        closed.map_err(SumoError::library)
    }
}
