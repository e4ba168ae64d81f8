//! Registry of named SUMO instances.

use crate::adapters::{TokioProcessLauncher, UnavailableLibrary};
use crate::core::environment::SumoEnvironment;
use crate::core::instances::{LibraryHandle, LocalLibSumoInstance, LocalTcpSumoInstance};
use crate::domain::model::{
    ConnectRetry, InstanceKind, InstanceSnapshot, DEFAULT_SUMO_COMMAND, STARTING_PORT_NUMBER,
};
use crate::domain::ports::{ProcessLauncher, SimulationLibrary, SumoInstance};
use crate::utils::error::{Result, SumoError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub enum ManagedInstance {
    Tcp(LocalTcpSumoInstance),
    Lib(LocalLibSumoInstance),
}

impl ManagedInstance {
    pub fn as_instance(&self) -> &dyn SumoInstance {
        match self {
            ManagedInstance::Tcp(instance) => instance as &dyn SumoInstance,
            ManagedInstance::Lib(instance) => instance,
        }
    }

    pub fn as_instance_mut(&mut self) -> &mut dyn SumoInstance {
        match self {
            ManagedInstance::Tcp(instance) => instance as &mut dyn SumoInstance,
            ManagedInstance::Lib(instance) => instance,
        }
    }

    pub fn kind(&self) -> InstanceKind {
        self.as_instance().kind()
    }

    pub fn as_tcp(&self) -> Option<&LocalTcpSumoInstance> {
        match self {
            ManagedInstance::Tcp(instance) => Some(instance),
            ManagedInstance::Lib(_) => None,
        }
    }

    pub fn as_lib(&self) -> Option<&LocalLibSumoInstance> {
        match self {
            ManagedInstance::Lib(instance) => Some(instance),
            ManagedInstance::Tcp(_) => None,
        }
    }
}

/// Creates, hands out and destroys SUMO instances by unique name.
///
/// Most deployments use a single instance under
/// [`DEFAULT_INSTANCE_NAME`](crate::domain::model::DEFAULT_INSTANCE_NAME).
pub struct SumoInstanceManager {
    instances: BTreeMap<String, ManagedInstance>,
    next_port: Option<u16>,
    sumo_command: String,
    environment: SumoEnvironment,
    launcher: Arc<dyn ProcessLauncher>,
    library: LibraryHandle,
    connect_retry: ConnectRetry,
}

impl SumoInstanceManager {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, library: Arc<dyn SimulationLibrary>) -> Self {
        Self {
            instances: BTreeMap::new(),
            next_port: Some(STARTING_PORT_NUMBER),
            sumo_command: DEFAULT_SUMO_COMMAND.to_string(),
            environment: SumoEnvironment::from_env(),
            launcher,
            library: LibraryHandle::new(library),
            connect_retry: ConnectRetry::default(),
        }
    }

    /// Real processes, no libsumo.
    pub fn local() -> Self {
        Self::new(
            Arc::new(TokioProcessLauncher::new()),
            Arc::new(UnavailableLibrary),
        )
    }

    pub fn with_sumo_command(mut self, command: impl Into<String>) -> Self {
        self.sumo_command = command.into();
        self
    }

    pub fn with_starting_port(mut self, port: u16) -> Self {
        self.next_port = Some(port);
        self
    }

    pub fn with_environment(mut self, environment: SumoEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_connect_retry(mut self, retry: ConnectRetry) -> Self {
        self.connect_retry = retry;
        self
    }

    pub fn library(&self) -> &LibraryHandle {
        &self.library
    }

    /// Creates a local SUMO process instance reached over TCP.
    ///
    /// Without `executable` the configured SUMO command is looked up; without
    /// `port` the next port this manager has not handed out yet is used.
    pub fn create_local_tcp_instance(
        &mut self,
        name: &str,
        config: &Path,
        executable: Option<PathBuf>,
        port: Option<u16>,
    ) -> Result<&mut LocalTcpSumoInstance> {
        self.ensure_free(name)?;

        let executable = match executable {
            Some(executable) => executable,
            None => self.find_default_executable()?,
        };
        let port = match port {
            Some(port) => port,
            None => self.choose_port()?,
        };

        let instance = LocalTcpSumoInstance::new(
            config,
            executable,
            port,
            self.launcher.clone(),
            self.connect_retry,
        )?;
        tracing::debug!(name, port, "Created tcp SUMO instance");

        match self.insert(name, ManagedInstance::Tcp(instance)) {
            ManagedInstance::Tcp(instance) => Ok(instance),
            other => Err(kind_mismatch(name, InstanceKind::Tcp, other.kind())),
        }
    }

    pub fn create_local_lib_instance(
        &mut self,
        name: &str,
        config: &Path,
    ) -> Result<&mut LocalLibSumoInstance> {
        self.ensure_free(name)?;

        let instance = LocalLibSumoInstance::new(config, self.library.clone())?;
        tracing::debug!(name, "Created lib SUMO instance");

        match self.insert(name, ManagedInstance::Lib(instance)) {
            ManagedInstance::Lib(instance) => Ok(instance),
            other => Err(kind_mismatch(name, InstanceKind::Lib, other.kind())),
        }
    }

    pub fn get_instance(&self, name: &str) -> Result<&ManagedInstance> {
        self.instances
            .get(name)
            .ok_or_else(|| SumoError::InstanceNotCreated {
                name: name.to_string(),
            })
    }

    pub fn get_instance_mut(&mut self, name: &str) -> Result<&mut ManagedInstance> {
        self.instances
            .get_mut(name)
            .ok_or_else(|| SumoError::InstanceNotCreated {
                name: name.to_string(),
            })
    }

    /// Removes the instance and stops it if it is running. The name can be reused afterwards.
    pub async fn destroy_instance(&mut self, name: &str) -> Result<()> {
        let mut instance =
            self.instances
                .remove(name)
                .ok_or_else(|| SumoError::InstanceNotFound {
                    name: name.to_string(),
                })?;

        let instance = instance.as_instance_mut();
        if instance.is_started() {
            instance.stop().await?;
        }
        tracing::debug!(name, "Destroyed SUMO instance");
        Ok(())
    }

    pub fn instance_names(&self) -> Vec<String> {
        self.instances.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn snapshots(&self) -> Vec<InstanceSnapshot> {
        self.instances
            .iter()
            .map(|(name, instance)| instance.as_instance().snapshot(name))
            .collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut ManagedInstance)> {
        self.instances.iter_mut()
    }

    /// Stops every running instance; the first failure is returned after all were tried.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        let mut first_error = None;

        for (name, instance) in self.instances.iter_mut() {
            let instance = instance.as_instance_mut();
            if !instance.is_started() {
                continue;
            }
            match instance.stop().await {
                Ok(()) => tracing::info!(name = name.as_str(), "Stopped SUMO instance"),
                Err(e) => {
                    tracing::error!(name = name.as_str(), "Failed to stop SUMO instance: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn ensure_free(&self, name: &str) -> Result<()> {
        if self.instances.contains_key(name) {
            return Err(SumoError::InstanceExists {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, name: &str, instance: ManagedInstance) -> &mut ManagedInstance {
        self.instances.entry(name.to_string()).or_insert(instance)
    }

    fn find_default_executable(&self) -> Result<PathBuf> {
        self.environment
            .find_executable(&self.sumo_command)
            .ok_or_else(|| SumoError::ExecutableNotFound {
                command: self.sumo_command.clone(),
            })
    }

    fn choose_port(&mut self) -> Result<u16> {
        let port = self.next_port.ok_or(SumoError::PortsExhausted { last: u16::MAX })?;
        self.next_port = port.checked_add(1);
        Ok(port)
    }
}

fn kind_mismatch(name: &str, expected: InstanceKind, found: InstanceKind) -> SumoError {
    SumoError::InstanceKindMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}
