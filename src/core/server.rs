use crate::config::toml_config::ServerConfig;
use crate::core::manager::{ManagedInstance, SumoInstanceManager};
use crate::domain::model::InstanceKind;
use crate::domain::ports::{ProcessLauncher, SimulationLibrary, SumoInstance};
use crate::utils::error::Result;
use crate::utils::monitor::ProcessMonitor;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Long-running host for the configured SUMO instances.
pub struct SumoServer {
    name: String,
    manager: SumoInstanceManager,
    autostart: Vec<String>,
    step_interval: Duration,
    status_interval: Duration,
    monitor: ProcessMonitor,
}

impl SumoServer {
    pub fn from_config(
        config: &ServerConfig,
        launcher: Arc<dyn ProcessLauncher>,
        library: Arc<dyn SimulationLibrary>,
    ) -> Result<Self> {
        let mut manager = SumoInstanceManager::new(launcher, library)
            .with_sumo_command(config.sumo_command())
            .with_starting_port(config.starting_port())
            .with_connect_retry(config.connect_retry());

        let mut autostart = Vec::new();
        for instance in &config.instances {
            match instance.backend {
                InstanceKind::Tcp => {
                    manager.create_local_tcp_instance(
                        &instance.name,
                        &instance.config,
                        instance.executable.clone(),
                        instance.port,
                    )?;
                }
                InstanceKind::Lib => {
                    manager.create_local_lib_instance(&instance.name, &instance.config)?;
                }
            }
            if instance.autostart() {
                autostart.push(instance.name.clone());
            }
        }

        Ok(Self {
            name: config.server_name().to_string(),
            manager,
            autostart,
            step_interval: config.step_interval(),
            status_interval: config.status_interval(),
            monitor: ProcessMonitor::new(config.monitor_processes()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manager(&self) -> &SumoInstanceManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut SumoInstanceManager {
        &mut self.manager
    }

    /// Starts the instances marked `autostart`. On failure everything already
    /// started is stopped again.
    pub async fn start_autostart(&mut self) -> Result<()> {
        for name in self.autostart.clone() {
            let started = self
                .manager
                .get_instance_mut(&name)?
                .as_instance_mut()
                .start()
                .await;

            if let Err(e) = started {
                tracing::error!(name = name.as_str(), "Failed to start SUMO instance: {}", e);
                if let Err(stop_error) = self.manager.shutdown_all().await {
                    tracing::warn!("Cleanup after failed start also failed: {}", stop_error);
                }
                return Err(e);
            }
            tracing::info!(name = name.as_str(), "✅ SUMO instance started");
        }
        Ok(())
    }

    /// Advances every running library simulation by one step and returns how many advanced.
    pub async fn step_all(&mut self) -> usize {
        let mut stepped = 0;
        for (name, instance) in self.manager.iter_mut() {
            let ManagedInstance::Lib(instance) = instance else {
                continue;
            };
            if !instance.is_started() {
                continue;
            }
            match instance.step().await {
                Ok(()) => stepped += 1,
                Err(e) => tracing::error!(name = name.as_str(), "Simulation step failed: {}", e),
            }
        }
        stepped
    }

    pub fn log_status(&self) -> Result<()> {
        let snapshots = self.manager.snapshots();
        tracing::info!(
            server = self.name.as_str(),
            "📊 {}",
            serde_json::to_string(&snapshots)?
        );

        for (name, pid) in self.process_ids() {
            self.monitor.log_stats(&name, pid);
        }
        Ok(())
    }

    fn process_ids(&self) -> Vec<(String, u32)> {
        self.manager
            .instance_names()
            .into_iter()
            .filter_map(|name| {
                let pid = self
                    .manager
                    .get_instance(&name)
                    .ok()?
                    .as_tcp()?
                    .process()
                    .ok()?
                    .id()?;
                Some((name, pid))
            })
            .collect()
    }

    /// Serves until `shutdown` resolves, then stops every instance.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = std::pin::pin!(shutdown);

        let mut step_timer = tokio::time::interval(self.step_interval);
        step_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut status_timer = tokio::time::interval(self.status_interval);
        status_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(server = self.name.as_str(), "🚀 Serving {} SUMO instance(s)", self.manager.len());

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = step_timer.tick() => {
                    self.step_all().await;
                }
                _ = status_timer.tick() => {
                    if let Err(e) = self.log_status() {
                        tracing::warn!("Could not report status: {}", e);
                    }
                }
            }
        }

        let pids: Vec<u32> = self.process_ids().into_iter().map(|(_, pid)| pid).collect();
        let result = self.manager.shutdown_all().await;
        for pid in pids {
            self.monitor.forget(pid);
        }
        result
    }
}
