#[cfg(feature = "cli")]
use std::collections::HashMap;
#[cfg(feature = "cli")]
use std::sync::{Arc, Mutex};
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct ProcessStats {
    pub pid: u32,
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub memory_usage_percent: f32,
    pub peak_memory_mb: u64,
    pub monitored_for: Duration,
}

/// Resource usage of spawned SUMO processes.
#[cfg(feature = "cli")]
pub struct ProcessMonitor {
    system: Arc<Mutex<System>>,
    start_time: Instant,
    peak_memory: Arc<Mutex<HashMap<u32, u64>>>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl ProcessMonitor {
    pub fn new(enabled: bool) -> Self {
        let system = if enabled { System::new_all() } else { System::new() };

        Self {
            system: Arc::new(Mutex::new(system)),
            start_time: Instant::now(),
            peak_memory: Arc::new(Mutex::new(HashMap::new())),
            enabled,
        }
    }

    pub fn get_stats(&self, pid: u32) -> Option<ProcessStats> {
        if !self.enabled {
            return None;
        }

        let mut system = self.system.lock().ok()?;
        system.refresh_all();

        let process = system.process(Pid::from_u32(pid))?;
        let memory_mb = process.memory() / 1024 / 1024;
        let total_memory = system.total_memory() / 1024 / 1024;
        let memory_percent = if total_memory > 0 {
            (memory_mb as f32 / total_memory as f32) * 100.0
        } else {
            0.0
        };

        let mut peaks = self.peak_memory.lock().ok()?;
        let peak = peaks.entry(pid).or_insert(0);
        if memory_mb > *peak {
            *peak = memory_mb;
        }
        let peak_memory = *peak;

        Some(ProcessStats {
            pid,
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            memory_usage_percent: memory_percent,
            peak_memory_mb: peak_memory,
            monitored_for: self.start_time.elapsed(),
        })
    }

    pub fn log_stats(&self, instance: &str, pid: u32) {
        match self.get_stats(pid) {
            Some(stats) => tracing::info!(
                instance,
                pid = stats.pid,
                "📊 CPU: {:.1}%, Memory: {}MB ({:.1}%), Peak: {}MB",
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.memory_usage_percent,
                stats.peak_memory_mb
            ),
            None if self.enabled => {
                tracing::warn!(instance, pid, "SUMO process is not visible to the monitor")
            }
            None => {}
        }
    }

    /// Drops the peak-memory record of a process that has exited.
    pub fn forget(&self, pid: u32) {
        if let Ok(mut peaks) = self.peak_memory.lock() {
            peaks.remove(&pid);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(feature = "cli")]
impl Default for ProcessMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// No-op monitor when built without sysinfo
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct ProcessMonitor;

#[cfg(not(feature = "cli"))]
impl ProcessMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _instance: &str, _pid: u32) {}

    pub fn forget(&self, _pid: u32) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = ProcessMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.get_stats(std::process::id()).is_none());
    }

    #[test]
    fn test_enabled_monitor_sees_current_process() {
        let monitor = ProcessMonitor::new(true);
        let stats = monitor.get_stats(std::process::id()).unwrap();
        assert_eq!(stats.pid, std::process::id());
        assert!(stats.peak_memory_mb >= stats.memory_usage_mb);

        monitor.forget(stats.pid);
    }
}
