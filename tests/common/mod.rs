#![allow(dead_code)]

use async_trait::async_trait;
use muve_sumo_server::core::{ProcessLauncher, SimulationLibrary, SumoProcess};
use muve_sumo_server::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records spawn requests instead of starting SUMO.
#[derive(Default)]
pub struct FakeLauncher {
    pub spawned: Mutex<Vec<(PathBuf, Vec<String>)>>,
    pub terminated: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.lock().unwrap().len()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn spawn(&self, program: &Path, args: &[String]) -> Result<Box<dyn SumoProcess>> {
        self.spawned
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        Ok(Box::new(FakeProcess {
            terminated: self.terminated.clone(),
        }))
    }
}

pub struct FakeProcess {
    terminated: Arc<AtomicUsize>,
}

#[async_trait]
impl SumoProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    async fn terminate(&mut self) -> Result<()> {
        self.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory stand-in for libsumo that counts calls.
#[derive(Default)]
pub struct CountingLibrary {
    pub starts: AtomicUsize,
    pub steps: AtomicUsize,
    pub closes: AtomicUsize,
}

impl CountingLibrary {
    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl SimulationLibrary for CountingLibrary {
    fn start(&self, _args: &[String]) -> std::result::Result<(), String> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn simulation_step(&self) -> std::result::Result<(), String> {
        self.steps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> std::result::Result<(), String> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
