// Fakes for the process and library ports used by unit tests.

use crate::domain::ports::{ProcessLauncher, SimulationLibrary, SumoProcess};
use crate::utils::error::{Result, SumoError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct RecordingLauncher {
    spawned: Mutex<Vec<(PathBuf, Vec<String>)>>,
    terminated: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingLauncher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn spawned(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn spawn(&self, program: &Path, args: &[String]) -> Result<Box<dyn SumoProcess>> {
        if self.fail {
            return Err(SumoError::ProcessError {
                message: "spawn refused".to_string(),
                source: None,
            });
        }

        let mut spawned = self.spawned.lock().unwrap();
        spawned.push((program.to_path_buf(), args.to_vec()));
        Ok(Box::new(FakeProcess {
            id: 4000 + spawned.len() as u32,
            terminated: self.terminated.clone(),
        }))
    }
}

pub struct FakeProcess {
    id: u32,
    terminated: Arc<AtomicUsize>,
}

#[async_trait]
impl SumoProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.id)
    }

    async fn terminate(&mut self) -> Result<()> {
        self.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLibrary {
    started_with: Mutex<Vec<Vec<String>>>,
    steps: AtomicUsize,
    closes: AtomicUsize,
    fail_start: bool,
    fail_step: bool,
    fail_close: bool,
}

impl FakeLibrary {
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn failing_step() -> Self {
        Self {
            fail_step: true,
            ..Self::default()
        }
    }

    pub fn failing_close() -> Self {
        Self {
            fail_close: true,
            ..Self::default()
        }
    }

    pub fn started_with(&self) -> Vec<Vec<String>> {
        self.started_with.lock().unwrap().clone()
    }

    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl SimulationLibrary for FakeLibrary {
    fn start(&self, args: &[String]) -> std::result::Result<(), String> {
        if self.fail_start {
            return Err("Error: Cannot read file".to_string());
        }
        self.started_with.lock().unwrap().push(args.to_vec());
        Ok(())
    }

    fn simulation_step(&self) -> std::result::Result<(), String> {
        if self.fail_step {
            return Err("Error: simulation ended".to_string());
        }
        self.steps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> std::result::Result<(), String> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err("Error: connection closed by SUMO".to_string());
        }
        Ok(())
    }
}
