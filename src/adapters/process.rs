use crate::domain::ports::{ProcessLauncher, SumoProcess};
use crate::utils::error::{Result, SumoError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Spawns SUMO through `tokio::process`. Children are killed when dropped.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessLauncher;

impl TokioProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for TokioProcessLauncher {
    fn spawn(&self, program: &Path, args: &[String]) -> Result<Box<dyn SumoProcess>> {
        tracing::debug!("Spawning {} {}", program.display(), args.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SumoError::ProcessError {
                message: format!("failed to spawn {}", program.display()),
                source: Some(e),
            })?;

        Ok(Box::new(TokioSumoProcess { child }))
    }
}

#[derive(Debug)]
pub struct TokioSumoProcess {
    child: Child,
}

#[async_trait]
impl SumoProcess for TokioSumoProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn terminate(&mut self) -> Result<()> {
        // Already reaped
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }

        self.child.kill().await.map_err(|e| SumoError::ProcessError {
            message: "failed to kill SUMO process".to_string(),
            source: Some(e),
        })
    }
}
