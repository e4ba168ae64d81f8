mod common;

use anyhow::Result;
use common::{CountingLibrary, FakeLauncher};
use muve_sumo_server::core::{ConnectRetry, InstanceKind, SumoInstance};
use muve_sumo_server::{SumoEnvironment, SumoError, SumoInstanceManager};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

fn manager(launcher: Arc<FakeLauncher>, library: Arc<CountingLibrary>) -> SumoInstanceManager {
    SumoInstanceManager::new(launcher, library)
        .with_environment(SumoEnvironment::new(None, None))
        .with_connect_retry(ConnectRetry::new(3, Duration::from_millis(20)))
}

#[tokio::test]
async fn test_tcp_instance_full_lifecycle() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let scenario = NamedTempFile::new()?;
    let launcher = Arc::new(FakeLauncher::default());
    let mut manager = manager(launcher.clone(), Arc::new(CountingLibrary::default()));

    let instance = manager.create_local_tcp_instance(
        "city",
        scenario.path(),
        Some(scenario.path().to_path_buf()),
        Some(port),
    )?;
    instance.start().await?;

    // SUMO side of the socket sees the connection
    let (mut accepted, _) = listener.accept().await?;

    let snapshot = manager.get_instance("city")?.as_instance().snapshot("city");
    assert_eq!(snapshot.kind, InstanceKind::Tcp);
    assert_eq!(snapshot.port, Some(port));
    assert!(snapshot.started);
    assert!(snapshot.started_at.is_some());

    manager.destroy_instance("city").await?;
    assert_eq!(launcher.spawn_count(), 1);
    assert_eq!(launcher.terminated(), 1);

    // Closed by the manager, so the peer reads EOF
    let mut buf = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), accepted.read_to_end(&mut buf)).await??;
    assert_eq!(read, 0);

    assert!(matches!(
        manager.get_instance("city"),
        Err(SumoError::InstanceNotCreated { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_tcp_instance_start_fails_without_sumo_listening() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let scenario = NamedTempFile::new()?;
    let launcher = Arc::new(FakeLauncher::default());
    let mut manager = manager(launcher.clone(), Arc::new(CountingLibrary::default()));

    let instance = manager.create_local_tcp_instance(
        "unreachable",
        scenario.path(),
        Some(scenario.path().to_path_buf()),
        Some(port),
    )?;
    let err = instance.start().await.unwrap_err();

    assert!(matches!(err, SumoError::SocketError { .. }));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(launcher.terminated(), 1);
    assert!(!instance.is_started());
    Ok(())
}

#[tokio::test]
async fn test_lib_instances_share_one_simulation_slot() -> Result<()> {
    let scenario = NamedTempFile::new()?;
    let library = Arc::new(CountingLibrary::default());
    let mut manager = manager(Arc::new(FakeLauncher::default()), library.clone());

    manager
        .create_local_lib_instance("first", scenario.path())?
        .start()
        .await?;
    manager.create_local_lib_instance("second", scenario.path())?;

    let err = manager
        .get_instance_mut("second")?
        .as_instance_mut()
        .start()
        .await
        .unwrap_err();
    assert!(matches!(err, SumoError::LibraryError { .. }));

    for _ in 0..3 {
        manager.get_instance_mut("first")?.as_instance_mut().step().await?;
    }
    assert_eq!(library.steps(), 3);

    manager.destroy_instance("first").await?;
    manager
        .get_instance_mut("second")?
        .as_instance_mut()
        .start()
        .await?;

    manager.shutdown_all().await?;
    assert_eq!(library.closes(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unavailable_library_never_starts() -> Result<()> {
    let scenario = NamedTempFile::new()?;
    let mut manager = SumoInstanceManager::local()
        .with_environment(SumoEnvironment::new(None, None));

    let instance = manager.create_local_lib_instance("default", scenario.path())?;
    let err = instance.start().await.unwrap_err();

    assert!(err.to_string().contains("not available"));
    assert!(!manager.library().is_running());
    Ok(())
}

#[tokio::test]
async fn test_default_executable_comes_from_sumo_home() -> Result<()> {
    let home = tempfile::TempDir::new()?;
    let bin = home.path().join("bin");
    std::fs::create_dir_all(&bin)?;
    let sumo = bin.join("sumo");
    std::fs::write(&sumo, "#!/bin/sh\n")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&sumo, std::fs::Permissions::from_mode(0o755))?;
    }

    let scenario = NamedTempFile::new()?;
    let mut manager = SumoInstanceManager::new(
        Arc::new(FakeLauncher::default()),
        Arc::new(CountingLibrary::default()),
    )
    .with_environment(SumoEnvironment::new(Some(home.path().to_path_buf()), None));

    let instance = manager.create_local_tcp_instance("default", scenario.path(), None, None)?;
    assert_eq!(instance.executable(), sumo.as_path());
    assert_eq!(instance.port(), Some(8800));
    Ok(())
}
