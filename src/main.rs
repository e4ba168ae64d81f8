use clap::Parser;
use muve_sumo_server::adapters::{TokioProcessLauncher, UnavailableLibrary};
use muve_sumo_server::config::Command;
use muve_sumo_server::core::environment::{
    discover_site_packages, verify_imports, SumoEnvironment,
};
use muve_sumo_server::domain::model::DEFAULT_SUMO_COMMAND;
use muve_sumo_server::utils::{logger, validation::Validate};
use muve_sumo_server::{CliConfig, ServerConfig, SumoError, SumoServer};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    let result = match cli.command {
        Command::Serve { config, dry_run } => serve(&config, dry_run).await,
        Command::Check {
            sumo_command,
            python,
            json,
        } => check(&sumo_command, &python, json).await,
        Command::Link { target, python } => link(target, &python).await,
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn serve(config_path: &Path, dry_run: bool) -> Result<(), SumoError> {
    tracing::info!("📁 Loading configuration from: {}", config_path.display());
    let config = ServerConfig::from_file(config_path)?;
    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated successfully");

    for instance in &config.instances {
        tracing::info!(
            "  • {} [{}] {} (autostart: {})",
            instance.name,
            instance.backend,
            instance.config.display(),
            instance.autostart()
        );
    }

    let mut server = SumoServer::from_config(
        &config,
        Arc::new(TokioProcessLauncher::new()),
        Arc::new(UnavailableLibrary),
    )?;

    if dry_run {
        tracing::info!("🔍 DRY RUN MODE - no SUMO instance will be started");
        println!("{}", serde_json::to_string_pretty(&server.manager().snapshots())?);
        return Ok(());
    }

    server.start_autostart().await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Could not listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("👋 {} stopped", server.name());
    Ok(())
}

async fn check(sumo_command: &str, python: &str, json: bool) -> Result<(), SumoError> {
    let environment = SumoEnvironment::from_env();
    let report = environment.inspect(sumo_command, python).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &report.executable {
            Some(path) => println!("✅ {}: {}", sumo_command, path.display()),
            None => println!("❌ {}: not found", sumo_command),
        }
        for package in &report.packages {
            match &package.path {
                Some(path) => println!("✅ {}: {}", package.name, path.display()),
                None => println!("❌ {}: not found", package.name),
            }
        }
    }

    let missing = report.missing_packages();
    if !missing.is_empty() {
        return Err(SumoError::PackageNotFound {
            package: missing.join(", "),
            reason: format!("`{}` cannot import them", python),
        });
    }
    if report.executable.is_none() {
        return Err(SumoError::ExecutableNotFound {
            command: sumo_command.to_string(),
        });
    }
    Ok(())
}

async fn link(target: Option<std::path::PathBuf>, python: &str) -> Result<(), SumoError> {
    let environment = SumoEnvironment::from_env();
    let before = environment.inspect(DEFAULT_SUMO_COMMAND, python).await;
    let missing = before.missing_packages();
    if !missing.is_empty() {
        return Err(SumoError::PackageNotFound {
            package: missing.join(", "),
            reason: format!("`{}` cannot import them before installation", python),
        });
    }

    let target = match target {
        Some(target) => target,
        None => discover_site_packages(python).await?,
    };

    tracing::info!("🔗 Linking SUMO packages into {}", target.display());
    let links = environment.link_sources(&target, &before.packages)?;
    verify_imports(python, &target).await?;
    for link in links {
        println!("✅ {}", link.display());
    }
    Ok(())
}
