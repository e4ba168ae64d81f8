//! Discovery of a SUMO installation and linking of its Python packages
//! (`libsumo`, `traci`, `sumolib`) into a target environment.

use crate::domain::model::{
    EnvironmentReport, PackageStatus, DEFAULT_SUMO_COMMAND, SUMO_PACKAGES,
};
use crate::utils::error::{Result, SumoError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const SUMO_HOME_VAR: &str = "SUMO_HOME";

const SITE_PACKAGES_PROBE: &str = "import site; print(site.getsitepackages()[0])";
const PYTHONPATH_VAR: &str = "PYTHONPATH";

#[derive(Debug, Clone, Default)]
pub struct SumoEnvironment {
    sumo_home: Option<PathBuf>,
    path: Option<OsString>,
}

impl SumoEnvironment {
    pub fn new(sumo_home: Option<PathBuf>, path: Option<OsString>) -> Self {
        Self { sumo_home, path }
    }

    pub fn from_env() -> Self {
        let sumo_home = std::env::var_os(SUMO_HOME_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(sumo_home, std::env::var_os("PATH"))
    }

    pub fn sumo_home(&self) -> Option<&Path> {
        self.sumo_home.as_deref()
    }

    pub fn tools_dir(&self) -> Option<PathBuf> {
        self.sumo_home.as_ref().map(|home| home.join("tools"))
    }

    /// Resolves a command the way a shell would, falling back to `$SUMO_HOME/bin`.
    pub fn find_executable(&self, command: &str) -> Option<PathBuf> {
        let candidate = Path::new(command);
        if candidate.components().count() > 1 || candidate.is_absolute() {
            return is_executable(candidate).then(|| candidate.to_path_buf());
        }

        let path_dirs = self
            .path
            .as_ref()
            .map(|p| std::env::split_paths(p).collect::<Vec<_>>())
            .unwrap_or_default();

        path_dirs
            .into_iter()
            .chain(self.sumo_home.iter().map(|home| home.join("bin")))
            .flat_map(|dir| executable_names(command).into_iter().map(move |n| dir.join(n)))
            .find(|p| is_executable(p))
    }

    pub fn locate_package(&self, package: &str) -> Result<PathBuf> {
        let tools = self.tools_dir().ok_or_else(|| SumoError::PackageNotFound {
            package: package.to_string(),
            reason: format!("{} is not set", SUMO_HOME_VAR),
        })?;

        let dir = tools.join(package);
        if !dir.is_dir() {
            return Err(SumoError::PackageNotFound {
                package: package.to_string(),
                reason: format!("{} is not a directory", dir.display()),
            });
        }
        // Links must not depend on the working directory
        dir.canonicalize().map_err(|e| SumoError::PackageNotFound {
            package: package.to_string(),
            reason: format!("{} does not resolve: {}", dir.display(), e),
        })
    }

    pub fn probe(&self, command: &str) -> EnvironmentReport {
        let packages = SUMO_PACKAGES
            .iter()
            .map(|name| PackageStatus {
                name: name.to_string(),
                path: self.locate_package(name).ok(),
            })
            .collect();

        EnvironmentReport {
            sumo_home: self.sumo_home.clone(),
            executable: self.find_executable(command),
            packages,
        }
    }

    /// Imports each package with `python` and reports where it was found.
    ///
    /// `$SUMO_HOME/tools` is searched ahead of the interpreter's own paths, so
    /// both a SUMO checkout and a pip-installed SUMO are found. A package whose
    /// import fails is reported without a path.
    pub async fn probe_imports(&self, python: &str, packages: &[&str]) -> Vec<PackageStatus> {
        let tools = self.tools_dir();
        let mut statuses = Vec::with_capacity(packages.len());
        for package in packages {
            let path = match import_package(python, package, tools.as_deref()).await {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::debug!("{}", e);
                    None
                }
            };
            statuses.push(PackageStatus {
                name: package.to_string(),
                path,
            });
        }
        statuses
    }

    /// Like [`probe`](Self::probe), but packages count as present only when
    /// `python` can import them.
    pub async fn inspect(&self, command: &str, python: &str) -> EnvironmentReport {
        EnvironmentReport {
            sumo_home: self.sumo_home.clone(),
            executable: self.find_executable(command),
            packages: self.probe_imports(python, &SUMO_PACKAGES).await,
        }
    }

    /// Symlinks every SUMO package into `target` and verifies the links.
    ///
    /// All packages are located before `target` is touched.
    pub fn link_packages(&self, target: &Path) -> Result<Vec<PathBuf>> {
        let report = self.probe(DEFAULT_SUMO_COMMAND);
        self.link_sources(target, &report.packages)
    }

    /// Symlinks already located packages into `target` and verifies the links.
    pub fn link_sources(&self, target: &Path, packages: &[PackageStatus]) -> Result<Vec<PathBuf>> {
        let missing: Vec<&str> = packages
            .iter()
            .filter(|p| p.path.is_none())
            .map(|p| p.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(SumoError::PackageNotFound {
                package: missing.join(", "),
                reason: match self.tools_dir() {
                    Some(tools) => format!("not found under {} or not importable", tools.display()),
                    None => format!(
                        "{} is not set and the packages are not importable",
                        SUMO_HOME_VAR
                    ),
                },
            });
        }

        std::fs::create_dir_all(target)?;

        let mut links = Vec::with_capacity(packages.len());
        for package in packages {
            let source = match &package.path {
                Some(path) => path,
                None => continue,
            };
            let link = target.join(&package.name);
            link_package(source, &link)?;
            tracing::info!("Linked {} -> {}", link.display(), source.display());
            links.push(link);
        }

        verify_sources(target, packages)?;
        Ok(links)
    }

    /// Checks that each package under `target` resolves to the installation's copy.
    pub fn verify_links(&self, target: &Path) -> Result<()> {
        let packages = SUMO_PACKAGES
            .iter()
            .map(|package| {
                Ok(PackageStatus {
                    name: package.to_string(),
                    path: Some(self.locate_package(package)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        verify_sources(target, &packages)
    }
}

fn verify_sources(target: &Path, packages: &[PackageStatus]) -> Result<()> {
    for package in packages {
        let Some(expected) = &package.path else {
            continue;
        };
        let link = target.join(&package.name);

        let resolved = link.canonicalize().map_err(|e| SumoError::PackageNotFound {
            package: package.name.clone(),
            reason: format!("{} does not resolve: {}", link.display(), e),
        })?;
        let expected = expected.canonicalize().map_err(|e| SumoError::PackageNotFound {
            package: package.name.clone(),
            reason: format!("{} does not resolve: {}", expected.display(), e),
        })?;
        if resolved != expected {
            return Err(SumoError::PackageNotFound {
                package: package.name.clone(),
                reason: format!(
                    "{} points at {} instead of {}",
                    link.display(),
                    resolved.display(),
                    expected.display()
                ),
            });
        }
    }
    Ok(())
}

/// Imports `package` with `python`, searching `search_path` first, and
/// returns the package directory.
pub async fn import_package(
    python: &str,
    package: &str,
    search_path: Option<&Path>,
) -> Result<PathBuf> {
    let script = format!("import {0}; print(list({0}.__path__)[0])", package);
    let mut command = Command::new(python);
    command.args(["-c", &script]);
    if let Some(dir) = search_path {
        command.env(PYTHONPATH_VAR, prepend_search_path(dir)?);
    }

    let output = command.output().await.map_err(|e| SumoError::PackageNotFound {
        package: package.to_string(),
        reason: format!("could not run `{}`: {}", python, e),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SumoError::PackageNotFound {
            package: package.to_string(),
            reason: format!(
                "`{}` cannot import it: {}",
                python,
                stderr.lines().last().unwrap_or("unknown error").trim()
            ),
        });
    }

    let dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
    PathBuf::from(&dir)
        .canonicalize()
        .map_err(|e| SumoError::PackageNotFound {
            package: package.to_string(),
            reason: format!("imported from {} which does not resolve: {}", dir, e),
        })
}

/// Post-install check: every SUMO package imports from `target`.
pub async fn verify_imports(python: &str, target: &Path) -> Result<()> {
    for package in SUMO_PACKAGES {
        let imported = import_package(python, package, Some(target)).await?;
        tracing::debug!("{} imports from {}", package, imported.display());
    }
    Ok(())
}

fn prepend_search_path(dir: &Path) -> Result<OsString> {
    let dir = std::path::absolute(dir)?;
    let existing = std::env::var_os(PYTHONPATH_VAR).unwrap_or_default();
    let paths = std::iter::once(dir).chain(std::env::split_paths(&existing));
    std::env::join_paths(paths).map_err(|e| SumoError::EnvironmentError {
        message: format!("cannot build {}: {}", PYTHONPATH_VAR, e),
    })
}

/// First site-packages directory of a Python interpreter.
pub async fn discover_site_packages(python: &str) -> Result<PathBuf> {
    let output = Command::new(python)
        .args(["-c", SITE_PACKAGES_PROBE])
        .output()
        .await
        .map_err(|e| SumoError::EnvironmentError {
            message: format!("could not run `{}`: {}", python, e),
        })?;

    if !output.status.success() {
        return Err(SumoError::EnvironmentError {
            message: format!(
                "`{}` failed to report site-packages: {}",
                python,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if dir.is_empty() {
        return Err(SumoError::EnvironmentError {
            message: format!("`{}` reported no site-packages directory", python),
        });
    }
    Ok(PathBuf::from(dir))
}

fn link_package(source: &Path, link: &Path) -> Result<()> {
    // The interpreter may already import the package from `link` itself
    if let (Ok(existing), Ok(wanted)) = (link.canonicalize(), source.canonicalize()) {
        if existing == wanted {
            tracing::debug!("{} already provides {}", link.display(), source.display());
            return Ok(());
        }
    }

    match std::fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if link.exists() {
                return Err(SumoError::EnvironmentError {
                    message: format!("{} already links elsewhere", link.display()),
                });
            }
            tracing::warn!("Replacing dangling link {}", link.display());
            std::fs::remove_file(link)?;
            symlink_dir(source, link)?;
            Ok(())
        }
        Ok(_) => Err(SumoError::EnvironmentError {
            message: format!("{} already exists and is not a link", link.display()),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            symlink_dir(source, link)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn symlink_dir(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn symlink_dir(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(source, link)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(windows)]
fn executable_names(command: &str) -> Vec<String> {
    vec![command.to_string(), format!("{}.exe", command)]
}

#[cfg(not(windows))]
fn executable_names(command: &str) -> Vec<String> {
    vec![command.to_string()]
}
