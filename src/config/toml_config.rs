use crate::domain::model::{
    ConnectRetry, InstanceKind, DEFAULT_SUMO_COMMAND, STARTING_PORT_NUMBER,
};
use crate::utils::error::{Result, SumoError};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_unique_names, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub sumo: SumoSection,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub name: Option<String>,
    pub step_interval_ms: Option<u64>,
    pub status_interval_secs: Option<u64>,
    pub monitor_processes: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SumoSection {
    pub command: Option<String>,
    pub starting_port: Option<u16>,
    pub connect_attempts: Option<u32>,
    pub connect_retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub name: String,
    pub backend: InstanceKind,
    pub config: PathBuf,
    pub executable: Option<PathBuf>,
    pub port: Option<u16>,
    pub autostart: Option<bool>,
}

impl InstanceConfig {
    pub fn autostart(&self) -> bool {
        self.autostart.unwrap_or(true)
    }
}

impl ServerConfig {
    /// Load the configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SumoError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parse the configuration from a TOML string, substituting `${VAR}` first
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| SumoError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| SumoError::config(e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.instances.is_empty() {
            return Err(SumoError::MissingConfigError {
                field: "instances".to_string(),
            });
        }

        for (i, instance) in self.instances.iter().enumerate() {
            let field = |name: &str| format!("instances[{}].{}", i, name);

            validate_non_empty_string(&field("name"), &instance.name)?;
            validate_path(&field("config"), &instance.config.to_string_lossy())?;
            if let Some(executable) = &instance.executable {
                validate_path(&field("executable"), &executable.to_string_lossy())?;
            }
            if let Some(port) = instance.port {
                validate_range(&field("port"), port, 1, u16::MAX)?;
            }
        }

        validate_unique_names(
            "instances.name",
            self.instances.iter().map(|i| i.name.as_str()),
        )?;

        let autostarting_lib = self
            .instances
            .iter()
            .filter(|i| i.backend == InstanceKind::Lib && i.autostart())
            .count();
        if autostarting_lib > 1 {
            return Err(SumoError::InvalidConfigValueError {
                field: "instances.autostart".to_string(),
                value: autostarting_lib.to_string(),
                reason: "libsumo runs one simulation at a time; autostart at most one lib instance"
                    .to_string(),
            });
        }

        if let Some(command) = &self.sumo.command {
            validate_non_empty_string("sumo.command", command)?;
        }
        if let Some(port) = self.sumo.starting_port {
            validate_range("sumo.starting_port", port, 1, u16::MAX)?;
        }
        if let Some(attempts) = self.sumo.connect_attempts {
            validate_positive_number("sumo.connect_attempts", attempts.into(), 1)?;
        }
        if let Some(interval) = self.server.step_interval_ms {
            validate_positive_number("server.step_interval_ms", interval, 1)?;
        }
        if let Some(interval) = self.server.status_interval_secs {
            validate_positive_number("server.status_interval_secs", interval, 1)?;
        }

        Ok(())
    }

    pub fn server_name(&self) -> &str {
        self.server.name.as_deref().unwrap_or("muve")
    }

    pub fn sumo_command(&self) -> &str {
        self.sumo.command.as_deref().unwrap_or(DEFAULT_SUMO_COMMAND)
    }

    pub fn starting_port(&self) -> u16 {
        self.sumo.starting_port.unwrap_or(STARTING_PORT_NUMBER)
    }

    pub fn connect_retry(&self) -> ConnectRetry {
        let default = ConnectRetry::default();
        ConnectRetry::new(
            self.sumo.connect_attempts.unwrap_or(default.attempts),
            self.sumo
                .connect_retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.delay),
        )
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.server.step_interval_ms.unwrap_or(1000))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.server.status_interval_secs.unwrap_or(30))
    }

    pub fn monitor_processes(&self) -> bool {
        self.server.monitor_processes.unwrap_or(false)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_config() {
        let toml_content = r#"
[server]
name = "test-server"
step_interval_ms = 250

[sumo]
command = "sumo-gui"
starting_port = 9000

[[instances]]
name = "default"
backend = "tcp"
config = "scenario/hello.sumocfg"
port = 9100

[[instances]]
name = "inline"
backend = "lib"
config = "scenario/hello.sumocfg"
autostart = false
"#;

        let config = ServerConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.server_name(), "test-server");
        assert_eq!(config.sumo_command(), "sumo-gui");
        assert_eq!(config.starting_port(), 9000);
        assert_eq!(config.step_interval(), Duration::from_millis(250));
        assert_eq!(config.status_interval(), Duration::from_secs(30));
        assert_eq!(config.instances.len(), 2);
        assert_eq!(config.instances[0].backend, InstanceKind::Tcp);
        assert_eq!(config.instances[0].port, Some(9100));
        assert!(config.instances[0].autostart());
        assert_eq!(config.instances[1].backend, InstanceKind::Lib);
        assert!(!config.instances[1].autostart());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let toml_content = r#"
[[instances]]
name = "default"
backend = "tcp"
config = "hello.sumocfg"
"#;

        let config = ServerConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.server_name(), "muve");
        assert_eq!(config.sumo_command(), "sumo");
        assert_eq!(config.starting_port(), 8800);
        assert_eq!(config.connect_retry(), ConnectRetry::default());
        assert!(!config.monitor_processes());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("MUVE_TEST_SCENARIO_DIR", "/srv/scenarios");

        let toml_content = r#"
[[instances]]
name = "default"
backend = "lib"
config = "${MUVE_TEST_SCENARIO_DIR}/hello.sumocfg"
"#;

        let config = ServerConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.instances[0].config,
            PathBuf::from("/srv/scenarios/hello.sumocfg")
        );

        std::env::remove_var("MUVE_TEST_SCENARIO_DIR");
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let toml_content = r#"
[[instances]]
name = "default"
backend = "remote"
config = "hello.sumocfg"
"#;

        assert!(ServerConfig::from_toml_str(toml_content).is_err());
    }

    #[test]
    fn test_validation_requires_instances() {
        let config = ServerConfig::from_toml_str("[server]\nname = \"empty\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(SumoError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_duplicate_names() {
        let toml_content = r#"
[[instances]]
name = "twin"
backend = "tcp"
config = "a.sumocfg"

[[instances]]
name = "twin"
backend = "tcp"
config = "b.sumocfg"
"#;

        let config = ServerConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_two_autostarting_lib_instances() {
        let toml_content = r#"
[[instances]]
name = "one"
backend = "lib"
config = "a.sumocfg"

[[instances]]
name = "two"
backend = "lib"
config = "b.sumocfg"
"#;

        let config = ServerConfig::from_toml_str(toml_content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("instances.autostart"));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let toml_content = r#"
[server]
step_interval_ms = 0

[[instances]]
name = "default"
backend = "tcp"
config = "a.sumocfg"
port = 0
"#;

        let config = ServerConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[server]
name = "file-test"

[[instances]]
name = "default"
backend = "tcp"
config = "hello.sumocfg"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = ServerConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server_name(), "file-test");
    }
}
