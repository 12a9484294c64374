//! Configuration types for launching a driven terminal.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Dimensions, Error, Shell};

/// Driver configuration loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Terminal settings
    pub terminal: TerminalSettings,
    /// Process transport selection
    pub transport: TransportConfig,
    /// Shell-integration settings
    pub shell_integration: ShellIntegrationSettings,
    /// Default timeout for waits and `run`, in milliseconds
    pub timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            terminal: TerminalSettings::default(),
            transport: TransportConfig::default(),
            shell_integration: ShellIntegrationSettings::default(),
            timeout_ms: 10_000,
        }
    }
}

impl DriverConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        let config: DriverConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.terminal.rows == 0 || self.terminal.cols == 0 {
            return Err(Error::InvalidDimensions {
                rows: self.terminal.rows,
                cols: self.terminal.cols,
            });
        }

        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be > 0".to_string()));
        }

        if let Some(shell) = &self.shell_integration.shell {
            shell.parse::<Shell>()?;
        }

        Ok(())
    }
}

/// Terminal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    /// Terminal columns
    pub cols: u16,
    /// Terminal rows
    pub rows: u16,
    /// Scrollback buffer lines
    pub scrollback_lines: usize,
    /// TERM environment variable value
    pub term: String,
}

impl TerminalSettings {
    /// Configured terminal size.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.rows, self.cols)
    }
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            scrollback_lines: 5000,
            term: "xterm-256color".to_string(),
        }
    }
}

/// Process transport selection, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Local pseudo-terminal
    LocalPty {
        /// Program to run (platform shell if unset)
        #[serde(default)]
        program: Option<String>,
        /// Program arguments
        #[serde(default)]
        args: Vec<String>,
        /// Working directory
        #[serde(default)]
        cwd: Option<String>,
        /// Extra environment variables
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::LocalPty {
            program: None,
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
        }
    }
}

/// Shell-integration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellIntegrationSettings {
    /// Inject the integration script after launch
    pub enable: bool,
    /// Shell family (inferred from the process name if unset)
    pub shell: Option<String>,
    /// Fail the launch when verification fails
    pub strict: bool,
    /// How long to wait for the verification sentinel, in milliseconds
    pub verify_timeout_ms: u64,
}

impl Default for ShellIntegrationSettings {
    fn default() -> Self {
        Self {
            enable: false,
            shell: None,
            strict: false,
            verify_timeout_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.terminal.dimensions(), Dimensions::new(24, 80));
        assert_eq!(config.terminal.scrollback_lines, 5000);
        assert_eq!(config.timeout_ms, 10_000);
        assert!(!config.shell_integration.enable);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_dimensions() {
        let mut config = DriverConfig::default();
        config.terminal.rows = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidDimensions { rows: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_timeout() {
        let mut config = DriverConfig::default();
        config.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
terminal:
  cols: 120
  rows: 30
  scrollback_lines: 2000

transport:
  kind: local_pty
  program: /bin/bash
  args: ["--norc", "--noprofile"]
  env:
    LANG: C.UTF-8

shell_integration:
  enable: true
  shell: bash
  strict: true

timeout_ms: 3000
"#;

        let config = DriverConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.terminal.dimensions(), Dimensions::new(30, 120));
        assert_eq!(config.terminal.term, "xterm-256color");
        assert_eq!(config.timeout_ms, 3000);
        assert!(config.shell_integration.strict);
        assert_eq!(config.shell_integration.verify_timeout_ms, 5000);

        let TransportConfig::LocalPty {
            program, args, env, ..
        } = config.transport;
        assert_eq!(program.as_deref(), Some("/bin/bash"));
        assert_eq!(args, vec!["--norc", "--noprofile"]);
        assert_eq!(env.get("LANG").map(String::as_str), Some("C.UTF-8"));
    }

    #[test]
    fn test_unknown_transport_kind() {
        let yaml = "transport:\n  kind: docker\n";
        let err = DriverConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unsupported_shell() {
        let yaml = "shell_integration:\n  enable: true\n  shell: fish\n";
        let err = DriverConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::UnsupportedShell(_)));
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = DriverConfig::from_yaml("{}").unwrap();
        assert_eq!(config, DriverConfig::default());
    }
}
