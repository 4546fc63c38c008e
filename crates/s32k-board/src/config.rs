//! Machine configuration: TOML parsing, serialization, and validation.
//!
//! A configuration selects the CPU type, how many UARTs to wire, where the
//! firmware comes from, and what each UART's bytes are bound to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chardev::{CharBackend, SerialSpec};
use crate::error::{BoardError, Result};
use crate::interrupt::SUPPORTED_CPUS;
use crate::layout::BoardLayout;

/// Host-supplied machine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MachineConfig {
    /// CPU core type; the layout's default when omitted.
    #[serde(default)]
    pub cpu_type: Option<String>,
    /// Number of UART instances to wire.
    #[serde(default = "default_uart_count")]
    pub uart_count: u32,
    /// Firmware image path, read by the host.
    #[serde(default)]
    pub firmware: Option<PathBuf>,
    /// Per-UART sink bindings, in instance order.
    #[serde(default)]
    pub serial: Vec<String>,
}

fn default_uart_count() -> u32 {
    16
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            cpu_type: None,
            uart_count: default_uart_count(),
            firmware: None,
            serial: Vec::new(),
        }
    }
}

impl MachineConfig {
    /// CPU type after applying the layout default.
    pub fn cpu_type_or<'a>(&'a self, layout: &'a BoardLayout) -> &'a str {
        self.cpu_type.as_deref().unwrap_or(&layout.default_cpu)
    }

    /// Parsed sink bindings.
    pub fn serial_specs(&self) -> Result<Vec<SerialSpec>> {
        self.serial.iter().map(|s| s.parse()).collect()
    }

    /// Open every bound sink.
    pub fn open_serial(&self) -> Result<Vec<Arc<dyn CharBackend>>> {
        self.serial_specs()?.iter().map(SerialSpec::open).collect()
    }
}

/// How serious a validation issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A validation issue found in a machine configuration.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}

/// Load a configuration from a TOML file.
pub fn load_config_toml(path: &Path) -> Result<MachineConfig> {
    if !path.exists() {
        return Err(BoardError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    parse_config_toml(&content)
}

/// Parse a configuration from a TOML string.
pub fn parse_config_toml(toml_str: &str) -> Result<MachineConfig> {
    let config: MachineConfig = toml::from_str(toml_str)?;
    Ok(config)
}

/// Serialize a configuration to pretty TOML.
pub fn config_to_toml(config: &MachineConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

/// A starter configuration for the given layout.
pub fn generate_template(layout: &BoardLayout) -> Result<String> {
    let config = MachineConfig {
        cpu_type: Some(layout.default_cpu.clone()),
        uart_count: default_uart_count(),
        firmware: Some(PathBuf::from("firmware.bin")),
        serial: vec!["stdio".into()],
    };
    config_to_toml(&config)
}

/// Check a configuration against a layout.
///
/// Returns `Ok(())` if there are no issues, or `Err(issues)` otherwise.
pub fn validate_config(
    config: &MachineConfig,
    layout: &BoardLayout,
) -> std::result::Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let mut error = |message: String| {
        issues.push(ValidationIssue {
            severity: Severity::Error,
            message,
        })
    };

    let cpu = config.cpu_type_or(layout);
    if !SUPPORTED_CPUS.contains(&cpu) {
        error(format!(
            "cpu type '{cpu}' is not supported (expected one of {})",
            SUPPORTED_CPUS.join(", ")
        ));
    }

    if config.uart_count > layout.controller.lines {
        error(format!(
            "uart-count {} exceeds the {} interrupt lines",
            config.uart_count, layout.controller.lines
        ));
    }

    let window_end =
        layout.uart.base as u128 + layout.uart.stride as u128 * config.uart_count as u128;
    if window_end > 1u128 << layout.address_bits {
        error(format!(
            "uart-count {} places MMIO windows beyond the {}-bit address space",
            config.uart_count, layout.address_bits
        ));
    }

    for binding in &config.serial {
        if let Err(e) = binding.parse::<SerialSpec>() {
            error(e.to_string());
        }
    }

    if config.serial.len() > config.uart_count as usize {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            message: format!(
                "{} serial bindings given for {} UARTs; extras are ignored",
                config.serial.len(),
                config.uart_count
            ),
        });
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config = parse_config_toml("").unwrap();
        assert_eq!(config, MachineConfig::default());
        assert_eq!(config.uart_count, 16);
        let layout = BoardLayout::s32k3x8evb();
        assert_eq!(config.cpu_type_or(&layout), "cortex-m7");
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
cpu-type = "cortex-m4"
uart-count = 4
firmware = "build/app.bin"
serial = ["stdio", "null", "file:uart2.log"]
"#;
        let config = parse_config_toml(toml_str).unwrap();
        assert_eq!(config.cpu_type.as_deref(), Some("cortex-m4"));
        assert_eq!(config.uart_count, 4);
        assert_eq!(config.firmware, Some(PathBuf::from("build/app.bin")));
        let specs = config.serial_specs().unwrap();
        assert_eq!(specs[2], SerialSpec::File(PathBuf::from("uart2.log")));
    }

    #[test]
    fn parse_invalid_returns_error() {
        assert!(parse_config_toml("uart-count = \"many\"").is_err());
        assert!(parse_config_toml("not toml [[[").is_err());
    }

    #[test]
    fn template_round_trips_and_validates() {
        let layout = BoardLayout::s32k3x8evb();
        let toml_str = generate_template(&layout).unwrap();
        let config = parse_config_toml(&toml_str).unwrap();
        assert_eq!(config.cpu_type.as_deref(), Some("cortex-m7"));
        assert!(validate_config(&config, &layout).is_ok());
    }

    #[test]
    fn validate_catches_errors() {
        let layout = BoardLayout::s32k3x8evb();
        let config = MachineConfig {
            cpu_type: Some("cortex-a72".into()),
            uart_count: 300,
            firmware: None,
            serial: vec!["tcp:4444".into()],
        };
        let issues = validate_config(&config, &layout).unwrap_err();
        assert!(issues.iter().all(|i| i.severity == Severity::Error));
        assert!(issues.iter().any(|i| i.message.contains("cortex-a72")));
        assert!(issues.iter().any(|i| i.message.contains("interrupt lines")));
        assert!(issues.iter().any(|i| i.message.contains("tcp:4444")));
    }

    #[test]
    fn extra_bindings_warn() {
        let layout = BoardLayout::s32k3x8evb();
        let config = MachineConfig {
            uart_count: 1,
            serial: vec!["null".into(), "null".into()],
            ..MachineConfig::default()
        };
        let issues = validate_config(&config, &layout).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");
        std::fs::write(&path, "uart-count = 2\n").unwrap();
        let config = load_config_toml(&path).unwrap();
        assert_eq!(config.uart_count, 2);
    }

    #[test]
    fn load_not_found() {
        let result = load_config_toml(Path::new("/nonexistent/board.toml"));
        assert!(matches!(result.unwrap_err(), BoardError::NotFound { .. }));
    }
}
