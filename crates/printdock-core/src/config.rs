// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Agent configuration.
//
// Defaults are layered under raw environment variables (CLOUD_URL,
// PRINTER_NAME, POLL_INTERVAL, ...) via figment.

use std::path::PathBuf;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

use crate::error::{PrintdockError, Result};

/// Printer setting meaning "ask the spooler for its default".
pub const AUTO_PRINTER: &str = "auto";

/// Whether a printer setting asks for spooler auto-selection.
pub fn is_auto_printer(setting: &str) -> bool {
    setting.trim().eq_ignore_ascii_case(AUTO_PRINTER)
}

/// Environment variables read by [`AgentConfig::figment`].
const ENV_KEYS: &[&str] = &[
    "CLOUD_URL",
    "KIOSK_ID",
    "PRINTER_NAME",
    "POLL_INTERVAL",
    "HEARTBEAT_INTERVAL",
    "STATUS_LOG_INTERVAL",
    "RECONNECT_DELAY",
    "SCRATCH_DIR",
    "OFFICE_BINARY",
];

/// Runtime settings for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the cloud service.
    pub cloud_url: String,
    /// Identity reported in registration and heartbeats.
    pub kiosk_id: String,
    /// Spooler destination name, or `auto`.
    pub printer_name: String,
    /// Pull interval in milliseconds.
    pub poll_interval: u64,
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval: u64,
    /// Status log line interval in milliseconds.
    pub status_log_interval: u64,
    /// Fixed backoff between reconnection attempts, in milliseconds.
    pub reconnect_delay: u64,
    /// Directory holding in-flight job files.
    pub scratch_dir: PathBuf,
    /// Office suite binary used for document conversion.
    pub office_binary: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cloud_url: "http://localhost:3000".into(),
            kiosk_id: format!("kiosk-{}", hostname()),
            printer_name: AUTO_PRINTER.into(),
            poll_interval: 5_000,
            heartbeat_interval: 30_000,
            status_log_interval: 60_000,
            reconnect_delay: 5_000,
            scratch_dir: std::env::temp_dir().join("printdock"),
            office_binary: "soffice".into(),
        }
    }
}

impl AgentConfig {
    /// Defaults merged with the process environment.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::raw().only(ENV_KEYS))
    }

    /// Load and validate configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| PrintdockError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cloud_url.trim().is_empty() {
            return Err(PrintdockError::Config("CLOUD_URL must not be empty".into()));
        }
        if self.printer_name.trim().is_empty() {
            return Err(PrintdockError::Config(
                "PRINTER_NAME must be `auto` or a spooler destination".into(),
            ));
        }
        for (name, value) in [
            ("POLL_INTERVAL", self.poll_interval),
            ("HEARTBEAT_INTERVAL", self.heartbeat_interval),
            ("STATUS_LOG_INTERVAL", self.status_log_interval),
        ] {
            if value == 0 {
                return Err(PrintdockError::Config(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }

    pub fn poll_every(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }

    pub fn heartbeat_every(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }

    pub fn status_log_every(&self) -> Duration {
        Duration::from_millis(self.status_log_interval)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay)
    }
}

/// Best-effort host name for registration.
pub fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert!(is_auto_printer(&config.printer_name));
        assert_eq!(config.poll_every(), Duration::from_millis(5_000));
        assert_eq!(config.heartbeat_every(), Duration::from_secs(30));
    }

    #[test]
    fn environment_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CLOUD_URL", "https://cloud.example");
            jail.set_env("PRINTER_NAME", "Office_Laser");
            jail.set_env("POLL_INTERVAL", "1500");

            let config: AgentConfig = AgentConfig::figment().extract()?;
            assert_eq!(config.cloud_url, "https://cloud.example");
            assert_eq!(config.printer_name, "Office_Laser");
            assert!(!is_auto_printer(&config.printer_name));
            assert_eq!(config.poll_interval, 1500);
            assert_eq!(config.heartbeat_interval, 30_000);
            Ok(())
        });
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = AgentConfig {
            poll_interval: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("POLL_INTERVAL"));
    }

    #[test]
    fn auto_is_case_insensitive() {
        assert!(is_auto_printer("AUTO"));
        assert!(is_auto_printer(" auto "));
        assert!(!is_auto_printer("Office_Laser"));
    }
}
