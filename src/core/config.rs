//! Settings snapshot and its persistent store.
//!
//! Settings are kept as TOML with one table per concern (`[email]`,
//! `[hardware]`, `[reports]`, `[server]`, `[monitoring]`). Loading never
//! fails: a key that is missing or has the wrong type falls back to its
//! default and a warning is logged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{HostwatchError, Result};

const CONFIG_DIR_NAME: &str = "hostwatch";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSettings {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub from: String,
    pub password: String,
    pub to: Vec<String>,
    /// Prefix placed in front of every outgoing subject
    pub subject: String,
    /// Minimum minutes between two gated alerts for the same key
    pub frequency_minutes: u32,
    pub send_repeat_email: bool,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            from: String::new(),
            password: String::new(),
            to: Vec::new(),
            subject: "Service Alert".to_string(),
            frequency_minutes: 30,
            send_repeat_email: false,
        }
    }
}

impl EmailSettings {
    /// Whether enough is configured to talk to an SMTP server
    pub fn is_configured(&self) -> bool {
        !self.smtp_server.is_empty() && !self.from.is_empty() && !self.to.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareSettings {
    pub cpu_threshold: u8,
    pub ram_threshold: u8,
    pub max_restart_attempts: u32,
    pub auto_restart_service: bool,
    /// Device name -> percent used
    pub disk_thresholds: BTreeMap<String, u8>,
}

impl Default for HardwareSettings {
    fn default() -> Self {
        Self {
            cpu_threshold: 80,
            ram_threshold: 80,
            max_restart_attempts: 3,
            auto_restart_service: false,
            disk_thresholds: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub daily: bool,
    pub weekly: bool,
    pub monthly: bool,
    pub report_active: bool,
    /// Unix timestamp (seconds) of the last periodic report
    pub last_report_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub ip: String,
    pub port: u16,
    pub enable_remote_monitoring: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 5000,
            enable_remote_monitoring: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSettings {
    pub services: Vec<String>,
    pub processes: Vec<String>,
}

/// Complete settings snapshot, read by every component at the start of a cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub email: EmailSettings,
    pub hardware: HardwareSettings,
    pub reports: ReportSettings,
    pub server: ServerSettings,
    pub monitoring: MonitoringSettings,
}

impl Settings {
    /// Parse settings from TOML text, falling back to defaults per field.
    ///
    /// Text that is not valid TOML at all yields the full default settings.
    pub fn from_toml_lenient(text: &str) -> Self {
        let root: toml::Table = match text.parse() {
            Ok(table) => table,
            Err(e) => {
                log::warn!("Settings file is not valid TOML, using defaults: {}", e);
                return Settings::default();
            }
        };

        let email = Section::new(&root, "email");
        let hardware = Section::new(&root, "hardware");
        let reports = Section::new(&root, "reports");
        let server = Section::new(&root, "server");
        let monitoring = Section::new(&root, "monitoring");

        let email_defaults = EmailSettings::default();
        let hardware_defaults = HardwareSettings::default();
        let server_defaults = ServerSettings::default();

        let disk_thresholds = hardware
            .get::<BTreeMap<String, i64>>("disk_thresholds", BTreeMap::new())
            .into_iter()
            .filter_map(|(device, value)| match percent_in_range(value) {
                Some(percent) => Some((device, percent)),
                None => {
                    log::warn!(
                        "Ignoring disk threshold {} for {}: must be between 1 and 100",
                        value,
                        device
                    );
                    None
                }
            })
            .collect();

        Settings {
            email: EmailSettings {
                smtp_server: email.get("smtp_server", email_defaults.smtp_server),
                smtp_port: email.get("smtp_port", email_defaults.smtp_port),
                from: email.get("from", email_defaults.from),
                password: email.get("password", email_defaults.password),
                to: email.get_list("to"),
                subject: email.get("subject", email_defaults.subject),
                frequency_minutes: email
                    .get("frequency_minutes", email_defaults.frequency_minutes),
                send_repeat_email: email
                    .get("send_repeat_email", email_defaults.send_repeat_email),
            },
            hardware: HardwareSettings {
                cpu_threshold: hardware.get_percent("cpu_threshold", hardware_defaults.cpu_threshold),
                ram_threshold: hardware.get_percent("ram_threshold", hardware_defaults.ram_threshold),
                max_restart_attempts: hardware
                    .get("max_restart_attempts", hardware_defaults.max_restart_attempts)
                    .max(1),
                auto_restart_service: hardware
                    .get("auto_restart_service", hardware_defaults.auto_restart_service),
                disk_thresholds,
            },
            reports: ReportSettings {
                daily: reports.get("daily", false),
                weekly: reports.get("weekly", false),
                monthly: reports.get("monthly", false),
                report_active: reports.get("report_active", false),
                last_report_time: reports.get("last_report_time", 0),
            },
            server: ServerSettings {
                ip: server.get("ip", server_defaults.ip),
                port: server.get("port", server_defaults.port),
                enable_remote_monitoring: server.get("enable_remote_monitoring", false),
            },
            monitoring: MonitoringSettings {
                services: monitoring.get_list("services"),
                processes: monitoring.get_list("processes"),
            },
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Set the threshold for a disk device, validating the 1..=100 range
    pub fn set_disk_threshold(&mut self, device: &str, percent: i64) -> Result<()> {
        let percent = percent_in_range(percent)
            .ok_or_else(|| HostwatchError::invalid_threshold(format!("disk {}", device), percent))?;
        self.hardware
            .disk_thresholds
            .insert(device.to_string(), percent);
        Ok(())
    }
}

fn percent_in_range(value: i64) -> Option<u8> {
    if (1..=100).contains(&value) {
        Some(value as u8)
    } else {
        None
    }
}

/// One `[section]` of the settings file with typed, defaulting accessors
struct Section<'a> {
    name: &'static str,
    table: Option<&'a toml::Table>,
}

impl<'a> Section<'a> {
    fn new(root: &'a toml::Table, name: &'static str) -> Self {
        let table = match root.get(name) {
            Some(toml::Value::Table(table)) => Some(table),
            Some(_) => {
                log::warn!("Settings section [{}] is not a table, using defaults", name);
                None
            }
            None => None,
        };
        Self { name, table }
    }

    fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(value) = self.table.and_then(|t| t.get(key)) else {
            return default;
        };

        match value.clone().try_into::<T>() {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!(
                    "Invalid value for [{}] {}: {}; using default",
                    self.name,
                    key,
                    e
                );
                default
            }
        }
    }

    fn get_percent(&self, key: &str, default: u8) -> u8 {
        let raw = self.get::<i64>(key, default as i64);
        match percent_in_range(raw) {
            Some(percent) => percent,
            None => {
                log::warn!(
                    "[{}] {} = {} is outside 1..=100, using {}",
                    self.name,
                    key,
                    raw,
                    default
                );
                default
            }
        }
    }

    /// Lists accept both a TOML array and the legacy comma-separated string
    fn get_list(&self, key: &str) -> Vec<String> {
        let items = match self.table.and_then(|t| t.get(key)) {
            None => Vec::new(),
            Some(toml::Value::String(joined)) => joined.split(',').map(str::to_string).collect(),
            Some(_) => self.get::<Vec<String>>(key, Vec::new()),
        };

        let mut cleaned: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let item = item.trim();
            if !item.is_empty() && !cleaned.iter().any(|existing| existing == item) {
                cleaned.push(item.to_string());
            }
        }
        cleaned
    }
}

/// Loads and saves the settings snapshot
pub trait SettingsStore: Send + Sync {
    /// Load settings; never fails, falls back to defaults
    fn load(&self) -> Settings;

    fn save(&self, settings: &Settings) -> Result<()>;

    /// Modification stamp used to detect external edits, if the store has one
    fn modified(&self) -> Option<SystemTime> {
        None
    }
}

/// Settings persisted in a TOML file on disk
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the per-user configuration directory
    pub fn default_location() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| HostwatchError::config("Could not determine config directory"))?;

        Ok(Self::new(
            config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Settings {
        if !self.path.exists() {
            log::debug!("No settings file at {:?}, using defaults", self.path);
            return Settings::default();
        }

        match fs::read_to_string(&self.path) {
            Ok(text) => Settings::from_toml_lenient(&text),
            Err(e) => {
                log::warn!("Failed to read settings file {:?}: {}", self.path, e);
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let text = settings.to_toml_string()?;
        fs::write(&self.path, text)?;
        log::debug!("Settings saved to {:?}", self.path);
        Ok(())
    }

    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}
