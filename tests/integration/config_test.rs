use hostwatch::core::config::{FileSettingsStore, Settings, SettingsStore};
use hostwatch::core::monitor::{MonitoredTarget, TargetRegistry};
use hostwatch::HostwatchError;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_store_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");
    let store = FileSettingsStore::new(&path);

    store.save(&Settings::default()).unwrap();

    assert!(path.exists());
    assert!(store.modified().is_some());
    assert_eq!(store.load(), Settings::default());
}

#[test]
fn test_handwritten_file_is_read() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[email]
smtp_server = "smtp.example.com"
from = "monitor@example.com"
to = "ops@example.com, oncall@example.com"
frequency_minutes = 10
send_repeat_email = true

[hardware]
cpu_threshold = 90
auto_restart_service = true
max_restart_attempts = 0
disk_thresholds = { "C:" = 85, "D:" = 150 }

[monitoring]
services = ["Spooler", "W32Time"]
processes = "nginx.exe"
"#,
    )
    .unwrap();

    let settings = FileSettingsStore::new(&path).load();

    assert_eq!(settings.email.smtp_server, "smtp.example.com");
    assert_eq!(settings.email.smtp_port, 587);
    assert_eq!(
        settings.email.to,
        vec!["ops@example.com".to_string(), "oncall@example.com".to_string()]
    );
    assert_eq!(settings.email.frequency_minutes, 10);
    assert!(settings.email.send_repeat_email);
    assert_eq!(settings.hardware.cpu_threshold, 90);
    assert_eq!(settings.hardware.ram_threshold, 80);
    assert_eq!(settings.hardware.max_restart_attempts, 1);
    assert_eq!(settings.hardware.disk_thresholds.get("C:"), Some(&85));
    assert_eq!(settings.hardware.disk_thresholds.get("D:"), None);
    assert_eq!(settings.monitoring.services, vec!["Spooler", "W32Time"]);
    assert_eq!(settings.monitoring.processes, vec!["nginx.exe"]);
    assert!(!settings.server.enable_remote_monitoring);
}

#[test]
fn test_target_changes_persist() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSettingsStore::new(temp_dir.path().join("config.toml"));

    let mut settings = store.load();
    let registry = TargetRegistry::from_settings(&settings);
    assert!(registry.add(MonitoredTarget::service("Spooler")).unwrap());
    assert!(registry.add(MonitoredTarget::process("nginx")).unwrap());
    assert!(!registry.add(MonitoredTarget::process("nginx")).unwrap());
    registry.set_disk_threshold("C:", 90).unwrap();
    registry.write_to_settings(&mut settings);
    store.save(&settings).unwrap();

    let reloaded = TargetRegistry::from_settings(&store.load());
    assert_eq!(
        reloaded.targets(),
        vec![
            MonitoredTarget::service("Spooler"),
            MonitoredTarget::process("nginx")
        ]
    );
    assert_eq!(reloaded.disk_thresholds().get("C:"), Some(&90));
}

#[test]
fn test_invalid_disk_threshold_is_rejected() {
    let registry = TargetRegistry::new();

    for bad in [0, 101, -5] {
        assert!(matches!(
            registry.set_disk_threshold("C:", bad),
            Err(HostwatchError::InvalidThreshold { value, .. }) if value == bad
        ));
    }
    assert!(registry.disk_thresholds().is_empty());
}
