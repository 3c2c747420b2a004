use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, File as ConfigFile, FileFormat};
use serde_derive::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use crate::errors::AppError;
use crate::structs::DeviceInfo;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MiscSettings {
    pub log_level: String,
    pub chart_show_labels: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct BLESettings {
    /// Only used when headless, empty matches any Heart Rate device
    pub saved_name: String,
    pub saved_address: String,
    pub scan_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub no_packet_timeout_secs: u64,
}

impl BLESettings {
    pub fn matches(&self, device: &DeviceInfo) -> bool {
        let name_ok = self.saved_name.is_empty() || self.saved_name == device.name;
        let address_ok = self.saved_address.is_empty()
            || self.saved_address.eq_ignore_ascii_case(&device.address)
            || self.saved_address == device.id;
        name_ok && address_ok
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct InsightSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Headless mode asks for an insight every N samples, 0 disables
    pub headless_every: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DummySettings {
    // When enabled, BLE is disabled
    pub enabled: bool,
    pub low_bpm: u16,
    pub high_bpm: u16,
    pub bpm_speed: f32,
    pub jitter_bpm: u16,
    pub loops_before_dc: u16,
    pub use_u16_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    pub ble: BLESettings,
    pub insight: InsightSettings,
    pub misc: MiscSettings,
    pub dummy: DummySettings,
}

impl Settings {
    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let default_log_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        Config::builder()
            .set_default("ble.saved_name", "")?
            .set_default("ble.saved_address", "")?
            .set_default("ble.scan_timeout_secs", 30)?
            .set_default("ble.connect_timeout_secs", 10)?
            .set_default("ble.no_packet_timeout_secs", 30)?
            .set_default("insight.enabled", true)?
            .set_default(
                "insight.endpoint",
                "https://generativelanguage.googleapis.com/v1beta",
            )?
            .set_default("insight.model", "gemini-2.5-flash")?
            .set_default("insight.api_key_env", "GEMINI_API_KEY")?
            .set_default("insight.timeout_secs", 20)?
            .set_default("insight.headless_every", 0)?
            .set_default("misc.log_level", default_log_level)?
            .set_default("misc.chart_show_labels", true)?
            .set_default("dummy.enabled", false)?
            .set_default("dummy.low_bpm", 50)?
            .set_default("dummy.high_bpm", 120)?
            .set_default("dummy.bpm_speed", 1.5)?
            .set_default("dummy.jitter_bpm", 2)?
            .set_default("dummy.loops_before_dc", 0)?
            .set_default("dummy.use_u16_format", false)
    }
    pub fn load(config_path: &Path, required: bool) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(ConfigFile::from(config_path).required(required))
            .build()?
            .try_deserialize()
    }
    /// Parses settings from a TOML string, filling in defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(ConfigFile::from_str(toml_str, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
    pub async fn save(&self, config_path: &Path) -> Result<(), AppError> {
        let toml_string = toml::to_string(self)?;

        let mut file = File::create(config_path).await?;
        file.write_all(toml_string.as_bytes()).await?;
        file.flush().await?;
        info!("Saved config to {}", config_path.display());

        Ok(())
    }
    pub fn get_log_level(&self) -> LevelFilter {
        match self.misc.log_level.to_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }
}

/// Config file sitting next to the executable, like `heartbeat-monitor.toml`.
pub fn default_config_path() -> Result<PathBuf, AppError> {
    let exe_path = std::env::current_exe()?;
    let file_name = exe_path
        .with_extension("toml")
        .file_name()
        .map(PathBuf::from)
        .ok_or(AppError::WorkDir)?;
    Ok(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(Path::new("does/not/exist.toml"), false).unwrap();
        assert_eq!(settings.ble.no_packet_timeout_secs, 30);
        assert_eq!(settings.insight.model, "gemini-2.5-flash");
        assert_eq!(settings.insight.api_key_env, "GEMINI_API_KEY");
        assert!(!settings.dummy.enabled);
    }

    #[test]
    fn missing_required_file_errors() {
        assert!(Settings::load(Path::new("does/not/exist.toml"), true).is_err());
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[dummy]\nenabled = true\nhigh_bpm = 150").unwrap();
        let settings = Settings::load(file.path(), true).unwrap();
        assert!(settings.dummy.enabled);
        assert_eq!(settings.dummy.high_bpm, 150);
        assert_eq!(settings.dummy.low_bpm, 50);
    }

    #[test]
    fn misspelled_bool_is_rejected() {
        assert!(Settings::from_toml_str("[dummy]\nenabled = ture").is_err());
    }

    #[test]
    fn log_level_fallback() {
        let mut settings = Settings::from_toml_str("").unwrap();
        settings.misc.log_level = "WARN".into();
        assert_eq!(settings.get_log_level(), LevelFilter::WARN);
        settings.misc.log_level = "loud".into();
        assert_eq!(settings.get_log_level(), LevelFilter::INFO);
    }

    #[test]
    fn saved_device_matching() {
        let device = DeviceInfo::new(
            "hci0/dev_AA".into(),
            Some("Polar H10".into()),
            "AA:BB:CC:DD:EE:FF".into(),
            None,
            vec![],
            None,
        );
        let mut ble = Settings::from_toml_str("").unwrap().ble;
        assert!(ble.matches(&device));
        ble.saved_address = "aa:bb:cc:dd:ee:ff".into();
        assert!(ble.matches(&device));
        ble.saved_name = "Garmin".into();
        assert!(!ble.matches(&device));
    }
}
