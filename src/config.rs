use crate::error::{BridgeError, Result};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the settings file inside the data directory.
pub const CFG_FILENAME: &str = "driver_config.json";

/// Marker file in the config directory requesting a data wipe on start.
pub const RESET_MARKER: &str = "reset";

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
///
/// Call this before any other thread is spawned.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = &value[1..value.len() - 1];
            }

            // Only set if not already set (env vars take precedence)
            if std::env::var(key).is_err() {
                // SAFETY: only called from `main` before the tokio runtime is built, so no
                // other thread reads the environment concurrently
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

/// Unit used when reporting temperature sensor values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Unit suffix reported to the controller.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

/// Persisted driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Light transition time in tenths of a second
    pub light_transition_time: u16,
    pub temperature_unit: TemperatureUnit,
    /// Report cover positions as 100 - position
    pub cover_percent_inverted: bool,
    /// 0 = trace, 1 = debug, 2 = info, 3 = warn, 4 = error
    pub driver_log_level: u8,
    pub start_timeout_ms: u64,
    pub start_poll_interval_ms: u64,
    /// Force a remote read when the controller subscribes to an entity
    pub request_from_remote_on_subscribe: bool,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            light_transition_time: 10,
            temperature_unit: TemperatureUnit::Celsius,
            cover_percent_inverted: false,
            driver_log_level: 4,
            start_timeout_ms: 30_000,
            start_poll_interval_ms: 500,
            request_from_remote_on_subscribe: false,
        }
    }
}

impl DriverSettings {
    /// Apply environment variable overrides on top of the loaded settings.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("LIGHT_TRANSITION_TIME") {
            self.light_transition_time = value
                .parse()
                .map_err(|_| invalid("LIGHT_TRANSITION_TIME", &value))?;
        }
        if let Ok(value) = std::env::var("TEMPERATURE_UNIT") {
            self.temperature_unit = match value.to_ascii_lowercase().as_str() {
                "c" | "celsius" | "0" => TemperatureUnit::Celsius,
                "f" | "fahrenheit" | "1" => TemperatureUnit::Fahrenheit,
                _ => return Err(invalid("TEMPERATURE_UNIT", &value)),
            };
        }
        if let Ok(value) = std::env::var("COVER_PERCENT_INVERTED") {
            self.cover_percent_inverted = parse_bool(&value)
                .ok_or_else(|| invalid("COVER_PERCENT_INVERTED", &value))?;
        }
        // UC_MODEL is only set when running on the remote itself
        if std::env::var("UC_MODEL").is_ok() {
            self.request_from_remote_on_subscribe = true;
        }
        Ok(())
    }

    /// The read-only knob handed to the value converters.
    pub fn converter_settings(&self) -> ConverterSettings {
        ConverterSettings {
            temperature_unit: self.temperature_unit,
            cover_percent_inverted: self.cover_percent_inverted,
            light_transition_time: self.light_transition_time,
        }
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn start_poll_interval(&self) -> Duration {
        Duration::from_millis(self.start_poll_interval_ms)
    }

    /// Default `env_logger` filter for the configured driver log level.
    pub fn log_filter(&self) -> &'static str {
        match self.driver_log_level {
            0 => "trace",
            1 => "debug",
            2 => "info",
            3 => "warn",
            _ => "error",
        }
    }
}

/// Settings consumed by the value converters and command dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConverterSettings {
    pub temperature_unit: TemperatureUnit,
    pub cover_percent_inverted: bool,
    pub light_transition_time: u16,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, value: &str) -> BridgeError {
    BridgeError::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Driver configuration backed by a JSON file in the data directory.
pub struct DriverConfig {
    settings: DriverSettings,
    path: PathBuf,
}

impl DriverConfig {
    /// Resolve the data directory: `UC_DATA_HOME`, the platform data dir, or `./`.
    pub fn default_data_dir() -> PathBuf {
        std::env::var("UC_DATA_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::data_dir().map(|d| d.join("matter-entity-bridge")))
            .unwrap_or_else(|| PathBuf::from("./"))
    }

    /// Load the configuration from `data_dir`, falling back to defaults.
    pub fn load(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join(CFG_FILENAME);

        let settings = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<DriverSettings>(&bytes) {
                Ok(settings) => settings,
                Err(e) => {
                    error!("[Config] Cannot parse {:?}: {}", path, e);
                    DriverSettings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("[Config] No configuration file found, using default configuration");
                DriverSettings::default()
            }
            Err(e) => {
                error!("[Config] Cannot open {:?}: {}", path, e);
                DriverSettings::default()
            }
        };

        Self { settings, path }
    }

    pub fn get(&self) -> &DriverSettings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the settings and write them to disk.
    pub fn update(&mut self, settings: DriverSettings) -> Result<()> {
        self.settings = settings;
        self.store()
    }

    pub fn store(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&self.settings)?;
        fs::write(&self.path, data)?;
        Ok(())
    }

    /// Reset to defaults and remove the configuration file.
    pub fn clear(&mut self) -> Result<()> {
        self.settings = DriverSettings::default();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Wipe `data_dir` if a reset marker exists in `config_dir`.
///
/// The marker is removed afterwards. Returns whether a reset happened.
pub fn check_config_reset(config_dir: &Path, data_dir: &Path) -> Result<bool> {
    let marker = config_dir.join(RESET_MARKER);
    if !marker.exists() {
        return Ok(false);
    }

    info!("[Config] Reset requested, wiping {:?}", data_dir);
    if data_dir.exists() {
        for entry in fs::read_dir(data_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
    }
    fs::remove_file(&marker)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "matter-entity-bridge-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_defaults() {
        let settings = DriverSettings::default();
        assert_eq!(settings.light_transition_time, 10);
        assert_eq!(settings.temperature_unit, TemperatureUnit::Celsius);
        assert!(!settings.cover_percent_inverted);
        assert_eq!(settings.start_timeout(), Duration::from_secs(30));
        assert_eq!(settings.start_poll_interval(), Duration::from_millis(500));
        assert_eq!(settings.log_filter(), "error");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: DriverSettings =
            serde_json::from_str(r#"{"temperature_unit":"Fahrenheit"}"#).unwrap();
        assert_eq!(parsed.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(parsed.light_transition_time, 10);
    }

    #[test]
    fn test_store_load_clear() {
        let dir = temp_dir("config");
        let mut config = DriverConfig::load(&dir);
        assert_eq!(config.get(), &DriverSettings::default());

        let settings = DriverSettings {
            cover_percent_inverted: true,
            light_transition_time: 5,
            ..DriverSettings::default()
        };
        config.update(settings.clone()).unwrap();
        assert!(config.path().exists());

        let reloaded = DriverConfig::load(&dir);
        assert_eq!(reloaded.get(), &settings);

        config.clear().unwrap();
        assert!(!config.path().exists());
        assert_eq!(config.get(), &DriverSettings::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_converter_settings_subset() {
        let settings = DriverSettings {
            temperature_unit: TemperatureUnit::Fahrenheit,
            cover_percent_inverted: true,
            light_transition_time: 3,
            ..DriverSettings::default()
        };
        let conv = settings.converter_settings();
        assert_eq!(conv.temperature_unit, TemperatureUnit::Fahrenheit);
        assert!(conv.cover_percent_inverted);
        assert_eq!(conv.light_transition_time, 3);
    }

    #[test]
    fn test_config_reset() {
        let config_dir = temp_dir("reset-config");
        let data_dir = temp_dir("reset-data");
        fs::create_dir_all(&config_dir).unwrap();
        fs::create_dir_all(data_dir.join("nested")).unwrap();
        fs::write(data_dir.join(CFG_FILENAME), "{}").unwrap();

        assert!(!check_config_reset(&config_dir, &data_dir).unwrap());
        assert!(data_dir.join(CFG_FILENAME).exists());

        fs::write(config_dir.join(RESET_MARKER), "").unwrap();
        assert!(check_config_reset(&config_dir, &data_dir).unwrap());
        assert!(!config_dir.join(RESET_MARKER).exists());
        assert_eq!(fs::read_dir(&data_dir).unwrap().count(), 0);

        let _ = fs::remove_dir_all(&config_dir);
        let _ = fs::remove_dir_all(&data_dir);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
