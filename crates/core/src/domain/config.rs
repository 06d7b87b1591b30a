//! Configuration management for trieq
//!
//! This module provides:
//! - Configuration structs for the application, audio devices and the
//!   initial equalizer settings
//! - Preset system storing [`ChainSettings`] as TOML
//! - Hot-reload support via file system watcher

use crate::domain::audio::{ChannelCount, SampleRate, StreamConfig};
use crate::domain::settings::ChainSettings;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sample rate requested from the audio devices
    pub sample_rate: u32,

    /// Audio buffer size in frames
    pub buffer_size: u32,

    /// Width of the response curve in pixels
    pub curve_width: u32,

    /// Height of the response curve in pixels
    pub curve_height: u32,

    /// Preset directory
    pub preset_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 512,
            curve_width: 600,
            curve_height: 240,
            preset_dir: PathBuf::from("presets"),
        }
    }
}

/// Audio device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AudioDeviceConfig {
    /// Input device name (empty = use default)
    #[serde(default)]
    pub input_device: String,

    /// Output device name (empty = use default)
    #[serde(default)]
    pub output_device: String,
}

impl AudioDeviceConfig {
    pub fn input(&self) -> Option<&str> {
        Some(self.input_device.as_str()).filter(|name| !name.is_empty())
    }

    pub fn output(&self) -> Option<&str> {
        Some(self.output_device.as_str()).filter(|name| !name.is_empty())
    }
}

/// Complete trieq configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EqConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub audio: AudioDeviceConfig,
    /// Settings applied to the parameter store at startup
    #[serde(default)]
    pub settings: ChainSettings,
}

impl EqConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_toml(path.as_ref()).await?;
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_toml(self, path.as_ref()).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Create factory default configuration
    pub fn factory_default() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.app.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if self.app.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be positive".to_string()));
        }
        if self.app.curve_width == 0 || self.app.curve_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "curve size {}x{} is empty",
                self.app.curve_width, self.app.curve_height
            )));
        }
        Ok(())
    }

    /// Stream parameters for the configured devices (always stereo)
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: SampleRate::from_hz(self.app.sample_rate),
            channels: ChannelCount::Stereo,
            buffer_size: self.app.buffer_size,
        }
    }
}

async fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    info!(path = %path.display(), "Loading configuration");

    let contents = fs::read_to_string(path).await?;
    Ok(toml::from_str(&contents)?)
}

async fn write_toml<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    info!(path = %path.display(), "Saving configuration");

    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let toml_str = toml::to_string_pretty(value)?;
    fs::write(path, toml_str).await?;
    Ok(())
}

/// File system watcher for preset hot-reload
pub struct ConfigWatcher {
    _watcher: notify::RecommendedWatcher,
    config_tx: broadcast::Sender<PathBuf>,
}

impl ConfigWatcher {
    /// Create a new config watcher
    pub async fn new(preset_dir: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let (config_tx, _config_rx) = broadcast::channel(32);

        // Create preset directory if it doesn't exist
        fs::create_dir_all(&preset_dir).await?;

        let tx_clone = config_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) {
                    for path in event.paths {
                        if path.extension().and_then(|e| e.to_str()) == Some("toml") {
                            if let Err(e) = tx_clone.send(path) {
                                debug!("No listener for preset change: {}", e);
                            }
                        }
                    }
                }
            }
        })?;

        watcher.watch(&preset_dir, notify::RecursiveMode::NonRecursive)?;

        info!(
            path = %preset_dir.display(),
            "Preset watcher started"
        );

        Ok(Self {
            _watcher: watcher,
            config_tx,
        })
    }

    /// Subscribe to preset change events
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.config_tx.subscribe()
    }
}

/// Named [`ChainSettings`] stored as `<name>.toml`
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    /// Create a new preset manager
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    pub fn preset_dir(&self) -> &Path {
        &self.preset_dir
    }

    fn preset_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(ConfigError::Invalid(format!("invalid preset name: {name:?}")));
        }
        Ok(self.preset_dir.join(format!("{}.toml", name)))
    }

    /// Preset name for a file inside the preset directory
    pub fn preset_name(path: &Path) -> Option<String> {
        if path.extension()? != "toml" {
            return None;
        }
        path.file_stem()?.to_str().map(str::to_string)
    }

    /// List all available presets
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        if !self.preset_dir.exists() {
            return Ok(presets);
        }

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = Self::preset_name(&entry.path()) {
                presets.push(name);
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    /// Load a preset by name
    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<ChainSettings> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        let settings = read_toml(&path).await?;
        info!(name, "Preset loaded");
        Ok(settings)
    }

    /// Load a preset from an explicit file path
    #[instrument]
    pub async fn load_preset_file(path: &Path) -> Result<ChainSettings> {
        read_toml(path).await
    }

    /// Save a preset by name
    #[instrument(skip(self, settings))]
    pub async fn save_preset(&self, name: &str, settings: &ChainSettings) -> Result<()> {
        let path = self.preset_path(name)?;
        write_toml(settings, &path).await?;
        info!(name, "Preset saved");
        Ok(())
    }

    /// Delete a preset by name
    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    /// Check if a preset exists
    pub async fn preset_exists(&self, name: &str) -> bool {
        match self.preset_path(name) {
            Ok(path) => path.exists(),
            Err(_) => false,
        }
    }
}

/// Manages the main configuration file at `~/.config/trieq/config.toml`
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager rooted at `config_dir`
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");

        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// Returns `~/.config/trieq` on Linux, the platform equivalent elsewhere
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("trieq"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    /// Get the config file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Resolve a relative preset directory against the config directory
    pub fn preset_dir(&self, config: &EqConfig) -> PathBuf {
        if config.app.preset_dir.is_absolute() {
            config.app.preset_dir.clone()
        } else {
            self.config_dir.join(&config.app.preset_dir)
        }
    }

    /// Load configuration from file
    ///
    /// If the config file doesn't exist, writes and returns the factory
    /// default. If the config file is corrupt, backs it up to
    /// `config.toml.corrupt` and returns the factory default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> EqConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = EqConfig::factory_default();

            if let Err(e) = config.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }

            return config;
        }

        match EqConfig::load_from_file(&self.config_path).await {
            Ok(config) => {
                info!(
                    path = %self.config_path.display(),
                    "Configuration loaded successfully"
                );
                config
            }
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                EqConfig::factory_default()
            }
        }
    }

    /// Save configuration to file
    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &EqConfig) -> Result<()> {
        config.validate()?;
        fs::create_dir_all(&self.config_dir).await?;

        config.save_to_file(&self.config_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::Slope;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_settings() -> ChainSettings {
        ChainSettings {
            peak_freq: 1000.0,
            peak_gain_in_decibels: 6.0,
            low_cut_freq: 80.0,
            low_cut_slope: Slope::Slope24,
            high_cut_slope: Slope::Slope48,
            ..ChainSettings::default()
        }
    }

    #[test]
    fn test_config_serialization() {
        let config = EqConfig {
            settings: sample_settings(),
            ..EqConfig::factory_default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: EqConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
        assert!(toml_str.contains("[app]"));
        assert!(toml_str.contains("[settings]"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: EqConfig = toml::from_str(
            r#"
            [app]
            sample_rate = 44100

            [settings]
            peak_gain_in_decibels = -3.0
            "#,
        )
        .unwrap();

        assert_eq!(parsed.app.sample_rate, 44100);
        assert_eq!(parsed.app.buffer_size, 512);
        assert_eq!(parsed.settings.peak_gain_in_decibels, -3.0);
        assert_eq!(parsed.settings.peak_freq, 750.0);
        assert!(parsed.audio.input().is_none());
    }

    #[test]
    fn test_validation_rejects_empty_curve() {
        let mut config = EqConfig::factory_default();
        assert!(config.validate().is_ok());

        config.app.curve_width = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_stream_config_from_app_config() {
        let mut config = EqConfig::factory_default();
        config.app.sample_rate = 44100;
        config.app.buffer_size = 256;

        let stream = config.stream_config();
        assert_eq!(stream.sample_rate, SampleRate::Hz44100);
        assert_eq!(stream.channels.count(), 2);
        assert_eq!(stream.buffer_size, 256);
    }

    #[tokio::test]
    async fn test_preset_manager() {
        let temp_dir = TempDir::new().unwrap();
        let manager = PresetManager::new(temp_dir.path().to_path_buf());
        let settings = sample_settings();

        manager.save_preset("vocal", &settings).await.unwrap();
        assert!(manager.preset_exists("vocal").await);

        let presets = manager.list_presets().await.unwrap();
        assert_eq!(presets, vec!["vocal"]);

        let loaded = manager.load_preset("vocal").await.unwrap();
        assert_eq!(loaded, settings);

        manager.delete_preset("vocal").await.unwrap();
        assert!(!manager.preset_exists("vocal").await);
    }

    #[tokio::test]
    async fn test_missing_preset() {
        let temp_dir = TempDir::new().unwrap();
        let manager = PresetManager::new(temp_dir.path().to_path_buf());

        let result = manager.load_preset("nope").await;
        assert!(matches!(result, Err(ConfigError::PresetNotFound(_))));

        let result = manager.delete_preset("nope").await;
        assert!(matches!(result, Err(ConfigError::PresetNotFound(_))));
    }

    #[tokio::test]
    async fn test_preset_name_cannot_escape_directory() {
        let temp_dir = TempDir::new().unwrap();
        let manager = PresetManager::new(temp_dir.path().join("presets"));

        let result = manager.save_preset("../evil", &ChainSettings::default()).await;
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        assert!(!manager.preset_exists("").await);
    }

    #[tokio::test]
    async fn test_list_presets_in_missing_dir_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let manager = PresetManager::new(temp_dir.path().join("absent"));
        assert!(manager.list_presets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config = EqConfig {
            settings: sample_settings(),
            ..EqConfig::factory_default()
        };
        config.save_to_file(&config_path).await.unwrap();

        assert!(config_path.exists());

        let loaded = EqConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_config_manager_creates_factory_default() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp_dir.path().to_path_buf());

        assert!(!manager.config_path().exists());
        let config = manager.load().await;

        assert_eq!(config, EqConfig::factory_default());
        assert!(manager.config_path().exists());
        assert_eq!(manager.preset_dir(&config), temp_dir.path().join("presets"));
    }

    #[tokio::test]
    async fn test_config_manager_backs_up_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(temp_dir.path().to_path_buf());
        fs::write(manager.config_path(), "[app\nbroken").await.unwrap();

        let config = manager.load().await;

        assert_eq!(config, EqConfig::factory_default());
        assert!(temp_dir.path().join("config.toml.corrupt").exists());
    }

    #[tokio::test]
    async fn test_watcher_reports_preset_writes() {
        let temp_dir = TempDir::new().unwrap();
        let preset_dir = temp_dir.path().to_path_buf();
        let watcher = ConfigWatcher::new(preset_dir.clone()).await.unwrap();
        let mut rx = watcher.subscribe();

        let manager = PresetManager::new(preset_dir);
        manager.save_preset("live", &sample_settings()).await.unwrap();

        let path = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("watcher timed out")
            .unwrap();
        assert_eq!(PresetManager::preset_name(&path).as_deref(), Some("live"));
    }
}
