//! Configuration management for the social scheduler
//!
//! Three kinds of files live under two directories:
//! - config dir: `config.json` (platform credentials) and the optional
//!   `settings.toml` (publisher command, logging)
//! - data dir: `usage.json` and `scheduled.json`

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ConfigError, Result, StorageError};
use crate::types::Platform;

const APP_DIR: &str = "social-scheduler";

/// Directories holding configuration and state files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Paths {
    pub fn new(config_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Resolve directories following the XDG Base Directory spec
    ///
    /// `SOCIAL_SCHEDULER_CONFIG_DIR` and `SOCIAL_SCHEDULER_DATA_DIR` override
    /// the defaults; both accept a leading `~`.
    pub fn resolve() -> Result<Self> {
        let config_dir = match std::env::var("SOCIAL_SCHEDULER_CONFIG_DIR") {
            Ok(path) => expand(&path),
            Err(_) => dirs::config_dir()
                .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?
                .join(APP_DIR),
        };

        let data_dir = match std::env::var("SOCIAL_SCHEDULER_DATA_DIR") {
            Ok(path) => expand(&path),
            Err(_) => dirs::data_dir()
                .ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?
                .join(APP_DIR),
        };

        Ok(Self::new(config_dir, data_dir))
    }

    /// Create both directories if missing
    pub fn ensure(&self) -> Result<()> {
        create_dir(&self.config_dir)?;
        create_dir(&self.data_dir)?;
        Ok(())
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.toml")
    }

    pub fn usage_file(&self) -> PathBuf {
        self.data_dir.join("usage.json")
    }

    pub fn schedule_file(&self) -> PathBuf {
        self.data_dir.join("scheduled.json")
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|source| StorageError::CreateDir {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Read a JSON state file, returning `None` when it is missing or unreadable
///
/// Corrupt files are logged and otherwise treated like missing ones.
pub(crate) fn read_json_or_default<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} does not exist yet", path.display());
            return None;
        }
        Err(e) => {
            warn!("Failed to read {}: {}. Using defaults", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring corrupt state file {}: {}", path.display(), e);
            None
        }
    }
}

/// Overwrite a JSON state file with pretty-printed `value`
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }

    let content = serde_json::to_string_pretty(value).map_err(StorageError::Serialize)?;
    std::fs::write(path, content).map_err(|source| StorageError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Credentials and switches for one platform
///
/// The password is stored in plaintext in `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            cookies_file: None,
            enabled: true,
        }
    }
}

impl PlatformConfig {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    /// True when both email and password are present. Nothing else is checked.
    pub fn is_configured(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }

    /// First three characters of the email followed by `***`
    pub fn masked_email(&self) -> Option<String> {
        self.email
            .as_ref()
            .map(|email| format!("{}***", email.chars().take(3).collect::<String>()))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    platforms: BTreeMap<String, PlatformConfig>,
}

/// Per-platform configuration persisted in `config.json`
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    platforms: BTreeMap<Platform, PlatformConfig>,
}

impl ConfigStore {
    /// Load from `path`, falling back to an empty store on any read failure
    ///
    /// Entries whose key is not a known platform are skipped.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let platforms = Self::read_platforms(&path);
        Self { path, platforms }
    }

    /// Re-read `config.json`, replacing every in-memory entry
    pub fn reload(&mut self) {
        self.platforms = Self::read_platforms(&self.path);
    }

    fn read_platforms(path: &Path) -> BTreeMap<Platform, PlatformConfig> {
        let file: ConfigFile = read_json_or_default(path).unwrap_or_default();

        let mut platforms = BTreeMap::new();
        for (name, config) in file.platforms {
            match name.parse::<Platform>() {
                Ok(platform) => {
                    platforms.insert(platform, config);
                }
                Err(_) => warn!("Skipping unknown platform '{}' in {}", name, path.display()),
            }
        }
        platforms
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, platform: Platform) -> Option<&PlatformConfig> {
        self.platforms.get(&platform)
    }

    pub fn set(&mut self, platform: Platform, config: PlatformConfig) {
        self.platforms.insert(platform, config);
    }

    pub fn is_configured(&self, platform: Platform) -> bool {
        self.get(platform).is_some_and(PlatformConfig::is_configured)
    }

    /// Write every platform entry back to disk
    pub fn save(&self) -> Result<()> {
        let file = ConfigFile {
            platforms: self
                .platforms
                .iter()
                .map(|(platform, config)| (platform.as_str().to_string(), config.clone()))
                .collect(),
        };
        write_json(&self.path, &file)?;
        debug!("Saved platform configuration to {}", self.path.display());
        Ok(())
    }
}

/// Optional settings read from `settings.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub publisher: PublisherSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherSettings {
    /// External program performing the browser automation
    pub command: Option<String>,
    /// Arguments placed before the platform name
    pub args: Vec<String>,
    pub headless: bool,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: Option<String>,
    pub level: Option<String>,
}

impl Settings {
    /// Load settings; a missing file yields defaults, a malformed one an error
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let settings: Settings = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(settings)
    }

    /// The publisher command with `~` expanded
    pub fn publisher_command(&self) -> Option<PathBuf> {
        self.publisher
            .command
            .as_deref()
            .filter(|command| !command.trim().is_empty())
            .map(expand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_is_configured_with_both() {
        assert!(PlatformConfig::new("test@test.com", "secret").is_configured());
    }

    #[test]
    fn test_is_configured_missing_email() {
        let config = PlatformConfig {
            password: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn test_is_configured_missing_password() {
        let config = PlatformConfig {
            email: Some("test@test.com".to_string()),
            ..Default::default()
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn test_masked_email() {
        let config = PlatformConfig::new("someone@example.com", "pw");
        assert_eq!(config.masked_email().as_deref(), Some("som***"));
        assert_eq!(PlatformConfig::default().masked_email(), None);
    }

    #[test]
    fn test_config_store_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::load(temp.path().join("config.json"));
        assert!(store.get(Platform::Twitter).is_none());
    }

    #[test]
    fn test_config_store_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");

        let mut store = ConfigStore::load(&path);
        store.set(Platform::Twitter, PlatformConfig::new("test@test.com", "secret"));
        store.save().unwrap();

        let data: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(data["platforms"]["twitter"]["email"], "test@test.com");
        assert_eq!(data["platforms"]["twitter"]["password"], "secret");
        assert_eq!(data["platforms"]["twitter"]["cookies_file"], serde_json::Value::Null);
        assert_eq!(data["platforms"]["twitter"]["enabled"], true);

        let reloaded = ConfigStore::load(&path);
        assert!(reloaded.is_configured(Platform::Twitter));
        assert!(!reloaded.is_configured(Platform::Linkedin));
    }

    #[test]
    fn test_config_store_loads_aliases_and_skips_unknown() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"platforms": {
                "x": {"email": "a@b.c", "password": "pw"},
                "facebook": {"email": "f@b.c", "password": "pw"},
                "linkedin": {"email": "l@b.c", "enabled": false}
            }}"#,
        )
        .unwrap();

        let store = ConfigStore::load(&path);
        assert!(store.is_configured(Platform::Twitter));
        let linkedin = store.get(Platform::Linkedin).unwrap();
        assert!(!linkedin.enabled);
        assert!(!linkedin.is_configured());
    }

    #[test]
    fn test_config_store_corrupt_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = ConfigStore::load(&path);
        assert!(store.get(Platform::Twitter).is_none());
    }

    #[test]
    fn test_settings_missing_file_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load_from_path(&temp.path().join("settings.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.publisher.headless);
        assert!(settings.publisher_command().is_none());
    }

    #[test]
    fn test_settings_parse() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        std::fs::write(
            &path,
            r#"
[publisher]
command = "/usr/local/bin/publish"
headless = false

[logging]
format = "json"
"#,
        )
        .unwrap();

        let settings = Settings::load_from_path(&path).unwrap();
        assert_eq!(
            settings.publisher_command(),
            Some(PathBuf::from("/usr/local/bin/publish"))
        );
        assert!(!settings.publisher.headless);
        assert_eq!(settings.logging.format.as_deref(), Some("json"));
        assert!(settings.logging.level.is_none());
    }

    #[test]
    fn test_settings_malformed_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        std::fs::write(&path, "[publisher\ncommand = ").unwrap();

        let err = Settings::load_from_path(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    #[serial]
    fn test_paths_resolve_from_env() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join("cfg");
        let data_dir = temp.path().join("data");

        std::env::set_var("SOCIAL_SCHEDULER_CONFIG_DIR", &config_dir);
        std::env::set_var("SOCIAL_SCHEDULER_DATA_DIR", &data_dir);
        let paths = Paths::resolve().unwrap();
        std::env::remove_var("SOCIAL_SCHEDULER_CONFIG_DIR");
        std::env::remove_var("SOCIAL_SCHEDULER_DATA_DIR");

        assert_eq!(paths.config_dir, config_dir);
        assert_eq!(paths.data_dir, data_dir);
        assert_eq!(paths.usage_file(), data_dir.join("usage.json"));
        assert_eq!(paths.schedule_file(), data_dir.join("scheduled.json"));
        assert_eq!(paths.config_file(), config_dir.join("config.json"));

        paths.ensure().unwrap();
        assert!(config_dir.is_dir());
        assert!(data_dir.is_dir());
    }
}
