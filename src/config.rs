//! Configuration file handling

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use sensel::{ContentMask, ScanDetail, ScanMode, SessionOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub scan: ScanConfig,
    pub protocol: ProtocolConfig,
}

impl Config {
    /// Get the config file path for this platform
    pub fn path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "sensel-monitor")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load config from file, or create default if it doesn't exist
    pub fn load_or_create() -> Result<Self, Box<dyn Error>> {
        let path = Self::path().ok_or("could not determine config directory")?;

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_with_header()?;
            println!("created default config at {}", path.display());
            Ok(config)
        }
    }

    /// Save config with header comments for new files
    pub fn save_with_header(&self) -> Result<(), Box<dyn Error>> {
        let path = Self::path().ok_or("could not determine config directory")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let header = r#"# sensel-monitor configuration file
# scan.content accepts any of "pressure", "labels", "contacts", "accel"

"#;
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, format!("{header}{contents}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Serial device path, e.g. /dev/ttyACM0 or COM3
    pub port: Option<String>,
    pub baud_rate: u32,
    /// How long a read waits for bytes before counting as empty
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            timeout: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    #[default]
    Sync,
    Async,
}

impl From<ModeSetting> for ScanMode {
    fn from(value: ModeSetting) -> Self {
        match value {
            ModeSetting::Sync => ScanMode::Sync,
            ModeSetting::Async => ScanMode::Async,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailSetting {
    #[default]
    High,
    Medium,
    Low,
}

impl From<DetailSetting> for ScanDetail {
    fn from(value: DetailSetting) -> Self {
        match value {
            DetailSetting::High => ScanDetail::High,
            DetailSetting::Medium => ScanDetail::Medium,
            DetailSetting::Low => ScanDetail::Low,
        }
    }
}

/// One frame section, as named in the config file and on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSetting {
    Pressure,
    Labels,
    Contacts,
    Accel,
}

impl ContentSetting {
    pub fn mask(self) -> ContentMask {
        match self {
            ContentSetting::Pressure => ContentMask::PRESSURE,
            ContentSetting::Labels => ContentMask::LABELS,
            ContentSetting::Contacts => ContentMask::CONTACTS,
            ContentSetting::Accel => ContentMask::ACCEL,
        }
    }
}

impl FromStr for ContentSetting {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pressure" => Ok(Self::Pressure),
            "labels" => Ok(Self::Labels),
            "contacts" => Ok(Self::Contacts),
            "accel" => Ok(Self::Accel),
            other => Err(format!(
                "unknown content {other:?}, expected pressure, labels, contacts or accel"
            )),
        }
    }
}

/// Comma separated content list, e.g. `contacts,accel`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentList(pub Vec<ContentSetting>);

impl FromStr for ContentList {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(ContentSetting::from_str)
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

/// Fold content names into a frame content mask
pub fn content_mask(content: &[ContentSetting]) -> ContentMask {
    content
        .iter()
        .fold(ContentMask::empty(), |mask, c| mask | c.mask())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub mode: ModeSetting,
    /// Frames the device batches per request in sync mode, 0 for one at a time
    pub buffer_depth: u8,
    pub content: Vec<ContentSetting>,
    pub detail: DetailSetting,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ModeSetting::Sync,
            buffer_depth: 0,
            content: vec![ContentSetting::Contacts],
            detail: DetailSetting::High,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Treat bad acks and checksums on variable-size reads as errors
    pub strict_variable_reads: bool,
    /// Empty reads tolerated before a read is declared stalled
    pub read_retries: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        let options = SessionOptions::default();
        Self {
            strict_variable_reads: options.strict_variable_reads,
            read_retries: options.read_retries,
        }
    }
}

impl From<&ProtocolConfig> for SessionOptions {
    fn from(value: &ProtocolConfig) -> Self {
        Self {
            strict_variable_reads: value.strict_variable_reads,
            read_retries: value.read_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[serial]
port = "/dev/ttyACM0"
timeout = "1s"

[scan]
mode = "async"
content = ["contacts", "accel"]
"#,
        )
        .unwrap();

        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.timeout, Duration::from_secs(1));
        assert_eq!(config.scan.mode, ModeSetting::Async);
        assert_eq!(
            content_mask(&config.scan.content),
            ContentMask::CONTACTS | ContentMask::ACCEL
        );
        assert!(config.protocol.strict_variable_reads);
        assert_eq!(config.protocol.read_retries, 1);
    }

    #[test]
    fn default_config_survives_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let config: Config = toml::from_str(&text).unwrap();
        assert_eq!(config.scan.content, vec![ContentSetting::Contacts]);
        assert_eq!(config.serial.timeout, Duration::from_millis(500));
    }

    #[test]
    fn content_list_parsing() {
        let list: ContentList = "contacts, pressure".parse().unwrap();
        assert_eq!(
            list.0,
            vec![ContentSetting::Contacts, ContentSetting::Pressure]
        );
        assert!("contacts,force".parse::<ContentList>().is_err());
    }
}
