use crate::inim_api::inim_client::DEFAULT_BASE_URL;
use crate::scenario::{ScenarioTable, ScenarioTableError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const UNIQUE_ID_PREFIX: &str = "alarm_control_panel";
pub const DEFAULT_PANEL_NAME: &str = "Inim Alarm Panel";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Panel {panel:?} has an invalid scenario table: {source}")]
    InvalidScenarios {
        panel: String,
        #[source]
        source: ScenarioTableError,
    },

    #[error("Panel id {0:?} is used by more than one panel")]
    DuplicatePanelId(String),

    #[error("Panel id {0:?} may only contain letters, digits, '_' and '-'")]
    InvalidPanelId(String),

    #[error("At least one [[panels]] entry is required")]
    NoPanels,

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    pub logging: LoggingConfig,
    pub inim: InimConfig,
    pub home_assistant: HomeAssistantConfig,
    #[serde(default)]
    pub intervals: IntervalConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub panels: Vec<PanelConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    pub directory: String,
    pub debug_file: String,
    pub info_file: String,
    pub warn_file: String,
    pub error_file: String,
    pub console_level: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct InimConfig {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub device_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HomeAssistantConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: String,
    pub mqtt_password: String,
    pub client_id: String,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct IntervalConfig {
    pub scan_interval_seconds: u64,
    pub reconnect_delay_seconds: u64,
    pub mqtt_keep_alive_seconds: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            scan_interval_seconds: 5,
            reconnect_delay_seconds: 5,
            mqtt_keep_alive_seconds: 30,
        }
    }
}

impl IntervalConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    pub mqtt_queue_size: usize,
    pub command_channel_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            mqtt_queue_size: 100,
            command_channel_size: 10,
        }
    }
}

/// One alarm control panel exposed to Home Assistant.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PanelConfig {
    pub name: String,
    /// Derived from `name` when left out of the file.
    #[serde(default)]
    pub unique_id: String,
    #[serde(default = "ScenarioTable::inim_defaults")]
    pub scenarios: ScenarioTable,
}

impl PanelConfig {
    pub fn new(name: &str, scenarios: ScenarioTable) -> Self {
        Self {
            name: name.to_string(),
            unique_id: panel_unique_id(name),
            scenarios,
        }
    }
}

/// `alarm_control_panel_<slug>`, stable for a given display name.
pub fn panel_unique_id(name: &str) -> String {
    format!("{}_{}", UNIQUE_ID_PREFIX, slugify(name))
}

/// Lowercases and collapses every run of characters other than ASCII letters
/// and digits into `_`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

/// Panel ids become a single MQTT topic level and a discovery object id.
fn is_valid_panel_id(unique_id: &str) -> bool {
    !unique_id.is_empty()
        && unique_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        for panel in config.panels.iter_mut() {
            if panel.unique_id.is_empty() {
                panel.unique_id = panel_unique_id(&panel.name);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.panels.is_empty() {
            return Err(ConfigError::NoPanels);
        }
        if self.intervals.scan_interval_seconds == 0 {
            return Err(ConfigError::ZeroInterval("intervals.scan_interval_seconds"));
        }
        if self.limits.command_channel_size == 0 {
            return Err(ConfigError::ZeroInterval("limits.command_channel_size"));
        }

        let mut seen_ids: Vec<&str> = Vec::with_capacity(self.panels.len());
        for panel in &self.panels {
            panel
                .scenarios
                .validate()
                .map_err(|source| ConfigError::InvalidScenarios {
                    panel: panel.name.clone(),
                    source,
                })?;
            if !is_valid_panel_id(&panel.unique_id) {
                return Err(ConfigError::InvalidPanelId(panel.unique_id.clone()));
            }
            if seen_ids.contains(&panel.unique_id.as_str()) {
                return Err(ConfigError::DuplicatePanelId(panel.unique_id.clone()));
            }
            seen_ids.push(&panel.unique_id);
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let toml_content = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), toml_content)
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))
    }

    pub fn example() -> Self {
        Config {
            logging: LoggingConfig::default(),
            inim: InimConfig {
                username: "REPLACE_WITH_YOUR_INIM_USERNAME".to_string(),
                password: "REPLACE_WITH_YOUR_INIM_PASSWORD".to_string(),
                client_id: "REPLACE_WITH_A_CLIENT_ID".to_string(),
                device_id: "REPLACE_WITH_YOUR_DEVICE_ID".to_string(),
                base_url: default_base_url(),
                request_timeout_seconds: default_request_timeout_seconds(),
            },
            home_assistant: HomeAssistantConfig {
                mqtt_host: "192.168.1.40".to_string(),
                mqtt_port: 1883,
                mqtt_username: "homeassistant".to_string(),
                mqtt_password: "REPLACE_WITH_YOUR_HOMEASSISTANT_MQTT_PASSWORD".to_string(),
                client_id: "inim-bridge".to_string(),
                discovery_prefix: default_discovery_prefix(),
            },
            intervals: IntervalConfig::default(),
            limits: LimitsConfig::default(),
            panels: vec![PanelConfig::new(
                DEFAULT_PANEL_NAME,
                ScenarioTable::inim_defaults(),
            )],
        }
    }

    pub fn save_example(path: impl AsRef<Path>) -> Result<(), ConfigError> {
        Self::example().save(path)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "./logs".to_string(),
            debug_file: "log_debug.log".to_string(),
            info_file: "log_info.log".to_string(),
            warn_file: "log_warn.log".to_string(),
            error_file: "log_error.log".to_string(),
            console_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ArmMode;

    const MINIMAL: &str = r#"
        [logging]
        directory = "./logs"
        debug_file = "d.log"
        info_file = "i.log"
        warn_file = "w.log"
        error_file = "e.log"
        console_level = "debug"

        [inim]
        username = "me@example.com"
        password = "hunter2"
        client_id = "abc"
        device_id = "12345"

        [home_assistant]
        mqtt_host = "localhost"
        mqtt_port = 1883
        mqtt_username = "ha"
        mqtt_password = "ha"
        client_id = "inim-bridge"

        [[panels]]
        name = "Casa Principale"
    "#;

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.inim.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.intervals.scan_interval(), Duration::from_secs(5));
        assert_eq!(config.home_assistant.discovery_prefix, "homeassistant");
        assert_eq!(config.panels.len(), 1);
        assert_eq!(
            config.panels[0].unique_id,
            "alarm_control_panel_casa_principale"
        );
        assert_eq!(config.panels[0].scenarios, ScenarioTable::inim_defaults());
    }

    #[test]
    fn test_explicit_scenarios_and_interval() {
        let toml = format!(
            "{}\n{}",
            MINIMAL.replace("[[panels]]\n        name = \"Casa Principale\"", ""),
            r#"
            [intervals]
            scan_interval_seconds = 15

            [[panels]]
            name = "Garage"
            unique_id = "garage_panel"
            scenarios = { armed_away = 4, disarmed = 5, armed_vacation = 6 }
            "#
        );
        let config = Config::from_toml(&toml).unwrap();
        assert_eq!(config.intervals.scan_interval_seconds, 15);
        let panel = &config.panels[0];
        assert_eq!(panel.unique_id, "garage_panel");
        assert_eq!(panel.scenarios.code_for(ArmMode::ArmedVacation), Some(6));
        assert_eq!(panel.scenarios.code_for(ArmMode::ArmedNight), None);
    }

    #[test]
    fn test_duplicate_codes_fail_validation() {
        let toml = MINIMAL.replace(
            "name = \"Casa Principale\"",
            "name = \"Casa\"\nscenarios = { armed_away = 1, disarmed = 1 }",
        );
        assert!(matches!(
            Config::from_toml(&toml),
            Err(ConfigError::InvalidScenarios { .. })
        ));
    }

    #[test]
    fn test_duplicate_panel_ids_fail_validation() {
        let toml = format!("{}\n[[panels]]\nname = \"casa principale\"\n", MINIMAL);
        assert!(matches!(
            Config::from_toml(&toml),
            Err(ConfigError::DuplicatePanelId(id)) if id == "alarm_control_panel_casa_principale"
        ));
    }

    #[test]
    fn test_panel_id_must_fit_in_one_topic_level() {
        for bad in ["casa/nord", "casa+", "#", "due parole"] {
            let toml = MINIMAL.replace(
                "name = \"Casa Principale\"",
                &format!("name = \"Casa\"\nunique_id = \"{}\"", bad),
            );
            assert!(
                matches!(Config::from_toml(&toml), Err(ConfigError::InvalidPanelId(ref id)) if id == bad),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_no_panels_fails_validation() {
        let toml = MINIMAL.replace("[[panels]]\n        name = \"Casa Principale\"", "");
        assert!(matches!(Config::from_toml(&toml), Err(ConfigError::NoPanels)));
    }

    #[test]
    fn test_zero_scan_interval_fails_validation() {
        let toml = format!("{}\n[intervals]\nscan_interval_seconds = 0\n", MINIMAL);
        assert!(matches!(
            Config::from_toml(&toml),
            Err(ConfigError::ZeroInterval(_))
        ));
    }

    #[test]
    fn test_example_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::save_example(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, Config::example());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(ref p, _) if p.ends_with("here.toml")));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Inim Alarm Panel"), "inim_alarm_panel");
        assert_eq!(slugify("  Casa -- Nord! "), "casa_nord");
        assert_eq!(slugify("Über Haus"), "ber_haus");
        assert_eq!(slugify("!!!"), "unknown");
        assert_eq!(panel_unique_id("Garage"), "alarm_control_panel_garage");
    }
}
