//! Configuration surface: the root `zw101` component and the four entity platforms attached to
//! it. The structs deserialize from any serde format; [`DeviceConfig::validate`] resolves
//! identifiers and defaults into a [`ValidatedConfig`].

use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name every entity platform entry must carry in its `platform` key.
pub const PLATFORM: &str = "zw101";

/// Identifier given to the root component when the configuration does not name one.
pub const DEFAULT_COMPONENT_ID: &str = "zw101component_id";

pub const DEFAULT_BAUD_RATE: u32 = 57600;

/// Timing knobs for the search loop and the enrollment procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timings {
    /// Pause between two background searches.
    pub search_interval_ms: u32,
    /// Pause before retrying image capture during a search.
    pub search_retry_delay_ms: u32,
    /// Feature extraction failures before a search round gives up.
    pub search_max_retries: u8,
    /// How long the lock stays open after a match.
    pub match_hold_ms: u32,
    pub enroll_samples: u8,
    pub enroll_poll_ms: u32,
    pub enroll_remove_delay_ms: u32,
    /// How long enrollment waits for a finger before giving up.
    pub enroll_timeout_ms: u32,
    pub led_off_delay_ms: u32,
    /// Assumed until the module reports its own.
    pub library_capacity: u16,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            search_interval_ms: 1000,
            search_retry_delay_ms: 500,
            search_max_retries: 5,
            match_hold_ms: 3000,
            enroll_samples: 5,
            enroll_poll_ms: 200,
            enroll_remove_delay_ms: 1000,
            enroll_timeout_ms: 30_000,
            led_off_delay_ms: 500,
            library_capacity: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("the zw101 component is not configured")]
    MissingComponent,

    #[error("invalid identifier {0:?}")]
    InvalidId(String),

    #[error("identifier {0:?} is declared more than once")]
    DuplicateId(String),

    #[error("uart bus {0:?} is not declared")]
    UnknownUart(String),

    #[error("no uart bus declared")]
    NoUart,

    #[error("{0} uart buses declared, uart_id must pick one")]
    AmbiguousUart(usize),

    #[error("{domain} entry uses platform {platform:?}, expected \"zw101\"")]
    WrongPlatform { domain: &'static str, platform: String },

    #[error("{domain} entry references {id:?}, which is not a zw101 component")]
    UnknownParent { domain: &'static str, id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    #[serde(default)]
    pub uart: Vec<UartConfig>,
    #[serde(default)]
    pub zw101: Option<RootConfig>,
    #[serde(default)]
    pub binary_sensor: Vec<BinarySensorPlatform>,
    #[serde(default)]
    pub sensor: Vec<SensorPlatform>,
    #[serde(default)]
    pub switch: Vec<SwitchPlatform>,
    #[serde(default)]
    pub text_sensor: Vec<TextSensorPlatform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UartConfig {
    pub id: String,
    #[serde(default)]
    pub tx_pin: Option<String>,
    #[serde(default)]
    pub rx_pin: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uart_id: Option<String>,
    #[serde(default)]
    pub timings: Timings,
}

/// Keys shared by every entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub internal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub accuracy_decimals: Option<u8>,
    #[serde(default)]
    pub state_class: Option<String>,
    #[serde(default)]
    pub unit_of_measurement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinarySensorPlatform {
    pub platform: String,
    #[serde(default)]
    pub zw101_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub device_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorPlatform {
    pub platform: String,
    #[serde(default)]
    pub zw101_id: Option<String>,
    #[serde(default)]
    pub match_score: Option<SensorConfig>,
    #[serde(default)]
    pub match_id: Option<SensorConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchPlatform {
    pub platform: String,
    #[serde(default)]
    pub zw101_id: Option<String>,
    #[serde(default)]
    pub enroll: Option<EntityConfig>,
    #[serde(default)]
    pub clear: Option<EntityConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextSensorPlatform {
    pub platform: String,
    #[serde(default)]
    pub zw101_id: Option<String>,
    #[serde(default)]
    pub status: Option<EntityConfig>,
}

/// What an entity is attached to the component as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityRole {
    FingerprintSensor,
    MatchScore,
    MatchId,
    EnrollSwitch,
    ClearSwitch,
    Status,
}

/// Kind of entity a role is published through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    BinarySensor,
    Sensor,
    Switch,
    TextSensor,
}

impl EntityRole {
    pub fn kind(self) -> EntityKind {
        return match self {
            Self::FingerprintSensor => EntityKind::BinarySensor,
            Self::MatchScore | Self::MatchId => EntityKind::Sensor,
            Self::EnrollSwitch | Self::ClearSwitch => EntityKind::Switch,
            Self::Status => EntityKind::TextSensor,
        };
    }

    /// Registration method on the component.
    pub fn setter(self) -> &'static str {
        return match self {
            Self::FingerprintSensor => "set_fingerprint_sensor",
            Self::MatchScore => "set_match_score_sensor",
            Self::MatchId => "set_match_id_sensor",
            Self::EnrollSwitch => "set_enroll_switch",
            Self::ClearSwitch => "set_clear_switch",
            Self::Status => "set_status_sensor",
        };
    }

    /// Class instantiated for the entity in generated code.
    pub fn class_name(self) -> &'static str {
        return match self {
            Self::FingerprintSensor => "binary_sensor::BinarySensor",
            Self::MatchScore | Self::MatchId => "sensor::Sensor",
            Self::EnrollSwitch => "zw101::EnrollSwitch",
            Self::ClearSwitch => "zw101::ClearSwitch",
            Self::Status => "text_sensor::TextSensor",
        };
    }

    pub fn default_icon(self) -> &'static str {
        return match self {
            Self::FingerprintSensor | Self::MatchId => "mdi:fingerprint",
            Self::MatchScore => "mdi:percent",
            Self::EnrollSwitch => "mdi:fingerprint-add",
            Self::ClearSwitch => "mdi:delete-forever",
            Self::Status => "mdi:information-outline",
        };
    }

    /// Suffix of the identifier generated for an entity without an `id`.
    fn id_suffix(self) -> &'static str {
        return match self {
            Self::FingerprintSensor => "fingerprint",
            Self::MatchScore => "match_score",
            Self::MatchId => "match_id",
            Self::EnrollSwitch => "enroll",
            Self::ClearSwitch => "clear",
            Self::Status => "status",
        };
    }

    /// Switches carry a reference back to the component in generated code.
    pub fn has_parent(self) -> bool {
        return self.kind() == EntityKind::Switch;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoot {
    pub id: String,
    pub uart_id: String,
    pub baud_rate: u32,
    pub timings: Timings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntity {
    pub id: String,
    pub parent: String,
    pub role: EntityRole,
    pub name: Option<String>,
    pub icon: String,
    pub internal: bool,
    /// Binary sensor only.
    pub device_class: Option<String>,
    /// Sensors only.
    pub accuracy_decimals: Option<u8>,
    pub state_class: Option<String>,
    pub unit_of_measurement: Option<String>,
}

/// A configuration whose identifiers all resolve. Entities are in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub root: ResolvedRoot,
    pub entities: Vec<ResolvedEntity>,
}

impl ValidatedConfig {
    pub fn entity(&self, id: &str) -> Option<&ResolvedEntity> {
        return self.entities.iter().find(|e| e.id == id);
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let mut ids = IdRegistry::default();

        for uart in &self.uart {
            ids.declare(&uart.id)?;
        }

        let root_config = self.zw101.as_ref().ok_or(ConfigError::MissingComponent)?;
        let root_id = root_config.id.clone().unwrap_or_else(|| DEFAULT_COMPONENT_ID.to_string());
        ids.declare(&root_id)?;

        let uart = match &root_config.uart_id {
            Some(uart_id) => {
                check_id(uart_id)?;
                self.uart
                    .iter()
                    .find(|u| &u.id == uart_id)
                    .ok_or_else(|| ConfigError::UnknownUart(uart_id.clone()))?
            },
            None => match self.uart.as_slice() {
                [] => return Err(ConfigError::NoUart),
                [only] => only,
                many => return Err(ConfigError::AmbiguousUart(many.len())),
            },
        };

        let root = ResolvedRoot {
            id: root_id,
            uart_id: uart.id.clone(),
            baud_rate: uart.baud_rate,
            timings: root_config.timings,
        };

        let mut resolver = EntityResolver { root: &root, ids, entities: Vec::new() };

        for entry in &self.binary_sensor {
            let parent = resolver.parent("binary_sensor", &entry.platform, &entry.zw101_id)?;
            let entity = EntityConfig {
                id: entry.id.clone(),
                name: entry.name.clone(),
                icon: entry.icon.clone(),
                internal: entry.internal,
            };
            let mut resolved = resolver.resolve(parent, EntityRole::FingerprintSensor, &entity)?;
            resolved.device_class = Some(entry.device_class.clone().unwrap_or_else(|| "lock".to_string()));
            resolver.entities.push(resolved);
        }

        for entry in &self.sensor {
            let parent = resolver.parent("sensor", &entry.platform, &entry.zw101_id)?;
            for (role, sensor) in [(EntityRole::MatchScore, &entry.match_score), (EntityRole::MatchId, &entry.match_id)] {
                if let Some(sensor) = sensor {
                    let entity = EntityConfig {
                        id: sensor.id.clone(),
                        name: sensor.name.clone(),
                        icon: sensor.icon.clone(),
                        internal: sensor.internal,
                    };
                    let mut resolved = resolver.resolve(parent.clone(), role, &entity)?;
                    resolved.accuracy_decimals = Some(sensor.accuracy_decimals.unwrap_or(0));
                    resolved.state_class =
                        Some(sensor.state_class.clone().unwrap_or_else(|| "measurement".to_string()));
                    resolved.unit_of_measurement = sensor.unit_of_measurement.clone();
                    resolver.entities.push(resolved);
                }
            }
        }

        for entry in &self.switch {
            let parent = resolver.parent("switch", &entry.platform, &entry.zw101_id)?;
            for (role, switch) in [(EntityRole::EnrollSwitch, &entry.enroll), (EntityRole::ClearSwitch, &entry.clear)] {
                if let Some(switch) = switch {
                    let resolved = resolver.resolve(parent.clone(), role, switch)?;
                    resolver.entities.push(resolved);
                }
            }
        }

        for entry in &self.text_sensor {
            let parent = resolver.parent("text_sensor", &entry.platform, &entry.zw101_id)?;
            if let Some(status) = &entry.status {
                let resolved = resolver.resolve(parent, EntityRole::Status, status)?;
                resolver.entities.push(resolved);
            }
        }

        let entities = resolver.entities;
        return Ok(ValidatedConfig { root, entities });
    }
}

struct EntityResolver<'a> {
    root: &'a ResolvedRoot,
    ids: IdRegistry,
    entities: Vec<ResolvedEntity>,
}

impl EntityResolver<'_> {
    /// Resolves `zw101_id` against the declared component; omitted means the component.
    fn parent(&self, domain: &'static str, platform: &str, zw101_id: &Option<String>) -> Result<String, ConfigError> {
        if platform != PLATFORM {
            return Err(ConfigError::WrongPlatform { domain, platform: platform.to_string() });
        }
        return match zw101_id {
            None => Ok(self.root.id.clone()),
            Some(id) if *id == self.root.id => Ok(id.clone()),
            Some(id) => {
                check_id(id)?;
                Err(ConfigError::UnknownParent { domain, id: id.clone() })
            },
        };
    }

    fn resolve(&mut self, parent: String, role: EntityRole, entity: &EntityConfig) -> Result<ResolvedEntity, ConfigError> {
        let id = match &entity.id {
            Some(id) => id.clone(),
            None => format!("{}_{}", parent, role.id_suffix()),
        };
        self.ids.declare(&id)?;

        return Ok(ResolvedEntity {
            id,
            parent,
            role,
            name: entity.name.clone(),
            icon: entity.icon.clone().unwrap_or_else(|| role.default_icon().to_string()),
            internal: entity.internal,
            device_class: None,
            accuracy_decimals: None,
            state_class: None,
            unit_of_measurement: None,
        });
    }
}

#[derive(Default)]
struct IdRegistry {
    seen: BTreeSet<String>,
}

impl IdRegistry {
    fn declare(&mut self, id: &str) -> Result<(), ConfigError> {
        check_id(id)?;
        if !self.seen.insert(id.to_string()) {
            return Err(ConfigError::DuplicateId(id.to_string()));
        }
        return Ok(());
    }
}

/// Identifiers become variable names in generated code: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn check_id(id: &str) -> Result<(), ConfigError> {
    let mut chars = id.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        },
        None => false,
    };
    if !valid {
        return Err(ConfigError::InvalidId(id.to_string()));
    }
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn minimal() -> DeviceConfig {
        DeviceConfig {
            uart: vec![UartConfig { id: "uart_bus".into(), tx_pin: None, rx_pin: None, baud_rate: 57600 }],
            zw101: Some(RootConfig::default()),
            ..DeviceConfig::default()
        }
    }

    #[test]
    fn identifiers() {
        assert!(check_id("fp_1").is_ok());
        assert!(check_id("_x").is_ok());
        assert_eq!(check_id("1fp"), Err(ConfigError::InvalidId("1fp".into())));
        assert!(check_id("").is_err());
        assert!(check_id("fp-reader").is_err());
    }

    #[test]
    fn root_defaults() {
        let config = minimal().validate().unwrap();
        assert_eq!(config.root.id, DEFAULT_COMPONENT_ID);
        assert_eq!(config.root.uart_id, "uart_bus");
        assert_eq!(config.root.timings, Timings::default());
        assert!(config.entities.is_empty());
    }

    #[test]
    fn uart_must_be_unambiguous() {
        let mut config = minimal();
        config.uart.push(UartConfig { id: "other".into(), tx_pin: None, rx_pin: None, baud_rate: 9600 });
        assert_eq!(config.validate(), Err(ConfigError::AmbiguousUart(2)));

        config.zw101.as_mut().unwrap().uart_id = Some("other".into());
        assert_eq!(config.validate().unwrap().root.baud_rate, 9600);

        config.uart.clear();
        assert_eq!(config.validate(), Err(ConfigError::UnknownUart("other".into())));
        config.zw101.as_mut().unwrap().uart_id = None;
        assert_eq!(config.validate(), Err(ConfigError::NoUart));
    }

    #[test]
    fn component_id_may_not_clash_with_uart() {
        let mut config = minimal();
        config.zw101.as_mut().unwrap().id = Some("uart_bus".into());
        assert_eq!(config.validate(), Err(ConfigError::DuplicateId("uart_bus".into())));
    }
}
