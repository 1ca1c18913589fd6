use crate::inim_api::models::active_scenarios::{ActiveScenarios, ScenarioCode};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The arm modes a panel can be mapped onto.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmMode {
    #[serde(rename = "disarmed")]
    Disarmed,
    #[serde(rename = "armed_away")]
    ArmedAway,
    #[serde(rename = "armed_home")]
    ArmedHome,
    #[serde(rename = "armed_night")]
    ArmedNight,
    #[serde(rename = "armed_vacation")]
    ArmedVacation,
}

impl ArmMode {
    /// Order in which modes are tested against the active scenarios. When more
    /// than one configured code is active, the earliest mode here wins.
    pub const RESOLUTION_ORDER: [ArmMode; 5] = [
        ArmMode::ArmedAway,
        ArmMode::Disarmed,
        ArmMode::ArmedNight,
        ArmMode::ArmedHome,
        ArmMode::ArmedVacation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArmMode::Disarmed => "disarmed",
            ArmMode::ArmedAway => "armed_away",
            ArmMode::ArmedHome => "armed_home",
            ArmMode::ArmedNight => "armed_night",
            ArmMode::ArmedVacation => "armed_vacation",
        }
    }
}

impl Display for ArmMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScenarioTableError {
    #[error("scenario code {code} is assigned to both {first} and {second}")]
    DuplicateCode {
        code: ScenarioCode,
        first: ArmMode,
        second: ArmMode,
    },

    #[error("scenario code for {0} must not be negative, got {1}")]
    NegativeCode(ArmMode, ScenarioCode),

    #[error("no scenario code configured for {0}")]
    Missing(ArmMode),
}

/// Per-panel mapping from arm mode to INIM scenario code.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armed_away: Option<ScenarioCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disarmed: Option<ScenarioCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armed_night: Option<ScenarioCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armed_home: Option<ScenarioCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armed_vacation: Option<ScenarioCode>,
}

impl ScenarioTable {
    /// Scenario numbering of a factory configured INIM panel.
    pub fn inim_defaults() -> Self {
        Self {
            armed_away: Some(0),
            disarmed: Some(1),
            armed_night: Some(2),
            armed_home: Some(3),
            armed_vacation: None,
        }
    }

    pub fn code_for(&self, mode: ArmMode) -> Option<ScenarioCode> {
        match mode {
            ArmMode::Disarmed => self.disarmed,
            ArmMode::ArmedAway => self.armed_away,
            ArmMode::ArmedHome => self.armed_home,
            ArmMode::ArmedNight => self.armed_night,
            ArmMode::ArmedVacation => self.armed_vacation,
        }
    }

    /// Modes with a scenario code, in resolution order.
    pub fn configured_modes(&self) -> impl Iterator<Item = ArmMode> + '_ {
        ArmMode::RESOLUTION_ORDER
            .into_iter()
            .filter(|mode| self.code_for(*mode).is_some())
    }

    /// Maps the active scenarios onto an arm mode. `None` means no configured
    /// code is active and the displayed state should be left alone.
    pub fn resolve(&self, active: &ActiveScenarios) -> Option<ArmMode> {
        ArmMode::RESOLUTION_ORDER.into_iter().find(|mode| {
            self.code_for(*mode)
                .is_some_and(|code| active.contains(code))
        })
    }

    pub fn validate(&self) -> Result<(), ScenarioTableError> {
        for required in [ArmMode::ArmedAway, ArmMode::Disarmed] {
            if self.code_for(required).is_none() {
                return Err(ScenarioTableError::Missing(required));
            }
        }

        let mut seen: Vec<(ScenarioCode, ArmMode)> = Vec::with_capacity(5);
        for mode in self.configured_modes() {
            let Some(code) = self.code_for(mode) else {
                continue;
            };
            if code < 0 {
                return Err(ScenarioTableError::NegativeCode(mode, code));
            }
            if let Some((_, first)) = seen.iter().find(|(c, _)| *c == code) {
                return Err(ScenarioTableError::DuplicateCode {
                    code,
                    first: *first,
                    second: mode,
                });
            }
            seen.push((code, mode));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ScenarioTable {
        ScenarioTable {
            disarmed: Some(1),
            armed_away: Some(0),
            armed_home: Some(3),
            armed_night: Some(2),
            armed_vacation: None,
        }
    }

    #[test]
    fn single_active_code_maps_to_its_mode() {
        assert_eq!(
            table().resolve(&ActiveScenarios::Single(0)),
            Some(ArmMode::ArmedAway)
        );
        assert_eq!(
            table().resolve(&ActiveScenarios::Single(3)),
            Some(ArmMode::ArmedHome)
        );
    }

    #[test]
    fn every_configured_code_resolves_to_its_owner() {
        let table = ScenarioTable {
            armed_vacation: Some(9),
            ..table()
        };
        for mode in ArmMode::RESOLUTION_ORDER {
            let code = table.code_for(mode).unwrap();
            assert_eq!(table.resolve(&ActiveScenarios::Multi(vec![code])), Some(mode));
            assert_eq!(table.resolve(&ActiveScenarios::Single(code)), Some(mode));
        }
    }

    #[test]
    fn no_active_codes_is_unknown() {
        assert_eq!(table().resolve(&ActiveScenarios::Multi(vec![])), None);
    }

    #[test]
    fn unconfigured_codes_are_unknown() {
        assert_eq!(table().resolve(&ActiveScenarios::Single(42)), None);
        assert_eq!(table().resolve(&ActiveScenarios::Multi(vec![7, 8])), None);
    }

    #[test]
    fn first_mode_in_resolution_order_wins() {
        let active = ActiveScenarios::parse_delimited("1,2");
        assert_eq!(table().resolve(&active), Some(ArmMode::Disarmed));

        let active = ActiveScenarios::parse_delimited("3,0");
        assert_eq!(table().resolve(&active), Some(ArmMode::ArmedAway));
    }

    #[test]
    fn resolution_is_idempotent() {
        let active = ActiveScenarios::Multi(vec![2]);
        let table = table();
        assert_eq!(table.resolve(&active), table.resolve(&active));
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let table = ScenarioTable {
            armed_vacation: Some(0),
            ..table()
        };
        assert_eq!(
            table.validate(),
            Err(ScenarioTableError::DuplicateCode {
                code: 0,
                first: ArmMode::ArmedAway,
                second: ArmMode::ArmedVacation,
            })
        );
    }

    #[test]
    fn away_and_disarm_are_required() {
        let table = ScenarioTable {
            disarmed: None,
            ..table()
        };
        assert_eq!(
            table.validate(),
            Err(ScenarioTableError::Missing(ArmMode::Disarmed))
        );
    }

    #[test]
    fn negative_codes_are_rejected() {
        let table = ScenarioTable {
            armed_night: Some(-1),
            ..table()
        };
        assert_eq!(
            table.validate(),
            Err(ScenarioTableError::NegativeCode(ArmMode::ArmedNight, -1))
        );
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ScenarioTable::inim_defaults().validate(), Ok(()));
        assert_eq!(
            ScenarioTable::inim_defaults().configured_modes().count(),
            4
        );
    }
}
