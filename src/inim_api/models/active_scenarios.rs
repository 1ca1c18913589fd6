use tracing::warn;

pub type ScenarioCode = i64;

/// The scenario(s) a panel reports as active.
///
/// Older INIM firmware reports a single `ActiveScenario` integer, newer
/// firmware a comma separated `ActiveScenarios` string. The shape is settled
/// once when the device is deserialized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActiveScenarios {
    Single(ScenarioCode),
    Multi(Vec<ScenarioCode>),
}

impl ActiveScenarios {
    pub fn contains(&self, code: ScenarioCode) -> bool {
        match self {
            ActiveScenarios::Single(active) => *active == code,
            ActiveScenarios::Multi(active) => active.contains(&code),
        }
    }

    pub fn codes(&self) -> Vec<ScenarioCode> {
        match self {
            ActiveScenarios::Single(active) => vec![*active],
            ActiveScenarios::Multi(active) => active.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ActiveScenarios::Multi(active) if active.is_empty())
    }

    /// Parses `"1,2"`, `"1, 2"` or `""`. Tokens that are not integers are
    /// dropped with a warning rather than failing the whole snapshot.
    pub fn parse_delimited(raw: &str) -> Self {
        let codes = raw
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .filter_map(|token| match token.parse::<ScenarioCode>() {
                Ok(code) => Some(code),
                Err(_) => {
                    warn!("Ignoring malformed scenario code {:?} in {:?}", token, raw);
                    None
                }
            })
            .collect();
        ActiveScenarios::Multi(codes)
    }
}

impl Default for ActiveScenarios {
    fn default() -> Self {
        ActiveScenarios::Multi(Vec::new())
    }
}
