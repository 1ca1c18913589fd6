pub mod request;
pub mod response;

pub mod active_scenarios;
pub mod device;
pub mod snapshot;
pub mod zone;

use serde::{Deserialize, Deserializer};

/// INIM is not consistent about numeric identifiers: the same field shows up
/// as `3` on one firmware and `"3"` on another.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}
